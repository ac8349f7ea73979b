/// 触点表 -> 虚拟设备的帧
pub mod synchronizer;

/// 创建虚拟触摸屏并独占物理设备
pub mod synthesizer;

pub use synchronizer::FrameSynchronizer;
pub use synthesizer::{Synthesized, synthesize};
