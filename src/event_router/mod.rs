/// 物理触摸屏事件 -> 触点表
pub mod reader;

pub use reader::EventReader;
