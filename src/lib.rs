/// 启动和注入过程中的错误类型
pub mod error;

/// 配置文件
pub mod config;

/// 触摸事件和触点表的抽象
pub mod event_model;

/// 物理触摸屏的发现与探测, 以及虚拟设备的创建
pub mod input_devices;

/// 虚拟设备的创建和整帧写出
pub mod event_dispatcher;

/// 物理设备事件到触点表的路由
pub mod event_router;

/// 触摸屏虚拟化引擎: 生命周期和合成触点注入
pub mod touch_driver;

pub use error::TouchError;
pub use touch_driver::{EngineConfig, EngineState, TouchEngine};
