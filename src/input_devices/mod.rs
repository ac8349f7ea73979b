/// 与 `EVIOCGBIT` 布局一致的位图
pub mod bitset;

/// 设备能力探测与触摸屏判定
pub mod capability;

/// 物理 / 虚拟设备的抽象
pub mod device;

/// 枚举 `/dev/input` 并挑出触摸屏
pub mod discovery;

/// libevdev + uinput 实现
pub mod evdev;

pub mod mock;

pub use bitset::BitSet;
pub use capability::{AxisInfo, CapabilitySource, DeviceCapabilities, DeviceIdentity, TouchRange};
pub use device::{DeviceBackend, PhysicalDevice, ReadInterrupt, VirtualDevice, VirtualDeviceSpec};
pub use discovery::{SelectionPolicy, discover, scan_input_dir};
pub use evdev::EvdevBackend;
