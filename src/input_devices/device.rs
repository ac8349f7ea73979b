use std::{
    io,
    path::{Path, PathBuf},
};

use super::bitset::BitSet;
use super::capability::{AxisInfo, CapabilitySource, DeviceIdentity};
use crate::event_model::RawEvent;

/// 从别的线程唤醒阻塞在 [`PhysicalDevice::next_event`] 里的读取
pub trait ReadInterrupt: Send + Sync + 'static {
    /// 之后 (以及正在进行的) `next_event` 返回 `ErrorKind::Interrupted`
    fn interrupt(&self) -> io::Result<()>;
}

/// 物理触摸屏的读取端
pub trait PhysicalDevice: Send + 'static {
    type Interrupt: ReadInterrupt;

    /// 阻塞读取下一个事件, 出错即表示设备不可再用
    fn next_event(&mut self) -> io::Result<RawEvent>;

    fn interrupt_handle(&self) -> io::Result<Self::Interrupt>;

    /// 独占设备, 其他进程将收不到它的原始事件
    fn grab(&mut self) -> io::Result<()>;

    fn ungrab(&mut self) -> io::Result<()>;
}

/// 虚拟触摸屏的写入端, drop 时销毁设备
pub trait VirtualDevice: Send + 'static {
    /// 按顺序写入一组事件
    fn emit(&mut self, events: &[RawEvent]) -> io::Result<()>;

    /// `/dev/input/eventN`, 拿不到时为 `None`
    fn devnode(&self) -> Option<PathBuf> {
        None
    }
}

/// 创建虚拟设备所需的描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDeviceSpec {
    pub name: String,
    pub phys: String,
    pub identity: DeviceIdentity,
    pub keys: BitSet,
    pub axes: Vec<(u16, AxisInfo)>,
    pub properties: BitSet,
}

/// 设备层, 真实实现见 [`super::evdev::EvdevBackend`]
pub trait DeviceBackend: Send + Sync + 'static {
    type Probe: CapabilitySource;
    type Physical: PhysicalDevice;
    type Virtual: VirtualDevice;

    /// 列出候选设备节点
    fn candidates(&self) -> io::Result<Vec<PathBuf>>;

    /// 打开设备仅用于探测, 返回值 drop 即关闭
    fn open_probe(&self, path: &Path) -> io::Result<Self::Probe>;

    fn open_physical(&self, path: &Path) -> io::Result<Self::Physical>;

    fn create_virtual(&self, spec: &VirtualDeviceSpec) -> io::Result<Self::Virtual>;
}
