//! 内存里的设备层, 给测试用
//!
//! 物理设备的事件来自 [`MockBackend::feed`] 拿到的 [`MockFeed`], 它 drop 后
//! 读取会失败, 读取线程随之退出. 虚拟设备写入的每一帧都记录在 [`MockBackend::emitted`] 里

use std::{
    collections::{BTreeMap, VecDeque},
    io,
    path::{Path, PathBuf},
    sync::{Arc, Condvar, Mutex},
};

use super::bitset::BitSet;
use super::capability::{AxisInfo, CapabilitySource, DeviceIdentity};
use super::device::{DeviceBackend, PhysicalDevice, ReadInterrupt, VirtualDevice, VirtualDeviceSpec};
use crate::event_model::RawEvent;
use crate::event_model::event::{
    ABS_CNT, ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT, ABS_MT_TRACKING_ID, BTN_TOUCH,
    EV_ABS, EV_CNT, EV_KEY, EV_SYN, INPUT_PROP_CNT, INPUT_PROP_DIRECT, KEY_CNT,
};

/// 一个假的候选设备
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub path: PathBuf,
    pub name: String,
    pub phys: String,
    pub identity: DeviceIdentity,
    pub event_bits: BitSet,
    pub abs_bits: BitSet,
    pub key_bits: BitSet,
    pub prop_bits: BitSet,
    pub axes: BTreeMap<u16, AxisInfo>,
    /// 所有能力查询都失败
    pub fail_queries: bool,
    pub fail_open: bool,
}

impl MockDevice {
    /// 一个标准的 type B 触摸屏
    pub fn touchscreen(
        path: impl Into<PathBuf>,
        name: &str,
        slots: i32,
        x: (i32, i32),
        y: (i32, i32),
    ) -> Self {
        let axes = BTreeMap::from([
            (ABS_MT_SLOT, AxisInfo::range(0, slots - 1)),
            (ABS_MT_POSITION_X, AxisInfo::range(x.0, x.1)),
            (ABS_MT_POSITION_Y, AxisInfo::range(y.0, y.1)),
            (ABS_MT_TRACKING_ID, AxisInfo::range(0, 0xFFFF)),
        ]);
        Self {
            path: path.into(),
            name: name.to_string(),
            phys: "mock/input0".to_string(),
            identity: DeviceIdentity {
                bus_type: 0x18,
                vendor: 0x2808,
                product: 0x1015,
                version: 0x0100,
            },
            event_bits: BitSet::with_bits(EV_CNT, [EV_SYN, EV_KEY, EV_ABS].map(usize::from)),
            abs_bits: BitSet::with_bits(ABS_CNT, axes.keys().map(|&code| code as usize)),
            key_bits: BitSet::with_bits(KEY_CNT, [BTN_TOUCH as usize]),
            prop_bits: BitSet::with_bits(INPUT_PROP_CNT, [INPUT_PROP_DIRECT as usize]),
            axes,
            fail_queries: false,
            fail_open: false,
        }
    }

    fn query<T>(&self, value: impl FnOnce() -> T) -> io::Result<T> {
        if self.fail_queries {
            Err(io::Error::other("mock query failure"))
        } else {
            Ok(value())
        }
    }
}

impl CapabilitySource for MockDevice {
    fn event_type_bits(&self) -> io::Result<BitSet> {
        self.query(|| self.event_bits.clone())
    }

    fn abs_bits(&self) -> io::Result<BitSet> {
        self.query(|| self.abs_bits.clone())
    }

    fn key_bits(&self) -> io::Result<BitSet> {
        self.query(|| self.key_bits.clone())
    }

    fn property_bits(&self) -> io::Result<BitSet> {
        self.query(|| self.prop_bits.clone())
    }

    fn abs_info(&self, code: u16) -> io::Result<AxisInfo> {
        self.query(|| self.axes.get(&code).copied())?
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such axis"))
    }

    fn identity(&self) -> io::Result<DeviceIdentity> {
        self.query(|| self.identity)
    }

    fn name(&self) -> io::Result<String> {
        self.query(|| self.name.clone())
    }

    fn phys(&self) -> io::Result<String> {
        self.query(|| self.phys.clone())
    }

    fn driver_version(&self) -> io::Result<i32> {
        self.query(|| 0x010001)
    }
}

/// 按时间顺序记录的设备操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    OpenPhysical(PathBuf),
    CreateVirtual(String),
    Grab(PathBuf),
    Ungrab(PathBuf),
    DestroyVirtual(String),
}

#[derive(Default)]
struct Shared {
    ops: Mutex<Vec<MockOp>>,
    frames: Mutex<Vec<Vec<RawEvent>>>,
    specs: Mutex<Vec<VirtualDeviceSpec>>,
    pending: Mutex<Option<Arc<Queue>>>,
}

impl Shared {
    fn record(&self, op: MockOp) {
        self.ops.lock().unwrap().push(op);
    }
}

#[derive(Default)]
struct QueueState {
    events: VecDeque<RawEvent>,
    closed: bool,
    interrupted: bool,
}

/// 物理设备的事件队列, 空的时候读取会阻塞
#[derive(Default)]
struct Queue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl Queue {
    fn closed() -> Arc<Self> {
        let queue = Self::default();
        queue.state.lock().unwrap().closed = true;
        Arc::new(queue)
    }

    fn update(&self, f: impl FnOnce(&mut QueueState)) {
        f(&mut self.state.lock().unwrap());
        self.ready.notify_all();
    }

    fn pop(&self) -> io::Result<RawEvent> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(event) = state.events.pop_front() {
                return Ok(event);
            }
            if state.interrupted {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "mock interrupt"));
            }
            if state.closed {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "feed closed"));
            }
            state = self.ready.wait(state).unwrap();
        }
    }
}

/// 往物理设备里写事件, drop 时关闭队列
pub struct MockFeed {
    queue: Arc<Queue>,
}

impl MockFeed {
    pub fn send(&self, event: RawEvent) {
        self.queue.update(|state| state.events.push_back(event));
    }
}

impl Drop for MockFeed {
    fn drop(&mut self) {
        self.queue.update(|state| state.closed = true);
    }
}

#[derive(Clone)]
pub struct MockBackend {
    devices: Vec<MockDevice>,
    shared: Arc<Shared>,
    pub fail_create_virtual: bool,
    pub fail_grab: bool,
    /// 打断读取不起作用, 模拟卡在读里的设备
    pub ignore_interrupt: bool,
}

impl MockBackend {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            devices,
            shared: Arc::default(),
            fail_create_virtual: false,
            fail_grab: false,
            ignore_interrupt: false,
        }
    }

    /// 下一次打开的物理设备从返回的 [`MockFeed`] 读取事件.
    /// 没调用过时, 打开的物理设备读到的是一个已关闭的队列
    pub fn feed(&self) -> MockFeed {
        let queue = Arc::new(Queue::default());
        *self.shared.pending.lock().unwrap() = Some(Arc::clone(&queue));
        MockFeed { queue }
    }

    /// 虚拟设备收到的所有帧
    pub fn emitted(&self) -> Vec<Vec<RawEvent>> {
        self.shared.frames.lock().unwrap().clone()
    }

    pub fn clear_emitted(&self) {
        self.shared.frames.lock().unwrap().clear();
    }

    pub fn ops(&self) -> Vec<MockOp> {
        self.shared.ops.lock().unwrap().clone()
    }

    pub fn virtual_specs(&self) -> Vec<VirtualDeviceSpec> {
        self.shared.specs.lock().unwrap().clone()
    }

    fn device(&self, path: &Path) -> io::Result<&MockDevice> {
        self.devices
            .iter()
            .find(|d| d.path == path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such device"))
    }
}

impl DeviceBackend for MockBackend {
    type Probe = MockDevice;
    type Physical = MockPhysical;
    type Virtual = MockVirtual;

    fn candidates(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self.devices.iter().map(|d| d.path.clone()).collect())
    }

    fn open_probe(&self, path: &Path) -> io::Result<MockDevice> {
        let device = self.device(path)?;
        if device.fail_open {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "mock"));
        }
        Ok(device.clone())
    }

    fn open_physical(&self, path: &Path) -> io::Result<MockPhysical> {
        let device = self.device(path)?;
        if device.fail_open {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "mock"));
        }
        self.shared.record(MockOp::OpenPhysical(path.to_path_buf()));
        let queue = self
            .shared
            .pending
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(Queue::closed);
        Ok(MockPhysical {
            path: path.to_path_buf(),
            queue,
            grabbed: false,
            fail_grab: self.fail_grab,
            ignore_interrupt: self.ignore_interrupt,
            shared: Arc::clone(&self.shared),
        })
    }

    fn create_virtual(&self, spec: &VirtualDeviceSpec) -> io::Result<MockVirtual> {
        if self.fail_create_virtual {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "mock uinput"));
        }
        self.shared.record(MockOp::CreateVirtual(spec.name.clone()));
        self.shared.specs.lock().unwrap().push(spec.clone());
        Ok(MockVirtual {
            name: spec.name.clone(),
            shared: Arc::clone(&self.shared),
        })
    }
}

pub struct MockPhysical {
    path: PathBuf,
    queue: Arc<Queue>,
    grabbed: bool,
    fail_grab: bool,
    ignore_interrupt: bool,
    shared: Arc<Shared>,
}

impl PhysicalDevice for MockPhysical {
    type Interrupt = MockInterrupt;

    fn next_event(&mut self) -> io::Result<RawEvent> {
        self.queue.pop()
    }

    fn interrupt_handle(&self) -> io::Result<MockInterrupt> {
        Ok(MockInterrupt {
            queue: (!self.ignore_interrupt).then(|| Arc::clone(&self.queue)),
        })
    }

    fn grab(&mut self) -> io::Result<()> {
        if self.fail_grab {
            return Err(io::Error::new(io::ErrorKind::ResourceBusy, "mock grab"));
        }
        self.grabbed = true;
        self.shared.record(MockOp::Grab(self.path.clone()));
        Ok(())
    }

    fn ungrab(&mut self) -> io::Result<()> {
        if std::mem::take(&mut self.grabbed) {
            self.shared.record(MockOp::Ungrab(self.path.clone()));
        }
        Ok(())
    }
}

pub struct MockInterrupt {
    queue: Option<Arc<Queue>>,
}

impl ReadInterrupt for MockInterrupt {
    fn interrupt(&self) -> io::Result<()> {
        if let Some(queue) = &self.queue {
            queue.update(|state| state.interrupted = true);
        }
        Ok(())
    }
}

pub struct MockVirtual {
    name: String,
    shared: Arc<Shared>,
}

impl VirtualDevice for MockVirtual {
    fn emit(&mut self, events: &[RawEvent]) -> io::Result<()> {
        self.shared.frames.lock().unwrap().push(events.to_vec());
        Ok(())
    }
}

impl Drop for MockVirtual {
    fn drop(&mut self) {
        self.shared.record(MockOp::DestroyVirtual(self.name.clone()));
    }
}
