use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    os::{
        fd::{AsFd, OwnedFd},
        unix::fs::OpenOptionsExt,
    },
    path::{Path, PathBuf},
};

use evdev_rs::{
    AbsInfo as EvAbsInfo, Device, DeviceWrapper, EnableCodeData, GrabMode, InputEvent, ReadFlag,
    ReadStatus, TimeVal, UInputDevice, UninitDevice,
    enums::{EventCode, EventType, InputProp},
    util::{event_code_to_int, int_to_event_code},
};
use nix::{
    errno::Errno,
    poll::{PollFd, PollFlags, PollTimeout, poll},
};
use tracing::{debug, trace};

use super::bitset::BitSet;
use super::capability::{AxisInfo, CapabilitySource, DeviceIdentity};
use super::device::{DeviceBackend, PhysicalDevice, ReadInterrupt, VirtualDevice, VirtualDeviceSpec};
use super::discovery::scan_input_dir;
use crate::event_model::RawEvent;
use crate::event_model::event::{ABS_CNT, EV_ABS, EV_CNT, EV_KEY, INPUT_PROP_CNT, KEY_CNT};

const EVENT_TYPES: &[(u16, EventType)] = &[
    (0x00, EventType::EV_SYN),
    (0x01, EventType::EV_KEY),
    (0x02, EventType::EV_REL),
    (0x03, EventType::EV_ABS),
    (0x04, EventType::EV_MSC),
    (0x05, EventType::EV_SW),
    (0x11, EventType::EV_LED),
    (0x12, EventType::EV_SND),
    (0x14, EventType::EV_REP),
    (0x15, EventType::EV_FF),
    (0x16, EventType::EV_PWR),
    (0x17, EventType::EV_FF_STATUS),
];

const INPUT_PROPS: &[(u16, InputProp)] = &[
    (0x00, InputProp::INPUT_PROP_POINTER),
    (0x01, InputProp::INPUT_PROP_DIRECT),
    (0x02, InputProp::INPUT_PROP_BUTTONPAD),
    (0x03, InputProp::INPUT_PROP_SEMI_MT),
    (0x04, InputProp::INPUT_PROP_TOPBUTTONPAD),
    (0x05, InputProp::INPUT_PROP_POINTING_STICK),
    (0x06, InputProp::INPUT_PROP_ACCELEROMETER),
];

fn code(kind: u16, code: u16) -> EventCode {
    int_to_event_code(u32::from(kind), u32::from(code))
}

fn open_device(path: &Path) -> io::Result<Device> {
    Device::new_from_file(File::open(path)?)
}

/// 基于 libevdev / uinput 的设备层
#[derive(Debug, Clone)]
pub struct EvdevBackend {
    pub input_dir: PathBuf,
    pub node_prefix: String,
}

impl EvdevBackend {
    pub fn new(input_dir: impl Into<PathBuf>, node_prefix: impl Into<String>) -> Self {
        Self {
            input_dir: input_dir.into(),
            node_prefix: node_prefix.into(),
        }
    }
}

impl Default for EvdevBackend {
    fn default() -> Self {
        Self::new("/dev/input", "event")
    }
}

impl DeviceBackend for EvdevBackend {
    type Probe = EvdevProbe;
    type Physical = EvdevPhysical;
    type Virtual = EvdevVirtual;

    fn candidates(&self) -> io::Result<Vec<PathBuf>> {
        scan_input_dir(&self.input_dir, &self.node_prefix)
    }

    fn open_probe(&self, path: &Path) -> io::Result<EvdevProbe> {
        Ok(EvdevProbe {
            device: open_device(path)?,
        })
    }

    fn open_physical(&self, path: &Path) -> io::Result<EvdevPhysical> {
        // 非阻塞打开, 等待交给 poll, 这样读取可以被唤醒管道打断
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(path)?;
        let readable = file.try_clone()?;
        let (wake, waker) = nix::unistd::pipe()?;
        Ok(EvdevPhysical {
            device: Device::new_from_file(file)?,
            readable,
            wake,
            waker: File::from(waker),
            resyncing: false,
        })
    }

    fn create_virtual(&self, spec: &VirtualDeviceSpec) -> io::Result<EvdevVirtual> {
        let template = UninitDevice::new()
            .ok_or_else(|| io::Error::other("libevdev_new failed"))?;
        template.set_name(&spec.name);
        template.set_phys(&spec.phys);
        template.set_bustype(spec.identity.bus_type);
        template.set_vendor_id(spec.identity.vendor);
        template.set_product_id(spec.identity.product);
        template.set_version(spec.identity.version);

        template.enable_event_type(&EventType::EV_KEY)?;
        for key in spec.keys.iter_ones().filter(|&key| key < KEY_CNT) {
            template.enable_event_code(&code(EV_KEY, key as u16), None)?;
        }

        template.enable_event_type(&EventType::EV_ABS)?;
        for (axis, info) in &spec.axes {
            let data = EnableCodeData::AbsInfo(EvAbsInfo {
                value: info.value,
                minimum: info.minimum,
                maximum: info.maximum,
                fuzz: info.fuzz,
                flat: info.flat,
                resolution: info.resolution,
            });
            template.enable_event_code(&code(EV_ABS, *axis), Some(data))?;
        }

        for (index, prop) in INPUT_PROPS {
            if spec.properties.test(*index as usize) {
                template.enable_property(prop)?;
            }
        }

        let device = UInputDevice::create_from_device(&template)?;
        debug!(
            "uinput device {:?} created at {:?}",
            spec.name,
            device.devnode()
        );
        Ok(EvdevVirtual { device })
    }
}

/// 只用于探测的设备句柄
pub struct EvdevProbe {
    device: Device,
}

impl CapabilitySource for EvdevProbe {
    fn event_type_bits(&self) -> io::Result<BitSet> {
        let mut bits = BitSet::new(EV_CNT);
        for (index, ty) in EVENT_TYPES {
            if self.device.has_event_type(ty) {
                bits.set(*index as usize);
            }
        }
        Ok(bits)
    }

    fn abs_bits(&self) -> io::Result<BitSet> {
        let mut bits = BitSet::new(ABS_CNT);
        for axis in 0..ABS_CNT {
            if self.device.has_event_code(&code(EV_ABS, axis as u16)) {
                bits.set(axis);
            }
        }
        Ok(bits)
    }

    fn key_bits(&self) -> io::Result<BitSet> {
        let mut bits = BitSet::new(KEY_CNT);
        for key in 0..KEY_CNT {
            if self.device.has_event_code(&code(EV_KEY, key as u16)) {
                bits.set(key);
            }
        }
        Ok(bits)
    }

    fn property_bits(&self) -> io::Result<BitSet> {
        let mut bits = BitSet::new(INPUT_PROP_CNT);
        for (index, prop) in INPUT_PROPS {
            if self.device.has_property(prop) {
                bits.set(*index as usize);
            }
        }
        Ok(bits)
    }

    fn abs_info(&self, axis: u16) -> io::Result<AxisInfo> {
        let info = self.device.abs_info(&code(EV_ABS, axis)).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no absinfo for axis {axis:#x}"))
        })?;
        Ok(AxisInfo {
            value: info.value,
            minimum: info.minimum,
            maximum: info.maximum,
            fuzz: info.fuzz,
            flat: info.flat,
            resolution: info.resolution,
        })
    }

    fn identity(&self) -> io::Result<DeviceIdentity> {
        Ok(DeviceIdentity {
            bus_type: self.device.bustype(),
            vendor: self.device.vendor_id(),
            product: self.device.product_id(),
            version: self.device.version(),
        })
    }

    fn name(&self) -> io::Result<String> {
        Ok(self.device.name().unwrap_or_default().to_string())
    }

    fn phys(&self) -> io::Result<String> {
        Ok(self.device.phys().unwrap_or_default().to_string())
    }

    fn driver_version(&self) -> io::Result<i32> {
        Ok(self.device.driver_version())
    }
}

/// 被转发的物理触摸屏
pub struct EvdevPhysical {
    device: Device,
    /// 和 `device` 共享同一个打开的文件, 只用来 poll
    readable: File,
    /// 唤醒管道的读端, 可读即表示读取被打断
    wake: OwnedFd,
    waker: File,
    resyncing: bool,
}

impl EvdevPhysical {
    /// 等到设备可读, 或者被唤醒
    fn wait(&self) -> io::Result<()> {
        let mut fds = [
            PollFd::new(self.readable.as_fd(), PollFlags::POLLIN),
            PollFd::new(self.wake.as_fd(), PollFlags::POLLIN),
        ];
        loop {
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if fds[1].revents().is_some_and(|events| !events.is_empty()) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "read interrupted"));
        }
        Ok(())
    }
}

impl PhysicalDevice for EvdevPhysical {
    type Interrupt = EvdevInterrupt;

    fn next_event(&mut self) -> io::Result<RawEvent> {
        loop {
            let flags = if self.resyncing {
                ReadFlag::SYNC
            } else {
                ReadFlag::NORMAL
            };
            match self.device.next_event(flags) {
                Ok((status, event)) => {
                    // SYN_DROPPED 之后 libevdev 会补发缺失的状态
                    self.resyncing = matches!(status, ReadStatus::Sync);
                    let (kind, code) = event_code_to_int(&event.event_code);
                    return Ok(RawEvent::new(kind as u16, code as u16, event.value));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if self.resyncing {
                        trace!("resync finished");
                        self.resyncing = false;
                        continue;
                    }
                    self.wait()?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn interrupt_handle(&self) -> io::Result<EvdevInterrupt> {
        Ok(EvdevInterrupt {
            waker: self.waker.try_clone()?,
        })
    }

    fn grab(&mut self) -> io::Result<()> {
        self.device.grab(GrabMode::Grab)
    }

    fn ungrab(&mut self) -> io::Result<()> {
        self.device.grab(GrabMode::Ungrab)
    }
}

/// 唤醒管道的写端
pub struct EvdevInterrupt {
    waker: File,
}

impl ReadInterrupt for EvdevInterrupt {
    fn interrupt(&self) -> io::Result<()> {
        (&self.waker).write_all(&[1])
    }
}

/// 注册到内核的虚拟触摸屏
pub struct EvdevVirtual {
    device: UInputDevice,
}

impl VirtualDevice for EvdevVirtual {
    fn emit(&mut self, events: &[RawEvent]) -> io::Result<()> {
        let time = TimeVal::new(0, 0);
        for event in events {
            let input = InputEvent::new(&time, &code(event.kind, event.code), event.value);
            self.device.write_event(&input)?;
        }
        Ok(())
    }

    fn devnode(&self) -> Option<PathBuf> {
        self.device.devnode().map(PathBuf::from)
    }
}
