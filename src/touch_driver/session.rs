use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use crate::event_dispatcher::FrameSynchronizer;
use crate::event_model::{ContactRecord, ContactTable};
use crate::input_devices::{DeviceCapabilities, VirtualDevice};

struct SessionState<V> {
    contacts: ContactTable,
    frames: FrameSynchronizer,
    sink: Option<V>,
}

impl<V: VirtualDevice> SessionState<V> {
    fn synchronize(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            self.frames.sync(&self.contacts, sink);
        }
    }
}

/// 一次启动到停止之间共享的状态
///
/// 触点表, 按键状态和虚拟设备都放在同一把锁后面:
/// 修改触点和随后的整帧写出在一次持锁内完成, 不同来源的写出不会交错
pub struct TouchSession<V> {
    device: DeviceCapabilities,
    state: Mutex<SessionState<V>>,
    injecting: AtomicBool,
    stop: AtomicBool,
}

impl<V: VirtualDevice> TouchSession<V> {
    pub fn new(device: DeviceCapabilities, sink: V) -> Self {
        Self {
            state: Mutex::new(SessionState {
                contacts: ContactTable::new(device.slot_count),
                frames: FrameSynchronizer::default(),
                sink: Some(sink),
            }),
            device,
            injecting: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn device(&self) -> &DeviceCapabilities {
        &self.device
    }

    /// 持锁修改触点表, `f` 返回 `true` 时在同一次持锁内写出一帧
    pub fn update(&self, f: impl FnOnce(&mut ContactTable) -> bool) {
        let mut state = self.lock();
        if f(&mut state.contacts) {
            state.synchronize();
        }
    }

    /// 清空所有触点并写出一帧, 按键按下时这一帧会带上抬起
    pub fn reset(&self) {
        self.injecting.store(false, Ordering::SeqCst);
        self.update(|contacts| {
            contacts.clear_all();
            true
        });
    }

    /// 把合成触点移到原始坐标 `(x, y)`
    pub fn inject_move(&self, x: i32, y: i32) {
        self.injecting.store(true, Ordering::SeqCst);
        self.update(|contacts| {
            contacts.set_synthetic(ContactRecord::at(x, y));
            true
        });
    }

    /// 抬起合成触点, 之前没有注入过时什么都不做
    pub fn inject_up(&self) {
        if !self.injecting.swap(false, Ordering::SeqCst) {
            return;
        }
        self.update(|contacts| {
            contacts.set_synthetic(ContactRecord::SENTINEL);
            true
        });
    }

    pub fn is_injecting(&self) -> bool {
        self.injecting.load(Ordering::SeqCst)
    }

    pub fn contacts(&self) -> Vec<ContactRecord> {
        self.lock().contacts.records().to_vec()
    }

    pub fn button_down(&self) -> bool {
        self.lock().frames.button_down()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// 取出虚拟设备, 之后的同步都不再写出
    pub fn release_sink(&self) -> Option<V> {
        self.lock().sink.take()
    }
}
