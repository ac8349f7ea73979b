/// 滑动手势回放
pub mod gesture;

/// 启动到停止之间共享的触点表
pub mod session;

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::error::TouchError;
use crate::event_dispatcher::{Synthesized, synthesize};
use crate::event_model::ContactRecord;
use crate::event_router::EventReader;
use crate::input_devices::{
    DeviceBackend, DeviceCapabilities, PhysicalDevice, ReadInterrupt, SelectionPolicy, discover,
};
use session::TouchSession;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopping,
}

/// 逻辑显示分辨率, 注入坐标以它为准
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayResolution {
    pub width: i32,
    pub height: i32,
}

impl DisplayResolution {
    pub fn new(width: i32, height: i32) -> Result<Self, TouchError> {
        if width <= 0 || height <= 0 {
            return Err(TouchError::InvalidResolution { width, height });
        }
        Ok(Self { width, height })
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub selection: SelectionPolicy,
    /// 注册虚拟设备之后, 独占物理设备之前的等待
    pub settle_delay: Duration,
    /// 停止时等待读取线程退出的上限
    pub stop_grace: Duration,
    pub report_probe_failures: bool,
    pub display: Option<DisplayResolution>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            selection: SelectionPolicy::default(),
            settle_delay: Duration::from_millis(200),
            stop_grace: Duration::from_millis(60),
            report_probe_failures: false,
            display: None,
        }
    }
}

type Interrupt<B> = <<B as DeviceBackend>::Physical as PhysicalDevice>::Interrupt;

struct ReaderHandle<I> {
    thread: thread::JoinHandle<()>,
    exited: oneshot::Receiver<()>,
    interrupt: I,
}

/// 触摸屏虚拟化引擎
///
/// `start` 找到触摸屏, 创建虚拟设备并开始转发; 期间可以随时注入一个合成触点.
/// `stop` 清空所有触点后释放两个设备
pub struct TouchEngine<B: DeviceBackend> {
    backend: B,
    config: EngineConfig,
    state: Mutex<EngineState>,
    display: Mutex<Option<DisplayResolution>>,
    session: Mutex<Option<Arc<TouchSession<B::Virtual>>>>,
    /// 同时也是生命周期锁, `start` / `stop` 全程持有
    reader: tokio::sync::Mutex<Option<ReaderHandle<Interrupt<B>>>>,
}

impl<B: DeviceBackend> TouchEngine<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self {
            backend,
            display: Mutex::new(config.display),
            config,
            state: Mutex::new(EngineState::Idle),
            session: Mutex::new(None),
            reader: tokio::sync::Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> EngineState {
        *lock(&self.state)
    }

    fn set_state(&self, state: EngineState) {
        *lock(&self.state) = state;
    }

    fn current(&self) -> Option<Arc<TouchSession<B::Virtual>>> {
        lock(&self.session).clone()
    }

    /// 正在转发的物理设备
    pub fn active_device(&self) -> Option<DeviceCapabilities> {
        self.current().map(|session| session.device().clone())
    }

    /// 当前触点表的快照, 最后一项是合成触点
    pub fn contacts(&self) -> Option<Vec<ContactRecord>> {
        self.current().map(|session| session.contacts())
    }

    pub fn display_resolution(&self) -> Option<DisplayResolution> {
        *lock(&self.display)
    }

    pub fn set_display_resolution(&self, width: i32, height: i32) -> Result<(), TouchError> {
        let display = DisplayResolution::new(width, height)?;
        *lock(&self.display) = Some(display);
        debug!("display resolution set to {width}x{height}");
        Ok(())
    }

    pub async fn start(&self) -> Result<(), TouchError> {
        let mut reader = self.reader.lock().await;
        if self.state() != EngineState::Idle {
            debug!("touch engine already started");
            return Ok(());
        }

        let (session, handle) = self.launch().await.inspect_err(|e| {
            error!("failed to start touch engine: {e}");
        })?;

        *reader = Some(handle);
        *lock(&self.session) = Some(session);
        self.set_state(EngineState::Running);
        info!("touch engine running");
        Ok(())
    }

    async fn launch(
        &self,
    ) -> Result<(Arc<TouchSession<B::Virtual>>, ReaderHandle<Interrupt<B>>), TouchError> {
        let devices =
            discover(&self.backend, self.config.report_probe_failures).map_err(TouchError::Enumerate)?;
        let caps = self
            .config
            .selection
            .select(&devices)
            .cloned()
            .ok_or(TouchError::DiscoveryEmpty)?;
        info!(
            "selected {} ({:?}) out of {} touchscreens",
            caps.path.display(),
            caps.name,
            devices.len()
        );

        let Synthesized { physical, sink, .. } =
            synthesize(&self.backend, &caps, self.config.settle_delay).await?;

        let interrupt = physical
            .interrupt_handle()
            .map_err(TouchError::ReaderSpawnFailed)?;
        let session = Arc::new(TouchSession::new(caps, sink));
        session.reset();

        let (exit_tx, exited) = oneshot::channel();
        let worker = Arc::clone(&session);
        let thread = thread::Builder::new()
            .name("touch-reader".into())
            .spawn(move || {
                EventReader::new().run(physical, &worker);
                let _ = exit_tx.send(());
            })
            .map_err(TouchError::ReaderSpawnFailed)?;

        Ok((
            session,
            ReaderHandle {
                thread,
                exited,
                interrupt,
            },
        ))
    }

    pub async fn stop(&self) {
        let mut reader = self.reader.lock().await;
        if self.state() != EngineState::Running {
            return;
        }
        self.set_state(EngineState::Stopping);

        let session = lock(&self.session).take();
        if let Some(session) = session {
            session.reset();
            session.request_stop();

            if let Some(ReaderHandle {
                thread,
                exited,
                interrupt,
            }) = reader.take()
            {
                // 读取线程可能正阻塞在空闲的设备上
                if let Err(e) = interrupt.interrupt() {
                    warn!("failed to interrupt event reader: {e}");
                }
                match tokio::time::timeout(self.config.stop_grace, exited).await {
                    Ok(_) => {
                        if thread.join().is_err() {
                            warn!("event reader panicked");
                        }
                    }
                    Err(_) => warn!(
                        "event reader still running after {:?}, touch device stays grabbed until it exits",
                        self.config.stop_grace
                    ),
                }
            }
            drop(session.release_sink());
        }

        self.set_state(EngineState::Idle);
        info!("touch engine stopped");
    }

    /// 把合成触点移到逻辑坐标 `(x, y)`, 引擎未运行时什么都不做
    pub fn inject_move(&self, x: i32, y: i32) {
        let Some(session) = self.current() else {
            return;
        };
        let Some(display) = self.display_resolution() else {
            warn!("inject_move ignored: display resolution is not set");
            return;
        };
        let (raw_x, raw_y) = session
            .device()
            .touch_range()
            .scale(x, y, display.width, display.height);
        session.inject_move(raw_x, raw_y);
    }

    /// 抬起合成触点
    pub fn inject_up(&self) {
        if let Some(session) = self.current() {
            session.inject_up();
        }
    }

    /// 清空所有触点
    pub fn reset(&self) {
        if let Some(session) = self.current() {
            session.reset();
        }
    }
}
