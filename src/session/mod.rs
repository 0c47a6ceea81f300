//! 会话的生命周期
//!
//! ```text
//! Scanning -> Opening -> Configuring -> Streaming -> Teardown -> Scanning | Terminated
//! ```
//!
//! 任何状态出错都会先经过 Teardown, 设备句柄和虚拟设备在那里统一释放

pub mod error;
pub mod flags;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::event_dispatcher::capability::{IdentityMode, SinkClass, VirtualIdentity};
use crate::event_dispatcher::sink::{SinkFactory, VirtualDeviceSet};
use crate::event_dispatcher::{EventDispatcher, FeatureToggles, Tracking};
use crate::event_router::ButtonBindingTable;
use crate::input_devices::{DeviceMatch, PollOutcome, ReportLink, UsbBackend};
use crate::tablet_driver::cursor::{CursorEmulator, DEFAULT_CURSOR_SPEED};
use crate::tablet_driver::{DeviceProfile, ProfileRegistry};

use error::{FatalError, OpenError, TransferFault};
use flags::ControlFlags;

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Scanning,
    Opening,
    Configuring,
    Streaming,
    Teardown,
    Terminated,
}

/// 会话结束的原因, 决定 Teardown 之后去哪里
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// 打开或配置失败, 重新扫描
    Reopen,
    Fault(TransferFault),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub toggles: FeatureToggles,
    pub identity: IdentityMode,
    pub cursor_speed: i32,
    pub scan_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            toggles: FeatureToggles::default(),
            identity: IdentityMode::default(),
            cursor_speed: DEFAULT_CURSOR_SPEED,
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }
}

/// 驱动一个物理设备从发现到释放的状态机
///
/// 所有设备资源只由这里持有, 信号处理只通过 [`ControlFlags`] 影响它
pub struct Session<B: UsbBackend, F: SinkFactory> {
    backend: B,
    factory: F,
    registry: ProfileRegistry,
    options: SessionOptions,
    bindings: Arc<ButtonBindingTable>,
    flags: Arc<ControlFlags>,

    state: SessionState,
    end: Option<SessionEnd>,
    found: Option<DeviceMatch>,
    link: Option<B::Link>,
    sinks: VirtualDeviceSet,
    dispatcher: Option<EventDispatcher>,
    tracking: Tracking,
}

impl<B: UsbBackend, F: SinkFactory> Session<B, F> {
    pub fn new(
        backend: B,
        factory: F,
        options: SessionOptions,
        bindings: Arc<ButtonBindingTable>,
        flags: Arc<ControlFlags>,
    ) -> Self {
        Self {
            backend,
            factory,
            registry: ProfileRegistry::builtin(),
            options,
            bindings,
            flags,
            state: SessionState::Scanning,
            end: None,
            found: None,
            link: None,
            sinks: VirtualDeviceSet::default(),
            dispatcher: None,
            tracking: Tracking::default(),
        }
    }

    pub fn with_registry(mut self, registry: ProfileRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn tracking(&self) -> &Tracking {
        &self.tracking
    }

    pub fn sinks(&self) -> &VirtualDeviceSet {
        &self.sinks
    }

    /// 一直运行到 Terminated 或者出现致命错误
    pub fn run(&mut self) -> Result<(), FatalError> {
        info!("waiting for a supported tablet");
        while self.step()? != SessionState::Terminated {}
        info!("session terminated");
        Ok(())
    }

    /// 执行当前状态的一步, Streaming 状态下每一步处理一次轮询
    pub fn step(&mut self) -> Result<SessionState, FatalError> {
        let previous = self.state;
        let next = match self.advance() {
            Ok(next) => next,
            Err(fatal) => {
                error!(state = ?previous, error = %fatal, "fatal error");
                self.release();
                self.state = SessionState::Terminated;
                return Err(fatal);
            }
        };
        if next != previous {
            debug!(from = ?previous, to = ?next, "session state changed");
        }
        self.state = next;
        Ok(next)
    }

    fn advance(&mut self) -> Result<SessionState, FatalError> {
        match self.state {
            SessionState::Scanning => Ok(self.scan()),
            SessionState::Opening => self.open(),
            SessionState::Configuring => self.configure(),
            SessionState::Streaming => self.stream(),
            SessionState::Teardown => Ok(self.teardown()),
            SessionState::Terminated => Ok(SessionState::Terminated),
        }
    }

    fn scan(&mut self) -> SessionState {
        if self.flags.should_close() {
            return SessionState::Terminated;
        }
        match self.backend.scan(&self.registry) {
            Some(found) => {
                info!(device = %found.signature, profile = found.profile.name, "tablet found");
                self.found = Some(found);
                SessionState::Opening
            }
            None => {
                thread::sleep(self.options.scan_interval);
                SessionState::Scanning
            }
        }
    }

    fn open(&mut self) -> Result<SessionState, FatalError> {
        let Some(found) = self.found else {
            return Ok(SessionState::Scanning);
        };
        match self.backend.open(&found) {
            Ok(link) => {
                self.link = Some(link);
                Ok(SessionState::Configuring)
            }
            Err(failure) => self.open_failed(failure),
        }
    }

    fn configure(&mut self) -> Result<SessionState, FatalError> {
        let (Some(found), Some(link)) = (self.found, self.link.as_mut()) else {
            self.end = Some(SessionEnd::Reopen);
            return Ok(SessionState::Teardown);
        };
        if let Err(failure) = link.configure() {
            return self.open_failed(failure);
        }

        self.create_sinks(found.profile)?;

        let cursor = CursorEmulator::new(self.options.cursor_speed, found.profile.max_pos);
        self.dispatcher = Some(EventDispatcher::new(
            self.options.toggles,
            cursor,
            Arc::clone(&self.bindings),
            Arc::clone(&self.flags),
        ));
        self.tracking = Tracking::default();

        info!(device = %found.signature, "streaming reports");
        Ok(SessionState::Streaming)
    }

    fn stream(&mut self) -> Result<SessionState, FatalError> {
        let (Some(found), Some(link)) = (self.found, self.link.as_mut()) else {
            self.end = Some(SessionEnd::Reopen);
            return Ok(SessionState::Teardown);
        };
        match link.poll(&self.flags) {
            PollOutcome::Completed(report) => {
                if let Some(dispatcher) = self.dispatcher.as_ref() {
                    let event = found.profile.decode(&report);
                    dispatcher.dispatch(&event, &mut self.tracking, &mut self.sinks);
                }
                Ok(SessionState::Streaming)
            }
            PollOutcome::Idle => Ok(SessionState::Streaming),
            PollOutcome::Recoverable(fault) => {
                warn!(
                    device = %found.signature,
                    endpoint = found.profile.endpoint,
                    %fault,
                    "interrupt transfer failed, closing session"
                );
                self.end = Some(SessionEnd::Fault(fault));
                Ok(SessionState::Teardown)
            }
            PollOutcome::Fatal(fatal) => Err(fatal),
            PollOutcome::Cancelled => {
                info!("shutdown requested");
                self.end = Some(SessionEnd::Cancelled);
                Ok(SessionState::Teardown)
            }
        }
    }

    fn teardown(&mut self) -> SessionState {
        self.release();
        match self.end.take() {
            _ if self.flags.should_close() => SessionState::Terminated,
            Some(SessionEnd::Reopen) => {
                thread::sleep(self.options.scan_interval);
                SessionState::Scanning
            }
            Some(SessionEnd::Fault(fault)) if self.flags.should_reset() => {
                info!(%fault, "reset on disconnect enabled, scanning again");
                SessionState::Scanning
            }
            Some(SessionEnd::Fault(_)) | Some(SessionEnd::Cancelled) | None => {
                SessionState::Terminated
            }
        }
    }

    fn open_failed(&mut self, failure: OpenError) -> Result<SessionState, FatalError> {
        match failure {
            OpenError::Permission { .. } => Err(FatalError::Permission(failure)),
            // 控制传输超时和读取出错一样, 是否重新扫描取决于 reset 标志
            OpenError::Transfer { interface, fault } => {
                warn!(interface, %fault, "control transfer failed, closing session");
                self.end = Some(SessionEnd::Fault(fault));
                Ok(SessionState::Teardown)
            }
            OpenError::Unavailable { .. } => {
                warn!(error = %failure, "cannot open tablet, scanning again");
                self.end = Some(SessionEnd::Reopen);
                Ok(SessionState::Teardown)
            }
        }
    }

    /// 数位板和笔是必需的, 鼠标和键盘创建失败只会关闭对应的功能
    fn create_sinks(&mut self, profile: &'static DeviceProfile) -> Result<(), FatalError> {
        let toggles = self.options.toggles;
        let mut classes = vec![SinkClass::Pad, SinkClass::Pen];
        if toggles.needs_mouse() {
            classes.push(SinkClass::Mouse);
        }
        if toggles.needs_keyboard() {
            classes.push(SinkClass::Keyboard);
        }

        for class in classes {
            let identity = VirtualIdentity::for_class(class, self.options.identity);
            let capabilities = profile.capabilities(class);
            match self.factory.create(class, &identity, &capabilities) {
                Ok(sink) => {
                    debug!(sink = %class, name = %identity.name, "virtual device created");
                    self.sinks.insert(class, sink);
                }
                Err(source) if matches!(class, SinkClass::Pad | SinkClass::Pen) => {
                    return Err(FatalError::VirtualDevice { class, source });
                }
                Err(error) => {
                    warn!(sink = %class, %error, "cannot create virtual device, feature disabled");
                }
            }
        }
        Ok(())
    }

    /// 释放当前会话的全部资源, 可以重复调用
    fn release(&mut self) {
        if self.link.take().is_some() {
            debug!("device handle closed");
        }
        self.sinks.clear();
        self.dispatcher = None;
        self.tracking = Tracking::default();
        self.found = None;
    }
}

impl<B: UsbBackend, F: SinkFactory> Drop for Session<B, F> {
    fn drop(&mut self) {
        self.release();
    }
}
