use std::sync::atomic::{AtomicBool, Ordering};

/// 信号处理和工作线程之间共享的标志位
///
/// 信号处理只允许调用这里的方法, 不能碰设备句柄
#[derive(Debug, Default)]
pub struct ControlFlags {
    should_close: AtomicBool,
    should_reset: AtomicBool,
    should_use_config: AtomicBool,
}

impl ControlFlags {
    pub fn new(reset_on_disconnect: bool) -> Self {
        let flags = Self::default();
        flags.set_should_reset(reset_on_disconnect);
        flags
    }

    pub fn should_close(&self) -> bool {
        self.should_close.load(Ordering::Acquire)
    }

    pub fn set_should_close(&self, value: bool) {
        self.should_close.store(value, Ordering::Release);
    }

    pub fn should_reset(&self) -> bool {
        self.should_reset.load(Ordering::Acquire)
    }

    pub fn set_should_reset(&self, value: bool) {
        self.should_reset.store(value, Ordering::Release);
    }

    pub fn should_use_config(&self) -> bool {
        self.should_use_config.load(Ordering::Acquire)
    }

    pub fn set_should_use_config(&self, value: bool) {
        self.should_use_config.store(value, Ordering::Release);
    }

    /// 收到终止信号: 停止并且不再重新扫描
    ///
    /// 正在进行的读取会在下一次轮询时被取消
    pub fn request_shutdown(&self) {
        self.set_should_reset(false);
        self.set_should_close(true);
    }
}
