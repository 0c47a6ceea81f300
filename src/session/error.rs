use std::io;

use thiserror::Error;

use crate::event_dispatcher::capability::SinkClass;

/// 传输过程中的可恢复错误, 会话会被拆除, 之后重新扫描或退出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransferFault {
    #[error("interrupt transfer failed")]
    Error,
    #[error("interrupt transfer timed out")]
    TimedOut,
    #[error("interrupt transfer halted (endpoint stalled)")]
    Stall,
    #[error("device was disconnected")]
    Disconnected,
    #[error("interrupt transfer overflowed (device sent more data than requested)")]
    Overflow,
}

/// 打开或配置设备失败
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("permission denied on interface {interface:?}, are you running as root?")]
    Permission {
        interface: Option<u8>,
        #[source]
        source: rusb::Error,
    },
    #[error("control transfer on interface {interface} failed")]
    Transfer {
        interface: u8,
        #[source]
        fault: TransferFault,
    },
    #[error("cannot {action}")]
    Unavailable {
        action: &'static str,
        #[source]
        source: rusb::Error,
    },
}

/// 无法继续运行, 进程以非零状态退出
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("insufficient permission to claim the device")]
    Permission(#[source] OpenError),
    #[error("cannot allocate {0}")]
    Allocation(&'static str),
    #[error("cannot create virtual {class} device")]
    VirtualDevice {
        class: SinkClass,
        #[source]
        source: io::Error,
    },
    #[error("usb event handling error")]
    Usb(#[source] rusb::Error),
}
