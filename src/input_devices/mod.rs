pub mod usb;

use std::fmt;

use crate::event_model::RawReport;
use crate::session::error::{FatalError, OpenError, TransferFault};
use crate::session::flags::ControlFlags;
use crate::tablet_driver::{DeviceProfile, ProfileRegistry, UsbSignature};

/// 扫描到的受支持设备
#[derive(Clone, Copy)]
pub struct DeviceMatch {
    pub signature: UsbSignature,
    pub profile: &'static DeviceProfile,
    pub bus: u8,
    pub address: u8,
}

impl fmt::Debug for DeviceMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceMatch")
            .field("signature", &format_args!("{}", self.signature))
            .field("profile", &self.profile.name)
            .field("bus", &self.bus)
            .field("address", &self.address)
            .finish()
    }
}

/// 一次轮询的结果
#[derive(Debug)]
pub enum PollOutcome {
    Completed(RawReport),
    /// 轮询间隔内没有数据
    Idle,
    Recoverable(TransferFault),
    Fatal(FatalError),
    /// 收到了终止请求
    Cancelled,
}

/// 已经独占的设备连接
///
/// 连接被丢弃时释放接口并把内核驱动挂回去
pub trait ReportLink {
    /// 把所有接口切换到 report protocol, idle 设为无限
    fn configure(&mut self) -> Result<(), OpenError>;

    /// 读取一个报告, 最多阻塞一个轮询间隔
    fn poll(&mut self, flags: &ControlFlags) -> PollOutcome;
}

/// 物理设备的发现与打开
pub trait UsbBackend {
    type Link: ReportLink;

    fn scan(&mut self, registry: &ProfileRegistry) -> Option<DeviceMatch>;

    fn open(&mut self, found: &DeviceMatch) -> Result<Self::Link, OpenError>;
}
