//! 基于 libusb 的传输实现
//!
//! HID 的控制请求见 <https://www.usb.org/sites/default/files/hid1_11.pdf> 7.2 节

use std::time::Duration;

use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType, UsbContext};
use tracing::{debug, info, trace, warn};

use super::{DeviceMatch, PollOutcome, ReportLink, UsbBackend};
use crate::event_model::{REPORT_BUFFER_SIZE, RawReport};
use crate::session::error::{FatalError, OpenError, TransferFault};
use crate::session::flags::ControlFlags;
use crate::tablet_driver::{ProfileRegistry, UsbSignature};

const HID_SET_REQUEST_TYPE: u8 =
    rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface);
const HID_SET_IDLE: u8 = 0x0a;
const HID_SET_PROTOCOL: u8 = 0x0b;
const HID_PROTOCOL_REPORT: u16 = 1;
/// 高字节为 0 表示无限长的 idle
const HID_IDLE_INDEFINITE: u16 = 0 << 8;
const HID_TIMEOUT: Duration = Duration::from_secs(1);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct RusbBackend {
    context: Context,
    poll_interval: Duration,
}

impl RusbBackend {
    pub fn new(poll_interval: Duration) -> Result<Self, FatalError> {
        let context = Context::new().map_err(FatalError::Usb)?;
        Ok(Self {
            context,
            poll_interval,
        })
    }
}

impl UsbBackend for RusbBackend {
    type Link = UsbLink;

    fn scan(&mut self, registry: &ProfileRegistry) -> Option<DeviceMatch> {
        let devices = match self.context.devices() {
            Ok(devices) => devices,
            Err(error) => {
                warn!(%error, "cannot retrieve connected devices");
                return None;
            }
        };

        devices.iter().find_map(|device| {
            let descriptor = device.device_descriptor().ok()?;
            let signature = UsbSignature::new(descriptor.vendor_id(), descriptor.product_id());
            let profile = registry.lookup(signature)?;
            Some(DeviceMatch {
                signature,
                profile,
                bus: device.bus_number(),
                address: device.address(),
            })
        })
    }

    fn open(&mut self, found: &DeviceMatch) -> Result<UsbLink, OpenError> {
        let devices = self
            .context
            .devices()
            .map_err(|source| unavailable("retrieve connected devices", source))?;
        let device = devices
            .iter()
            .find(|d| d.bus_number() == found.bus && d.address() == found.address)
            .ok_or_else(|| unavailable("find device", rusb::Error::NoDevice))?;

        let handle = device
            .open()
            .map_err(|source| classify(source, None, "open device"))?;

        let mut link = UsbLink {
            handle,
            interfaces: Vec::with_capacity(found.profile.interfaces.len()),
            endpoint: found.profile.endpoint,
            buffer: [0; REPORT_BUFFER_SIZE],
            poll_interval: self.poll_interval,
        };
        for &number in found.profile.interfaces {
            link.claim(number)?;
        }
        info!(device = %found.signature, profile = found.profile.name, "device opened");
        Ok(link)
    }
}

#[derive(Debug, Clone, Copy)]
struct InterfaceStatus {
    number: u8,
    claimed: bool,
    detached_from_kernel: bool,
}

pub struct UsbLink {
    handle: DeviceHandle<Context>,
    interfaces: Vec<InterfaceStatus>,
    endpoint: u8,
    buffer: [u8; REPORT_BUFFER_SIZE],
    poll_interval: Duration,
}

impl UsbLink {
    fn claim(&mut self, number: u8) -> Result<(), OpenError> {
        let detached_from_kernel = match self.handle.kernel_driver_active(number) {
            Ok(true) => {
                self.handle
                    .detach_kernel_driver(number)
                    .map_err(|source| classify(source, Some(number), "detach kernel driver"))?;
                true
            }
            Ok(false) | Err(rusb::Error::NotSupported) | Err(rusb::Error::NotFound) => false,
            Err(source) => return Err(classify(source, Some(number), "query kernel driver")),
        };
        self.interfaces.push(InterfaceStatus {
            number,
            claimed: false,
            detached_from_kernel,
        });

        self.handle
            .claim_interface(number)
            .map_err(|source| classify(source, Some(number), "claim interface"))?;
        if let Some(status) = self.interfaces.last_mut() {
            status.claimed = true;
        }
        debug!(interface = number, detached_from_kernel, "interface claimed");
        Ok(())
    }

    fn hid_request(&self, request: u8, value: u16, interface: u8) -> Result<(), OpenError> {
        match self.handle.write_control(
            HID_SET_REQUEST_TYPE,
            request,
            value,
            interface as u16,
            &[],
            HID_TIMEOUT,
        ) {
            Ok(_) => Ok(()),
            // 不支持该请求的设备会直接 STALL, 不影响后续读取
            Err(rusb::Error::Pipe) => {
                warn!(interface, request, "hid request stalled, ignoring");
                Ok(())
            }
            Err(source) => Err(control_error(source, interface)),
        }
    }
}

impl ReportLink for UsbLink {
    fn configure(&mut self) -> Result<(), OpenError> {
        let numbers: Vec<u8> = self.interfaces.iter().map(|i| i.number).collect();
        for interface in numbers {
            self.hid_request(HID_SET_PROTOCOL, HID_PROTOCOL_REPORT, interface)?;
            self.hid_request(HID_SET_IDLE, HID_IDLE_INDEFINITE, interface)?;
            debug!(interface, "interface set to report protocol");
        }
        Ok(())
    }

    fn poll(&mut self, flags: &ControlFlags) -> PollOutcome {
        if flags.should_close() {
            return PollOutcome::Cancelled;
        }
        match self
            .handle
            .read_interrupt(self.endpoint, &mut self.buffer, self.poll_interval)
        {
            Ok(len) => {
                let report = RawReport::new(&self.buffer[..len]);
                trace!(?report, "report received");
                PollOutcome::Completed(report)
            }
            Err(rusb::Error::Timeout) | Err(rusb::Error::Interrupted) => PollOutcome::Idle,
            Err(error) => transfer_outcome(error),
        }
    }
}

impl Drop for UsbLink {
    fn drop(&mut self) {
        for status in std::mem::take(&mut self.interfaces).into_iter().rev() {
            if status.claimed {
                if let Err(error) = self.handle.release_interface(status.number) {
                    debug!(interface = status.number, %error, "cannot release interface");
                }
            }
            if status.detached_from_kernel {
                if let Err(error) = self.handle.attach_kernel_driver(status.number) {
                    debug!(interface = status.number, %error, "cannot reattach kernel driver");
                }
            }
        }
        debug!("usb handle released");
    }
}

/// 读取错误到会话错误的映射
pub fn transfer_outcome(error: rusb::Error) -> PollOutcome {
    match error {
        rusb::Error::Pipe => PollOutcome::Recoverable(TransferFault::Stall),
        rusb::Error::Overflow => PollOutcome::Recoverable(TransferFault::Overflow),
        rusb::Error::NoDevice => PollOutcome::Recoverable(TransferFault::Disconnected),
        rusb::Error::NoMem => PollOutcome::Fatal(FatalError::Allocation("usb transfer")),
        _ => PollOutcome::Recoverable(TransferFault::Error),
    }
}

/// 控制传输超时属于可恢复的传输错误, 其余按打开失败处理
fn control_error(source: rusb::Error, interface: u8) -> OpenError {
    match source {
        rusb::Error::Timeout => OpenError::Transfer {
            interface,
            fault: TransferFault::TimedOut,
        },
        source => classify(source, Some(interface), "configure interface"),
    }
}

fn classify(source: rusb::Error, interface: Option<u8>, action: &'static str) -> OpenError {
    match source {
        rusb::Error::Access => OpenError::Permission { interface, source },
        source => unavailable(action, source),
    }
}

fn unavailable(action: &'static str, source: rusb::Error) -> OpenError {
    OpenError::Unavailable { action, source }
}
