use std::io;

use evdev_rs::enums::{BusType, EV_ABS, EV_KEY, EV_MSC, EV_REL, EV_SYN, EventCode, EventType};
use evdev_rs::{
    AbsInfo, DeviceWrapper, EnableCodeData, InputEvent, TimeVal, UInputDevice, UninitDevice,
};
use tracing::debug;

use super::capability::{SinkCapabilities, SinkClass, VirtualIdentity};
use super::sink::{SinkFactory, VirtualSink};

/// 通过 `/dev/uinput` 创建的虚拟设备
pub struct UinputSink {
    device: UInputDevice,
}

impl UinputSink {
    pub fn create(identity: &VirtualIdentity, capabilities: &SinkCapabilities) -> io::Result<Self> {
        let device = UninitDevice::new()
            .ok_or_else(|| io::Error::new(io::ErrorKind::OutOfMemory, "libevdev_new failed"))?;

        device.set_name(&identity.name);
        device.set_bustype(BusType::BUS_USB as u16);
        device.set_vendor_id(identity.vendor);
        device.set_product_id(identity.product);
        device.set_version(identity.version);

        device.enable_event_type(&EventType::EV_SYN)?;
        device.enable_event_code(&EventCode::EV_SYN(EV_SYN::SYN_REPORT), None)?;

        if !capabilities.keys.is_empty() {
            device.enable_event_type(&EventType::EV_KEY)?;
            for key in &capabilities.keys {
                device.enable_event_code(&EventCode::EV_KEY(*key), None)?;
            }
        }
        if !capabilities.abs.is_empty() {
            device.enable_event_type(&EventType::EV_ABS)?;
            for (axis, range) in &capabilities.abs {
                let info = AbsInfo {
                    value: 0,
                    minimum: range.min,
                    maximum: range.max,
                    fuzz: 0,
                    flat: 0,
                    resolution: range.resolution,
                };
                device.enable_event_code(
                    &EventCode::EV_ABS(*axis),
                    Some(EnableCodeData::AbsInfo(info)),
                )?;
            }
        }
        if !capabilities.rel.is_empty() {
            device.enable_event_type(&EventType::EV_REL)?;
            for axis in &capabilities.rel {
                device.enable_event_code(&EventCode::EV_REL(*axis), None)?;
            }
        }
        if !capabilities.msc.is_empty() {
            device.enable_event_type(&EventType::EV_MSC)?;
            for code in &capabilities.msc {
                device.enable_event_code(&EventCode::EV_MSC(*code), None)?;
            }
        }

        let device = UInputDevice::create_from_device(&device)?;
        debug!(name = %identity.name, devnode = ?device.devnode(), "uinput device created");
        Ok(Self { device })
    }

    fn write(&mut self, code: EventCode, value: i32) -> io::Result<()> {
        self.device
            .write_event(&InputEvent::new(&TimeVal::new(0, 0), &code, value))
    }
}

impl VirtualSink for UinputSink {
    fn write_abs(&mut self, code: EV_ABS, value: i32) -> io::Result<()> {
        self.write(EventCode::EV_ABS(code), value)
    }

    fn write_key(&mut self, code: EV_KEY, down: bool) -> io::Result<()> {
        self.write(EventCode::EV_KEY(code), down as i32)
    }

    fn write_rel(&mut self, code: EV_REL, delta: i32) -> io::Result<()> {
        self.write(EventCode::EV_REL(code), delta)
    }

    fn write_msc(&mut self, code: EV_MSC, value: i32) -> io::Result<()> {
        self.write(EventCode::EV_MSC(code), value)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.write(EventCode::EV_SYN(EV_SYN::SYN_REPORT), 0)
    }
}

/// 为每个会话创建 [`UinputSink`]
#[derive(Debug, Default, Clone, Copy)]
pub struct UinputFactory;

impl SinkFactory for UinputFactory {
    fn create(
        &mut self,
        class: SinkClass,
        identity: &VirtualIdentity,
        capabilities: &SinkCapabilities,
    ) -> io::Result<Box<dyn VirtualSink>> {
        debug!(%class, name = %identity.name, "creating virtual device");
        Ok(Box::new(UinputSink::create(identity, capabilities)?))
    }
}
