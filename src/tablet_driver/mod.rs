pub mod cursor;
pub mod dial;
pub mod hs610;

use std::fmt;

use crate::event_dispatcher::capability::{SinkCapabilities, SinkClass};
use crate::event_model::{RawReport, TabletEvent};

/// USB 厂商 ID 和产品 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbSignature {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl UsbSignature {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for UsbSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// 笔的物理参数, 用于声明虚拟笔的绝对轴
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenGeometry {
    pub max_x: i32,
    pub max_y: i32,
    /// 单位/毫米
    pub resolution: i32,
    pub max_pressure: i32,
    pub max_tilt: i32,
}

/// 一种数位板型号的全部信息
///
/// 新增型号只需要实现 `decode` 并注册到 [`ProfileRegistry`], 会话状态机不需要改动
pub struct DeviceProfile {
    pub name: &'static str,
    pub signatures: &'static [UsbSignature],
    /// 需要独占的 HID 接口
    pub interfaces: &'static [u8],
    /// 中断输入端点
    pub endpoint: u8,
    pub max_pos: i32,
    pub pen: PenGeometry,
    pub decode: fn(&RawReport) -> TabletEvent,
}

impl DeviceProfile {
    pub fn matches(&self, signature: UsbSignature) -> bool {
        self.signatures.contains(&signature)
    }

    pub fn decode(&self, report: &RawReport) -> TabletEvent {
        (self.decode)(report)
    }

    /// 该型号对某一类虚拟设备的能力要求
    pub fn capabilities(&self, class: SinkClass) -> SinkCapabilities {
        match class {
            SinkClass::Pad => SinkCapabilities::pad(),
            SinkClass::Pen => SinkCapabilities::pen(&self.pen),
            SinkClass::Mouse => SinkCapabilities::mouse(),
            SinkClass::Keyboard => SinkCapabilities::keyboard(),
        }
    }
}

impl fmt::Debug for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceProfile")
            .field("name", &self.name)
            .field("signatures", &self.signatures)
            .field("interfaces", &self.interfaces)
            .field("endpoint", &format_args!("{:#04x}", self.endpoint))
            .finish_non_exhaustive()
    }
}

/// 已知型号的注册表, 按 USB 签名查找
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<&'static DeviceProfile>,
}

impl ProfileRegistry {
    pub fn builtin() -> Self {
        Self::with_profiles(vec![&hs610::PROFILE])
    }

    pub fn with_profiles(profiles: Vec<&'static DeviceProfile>) -> Self {
        Self { profiles }
    }

    pub fn lookup(&self, signature: UsbSignature) -> Option<&'static DeviceProfile> {
        self.profiles.iter().copied().find(|p| p.matches(signature))
    }

    pub fn profiles(&self) -> impl Iterator<Item = &'static DeviceProfile> + '_ {
        self.profiles.iter().copied()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_both_huion_signatures() {
        let registry = ProfileRegistry::builtin();
        for pid in [0x006d, 0x006e] {
            let profile = registry
                .lookup(UsbSignature::new(0x256c, pid))
                .expect("huion tablet should be known");
            assert_eq!(profile.name, "HS610");
        }
    }

    #[test]
    fn unknown_signature() {
        let registry = ProfileRegistry::builtin();
        assert!(registry.lookup(UsbSignature::new(0x056a, 0x0314)).is_none());
    }

    #[test]
    fn signature_display() {
        assert_eq!(UsbSignature::new(0x256c, 0x6d).to_string(), "256c:006d");
    }
}
