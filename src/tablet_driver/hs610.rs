//! Huion HS610 报告格式
//!
//! 每个报告 12 字节, 首字节固定为 `0x08`, 第二个字节是报告类型:
//!
//! | 类型 | 内容 |
//! |---|---|
//! | `type & 0x70 == 0` | 笔: 坐标, 压感, 倾斜, 笔身按钮 |
//! | `0xe0` | 数位板按键位图 |
//! | `0xf0` | 滚轮位置 (1..=13, 0 表示未转动) |
//!
//! 可以用 `usbhid-dump -es -m 256c` 实时观察

use num_enum::TryFromPrimitive;

use super::{DeviceProfile, PenGeometry, UsbSignature};
use crate::event_model::{
    DialPosition, PadFrame, PenButton, PenState, RawReport, TabletEvent, Tilt,
};

pub const REPORT_SIZE: usize = 12;
pub const REPORT_LEADING_BYTE: u8 = 0x08;

pub const PEN_MASK: u8 = 0x70;
pub const PEN_IN_RANGE_MASK: u8 = 0x80;
pub const PEN_TOUCH_MASK: u8 = 0x01;
pub const PEN_STYLUS_MASK: u8 = 0x02;
pub const PEN_STYLUS2_MASK: u8 = 0x04;

/// 笔坐标在两个轴上的最大值, 鼠标模式下用它归一化位移
pub const MAX_POS: i32 = 51000;

pub const VENDOR_ID_HUION: u16 = 0x256c;
pub const PRODUCT_ID_HUION_TABLET: u16 = 0x006e;
pub const PRODUCT_ID_HUION_HS610: u16 = 0x006d;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
enum ReportId {
    Frame = 0xe0,
    Dial = 0xf0,
}

pub static PROFILE: DeviceProfile = DeviceProfile {
    name: "HS610",
    signatures: &[
        UsbSignature::new(VENDOR_ID_HUION, PRODUCT_ID_HUION_TABLET),
        UsbSignature::new(VENDOR_ID_HUION, PRODUCT_ID_HUION_HS610),
    ],
    interfaces: &[0, 1],
    endpoint: 0x81,
    max_pos: MAX_POS,
    pen: PenGeometry {
        max_x: 50800,
        max_y: 31750,
        resolution: 200,
        max_pressure: 8191,
        max_tilt: 60,
    },
    decode,
};

fn form_24bit(high: u8, mid: u8, low: u8) -> i32 {
    (high as i32) << 16 | (mid as i32) << 8 | low as i32
}

fn form_16bit(high: u8, low: u8) -> u16 {
    (high as u16) << 8 | low as u16
}

/// 把一个原始报告解析为 [`TabletEvent`]
///
/// 长度不足或首字节不匹配的报告一律返回 [`TabletEvent::Unrecognized`]
pub fn decode(report: &RawReport) -> TabletEvent {
    let data = report.as_bytes();
    if data.len() < REPORT_SIZE || data[0] != REPORT_LEADING_BYTE {
        return TabletEvent::Unrecognized;
    }
    let report_type = data[1];

    if report_type & PEN_MASK == 0 {
        return TabletEvent::PenEvent(PenState {
            x: form_24bit(data[8], data[3], data[2]),
            y: form_24bit(data[9], data[5], data[4]),
            pressure: form_24bit(0, data[7], data[6]),
            tilt: Tilt {
                x: data[10] as i8,
                // 传感器的 Y 轴倾斜方向与虚拟笔相反
                y: (data[11] as i8).saturating_neg(),
            },
            in_range: report_type & PEN_IN_RANGE_MASK != 0,
            touching: report_type & PEN_TOUCH_MASK != 0,
            buttons: PenButton {
                upper: report_type & PEN_STYLUS_MASK != 0,
                lower: report_type & PEN_STYLUS2_MASK != 0,
            },
        });
    }

    match ReportId::try_from(report_type) {
        Ok(ReportId::Frame) => TabletEvent::FrameEvent(PadFrame {
            button_mask: form_16bit(data[5], data[4]),
        }),
        Ok(ReportId::Dial) => TabletEvent::DialEvent(DialPosition { raw: data[5] }),
        Err(_) => TabletEvent::Unrecognized,
    }
}
