use std::fmt;

use evdev_rs::enums::{EV_ABS, EV_KEY, EV_MSC, EV_REL};

use crate::event_router::keymap;
use crate::tablet_driver::PenGeometry;
use crate::tablet_driver::dial::ABS_WHEEL_MAX;

/// 数位板按键依次对应的虚拟按键
///
/// `BTN_SOUTH`, `BTN_EAST`, `BTN_NORTH`, `BTN_WEST` 即 `BTN_A`, `BTN_B`, `BTN_X`, `BTN_Y`
pub const PAD_BUTTONS: [EV_KEY; 16] = [
    EV_KEY::BTN_0,
    EV_KEY::BTN_1,
    EV_KEY::BTN_2,
    EV_KEY::BTN_3,
    EV_KEY::BTN_4,
    EV_KEY::BTN_5,
    EV_KEY::BTN_6,
    EV_KEY::BTN_7,
    EV_KEY::BTN_8,
    EV_KEY::BTN_9,
    EV_KEY::BTN_SOUTH,
    EV_KEY::BTN_EAST,
    EV_KEY::BTN_C,
    EV_KEY::BTN_NORTH,
    EV_KEY::BTN_WEST,
    EV_KEY::BTN_Z,
];

/// 按下任意按键或转动滚轮时 `ABS_MISC` 的值
pub const PAD_ACTIVE: i32 = 15;

/// wacom X 驱动要求笔事件带上序列号
pub const PEN_SERIAL: i32 = 1098942556;

const PEN_TOOLS: &[EV_KEY] = &[
    EV_KEY::BTN_LEFT,
    EV_KEY::BTN_RIGHT,
    EV_KEY::BTN_MIDDLE,
    EV_KEY::BTN_SIDE,
    EV_KEY::BTN_EXTRA,
    EV_KEY::BTN_TOOL_PEN,
    EV_KEY::BTN_TOOL_RUBBER,
    EV_KEY::BTN_TOOL_BRUSH,
    EV_KEY::BTN_TOOL_PENCIL,
    EV_KEY::BTN_TOOL_AIRBRUSH,
    EV_KEY::BTN_TOOL_MOUSE,
    EV_KEY::BTN_TOOL_LENS,
    EV_KEY::BTN_TOUCH,
    EV_KEY::BTN_STYLUS,
    EV_KEY::BTN_STYLUS2,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkClass {
    Pad,
    Pen,
    Mouse,
    Keyboard,
}

impl fmt::Display for SinkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pad => "pad",
            Self::Pen => "pen",
            Self::Mouse => "mouse",
            Self::Keyboard => "keyboard",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
    pub resolution: i32,
}

impl AxisRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self {
            min,
            max,
            resolution: 0,
        }
    }

    pub const fn with_resolution(self, resolution: i32) -> Self {
        Self { resolution, ..self }
    }
}

/// 虚拟设备创建时声明的能力, 创建后不可更改
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkCapabilities {
    pub keys: Vec<EV_KEY>,
    pub abs: Vec<(EV_ABS, AxisRange)>,
    pub rel: Vec<EV_REL>,
    pub msc: Vec<EV_MSC>,
}

impl SinkCapabilities {
    pub fn pad() -> Self {
        let mut keys = PAD_BUTTONS.to_vec();
        keys.push(EV_KEY::BTN_STYLUS);
        Self {
            keys,
            abs: vec![
                (EV_ABS::ABS_X, AxisRange::new(0, 1)),
                (EV_ABS::ABS_Y, AxisRange::new(0, 1)),
                (EV_ABS::ABS_WHEEL, AxisRange::new(0, ABS_WHEEL_MAX)),
                (EV_ABS::ABS_MISC, AxisRange::new(0, PAD_ACTIVE)),
            ],
            ..Self::default()
        }
    }

    pub fn pen(geometry: &PenGeometry) -> Self {
        Self {
            keys: PEN_TOOLS.to_vec(),
            abs: vec![
                (
                    EV_ABS::ABS_X,
                    AxisRange::new(0, geometry.max_x).with_resolution(geometry.resolution),
                ),
                (
                    EV_ABS::ABS_Y,
                    AxisRange::new(0, geometry.max_y).with_resolution(geometry.resolution),
                ),
                (EV_ABS::ABS_PRESSURE, AxisRange::new(0, geometry.max_pressure)),
                (
                    EV_ABS::ABS_TILT_X,
                    AxisRange::new(-geometry.max_tilt, geometry.max_tilt),
                ),
                (
                    EV_ABS::ABS_TILT_Y,
                    AxisRange::new(-geometry.max_tilt, geometry.max_tilt),
                ),
            ],
            rel: vec![EV_REL::REL_WHEEL],
            msc: vec![EV_MSC::MSC_SERIAL],
        }
    }

    pub fn mouse() -> Self {
        Self {
            keys: vec![EV_KEY::BTN_LEFT, EV_KEY::BTN_RIGHT, EV_KEY::BTN_MIDDLE],
            rel: vec![EV_REL::REL_X, EV_REL::REL_Y, EV_REL::REL_WHEEL],
            ..Self::default()
        }
    }

    pub fn keyboard() -> Self {
        Self {
            keys: keymap::known_keys().collect(),
            ..Self::default()
        }
    }

    pub fn supports_key(&self, key: EV_KEY) -> bool {
        self.keys.contains(&key)
    }

    pub fn supports_abs(&self, axis: EV_ABS) -> bool {
        self.abs.iter().any(|(code, _)| *code == axis)
    }

    pub fn supports_rel(&self, axis: EV_REL) -> bool {
        self.rel.contains(&axis)
    }
}

/// 虚拟数位板对外呈现的身份
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityMode {
    #[default]
    Driver,
    /// 伪装成 Wacom Intuos Pro S, 让 libwacom 和 xf86-input-wacom 识别
    Wacom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualIdentity {
    pub name: String,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

pub const DRIVER_NAME: &str = "hidtabletd";
pub const DRIVER_VENDOR_ID: u16 = 0x5fe1;
pub const DRIVER_PRODUCT_ID: u16 = 0x1234;
pub const DRIVER_VERSION: u16 = 0x0001;

const WACOM_NAME: &str = "Wacom Intuos Pro S";
const WACOM_VENDOR_ID: u16 = 0x056a;
const WACOM_PRODUCT_ID: u16 = 0x0314;
const WACOM_VERSION: u16 = 0x0110;

impl VirtualIdentity {
    pub fn for_class(class: SinkClass, mode: IdentityMode) -> Self {
        let suffix = match class {
            SinkClass::Pad => "Pad",
            SinkClass::Pen => "Pen",
            SinkClass::Mouse => "Mouse",
            SinkClass::Keyboard => "Keyboard",
        };
        match (class, mode) {
            (SinkClass::Pad | SinkClass::Pen, IdentityMode::Wacom) => Self {
                name: format!("{WACOM_NAME} {suffix}"),
                vendor: WACOM_VENDOR_ID,
                product: WACOM_PRODUCT_ID,
                version: WACOM_VERSION,
            },
            (SinkClass::Pad | SinkClass::Pen, IdentityMode::Driver) => Self {
                name: format!("{DRIVER_NAME} {suffix}"),
                vendor: DRIVER_VENDOR_ID,
                product: DRIVER_PRODUCT_ID,
                version: DRIVER_VERSION,
            },
            (SinkClass::Mouse, _) => Self {
                name: format!("{DRIVER_NAME} {suffix}"),
                vendor: 0x1233,
                product: DRIVER_VENDOR_ID,
                version: DRIVER_VERSION,
            },
            (SinkClass::Keyboard, _) => Self {
                name: format!("{DRIVER_NAME} {suffix}"),
                vendor: 0x1232,
                product: DRIVER_VENDOR_ID,
                version: DRIVER_VERSION,
            },
        }
    }
}
