#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tilt {
    pub x: i8,
    pub y: i8,
}

/// 笔身上的两个按钮
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PenButton {
    /// `BTN_STYLUS`
    pub upper: bool,
    /// `BTN_STYLUS2`
    pub lower: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PenState {
    pub x: i32,
    pub y: i32,
    pub pressure: i32,
    pub tilt: Tilt,
    /// 笔在感应距离内(悬停或按下)
    pub in_range: bool,
    pub touching: bool,
    pub buttons: PenButton,
}

/// 数位板上 16 个按键的状态, 第 i 位对应第 i 个按键
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PadFrame {
    pub button_mask: u16,
}

impl PadFrame {
    pub const BUTTONS: usize = 16;

    pub fn is_pressed(&self, index: usize) -> bool {
        index < Self::BUTTONS && self.button_mask & (1 << index) != 0
    }
}

/// 滚轮的原始位置, `0` 表示自上次报告以来没有转动
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DialPosition {
    pub raw: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabletEvent {
    PenEvent(PenState),
    FrameEvent(PadFrame),
    DialEvent(DialPosition),
    Unrecognized,
}

impl Default for TabletEvent {
    fn default() -> Self {
        Self::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_bits_are_indexed_from_lsb() {
        let frame = PadFrame {
            button_mask: 0b1000_0000_0000_0101,
        };
        assert!(frame.is_pressed(0));
        assert!(!frame.is_pressed(1));
        assert!(frame.is_pressed(2));
        assert!(frame.is_pressed(15));
        assert!(!frame.is_pressed(16));
    }
}
