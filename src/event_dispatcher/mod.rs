pub mod capability;
pub mod sink;
pub mod uinput;

use std::io;
use std::sync::Arc;

use evdev_rs::enums::{EV_ABS, EV_KEY, EV_MSC, EV_REL};
use tracing::{trace, warn};

use crate::event_model::{DialPosition, PadFrame, PenState, TabletEvent};
use crate::event_router::{ButtonBindingTable, resolve};
use crate::session::flags::ControlFlags;
use crate::tablet_driver::cursor::{CursorEmulator, CursorState};
use crate::tablet_driver::dial::{self, ScrollState};

use capability::{PAD_ACTIVE, PAD_BUTTONS, PEN_SERIAL, SinkClass};
use sink::{VirtualDeviceSet, VirtualSink};

/// 由命令行决定的功能开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureToggles {
    /// 用笔控制鼠标指针 (相对移动)
    pub virtual_cursor: bool,
    /// 滚轮作为鼠标滚轮
    pub virtual_wheel: bool,
    /// 按键触发键盘宏
    pub keyboard_emulation: bool,
}

impl FeatureToggles {
    pub fn needs_mouse(&self) -> bool {
        self.virtual_cursor || self.virtual_wheel
    }

    pub fn needs_keyboard(&self) -> bool {
        self.keyboard_emulation
    }
}

/// 会话内的跟踪状态, 新会话开始时清零
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tracking {
    pub cursor: CursorState,
    pub scroll: ScrollState,
    /// 上一个按键报告的位图, 用于判断哪些按键是新按下的
    pub buttons: u16,
}

/// 把解码后的事件写到对应的虚拟设备
///
/// 写入失败只记录日志, 不会中断会话
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    toggles: FeatureToggles,
    cursor: CursorEmulator,
    bindings: Arc<ButtonBindingTable>,
    flags: Arc<ControlFlags>,
}

impl EventDispatcher {
    pub fn new(
        toggles: FeatureToggles,
        cursor: CursorEmulator,
        bindings: Arc<ButtonBindingTable>,
        flags: Arc<ControlFlags>,
    ) -> Self {
        Self {
            toggles,
            cursor,
            bindings,
            flags,
        }
    }

    pub fn dispatch(
        &self,
        event: &TabletEvent,
        tracking: &mut Tracking,
        sinks: &mut VirtualDeviceSet,
    ) {
        match event {
            TabletEvent::PenEvent(pen) => self.dispatch_pen(pen, tracking, sinks),
            TabletEvent::FrameEvent(frame) => self.dispatch_frame(frame, tracking, sinks),
            TabletEvent::DialEvent(position) => self.dispatch_dial(position, tracking, sinks),
            TabletEvent::Unrecognized => trace!("unrecognized report dropped"),
        }
    }

    fn dispatch_pen(
        &self,
        pen: &PenState,
        tracking: &mut Tracking,
        sinks: &mut VirtualDeviceSet,
    ) {
        if self.toggles.virtual_cursor && pen.in_range {
            if let Some(mouse) = sinks.get_mut(SinkClass::Mouse) {
                let (dx, dy) = self.cursor.delta(pen.x, pen.y, &mut tracking.cursor);
                report(SinkClass::Mouse, "pen", write_cursor(mouse, pen, dx, dy));
                return;
            }
        }
        if let Some(sink) = sinks.get_mut(SinkClass::Pen) {
            report(SinkClass::Pen, "pen", write_pen(sink, pen));
        }
    }

    fn dispatch_frame(
        &self,
        frame: &PadFrame,
        tracking: &mut Tracking,
        sinks: &mut VirtualDeviceSet,
    ) {
        if let Some(pad) = sinks.get_mut(SinkClass::Pad) {
            report(SinkClass::Pad, "frame", write_frame(pad, frame));
        }

        let pressed = frame.button_mask & !tracking.buttons;
        tracking.buttons = frame.button_mask;

        if !self.toggles.keyboard_emulation || !self.flags.should_use_config() || pressed == 0 {
            return;
        }
        let Some(keyboard) = sinks.get_mut(SinkClass::Keyboard) else {
            return;
        };
        for key_macro in resolve(pressed, &self.bindings) {
            trace!(%key_macro, "playing key macro");
            report(SinkClass::Keyboard, "frame", key_macro.play(keyboard));
        }
    }

    fn dispatch_dial(
        &self,
        position: &DialPosition,
        tracking: &mut Tracking,
        sinks: &mut VirtualDeviceSet,
    ) {
        if self.toggles.virtual_wheel {
            if let Some(mouse) = sinks.get_mut(SinkClass::Mouse) {
                let step = dial::step(position.raw, &mut tracking.scroll);
                if step != 0 {
                    report(SinkClass::Mouse, "dial", write_wheel(mouse, step));
                }
                return;
            }
        }
        if let Some(pad) = sinks.get_mut(SinkClass::Pad) {
            report(SinkClass::Pad, "dial", write_ring(pad, dial::absolute(position.raw)));
        }
    }
}

fn report(class: SinkClass, report_type: &str, result: io::Result<()>) {
    if let Err(error) = result {
        warn!(sink = %class, report_type, %error, "cannot write to virtual device");
    }
}

fn write_cursor(mouse: &mut dyn VirtualSink, pen: &PenState, dx: i32, dy: i32) -> io::Result<()> {
    mouse.write_rel(EV_REL::REL_X, dx)?;
    mouse.write_rel(EV_REL::REL_Y, dy)?;
    mouse.sync()?;

    mouse.write_key(EV_KEY::BTN_LEFT, pen.touching)?;
    mouse.write_key(EV_KEY::BTN_RIGHT, pen.buttons.upper)?;
    mouse.write_key(EV_KEY::BTN_MIDDLE, pen.buttons.lower)?;
    mouse.sync()
}

/// 坐标一组, 按键一组, 各自一个 sync; 笔离开时只有按键组
fn write_pen(sink: &mut dyn VirtualSink, pen: &PenState) -> io::Result<()> {
    if !pen.in_range {
        sink.write_key(EV_KEY::BTN_TOOL_PEN, false)?;
        sink.write_msc(EV_MSC::MSC_SERIAL, PEN_SERIAL)?;
        return sink.sync();
    }

    sink.write_abs(EV_ABS::ABS_X, pen.x)?;
    sink.write_abs(EV_ABS::ABS_Y, pen.y)?;
    sink.write_abs(EV_ABS::ABS_PRESSURE, pen.pressure)?;
    sink.write_abs(EV_ABS::ABS_TILT_X, pen.tilt.x as i32)?;
    sink.write_abs(EV_ABS::ABS_TILT_Y, pen.tilt.y as i32)?;
    sink.sync()?;

    sink.write_key(EV_KEY::BTN_TOOL_PEN, true)?;
    sink.write_key(EV_KEY::BTN_TOUCH, pen.touching)?;
    sink.write_key(EV_KEY::BTN_STYLUS, pen.buttons.upper)?;
    sink.write_key(EV_KEY::BTN_STYLUS2, pen.buttons.lower)?;

    sink.write_msc(EV_MSC::MSC_SERIAL, PEN_SERIAL)?;
    sink.sync()
}

fn write_frame(pad: &mut dyn VirtualSink, frame: &PadFrame) -> io::Result<()> {
    let active = if frame.button_mask != 0 { PAD_ACTIVE } else { 0 };
    pad.write_abs(EV_ABS::ABS_MISC, active)?;
    for (index, key) in PAD_BUTTONS.iter().enumerate() {
        pad.write_key(*key, frame.is_pressed(index))?;
    }
    pad.sync()
}

fn write_wheel(mouse: &mut dyn VirtualSink, step: i32) -> io::Result<()> {
    mouse.write_rel(EV_REL::REL_WHEEL, step)?;
    mouse.sync()
}

fn write_ring(pad: &mut dyn VirtualSink, value: i32) -> io::Result<()> {
    let active = if value > 0 { PAD_ACTIVE } else { 0 };
    pad.write_abs(EV_ABS::ABS_MISC, active)?;
    pad.write_abs(EV_ABS::ABS_WHEEL, value)?;
    pad.sync()
}

#[cfg(test)]
mod tests {
    use super::sink::testing::{RecordingSink, Write, WriteLog};
    use super::*;
    use crate::event_model::{PenButton, Tilt};

    struct Rig {
        sinks: VirtualDeviceSet,
        logs: Vec<(SinkClass, WriteLog)>,
        tracking: Tracking,
    }

    impl Rig {
        fn new(classes: &[SinkClass]) -> Self {
            let mut sinks = VirtualDeviceSet::default();
            let mut logs = Vec::new();
            for class in classes {
                let sink = RecordingSink::default();
                logs.push((*class, sink.log()));
                sinks.insert(*class, Box::new(sink));
            }
            Self {
                sinks,
                logs,
                tracking: Tracking::default(),
            }
        }

        fn writes(&self, class: SinkClass) -> Vec<Write> {
            self.logs
                .iter()
                .find(|(c, _)| *c == class)
                .map(|(_, log)| log.lock().unwrap().clone())
                .unwrap_or_default()
        }

        fn run(&mut self, dispatcher: &EventDispatcher, event: TabletEvent) {
            dispatcher.dispatch(&event, &mut self.tracking, &mut self.sinks);
        }
    }

    fn dispatcher(toggles: FeatureToggles, bindings: ButtonBindingTable) -> EventDispatcher {
        let flags = Arc::new(ControlFlags::default());
        flags.set_should_use_config(!bindings.is_empty());
        EventDispatcher::new(
            toggles,
            CursorEmulator::new(5000, 51000),
            Arc::new(bindings),
            flags,
        )
    }

    fn pen(x: i32, y: i32, in_range: bool, touching: bool) -> TabletEvent {
        TabletEvent::PenEvent(PenState {
            x,
            y,
            pressure: 300,
            tilt: Tilt { x: 3, y: -4 },
            in_range,
            touching,
            buttons: PenButton {
                upper: true,
                lower: false,
            },
        })
    }

    fn syncs(writes: &[Write]) -> usize {
        writes.iter().filter(|w| **w == Write::Sync).count()
    }

    #[test]
    fn pen_axes_and_buttons_are_synced_separately() {
        let mut rig = Rig::new(&[SinkClass::Pad, SinkClass::Pen]);
        let dispatcher = dispatcher(FeatureToggles::default(), ButtonBindingTable::new());
        rig.run(&dispatcher, pen(10, 20, true, true));

        assert_eq!(
            rig.writes(SinkClass::Pen),
            vec![
                Write::Abs(EV_ABS::ABS_X, 10),
                Write::Abs(EV_ABS::ABS_Y, 20),
                Write::Abs(EV_ABS::ABS_PRESSURE, 300),
                Write::Abs(EV_ABS::ABS_TILT_X, 3),
                Write::Abs(EV_ABS::ABS_TILT_Y, -4),
                Write::Sync,
                Write::Key(EV_KEY::BTN_TOOL_PEN, true),
                Write::Key(EV_KEY::BTN_TOUCH, true),
                Write::Key(EV_KEY::BTN_STYLUS, true),
                Write::Key(EV_KEY::BTN_STYLUS2, false),
                Write::Msc(EV_MSC::MSC_SERIAL, PEN_SERIAL),
                Write::Sync,
            ]
        );
        assert!(rig.writes(SinkClass::Pad).is_empty());
    }

    #[test]
    fn out_of_range_pen_only_reports_tool_absence() {
        let mut rig = Rig::new(&[SinkClass::Pen]);
        let dispatcher = dispatcher(FeatureToggles::default(), ButtonBindingTable::new());
        rig.run(&dispatcher, pen(10, 20, false, false));
        assert_eq!(
            rig.writes(SinkClass::Pen),
            vec![
                Write::Key(EV_KEY::BTN_TOOL_PEN, false),
                Write::Msc(EV_MSC::MSC_SERIAL, PEN_SERIAL),
                Write::Sync,
            ]
        );
    }

    #[test]
    fn cursor_mode_moves_mouse_only() {
        let toggles = FeatureToggles {
            virtual_cursor: true,
            ..FeatureToggles::default()
        };
        let dispatcher = dispatcher(toggles, ButtonBindingTable::new());
        let mut rig = Rig::new(&[SinkClass::Pen, SinkClass::Mouse]);
        rig.run(&dispatcher, pen(100, 100, true, false));
        rig.run(&dispatcher, pen(200, 150, true, true));

        assert!(rig.writes(SinkClass::Pen).is_empty());
        let writes = rig.writes(SinkClass::Mouse);
        assert_eq!(
            writes[writes.len() - 7..],
            [
                Write::Rel(EV_REL::REL_X, 9),
                Write::Rel(EV_REL::REL_Y, 4),
                Write::Sync,
                Write::Key(EV_KEY::BTN_LEFT, true),
                Write::Key(EV_KEY::BTN_RIGHT, true),
                Write::Key(EV_KEY::BTN_MIDDLE, false),
                Write::Sync,
            ]
        );
        assert_eq!(rig.tracking.cursor.last_x, 200);
    }

    #[test]
    fn cursor_mode_without_mouse_falls_back_to_pen() {
        let toggles = FeatureToggles {
            virtual_cursor: true,
            ..FeatureToggles::default()
        };
        let mut rig = Rig::new(&[SinkClass::Pen]);
        let dispatcher = dispatcher(toggles, ButtonBindingTable::new());
        rig.run(&dispatcher, pen(1, 2, true, false));
        assert!(rig.writes(SinkClass::Pen).contains(&Write::Abs(EV_ABS::ABS_X, 1)));
    }

    #[test]
    fn frame_reports_every_pad_button() {
        let mut rig = Rig::new(&[SinkClass::Pad]);
        rig.run(
            &dispatcher(FeatureToggles::default(), ButtonBindingTable::new()),
            TabletEvent::FrameEvent(PadFrame { button_mask: 0b101 }),
        );
        let writes = rig.writes(SinkClass::Pad);
        assert_eq!(writes.first(), Some(&Write::Abs(EV_ABS::ABS_MISC, PAD_ACTIVE)));
        assert_eq!(writes.len(), 1 + 16 + 1);
        assert_eq!(writes[1], Write::Key(EV_KEY::BTN_0, true));
        assert_eq!(writes[2], Write::Key(EV_KEY::BTN_1, false));
        assert_eq!(writes[3], Write::Key(EV_KEY::BTN_2, true));
        assert_eq!(syncs(&writes), 1);
    }

    #[test]
    fn keyboard_macros_fire_on_newly_pressed_buttons() {
        let mut bindings = ButtonBindingTable::new();
        bindings.bind(0, "a".parse().unwrap());
        bindings.bind(2, "Cz".parse().unwrap());
        let toggles = FeatureToggles {
            keyboard_emulation: true,
            ..FeatureToggles::default()
        };
        let dispatcher = dispatcher(toggles, bindings);
        let mut rig = Rig::new(&[SinkClass::Pad, SinkClass::Keyboard]);

        rig.run(&dispatcher, TabletEvent::FrameEvent(PadFrame { button_mask: 0b001 }));
        rig.run(&dispatcher, TabletEvent::FrameEvent(PadFrame { button_mask: 0b101 }));
        rig.run(&dispatcher, TabletEvent::FrameEvent(PadFrame { button_mask: 0 }));

        assert_eq!(
            rig.writes(SinkClass::Keyboard),
            vec![
                Write::Key(EV_KEY::KEY_A, true),
                Write::Sync,
                Write::Key(EV_KEY::KEY_A, false),
                Write::Sync,
                Write::Key(EV_KEY::KEY_LEFTCTRL, true),
                Write::Key(EV_KEY::KEY_Z, true),
                Write::Sync,
                Write::Key(EV_KEY::KEY_LEFTCTRL, false),
                Write::Key(EV_KEY::KEY_Z, false),
                Write::Sync,
            ]
        );
        assert_eq!(rig.tracking.buttons, 0);
    }

    #[test]
    fn keyboard_stays_quiet_without_config() {
        let mut bindings = ButtonBindingTable::new();
        bindings.bind(0, "a".parse().unwrap());
        let dispatcher = dispatcher(
            FeatureToggles {
                keyboard_emulation: true,
                ..FeatureToggles::default()
            },
            bindings,
        );
        dispatcher.flags.set_should_use_config(false);
        let mut rig = Rig::new(&[SinkClass::Pad, SinkClass::Keyboard]);
        rig.run(&dispatcher, TabletEvent::FrameEvent(PadFrame { button_mask: 1 }));
        assert!(rig.writes(SinkClass::Keyboard).is_empty());
    }

    #[test]
    fn dial_drives_absolute_ring_by_default() {
        let mut rig = Rig::new(&[SinkClass::Pad]);
        rig.run(
            &dispatcher(FeatureToggles::default(), ButtonBindingTable::new()),
            TabletEvent::DialEvent(DialPosition { raw: 7 }),
        );
        assert_eq!(
            rig.writes(SinkClass::Pad),
            vec![
                Write::Abs(EV_ABS::ABS_MISC, PAD_ACTIVE),
                Write::Abs(EV_ABS::ABS_WHEEL, 71),
                Write::Sync,
            ]
        );
        assert_eq!(rig.tracking.scroll, ScrollState::default());
    }

    #[test]
    fn dial_drives_mouse_wheel_when_enabled() {
        let toggles = FeatureToggles {
            virtual_wheel: true,
            ..FeatureToggles::default()
        };
        let dispatcher = dispatcher(toggles, ButtonBindingTable::new());
        let mut rig = Rig::new(&[SinkClass::Pad, SinkClass::Mouse]);
        for raw in [13, 1, 0, 13] {
            rig.run(&dispatcher, TabletEvent::DialEvent(DialPosition { raw }));
        }
        assert_eq!(
            rig.writes(SinkClass::Mouse),
            vec![
                Write::Rel(EV_REL::REL_WHEEL, 1),
                Write::Sync,
                Write::Rel(EV_REL::REL_WHEEL, 1),
                Write::Sync,
                Write::Rel(EV_REL::REL_WHEEL, -1),
                Write::Sync,
            ]
        );
        assert!(rig.writes(SinkClass::Pad).is_empty());
    }

    #[test]
    fn broken_sink_does_not_panic() {
        let mut sinks = VirtualDeviceSet::default();
        sinks.insert(
            SinkClass::Pen,
            Box::new(RecordingSink {
                broken: true,
                ..RecordingSink::default()
            }),
        );
        let mut tracking = Tracking::default();
        dispatcher(FeatureToggles::default(), ButtonBindingTable::new()).dispatch(
            &pen(1, 1, true, true),
            &mut tracking,
            &mut sinks,
        );
    }
}
