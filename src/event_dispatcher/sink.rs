use std::io;

use evdev_rs::enums::{EV_ABS, EV_KEY, EV_MSC, EV_REL};

use super::capability::{SinkCapabilities, SinkClass, VirtualIdentity};

/// 操作系统层面的虚拟输入设备
///
/// 写入的事件在 [`VirtualSink::sync`] 之前不会被应用程序看到
pub trait VirtualSink {
    fn write_abs(&mut self, code: EV_ABS, value: i32) -> io::Result<()>;
    fn write_key(&mut self, code: EV_KEY, down: bool) -> io::Result<()>;
    fn write_rel(&mut self, code: EV_REL, delta: i32) -> io::Result<()>;
    fn write_msc(&mut self, code: EV_MSC, value: i32) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

/// 按能力集创建虚拟设备
pub trait SinkFactory {
    fn create(
        &mut self,
        class: SinkClass,
        identity: &VirtualIdentity,
        capabilities: &SinkCapabilities,
    ) -> io::Result<Box<dyn VirtualSink>>;
}

/// 一个会话持有的全部虚拟设备, 缺失表示未启用或创建失败
#[derive(Default)]
pub struct VirtualDeviceSet {
    pub pad: Option<Box<dyn VirtualSink>>,
    pub pen: Option<Box<dyn VirtualSink>>,
    pub mouse: Option<Box<dyn VirtualSink>>,
    pub keyboard: Option<Box<dyn VirtualSink>>,
}

impl VirtualDeviceSet {
    pub fn insert(&mut self, class: SinkClass, sink: Box<dyn VirtualSink>) {
        *self.slot(class) = Some(sink);
    }

    pub fn get_mut(&mut self, class: SinkClass) -> Option<&mut (dyn VirtualSink + 'static)> {
        self.slot(class).as_deref_mut()
    }

    pub fn contains(&self, class: SinkClass) -> bool {
        match class {
            SinkClass::Pad => self.pad.is_some(),
            SinkClass::Pen => self.pen.is_some(),
            SinkClass::Mouse => self.mouse.is_some(),
            SinkClass::Keyboard => self.keyboard.is_some(),
        }
    }

    /// 销毁所有虚拟设备
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn slot(&mut self, class: SinkClass) -> &mut Option<Box<dyn VirtualSink>> {
        match class {
            SinkClass::Pad => &mut self.pad,
            SinkClass::Pen => &mut self.pen,
            SinkClass::Mouse => &mut self.mouse,
            SinkClass::Keyboard => &mut self.keyboard,
        }
    }
}

impl std::fmt::Debug for VirtualDeviceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDeviceSet")
            .field("pad", &self.pad.is_some())
            .field("pen", &self.pen.is_some())
            .field("mouse", &self.mouse.is_some())
            .field("keyboard", &self.keyboard.is_some())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingSink, Write};
    use super::*;

    #[test]
    fn device_set_slots() {
        let mut set = VirtualDeviceSet::default();
        assert!(!set.contains(SinkClass::Pad));

        let sink = RecordingSink::default();
        let log = sink.log();
        set.insert(SinkClass::Pad, Box::new(sink));
        assert!(set.contains(SinkClass::Pad));
        assert!(set.get_mut(SinkClass::Mouse).is_none());

        set.get_mut(SinkClass::Pad).unwrap().sync().unwrap();
        assert_eq!(*log.lock().unwrap(), vec![Write::Sync]);

        set.clear();
        assert!(!set.contains(SinkClass::Pad));
    }
}
