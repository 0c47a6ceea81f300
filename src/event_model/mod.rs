pub mod event;
pub mod report;

pub use event::{DialPosition, PadFrame, PenButton, PenState, TabletEvent, Tilt};
pub use report::{REPORT_BUFFER_SIZE, RawReport};
