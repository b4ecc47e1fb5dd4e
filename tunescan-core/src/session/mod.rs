mod actor;

pub use actor::{DriverEventSink, ScanHandle, ScanSession};
