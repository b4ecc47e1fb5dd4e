use thiserror::Error;

use crate::types::{BroadcastStandard, CableSubMode};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid scan configuration: neither analog nor digital search is selected")]
    InvalidScanConfiguration,

    #[error("Frequency range {from}..{to} Hz is outside the tuner range {min}..{max} Hz")]
    OutOfRangeFrequency { from: u32, to: u32, min: u32, max: u32 },

    #[error("Frequency range spans {span} Hz, at least 1 MHz is required")]
    RangeTooNarrow { span: u32 },

    #[error("Cable sub-mode {cable:?} is not supported for {standard:?}")]
    UnsupportedStandardCombination {
        standard: BroadcastStandard,
        cable: CableSubMode,
    },

    #[error("Number search timed out without finding a channel")]
    DriverTimeout,

    #[error("Tuner driver has not reported the end of the previous scan")]
    DriverHang,

    #[error("A scan session is already running")]
    SessionBusy,

    #[error("Scan session is closed")]
    SessionClosed,

    #[error("Scan state store error: {0}")]
    StateStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
