use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::consumer::ScanState;
use crate::types::{ScanMode, SourceCategory};

/// Current state file format version - increment when the record changes
pub const STATE_VERSION: u32 = 1;

/// Magic bytes identifying a scan state file
pub const STATE_MAGIC: [u8; 4] = *b"TSCS";

/// Searching state of the last session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStateRecord {
    pub state: ScanState,
    /// Mode of the session that wrote the record
    pub mode: Option<ScanMode>,
    pub source: Option<SourceCategory>,
    pub number_search: bool,
    /// Channels found by the session so far
    pub channel_count: u32,
    pub updated_at: SystemTime,
}

impl ScanStateRecord {
    pub fn stopped() -> Self {
        Self {
            state: ScanState::Stopped,
            mode: None,
            source: None,
            number_search: false,
            channel_count: 0,
            updated_at: SystemTime::now(),
        }
    }

    /// The writer went away while a scan was in progress
    pub fn was_interrupted(&self) -> bool {
        self.state.is_active()
    }
}
