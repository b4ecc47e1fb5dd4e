use crate::consumer::ScanState;
use crate::types::{ScanMode, SourceCategory};

pub const FIRST_FOUND_FREQUENCY: &str = "first_found_frequency";
pub const ATV_PROGRAM: &str = "atv_program";
pub const DTV_PROGRAM: &str = "dtv_program";
pub const RADIO_PROGRAM: &str = "radio_program";
pub const ATV_NUMBER: &str = "atv_number";
pub const DTV_NUMBER: &str = "dtv_number";
pub const RADIO_NUMBER: &str = "radio_number";
pub const AUTO_SEARCH_MODE: &str = "auto_search_mode";

/// Update sent to the caller of a scan session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanNotification {
    /// Session started
    Started {
        mode: ScanMode,
        source: SourceCategory,
    },
    /// Progress snapshot, one per driver event
    Progress(ScanProgress),
    /// New program discovered
    ChannelFound {
        kind: ChannelKind,
        frequency: u32,
        name: Option<String>,
    },
    Paused {
        by_driver: bool,
    },
    Resumed,
    /// Driver finished storing what it found
    StoreSummary {
        tv_channels: u32,
        radio_channels: u32,
    },
    /// Screen-bound scan ended
    Finished(ScanSummary),
    /// Number search ended
    NumberSearch(NumberSearchOutcome),
    /// A previous session was interrupted and has been stopped
    Recovered(ScanState),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Analog,
    DigitalTv,
    Radio,
}

/// Latest signal reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalSample {
    pub frequency: u32,
    pub lock: u32,
    pub strength: i32,
    pub quality: i32,
}

/// Scan progress counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanProgress {
    /// 0..=100, never decreases within a session
    pub percent: u8,
    /// Television programs, analog and digital
    pub tv_channels: u32,
    pub radio_channels: u32,
    pub atv_channels: u32,
    /// Digital television programs
    pub dtv_channels: u32,
    pub signal: SignalSample,
}

impl ScanProgress {
    pub fn total_channels(&self) -> u32 {
        self.tv_channels + self.radio_channels
    }

    pub(crate) fn advance(&mut self, percent: u8) {
        self.percent = self.percent.max(percent.min(100));
    }
}

/// Insertion-ordered summary of what a session found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoundInfoMap {
    entries: Vec<(&'static str, i64)>,
}

impl FoundInfoMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    pub fn set(&mut self, key: &'static str, value: i64) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Record `value` unless the key already has one
    pub fn set_first(&mut self, key: &'static str, value: i64) {
        if self.get(key).is_none() {
            self.entries.push((key, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Driver reported the end of the scan
    Completed,
    /// Caller stopped the scan
    Stopped,
}

/// Final result of a screen-bound scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub progress: ScanProgress,
    pub found: FoundInfoMap,
    pub reason: FinishReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberSearchOutcome {
    Found { count: u32, info: FoundInfoMap },
    NotFound { timed_out: bool },
}
