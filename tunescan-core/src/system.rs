use std::sync::Mutex;

use tracing::debug;

/// Platform properties and demodulator switches touched around a scan
pub trait SystemControl: Send + Sync {
    /// Publish the number of stored channels
    fn set_channel_count(&self, count: u32);
    /// DVB-C fast search on QAM auto
    fn set_qam_fast_search(&self, enabled: bool);
    /// ATSC cable automatic standard detection
    fn set_auto_standard_detect(&self, enabled: bool);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemSnapshot {
    pub channel_count: Option<u32>,
    pub qam_fast_search: bool,
    pub auto_standard_detect: bool,
}

/// In-memory [`SystemControl`]
#[derive(Debug, Default)]
pub struct MemorySystemControl {
    state: Mutex<SystemSnapshot>,
}

impl MemorySystemControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SystemSnapshot {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut SystemSnapshot)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }
}

impl SystemControl for MemorySystemControl {
    fn set_channel_count(&self, count: u32) {
        debug!(count, "Channel count");
        self.update(|s| s.channel_count = Some(count));
    }

    fn set_qam_fast_search(&self, enabled: bool) {
        debug!(enabled, "QAM fast search");
        self.update(|s| s.qam_fast_search = enabled);
    }

    fn set_auto_standard_detect(&self, enabled: bool) {
        debug!(enabled, "Auto standard detect");
        self.update(|s| s.auto_standard_detect = enabled);
    }
}
