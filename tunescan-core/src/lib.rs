pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod freq;
pub mod number_search;
pub mod plan;
pub mod progress;
pub mod purge;
pub mod request;
pub mod session;
pub mod sim;
pub mod state_store;
pub mod system;
pub mod types;

pub use config::{ConfigStore, ScanSettings};
pub use consumer::{Reaction, ScanEventConsumer, ScanState};
pub use driver::{DriverCommand, DriverEvent, FrequencyBounds, ModeCode, ScanDriver};
pub use error::{Result, ScanError};
pub use freq::{format_frequency, frequency_band, mhz_to_hz};
pub use number_search::{NUMBER_SEARCH_TIMEOUT, NumberSearchController};
pub use plan::{PlanFamily, PlanIndex};
pub use progress::{FoundInfoMap, NumberSearchOutcome, ScanNotification, ScanProgress, ScanSummary};
pub use purge::{ChannelStore, DtvRescanPurge, MemoryChannelStore};
pub use request::{CallerInput, ScanRequest};
pub use session::{DriverEventSink, ScanHandle, ScanSession};
pub use system::{MemorySystemControl, SystemControl};
pub use types::{
    AtvScanMode, BroadcastStandard, CableSubMode, ColorSystem, QamMode, ScanMode, SearchMode,
    SoundSystem, SourceCategory,
};
