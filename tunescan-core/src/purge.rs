use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::request::ScanRequest;
use crate::types::{BroadcastStandard, ScanMode, SourceCategory};

/// Stored channel database
pub trait ChannelStore: Send + Sync {
    fn delete_channels(&self, standard: BroadcastStandard);
    fn delete_all_analog_or_digital(&self, is_analog: bool);
    /// Delete every channel of the category except those of `exclude`
    fn delete_other_standard_channels(&self, exclude: BroadcastStandard, is_analog: bool);
}

/// What a digital-only auto rescan removes before it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DtvRescanPurge {
    /// Drop channels of the scanned standard only
    #[default]
    SameStandard,
    /// Keep everything, the store upserts rescanned channels
    Keep,
}

/// One deletion issued against the channel store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeAction {
    AllAnalog,
    AllDigital,
    Standard(BroadcastStandard),
}

/// Deletions issued before a scan, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgePlan {
    pub actions: Vec<PurgeAction>,
}

impl PurgePlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Work out which deletions a request needs, without touching the store
pub fn plan_purge(request: &ScanRequest, policy: DtvRescanPurge) -> PurgePlan {
    if request.mode != ScanMode::Auto {
        return PurgePlan::default();
    }

    let actions = match request.source {
        SourceCategory::AtvOnly => vec![PurgeAction::AllAnalog],
        SourceCategory::DtvOnly => match policy {
            DtvRescanPurge::SameStandard => vec![PurgeAction::Standard(request.standard)],
            DtvRescanPurge::Keep => Vec::new(),
        },
        SourceCategory::MixedAdtv => vec![PurgeAction::AllAnalog, PurgeAction::AllDigital],
    };

    PurgePlan { actions }
}

/// Delete stale channels ahead of an auto scan
pub fn purge_before(
    request: &ScanRequest,
    policy: DtvRescanPurge,
    store: &dyn ChannelStore,
) -> PurgePlan {
    let plan = plan_purge(request, policy);
    for action in &plan.actions {
        match *action {
            PurgeAction::AllAnalog => store.delete_all_analog_or_digital(true),
            PurgeAction::AllDigital => store.delete_all_analog_or_digital(false),
            PurgeAction::Standard(standard) => store.delete_channels(standard),
        }
    }
    if !plan.is_empty() {
        info!(actions = ?plan.actions, "Purged stored channels before scan");
    }
    plan
}

/// Channel kept by [`MemoryChannelStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChannel {
    /// `None` for analog channels
    pub standard: Option<BroadcastStandard>,
    pub frequency: u32,
    pub name: String,
}

/// In-memory channel database
#[derive(Debug, Default)]
pub struct MemoryChannelStore {
    channels: Mutex<Vec<StoredChannel>>,
}

impl MemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the channel on the same frequency and standard
    pub fn upsert(&self, channel: StoredChannel) {
        if let Ok(mut channels) = self.channels.lock() {
            channels.retain(|c| {
                !(c.standard == channel.standard
                    && c.frequency == channel.frequency
                    && c.name == channel.name)
            });
            channels.push(channel);
        }
    }

    pub fn channels(&self) -> Vec<StoredChannel> {
        self.channels
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.channels.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retain(&self, keep: impl Fn(&StoredChannel) -> bool) {
        if let Ok(mut channels) = self.channels.lock() {
            channels.retain(|c| keep(c));
        }
    }
}

impl ChannelStore for MemoryChannelStore {
    fn delete_channels(&self, standard: BroadcastStandard) {
        self.retain(|c| c.standard != Some(standard));
    }

    fn delete_all_analog_or_digital(&self, is_analog: bool) {
        self.retain(|c| c.standard.is_none() != is_analog);
    }

    fn delete_other_standard_channels(&self, exclude: BroadcastStandard, is_analog: bool) {
        if is_analog {
            // analog channels carry no standard to keep
            self.retain(|c| c.standard.is_some());
        } else {
            self.retain(|c| c.standard.is_none() || c.standard == Some(exclude));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FrequencyBounds;
    use crate::request::ScanRequest;

    fn seeded_store() -> MemoryChannelStore {
        let store = MemoryChannelStore::new();
        for (standard, frequency, name) in [
            (None, 55_250_000, "A1"),
            (None, 61_250_000, "A2"),
            (Some(BroadcastStandard::DvbT), 474_000_000, "T1"),
            (Some(BroadcastStandard::DvbC), 306_000_000, "C1"),
            (Some(BroadcastStandard::Dtmb), 522_000_000, "D1"),
        ] {
            store.upsert(StoredChannel {
                standard,
                frequency,
                name: name.to_string(),
            });
        }
        store
    }

    fn names(store: &MemoryChannelStore) -> Vec<String> {
        store.channels().into_iter().map(|c| c.name).collect()
    }

    fn auto_request(source: SourceCategory, standard: BroadcastStandard) -> ScanRequest {
        ScanRequest::for_test(ScanMode::Auto, source, standard)
    }

    #[test]
    fn test_atv_only_deletes_analog() {
        let store = seeded_store();
        let req = auto_request(SourceCategory::AtvOnly, BroadcastStandard::DvbT);
        let plan = purge_before(&req, DtvRescanPurge::SameStandard, &store);
        assert_eq!(plan.actions, vec![PurgeAction::AllAnalog]);
        assert_eq!(names(&store), vec!["T1", "C1", "D1"]);
    }

    #[test]
    fn test_dtv_only_keeps_other_standards() {
        let store = seeded_store();
        let req = auto_request(SourceCategory::DtvOnly, BroadcastStandard::DvbT);
        purge_before(&req, DtvRescanPurge::SameStandard, &store);
        assert_eq!(names(&store), vec!["A1", "A2", "C1", "D1"]);
    }

    #[test]
    fn test_dtv_only_keep_policy() {
        let store = seeded_store();
        let req = auto_request(SourceCategory::DtvOnly, BroadcastStandard::DvbT);
        let plan = purge_before(&req, DtvRescanPurge::Keep, &store);
        assert!(plan.is_empty());
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_dtv_rescan_never_touches_other_standard() {
        for policy in [DtvRescanPurge::SameStandard, DtvRescanPurge::Keep] {
            let store = seeded_store();
            store.upsert(StoredChannel {
                standard: Some(BroadcastStandard::AtscT),
                frequency: 57_000_000,
                name: "AT1".to_string(),
            });
            let req = auto_request(SourceCategory::DtvOnly, BroadcastStandard::AtscC);
            let plan = purge_before(&req, policy, &store);
            assert!(
                plan.actions
                    .iter()
                    .all(|a| *a == PurgeAction::Standard(BroadcastStandard::AtscC))
            );
            assert!(names(&store).contains(&"AT1".to_string()));
            assert_eq!(store.len(), 6);
        }
    }

    #[test]
    fn test_store_deletes_other_standards() {
        let store = seeded_store();
        store.delete_other_standard_channels(BroadcastStandard::DvbT, false);
        assert_eq!(names(&store), vec!["A1", "A2", "T1"]);
        store.delete_other_standard_channels(BroadcastStandard::DvbT, true);
        assert_eq!(names(&store), vec!["T1"]);
    }

    #[test]
    fn test_mixed_deletes_everything() {
        let store = seeded_store();
        let req = auto_request(SourceCategory::MixedAdtv, BroadcastStandard::Dtmb);
        let plan = purge_before(&req, DtvRescanPurge::SameStandard, &store);
        assert_eq!(plan.actions, vec![PurgeAction::AllAnalog, PurgeAction::AllDigital]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_manual_scans_never_purge() {
        let store = seeded_store();
        for mode in [
            ScanMode::ManualRange,
            ScanMode::ManualChannelNumber,
            ScanMode::NumberSearch,
        ] {
            let mut req = ScanRequest::for_test(mode, SourceCategory::MixedAdtv, BroadcastStandard::DvbT);
            req.bounds = Some(FrequencyBounds::new(100_000_000, 200_000_000));
            assert!(purge_before(&req, DtvRescanPurge::SameStandard, &store).is_empty());
        }
        assert_eq!(store.len(), 5);
    }
}
