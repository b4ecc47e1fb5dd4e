use tracing::{debug, warn};

use crate::driver::{ModeCode, ScanDriver};
use crate::error::ScanError;
use crate::types::{BroadcastStandard, CableSubMode, SourceCategory};

/// Offset the driver adds to a plan code to select the analog rows
const ATV_VARIANT_OFFSET: u8 = 5;

/// Row family in the driver's channel table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanFamily {
    Standard,
    Lrc,
    Hrc,
    Auto,
    AtscT,
}

impl PlanFamily {
    fn code(self) -> u8 {
        match self {
            PlanFamily::Standard => 1,
            PlanFamily::Lrc => 2,
            PlanFamily::Hrc => 3,
            PlanFamily::Auto => 4,
            PlanFamily::AtscT => 5,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(PlanFamily::Standard),
            2 => Some(PlanFamily::Lrc),
            3 => Some(PlanFamily::Hrc),
            4 => Some(PlanFamily::Auto),
            5 => Some(PlanFamily::AtscT),
            _ => None,
        }
    }
}

/// Plan index handed to the driver in byte 2 of the mode code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanIndex {
    pub family: PlanFamily,
    pub atv_variant: bool,
}

impl PlanIndex {
    pub fn dtv(family: PlanFamily) -> Self {
        Self {
            family,
            atv_variant: false,
        }
    }

    pub fn atv(family: PlanFamily) -> Self {
        Self {
            family,
            atv_variant: true,
        }
    }

    pub fn code(self) -> u8 {
        let base = self.family.code();
        if self.atv_variant {
            base + ATV_VARIANT_OFFSET
        } else {
            base
        }
    }

    /// Inverse of [`PlanIndex::code`]; 0 and unknown codes are `None`
    pub fn from_code(code: u8) -> Option<Self> {
        if code > ATV_VARIANT_OFFSET {
            PlanFamily::from_code(code - ATV_VARIANT_OFFSET).map(Self::atv)
        } else {
            PlanFamily::from_code(code).map(Self::dtv)
        }
    }
}

/// Resolve the channel plan for a standard, cable sub-mode and source
///
/// Only ATSC standards carry a plan. A cable sub-mode on anything but ATSC
/// cable is ignored.
pub fn resolve(
    standard: BroadcastStandard,
    cable: CableSubMode,
    source: SourceCategory,
) -> Option<PlanIndex> {
    if !standard.is_cable() && cable != CableSubMode::Standard {
        let err = ScanError::UnsupportedStandardCombination { standard, cable };
        debug!("{err}, using the standard plan");
    }

    let family = match standard {
        BroadcastStandard::AtscC => match cable {
            CableSubMode::Standard => PlanFamily::Standard,
            CableSubMode::Lrc => PlanFamily::Lrc,
            CableSubMode::Hrc => PlanFamily::Hrc,
            CableSubMode::Auto => PlanFamily::Auto,
        },
        BroadcastStandard::AtscT => PlanFamily::AtscT,
        _ => return None,
    };

    Some(PlanIndex {
        family,
        atv_variant: source == SourceCategory::AtvOnly,
    })
}

/// Mode code used to fetch the table for a standard and plan
pub fn table_mode(standard: BroadcastStandard, plan: Option<PlanIndex>) -> ModeCode {
    ModeCode::for_standard(standard).with_plan(plan)
}

/// Look up the frequency of user-facing channel `n` in the driver table
///
/// ATSC tables are numbered one below the user-facing channel. Numbers that
/// end up below 1 clamp to 1 and an unknown number falls back to the first
/// row.
pub fn frequency_for(driver: &dyn ScanDriver, mode: ModeCode, n: u32) -> u32 {
    let table = driver.scan_frequency_table(mode);

    let mut number = i64::from(n);
    if mode.is_atsc() {
        number -= 1;
    }
    let number = number.max(1);

    let entry = table
        .iter()
        .find(|e| i64::from(e.channel_number) == number)
        .or_else(|| table.first());

    match entry {
        Some(entry) => entry.frequency,
        None => {
            warn!(mode = mode.raw(), channel = n, "Driver returned an empty frequency table");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FreqEntry;
    use crate::sim::RecordingDriver;

    fn table_driver() -> RecordingDriver {
        let driver = RecordingDriver::new();
        driver.set_table(
            (1..=10)
                .map(|n| FreqEntry {
                    channel_number: n,
                    frequency: 100_000_000 + n * 6_000_000,
                })
                .collect(),
        );
        driver
    }

    #[test]
    fn test_plan_codes() {
        assert_eq!(PlanIndex::dtv(PlanFamily::Standard).code(), 1);
        assert_eq!(PlanIndex::dtv(PlanFamily::AtscT).code(), 5);
        assert_eq!(PlanIndex::atv(PlanFamily::Standard).code(), 6);
        assert_eq!(PlanIndex::atv(PlanFamily::AtscT).code(), 10);
        for code in 1..=10 {
            assert_eq!(PlanIndex::from_code(code).map(PlanIndex::code), Some(code));
        }
        assert_eq!(PlanIndex::from_code(0), None);
        assert_eq!(PlanIndex::from_code(11), None);
    }

    #[test]
    fn test_resolve_atsc_cable() {
        let plan = resolve(BroadcastStandard::AtscC, CableSubMode::Hrc, SourceCategory::DtvOnly);
        assert_eq!(plan, Some(PlanIndex::dtv(PlanFamily::Hrc)));

        let plan = resolve(BroadcastStandard::AtscC, CableSubMode::Auto, SourceCategory::AtvOnly);
        assert_eq!(plan, Some(PlanIndex::atv(PlanFamily::Auto)));
    }

    #[test]
    fn test_resolve_atsc_terrestrial() {
        let plan = resolve(BroadcastStandard::AtscT, CableSubMode::Standard, SourceCategory::MixedAdtv);
        assert_eq!(plan.map(PlanIndex::code), Some(5));
    }

    #[test]
    fn test_resolve_ignores_cable_mode_off_cable() {
        let plan = resolve(BroadcastStandard::AtscT, CableSubMode::Lrc, SourceCategory::DtvOnly);
        assert_eq!(plan, Some(PlanIndex::dtv(PlanFamily::AtscT)));
        assert_eq!(resolve(BroadcastStandard::DvbT, CableSubMode::Hrc, SourceCategory::DtvOnly), None);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        for standard in BroadcastStandard::ALL {
            let a = resolve(standard, CableSubMode::Lrc, SourceCategory::MixedAdtv);
            let b = resolve(standard, CableSubMode::Lrc, SourceCategory::MixedAdtv);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_frequency_for_atsc_subtracts_one() {
        let driver = table_driver();
        let mode = table_mode(BroadcastStandard::AtscT, Some(PlanIndex::dtv(PlanFamily::AtscT)));
        assert_eq!(frequency_for(&driver, mode, 5), 100_000_000 + 4 * 6_000_000);
    }

    #[test]
    fn test_frequency_for_non_atsc_uses_number() {
        let driver = table_driver();
        let mode = table_mode(BroadcastStandard::DvbT, None);
        assert_eq!(frequency_for(&driver, mode, 5), 100_000_000 + 5 * 6_000_000);
    }

    #[test]
    fn test_frequency_for_clamps_and_falls_back() {
        let driver = table_driver();
        let atsc = table_mode(BroadcastStandard::AtscC, None);
        // 1 - 1 = 0 clamps to row 1
        assert_eq!(frequency_for(&driver, atsc, 1), 106_000_000);
        assert_eq!(frequency_for(&driver, atsc, 0), 106_000_000);

        let dvb = table_mode(BroadcastStandard::DvbC, None);
        assert_eq!(frequency_for(&driver, dvb, 99), 106_000_000);
    }

    #[test]
    fn test_frequency_for_empty_table() {
        let driver = RecordingDriver::new();
        driver.set_table(Vec::new());
        let mode = table_mode(BroadcastStandard::Dtmb, None);
        assert_eq!(frequency_for(&driver, mode, 3), 0);
    }

    #[test]
    fn test_frequency_for_is_idempotent() {
        let driver = table_driver();
        let mode = table_mode(BroadcastStandard::IsdbT, None);
        assert_eq!(frequency_for(&driver, mode, 7), frequency_for(&driver, mode, 7));
    }
}
