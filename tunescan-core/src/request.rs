use tracing::debug;

use crate::config::ScanSettings;
use crate::driver::{FrequencyBounds, ScanDriver};
use crate::error::{Result, ScanError};
use crate::plan::{self, PlanIndex};
use crate::types::{
    AtvScanMode, BroadcastStandard, CableSubMode, ColorSystem, QamMode, ScanMode, SearchMode,
    SoundSystem, SourceCategory,
};

/// Smallest analog manual range the tuner accepts
pub const MIN_MANUAL_SPAN: u32 = 1_000_000;

/// What the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerInput {
    pub mode: ScanMode,
    pub bounds: Option<FrequencyBounds>,
    pub channel_number: Option<u32>,
}

impl CallerInput {
    pub fn auto() -> Self {
        Self {
            mode: ScanMode::Auto,
            bounds: None,
            channel_number: None,
        }
    }

    pub fn auto_within(bounds: FrequencyBounds) -> Self {
        Self {
            bounds: Some(bounds),
            ..Self::auto()
        }
    }

    pub fn manual_range(from: u32, to: u32) -> Self {
        Self {
            mode: ScanMode::ManualRange,
            bounds: Some(FrequencyBounds::new(from, to)),
            channel_number: None,
        }
    }

    pub fn manual_channel(number: u32) -> Self {
        Self {
            mode: ScanMode::ManualChannelNumber,
            bounds: None,
            channel_number: Some(number),
        }
    }

    pub fn number_search(number: u32) -> Self {
        Self {
            mode: ScanMode::NumberSearch,
            bounds: None,
            channel_number: Some(number),
        }
    }
}

/// DVB-C demodulator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DvbcParams {
    pub qam: QamMode,
    pub symbol_rate: u32,
}

/// Fully resolved, validated scan request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub mode: ScanMode,
    pub source: SourceCategory,
    pub standard: BroadcastStandard,
    pub cable_sub_mode: CableSubMode,
    pub bounds: Option<FrequencyBounds>,
    pub target_channel: Option<u32>,
    pub color_system: ColorSystem,
    pub sound_system: SoundSystem,
    pub mixed_ext: bool,
    pub atv_scan_mode: AtvScanMode,
    pub search_mode: SearchMode,
    pub dvbc: Option<DvbcParams>,
    /// Digital side plan
    pub plan: Option<PlanIndex>,
    /// Analog-equivalent plan
    pub atv_plan: Option<PlanIndex>,
    pub dtv_frequency: Option<u32>,
    pub atv_frequency: Option<u32>,
}

impl ScanRequest {
    /// Analog all-band sweep on an analog-only source
    pub fn is_all_band_atv(&self) -> bool {
        self.source == SourceCategory::AtvOnly && self.atv_scan_mode == AtvScanMode::AllBand
    }

    /// DVB-C network search, where the caller passes a frequency in MHz
    pub fn is_dvbc_nit(&self) -> bool {
        self.standard == BroadcastStandard::DvbC && self.search_mode == SearchMode::Nit
    }

    #[cfg(test)]
    pub(crate) fn for_test(mode: ScanMode, source: SourceCategory, standard: BroadcastStandard) -> Self {
        Self {
            mode,
            source,
            standard,
            cable_sub_mode: CableSubMode::Standard,
            bounds: None,
            target_channel: None,
            color_system: ColorSystem::Auto,
            sound_system: SoundSystem::Auto,
            mixed_ext: source == SourceCategory::MixedAdtv,
            atv_scan_mode: AtvScanMode::FreqTable,
            search_mode: SearchMode::Manual,
            dvbc: None,
            plan: plan::resolve(standard, CableSubMode::Standard, SourceCategory::DtvOnly),
            atv_plan: plan::resolve(standard, CableSubMode::Standard, SourceCategory::AtvOnly),
            dtv_frequency: None,
            atv_frequency: None,
        }
    }
}

/// Build a validated [`ScanRequest`] from the settings and the caller's input
///
/// Fails before anything is sent to the driver.
pub fn resolve(
    settings: &ScanSettings,
    driver: &dyn ScanDriver,
    input: &CallerInput,
) -> Result<ScanRequest> {
    let source = SourceCategory::from_flags(settings.search_dtv, settings.search_atv)
        .ok_or(ScanError::InvalidScanConfiguration)?;
    let standard = settings.dtv_standard;
    let cable = settings.cable_sub_mode;
    let limits = driver.atv_min_max_frequency();

    let mut request = ScanRequest {
        mode: input.mode,
        source,
        standard,
        cable_sub_mode: cable,
        bounds: input.bounds,
        target_channel: None,
        color_system: settings.color_system,
        sound_system: settings.sound_system,
        mixed_ext: source == SourceCategory::MixedAdtv || settings.combined_tuner,
        atv_scan_mode: settings.atv_scan_mode,
        search_mode: settings.search_mode,
        dvbc: (standard == BroadcastStandard::DvbC).then_some(DvbcParams {
            qam: settings.dvbc_qam,
            symbol_rate: settings.dvbc_symbol_rate,
        }),
        plan: plan::resolve(standard, cable, SourceCategory::DtvOnly),
        atv_plan: plan::resolve(standard, cable, SourceCategory::AtvOnly),
        dtv_frequency: None,
        atv_frequency: None,
    };

    match input.mode {
        ScanMode::ManualRange => {
            let bounds = match input.bounds {
                Some(bounds) => bounds,
                // the tuner's analog limits mean nothing to the digital side
                None if source.has_dtv() => {
                    return Err(ScanError::Config(
                        "a digital manual scan needs a frequency range".to_string(),
                    ));
                }
                None => limits,
            };
            if source.has_atv() {
                validate_atv_range(bounds, limits)?;
            }
            request.bounds = Some(bounds);
        }
        ScanMode::Auto => {
            if input.bounds.is_none()
                && (request.is_all_band_atv() || source == SourceCategory::MixedAdtv)
            {
                debug!(min = limits.from, max = limits.to, "Using tuner analog range");
                request.bounds = Some(limits);
            }
        }
        ScanMode::ManualChannelNumber | ScanMode::NumberSearch => {
            let number = input
                .channel_number
                .ok_or_else(|| ScanError::Config("channel number is required".to_string()))?;
            request.target_channel = Some(number);

            if request.is_all_band_atv() || request.is_dvbc_nit() {
                let frequency = number.saturating_mul(1_000_000);
                request.dtv_frequency = Some(frequency);
                request.atv_frequency = Some(frequency);
            } else {
                request.dtv_frequency = Some(plan::frequency_for(
                    driver,
                    plan::table_mode(standard, request.plan),
                    number,
                ));
                request.atv_frequency = Some(plan::frequency_for(
                    driver,
                    plan::table_mode(standard, request.atv_plan),
                    number,
                ));
            }
            debug!(
                channel = number,
                dtv = ?request.dtv_frequency,
                atv = ?request.atv_frequency,
                "Resolved channel number"
            );
        }
    }

    Ok(request)
}

fn validate_atv_range(bounds: FrequencyBounds, limits: FrequencyBounds) -> Result<()> {
    let (min, max) = (limits.low(), limits.high());
    let inside = |f: u32| f >= min && f <= max;
    if !inside(bounds.from) || !inside(bounds.to) {
        return Err(ScanError::OutOfRangeFrequency {
            from: bounds.from,
            to: bounds.to,
            min,
            max,
        });
    }
    if bounds.span() < MIN_MANUAL_SPAN {
        return Err(ScanError::RangeTooNarrow {
            span: bounds.span(),
        });
    }
    Ok(())
}
