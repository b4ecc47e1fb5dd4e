use tracing::{debug, info};

use crate::driver::{
    AtvScanType, DriverCommand, DtvScanType, FeParams, FrequencyBounds, ModeCode, ScanDriver,
    ScanOrder, ScanParams, ScanProc,
};
use crate::request::ScanRequest;
use crate::system::SystemControl;
use crate::types::{AtvScanMode, BroadcastStandard, CableSubMode, QamMode, ScanMode, SourceCategory};

/// Offsets of an analog window derived from a digital target frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardBand {
    pub below: u32,
    pub above: u32,
}

impl GuardBand {
    pub fn around(self, frequency: u32) -> FrequencyBounds {
        FrequencyBounds::new(
            frequency.saturating_sub(self.below),
            frequency.saturating_add(self.above),
        )
    }
}

/// Widening applied to both windows of a DTMB mixed range scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeGuard {
    pub dtv: u32,
    pub atv: u32,
}

fn widen(bounds: FrequencyBounds, by: u32) -> FrequencyBounds {
    FrequencyBounds::new(
        bounds.low().saturating_sub(by),
        bounds.high().saturating_add(by),
    )
}

/// Analog window searched around a digital channel in a mixed single-channel scan
pub const ATV_WINDOW_FROM_DTV: GuardBand = GuardBand {
    below: 9_750_000,
    above: 1_250_000,
};

/// DTMB mixed manual range widening
pub const DTMB_RANGE_GUARD: RangeGuard = RangeGuard {
    dtv: 150_000,
    atv: 2_000_000,
};

/// Temporary demodulator overrides a scan needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemOverrides {
    pub qam_fast_search: Option<bool>,
    pub auto_standard_detect: bool,
}

/// Build the single driver command that starts `request`
pub fn dispatch(request: &ScanRequest) -> DriverCommand {
    let mode = ModeCode::for_standard(request.standard)
        .with_plan(request.plan)
        .with_mixed(request.mixed_ext);

    if request.mixed_ext {
        return DriverCommand::TvScan {
            fe: fe_params(request, mode),
            scan: scan_params(request),
        };
    }

    let bounds = request.bounds.unwrap_or_default();
    match (request.mode, request.source) {
        (ScanMode::Auto, SourceCategory::AtvOnly) => DriverCommand::AtvAutoScan {
            video_std: request.color_system,
            audio_std: request.sound_system,
            freq_min: bounds.low(),
            freq_max: bounds.high(),
        },
        (ScanMode::Auto, _) => DriverCommand::DtvAutoScan { mode },
        (ScanMode::ManualRange, SourceCategory::AtvOnly) => DriverCommand::AtvManualScan {
            freq_from: bounds.from,
            freq_to: bounds.to,
            video_std: request.color_system,
            audio_std: request.sound_system,
        },
        (ScanMode::ManualRange, _) => DriverCommand::DtvManualScan {
            mode,
            frequency: bounds.from,
        },
        (_, SourceCategory::AtvOnly) => {
            let frequency = request.atv_frequency.unwrap_or_default();
            DriverCommand::AtvManualScan {
                freq_from: frequency,
                freq_to: frequency,
                video_std: request.color_system,
                audio_std: request.sound_system,
            }
        }
        (_, _) => DriverCommand::DtvManualScan {
            mode,
            frequency: request.dtv_frequency.unwrap_or_default(),
        },
    }
}

fn fe_params(request: &ScanRequest, mode: ModeCode) -> FeParams {
    let dvbc = request.dvbc.filter(|_| request.source.has_dtv());
    FeParams {
        mode,
        video_std: request.color_system,
        audio_std: request.sound_system,
        modulation: dvbc.map(|d| d.qam),
        symbol_rate: dvbc
            .filter(|d| request.is_dvbc_nit() && d.symbol_rate > 0)
            .map(|d| d.symbol_rate),
    }
}

fn scan_params(request: &ScanRequest) -> ScanParams {
    let source = request.source;
    let all_band = request.atv_scan_mode == AtvScanMode::AllBand;
    let bounds = request.bounds.unwrap_or_default();

    let (atv_type, dtv_type, atv_window, dtv_window) = match request.mode {
        ScanMode::Auto => {
            let atv_type = if !source.has_atv() {
                AtvScanType::None
            } else if source == SourceCategory::AtvOnly {
                if all_band {
                    AtvScanType::Auto
                } else {
                    AtvScanType::Freq
                }
            } else if request.standard == BroadcastStandard::Dtmb {
                AtvScanType::Auto
            } else {
                AtvScanType::Freq
            };
            let dtv_type = if source.has_dtv() {
                DtvScanType::AllBand
            } else {
                DtvScanType::None
            };
            (atv_type, dtv_type, bounds, FrequencyBounds::default())
        }
        ScanMode::ManualRange => {
            let atv_type = manual_atv_type(request);
            let dtv_type = if source.has_dtv() {
                DtvScanType::Manual
            } else {
                DtvScanType::None
            };
            if request.standard == BroadcastStandard::Dtmb && source == SourceCategory::MixedAdtv {
                (
                    atv_type,
                    dtv_type,
                    widen(bounds, DTMB_RANGE_GUARD.atv),
                    widen(bounds, DTMB_RANGE_GUARD.dtv),
                )
            } else {
                (atv_type, dtv_type, bounds, bounds)
            }
        }
        ScanMode::ManualChannelNumber | ScanMode::NumberSearch => {
            let dtv_frequency = request.dtv_frequency.unwrap_or_default();
            let dtv_type = if !source.has_dtv() {
                DtvScanType::None
            } else if request.is_dvbc_nit() {
                DtvScanType::Auto
            } else {
                DtvScanType::Manual
            };
            let (atv_type, atv_window) = if source == SourceCategory::MixedAdtv {
                (AtvScanType::Manual, ATV_WINDOW_FROM_DTV.around(dtv_frequency))
            } else {
                let atv_frequency = request.atv_frequency.unwrap_or_default();
                (manual_atv_type(request), FrequencyBounds::at(atv_frequency))
            };
            (atv_type, dtv_type, atv_window, FrequencyBounds::at(dtv_frequency))
        }
    };

    let atv_active = atv_type != AtvScanType::None;
    ScanParams {
        order: if atv_active {
            ScanOrder::AtvThenDtv
        } else {
            ScanOrder::DtvThenAtv
        },
        atv_type,
        dtv_type,
        atv_window,
        dtv_window,
        proc_mode: if atv_active && all_band {
            ScanProc::AutoPauseOnAtvFound
        } else {
            ScanProc::Normal
        },
        atv_modifier: if atv_active && request.standard.is_atsc() {
            Some(ModeCode::for_standard(request.standard).with_plan(request.atv_plan))
        } else {
            None
        },
    }
}

fn manual_atv_type(request: &ScanRequest) -> AtvScanType {
    if !request.source.has_atv() {
        AtvScanType::None
    } else if request.is_all_band_atv() {
        AtvScanType::Manual
    } else {
        AtvScanType::Freq
    }
}

/// Demodulator overrides to apply before sending the start command
pub fn overrides_for(request: &ScanRequest) -> SystemOverrides {
    let qam_fast_search = request
        .dvbc
        .filter(|_| request.mixed_ext && request.source.has_dtv())
        .map(|d| d.qam == QamMode::Auto);
    let auto_standard_detect = request.standard == BroadcastStandard::AtscC
        && request.cable_sub_mode == CableSubMode::Auto
        && request.mode.is_manual();
    SystemOverrides {
        qam_fast_search,
        auto_standard_detect,
    }
}

pub fn apply_overrides(overrides: SystemOverrides, system: &dyn SystemControl) {
    if let Some(enabled) = overrides.qam_fast_search {
        system.set_qam_fast_search(enabled);
    }
    if overrides.auto_standard_detect {
        system.set_auto_standard_detect(true);
    }
}

/// Forward one command to the driver
pub fn send(driver: &dyn ScanDriver, command: &DriverCommand) {
    if command.is_start() {
        info!(?command, "Starting driver scan");
    } else {
        debug!(?command, "Driver control");
    }

    match command {
        DriverCommand::AtvAutoScan {
            video_std,
            audio_std,
            freq_min,
            freq_max,
        } => driver.atv_auto_scan(*video_std, *audio_std, *freq_min, *freq_max),
        DriverCommand::AtvManualScan {
            freq_from,
            freq_to,
            video_std,
            audio_std,
        } => driver.atv_manual_scan(*freq_from, *freq_to, *video_std, *audio_std),
        DriverCommand::DtvAutoScan { mode } => driver.dtv_auto_scan(*mode),
        DriverCommand::DtvManualScan { mode, frequency } => {
            driver.dtv_manual_scan(*mode, *frequency)
        }
        DriverCommand::TvScan { fe, scan } => driver.tv_scan(fe, scan),
        DriverCommand::Stop => driver.stop_scan(),
        DriverCommand::Pause => driver.pause_scan(),
        DriverCommand::Resume => driver.resume_scan(),
    }
}
