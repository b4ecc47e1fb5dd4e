use serde::{Deserialize, Serialize};

use crate::plan::PlanIndex;
use crate::types::{BroadcastStandard, ColorSystem, FeMode, QamMode, SoundSystem};

/// Lock bitmask reported for a fully locked analog carrier
pub const LOCK_FULL: u32 = 0x11;

/// Packed driver mode code
///
/// Layout (little end first):
/// byte 0 - frontend base mode
/// byte 1 - generation (T2, ATSC cable)
/// byte 2 - channel plan list
/// byte 3 - ext flags, bit 0 = mixed ADTV pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeCode(u32);

impl ModeCode {
    const MIXED_EXT: u8 = 0x01;

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn for_standard(standard: BroadcastStandard) -> Self {
        let default_list = if standard.is_cable() { 1 } else { 0 };
        Self(0)
            .with_byte(0, standard.fe_mode() as u8)
            .with_byte(1, standard.generation())
            .with_byte(2, default_list)
    }

    pub fn analog() -> Self {
        Self(0).with_byte(0, FeMode::Analog as u8)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn base(self) -> Option<FeMode> {
        FeMode::from_code(self.byte(0))
    }

    pub fn generation(self) -> u8 {
        self.byte(1)
    }

    pub fn list(self) -> u8 {
        self.byte(2)
    }

    pub fn ext(self) -> u8 {
        self.byte(3)
    }

    pub fn is_analog(self) -> bool {
        self.base() == Some(FeMode::Analog)
    }

    pub fn is_atsc(self) -> bool {
        self.base() == Some(FeMode::Atsc)
    }

    pub fn is_mixed(self) -> bool {
        self.ext() & Self::MIXED_EXT != 0
    }

    pub fn with_list(self, list: u8) -> Self {
        self.with_byte(2, list)
    }

    /// Select a plan row family; `None` keeps the standard's default list
    pub fn with_plan(self, plan: Option<PlanIndex>) -> Self {
        match plan {
            Some(plan) => self.with_list(plan.code()),
            None => self,
        }
    }

    pub fn with_mixed(self, mixed: bool) -> Self {
        let ext = if mixed {
            self.ext() | Self::MIXED_EXT
        } else {
            self.ext() & !Self::MIXED_EXT
        };
        self.with_byte(3, ext)
    }

    fn byte(self, n: u32) -> u8 {
        ((self.0 >> (8 * n)) & 0xff) as u8
    }

    fn with_byte(self, n: u32, value: u8) -> Self {
        let mask = !(0xffu32 << (8 * n));
        Self((self.0 & mask) | ((value as u32) << (8 * n)))
    }
}

/// One row of the driver's channel/frequency table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreqEntry {
    pub channel_number: u32,
    pub frequency: u32,
}

/// Inclusive frequency window in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrequencyBounds {
    pub from: u32,
    pub to: u32,
}

impl FrequencyBounds {
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }

    /// Degenerate window around a single frequency
    pub fn at(frequency: u32) -> Self {
        Self {
            from: frequency,
            to: frequency,
        }
    }

    pub fn span(&self) -> u32 {
        self.from.abs_diff(self.to)
    }

    pub fn low(&self) -> u32 {
        self.from.min(self.to)
    }

    pub fn high(&self) -> u32 {
        self.from.max(self.to)
    }

    pub fn contains(&self, frequency: u32) -> bool {
        frequency >= self.low() && frequency <= self.high()
    }
}

/// Which side the combined pass searches first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    AtvThenDtv,
    DtvThenAtv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtvScanType {
    Auto,
    Manual,
    Freq,
    None,
}

impl AtvScanType {
    pub fn code(self) -> u32 {
        match self {
            AtvScanType::Auto => 1,
            AtvScanType::Manual => 2,
            AtvScanType::Freq => 3,
            AtvScanType::None => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtvScanType {
    Auto,
    Manual,
    AllBand,
    None,
}

impl DtvScanType {
    pub fn code(self) -> u32 {
        match self {
            DtvScanType::Auto => 1,
            DtvScanType::Manual => 2,
            DtvScanType::AllBand => 3,
            DtvScanType::None => 7,
        }
    }
}

/// Driver-side processing mode of a combined pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanProc {
    #[default]
    Normal,
    AutoPauseOnAtvFound,
}

/// Frontend parameters of a combined pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeParams {
    pub mode: ModeCode,
    pub video_std: ColorSystem,
    pub audio_std: SoundSystem,
    pub modulation: Option<QamMode>,
    pub symbol_rate: Option<u32>,
}

/// Scan parameters of a combined pass. Both scan types are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanParams {
    pub order: ScanOrder,
    pub atv_type: AtvScanType,
    pub dtv_type: DtvScanType,
    pub atv_window: FrequencyBounds,
    pub dtv_window: FrequencyBounds,
    pub proc_mode: ScanProc,
    /// Mode code of the ATV-equivalent plan, when the standard has one
    pub atv_modifier: Option<ModeCode>,
}

/// One driver primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    AtvAutoScan {
        video_std: ColorSystem,
        audio_std: SoundSystem,
        freq_min: u32,
        freq_max: u32,
    },
    AtvManualScan {
        freq_from: u32,
        freq_to: u32,
        video_std: ColorSystem,
        audio_std: SoundSystem,
    },
    DtvAutoScan {
        mode: ModeCode,
    },
    DtvManualScan {
        mode: ModeCode,
        frequency: u32,
    },
    TvScan {
        fe: FeParams,
        scan: ScanParams,
    },
    Stop,
    Pause,
    Resume,
}

impl DriverCommand {
    /// Whether the command starts a new hardware scan
    pub fn is_start(&self) -> bool {
        !matches!(
            self,
            DriverCommand::Stop | DriverCommand::Pause | DriverCommand::Resume
        )
    }
}

/// Driver scan status bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanStatus(pub u32);

impl ScanStatus {
    pub const PAUSED: u32 = 0x1;
    pub const PAUSED_USER: u32 = 0x2;

    pub fn is_paused(self) -> bool {
        self.0 & Self::PAUSED == Self::PAUSED
    }

    /// Paused because the caller asked for it
    pub fn is_user_paused(self) -> bool {
        self.0 & Self::PAUSED_USER == Self::PAUSED_USER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEventKind {
    Progress,
    StoreBegin,
    StoreEnd,
    ScanEnd,
    ScanExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Tv,
    Radio,
    Other(u8),
}

impl ServiceType {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ServiceType::Tv,
            2 => ServiceType::Radio,
            other => ServiceType::Other(other),
        }
    }
}

/// Asynchronous event raised by the tuner driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverEvent {
    pub kind: DriverEventKind,
    pub percent: u8,
    pub frequency: u32,
    pub lock: u32,
    pub strength: i32,
    pub quality: i32,
    pub mode: ModeCode,
    pub program_name: String,
    pub service_type: ServiceType,
}

impl DriverEvent {
    fn bare(kind: DriverEventKind) -> Self {
        Self {
            kind,
            percent: 0,
            frequency: 0,
            lock: 0,
            strength: 0,
            quality: 0,
            mode: ModeCode::from_raw(0),
            program_name: String::new(),
            service_type: ServiceType::Other(0),
        }
    }

    /// Progress sample without a new program
    pub fn progress(mode: ModeCode, percent: u8, frequency: u32) -> Self {
        Self {
            percent,
            frequency,
            mode,
            ..Self::bare(DriverEventKind::Progress)
        }
    }

    /// Fully locked analog carrier
    pub fn analog_lock(percent: u8, frequency: u32) -> Self {
        Self {
            lock: LOCK_FULL,
            strength: 80,
            quality: 30,
            ..Self::progress(ModeCode::analog(), percent, frequency)
        }
    }

    /// Digital service discovered on a multiplex
    pub fn digital_program(
        mode: ModeCode,
        percent: u8,
        frequency: u32,
        name: &str,
        service_type: ServiceType,
    ) -> Self {
        Self {
            lock: 1,
            strength: 70,
            quality: 25,
            program_name: name.to_string(),
            service_type,
            ..Self::progress(mode, percent, frequency)
        }
    }

    pub fn store_begin() -> Self {
        Self::bare(DriverEventKind::StoreBegin)
    }

    pub fn store_end() -> Self {
        Self::bare(DriverEventKind::StoreEnd)
    }

    pub fn scan_end() -> Self {
        Self::bare(DriverEventKind::ScanEnd)
    }

    pub fn scan_exit() -> Self {
        Self::bare(DriverEventKind::ScanExit)
    }
}

/// Hardware scan driver
///
/// Events are delivered separately through a
/// [`DriverEventSink`](crate::session::DriverEventSink) handed to the driver
/// by whoever wires the session.
pub trait ScanDriver: Send + Sync {
    fn atv_auto_scan(&self, video_std: ColorSystem, audio_std: SoundSystem, freq_min: u32, freq_max: u32);
    fn atv_manual_scan(&self, freq_from: u32, freq_to: u32, video_std: ColorSystem, audio_std: SoundSystem);
    fn dtv_auto_scan(&self, mode: ModeCode);
    fn dtv_manual_scan(&self, mode: ModeCode, frequency: u32);
    fn tv_scan(&self, fe: &FeParams, scan: &ScanParams);
    fn stop_scan(&self);
    fn pause_scan(&self);
    fn resume_scan(&self);
    fn scan_frequency_table(&self, mode: ModeCode) -> Vec<FreqEntry>;
    fn scan_status(&self) -> ScanStatus;
    /// Analog tuning range reported by the hardware
    fn atv_min_max_frequency(&self) -> FrequencyBounds;
}
