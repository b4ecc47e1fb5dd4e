use serde::{Deserialize, Serialize};

/// Digital broadcast standard selected for the tuner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BroadcastStandard {
    Dtmb,
    DvbC,
    DvbT,
    DvbT2,
    AtscT,
    AtscC,
    IsdbT,
}

impl BroadcastStandard {
    pub const ALL: [BroadcastStandard; 7] = [
        BroadcastStandard::Dtmb,
        BroadcastStandard::DvbC,
        BroadcastStandard::DvbT,
        BroadcastStandard::DvbT2,
        BroadcastStandard::AtscT,
        BroadcastStandard::AtscC,
        BroadcastStandard::IsdbT,
    ];

    pub fn is_atsc(self) -> bool {
        matches!(self, BroadcastStandard::AtscT | BroadcastStandard::AtscC)
    }

    /// Cable sub-modes only apply to ATSC cable
    pub fn is_cable(self) -> bool {
        self == BroadcastStandard::AtscC
    }

    /// Frontend base mode as understood by the tuner driver
    pub fn fe_mode(self) -> FeMode {
        match self {
            BroadcastStandard::Dtmb => FeMode::Dtmb,
            BroadcastStandard::DvbC => FeMode::Qam,
            BroadcastStandard::DvbT | BroadcastStandard::DvbT2 => FeMode::Ofdm,
            BroadcastStandard::AtscT | BroadcastStandard::AtscC => FeMode::Atsc,
            BroadcastStandard::IsdbT => FeMode::Isdbt,
        }
    }

    /// Second-generation flag within the frontend family (T2, ATSC cable)
    pub fn generation(self) -> u8 {
        match self {
            BroadcastStandard::DvbT2 | BroadcastStandard::AtscC => 1,
            _ => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BroadcastStandard::Dtmb => "DTMB",
            BroadcastStandard::DvbC => "DVB-C",
            BroadcastStandard::DvbT => "DVB-T",
            BroadcastStandard::DvbT2 => "DVB-T2",
            BroadcastStandard::AtscT => "ATSC-T",
            BroadcastStandard::AtscC => "ATSC-C",
            BroadcastStandard::IsdbT => "ISDB-T",
        }
    }
}

/// Frontend modes of the tuner (low byte of a driver mode code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FeMode {
    Qpsk = 0,
    Qam = 1,
    Ofdm = 2,
    Atsc = 3,
    Analog = 4,
    Dtmb = 5,
    Isdbt = 6,
}

impl FeMode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FeMode::Qpsk),
            1 => Some(FeMode::Qam),
            2 => Some(FeMode::Ofdm),
            3 => Some(FeMode::Atsc),
            4 => Some(FeMode::Analog),
            5 => Some(FeMode::Dtmb),
            6 => Some(FeMode::Isdbt),
            _ => None,
        }
    }
}

/// ATSC cable channel plan variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CableSubMode {
    #[default]
    Standard,
    Lrc,
    Hrc,
    Auto,
}

/// Which signal paths a scan covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceCategory {
    AtvOnly,
    DtvOnly,
    MixedAdtv,
}

impl SourceCategory {
    /// Map the persisted search flags; `None` when neither path is selected
    pub fn from_flags(search_dtv: bool, search_atv: bool) -> Option<Self> {
        match (search_dtv, search_atv) {
            (true, false) => Some(SourceCategory::DtvOnly),
            (false, true) => Some(SourceCategory::AtvOnly),
            (true, true) => Some(SourceCategory::MixedAdtv),
            (false, false) => None,
        }
    }

    pub fn has_atv(self) -> bool {
        self != SourceCategory::DtvOnly
    }

    pub fn has_dtv(self) -> bool {
        self != SourceCategory::AtvOnly
    }
}

/// How the caller asked for the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanMode {
    ManualRange,
    ManualChannelNumber,
    Auto,
    NumberSearch,
}

impl ScanMode {
    pub fn is_auto(self) -> bool {
        self == ScanMode::Auto
    }

    pub fn is_manual(self) -> bool {
        matches!(self, ScanMode::ManualRange | ScanMode::ManualChannelNumber)
    }
}

/// Analog scan strategy configured per country
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AtvScanMode {
    /// Step through the country's frequency table
    #[default]
    FreqTable,
    /// Sweep the whole tuner range, pausing on every analog lock
    AllBand,
}

/// Persisted search mode preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    #[default]
    Manual,
    Auto,
    /// DVB-C network information table search
    Nit,
}

/// Analog colour system (driver video standard code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorSystem {
    #[default]
    Auto,
    Pal,
    Ntsc,
    Secam,
}

impl ColorSystem {
    pub fn code(self) -> u32 {
        match self {
            ColorSystem::Auto => 0,
            ColorSystem::Pal => 1,
            ColorSystem::Ntsc => 2,
            ColorSystem::Secam => 3,
        }
    }
}

/// Analog sound system (driver audio standard code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundSystem {
    Dk,
    I,
    Bg,
    M,
    L,
    Lc,
    #[default]
    Auto,
}

impl SoundSystem {
    pub fn code(self) -> u32 {
        match self {
            SoundSystem::Dk => 0,
            SoundSystem::I => 1,
            SoundSystem::Bg => 2,
            SoundSystem::M => 3,
            SoundSystem::L => 4,
            SoundSystem::Lc => 5,
            SoundSystem::Auto => 6,
        }
    }
}

/// DVB-C QAM constellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QamMode {
    #[default]
    Qam16,
    Qam32,
    Qam64,
    Qam128,
    Qam256,
    Auto,
}

impl QamMode {
    pub fn code(self) -> u32 {
        match self {
            QamMode::Qam16 => 1,
            QamMode::Qam32 => 2,
            QamMode::Qam64 => 3,
            QamMode::Qam128 => 4,
            QamMode::Qam256 => 5,
            QamMode::Auto => 6,
        }
    }
}
