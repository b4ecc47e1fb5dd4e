use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ScanError};
use crate::purge::DtvRescanPurge;
use crate::types::{
    AtvScanMode, BroadcastStandard, CableSubMode, ColorSystem, QamMode, SearchMode, SoundSystem,
};

/// Default DVB-C symbol rate in symbols per second
pub const DEFAULT_SYMBOL_RATE: u32 = 6_875_000;

/// Persisted key/value configuration read by the scan core
pub trait ConfigStore: Send {
    fn country(&self) -> String;
    fn search_mode(&self) -> SearchMode;
    fn dtv_standard(&self) -> BroadcastStandard;
    fn cable_sub_mode(&self) -> CableSubMode;
    fn color_system(&self) -> ColorSystem;
    fn sound_system(&self) -> SoundSystem;
    /// `(search_dtv, search_atv)`
    fn search_flags(&self) -> (bool, bool);
    fn atv_scan_mode(&self) -> AtvScanMode;
    fn dvbc_qam(&self) -> QamMode;
    fn dvbc_symbol_rate(&self) -> u32;
    fn dtv_rescan_purge(&self) -> DtvRescanPurge;
    /// Tuner scans analog and digital on one path even for single-category scans
    fn combined_tuner(&self) -> bool;

    fn set_country(&mut self, country: &str);
    fn set_search_mode(&mut self, mode: SearchMode);
    fn set_dtv_standard(&mut self, standard: BroadcastStandard);
    fn set_cable_sub_mode(&mut self, cable: CableSubMode);
    fn set_search_flags(&mut self, search_dtv: bool, search_atv: bool);
    fn set_atv_scan_mode(&mut self, mode: AtvScanMode);

    /// Copy every key into a detached value
    fn snapshot(&self) -> ScanSettings {
        let (search_dtv, search_atv) = self.search_flags();
        ScanSettings {
            country: self.country(),
            search_mode: self.search_mode(),
            dtv_standard: self.dtv_standard(),
            cable_sub_mode: self.cable_sub_mode(),
            color_system: self.color_system(),
            sound_system: self.sound_system(),
            search_dtv,
            search_atv,
            atv_scan_mode: self.atv_scan_mode(),
            dvbc_qam: self.dvbc_qam(),
            dvbc_symbol_rate: self.dvbc_symbol_rate(),
            dtv_rescan_purge: self.dtv_rescan_purge(),
            combined_tuner: self.combined_tuner(),
        }
    }
}

/// Scan settings, loadable from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub country: String,
    pub search_mode: SearchMode,
    pub dtv_standard: BroadcastStandard,
    pub cable_sub_mode: CableSubMode,
    pub color_system: ColorSystem,
    pub sound_system: SoundSystem,
    pub search_dtv: bool,
    pub search_atv: bool,
    pub atv_scan_mode: AtvScanMode,
    pub dvbc_qam: QamMode,
    pub dvbc_symbol_rate: u32,
    pub dtv_rescan_purge: DtvRescanPurge,
    pub combined_tuner: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            country: "US".to_string(),
            search_mode: SearchMode::Manual,
            dtv_standard: BroadcastStandard::AtscT,
            cable_sub_mode: CableSubMode::Standard,
            color_system: ColorSystem::Auto,
            sound_system: SoundSystem::Auto,
            search_dtv: true,
            search_atv: true,
            atv_scan_mode: AtvScanMode::FreqTable,
            dvbc_qam: QamMode::Auto,
            dvbc_symbol_rate: DEFAULT_SYMBOL_RATE,
            dtv_rescan_purge: DtvRescanPurge::SameStandard,
            combined_tuner: false,
        }
    }
}

impl ScanSettings {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ScanError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ScanError::Config(e.to_string()))
    }

    /// Load settings from `path`, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

impl ConfigStore for ScanSettings {
    fn country(&self) -> String {
        self.country.clone()
    }

    fn search_mode(&self) -> SearchMode {
        self.search_mode
    }

    fn dtv_standard(&self) -> BroadcastStandard {
        self.dtv_standard
    }

    fn cable_sub_mode(&self) -> CableSubMode {
        self.cable_sub_mode
    }

    fn color_system(&self) -> ColorSystem {
        self.color_system
    }

    fn sound_system(&self) -> SoundSystem {
        self.sound_system
    }

    fn search_flags(&self) -> (bool, bool) {
        (self.search_dtv, self.search_atv)
    }

    fn atv_scan_mode(&self) -> AtvScanMode {
        self.atv_scan_mode
    }

    fn dvbc_qam(&self) -> QamMode {
        self.dvbc_qam
    }

    fn dvbc_symbol_rate(&self) -> u32 {
        self.dvbc_symbol_rate
    }

    fn dtv_rescan_purge(&self) -> DtvRescanPurge {
        self.dtv_rescan_purge
    }

    fn combined_tuner(&self) -> bool {
        self.combined_tuner
    }

    fn set_country(&mut self, country: &str) {
        self.country = country.to_string();
    }

    fn set_search_mode(&mut self, mode: SearchMode) {
        self.search_mode = mode;
    }

    fn set_dtv_standard(&mut self, standard: BroadcastStandard) {
        self.dtv_standard = standard;
    }

    fn set_cable_sub_mode(&mut self, cable: CableSubMode) {
        self.cable_sub_mode = cable;
    }

    fn set_search_flags(&mut self, search_dtv: bool, search_atv: bool) {
        self.search_dtv = search_dtv;
        self.search_atv = search_atv;
    }

    fn set_atv_scan_mode(&mut self, mode: AtvScanMode) {
        self.atv_scan_mode = mode;
    }

    fn snapshot(&self) -> ScanSettings {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings = ScanSettings::from_toml(
            r#"
            dtv_standard = "dvb-c"
            search_atv = false
            dvbc_qam = "qam256"
            "#,
        )
        .unwrap();
        assert_eq!(settings.dtv_standard, BroadcastStandard::DvbC);
        assert_eq!(settings.search_flags(), (true, false));
        assert_eq!(settings.dvbc_qam, QamMode::Qam256);
        assert_eq!(settings.dvbc_symbol_rate, DEFAULT_SYMBOL_RATE);
        assert_eq!(settings.country, "US");
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = ScanSettings::from_toml("dtv_standard = \"nope\"").unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = ScanSettings::default();
        settings.set_dtv_standard(BroadcastStandard::AtscC);
        settings.set_cable_sub_mode(CableSubMode::Hrc);
        settings.set_atv_scan_mode(AtvScanMode::AllBand);
        settings.save(&path).unwrap();

        assert_eq!(ScanSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let settings = ScanSettings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, ScanSettings::default());
    }

    #[test]
    fn test_snapshot_through_trait_object() {
        let mut settings = ScanSettings::default();
        settings.set_search_flags(false, true);
        let store: &dyn ConfigStore = &settings;
        assert_eq!(store.snapshot(), settings);
    }
}
