const KHZ: u32 = 1_000;
const MHZ: u32 = 1_000_000;

/// Broadcast band of an analog carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    VhfLow,
    VhfHigh,
    Uhf,
}

impl Band {
    pub fn name(self) -> &'static str {
        match self {
            Band::VhfLow => "VHF-L",
            Band::VhfHigh => "VHF-H",
            Band::Uhf => "UHF",
        }
    }
}

/// Band containing `hz`, `None` outside 44.25..=868.25 MHz
pub fn frequency_band(hz: u32) -> Option<Band> {
    match hz {
        44_250_000..143_250_000 => Some(Band::VhfLow),
        143_250_000..426_250_000 => Some(Band::VhfHigh),
        426_250_000..=868_250_000 => Some(Band::Uhf),
        _ => None,
    }
}

/// Format a frequency into a human-readable string
pub fn format_frequency(hz: u32) -> String {
    if hz >= MHZ {
        format!("{:.2} MHz", hz as f64 / MHZ as f64)
    } else if hz >= KHZ {
        format!("{:.1} kHz", hz as f64 / KHZ as f64)
    } else {
        format!("{} Hz", hz)
    }
}

/// Convert a MHz value to Hz, rounding to the nearest kHz
pub fn mhz_to_hz(mhz: f64) -> u32 {
    let khz = (mhz * 1_000.0).round();
    if khz <= 0.0 {
        0
    } else {
        (khz as u32).saturating_mul(KHZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_frequency() {
        assert_eq!(format_frequency(0), "0 Hz");
        assert_eq!(format_frequency(150_000), "150.0 kHz");
        assert_eq!(format_frequency(55_250_000), "55.25 MHz");
        assert_eq!(format_frequency(868_250_000), "868.25 MHz");
    }

    #[test]
    fn test_frequency_band() {
        assert_eq!(frequency_band(42_250_000), None);
        assert_eq!(frequency_band(55_250_000), Some(Band::VhfLow));
        assert_eq!(frequency_band(143_250_000), Some(Band::VhfHigh));
        assert_eq!(frequency_band(471_250_000), Some(Band::Uhf));
        assert_eq!(frequency_band(868_250_000), Some(Band::Uhf));
        assert_eq!(frequency_band(900_000_000), None);
    }

    #[test]
    fn test_mhz_to_hz() {
        assert_eq!(mhz_to_hz(55.25), 55_250_000);
        assert_eq!(mhz_to_hz(473.0), 473_000_000);
        assert_eq!(mhz_to_hz(-1.0), 0);
    }
}
