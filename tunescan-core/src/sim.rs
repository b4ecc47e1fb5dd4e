use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace};

use crate::driver::{
    AtvScanType, DriverCommand, DriverEvent, DtvScanType, FeParams, FreqEntry, FrequencyBounds,
    ModeCode, ScanDriver, ScanOrder, ScanParams, ScanProc, ScanStatus, ServiceType,
};
use crate::purge::{MemoryChannelStore, StoredChannel};
use crate::session::DriverEventSink;
use crate::types::{BroadcastStandard, ColorSystem, FeMode, SoundSystem};

/// Hardware analog range, 42.25 to 868.25 MHz
pub const ATV_LIMITS: FrequencyBounds = FrequencyBounds {
    from: 42_250_000,
    to: 868_250_000,
};

const ATSC_ROWS: u32 = 68;
const ATSC_BASE: u32 = 51_000_000;
const ATSC_STEP: u32 = 6_000_000;
/// Analog carrier sits below the digital row frequency
const ATSC_ATV_OFFSET: u32 = 1_750_000;
const UHF_FIRST: u32 = 21;
const UHF_LAST: u32 = 69;
const UHF_BASE: u32 = 474_000_000;
const UHF_STEP: u32 = 8_000_000;
const MATCH_TOLERANCE: u32 = 1_000_000;
/// Grid points of an analog sweep
const SWEEP_STEPS: u32 = 40;

/// Channel table the simulated hardware reports for `mode`
pub fn sim_frequency_table(mode: ModeCode) -> Vec<FreqEntry> {
    if mode.is_atsc() {
        let atv = mode.list() > 5;
        (1..=ATSC_ROWS)
            .map(|n| {
                let frequency = ATSC_BASE + n * ATSC_STEP;
                FreqEntry {
                    channel_number: n,
                    frequency: if atv {
                        frequency - ATSC_ATV_OFFSET
                    } else {
                        frequency
                    },
                }
            })
            .collect()
    } else {
        (UHF_FIRST..=UHF_LAST)
            .map(|n| FreqEntry {
                channel_number: n,
                frequency: UHF_BASE + (n - UHF_FIRST) * UHF_STEP,
            })
            .collect()
    }
}

/// Driver that records commands and replays scripted answers
#[derive(Debug)]
pub struct RecordingDriver {
    commands: Mutex<Vec<DriverCommand>>,
    table: Mutex<Option<Vec<FreqEntry>>>,
    status: AtomicU32,
    limits: FrequencyBounds,
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            table: Mutex::new(None),
            status: AtomicU32::new(0),
            limits: ATV_LIMITS,
        }
    }

    /// Answer every table request with `table`
    pub fn set_table(&self, table: Vec<FreqEntry>) {
        if let Ok(mut t) = self.table.lock() {
            *t = Some(table);
        }
    }

    pub fn set_status(&self, bits: u32) {
        self.status.store(bits, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<DriverCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, command: DriverCommand) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command);
        }
    }
}

impl ScanDriver for RecordingDriver {
    fn atv_auto_scan(&self, video_std: ColorSystem, audio_std: SoundSystem, freq_min: u32, freq_max: u32) {
        self.record(DriverCommand::AtvAutoScan {
            video_std,
            audio_std,
            freq_min,
            freq_max,
        });
    }

    fn atv_manual_scan(&self, freq_from: u32, freq_to: u32, video_std: ColorSystem, audio_std: SoundSystem) {
        self.record(DriverCommand::AtvManualScan {
            freq_from,
            freq_to,
            video_std,
            audio_std,
        });
    }

    fn dtv_auto_scan(&self, mode: ModeCode) {
        self.record(DriverCommand::DtvAutoScan { mode });
    }

    fn dtv_manual_scan(&self, mode: ModeCode, frequency: u32) {
        self.record(DriverCommand::DtvManualScan { mode, frequency });
    }

    fn tv_scan(&self, fe: &FeParams, scan: &ScanParams) {
        self.record(DriverCommand::TvScan {
            fe: fe.clone(),
            scan: scan.clone(),
        });
    }

    fn stop_scan(&self) {
        self.record(DriverCommand::Stop);
    }

    fn pause_scan(&self) {
        self.record(DriverCommand::Pause);
    }

    fn resume_scan(&self) {
        self.record(DriverCommand::Resume);
    }

    fn scan_frequency_table(&self, mode: ModeCode) -> Vec<FreqEntry> {
        self.table
            .lock()
            .ok()
            .and_then(|t| t.clone())
            .unwrap_or_else(|| sim_frequency_table(mode))
    }

    fn scan_status(&self) -> ScanStatus {
        ScanStatus(self.status.load(Ordering::SeqCst))
    }

    fn atv_min_max_frequency(&self) -> FrequencyBounds {
        self.limits
    }
}

/// One transmitter the simulated tuner can lock onto
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimStation {
    Analog {
        frequency: u32,
    },
    Digital {
        frequency: u32,
        programs: Vec<(String, ServiceType)>,
    },
}

impl SimStation {
    pub fn frequency(&self) -> u32 {
        match self {
            SimStation::Analog { frequency } | SimStation::Digital { frequency, .. } => *frequency,
        }
    }

    fn digital(frequency: u32, programs: &[(&str, ServiceType)]) -> Self {
        SimStation::Digital {
            frequency,
            programs: programs
                .iter()
                .map(|(name, service)| (name.to_string(), *service))
                .collect(),
        }
    }
}

/// A stretch of the sweep on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Analog,
    Digital(ModeCode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SweepPlan {
    steps: Vec<(Side, u32)>,
    auto_pause: bool,
}

struct SimControl {
    status: AtomicU32,
    stop: AtomicBool,
    /// A newer scan replaced this sweep, no exit event
    superseded: AtomicBool,
}

/// Threaded tuner simulation, replays a band sweep through a [`DriverEventSink`]
pub struct SimulatedDriver {
    stations: Vec<SimStation>,
    step_delay: Duration,
    sink: Mutex<Option<DriverEventSink>>,
    control: Arc<SimControl>,
    worker: Mutex<Option<JoinHandle<()>>>,
    channels: Option<Arc<MemoryChannelStore>>,
}

impl SimulatedDriver {
    pub fn new(stations: Vec<SimStation>) -> Self {
        Self {
            stations,
            step_delay: Duration::from_millis(40),
            sink: Mutex::new(None),
            control: Arc::new(SimControl {
                status: AtomicU32::new(0),
                stop: AtomicBool::new(false),
                superseded: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
            channels: None,
        }
    }

    /// A small mixed lineup on the simulated channel grids
    pub fn demo() -> Self {
        Self::new(vec![
            SimStation::Analog {
                frequency: 55_250_000,
            },
            SimStation::Analog {
                frequency: 61_250_000,
            },
            SimStation::Analog {
                frequency: 175_250_000,
            },
            SimStation::digital(
                177_000_000,
                &[
                    ("KSIM-HD", ServiceType::Tv),
                    ("KSIM-SD", ServiceType::Tv),
                    ("KSIM Radio", ServiceType::Radio),
                ],
            ),
            SimStation::digital(405_000_000, &[("Metro One", ServiceType::Tv)]),
            SimStation::Analog {
                frequency: 471_250_000,
            },
            SimStation::digital(
                474_000_000,
                &[("Sim 1", ServiceType::Tv), ("Sim Data", ServiceType::Other(12))],
            ),
            SimStation::digital(522_000_000, &[("Sim 2", ServiceType::Tv), ("Sim FM", ServiceType::Radio)]),
        ])
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Store found channels into `channels` when the sweep ends
    pub fn with_channel_store(mut self, channels: Arc<MemoryChannelStore>) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Route events into a session
    pub fn attach(&self, sink: DriverEventSink) {
        if let Ok(mut s) = self.sink.lock() {
            *s = Some(sink);
        }
    }

    fn start(&self, plan: SweepPlan) {
        self.halt_worker();

        let Some(sink) = self.sink.lock().ok().and_then(|s| s.clone()) else {
            debug!("No event sink attached, scan command dropped");
            return;
        };

        self.control.stop.store(false, Ordering::SeqCst);
        self.control.superseded.store(false, Ordering::SeqCst);
        self.control.status.store(0, Ordering::SeqCst);

        let control = Arc::clone(&self.control);
        let stations = self.stations.clone();
        let channels = self.channels.clone();
        let delay = self.step_delay;
        let handle = std::thread::spawn(move || {
            run_sweep(plan, &stations, &control, &sink, channels.as_deref(), delay)
        });

        if let Ok(mut worker) = self.worker.lock() {
            *worker = Some(handle);
        }
    }

    fn halt_worker(&self) {
        let previous = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = previous {
            self.control.superseded.store(true, Ordering::SeqCst);
            self.control.stop.store(true, Ordering::SeqCst);
            let _ = handle.join();
        }
    }

    fn plan_for(&self, command: &DriverCommand) -> SweepPlan {
        match command {
            DriverCommand::AtvAutoScan {
                freq_min, freq_max, ..
            } => SweepPlan {
                steps: self.analog_steps(FrequencyBounds::new(*freq_min, *freq_max)),
                auto_pause: false,
            },
            DriverCommand::AtvManualScan {
                freq_from, freq_to, ..
            } => SweepPlan {
                steps: self.analog_steps(FrequencyBounds::new(*freq_from, *freq_to)),
                auto_pause: false,
            },
            DriverCommand::DtvAutoScan { mode } => SweepPlan {
                steps: digital_steps(*mode, None),
                auto_pause: false,
            },
            DriverCommand::DtvManualScan { mode, frequency } => SweepPlan {
                steps: vec![(Side::Digital(*mode), *frequency)],
                auto_pause: false,
            },
            DriverCommand::TvScan { fe, scan } => self.combined_plan(fe, scan),
            DriverCommand::Stop | DriverCommand::Pause | DriverCommand::Resume => SweepPlan {
                steps: Vec::new(),
                auto_pause: false,
            },
        }
    }

    fn combined_plan(&self, fe: &FeParams, scan: &ScanParams) -> SweepPlan {
        let atv = match scan.atv_type {
            AtvScanType::None => Vec::new(),
            _ => self.analog_steps(scan.atv_window),
        };
        let dtv = match scan.dtv_type {
            DtvScanType::None => Vec::new(),
            DtvScanType::Auto | DtvScanType::AllBand => digital_steps(fe.mode, None),
            DtvScanType::Manual if scan.dtv_window.span() == 0 => {
                vec![(Side::Digital(fe.mode), scan.dtv_window.from)]
            }
            DtvScanType::Manual => digital_steps(fe.mode, Some(scan.dtv_window)),
        };

        let steps = match scan.order {
            ScanOrder::AtvThenDtv => atv.into_iter().chain(dtv).collect(),
            ScanOrder::DtvThenAtv => dtv.into_iter().chain(atv).collect(),
        };
        SweepPlan {
            steps,
            auto_pause: scan.proc_mode == ScanProc::AutoPauseOnAtvFound,
        }
    }

    /// Grid across the window plus every analog station inside it
    fn analog_steps(&self, window: FrequencyBounds) -> Vec<(Side, u32)> {
        let window = if window.high() == 0 { ATV_LIMITS } else { window };
        if window.span() == 0 {
            return vec![(Side::Analog, window.from)];
        }

        let step = (window.span() / SWEEP_STEPS).max(1);
        let mut points: Vec<u32> = (0..=SWEEP_STEPS)
            .map(|i| window.low().saturating_add(i * step).min(window.high()))
            .collect();
        points.extend(
            self.stations
                .iter()
                .filter(|s| matches!(s, SimStation::Analog { .. }))
                .map(SimStation::frequency)
                .filter(|f| window.contains(*f)),
        );
        points.sort_unstable();
        points.dedup();
        points.into_iter().map(|f| (Side::Analog, f)).collect()
    }
}

fn digital_steps(mode: ModeCode, window: Option<FrequencyBounds>) -> Vec<(Side, u32)> {
    sim_frequency_table(mode)
        .into_iter()
        .map(|e| e.frequency)
        .filter(|f| window.is_none_or(|w| w.contains(*f)))
        .map(|f| (Side::Digital(mode), f))
        .collect()
}

fn standard_of(mode: ModeCode) -> Option<BroadcastStandard> {
    match mode.base()? {
        FeMode::Atsc if mode.generation() == 1 => Some(BroadcastStandard::AtscC),
        FeMode::Atsc => Some(BroadcastStandard::AtscT),
        FeMode::Ofdm if mode.generation() == 1 => Some(BroadcastStandard::DvbT2),
        FeMode::Ofdm => Some(BroadcastStandard::DvbT),
        FeMode::Qam => Some(BroadcastStandard::DvbC),
        FeMode::Dtmb => Some(BroadcastStandard::Dtmb),
        FeMode::Isdbt => Some(BroadcastStandard::IsdbT),
        FeMode::Qpsk | FeMode::Analog => None,
    }
}

fn run_sweep(
    plan: SweepPlan,
    stations: &[SimStation],
    control: &SimControl,
    sink: &DriverEventSink,
    channels: Option<&MemoryChannelStore>,
    delay: Duration,
) {
    let total = plan.steps.len().max(1);
    let mut found = Vec::new();

    for (i, (side, frequency)) in plan.steps.iter().enumerate() {
        while control.status.load(Ordering::SeqCst) & ScanStatus::PAUSED != 0
            && !control.stop.load(Ordering::SeqCst)
        {
            std::thread::sleep(Duration::from_millis(5));
        }
        if control.stop.load(Ordering::SeqCst) {
            break;
        }

        let percent = (((i + 1) * 100) / total) as u8;
        let nearby = stations
            .iter()
            .filter(|s| s.frequency().abs_diff(*frequency) < MATCH_TOLERANCE);

        let mut events = Vec::new();
        match side {
            Side::Analog => {
                for station in nearby {
                    if let SimStation::Analog { frequency } = station {
                        if plan.auto_pause {
                            control.status.fetch_or(ScanStatus::PAUSED, Ordering::SeqCst);
                        }
                        events.push(DriverEvent::analog_lock(percent, *frequency));
                        found.push(StoredChannel {
                            standard: None,
                            frequency: *frequency,
                            name: format!("{:.2} MHz", *frequency as f64 / 1e6),
                        });
                    }
                }
                if events.is_empty() {
                    events.push(DriverEvent::progress(ModeCode::analog(), percent, *frequency));
                }
            }
            Side::Digital(mode) => {
                for station in nearby {
                    if let SimStation::Digital { frequency, programs } = station {
                        for (name, service) in programs {
                            events.push(DriverEvent::digital_program(
                                *mode, percent, *frequency, name, *service,
                            ));
                            found.push(StoredChannel {
                                standard: standard_of(*mode),
                                frequency: *frequency,
                                name: name.clone(),
                            });
                        }
                    }
                }
                if events.is_empty() {
                    events.push(DriverEvent::progress(*mode, percent, *frequency));
                }
            }
        }

        for event in events {
            trace!(?event, "Simulated event");
            if !sink.deliver(event) {
                return;
            }
        }
        std::thread::sleep(delay);
    }

    if !control.stop.load(Ordering::SeqCst) {
        sink.deliver(DriverEvent::store_begin());
        if let Some(store) = channels {
            for channel in found {
                store.upsert(channel);
            }
        }
        sink.deliver(DriverEvent::store_end());
        sink.deliver(DriverEvent::scan_end());

        while !control.stop.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    if !control.superseded.load(Ordering::SeqCst) {
        sink.deliver(DriverEvent::scan_exit());
    }
}

impl ScanDriver for SimulatedDriver {
    fn atv_auto_scan(&self, video_std: ColorSystem, audio_std: SoundSystem, freq_min: u32, freq_max: u32) {
        self.start(self.plan_for(&DriverCommand::AtvAutoScan {
            video_std,
            audio_std,
            freq_min,
            freq_max,
        }));
    }

    fn atv_manual_scan(&self, freq_from: u32, freq_to: u32, video_std: ColorSystem, audio_std: SoundSystem) {
        self.start(self.plan_for(&DriverCommand::AtvManualScan {
            freq_from,
            freq_to,
            video_std,
            audio_std,
        }));
    }

    fn dtv_auto_scan(&self, mode: ModeCode) {
        self.start(self.plan_for(&DriverCommand::DtvAutoScan { mode }));
    }

    fn dtv_manual_scan(&self, mode: ModeCode, frequency: u32) {
        self.start(self.plan_for(&DriverCommand::DtvManualScan { mode, frequency }));
    }

    fn tv_scan(&self, fe: &FeParams, scan: &ScanParams) {
        self.start(self.combined_plan(fe, scan));
    }

    fn stop_scan(&self) {
        self.control.stop.store(true, Ordering::SeqCst);
        self.control.status.store(0, Ordering::SeqCst);
    }

    fn pause_scan(&self) {
        self.control
            .status
            .fetch_or(ScanStatus::PAUSED | ScanStatus::PAUSED_USER, Ordering::SeqCst);
    }

    fn resume_scan(&self) {
        self.control.status.store(0, Ordering::SeqCst);
    }

    fn scan_frequency_table(&self, mode: ModeCode) -> Vec<FreqEntry> {
        sim_frequency_table(mode)
    }

    fn scan_status(&self) -> ScanStatus {
        ScanStatus(self.control.status.load(Ordering::SeqCst))
    }

    fn atv_min_max_frequency(&self) -> FrequencyBounds {
        ATV_LIMITS
    }
}

impl Drop for SimulatedDriver {
    fn drop(&mut self) {
        self.halt_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BroadcastStandard;

    #[test]
    fn test_atsc_table_analog_variant() {
        let dtv = sim_frequency_table(ModeCode::for_standard(BroadcastStandard::AtscT).with_list(5));
        let atv = sim_frequency_table(ModeCode::for_standard(BroadcastStandard::AtscT).with_list(10));
        assert_eq!(dtv[0].frequency, 57_000_000);
        assert_eq!(atv[0].frequency, 55_250_000);
        assert_eq!(dtv.len(), ATSC_ROWS as usize);
    }

    #[test]
    fn test_uhf_table() {
        let table = sim_frequency_table(ModeCode::for_standard(BroadcastStandard::DvbT));
        assert_eq!(table[0], FreqEntry { channel_number: 21, frequency: 474_000_000 });
        assert_eq!(table.last().map(|e| e.channel_number), Some(69));
    }

    #[test]
    fn test_analog_plan_includes_stations() {
        let driver = SimulatedDriver::demo();
        let steps = driver.analog_steps(FrequencyBounds::new(50_000_000, 70_000_000));
        let freqs: Vec<u32> = steps.iter().map(|(_, f)| *f).collect();
        assert!(freqs.contains(&55_250_000));
        assert!(freqs.contains(&61_250_000));
        assert!(freqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_combined_plan_order() {
        let driver = SimulatedDriver::demo();
        let fe = FeParams {
            mode: ModeCode::for_standard(BroadcastStandard::DvbT),
            video_std: ColorSystem::Auto,
            audio_std: SoundSystem::Auto,
            modulation: None,
            symbol_rate: None,
        };
        let scan = ScanParams {
            order: ScanOrder::DtvThenAtv,
            atv_type: AtvScanType::Freq,
            dtv_type: DtvScanType::Manual,
            atv_window: FrequencyBounds::at(471_250_000),
            dtv_window: FrequencyBounds::at(474_000_000),
            proc_mode: ScanProc::AutoPauseOnAtvFound,
            atv_modifier: None,
        };
        let plan = driver.combined_plan(&fe, &scan);
        assert_eq!(
            plan.steps,
            vec![(Side::Digital(fe.mode), 474_000_000), (Side::Analog, 471_250_000)]
        );
        assert!(plan.auto_pause);
    }

    #[test]
    fn test_standard_from_mode() {
        for standard in BroadcastStandard::ALL {
            assert_eq!(standard_of(ModeCode::for_standard(standard)), Some(standard));
        }
        assert_eq!(standard_of(ModeCode::analog()), None);
    }
}
