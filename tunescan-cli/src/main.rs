mod app;
mod logging;
mod tui;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tracing::{debug, info};
use tunescan_core::purge::plan_purge;
use tunescan_core::request::{self, CallerInput};
use tunescan_core::sim::SimulatedDriver;
use tunescan_core::{
    AtvScanMode, BroadcastStandard, CableSubMode, FrequencyBounds, MemoryChannelStore,
    MemorySystemControl, NumberSearchOutcome, ScanError, ScanHandle, ScanSession, ScanSettings,
    SearchMode, dispatch, format_frequency, frequency_band, mhz_to_hz, state_store,
};

use app::{Action, RunMode, RunState};
use tui::{AppEvent, EventHandler, RawModeGuard, handle_key};

/// tunescan - TV channel scan orchestrator running against a simulated tuner
#[derive(Parser, Debug)]
#[command(name = "tunescan")]
#[command(about = "Plan, dispatch and follow TV channel scans on a simulated tuner")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Settings file (defaults to <config dir>/tunescan/settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the scan state file (defaults to <cache dir>/tunescan)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long, global = true)]
    save: bool,

    /// Delay between simulated sweep steps in milliseconds
    #[arg(long, global = true, default_value_t = 40)]
    step_ms: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan every channel of the configured sources
    Auto {
        /// Lower bound in MHz
        #[arg(long, requires = "to")]
        from: Option<f64>,
        /// Upper bound in MHz
        #[arg(long, requires = "from")]
        to: Option<f64>,
    },
    /// Scan a frequency range or a single channel
    Manual {
        /// Range start in MHz; analog-only scans fall back to the tuner limits
        #[arg(long, requires = "to")]
        from: Option<f64>,
        /// Range end in MHz
        #[arg(long, requires = "from")]
        to: Option<f64>,
        /// Scan one channel number instead of a range
        #[arg(long, conflicts_with_all = ["from", "to"])]
        channel: Option<u32>,
    },
    /// Look for a program on one channel number, giving up after 30 s
    Number {
        number: u32,
    },
    /// Print the resolved plan and frequencies for a channel number
    Plan {
        number: u32,
    },
    /// Print the persisted scan state
    State,
}

/// Overrides for the settings file keys
#[derive(clap::Args, Debug, Default)]
struct SettingsArgs {
    /// Digital broadcast standard
    #[arg(long, global = true, value_enum)]
    standard: Option<StandardArg>,

    /// ATSC cable channel plan
    #[arg(long, global = true, value_enum)]
    cable: Option<CableArg>,

    /// Signal paths to scan
    #[arg(long, global = true, value_enum)]
    source: Option<SourceArg>,

    /// Analog scan strategy
    #[arg(long, global = true, value_enum)]
    atv_mode: Option<AtvModeArg>,

    /// Search mode preference
    #[arg(long, global = true, value_enum)]
    search_mode: Option<SearchModeArg>,

    /// Country code
    #[arg(long, global = true)]
    country: Option<String>,

    /// Treat the tuner as a combined analog/digital frontend
    #[arg(long, global = true)]
    combined_tuner: bool,
}

impl SettingsArgs {
    fn apply(&self, settings: &mut ScanSettings) {
        if let Some(standard) = self.standard {
            settings.dtv_standard = standard.into();
        }
        if let Some(cable) = self.cable {
            settings.cable_sub_mode = cable.into();
        }
        if let Some(source) = self.source {
            (settings.search_dtv, settings.search_atv) = match source {
                SourceArg::Dtv => (true, false),
                SourceArg::Atv => (false, true),
                SourceArg::Mixed => (true, true),
            };
        }
        if let Some(mode) = self.atv_mode {
            settings.atv_scan_mode = mode.into();
        }
        if let Some(mode) = self.search_mode {
            settings.search_mode = mode.into();
        }
        if let Some(country) = &self.country {
            settings.country = country.clone();
        }
        if self.combined_tuner {
            settings.combined_tuner = true;
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum StandardArg {
    Dtmb,
    DvbC,
    DvbT,
    DvbT2,
    AtscT,
    AtscC,
    IsdbT,
}

impl From<StandardArg> for BroadcastStandard {
    fn from(arg: StandardArg) -> Self {
        match arg {
            StandardArg::Dtmb => BroadcastStandard::Dtmb,
            StandardArg::DvbC => BroadcastStandard::DvbC,
            StandardArg::DvbT => BroadcastStandard::DvbT,
            StandardArg::DvbT2 => BroadcastStandard::DvbT2,
            StandardArg::AtscT => BroadcastStandard::AtscT,
            StandardArg::AtscC => BroadcastStandard::AtscC,
            StandardArg::IsdbT => BroadcastStandard::IsdbT,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum CableArg {
    Standard,
    Lrc,
    Hrc,
    Auto,
}

impl From<CableArg> for CableSubMode {
    fn from(arg: CableArg) -> Self {
        match arg {
            CableArg::Standard => CableSubMode::Standard,
            CableArg::Lrc => CableSubMode::Lrc,
            CableArg::Hrc => CableSubMode::Hrc,
            CableArg::Auto => CableSubMode::Auto,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SourceArg {
    Dtv,
    Atv,
    Mixed,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum AtvModeArg {
    FreqTable,
    AllBand,
}

impl From<AtvModeArg> for AtvScanMode {
    fn from(arg: AtvModeArg) -> Self {
        match arg {
            AtvModeArg::FreqTable => AtvScanMode::FreqTable,
            AtvModeArg::AllBand => AtvScanMode::AllBand,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SearchModeArg {
    Manual,
    Auto,
    Nit,
}

impl From<SearchModeArg> for SearchMode {
    fn from(arg: SearchModeArg) -> Self {
        match arg {
            SearchModeArg::Manual => SearchMode::Manual,
            SearchModeArg::Auto => SearchMode::Auto,
            SearchModeArg::Nit => SearchMode::Nit,
        }
    }
}

/// How the foreground scan is started
#[derive(Debug, Clone, Copy)]
enum Start {
    Screen(CallerInput),
    Number(u32),
}

fn main() -> Result<()> {
    color_eyre::install()?;
    logging::init_logger();

    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| dirs::config_dir().map(|d| d.join("tunescan").join("settings.toml")));
    let state_path = args
        .state_dir
        .clone()
        .or_else(|| dirs::cache_dir().map(|d| d.join("tunescan")))
        .map(|dir| state_store::state_path_in(&dir));

    let mut settings = match &config_path {
        Some(path) => ScanSettings::load(path)
            .wrap_err_with(|| format!("Failed to load settings from {}", path.display()))?,
        None => ScanSettings::default(),
    };
    args.settings.apply(&mut settings);

    if args.save
        && let Some(path) = &config_path
    {
        settings.save(path)?;
        info!(path = %path.display(), "Settings saved");
    }

    match args.command {
        Command::Auto { from, to } => {
            let input = match range_of(from, to) {
                Some(bounds) => CallerInput::auto_within(bounds),
                None => CallerInput::auto(),
            };
            run_scan(settings, Start::Screen(input), state_path, args.step_ms)
        }
        Command::Manual { from, to, channel } => {
            let input = match (channel, range_of(from, to)) {
                (Some(number), _) => CallerInput::manual_channel(number),
                (None, Some(bounds)) => CallerInput::manual_range(bounds.from, bounds.to),
                (None, None) => CallerInput {
                    bounds: None,
                    ..CallerInput::manual_range(0, 0)
                },
            };
            run_scan(settings, Start::Screen(input), state_path, args.step_ms)
        }
        Command::Number { number } => {
            run_scan(settings, Start::Number(number), state_path, args.step_ms)
        }
        Command::Plan { number } => print_plan(&settings, number),
        Command::State => {
            let path = state_path.ok_or_else(|| eyre!("No cache directory for the state file"))?;
            print_state(&path)
        }
    }
}

fn range_of(from: Option<f64>, to: Option<f64>) -> Option<FrequencyBounds> {
    Some(FrequencyBounds::new(mhz_to_hz(from?), mhz_to_hz(to?)))
}

/// Line printer that works in raw mode too
struct Output {
    raw: bool,
}

impl Output {
    fn line(&self, line: &str) {
        let mut stdout = io::stdout().lock();
        let end = if self.raw { "\r\n" } else { "\n" };
        let _ = write!(stdout, "{line}{end}");
        let _ = stdout.flush();
    }
}

fn run_scan(
    settings: ScanSettings,
    start: Start,
    state_path: Option<PathBuf>,
    step_ms: u64,
) -> Result<()> {
    let store = Arc::new(MemoryChannelStore::new());
    let driver = Arc::new(
        SimulatedDriver::demo()
            .with_step_delay(Duration::from_millis(step_ms))
            .with_channel_store(store.clone()),
    );

    let mut session = ScanSession::new(
        driver.clone(),
        store.clone(),
        Arc::new(MemorySystemControl::new()),
        Box::new(settings),
    );
    if let Some(path) = state_path {
        session = session.with_state_file(path);
    }
    let (handle, rx, worker) = session.spawn();
    driver.attach(handle.event_sink());

    let started = match start {
        Start::Screen(input) if input.mode.is_manual() => handle.start_manual(input),
        Start::Screen(input) => handle.start_auto(input.bounds),
        Start::Number(number) => handle.start_number_search(number),
    };
    if let Err(e) = started {
        let _ = handle.shutdown();
        let _ = worker.join();
        return Err(e.into());
    }

    let raw = RawModeGuard::enable();
    let out = Output { raw: raw.is_some() };
    if raw.is_some() {
        out.line("Keys: p pause/resume, q stop");
    }

    let events = EventHandler::new(50);
    let mut state = RunState::new();
    loop {
        while let Ok(notification) = rx.try_recv() {
            if let Some(line) = state.apply(notification) {
                out.line(&line);
            }
        }
        if state.is_done() {
            break;
        }

        if raw.is_some() {
            if let AppEvent::Key(key) = events.next()? {
                let action = handle_key(key, state.mode);
                handle_action(&handle, &mut state, action)?;
            }
        } else {
            // nobody can answer a held pause without a terminal
            if state.mode == RunMode::Paused {
                handle_action(&handle, &mut state, Action::Resume)?;
            }
            std::thread::sleep(events.tick_rate());
        }
    }
    drop(raw);

    match handle.shutdown() {
        Ok(()) | Err(ScanError::SessionClosed) => {}
        Err(e) => return Err(e.into()),
    }
    let last = worker
        .join()
        .map_err(|_| eyre!("Scan session thread panicked"))?;
    debug!(summary = ?last, "Session ended");

    let found = match (&state.summary, &state.outcome) {
        (Some(summary), _) => Some(&summary.found),
        (None, Some(NumberSearchOutcome::Found { info, .. })) => Some(info),
        _ => None,
    };
    if let Some(found) = found.filter(|f| !f.is_empty()) {
        println!("\nFound:");
        for (key, value) in found.iter() {
            println!("  {key:<22} {value}");
        }
    }

    let channels = store.channels();
    if !channels.is_empty() {
        println!("\nChannel list:");
        for channel in channels {
            let standard = channel.standard.map_or("ATV", BroadcastStandard::name);
            println!(
                "  {:<7} {:>11}  {}",
                standard,
                format_frequency(channel.frequency),
                channel.name
            );
        }
    }
    Ok(())
}

fn handle_action(handle: &ScanHandle, state: &mut RunState, action: Action) -> Result<()> {
    match action {
        Action::Pause => handle.pause()?,
        Action::Resume => handle.resume()?,
        Action::Stop => {
            state.request_stop();
            handle.stop()?;
        }
        Action::Tick => {}
    }
    Ok(())
}

fn print_plan(settings: &ScanSettings, number: u32) -> Result<()> {
    let driver = SimulatedDriver::demo();
    let request = request::resolve(settings, &driver, &CallerInput::manual_channel(number))?;

    println!("Standard:      {}", request.standard.name());
    println!("Source:        {:?}", request.source);
    match (request.plan, request.atv_plan) {
        (Some(plan), Some(atv_plan)) => println!(
            "Plan:          {:?} (code {}, analog code {})",
            plan.family,
            plan.code(),
            atv_plan.code()
        ),
        _ => println!("Plan:          none"),
    }
    if let Some(frequency) = request.dtv_frequency {
        println!("DTV frequency: {}", format_frequency(frequency));
    }
    if let Some(frequency) = request.atv_frequency {
        let band = frequency_band(frequency).map_or("out of band", |b| b.name());
        println!("ATV frequency: {} ({band})", format_frequency(frequency));
    }
    println!("Command:       {:?}", dispatch::dispatch(&request));

    let auto = request::resolve(settings, &driver, &CallerInput::auto())?;
    let purge = plan_purge(&auto, settings.dtv_rescan_purge);
    if purge.is_empty() {
        println!("Auto purge:    nothing");
    } else {
        println!("Auto purge:    {:?}", purge.actions);
    }
    Ok(())
}

fn print_state(path: &Path) -> Result<()> {
    let record = state_store::load_or_stopped(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    let age = SystemTime::now()
        .duration_since(record.updated_at)
        .unwrap_or_default();

    println!("State file:    {}", path.display());
    println!("State:         {:?}", record.state);
    if let Some(mode) = record.mode {
        println!("Mode:          {mode:?}");
    }
    if let Some(source) = record.source {
        println!("Source:        {source:?}");
    }
    println!("Number search: {}", record.number_search);
    println!("Channels:      {}", record.channel_count);
    println!("Updated:       {}s ago", age.as_secs());
    if record.was_interrupted() {
        println!("The last scan did not finish; the next session will stop the driver.");
    }
    Ok(())
}
