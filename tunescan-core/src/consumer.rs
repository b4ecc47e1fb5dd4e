use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::driver::{DriverCommand, DriverEvent, DriverEventKind, LOCK_FULL, ScanStatus, ServiceType};
use crate::progress::{
    ATV_NUMBER, ATV_PROGRAM, AUTO_SEARCH_MODE, ChannelKind, DTV_NUMBER, DTV_PROGRAM,
    FIRST_FOUND_FREQUENCY, FinishReason, FoundInfoMap, RADIO_NUMBER, RADIO_PROGRAM,
    ScanNotification, ScanProgress, ScanSummary,
};
use crate::request::ScanRequest;
use crate::types::{AtvScanMode, ScanMode, SearchMode, SourceCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScanState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl ScanState {
    pub fn is_active(self) -> bool {
        self != ScanState::Stopped
    }
}

/// Who the session reports its end to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// A caller screen that closes when the scan exits
    Screen,
    /// Unattended single-channel search
    NumberSearch,
}

/// Request details the consumer needs while events arrive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub mode: ScanMode,
    pub source: SourceCategory,
    pub atv_scan_mode: AtvScanMode,
    pub search_mode: SearchMode,
    pub kind: SessionKind,
}

impl SessionContext {
    pub fn for_request(request: &ScanRequest, kind: SessionKind) -> Self {
        Self {
            mode: request.mode,
            source: request.source,
            atv_scan_mode: request.atv_scan_mode,
            search_mode: request.search_mode,
            kind,
        }
    }

    /// Keep the driver paused after an analog lock
    fn holds_auto_pause(&self) -> bool {
        self.source == SourceCategory::AtvOnly
            && self.atv_scan_mode == AtvScanMode::AllBand
            && (self.mode.is_manual() || self.search_mode == SearchMode::Manual)
    }

    /// Single-channel analog searches end when the driver reaches 100 %
    fn stops_at_analog_end(&self) -> bool {
        self.mode.is_manual() || self.kind == SessionKind::NumberSearch
    }
}

/// Side effect requested by the consumer, executed by the session actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Command(DriverCommand),
    Notify(ScanNotification),
    PersistState(ScanState),
    /// Publish the total channel count
    SetChannelCount(u32),
    /// Drop the demodulator overrides set for the scan
    ClearOverrides,
}

/// Session state machine driven by caller commands and driver events
#[derive(Debug, Default)]
pub struct ScanEventConsumer {
    state: ScanState,
    context: Option<SessionContext>,
    progress: ScanProgress,
    found: FoundInfoMap,
    stop_sent: bool,
}

impl ScanEventConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn progress(&self) -> &ScanProgress {
        &self.progress
    }

    pub fn found(&self) -> &FoundInfoMap {
        &self.found
    }

    /// Reset counters and enter `Running`
    pub fn begin(&mut self, context: SessionContext) -> Vec<Reaction> {
        self.state = ScanState::Running;
        self.context = Some(context);
        self.progress = ScanProgress::default();
        self.found = FoundInfoMap::new();
        self.stop_sent = false;
        info!(mode = ?context.mode, source = ?context.source, "Scan session started");

        vec![
            Reaction::PersistState(ScanState::Running),
            Reaction::Notify(ScanNotification::Started {
                mode: context.mode,
                source: context.source,
            }),
        ]
    }

    pub fn pause(&mut self) -> Vec<Reaction> {
        if self.state != ScanState::Running {
            debug!(state = ?self.state, "Pause ignored");
            return Vec::new();
        }
        self.state = ScanState::Paused;
        vec![
            Reaction::Command(DriverCommand::Pause),
            Reaction::PersistState(ScanState::Paused),
            Reaction::Notify(ScanNotification::Paused { by_driver: false }),
        ]
    }

    pub fn resume(&mut self) -> Vec<Reaction> {
        if self.state != ScanState::Paused {
            debug!(state = ?self.state, "Resume ignored");
            return Vec::new();
        }
        self.state = ScanState::Running;
        vec![
            Reaction::Command(DriverCommand::Resume),
            Reaction::PersistState(ScanState::Running),
            Reaction::Notify(ScanNotification::Resumed),
        ]
    }

    /// Caller stop, always forwarded to the driver
    pub fn stop(&mut self) -> Vec<Reaction> {
        self.stop_sent = true;
        let mut reactions = vec![Reaction::Command(DriverCommand::Stop)];
        if self.state.is_active() {
            reactions.extend(self.finalize(FinishReason::Stopped));
        }
        reactions
    }

    /// Stop issued by the session itself, at most once per session
    pub fn request_stop(&mut self) -> Option<Reaction> {
        if self.stop_sent {
            return None;
        }
        self.stop_sent = true;
        Some(Reaction::Command(DriverCommand::Stop))
    }

    /// Enter `Stopped` and publish the results
    pub fn finalize(&mut self, reason: FinishReason) -> Vec<Reaction> {
        self.state = ScanState::Stopped;
        info!(
            ?reason,
            tv = self.progress.tv_channels,
            radio = self.progress.radio_channels,
            "Scan session finished"
        );

        let mut reactions = vec![
            Reaction::SetChannelCount(self.progress.total_channels()),
            Reaction::ClearOverrides,
            Reaction::PersistState(ScanState::Stopped),
        ];
        let screen = self
            .context
            .is_none_or(|c| c.kind == SessionKind::Screen);
        if screen {
            reactions.push(Reaction::Notify(ScanNotification::Finished(ScanSummary {
                progress: self.progress.clone(),
                found: self.found.clone(),
                reason,
            })));
        }
        reactions
    }

    /// Process one driver event; `status` is the driver's current scan status
    pub fn handle_event(&mut self, event: &DriverEvent, status: ScanStatus) -> Vec<Reaction> {
        if self.state == ScanState::Stopped {
            trace!(kind = ?event.kind, "Event ignored while stopped");
            return Vec::new();
        }

        match event.kind {
            DriverEventKind::Progress => self.on_progress(event, status),
            DriverEventKind::StoreBegin => {
                debug!("Driver storing channels");
                Vec::new()
            }
            DriverEventKind::StoreEnd => vec![Reaction::Notify(ScanNotification::StoreSummary {
                tv_channels: self.progress.tv_channels,
                radio_channels: self.progress.radio_channels,
            })],
            DriverEventKind::ScanEnd => {
                self.progress.advance(100);
                let mut reactions = vec![Reaction::Notify(ScanNotification::Progress(
                    self.progress.clone(),
                ))];
                reactions.extend(self.request_stop());
                reactions
            }
            DriverEventKind::ScanExit => self.finalize(FinishReason::Completed),
        }
    }

    fn on_progress(&mut self, event: &DriverEvent, status: ScanStatus) -> Vec<Reaction> {
        let mut reactions = Vec::new();
        let context = self.context;

        self.progress.advance(event.percent);
        self.progress.signal.frequency = event.frequency;
        self.progress.signal.lock = event.lock;
        self.progress.signal.strength = event.strength;
        self.progress.signal.quality = event.quality;

        let found = if event.mode.is_analog() {
            if event.lock == LOCK_FULL {
                // a pause the caller asked for is never lifted here
                let driver_pause = status.is_paused()
                    && !status.is_user_paused()
                    && self.state == ScanState::Running;
                if driver_pause {
                    if context.is_some_and(|c| c.holds_auto_pause()) {
                        self.state = ScanState::Paused;
                        reactions.push(Reaction::PersistState(ScanState::Paused));
                        reactions.push(Reaction::Notify(ScanNotification::Paused {
                            by_driver: true,
                        }));
                    } else {
                        debug!("Driver paused on analog lock, resuming");
                        reactions.push(Reaction::Command(DriverCommand::Resume));
                    }
                }
                Some(ChannelKind::Analog)
            } else {
                None
            }
        } else if !event.program_name.is_empty() {
            match event.service_type {
                ServiceType::Tv => Some(ChannelKind::DigitalTv),
                ServiceType::Radio => Some(ChannelKind::Radio),
                ServiceType::Other(code) => {
                    debug!(code, name = %event.program_name, "Ignoring service type");
                    None
                }
            }
        } else {
            None
        };

        if let Some(kind) = found {
            self.record_found(kind, event.frequency);
            info!(?kind, frequency = event.frequency, name = %event.program_name, "New program");
            reactions.push(Reaction::Notify(ScanNotification::ChannelFound {
                kind,
                frequency: event.frequency,
                name: (!event.program_name.is_empty()).then(|| event.program_name.clone()),
            }));
        }

        reactions.push(Reaction::Notify(ScanNotification::Progress(
            self.progress.clone(),
        )));

        if event.mode.is_analog()
            && event.percent >= 100
            && context.is_some_and(|c| c.stops_at_analog_end())
        {
            reactions.extend(self.request_stop());
        }

        reactions
    }

    fn record_found(&mut self, kind: ChannelKind, frequency: u32) {
        let frequency = i64::from(frequency);
        let progress = &mut self.progress;
        let (program_key, number_key, count) = match kind {
            ChannelKind::Analog => {
                progress.tv_channels += 1;
                progress.atv_channels += 1;
                (ATV_PROGRAM, ATV_NUMBER, progress.atv_channels)
            }
            ChannelKind::DigitalTv => {
                progress.tv_channels += 1;
                progress.dtv_channels += 1;
                (DTV_PROGRAM, DTV_NUMBER, progress.dtv_channels)
            }
            ChannelKind::Radio => {
                progress.radio_channels += 1;
                (RADIO_PROGRAM, RADIO_NUMBER, progress.radio_channels)
            }
        };

        self.found.set_first(FIRST_FOUND_FREQUENCY, frequency);
        self.found.set_first(program_key, frequency);
        self.found.set(number_key, i64::from(count));
        if self
            .context
            .is_some_and(|c| c.mode == ScanMode::Auto && c.kind == SessionKind::Screen)
        {
            self.found.set_first(AUTO_SEARCH_MODE, 1);
        }
    }
}
