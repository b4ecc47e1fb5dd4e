use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::config::ConfigStore;
use crate::consumer::{Reaction, ScanEventConsumer, ScanState, SessionContext, SessionKind};
use crate::dispatch;
use crate::driver::{DriverCommand, DriverEvent, DriverEventKind, FrequencyBounds, ScanDriver};
use crate::error::{Result, ScanError};
use crate::number_search::{self, NUMBER_SEARCH_TIMEOUT, NumberSearchController};
use crate::progress::{ScanNotification, ScanSummary};
use crate::purge::{self, ChannelStore};
use crate::request::{self, CallerInput};
use crate::state_store::{self, ScanStateRecord};
use crate::system::SystemControl;

enum SessionMessage {
    Start {
        input: CallerInput,
        reply: Sender<Result<()>>,
    },
    NumberSearch {
        number: u32,
        reply: Sender<Result<()>>,
    },
    Pause,
    Resume,
    Stop,
    Shutdown,
    Driver(DriverEvent),
}

/// Caller side of a running session
#[derive(Debug, Clone)]
pub struct ScanHandle {
    tx: Sender<SessionMessage>,
}

impl ScanHandle {
    /// Start a manual range or channel-number scan
    pub fn start_manual(&self, input: CallerInput) -> Result<()> {
        if !input.mode.is_manual() {
            return Err(ScanError::Config(format!(
                "{:?} is not a manual scan mode",
                input.mode
            )));
        }
        self.request(|reply| SessionMessage::Start { input, reply })
    }

    /// Start an auto scan, optionally limited to `bounds`
    pub fn start_auto(&self, bounds: Option<FrequencyBounds>) -> Result<()> {
        let input = match bounds {
            Some(bounds) => CallerInput::auto_within(bounds),
            None => CallerInput::auto(),
        };
        self.request(|reply| SessionMessage::Start { input, reply })
    }

    /// Search for a single user-facing channel number
    pub fn start_number_search(&self, number: u32) -> Result<()> {
        self.request(|reply| SessionMessage::NumberSearch { number, reply })
    }

    pub fn pause(&self) -> Result<()> {
        self.send(SessionMessage::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(SessionMessage::Resume)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(SessionMessage::Stop)
    }

    /// Stop any running scan and end the session thread
    pub fn shutdown(&self) -> Result<()> {
        self.send(SessionMessage::Shutdown)
    }

    /// Sink to hand to the driver for its events
    pub fn event_sink(&self) -> DriverEventSink {
        DriverEventSink {
            tx: self.tx.clone(),
        }
    }

    fn send(&self, message: SessionMessage) -> Result<()> {
        self.tx.send(message).map_err(|_| ScanError::SessionClosed)
    }

    fn request(&self, make: impl FnOnce(Sender<Result<()>>) -> SessionMessage) -> Result<()> {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.send(make(reply))?;
        rx.recv().map_err(|_| ScanError::SessionClosed)?
    }
}

/// Driver callback entry point into the session queue
#[derive(Debug, Clone)]
pub struct DriverEventSink {
    tx: Sender<SessionMessage>,
}

impl DriverEventSink {
    /// Queue an event; `false` once the session is gone
    pub fn deliver(&self, event: DriverEvent) -> bool {
        self.tx.send(SessionMessage::Driver(event)).is_ok()
    }
}

/// Scan session wiring
pub struct ScanSession {
    driver: Arc<dyn ScanDriver>,
    channels: Arc<dyn ChannelStore>,
    system: Arc<dyn SystemControl>,
    config: Box<dyn ConfigStore>,
    state_path: Option<PathBuf>,
    number_search_timeout: Duration,
}

impl ScanSession {
    pub fn new(
        driver: Arc<dyn ScanDriver>,
        channels: Arc<dyn ChannelStore>,
        system: Arc<dyn SystemControl>,
        config: Box<dyn ConfigStore>,
    ) -> Self {
        Self {
            driver,
            channels,
            system,
            config,
            state_path: None,
            number_search_timeout: NUMBER_SEARCH_TIMEOUT,
        }
    }

    /// Persist the searching state to `path`
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_path = Some(path);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_number_search_timeout(mut self, timeout: Duration) -> Self {
        self.number_search_timeout = timeout;
        self
    }

    /// Start the session thread
    /// Returns the caller handle, the notification stream and the thread handle,
    /// which yields the summary of the last finished screen-bound scan
    pub fn spawn(
        self,
    ) -> (
        ScanHandle,
        Receiver<ScanNotification>,
        JoinHandle<Option<ScanSummary>>,
    ) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (notify_tx, notify_rx) = crossbeam_channel::unbounded();

        let actor = Actor {
            session: self,
            notify: notify_tx,
            consumer: ScanEventConsumer::new(),
            number_search: None,
            last_summary: None,
            driver_busy: false,
        };
        let worker = std::thread::spawn(move || actor.run(rx));

        (ScanHandle { tx }, notify_rx, worker)
    }
}

struct Actor {
    session: ScanSession,
    notify: Sender<ScanNotification>,
    consumer: ScanEventConsumer,
    number_search: Option<NumberSearchController>,
    last_summary: Option<ScanSummary>,
    /// A start command went out and its `ScanExit` has not arrived yet
    driver_busy: bool,
}

impl Actor {
    fn run(mut self, rx: Receiver<SessionMessage>) -> Option<ScanSummary> {
        self.recover();

        loop {
            let deadline = self.number_search.as_ref().map(|c| c.deadline());
            let message = match deadline {
                Some(deadline) => match rx.recv_deadline(deadline) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => {
                        self.on_deadline();
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            if !self.handle(message) {
                break;
            }
        }

        debug!("Scan session thread exiting");
        self.last_summary
    }

    /// Returns `false` when the session should end
    fn handle(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::Start { input, reply } => {
                let result = self.start_screen(input);
                if let Err(e) = &result {
                    warn!("Scan rejected: {e}");
                }
                let _ = reply.send(result);
            }
            SessionMessage::NumberSearch { number, reply } => {
                let result = self.start_number_search(number);
                if let Err(e) = &result {
                    warn!("Number search rejected: {e}");
                }
                let _ = reply.send(result);
            }
            SessionMessage::Pause => {
                let reactions = self.consumer.pause();
                self.execute(reactions);
            }
            SessionMessage::Resume => {
                let reactions = self.consumer.resume();
                self.execute(reactions);
            }
            SessionMessage::Stop => {
                if self.driver_busy && !self.consumer.state().is_active() {
                    warn!("Driver still has not exited, releasing it on caller stop");
                    self.driver_busy = false;
                }
                let reactions = self.consumer.stop();
                self.execute(reactions);
                self.observe_number_search();
            }
            SessionMessage::Driver(event) => {
                if event.kind == DriverEventKind::ScanExit {
                    self.driver_busy = false;
                }
                let status = self.session.driver.scan_status();
                let reactions = self.consumer.handle_event(&event, status);
                self.execute(reactions);
                self.observe_number_search();
            }
            SessionMessage::Shutdown => {
                if self.consumer.state().is_active() {
                    let reactions = self.consumer.stop();
                    self.execute(reactions);
                    self.observe_number_search();
                }
                return false;
            }
        }
        true
    }

    fn start_screen(&mut self, input: CallerInput) -> Result<()> {
        self.ensure_idle()?;

        let settings = self.session.config.snapshot();
        let request = request::resolve(&settings, self.session.driver.as_ref(), &input)?;
        let command = dispatch::dispatch(&request);

        purge::purge_before(
            &request,
            settings.dtv_rescan_purge,
            self.session.channels.as_ref(),
        );
        dispatch::apply_overrides(
            dispatch::overrides_for(&request),
            self.session.system.as_ref(),
        );

        let reactions = self
            .consumer
            .begin(SessionContext::for_request(&request, SessionKind::Screen));
        self.execute(reactions);
        self.execute(vec![Reaction::Command(command)]);
        Ok(())
    }

    fn start_number_search(&mut self, number: u32) -> Result<()> {
        self.ensure_idle()?;

        let settings = self.session.config.snapshot();
        let (request, command) =
            number_search::prepare(&settings, self.session.driver.as_ref(), number)?;
        dispatch::apply_overrides(
            dispatch::overrides_for(&request),
            self.session.system.as_ref(),
        );

        self.number_search = Some(NumberSearchController::with_timeout(
            number,
            Instant::now(),
            self.session.number_search_timeout,
        ));
        let reactions = self
            .consumer
            .begin(SessionContext::for_request(&request, SessionKind::NumberSearch));
        self.execute(reactions);
        self.execute(vec![Reaction::Command(command)]);
        Ok(())
    }

    /// A stopped scan's driver may still be storing channels until it exits
    fn ensure_idle(&self) -> Result<()> {
        if self.consumer.state().is_active() {
            return Err(ScanError::SessionBusy);
        }
        if self.driver_busy {
            return Err(ScanError::DriverHang);
        }
        Ok(())
    }

    fn observe_number_search(&mut self) {
        let Some(mut controller) = self.number_search.take() else {
            return;
        };
        let reactions = controller.observe(&mut self.consumer);
        self.execute(reactions);
        if !controller.is_finished() {
            self.number_search = Some(controller);
        }
    }

    fn on_deadline(&mut self) {
        if let Some(mut controller) = self.number_search.take() {
            let reactions = controller.on_timeout(&mut self.consumer);
            self.execute(reactions);
        }
    }

    fn execute(&mut self, reactions: Vec<Reaction>) {
        for reaction in reactions {
            match reaction {
                Reaction::Command(command) => {
                    if command.is_start() {
                        self.driver_busy = true;
                    }
                    dispatch::send(self.session.driver.as_ref(), &command)
                }
                Reaction::Notify(notification) => {
                    if let ScanNotification::Finished(summary) = &notification {
                        self.last_summary = Some(summary.clone());
                    }
                    let _ = self.notify.send(notification);
                }
                Reaction::PersistState(state) => self.persist(state),
                Reaction::SetChannelCount(count) => self.session.system.set_channel_count(count),
                Reaction::ClearOverrides => {
                    self.session.system.set_auto_standard_detect(false);
                    self.session.system.set_qam_fast_search(false);
                }
            }
        }
    }

    fn persist(&mut self, state: ScanState) {
        let Some(path) = &self.session.state_path else {
            return;
        };
        let context = self.consumer.context();
        let record = ScanStateRecord {
            state,
            mode: context.map(|c| c.mode),
            source: context.map(|c| c.source),
            number_search: context.is_some_and(|c| c.kind == SessionKind::NumberSearch),
            channel_count: self.consumer.progress().total_channels(),
            updated_at: SystemTime::now(),
        };
        if let Err(e) = state_store::save_state(path, &record) {
            warn!(path = %path.display(), "Failed to persist scan state: {e}");
            let _ = self.notify.send(ScanNotification::Error(e.to_string()));
        }
    }

    /// A session that died mid-scan left the driver running
    fn recover(&mut self) {
        let Some(path) = self.session.state_path.clone() else {
            return;
        };
        match state_store::load_or_stopped(&path) {
            Ok(record) if record.was_interrupted() => {
                warn!(state = ?record.state, "Previous scan was interrupted, stopping driver");
                dispatch::send(self.session.driver.as_ref(), &DriverCommand::Stop);
                self.persist(ScanState::Stopped);
                let _ = self.notify.send(ScanNotification::Recovered(record.state));
            }
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), "Ignoring unreadable scan state: {e}"),
        }
    }
}
