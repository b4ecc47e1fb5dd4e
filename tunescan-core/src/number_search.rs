use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::ScanSettings;
use crate::consumer::{Reaction, ScanEventConsumer};
use crate::dispatch;
use crate::driver::{DriverCommand, ScanDriver};
use crate::error::{Result, ScanError};
use crate::progress::{FinishReason, NumberSearchOutcome, ScanNotification};
use crate::request::{self, CallerInput, ScanRequest};

/// How long a number search waits for a program before giving up
pub const NUMBER_SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolve channel `number` into a bounded single-channel request and its start command
pub fn prepare(
    settings: &ScanSettings,
    driver: &dyn ScanDriver,
    number: u32,
) -> Result<(ScanRequest, DriverCommand)> {
    let request = request::resolve(settings, driver, &CallerInput::number_search(number))?;
    let command = dispatch::dispatch(&request);
    Ok((request, command))
}

/// Deadline and outcome of one number search
#[derive(Debug)]
pub struct NumberSearchController {
    target: u32,
    deadline: Instant,
    outcome: Option<NumberSearchOutcome>,
}

impl NumberSearchController {
    pub fn new(target: u32, now: Instant) -> Self {
        Self::with_timeout(target, now, NUMBER_SEARCH_TIMEOUT)
    }

    pub(crate) fn with_timeout(target: u32, now: Instant, timeout: Duration) -> Self {
        Self {
            target,
            deadline: now + timeout,
            outcome: None,
        }
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn outcome(&self) -> Option<&NumberSearchOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Check the consumer after it processed a message
    pub fn observe(&mut self, consumer: &mut ScanEventConsumer) -> Vec<Reaction> {
        if self.is_finished() {
            return Vec::new();
        }

        let count = consumer.progress().total_channels();
        if count > 0 {
            info!(channel = self.target, count, "Number search found a program");
            let mut reactions = Self::stop_session(consumer);
            let info = consumer.found().clone();
            self.finish(NumberSearchOutcome::Found { count, info }, &mut reactions);
            reactions
        } else if !consumer.state().is_active() {
            info!(channel = self.target, "Number search ended without a program");
            let mut reactions = Vec::new();
            self.finish(NumberSearchOutcome::NotFound { timed_out: false }, &mut reactions);
            reactions
        } else {
            Vec::new()
        }
    }

    /// Deadline passed
    pub fn on_timeout(&mut self, consumer: &mut ScanEventConsumer) -> Vec<Reaction> {
        if self.is_finished() {
            return Vec::new();
        }
        warn!(channel = self.target, "{}", ScanError::DriverTimeout);
        let mut reactions = Self::stop_session(consumer);
        self.finish(NumberSearchOutcome::NotFound { timed_out: true }, &mut reactions);
        reactions
    }

    fn stop_session(consumer: &mut ScanEventConsumer) -> Vec<Reaction> {
        let mut reactions: Vec<Reaction> = consumer.request_stop().into_iter().collect();
        if consumer.state().is_active() {
            reactions.extend(consumer.finalize(FinishReason::Stopped));
        }
        reactions
    }

    fn finish(&mut self, outcome: NumberSearchOutcome, reactions: &mut Vec<Reaction>) {
        reactions.push(Reaction::Notify(ScanNotification::NumberSearch(outcome.clone())));
        self.outcome = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::{ScanState, SessionContext, SessionKind};
    use crate::driver::{DriverEvent, ModeCode, ScanStatus, ServiceType};
    use crate::progress::DTV_PROGRAM;
    use crate::types::{AtvScanMode, BroadcastStandard, ScanMode, SearchMode, SourceCategory};

    fn searching() -> ScanEventConsumer {
        let mut consumer = ScanEventConsumer::new();
        consumer.begin(SessionContext {
            mode: ScanMode::NumberSearch,
            source: SourceCategory::DtvOnly,
            atv_scan_mode: AtvScanMode::FreqTable,
            search_mode: SearchMode::Manual,
            kind: SessionKind::NumberSearch,
        });
        consumer
    }

    fn stops(reactions: &[Reaction]) -> usize {
        reactions
            .iter()
            .filter(|r| matches!(r, Reaction::Command(DriverCommand::Stop)))
            .count()
    }

    #[test]
    fn test_found_stops_once() {
        let mut consumer = searching();
        let mut controller = NumberSearchController::new(7, Instant::now());
        let event = DriverEvent::digital_program(
            ModeCode::for_standard(BroadcastStandard::DvbT),
            40,
            522_000_000,
            "Seven",
            ServiceType::Tv,
        );

        let mut reactions = consumer.handle_event(&event, ScanStatus::default());
        reactions.extend(controller.observe(&mut consumer));
        assert_eq!(stops(&reactions), 1);
        assert_eq!(consumer.state(), ScanState::Stopped);
        match controller.outcome() {
            Some(NumberSearchOutcome::Found { count, info }) => {
                assert_eq!(*count, 1);
                assert_eq!(info.get(DTV_PROGRAM), Some(522_000_000));
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        // Late events and the deadline change nothing
        let mut late = consumer.handle_event(&DriverEvent::scan_end(), ScanStatus::default());
        late.extend(controller.observe(&mut consumer));
        late.extend(controller.on_timeout(&mut consumer));
        assert!(late.is_empty());
    }

    #[test]
    fn test_timeout_is_not_found() {
        let mut consumer = searching();
        let mut controller = NumberSearchController::new(7, Instant::now());
        let reactions = controller.on_timeout(&mut consumer);
        assert_eq!(stops(&reactions), 1);
        assert_eq!(
            controller.outcome(),
            Some(&NumberSearchOutcome::NotFound { timed_out: true })
        );
        assert!(consumer.handle_event(&DriverEvent::scan_exit(), ScanStatus::default()).is_empty());
    }

    #[test]
    fn test_exit_before_find() {
        let mut consumer = searching();
        let mut controller = NumberSearchController::new(7, Instant::now());
        let mut reactions = consumer.handle_event(&DriverEvent::scan_end(), ScanStatus::default());
        reactions.extend(consumer.handle_event(&DriverEvent::scan_exit(), ScanStatus::default()));
        reactions.extend(controller.observe(&mut consumer));
        reactions.extend(controller.on_timeout(&mut consumer));

        assert_eq!(stops(&reactions), 1);
        assert_eq!(
            controller.outcome(),
            Some(&NumberSearchOutcome::NotFound { timed_out: false })
        );
    }

    #[test]
    fn test_deadline_is_fixed() {
        let now = Instant::now();
        let controller = NumberSearchController::new(3, now);
        assert_eq!(controller.deadline(), now + Duration::from_secs(30));
        assert_eq!(controller.target(), 3);
    }
}
