use tunescan_core::progress::ChannelKind;
use tunescan_core::{
    NumberSearchOutcome, ScanNotification, ScanProgress, ScanSummary, format_frequency,
};

/// Where the foreground scan stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Running,
    Paused,
    /// Stop requested, waiting for the session to report
    Stopping,
    Done,
}

/// Run state of the foreground scan
#[derive(Debug)]
pub struct RunState {
    /// Current mode
    pub mode: RunMode,
    /// Latest progress seen
    pub progress: ScanProgress,
    /// Summary of a finished screen scan
    pub summary: Option<ScanSummary>,
    /// Outcome of a finished number search
    pub outcome: Option<NumberSearchOutcome>,
    /// Last percentage printed, progress lines are throttled to 5 % steps
    last_printed: Option<u8>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            mode: RunMode::Running,
            progress: ScanProgress::default(),
            summary: None,
            outcome: None,
            last_printed: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.mode == RunMode::Done
    }

    pub fn request_stop(&mut self) {
        if self.mode != RunMode::Done {
            self.mode = RunMode::Stopping;
        }
    }

    /// Fold a notification into the state, returning a line to print
    pub fn apply(&mut self, notification: ScanNotification) -> Option<String> {
        match notification {
            ScanNotification::Started { mode, source } => {
                self.mode = RunMode::Running;
                Some(format!("Scan started: {mode:?} on {source:?}"))
            }
            ScanNotification::Progress(progress) => {
                let due = self
                    .last_printed
                    .is_none_or(|last| progress.percent >= last.saturating_add(5));
                self.progress = progress;
                if !due {
                    return None;
                }
                self.last_printed = Some(self.progress.percent);
                Some(format!(
                    "{:>3}%  tv {:<3} radio {:<3} at {}",
                    self.progress.percent,
                    self.progress.tv_channels,
                    self.progress.radio_channels,
                    format_frequency(self.progress.signal.frequency)
                ))
            }
            ScanNotification::ChannelFound {
                kind,
                frequency,
                name,
            } => {
                let label = match kind {
                    ChannelKind::Analog => "ATV",
                    ChannelKind::DigitalTv => "DTV",
                    ChannelKind::Radio => "Radio",
                };
                Some(match name {
                    Some(name) => format!("  + {label:<5} {} {name}", format_frequency(frequency)),
                    None => format!("  + {label:<5} {}", format_frequency(frequency)),
                })
            }
            ScanNotification::Paused { by_driver } => {
                self.mode = RunMode::Paused;
                Some(if by_driver {
                    "Paused on analog lock (p to continue, q to stop)".to_string()
                } else {
                    "Paused (p to continue, q to stop)".to_string()
                })
            }
            ScanNotification::Resumed => {
                self.mode = RunMode::Running;
                Some("Resumed".to_string())
            }
            ScanNotification::StoreSummary {
                tv_channels,
                radio_channels,
            } => Some(format!(
                "Stored {tv_channels} TV and {radio_channels} radio channels"
            )),
            ScanNotification::Finished(summary) => {
                self.mode = RunMode::Done;
                let line = format!(
                    "Scan {:?}: {} TV ({} analog, {} digital), {} radio",
                    summary.reason,
                    summary.progress.tv_channels,
                    summary.progress.atv_channels,
                    summary.progress.dtv_channels,
                    summary.progress.radio_channels
                );
                self.progress = summary.progress.clone();
                self.summary = Some(summary);
                Some(line)
            }
            ScanNotification::NumberSearch(outcome) => {
                self.mode = RunMode::Done;
                let line = match &outcome {
                    NumberSearchOutcome::Found { count, .. } => {
                        format!("Channel found: {count} program(s)")
                    }
                    NumberSearchOutcome::NotFound { timed_out: true } => {
                        "No program found before the search timed out".to_string()
                    }
                    NumberSearchOutcome::NotFound { timed_out: false } => {
                        "No program found".to_string()
                    }
                };
                self.outcome = Some(outcome);
                Some(line)
            }
            ScanNotification::Recovered(state) => Some(format!(
                "Previous scan was left {state:?}, driver stopped"
            )),
            ScanNotification::Error(e) => Some(format!("Error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunescan_core::progress::FinishReason;
    use tunescan_core::{FoundInfoMap, ScanMode, SourceCategory};

    fn progress(percent: u8) -> ScanNotification {
        ScanNotification::Progress(ScanProgress {
            percent,
            ..ScanProgress::default()
        })
    }

    #[test]
    fn test_progress_lines_are_throttled() {
        let mut state = RunState::new();
        assert!(state.apply(progress(0)).is_some());
        assert!(state.apply(progress(3)).is_none());
        assert!(state.apply(progress(5)).is_some());
        assert_eq!(state.progress.percent, 5);
    }

    #[test]
    fn test_pause_and_resume_track_mode() {
        let mut state = RunState::new();
        state.apply(ScanNotification::Started {
            mode: ScanMode::ManualRange,
            source: SourceCategory::AtvOnly,
        });
        state.apply(ScanNotification::Paused { by_driver: true });
        assert_eq!(state.mode, RunMode::Paused);
        state.apply(ScanNotification::Resumed);
        assert_eq!(state.mode, RunMode::Running);
    }

    #[test]
    fn test_finish_ends_run() {
        let mut state = RunState::new();
        state.request_stop();
        assert_eq!(state.mode, RunMode::Stopping);

        state.apply(ScanNotification::Finished(ScanSummary {
            progress: ScanProgress::default(),
            found: FoundInfoMap::new(),
            reason: FinishReason::Stopped,
        }));
        assert!(state.is_done());
        assert!(state.summary.is_some());

        state.request_stop();
        assert!(state.is_done());
    }

    #[test]
    fn test_number_search_outcome_ends_run() {
        let mut state = RunState::new();
        let line = state.apply(ScanNotification::NumberSearch(NumberSearchOutcome::NotFound {
            timed_out: true,
        }));
        assert!(line.is_some_and(|l| l.contains("timed out")));
        assert!(state.is_done());
    }
}
