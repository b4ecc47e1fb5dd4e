/// User actions forwarded to the scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Pause the running scan
    Pause,
    /// Resume a paused scan
    Resume,
    /// Stop the scan
    Stop,
    /// No action (for tick events)
    Tick,
}
