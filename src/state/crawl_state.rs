/// Crawl run state definitions
///
/// This module defines the states a single crawl run moves through and
/// which moves between them are legal.
use std::fmt;

/// Represents the current state of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    // ===== Active States =====
    /// Run created, nothing fetched yet
    Start,

    /// A page request is in flight
    Fetching,

    /// Fields are being extracted from the fetched page
    Extracting,

    /// Deciding whether another page should be fetched
    DecidingNext,

    // ===== Terminal States =====
    /// The run finished normally
    Done,

    /// The run aborted on an unrecoverable error
    Failed,
}

impl CrawlState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the run is still in progress
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Checks whether moving from this state to `next` is allowed
    ///
    /// ```text
    /// Start -> Fetching -> Extracting -> DecidingNext -> Fetching | Done
    /// ```
    ///
    /// Any active state may also move to `Done` (cancellation) or to
    /// `Failed` (a fetch error or a selector that cannot be evaluated).
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        use CrawlState::*;

        match (self, next) {
            (Start, Fetching) => true,
            (Fetching, Extracting) => true,
            (Extracting, DecidingNext) => true,
            (DecidingNext, Fetching) => true,
            (from, Failed | Done) => from.is_active(),
            _ => false,
        }
    }

    /// Returns all possible crawl states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Start,
            Self::Fetching,
            Self::Extracting,
            Self::DecidingNext,
            Self::Done,
            Self::Failed,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::DecidingNext => "deciding_next",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
