//! Publish state machine
//!
//! Tracks progress through: read -> select -> apply -> stage -> commit -> push

use std::fmt;

/// Where a publish run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishStage {
    #[default]
    Start,
    FileRead,
    SuggestionSelected,
    Applied,
    Staged,
    Committed,
    Pushed,
    Done,
    Failed,
}

impl PublishStage {
    /// Human-readable status for display
    pub fn label(&self) -> &'static str {
        match self {
            PublishStage::Start => "start",
            PublishStage::FileRead => "file read",
            PublishStage::SuggestionSelected => "suggestion selected",
            PublishStage::Applied => "applied",
            PublishStage::Staged => "staged",
            PublishStage::Committed => "committed",
            PublishStage::Pushed => "pushed",
            PublishStage::Done => "done",
            PublishStage::Failed => "failed",
        }
    }

    /// The stage that follows a successful step, if any
    pub fn next(&self) -> Option<PublishStage> {
        match self {
            PublishStage::Start => Some(PublishStage::FileRead),
            PublishStage::FileRead => Some(PublishStage::SuggestionSelected),
            PublishStage::SuggestionSelected => Some(PublishStage::Applied),
            PublishStage::Applied => Some(PublishStage::Staged),
            PublishStage::Staged => Some(PublishStage::Committed),
            PublishStage::Committed => Some(PublishStage::Pushed),
            PublishStage::Pushed => Some(PublishStage::Done),
            PublishStage::Done | PublishStage::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishStage::Done | PublishStage::Failed)
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Linear progress tracker; the only side exit is `Failed`.
#[derive(Debug, Default)]
pub struct PublishProgress {
    stage: PublishStage,
    last_completed: PublishStage,
}

impl PublishProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> PublishStage {
        self.stage
    }

    /// Last stage reached before a failure (or the current one)
    pub fn last_completed(&self) -> PublishStage {
        self.last_completed
    }

    /// Move to `to`, which must be the next stage in order.
    pub fn advance(&mut self, to: PublishStage) {
        debug_assert_eq!(self.stage.next(), Some(to), "out-of-order publish stage");
        self.stage = to;
        self.last_completed = to;
        tracing::debug!(stage = %to, "publish stage");
    }

    pub fn fail(&mut self) {
        if !self.stage.is_terminal() {
            self.stage = PublishStage::Failed;
        }
    }
}
