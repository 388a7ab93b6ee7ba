// Manual stepping rules
// Decides what one forward/backward click adds or removes, keeping button groups whole

use std::ops::Range;
use std::time::Duration;
use tokio::time::Instant;

use crate::timeline::Timeline;
use crate::types::ProcessedStep;

/// What a single forward click should deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardPlan {
    /// Deliver exactly this processed step
    Single(usize),
    /// Deliver a whole button group in one update
    Batch(Range<usize>),
    /// Nothing left to deliver
    AtEnd,
}

/// Plan a forward step.
///
/// `position` is the index of the last delivered processed step, `None`
/// when nothing has been delivered yet.
pub fn plan_forward(processed: &[ProcessedStep], position: Option<usize>, timeline: &Timeline) -> ForwardPlan {
    if processed.is_empty() {
        return ForwardPlan::AtEnd;
    }

    let next = match position {
        Some(p) if !timeline.is_empty() => p + 1,
        _ => return ForwardPlan::Single(0),
    };
    if next >= processed.len() {
        return ForwardPlan::AtEnd;
    }

    let last_is_button = timeline.last().is_some_and(|m| m.is_button());
    if processed[next].is_button() && !last_is_button {
        let run = processed[next..]
            .iter()
            .take_while(|s| s.is_button())
            .count();
        return ForwardPlan::Batch(next..next + run);
    }

    ForwardPlan::Single(next)
}

/// How many trailing messages one backward click removes
pub fn plan_backward(timeline: &Timeline) -> usize {
    if timeline.is_empty() {
        return 0;
    }
    timeline.trailing_button_run().max(1)
}

/// Guard against a second step-forward landing while the first is settling
#[derive(Debug, Default)]
pub struct StepGuard {
    held_until: Option<Instant>,
}

impl StepGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, now: Instant) -> bool {
        self.held_until.is_some_and(|until| now < until)
    }

    /// Keep rejecting calls for `grace` after `now`
    pub fn hold(&mut self, now: Instant, grace: Duration) {
        self.held_until = Some(now + grace);
    }

    pub fn release(&mut self) {
        self.held_until = None;
    }
}
