// Playback queue for timed auto-play
// Holds the remaining processed steps and the single armed delivery timer

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::types::ProcessedStep;

/// Handle for one armed delivery. A token only matches the delivery it was
/// issued for; any re-arm, pause or reload makes older tokens stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryToken(u64);

#[derive(Debug, Clone, Copy)]
struct PendingDelivery {
    token: DeliveryToken,
    due: Instant,
}

/// FIFO of steps still to be delivered by auto-play
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    steps: VecDeque<ProcessedStep>,
    playing: bool,
    pending: Option<PendingDelivery>,
    issued: u64,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue contents. Any armed delivery is invalidated.
    pub fn load<I>(&mut self, steps: I)
    where
        I: IntoIterator<Item = ProcessedStep>,
    {
        self.cancel();
        self.steps = steps.into_iter().collect();
        if self.steps.is_empty() {
            self.playing = false;
        }
    }

    pub fn play(&mut self) {
        self.playing = !self.steps.is_empty();
    }

    /// Stop playing and drop the armed delivery. Queue contents are kept.
    pub fn pause(&mut self) {
        self.playing = false;
        self.cancel();
    }

    pub fn clear(&mut self) {
        self.pause();
        self.steps.clear();
    }

    /// Drop the armed delivery, returning whether one was pending
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Arm the delivery timer for the head step.
    ///
    /// Does nothing unless playing with a non-empty queue and no delivery
    /// already armed.
    pub fn schedule(&mut self, now: Instant, default_delay_ms: u64) -> Option<DeliveryToken> {
        if !self.playing || self.pending.is_some() {
            return None;
        }
        let head = self.steps.front()?;
        self.issued += 1;
        let token = DeliveryToken(self.issued);
        let due = now + Duration::from_millis(head.delay_ms(default_delay_ms));
        self.pending = Some(PendingDelivery { token, due });
        Some(token)
    }

    /// Pop the head step if `token` is still the armed delivery.
    /// Emptying the queue ends the play run.
    pub fn take_due(&mut self, token: DeliveryToken) -> Option<ProcessedStep> {
        match self.pending {
            Some(pending) if pending.token == token => {}
            _ => return None,
        }
        self.pending = None;
        let step = self.steps.pop_front();
        if self.steps.is_empty() {
            self.playing = false;
        }
        step
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.due)
    }

    pub fn pending_token(&self) -> Option<DeliveryToken> {
        self.pending.map(|p| p.token)
    }

    pub fn head(&self) -> Option<&ProcessedStep> {
        self.steps.front()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
