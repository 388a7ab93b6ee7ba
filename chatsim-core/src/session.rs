// Playback session
// Owns the timeline, contact and position, and coordinates auto-play with manual stepping

use chrono::Utc;
use tokio::time::Instant;

use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::message::MessageFactory;
use crate::normalize::normalize;
use crate::queue::PlaybackQueue;
use crate::stepper::{plan_backward, plan_forward, ForwardPlan, StepGuard};
use crate::store::NewConversation;
use crate::timeline::Timeline;
use crate::types::{
    Contact, ContactStatus, ConversationStep, Message, MessagePatch, ProcessedStep,
    SavedConversation, Sender,
};

/// Where the play/pause control currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing queued; play starts a fresh run
    Idle,
    /// Auto-play is delivering from the queue
    Playing,
    /// A run was interrupted with steps still queued
    Paused,
}

/// Result of one step-forward call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// This many messages were appended in one update
    Delivered(usize),
    /// A previous call is still settling; this one was ignored
    Busy,
    /// Already at the last step
    AtEnd,
    /// There is nothing authored to step through
    NoSteps,
}

/// Everything the display needs after a state change
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub contact: Contact,
    pub messages: Vec<Message>,
    pub state: PlaybackState,
    pub current_step_index: isize,
}

/// One conversation's playback state.
///
/// All shared state (timeline, contact, position) is mutated only through
/// these methods. Time is passed in, so every suspension point is an
/// explicit deadline reported by [`Session::next_deadline`] and fired by
/// [`Session::tick`].
#[derive(Debug)]
pub struct Session {
    config: PlaybackConfig,
    contact: Contact,
    source: Vec<ConversationStep>,
    processed: Vec<ProcessedStep>,
    processed_stale: bool,
    queue: PlaybackQueue,
    timeline: Timeline,
    /// Index into `processed` of the last delivered step
    position: Option<usize>,
    guard: StepGuard,
    typing_reset: Option<Instant>,
    factory: MessageFactory,
}

impl Session {
    pub fn new(contact: Contact, config: PlaybackConfig) -> Self {
        Self {
            config,
            contact,
            source: Vec::new(),
            processed: Vec::new(),
            processed_stale: false,
            queue: PlaybackQueue::new(),
            timeline: Timeline::new(),
            position: None,
            guard: StepGuard::new(),
            typing_reset: None,
            factory: MessageFactory::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        if self.queue.is_playing() {
            PlaybackState::Playing
        } else if !self.queue.is_empty() {
            PlaybackState::Paused
        } else {
            PlaybackState::Idle
        }
    }

    /// `-1` before anything has been delivered
    pub fn current_step_index(&self) -> isize {
        self.position.map_or(-1, |p| p as isize)
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn messages(&self) -> &[Message] {
        self.timeline.messages()
    }

    pub fn steps(&self) -> &[ConversationStep] {
        &self.source
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            contact: self.contact.clone(),
            messages: self.timeline.messages().to_vec(),
            state: self.state(),
            current_step_index: self.current_step_index(),
        }
    }

    /// `(delivered, total)` over the processed step list
    pub fn progress(&self) -> (usize, usize) {
        (self.position.map_or(0, |p| p + 1), self.processed.len())
    }

    /// Whether the position agrees with the number of delivered messages
    pub fn is_in_sync(&self) -> bool {
        self.position.map_or(0, |p| p + 1) == self.timeline.len()
    }

    /// Replace the authored step list.
    ///
    /// A run that is playing or paused keeps the steps it captured; the new
    /// list is used from the next start or the next manual step while idle.
    pub fn set_steps(&mut self, steps: Vec<ConversationStep>) {
        self.source = steps;
        self.processed_stale = true;
        if self.timeline.is_empty() && self.state() == PlaybackState::Idle {
            self.position = None;
        }
    }

    /// Contact edits from the editor. Presence is still owned by playback.
    pub fn set_contact(&mut self, contact: Contact) {
        let status = self.contact.status;
        self.contact = contact;
        if self.next_deadline().is_some() {
            self.contact.status = status;
        }
    }

    /// Start a brand-new run of `steps` from the beginning.
    pub fn start_conversation(&mut self, steps: Vec<ConversationStep>, now: Instant) -> Result<()> {
        if steps.is_empty() {
            return Err(Error::EmptyConversation);
        }
        self.source = steps;
        self.begin_run(now)
    }

    /// The single play/pause control.
    pub fn toggle_play(&mut self, now: Instant) -> Result<PlaybackState> {
        match self.state() {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => {
                self.cancel_typing_flash();
                self.queue.play();
                self.arm(now);
                tracing::debug!(remaining = self.queue.len(), "resuming playback");
            }
            PlaybackState::Idle => {
                if self.source.is_empty() {
                    return Err(Error::EmptyConversation);
                }
                self.begin_run(now)?;
            }
        }
        Ok(self.state())
    }

    /// Playing → Paused. Queue contents are preserved untouched.
    pub fn pause(&mut self) {
        if !self.queue.is_playing() {
            return;
        }
        self.queue.pause();
        self.contact.status = ContactStatus::Online;
        tracing::debug!(remaining = self.queue.len(), "playback paused");
    }

    /// Deliver the next step (or button group) immediately.
    pub fn step_forward(&mut self, now: Instant) -> StepOutcome {
        if self.guard.is_held(now) {
            tracing::debug!("step forward ignored while previous step settles");
            return StepOutcome::Busy;
        }
        let captured = !self.queue.is_empty();
        self.pause();
        self.refresh_processed();
        if self.processed.is_empty() {
            return StepOutcome::NoSteps;
        }

        let outcome = match plan_forward(&self.processed, self.position, &self.timeline) {
            ForwardPlan::AtEnd => return StepOutcome::AtEnd,
            ForwardPlan::Single(index) => {
                if index == 0 {
                    self.timeline.clear();
                }
                let step = self.processed[index].clone();
                let message = self.factory.build(&step, Utc::now());
                self.timeline.push(message);
                self.position = Some(index);
                if step.shows_typing() {
                    self.contact.status = ContactStatus::Typing;
                    self.typing_reset = Some(now + self.config.typing_flash());
                }
                StepOutcome::Delivered(1)
            }
            ForwardPlan::Batch(range) => {
                let count = range.len();
                let last = range.end - 1;
                let batch = self.factory.build_batch(&self.processed[range], Utc::now());
                self.timeline.extend(batch);
                self.position = Some(last);
                self.guard.hold(now, self.config.step_grace());
                StepOutcome::Delivered(count)
            }
        };

        if captured {
            self.align_queue();
        }
        tracing::debug!(index = self.current_step_index(), ?outcome, "stepped forward");
        outcome
    }

    /// Remove the last message, or the whole trailing button group.
    /// Returns how many messages were removed.
    pub fn step_backward(&mut self) -> usize {
        let count = plan_backward(&self.timeline);
        if count == 0 {
            return 0;
        }
        let captured = !self.queue.is_empty();
        self.pause();
        self.cancel_typing_flash();
        let removed = self.timeline.truncate_tail(count);
        self.position = match self.position {
            Some(p) if p >= removed => Some(p - removed),
            _ => None,
        };
        if captured {
            self.align_queue();
        }
        tracing::debug!(index = self.current_step_index(), removed, "stepped backward");
        removed
    }

    /// Remove one delivered message. The position is left alone, so the
    /// session reports itself out of sync afterwards.
    pub fn delete_message(&mut self, id: &str) -> bool {
        let deleted = self.timeline.delete(id);
        if deleted && !self.is_in_sync() {
            tracing::warn!(
                index = self.current_step_index(),
                messages = self.timeline.len(),
                "timeline out of sync with playback position after delete"
            );
        }
        deleted
    }

    pub fn update_message(&mut self, id: &str, patch: MessagePatch) -> bool {
        self.timeline.update(id, patch)
    }

    /// Empty the timeline and return to Idle with the position reset.
    pub fn clear_messages(&mut self) {
        self.reset_playback();
        tracing::debug!("messages cleared");
    }

    /// Adopt a saved conversation as the fresh authored list.
    pub fn load_saved(&mut self, conversation: &SavedConversation) {
        self.source = conversation.steps.clone();
        self.contact.name = conversation.contact.name.clone();
        self.contact.avatar = conversation.contact.avatar.clone();
        self.reset_playback();
        self.processed = normalize(&self.source);
        self.processed_stale = false;
        tracing::info!(
            id = %conversation.id,
            name = %conversation.name,
            steps = self.source.len(),
            "loaded conversation"
        );
    }

    /// Snapshot of the raw steps and contact for the store
    pub fn to_new_conversation(&self, name: impl Into<String>, description: Option<String>) -> NewConversation {
        NewConversation {
            name: name.into(),
            description,
            steps: self.source.clone(),
            contact: self.contact.card(),
        }
    }

    /// Earliest pending timer, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.queue.deadline(), self.typing_reset) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every timer due at `now`. Returns the number of messages delivered.
    pub fn tick(&mut self, now: Instant) -> usize {
        let mut delivered = 0;

        if self.typing_reset.is_some_and(|at| at <= now) {
            self.cancel_typing_flash();
        }

        while let (Some(due), Some(token)) = (self.queue.deadline(), self.queue.pending_token()) {
            if due > now {
                break;
            }
            let Some(step) = self.queue.take_due(token) else {
                break;
            };
            if step.sender == Sender::Them {
                self.contact.status = ContactStatus::Online;
            }
            let message = self.factory.build(&step, Utc::now());
            self.timeline.push(message);
            self.position = Some(self.position.map_or(0, |p| p + 1));
            delivered += 1;

            if !self.is_in_sync() {
                tracing::warn!(
                    index = self.current_step_index(),
                    messages = self.timeline.len(),
                    "timeline out of sync with playback position"
                );
            }

            // Chain from the due time so a late tick replays in order
            self.arm(due);
        }

        if delivered > 0 && self.state() == PlaybackState::Idle {
            tracing::debug!("play run finished");
        }
        delivered
    }

    /// Invalidate every pending timer
    pub fn teardown(&mut self) {
        self.queue.pause();
        self.cancel_typing_flash();
        self.contact.status = ContactStatus::Online;
    }

    fn begin_run(&mut self, now: Instant) -> Result<()> {
        let processed = normalize(&self.source);
        if processed.is_empty() {
            return Err(Error::EmptyConversation);
        }
        self.reset_playback();
        self.processed = processed;
        self.processed_stale = false;
        self.queue.load(self.processed.iter().cloned());
        self.queue.play();
        self.arm(now);
        tracing::info!(steps = self.processed.len(), "conversation started");
        Ok(())
    }

    fn reset_playback(&mut self) {
        self.queue.clear();
        self.timeline.clear();
        self.position = None;
        self.guard.release();
        self.typing_reset = None;
        self.contact.status = ContactStatus::Online;
    }

    fn arm(&mut self, now: Instant) {
        if self.queue.schedule(now, self.config.default_delay_ms).is_none() {
            return;
        }
        if self.queue.head().is_some_and(ProcessedStep::shows_typing) {
            self.contact.status = ContactStatus::Typing;
        }
    }

    fn cancel_typing_flash(&mut self) {
        if self.typing_reset.take().is_some() {
            self.contact.status = ContactStatus::Online;
        }
    }

    fn refresh_processed(&mut self) {
        let idle = self.state() == PlaybackState::Idle;
        if self.processed.is_empty() || (self.processed_stale && idle) {
            self.processed = normalize(&self.source);
            self.processed_stale = false;
        }
    }

    /// Re-point a captured, paused run at the steps after the current position
    fn align_queue(&mut self) {
        let start = self.position.map_or(0, |p| p + 1);
        let rest = self.processed.get(start..).unwrap_or_default();
        self.queue.load(rest.iter().cloned());
    }
}
