// Async player
// Runs a Session on a tokio task, firing its timers and serializing every command

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::session::{PlaybackState, Session, SessionView, StepOutcome};
use crate::store::NewConversation;
use crate::types::{Contact, ConversationStep, MessagePatch, SavedConversation};

const COMMAND_BUFFER: usize = 32;

enum Command {
    SetSteps {
        steps: Vec<ConversationStep>,
        reply: oneshot::Sender<()>,
    },
    SetContact {
        contact: Contact,
        reply: oneshot::Sender<()>,
    },
    Start {
        steps: Vec<ConversationStep>,
        reply: oneshot::Sender<Result<()>>,
    },
    TogglePlay {
        reply: oneshot::Sender<Result<PlaybackState>>,
    },
    Pause {
        reply: oneshot::Sender<()>,
    },
    StepForward {
        reply: oneshot::Sender<StepOutcome>,
    },
    StepBackward {
        reply: oneshot::Sender<usize>,
    },
    DeleteMessage {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    UpdateMessage {
        id: String,
        patch: MessagePatch,
        reply: oneshot::Sender<bool>,
    },
    ClearMessages {
        reply: oneshot::Sender<()>,
    },
    LoadSaved {
        conversation: Box<SavedConversation>,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        name: String,
        description: Option<String>,
        reply: oneshot::Sender<NewConversation>,
    },
}

/// Owns the session inside the spawned task
pub struct Player {
    session: Session,
    commands: mpsc::Receiver<Command>,
    view_tx: watch::Sender<SessionView>,
    cancel: CancellationToken,
}

impl Player {
    /// Move `session` onto a new task and return the handle that drives it.
    /// Must be called from within a tokio runtime.
    pub fn spawn(session: Session) -> PlayerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (view_tx, view_rx) = watch::channel(session.view());
        let cancel = CancellationToken::new();

        let player = Player {
            session,
            commands: cmd_rx,
            view_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(player.run());

        PlayerHandle {
            commands: cmd_tx,
            view: view_rx,
            cancel,
            task,
        }
    }

    async fn run(mut self) -> Session {
        tracing::debug!("player started");
        loop {
            let deadline = self.session.next_deadline();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                _ = wait_for(deadline) => {
                    self.session.tick(Instant::now());
                }
            }
            self.publish();
        }

        self.session.teardown();
        self.publish();
        tracing::debug!("player stopped");
        self.session
    }

    fn handle(&mut self, cmd: Command) {
        let now = Instant::now();
        let session = &mut self.session;
        // A dropped reply receiver just means the caller stopped waiting
        match cmd {
            Command::SetSteps { steps, reply } => {
                session.set_steps(steps);
                let _ = reply.send(());
            }
            Command::SetContact { contact, reply } => {
                session.set_contact(contact);
                let _ = reply.send(());
            }
            Command::Start { steps, reply } => {
                let _ = reply.send(session.start_conversation(steps, now));
            }
            Command::TogglePlay { reply } => {
                let _ = reply.send(session.toggle_play(now));
            }
            Command::Pause { reply } => {
                session.pause();
                let _ = reply.send(());
            }
            Command::StepForward { reply } => {
                let _ = reply.send(session.step_forward(now));
            }
            Command::StepBackward { reply } => {
                let _ = reply.send(session.step_backward());
            }
            Command::DeleteMessage { id, reply } => {
                let _ = reply.send(session.delete_message(&id));
            }
            Command::UpdateMessage { id, patch, reply } => {
                let _ = reply.send(session.update_message(&id, patch));
            }
            Command::ClearMessages { reply } => {
                session.clear_messages();
                let _ = reply.send(());
            }
            Command::LoadSaved { conversation, reply } => {
                session.load_saved(&conversation);
                let _ = reply.send(());
            }
            Command::Snapshot {
                name,
                description,
                reply,
            } => {
                let _ = reply.send(session.to_new_conversation(name, description));
            }
        }
    }

    fn publish(&self) {
        let next = self.session.view();
        self.view_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Caller side of a running [`Player`]
pub struct PlayerHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
    cancel: CancellationToken,
    task: JoinHandle<Session>,
}

impl PlayerHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| Error::PlayerClosed)?;
        rx.await.map_err(|_| Error::PlayerClosed)
    }

    pub async fn set_steps(&self, steps: Vec<ConversationStep>) -> Result<()> {
        self.request(|reply| Command::SetSteps { steps, reply }).await
    }

    pub async fn set_contact(&self, contact: Contact) -> Result<()> {
        self.request(|reply| Command::SetContact { contact, reply }).await
    }

    pub async fn start_conversation(&self, steps: Vec<ConversationStep>) -> Result<()> {
        self.request(|reply| Command::Start { steps, reply }).await?
    }

    pub async fn toggle_play(&self) -> Result<PlaybackState> {
        self.request(|reply| Command::TogglePlay { reply }).await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn step_forward(&self) -> Result<StepOutcome> {
        self.request(|reply| Command::StepForward { reply }).await
    }

    pub async fn step_backward(&self) -> Result<usize> {
        self.request(|reply| Command::StepBackward { reply }).await
    }

    pub async fn delete_message(&self, id: impl Into<String>) -> Result<bool> {
        let id = id.into();
        self.request(|reply| Command::DeleteMessage { id, reply }).await
    }

    pub async fn update_message(&self, id: impl Into<String>, patch: MessagePatch) -> Result<bool> {
        let id = id.into();
        self.request(|reply| Command::UpdateMessage { id, patch, reply })
            .await
    }

    pub async fn clear_messages(&self) -> Result<()> {
        self.request(|reply| Command::ClearMessages { reply }).await
    }

    pub async fn load_saved(&self, conversation: SavedConversation) -> Result<()> {
        let conversation = Box::new(conversation);
        self.request(|reply| Command::LoadSaved {
            conversation,
            reply,
        })
        .await
    }

    /// Current steps and contact, ready for [`crate::store::ConversationStore::save`]
    pub async fn snapshot(&self, name: impl Into<String>, description: Option<String>) -> Result<NewConversation> {
        let name = name.into();
        self.request(|reply| Command::Snapshot {
            name,
            description,
            reply,
        })
        .await
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver that is notified whenever the view changes
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Cancel every pending timer, stop the task and hand the session back.
    pub async fn shutdown(self) -> Result<Session> {
        self.cancel.cancel();
        self.task.await.map_err(|_| Error::PlayerClosed)
    }
}
