// Chatsim Core Library
// Step model, playback engine, editor, and saved conversations for scripted chat demos

pub mod types;
pub mod error;
pub mod config;
pub mod normalize;
pub mod message;
pub mod timeline;
pub mod queue;
pub mod stepper;
pub mod session;
pub mod player;
pub mod editor;
pub mod preview;
pub mod store;
pub mod catalog;

// Re-export commonly used types
pub use types::*;
pub use error::{Error, Result};
pub use config::PlaybackConfig;
pub use normalize::{normalize, parse_steps};
pub use session::{PlaybackState, Session, SessionView, StepOutcome};
pub use player::{Player, PlayerHandle};
pub use editor::{step_templates, LinkBehavior, StepEditor, StepTemplate};
pub use preview::preview;
pub use store::{ConversationPatch, ConversationStore, ImportReport, KeyValueStore, MemoryKv, NewConversation, SqliteKv};
pub use catalog::ClientCatalog;
