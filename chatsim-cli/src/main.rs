// Chatsim CLI - Scripted WhatsApp-style conversations in the terminal
// Plays, steps through, previews and manages saved conversation scripts

mod logging;
mod render;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::{eyre::eyre, eyre::Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use chatsim_core::{
    normalize, parse_steps, preview, ClientCatalog, Contact, ConversationStep, ConversationStore,
    NewConversation, PlaybackConfig, PlaybackState, Player, PlayerHandle, Session, SqliteKv,
    StepOutcome,
};
use render::ViewPrinter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    match &cli.command {
        Command::Play(args) => handle_play(args, config).await?,
        Command::Step(args) => handle_step(args, config).await?,
        Command::Preview { file } => handle_preview(file)?,
        Command::Normalize { file } => handle_normalize(file)?,
        Command::Saved(args) => handle_saved(args, config).await?,
        Command::Client(args) => handle_client(args, config).await?,
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "chatsim",
    author,
    version,
    about = "Chatsim: scripted WhatsApp-style conversations",
    long_about = "Author conversation scripts as JSON step lists and play them back with typing\nindicators, timed delivery and button groups, or step through them by hand."
)]
struct Cli {
    /// Playback config (default: ~/.config/chatsim/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Auto-play a step file to the end
    Play(ScriptArgs),
    /// Step through a step file interactively
    Step(ScriptArgs),
    /// Print every message the steps produce, without timing
    Preview { file: PathBuf },
    /// Print the expanded step list as JSON
    Normalize { file: PathBuf },
    /// Manage saved conversations
    Saved(SavedArgs),
    /// Browse and play a client's published conversations
    Client(ClientArgs),
}

#[derive(Args, Debug)]
struct ScriptArgs {
    /// JSON array of conversation steps
    file: PathBuf,
    /// Contact name shown in the header
    #[arg(long)]
    contact: Option<String>,
    /// Contact avatar URL
    #[arg(long)]
    avatar: Option<String>,
}

#[derive(Args, Debug)]
struct SavedArgs {
    /// SQLite store (default: ~/.local/share/chatsim/store.sqlite)
    #[arg(long)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: SavedCommand,
}

#[derive(Subcommand, Debug)]
enum SavedCommand {
    /// List saved conversations
    List,
    /// Save a step file under a name
    Save {
        file: PathBuf,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Delete one conversation by id, or all of them
    Delete {
        id: Option<String>,
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
    /// Write every saved conversation as JSON
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Merge conversations from an exported file
    Import { file: PathBuf },
    /// Auto-play a saved conversation
    Play { id: String },
}

#[derive(Args, Debug)]
struct ClientArgs {
    client_id: String,
    /// Directory holding `{client_id}-conversations.json`
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    /// Play the conversation at this index instead of listing
    #[arg(long)]
    play: Option<usize>,
}

fn load_config(path: Option<&Path>) -> Result<PlaybackConfig> {
    if let Some(path) = path {
        return PlaybackConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let default = PathBuf::from(home).join(".config/chatsim/config.toml");
    if default.exists() {
        tracing::debug!(path = %default.display(), "loading default config");
        return PlaybackConfig::load(&default)
            .with_context(|| format!("Failed to load config {}", default.display()));
    }
    tracing::debug!("no config file, using built-in playback defaults");
    Ok(PlaybackConfig::default())
}

fn read_steps(file: &Path) -> Result<Vec<ConversationStep>> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let steps = parse_steps(&content).with_context(|| format!("Invalid step file {}", file.display()))?;
    Ok(steps)
}

fn contact_from(args: &ScriptArgs) -> Contact {
    let mut contact = Contact::default();
    if let Some(ref name) = args.contact {
        contact.name = name.clone();
    }
    if let Some(ref avatar) = args.avatar {
        contact.avatar = avatar.clone();
    }
    contact
}

async fn handle_play(args: &ScriptArgs, config: PlaybackConfig) -> Result<()> {
    let steps = read_steps(&args.file)?;
    let total = normalize(&steps).len();
    let handle = Player::spawn(Session::new(contact_from(args), config));

    handle.start_conversation(steps).await?;
    watch_to_end(&handle, total).await?;
    handle.shutdown().await?;
    Ok(())
}

/// Print view updates until every processed step has been delivered
async fn watch_to_end(handle: &PlayerHandle, total: usize) -> Result<()> {
    let mut rx = handle.subscribe();
    let mut printer = ViewPrinter::new();
    loop {
        let view = rx.borrow_and_update().clone();
        printer.print(&view);
        let delivered = usize::try_from(view.current_step_index + 1).unwrap_or(0);
        if view.state == PlaybackState::Idle && delivered >= total {
            break;
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
    tracing::info!(total, "conversation finished");
    println!("✓ Conversation finished ({total} messages)");
    Ok(())
}

async fn handle_step(args: &ScriptArgs, config: PlaybackConfig) -> Result<()> {
    let steps = read_steps(&args.file)?;
    let handle = Player::spawn(Session::new(contact_from(args), config));
    handle.set_steps(steps).await?;

    eprintln!("n: next  p: previous  t/space: play-pause  c: clear  q: quit");
    let mut rx = handle.subscribe();
    let mut printer = ViewPrinter::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = rx.borrow_and_update().clone();
                printer.print(&view);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "n" => match handle.step_forward().await? {
                        StepOutcome::AtEnd => eprintln!("⚠ Already at the last step"),
                        StepOutcome::NoSteps => eprintln!("⚠ No steps to play"),
                        StepOutcome::Busy | StepOutcome::Delivered(_) => {}
                    },
                    "p" => {
                        if handle.step_backward().await? == 0 {
                            eprintln!("⚠ Nothing to remove");
                        }
                    }
                    "t" => toggle(&handle).await?,
                    "" if line.contains(' ') => toggle(&handle).await?,
                    "c" => handle.clear_messages().await?,
                    "q" => break,
                    "" => {}
                    other => eprintln!("Unknown command '{other}'"),
                }
            }
        }
    }

    handle.shutdown().await?;
    Ok(())
}

async fn toggle(handle: &PlayerHandle) -> Result<()> {
    match handle.toggle_play().await {
        Ok(state) => eprintln!("[{state:?}]"),
        Err(e) => eprintln!("Error: {e}"),
    }
    Ok(())
}

fn handle_preview(file: &Path) -> Result<()> {
    let steps = read_steps(file)?;
    for message in preview(&steps)? {
        println!("{:<18} {}", message.id, render::bubble(&message));
    }
    Ok(())
}

fn handle_normalize(file: &Path) -> Result<()> {
    let steps = read_steps(file)?;
    println!("{}", serde_json::to_string_pretty(&normalize(&steps))?);
    Ok(())
}

fn open_store(db: Option<&Path>) -> Result<ConversationStore<SqliteKv>> {
    let path = db.map(Path::to_path_buf).unwrap_or_else(SqliteKv::default_path);
    let kv = SqliteKv::open(&path).with_context(|| format!("Failed to open store {}", path.display()))?;
    Ok(ConversationStore::new(kv))
}

async fn handle_saved(args: &SavedArgs, config: PlaybackConfig) -> Result<()> {
    let mut store = open_store(args.db.as_deref())?;

    match &args.command {
        SavedCommand::List => {
            let all = store.get_all()?;
            if all.is_empty() {
                println!("No saved conversations");
            }
            for conversation in all {
                println!(
                    "{}  {}  ({} steps, {})  updated {}",
                    conversation.id,
                    conversation.name,
                    conversation.steps.len(),
                    conversation.contact.name,
                    conversation.updated_at.format("%Y-%m-%d %H:%M")
                );
                if let Some(description) = conversation.description {
                    println!("    {description}");
                }
            }
        }
        SavedCommand::Save {
            file,
            name,
            description,
            contact,
            avatar,
        } => {
            let steps = read_steps(file)?;
            let mut card = Contact::default().card();
            if let Some(contact) = contact {
                card.name = contact.clone();
            }
            if let Some(avatar) = avatar {
                card.avatar = avatar.clone();
            }
            let saved = store.save(NewConversation {
                name: name.clone(),
                description: description.clone(),
                steps,
                contact: card,
            })?;
            tracing::info!(id = %saved.id, steps = saved.steps.len(), "conversation saved");
            println!("✓ Saved '{}' as {}", saved.name, saved.id);
        }
        SavedCommand::Delete { id, all } => {
            if *all {
                store.delete_all()?;
                println!("✓ Deleted all saved conversations");
            } else if let Some(id) = id {
                if !store.delete(id)? {
                    return Err(eyre!("No saved conversation with id {id}"));
                }
                println!("✓ Deleted {id}");
            } else {
                return Err(eyre!("Pass an id or --all"));
            }
        }
        SavedCommand::Export { output } => {
            let json = store.export()?;
            match output {
                Some(path) => {
                    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("✓ Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        SavedCommand::Import { file } => {
            let content = fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let report = store.import(&content)?;
            if let Some(warning) = report.warning() {
                tracing::warn!(added = report.added, "partial import");
                eprintln!("⚠ {warning}");
            }
            println!("✓ Imported {} new conversation(s)", report.added);
        }
        SavedCommand::Play { id } => {
            let conversation = store
                .get(id)?
                .ok_or_else(|| eyre!("No saved conversation with id {id}"))?;
            let total = normalize(&conversation.steps).len();
            let handle = Player::spawn(Session::new(Contact::default(), config));
            handle.load_saved(conversation).await?;
            handle.toggle_play().await?;
            watch_to_end(&handle, total).await?;
            handle.shutdown().await?;
        }
    }
    Ok(())
}

async fn handle_client(args: &ClientArgs, config: PlaybackConfig) -> Result<()> {
    let catalog = ClientCatalog::load(&args.dir, &args.client_id)?;

    let Some(index) = args.play else {
        println!("Conversations for {}:", catalog.client_id());
        for (i, conversation) in catalog.conversations().iter().enumerate() {
            println!("  [{i}] {} ({})", conversation.name, conversation.contact.name);
        }
        return Ok(());
    };

    tracing::info!(client = catalog.client_id(), index, "playing client conversation");
    let conversation = catalog
        .get(index)
        .cloned()
        .ok_or_else(|| eyre!("No conversation at index {index} (have {})", catalog.len()))?;
    let total = normalize(&conversation.steps).len();
    let handle = Player::spawn(Session::new(Contact::default(), config));
    handle.load_saved(conversation).await?;
    handle.toggle_play().await?;
    watch_to_end(&handle, total).await?;
    handle.shutdown().await?;
    Ok(())
}
