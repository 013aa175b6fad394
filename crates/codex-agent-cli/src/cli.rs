//! The `clap`-derived command tree (§4.14).

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "codex-agent")]
#[command(author, version, about = "Control plane for codex tool subprocesses", long_about = None)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human-formatted text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Override the resolved daemon port.
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Override the resolved daemon host.
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Override the bearer token sent to the daemon.
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the background daemon process.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },
    /// Inspect recorded sessions.
    Sessions {
        #[command(subcommand)]
        command: SessionsCommands,
    },
    /// Run a prompt against a fresh tool process.
    Exec(ExecArgs),
    /// Resume an existing session with a new prompt.
    Resume(ResumeArgs),
    /// Fork an existing session into a new one.
    Fork(ForkArgs),
    /// Manage session groups.
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// Manage prompt queues.
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Manage bookmarks.
    Bookmark {
        #[command(subcommand)]
        command: BookmarkCommands,
    },
    /// Manage API tokens.
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Internal: runs the HTTP/WS daemon in the foreground. Spawned by
    /// `daemon start`, not meant to be invoked directly.
    #[command(hide = true, name = "__serve")]
    Serve,
}

#[derive(Subcommand, Debug)]
pub enum DaemonCommands {
    /// Starts the daemon in the background, if one isn't already running.
    Start,
    /// Stops the running daemon.
    Stop,
    /// Reports whether the daemon is running, stale, or stopped.
    Status,
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommands {
    /// Lists recorded sessions, newest first.
    List {
        #[arg(long)]
        cwd: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Shows a single session's metadata.
    Show { id: String },
    /// Streams a session's events to the terminal as they arrive.
    Tail {
        id: String,
        #[arg(long)]
        follow: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct ExecArgs {
    pub prompt: String,
    #[arg(long)]
    pub cwd: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub full_auto: bool,
    #[arg(long)]
    pub sandbox: Option<String>,
    #[arg(long)]
    pub ask_for_approval: Option<String>,
    #[arg(long = "image")]
    pub images: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ResumeArgs {
    pub session_id: String,
    pub prompt: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub full_auto: bool,
}

#[derive(clap::Args, Debug)]
pub struct ForkArgs {
    pub session_id: String,
    #[arg(long)]
    pub at: Option<usize>,
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    List,
    Create { name: String, #[arg(long)] description: Option<String> },
    AddSession { group_id: String, session_id: String },
    RemoveSession { group_id: String, session_id: String },
    Run { group_id: String, prompt: String },
    Pause { group_id: String },
    Resume { group_id: String },
    Delete { group_id: String },
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    List,
    Create { name: String, project_path: String },
    AddPrompt {
        queue_id: String,
        prompt: String,
        #[arg(long, default_value = "auto")]
        mode: String,
    },
    Move { queue_id: String, command_id: String, new_index: usize },
    Mode { queue_id: String, command_id: String, mode: String },
    Run { queue_id: String },
    Pause { queue_id: String },
    Resume { queue_id: String },
    Stop { queue_id: String },
    Delete { queue_id: String },
}

#[derive(Subcommand, Debug)]
pub enum BookmarkCommands {
    List,
    Create {
        #[arg(long = "type", default_value = "session")]
        kind: String,
        session_id: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    List,
    Create {
        name: String,
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },
    Revoke { id: String },
}
