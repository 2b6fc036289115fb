use agbridge_types::AgentType;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "agbridge")]
#[command(about = "List, replay, search and chat with AI coding-agent sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Data directory (default: $AGBRIDGE_PATH, then the system data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[arg(long, value_enum, default_value = "plain", global = true)]
    pub format: OutputFormat,

    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Browse and manage stored sessions")]
    Sessions {
        #[command(subcommand)]
        command: SessionsCommand,
    },

    #[command(about = "Show or detect backend storage locations")]
    Providers {
        #[command(subcommand)]
        command: ProvidersCommand,
    },

    #[command(about = "Chat with a backend; reads turns from stdin when no message is given")]
    Chat(ChatArgs),
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    #[command(about = "List sessions, newest first")]
    List {
        #[arg(long)]
        agent: Option<AgentType>,

        #[arg(long, default_value = "50")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    #[command(about = "Print a session's messages")]
    Show {
        id: String,

        #[arg(long)]
        agent: Option<AgentType>,
    },

    #[command(about = "Search session contents")]
    Search {
        query: String,

        #[arg(long)]
        agent: Option<AgentType>,

        /// Treat the query as a regular expression
        #[arg(long)]
        regex: bool,

        #[arg(short = 'i', long)]
        ignore_case: bool,
    },

    #[command(about = "Set a display name")]
    Rename { id: String, name: String },

    #[command(about = "Remove a display name")]
    ClearName { id: String },

    #[command(about = "Delete a session from backend storage")]
    Delete {
        id: String,

        #[arg(long)]
        agent: Option<AgentType>,
    },

    #[command(about = "Recently opened sessions")]
    Recent,
}

#[derive(Subcommand, Debug)]
pub enum ProvidersCommand {
    #[command(about = "Show enabled backends and their storage roots")]
    List,

    #[command(about = "Detect backends on this host and write config.toml")]
    Detect,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    #[arg(long, default_value = "cli-transcript")]
    pub agent: AgentType,

    /// Resume this backend session
    #[arg(long)]
    pub session: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    /// Working directory for the backend
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    pub message: Vec<String>,
}
