//! Clap derive structures for the `liveroom` CLI.
//!
//! Also compiled by `build.rs` for man pages, so this file depends on
//! nothing but `clap` and `clap_complete`.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// liveroom -- watch and drive a live-room recorder from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "liveroom",
    version,
    about = "Watch and drive a live-room recorder from the command line",
    long_about = "Client for a live-stream recorder.\n\n\
        Lists monitored rooms, shows per-room refresh status and logs, and\n\
        follows the recorder live over its push channel with a polling backstop.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Recorder URL (overrides config)
    #[arg(long, short = 's', env = "LIVEROOM_SERVER", global = true)]
    pub server: Option<String>,

    /// Output format (overrides config)
    #[arg(long, short = 'o', global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output (overrides config)
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List monitored rooms
    #[command(alias = "ls")]
    Lives(LivesArgs),

    /// Show one room's detail, refresh status and recent logs
    Show(ShowArgs),

    /// Follow the recorder live: room list, refresh countdowns, notices
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Ask the recorder to refresh a room now
    Refresh(RoomArgs),

    /// Start monitoring a room
    Start(RoomArgs),

    /// Stop monitoring a room
    Stop(RoomArgs),

    /// Add rooms to the recorder by URL
    Add(AddArgs),

    /// Remove a room from the recorder
    #[command(alias = "rm")]
    Remove(RemoveArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Room commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LivesArgs {
    /// Sort column; remembered for later runs
    #[arg(long)]
    pub sort: Option<SortKey>,

    /// Sort direction; remembered for later runs
    #[arg(long, requires = "sort")]
    pub order: Option<SortDirection>,

    /// Only rooms with a status tag, e.g. "录制中"
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    /// Streamer name
    Name,
    /// Platform
    Address,
    /// Recording state
    Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortDirection {
    Ascend,
    Descend,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Room id, streamer name or room title
    pub room: String,

    /// Log lines to fetch (overrides config)
    #[arg(long, short = 'n')]
    pub lines: Option<usize>,
}

#[derive(Debug, Args)]
pub struct RoomArgs {
    /// Room id, streamer name or room title
    pub room: String,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Room URLs; a bare host is taken as https
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Add without starting to monitor
    #[arg(long)]
    pub no_listen: bool,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Room id, streamer name or room title
    pub room: String,

    /// Also delete the room's recordings on the recorder
    #[arg(long)]
    pub delete_files: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Rooms to follow in detail (id, streamer name or room title)
    pub rooms: Vec<String>,

    /// Rely on polling only for the room list
    #[arg(long, conflicts_with = "push")]
    pub no_push: bool,

    /// Subscribe to list-level push events
    #[arg(long)]
    pub push: bool,

    /// Remember the --push / --no-push choice for later runs
    #[arg(long)]
    pub save: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a single configuration value
    Set {
        /// Key, e.g. server, push_enabled, sort.column_key
        key: String,
        /// New value
        value: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
