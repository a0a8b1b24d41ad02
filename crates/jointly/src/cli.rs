//! Clap derive structures for the `jointly` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// jointly -- robot telemetry bridge CLI
#[derive(Debug, Parser)]
#[command(
    name = "jointly",
    version,
    about = "Inspect and drive robot telemetry bridges from the command line",
    long_about = "A CLI for robot telemetry bridges speaking the rosbridge JSON protocol.\n\n\
        Streams joint state, lists topics, echoes arbitrary channels, and\n\
        publishes control commands over a single WebSocket connection.",
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
    /// Bridge profile to use
    #[arg(long, short = 'p', env = "JOINTLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Bridge WebSocket URL (overrides profile)
    #[arg(long, short = 'b', env = "JOINTLY_BRIDGE", global = true)]
    pub bridge: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "JOINTLY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Connect/service timeout in seconds
    #[arg(long, env = "JOINTLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    /// Effective timeout: flag > profile > 10s default.
    pub fn timeout_secs(&self, profile_timeout: Option<u64>) -> u64 {
        self.timeout.or(profile_timeout).unwrap_or(10)
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
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

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

/// The command tree splits on whether a bridge connection is needed:
/// [`BridgeCommand`]s get a session built for them, the rest run
/// entirely locally.
#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Bridge(BridgeCommand),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Subcommands that talk to a live bridge.
#[derive(Debug, Subcommand)]
pub enum BridgeCommand {
    /// Show bridge connection status and telemetry summary
    #[command(alias = "st")]
    Status,

    /// List topics known to the bridge
    #[command(alias = "t")]
    Topics(TopicsArgs),

    /// Show the current joint readings
    #[command(alias = "j")]
    Joints(JointsArgs),

    /// Stream telemetry frames as they arrive
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Subscribe to one topic and print its messages
    Echo(EchoArgs),

    /// Send a neck pose command
    Neck(NeckArgs),
}

// ── Per-command args ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TopicsArgs {
    /// Re-query the bridge instead of using the listing fetched on connect
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct JointsArgs {
    /// Only show joints whose name starts with this prefix (e.g. "left_")
    #[arg(long, short = 'g')]
    pub group: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many frames (default: stream until Ctrl-C)
    #[arg(long, short = 'n')]
    pub frames: Option<u64>,
}

#[derive(Debug, Args)]
pub struct EchoArgs {
    /// Topic name (e.g. "/odom")
    pub topic: String,

    /// Stop after this many messages (default: stream until Ctrl-C)
    #[arg(long, short = 'n')]
    pub count: Option<u64>,
}

#[derive(Debug, Args)]
pub struct NeckArgs {
    /// Pitch in radians
    #[arg(long, allow_negative_numbers = true)]
    pub pitch: f64,

    /// Yaw in radians
    #[arg(long, allow_negative_numbers = true)]
    pub yaw: f64,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile in the config file
    Init {
        /// Bridge WebSocket URL (e.g. "ws://192.168.123.4:9090")
        #[arg(long)]
        bridge: String,

        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,
    },

    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
