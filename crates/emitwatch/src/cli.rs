//! Clap derive structures for the `emitwatch` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// emitwatch -- live telemetry for simulated emitters
#[derive(Debug, Parser)]
#[command(
    name = "emitwatch",
    version,
    about = "Watch live emitter telemetry from the command line",
    long_about = "Streams server-pushed coordinates from a simulator backend and\n\
        renders the live map of emitters as a table or as JSON lines.",
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
    /// Backend profile to use
    #[arg(long, short = 'p', env = "EMITWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend base URL (overrides profile)
    #[arg(long, short = 's', env = "EMITWATCH_SERVER", global = true)]
    pub server: Option<String>,

    /// Bearer token (overrides profile, keyring, and token_env)
    #[arg(long, env = "EMITWATCH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "EMITWATCH_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "EMITWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Command request timeout in seconds (the stream itself has none)
    #[arg(long, env = "EMITWATCH_REQUEST_TIMEOUT", global = true)]
    pub request_timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON, one array per snapshot
    Json,
    /// One compact JSON array per line, one line per snapshot
    JsonLines,
    /// YAML, one document per snapshot
    Yaml,
    /// Entity ids, one per line (scripting)
    Plain,
}

impl OutputFormat {
    /// Parse the `defaults.output` config value; unknown names fall back
    /// to a table.
    pub fn from_config(value: &str) -> Self {
        <Self as ValueEnum>::from_str(value, true).unwrap_or(Self::Table)
    }
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

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live telemetry and render the entity map
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Stop the simulation behind one emitter
    Stop(StopArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Exit after the first non-empty snapshot
    #[arg(long)]
    pub once: bool,

    /// Stop watching after this many seconds
    #[arg(long, short = 't', value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

// ── Stop ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StopArgs {
    /// Emitter id (simulation uuid)
    pub uuid: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (tokens masked)
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a bearer token for the active profile in the system keyring
    SetToken,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
