//! Clap derive structures for the `dashwire` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// dashwire -- terminal client for a dashwire monitoring dashboard
#[derive(Debug, Parser)]
#[command(
    name = "dashwire",
    version,
    about = "Watch a dashwire dashboard server from the command line",
    long_about = "Log in to a dashwire dashboard server, poll its stats and follow its\n\
        live log stream. Sessions survive network blips and are re-validated\n\
        before reconnecting.",
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
    /// Dashboard server URL (overrides config)
    #[arg(long, short = 's', env = "DASHWIRE_SERVER", global = true)]
    pub server: Option<String>,

    /// API base path or URL (default: /api)
    #[arg(long, env = "DASHWIRE_API_BASE", global = true)]
    pub api_base: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "DASHWIRE_OUTPUT", default_value = "table", global = true)]
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

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "DASHWIRE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, env = "DASHWIRE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
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
    /// Log in with an auth key and store the session
    Login(LoginArgs),

    /// End the session on the server and forget it locally
    Logout,

    /// Show the server and session state
    Status,

    /// Show server memory and uptime
    Stats(StatsArgs),

    /// Show server logs
    #[command(alias = "log")]
    Logs(LogsArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Auth key (prompted for when omitted)
    #[arg(long, env = "DASHWIRE_AUTH_KEY", hide_env_values = true)]
    pub auth_key: Option<String>,
}

// ── Stats ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Keep polling on the configured refresh interval
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Poll interval in seconds for --watch (5-60)
    #[arg(long, short = 'i', requires = "watch")]
    pub interval: Option<f64>,
}

// ── Logs ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LogsArgs {
    /// Keep the live log stream open and print new lines as they arrive
    #[arg(long, short = 'f')]
    pub follow: bool,

    /// Only show the last N history lines
    #[arg(long, short = 'n')]
    pub tail: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// Set the dashboard server URL
    SetServer {
        /// Server origin, e.g. http://127.0.0.1:8080
        url: String,
    },

    /// Set the refresh interval (seconds; legacy millisecond values accepted)
    SetInterval {
        /// Interval in seconds, clamped to 5-60
        seconds: f64,
    },

    /// Enable periodic refresh
    Enable,

    /// Disable periodic refresh
    Disable,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
