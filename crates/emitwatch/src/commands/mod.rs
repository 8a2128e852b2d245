//! Command handlers.

pub mod config_cmd;
pub mod stop;
pub mod watch;

use crate::cli::OutputFormat;

/// Output settings shared by the commands that talk to the backend.
#[derive(Debug, Clone, Copy)]
pub struct RenderOpts {
    pub format: OutputFormat,
    pub quiet: bool,
    /// Colorize stderr status lines.
    pub color: bool,
}
