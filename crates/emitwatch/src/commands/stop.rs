//! `emitwatch stop <uuid>`: terminate one simulation without opening the
//! stream.

use emitwatch_core::{Monitor, StopOutcome};

use super::RenderOpts;
use crate::cli::StopArgs;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: StopArgs, monitor: &Monitor, opts: RenderOpts) -> Result<(), CliError> {
    tracing::debug!(uuid = %args.uuid, "requesting stop");
    match monitor.stop_entity(&args.uuid).await? {
        StopOutcome::Stopped => {
            if !opts.quiet {
                eprintln!(
                    "{}",
                    output::success(&format!("Stopped {}", args.uuid), opts.color)
                );
            }
            Ok(())
        }
        StopOutcome::SessionExpired => Err(CliError::SessionExpired),
    }
}
