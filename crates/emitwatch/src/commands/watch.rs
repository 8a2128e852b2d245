//! `emitwatch watch`: open the telemetry stream and render every change
//! to the live map until interrupted.

use std::future::pending;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use emitwatch_core::{
    EntityStream, Monitor, MonitorEvent, SessionEvent, SessionSignal, TelemetryEntity,
};

use super::RenderOpts;
use crate::cli::{OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

/// How often to check whether the server closed the stream.
const END_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Why the watch loop ended without an error.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Interrupted,
    Once,
    DurationElapsed,
    StreamEnded,
}

pub async fn handle(args: WatchArgs, monitor: &Monitor, opts: RenderOpts) -> Result<(), CliError> {
    // Subscribe before starting so the first frames are not missed.
    let mut session = monitor.client().session().map(SessionSignal::subscribe);
    let mut events = monitor.events();
    let mut entities = monitor.entities();

    monitor.start()?;
    let result = watch_loop(&args, monitor, opts, &mut entities, &mut events, &mut session).await;
    monitor.stop();

    let exit = result?;
    debug!(?exit, "watch finished");
    if exit == Exit::StreamEnded && !opts.quiet {
        eprintln!("{}", output::notice("stream closed by server", opts.color));
    }
    Ok(())
}

async fn watch_loop(
    args: &WatchArgs,
    monitor: &Monitor,
    opts: RenderOpts,
    entities: &mut EntityStream<TelemetryEntity>,
    events: &mut broadcast::Receiver<MonitorEvent>,
    session: &mut Option<broadcast::Receiver<SessionEvent>>,
) -> Result<Exit, CliError> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let deadline = async {
        match args.timeout {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut end_check = tokio::time::interval(END_POLL_INTERVAL);
    end_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = &mut ctrl_c => return Ok(Exit::Interrupted),

            () = session_expired(session) => return Err(CliError::SessionExpired),

            event = events.recv() => match event {
                Ok(MonitorEvent::Error { message, detail }) => {
                    return Err(CliError::StreamFailed { message, detail });
                }
                Ok(MonitorEvent::Connected) => {
                    if !opts.quiet && opts.format == OutputFormat::Table {
                        eprintln!("{}", output::success("connected", opts.color));
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Ok(Exit::StreamEnded),
            },

            snapshot = entities.changed() => {
                let Some(snapshot) = snapshot else {
                    return Ok(Exit::StreamEnded);
                };
                render(opts, &snapshot)?;
                if args.once && !snapshot.is_empty() {
                    return Ok(Exit::Once);
                }
            }

            () = &mut deadline => {
                return match args.timeout {
                    Some(seconds) if args.once => Err(CliError::Timeout { seconds }),
                    _ => Ok(Exit::DurationElapsed),
                };
            }

            _ = end_check.tick() => {
                if !monitor.is_streaming() {
                    return Ok(Exit::StreamEnded);
                }
            }
        }
    }
}

/// Resolves once the session signal reports expiry; never without one.
async fn session_expired(session: &mut Option<broadcast::Receiver<SessionEvent>>) {
    let Some(rx) = session else {
        return pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(SessionEvent::Expired) => return,
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return pending().await,
        }
    }
}

fn render(opts: RenderOpts, snapshot: &[std::sync::Arc<TelemetryEntity>]) -> Result<(), CliError> {
    let out = output::render_snapshot(opts.format, snapshot)?;
    if opts.format == OutputFormat::Table && !opts.quiet {
        output::clear_screen();
    }
    output::print_output(&out, opts.quiet);
    Ok(())
}
