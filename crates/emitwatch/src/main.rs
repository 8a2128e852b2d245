mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use emitwatch_core::{Monitor, SessionSignal};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::commands::RenderOpts;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Logs go to stderr so rendered snapshots on stdout stay parseable.
fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a backend
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "emitwatch", &mut std::io::stdout());
            Ok(())
        }

        Command::Watch(args) => {
            let (monitor, opts) = connect(&cli.global)?;
            commands::watch::handle(args, &monitor, opts).await
        }

        Command::Stop(args) => {
            let (monitor, opts) = connect(&cli.global)?;
            commands::stop::handle(args, &monitor, opts).await
        }
    }
}

/// Build the monitor from the config file, profile, and CLI overrides.
fn connect(global: &GlobalOpts) -> Result<(Monitor, RenderOpts), CliError> {
    let cfg = config::load_config_or_default();
    let monitor_config = config::resolve(global, &cfg)?;
    tracing::debug!(server = %monitor_config.base_url, "resolved monitor config");

    let opts = RenderOpts {
        format: config::output_format(global, &cfg),
        quiet: global.quiet,
        color: output::should_color(global.color),
    };
    let monitor = Monitor::new(monitor_config, SessionSignal::new())?;
    Ok((monitor, opts))
}
