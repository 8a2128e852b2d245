//! CLI configuration: thin wrapper around `emitwatch_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--server, --token, --insecure, --request-timeout).

use std::time::Duration;

use secrecy::SecretString;

use emitwatch_core::{MonitorConfig, TlsVerification};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use emitwatch_config::{Config, Profile, config_path, load_config_or_default};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Output format: flag, then `defaults.output`.
pub fn output_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    global
        .output
        .unwrap_or_else(|| OutputFormat::from_config(&config.defaults.output))
}

/// Build a `MonitorConfig` from the config file, profile, and CLI
/// overrides. CLI flags take priority over profile values.
pub fn resolve(global: &GlobalOpts, config: &Config) -> Result<MonitorConfig, CliError> {
    let profile_name = active_profile_name(global, config);

    let mut monitor = if let Some(profile) = config.profiles.get(&profile_name) {
        let mut profile = profile.clone();
        if let Some(ref server) = global.server {
            profile.server.clone_from(server);
        }
        emitwatch_config::profile_to_monitor_config(&profile, &profile_name, &config.defaults)?
    } else if let Some(ref server) = global.server {
        // No profile -- build from flags / env vars alone
        let mut monitor = MonitorConfig::new(emitwatch_config::parse_server(server)?);
        monitor.request_timeout = Duration::from_secs(config.defaults.timeout);
        monitor.connect_timeout = Duration::from_secs(config.defaults.connect_timeout);
        if config.defaults.insecure {
            monitor.tls = TlsVerification::DangerAcceptInvalid;
        }
        monitor
    } else if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: config.profile_names(),
        });
    } else {
        return Err(CliError::NoServer {
            path: config_path().display().to_string(),
        });
    };

    if let Some(ref token) = global.token {
        monitor.token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        monitor.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.request_timeout {
        monitor.request_timeout = Duration::from_secs(secs);
    }

    Ok(monitor)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use secrecy::ExposeSecret;

    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["emitwatch"];
        argv.extend_from_slice(args);
        argv.push("watch");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with_lab() -> Config {
        let mut cfg = Config::default();
        cfg.default_profile = Some("lab".into());
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                server: "https://lab.local:8443".into(),
                token: Some("from-profile".into()),
                timeout: Some(12),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn flags_alone_are_enough() {
        let g = global(&["-s", "http://127.0.0.1:9000", "--token", "t0k", "-k"]);
        let monitor = resolve(&g, &Config::default()).unwrap();
        assert_eq!(monitor.base_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(monitor.token.unwrap().expose_secret(), "t0k");
        assert_eq!(monitor.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn flags_override_profile() {
        let g = global(&["-s", "http://other:1", "--request-timeout", "3"]);
        let monitor = resolve(&g, &config_with_lab()).unwrap();
        assert_eq!(monitor.base_url.as_str(), "http://other:1/");
        assert_eq!(monitor.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn profile_values_apply_without_flags() {
        let monitor = resolve(&global(&[]), &config_with_lab()).unwrap();
        assert_eq!(monitor.base_url.as_str(), "https://lab.local:8443/");
        assert_eq!(monitor.request_timeout, Duration::from_secs(12));
        assert_eq!(monitor.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn no_server_anywhere_is_an_error() {
        let err = resolve(&global(&[]), &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::NoServer { .. }));
    }

    #[test]
    fn unknown_explicit_profile_is_reported() {
        let err = resolve(&global(&["-p", "nope"]), &config_with_lab()).unwrap_err();
        assert!(matches!(err, CliError::ProfileNotFound { ref available, .. } if available == "lab"));
    }

    #[test]
    fn output_falls_back_to_config_default() {
        let mut cfg = Config::default();
        cfg.defaults.output = "json-lines".into();
        assert_eq!(output_format(&global(&[]), &cfg), OutputFormat::JsonLines);
        assert_eq!(output_format(&global(&["-o", "plain"]), &cfg), OutputFormat::Plain);
    }
}
