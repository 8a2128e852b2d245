//! Config subcommand handlers.

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Prompt for a token without echo. Empty input means "no token".
fn prompt_token() -> Result<Option<String>, CliError> {
    let token =
        rpassword::prompt_password("Bearer token (empty for none): ").map_err(prompt_err)?;
    Ok(Some(token.trim().to_owned()).filter(|t| !t.is_empty()))
}

/// Offer to store the token in the system keyring or return it for
/// plaintext config.
///
/// Returns `Some(token)` if the user chose plaintext, `None` if stored in
/// the keyring.
fn prompt_token_storage(token: &str, profile_name: &str) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the token?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        emitwatch_config::store_token(profile_name, token)?;
        eprintln!("   ✓ token stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(token.to_owned()))
    }
}

fn render_config(cfg: &Config, format: OutputFormat) -> Result<String, CliError> {
    let masked = cfg.masked();
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&masked)?,
        OutputFormat::JsonLines => serde_json::to_string(&masked)?,
        OutputFormat::Yaml => {
            serde_yaml::to_string(&masked).map_err(|e| CliError::Render(e.to_string()))?
        }
        OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&masked)?,
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("emitwatch configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let mut cfg = config::load_config_or_default();

            // 1. Profile name
            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default(global.profile.clone().unwrap_or_else(|| "default".into()))
                .interact_text()
                .map_err(prompt_err)?;

            // 2. Server URL
            let server: String = Input::new()
                .with_prompt("Server URL")
                .default("http://localhost:8080".into())
                .validate_with(|input: &String| {
                    emitwatch_config::parse_server(input)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact_text()
                .map_err(prompt_err)?;

            // 3. Token
            let token = match prompt_token()? {
                Some(token) => prompt_token_storage(&token, &profile_name)?,
                None => None,
            };

            // 4. Build profile and config
            let profile = Profile {
                server,
                token,
                ..Profile::default()
            };
            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());

            // 5. Write config
            let path = emitwatch_config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Try it: emitwatch watch --once");

            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let format = config::output_format(global, &cfg);
            let out = render_config(&cfg, format)?;
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: emitwatch config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            cfg.profile(&name)?;

            cfg.default_profile = Some(name.clone());
            emitwatch_config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetToken ───────────────────────────────────────────────
        ConfigCommand::SetToken => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            cfg.profile(&profile_name)?;

            let Some(token) = prompt_token()? else {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token cannot be empty".into(),
                });
            };
            emitwatch_config::store_token(&profile_name, &token)?;
            eprintln!("✓ Token for profile '{profile_name}' stored in system keyring");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Config {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                server: "http://sim.local".into(),
                token: Some("hunter2".into()),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn show_masks_tokens_in_every_format() {
        for format in [
            OutputFormat::Table,
            OutputFormat::Json,
            OutputFormat::JsonLines,
            OutputFormat::Yaml,
            OutputFormat::Plain,
        ] {
            let out = render_config(&sample(), format).unwrap();
            assert!(!out.contains("hunter2"), "{format:?} leaked the token");
            assert!(out.contains("http://sim.local"));
        }
    }
}
