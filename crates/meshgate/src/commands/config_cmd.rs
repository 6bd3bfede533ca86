//! Config subcommand handlers.

use dialoguer::{Input, Select};

use meshgate_config::{Config, ConfigError, Profile, parse_broker_url};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with stored passwords masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}

fn format_config(cfg: &Config) -> String {
    toml::to_string_pretty(cfg)
        .map(|text| text.trim_end().to_owned())
        .unwrap_or_else(|e| format!("# failed to render config: {e}"))
}

fn save_config(cfg: &Config) -> Result<(), CliError> {
    config::save_config(cfg)?;
    Ok(())
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::validation("interactive", format!("prompt failed: {e}"))
}

fn profile_not_found(name: String, cfg: &Config) -> CliError {
    let available = cfg.profile_names();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

/// Expand `key` to a full dotted path. Bare profile fields such as
/// `broker` or `timeout` apply to the active profile.
fn qualify_key(key: &str, active_profile: &str) -> String {
    if key.contains('.') || key == "default_profile" {
        key.to_owned()
    } else {
        format!("profiles.{active_profile}.{key}")
    }
}

/// Interpret a raw CLI value as a TOML scalar, falling back to a string.
fn typed_value(raw: &str) -> toml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        toml::Value::Boolean(b)
    } else if let Ok(n) = raw.parse::<i64>() {
        toml::Value::Integer(n)
    } else {
        toml::Value::String(raw.to_owned())
    }
}

/// Set `path` (dot separated) to `raw` and re-read the result as a
/// [`Config`], so a value of the wrong shape is rejected before saving.
fn set_path(cfg: &Config, path: &str, raw: &str) -> Result<Config, CliError> {
    let typed = typed_value(raw);
    match set_path_to(cfg, path, typed.clone()) {
        Err(_) if !typed.is_str() => set_path_to(cfg, path, toml::Value::String(raw.to_owned())),
        result => result,
    }
}

fn set_path_to(cfg: &Config, path: &str, value: toml::Value) -> Result<Config, CliError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(CliError::validation("key", format!("'{path}' is not a valid key path")));
    }
    let Some((last, parents)) = segments.split_last() else {
        return Err(CliError::validation("key", "key cannot be empty"));
    };

    let mut doc = toml::Value::try_from(cfg).map_err(ConfigError::from)?;
    let mut table = doc
        .as_table_mut()
        .ok_or_else(|| CliError::validation("key", "config is not a table"))?;
    for segment in parents {
        table = table
            .entry((*segment).to_owned())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| CliError::validation("key", format!("'{segment}' is not a section")))?;
    }
    table.insert((*last).to_owned(), value);

    doc.try_into::<Config>()
        .map_err(|e| CliError::validation(path, e.message().to_owned()))
}

/// Where a password entered in the wizard ends up.
enum PasswordStorage {
    Keyring,
    Env(String),
    Plaintext,
}

fn prompt_password_storage(profile_name: &str) -> Result<PasswordStorage, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Read from an environment variable",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    Ok(match selection {
        0 => PasswordStorage::Keyring,
        1 => {
            let default_var = format!(
                "MESHGATE_{}_PASSWORD",
                profile_name.to_ascii_uppercase().replace('-', "_")
            );
            let var: String = Input::new()
                .with_prompt("Environment variable")
                .default(default_var)
                .interact_text()
                .map_err(prompt_err)?;
            PasswordStorage::Env(var)
        }
        _ => PasswordStorage::Plaintext,
    })
}

fn store_in_keyring(profile_name: &str, secret: &str) -> Result<(), CliError> {
    meshgate_config::store_password(profile_name, secret).map_err(|source| {
        CliError::Credentials {
            profile: profile_name.to_owned(),
            source,
        }
    })
}

// ── Wizard ──────────────────────────────────────────────────────────

fn init_wizard() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("meshgate configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let broker: String = Input::new()
        .with_prompt("Broker URL")
        .default("mqtt://localhost:1883".into())
        .validate_with(|url: &String| parse_broker_url(url).map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()
        .map_err(prompt_err)?;

    let username: String = Input::new()
        .with_prompt("Username (empty for anonymous)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let mut profile = Profile::new(broker);
    if !username.is_empty() {
        profile.username = Some(username);
        match prompt_password_storage(&profile_name)? {
            PasswordStorage::Keyring => {
                let secret = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
                if secret.is_empty() {
                    return Err(CliError::validation("password", "password cannot be empty"));
                }
                store_in_keyring(&profile_name, &secret)?;
                eprintln!("   ✓ Password stored in system keyring");
            }
            PasswordStorage::Env(var) => profile.password_env = Some(var),
            PasswordStorage::Plaintext => {
                let secret = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
                profile.password = Some(secret);
            }
        }
    }

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Start the shell: meshgate --profile {profile_name}");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init_wizard(),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let format = config::output_format(global, &cfg);
            let out = output::render_single(format, &redacted(&cfg), format_config, |_| {
                "config".into()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let path = qualify_key(&key, &profile_name);

            let updated = set_path(&cfg, &path, &value)?;
            save_config(&updated)?;
            eprintln!("✓ Set {path}");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: meshgate config init");
            } else {
                for name in cfg.profile_names() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(name, &cfg));
            }
            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(profile_name, &cfg));
            }

            let secret = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::validation("password", "password cannot be empty"));
            }
            store_in_keyring(&profile_name, &secret)?;
            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn lab_config() -> Config {
        let mut cfg = Config::default();
        let mut lab = Profile::new("mqtt://lab.local");
        lab.username = Some("ops".into());
        lab.password = Some("hunter2".into());
        cfg.profiles.insert("lab".into(), lab);
        cfg
    }

    #[test]
    fn bare_keys_target_the_active_profile() {
        assert_eq!(qualify_key("broker", "lab"), "profiles.lab.broker");
        assert_eq!(qualify_key("defaults.timeout", "lab"), "defaults.timeout");
        assert_eq!(qualify_key("default_profile", "lab"), "default_profile");
    }

    #[test]
    fn set_typed_and_string_values() {
        let cfg = lab_config();
        let cfg = set_path(&cfg, "defaults.timeout", "30").unwrap();
        assert_eq!(cfg.defaults.timeout, 30);

        // Numeric-looking usernames stay strings.
        let cfg = set_path(&cfg, "profiles.lab.username", "1234").unwrap();
        assert_eq!(cfg.profiles["lab"].username.as_deref(), Some("1234"));
    }

    #[test]
    fn set_creates_a_profile_from_its_broker() {
        let cfg = set_path(&Config::default(), "profiles.edge.broker", "mqtts://edge:8883").unwrap();
        assert_eq!(cfg.profiles["edge"].broker, "mqtts://edge:8883");
    }

    #[test]
    fn set_rejects_values_of_the_wrong_shape() {
        let cfg = lab_config();
        assert!(set_path(&cfg, "defaults.timeout", "soon").is_err());
        assert!(set_path(&cfg, "profiles..broker", "x").is_err());
        assert!(set_path(&cfg, "defaults.output.deep", "x").is_err());
    }

    #[test]
    fn show_masks_passwords() {
        let text = format_config(&redacted(&lab_config()));
        assert!(text.contains(REDACTED));
        assert!(!text.contains("hunter2"));
        assert!(text.contains("mqtt://lab.local"));
    }
}
