//! CLI-specific config helpers.
//!
//! Layers `GlobalOpts` flag overrides on top of the shared profile loading in
//! `meshgate-config`: flag (or its env var) > profile > defaults.

use std::time::Duration;

use clap::ValueEnum;
use secrecy::SecretString;

use meshgate_config::{Config, Profile};
use meshgate_mqtt::BrokerConfig;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

pub use meshgate_config::{config_path, load_config_or_default, save_config};

/// Everything the shell needs after flags, profile and defaults are merged.
#[derive(Debug)]
pub struct Settings {
    pub profile_name: String,
    pub broker: BrokerConfig,
    pub response_timeout: Duration,
    pub update_rate: Duration,
    pub output: OutputFormat,
    pub color: ColorMode,
}

/// Determine which profile to use: `--profile` > `default_profile` > "default".
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Output format: flag > config default > table.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global
        .output
        .or_else(|| OutputFormat::from_str(&cfg.defaults.output, true).ok())
        .unwrap_or(OutputFormat::Table)
}

/// Color mode: flag > config default > auto.
pub fn color_mode(global: &GlobalOpts, cfg: &Config) -> ColorMode {
    global
        .color
        .or_else(|| ColorMode::from_str(&cfg.defaults.color, true).ok())
        .unwrap_or(ColorMode::Auto)
}

/// Resolve the broker connection and shell tuning for this invocation.
///
/// Without a matching profile the broker must come from `--broker`.
pub fn resolve(global: &GlobalOpts, cfg: &Config) -> Result<Settings, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let stored = cfg.profiles.get(&profile_name);
    if stored.is_none() && global.profile.is_some() && global.broker.is_none() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: cfg.profile_names().join(", "),
        });
    }

    let mut profile = match (stored, &global.broker) {
        (Some(profile), _) => profile.clone(),
        (None, Some(broker)) => Profile::new(broker.clone()),
        (None, None) => {
            return Err(CliError::NoBroker {
                path: config_path().display().to_string(),
            });
        }
    };
    apply_overrides(&mut profile, global);

    let mut broker = meshgate_config::profile_to_broker_config(&profile, &profile_name)?;
    if let Some(ref password) = global.password {
        broker.password = Some(SecretString::from(password.clone()));
    }

    let response_timeout = global.timeout.map_or_else(
        || meshgate_config::profile_timeout(Some(&profile), &cfg.defaults),
        Duration::from_secs,
    );
    if response_timeout.is_zero() {
        return Err(CliError::validation("timeout", "must be at least 1 second"));
    }

    Ok(Settings {
        profile_name,
        broker,
        response_timeout,
        update_rate: Duration::from_secs(cfg.defaults.update_rate.max(1)),
        output: output_format(global, cfg),
        color: color_mode(global, cfg),
    })
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref broker) = global.broker {
        profile.broker.clone_from(broker);
    }
    if global.username.is_some() {
        profile.username.clone_from(&global.username);
    }
    if global.client_id.is_some() {
        profile.client_id.clone_from(&global.client_id);
    }
    if global.ca_cert.is_some() {
        profile.ca_cert.clone_from(&global.ca_cert);
    }
}
