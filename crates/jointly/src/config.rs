//! Config glue: profile selection and translation to `SessionConfig`
//! with CLI flag overrides.
//!
//! The TOML schema lives in `jointly-config`; this module only layers
//! global flags on top.

use std::time::Duration;

use jointly_config as cfg;
use jointly_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &cfg::Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `SessionConfig` from the config file, profile, and CLI overrides.
///
/// Precedence for the bridge URL: `--bridge` flag > profile. A missing
/// profile is only an error when no `--bridge` flag was given either.
pub fn build_session_config(global: &GlobalOpts) -> Result<SessionConfig, CliError> {
    let file = cfg::load_config_or_default();
    let profile_name = active_profile_name(global, &file);
    let profile = file.profiles.get(&profile_name);

    let mut config = if let Some(url_str) = global.bridge.as_deref() {
        match profile {
            // Flag overrides the profile's URL but keeps its other settings.
            Some(p) => {
                let mut p = p.clone();
                p.bridge = url_str.to_owned();
                cfg::profile_to_session_config(&p)?
            }
            None => SessionConfig::new(parse_bridge_url(url_str)?),
        }
    } else if let Some(profile) = profile {
        cfg::profile_to_session_config(profile)?
    } else if global.profile.is_some() {
        // An explicitly named profile that doesn't exist is its own error.
        return Err(CliError::ProfileNotFound { name: profile_name });
    } else {
        return Err(CliError::NoConfig {
            path: cfg::config_path().display().to_string(),
        });
    };

    let timeout = global.timeout_secs(profile.and_then(|p| p.timeout));
    config = config.with_timeout(Duration::from_secs(timeout));

    Ok(config)
}

pub(crate) fn parse_bridge_url(url_str: &str) -> Result<url::Url, CliError> {
    let url: url::Url = url_str.parse().map_err(|_| CliError::Validation {
        field: "bridge".into(),
        reason: format!("invalid URL: {url_str}"),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(CliError::Validation {
            field: "bridge".into(),
            reason: format!("expected ws:// or wss:// URL, got '{other}://'"),
        }),
    }
}
