//! Config command handlers: init, show, path.

use jointly_config as cfg;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let renderer = output::Renderer::new(global);
    match args.command {
        ConfigCommand::Path => {
            renderer.emit(&cfg::config_path().display().to_string());
            Ok(())
        }

        ConfigCommand::Show => {
            let config = cfg::load_config_or_default();
            // The config file itself is TOML, so that is the natural
            // human view; plain lists the profile names.
            let out = match global.output {
                OutputFormat::Table => {
                    toml::to_string_pretty(&config).map_err(|e| CliError::Config(e.to_string()))?
                }
                OutputFormat::Json => output::json_pretty(&config),
                OutputFormat::JsonCompact => output::json_compact(&config),
                OutputFormat::Yaml => output::yaml(&config),
                OutputFormat::Plain => {
                    let mut names: Vec<&String> = config.profiles.keys().collect();
                    names.sort();
                    names
                        .into_iter()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            };
            renderer.emit(&out);
            Ok(())
        }

        ConfigCommand::Init { bridge, name } => {
            // Validate before writing anything.
            let _ = crate::config::parse_bridge_url(&bridge)?;

            let mut config = cfg::load_config_or_default();
            config.profiles.insert(
                name.clone(),
                cfg::Profile {
                    bridge,
                    timeout: None,
                    command_topic: None,
                    command_type: None,
                    battery_topic: None,
                },
            );
            if config.default_profile.is_none() {
                config.default_profile = Some(name.clone());
            }
            cfg::save_config(&config)?;

            if !global.quiet {
                eprintln!(
                    "Profile '{name}' saved to {}",
                    cfg::config_path().display()
                );
            }
            Ok(())
        }
    }
}
