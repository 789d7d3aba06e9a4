//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate().map_err(ClientError::Config)?;

    if let Some(ref google) = config.google {
        match google.resolve_credentials().map_err(ClientError::Config)? {
            Some(creds) => {
                creds.validate().map_err(|e| {
                    ClientError::Config(format!("invalid Google credentials: {}", e))
                })?;
                println!("Google credentials are valid.");
            }
            None => println!("No Google credentials in [google]; `slowjog server` reads CLIENT_ID and CLIENT_SECRET."),
        }
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ClientResult<()> {
    let config_path = ClientConfig::default_path();
    println!("config: {}", config_path.display());
    Ok(())
}
