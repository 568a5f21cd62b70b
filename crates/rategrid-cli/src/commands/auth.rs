use std::io::BufRead;

use clap::Subcommand;
use rategrid_core::sync::credentials;
use rategrid_core::sync::{keyring_store, API_KEY_ENTRY};
use rategrid_core::Config;

use super::CliResult;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the channel-manager API key in the OS keyring
    SetKey {
        /// API key; read from the first line of stdin when omitted
        #[arg(long)]
        key: Option<String>,
    },
    /// Remove the stored API key
    ClearKey,
    /// Check whether an API key is available
    Status,
}

pub fn run(action: AuthAction) -> CliResult {
    match action {
        AuthAction::SetKey { key } => {
            let key = match key {
                Some(key) => key,
                None => {
                    let mut line = String::new();
                    std::io::stdin().lock().read_line(&mut line)?;
                    line.trim().to_string()
                }
            };
            if key.is_empty() {
                return Err("API key must not be empty".into());
            }
            keyring_store::set(API_KEY_ENTRY, &key)?;
            println!("Channel manager API key stored");
        }
        AuthAction::ClearKey => {
            keyring_store::delete(API_KEY_ENTRY)?;
            println!("Channel manager API key removed");
        }
        AuthAction::Status => {
            let config = Config::load()?;
            let available = credentials::api_key(&config.channel_manager.api_key_env).is_ok();
            println!(
                "Channel manager: {}",
                if available {
                    "API key available"
                } else {
                    "no API key"
                }
            );
        }
    }
    Ok(())
}
