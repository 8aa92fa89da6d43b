use crate::error::{env_error, BotResult, Error};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;

/// Default refetch interval in seconds
pub const DEFAULT_REFETCH_INTERVAL: u64 = 120;

/// Default reminder template, parameterized by summary/description/location
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "\u{23f0} Muistutus \u{23f0}\n<b>{summary}</b>\n{description}\n{location}";

/// Main configuration structure for the bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// CalDAV server URL
    pub caldav_url: String,
    /// CalDAV username
    pub caldav_username: String,
    /// CalDAV password
    pub caldav_password: String,
    /// Calendar display name to watch; empty means the first calendar found
    pub caldav_calendar_name: String,
    /// Telegram bot token
    pub telegram_token: String,
    /// Telegram chat to send reminders to (numeric id or @channel name)
    pub telegram_chat_id: String,
    /// Seconds between calendar refetches
    pub refetch_interval: u64,
    /// Reminder message template
    pub message_template: String,
    /// Map of component names to their enabled status
    pub components: HashMap<String, bool>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> BotResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        // Required environment variables
        let caldav_url = env::var("CALDAV_URL").map_err(|_| env_error("CALDAV_URL"))?;
        let caldav_username =
            env::var("CALDAV_USERNAME").map_err(|_| env_error("CALDAV_USERNAME"))?;
        let caldav_password =
            env::var("CALDAV_PASSWORD").map_err(|_| env_error("CALDAV_PASSWORD"))?;
        let telegram_token =
            env::var("TELEGRAM_TOKEN").map_err(|_| env_error("TELEGRAM_TOKEN"))?;
        let telegram_chat_id =
            env::var("TELEGRAM_CHAT_ID").map_err(|_| env_error("TELEGRAM_CHAT_ID"))?;

        // Optional calendar selector, empty falls back to the first calendar
        let caldav_calendar_name = env::var("CALDAV_CALENDAR_NAME").unwrap_or_default();

        let refetch_interval = match env::var("REFETCH_INTERVAL") {
            Ok(value) => value.parse::<u64>().map_err(|_| {
                Error::Config(format!("Invalid REFETCH_INTERVAL value: {}", value))
            })?,
            Err(_) => DEFAULT_REFETCH_INTERVAL,
        };

        let message_template = env::var("MESSAGE_TEMPLATE")
            .unwrap_or_else(|_| String::from(DEFAULT_MESSAGE_TEMPLATE));

        // Initialize default components
        let mut components = HashMap::new();
        components.insert("reminders".to_string(), true);

        // Load components configuration from file if it exists
        if let Ok(content) = fs::read_to_string("config/components.toml") {
            if let Ok(file_components) = toml::from_str::<HashMap<String, bool>>(&content) {
                // Merge with defaults
                for (key, value) in file_components {
                    components.insert(key, value);
                }
            }
        }

        Ok(Config {
            caldav_url,
            caldav_username,
            caldav_password,
            caldav_calendar_name,
            telegram_token,
            telegram_chat_id,
            refetch_interval,
            message_template,
            components,
        })
    }

    /// Check if a component is enabled
    pub fn is_component_enabled(&self, name: &str) -> bool {
        *self.components.get(name).unwrap_or(&false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            caldav_url: "https://dav.example.com/".to_string(),
            caldav_username: "user".to_string(),
            caldav_password: "pass".to_string(),
            caldav_calendar_name: String::new(),
            telegram_token: "token".to_string(),
            telegram_chat_id: "12345".to_string(),
            refetch_interval: DEFAULT_REFETCH_INTERVAL,
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            components: HashMap::new(),
        }
    }

    #[test]
    fn unknown_components_are_disabled() {
        let config = test_config();
        assert!(!config.is_component_enabled("reminders"));
    }

    #[test]
    fn component_flags_are_respected() {
        let mut config = test_config();
        config.components.insert("reminders".to_string(), true);
        assert!(config.is_component_enabled("reminders"));

        config.components.insert("reminders".to_string(), false);
        assert!(!config.is_component_enabled("reminders"));
    }
}
