use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use tracing::{info, warn};
use url::Url;

/// Module configuration, as found under the module's `config` key in the homeserver config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRulesConfig {
    /// Identity server used to map email addresses to homeservers
    pub id_server: String,

    /// Users exempt from every access rule check
    #[serde(default)]
    pub bypass_for_users: Vec<String>,

    /// Servers whose users may not join or be invited to restricted rooms
    #[serde(default)]
    pub domains_forbidden_when_restricted: Vec<String>,

    /// Make every member of existing direct rooms an admin
    #[serde(default)]
    pub fix_admins_for_dm_power_levels: bool,

    /// Open live location sharing to everyone in existing rooms
    #[serde(default)]
    pub add_live_location_power_levels: bool,
}

impl AccessRulesConfig {
    pub fn new(id_server: impl Into<String>) -> Self {
        Self {
            id_server: id_server.into(),
            bypass_for_users: Vec::new(),
            domains_forbidden_when_restricted: Vec::new(),
            fix_admins_for_dm_power_levels: false,
            add_live_location_power_levels: false,
        }
    }

    /// Parse and validate the options given in the homeserver config
    pub fn parse(config: Value) -> Result<Self, ConfigError> {
        let has_id_server = config.get("id_server").is_some_and(|v| !v.is_null());
        if !has_id_server {
            return Err(ConfigError::MissingRequired("id_server".to_string()));
        }

        let config: Self = serde_json::from_value(config)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        config.validate()?;

        info!(
            "Room access rules configured: id_server={}, {} bypass users, {} forbidden domains",
            config.id_server,
            config.bypass_for_users.len(),
            config.domains_forbidden_when_restricted.len()
        );
        Ok(config)
    }

    /// Read the configuration from `ACCESS_RULES_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let id_server = var("ACCESS_RULES_ID_SERVER")
            .ok_or_else(|| ConfigError::MissingRequired("ACCESS_RULES_ID_SERVER".to_string()))?;

        let config = Self {
            id_server,
            bypass_for_users: parse_list(var("ACCESS_RULES_BYPASS_FOR_USERS")),
            domains_forbidden_when_restricted: parse_list(var("ACCESS_RULES_FORBIDDEN_DOMAINS")),
            fix_admins_for_dm_power_levels: parse_flag(
                "ACCESS_RULES_FIX_ADMINS_FOR_DM_POWER_LEVELS",
                var("ACCESS_RULES_FIX_ADMINS_FOR_DM_POWER_LEVELS"),
            ),
            add_live_location_power_levels: parse_flag(
                "ACCESS_RULES_ADD_LIVE_LOCATION_POWER_LEVELS",
                var("ACCESS_RULES_ADD_LIVE_LOCATION_POWER_LEVELS"),
            ),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.id_server.trim().is_empty() {
            return Err(ConfigError::MissingRequired("id_server".to_string()));
        }
        self.identity_base_url()?;
        Ok(())
    }

    /// Base URL of the identity server. Bare host names are reached over https.
    pub fn identity_base_url(&self) -> Result<Url, ConfigError> {
        let raw = if self.id_server.starts_with("https://") || self.id_server.starts_with("http://") {
            self.id_server.clone()
        } else {
            format!("https://{}", self.id_server)
        };
        Url::parse(&raw).map_err(|e| ConfigError::InvalidFormat(format!("id_server: {}", e)))
    }

    pub fn is_bypass_user(&self, user_id: &str) -> bool {
        self.bypass_for_users.iter().any(|u| u == user_id)
    }

    pub fn is_forbidden_domain(&self, server_name: &str) -> bool {
        self.domains_forbidden_when_restricted.iter().any(|d| d == server_name)
    }

    /// Whether the power level repair task has anything to do
    pub fn repair_task_enabled(&self) -> bool {
        self.fix_admins_for_dm_power_levels || self.add_live_location_power_levels
    }
}

/// Comma separated list, blanks dropped
fn parse_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(name: &str, value: Option<String>) -> bool {
    match value {
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!("{} is not a boolean ({}), defaulting to false", name, value);
            false
        }),
        None => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),
}
