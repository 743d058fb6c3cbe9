//! Environment driven configuration for both handlers.

use std::env;

use crate::errors::Error;

pub const TABLE_NAME_VAR: &str = "DYNAMODB_TABLE_NAME";
pub const SYSTEM_NAME_VAR: &str = "SYSTEM_NAME";
pub const ENV_TYPE_VAR: &str = "ENV_TYPE";

pub const TWILIO_AUTH_TOKEN: &str = "twilio-auth-token";
pub const MEDIA_API_URL: &str = "media-api-url";

/// Identifiers namespacing the webhook handler's parameter-store lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub system_name: String,
    pub env_type: String,
}

impl WebhookConfig {
    pub fn new(system_name: impl Into<String>, env_type: impl Into<String>) -> Self {
        WebhookConfig {
            system_name: system_name.into(),
            env_type: env_type.into(),
        }
    }

    pub fn from_env() -> Result<Self, Error> {
        Ok(WebhookConfig::new(
            required_var(SYSTEM_NAME_VAR)?,
            required_var(ENV_TYPE_VAR)?,
        ))
    }

    /// Full parameter name, e.g. `/voice/dev/twilio-auth-token`.
    pub fn parameter_name(&self, key: &str) -> String {
        format!("/{}/{}/{}", self.system_name, self.env_type, key)
    }

    pub fn parameter_keys(&self) -> ParameterKeys {
        ParameterKeys {
            twilio_auth_token: self.parameter_name(TWILIO_AUTH_TOKEN),
            media_api_url: self.parameter_name(MEDIA_API_URL),
        }
    }
}

/// The two names requested from the parameter store per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterKeys {
    pub twilio_auth_token: String,
    pub media_api_url: String,
}

impl ParameterKeys {
    pub fn names(&self) -> Vec<String> {
        vec![self.twilio_auth_token.clone(), self.media_api_url.clone()]
    }
}

pub fn table_name_from_env() -> Result<String, Error> {
    required_var(TABLE_NAME_VAR)
}

fn required_var(name: &str) -> Result<String, Error> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::config(format!("{} must be set", name))),
    }
}
