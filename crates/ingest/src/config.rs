use serde::{Deserialize, Serialize};

use crate::types::{IngestError, Result};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Upstream host and credentials. Fields may be absent at load time; the client checks them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            host: None,
            public_key: None,
            secret_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

pub(crate) struct Credentials {
    pub host: String,
    pub public_key: String,
    pub secret_key: String,
}

impl TelemetrySettings {
    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    pub(crate) fn credentials(&self) -> Result<Credentials> {
        let fields = [
            ("host", self.host.as_deref()),
            ("public_key", self.public_key.as_deref()),
            ("secret_key", self.secret_key.as_deref()),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.map(str::trim).unwrap_or_default().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(IngestError::Config(missing.join(", ")));
        }
        let value =
            |field: &Option<String>| field.as_deref().unwrap_or_default().trim().to_string();
        Ok(Credentials {
            host: value(&self.host).trim_end_matches('/').to_string(),
            public_key: value(&self.public_key),
            secret_key: value(&self.secret_key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_report_every_missing_field() {
        let settings = TelemetrySettings {
            host: Some("https://cloud.example.com".to_string()),
            public_key: Some("   ".to_string()),
            ..TelemetrySettings::default()
        };
        let err = settings.credentials().err().expect("missing fields");
        assert!(
            matches!(err, IngestError::Config(ref fields) if fields == "public_key, secret_key")
        );
        assert!(!settings.is_configured());
    }

    #[test]
    fn credentials_trim_trailing_slash_from_host() {
        let settings = TelemetrySettings {
            host: Some("https://cloud.example.com/".to_string()),
            public_key: Some("pk".to_string()),
            secret_key: Some("sk".to_string()),
            ..TelemetrySettings::default()
        };
        let credentials = settings.credentials().expect("configured");
        assert_eq!(credentials.host, "https://cloud.example.com");
    }
}
