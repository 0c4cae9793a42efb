use std::fs;
use std::path::{Path, PathBuf};

use ingest::TelemetrySettings;
use serde::{Deserialize, Serialize};

const CONFIG_DIR_NAME: &str = "usage-tracker";
const CONFIG_FILE_NAME: &str = "usage-tracker.toml";
const DEFAULT_PORT: u16 = 3846;

const ENV_HOST: &str = "LANGFUSE_HOST";
const ENV_PUBLIC_KEY: &str = "LANGFUSE_PUBLIC_KEY";
const ENV_SECRET_KEY: &str = "LANGFUSE_SECRET_KEY";
const ENV_DB_PATH: &str = "USAGE_TRACKER_DB_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: None,
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl CliConfig {
    /// Environment values win over the file. Empty values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(host) = lookup(ENV_HOST) {
            self.telemetry.host = Some(host);
        }
        if let Some(public_key) = lookup(ENV_PUBLIC_KEY) {
            self.telemetry.public_key = Some(public_key);
        }
        if let Some(secret_key) = lookup(ENV_SECRET_KEY) {
            self.telemetry.secret_key = Some(secret_key);
        }
        if let Some(db_path) = lookup(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(db_path));
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: CliConfig,
    pub file: PathBuf,
    pub created: bool,
}

pub fn load_or_create(explicit: Option<&Path>) -> Result<ConfigLoad, String> {
    let file = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_dir()?.join(CONFIG_FILE_NAME),
    };
    load_or_create_at(file)
}

fn load_or_create_at(file: PathBuf) -> Result<ConfigLoad, String> {
    if file.exists() {
        let contents = fs::read_to_string(&file)
            .map_err(|err| format!("read config {}: {}", file.display(), err))?;
        let config: CliConfig = toml::from_str(&contents)
            .map_err(|err| format!("parse config {}: {}", file.display(), err))?;
        return Ok(ConfigLoad {
            config,
            file,
            created: false,
        });
    }

    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)
            .map_err(|err| format!("create config dir {}: {}", dir.display(), err))?;
    }
    let config = CliConfig::default();
    let contents =
        toml::to_string_pretty(&config).map_err(|err| format!("serialize config: {}", err))?;
    fs::write(&file, contents)
        .map_err(|err| format!("write config {}: {}", file.display(), err))?;

    Ok(ConfigLoad {
        config,
        file,
        created: true,
    })
}

fn config_dir() -> Result<PathBuf, String> {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir).join(CONFIG_DIR_NAME));
        }
    }
    let home = std::env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
    Ok(PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME))
}
