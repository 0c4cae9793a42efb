use std::fs;
use std::path::PathBuf;

const DATA_DIR_NAME: &str = "usage-tracker";
const DB_FILE_NAME: &str = "usage-tracker.sqlite";

/// Default database location under the user's data dir, created if missing.
pub fn default_db_path() -> Result<PathBuf, String> {
    let dir = data_dir()?;
    fs::create_dir_all(&dir)
        .map_err(|err| format!("create data dir {}: {}", dir.display(), err))?;
    Ok(dir.join(DB_FILE_NAME))
}

fn data_dir() -> Result<PathBuf, String> {
    if let Ok(dir) = std::env::var("XDG_DATA_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir).join(DATA_DIR_NAME));
        }
    }
    let home = std::env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join(DATA_DIR_NAME))
}
