pub(crate) mod schema;

use anyhow::Error;
use schema::Settings;
use std::path::Path;
use tokio::{fs::File, io::AsyncReadExt};

async fn read_settings(path: &Path) -> Result<Settings, Error> {
    let mut file = File::open(path).await?;
    let mut json = String::new();
    file.read_to_string(&mut json).await?;
    Ok(serde_json::from_str(&json)?)
}

/// Settings from `path`; a missing or unreadable file gives empty settings.
pub(crate) async fn load_settings(path: &Path) -> Settings {
    match read_settings(path).await {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("Could not read settings from {}: {}", path.display(), err);
            Settings::default()
        }
    }
}
