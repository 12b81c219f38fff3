use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use courier::models::PresenceStatus;

// Local persistence for the binary: saved login credentials, plus the
// small preferences store the dashboard uses for the self status and
// the "session expired" notice shown on the next login.

#[derive(Serialize, Deserialize, Clone)]
pub struct Credentials {
    pub server: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

impl Credentials {
    /// Stores the already-hashed password, base64-obfuscated. Nothing
    /// plaintext ever lands on disk.
    pub fn new(server: &str, username: &str, password_hash: &str) -> Self {
        Credentials {
            server: server.to_string(),
            username: username.to_string(),
            password_hash: Some(BASE64.encode(password_hash)),
        }
    }

    pub fn get_password_hash(&self) -> Option<String> {
        self.password_hash.as_ref().map(|encoded| {
            String::from_utf8(BASE64.decode(encoded).unwrap_or_default()).unwrap_or_default()
        })
    }
}

/// Preferences that survive restarts: the self-reported presence status
/// and a pending session-expiry notice, both written by the dashboard.
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Preferences {
    #[serde(default)]
    pub self_status: Option<String>,
    #[serde(default)]
    pub session_notice: Option<String>,
}

impl Preferences {
    pub fn status(&self) -> PresenceStatus {
        self.self_status
            .as_deref()
            .map(PresenceStatus::parse)
            .unwrap_or(PresenceStatus::Online)
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("courier");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn save_credentials(credentials: &Credentials) -> Result<()> {
    save_credentials_in(&get_config_dir()?, credentials)
}

pub fn load_credentials() -> Result<Option<Credentials>> {
    load_credentials_in(&get_config_dir()?)
}

pub fn save_credentials_in(dir: &Path, credentials: &Credentials) -> Result<()> {
    let file = File::create(dir.join("credentials.json"))?;
    serde_json::to_writer_pretty(file, credentials)?;

    info!("Credentials saved for {}", credentials.username);
    Ok(())
}

pub fn load_credentials_in(dir: &Path) -> Result<Option<Credentials>> {
    let path = dir.join("credentials.json");
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path)?;
    let credentials: Credentials = serde_json::from_str(&contents)?;
    info!(
        "Loaded credentials for {} from {}",
        credentials.username,
        path.display()
    );

    Ok(Some(credentials))
}

pub fn save_preferences(preferences: &Preferences) -> Result<()> {
    save_preferences_in(&get_config_dir()?, preferences)
}

pub fn load_preferences() -> Preferences {
    get_config_dir()
        .ok()
        .and_then(|dir| load_preferences_in(&dir).ok())
        .unwrap_or_default()
}

pub fn save_preferences_in(dir: &Path, preferences: &Preferences) -> Result<()> {
    let file = File::create(dir.join("preferences.json"))?;
    serde_json::to_writer_pretty(file, preferences)?;
    Ok(())
}

pub fn load_preferences_in(dir: &Path) -> Result<Preferences> {
    let path = dir.join("preferences.json");
    if !path.exists() {
        return Ok(Preferences::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Persist the self status without touching the rest of the file.
pub fn remember_self_status(status: PresenceStatus) {
    let mut preferences = load_preferences();
    preferences.self_status = Some(status.as_str().to_string());
    if let Err(e) = save_preferences(&preferences) {
        log::warn!("Failed to persist self status: {}", e);
    }
}

/// Persist a notice to show before the next login prompt.
pub fn remember_session_notice(notice: &str) {
    let mut preferences = load_preferences();
    preferences.session_notice = Some(notice.to_string());
    if let Err(e) = save_preferences(&preferences) {
        log::warn!("Failed to persist session notice: {}", e);
    }
}

/// Read and clear the pending session notice, if any.
pub fn take_session_notice() -> Option<String> {
    let mut preferences = load_preferences();
    let notice = preferences.session_notice.take();
    if notice.is_some() {
        let _ = save_preferences(&preferences);
    }
    notice
}
