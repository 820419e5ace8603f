use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::SessionUser;

/// What `portal auth login` leaves behind for later commands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliSession {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub user: Option<SessionUser>,
    pub logged_in_at: Option<DateTime<Utc>>,
}

impl CliSession {
    pub fn signed_in(base_url: &str, user: SessionUser) -> Self {
        Self {
            base_url: Some(base_url.to_string()),
            access_token: user.access_token.clone(),
            user: Some(SessionUser {
                access_token: None,
                ..user
            }),
            logged_in_at: Some(Utc::now()),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.access_token.is_some()
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("PORTAL_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("sekolah-portal")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_session() -> anyhow::Result<CliSession> {
    let session_file = get_config_dir()?.join("session.json");

    if !session_file.exists() {
        return Ok(CliSession::default());
    }

    let content = fs::read_to_string(session_file)?;
    let session: CliSession = serde_json::from_str(&content)?;
    Ok(session)
}

pub fn save_session(session: &CliSession) -> anyhow::Result<()> {
    let session_file = get_config_dir()?.join("session.json");

    let content = serde_json::to_string_pretty(session)?;
    fs::write(session_file, content)?;
    Ok(())
}

pub fn clear_session() -> anyhow::Result<bool> {
    let session_file = get_config_dir()?.join("session.json");
    if session_file.exists() {
        fs::remove_file(session_file)?;
        return Ok(true);
    }
    Ok(false)
}
