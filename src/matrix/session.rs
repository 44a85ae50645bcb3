//! On-disk Matrix session.
//!
//! The data directory holds two entries:
//! - `session`: JSON file with the login tokens and the last sync token
//! - `sqlite`: the Matrix SDK state store
//!
//! Restoring the session avoids a new login (and a new device) at every start.

use std::path::PathBuf;

use log::{debug, trace};
use matrix_sdk::authentication::matrix::MatrixSession;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Content of the `session` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    /// Login tokens and device of the bot account
    user_session: MatrixSession,
    /// Position of the last completed sync
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_token: Option<String>,
}

/// Session files of the bot account.
#[derive(Clone)]
pub struct SessionStore {
    /// Session read at start-up, if any
    stored: Option<StoredSession>,
    /// `dir_path/session`
    session_path: PathBuf,
    /// `dir_path/sqlite`
    sqlite_path: PathBuf,
}

impl SessionStore {
    /// Opens the session store in `dir_path`.
    ///
    /// A missing or unreadable session file is not an error: the bot simply
    /// logs in again.
    pub async fn open(dir_path: &str) -> Self {
        let session_path: PathBuf = [dir_path, "session"].iter().collect();
        let sqlite_path: PathBuf = [dir_path, "sqlite"].iter().collect();

        let stored = match read_session(&session_path).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                debug!("no usable session at {}: {}", session_path.display(), e);
                None
            }
        };

        SessionStore {
            stored,
            session_path,
            sqlite_path,
        }
    }

    pub fn user_session(&self) -> Option<&MatrixSession> {
        self.stored.as_ref().map(|s| &s.user_session)
    }

    pub fn sync_token(&self) -> Option<String> {
        self.stored.as_ref().and_then(|s| s.sync_token.clone())
    }

    pub fn sqlite_path(&self) -> &PathBuf {
        &self.sqlite_path
    }

    /// Writes a fresh session after a login, without sync token.
    pub async fn save_user_session(&self, user_session: &MatrixSession) -> anyhow::Result<()> {
        trace!("persist user session");

        let stored = StoredSession {
            user_session: user_session.clone(),
            sync_token: None,
        };
        if let Some(dir) = self.session_path.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::write(&self.session_path, serde_json::to_string(&stored)?).await?;
        Ok(())
    }

    /// Records the latest sync token next to the user session.
    ///
    /// # Errors
    ///
    /// Fails if no session file has been written yet or it cannot be parsed.
    pub async fn save_sync_token(&self, sync_token: String) -> anyhow::Result<()> {
        trace!("persist sync token {}", sync_token);

        let mut stored = read_session(&self.session_path).await?;
        stored.sync_token = Some(sync_token);
        fs::write(&self.session_path, serde_json::to_string(&stored)?).await?;
        Ok(())
    }
}

async fn read_session(session_path: &PathBuf) -> anyhow::Result<StoredSession> {
    let data = fs::read_to_string(session_path).await?;
    Ok(serde_json::from_str(&data)?)
}
