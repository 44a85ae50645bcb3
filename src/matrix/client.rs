//! Matrix client wrapper used as the bot's chat source.

use log::{error, info};
use matrix_sdk::{Client, ruma::OwnedRoomId};

use crate::matrix::{
    UserCredentials, announcer::RoomAnnouncer, login::connect, session::SessionStore,
    sync::MatrixSync,
};

/// Logged-in Matrix account delivering chat messages.
pub struct MatrixClient {
    matrix_sync: MatrixSync,
    client: Client,
}

impl MatrixClient {
    /// Logs in (or restores the session stored in `session_path`) and
    /// prepares the sync loop.
    ///
    /// # Arguments
    ///
    /// * `user_credentials` - Bot account user ID and password
    /// * `session_path` - Directory holding the session file and SDK store
    /// * `room_filter` - Only forward messages from this room when set
    ///
    /// # Errors
    ///
    /// Returns an error if the login or the session restore fails.
    pub async fn new(
        user_credentials: &UserCredentials,
        session_path: &str,
        room_filter: Option<OwnedRoomId>,
    ) -> Result<Self, anyhow::Error> {
        let session_store = SessionStore::open(session_path).await;
        let client = connect(user_credentials, &session_store).await?;

        client.account().set_display_name(Some("tallybot")).await?;

        let matrix_sync = MatrixSync::new(&client, &session_store, room_filter);

        Ok(MatrixClient {
            matrix_sync,
            client,
        })
    }

    /// Runs the sync loop, calling `on_message(sender, body)` for each new
    /// text message.
    ///
    /// Only returns when the loop stops; the error, if any, is logged.
    pub async fn sync<F>(&self, on_message: F)
    where
        F: Fn(String, String) + Send + Sync + 'static,
    {
        match self.matrix_sync.sync(on_message).await {
            Ok(_) => info!("matrix sync ended successfully"),
            Err(e) => error!("matrix sync ended with error: {:?}", e),
        }
    }

    /// Dispatcher posting winners into `room_id`.
    pub fn announcer(&self, room_id: OwnedRoomId) -> RoomAnnouncer {
        RoomAnnouncer::new(self.client.clone(), room_id)
    }
}
