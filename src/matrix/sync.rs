//! Matrix sync loop feeding chat messages to a callback.
//!
//! [`MatrixSync::sync`]:
//! 1. Auto-joins rooms on invite
//! 2. Catches up once, so messages sent while the bot was offline are not
//!    counted as votes
//! 3. Forwards every new text message to the callback and keeps syncing,
//!    persisting the sync token after each round

use std::sync::Arc;

use anyhow::Result;
use log::{debug, error, info, warn};
use matrix_sdk::{
    Client, LoopCtrl, Room, RoomState,
    config::SyncSettings,
    ruma::{
        OwnedRoomId, RoomId, UserId,
        api::client::filter::FilterDefinition,
        events::room::{
            member::StrippedRoomMemberEvent,
            message::{MessageType, OriginalSyncRoomMessageEvent},
        },
    },
};
use tokio::time::{Duration, sleep};

use crate::matrix::session::SessionStore;

/// Delay above which the auto-join retries give up, in seconds.
const MAX_JOIN_RETRY_DELAY_SECS: u64 = 3600;

/// Sync loop of the bot account.
pub struct MatrixSync {
    client: Client,
    session_store: SessionStore,
    /// Only messages from this room are forwarded when set
    room_filter: Option<OwnedRoomId>,
}

impl MatrixSync {
    pub fn new(client: &Client, session_store: &SessionStore, room_filter: Option<OwnedRoomId>) -> Self {
        MatrixSync {
            client: client.to_owned(),
            session_store: session_store.to_owned(),
            room_filter,
        }
    }

    /// Syncs forever, calling `on_message(sender, body)` for each new text
    /// message accepted by [`accepts_message`].
    ///
    /// # Errors
    ///
    /// Returns an error when the sync loop stops on a homeserver error.
    pub async fn sync<F>(&self, on_message: F) -> Result<()>
    where
        F: Fn(String, String) + Send + Sync + 'static,
    {
        info!("start syncing");

        self.client.add_event_handler(auto_join_rooms);

        let filter = FilterDefinition::with_lazy_loading();
        let mut sync_settings = SyncSettings::default().filter(filter.into());
        if let Some(sync_token) = self.session_store.sync_token() {
            sync_settings = sync_settings.token(sync_token);
        }

        // Catch up before listening: backlog messages are not votes
        let next_batch = loop {
            match self.client.sync_once(sync_settings.clone()).await {
                Ok(response) => break response.next_batch,
                Err(e) => {
                    error!("initial sync failed: {e}, retrying");
                    sleep(Duration::from_secs(2)).await;
                }
            }
        };
        self.persist_sync_token(next_batch.clone()).await;
        sync_settings = sync_settings.token(next_batch);

        let on_message = Arc::new(on_message);
        let room_filter = self.room_filter.clone();
        self.client.add_event_handler({
            move |event: OriginalSyncRoomMessageEvent, room: Room| {
                let on_message = Arc::clone(&on_message);
                let room_filter = room_filter.clone();
                async move { on_room_message(event, room, room_filter.as_deref(), &on_message) }
            }
        });

        self.client
            .sync_with_result_callback(sync_settings, |sync_result| async move {
                let response = sync_result?;
                self.persist_sync_token(response.next_batch).await;
                Ok(LoopCtrl::Continue)
            })
            .await?;

        Ok(())
    }

    async fn persist_sync_token(&self, sync_token: String) {
        if let Err(e) = self.session_store.save_sync_token(sync_token).await {
            error!("failed to persist sync token: {:?}", e);
        }
    }
}

/// Joins rooms the bot is invited to, retrying with a doubling delay.
///
/// Synapse may send the invite before the room can be joined, see
/// <https://github.com/matrix-org/synapse/issues/4345>.
async fn auto_join_rooms(room_member: StrippedRoomMemberEvent, client: Client, room: Room) {
    let Some(user_id) = client.user_id() else {
        warn!("could not get user id from client");
        return;
    };
    if room_member.state_key != user_id {
        return;
    }

    tokio::spawn(async move {
        info!("auto joining room {}", room.room_id());
        let mut delay = 2;

        while let Err(err) = room.join().await {
            error!(
                "failed to join room {} ({err:?}), retrying in {delay}s",
                room.room_id()
            );
            sleep(Duration::from_secs(delay)).await;
            delay *= 2;

            if delay > MAX_JOIN_RETRY_DELAY_SECS {
                error!("can't join room {} ({err:?})", room.room_id());
                return;
            }
        }
        info!("successfully joined room {}", room.room_id());
    });
}

fn on_room_message<F>(
    event: OriginalSyncRoomMessageEvent,
    room: Room,
    room_filter: Option<&RoomId>,
    on_message: &Arc<F>,
) where
    F: Fn(String, String) + Send + Sync + 'static,
{
    if room.state() != RoomState::Joined {
        return;
    }
    let MessageType::Text(text_content) = event.content.msgtype else {
        return;
    };
    if !accepts_message(room.room_id(), &event.sender, room.own_user_id(), room_filter) {
        debug!("ignoring message from {} in {}", event.sender, room.room_id());
        return;
    }

    on_message(event.sender.to_string(), text_content.body);
}

/// Whether a text message should reach the vote aggregator.
///
/// The bot's own messages never count, and when a room filter is set only
/// messages from that room do.
pub fn accepts_message(
    room_id: &RoomId,
    sender: &UserId,
    own_user_id: &UserId,
    room_filter: Option<&RoomId>,
) -> bool {
    if sender == own_user_id {
        return false;
    }
    room_filter.is_none_or(|filter| filter == room_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_sdk::ruma::{room_id, user_id};

    #[test]
    fn test_accepts_message_without_filter() {
        assert!(accepts_message(
            room_id!("!any:example.com"),
            user_id!("@viewer:example.com"),
            user_id!("@tallybot:example.com"),
            None,
        ));
    }

    #[test]
    fn test_rejects_own_messages() {
        assert!(!accepts_message(
            room_id!("!any:example.com"),
            user_id!("@tallybot:example.com"),
            user_id!("@tallybot:example.com"),
            None,
        ));
    }

    #[test]
    fn test_room_filter() {
        let filter = Some(room_id!("!stream:example.com"));

        assert!(accepts_message(
            room_id!("!stream:example.com"),
            user_id!("@viewer:example.com"),
            user_id!("@tallybot:example.com"),
            filter,
        ));
        assert!(!accepts_message(
            room_id!("!other:example.com"),
            user_id!("@viewer:example.com"),
            user_id!("@tallybot:example.com"),
            filter,
        ));
    }
}
