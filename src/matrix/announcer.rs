use async_trait::async_trait;
use log::info;
use matrix_sdk::{
    Client,
    ruma::{OwnedRoomId, events::room::message::RoomMessageEventContent},
};

use crate::actions::{ActionDispatcher, DispatchError};

/// Posts each winning command into a Matrix room.
pub struct RoomAnnouncer {
    client: Client,
    room_id: OwnedRoomId,
}

impl RoomAnnouncer {
    pub fn new(client: Client, room_id: OwnedRoomId) -> Self {
        RoomAnnouncer { client, room_id }
    }

    /// Markdown body announcing `command`.
    pub fn format_announcement(command: &str) -> String {
        format!("🗳️ The chat has spoken: **{}**", command.to_uppercase())
    }
}

#[async_trait]
impl ActionDispatcher for RoomAnnouncer {
    async fn dispatch(&self, command: &str) -> Result<(), DispatchError> {
        let Some(room) = self.client.get_room(&self.room_id) else {
            return Err(DispatchError::Unavailable(format!(
                "room {} is not known to the bot",
                self.room_id
            )));
        };

        let content =
            RoomMessageEventContent::text_markdown(RoomAnnouncer::format_announcement(command));
        room.send(content)
            .await
            .map_err(|e| DispatchError::Failed(e.to_string()))?;

        info!("announced {} in {}", command, self.room_id);
        Ok(())
    }
}
