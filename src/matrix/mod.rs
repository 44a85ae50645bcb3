//! Matrix integration: the chat the votes come from.
//!
//! - `client` - [`MatrixClient`], login plus the sync loop
//! - `login` - password login or restore of a stored session
//! - `session` - session and sync token persistence in the data directory
//! - `sync` - message forwarding, room filter and auto-join
//! - `announcer` - [`RoomAnnouncer`], posts winners back into the room

mod announcer;
mod client;
mod login;
mod session;
mod sync;

pub use crate::matrix::announcer::RoomAnnouncer;
pub use crate::matrix::client::MatrixClient;

/// Credentials of the bot's Matrix account
#[derive(Debug, Clone)]
pub struct UserCredentials {
    /// User ID of the matrix account
    pub user_id: String,
    /// Password of the matrix account
    pub password: String,
}
