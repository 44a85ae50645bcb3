//! Matrix client creation: fresh login or session restore.

use log::{debug, info};
use matrix_sdk::{Client, ruma::OwnedUserId};

use crate::matrix::{UserCredentials, session::SessionStore};

/// Returns a logged-in client for the bot account.
///
/// Restores the stored session when there is one, otherwise logs in with the
/// password and stores the new session for the next start.
///
/// # Errors
///
/// Returns an error if the user ID is malformed, the homeserver cannot be
/// reached, the credentials are refused or the session cannot be written.
pub async fn connect(
    user_credentials: &UserCredentials,
    session_store: &SessionStore,
) -> Result<Client, anyhow::Error> {
    info!(
        "setting up matrix client for user {}",
        user_credentials.user_id
    );

    let user_id: OwnedUserId = user_credentials.user_id.clone().try_into()?;
    let client = Client::builder()
        .server_name(user_id.server_name())
        .sqlite_store(session_store.sqlite_path(), None)
        .build()
        .await?;
    debug!("matrix client created");

    if let Some(user_session) = session_store.user_session() {
        info!("restoring matrix session from disk");
        client.restore_session(user_session.clone()).await?;
        return Ok(client);
    }

    client
        .matrix_auth()
        .login_username(&user_id, &user_credentials.password)
        .initial_device_display_name("tallybot")
        .send()
        .await?;

    let Some(user_session) = client.matrix_auth().session() else {
        return Err(anyhow::anyhow!("no session after login"));
    };
    session_store.save_user_session(&user_session).await?;

    info!("logged in as {}", user_id);
    Ok(client)
}
