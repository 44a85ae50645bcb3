use async_trait::async_trait;
use log::info;

use crate::actions::{ActionDispatcher, DispatchError};

/// Placeholder action that only reports the winning command.
///
/// Replace it with real controls (key presses, a game API, ...) by
/// implementing [`ActionDispatcher`].
#[derive(Debug, Default, Clone)]
pub struct LogAction;

impl LogAction {
    /// Line printed to stdout for a winning command.
    pub fn format_command(command: &str) -> String {
        format!("Executing command: {}", command.to_uppercase())
    }
}

#[async_trait]
impl ActionDispatcher for LogAction {
    async fn dispatch(&self, command: &str) -> Result<(), DispatchError> {
        info!("executing winning command {}", command);
        println!("{}", LogAction::format_command(command));
        Ok(())
    }
}
