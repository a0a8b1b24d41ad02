//! Command dispatch: bridges CLI args -> session operations -> output
//! formatting.

pub mod config_cmd;
pub mod echo;
pub mod joints;
pub mod neck;
pub mod status;
pub mod topics;
pub mod util;
pub mod watch;

use jointly_core::Session;

use crate::cli::{BridgeCommand, GlobalOpts};
use crate::error::CliError;

/// Dispatch a bridge-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: BridgeCommand,
    session: &Session,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        BridgeCommand::Status => status::handle(session, global).await,
        BridgeCommand::Topics(args) => topics::handle(session, args, global).await,
        BridgeCommand::Joints(args) => joints::handle(session, args, global).await,
        BridgeCommand::Watch(args) => watch::handle(session, args, global).await,
        BridgeCommand::Echo(args) => echo::handle(session, args, global).await,
        BridgeCommand::Neck(args) => neck::handle(session, args, global).await,
    }
}
