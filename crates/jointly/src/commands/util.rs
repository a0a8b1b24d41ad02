//! Shared helpers for command handlers.

use std::sync::Arc;
use std::time::Duration;

use jointly_core::{RobotState, Session};

use crate::error::CliError;

/// Wait for the first telemetry frame on an open session.
///
/// The bridge pushes frames on its own schedule, so a connected session
/// may not have a snapshot yet. Fails with `NoTelemetry` when nothing
/// arrives within `timeout`.
pub async fn first_state(session: &Session, timeout: Duration) -> Result<Arc<RobotState>, CliError> {
    if let Some(state) = session.store().state() {
        return Ok(state);
    }

    let mut states = session.store().subscribe_state();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => {
                return Err(CliError::NoTelemetry {
                    seconds: timeout.as_secs(),
                });
            }
            changed = states.changed() => {
                match changed {
                    Some(Some(state)) => return Ok(state),
                    Some(None) => {}
                    None => return Err(CliError::NotConnected),
                }
            }
        }
    }
}
