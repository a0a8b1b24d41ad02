//! Echo command: bind the dynamic subscription to one topic and print
//! its messages.

use std::time::Duration;

use jointly_core::{BindingState, Session};

use crate::cli::{EchoArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn handle(session: &Session, args: EchoArgs, global: &GlobalOpts) -> Result<(), CliError> {
    session.open().await?;
    session.select_topic(Some(args.topic.clone()));

    wait_until_bound(session, Duration::from_secs(global.timeout_secs(None))).await?;

    let renderer = output::Renderer::new(global);
    let mut latest = session.binder().subscribe_latest();
    let mut seen = 0_u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = latest.changed() => {
                match changed {
                    Some(Some(msg)) => {
                        // Arbitrary payloads have no table shape; the
                        // human view is compact json as well.
                        renderer.stream_item(msg.as_ref(), || output::json_compact(msg.as_ref()));

                        seen += 1;
                        if args.count.is_some_and(|limit| seen >= limit) {
                            break;
                        }
                    }
                    // Cell cleared on rebind/teardown; wait for the next message.
                    Some(None) => {}
                    None => break,
                }
            }
        }
    }

    Ok(())
}

/// Wait for the binder to reach `Bound`, mapping a directory miss to a
/// user-facing not-found error.
async fn wait_until_bound(session: &Session, timeout: Duration) -> Result<(), CliError> {
    let mut states = session.binder().subscribe_state();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut state = states.latest();
    loop {
        match state {
            BindingState::Bound { .. } => return Ok(()),
            BindingState::Error { topic, .. } => {
                return Err(CliError::TopicNotFound { name: topic });
            }
            BindingState::Idle | BindingState::Resolving { .. } => {}
        }

        state = tokio::select! {
            () = &mut deadline => {
                return Err(CliError::Timeout {
                    seconds: timeout.as_secs(),
                });
            }
            changed = states.changed() => changed.ok_or(CliError::NotConnected)?,
        };
    }
}
