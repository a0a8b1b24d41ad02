//! Watch command: stream telemetry frames as they arrive.

use jointly_core::{RobotState, Session};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    session: &Session,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    session.open().await?;

    let renderer = output::Renderer::new(global);
    let mut states = session.store().subscribe_state();
    let mut seen = 0_u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                match changed {
                    Some(Some(state)) => {
                        renderer.stream_item(state.as_ref(), || summary_line(&state));

                        seen += 1;
                        if args.frames.is_some_and(|limit| seen >= limit) {
                            break;
                        }
                    }
                    // Store reset mid-stream; keep waiting for frames.
                    Some(None) => {}
                    None => break,
                }
            }
        }
    }

    Ok(())
}

fn summary_line(state: &RobotState) -> String {
    format!(
        "tick={} battery={:.1}% cpu={:.1}% joints={}",
        state.tick,
        state.battery,
        state.cpu,
        state.joints.len()
    )
}
