//! Joint readings command.

use std::time::Duration;

use tabled::Tabled;

use jointly_core::{JointReading, Session};

use crate::cli::{GlobalOpts, JointsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct JointRow {
    #[tabled(rename = "Joint")]
    name: String,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "Range")]
    range: String,
    #[tabled(rename = "Velocity")]
    velocity: String,
    #[tabled(rename = "Torque")]
    torque: String,
    #[tabled(rename = "Temp")]
    temperature: String,
}

impl From<&JointReading> for JointRow {
    fn from(j: &JointReading) -> Self {
        Self {
            name: j.name.clone(),
            position: format!("{:+.3}", j.q),
            range: range_bar(j),
            velocity: format!("{:+.3}", j.dq),
            torque: format!("{:+.3}", j.tau_est),
            temperature: format!("{:.1}\u{b0}C", j.temperature),
        }
    }
}

/// Ten-segment gauge of where the joint sits within its range.
/// A degenerate range renders as a flat line.
fn range_bar(joint: &JointReading) -> String {
    const WIDTH: usize = 10;
    match joint.position_ratio() {
        Some(ratio) => {
            let filled = (ratio.clamp(0.0, 1.0) * WIDTH as f64).round() as usize;
            format!("{}{}", "\u{2588}".repeat(filled), "\u{2591}".repeat(WIDTH - filled))
        }
        None => "-".repeat(WIDTH),
    }
}

pub async fn handle(
    session: &Session,
    args: JointsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    session.open().await?;

    let timeout = Duration::from_secs(global.timeout_secs(None));
    let state = util::first_state(session, timeout).await?;

    let joints: Vec<JointReading> = state
        .joints
        .iter()
        .filter(|j| {
            args.group
                .as_deref()
                .is_none_or(|prefix| j.name.starts_with(prefix))
        })
        .cloned()
        .collect();

    output::Renderer::new(global).listing(&joints, |j| JointRow::from(j), |j| j.name.clone());
    Ok(())
}
