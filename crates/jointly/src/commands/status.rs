//! Status command: connect and summarize what the bridge is serving.

use std::time::Duration;

use owo_colors::OwoColorize;
use serde::Serialize;

use jointly_core::Session;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct StatusView {
    bridge: String,
    status: String,
    topics: Option<usize>,
    tick: Option<u64>,
    battery: Option<f64>,
    cpu: Option<f64>,
    joints: Option<usize>,
}

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    session.open().await?;

    // Give the producer a moment; a silent bridge is still a valid status.
    let _ = util::first_state(session, Duration::from_secs(2)).await;

    let state = session.store().state();
    let view = StatusView {
        bridge: session.url().await.to_string(),
        status: session.status().to_string(),
        topics: session.directory().listing().map(|l| l.len()),
        tick: state.as_ref().map(|s| s.tick),
        battery: state.as_ref().map(|s| s.battery),
        cpu: state.as_ref().map(|s| s.cpu),
        joints: state.as_ref().map(|s| s.joints.len()),
    };

    let colored = output::should_color(global.color);
    let body = detail(&view, colored);
    let name = view.status.clone();
    output::Renderer::new(global).record(&view, body, name);
    Ok(())
}

fn detail(view: &StatusView, colored: bool) -> String {
    let status = if colored {
        if view.status == "connected" {
            view.status.green().to_string()
        } else {
            view.status.red().to_string()
        }
    } else {
        view.status.clone()
    };

    let mut lines = vec![
        format!("Bridge:   {}", view.bridge),
        format!("Status:   {status}"),
    ];
    if let Some(topics) = view.topics {
        lines.push(format!("Topics:   {topics}"));
    }
    match (view.tick, view.battery, view.cpu, view.joints) {
        (Some(tick), Some(battery), Some(cpu), Some(joints)) => {
            lines.push(format!("Tick:     {tick}"));
            lines.push(format!("Battery:  {battery:.1}%"));
            lines.push(format!("CPU:      {cpu:.1}%"));
            lines.push(format!("Joints:   {joints}"));
        }
        _ => lines.push("Telemetry: none received yet".into()),
    }
    lines.join("\n")
}
