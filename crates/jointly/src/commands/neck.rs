//! Neck command: publish one pose command to the command topic.

use jointly_core::{NeckCommand, Session};

use crate::cli::{GlobalOpts, NeckArgs};
use crate::error::CliError;

pub async fn handle(session: &Session, args: NeckArgs, global: &GlobalOpts) -> Result<(), CliError> {
    session.open().await?;

    session
        .publish_neck(NeckCommand::new(args.pitch, args.yaw))
        .await?;

    if !global.quiet {
        eprintln!("Neck command sent: pitch={} yaw={}", args.pitch, args.yaw);
    }
    Ok(())
}
