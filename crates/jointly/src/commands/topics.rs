//! Topic listing command.

use tabled::Tabled;

use jointly_core::{Session, TopicDescriptor};

use crate::cli::{GlobalOpts, TopicsArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct TopicRow {
    #[tabled(rename = "Topic")]
    name: String,
    #[tabled(rename = "Type")]
    message_type: String,
}

impl From<&TopicDescriptor> for TopicRow {
    fn from(t: &TopicDescriptor) -> Self {
        Self {
            name: t.name.clone(),
            message_type: t.message_type.clone(),
        }
    }
}

pub async fn handle(
    session: &Session,
    args: TopicsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    session.open().await?;

    // The directory is fetched once on connect; re-query on demand or
    // when the initial fetch failed.
    let listing = match session.directory().listing() {
        Some(listing) if !args.refresh => listing,
        _ => session.refresh_topics().await?,
    };

    output::Renderer::new(global).listing(&listing, |t| TopicRow::from(t), |t| t.name.clone());
    Ok(())
}
