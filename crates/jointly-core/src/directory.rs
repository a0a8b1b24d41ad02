// ── Topic directory ──
//
// Catalog of channels the bridge knows about, fetched once per
// connection from the bridge's directory service. Names and schema
// identifiers arrive as parallel arrays and are zipped by index.

use std::sync::Arc;

use jointly_api::protocol::TopicsResponse;
use serde::Serialize;
use tokio::sync::watch;

use crate::stream::ValueStream;

/// One channel the bridge can serve: name plus schema identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Directory contents: `None` until the first fetch on this connection
/// completes, then the full listing.
pub type DirectoryListing = Option<Arc<Vec<TopicDescriptor>>>;

/// Reactive cell holding the current directory listing.
///
/// Refreshed once per connection by the session; binders watch it to
/// resolve topic names to schema identifiers. The `None`/`Some`
/// distinction matters: a binder that cannot find its topic in `None`
/// is still resolving, while a miss against `Some` is a hard error.
pub struct TopicDirectory {
    listing: watch::Sender<DirectoryListing>,
}

impl TopicDirectory {
    pub fn new() -> Self {
        let (listing, _) = watch::channel(None);
        Self { listing }
    }

    /// The current listing, if fetched.
    pub fn listing(&self) -> DirectoryListing {
        self.listing.borrow().clone()
    }

    /// Find `name` in the current listing.
    ///
    /// Returns `None` both when the directory has not been fetched yet
    /// and when the topic is genuinely absent; callers that need to
    /// tell those apart should check [`listing`](Self::listing).
    pub fn lookup(&self, name: &str) -> Option<TopicDescriptor> {
        self.listing
            .borrow()
            .as_ref()?
            .iter()
            .find(|t| t.name == name)
            .cloned()
    }

    /// Subscribe to listing changes.
    pub fn subscribe(&self) -> ValueStream<DirectoryListing> {
        ValueStream::new(self.listing.subscribe())
    }

    pub(crate) fn watch(&self) -> watch::Receiver<DirectoryListing> {
        self.listing.subscribe()
    }

    // `send_replace`, not `send`: the listing must update even while
    // nothing is watching it.

    pub(crate) fn set(&self, topics: Vec<TopicDescriptor>) -> Arc<Vec<TopicDescriptor>> {
        let topics = Arc::new(topics);
        self.listing.send_replace(Some(Arc::clone(&topics)));
        topics
    }

    pub(crate) fn reset(&self) {
        self.listing.send_replace(None);
    }
}

impl Default for TopicDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Zip the directory service's parallel arrays into descriptors.
///
/// Entries are correlated by index. A length mismatch between the two
/// arrays keeps the shorter prefix; the tail has no usable pairing.
pub fn zip_topics(response: &TopicsResponse) -> Vec<TopicDescriptor> {
    if response.topics.len() != response.types.len() {
        tracing::warn!(
            topics = response.topics.len(),
            types = response.types.len(),
            "directory arrays have mismatched lengths"
        );
    }

    response
        .topics
        .iter()
        .zip(response.types.iter())
        .map(|(name, message_type)| TopicDescriptor {
            name: name.clone(),
            message_type: message_type.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn response(topics: &[&str], types: &[&str]) -> TopicsResponse {
        TopicsResponse {
            topics: topics.iter().map(|s| (*s).to_owned()).collect(),
            types: types.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn zip_pairs_by_index() {
        let listing = zip_topics(&response(
            &["/battery_state", "/odom"],
            &["sensor_msgs/BatteryState", "nav_msgs/Odometry"],
        ));
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].name, "/battery_state");
        assert_eq!(listing[0].message_type, "sensor_msgs/BatteryState");
        assert_eq!(listing[1].name, "/odom");
    }

    #[test]
    fn zip_truncates_mismatched_arrays() {
        let listing = zip_topics(&response(&["/a", "/b", "/c"], &["t1", "t2"]));
        assert_eq!(listing.len(), 2);
    }

    #[test]
    fn lookup_distinguishes_unfetched_from_missing() {
        let directory = TopicDirectory::new();

        // Not fetched yet: both listing and lookup are None.
        assert!(directory.listing().is_none());
        assert!(directory.lookup("/odom").is_none());

        directory.set(vec![TopicDescriptor {
            name: "/battery_state".into(),
            message_type: "sensor_msgs/BatteryState".into(),
        }]);

        // Fetched: listing exists, lookup miss is a real absence.
        assert!(directory.listing().is_some());
        assert!(directory.lookup("/odom").is_none());
        assert_eq!(
            directory.lookup("/battery_state").map(|t| t.message_type),
            Some("sensor_msgs/BatteryState".into())
        );
    }

    #[test]
    fn reset_clears_listing() {
        let directory = TopicDirectory::new();
        let _ = directory.set(vec![]);
        assert!(directory.listing().is_some());

        directory.reset();
        assert!(directory.listing().is_none());
    }
}
