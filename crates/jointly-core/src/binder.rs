// ── Dynamic subscription binder ──
//
// Tracks one user-selected topic and keeps exactly one live bridge
// subscription pointed at it. Retargeting always releases the old
// subscription before creating the new one, so the bridge never sees
// two live subscriptions from this binder at once.

use std::sync::Arc;

use jointly_api::SocketHandle;
use jointly_api::protocol::{ClientOp, InboundFrame, ServerOp};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::directory::DirectoryListing;
use crate::stream::ValueStream;

// ── Binding state ────────────────────────────────────────────────────

/// Where the binder currently stands for its selected topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingState {
    /// No topic selected.
    Idle,
    /// Topic selected but the directory has not been fetched yet.
    Resolving { topic: String },
    /// Subscription live; `message_type` came from the directory.
    Bound { topic: String, message_type: String },
    /// The directory was fetched and the topic is not in it.
    Error { topic: String, message: String },
}

impl BindingState {
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound { .. })
    }
}

/// Derive the target state for `selection` against `listing`.
///
/// An unfetched directory (`None`) means the selection is still
/// resolving; a fetched directory without the topic is a hard miss.
fn resolve_binding(selection: Option<&str>, listing: &DirectoryListing) -> BindingState {
    let Some(topic) = selection else {
        return BindingState::Idle;
    };
    let Some(listing) = listing else {
        return BindingState::Resolving {
            topic: topic.to_owned(),
        };
    };
    match listing.iter().find(|t| t.name == topic) {
        Some(descriptor) => BindingState::Bound {
            topic: descriptor.name.clone(),
            message_type: descriptor.message_type.clone(),
        },
        None => BindingState::Error {
            topic: topic.to_owned(),
            message: "topic not present in directory".into(),
        },
    }
}

// ── TopicBinder ──────────────────────────────────────────────────────

struct BinderCells {
    selection: watch::Sender<Option<String>>,
    state: watch::Sender<BindingState>,
    latest: watch::Sender<Option<Arc<Value>>>,
}

/// Reactive handle to the binder's cells.
///
/// Clones share the same cells. Selection changes take effect on the
/// next turn of the connection's binder task; while disconnected they
/// are simply remembered and applied on the next connect.
#[derive(Clone)]
pub struct TopicBinder {
    cells: Arc<BinderCells>,
}

impl TopicBinder {
    pub fn new() -> Self {
        let (selection, _) = watch::channel(None);
        let (state, _) = watch::channel(BindingState::Idle);
        let (latest, _) = watch::channel(None);
        Self {
            cells: Arc::new(BinderCells {
                selection,
                state,
                latest,
            }),
        }
    }

    /// Select the topic to bind, or `None` to release.
    ///
    /// Selecting the already-bound topic is a no-op: the live
    /// subscription is kept as is.
    pub fn select(&self, topic: Option<String>) {
        self.cells.selection.send_if_modified(|current| {
            if *current == topic {
                false
            } else {
                *current = topic;
                true
            }
        });
    }

    /// The currently selected topic name.
    pub fn selection(&self) -> Option<String> {
        self.cells.selection.borrow().clone()
    }

    /// Current binding state.
    pub fn state(&self) -> BindingState {
        self.cells.state.borrow().clone()
    }

    /// Subscribe to binding state transitions.
    pub fn subscribe_state(&self) -> ValueStream<BindingState> {
        ValueStream::new(self.cells.state.subscribe())
    }

    /// The most recent message on the bound topic, if any.
    pub fn latest(&self) -> Option<Arc<Value>> {
        self.cells.latest.borrow().clone()
    }

    /// Subscribe to messages on the bound topic (last-write-wins).
    pub fn subscribe_latest(&self) -> ValueStream<Option<Arc<Value>>> {
        ValueStream::new(self.cells.latest.subscribe())
    }

    /// Back to `Idle` with no retained message. Selection survives so
    /// the next connection can re-resolve it.
    // `send_replace`, not `send`: cell writes must land even when no
    // consumer is subscribed at that moment.

    pub(crate) fn reset(&self) {
        self.cells.state.send_replace(BindingState::Idle);
        self.cells.latest.send_replace(None);
    }

    fn set_state(&self, state: BindingState) {
        self.cells.state.send_replace(state);
    }

    fn clear_latest(&self) {
        self.cells.latest.send_replace(None);
    }

    fn push_latest(&self, msg: Value) {
        self.cells.latest.send_replace(Some(Arc::new(msg)));
    }
}

impl Default for TopicBinder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Per-connection binder task ───────────────────────────────────────

/// One live subscription: the correlation id it was opened with, and
/// the topic it covers. Unsubscribe must reuse the same id.
struct LiveSubscription {
    id: String,
    topic: String,
}

/// Drive the binder for the lifetime of one connection.
///
/// Reacts to selection changes, directory updates, and inbound frames.
/// Exits when the connection is torn down; the session resets the
/// binder cells afterwards.
pub(crate) async fn run_binder(
    handle: SocketHandle,
    binder: TopicBinder,
    mut listing_rx: watch::Receiver<DirectoryListing>,
    cancel: CancellationToken,
) {
    let mut selection_rx = binder.cells.selection.subscribe();
    let mut frames = handle.frames();
    let mut live: Option<LiveSubscription> = None;

    // Apply whatever selection was made before (or between) connects.
    retarget(&handle, &binder, &mut live, &listing_rx).await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = selection_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                retarget(&handle, &binder, &mut live, &listing_rx).await;
            }
            changed = listing_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                retarget(&handle, &binder, &mut live, &listing_rx).await;
            }
            frame = frames.recv() => {
                match frame {
                    Ok(frame) => deliver(&binder, &live, &frame),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "binder lagged behind frame stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("binder task exiting");
}

/// Reconcile the live subscription with the selected topic.
///
/// Release-before-create: when the target changes, the old
/// subscription's unsubscribe is sent before the new subscribe, so the
/// operations arrive at the bridge in that order.
async fn retarget(
    handle: &SocketHandle,
    binder: &TopicBinder,
    live: &mut Option<LiveSubscription>,
    listing_rx: &watch::Receiver<DirectoryListing>,
) {
    let selection = binder.selection();
    let listing = listing_rx.borrow().clone();
    let target = resolve_binding(selection.as_deref(), &listing);

    let desired_topic = match &target {
        BindingState::Bound { topic, .. } => Some(topic.clone()),
        _ => None,
    };

    let already_live = matches!(
        (&desired_topic, &*live),
        (Some(desired), Some(sub)) if *desired == sub.topic
    );

    if !already_live {
        if let Some(sub) = live.take() {
            tracing::debug!(topic = %sub.topic, "releasing subscription");
            let released = handle
                .send(ClientOp::Unsubscribe {
                    id: sub.id,
                    topic: sub.topic,
                })
                .await;
            if let Err(e) = released {
                tracing::warn!(error = %e, "unsubscribe failed");
            }
            binder.clear_latest();
        }

        if let BindingState::Bound {
            topic,
            message_type,
        } = &target
        {
            let id = format!("sub:{topic}:{}", Uuid::new_v4());
            tracing::debug!(topic = %topic, message_type = %message_type,
                "opening subscription");
            let subscribed = handle
                .send(ClientOp::Subscribe {
                    id: id.clone(),
                    topic: topic.clone(),
                    message_type: message_type.clone(),
                })
                .await;
            match subscribed {
                Ok(()) => {
                    *live = Some(LiveSubscription {
                        id,
                        topic: topic.clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "subscribe failed");
                    binder.set_state(BindingState::Error {
                        topic: topic.clone(),
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    binder.set_state(target);
}

/// Route one inbound frame to the latest-message cell if it belongs to
/// the live subscription.
fn deliver(binder: &TopicBinder, live: &Option<LiveSubscription>, frame: &InboundFrame) {
    let Some(sub) = live else { return };
    if let InboundFrame::Bridge(ServerOp::Publish { topic, msg }) = frame {
        if *topic == sub.topic {
            binder.push_latest(msg.clone());
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
