// ── Central reactive telemetry store ──
//
// Single-writer storage for the latest robot snapshot and connection
// status. The session's ingest task is the only writer; any number of
// consumers subscribe via `watch`-backed streams.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jointly_api::{BatteryState, ConnectionStatus, RobotState};
use tokio::sync::watch;

use crate::stream::ValueStream;

/// Latest-value cells for everything the session ingests.
///
/// Each cell holds one value; a new frame replaces the previous one
/// (last-write-wins) and wakes subscribers. Intermediate frames are
/// never queued, so a slow consumer only ever pays for the newest
/// snapshot.
pub struct TelemetryStore {
    pub(crate) status: watch::Sender<ConnectionStatus>,
    pub(crate) state: watch::Sender<Option<Arc<RobotState>>>,
    pub(crate) battery: watch::Sender<Option<Arc<BatteryState>>>,
    pub(crate) last_frame: watch::Sender<Option<DateTime<Utc>>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let (state, _) = watch::channel(None);
        let (battery, _) = watch::channel(None);
        let (last_frame, _) = watch::channel(None);

        Self {
            status,
            state,
            battery,
            last_frame,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> Option<Arc<RobotState>> {
        self.state.borrow().clone()
    }

    pub fn battery(&self) -> Option<Arc<BatteryState>> {
        self.battery.borrow().clone()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_status(&self) -> ValueStream<ConnectionStatus> {
        ValueStream::new(self.status.subscribe())
    }

    pub fn subscribe_state(&self) -> ValueStream<Option<Arc<RobotState>>> {
        ValueStream::new(self.state.subscribe())
    }

    pub fn subscribe_battery(&self) -> ValueStream<Option<Arc<BatteryState>>> {
        ValueStream::new(self.battery.subscribe())
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_frame_at(&self) -> Option<DateTime<Utc>> {
        *self.last_frame.borrow()
    }

    /// How long ago the last telemetry frame arrived, or `None` if no
    /// frame has been received on this connection.
    pub fn frame_age(&self) -> Option<chrono::Duration> {
        self.last_frame_at().map(|t| Utc::now() - t)
    }

    // ── Mutations (session internals only) ───────────────────────────

    // Writes go through `send_replace`, never `send`: `send` refuses to
    // update the value while no receiver exists, and the store must hold
    // the latest snapshot for subscribers that arrive later.

    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }

    pub(crate) fn apply_frame(&self, state: Arc<RobotState>) {
        self.state.send_replace(Some(state));
        self.last_frame.send_replace(Some(Utc::now()));
    }

    pub(crate) fn apply_battery(&self, battery: Arc<BatteryState>) {
        self.battery.send_replace(Some(battery));
    }

    /// Clear everything back to the initial blank state.
    ///
    /// Called only on deliberate teardown. Transport errors do NOT
    /// reset the store: the last snapshot stays visible alongside the
    /// error status so a dashboard can keep rendering stale data.
    pub(crate) fn reset(&self) {
        self.status.send_replace(ConnectionStatus::Disconnected);
        self.state.send_replace(None);
        self.battery.send_replace(None);
        self.last_frame.send_replace(None);
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state(tick: u64) -> Arc<RobotState> {
        Arc::new(RobotState {
            joints: vec![],
            tick,
            battery: 80.0,
            cpu: 10.0,
        })
    }

    #[test]
    fn new_store_is_blank() {
        let store = TelemetryStore::new();
        assert_eq!(store.status(), ConnectionStatus::Disconnected);
        assert!(store.state().is_none());
        assert!(store.battery().is_none());
        assert!(store.last_frame_at().is_none());
    }

    #[test]
    fn apply_frame_replaces_previous() {
        let store = TelemetryStore::new();
        store.apply_frame(sample_state(1));
        store.apply_frame(sample_state(2));

        let state = store.state().expect("state present");
        assert_eq!(state.tick, 2);
        assert!(store.last_frame_at().is_some());
    }

    #[test]
    fn reset_clears_state_and_status() {
        let store = TelemetryStore::new();
        store.set_status(ConnectionStatus::Connected);
        store.apply_frame(sample_state(5));

        store.reset();

        assert_eq!(store.status(), ConnectionStatus::Disconnected);
        assert!(store.state().is_none());
        assert!(store.last_frame_at().is_none());
    }

    #[test]
    fn error_status_keeps_last_snapshot() {
        let store = TelemetryStore::new();
        store.set_status(ConnectionStatus::Connected);
        store.apply_frame(sample_state(9));

        store.set_status(ConnectionStatus::Error("read failed".into()));

        let state = store.state().expect("snapshot survives error");
        assert_eq!(state.tick, 9);
    }

    #[test]
    fn writes_land_with_no_subscribers() {
        // No ValueStream exists yet; the cells must still update so a
        // consumer arriving later reads the current values.
        let store = TelemetryStore::new();
        store.set_status(ConnectionStatus::Connected);
        store.apply_frame(sample_state(7));

        assert_eq!(store.status(), ConnectionStatus::Connected);
        assert_eq!(store.state().expect("snapshot stored").tick, 7);

        let sub = store.subscribe_state();
        assert_eq!(sub.current().as_ref().expect("late subscriber sees it").tick, 7);
    }

    #[tokio::test]
    async fn subscribers_see_applied_frames() {
        let store = TelemetryStore::new();
        let mut sub = store.subscribe_state();
        assert!(sub.current().is_none());

        store.apply_frame(sample_state(3));
        let state = sub.changed().await.flatten().expect("frame delivered");
        assert_eq!(state.tick, 3);
    }
}
