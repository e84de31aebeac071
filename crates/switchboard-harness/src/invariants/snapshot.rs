//! Observable state captured for invariant checks.
//!
//! A capture pairs the store's snapshot with what the adapter has subscribed
//! and what the renderer holds, so one check can compare them without
//! reaching into live objects.

use std::{collections::BTreeSet, sync::Arc};

use switchboard_adapter::{Adapter, EntityKey};
use switchboard_core::{Snapshot, state::AttachedView};

use crate::fake::RecordingRenderer;

/// Snapshot of the whole system at one point in time.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    /// Store contents.
    pub state: Arc<Snapshot>,
    /// Entities the adapter has listeners for. `None` without an adapter.
    pub live_entities: Option<BTreeSet<EntityKey>>,
    /// Render handles the renderer still holds. `None` without a renderer.
    pub live_views: Option<BTreeSet<u64>>,
}

impl SystemSnapshot {
    /// Capture of a bare snapshot, as produced by reducers alone.
    pub fn new(state: Arc<Snapshot>) -> Self {
        Self { state, live_entities: None, live_views: None }
    }

    /// Capture of a running adapter and its renderer.
    pub fn capture(adapter: &Adapter, renderer: &RecordingRenderer) -> Self {
        Self {
            state: adapter.store().get_state(),
            live_entities: Some(adapter.live_entities()),
            live_views: Some(renderer.live_handles()),
        }
    }

    /// Calls, participants, and streams present in the snapshot.
    pub fn snapshot_entities(&self) -> BTreeSet<EntityKey> {
        let mut entities = BTreeSet::new();
        for (call_id, call) in self.state.calls.iter() {
            entities.insert(EntityKey::Call(call_id.clone()));
            for (participant_id, participant) in call.remote_participants.iter() {
                entities.insert(EntityKey::Participant(call_id.clone(), participant_id.clone()));
                for stream_id in participant.video_streams.keys() {
                    entities.insert(EntityKey::Stream(
                        call_id.clone(),
                        participant_id.clone(),
                        stream_id.clone(),
                    ));
                }
            }
        }
        entities
    }

    /// Render handles referenced anywhere in the snapshot.
    pub fn snapshot_views(&self) -> Vec<u64> {
        let mut handles = Vec::new();
        for call in self.state.calls.values() {
            for attached in call.views() {
                let view = match attached {
                    AttachedView::Local { view, .. } | AttachedView::Remote { view, .. } => view,
                };
                handles.push(view.handle.0);
            }
        }
        for preview in self.state.device_manager.unparented_views.iter() {
            if let Some(view) = preview.view {
                handles.push(view.handle.0);
            }
        }
        handles
    }
}
