//! Device manager reducers.

use std::sync::Arc;

use super::update_devices;
use crate::state::{
    AudioDeviceInfo, DeviceManagerState, LocalVideoStreamState, MediaStreamType, Snapshot,
    StreamView, VideoDeviceInfo,
};

pub(super) fn cameras_updated(state: &Arc<Snapshot>, cameras: &[VideoDeviceInfo]) -> Arc<Snapshot> {
    update_devices(state, |d| {
        (d.cameras.as_slice() != cameras)
            .then(|| DeviceManagerState { cameras: Arc::new(cameras.to_vec()), ..d.clone() })
    })
}

pub(super) fn microphones_updated(
    state: &Arc<Snapshot>,
    microphones: &[AudioDeviceInfo],
) -> Arc<Snapshot> {
    update_devices(state, |d| {
        (d.microphones.as_slice() != microphones)
            .then(|| DeviceManagerState {
                microphones: Arc::new(microphones.to_vec()),
                ..d.clone()
            })
    })
}

pub(super) fn speakers_updated(
    state: &Arc<Snapshot>,
    speakers: &[AudioDeviceInfo],
) -> Arc<Snapshot> {
    update_devices(state, |d| {
        (d.speakers.as_slice() != speakers)
            .then(|| DeviceManagerState { speakers: Arc::new(speakers.to_vec()), ..d.clone() })
    })
}

/// Attach or replace the preview for `source`.
pub(super) fn preview_created(
    state: &Arc<Snapshot>,
    source: &VideoDeviceInfo,
    view: StreamView,
) -> Arc<Snapshot> {
    update_devices(state, |d| {
        let existing = d.unparented_views.iter().position(|v| v.source.id == source.id);
        if let Some(index) = existing
            && d.unparented_views[index].view == Some(view)
        {
            return None;
        }

        let mut d = d.clone();
        let previews = Arc::make_mut(&mut d.unparented_views);
        match existing {
            Some(index) => previews[index].view = Some(view),
            None => previews.push(LocalVideoStreamState {
                source: source.clone(),
                media_stream_type: MediaStreamType::Video,
                view: Some(view),
            }),
        }
        Some(d)
    })
}

pub(super) fn preview_disposed(state: &Arc<Snapshot>, camera_id: &str) -> Arc<Snapshot> {
    update_devices(state, |d| {
        if d.preview(camera_id).is_none() {
            return None;
        }
        let mut d = d.clone();
        Arc::make_mut(&mut d.unparented_views).retain(|v| v.source.id != camera_id);
        Some(d)
    })
}
