//! Call control bar view-models.

use std::sync::Arc;

use serde::Serialize;
use switchboard_core::state::{
    AudioDeviceInfo, DeviceAccess, DeviceManagerState, LocalVideoStreamState, MediaStreamType,
    VideoDeviceInfo,
};

use crate::{CallProps, Selector, base};

/// Microphone toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MicrophoneButton {
    /// No call, or microphone permission denied.
    pub disabled: bool,
    /// In a call and unmuted.
    pub checked: bool,
    /// Microphones to choose from.
    pub microphones: Arc<Vec<AudioDeviceInfo>>,
    /// Speakers to choose from.
    pub speakers: Arc<Vec<AudioDeviceInfo>>,
    /// Microphone in use.
    pub selected_microphone: Option<AudioDeviceInfo>,
    /// Speaker in use.
    pub selected_speaker: Option<AudioDeviceInfo>,
}

/// Camera toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraButton {
    /// No camera selected, or camera permission denied.
    pub disabled: bool,
    /// Sending camera video, or previewing outside a call.
    pub checked: bool,
    /// Cameras to choose from.
    pub cameras: Arc<Vec<VideoDeviceInfo>>,
    /// Camera chosen by the user.
    pub selected_camera: Option<VideoDeviceInfo>,
}

/// Screen share toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenShareButton {
    /// Sharing.
    pub checked: bool,
}

/// Device picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicesButton {
    /// Microphones.
    pub microphones: Arc<Vec<AudioDeviceInfo>>,
    /// Speakers.
    pub speakers: Arc<Vec<AudioDeviceInfo>>,
    /// Cameras.
    pub cameras: Arc<Vec<VideoDeviceInfo>>,
    /// Microphone in use.
    pub selected_microphone: Option<AudioDeviceInfo>,
    /// Speaker in use.
    pub selected_speaker: Option<AudioDeviceInfo>,
    /// Camera chosen by the user.
    pub selected_camera: Option<VideoDeviceInfo>,
}

/// Selector for [`MicrophoneButton`].
pub type MicrophoneButtonSelector =
    Selector<CallProps, (bool, bool, Arc<DeviceManagerState>), MicrophoneButton>;

/// Selector for [`CameraButton`].
pub type CameraButtonSelector = Selector<
    CallProps,
    (Option<Arc<Vec<LocalVideoStreamState>>>, Arc<DeviceManagerState>),
    CameraButton,
>;

/// Selector for [`ScreenShareButton`].
pub type ScreenShareButtonSelector = Selector<CallProps, (bool,), ScreenShareButton>;

/// Selector for [`DevicesButton`].
pub type DevicesButtonSelector = Selector<CallProps, (Arc<DeviceManagerState>,), DevicesButton>;

/// Permission is assumed until the platform has been asked.
fn permitted(devices: &DeviceManagerState, pick: fn(&DeviceAccess) -> bool) -> bool {
    devices.device_access.as_ref().is_none_or(pick)
}

/// New [`MicrophoneButton`] selector.
pub fn microphone_button_selector() -> MicrophoneButtonSelector {
    Selector::new(
        "microphone_button",
        |state, props| {
            (
                base::call_exists(state, props),
                base::is_muted(state, props),
                base::device_manager(state),
            )
        },
        |(call_exists, is_muted, devices)| MicrophoneButton {
            disabled: !call_exists || !permitted(devices, |a| a.audio),
            checked: *call_exists && !is_muted,
            microphones: Arc::clone(&devices.microphones),
            speakers: Arc::clone(&devices.speakers),
            selected_microphone: devices.selected_microphone.clone(),
            selected_speaker: devices.selected_speaker.clone(),
        },
    )
}

/// New [`CameraButton`] selector.
pub fn camera_button_selector() -> CameraButtonSelector {
    Selector::new(
        "camera_button",
        |state, props| (base::local_video_streams(state, props), base::device_manager(state)),
        |(streams, devices)| {
            // Outside a call (or before sending anything) the toggle tracks the preview.
            let checked = match streams.as_deref() {
                Some(streams) if !streams.is_empty() => {
                    streams.iter().any(|s| s.media_stream_type == MediaStreamType::Video)
                },
                _ => devices.is_preview_on(),
            };
            CameraButton {
                disabled: devices.selected_camera.is_none() || !permitted(devices, |a| a.video),
                checked,
                cameras: Arc::clone(&devices.cameras),
                selected_camera: devices.selected_camera.clone(),
            }
        },
    )
}

/// New [`ScreenShareButton`] selector.
pub fn screen_share_button_selector() -> ScreenShareButtonSelector {
    Selector::new(
        "screen_share_button",
        |state, props| (base::is_screen_sharing_on(state, props),),
        |(checked,)| ScreenShareButton { checked: *checked },
    )
}

/// New [`DevicesButton`] selector.
pub fn devices_button_selector() -> DevicesButtonSelector {
    Selector::new(
        "devices_button",
        |state, _| (base::device_manager(state),),
        |(devices,)| DevicesButton {
            microphones: Arc::clone(&devices.microphones),
            speakers: Arc::clone(&devices.speakers),
            cameras: Arc::clone(&devices.cameras),
            selected_microphone: devices.selected_microphone.clone(),
            selected_speaker: devices.selected_speaker.clone(),
            selected_camera: devices.selected_camera.clone(),
        },
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use switchboard_core::{
        CallId, CommunicationIdentifier, Snapshot,
        state::{CallState, RenderHandle, ScalingMode, StreamView},
    };

    use super::*;

    fn snapshot_with_call() -> Snapshot {
        let mut state = Snapshot::new(CommunicationIdentifier::user("me"));
        let mut call = CallState::new(CallId::from("c1"));
        call.is_muted = true;
        Arc::make_mut(&mut state.calls).insert(call.id.clone(), Arc::new(call));
        state
    }

    #[test]
    fn microphone_disabled_without_call_or_permission() {
        let mut selector = microphone_button_selector();
        let state = snapshot_with_call();

        let no_call = selector.select(&state, &CallProps::default());
        assert!(no_call.disabled);
        assert!(!no_call.checked);

        let muted = selector.select(&state, &CallProps::new("c1"));
        assert!(!muted.disabled);
        assert!(!muted.checked);

        let mut denied = state;
        Arc::make_mut(&mut denied.device_manager).device_access =
            Some(DeviceAccess { audio: false, video: true });
        assert!(selector.select(&denied, &CallProps::new("c1")).disabled);
    }

    #[test]
    fn camera_follows_preview_outside_call() {
        let mut selector = camera_button_selector();
        let mut state = Snapshot::new(CommunicationIdentifier::user("me"));
        let camera = VideoDeviceInfo::camera("cam", "Front");
        let devices = Arc::make_mut(&mut state.device_manager);
        devices.selected_camera = Some(camera.clone());
        devices.unparented_views = Arc::new(vec![LocalVideoStreamState {
            source: camera,
            media_stream_type: MediaStreamType::Video,
            view: Some(StreamView {
                handle: RenderHandle(1),
                scaling_mode: ScalingMode::Crop,
                is_mirrored: true,
            }),
        }]);

        let button = selector.select(&state, &CallProps::default());
        assert!(!button.disabled);
        assert!(button.checked);
    }

    #[test]
    fn devices_button_shares_device_lists() {
        let mut selector = devices_button_selector();
        let state = snapshot_with_call();
        let first = selector.select(&state, &CallProps::default());
        assert!(Arc::ptr_eq(&first.cameras, &state.device_manager.cameras));

        let mut ended = state.clone();
        Arc::make_mut(&mut ended.calls).clear();
        let second = selector.select(&ended, &CallProps::default());
        assert!(Arc::ptr_eq(&first, &second));
    }
}
