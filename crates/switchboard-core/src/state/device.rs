//! Device manager records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::call::LocalVideoStreamState;

/// Kind of audio endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioDeviceType {
    /// Microphone.
    #[default]
    Microphone,
    /// Speaker.
    Speaker,
}

/// Kind of video capture device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoDeviceType {
    /// Built-in or USB camera.
    #[default]
    Camera,
    /// Screen capture source.
    Screen,
}

/// An enumerated audio device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Platform device id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Microphone or speaker.
    pub device_type: AudioDeviceType,
    /// Platform default device.
    pub is_system_default: bool,
}

/// An enumerated video device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDeviceInfo {
    /// Platform device id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Camera or screen.
    pub device_type: VideoDeviceType,
}

impl VideoDeviceInfo {
    /// Camera with the given id and name.
    pub fn camera(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), device_type: VideoDeviceType::Camera }
    }
}

/// Media permissions granted by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAccess {
    /// Microphone permission.
    pub audio: bool,
    /// Camera permission.
    pub video: bool,
}

/// Enumerated devices, selections, and permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceManagerState {
    /// Cameras, replaced wholesale on every enumeration.
    pub cameras: Arc<Vec<VideoDeviceInfo>>,
    /// Microphones, replaced wholesale on every enumeration.
    pub microphones: Arc<Vec<AudioDeviceInfo>>,
    /// Speakers, replaced wholesale on every enumeration.
    pub speakers: Arc<Vec<AudioDeviceInfo>>,
    /// Camera chosen by the user.
    pub selected_camera: Option<VideoDeviceInfo>,
    /// Microphone in use.
    pub selected_microphone: Option<AudioDeviceInfo>,
    /// Speaker in use.
    pub selected_speaker: Option<AudioDeviceInfo>,
    /// Platform allows choosing the speaker.
    pub is_speaker_selection_available: bool,
    /// Permissions. `None` until they have been queried.
    pub device_access: Option<DeviceAccess>,
    /// Local previews not bound to any call.
    pub unparented_views: Arc<Vec<LocalVideoStreamState>>,
}

impl DeviceManagerState {
    /// Preview for the given camera.
    pub fn preview(&self, camera_id: &str) -> Option<&LocalVideoStreamState> {
        self.unparented_views.iter().find(|v| v.source.id == camera_id)
    }

    /// A local camera preview is rendering.
    pub fn is_preview_on(&self) -> bool {
        self.unparented_views.iter().any(|v| v.view.is_some())
    }
}
