//! Participant list view-model.

use std::{collections::BTreeMap, sync::Arc};

use serde::Serialize;
use switchboard_core::{
    ParticipantId,
    state::{MediaStreamType, ParticipantState, ParticipantStatus},
};

use crate::{CallProps, Selector, base};

/// One row of the participant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallParticipant {
    /// Flat identifier.
    pub user_id: ParticipantId,
    /// Display name if known.
    pub display_name: Option<String>,
    /// Connection state.
    pub state: ParticipantStatus,
    /// Microphone muted.
    pub is_muted: bool,
    /// Currently speaking.
    pub is_speaking: bool,
    /// Has an available screen share stream.
    pub is_screen_sharing: bool,
}

impl CallParticipant {
    fn remote(participant: &ParticipantState) -> Self {
        Self {
            user_id: participant.id(),
            display_name: participant.display_name.clone(),
            state: participant.state,
            is_muted: participant.is_muted,
            is_speaking: participant.is_speaking,
            is_screen_sharing: participant.video_streams.values().any(|s| {
                s.media_stream_type == MediaStreamType::ScreenSharing && s.is_available
            }),
        }
    }
}

/// Everyone in the call, remote participants first, then the local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantList {
    /// Rows.
    pub participants: Vec<CallParticipant>,
    /// Flat id of the local user, to mark their row.
    pub my_user_id: ParticipantId,
}

type Inputs = (
    ParticipantId,
    Option<String>,
    Option<Arc<BTreeMap<ParticipantId, Arc<ParticipantState>>>>,
    bool,
    bool,
);

/// Selector for [`ParticipantList`].
pub type ParticipantListSelector = Selector<CallProps, Inputs, ParticipantList>;

/// New [`ParticipantList`] selector.
pub fn participant_list_selector() -> ParticipantListSelector {
    Selector::new(
        "participant_list",
        |state, props| {
            (
                base::user_id(state),
                base::display_name(state),
                base::remote_participants(state, props),
                base::is_muted(state, props),
                base::is_screen_sharing_on(state, props),
            )
        },
        |(user_id, display_name, remote, is_muted, is_screen_sharing_on)| {
            let mut participants: Vec<CallParticipant> = remote
                .iter()
                .flat_map(|r| r.values())
                .map(|p| CallParticipant::remote(p))
                .collect();
            participants.push(CallParticipant {
                user_id: user_id.clone(),
                display_name: display_name.clone(),
                state: ParticipantStatus::Connected,
                is_muted: *is_muted,
                is_speaking: false,
                is_screen_sharing: *is_screen_sharing_on,
            });
            ParticipantList { participants, my_user_id: user_id.clone() }
        },
    )
}
