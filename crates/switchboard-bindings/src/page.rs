//! Which page a calling UI should show.

use std::sync::Arc;

use serde::Serialize;
use switchboard_core::state::{CallEndKind, CallEndReason, CallState, CallStatus};

use crate::{CallProps, Selector, base};

/// Top-level page of a calling experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CallPage {
    /// No call yet: device setup.
    Configuration,
    /// Joining or waiting to be admitted.
    Lobby,
    /// In the call.
    Call,
    /// The call ended.
    LeftCall,
    /// Someone else removed the local user.
    RemovedFromCall,
    /// Joining failed because the device was offline.
    JoinCallFailedDueToNoNetwork,
    /// A Teams meeting did not let the local user in.
    AccessDeniedTeamsMeeting,
}

impl CallPage {
    fn ended(reason: Option<CallEndReason>) -> Self {
        match reason.map_or(CallEndKind::Left, |r| r.kind()) {
            CallEndKind::Left => Self::LeftCall,
            CallEndKind::Removed => Self::RemovedFromCall,
            CallEndKind::AccessDenied => Self::AccessDeniedTeamsMeeting,
            CallEndKind::NoNetwork => Self::JoinCallFailedDueToNoNetwork,
        }
    }

    fn for_call(call: &CallState) -> Self {
        match call.state {
            CallStatus::None => Self::Configuration,
            CallStatus::Connecting
            | CallStatus::Ringing
            | CallStatus::EarlyMedia
            | CallStatus::InLobby => Self::Lobby,
            CallStatus::Connected
            | CallStatus::LocalHold
            | CallStatus::RemoteHold
            | CallStatus::Disconnecting => Self::Call,
            CallStatus::Disconnected => Self::ended(call.end_reason),
        }
    }
}

/// Selector for [`CallPage`].
pub type CallPageSelector =
    Selector<CallProps, (Option<Arc<CallState>>, Option<Arc<CallState>>), CallPage>;

/// New [`CallPage`] selector.
pub fn call_page_selector() -> CallPageSelector {
    Selector::new(
        "call_page",
        |state, props| (base::call(state, props), base::ended_call(state, props)),
        |(active, ended)| match (active, ended) {
            (Some(call), _) => CallPage::for_call(call),
            (None, Some(call)) => CallPage::ended(call.end_reason),
            (None, None) => CallPage::Configuration,
        },
    )
}

#[cfg(test)]
mod tests {
    use switchboard_core::{CallId, CommunicationIdentifier, Snapshot};

    use super::*;

    fn with_call(status: CallStatus) -> Snapshot {
        let mut state = Snapshot::new(CommunicationIdentifier::user("me"));
        let mut call = CallState::new(CallId::from("c1"));
        call.state = status;
        Arc::make_mut(&mut state.calls).insert(call.id.clone(), Arc::new(call));
        state
    }

    #[test]
    fn page_follows_call_status() {
        let props = CallProps::new("c1");
        let cases = [
            (CallStatus::None, CallPage::Configuration),
            (CallStatus::InLobby, CallPage::Lobby),
            (CallStatus::EarlyMedia, CallPage::Lobby),
            (CallStatus::RemoteHold, CallPage::Call),
            (CallStatus::Disconnected, CallPage::LeftCall),
        ];
        for (status, page) in cases {
            let selected = call_page_selector().select(&with_call(status), &props);
            assert_eq!(*selected, page, "{status:?}");
        }
    }

    #[test]
    fn ended_call_distinguishes_removal() {
        let mut state = Snapshot::new(CommunicationIdentifier::user("me"));
        let mut call = CallState::new(CallId::from("c1"));
        call.state = CallStatus::Disconnected;
        call.end_reason = Some(CallEndReason::REMOVED);
        Arc::make_mut(&mut state.calls_ended).push(Arc::new(call));

        let mut selector = call_page_selector();
        assert_eq!(*selector.select(&state, &CallProps::new("c1")), CallPage::RemovedFromCall);
        assert_eq!(*selector.select(&state, &CallProps::default()), CallPage::Configuration);
    }

    #[test]
    fn failed_joins_get_their_own_pages() {
        let cases = [
            (CallEndReason::ACCESS_DENIED, CallPage::AccessDeniedTeamsMeeting),
            (CallEndReason::NO_NETWORK, CallPage::JoinCallFailedDueToNoNetwork),
            (CallEndReason { code: 0, subcode: 5000 }, CallPage::RemovedFromCall),
            (CallEndReason::default(), CallPage::LeftCall),
        ];
        for (reason, page) in cases {
            let mut state = with_call(CallStatus::Disconnected);
            let call = Arc::make_mut(&mut state.calls).remove(&CallId::from("c1"));
            let mut call = Arc::unwrap_or_clone(call.expect("seeded"));
            call.end_reason = Some(reason);
            Arc::make_mut(&mut state.calls_ended).push(Arc::new(call));

            let selected = call_page_selector().select(&state, &CallProps::new("c1"));
            assert_eq!(*selected, page, "{reason:?}");
        }
    }

    #[test]
    fn pages_serialize_in_camel_case() {
        insta::assert_json_snapshot!(
            [CallPage::JoinCallFailedDueToNoNetwork, CallPage::AccessDeniedTeamsMeeting],
            @r#"
        [
          "joinCallFailedDueToNoNetwork",
          "accessDeniedTeamsMeeting"
        ]
        "#
        );
    }
}
