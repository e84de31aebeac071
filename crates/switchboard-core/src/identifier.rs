//! Identifiers for entities in the snapshot.
//!
//! The SDK names people with a tagged union ([`CommunicationIdentifier`]).
//! Maps inside the snapshot key participants by its flat raw-id form
//! ([`ParticipantId`]) so that keys are totally ordered and cheap to compare.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Raw identifier string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

string_id!(
    /// Call identifier assigned by the SDK.
    CallId
);
string_id!(
    /// Flat participant identifier (the raw id of a [`CommunicationIdentifier`]).
    ParticipantId
);
string_id!(
    /// Video stream identifier, unique within one participant.
    StreamId
);
string_id!(
    /// Chat thread identifier.
    ThreadId
);
string_id!(
    /// Chat message identifier, unique within one thread.
    MessageId
);

const PHONE_PREFIX: &str = "4:";
const TEAMS_VISITOR_PREFIX: &str = "8:teamsvisitor:";
const TEAMS_PUBLIC_PREFIX: &str = "8:orgid:";
const TEAMS_DOD_PREFIX: &str = "8:dod:";
const TEAMS_GCCH_PREFIX: &str = "8:gcch:";
const ACS_PREFIXES: [&str; 4] = ["8:acs:", "8:spool:", "8:dod-acs:", "8:gcch-acs:"];

/// Sovereign cloud a Teams user belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TeamsCloud {
    /// Commercial cloud.
    #[default]
    Public,
    /// US Department of Defense cloud.
    Dod,
    /// US Government Community Cloud High.
    Gcch,
}

/// Identifier union used by the SDK to name a participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CommunicationIdentifier {
    /// Communication services user. `id` is already the raw id.
    CommunicationUser {
        /// Raw id (`8:acs:...`).
        id: String,
    },
    /// PSTN participant.
    PhoneNumber {
        /// E.164 number including the leading `+`.
        phone_number: String,
        /// Raw id if the SDK supplied one.
        raw_id: Option<String>,
    },
    /// Microsoft Teams user.
    MicrosoftTeamsUser {
        /// Teams user id.
        user_id: String,
        /// Anonymous Teams visitor.
        is_anonymous: bool,
        /// Cloud the user belongs to.
        cloud: TeamsCloud,
        /// Raw id if the SDK supplied one.
        raw_id: Option<String>,
    },
    /// Anything the client does not recognize.
    Unknown {
        /// Opaque id.
        id: String,
    },
}

impl CommunicationIdentifier {
    /// Communication services user with the given raw id.
    pub fn user(id: impl Into<String>) -> Self {
        Self::CommunicationUser { id: id.into() }
    }

    /// Rebuild an identifier from its raw id.
    ///
    /// Unrecognized prefixes yield [`CommunicationIdentifier::Unknown`].
    pub fn from_raw_id(raw: &str) -> Result<Self, CoreError> {
        if raw.trim().is_empty() {
            return Err(CoreError::EmptyIdentifier);
        }

        if let Some(number) = raw.strip_prefix(PHONE_PREFIX) {
            if number.is_empty() {
                return Err(CoreError::MissingIdentifierValue {
                    raw: raw.to_owned(),
                    prefix: PHONE_PREFIX,
                });
            }
            return Ok(Self::PhoneNumber {
                phone_number: format!("+{}", number.trim_start_matches('+')),
                raw_id: Some(raw.to_owned()),
            });
        }

        let teams = [
            (TEAMS_VISITOR_PREFIX, true, TeamsCloud::Public),
            (TEAMS_PUBLIC_PREFIX, false, TeamsCloud::Public),
            (TEAMS_DOD_PREFIX, false, TeamsCloud::Dod),
            (TEAMS_GCCH_PREFIX, false, TeamsCloud::Gcch),
        ];
        for (prefix, is_anonymous, cloud) in teams {
            if let Some(user_id) = raw.strip_prefix(prefix) {
                if user_id.is_empty() {
                    return Err(CoreError::MissingIdentifierValue { raw: raw.to_owned(), prefix });
                }
                return Ok(Self::MicrosoftTeamsUser {
                    user_id: user_id.to_owned(),
                    is_anonymous,
                    cloud,
                    raw_id: Some(raw.to_owned()),
                });
            }
        }

        if ACS_PREFIXES.iter().any(|prefix| raw.starts_with(prefix)) {
            return Ok(Self::CommunicationUser { id: raw.to_owned() });
        }

        Ok(Self::Unknown { id: raw.to_owned() })
    }

    /// Stable flat string form, used as the map key for participants.
    pub fn to_flat(&self) -> ParticipantId {
        let raw = match self {
            Self::CommunicationUser { id } | Self::Unknown { id } => id.clone(),
            Self::PhoneNumber { raw_id: Some(raw), .. }
            | Self::MicrosoftTeamsUser { raw_id: Some(raw), .. } => raw.clone(),
            Self::PhoneNumber { phone_number, raw_id: None } => {
                format!("{PHONE_PREFIX}{}", phone_number.trim_start_matches('+'))
            },
            Self::MicrosoftTeamsUser { user_id, is_anonymous, cloud, raw_id: None } => {
                let prefix = match (is_anonymous, cloud) {
                    (true, _) => TEAMS_VISITOR_PREFIX,
                    (false, TeamsCloud::Public) => TEAMS_PUBLIC_PREFIX,
                    (false, TeamsCloud::Dod) => TEAMS_DOD_PREFIX,
                    (false, TeamsCloud::Gcch) => TEAMS_GCCH_PREFIX,
                };
                format!("{prefix}{user_id}")
            },
        };
        ParticipantId(raw)
    }
}

impl From<&CommunicationIdentifier> for ParticipantId {
    fn from(identifier: &CommunicationIdentifier) -> Self {
        identifier.to_flat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_number_round_trips_through_raw_id() {
        let phone = CommunicationIdentifier::PhoneNumber {
            phone_number: "+14255550123".into(),
            raw_id: None,
        };
        let flat = phone.to_flat();
        assert_eq!(flat.as_str(), "4:14255550123");

        let parsed = CommunicationIdentifier::from_raw_id(flat.as_str());
        assert_eq!(
            parsed,
            Ok(CommunicationIdentifier::PhoneNumber {
                phone_number: "+14255550123".into(),
                raw_id: Some("4:14255550123".into()),
            })
        );
    }

    #[test]
    fn teams_prefix_follows_cloud_and_anonymity() {
        let visitor = CommunicationIdentifier::MicrosoftTeamsUser {
            user_id: "abc".into(),
            is_anonymous: true,
            cloud: TeamsCloud::Gcch,
            raw_id: None,
        };
        assert_eq!(visitor.to_flat().as_str(), "8:teamsvisitor:abc");

        let gcch = CommunicationIdentifier::MicrosoftTeamsUser {
            user_id: "abc".into(),
            is_anonymous: false,
            cloud: TeamsCloud::Gcch,
            raw_id: None,
        };
        assert_eq!(gcch.to_flat().as_str(), "8:gcch:abc");
    }

    #[test]
    fn acs_and_unknown_raw_ids() {
        assert_eq!(
            CommunicationIdentifier::from_raw_id("8:acs:resource_user"),
            Ok(CommunicationIdentifier::user("8:acs:resource_user"))
        );
        assert_eq!(
            CommunicationIdentifier::from_raw_id("28:bot"),
            Ok(CommunicationIdentifier::Unknown { id: "28:bot".into() })
        );
    }

    #[test]
    fn empty_raw_ids_are_rejected() {
        assert_eq!(CommunicationIdentifier::from_raw_id("  "), Err(CoreError::EmptyIdentifier));
        assert!(matches!(
            CommunicationIdentifier::from_raw_id("8:orgid:"),
            Err(CoreError::MissingIdentifierValue { prefix: "8:orgid:", .. })
        ));
    }
}
