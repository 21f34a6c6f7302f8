//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a [`CollaborationId`] with a [`MessageId`] even though both are UUIDs under
//! the hood.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty
            /// or whitespace only.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for UUID-wrapped newtypes (internally generated identities).
// Generates: struct (Copy), new_random(), from_uuid(), as_uuid(), Display, FromStr.
// ---------------------------------------------------------------------------
macro_rules! uuid_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID (e.g. deserialised from state).
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying [`Uuid`].
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

uuid_id! {
    /// Identifies a collaboration aggregate; doubles as its key in the state store.
    CollaborationId
}

uuid_id! {
    /// Identifies a single transcript message.
    MessageId
}

uuid_id! {
    /// Identifies a single pipeline execution run (one invocation of the phase pipeline).
    ///
    /// Generated fresh for every run; recorded on the run span so all activity
    /// from a single run can be correlated. Never persisted.
    PipelineRunId
}

// ---------------------------------------------------------------------------
// Identifiers: string-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies an agent persona.
    ///
    /// Agents are created outside the pipeline (by hand or by the agent factory),
    /// so the identifier is an opaque string rather than a UUID.
    AgentId
}

impl AgentId {
    /// Generates a fresh agent identifier from a random UUID.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
