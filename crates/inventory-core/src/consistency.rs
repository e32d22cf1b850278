use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::ValidationError;

pub const MAX_CONSISTENCY_TOKEN_LEN: usize = 1024;

/// Opaque freshness marker returned by the authorization backend on write.
///
/// Tokens issued by the reference backend are decimal versions; the empty
/// token means no write has been acknowledged yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConsistencyToken(String);

impl ConsistencyToken {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.chars().count() > MAX_CONSISTENCY_TOKEN_LEN {
            return Err(ValidationError::TooLong {
                field: "consistency_token",
                max: MAX_CONSISTENCY_TOKEN_LEN,
            });
        }
        Ok(Self(value))
    }

    pub fn from_version(version: u64) -> Self {
        Self(version.to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the token; empty or unparseable tokens read as 0.
    pub fn as_version(&self) -> u64 {
        self.0.parse().unwrap_or(0)
    }
}

impl TryFrom<String> for ConsistencyToken {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConsistencyToken> for String {
    fn from(token: ConsistencyToken) -> Self {
        token.0
    }
}

impl fmt::Display for ConsistencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsistencyPreference {
    Unspecified,
    MinimizeLatency,
    AtLeastAsAcknowledged,
    AtLeastAsFresh,
}

impl ConsistencyPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyPreference::Unspecified => "unspecified",
            ConsistencyPreference::MinimizeLatency => "minimize_latency",
            ConsistencyPreference::AtLeastAsAcknowledged => "at_least_as_acknowledged",
            ConsistencyPreference::AtLeastAsFresh => "at_least_as_fresh",
        }
    }
}

impl fmt::Display for ConsistencyPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-side consistency requested by a caller. Only `AtLeastAsFresh` carries a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Consistency {
    #[default]
    Unspecified,
    MinimizeLatency,
    AtLeastAsAcknowledged,
    AtLeastAsFresh(ConsistencyToken),
}

impl Consistency {
    pub fn preference(&self) -> ConsistencyPreference {
        match self {
            Consistency::Unspecified => ConsistencyPreference::Unspecified,
            Consistency::MinimizeLatency => ConsistencyPreference::MinimizeLatency,
            Consistency::AtLeastAsAcknowledged => ConsistencyPreference::AtLeastAsAcknowledged,
            Consistency::AtLeastAsFresh(_) => ConsistencyPreference::AtLeastAsFresh,
        }
    }

    pub fn token(&self) -> Option<&ConsistencyToken> {
        match self {
            Consistency::AtLeastAsFresh(token) => Some(token),
            _ => None,
        }
    }
}
