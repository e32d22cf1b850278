use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{self, ValidationError};

pub const MAX_LOCAL_RESOURCE_ID_LEN: usize = 128;
pub const MAX_REPORTER_TYPE_LEN: usize = 128;
pub const MAX_RESOURCE_TYPE_LEN: usize = 128;
pub const MAX_REPORTER_INSTANCE_ID_LEN: usize = 256;
pub const MAX_REPORTER_VERSION_LEN: usize = 128;
pub const MAX_HREF_LEN: usize = 512;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "Uuid", into = "Uuid")]
        pub struct $name(Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Result<Self, ValidationError> {
                if id.is_nil() {
                    return Err(ValidationError::NilUuid { field: $field });
                }
                Ok(Self(id))
            }

            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl TryFrom<Uuid> for $name {
            type Error = ValidationError;

            fn try_from(id: Uuid) -> Result<Self, Self::Error> {
                Self::new(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

macro_rules! bounded_string {
    ($(#[$meta:meta])* $name:ident, $field:literal, $max:expr $(, $extra:path)?) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                validation::require_non_blank($field, &value)?;
                validation::require_max_len($field, &value, $max)?;
                $($extra($field, &value)?;)?
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

uuid_id!(
    /// Identity of the reconciled, reporter-agnostic resource.
    ResourceId,
    "resource_id"
);
uuid_id!(ReporterResourceId, "reporter_resource_id");

bounded_string!(
    /// Identifier the reporter uses for the resource in its own system.
    LocalResourceId,
    "local_resource_id",
    MAX_LOCAL_RESOURCE_ID_LEN
);
bounded_string!(ResourceType, "resource_type", MAX_RESOURCE_TYPE_LEN);
bounded_string!(ReporterType, "reporter_type", MAX_REPORTER_TYPE_LEN);
bounded_string!(
    ReporterInstanceId,
    "reporter_instance_id",
    MAX_REPORTER_INSTANCE_ID_LEN
);
bounded_string!(
    /// Free-text version of the reporting software.
    ReporterVersion,
    "reporter_version",
    MAX_REPORTER_VERSION_LEN
);
bounded_string!(ApiHref, "api_href", MAX_HREF_LEN, validation::require_url);
bounded_string!(ConsoleHref, "console_href", MAX_HREF_LEN, validation::require_url);

/// Monotonic counter for representation and common versions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub const INITIAL: Version = Version(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn previous(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Distinguishes successive lifecycles of a reporter key across tombstone and resurrection.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub const INITIAL: Generation = Generation(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Natural key of a reporter-submitted resource record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReporterResourceKey {
    pub local_resource_id: LocalResourceId,
    pub reporter_type: ReporterType,
    pub resource_type: ResourceType,
    pub reporter_instance_id: ReporterInstanceId,
}

impl ReporterResourceKey {
    pub fn new(
        local_resource_id: LocalResourceId,
        reporter_type: ReporterType,
        resource_type: ResourceType,
        reporter_instance_id: ReporterInstanceId,
    ) -> Self {
        Self {
            local_resource_id,
            reporter_type,
            resource_type,
            reporter_instance_id,
        }
    }

    pub fn parse(
        local_resource_id: impl Into<String>,
        reporter_type: impl Into<String>,
        resource_type: impl Into<String>,
        reporter_instance_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self::new(
            LocalResourceId::new(local_resource_id)?,
            ReporterType::new(reporter_type)?,
            ResourceType::new(resource_type)?,
            ReporterInstanceId::new(reporter_instance_id)?,
        ))
    }

    /// Keys are matched case-insensitively in every component.
    pub fn matches(&self, other: &ReporterResourceKey) -> bool {
        self.local_resource_id
            .as_str()
            .eq_ignore_ascii_case(other.local_resource_id.as_str())
            && self
                .reporter_type
                .as_str()
                .eq_ignore_ascii_case(other.reporter_type.as_str())
            && self
                .resource_type
                .as_str()
                .eq_ignore_ascii_case(other.resource_type.as_str())
            && self
                .reporter_instance_id
                .as_str()
                .eq_ignore_ascii_case(other.reporter_instance_id.as_str())
    }
}

impl fmt::Display for ReporterResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}@{}",
            self.reporter_type, self.resource_type, self.local_resource_id, self.reporter_instance_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(local: &str, reporter: &str, resource: &str, instance: &str) -> ReporterResourceKey {
        ReporterResourceKey::parse(local, reporter, resource, instance).unwrap()
    }

    // --- Identifiers ---

    #[test]
    fn nil_uuid_is_rejected() {
        assert_eq!(
            ResourceId::new(Uuid::nil()),
            Err(ValidationError::NilUuid {
                field: "resource_id"
            })
        );
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(ResourceId::generate(), ResourceId::generate());
    }

    #[test]
    fn string_ids_enforce_length_limits() {
        assert!(LocalResourceId::new("a".repeat(128)).is_ok());
        assert_eq!(
            LocalResourceId::new("a".repeat(129)),
            Err(ValidationError::TooLong {
                field: "local_resource_id",
                max: 128
            })
        );
        assert!(ReporterInstanceId::new("i".repeat(256)).is_ok());
        assert!(ReporterInstanceId::new("i".repeat(257)).is_err());
    }

    #[test]
    fn whitespace_only_ids_are_rejected() {
        assert!(ReporterType::new("   ").is_err());
        assert!(ResourceType::new("").is_err());
    }

    #[test]
    fn hrefs_must_be_urls() {
        assert!(ApiHref::new("https://api.example.com/hosts/1").is_ok());
        assert!(matches!(
            ConsoleHref::new("console"),
            Err(ValidationError::InvalidUrl {
                field: "console_href",
                ..
            })
        ));
    }

    #[test]
    fn string_ids_deserialize_through_validation() {
        let ok: ReporterType = serde_json::from_str("\"hbi\"").unwrap();
        assert_eq!(ok.as_str(), "hbi");

        let err = serde_json::from_str::<ReporterType>("\"\"");
        assert!(err.is_err());
    }

    // --- Versions ---

    #[test]
    fn version_previous_stops_at_zero() {
        assert_eq!(Version::new(3).previous(), Some(Version::new(2)));
        assert_eq!(Version::INITIAL.previous(), None);
        assert_eq!(Version::INITIAL.next(), Version::new(1));
    }

    // --- Keys ---

    #[test]
    fn key_matching_ignores_case() {
        let a = key("Host-1", "HBI", "Host", "Instance-A");
        let b = key("host-1", "hbi", "host", "instance-a");
        assert!(a.matches(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn key_matching_compares_every_component() {
        let a = key("host-1", "hbi", "host", "instance-a");
        assert!(!a.matches(&key("host-2", "hbi", "host", "instance-a")));
        assert!(!a.matches(&key("host-1", "acm", "host", "instance-a")));
        assert!(!a.matches(&key("host-1", "hbi", "cluster", "instance-a")));
        assert!(!a.matches(&key("host-1", "hbi", "host", "instance-b")));
    }

    #[test]
    fn key_display_names_every_component() {
        let k = key("host-1", "hbi", "host", "instance-a");
        assert_eq!(k.to_string(), "hbi/host:host-1@instance-a");
    }
}
