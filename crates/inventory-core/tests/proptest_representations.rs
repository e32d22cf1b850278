//! Property tests for the representation pairing rule and the workspace
//! tuple diff.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use inventory_core::model::{
    JsonObject, ReporterResourceKey, Representations, ValidationError, Version, VersionedData,
};
use inventory_core::schema::SchemaService;
use inventory_core::tuple::RelationsTuple;
use proptest::prelude::*;
use serde_json::json;

fn payload() -> impl Strategy<Value = JsonObject> {
    ("[a-z]{1,8}", "[a-z0-9]{0,8}").prop_map(|(field, value)| {
        let mut data = JsonObject::new();
        data.insert(field, json!(value));
        data
    })
}

fn workspace() -> impl Strategy<Value = String> {
    "ws-[a-z0-9]{1,6}"
}

fn key() -> ReporterResourceKey {
    ReporterResourceKey::parse("host-1", "hbi", "host", "instance-a").unwrap()
}

fn with_workspace(workspace: &str, version: u64) -> Representations {
    let mut data = JsonObject::new();
    data.insert("workspace_id".to_string(), json!(workspace));
    let common = VersionedData::new(data, Version::new(version)).unwrap();
    Representations::new(Some(common), None).unwrap()
}

proptest! {
    #[test]
    fn common_data_without_version_is_rejected(
        data in payload(),
        reporter in proptest::option::of((payload(), any::<u64>())),
    ) {
        let (reporter_data, reporter_version) = match reporter {
            Some((data, version)) => (Some(data), Some(Version::new(version))),
            None => (None, None),
        };
        let result = Representations::from_parts(Some(data), None, reporter_data, reporter_version);
        prop_assert_eq!(result, Err(ValidationError::UnpairedVersion { side: "common" }));
    }

    #[test]
    fn version_without_data_is_rejected(version in any::<u64>(), common in payload()) {
        let result = Representations::from_parts(
            Some(common),
            Some(Version::new(version)),
            None,
            Some(Version::new(version)),
        );
        prop_assert_eq!(result, Err(ValidationError::UnpairedVersion { side: "reporter" }));
    }

    #[test]
    fn empty_payload_with_version_is_rejected(
        version in any::<u64>(),
        other in payload(),
        other_version in any::<u64>(),
        empty_common in any::<bool>(),
    ) {
        prop_assert!(VersionedData::new(JsonObject::new(), Version::new(version)).is_err());

        let empty = (Some(JsonObject::new()), Some(Version::new(version)));
        let filled = (Some(other), Some(Version::new(other_version)));
        let (common, reporter) = if empty_common { (empty, filled) } else { (filled, empty) };
        let side = if empty_common { "common" } else { "reporter" };
        let result = Representations::from_parts(common.0, common.1, reporter.0, reporter.1);
        prop_assert_eq!(result, Err(ValidationError::UnpairedVersion { side }));
    }

    #[test]
    fn paired_sides_are_accepted(
        common in payload(),
        common_version in any::<u64>(),
        reporter in payload(),
        reporter_version in any::<u64>(),
    ) {
        let reps = Representations::from_parts(
            Some(common.clone()),
            Some(Version::new(common_version)),
            Some(reporter),
            Some(Version::new(reporter_version)),
        )
        .unwrap();
        prop_assert_eq!(reps.common_data(), Some(&common));
        prop_assert_eq!(reps.common_version(), Some(Version::new(common_version)));
        prop_assert_eq!(reps.reporter_version(), Some(Version::new(reporter_version)));
    }

    #[test]
    fn same_workspace_never_produces_tuples(ws in workspace(), version in 1u64..1000) {
        let service = SchemaService::default();
        let tuples = service
            .calculate_tuples_for_resource(
                Some(&with_workspace(&ws, version)),
                Some(&with_workspace(&ws, version - 1)),
                &key(),
            )
            .unwrap();
        prop_assert!(tuples.is_empty());
    }

    #[test]
    fn workspace_move_is_one_create_and_one_delete(
        from in workspace(),
        to in workspace(),
        version in 1u64..1000,
    ) {
        prop_assume!(from != to);
        let service = SchemaService::default();
        let tuples = service
            .calculate_tuples_for_resource(
                Some(&with_workspace(&to, version)),
                Some(&with_workspace(&from, version - 1)),
                &key(),
            )
            .unwrap();

        prop_assert_eq!(tuples.creates().unwrap(), &[RelationsTuple::workspace(&to, &key())]);
        prop_assert_eq!(tuples.deletes().unwrap(), &[RelationsTuple::workspace(&from, &key())]);
    }
}
