mod common;

use common::*;
use perch_cloud::{
    CloudError, InstanceState, Location, LocatorSettings, StackPolicy, stack_name,
};

fn customer_stack() -> String {
    stack_name("bastion-stack", CUSTOMER_ID)
}

#[tokio::test]
async fn test_stack_in_second_region_found_after_two_queries() {
    let cloud = FakeCloud::new();
    cloud.add_stack("eu-west-1", stack(&customer_stack(), "CREATE_COMPLETE", &[]));
    let locator = locator(&cloud, &["us-west-1", "eu-west-1"], LocatorSettings::default());

    let location = locator.locate_stack(CUSTOMER_EMAIL).await.unwrap();

    assert_eq!(location.region(), Some("eu-west-1"));
    assert_eq!(cloud.query_count(), 2);
    assert_eq!(
        cloud.calls(),
        vec![
            Call::DescribeStacks {
                region: "us-west-1".into(),
                name: customer_stack()
            },
            Call::DescribeStacks {
                region: "eu-west-1".into(),
                name: customer_stack()
            },
        ]
    );
}

#[tokio::test]
async fn test_missing_stack_is_not_found_not_error() {
    let cloud = FakeCloud::new();
    let locator = locator(
        &cloud,
        &["us-west-1", "us-east-1", "eu-west-1"],
        LocatorSettings::default(),
    );

    let location = locator.locate_stack(CUSTOMER_ID).await.unwrap();

    let Location::NotFound(missing) = location else {
        panic!("expected NotFound");
    };
    assert_eq!(missing.identity.customer_id, CUSTOMER_ID);
    assert_eq!(cloud.query_count(), 3);
}

#[tokio::test]
async fn test_require_turns_absence_into_error() {
    let cloud = FakeCloud::new();
    let locator = locator(&cloud, &["us-west-1"], LocatorSettings::default());

    let err = locator
        .locate_stack(CUSTOMER_ID)
        .await
        .unwrap()
        .require()
        .unwrap_err();
    assert!(matches!(err, CloudError::NotFound(_)));
}

#[tokio::test]
async fn test_stack_in_two_regions_is_ambiguous() {
    let cloud = FakeCloud::new();
    cloud.add_stack("us-west-1", stack(&customer_stack(), "CREATE_COMPLETE", &[]));
    cloud.add_stack("eu-west-1", stack(&customer_stack(), "CREATE_COMPLETE", &[]));
    let locator = locator(&cloud, &["us-west-1", "eu-west-1"], LocatorSettings::default());

    let err = locator.locate_stack(CUSTOMER_ID).await.unwrap_err();

    match err {
        CloudError::AmbiguousResource { regions, .. } => {
            assert_eq!(regions, vec!["us-west-1", "eu-west-1"]);
        }
        other => panic!("expected AmbiguousResource, got {:?}", other),
    }
}

#[tokio::test]
async fn test_two_stacks_in_one_region_is_ambiguous() {
    let cloud = FakeCloud::new();
    cloud.add_stack("us-west-2", stack(&customer_stack(), "CREATE_COMPLETE", &[]));
    cloud.add_stack("us-west-2", stack(&customer_stack(), "UPDATE_COMPLETE", &[]));
    let settings = LocatorSettings {
        stack_policy: StackPolicy::FirstMatch,
        ..LocatorSettings::default()
    };
    let locator = locator(&cloud, &["us-west-2", "eu-west-1"], settings);

    let err = locator.locate_stack(CUSTOMER_ID).await.unwrap_err();
    assert!(matches!(err, CloudError::AmbiguousResource { .. }));
    // fails inside the first region without scanning further
    assert_eq!(cloud.query_count(), 1);
}

#[tokio::test]
async fn test_first_match_policy_stops_early() {
    let cloud = FakeCloud::new();
    cloud.add_stack("us-west-1", stack(&customer_stack(), "CREATE_COMPLETE", &[]));
    let settings = LocatorSettings {
        stack_policy: StackPolicy::FirstMatch,
        ..LocatorSettings::default()
    };
    let locator = locator(&cloud, &["us-west-1", "us-west-2", "eu-west-1"], settings);

    let location = locator.locate_stack(CUSTOMER_ID).await.unwrap();
    assert_eq!(location.region(), Some("us-west-1"));
    assert_eq!(cloud.query_count(), 1);
}

#[tokio::test]
async fn test_named_stack_override() {
    let cloud = FakeCloud::new();
    cloud.add_stack("us-east-1", stack("legacy-stack", "UPDATE_COMPLETE", &[]));
    let locator = locator(&cloud, &["us-west-1", "us-east-1"], LocatorSettings::default());

    let found = locator
        .locate_stack_named(CUSTOMER_ID, "legacy-stack")
        .await
        .unwrap()
        .require()
        .unwrap();
    assert_eq!(found.region, "us-east-1");
    assert_eq!(found.resource.name, "legacy-stack");
}

#[tokio::test]
async fn test_instance_lookup_prefers_running_instance() {
    let cloud = FakeCloud::new();
    cloud.add_instance("us-west-1", instance("i-stopped", InstanceState::Stopped, BASTION_ID));
    cloud.add_instance("us-west-2", instance("i-running", InstanceState::Running, BASTION_ID));
    cloud.add_instance("eu-west-1", instance("i-late", InstanceState::Running, BASTION_ID));
    let locator = locator(
        &cloud,
        &["us-west-1", "us-west-2", "eu-west-1"],
        LocatorSettings::default(),
    );

    let found = locator
        .locate_instance(CUSTOMER_ID, BASTION_ID)
        .await
        .unwrap()
        .require()
        .unwrap();

    assert_eq!(found.resource.instance_id, "i-running");
    assert_eq!(found.region, "us-west-2");
    assert_eq!(cloud.query_count(), 2);
}

#[tokio::test]
async fn test_instance_lookup_falls_back_to_last_match() {
    let cloud = FakeCloud::new();
    cloud.add_instance("us-west-1", instance("i-first", InstanceState::Stopped, BASTION_ID));
    cloud.add_instance("eu-west-1", instance("i-last", InstanceState::Terminated, BASTION_ID));
    let locator = locator(
        &cloud,
        &["us-west-1", "us-west-2", "eu-west-1"],
        LocatorSettings::default(),
    );

    let found = locator
        .locate_instance(CUSTOMER_ID, BASTION_ID)
        .await
        .unwrap()
        .require()
        .unwrap();

    assert_eq!(found.resource.instance_id, "i-last");
    assert_eq!(cloud.query_count(), 3);
}

#[tokio::test]
async fn test_invalid_bastion_id_fails_before_any_query() {
    let cloud = FakeCloud::new();
    let locator = locator(&cloud, &["us-west-1"], LocatorSettings::default());

    let err = locator
        .locate_instance(CUSTOMER_ID, "i-0123456789abcdef0")
        .await
        .unwrap_err();

    assert!(err.is_user_error());
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_customer_is_user_error() {
    let cloud = FakeCloud::new();
    let locator = locator(&cloud, &["us-west-1"], LocatorSettings::default());

    let err = locator.locate_stack("someone").await.unwrap_err();
    assert!(err.is_user_error());
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_customer_propagates_not_found() {
    let cloud = FakeCloud::new();
    let locator = locator(&cloud, &["us-west-1"], LocatorSettings::default());

    let err = locator.locate_stack("b@example.com").await.unwrap_err();
    assert!(matches!(err, CloudError::NotFound(_)));
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_list_instances_visits_every_region() {
    let cloud = FakeCloud::new();
    cloud.add_instance("us-west-1", instance("i-1", InstanceState::Running, BASTION_ID));
    cloud.add_instance("eu-west-1", instance("i-2", InstanceState::Stopped, BASTION_ID));
    let locator = locator(
        &cloud,
        &["us-west-1", "us-west-2", "eu-west-1"],
        LocatorSettings::default(),
    );

    let inventory = locator.list_instances(CUSTOMER_EMAIL).await.unwrap();

    let found: Vec<(&str, &str)> = inventory
        .instances
        .iter()
        .map(|(region, i)| (region.as_str(), i.instance_id.as_str()))
        .collect();
    assert_eq!(found, vec![("us-west-1", "i-1"), ("eu-west-1", "i-2")]);
    assert_eq!(cloud.query_count(), 3);
}

#[tokio::test]
async fn test_missing_credentials_stop_the_lookup() {
    use perch_cloud::{CredentialBroker, RegionList, RegionScanner, ResourceLocator};
    use std::sync::Arc;

    let cloud = FakeCloud::new();
    let locator = ResourceLocator::new(
        Arc::new(FakeDirectory),
        CredentialBroker::new(Arc::new(FakeVendor { credentials: None })),
        RegionScanner::new(
            RegionList::new(["us-west-1"]).unwrap(),
            Arc::new(cloud.clone()),
        ),
        LocatorSettings::default(),
    );

    let err = locator.locate_stack(CUSTOMER_ID).await.unwrap_err();
    assert!(matches!(err, CloudError::CredentialUnavailable { .. }));
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_region_error_stops_the_stack_scan() {
    let cloud = FakeCloud::new();
    cloud.add_stack("eu-west-1", stack(&customer_stack(), "CREATE_COMPLETE", &[]));
    cloud.fail_region("us-west-2", "connection reset by peer");
    let locator = locator(
        &cloud,
        &["us-west-1", "us-west-2", "eu-west-1"],
        LocatorSettings::default(),
    );

    let err = locator.locate_stack(CUSTOMER_ID).await.unwrap_err();

    match err {
        CloudError::Api(message) => assert_eq!(message, "connection reset by peer"),
        other => panic!("expected Api, got {:?}", other),
    }
    assert_eq!(
        cloud.calls(),
        vec![
            Call::DescribeStacks {
                region: "us-west-1".into(),
                name: customer_stack()
            },
            Call::DescribeStacks {
                region: "us-west-2".into(),
                name: customer_stack()
            },
        ]
    );
}

#[tokio::test]
async fn test_region_error_is_not_masked_by_an_earlier_match() {
    let cloud = FakeCloud::new();
    cloud.add_instance("us-west-1", instance("i-stopped", InstanceState::Stopped, BASTION_ID));
    cloud.fail_region("us-west-2", "throttled");
    let locator = locator(
        &cloud,
        &["us-west-1", "us-west-2", "eu-west-1"],
        LocatorSettings::default(),
    );

    let err = locator
        .locate_instance(CUSTOMER_ID, BASTION_ID)
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::Api(_)));
    assert_eq!(cloud.query_count(), 2);
    assert!(
        !cloud
            .calls()
            .iter()
            .any(|c| matches!(c, Call::FindInstances { region } if region == "eu-west-1"))
    );
}
