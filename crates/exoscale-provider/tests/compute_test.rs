mod common;

use common::{FakeCloud, attrs};
use exoscale_provider::{ActionType, ErrorKind, ResourceState};
use serde_json::{Value, json};

fn web(extra: Value) -> exoscale_provider::Attributes {
    let mut desired = attrs(json!({
        "zone": "ch-gva-2",
        "template": "linux-debian-11",
        "size": "Medium",
        "disk_size": 10,
        "display_name": "web",
        "tags": {"env": "prod"}
    }));
    desired.extend(attrs(extra));
    desired
}

async fn create_web(cloud: &FakeCloud) -> ResourceState {
    let provider = cloud.provider();
    let state = provider.create("exoscale_compute", web(json!({}))).await.unwrap();
    cloud.clear_calls();
    state
}

fn position(calls: &[String], call: &str) -> usize {
    calls
        .iter()
        .position(|c| c == call)
        .unwrap_or_else(|| panic!("{} not called, calls: {:?}", call, calls))
}

#[tokio::test]
async fn test_create_instance() {
    let cloud = FakeCloud::new();
    let provider = cloud.provider();

    let state = provider.create("exoscale_compute", web(json!({}))).await.unwrap();

    assert!(!state.id.is_empty());
    assert_eq!(state.attribute("state"), Some(&json!("Running")));
    assert_eq!(state.attribute("disk_size"), Some(&json!(10)));
    assert_eq!(state.attribute("template_id"), Some(&json!("tpl-debian-10")));
    assert_eq!(state.attribute("ip4"), Some(&json!(true)));
    assert_eq!(state.attribute("ip6"), Some(&json!(false)));
    assert_eq!(state.attribute("tags"), Some(&json!({"env": "prod"})));
    assert!(state.attribute("password").is_some());
    assert!(state.attribute("ip_address").is_some());

    // 2. the same configuration plans nothing
    let plan = provider
        .plan("exoscale_compute", Some(&state), &web(json!({})))
        .unwrap();
    assert_eq!(plan.action, ActionType::NoOp);
}

#[tokio::test]
async fn test_create_stopped_instance() {
    let cloud = FakeCloud::new();
    let provider = cloud.provider();

    let state = provider
        .create("exoscale_compute", web(json!({"state": "Stopped"})))
        .await
        .unwrap();

    assert_eq!(state.attribute("state"), Some(&json!("Stopped")));
    assert_eq!(cloud.vm(&state.id).unwrap().state, "Stopped");
}

#[tokio::test]
async fn test_failed_tagging_destroys_the_new_instance() {
    let cloud = FakeCloud::new();
    cloud.fail_tagging();
    let provider = cloud.provider();

    let err = provider.create("exoscale_compute", web(json!({}))).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invalid);
    assert_eq!(cloud.vm_count(), 0);
    assert!(cloud.calls().contains(&"destroy_virtual_machine".to_string()));
}

#[tokio::test]
async fn test_disk_resize_stops_resizes_and_starts() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    let provider = cloud.provider();

    let state = provider
        .update(&state, web(json!({"disk_size": 20})))
        .await
        .unwrap();

    let calls = cloud.mutations();
    let stop = position(&calls, "stop_virtual_machine");
    let resize = position(&calls, "resize_volume");
    let start = position(&calls, "start_virtual_machine");
    assert!(stop < resize && resize < start, "calls: {:?}", calls);

    assert_eq!(state.attribute("disk_size"), Some(&json!(20)));
    assert_eq!(state.attribute("state"), Some(&json!("Running")));
    assert_eq!(cloud.root_disk(&state.id), Some(20));
}

#[tokio::test]
async fn test_display_name_and_tags_apply_without_stopping() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    let provider = cloud.provider();

    let state = provider
        .update(
            &state,
            web(json!({"display_name": "frontend", "tags": {"env": "staging", "team": "ops"}})),
        )
        .await
        .unwrap();

    let calls = cloud.mutations();
    assert!(!calls.contains(&"stop_virtual_machine".to_string()), "calls: {:?}", calls);
    assert!(!calls.contains(&"start_virtual_machine".to_string()), "calls: {:?}", calls);
    assert!(calls.contains(&"update_virtual_machine".to_string()));

    assert_eq!(state.attribute("display_name"), Some(&json!("frontend")));
    assert_eq!(
        state.attribute("tags"),
        Some(&json!({"env": "staging", "team": "ops"}))
    );
}

#[tokio::test]
async fn test_removed_tags_are_deleted() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    let provider = cloud.provider();

    let mut desired = web(json!({}));
    desired.remove("tags");
    let state = provider.update(&state, desired).await.unwrap();

    assert!(cloud.mutations().contains(&"delete_tags".to_string()));
    assert!(cloud.vm(&state.id).unwrap().tags.is_empty());
}

#[tokio::test]
async fn test_reboot_attribute_stops_before_scaling() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    let provider = cloud.provider();

    let state = provider
        .update(&state, web(json!({"size": "Large"})))
        .await
        .unwrap();

    let calls = cloud.mutations();
    let stop = position(&calls, "stop_virtual_machine");
    let scale = position(&calls, "scale_virtual_machine");
    let start = position(&calls, "start_virtual_machine");
    assert!(stop < scale && scale < start, "calls: {:?}", calls);

    assert_eq!(state.attribute("size"), Some(&json!("Large")));
    assert_eq!(state.attribute("state"), Some(&json!("Running")));
}

#[tokio::test]
async fn test_size_differing_only_in_case_plans_nothing() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    let provider = cloud.provider();

    let plan = provider
        .plan("exoscale_compute", Some(&state), &web(json!({"size": "medium"})))
        .unwrap();
    assert_eq!(plan.action, ActionType::NoOp);
}

#[tokio::test]
async fn test_stopping_leaves_instance_stopped() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    let provider = cloud.provider();

    let state = provider
        .update(&state, web(json!({"state": "Stopped", "size": "Large"})))
        .await
        .unwrap();

    let calls = cloud.mutations();
    assert!(calls.contains(&"stop_virtual_machine".to_string()));
    assert!(calls.contains(&"scale_virtual_machine".to_string()));
    assert!(!calls.contains(&"start_virtual_machine".to_string()), "calls: {:?}", calls);
    assert_eq!(state.attribute("state"), Some(&json!("Stopped")));
}

#[tokio::test]
async fn test_disk_shrink_is_rejected_before_any_call() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    let provider = cloud.provider();

    let state = provider
        .update(&state, web(json!({"disk_size": 50})))
        .await
        .unwrap();
    cloud.clear_calls();

    let err = provider
        .update(&state, web(json!({"disk_size": 20})))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invalid);
    assert!(cloud.mutations().is_empty(), "calls: {:?}", cloud.mutations());
    assert_eq!(cloud.root_disk(&state.id), Some(50));
}

#[tokio::test]
async fn test_disabling_ip6_is_rejected() {
    let cloud = FakeCloud::new();
    let provider = cloud.provider();
    let state = provider
        .create("exoscale_compute", web(json!({"ip6": true})))
        .await
        .unwrap();
    assert!(state.attribute("ip6_address").is_some());
    cloud.clear_calls();

    let err = provider
        .update(&state, web(json!({"ip6": false})))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invalid);
    assert!(cloud.mutations().is_empty());
}

#[tokio::test]
async fn test_enabling_ip6_activates_it_on_the_default_nic() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    let provider = cloud.provider();

    let state = provider
        .update(&state, web(json!({"ip6": true})))
        .await
        .unwrap();

    assert!(cloud.mutations().contains(&"activate_ip6".to_string()));
    assert_eq!(state.attribute("ip6"), Some(&json!(true)));
    assert!(state.attribute("ip6_address").is_some());
}

#[tokio::test]
async fn test_zone_change_plans_replacement() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    let provider = cloud.provider();

    let plan = provider
        .plan("exoscale_compute", Some(&state), &web(json!({"zone": "z1"})))
        .unwrap();
    assert_eq!(plan.action, ActionType::Replace);
    assert_eq!(plan.replace_reasons(), vec!["zone"]);

    let err = provider
        .update(&state, web(json!({"zone": "z1"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[tokio::test]
async fn test_security_group_names_resolve_to_ids() {
    let cloud = FakeCloud::new();
    let sg = cloud.add_security_group("web");
    let provider = cloud.provider();

    let state = provider
        .create("exoscale_compute", web(json!({"security_groups": ["web"]})))
        .await
        .unwrap();

    assert_eq!(state.attribute("security_group_ids"), Some(&json!([sg])));
    assert_eq!(state.attribute("security_groups"), Some(&json!(["web"])));
}

#[tokio::test]
async fn test_read_and_exists_after_remote_deletion() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    let provider = cloud.provider();

    assert!(provider.exists(&state).await.unwrap());
    provider.delete(&state).await.unwrap();

    assert!(!provider.exists(&state).await.unwrap());
    assert_eq!(provider.read(&state).await.unwrap(), None);
    // deleting again is not an error
    provider.delete(&state).await.unwrap();
}

#[tokio::test]
async fn test_import_by_display_name_with_siblings() {
    let cloud = FakeCloud::new();
    let state = create_web(&cloud).await;
    cloud.add_secondary_ip(&state.id, "198.51.100.200");
    let provider = cloud.provider();

    let imported = provider.import("exoscale_compute", "web").await.unwrap();

    assert_eq!(imported.len(), 2);
    assert_eq!(imported[0].resource_type, "exoscale_compute");
    assert_eq!(imported[0].id, state.id);
    assert_eq!(imported[0].attribute("disk_size"), Some(&json!(10)));
    assert_eq!(imported[1].resource_type, "exoscale_secondary_ipaddress");
    assert_eq!(imported[1].attribute("compute_id"), Some(&json!(state.id)));
    assert_eq!(
        imported[1].attribute("ip_address"),
        Some(&json!("198.51.100.200"))
    );
}

#[tokio::test]
async fn test_disk_smaller_than_template_is_rejected_before_deploy() {
    let cloud = FakeCloud::new();
    let provider = cloud.provider();

    let err = provider
        .create(
            "exoscale_compute",
            web(json!({"template": "Windows Server 2022", "disk_size": 50})),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invalid);
    assert!(!cloud.calls().contains(&"deploy_virtual_machine".to_string()));
    assert_eq!(cloud.vm_count(), 0);
}

#[tokio::test]
async fn test_import_of_unknown_name_is_not_found() {
    let cloud = FakeCloud::new();
    let provider = cloud.provider();

    let err = provider.import("exoscale_compute", "nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
