//! Team membership, device scopes, business services and documents

mod common;

use common::Harness;
use pov_model::{
    BusinessServicePatch, DeviceScopePatch, EngagementId, LogKind, NewBusinessService, NewDeviceScope, NewDocument,
    NewTeamMember, Priority, TeamMemberPatch, WorkStatus,
};
use pov_sync::gateway::GatewayOp;
use pov_sync::{BlobStorage, SyncError, Table};
use pretty_assertions::assert_eq;

fn member(engagement_id: EngagementId, email: &str, name: &str) -> NewTeamMember {
    NewTeamMember {
        engagement_id: Some(engagement_id),
        email: email.into(),
        name: name.into(),
        role: "Sales Engineer".into(),
        organization: "Vendor".into(),
    }
}

fn document(engagement_id: EngagementId) -> NewDocument {
    NewDocument {
        engagement_id: Some(engagement_id),
        name: "test-plan.pdf".into(),
        description: "Signed test plan".into(),
        content_type: "application/pdf".into(),
        bytes: b"%PDF-1.7".to_vec(),
    }
}

#[tokio::test]
async fn member_joins_with_a_normalized_email() {
    let h = Harness::new();
    let eid = h.engagement().await;

    let added = h
        .sync
        .add_team_member(member(eid, "  Alex.Kim@Example.COM ", " Alex Kim "))
        .await
        .unwrap();

    assert_eq!(added.email, "alex.kim@example.com");
    assert_eq!(added.name, "Alex Kim");
    assert_eq!(h.loaded().team_members.len(), 2);
    assert_eq!(
        h.log_of(LogKind::Team),
        vec!["\"Alex Kim\" added to the team as Sales Engineer".to_string()]
    );
    assert_eq!(h.store.read(|s| s.summaries[0].team_size), 2);
}

#[tokio::test]
async fn adding_a_member_twice_is_idempotent() {
    let h = Harness::new();
    let eid = h.engagement().await;
    let first = h
        .sync
        .add_team_member(member(eid, "alex.kim@example.com", "Alex Kim"))
        .await
        .unwrap();

    let again = h
        .sync
        .add_team_member(member(eid, "ALEX.KIM@example.com", "Alex Kim"))
        .await
        .unwrap();

    assert_eq!(again.id, first.id);
    assert_eq!(h.gateway.count(Table::TeamMembers), 2);
    assert_eq!(h.gateway.count(Table::People), 2);
    assert_eq!(h.loaded().team_members.len(), 2);
    assert_eq!(h.log_of(LogKind::Team).len(), 1);

    let reloaded = h.sync.reload_engagement(eid).await.unwrap();
    let mut emails: Vec<&str> = reloaded
        .team_members
        .iter()
        .map(|m| m.email.as_str())
        .collect();
    emails.sort_unstable();
    assert_eq!(emails, vec!["alex.kim@example.com", "sam.lee@example.com"]);
}

#[tokio::test]
async fn directory_entry_is_shared_across_engagements() {
    let h = Harness::new();
    let first = h.engagement().await;
    let a = h
        .sync
        .add_team_member(member(first, "alex.kim@example.com", "Alex Kim"))
        .await
        .unwrap();
    let second = h.engagement().await;

    let b = h
        .sync
        .add_team_member(member(second, "alex.kim@example.com", "Alex Kim"))
        .await
        .unwrap();

    assert_eq!(a.person_id, b.person_id);
    assert_ne!(a.id, b.id);
    assert_eq!(h.gateway.count(Table::People), 2);
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let h = Harness::new();
    let eid = h.engagement().await;

    let err = h
        .sync
        .add_team_member(member(eid, "not-an-email", "Alex Kim"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Validation(ref e) if e.field == "email"));
    assert_eq!(h.gateway.calls(GatewayOp::Upsert, Table::People), 1);
}

#[tokio::test]
async fn member_edit_and_removal_keep_the_directory_entry() {
    let h = Harness::new();
    let eid = h.engagement().await;
    let added = h
        .sync
        .add_team_member(member(eid, "alex.kim@example.com", "Alex Kim"))
        .await
        .unwrap();

    let updated = h
        .sync
        .update_team_member(TeamMemberPatch {
            engagement_id: Some(eid),
            id: added.id,
            name: None,
            role: Some("Architect".into()),
            organization: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.role, "Architect");
    assert_eq!(h.log_of(LogKind::Team)[0], "\"Alex Kim\" details updated");

    h.sync.remove_team_member(eid, added.id).await.unwrap();

    assert_eq!(h.loaded().team_members.len(), 1);
    assert_eq!(h.gateway.count(Table::People), 2);
    assert_eq!(h.log_of(LogKind::Team)[0], "\"Alex Kim\" removed from the team");
}

#[tokio::test]
async fn device_scope_lifecycle() {
    let h = Harness::new();
    let eid = h.engagement().await;

    let scope = h
        .sync
        .add_device_scope(NewDeviceScope {
            engagement_id: Some(eid),
            device_type: "Windows laptops".into(),
            category: "Endpoints".into(),
            count: 250,
            priority: Priority::High,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(scope.status, WorkStatus::Open);

    let updated = h
        .sync
        .update_device_scope(DeviceScopePatch {
            engagement_id: Some(eid),
            id: scope.id,
            device_type: None,
            category: None,
            count: Some(300),
            priority: None,
            notes: None,
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.count, 300);
    assert_eq!(updated.priority, Priority::High);

    h.sync
        .update_device_scope_status(eid, scope.id, WorkStatus::InProgress)
        .await
        .unwrap();
    h.sync.delete_device_scope(eid, scope.id).await.unwrap();

    assert!(h.loaded().device_scopes.is_empty());
    assert_eq!(
        h.log_of(LogKind::Device),
        vec![
            "\"Windows laptops\" device scope deleted".to_string(),
            "\"Windows laptops\" marked as in progress".to_string(),
            "\"Windows laptops\" updated".to_string(),
            "\"Windows laptops\" device scope created".to_string(),
        ]
    );
}

#[tokio::test]
async fn device_scope_needs_a_count() {
    let h = Harness::new();
    let eid = h.engagement().await;

    let err = h
        .sync
        .add_device_scope(NewDeviceScope {
            engagement_id: Some(eid),
            device_type: "Servers".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Validation(ref e) if e.field == "count"));
    assert_eq!(h.gateway.count(Table::DeviceScopes), 0);
}

#[tokio::test]
async fn business_service_owner_is_optional() {
    let h = Harness::new();
    let eid = h.engagement().await;

    let service = h
        .sync
        .add_business_service(NewBusinessService {
            engagement_id: Some(eid),
            name: "Payments".into(),
            criticality: Priority::High,
            owner: Some("   ".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(service.owner, None);

    h.sync
        .update_business_service_status(eid, service.id, WorkStatus::Completed)
        .await
        .unwrap();
    assert_eq!(h.loaded().business_services[0].status, WorkStatus::Completed);
    assert_eq!(h.log_of(LogKind::Service)[0], "\"Payments\" marked as complete");

    h.sync.delete_business_service(eid, service.id).await.unwrap();
    assert!(h.loaded().business_services.is_empty());
}

#[tokio::test]
async fn business_service_owner_can_be_cleared() {
    let h = Harness::new();
    let eid = h.engagement().await;
    let service = h
        .sync
        .add_business_service(NewBusinessService {
            engagement_id: Some(eid),
            name: "Payments".into(),
            criticality: Priority::High,
            owner: Some("Finance IT".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(service.owner.as_deref(), Some("Finance IT"));

    let patch = |owner| BusinessServicePatch {
        engagement_id: Some(eid),
        id: service.id,
        name: None,
        description: None,
        criticality: None,
        owner,
        notes: None,
        status: None,
    };
    let kept = h.sync.update_business_service(patch(None)).await.unwrap();
    assert_eq!(kept.owner.as_deref(), Some("Finance IT"));

    let cleared = h
        .sync
        .update_business_service(patch(Some(None)))
        .await
        .unwrap();
    assert_eq!(cleared.owner, None);
    assert_eq!(h.loaded().business_services[0].owner, None);
}

#[tokio::test]
async fn upload_stores_blob_then_row() {
    let h = Harness::new();
    let eid = h.engagement().await;

    let uploaded = h.sync.upload_document(document(eid)).await.unwrap();

    assert_eq!(uploaded.bucket, "engagement-documents");
    assert!(uploaded.path.starts_with(&format!("{eid}/")));
    assert!(uploaded.path.ends_with("-test-plan.pdf"));
    assert_eq!(uploaded.size_bytes, 8);
    assert_eq!(uploaded.author_email, "Sam.Lee@Example.com");
    let blob = h.storage.get(&uploaded.bucket, &uploaded.path).unwrap();
    assert_eq!(blob.content_type, "application/pdf");
    assert_eq!(h.loaded().documents, vec![uploaded]);
    assert_eq!(
        h.log_of(LogKind::Document),
        vec!["\"test-plan.pdf\" document uploaded".to_string()]
    );
}

#[tokio::test]
async fn failed_row_insert_removes_the_blob() {
    let h = Harness::new();
    let eid = h.engagement().await;
    h.gateway.fail_next(GatewayOp::Insert, Table::Documents);

    let err = h.sync.upload_document(document(eid)).await.unwrap_err();

    assert!(matches!(err, SyncError::Remote { .. }));
    assert!(h.storage.is_empty());
    assert_eq!(h.gateway.count(Table::Documents), 0);
    assert!(h.loaded().documents.is_empty());
}

#[tokio::test]
async fn failed_blob_upload_writes_nothing() {
    let h = Harness::new();
    let eid = h.engagement().await;
    h.storage.set_failing(true);

    let err = h.sync.upload_document(document(eid)).await.unwrap_err();

    assert!(matches!(err, SyncError::Remote { .. }));
    assert_eq!(h.gateway.calls(GatewayOp::Insert, Table::Documents), 0);
    assert_eq!(h.notifier.failures(), vec!["Failed to upload document".to_string()]);
}

#[tokio::test]
async fn delete_removes_blob_and_row() {
    let h = Harness::new();
    let eid = h.engagement().await;
    let uploaded = h.sync.upload_document(document(eid)).await.unwrap();

    h.sync.delete_document(eid, uploaded.id).await.unwrap();

    assert!(h.storage.is_empty());
    assert_eq!(h.gateway.count(Table::Documents), 0);
    assert!(h.loaded().documents.is_empty());
    assert_eq!(
        h.log_of(LogKind::Document)[0],
        "\"test-plan.pdf\" document deleted"
    );
}

#[tokio::test]
async fn missing_blob_does_not_block_document_delete() {
    let h = Harness::new();
    let eid = h.engagement().await;
    let uploaded = h.sync.upload_document(document(eid)).await.unwrap();
    h.storage
        .remove(&uploaded.bucket, &uploaded.path)
        .await
        .unwrap();

    h.sync.delete_document(eid, uploaded.id).await.unwrap();

    assert_eq!(h.gateway.count(Table::Documents), 0);
}
