//! Activity log coupling, lifecycle notifications and per-engagement
//! serialisation of mutations

mod common;

use common::{Event, Harness};
use futures::future::join_all;
use pov_model::{
    CommentId, CommentPatch, EngagementId, LogKind, NewBusinessService, NewChallenge, NewComment,
    NewDeviceScope, NewDocument, NewTeamMember, Priority, SessionActivityInput, WorkStatus,
};
use pov_sync::gateway::GatewayOp;
use pov_sync::{AuditConfig, MemoryGateway, SyncConfig, SyncError, Table};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::time::Duration;

fn comment(engagement_id: EngagementId, content: &str) -> NewComment {
    NewComment {
        engagement_id: Some(engagement_id),
        content: content.into(),
    }
}

#[tokio::test]
async fn comment_is_logged_with_an_excerpt() {
    let h = Harness::new();
    let eid = h.engagement().await;

    let posted = h
        .sync
        .add_comment(comment(eid, "Looks good\nsecond line is not logged"))
        .await
        .unwrap();

    assert_eq!(posted.author_email, "Sam.Lee@Example.com");
    let entry = &h.loaded().activity_log[0];
    assert_eq!(entry.kind, LogKind::Comment);
    assert_eq!(entry.description, "\"Looks good\" comment created");
    assert_eq!(entry.author_name, "Sam Lee");
    assert_eq!(entry.reference_id, Some(posted.id.as_uuid()));
}

#[tokio::test]
async fn audit_failure_fails_the_operation_after_the_write() {
    let h = Harness::new();
    let eid = h.engagement().await;
    h.notifier.clear();
    h.gateway.fail_next(GatewayOp::Insert, Table::ActivityLog);

    let err = h
        .sync
        .add_comment(comment(eid, "Looks good"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Remote { .. }));
    assert_eq!(h.gateway.count(Table::Comments), 1);
    assert_eq!(h.loaded().comments.len(), 1);
    assert!(h.log_of(LogKind::Comment).is_empty());
    assert_eq!(
        h.notifier.events(),
        vec![
            Event::Started("Adding comment".into()),
            Event::Failed("Failed to add comment".into()),
        ]
    );
}

#[tokio::test]
async fn best_effort_audit_keeps_the_operation_successful() {
    let h = Harness::with_config(SyncConfig::new().with_audit(AuditConfig::best_effort()));
    let eid = h.engagement().await;
    h.gateway.fail_next(GatewayOp::Insert, Table::ActivityLog);

    let posted = h.sync.add_comment(comment(eid, "Looks good")).await.unwrap();

    assert_eq!(h.loaded().comments, vec![posted]);
    assert!(h.log_of(LogKind::Comment).is_empty());
    assert!(h.notifier.failures().is_empty());
}

#[tokio::test]
async fn deletions_can_go_unlogged() {
    let h = Harness::with_config(
        SyncConfig::new().with_audit(AuditConfig::default().with_log_deletions(false)),
    );
    let eid = h.engagement().await;
    let posted = h.sync.add_comment(comment(eid, "Looks good")).await.unwrap();

    h.sync.delete_comment(eid, posted.id).await.unwrap();

    assert!(h.loaded().comments.is_empty());
    assert_eq!(
        h.log_of(LogKind::Comment),
        vec!["\"Looks good\" comment created".to_string()]
    );
}

#[tokio::test]
async fn deletions_are_logged_by_default() {
    let h = Harness::new();
    let eid = h.engagement().await;
    let posted = h.sync.add_comment(comment(eid, "Looks good")).await.unwrap();

    h.sync.delete_comment(eid, posted.id).await.unwrap();

    assert_eq!(
        h.log_of(LogKind::Comment)[0],
        "\"Looks good\" comment deleted"
    );
}

#[tokio::test]
async fn comment_edit_is_logged() {
    let h = Harness::new();
    let eid = h.engagement().await;
    let posted = h.sync.add_comment(comment(eid, "Looks good")).await.unwrap();

    let edited = h
        .sync
        .update_comment(CommentPatch {
            engagement_id: Some(eid),
            id: posted.id,
            content: "Looks great".into(),
        })
        .await
        .unwrap();

    assert_eq!(edited.content, "Looks great");
    assert_eq!(h.loaded().comments, vec![edited]);
    assert_eq!(h.log_of(LogKind::Comment)[0], "\"Looks great\" updated");
}

#[tokio::test]
async fn remote_failure_uses_the_operation_message() {
    let h = Harness::new();
    let eid = h.engagement().await;
    let posted = h.sync.add_comment(comment(eid, "Looks good")).await.unwrap();
    h.notifier.clear();
    h.gateway.fail_always(GatewayOp::Update, Table::Comments);

    let err = h
        .sync
        .update_comment(CommentPatch {
            engagement_id: Some(eid),
            id: posted.id,
            content: "Looks great".into(),
        })
        .await
        .unwrap_err();

    assert!(!err.is_user_error());
    assert_eq!(h.notifier.failures(), vec!["Failed to update comment".to_string()]);
    assert_eq!(h.loaded().comments[0].content, "Looks good");
}

#[tokio::test]
async fn user_error_carries_its_own_message() {
    let h = Harness::new();
    let eid = h.engagement().await;
    h.notifier.clear();

    let err = h
        .sync
        .delete_comment(eid, CommentId::new())
        .await
        .unwrap_err();

    assert!(err.is_user_error());
    assert!(matches!(err, SyncError::NotFound { entity: "comment", .. }));
    assert_eq!(h.notifier.failures(), vec![err.to_string()]);
}

#[tokio::test]
async fn signed_out_actor_cannot_mutate() {
    let h = Harness::new();
    let eid = h.engagement().await;
    h.identity.sign_out();

    let err = h
        .sync
        .add_comment(comment(eid, "Looks good"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Unauthorized(_)));
    assert_eq!(h.gateway.calls(GatewayOp::Insert, Table::Comments), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mutations_on_one_engagement_all_land() {
    let h = Harness::build(
        SyncConfig::new(),
        MemoryGateway::new().with_latency(Duration::from_millis(2)),
    );
    let eid = h.engagement().await;
    let contents: Vec<String> = (0..8).map(|i| format!("Note {i}")).collect();

    let results = join_all(
        contents
            .iter()
            .map(|content| h.sync.add_comment(comment(eid, content))),
    )
    .await;

    assert!(results.iter().all(Result::is_ok));
    let loaded = h.loaded();
    assert_eq!(loaded.comments.len(), 8);
    let stored: BTreeSet<_> = loaded.comments.iter().map(|c| c.content.clone()).collect();
    assert_eq!(stored, contents.into_iter().collect::<BTreeSet<_>>());
    assert_eq!(h.log_of(LogKind::Comment).len(), 8);
    assert_eq!(h.gateway.count(Table::ActivityLog), 9);
}

#[tokio::test]
async fn every_create_logs_one_entry_pointing_at_the_new_row() {
    let h = Harness::new();
    let eid = h.engagement().await;

    let challenge = h
        .sync
        .add_challenge(NewChallenge {
            engagement_id: Some(eid),
            title: "Alert fatigue".into(),
            description: "Too many low-value alerts".into(),
            business_impact: "Analysts miss real incidents".into(),
            outcomes: vec!["Fewer false positives".into()],
            categories: vec!["SOC".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    let criterion = h
        .sync
        .add_criterion(common::criterion(eid, &["Run phishing sim"]))
        .await
        .unwrap();
    let member = h
        .sync
        .add_team_member(NewTeamMember {
            engagement_id: Some(eid),
            email: "alex.kim@example.com".into(),
            name: "Alex Kim".into(),
            role: "Sales Engineer".into(),
            organization: "Vendor".into(),
        })
        .await
        .unwrap();
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
    let service = h
        .sync
        .add_business_service(NewBusinessService {
            engagement_id: Some(eid),
            name: "Payments".into(),
            criticality: Priority::High,
            ..Default::default()
        })
        .await
        .unwrap();
    let session = h
        .sync
        .add_session(common::session(
            eid,
            vec![SessionActivityInput::linked(
                criterion.activities[0].id,
                WorkStatus::Open,
            )],
        ))
        .await
        .unwrap();
    let document = h
        .sync
        .upload_document(NewDocument {
            engagement_id: Some(eid),
            name: "test-plan.pdf".into(),
            description: "Signed test plan".into(),
            content_type: "application/pdf".into(),
            bytes: b"%PDF-1.7".to_vec(),
        })
        .await
        .unwrap();

    let log = h.loaded().activity_log;
    let created = [
        (LogKind::Challenge, challenge.id.as_uuid()),
        (LogKind::Criteria, criterion.id.as_uuid()),
        (LogKind::Team, member.id.as_uuid()),
        (LogKind::Device, scope.id.as_uuid()),
        (LogKind::Service, service.id.as_uuid()),
        (LogKind::Session, session.id.as_uuid()),
        (LogKind::Document, document.id.as_uuid()),
    ];
    for (kind, id) in created {
        let entries: Vec<_> = log
            .iter()
            .filter(|e| e.reference_id == Some(id))
            .collect();
        assert_eq!(entries.len(), 1, "{kind:?} create should log once");
        assert_eq!(entries[0].kind, kind);
    }
    // one per create plus the engagement's own entry
    assert_eq!(log.len(), created.len() + 1);
    assert_eq!(h.gateway.count(Table::ActivityLog), created.len() + 1);
}
