//! Scripted engagement against the in-memory adapters

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Args;
use pov_model::{
    Actor, ActorId, CriterionStatus, EngagementStatus, EngagementSummary, LogKind,
    NewBusinessService, NewChallenge, NewComment, NewCriterion, NewDeviceScope, NewDocument,
    NewEngagement, NewSession, NewTeamMember, Priority, SessionActivityInput, StatusToken,
    WorkStatus,
};
use pov_store::AggregateStore;
use pov_sync::{
    EngagementSync, MemoryBlobStorage, MemoryGateway, Ports, StaticIdentity, SyncConfig,
    TracingNotifier,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

#[derive(Debug, Clone, Args)]
pub(crate) struct DemoArgs {
    /// Engagement title
    #[arg(long, default_value = "Acme POV")]
    pub(crate) title: String,

    /// Customer the engagement is run for
    #[arg(long, default_value = "Acme Corp")]
    pub(crate) customer: String,

    /// Print the report as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

/// Outcome of a demo run
#[derive(Debug, Serialize)]
pub(crate) struct DemoReport {
    pub(crate) summary: EngagementSummary,
    /// Oldest first
    pub(crate) activity_log: Vec<LogLine>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LogLine {
    pub(crate) kind: LogKind,
    pub(crate) title: String,
    pub(crate) description: String,
}

impl DemoReport {
    pub(crate) fn render(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        let _ = writeln!(out, "{} for {} [{}]", s.title, s.customer_name, s.status.label());
        let _ = writeln!(
            out,
            "  challenges: {} ({} open)  criteria: {} ({} met)  team: {}  sessions scheduled: {}",
            s.challenge_count,
            s.open_challenge_count,
            s.criteria_count,
            s.criteria_met_count,
            s.team_size,
            s.scheduled_session_count,
        );
        let _ = writeln!(out, "\nActivity log:");
        for line in &self.activity_log {
            let kind = format!("{:?}", line.kind);
            let _ = writeln!(out, "  {kind:<10} {:<28} {}", line.title, line.description);
        }
        out
    }
}

/// Run the script and report the resulting engagement
pub(crate) async fn run(config: SyncConfig, args: &DemoArgs) -> anyhow::Result<DemoReport> {
    let owner = Actor::new(ActorId::new(), "demo.owner@example.com", "Demo Owner");
    let ports = Ports {
        gateway: Arc::new(MemoryGateway::new()),
        identity: Arc::new(StaticIdentity::new(owner)),
        notifier: Arc::new(TracingNotifier),
        storage: Arc::new(MemoryBlobStorage::new()),
    };
    let store = Arc::new(AggregateStore::new());
    let sync = EngagementSync::new(config, ports, Arc::clone(&store));

    let engagement = sync
        .create_engagement(NewEngagement {
            title: args.title.clone(),
            customer_name: args.customer.clone(),
            ..Default::default()
        })
        .await
        .context("create engagement")?;
    let eid = engagement.id;
    tracing::info!(engagement = %eid, "demo engagement created");

    sync.add_team_member(NewTeamMember {
        engagement_id: Some(eid),
        email: "alex.kim@example.com".into(),
        name: "Alex Kim".into(),
        role: "Sales Engineer".into(),
        organization: "Vendor".into(),
    })
    .await
    .context("add team member")?;

    sync.add_challenge(NewChallenge {
        engagement_id: Some(eid),
        title: "Alert fatigue".into(),
        description: "Analysts triage thousands of low-value alerts a day".into(),
        business_impact: "Real incidents are missed".into(),
        outcomes: vec!["Fewer false positives".into(), "Faster triage".into()],
        categories: vec!["SecOps".into()],
        to_library: true,
        ..Default::default()
    })
    .await
    .context("add challenge")?;

    let criterion = sync
        .add_criterion(NewCriterion {
            engagement_id: Some(eid),
            title: "Threat detection".into(),
            success_criteria: "Detect 95% of simulated attacks".into(),
            categories: vec!["Security".into()],
            activities: vec!["Run phishing simulation".into(), "Review detections".into()],
            ..Default::default()
        })
        .await
        .context("add decision criterion")?;
    let (first, second) = match criterion.activities.as_slice() {
        [first, second, ..] => (first.id, second.id),
        _ => anyhow::bail!("criterion was stored without its activities"),
    };

    sync.add_device_scope(NewDeviceScope {
        engagement_id: Some(eid),
        device_type: "Windows laptops".into(),
        category: "Endpoints".into(),
        count: 250,
        priority: Priority::High,
        ..Default::default()
    })
    .await
    .context("add device scope")?;

    sync.add_business_service(NewBusinessService {
        engagement_id: Some(eid),
        name: "Payments".into(),
        criticality: Priority::High,
        owner: Some("Finance IT".into()),
        ..Default::default()
    })
    .await
    .context("add business service")?;

    let session = sync
        .add_session(NewSession {
            engagement_id: Some(eid),
            title: "Day 1".into(),
            scheduled_at: Utc::now() + Duration::days(1),
            duration_minutes: 120,
            notes: String::new(),
            activities: vec![
                SessionActivityInput::linked(first, WorkStatus::Open),
                SessionActivityInput::custom("Kickoff", WorkStatus::Open),
                SessionActivityInput::linked(second, WorkStatus::Open),
            ],
        })
        .await
        .context("schedule session")?;

    sync.update_session_activities(
        eid,
        session.id,
        vec![
            SessionActivityInput::linked(first, WorkStatus::Completed),
            SessionActivityInput::custom("Kickoff", WorkStatus::Completed),
            SessionActivityInput::linked(second, WorkStatus::InProgress),
        ],
    )
    .await
    .context("update session activities")?;

    sync.update_criterion_status(eid, criterion.id, CriterionStatus::Met)
        .await
        .context("update criterion status")?;

    sync.add_comment(NewComment {
        engagement_id: Some(eid),
        content: "Day 1 went well; detections tuned overnight.".into(),
    })
    .await
    .context("add comment")?;

    sync.upload_document(NewDocument {
        engagement_id: Some(eid),
        name: "test-plan.md".into(),
        description: "Agreed test plan".into(),
        content_type: "text/markdown".into(),
        bytes: b"# Test plan\n".to_vec(),
    })
    .await
    .context("upload document")?;

    sync.update_engagement_status(eid, EngagementStatus::InProgress)
        .await
        .context("update engagement status")?;

    let summaries = sync.list_engagements().await.context("list engagements")?;
    let summary = summaries
        .into_iter()
        .find(|s| s.id == eid)
        .context("engagement missing from the list")?;
    let loaded = store.engagement().context("engagement not loaded")?;

    Ok(DemoReport {
        summary,
        activity_log: loaded
            .activity_log
            .into_iter()
            .rev()
            .map(|entry| LogLine {
                kind: entry.kind,
                title: entry.title,
                description: entry.description,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args() -> DemoArgs {
        DemoArgs {
            title: "Demo POV".into(),
            customer: "Globex".into(),
            json: false,
        }
    }

    #[tokio::test]
    async fn script_builds_a_complete_engagement() {
        let report = run(SyncConfig::default(), &args()).await.unwrap();

        let s = &report.summary;
        assert_eq!(s.title, "Demo POV");
        assert_eq!(s.status, EngagementStatus::InProgress);
        assert_eq!(s.challenge_count, 1);
        assert_eq!(s.criteria_met_count, 1);
        assert_eq!(s.team_size, 2);
        assert_eq!(s.scheduled_session_count, 1);

        let first = &report.activity_log[0];
        assert_eq!(first.description, "\"Demo POV\" POV created for Globex");
        let last = report.activity_log.last().unwrap();
        assert_eq!(last.description, "Status changed from Planning to In Progress");
        assert!(report
            .activity_log
            .iter()
            .any(|l| l.description == "\"Run phishing simulation\" marked as complete in \"Day 1\""));
    }

    #[tokio::test]
    async fn report_renders_summary_and_log() {
        let report = run(SyncConfig::default(), &args()).await.unwrap();
        let text = report.render();

        assert!(text.starts_with("Demo POV for Globex [In Progress]"));
        assert!(text.contains("team: 2"));
        assert_eq!(text.matches("\n  ").count(), report.activity_log.len() + 1);
    }
}
