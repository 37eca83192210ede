//! Composed reads
//!
//! Assemble nested entities from parent and child rows. Child selects are
//! issued concurrently; the result is the authoritative server view used
//! for read-your-write.

use crate::error::GatewayError;
use crate::gateway::rows::{
    ActivityLogRow, BusinessServiceRow, ChallengeCategoryRow, ChallengeRow, CommentRow,
    CriterionActivityRow, CriterionCategoryRow, CriterionRow, DeviceScopeRow, DocumentRow,
    EngagementRow, OutcomeRow, SessionActivityRow, SessionRow, TeamMemberRow, TemplateRow,
};
use crate::gateway::{Filter, Gateway, GatewayExt, Order, Query, TableRow};
use futures::try_join;
use pov_model::{
    Challenge, ChallengeId, ChallengeTemplate, CriterionId, CriterionStatus, DecisionCriterion,
    Engagement, EngagementFields, EngagementId, EngagementSummary, SessionId, SessionStatus,
    WorkStatus, WorkingSession,
};
use std::collections::HashMap;
use uuid::Uuid;

/// A flat row converted into its model type
///
/// # Errors
/// [`GatewayError::NotFound`] when no row has the id
pub async fn record<R, M>(gateway: &dyn Gateway, id: impl Into<Uuid>) -> Result<M, GatewayError>
where
    R: TableRow,
    M: From<R>,
{
    gateway.fetch_row::<R>(id.into()).await.map(M::from)
}

/// Root fields only
///
/// # Errors
/// [`GatewayError::NotFound`] when the engagement does not exist
pub async fn engagement_fields(
    gateway: &dyn Gateway,
    id: EngagementId,
) -> Result<EngagementFields, GatewayError> {
    record::<EngagementRow, EngagementFields>(gateway, id).await
}

/// Challenge with outcomes and categories
///
/// # Errors
/// [`GatewayError::NotFound`] when the challenge does not exist
pub async fn challenge(gateway: &dyn Gateway, id: ChallengeId) -> Result<Challenge, GatewayError> {
    let (row, outcomes, categories) = try_join!(
        gateway.fetch_row::<ChallengeRow>(id.as_uuid()),
        gateway.select_rows::<OutcomeRow>(
            Query::by("challenge_id", id).order_by("order_index", Order::Asc)
        ),
        gateway.select_rows::<ChallengeCategoryRow>(Query::by("challenge_id", id)),
    )?;
    Ok(row.assemble(outcomes, categories))
}

/// Criterion with categories and ordered activities
///
/// # Errors
/// [`GatewayError::NotFound`] when the criterion does not exist
pub async fn criterion(
    gateway: &dyn Gateway,
    id: CriterionId,
) -> Result<DecisionCriterion, GatewayError> {
    let (row, categories, activities) = try_join!(
        gateway.fetch_row::<CriterionRow>(id.as_uuid()),
        gateway.select_rows::<CriterionCategoryRow>(Query::by("criterion_id", id)),
        gateway.select_rows::<CriterionActivityRow>(
            Query::by("criterion_id", id).order_by("order_index", Order::Asc)
        ),
    )?;
    Ok(row.assemble(categories, activities))
}

/// Working session with activities in display order
///
/// # Errors
/// [`GatewayError::NotFound`] when the session does not exist, or
/// [`GatewayError::Serialization`] for a malformed activity row
pub async fn session(gateway: &dyn Gateway, id: SessionId) -> Result<WorkingSession, GatewayError> {
    let (row, activities) = try_join!(
        gateway.fetch_row::<SessionRow>(id.as_uuid()),
        gateway.select_rows::<SessionActivityRow>(
            Query::by("session_id", id).order_by("display_order", Order::Asc)
        ),
    )?;
    row.assemble(activities)
}

/// The full aggregate
///
/// # Errors
/// [`GatewayError::NotFound`] when the engagement does not exist
pub async fn engagement(gateway: &dyn Gateway, id: EngagementId) -> Result<Engagement, GatewayError> {
    let by_engagement = || Query::by("engagement_id", id).order_by("created_at", Order::Asc);

    let (fields, challenges, criteria, team, devices, services, sessions, comments, documents, log) = try_join!(
        engagement_fields(gateway, id),
        gateway.select_rows::<ChallengeRow>(by_engagement()),
        gateway.select_rows::<CriterionRow>(by_engagement()),
        gateway.select_rows::<TeamMemberRow>(by_engagement()),
        gateway.select_rows::<DeviceScopeRow>(by_engagement()),
        gateway.select_rows::<BusinessServiceRow>(by_engagement()),
        gateway.select_rows::<SessionRow>(
            Query::by("engagement_id", id).order_by("scheduled_at", Order::Asc)
        ),
        gateway.select_rows::<CommentRow>(by_engagement()),
        gateway.select_rows::<DocumentRow>(by_engagement()),
        gateway.select_rows::<ActivityLogRow>(
            Query::by("engagement_id", id).order_by("created_at", Order::Desc)
        ),
    )?;

    let challenge_ids: Vec<Uuid> = challenges.iter().map(|c| c.id).collect();
    let criterion_ids: Vec<Uuid> = criteria.iter().map(|c| c.id).collect();
    let session_ids: Vec<Uuid> = sessions.iter().map(|s| s.id).collect();
    let (outcomes, challenge_categories, criterion_categories, criterion_activities, session_activities) = try_join!(
        children::<OutcomeRow>(gateway, "challenge_id", &challenge_ids, Some("order_index")),
        children::<ChallengeCategoryRow>(gateway, "challenge_id", &challenge_ids, None),
        children::<CriterionCategoryRow>(gateway, "criterion_id", &criterion_ids, None),
        children::<CriterionActivityRow>(gateway, "criterion_id", &criterion_ids, Some("order_index")),
        children::<SessionActivityRow>(gateway, "session_id", &session_ids, Some("display_order")),
    )?;

    let mut outcomes = group(outcomes, |o| o.challenge_id);
    let mut challenge_categories = group(challenge_categories, |c| c.challenge_id);
    let mut criterion_categories = group(criterion_categories, |c| c.criterion_id);
    let mut criterion_activities = group(criterion_activities, |a| a.criterion_id);
    let mut session_activities = group(session_activities, |a| a.session_id);

    let mut engagement = Engagement::from_fields(fields);
    engagement.challenges = challenges
        .into_iter()
        .map(|row| {
            let id = row.id;
            row.assemble(
                outcomes.remove(&id).unwrap_or_default(),
                challenge_categories.remove(&id).unwrap_or_default(),
            )
        })
        .collect();
    engagement.decision_criteria = criteria
        .into_iter()
        .map(|row| {
            let id = row.id;
            row.assemble(
                criterion_categories.remove(&id).unwrap_or_default(),
                criterion_activities.remove(&id).unwrap_or_default(),
            )
        })
        .collect();
    engagement.working_sessions = sessions
        .into_iter()
        .map(|row| {
            let id = row.id;
            row.assemble(session_activities.remove(&id).unwrap_or_default())
        })
        .collect::<Result<_, _>>()?;
    engagement.team_members = team.into_iter().map(Into::into).collect();
    engagement.device_scopes = devices.into_iter().map(Into::into).collect();
    engagement.business_services = services.into_iter().map(Into::into).collect();
    engagement.comments = comments.into_iter().map(Into::into).collect();
    engagement.documents = documents.into_iter().map(Into::into).collect();
    engagement.activity_log = log.into_iter().map(Into::into).collect();

    Ok(engagement.normalized())
}

/// List-view summaries, most recently updated first
///
/// # Errors
/// Any gateway failure
pub async fn summaries(
    gateway: &dyn Gateway,
    limit: usize,
) -> Result<Vec<EngagementSummary>, GatewayError> {
    let roots = gateway
        .select_rows::<EngagementRow>(
            Query::new()
                .order_by("updated_at", Order::Desc)
                .limit(limit),
        )
        .await?;
    if roots.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = roots.iter().map(|r| r.id).collect();
    let scoped = || Query::new().filter(Filter::any("engagement_id", &ids));
    let (challenges, criteria, team, sessions) = try_join!(
        gateway.select_rows::<ChallengeRow>(scoped()),
        gateway.select_rows::<CriterionRow>(scoped()),
        gateway.select_rows::<TeamMemberRow>(scoped()),
        gateway.select_rows::<SessionRow>(scoped()),
    )?;

    let challenges = group(challenges, |c| c.engagement_id);
    let criteria = group(criteria, |c| c.engagement_id);
    let team = group(team, |t| t.engagement_id);
    let sessions = group(sessions, |s| s.engagement_id);

    Ok(roots
        .into_iter()
        .map(|row| {
            let id = row.id;
            let mut summary = EngagementSummary::from_fields(&row.into());
            if let Some(challenges) = challenges.get(&id) {
                summary.challenge_count = challenges.len();
                summary.open_challenge_count = challenges
                    .iter()
                    .filter(|c| c.status != WorkStatus::Completed)
                    .count();
            }
            if let Some(criteria) = criteria.get(&id) {
                summary.criteria_count = criteria.len();
                summary.criteria_met_count = criteria
                    .iter()
                    .filter(|c| c.status == CriterionStatus::Met)
                    .count();
            }
            summary.team_size = team.get(&id).map_or(0, Vec::len);
            summary.scheduled_session_count = sessions.get(&id).map_or(0, |s| {
                s.iter()
                    .filter(|s| s.status == SessionStatus::Scheduled)
                    .count()
            });
            summary
        })
        .collect())
}

/// Library templates ordered by title
///
/// # Errors
/// Any gateway failure
pub async fn templates(gateway: &dyn Gateway) -> Result<Vec<ChallengeTemplate>, GatewayError> {
    let rows = gateway
        .select_rows::<TemplateRow>(Query::new().order_by("title", Order::Asc))
        .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn children<R: TableRow>(
    gateway: &dyn Gateway,
    parent_column: &'static str,
    parent_ids: &[Uuid],
    order_column: Option<&'static str>,
) -> Result<Vec<R>, GatewayError> {
    if parent_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = Query::new().filter(Filter::any(parent_column, parent_ids));
    if let Some(column) = order_column {
        query = query.order_by(column, Order::Asc);
    }
    gateway.select_rows::<R>(query).await
}

fn group<R>(rows: Vec<R>, key: impl Fn(&R) -> Uuid) -> HashMap<Uuid, Vec<R>> {
    let mut groups: HashMap<Uuid, Vec<R>> = HashMap::new();
    for row in rows {
        groups.entry(key(&row)).or_default().push(row);
    }
    groups
}
