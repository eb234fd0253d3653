use core::str::FromStr;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clubhouse_auth::Role;
use clubhouse_core::{
    DomainError, DomainResult, Entity, EventId, OrganizationId, TaskId, TeamId, UserId, validate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Overdue,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Overdue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Overdue => "overdue",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("invalid task status: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(DomainError::validation(format!("invalid priority: {other}"))),
        }
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub team_id: Option<TeamId>,
    pub event_id: Option<EventId>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<DateTime<Utc>>,
}

/// A task.
///
/// # Invariants
/// - `completed_at` is set exactly when `status` is completed.
/// - Every assignee was a member of `team_id` when assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub org_id: OrganizationId,
    pub team_id: Option<TeamId>,
    pub event_id: Option<EventId>,
    pub creator_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    assignees: BTreeMap<UserId, DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Task {
    type Id = TaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Task {
    pub fn create(
        id: TaskId,
        org_id: OrganizationId,
        creator_id: UserId,
        input: NewTask,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut task = Self {
            id,
            org_id,
            team_id: input.team_id,
            event_id: input.event_id,
            creator_id,
            title: validate::required_text("title", &input.title)?,
            description: validate::optional_text(input.description.as_deref()),
            priority: input.priority,
            status: TaskStatus::Pending,
            due_date: input.due_date,
            completed_at: None,
            assignees: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        task.set_status(input.status, now);
        Ok(task)
    }

    pub fn is_creator(&self, user_id: UserId) -> bool {
        self.creator_id == user_id
    }

    pub fn ensure_creator(&self, actor: UserId, action: &str) -> DomainResult<()> {
        if !self.is_creator(actor) {
            return Err(DomainError::forbidden(format!(
                "only the task creator may {action} it"
            )));
        }
        Ok(())
    }

    /// Creator, or an organization LEADER/COLEADER.
    pub fn ensure_can_manage_assignees(
        &self,
        actor: UserId,
        actor_org_role: Option<Role>,
    ) -> DomainResult<()> {
        if self.is_creator(actor) || actor_org_role.is_some_and(Role::is_admin) {
            return Ok(());
        }
        Err(DomainError::forbidden(
            "only the task creator or organization leaders may manage assignees",
        ))
    }

    pub fn update(&mut self, actor: UserId, patch: TaskPatch, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_creator(actor, "update")?;

        let title = match &patch.title {
            Some(title) => validate::required_text("title", title)?,
            None => self.title.clone(),
        };
        self.title = title;
        if let Some(description) = patch.description.as_deref() {
            self.description = validate::optional_text(Some(description));
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(status) = patch.status {
            self.set_status(status, now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Change status, keeping `completed_at` in step.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        match (self.status, status) {
            (TaskStatus::Completed, TaskStatus::Completed) => {}
            (_, TaskStatus::Completed) => self.completed_at = Some(now),
            _ => self.completed_at = None,
        }
        self.status = status;
    }

    pub fn assignees(&self) -> impl Iterator<Item = UserId> + '_ {
        self.assignees.keys().copied()
    }

    pub fn is_assigned(&self, user_id: UserId) -> bool {
        self.assignees.contains_key(&user_id)
    }

    /// Assign users who are members of the task's team.
    ///
    /// Non-members and users already assigned are skipped; the returned list
    /// holds only the newly assigned ids, in request order.
    pub fn assign(
        &mut self,
        user_ids: &[UserId],
        is_team_member: impl Fn(UserId) -> bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<UserId>> {
        if self.team_id.is_none() {
            return Err(DomainError::validation(
                "task has no team; assignees must come from a team",
            ));
        }
        ensure_ids(user_ids)?;

        let mut assigned = Vec::new();
        for &user_id in user_ids {
            if !is_team_member(user_id) || self.assignees.contains_key(&user_id) {
                continue;
            }
            self.assignees.insert(user_id, now);
            assigned.push(user_id);
        }
        if !assigned.is_empty() {
            self.updated_at = now;
        }
        Ok(assigned)
    }

    /// Remove assignees; ids that were not assigned are skipped.
    pub fn unassign(&mut self, user_ids: &[UserId], now: DateTime<Utc>) -> DomainResult<Vec<UserId>> {
        ensure_ids(user_ids)?;

        let removed: Vec<UserId> = user_ids
            .iter()
            .copied()
            .filter(|id| self.assignees.remove(id).is_some())
            .collect();
        if !removed.is_empty() {
            self.updated_at = now;
        }
        Ok(removed)
    }
}

fn ensure_ids(user_ids: &[UserId]) -> DomainResult<()> {
    if user_ids.is_empty() {
        return Err(DomainError::validation("at least one user id is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn task(team: Option<TeamId>) -> Task {
        Task::create(
            TaskId::new(),
            OrganizationId::new(),
            UserId::new(),
            NewTask {
                team_id: team,
                title: "Order motors".to_string(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn create_defaults_and_requires_title() {
        let t = task(None);
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.priority, Priority::Medium);
        assert_eq!(t.completed_at, None);

        let err = Task::create(
            TaskId::new(),
            OrganizationId::new(),
            UserId::new(),
            NewTask::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn completed_at_follows_status() {
        let mut t = task(None);
        let creator = t.creator_id;
        let done_at = Utc::now();
        t.update(
            creator,
            TaskPatch {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            done_at,
        )
        .unwrap();
        assert_eq!(t.completed_at, Some(done_at));

        t.set_status(TaskStatus::Completed, done_at + Duration::hours(1));
        assert_eq!(t.completed_at, Some(done_at));

        t.set_status(TaskStatus::InProgress, Utc::now());
        assert_eq!(t.completed_at, None);
    }

    #[test]
    fn only_creator_updates() {
        let mut t = task(None);
        let err = t.update(UserId::new(), TaskPatch::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn assign_skips_outsiders_and_duplicates() {
        let mut t = task(Some(TeamId::new()));
        let team: Vec<UserId> = (0..3).map(|_| UserId::new()).collect();
        let outsider = UserId::new();
        let is_member = |id: UserId| team.contains(&id);

        let requested = [team[0], outsider, team[1], team[2]];
        let assigned = t.assign(&requested, is_member, Utc::now()).unwrap();
        assert_eq!(assigned, team);
        assert!(!t.is_assigned(outsider));

        let again = t.assign(&[team[0]], is_member, Utc::now()).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn assign_requires_team() {
        let mut t = task(None);
        let err = t.assign(&[UserId::new()], |_| true, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn unassign_reports_removed_only() {
        let mut t = task(Some(TeamId::new()));
        let a = UserId::new();
        t.assign(&[a], |_| true, Utc::now()).unwrap();
        let removed = t.unassign(&[a, UserId::new()], Utc::now()).unwrap();
        assert_eq!(removed, vec![a]);
        assert_eq!(t.assignees().count(), 0);
        assert!(t.unassign(&[], Utc::now()).is_err());
    }

    #[test]
    fn assignee_management_is_creator_or_org_admin() {
        let t = task(Some(TeamId::new()));
        assert!(t.ensure_can_manage_assignees(t.creator_id, None).is_ok());
        assert!(t.ensure_can_manage_assignees(UserId::new(), Some(Role::CoLeader)).is_ok());
        assert!(t.ensure_can_manage_assignees(UserId::new(), Some(Role::Member)).is_err());
    }

    #[test]
    fn status_parses_snake_case() {
        assert_eq!("In_Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert!("done".parse::<TaskStatus>().is_err());
        assert_eq!(" HIGH ".parse::<Priority>().unwrap(), Priority::High);
    }
}
