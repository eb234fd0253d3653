use std::sync::Arc;

use chrono::Utc;

use clubhouse_auth::{CurrentUser, Requirement};
use clubhouse_core::{DomainError, EventId, OrganizationId, TaskId, TeamId, UserId};
use clubhouse_tasks::{NewTask, Task, TaskPatch};

use super::{load_event, load_task, load_team};
use crate::error::ServiceResult;
use crate::registry::MembershipRegistry;
use crate::store::{Store, Transaction};

/// Tasks, optionally attached to a team and/or an event.
pub struct TaskService<S> {
    store: Arc<S>,
}

impl<S: Store> TaskService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Org admins may create any task; other members only tasks for a team
    /// they belong to.
    #[tracing::instrument(skip(self, input), fields(user = %user.id(), org = %org_id))]
    pub fn create_task(
        &self,
        user: &CurrentUser,
        org_id: OrganizationId,
        input: NewTask,
    ) -> ServiceResult<Task> {
        let mut tx = self.store.begin()?;
        let registry = MembershipRegistry::new(&tx);
        let role = registry.require_org(user.id(), org_id, Requirement::Member)?;

        if let Some(team_id) = input.team_id {
            let team = load_team(&tx, team_id)?;
            if team.org_id()? != org_id {
                return Err(DomainError::validation("team does not belong to this organization").into());
            }
        }
        if let Some(event_id) = input.event_id {
            if load_event(&tx, event_id)?.org_id != org_id {
                return Err(DomainError::validation("event does not belong to this organization").into());
            }
        }

        let on_team = match input.team_id {
            Some(team_id) => registry.is_team_member(user.id(), team_id)?,
            None => false,
        };
        if !role.is_admin() && !on_team {
            tracing::warn!("task create denied");
            return Err(DomainError::forbidden(
                "only organization leaders or members of the task's team may create tasks",
            )
            .into());
        }

        let task = Task::create(TaskId::new(), org_id, user.id(), input, Utc::now())?;
        tx.save_task(task.clone())?;
        tx.commit()?;

        tracing::info!(task = %task.id, "task created");
        Ok(task)
    }

    pub fn get_task(&self, user: &CurrentUser, task_id: TaskId) -> ServiceResult<Task> {
        let tx = self.store.begin()?;
        let task = load_task(&tx, task_id)?;
        MembershipRegistry::new(&tx).require_org(user.id(), task.org_id, Requirement::Member)?;
        Ok(task)
    }

    #[tracing::instrument(skip(self, patch), fields(user = %user.id(), task = %task_id))]
    pub fn update_task(&self, user: &CurrentUser, task_id: TaskId, patch: TaskPatch) -> ServiceResult<Task> {
        let mut tx = self.store.begin()?;
        let mut task = load_task(&tx, task_id)?;
        task.update(user.id(), patch, Utc::now())
            .inspect_err(|e| tracing::warn!(reason = %e, "task update rejected"))?;
        tx.save_task(task.clone())?;
        tx.commit()?;

        tracing::info!("task updated");
        Ok(task)
    }

    #[tracing::instrument(skip(self), fields(user = %user.id(), task = %task_id))]
    pub fn delete_task(&self, user: &CurrentUser, task_id: TaskId) -> ServiceResult<()> {
        let mut tx = self.store.begin()?;
        let task = load_task(&tx, task_id)?;
        task.ensure_creator(user.id(), "delete")
            .inspect_err(|e| tracing::warn!(reason = %e, "task delete denied"))?;
        tx.delete_task(task_id)?;
        tx.commit()?;

        tracing::info!("task deleted");
        Ok(())
    }

    /// Assign team members to a task.
    ///
    /// Returns the task and the ids actually assigned; ids outside the task's
    /// team, or already assigned, are left out.
    #[tracing::instrument(skip(self, user_ids), fields(user = %user.id(), task = %task_id, requested = user_ids.len()))]
    pub fn assign_task(
        &self,
        user: &CurrentUser,
        task_id: TaskId,
        user_ids: &[UserId],
    ) -> ServiceResult<(Task, Vec<UserId>)> {
        let mut tx = self.store.begin()?;
        let mut task = load_task(&tx, task_id)?;
        let registry = MembershipRegistry::new(&tx);
        task.ensure_can_manage_assignees(user.id(), registry.role_in_org(user.id(), task.org_id)?)
            .inspect_err(|e| tracing::warn!(reason = %e, "task assignment denied"))?;

        let team = match task.team_id {
            Some(team_id) => Some(load_team(&tx, team_id)?),
            None => None,
        };
        let assigned = task.assign(
            user_ids,
            |id| team.as_ref().is_some_and(|t| t.role_of(id).is_some()),
            Utc::now(),
        )?;
        if assigned.len() < user_ids.len() {
            tracing::info!(skipped = user_ids.len() - assigned.len(), "assignees skipped");
        }
        tx.save_task(task.clone())?;
        tx.commit()?;

        tracing::info!(assigned = assigned.len(), "task assigned");
        Ok((task, assigned))
    }

    /// Returns the task and the ids actually removed.
    #[tracing::instrument(skip(self, user_ids), fields(user = %user.id(), task = %task_id))]
    pub fn unassign_task(
        &self,
        user: &CurrentUser,
        task_id: TaskId,
        user_ids: &[UserId],
    ) -> ServiceResult<(Task, Vec<UserId>)> {
        let mut tx = self.store.begin()?;
        let mut task = load_task(&tx, task_id)?;
        let role = MembershipRegistry::new(&tx).role_in_org(user.id(), task.org_id)?;
        task.ensure_can_manage_assignees(user.id(), role)
            .inspect_err(|e| tracing::warn!(reason = %e, "task unassignment denied"))?;

        let removed = task.unassign(user_ids, Utc::now())?;
        tx.save_task(task.clone())?;
        tx.commit()?;

        tracing::info!(removed = removed.len(), "task unassigned");
        Ok((task, removed))
    }

    pub fn tasks_by_org(&self, user: &CurrentUser, org_id: OrganizationId) -> ServiceResult<Vec<Task>> {
        let tx = self.store.begin()?;
        MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Member)?;
        Ok(tx.tasks_of(org_id)?)
    }

    pub fn tasks_by_team(&self, user: &CurrentUser, team_id: TeamId) -> ServiceResult<Vec<Task>> {
        let tx = self.store.begin()?;
        let org_id = load_team(&tx, team_id)?.org_id()?;
        MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Member)?;
        Ok(tx
            .tasks_of(org_id)?
            .into_iter()
            .filter(|t| t.team_id == Some(team_id))
            .collect())
    }

    pub fn tasks_by_event(&self, user: &CurrentUser, event_id: EventId) -> ServiceResult<Vec<Task>> {
        let tx = self.store.begin()?;
        let org_id = load_event(&tx, event_id)?.org_id;
        MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Member)?;
        Ok(tx
            .tasks_of(org_id)?
            .into_iter()
            .filter(|t| t.event_id == Some(event_id))
            .collect())
    }
}
