//! Membership registry: role resolution for (user, organization) and
//! (user, team) pairs.
//!
//! Pure reads over the current unit of work. Absence of a membership is not
//! an error here; the `require_*` guards turn it into Forbidden.

use tracing::warn;

use clubhouse_auth::{Requirement, Role, Scope, authorize};
use clubhouse_core::{DomainError, OrganizationId, TeamId, UserId};

use crate::error::ServiceResult;
use crate::store::{StoreResult, Transaction};

pub struct MembershipRegistry<'t, T: Transaction + ?Sized> {
    tx: &'t T,
}

impl<'t, T: Transaction + ?Sized> MembershipRegistry<'t, T> {
    pub fn new(tx: &'t T) -> Self {
        Self { tx }
    }

    // ── organization scope ──────────────────────────────────────────────────

    pub fn role_in_org(&self, user: UserId, org: OrganizationId) -> StoreResult<Option<Role>> {
        Ok(self.tx.organization(org)?.and_then(|o| o.role_of(user)))
    }

    pub fn is_member(&self, user: UserId, org: OrganizationId) -> StoreResult<bool> {
        Ok(self.role_in_org(user, org)?.is_some())
    }

    pub fn is_admin(&self, user: UserId, org: OrganizationId) -> StoreResult<bool> {
        Ok(self.role_in_org(user, org)?.is_some_and(Role::is_admin))
    }

    pub fn is_leader(&self, user: UserId, org: OrganizationId) -> StoreResult<bool> {
        Ok(self.role_in_org(user, org)?.is_some_and(Role::is_leader))
    }

    /// Resolve the caller's organization role and check it against `required`.
    ///
    /// NotFound when the organization does not exist; Forbidden when the
    /// role is absent or insufficient.
    pub fn require_org(
        &self,
        user: UserId,
        org: OrganizationId,
        required: Requirement,
    ) -> ServiceResult<Role> {
        let organization = self
            .tx
            .organization(org)?
            .ok_or_else(|| DomainError::not_found("organization"))?;
        authorize(Scope::Organization, organization.role_of(user), required).map_err(|e| {
            warn!(%user, %org, ?required, reason = %e, "organization access denied");
            e.into()
        })
    }

    // ── team scope ──────────────────────────────────────────────────────────

    pub fn role_in_team(&self, user: UserId, team: TeamId) -> StoreResult<Option<Role>> {
        Ok(self.tx.team(team)?.and_then(|t| t.role_of(user)))
    }

    pub fn is_team_member(&self, user: UserId, team: TeamId) -> StoreResult<bool> {
        Ok(self.role_in_team(user, team)?.is_some())
    }

    pub fn is_team_admin(&self, user: UserId, team: TeamId) -> StoreResult<bool> {
        Ok(self.role_in_team(user, team)?.is_some_and(Role::is_admin))
    }

    pub fn is_team_leader(&self, user: UserId, team: TeamId) -> StoreResult<bool> {
        Ok(self.role_in_team(user, team)?.is_some_and(Role::is_leader))
    }

    pub fn require_team(&self, user: UserId, team: TeamId, required: Requirement) -> ServiceResult<Role> {
        let t = self
            .tx
            .team(team)?
            .ok_or_else(|| DomainError::not_found("team"))?;
        authorize(Scope::Team, t.role_of(user), required).map_err(|e| {
            warn!(%user, %team, ?required, reason = %e, "team access denied");
            e.into()
        })
    }
}
