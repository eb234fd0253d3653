use serde::Serialize;
use thiserror::Error;

use clubhouse_core::DomainError;

use crate::Role;

/// Which membership table a role was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Organization,
    Team,
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Scope::Organization => f.write_str("organization"),
            Scope::Team => f.write_str("team"),
        }
    }
}

/// Minimum standing an operation needs within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    /// Any role.
    Member,
    /// LEADER or COLEADER.
    Admin,
    /// LEADER only.
    Leader,
}

impl Requirement {
    fn min_rank(self) -> u8 {
        match self {
            Requirement::Member => Role::Member.rank(),
            Requirement::Admin => Role::CoLeader.rank(),
            Requirement::Leader => Role::Leader.rank(),
        }
    }

    pub fn is_satisfied_by(self, role: Role) -> bool {
        role.rank() >= self.min_rank()
    }

    fn describe(self) -> &'static str {
        match self {
            Requirement::Member => "members",
            Requirement::Admin => "leaders and co-leaders",
            Requirement::Leader => "leaders",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not a member of this {scope}")]
    NotMember { scope: Scope },

    #[error("only {} of this {scope} may do this (current role: {held})", .required.describe())]
    InsufficientRole {
        scope: Scope,
        required: Requirement,
        held: Role,
    },
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::forbidden(value.to_string())
    }
}

/// The single authorization predicate.
///
/// Every role-gated operation, at organization or team scope, goes through
/// this function with the role resolved from the matching membership table.
///
/// - No IO
/// - No panics
/// - Absence of a membership is a denial, not an error in the lookup
pub fn authorize(scope: Scope, role: Option<Role>, required: Requirement) -> Result<Role, AuthzError> {
    let held = role.ok_or(AuthzError::NotMember { scope })?;
    if required.is_satisfied_by(held) {
        Ok(held)
    } else {
        Err(AuthzError::InsufficientRole {
            scope,
            required,
            held,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_membership_is_not_member() {
        let err = authorize(Scope::Team, None, Requirement::Member).unwrap_err();
        assert_eq!(err, AuthzError::NotMember { scope: Scope::Team });
    }

    #[test]
    fn admin_requirement_accepts_leader_and_coleader_only() {
        for role in Role::ALL {
            let granted = authorize(Scope::Organization, Some(role), Requirement::Admin).is_ok();
            assert_eq!(granted, matches!(role, Role::Leader | Role::CoLeader), "{role}");
        }
    }

    #[test]
    fn leader_requirement_rejects_coleader_with_reason() {
        let err = authorize(Scope::Organization, Some(Role::CoLeader), Requirement::Leader).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("only leaders"));
        assert!(msg.contains("coleader"));
    }

    #[test]
    fn volunteer_counts_as_member() {
        assert_eq!(
            authorize(Scope::Team, Some(Role::Volunteer), Requirement::Member),
            Ok(Role::Volunteer)
        );
    }

    #[test]
    fn converts_to_forbidden_domain_error() {
        let err: DomainError = AuthzError::NotMember { scope: Scope::Organization }.into();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }
}
