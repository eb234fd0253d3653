use core::str::FromStr;

use serde::{Deserialize, Serialize};

use clubhouse_core::DomainError;

/// Privilege tier of a membership, shared by organization and team scope.
///
/// Ordering is by [`Role::rank`]: LEADER > COLEADER > {MEMBER, VOLUNTEER}.
/// MEMBER and VOLUNTEER carry the same privilege, so `Role` deliberately does
/// not implement `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Leader,
    #[serde(rename = "coleader")]
    CoLeader,
    Member,
    Volunteer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Leader, Role::CoLeader, Role::Member, Role::Volunteer];

    /// Numeric privilege tier.
    pub fn rank(self) -> u8 {
        match self {
            Role::Leader => 3,
            Role::CoLeader => 2,
            Role::Member | Role::Volunteer => 1,
        }
    }

    /// LEADER or COLEADER.
    pub fn is_admin(self) -> bool {
        self.rank() >= Role::CoLeader.rank()
    }

    pub fn is_leader(self) -> bool {
        self == Role::Leader
    }

    /// Strictly more privileged than `other`.
    pub fn outranks(self, other: Role) -> bool {
        self.rank() > other.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Leader => "leader",
            Role::CoLeader => "coleader",
            Role::Member => "member",
            Role::Volunteer => "volunteer",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leader" => Ok(Role::Leader),
            "coleader" | "co-leader" | "co_leader" => Ok(Role::CoLeader),
            "member" => Ok(Role::Member),
            "volunteer" => Ok(Role::Volunteer),
            _ => Err(DomainError::validation(
                "invalid role; valid roles: leader, coleader, member, volunteer",
            )),
        }
    }
}
