//! Teams within an organization.
//!
//! Pure domain logic: the Team aggregate decides membership and leadership
//! changes from its own membership table. Organization membership of the
//! people involved is resolved by the caller and passed in on the command.

pub mod team;

pub use team::{
    AddTeamMember, ChangeTeamMemberRole, CreateTeam, LeaveTeam, RemoveTeamMember, SetLeader, Team,
    TeamCommand, TeamEvent, TeamMembership, UpdateTeam,
};
