use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clubhouse_core::{DomainError, DomainResult, Entity, EventId, OrganizationId, UserId, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Draft,
    Planned,
    Ongoing,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub const ALL: [EventStatus; 5] = [
        EventStatus::Draft,
        EventStatus::Planned,
        EventStatus::Ongoing,
        EventStatus::Completed,
        EventStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Planned => "planned",
            EventStatus::Ongoing => "ongoing",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for EventStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        EventStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("invalid status: {s}")))
    }
}

/// Input for creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub capacity: Option<u32>,
    pub location: String,
    pub event_type: String,
    pub status: EventStatus,
    pub is_public: bool,
    pub registration_required: bool,
    /// Minor currency units.
    pub entry_fee: i64,
    pub certificate_provided: bool,
}

/// Partial update; `None` keeps the current value.
///
/// `registration_deadline` and `capacity` are doubly optional so they can be
/// cleared: `Some(None)` removes the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub registration_deadline: Option<Option<DateTime<Utc>>>,
    pub capacity: Option<Option<u32>>,
    pub location: Option<String>,
    pub event_type: Option<String>,
    pub status: Option<EventStatus>,
    pub is_public: Option<bool>,
    pub registration_required: Option<bool>,
    pub entry_fee: Option<i64>,
    pub certificate_provided: Option<bool>,
}

/// Search filter; every present criterion must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Case-insensitive exact event type.
    pub event_type: Option<String>,
    pub status: Option<EventStatus>,
}

impl EventQuery {
    pub fn matches(&self, event: &Event) -> bool {
        let title_ok = self.title.as_deref().is_none_or(|t| {
            event
                .title
                .to_lowercase()
                .contains(&t.trim().to_lowercase())
        });
        let type_ok = self
            .event_type
            .as_deref()
            .is_none_or(|t| event.event_type.eq_ignore_ascii_case(t.trim()));
        let status_ok = self.status.is_none_or(|s| event.status == s);
        title_ok && type_ok && status_ok
    }
}

/// An organization event.
///
/// # Invariants
/// - `end_date > start_date`.
/// - `registration_deadline`, when set, is not after `start_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub org_id: OrganizationId,
    pub creator_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub capacity: Option<u32>,
    pub location: String,
    pub event_type: String,
    pub status: EventStatus,
    pub is_public: bool,
    pub registration_required: bool,
    pub entry_fee: i64,
    pub certificate_provided: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Event {
    type Id = EventId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Event {
    pub fn create(
        id: EventId,
        org_id: OrganizationId,
        creator_id: UserId,
        input: NewEvent,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let event = Self {
            id,
            org_id,
            creator_id,
            title: validate::required_text("title", &input.title)?,
            description: validate::optional_text(input.description.as_deref()),
            start_date: input.start_date,
            end_date: input.end_date,
            registration_deadline: input.registration_deadline,
            capacity: input.capacity,
            location: validate::required_text("location", &input.location)?,
            event_type: validate::required_text("event type", &input.event_type)?,
            status: input.status,
            is_public: input.is_public,
            registration_required: input.registration_required,
            entry_fee: input.entry_fee,
            certificate_provided: input.certificate_provided,
            created_at: now,
            updated_at: now,
        };
        event.validate()?;
        Ok(event)
    }

    pub fn is_creator(&self, user_id: UserId) -> bool {
        self.creator_id == user_id
    }

    pub fn ensure_creator(&self, actor: UserId, action: &str) -> DomainResult<()> {
        if !self.is_creator(actor) {
            return Err(DomainError::forbidden(format!(
                "only the event creator may {action} it"
            )));
        }
        Ok(())
    }

    /// Apply a patch as the creator; the schedule rules are re-checked on the
    /// merged result and nothing changes if they fail.
    pub fn update(&mut self, actor: UserId, patch: EventPatch, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_creator(actor, "update")?;

        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = validate::required_text("title", title)?;
        }
        if let Some(description) = patch.description.as_deref() {
            next.description = validate::optional_text(Some(description));
        }
        if let Some(location) = &patch.location {
            next.location = validate::required_text("location", location)?;
        }
        if let Some(event_type) = &patch.event_type {
            next.event_type = validate::required_text("event type", event_type)?;
        }
        next.start_date = patch.start_date.unwrap_or(next.start_date);
        next.end_date = patch.end_date.unwrap_or(next.end_date);
        next.registration_deadline = patch.registration_deadline.unwrap_or(next.registration_deadline);
        next.capacity = patch.capacity.unwrap_or(next.capacity);
        next.status = patch.status.unwrap_or(next.status);
        next.is_public = patch.is_public.unwrap_or(next.is_public);
        next.registration_required = patch.registration_required.unwrap_or(next.registration_required);
        next.entry_fee = patch.entry_fee.unwrap_or(next.entry_fee);
        next.certificate_provided = patch.certificate_provided.unwrap_or(next.certificate_provided);
        next.updated_at = now;

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Public and starting strictly after `now`.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.is_public && self.start_date > now
    }

    fn validate(&self) -> DomainResult<()> {
        if self.end_date <= self.start_date {
            return Err(DomainError::validation("end date must be after start date"));
        }
        if self.registration_deadline.is_some_and(|d| d > self.start_date) {
            return Err(DomainError::validation(
                "registration deadline must not be after the start date",
            ));
        }
        if self.capacity == Some(0) {
            return Err(DomainError::validation("capacity must be positive"));
        }
        if self.entry_fee < 0 {
            return Err(DomainError::validation("entry fee cannot be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn input(start: DateTime<Utc>) -> NewEvent {
        NewEvent {
            title: "Regional Qualifier".to_string(),
            description: None,
            start_date: start,
            end_date: start + Duration::hours(6),
            registration_deadline: Some(start - Duration::days(3)),
            capacity: Some(40),
            location: "Gym B".to_string(),
            event_type: "Competition".to_string(),
            status: EventStatus::Planned,
            is_public: true,
            registration_required: true,
            entry_fee: 1500,
            certificate_provided: false,
        }
    }

    fn event(start: DateTime<Utc>) -> Event {
        Event::create(EventId::new(), OrganizationId::new(), UserId::new(), input(start), Utc::now()).unwrap()
    }

    #[test]
    fn end_must_follow_start() {
        let start = Utc::now();
        let mut bad = input(start);
        bad.end_date = start;
        let err = Event::create(EventId::new(), OrganizationId::new(), UserId::new(), bad, start).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn registration_deadline_not_after_start() {
        let start = Utc::now();
        let mut bad = input(start);
        bad.registration_deadline = Some(start + Duration::minutes(1));
        assert!(Event::create(EventId::new(), OrganizationId::new(), UserId::new(), bad, start).is_err());

        let mut edge = input(start);
        edge.registration_deadline = Some(start);
        assert!(Event::create(EventId::new(), OrganizationId::new(), UserId::new(), edge, start).is_ok());
    }

    #[test]
    fn update_rechecks_dates_and_keeps_state_on_failure() {
        let start = Utc::now() + Duration::days(10);
        let mut e = event(start);
        let creator = e.creator_id;
        let before = e.clone();

        let err = e
            .update(
                creator,
                EventPatch {
                    end_date: Some(start - Duration::hours(1)),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(e, before);

        e.update(
            creator,
            EventPatch {
                title: Some("Finals".to_string()),
                registration_deadline: Some(None),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(e.title, "Finals");
        assert_eq!(e.registration_deadline, None);
    }

    #[test]
    fn only_creator_updates() {
        let mut e = event(Utc::now() + Duration::days(1));
        let err = e.update(UserId::new(), EventPatch::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn upcoming_means_public_and_in_future() {
        let now = Utc::now();
        let mut e = event(now + Duration::days(1));
        assert!(e.is_upcoming(now));
        e.is_public = false;
        assert!(!e.is_upcoming(now));
        assert!(!event(now - Duration::days(1)).is_upcoming(now));
    }

    #[test]
    fn query_matches_all_present_criteria() {
        let e = event(Utc::now());
        let q = EventQuery {
            title: Some("qualifier".to_string()),
            event_type: Some("competition".to_string()),
            status: Some(EventStatus::Planned),
        };
        assert!(q.matches(&e));
        assert!(EventQuery::default().matches(&e));
        let q = EventQuery {
            status: Some(EventStatus::Draft),
            ..Default::default()
        };
        assert!(!q.matches(&e));
    }
}
