use std::sync::Arc;

use chrono::{DateTime, Utc};

use clubhouse_auth::{CurrentUser, Requirement};
use clubhouse_core::{EventId, OrganizationId};
use clubhouse_events::{Event, EventPatch, EventQuery, NewEvent};

use super::{load_event, load_org};
use crate::error::ServiceResult;
use crate::registry::MembershipRegistry;
use crate::store::{Store, Transaction};

/// Organization events.
pub struct EventService<S> {
    store: Arc<S>,
}

impl<S: Store> EventService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, input), fields(user = %user.id(), org = %org_id))]
    pub fn create_event(&self, user: &CurrentUser, org_id: OrganizationId, input: NewEvent) -> ServiceResult<Event> {
        let mut tx = self.store.begin()?;
        MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Admin)?;

        let event = Event::create(EventId::new(), org_id, user.id(), input, Utc::now())?;
        tx.save_event(event.clone())?;
        tx.commit()?;

        tracing::info!(event = %event.id, "event created");
        Ok(event)
    }

    pub fn get_event(&self, user: &CurrentUser, event_id: EventId) -> ServiceResult<Event> {
        let tx = self.store.begin()?;
        let event = load_event(&tx, event_id)?;
        MembershipRegistry::new(&tx).require_org(user.id(), event.org_id, Requirement::Member)?;
        Ok(event)
    }

    /// Events of an organization, soonest first.
    pub fn list_events(&self, user: &CurrentUser, org_id: OrganizationId) -> ServiceResult<Vec<Event>> {
        let tx = self.store.begin()?;
        MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Member)?;
        let mut events = tx.events_of(org_id)?;
        events.sort_by_key(|e| e.start_date);
        Ok(events)
    }

    #[tracing::instrument(skip(self, patch), fields(user = %user.id(), event = %event_id))]
    pub fn update_event(&self, user: &CurrentUser, event_id: EventId, patch: EventPatch) -> ServiceResult<Event> {
        let mut tx = self.store.begin()?;
        let mut event = load_event(&tx, event_id)?;
        event
            .update(user.id(), patch, Utc::now())
            .inspect_err(|e| tracing::warn!(reason = %e, "event update rejected"))?;
        tx.save_event(event.clone())?;
        tx.commit()?;

        tracing::info!("event updated");
        Ok(event)
    }

    /// Creator only; tasks attached to the event go with it.
    #[tracing::instrument(skip(self), fields(user = %user.id(), event = %event_id))]
    pub fn delete_event(&self, user: &CurrentUser, event_id: EventId) -> ServiceResult<()> {
        let mut tx = self.store.begin()?;
        let event = load_event(&tx, event_id)?;
        event
            .ensure_creator(user.id(), "delete")
            .inspect_err(|e| tracing::warn!(reason = %e, "event delete denied"))?;
        tx.delete_event(event_id)?;
        tx.commit()?;

        tracing::info!("event deleted");
        Ok(())
    }

    /// Public events starting after `now`, soonest first. Open to anyone.
    pub fn upcoming_events(&self, org_id: OrganizationId, now: DateTime<Utc>) -> ServiceResult<Vec<Event>> {
        let tx = self.store.begin()?;
        load_org(&tx, org_id)?;
        let mut events: Vec<Event> = tx
            .events_of(org_id)?
            .into_iter()
            .filter(|e| e.is_upcoming(now))
            .collect();
        events.sort_by_key(|e| e.start_date);
        Ok(events)
    }

    /// Matching events that are public or belong to one of the caller's
    /// organizations.
    pub fn search_events(&self, user: &CurrentUser, query: &EventQuery) -> ServiceResult<Vec<Event>> {
        let tx = self.store.begin()?;
        let registry = MembershipRegistry::new(&tx);
        let mut found = Vec::new();
        for event in tx.all_events()? {
            if query.matches(&event) && (event.is_public || registry.is_member(user.id(), event.org_id)?) {
                found.push(event);
            }
        }
        found.sort_by_key(|e| e.start_date);
        Ok(found)
    }
}
