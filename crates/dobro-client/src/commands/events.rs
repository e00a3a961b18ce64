//! Event browsing and volunteer registration.

use serde::Serialize;
use tracing::info;

use dobro_shared::models::Event;
use dobro_shared::protocol::{
    Action, EventListPayload, RegistrationPayload, Request, Topic, VolunteerCountPayload,
};
use dobro_shared::types::{EventId, UserId};

use crate::error::{ClientError, Result};
use crate::state::AppState;

use super::concerns_event;

#[derive(Serialize)]
struct UpcomingEventsData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
}

#[derive(Serialize)]
struct RegistrationData<'a> {
    event_id: &'a EventId,
    user_id: &'a UserId,
}

#[derive(Serialize)]
struct CountData<'a> {
    event_id: &'a EventId,
}

/// Fetch upcoming events, optionally capped and filtered by category.
///
/// The reply is merged into the event cache and returned as-is (backend
/// ordering is preserved).
pub async fn get_upcoming_events(
    state: &AppState,
    limit: Option<u32>,
    category: Option<&str>,
) -> Result<Vec<Event>> {
    let request = if limit.is_none() && category.is_none() {
        Request::new(Topic::EventRequests, Action::GetUpcomingEvents)
    } else {
        Request::with_data(
            Topic::EventRequests,
            Action::GetUpcomingEvents,
            UpcomingEventsData { limit, category },
        )?
    };

    let reply = state.request(request).await?;
    let payload: EventListPayload = reply.decode()?;
    state.events.merge_all(payload.events.clone());
    Ok(payload.events)
}

/// Register the current user as a volunteer for `event_id`.
pub async fn register_volunteer(state: &AppState, event_id: &EventId) -> Result<()> {
    let user_id = state
        .session
        .current_user_id()
        .ok_or(ClientError::NotAuthenticated)?;

    let request = Request::with_data(
        Topic::EventRequests,
        Action::RegisterVolunteer,
        RegistrationData {
            event_id,
            user_id: &user_id,
        },
    )?;
    let reply = state
        .request_where(request, |r| concerns_event(r, event_id))
        .await?;

    let payload: RegistrationPayload = reply.decode()?;
    match payload.event {
        // Some backend paths echo the whole updated event
        Some(event) => state.events.merge(event),
        None => {
            let target = payload.target_event().unwrap_or(event_id);
            let joined = payload.user_id.as_ref().unwrap_or(&user_id);
            state.events.apply_registration(target, joined);
        }
    }
    info!(event_id = %event_id, "registered as volunteer");
    Ok(())
}

/// Withdraw the current user from `event_id`.
pub async fn unregister_volunteer(state: &AppState, event_id: &EventId) -> Result<()> {
    let user_id = state
        .session
        .current_user_id()
        .ok_or(ClientError::NotAuthenticated)?;

    let request = Request::with_data(
        Topic::EventRequests,
        Action::UnregisterVolunteer,
        RegistrationData {
            event_id,
            user_id: &user_id,
        },
    )?;
    let reply = state
        .request_where(request, |r| concerns_event(r, event_id))
        .await?;

    let payload: RegistrationPayload = reply.decode()?;
    match payload.event {
        Some(event) => state.events.merge(event),
        None => {
            let target = payload.target_event().unwrap_or(event_id);
            let left = payload.user_id.as_ref().unwrap_or(&user_id);
            state.events.apply_unregistration(target, left);
        }
    }
    info!(event_id = %event_id, "unregistered from event");
    Ok(())
}

/// Ask the backend how many volunteers an event currently has.
///
/// The cache derives the same figure from the volunteer list; this is the
/// authoritative server-side count for places that show it verbatim.
pub async fn volunteer_count(state: &AppState, event_id: &EventId) -> Result<u32> {
    let request = Request::with_data(
        Topic::EventRequests,
        Action::VolunteerCount,
        CountData { event_id },
    )?;
    let reply = state
        .request_where(request, |r| concerns_event(r, event_id))
        .await?;
    let payload: VolunteerCountPayload = reply.decode()?;
    Ok(payload.count)
}
