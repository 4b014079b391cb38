//! Event collector endpoint.
//!
//! Clients post a batch of events for their session. Each event is bound to
//! the session's profile and handed to the [`EventService`]; the response says
//! whether any of them changed the profile.
//!
//! Requests that cannot be tied to a real profile (no session id, unknown
//! session, session without profile, unknown profile, persona, no payload) are
//! answered with an empty `200`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use super::logs::log_info;
use super::server::AppState;
use super::types::{error_response, CollectorResponse};
use crate::models::{Event, EventsCollectorRequest, Profile, Session};

/// Session and profile lookup.
pub trait ProfileService: Send + Sync {
    fn load_session(&self, session_id: &str, timestamp: DateTime<Utc>) -> Option<Session>;
    fn load(&self, profile_id: &str) -> Option<Profile>;
}

/// Event processing. Returns whether the event changed the profile.
pub trait EventService: Send + Sync {
    fn send(&self, event: Event) -> bool;
}

/// Sessions and profiles kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryProfiles {
    sessions: RwLock<HashMap<String, Session>>,
    profiles: RwLock<HashMap<String, Profile>>,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session(&self, session: Session) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session.item_id.clone(), session);
    }

    pub fn add_profile(&self, profile: Profile) {
        let mut profiles = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        profiles.insert(profile.item_id.clone(), profile);
    }

    /// Merge properties into a stored profile. Returns whether anything changed.
    pub fn merge_properties(&self, profile_id: &str, properties: &Map<String, Value>) -> bool {
        let mut profiles = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        let Some(profile) = profiles.get_mut(profile_id) else {
            return false;
        };

        let mut changed = false;
        for (key, value) in properties {
            if profile.properties.get(key) != Some(value) {
                profile.properties.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }
}

impl ProfileService for InMemoryProfiles {
    fn load_session(&self, session_id: &str, _timestamp: DateTime<Utc>) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(session_id).cloned()
    }

    fn load(&self, profile_id: &str) -> Option<Profile> {
        let profiles = self.profiles.read().unwrap_or_else(|e| e.into_inner());
        profiles.get(profile_id).cloned()
    }
}

/// Records events and applies their properties to the in-memory profile.
#[derive(Debug)]
pub struct InMemoryEvents {
    profiles: Arc<InMemoryProfiles>,
    received: Mutex<Vec<Event>>,
}

impl InMemoryEvents {
    pub fn new(profiles: Arc<InMemoryProfiles>) -> Self {
        Self {
            profiles,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<Event> {
        self.received.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl EventService for InMemoryEvents {
    fn send(&self, event: Event) -> bool {
        let changed = self.profiles.merge_properties(&event.profile_id, &event.properties);
        self.received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        changed
    }
}

/// Query parameters of the collector.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorParams {
    pub session_id: Option<String>,
    /// Milliseconds since the epoch; defaults to now.
    pub timestamp: Option<i64>,
    /// JSON payload for GET requests.
    pub payload: Option<String>,
}

type CollectorRejection = (StatusCode, Json<Value>);

fn bad_request(message: &str) -> CollectorRejection {
    (StatusCode::BAD_REQUEST, Json(error_response(message)))
}

/// `GET|POST /eventcollector`
pub async fn collect_events(
    State(state): State<AppState>,
    Query(params): Query<CollectorParams>,
    body: String,
) -> Result<Response, CollectorRejection> {
    let timestamp = match params.timestamp {
        Some(ms) => DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or_else(|| bad_request(&format!("Invalid timestamp: {}", ms)))?,
        None => Utc::now(),
    };

    let Some(session_id) = params.session_id else {
        return Ok(StatusCode::OK.into_response());
    };
    let Some(session) = state.profiles.load_session(&session_id, timestamp) else {
        return Ok(StatusCode::OK.into_response());
    };
    let Some(profile_id) = session.profile_id.as_deref() else {
        return Ok(StatusCode::OK.into_response());
    };
    let profile = match state.profiles.load(profile_id) {
        Some(profile) if !profile.persona => profile,
        _ => return Ok(StatusCode::OK.into_response()),
    };

    let payload = if body.trim().is_empty() { params.payload } else { Some(body) };
    let Some(payload) = payload else {
        return Ok(StatusCode::OK.into_response());
    };

    let request: EventsCollectorRequest = serde_json::from_str(&payload)
        .map_err(|e| bad_request(&format!("Invalid events payload: {}", e)))?;
    let Some(events) = request.events else {
        return Ok(StatusCode::OK.into_response());
    };

    let mut changed = false;
    for mut incoming in events {
        let Some(event_type) = incoming.event_type.take() else {
            continue;
        };
        let event = Event::bind(incoming, event_type, &session, &profile, timestamp);
        log_info(format!(
            "Received event {} for profile={} session={} timestamp={}",
            event.event_type, profile.item_id, session.item_id, timestamp
        ));
        changed = state.events.send(event) || changed;
    }

    Ok(Json(CollectorResponse { updated: changed }).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConfigRegistry;
    use crate::schema::InMemoryPropertyTypes;

    fn setup() -> (AppState, Arc<InMemoryProfiles>, Arc<InMemoryEvents>) {
        let profiles = Arc::new(InMemoryProfiles::new());
        profiles.add_profile(Profile::new("p1"));
        let mut persona = Profile::new("persona");
        persona.persona = true;
        profiles.add_profile(persona);
        profiles.add_session(Session {
            item_id: "s1".into(),
            profile_id: Some("p1".into()),
            timestamp: Utc::now(),
        });
        profiles.add_session(Session {
            item_id: "s-persona".into(),
            profile_id: Some("persona".into()),
            timestamp: Utc::now(),
        });

        let events = Arc::new(InMemoryEvents::new(profiles.clone()));
        let state = AppState {
            profiles: profiles.clone(),
            events: events.clone(),
            property_types: Arc::new(InMemoryPropertyTypes::default()),
            registry: Arc::new(Mutex::new(ConfigRegistry::with_dir(
                std::env::temp_dir().join("profile-router-collector-tests"),
            ))),
        };
        (state, profiles, events)
    }

    fn params(session_id: Option<&str>) -> CollectorParams {
        CollectorParams {
            session_id: session_id.map(str::to_string),
            timestamp: Some(1_700_000_000_000),
            payload: None,
        }
    }

    async fn body_of(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_events_update_profile() {
        let (state, profiles, events) = setup();
        let body = r#"{"events":[
            {"eventType":"updateProperties","scope":"site","properties":{"city":"Paris"}},
            {"scope":"site"},
            {"eventType":"view","properties":{}}
        ]}"#;

        let response = collect_events(State(state), Query(params(Some("s1"))), body.to_string())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let parsed: CollectorResponse = serde_json::from_slice(&body_of(response).await).unwrap();
        assert!(parsed.updated);

        let received = events.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].session_id, "s1");
        assert_eq!(received[0].profile_id, "p1");
        assert_eq!(received[0].timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(profiles.load("p1").unwrap().properties["city"], "Paris");
    }

    #[tokio::test]
    async fn test_unchanged_profile_reports_not_updated() {
        let (state, _, _) = setup();
        let body = r#"{"events":[{"eventType":"view"}]}"#;

        let response = collect_events(State(state), Query(params(Some("s1"))), body.to_string())
            .await
            .unwrap();
        let parsed: CollectorResponse = serde_json::from_slice(&body_of(response).await).unwrap();
        assert!(!parsed.updated);
    }

    #[tokio::test]
    async fn test_requests_without_profile_get_empty_response() {
        let body = r#"{"events":[{"eventType":"view"}]}"#.to_string();

        for session in [None, Some("unknown"), Some("s-persona")] {
            let (state, _, events) = setup();
            let response = collect_events(State(state), Query(params(session)), body.clone())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_of(response).await.is_empty());
            assert!(events.received().is_empty());
        }
    }

    #[tokio::test]
    async fn test_get_payload_parameter() {
        let (state, _, events) = setup();
        let mut query = params(Some("s1"));
        query.payload = Some(r#"{"events":[{"eventType":"view"}]}"#.into());

        collect_events(State(state), Query(query), String::new())
            .await
            .unwrap();
        assert_eq!(events.received().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let (state, _, _) = setup();
        let err = collect_events(State(state), Query(params(Some("s1"))), "{not json".into())
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
