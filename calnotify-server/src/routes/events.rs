//! Event CRUD and window query endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use calnotify_core::window::{EventList, Period};
use calnotify_core::{Event, StoreError};
use chrono::{DateTime, FixedOffset, Local};
use serde::Deserialize;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route(
            "/events/daily",
            get(|state: State<AppState>, query: Query<WindowQuery>| list_window(state, query, Period::Daily)),
        )
        .route(
            "/events/weekly",
            get(|state: State<AppState>, query: Query<WindowQuery>| list_window(state, query, Period::Weekly)),
        )
        .route(
            "/events/monthly",
            get(|state: State<AppState>, query: Query<WindowQuery>| list_window(state, query, Period::Monthly)),
        )
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
}

/// POST /events - Create a new event
async fn create_event(
    State(state): State<AppState>,
    Json(event): Json<Event>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let event = state
        .with_store(move |store| store.insert(&event).map(|()| event))
        .await?;
    tracing::info!(id = %event.id, "event created");
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /events/:id - Fetch a single event
async fn get_event(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Event>, AppError> {
    let event = state
        .with_store(move |store| store.get(&id)?.ok_or(StoreError::NotFound(id)))
        .await?;
    Ok(Json(event))
}

/// PUT /events/:id - Replace (and possibly rename) an event
async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(event): Json<Event>,
) -> Result<Json<Event>, AppError> {
    let (id, event) = state
        .with_store(move |store| store.update(&id, &event).map(|()| (id, event)))
        .await?;
    if id != event.id {
        tracing::info!(from = %id, to = %event.id, "event renamed");
    } else {
        tracing::info!(%id, "event updated");
    }
    Ok(Json(event))
}

/// DELETE /events/:id
async fn delete_event(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    let key = id.clone();
    state.with_store(move |store| store.remove(&key)).await?;
    tracing::info!(%id, "event removed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct WindowQuery {
    /// RFC 3339 reference instant; the offset decides where midnight falls
    at: Option<String>,
}

impl WindowQuery {
    fn reference(&self) -> Result<DateTime<FixedOffset>, AppError> {
        match &self.at {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map_err(|e| AppError::bad_request(format!("Invalid 'at' instant '{raw}': {e}"))),
            None => Ok(Local::now().fixed_offset()),
        }
    }
}

/// GET /events/{daily,weekly,monthly}?at=...
async fn list_window(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
    period: Period,
) -> Result<Json<EventList>, AppError> {
    let at = query.reference()?;
    let window = period.window(&at).map_err(AppError::bad_request)?;
    let events = state.with_store(move |store| period.events(store, &at)).await?;

    Ok(Json(EventList {
        start: window.start,
        end: window.end,
        events,
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes::{ErrorResponse, router};
    use crate::state::AppState;
    use axum::{
        Router,
        body::{Body, Bytes, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use calnotify_core::Event;
    use calnotify_core::store::MemoryEventStore;
    use calnotify_core::window::EventList;
    use chrono::{Duration, TimeZone, Utc};
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(Arc::new(MemoryEventStore::new())))
    }

    fn event(id: &str) -> Event {
        let at = Utc.with_ymd_and_hms(2026, 8, 12, 15, 0, 0).unwrap();
        let mut event = Event::new(id, "Retro", at, Duration::minutes(45));
        event.owner = "frank".to_string();
        event.lead_minutes = 10;
        event
    }

    fn json_request(method: Method, uri: &str, body: &impl serde::Serialize) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, to_bytes(response.into_body(), usize::MAX).await.unwrap())
    }

    fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let app = app();
        let (status, body) = send(&app, json_request(Method::POST, "/events", &event("r1"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(parse::<Event>(&body), event("r1"));

        let (status, body) = send(&app, get("/events/r1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Event>(&body), event("r1"));
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_records() {
        let app = app();
        send(&app, json_request(Method::POST, "/events", &event("r1"))).await;

        let (status, body) = send(&app, json_request(Method::POST, "/events", &event("r1"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(parse::<ErrorResponse>(&body).error.contains("r1"));

        let mut bad = event("r2");
        bad.lead_minutes = -1;
        let (status, _) = send(&app, json_request(Method::POST, "/events", &bad)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_update_rename_and_delete() {
        let app = app();
        send(&app, json_request(Method::POST, "/events", &event("r1"))).await;
        send(&app, json_request(Method::POST, "/events", &event("taken"))).await;

        let (status, _) = send(&app, json_request(Method::PUT, "/events/ghost", &event("ghost"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, json_request(Method::PUT, "/events/r1", &event("taken"))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, json_request(Method::PUT, "/events/r1", &event("r9"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(send(&app, get("/events/r1")).await.0, StatusCode::NOT_FOUND);

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri("/events/r9")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, delete).await.0, StatusCode::NO_CONTENT);

        let delete_again = Request::builder()
            .method(Method::DELETE)
            .uri("/events/r9")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, delete_again).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_window_queries() {
        let app = app();
        send(&app, json_request(Method::POST, "/events", &event("r1"))).await;

        let (status, body) = send(&app, get("/events/daily?at=2026-08-12T08:00:00Z")).await;
        assert_eq!(status, StatusCode::OK);
        let list: EventList = parse(&body);
        assert_eq!(list.start, Utc.with_ymd_and_hms(2026, 8, 12, 0, 0, 0).unwrap());
        assert_eq!(list.end, Utc.with_ymd_and_hms(2026, 8, 13, 0, 0, 0).unwrap());
        assert_eq!(list.events, vec![event("r1")]);

        let (_, body) = send(&app, get("/events/weekly?at=2026-08-13T08:00:00Z")).await;
        assert!(parse::<EventList>(&body).events.is_empty());

        let (_, body) = send(&app, get("/events/monthly?at=2026-07-20T00:00:00%2B02:00")).await;
        assert_eq!(parse::<EventList>(&body).events.len(), 1);

        let (status, _) = send(&app, get("/events/daily?at=yesterday")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<serde_json::Value>(&body)["status"], "ok");
    }
}
