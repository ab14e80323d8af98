use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::shared::AppState;
use crate::{account, invite, room, session, speaking, websockets};

/// Every HTTP and WebSocket route of the server
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/accounts", post(account::register))
        .route("/me", get(account::me))
        .route("/session", post(session::login).delete(session::logout))
        .route("/rooms", get(room::list_rooms).post(room::create_room))
        .route("/rooms/:room_id", get(room::get_room))
        .route("/rooms/:room_id/members", get(room::list_members))
        .route("/rooms/:room_id/join", post(room::join_room))
        .route("/rooms/:room_id/leave", post(room::leave_room))
        .route("/rooms/:room_id/conference", get(room::conference_info))
        .route(
            "/rooms/:room_id/invites",
            get(invite::list_invites).post(invite::create_invite),
        )
        .route(
            "/rooms/:room_id/speaking-requests",
            get(speaking::list_speaking_requests).post(speaking::request_to_speak),
        )
        .route(
            "/rooms/:room_id/members/:account_id/approve",
            post(speaking::approve_speaking),
        )
        .route(
            "/rooms/:room_id/members/:account_id/reject",
            post(speaking::reject_speaking),
        )
        .route(
            "/rooms/:room_id/members/:account_id/revoke",
            post(speaking::revoke_speaking),
        )
        .route(
            "/rooms/:room_id/members/:account_id/mute",
            post(speaking::mute_member),
        )
        .route(
            "/rooms/:room_id/members/:account_id/unmute",
            post(speaking::unmute_member),
        )
        .route("/rooms/:room_id/speaking/start", post(speaking::start_speaking))
        .route("/rooms/:room_id/speaking/stop", post(speaking::stop_speaking))
        .route("/ws/:room_id", get(websockets::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::shared::Stores;
    use crate::telephony::DisabledTelephony;
    use crate::websockets::InMemoryConnectionManager;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    fn app() -> Router {
        let state = AppState::new(
            &AppConfig::default(),
            Stores::in_memory(),
            Arc::new(DisabledTelephony),
            Arc::new(InMemoryConnectionManager::new()),
        );
        build_router(state)
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, username: &str) -> (String, String) {
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/accounts",
                None,
                Some(json!({ "username": username })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        (
            body["token"].as_str().unwrap().to_string(),
            body["account"]["id"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let response = app()
            .oneshot(request(Method::GET, "/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rooms_require_authentication() {
        let response = app()
            .oneshot(request(Method::GET, "/rooms", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app()
            .oneshot(request(Method::GET, "/rooms", Some("not-a-jwt"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_join_and_moderate_over_http() {
        let app = app();
        let (owner_token, _) = register(&app, "owner").await;
        let (guest_token, guest_id) = register(&app, "guest").await;

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/rooms",
                Some(&owner_token),
                Some(json!({ "name": "Weekly sync", "max_participants": 2 })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let room_id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                &format!("/rooms/{}/join", room_id),
                Some(&guest_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["room"]["current_participants"], 2);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                &format!("/rooms/{}/speaking-requests", room_id),
                Some(&guest_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // Guests cannot moderate
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                &format!("/rooms/{}/members/{}/approve", room_id, guest_id),
                Some(&guest_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                &format!("/rooms/{}/members/{}/approve", room_id, guest_id),
                Some(&owner_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let decision = json_body(response).await;
        assert_eq!(decision["request"]["status"], "approved");
        assert_eq!(decision["member"]["can_speak"], true);

        let response = app
            .clone()
            .oneshot(request(
                Method::GET,
                &format!("/rooms/{}/conference", room_id),
                Some(&owner_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found() {
        let app = app();
        let (token, _) = register(&app, "walker").await;

        let response = app
            .oneshot(request(Method::GET, "/rooms/missing", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json_body(response).await["error"].is_string());
    }
}
