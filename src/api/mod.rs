pub mod auth;
pub mod status;
pub mod types;
pub mod user;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::AppState;
use crate::auth::middleware::require_auth;

/// Build the API router.
///
/// Route layout:
/// ```text
/// /api/status             GET    (no auth)
/// /api/auth/login         POST   (no auth)
/// /api/auth/signup        POST   (no auth)
/// /api/auth/logout        POST   (bearer)
/// /api/user/profile       GET    (bearer)
/// ```
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/user/profile", get(user::get_profile))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/api/status", get(status::status))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/signup", post(auth::signup))
        .merge(protected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::{Config, ProfileInsertPolicy};
    use crate::db::Database;
    use crate::identity::MemoryIdentityProvider;

    struct TestApp {
        router: Router,
        provider: Arc<MemoryIdentityProvider>,
        db: Database,
    }

    fn test_app_with(config: Config) -> TestApp {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let db = Database::open_in_memory().unwrap();
        let state = AppState::new(Arc::new(config), db.clone(), provider.clone());
        TestApp {
            router: build_api_router(state.clone()).with_state(state),
            provider,
            db,
        }
    }

    fn test_app() -> TestApp {
        test_app_with(Config::default())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn with_bearer(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        (status, body_json(resp).await)
    }

    async fn signup_and_login(app: &TestApp) -> String {
        let (status, _) = send(
            app,
            post_json(
                "/api/auth/signup",
                json!({"email": "new@x.com", "password": "pw123456", "name": "Jane"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            app,
            post_json(
                "/api/auth/login",
                json!({"email": "new@x.com", "password": "pw123456"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_status() {
        let app = test_app();
        let req = Request::builder().uri("/api/status").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "API is running"}));
    }

    #[tokio::test]
    async fn test_login_empty_fields() {
        let app = test_app();
        let (status, body) = send(
            &app,
            post_json("/api/auth/login", json!({"email": "", "password": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Email and password are required"}));
        assert_eq!(app.provider.session_count(), 0);
    }

    #[tokio::test]
    async fn test_login_malformed_body_is_missing_fields() {
        let app = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email and password are required");
    }

    #[tokio::test]
    async fn test_signup_login_profile_scenario() {
        let app = test_app();

        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/signup",
                json!({"email": "new@x.com", "password": "pw123456", "name": "Jane"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Signup successful.");
        assert_eq!(body["user"]["email"], "new@x.com");
        assert!(body.get("token").is_none());
        let id = body["user"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/login",
                json!({"email": "new@x.com", "password": "pw123456"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["user"]["id"], id.as_str());
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = send(&app, with_bearer("GET", "/api/user/profile", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"id": id, "display_name": "Jane", "username": "Jane", "email": "new@x.com"})
        );
    }

    #[tokio::test]
    async fn test_profile_is_stable_across_reads() {
        let app = test_app();
        let token = signup_and_login(&app).await;

        let first = app
            .router
            .clone()
            .oneshot(with_bearer("GET", "/api/user/profile", &token))
            .await
            .unwrap();
        let second = app
            .router
            .clone()
            .oneshot(with_bearer("GET", "/api/user/profile", &token))
            .await
            .unwrap();
        let a = axum::body::to_bytes(first.into_body(), usize::MAX).await.unwrap();
        let b = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_wrong_password_is_401_without_token() {
        let app = test_app();
        signup_and_login(&app).await;

        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/login",
                json!({"email": "new@x.com", "password": "wrong-password"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("token").is_none());
        assert_eq!(body["error"], "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_signup_missing_name() {
        let app = test_app();
        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/signup",
                json!({"email": "a@x.com", "password": "pw123456"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Name, email and password are required");
    }

    #[tokio::test]
    async fn test_duplicate_signup_is_400() {
        let app = test_app();
        signup_and_login(&app).await;
        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/signup",
                json!({"email": "new@x.com", "password": "pw123456", "name": "Other"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User already registered");
    }

    #[tokio::test]
    async fn test_logout_then_token_rejected() {
        let app = test_app();
        let token = signup_and_login(&app).await;

        let (status, body) = send(&app, with_bearer("POST", "/api/auth/logout", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Logout successful"}));

        let (status, _) = send(&app, with_bearer("GET", "/api/user/profile", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_routes_require_bearer() {
        let app = test_app();
        for (method, uri) in [("POST", "/api/auth/logout"), ("GET", "/api/user/profile")] {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(&app, req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_profile_missing_row_is_404() {
        let app = test_app();
        let token = signup_and_login(&app).await;
        app.db
            .with_conn(|conn| conn.execute("DELETE FROM profiles", []))
            .unwrap();

        let (status, body) = send(&app, with_bearer("GET", "/api/user/profile", &token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Profile not found.");
    }

    #[tokio::test]
    async fn test_login_without_profile_is_500() {
        let app = test_app();
        signup_and_login(&app).await;
        app.db
            .with_conn(|conn| conn.execute("DELETE FROM profiles", []))
            .unwrap();

        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/login",
                json!({"email": "new@x.com", "password": "pw123456"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "User authenticated, but failed to fetch user profile."
        );
    }

    #[tokio::test]
    async fn test_degraded_policy_reports_warning() {
        let mut config = Config::default();
        config.signup.profile_insert_policy = ProfileInsertPolicy::Degraded;
        let app = test_app_with(config);
        app.db
            .with_conn(|conn| conn.execute_batch("DROP TABLE profiles"))
            .unwrap();

        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/signup",
                json!({"email": "d@x.com", "password": "pw123456", "name": "D"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["warning"].is_string());
    }

    #[tokio::test]
    async fn test_log_policy_hides_insert_failure() {
        let app = test_app();
        app.db
            .with_conn(|conn| conn.execute_batch("DROP TABLE profiles"))
            .unwrap();

        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/signup",
                json!({"email": "l@x.com", "password": "pw123456", "name": "L"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.get("warning").is_none());
    }
}
