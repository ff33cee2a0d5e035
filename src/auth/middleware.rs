use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::AppState;

/// Axum middleware that extracts a Bearer token from the Authorization header,
/// resolves it to an identity through the token verifier, and injects an
/// `AuthUser` into request extensions.
///
/// Every rejection is a 401 and the wrapped handler never runs.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&request)?;

    let identity = state.verifier.verify(&token).await.map_err(|err| {
        tracing::debug!(error = %err, "Bearer token rejected");
        AppError::from(err)
    })?;

    let auth_user = AuthUser::new(identity, token);
    tracing::debug!(
        user_id = %auth_user.user_id,
        "Authenticated request"
    );

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Extract the Bearer token from the Authorization header.
fn extract_bearer_token(request: &Request) -> Result<String, AppError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            AppError::Unauthorized("Authorization header must use Bearer scheme".to_string())
        })?
        .trim();

    if token.is_empty() {
        return Err(AppError::Unauthorized("Empty Bearer token".to_string()));
    }

    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest, StatusCode};
    use axum::middleware;
    use axum::routing::get;
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::Database;
    use crate::identity::{IdentityProvider, MemoryIdentityProvider, SignupMetadata};

    fn test_state() -> (AppState, Arc<MemoryIdentityProvider>) {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let state = AppState::new(
            Arc::new(Config::default()),
            Database::open_in_memory().unwrap(),
            provider.clone(),
        );
        (state, provider)
    }

    async fn issue_token(provider: &MemoryIdentityProvider, email: &str) -> String {
        provider
            .sign_up(
                email,
                "pw123456",
                &SignupMetadata {
                    display_name: "Alice".into(),
                },
            )
            .await
            .unwrap();
        provider
            .sign_in_with_password(email, "pw123456")
            .await
            .unwrap()
            .access_token
    }

    /// Dummy handler that returns the authenticated user's email.
    async fn whoami(request: Request) -> String {
        let user = request.extensions().get::<AuthUser>().unwrap();
        user.email.clone()
    }

    fn auth_router(state: AppState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), require_auth))
            .with_state(state)
    }

    async fn error_message(resp: Response) -> String {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["error"].as_str().unwrap().to_string()
    }

    // -----------------------------------------------------------------------
    // extract_bearer_token
    // -----------------------------------------------------------------------

    #[test]
    fn test_extract_bearer_token_valid() {
        let req = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Bearer psg-abc123")
            .body(Body::empty())
            .unwrap();
        let token = extract_bearer_token(&req).unwrap();
        assert_eq!(token, "psg-abc123");
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        let req = HttpRequest::builder().body(Body::empty()).unwrap();
        let err = extract_bearer_token(&req).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let req = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        let err = extract_bearer_token(&req).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_extract_bearer_token_empty() {
        let req = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Bearer    ")
            .body(Body::empty())
            .unwrap();
        let err = extract_bearer_token(&req).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_extract_bearer_token_trims_whitespace() {
        let req = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Bearer   psg-abc123   ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&req).unwrap(), "psg-abc123");
    }

    // -----------------------------------------------------------------------
    // Full middleware stack
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_missing_auth_header() {
        let (state, _) = test_state();
        let resp = auth_router(state)
            .oneshot(HttpRequest::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(resp).await, "Missing Authorization header");
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let (state, _) = test_state();
        let req = HttpRequest::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, "Bearer psg-nope")
            .body(Body::empty())
            .unwrap();

        let resp = auth_router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token() {
        let (state, provider) = test_state();
        let token = issue_token(&provider, "alice@x.com").await;

        let req = HttpRequest::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let resp = auth_router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(body.to_vec()).unwrap(), "alice@x.com");
    }

    #[tokio::test]
    async fn test_revoked_token_rejected_without_cache() {
        let (state, provider) = test_state();
        let token = issue_token(&provider, "alice@x.com").await;
        let app = auth_router(state);

        let request = || {
            HttpRequest::builder()
                .uri("/whoami")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap()
        };

        let resp = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        provider.revoke_all_sessions();
        let resp = app.oneshot(request()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
