use axum::Extension;
use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::profiles::UserProfile;

/// GET /api/user/profile (auth required)
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state.gateway.profile(&user.identity())?;
    Ok(Json(profile))
}
