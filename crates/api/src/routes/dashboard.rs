//! Admin dashboard.

use axum::{Json, extract::State};

use crate::db::{DashboardStats, StatsRepository};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// `GET /api/dashboard/stats`
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<DashboardStats>> {
    Ok(Json(StatsRepository::new(state.pool()).dashboard().await?))
}
