//! Admin dashboard: counters and account management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{DashboardStats, User, UserResponse};
use crate::AppState;

use super::auth::AdminUser;
use super::error::ApiError;
use super::validation::validate_uuid;

async fn count(state: &AppState, sql: &str) -> Result<i64, ApiError> {
    let (n,): (i64,) = sqlx::query_as(sql).fetch_one(&state.db).await?;
    Ok(n)
}

/// Dashboard counters
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<DashboardStats>, ApiError> {
    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();

    let (bookings_upcoming,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM bookings
        WHERE status IN ('pending', 'confirmed') AND preferred_date >= ?
        "#,
    )
    .bind(&today)
    .fetch_one(&state.db)
    .await?;

    let stats = DashboardStats {
        users: count(&state, "SELECT COUNT(*) FROM users").await?,
        admins: count(&state, "SELECT COUNT(*) FROM users WHERE role = 'admin'").await?,
        contacts_total: count(&state, "SELECT COUNT(*) FROM contact_messages").await?,
        contacts_new: count(
            &state,
            "SELECT COUNT(*) FROM contact_messages WHERE status = 'new'",
        )
        .await?,
        bookings_total: count(&state, "SELECT COUNT(*) FROM bookings").await?,
        bookings_pending: count(&state, "SELECT COUNT(*) FROM bookings WHERE status = 'pending'")
            .await?,
        bookings_confirmed: count(
            &state,
            "SELECT COUNT(*) FROM bookings WHERE status = 'confirmed'",
        )
        .await?,
        bookings_upcoming,
        portfolio_items: count(&state, "SELECT COUNT(*) FROM portfolio_items").await?,
        portfolio_published: count(
            &state,
            "SELECT COUNT(*) FROM portfolio_items WHERE published = 1",
        )
        .await?,
    };

    Ok(Json(stats))
}

/// List all accounts, newest first
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Delete an account. Admins cannot delete themselves.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    if id == admin.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id = %id, admin_id = %admin.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
