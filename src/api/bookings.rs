//! Booking requests from the public site and their admin workflow.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{Booking, BookingStatus, CreateBookingRequest, StatusFilter, UpdateStatusRequest};
use crate::{AppState, DbPool};

use super::auth::AdminUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    non_blank, validate_booking_date, validate_email, validate_optional, validate_phone,
    validate_required, validate_time, validate_uuid,
};

fn validate_create_request(req: &CreateBookingRequest) -> Result<(), ApiError> {
    let today = chrono::Utc::now().date_naive();

    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_required(&req.name, "Name", 100))
        .check("email", validate_email(&req.email))
        .check("phone", validate_phone(&req.phone))
        .check("service", validate_required(&req.service, "Service", 100))
        .check(
            "preferredDate",
            validate_booking_date(&req.preferred_date, today),
        )
        .check("preferredTime", validate_time(&req.preferred_time))
        .check("notes", validate_optional(&req.notes, "Notes", 2000));
    errors.finish()
}

async fn fetch_booking(state: &AppState, id: &str) -> Result<Booking, ApiError> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))
}

/// Move a booking to `next` only if it is still in the `expected` status.
/// A concurrent change in between is reported as a conflict.
async fn compare_and_set_status(
    db: &DbPool,
    id: &str,
    expected: &str,
    next: BookingStatus,
) -> Result<(), ApiError> {
    let result = sqlx::query(
        "UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(next.as_str())
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(id)
    .bind(expected)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict(
            "Booking status changed in the meantime; reload and try again",
        ));
    }
    Ok(())
}

/// Submit a booking request
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO bookings (id, name, email, phone, service, preferred_date, preferred_time, notes, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.name.trim())
    .bind(req.email.trim().to_lowercase())
    .bind(non_blank(req.phone))
    .bind(req.service.trim())
    .bind(req.preferred_date.trim())
    .bind(non_blank(req.preferred_time))
    .bind(non_blank(req.notes))
    .bind(BookingStatus::Pending.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(booking_id = %id, "Booking request received");

    let booking = fetch_booking(&state, &id).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

fn parse_status(status: &str) -> Result<BookingStatus, ApiError> {
    status
        .parse::<BookingStatus>()
        .map_err(|e| ApiError::validation_field("status", e))
}

/// List bookings by preferred date, optionally filtered by status
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = match filter.status.as_deref() {
        Some(status) => {
            let status = parse_status(status)?;
            sqlx::query_as::<_, Booking>(
                "SELECT * FROM bookings WHERE status = ? ORDER BY preferred_date ASC, created_at ASC",
            )
            .bind(status.as_str())
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Booking>(
                "SELECT * FROM bookings ORDER BY preferred_date ASC, created_at ASC",
            )
            .fetch_all(&state.db)
            .await?
        }
    };

    Ok(Json(bookings))
}

/// Move a booking through pending -> confirmed -> completed, or cancel it
pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, ApiError> {
    if let Err(e) = validate_uuid(&id, "booking_id") {
        return Err(ApiError::validation_field("booking_id", e));
    }
    let next = parse_status(&req.status)?;

    let booking = fetch_booking(&state, &id).await?;
    let current = booking.status_enum().unwrap_or(BookingStatus::Pending);

    if !current.can_transition_to(next) {
        return Err(ApiError::bad_request(format!(
            "Cannot change a {} booking to {}",
            current, next
        )));
    }

    compare_and_set_status(&state.db, &id, &booking.status, next).await?;

    tracing::info!(booking_id = %id, admin_id = %admin.id, from = %current, to = %next, "Booking status changed");

    let booking = fetch_booking(&state, &id).await?;
    Ok(Json(booking))
}

pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if let Err(e) = validate_uuid(&id, "booking_id") {
        return Err(ApiError::validation_field("booking_id", e));
    }

    let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Booking not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;
    use axum::response::IntoResponse;

    async fn insert_booking(db: &DbPool, status: BookingStatus) -> String {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO bookings (id, name, email, service, preferred_date, status) VALUES (?, 'Ada', 'ada@example.com', 'Portrait', '2030-01-01', ?)",
        )
        .bind(&id)
        .bind(status.as_str())
        .execute(db)
        .await
        .unwrap();
        id
    }

    async fn status_of(db: &DbPool, id: &str) -> String {
        sqlx::query_scalar("SELECT status FROM bookings WHERE id = ?")
            .bind(id)
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_status_update_applies_when_unchanged() {
        let db = init_memory().await.unwrap();
        let id = insert_booking(&db, BookingStatus::Pending).await;

        compare_and_set_status(&db, &id, "pending", BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(status_of(&db, &id).await, "confirmed");
    }

    #[tokio::test]
    async fn test_stale_status_update_cannot_reopen_cancelled_booking() {
        let db = init_memory().await.unwrap();
        // Another admin cancelled it after this one read "pending"
        let id = insert_booking(&db, BookingStatus::Cancelled).await;

        let err = compare_and_set_status(&db, &id, "pending", BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
        assert_eq!(status_of(&db, &id).await, "cancelled");
    }
}
