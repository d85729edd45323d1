//! Contact form endpoints: public submission and admin inbox management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    ContactMessage, ContactStatus, CreateContactRequest, StatusFilter, UpdateStatusRequest,
};
use crate::AppState;

use super::auth::AdminUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    non_blank, validate_email, validate_optional, validate_phone, validate_required,
    validate_uuid,
};

fn validate_create_request(req: &CreateContactRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_required(&req.name, "Name", 100))
        .check("email", validate_email(&req.email))
        .check("phone", validate_phone(&req.phone))
        .check("subject", validate_optional(&req.subject, "Subject", 200))
        .check("message", validate_required(&req.message, "Message", 5000));
    errors.finish()
}

/// Submit the public contact form
pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<ContactMessage>), ApiError> {
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO contact_messages (id, name, email, phone, subject, message, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.name.trim())
    .bind(req.email.trim().to_lowercase())
    .bind(non_blank(req.phone))
    .bind(non_blank(req.subject))
    .bind(req.message.trim())
    .bind(ContactStatus::New.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(contact_id = %id, "Contact message received");

    let message = sqlx::query_as::<_, ContactMessage>("SELECT * FROM contact_messages WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

fn parse_status(status: &str) -> Result<ContactStatus, ApiError> {
    status
        .parse::<ContactStatus>()
        .map_err(|e| ApiError::validation_field("status", e))
}

/// List contact messages, newest first
pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<ContactMessage>>, ApiError> {
    let messages = match filter.status.as_deref() {
        Some(status) => {
            let status = parse_status(status)?;
            sqlx::query_as::<_, ContactMessage>(
                "SELECT * FROM contact_messages WHERE status = ? ORDER BY created_at DESC",
            )
            .bind(status.as_str())
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, ContactMessage>(
                "SELECT * FROM contact_messages ORDER BY created_at DESC",
            )
            .fetch_all(&state.db)
            .await?
        }
    };

    Ok(Json(messages))
}

/// Mark a message read, replied or archived
pub async fn update_contact_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ContactMessage>, ApiError> {
    if let Err(e) = validate_uuid(&id, "contact_id") {
        return Err(ApiError::validation_field("contact_id", e));
    }
    let status = parse_status(&req.status)?;

    let result = sqlx::query("UPDATE contact_messages SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Contact message not found"));
    }

    let message = sqlx::query_as::<_, ContactMessage>("SELECT * FROM contact_messages WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(message))
}

pub async fn delete_contact(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if let Err(e) = validate_uuid(&id, "contact_id") {
        return Err(ApiError::validation_field("contact_id", e));
    }

    let result = sqlx::query("DELETE FROM contact_messages WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Contact message not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
