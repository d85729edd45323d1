//! Portfolio: public gallery reads and admin curation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    CreatePortfolioItemRequest, PortfolioItem, PortfolioQuery, UpdatePortfolioItemRequest,
};
use crate::AppState;

use super::auth::AdminUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    non_blank, validate_image_url, validate_optional, validate_required, validate_uuid,
};

const MAX_TITLE_LENGTH: usize = 200;
const MAX_CATEGORY_LENGTH: usize = 50;
const MAX_DESCRIPTION_LENGTH: usize = 5000;

fn validate_create_request(req: &CreatePortfolioItemRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("title", validate_required(&req.title, "Title", MAX_TITLE_LENGTH))
        .check(
            "category",
            validate_required(&req.category, "Category", MAX_CATEGORY_LENGTH),
        )
        .check(
            "description",
            validate_optional(&req.description, "Description", MAX_DESCRIPTION_LENGTH),
        )
        .check("imageUrl", validate_image_url(&req.image_url));
    errors.finish()
}

fn validate_update_request(req: &UpdatePortfolioItemRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref title) = req.title {
        errors.check("title", validate_required(title, "Title", MAX_TITLE_LENGTH));
    }
    if let Some(ref category) = req.category {
        errors.check(
            "category",
            validate_required(category, "Category", MAX_CATEGORY_LENGTH),
        );
    }
    errors
        .check(
            "description",
            validate_optional(&req.description, "Description", MAX_DESCRIPTION_LENGTH),
        )
        .check("imageUrl", validate_image_url(&req.image_url));

    errors.finish()
}

fn validate_item_id(id: &str) -> Result<(), ApiError> {
    validate_uuid(id, "portfolio_id").map_err(|e| ApiError::validation_field("portfolio_id", e))
}

async fn fetch_item(state: &AppState, id: &str) -> Result<PortfolioItem, ApiError> {
    sqlx::query_as::<_, PortfolioItem>("SELECT * FROM portfolio_items WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Portfolio item not found"))
}

/// Published items, featured first, optionally narrowed to one category
pub async fn list_published(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PortfolioQuery>,
) -> Result<Json<Vec<PortfolioItem>>, ApiError> {
    let items = match non_blank(query.category) {
        Some(category) => {
            sqlx::query_as::<_, PortfolioItem>(
                r#"
                SELECT * FROM portfolio_items
                WHERE published = 1 AND category = ?
                ORDER BY featured DESC, sort_order ASC, created_at DESC
                "#,
            )
            .bind(category)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, PortfolioItem>(
                r#"
                SELECT * FROM portfolio_items
                WHERE published = 1
                ORDER BY featured DESC, sort_order ASC, created_at DESC
                "#,
            )
            .fetch_all(&state.db)
            .await?
        }
    };

    Ok(Json(items))
}

/// A single published item. Drafts are reported as missing.
pub async fn get_published(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PortfolioItem>, ApiError> {
    validate_item_id(&id)?;

    let item = fetch_item(&state, &id).await?;
    if !item.published {
        return Err(ApiError::not_found("Portfolio item not found"));
    }

    Ok(Json(item))
}

/// Every item including drafts
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<PortfolioItem>>, ApiError> {
    let items = sqlx::query_as::<_, PortfolioItem>(
        "SELECT * FROM portfolio_items ORDER BY sort_order ASC, created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(items))
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreatePortfolioItemRequest>,
) -> Result<(StatusCode, Json<PortfolioItem>), ApiError> {
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO portfolio_items (id, title, description, category, image_url, featured, published, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.title.trim())
    .bind(non_blank(req.description))
    .bind(req.category.trim())
    .bind(non_blank(req.image_url))
    .bind(req.featured)
    .bind(req.published)
    .bind(req.sort_order)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(portfolio_id = %id, admin_id = %admin.id, "Portfolio item created");

    let item = fetch_item(&state, &id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdatePortfolioItemRequest>,
) -> Result<Json<PortfolioItem>, ApiError> {
    validate_item_id(&id)?;
    validate_update_request(&req)?;

    let existing = fetch_item(&state, &id).await?;

    let title = req
        .title
        .map(|t| t.trim().to_string())
        .unwrap_or(existing.title);
    let category = req
        .category
        .map(|c| c.trim().to_string())
        .unwrap_or(existing.category);
    // An explicit empty string clears the optional fields
    let description = match req.description {
        Some(d) => non_blank(Some(d)),
        None => existing.description,
    };
    let image_url = match req.image_url {
        Some(u) => non_blank(Some(u)),
        None => existing.image_url,
    };

    sqlx::query(
        r#"
        UPDATE portfolio_items SET
            title = ?, description = ?, category = ?, image_url = ?,
            featured = ?, published = ?, sort_order = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(&description)
    .bind(&category)
    .bind(&image_url)
    .bind(req.featured.unwrap_or(existing.featured))
    .bind(req.published.unwrap_or(existing.published))
    .bind(req.sort_order.unwrap_or(existing.sort_order))
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    let item = fetch_item(&state, &id).await?;
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_item_id(&id)?;

    let result = sqlx::query("DELETE FROM portfolio_items WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Portfolio item not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
