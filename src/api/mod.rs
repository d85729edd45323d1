mod admin;
pub mod auth;
mod bookings;
mod contact;
pub mod error;
mod portfolio;
pub mod rate_limit;
pub mod validation;


use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Credential endpoints (public, strict limit)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    // Signed-in user
    let session_routes = Router::new()
        .route("/me", get(auth::me).put(auth::update_me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    // Public forms
    let form_routes = Router::new()
        .route("/contact", post(contact::create_contact))
        .route("/bookings", post(bookings::create_booking))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_form,
        ));

    let public_routes = Router::new()
        .route("/portfolio", get(portfolio::list_published))
        .route("/portfolio/:id", get(portfolio::get_published))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    // Admin role checked by the AdminUser extractor in each handler
    let admin_routes = Router::new()
        .route("/stats", get(admin::get_stats))
        // Users
        .route("/users", get(admin::list_users))
        .route("/users/:id", delete(admin::delete_user))
        // Contact messages
        .route("/contacts", get(contact::list_contacts))
        .route("/contacts/:id/status", put(contact::update_contact_status))
        .route("/contacts/:id", delete(contact::delete_contact))
        // Bookings
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/:id/status", put(bookings::update_booking_status))
        .route("/bookings/:id", delete(bookings::delete_booking))
        // Portfolio
        .route("/portfolio", get(portfolio::list_all))
        .route("/portfolio", post(portfolio::create_item))
        .route("/portfolio/:id", put(portfolio::update_item))
        .route("/portfolio/:id", delete(portfolio::delete_item))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes.merge(session_routes))
        .nest("/api/admin", admin_routes)
        .nest("/api", form_routes.merge(public_routes))
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured site origins. An empty list or `*` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health_check() -> &'static str {
    "OK"
}
