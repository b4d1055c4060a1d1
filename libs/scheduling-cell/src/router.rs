// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    // All scheduling operations require authentication
    let protected_routes = Router::new()
        // Availability
        .route(
            "/providers/{provider_id}/slots",
            get(handlers::get_available_slots),
        )
        // Booking and rescheduling
        .route("/", post(handlers::book_appointment))
        .route(
            "/{appointment_id}/reschedule",
            patch(handlers::reschedule_appointment),
        )
        // Lifecycle
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route(
            "/{appointment_id}/confirm",
            post(handlers::confirm_appointment),
        )
        .route(
            "/{appointment_id}/complete",
            post(handlers::complete_appointment),
        )
        // Listings
        .route("/mine", get(handlers::get_my_appointments))
        .route("/upcoming/count", get(handlers::get_upcoming_count))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
