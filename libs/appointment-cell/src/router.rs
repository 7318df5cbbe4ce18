// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentState;

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // Every appointment operation requires a bearer token
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/doctor", get(handlers::get_doctor_schedule))
        .route("/{appointment_id}", put(handlers::update_appointment))
        .route("/{appointment_id}", delete(handlers::cancel_appointment))
        .route("/{appointment_id}/status", patch(handlers::change_appointment_status))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
