// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, NaiveDateTime};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_models::auth::{Identity, User};
use shared_models::error::AppError;

use crate::models::{AppointmentError, AppointmentUpdate, NewAppointment};
use crate::state::AppointmentState;

// ==============================================================================
// REQUEST BODIES AND QUERY PARAMETERS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appointment_time: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct DoctorScheduleQuery {
    pub date: NaiveDate,
    pub patient_name: Option<String>,
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        let message = error.to_string();
        match error {
            AppointmentError::NotFound => AppError::NotFound(message),
            AppointmentError::InvalidRequest(_)
            | AppointmentError::UnknownDoctor
            | AppointmentError::OutsideWorkingHours => AppError::BadRequest(message),
            AppointmentError::SlotConflict => AppError::Conflict(message),
            AppointmentError::NotOwner => AppError::Forbidden(message),
            AppointmentError::InvalidToken(_) => AppError::Auth(message),
            AppointmentError::StorageError(_) => AppError::Database(message),
        }
    }
}

// ==============================================================================
// HANDLERS
// ==============================================================================

/// Books a slot for the authenticated patient.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<NewAppointment>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let identity = Identity::try_from(&user).map_err(AppError::Auth)?;
    if !identity.is_patient(request.patient_id) {
        return Err(AppError::Forbidden(
            "Not authorized to book appointment for this patient".to_string(),
        ));
    }

    let appointment_id = state.lifecycle.book(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment_id": appointment_id,
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<i64>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let update = AppointmentUpdate {
        id: appointment_id,
        doctor_id: request.doctor_id,
        patient_id: request.patient_id,
        appointment_time: request.appointment_time,
    };

    let appointment = state.lifecycle.update(update, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.lifecycle.cancel(appointment_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled",
    })))
}

/// Toggles between scheduled and completed.
#[axum::debug_handler]
pub async fn change_appointment_status(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let status = state
        .lifecycle
        .change_status(appointment_id, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "status": status,
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_schedule(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DoctorScheduleQuery>,
) -> Result<Json<Value>, AppError> {
    let schedule = state
        .lifecycle
        .query(auth.token(), query.date, query.patient_name.as_deref())
        .await?;

    Ok(Json(json!({
        "doctor_id": schedule.doctor_id,
        "date": schedule.date,
        "appointments": schedule.appointments,
    })))
}
