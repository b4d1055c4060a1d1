// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentStatus, BookAppointmentRequest, Caller, CallerRole, CancelAppointmentRequest,
    CompleteAppointmentRequest, RescheduleAppointmentRequest, SchedulingError,
};
use crate::services::booking::SchedulingService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct MyAppointmentsQuery {
    pub status: Option<AppointmentStatus>,
    pub limit: Option<usize>,
}

/// Map the authenticated user onto a scheduling caller. The subject claim is
/// the patient id for patient accounts.
fn caller_from(user: &User) -> Result<Caller, AppError> {
    let patient_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::from(SchedulingError::NotAuthenticated))?;

    let role = match user.role.as_deref() {
        Some("provider") | Some("doctor") => CallerRole::Provider,
        Some("admin") => CallerRole::Admin,
        _ => CallerRole::Patient,
    };

    Ok(Caller { patient_id, role })
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(provider_id): Path<Uuid>,
    Query(params): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    caller_from(&user)?;

    let service = SchedulingService::from_config(&state);
    let schedule = service.get_available_slots(provider_id, params.date).await?;

    Ok(Json(json!({
        "success": true,
        "provider_id": provider_id,
        "date": params.date,
        "slots": schedule.slots,
        "working_hours": schedule.working_hours
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;

    let service = SchedulingService::from_config(&state);
    let appointment = service.book_appointment(caller, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked and awaiting confirmation"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;

    let service = SchedulingService::from_config(&state);
    let appointment = service
        .reschedule_appointment(caller, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled and awaiting confirmation"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;

    let service = SchedulingService::from_config(&state);
    let appointment = service
        .cancel_appointment(caller, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// PROVIDER-SIDE LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;

    let service = SchedulingService::from_config(&state);
    let appointment = service.confirm_appointment(caller, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;

    let service = SchedulingService::from_config(&state);
    let appointment = service
        .complete_appointment(caller, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// READ HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;

    let service = SchedulingService::from_config(&state);
    let appointment = service.get_appointment(caller, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_count(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;

    let service = SchedulingService::from_config(&state);
    let count = service.count_upcoming(caller).await?;

    Ok(Json(json!({
        "success": true,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(params): Query<MyAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;

    let service = SchedulingService::from_config(&state);
    let appointments = service
        .list_my_appointments(caller, params.status, params.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}
