// libs/scheduling-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentAction, AppointmentPatch, AppointmentStatus, BookAppointmentRequest,
    Caller, CancelAppointmentRequest, CompleteAppointmentRequest, DaySchedule, NewAppointment,
    CallerRole, RescheduleAppointmentRequest, SchedulingError, Slot, SlotTime,
    SLOT_INTERVAL_MINUTES,
};
use crate::services::calendar::{ProviderDirectory, SupabaseProviderDirectory};
use crate::services::lifecycle::AppointmentLifecycle;
use crate::services::slots::{generate_time_slots, working_hours_for_date};
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};

const DEFAULT_APPOINTMENT_TYPE: &str = "consultation";

/// Booking and lifecycle orchestration over the calendar directory and the
/// appointment store.
///
/// Every business rule lives here or below; the HTTP layer only resolves the
/// caller and translates errors. Availability shown by `get_available_slots`
/// is advisory: the store re-checks occupancy atomically at write time, so a
/// lost race always surfaces as `SlotUnavailable` rather than a double
/// booking.
pub struct SchedulingService {
    directory: Arc<dyn ProviderDirectory>,
    store: Arc<dyn AppointmentStore>,
    lifecycle: AppointmentLifecycle,
}

impl SchedulingService {
    pub fn from_config(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let service_token = if config.supabase_service_role_key.is_empty() {
            None
        } else {
            Some(config.supabase_service_role_key.clone())
        };

        Self {
            directory: Arc::new(SupabaseProviderDirectory::new(
                supabase.clone(),
                service_token.clone(),
            )),
            store: Arc::new(SupabaseAppointmentStore::new(supabase, service_token)),
            lifecycle: AppointmentLifecycle::new(),
        }
    }

    pub fn with_backends(
        directory: Arc<dyn ProviderDirectory>,
        store: Arc<dyn AppointmentStore>,
    ) -> Self {
        Self {
            directory,
            store,
            lifecycle: AppointmentLifecycle::new(),
        }
    }

    // ==========================================================================
    // AVAILABILITY
    // ==========================================================================

    /// Compute the bookable slots for one provider on one calendar date.
    ///
    /// A date-specific override schedule supersedes the weekly grid entirely;
    /// only its entries explicitly marked available are offered. Otherwise the
    /// grid is generated from that weekday's working hours and slots holding a
    /// non-cancelled appointment are marked unavailable.
    pub async fn get_available_slots(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<DaySchedule, SchedulingError> {
        let provider = self
            .directory
            .find_provider(provider_id)
            .await?
            .ok_or(SchedulingError::ProviderNotFound)?;

        if let Some(date_override) = self.directory.find_date_override(provider_id, date).await? {
            debug!("Using override schedule for {} on {}", provider_id, date);
            let slots = date_override
                .slots
                .into_iter()
                .filter(|s| s.is_available)
                .map(|s| Slot {
                    time: s.time,
                    is_available: true,
                })
                .collect();
            return Ok(DaySchedule {
                slots,
                working_hours: provider.working_hours,
            });
        }

        let slots = match working_hours_for_date(&provider, date) {
            Some(hours) if !hours.is_closed => {
                let booked: Vec<_> = self
                    .store
                    .active_for_day(provider_id, date)
                    .await?
                    .into_iter()
                    .map(|apt| apt.time)
                    .collect();

                generate_time_slots(hours.open, hours.close, SLOT_INTERVAL_MINUTES)
                    .into_iter()
                    .map(|time| Slot {
                        is_available: !booked.contains(&time),
                        time,
                    })
                    .collect()
            }
            // Closed that day, or no entry for that weekday at all.
            _ => Vec::new(),
        };

        Ok(DaySchedule {
            slots,
            working_hours: provider.working_hours,
        })
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    pub async fn book_appointment(
        &self,
        caller: Caller,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let provider = self
            .directory
            .find_provider(request.provider_id)
            .await?
            .ok_or(SchedulingError::ProviderNotFound)?;

        if !provider.is_active {
            return Err(SchedulingError::ProviderInactive);
        }

        reject_past(request.date, request.time)?;

        // Advisory pre-check for a friendly early rejection; the insert below
        // is the authoritative occupancy check.
        let day = self.store.active_for_day(request.provider_id, request.date).await?;
        if day.iter().any(|apt| apt.time == request.time) {
            return Err(SchedulingError::SlotUnavailable);
        }

        let appointment = self
            .store
            .insert(NewAppointment {
                patient_id: caller.patient_id,
                provider_id: request.provider_id,
                date: request.date,
                time: request.time,
                appointment_type: request
                    .appointment_type
                    .unwrap_or_else(|| DEFAULT_APPOINTMENT_TYPE.to_string()),
                notes: request.notes,
            })
            .await?;

        info!(
            "Booked appointment {} for patient {} with provider {} at {} {}",
            appointment.id, caller.patient_id, request.provider_id, request.date, request.time
        );

        Ok(appointment)
    }

    pub async fn reschedule_appointment(
        &self,
        caller: Caller,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.load_owned(caller, appointment_id).await?;

        // Rescheduling drops any confirmation; the provider confirms the new
        // slot afresh.
        let next_status = self
            .lifecycle
            .apply(appointment.status, AppointmentAction::Reschedule)?;

        reject_past(request.new_date, request.new_time)?;

        let updated = self
            .store
            .update(
                appointment_id,
                AppointmentPatch {
                    date: Some(request.new_date),
                    time: Some(request.new_time),
                    status: Some(next_status),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            "Rescheduled appointment {} to {} {}",
            appointment_id, request.new_date, request.new_time
        );

        Ok(updated)
    }

    // ==========================================================================
    // LIFECYCLE OPERATIONS
    // ==========================================================================

    pub async fn cancel_appointment(
        &self,
        caller: Caller,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.load_owned(caller, appointment_id).await?;

        let next_status = self
            .lifecycle
            .apply(appointment.status, AppointmentAction::Cancel)?;

        let updated = self
            .store
            .update(
                appointment_id,
                AppointmentPatch {
                    status: Some(next_status),
                    cancellation_reason: request.reason,
                    ..Default::default()
                },
            )
            .await?;

        info!("Cancelled appointment {}", appointment_id);
        Ok(updated)
    }

    pub async fn confirm_appointment(
        &self,
        caller: Caller,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.load_privileged(caller, appointment_id).await?;

        let next_status = self
            .lifecycle
            .apply(appointment.status, AppointmentAction::Confirm)?;

        let updated = self
            .store
            .update(
                appointment_id,
                AppointmentPatch {
                    status: Some(next_status),
                    ..Default::default()
                },
            )
            .await?;

        info!("Confirmed appointment {}", appointment_id);
        Ok(updated)
    }

    pub async fn complete_appointment(
        &self,
        caller: Caller,
        appointment_id: Uuid,
        request: CompleteAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.load_privileged(caller, appointment_id).await?;

        let next_status = self
            .lifecycle
            .apply(appointment.status, AppointmentAction::Complete)?;

        let updated = self
            .store
            .update(
                appointment_id,
                AppointmentPatch {
                    status: Some(next_status),
                    notes: request.notes,
                    ..Default::default()
                },
            )
            .await?;

        info!("Completed appointment {}", appointment_id);
        Ok(updated)
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_appointment(
        &self,
        caller: Caller,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .store
            .find(appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;

        if appointment.patient_id != caller.patient_id && !caller.is_privileged() {
            warn!(
                "Caller {} denied access to appointment {}",
                caller.patient_id, appointment_id
            );
            return Err(SchedulingError::NotAuthorized);
        }

        Ok(appointment)
    }

    pub async fn list_my_appointments(
        &self,
        caller: Caller,
        status: Option<AppointmentStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.store.for_patient(caller.patient_id, status, limit).await
    }

    /// Dashboard counter: the caller's confirmed appointments dated today or
    /// later, on the local civil calendar.
    pub async fn count_upcoming(&self, caller: Caller) -> Result<usize, SchedulingError> {
        let today = Local::now().date_naive();

        let confirmed = self
            .store
            .for_patient(caller.patient_id, Some(AppointmentStatus::Confirmed), None)
            .await?;

        Ok(confirmed.iter().filter(|apt| apt.date >= today).count())
    }

    // ==========================================================================
    // INTERNALS
    // ==========================================================================

    /// Fetch an appointment the caller owns (admins bypass ownership).
    async fn load_owned(
        &self,
        caller: Caller,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .store
            .find(appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;

        if appointment.patient_id != caller.patient_id && caller.role != CallerRole::Admin {
            warn!(
                "Caller {} is not the owner of appointment {}",
                caller.patient_id, appointment_id
            );
            return Err(SchedulingError::NotAuthorized);
        }

        Ok(appointment)
    }

    /// Fetch an appointment for a provider/admin-only operation.
    async fn load_privileged(
        &self,
        caller: Caller,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        if !caller.is_privileged() {
            return Err(SchedulingError::NotAuthorized);
        }

        self.store
            .find(appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)
    }
}

/// Reject a slot that has already started in local civil time. Dates and
/// times are interpreted on the clinic's wall clock, matching how patients
/// and providers talk about appointments.
fn reject_past(date: NaiveDate, time: SlotTime) -> Result<(), SchedulingError> {
    let slot_start: NaiveDateTime = date.and_time(time.to_naive_time());
    if slot_start < Local::now().naive_local() {
        return Err(SchedulingError::PastDate);
    }
    Ok(())
}
