// libs/scheduling-cell/src/services/store.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentPatch, AppointmentStatus, NewAppointment, SchedulingError,
};

/// Source of truth for appointment occupancy.
///
/// `insert` and `update` are the serialization points of the whole core: each
/// implementation must observe the "does a conflicting appointment exist"
/// check and the write atomically for a given `(provider_id, date)` partition,
/// surfacing a lost race as `SlotUnavailable`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError>;

    /// Non-cancelled appointments for one provider on one date, time-ordered.
    async fn active_for_day(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    async fn for_patient(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    /// Create a `pending` appointment if and only if the slot is vacant.
    async fn insert(&self, new: NewAppointment) -> Result<Appointment, SchedulingError>;

    /// Apply a partial update. When the patch moves the appointment to a new
    /// slot, occupancy is re-checked (excluding the appointment itself).
    async fn update(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, SchedulingError>;
}

// ==============================================================================
// SUPABASE-BACKED STORE
// ==============================================================================

/// PostgREST-backed store. Atomicity comes from a partial unique index on the
/// appointments table:
///
/// ```sql
/// CREATE UNIQUE INDEX appointments_slot_occupancy
///     ON appointments (provider_id, date, time)
///     WHERE status <> 'cancelled';
/// ```
///
/// An insert or slot-moving update that loses the race fails with 409, which
/// is converted to `SlotUnavailable`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    service_token: Option<String>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, service_token: Option<String>) -> Self {
        Self {
            supabase,
            service_token,
        }
    }

    fn token(&self) -> Option<&str> {
        self.service_token.as_deref()
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, SchedulingError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::Storage(format!("Failed to parse appointments: {}", e)))
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        headers
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| SchedulingError::Storage(e.to_string()))?;

        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    async fn active_for_day(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&date=eq.{}&status=neq.cancelled&order=time.asc",
            provider_id, date
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| SchedulingError::Storage(e.to_string()))?;

        Self::parse_rows(rows)
    }

    async fn for_patient(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = vec![format!("patient_id=eq.{}", patient_id)];

        if let Some(status) = status {
            query_parts.push(format!("status=eq.{}", status));
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=date.desc,time.desc",
            query_parts.join("&")
        );
        if let Some(limit) = limit {
            path.push_str(&format!("&limit={}", limit));
        }

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| SchedulingError::Storage(e.to_string()))?;

        Self::parse_rows(rows)
    }

    async fn insert(&self, new: NewAppointment) -> Result<Appointment, SchedulingError> {
        let now = Utc::now();

        let appointment_data = json!({
            "id": Uuid::new_v4(),
            "patient_id": new.patient_id,
            "provider_id": new.provider_id,
            "date": new.date,
            "time": new.time,
            "status": AppointmentStatus::Pending,
            "appointment_type": new.appointment_type,
            "notes": new.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                self.token(),
                Some(appointment_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    SchedulingError::SlotUnavailable
                } else {
                    SchedulingError::Storage(e.to_string())
                }
            })?;

        Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Storage("Failed to create appointment".to_string()))
    }

    async fn update(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, SchedulingError> {
        let mut update_data = serde_json::Map::new();

        if let Some(date) = patch.date {
            update_data.insert("date".to_string(), json!(date));
        }
        if let Some(time) = patch.time {
            update_data.insert("time".to_string(), json!(time));
        }
        if let Some(status) = patch.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(notes) = patch.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(reason) = patch.cancellation_reason {
            update_data.insert("cancellation_reason".to_string(), json!(reason));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", id);

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(Value::Object(update_data)),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    SchedulingError::SlotUnavailable
                } else {
                    SchedulingError::Storage(e.to_string())
                }
            })?;

        Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or(SchedulingError::AppointmentNotFound)
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Store backed by a single mutex over the appointment map. Holding the lock
/// across the occupancy check and the write makes every operation serializable,
/// which is the partition-lock strategy in its simplest form. Used by tests
/// and suitable for single-process deployments.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Appointment>> {
        self.appointments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot_occupied(
        map: &HashMap<Uuid, Appointment>,
        provider_id: Uuid,
        date: NaiveDate,
        time: crate::models::SlotTime,
        exclude: Option<Uuid>,
    ) -> bool {
        map.values().any(|apt| {
            apt.provider_id == provider_id
                && apt.date == date
                && apt.time == time
                && apt.status != AppointmentStatus::Cancelled
                && Some(apt.id) != exclude
        })
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn active_for_day(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut day: Vec<Appointment> = self
            .lock()
            .values()
            .filter(|apt| {
                apt.provider_id == provider_id
                    && apt.date == date
                    && apt.status != AppointmentStatus::Cancelled
            })
            .cloned()
            .collect();
        day.sort_by_key(|apt| apt.time);
        Ok(day)
    }

    async fn for_patient(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut mine: Vec<Appointment> = self
            .lock()
            .values()
            .filter(|apt| apt.patient_id == patient_id)
            .filter(|apt| status.is_none_or(|s| apt.status == s))
            .cloned()
            .collect();
        mine.sort_by_key(|apt| std::cmp::Reverse((apt.date, apt.time)));
        if let Some(limit) = limit {
            mine.truncate(limit);
        }
        Ok(mine)
    }

    async fn insert(&self, new: NewAppointment) -> Result<Appointment, SchedulingError> {
        let mut map = self.lock();

        if Self::slot_occupied(&map, new.provider_id, new.date, new.time, None) {
            debug!(
                "Insert rejected: {} {} {} already occupied",
                new.provider_id, new.date, new.time
            );
            return Err(SchedulingError::SlotUnavailable);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            provider_id: new.provider_id,
            date: new.date,
            time: new.time,
            status: AppointmentStatus::Pending,
            appointment_type: new.appointment_type,
            notes: new.notes,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        map.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, SchedulingError> {
        let mut map = self.lock();

        let current = map
            .get(&id)
            .cloned()
            .ok_or(SchedulingError::AppointmentNotFound)?;

        let target_date = patch.date.unwrap_or(current.date);
        let target_time = patch.time.unwrap_or(current.time);
        let moves_slot = target_date != current.date || target_time != current.time;
        let stays_active = patch.status.unwrap_or(current.status) != AppointmentStatus::Cancelled;

        if moves_slot
            && stays_active
            && Self::slot_occupied(&map, current.provider_id, target_date, target_time, Some(id))
        {
            return Err(SchedulingError::SlotUnavailable);
        }

        let mut updated = current;
        updated.date = target_date;
        updated.time = target_time;
        if let Some(status) = patch.status {
            updated.status = status;
        }
        if let Some(notes) = patch.notes {
            updated.notes = Some(notes);
        }
        if let Some(reason) = patch.cancellation_reason {
            updated.cancellation_reason = Some(reason);
        }
        updated.updated_at = Utc::now();

        map.insert(id, updated.clone());
        Ok(updated)
    }
}
