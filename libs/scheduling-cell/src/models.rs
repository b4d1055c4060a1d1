// libs/scheduling-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use shared_models::error::AppError;

/// Grid spacing for generated booking slots.
pub const SLOT_INTERVAL_MINUTES: u16 = 30;

// ==============================================================================
// TIME-OF-DAY
// ==============================================================================

/// A time of day on the booking grid, stored as minutes since midnight.
///
/// All slot arithmetic happens on the minute count; the `HH:MM` rendering is
/// only produced at the serialization boundary, so there is no float rounding
/// and no timezone involved anywhere in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotTime {
    minutes: u16,
}

impl SlotTime {
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        if minutes < 24 * 60 {
            Some(Self { minutes })
        } else {
            None
        }
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self {
                minutes: hour * 60 + minute,
            })
        } else {
            None
        }
    }

    pub fn minutes_from_midnight(&self) -> u16 {
        self.minutes
    }

    pub fn hour(&self) -> u16 {
        self.minutes / 60
    }

    pub fn minute(&self) -> u16 {
        self.minutes % 60
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        // In range by construction.
        NaiveTime::from_hms_opt(self.hour() as u32, self.minute() as u32, 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time of day: {0:?} (expected zero-padded HH:MM)")]
pub struct ParseSlotTimeError(String);

impl FromStr for SlotTime {
    type Err = ParseSlotTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseSlotTimeError(s.to_string());

        let (hh, mm) = s.split_once(':').ok_or_else(invalid)?;
        if hh.len() != 2 || mm.len() != 2 {
            return Err(invalid());
        }

        let hour: u16 = hh.parse().map_err(|_| invalid())?;
        let minute: u16 = mm.parse().map_err(|_| invalid())?;

        SlotTime::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// PROVIDER CALENDAR MODEL
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => DayOfWeek::Sunday,
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
        }
    }
}

/// One row of a provider's recurring weekly working-hours table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub day: DayOfWeek,
    pub open: SlotTime,
    pub close: SlotTime,
    #[serde(default)]
    pub is_closed: bool,
}

/// Read model of a provider, owned by the directory subsystem. The core only
/// ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: Uuid,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub working_hours: Vec<WorkingHours>,
}

fn default_active() -> bool {
    true
}

/// Administratively created per-date slot list that supersedes the generated
/// weekly grid for that exact date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateOverride {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<OverrideSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideSlot {
    pub time: SlotTime,
    pub is_available: bool,
    pub appointment_id: Option<Uuid>,
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    /// Calendar date in the provider's local civil time; no timezone.
    pub date: NaiveDate,
    pub time: SlotTime,
    pub status: AppointmentStatus,
    pub appointment_type: String,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for the booking insert. Identity, status and timestamps are
/// assigned by the store at commit time.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub appointment_type: String,
    pub notes: Option<String>,
}

/// Partial update applied by the store. `None` fields are left untouched;
/// a date/time change is re-checked for occupancy atomically with the write.
#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub date: Option<NaiveDate>,
    pub time: Option<SlotTime>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
}

// ==============================================================================
// DERIVED SLOT VIEW
// ==============================================================================

/// An ephemeral candidate booking time. Never persisted; availability is
/// advisory and re-validated at booking time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub time: SlotTime,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub slots: Vec<Slot>,
    pub working_hours: Vec<WorkingHours>,
}

// ==============================================================================
// CALLER IDENTITY
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Patient,
    Provider,
    Admin,
}

/// Identity resolved once by the request layer and passed into every core
/// operation. The core itself holds no session state.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub patient_id: Uuid,
    pub role: CallerRole,
}

impl Caller {
    pub fn is_privileged(&self) -> bool {
        matches!(self.role, CallerRole::Provider | CallerRole::Admin)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub appointment_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_time: SlotTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub notes: Option<String>,
}

// ==============================================================================
// LIFECYCLE ACTIONS AND ERRORS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentAction {
    Confirm,
    Cancel,
    Reschedule,
    Complete,
    MarkNoShow,
}

impl fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentAction::Confirm => write!(f, "confirm"),
            AppointmentAction::Cancel => write!(f, "cancel"),
            AppointmentAction::Reschedule => write!(f, "reschedule"),
            AppointmentAction::Complete => write!(f, "complete"),
            AppointmentAction::MarkNoShow => write!(f, "mark as no-show"),
        }
    }
}

/// Business-rule rejections of the scheduling core. All variants are terminal
/// and safe to surface verbatim; `Storage` carries transient infrastructure
/// failures through unmodified for retry at a higher layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Provider not found")]
    ProviderNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Provider is not accepting appointments")]
    ProviderInactive,

    #[error("This time slot is no longer available")]
    SlotUnavailable,

    #[error("Cannot book appointments in the past")]
    PastDate,

    #[error("Not authorized to access this appointment")]
    NotAuthorized,

    #[error("Cannot {action} an appointment that is {status}")]
    InvalidStatus {
        action: AppointmentAction,
        status: AppointmentStatus,
    },

    #[error("Appointment is already cancelled")]
    AlreadyCancelled,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match &err {
            SchedulingError::NotAuthenticated | SchedulingError::NotAuthorized => {
                AppError::Auth(err.to_string())
            }
            SchedulingError::ProviderNotFound | SchedulingError::AppointmentNotFound => {
                AppError::NotFound(err.to_string())
            }
            SchedulingError::SlotUnavailable
            | SchedulingError::InvalidStatus { .. }
            | SchedulingError::AlreadyCancelled => AppError::Conflict(err.to_string()),
            SchedulingError::PastDate | SchedulingError::ProviderInactive => {
                AppError::BadRequest(err.to_string())
            }
            SchedulingError::Storage(msg) => AppError::Database(msg.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_time_formats_zero_padded() {
        let t = SlotTime::from_hm(9, 5).unwrap();
        assert_eq!(t.to_string(), "09:05");
        assert_eq!(SlotTime::from_hm(23, 30).unwrap().to_string(), "23:30");
    }

    #[test]
    fn slot_time_parses_and_round_trips() {
        let t: SlotTime = "14:30".parse().unwrap();
        assert_eq!(t.minutes_from_midnight(), 14 * 60 + 30);
        assert_eq!(t.to_string(), "14:30");
    }

    #[test]
    fn slot_time_rejects_out_of_range_and_sloppy_input() {
        assert!("24:00".parse::<SlotTime>().is_err());
        assert!("12:60".parse::<SlotTime>().is_err());
        assert!("9:30".parse::<SlotTime>().is_err());
        assert!("0930".parse::<SlotTime>().is_err());
        assert!(SlotTime::from_minutes(24 * 60).is_none());
    }

    #[test]
    fn slot_time_serializes_as_hh_mm_string() {
        let t = SlotTime::from_hm(11, 30).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"11:30\"");

        let back: SlotTime = serde_json::from_str("\"11:30\"").unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn status_display_matches_wire_format() {
        assert_eq!(AppointmentStatus::NoShow.to_string(), "no_show");
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::NoShow).unwrap(),
            "\"no_show\""
        );
    }

    #[test]
    fn working_hours_defaults_open() {
        let wh: WorkingHours =
            serde_json::from_str(r#"{"day":"monday","open":"09:00","close":"17:00"}"#).unwrap();
        assert!(!wh.is_closed);
        assert_eq!(wh.day, DayOfWeek::Monday);
    }
}
