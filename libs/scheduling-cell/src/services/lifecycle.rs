// libs/scheduling-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentAction, AppointmentStatus, SchedulingError};

/// The appointment lifecycle state machine.
///
/// `completed`, `cancelled` and `no_show` are terminal. Rescheduling resets a
/// confirmed appointment back to `pending`: confirmation must be re-obtained
/// for the new slot. That is deliberate product policy, not an oversight.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the status an appointment moves to when `action` is applied,
    /// or reject the transition.
    pub fn apply(
        &self,
        current: AppointmentStatus,
        action: AppointmentAction,
    ) -> Result<AppointmentStatus, SchedulingError> {
        use AppointmentAction::*;
        use AppointmentStatus::*;

        debug!("Applying {} to appointment in status {}", action, current);

        match (current, action) {
            (Pending, Confirm) => Ok(Confirmed),

            (Pending | Confirmed, Cancel) => Ok(Cancelled),
            // Cancellation is one-way: a second cancel is reported, not
            // silently absorbed.
            (Cancelled, Cancel) => Err(SchedulingError::AlreadyCancelled),

            (Pending | Confirmed, Reschedule) => Ok(Pending),

            (Pending | Confirmed, Complete) => Ok(Completed),

            // Reserved for provider-side tooling; no operation drives it yet.
            (Pending | Confirmed, MarkNoShow) => Ok(NoShow),

            (status, action) => {
                warn!("Rejected transition: {} from {}", action, status);
                Err(SchedulingError::InvalidStatus { action, status })
            }
        }
    }
}

impl Default for AppointmentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use AppointmentAction::*;
    use AppointmentStatus::*;

    #[test]
    fn happy_path_pending_confirmed_completed() {
        let lifecycle = AppointmentLifecycle::new();
        let confirmed = lifecycle.apply(Pending, Confirm).unwrap();
        assert_eq!(confirmed, Confirmed);
        assert_eq!(lifecycle.apply(confirmed, Complete).unwrap(), Completed);
    }

    #[test]
    fn confirm_is_only_legal_from_pending() {
        let lifecycle = AppointmentLifecycle::new();
        for status in [Confirmed, Completed, Cancelled, NoShow] {
            assert_matches!(
                lifecycle.apply(status, Confirm),
                Err(SchedulingError::InvalidStatus {
                    action: Confirm,
                    ..
                })
            );
        }
    }

    #[test]
    fn cancel_from_active_statuses() {
        let lifecycle = AppointmentLifecycle::new();
        assert_eq!(lifecycle.apply(Pending, Cancel).unwrap(), Cancelled);
        assert_eq!(lifecycle.apply(Confirmed, Cancel).unwrap(), Cancelled);
    }

    #[test]
    fn second_cancel_is_reported_as_already_cancelled() {
        let lifecycle = AppointmentLifecycle::new();
        assert_matches!(
            lifecycle.apply(Cancelled, Cancel),
            Err(SchedulingError::AlreadyCancelled)
        );
    }

    #[test]
    fn cancelling_completed_is_invalid() {
        let lifecycle = AppointmentLifecycle::new();
        assert_matches!(
            lifecycle.apply(Completed, Cancel),
            Err(SchedulingError::InvalidStatus {
                action: Cancel,
                status: Completed
            })
        );
    }

    #[test]
    fn reschedule_resets_confirmed_to_pending() {
        let lifecycle = AppointmentLifecycle::new();
        assert_eq!(lifecycle.apply(Confirmed, Reschedule).unwrap(), Pending);
        assert_eq!(lifecycle.apply(Pending, Reschedule).unwrap(), Pending);
    }

    #[test]
    fn terminal_statuses_cannot_be_rescheduled() {
        let lifecycle = AppointmentLifecycle::new();
        for status in [Completed, Cancelled, NoShow] {
            assert!(lifecycle.apply(status, Reschedule).is_err());
        }
    }

    #[test]
    fn completing_cancelled_is_invalid() {
        let lifecycle = AppointmentLifecycle::new();
        assert_matches!(
            lifecycle.apply(Cancelled, Complete),
            Err(SchedulingError::InvalidStatus {
                action: Complete,
                status: Cancelled
            })
        );
    }

    #[test]
    fn no_show_is_reachable_from_pending_and_confirmed_only() {
        let lifecycle = AppointmentLifecycle::new();
        assert_eq!(lifecycle.apply(Pending, MarkNoShow).unwrap(), NoShow);
        assert_eq!(lifecycle.apply(Confirmed, MarkNoShow).unwrap(), NoShow);
        for status in [Completed, Cancelled, NoShow] {
            assert!(lifecycle.apply(status, MarkNoShow).is_err());
        }
    }

    #[test]
    fn rejection_names_the_attempted_transition() {
        let lifecycle = AppointmentLifecycle::new();
        let err = lifecycle.apply(Cancelled, Complete).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot complete an appointment that is cancelled"
        );
    }
}
