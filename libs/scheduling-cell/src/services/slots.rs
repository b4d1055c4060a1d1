// libs/scheduling-cell/src/services/slots.rs
use chrono::{Datelike, NaiveDate};

use crate::models::{DayOfWeek, ProviderProfile, SlotTime, WorkingHours};

/// Generate the canonical slot grid between `open` and `close`.
///
/// Slots start at `open`; a slot whose interval would extend past `close` is
/// not generated. Arithmetic is minutes-since-midnight throughout.
pub fn generate_time_slots(open: SlotTime, close: SlotTime, interval_minutes: u16) -> Vec<SlotTime> {
    let mut slots = Vec::new();
    if interval_minutes == 0 {
        return slots;
    }

    let mut cursor = open.minutes_from_midnight();
    let end = close.minutes_from_midnight();

    while cursor + interval_minutes <= end {
        if let Some(slot) = SlotTime::from_minutes(cursor) {
            slots.push(slot);
        }
        cursor += interval_minutes;
    }

    slots
}

/// Find the weekly working-hours entry that applies on `date`, if any.
/// A missing entry means the provider does not work that weekday.
pub fn working_hours_for_date<'a>(
    provider: &'a ProviderProfile,
    date: NaiveDate,
) -> Option<&'a WorkingHours> {
    let day = DayOfWeek::from(date.weekday());
    provider.working_hours.iter().find(|wh| wh.day == day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn t(s: &str) -> SlotTime {
        s.parse().unwrap()
    }

    #[test]
    fn morning_clinic_yields_six_slots() {
        let slots = generate_time_slots(t("09:00"), t("12:00"), 30);
        let rendered: Vec<String> = slots.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["09:00", "09:30", "10:00", "10:30", "11:00", "11:30"]
        );
    }

    #[test]
    fn slot_extending_past_close_is_not_generated() {
        // Closing at 10:45: the 10:30 slot would run to 11:00.
        let slots = generate_time_slots(t("09:00"), t("10:45"), 30);
        let rendered: Vec<String> = slots.iter().map(|s| s.to_string()).collect();
        assert_eq!(rendered, vec!["09:00", "09:30", "10:00"]);
    }

    #[test]
    fn empty_when_open_equals_or_follows_close() {
        assert!(generate_time_slots(t("12:00"), t("12:00"), 30).is_empty());
        assert!(generate_time_slots(t("14:00"), t("12:00"), 30).is_empty());
    }

    #[test]
    fn zero_interval_generates_nothing() {
        assert!(generate_time_slots(t("09:00"), t("12:00"), 0).is_empty());
    }

    #[test]
    fn weekday_lookup_matches_calendar_day() {
        let provider = ProviderProfile {
            id: Uuid::new_v4(),
            is_active: true,
            working_hours: vec![WorkingHours {
                day: DayOfWeek::Monday,
                open: t("09:00"),
                close: t("17:00"),
                is_closed: false,
            }],
        };

        // 2026-01-05 is a Monday, 2026-01-06 a Tuesday.
        let monday = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();

        assert!(working_hours_for_date(&provider, monday).is_some());
        assert!(working_hours_for_date(&provider, tuesday).is_none());
    }
}
