use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::calendar::{date_key, HolidayCalendar, SharedHolidays};

/// Why a day rings or stays silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayKind {
    MakeUpWorkday,
    Holiday,
    Weekend,
    Weekday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayClassification {
    pub must_ring: bool,
    pub kind: DayKind,
}

/// Classifies days for `workday` alarms.
///
/// Priority: make-up workday, then holiday, then the plain weekend rule.
/// With no dataset loaded this is just Monday to Friday.
#[derive(Debug, Clone)]
pub struct WorkdayOracle {
    dataset: SharedHolidays,
}

impl WorkdayOracle {
    pub fn new(dataset: SharedHolidays) -> Self {
        Self { dataset }
    }

    /// Oracle over an empty dataset.
    pub fn weekdays_only() -> Self {
        Self::new(HolidayCalendar::default().shared())
    }

    pub fn dataset(&self) -> &SharedHolidays {
        &self.dataset
    }

    /// No holiday data loaded: classification falls back to the weekend rule.
    pub fn dataset_is_empty(&self) -> bool {
        self.dataset
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    pub fn classify(&self, date: NaiveDate) -> DayClassification {
        let calendar = self.dataset.read().unwrap_or_else(|e| e.into_inner());
        classify_with(&calendar, date)
    }
}

fn classify_with(calendar: &HolidayCalendar, date: NaiveDate) -> DayClassification {
    let key = date_key(date);
    let kind = if calendar.is_make_up_workday(&key) {
        DayKind::MakeUpWorkday
    } else if calendar.is_holiday(&key) {
        DayKind::Holiday
    } else if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        DayKind::Weekend
    } else {
        DayKind::Weekday
    };
    DayClassification {
        must_ring: matches!(kind, DayKind::MakeUpWorkday | DayKind::Weekday),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_dataset_rings_monday_to_friday() {
        let oracle = WorkdayOracle::weekdays_only();
        // 2026-02-06 is a Friday.
        assert!(oracle.classify(date(2026, 2, 6)).must_ring);
        assert_eq!(oracle.classify(date(2026, 2, 7)).kind, DayKind::Weekend);
        assert!(!oracle.classify(date(2026, 2, 8)).must_ring);
        assert!(oracle.classify(date(2026, 2, 9)).must_ring);
    }

    #[test]
    fn make_up_workday_rings_on_saturday() {
        let oracle =
            WorkdayOracle::new(HolidayCalendar::new(Vec::<String>::new(), vec!["2026-02-14"]).shared());
        let c = oracle.classify(date(2026, 2, 14));
        assert!(c.must_ring);
        assert_eq!(c.kind, DayKind::MakeUpWorkday);
    }

    #[test]
    fn holiday_silences_tuesday() {
        let oracle =
            WorkdayOracle::new(HolidayCalendar::new(vec!["2026-02-17"], Vec::<String>::new()).shared());
        let c = oracle.classify(date(2026, 2, 17));
        assert!(!c.must_ring);
        assert_eq!(c.kind, DayKind::Holiday);
    }

    #[test]
    fn make_up_workday_beats_holiday() {
        let oracle =
            WorkdayOracle::new(HolidayCalendar::new(vec!["2026-02-14"], vec!["2026-02-14"]).shared());
        assert!(oracle.classify(date(2026, 2, 14)).must_ring);
    }

    #[test]
    fn dataset_updates_are_visible() {
        let oracle = WorkdayOracle::weekdays_only();
        assert!(oracle.classify(date(2026, 10, 1)).must_ring);
        oracle
            .dataset()
            .write()
            .unwrap()
            .merge_year(&crate::holiday::HolidayYear {
                year: 2026,
                days: vec![crate::holiday::HolidayDay {
                    name: "National Day".into(),
                    date: "2026-10-01".into(),
                    is_off_day: true,
                }],
            });
        assert!(!oracle.classify(date(2026, 10, 1)).must_ring);
    }

    #[test]
    fn dataset_emptiness_tracks_merges() {
        let oracle = WorkdayOracle::weekdays_only();
        assert!(oracle.dataset_is_empty());
        let loaded =
            WorkdayOracle::new(HolidayCalendar::new(vec!["2026-10-01"], Vec::<String>::new()).shared());
        assert!(!loaded.dataset_is_empty());
    }
}
