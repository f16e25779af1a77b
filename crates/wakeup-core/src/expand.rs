//! Recurrence expansion.
//!
//! Turns a [`RepeatRule`] into the concrete registrations an external
//! scheduler can hold:
//! - `once`: the next occurrence of the time of day
//! - `weekly`: one perpetual native weekly registration, or a few weeks of
//!   explicit instants when the scheduler has no native weekly repeat
//! - `monthly`, `yearly`, `workday`: a finite lookahead window of one-shot
//!   instants, topped up later by the replenishment check
//!
//! Every produced instant is strictly after `now`.

use std::ops::RangeInclusive;

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::alarm::{weekday_from_number, AlarmSpec, RepeatRule, TimeOfDay};
use crate::holiday::WorkdayOracle;

/// Lookahead windows for the explicitly expanded modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonPolicy {
    /// Calendar months scanned for `monthly`, including the current one.
    pub monthly_months: u32,
    /// Years scanned for `yearly`, including the current one.
    pub yearly_years: u32,
    /// Days scanned for `workday`, including today.
    pub workday_days: u32,
    /// Weeks expanded for `weekly` when native repeat is unavailable.
    pub weekly_fallback_weeks: u32,
    /// Prefer the scheduler's native weekly repeat.
    pub native_weekly: bool,
}

impl HorizonPolicy {
    pub const MONTHLY_MONTHS: RangeInclusive<u32> = 1..=120;
    pub const YEARLY_YEARS: RangeInclusive<u32> = 1..=50;
    pub const WORKDAY_DAYS: RangeInclusive<u32> = 1..=366;
    pub const WEEKLY_FALLBACK_WEEKS: RangeInclusive<u32> = 1..=52;

    /// Every window pulled into its allowed range.
    pub fn clamped(&self) -> Self {
        fn clamp(value: u32, range: RangeInclusive<u32>) -> u32 {
            value.clamp(*range.start(), *range.end())
        }
        Self {
            monthly_months: clamp(self.monthly_months, Self::MONTHLY_MONTHS),
            yearly_years: clamp(self.yearly_years, Self::YEARLY_YEARS),
            workday_days: clamp(self.workday_days, Self::WORKDAY_DAYS),
            weekly_fallback_weeks: clamp(self.weekly_fallback_weeks, Self::WEEKLY_FALLBACK_WEEKS),
            native_weekly: self.native_weekly,
        }
    }
}

impl Default for HorizonPolicy {
    fn default() -> Self {
        Self {
            monthly_months: 13,
            yearly_years: 6,
            workday_days: 31,
            weekly_fallback_weeks: 4,
            native_weekly: true,
        }
    }
}

/// One registration to submit to the external scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Occurrence {
    /// A one-shot fire instant.
    At { at: NaiveDateTime },
    /// A perpetual weekly repeat handled by the scheduler itself.
    WeeklyRepeat {
        weekdays: Vec<Weekday>,
        time: TimeOfDay,
    },
}

impl Occurrence {
    pub fn instant(&self) -> Option<NaiveDateTime> {
        match self {
            Occurrence::At { at } => Some(*at),
            Occurrence::WeeklyRepeat { .. } => None,
        }
    }
}

/// Expand `spec` into the registrations needed from `now` on.
///
/// Fixed instants come back sorted and deduplicated. Dates that do not
/// exist (Feb 30, Feb 29 in a common year) are skipped, never rolled over.
/// Windows outside the [`HorizonPolicy`] bounds are clamped.
pub fn expand(
    spec: &AlarmSpec,
    now: NaiveDateTime,
    horizon: &HorizonPolicy,
    oracle: &WorkdayOracle,
) -> Vec<Occurrence> {
    let horizon = &horizon.clamped();
    let time = spec.time;
    let mut instants = match &spec.repeat {
        RepeatRule::Once => vec![next_occurrence(time, now)],
        RepeatRule::Weekly { days } => {
            let weekdays = weekdays_of(days.iter().copied());
            if weekdays.is_empty() {
                vec![next_occurrence(time, now)]
            } else if horizon.native_weekly {
                return vec![Occurrence::WeeklyRepeat { weekdays, time }];
            } else {
                expand_weekly(&weekdays, time, now, horizon.weekly_fallback_weeks)
            }
        }
        RepeatRule::Monthly { days } => {
            expand_monthly(days.iter().copied(), time, now, horizon.monthly_months)
        }
        RepeatRule::Yearly { month, day } => {
            expand_yearly(*month, *day, time, now, horizon.yearly_years)
        }
        RepeatRule::Workday => expand_workdays(time, now, horizon.workday_days, oracle),
    };

    instants.retain(|at| *at > now);
    instants.sort();
    instants.dedup();
    instants.into_iter().map(|at| Occurrence::At { at }).collect()
}

/// Today at `time` if that is still ahead of `now`, otherwise tomorrow.
/// A time equal to `now` counts as already passed.
pub fn next_occurrence(time: TimeOfDay, now: NaiveDateTime) -> NaiveDateTime {
    let today = time.on(now.date());
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

fn weekdays_of(days: impl Iterator<Item = u8>) -> Vec<Weekday> {
    let mut weekdays: Vec<Weekday> = days.filter_map(weekday_from_number).collect();
    weekdays.sort_by_key(|w| w.number_from_sunday());
    weekdays.dedup();
    weekdays
}

fn expand_weekly(
    weekdays: &[Weekday],
    time: TimeOfDay,
    now: NaiveDateTime,
    weeks: u32,
) -> Vec<NaiveDateTime> {
    let mut out = Vec::with_capacity(weekdays.len() * weeks as usize);
    for &weekday in weekdays {
        let first = first_on_weekday(weekday, time, now);
        for week in 0..weeks {
            match first.checked_add_days(Days::new(u64::from(week) * 7)) {
                Some(at) => out.push(at),
                None => break,
            }
        }
    }
    out
}

fn first_on_weekday(weekday: Weekday, time: TimeOfDay, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date();
    let ahead = (weekday.num_days_from_sunday() + 7 - today.weekday().num_days_from_sunday()) % 7;
    let candidate = time.on(today + Duration::days(ahead.into()));
    if candidate > now {
        candidate
    } else {
        candidate + Duration::weeks(1)
    }
}

fn expand_monthly(
    days: impl Iterator<Item = u32> + Clone,
    time: TimeOfDay,
    now: NaiveDateTime,
    months: u32,
) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    let start = now.year() * 12 + now.month0() as i32;
    let months = i32::try_from(months).unwrap_or(i32::MAX);
    for offset in 0..months {
        let Some(index) = start.checked_add(offset) else {
            break;
        };
        let (year, month) = (index.div_euclid(12), index.rem_euclid(12) as u32 + 1);
        for day in days.clone() {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                out.push(time.on(date));
            }
        }
    }
    out
}

fn expand_yearly(
    month: u32,
    day: u32,
    time: TimeOfDay,
    now: NaiveDateTime,
    years: u32,
) -> Vec<NaiveDateTime> {
    let years = i32::try_from(years).unwrap_or(i32::MAX);
    (0..years)
        .map_while(|offset| now.year().checked_add(offset))
        .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
        .map(|date| time.on(date))
        .collect()
}

fn expand_workdays(
    time: TimeOfDay,
    now: NaiveDateTime,
    days: u32,
    oracle: &WorkdayOracle,
) -> Vec<NaiveDateTime> {
    let today = now.date();
    if oracle.dataset_is_empty() {
        tracing::debug!("holiday dataset empty, workdays follow the weekend rule");
    }
    (0..days)
        .map_while(|offset| today.checked_add_days(Days::new(offset.into())))
        .filter(|date| oracle.classify(*date).must_ring)
        .map(|date| time.on(date))
        .collect()
}
