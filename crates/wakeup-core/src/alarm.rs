//! Logical alarm model.
//!
//! An [`AlarmSpec`] is the user-facing definition of an alarm. The engine
//! reads it but never owns it; the alarm list lives behind
//! [`crate::store::AlarmStore`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub const DEFAULT_LABEL: &str = "Alarm";
pub const DEFAULT_SOUND: &str = "Bell Tower";
pub const DEFAULT_SNOOZE_MINUTES: u32 = 5;
pub const MIN_SNOOZE_MINUTES: u32 = 1;
pub const MAX_SNOOZE_MINUTES: u32 = 10;

/// Wall-clock hour and minute. Seconds are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        if hour > 23 {
            return Err(ValidationError::out_of_range("hour", hour.into(), 0, 23));
        }
        if minute > 59 {
            return Err(ValidationError::out_of_range("minute", minute.into(), 0, 59));
        }
        Ok(Self { hour, minute })
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    /// This time of day on `date`.
    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.to_naive_time())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidValue {
            field: "time".into(),
            message: format!("expected HH:MM, got '{s}'"),
        };
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = h.parse::<u32>().map_err(|_| invalid())?;
        let minute = m.parse::<u32>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

/// Discriminant of a [`RepeatRule`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    Once,
    Weekly,
    Monthly,
    Yearly,
    Workday,
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepeatMode::Once => "once",
            RepeatMode::Weekly => "weekly",
            RepeatMode::Monthly => "monthly",
            RepeatMode::Yearly => "yearly",
            RepeatMode::Workday => "workday",
        };
        f.write_str(s)
    }
}

impl FromStr for RepeatMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "once" => Ok(RepeatMode::Once),
            "weekly" => Ok(RepeatMode::Weekly),
            "monthly" => Ok(RepeatMode::Monthly),
            "yearly" => Ok(RepeatMode::Yearly),
            "workday" | "holiday" => Ok(RepeatMode::Workday),
            other => Err(ValidationError::InvalidValue {
                field: "repeat".into(),
                message: format!("unknown repeat mode '{other}'"),
            }),
        }
    }
}

/// How an alarm recurs. Exactly one policy applies at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RepeatRule {
    /// Ring once at the next occurrence of the time of day.
    #[default]
    Once,
    /// Ring on the given weekdays (1-7, Sunday = 1).
    Weekly { days: BTreeSet<u8> },
    /// Ring on the given days of the month (1-31).
    Monthly { days: BTreeSet<u32> },
    /// Ring every year on the given month and day.
    Yearly { month: u32, day: u32 },
    /// Ring on legal workdays only.
    Workday,
}

impl RepeatRule {
    pub fn mode(&self) -> RepeatMode {
        match self {
            RepeatRule::Once => RepeatMode::Once,
            RepeatRule::Weekly { .. } => RepeatMode::Weekly,
            RepeatRule::Monthly { .. } => RepeatMode::Monthly,
            RepeatRule::Yearly { .. } => RepeatMode::Yearly,
            RepeatRule::Workday => RepeatMode::Workday,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            RepeatRule::Once | RepeatRule::Workday => Ok(()),
            RepeatRule::Weekly { days } => {
                for &d in days {
                    if !(1..=7).contains(&d) {
                        return Err(ValidationError::out_of_range("weekday", d.into(), 1, 7));
                    }
                }
                Ok(())
            }
            RepeatRule::Monthly { days } => {
                for &d in days {
                    if !(1..=31).contains(&d) {
                        return Err(ValidationError::out_of_range("day of month", d.into(), 1, 31));
                    }
                }
                Ok(())
            }
            RepeatRule::Yearly { month, day } => {
                if !(1..=12).contains(month) {
                    return Err(ValidationError::out_of_range("month", (*month).into(), 1, 12));
                }
                // 2000 is a leap year, so Feb 29 is accepted here.
                if NaiveDate::from_ymd_opt(2000, *month, *day).is_none() {
                    return Err(ValidationError::InvalidValue {
                        field: "anniversary".into(),
                        message: format!("{month:02}-{day:02} does not exist"),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Snooze affordance shown when the alarm rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snooze {
    pub enabled: bool,
    /// Duration in minutes (1-10).
    pub minutes: u32,
}

impl Default for Snooze {
    fn default() -> Self {
        Self {
            enabled: true,
            minutes: DEFAULT_SNOOZE_MINUTES,
        }
    }
}

/// A logical alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmSpec {
    pub id: Uuid,
    pub label: String,
    pub sound_name: String,
    pub time: TimeOfDay,
    pub enabled: bool,
    #[serde(default)]
    pub repeat: RepeatRule,
    #[serde(default)]
    pub snooze: Snooze,
}

impl AlarmSpec {
    /// New enabled one-shot alarm with default label, sound and snooze.
    pub fn new(time: TimeOfDay) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: DEFAULT_LABEL.to_string(),
            sound_name: DEFAULT_SOUND.to_string(),
            time,
            enabled: true,
            repeat: RepeatRule::Once,
            snooze: Snooze::default(),
        }
    }

    pub fn with_repeat(mut self, repeat: RepeatRule) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_snooze(mut self, snooze: Snooze) -> Self {
        self.snooze = snooze;
        self
    }

    pub fn mode(&self) -> RepeatMode {
        self.repeat.mode()
    }

    /// Check ranges of every field the engine consumes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        TimeOfDay::new(self.time.hour, self.time.minute)?;
        self.repeat.validate()?;
        if !(MIN_SNOOZE_MINUTES..=MAX_SNOOZE_MINUTES).contains(&self.snooze.minutes) {
            return Err(ValidationError::out_of_range(
                "snooze minutes",
                self.snooze.minutes.into(),
                MIN_SNOOZE_MINUTES.into(),
                MAX_SNOOZE_MINUTES.into(),
            ));
        }
        Ok(())
    }

    /// Short human-readable summary of the repeat rule.
    pub fn describe_repeat(&self) -> String {
        match &self.repeat {
            RepeatRule::Once => "Once".to_string(),
            RepeatRule::Weekly { days } if days.len() == 7 => "Every day".to_string(),
            RepeatRule::Weekly { days } if days.is_empty() => "Not set".to_string(),
            RepeatRule::Weekly { days } => {
                let names: Vec<String> = days
                    .iter()
                    .filter_map(|&d| weekday_from_number(d))
                    .map(|w| w.to_string())
                    .collect();
                format!("Weekly ({})", names.join(", "))
            }
            RepeatRule::Monthly { days } if days.is_empty() => "Monthly".to_string(),
            RepeatRule::Monthly { days } => format!("Monthly ({} days)", days.len()),
            RepeatRule::Yearly { month, day } => format!("Yearly ({month:02}-{day:02})"),
            RepeatRule::Workday => "Legal workdays".to_string(),
        }
    }
}

/// Weekday from its number, Sunday = 1 through Saturday = 7.
pub fn weekday_from_number(n: u8) -> Option<Weekday> {
    match n {
        1 => Some(Weekday::Sun),
        2 => Some(Weekday::Mon),
        3 => Some(Weekday::Tue),
        4 => Some(Weekday::Wed),
        5 => Some(Weekday::Thu),
        6 => Some(Weekday::Fri),
        7 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Number of a weekday, Sunday = 1 through Saturday = 7.
pub fn weekday_number(day: Weekday) -> u8 {
    day.number_from_sunday() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_parses_and_formats() {
        let t: TimeOfDay = "07:05".parse().unwrap();
        assert_eq!(t, TimeOfDay { hour: 7, minute: 5 });
        assert_eq!(t.to_string(), "07:05");
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("7".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn time_of_day_truncates_seconds() {
        let t = TimeOfDay::new(6, 30).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 2, 6).unwrap();
        assert_eq!(t.on(date).to_string(), "2026-02-06 06:30:00");
    }

    #[test]
    fn weekday_numbers_start_on_sunday() {
        assert_eq!(weekday_from_number(1), Some(Weekday::Sun));
        assert_eq!(weekday_from_number(7), Some(Weekday::Sat));
        assert_eq!(weekday_from_number(0), None);
        assert_eq!(weekday_number(Weekday::Mon), 2);
    }

    #[test]
    fn validate_rejects_out_of_range_fields() {
        let base = AlarmSpec::new(TimeOfDay::new(7, 0).unwrap());
        assert!(base.validate().is_ok());

        let weekly = base.clone().with_repeat(RepeatRule::Weekly {
            days: [0u8].into_iter().collect(),
        });
        assert!(weekly.validate().is_err());

        let monthly = base.clone().with_repeat(RepeatRule::Monthly {
            days: [32u32].into_iter().collect(),
        });
        assert!(monthly.validate().is_err());

        let feb_30 = base.clone().with_repeat(RepeatRule::Yearly { month: 2, day: 30 });
        assert!(feb_30.validate().is_err());

        let feb_29 = base.clone().with_repeat(RepeatRule::Yearly { month: 2, day: 29 });
        assert!(feb_29.validate().is_ok());

        let snooze = base.with_snooze(Snooze {
            enabled: true,
            minutes: 11,
        });
        assert!(snooze.validate().is_err());
    }

    #[test]
    fn repeat_rule_serializes_with_mode_tag() {
        let rule = RepeatRule::Yearly { month: 2, day: 29 };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["mode"], "yearly");
        assert_eq!(json["month"], 2);
        let back: RepeatRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn repeat_mode_parses_legacy_holiday_name() {
        assert_eq!("holiday".parse::<RepeatMode>().unwrap(), RepeatMode::Workday);
        assert!("daily".parse::<RepeatMode>().is_err());
    }

    #[test]
    fn describe_repeat_summaries() {
        let base = AlarmSpec::new(TimeOfDay::new(7, 0).unwrap());
        let every_day = base.clone().with_repeat(RepeatRule::Weekly {
            days: (1..=7).collect(),
        });
        assert_eq!(every_day.describe_repeat(), "Every day");
        let empty = base.clone().with_repeat(RepeatRule::Weekly {
            days: BTreeSet::new(),
        });
        assert_eq!(empty.describe_repeat(), "Not set");
        let some = base.with_repeat(RepeatRule::Weekly {
            days: [2u8, 4].into_iter().collect(),
        });
        assert_eq!(some.describe_repeat(), "Weekly (Mon, Wed)");
    }
}
