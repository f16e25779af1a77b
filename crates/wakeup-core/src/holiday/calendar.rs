use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::storage::Database;

const HOLIDAYS_KEY: &str = "cached_holidays";
const MAKE_UP_WORKDAYS_KEY: &str = "cached_make_up_workdays";

/// Dataset handle shared between the fetcher (writer) and the oracle (reader).
pub type SharedHolidays = Arc<RwLock<HolidayCalendar>>;

/// Dataset key for a date: `yyyy-MM-dd` in the proleptic Gregorian calendar.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// One entry of a yearly holiday dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayDay {
    pub name: String,
    /// `yyyy-MM-dd`
    pub date: String,
    /// `true` for a day off, `false` for a make-up workday.
    pub is_off_day: bool,
}

/// A yearly holiday dataset as published upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayYear {
    pub year: i32,
    pub days: Vec<HolidayDay>,
}

/// Holidays and make-up workdays, keyed by `yyyy-MM-dd`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayCalendar {
    holidays: BTreeSet<String>,
    make_up_workdays: BTreeSet<String>,
}

impl HolidayCalendar {
    pub fn new<H, M>(holidays: H, make_up_workdays: M) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            holidays: holidays.into_iter().map(Into::into).collect(),
            make_up_workdays: make_up_workdays.into_iter().map(Into::into).collect(),
        }
    }

    pub fn shared(self) -> SharedHolidays {
        Arc::new(RwLock::new(self))
    }

    pub fn holidays(&self) -> &BTreeSet<String> {
        &self.holidays
    }

    pub fn make_up_workdays(&self) -> &BTreeSet<String> {
        &self.make_up_workdays
    }

    pub fn is_holiday(&self, key: &str) -> bool {
        self.holidays.contains(key)
    }

    pub fn is_make_up_workday(&self, key: &str) -> bool {
        self.make_up_workdays.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty() && self.make_up_workdays.is_empty()
    }

    /// Merge a yearly dataset. A date lives in at most one set; the latest
    /// classification wins.
    pub fn merge_year(&mut self, year: &HolidayYear) {
        for day in &year.days {
            if day.is_off_day {
                self.make_up_workdays.remove(&day.date);
                self.holidays.insert(day.date.clone());
            } else {
                self.holidays.remove(&day.date);
                self.make_up_workdays.insert(day.date.clone());
            }
        }
    }

    /// Whether any entry of `year` is present.
    pub fn has_data_for(&self, year: i32) -> bool {
        let prefix = format!("{year:04}-");
        self.holidays.iter().any(|d| d.starts_with(&prefix))
            || self.make_up_workdays.iter().any(|d| d.starts_with(&prefix))
    }

    /// Restore the cached dataset, or an empty one if nothing is cached.
    pub fn load(db: &Database) -> Result<Self> {
        let holidays = match db.kv_get(HOLIDAYS_KEY)? {
            Some(json) => serde_json::from_str::<BTreeSet<String>>(&json)?,
            None => BTreeSet::new(),
        };
        let make_up_workdays = match db.kv_get(MAKE_UP_WORKDAYS_KEY)? {
            Some(json) => serde_json::from_str::<BTreeSet<String>>(&json)?,
            None => BTreeSet::new(),
        };
        Ok(Self {
            holidays,
            make_up_workdays,
        })
    }

    pub fn save(&self, db: &Database) -> Result<()> {
        db.kv_set(HOLIDAYS_KEY, &serde_json::to_string(&self.holidays)?)?;
        db.kv_set(
            MAKE_UP_WORKDAYS_KEY,
            &serde_json::to_string(&self.make_up_workdays)?,
        )?;
        Ok(())
    }

    /// Parse a yearly dataset from its JSON document.
    pub fn parse_year(json: &str) -> Result<HolidayYear> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::Holiday(crate::error::HolidayError::Parse(e.to_string())))
    }
}
