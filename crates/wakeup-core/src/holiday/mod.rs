//! Holiday-aware workday classification.
//!
//! - [`HolidayCalendar`]: holiday and make-up workday sets, merged from
//!   yearly datasets and cached in the `kv` table
//! - [`WorkdayOracle`]: decides whether a `workday` alarm rings on a date
//! - [`HolidayFetcher`]: downloads yearly datasets over HTTP

mod calendar;
mod fetch;
mod oracle;

pub use calendar::{date_key, HolidayCalendar, HolidayDay, HolidayYear, SharedHolidays};
pub use fetch::{HolidayFetcher, RefreshSummary};
pub use oracle::{DayClassification, DayKind, WorkdayOracle};
