use std::error::Error;

use chrono::{Datelike, NaiveDate};
use clap::Subcommand;
use serde::Serialize;
use wakeup_core::{
    AlarmStore, Clock, DayClassification, HolidayCalendar, HolidayFetcher, RepeatMode, SyncReport,
    WorkdayOracle,
};

use super::print_json;
use crate::context::Context;

#[derive(Subcommand)]
pub enum HolidaysAction {
    /// Download holiday data around the current year
    Refresh,
    /// Show what the cached dataset covers
    Status,
    /// Merge a yearly dataset from a local JSON file
    Import {
        /// Path to a `{year}.json` document
        file: String,
    },
    /// Classify a date (YYYY-MM-DD)
    Classify { date: String },
}

#[derive(Serialize)]
struct StatusView {
    holidays: usize,
    make_up_workdays: usize,
    years: Vec<YearCoverage>,
}

#[derive(Serialize)]
struct YearCoverage {
    year: i32,
    cached: bool,
}

#[derive(Serialize)]
struct ClassifyView {
    date: String,
    #[serde(flatten)]
    classification: DayClassification,
}

#[derive(Serialize)]
struct UpdateView<T: Serialize> {
    #[serde(flatten)]
    update: T,
    resynced: Vec<SyncReport>,
}

pub async fn run(action: HolidaysAction) -> Result<(), Box<dyn Error>> {
    let ctx = Context::open()?;
    match action {
        HolidaysAction::Refresh => {
            let fetcher = HolidayFetcher::from_config(&ctx.config.holidays);
            let years = ctx.config.holidays.years_around(ctx.clock.now().year());
            let summary = fetcher.refresh(years, &ctx.holidays).await;
            tracing::info!(fetched = ?summary.fetched, failed = ?summary.failed, "holiday refresh done");
            save(&ctx)?;
            let resynced = resync_workday_alarms(&ctx).await?;
            print_json(&UpdateView {
                update: summary,
                resynced,
            })?;
        }
        HolidaysAction::Status => {
            let calendar = ctx.holidays.read().unwrap_or_else(|e| e.into_inner());
            let years = ctx
                .config
                .holidays
                .years_around(ctx.clock.now().year())
                .map(|year| YearCoverage {
                    year,
                    cached: calendar.has_data_for(year),
                })
                .collect();
            print_json(&StatusView {
                holidays: calendar.holidays().len(),
                make_up_workdays: calendar.make_up_workdays().len(),
                years,
            })?;
        }
        HolidaysAction::Import { file } => {
            let json = std::fs::read_to_string(&file)?;
            let year = HolidayCalendar::parse_year(&json)?;
            ctx.holidays
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .merge_year(&year);
            save(&ctx)?;
            let resynced = resync_workday_alarms(&ctx).await?;
            print_json(&UpdateView {
                update: serde_json::json!({ "year": year.year, "days": year.days.len() }),
                resynced,
            })?;
        }
        HolidaysAction::Classify { date } => {
            let day = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| format!("invalid date '{date}': {e}"))?;
            let oracle = WorkdayOracle::new(ctx.holidays.clone());
            print_json(&ClassifyView {
                date: day.format("%Y-%m-%d").to_string(),
                classification: oracle.classify(day),
            })?;
        }
    }
    Ok(())
}

fn save(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let calendar = ctx.holidays.read().unwrap_or_else(|e| e.into_inner()).clone();
    calendar.save(&ctx.db)?;
    Ok(())
}

/// Workday alarms expanded against the old dataset are re-expanded.
async fn resync_workday_alarms(ctx: &Context) -> Result<Vec<SyncReport>, Box<dyn Error>> {
    let mut reports = Vec::new();
    for spec in ctx.alarms().list_enabled()? {
        if spec.mode() == RepeatMode::Workday {
            reports.push(ctx.coordinator.resync(&spec).await?);
        }
    }
    Ok(reports)
}
