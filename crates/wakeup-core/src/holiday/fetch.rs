//! HTTP download of yearly holiday datasets.

use std::ops::RangeInclusive;

use reqwest::Client;
use serde::Serialize;

use super::calendar::{HolidayYear, SharedHolidays};
use crate::error::HolidayError;
use crate::storage::HolidaysConfig;

/// Outcome of a refresh: which years were merged and which were skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshSummary {
    pub fetched: Vec<i32>,
    pub failed: Vec<i32>,
}

/// Downloads `{base_url}/{year}.json` documents.
pub struct HolidayFetcher {
    client: Client,
    base_url: String,
}

impl HolidayFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &HolidaysConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    pub fn url_for(&self, year: i32) -> String {
        format!("{}/{}.json", self.base_url, year)
    }

    pub async fn fetch_year(&self, year: i32) -> Result<HolidayYear, HolidayError> {
        let response = self.client.get(self.url_for(year)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HolidayError::Status {
                year,
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| HolidayError::Parse(e.to_string()))
    }

    /// Fetch every year in `years` and merge the successes into `dataset`.
    ///
    /// A year that fails (not yet published, network error) is skipped. The
    /// shared dataset is replaced in one write so readers never observe a
    /// half-merged state.
    pub async fn refresh(
        &self,
        years: RangeInclusive<i32>,
        dataset: &SharedHolidays,
    ) -> RefreshSummary {
        let mut merged = dataset.read().unwrap_or_else(|e| e.into_inner()).clone();
        let mut summary = RefreshSummary::default();

        for year in years {
            match self.fetch_year(year).await {
                Ok(data) => {
                    tracing::info!(year, days = data.days.len(), "holiday data downloaded");
                    merged.merge_year(&data);
                    summary.fetched.push(year);
                }
                Err(e) => {
                    tracing::warn!(year, error = %e, "holiday data unavailable");
                    summary.failed.push(year);
                }
            }
        }

        *dataset.write().unwrap_or_else(|e| e.into_inner()) = merged;
        summary
    }
}
