//! `config.toml`: engine tuning and CLI defaults.
//!
//! Stores:
//! - Lookahead windows for the expanded repeat modes
//! - The replenishment floor
//! - Local scheduler behaviour
//! - Holiday dataset source
//! - Defaults for newly created alarms
//!
//! Configuration is stored at `~/.config/wakeup/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::alarm::{DEFAULT_LABEL, DEFAULT_SNOOZE_MINUTES, DEFAULT_SOUND};
use crate::error::{ConfigError, Result};
use crate::expand::HorizonPolicy;

pub const DEFAULT_HOLIDAY_BASE_URL: &str = "https://cdn.jsdelivr.net/gh/NateScarlet/holiday-cn@master";

/// Lookahead windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonConfig {
    #[serde(default = "default_monthly_months")]
    pub monthly_months: u32,
    #[serde(default = "default_yearly_years")]
    pub yearly_years: u32,
    #[serde(default = "default_workday_days")]
    pub workday_days: u32,
    /// Explicit weekly expansion when native repeat is unavailable.
    #[serde(default = "default_weekly_fallback_weeks")]
    pub weekly_fallback_weeks: u32,
}

/// Replenishment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplenishConfig {
    /// Alive registrations below which an alarm is resynced.
    #[serde(default = "default_min_alive")]
    pub min_alive: usize,
}

/// Local scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub native_weekly: bool,
    /// Answer given to authorization requests.
    #[serde(default = "default_true")]
    pub authorized: bool,
}

/// Holiday dataset source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidaysConfig {
    #[serde(default = "default_holiday_base_url")]
    pub base_url: String,
    #[serde(default = "default_one")]
    pub years_back: i32,
    #[serde(default = "default_one")]
    pub years_ahead: i32,
}

/// Defaults for new alarms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_sound_name")]
    pub sound_name: String,
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,
}

/// Everything read from `config.toml`. Missing sections take defaults.
///
/// Serialized to/from TOML at `~/.config/wakeup/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub horizon: HorizonConfig,
    #[serde(default)]
    pub replenish: ReplenishConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub holidays: HolidaysConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

// Default functions
fn default_monthly_months() -> u32 {
    13
}
fn default_yearly_years() -> u32 {
    6
}
fn default_workday_days() -> u32 {
    31
}
fn default_weekly_fallback_weeks() -> u32 {
    4
}
fn default_min_alive() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_one() -> i32 {
    1
}
fn default_holiday_base_url() -> String {
    DEFAULT_HOLIDAY_BASE_URL.into()
}
fn default_label() -> String {
    DEFAULT_LABEL.into()
}
fn default_sound_name() -> String {
    DEFAULT_SOUND.into()
}
fn default_snooze_minutes() -> u32 {
    DEFAULT_SNOOZE_MINUTES
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            monthly_months: default_monthly_months(),
            yearly_years: default_yearly_years(),
            workday_days: default_workday_days(),
            weekly_fallback_weeks: default_weekly_fallback_weeks(),
        }
    }
}

impl Default for ReplenishConfig {
    fn default() -> Self {
        Self { min_alive: 5 }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            native_weekly: true,
            authorized: true,
        }
    }
}

impl Default for HolidaysConfig {
    fn default() -> Self {
        Self {
            base_url: default_holiday_base_url(),
            years_back: 1,
            years_ahead: 1,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            sound_name: default_sound_name(),
            snooze_minutes: default_snooze_minutes(),
        }
    }
}

impl HorizonConfig {
    /// Reject windows outside what the expander can cover.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let checks = [
            ("horizon.monthly_months", self.monthly_months, HorizonPolicy::MONTHLY_MONTHS),
            ("horizon.yearly_years", self.yearly_years, HorizonPolicy::YEARLY_YEARS),
            ("horizon.workday_days", self.workday_days, HorizonPolicy::WORKDAY_DAYS),
            (
                "horizon.weekly_fallback_weeks",
                self.weekly_fallback_weeks,
                HorizonPolicy::WEEKLY_FALLBACK_WEEKS,
            ),
        ];
        for (key, value, range) in checks {
            if !range.contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!(
                        "{value} is outside {}..={}",
                        range.start(),
                        range.end()
                    ),
                });
            }
        }
        Ok(())
    }
}

impl HolidaysConfig {
    /// Years to refresh around `current_year`.
    pub fn years_around(&self, current_year: i32) -> std::ops::RangeInclusive<i32> {
        (current_year - self.years_back.max(0))..=(current_year + self.years_ahead.max(0))
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => value
                    .parse::<bool>()
                    .map(serde_json::Value::Bool)
                    .map_err(|e| invalid(e.to_string()))?,
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<i64>() {
                        serde_json::Value::Number(n.into())
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as integer")));
                    }
                }
                serde_json::Value::Object(_) => return Err(unknown()),
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// Path of `config.toml` in the data directory.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if the file is missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Self = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.horizon.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Overwrite the stored configuration with defaults.
    pub fn reset() -> Result<Self> {
        let cfg = Self::default();
        cfg.save()?;
        Ok(cfg)
    }

    /// Leaf value at a dotted key such as `horizon.monthly_months`.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, keeping the field's type.
    /// Does not persist; call [`Config::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or a horizon window leaves its allowed range. `self` is unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.horizon.validate()?;
        *self = updated;
        Ok(())
    }

    /// Every leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    pub fn horizon_policy(&self) -> HorizonPolicy {
        HorizonPolicy {
            monthly_months: self.horizon.monthly_months,
            yearly_years: self.horizon.yearly_years,
            workday_days: self.horizon.workday_days,
            weekly_fallback_weeks: self.horizon.weekly_fallback_weeks,
            native_weekly: self.scheduler.native_weekly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.horizon.monthly_months, 13);
        assert_eq!(parsed.replenish.min_alive, 5);
        assert_eq!(parsed.defaults.sound_name, "Bell Tower");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[horizon]\nworkday_days = 10\n").unwrap();
        assert_eq!(parsed.horizon.workday_days, 10);
        assert_eq!(parsed.horizon.yearly_years, 6);
        assert!(parsed.scheduler.native_weekly);
        assert_eq!(parsed.holidays.base_url, DEFAULT_HOLIDAY_BASE_URL);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("scheduler.native_weekly").as_deref(), Some("true"));
        assert_eq!(cfg.get("horizon.workday_days").as_deref(), Some("31"));
        assert_eq!(cfg.get("defaults.label").as_deref(), Some("Alarm"));
        assert!(cfg.get("horizon.missing_key").is_none());
        assert!(cfg.get("horizon").is_none());
    }

    #[test]
    fn set_keeps_field_types() {
        let mut cfg = Config::default();
        cfg.set("scheduler.authorized", "false").unwrap();
        cfg.set("replenish.min_alive", "3").unwrap();
        cfg.set("defaults.sound_name", "Chimes").unwrap();
        assert!(!cfg.scheduler.authorized);
        assert_eq!(cfg.replenish.min_alive, 3);
        assert_eq!(cfg.defaults.sound_name, "Chimes");
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("horizon.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            cfg.set("horizon", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("scheduler.native_weekly", "not_a_bool"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("replenish.min_alive", "-1"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg.replenish.min_alive, 5);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.horizon.monthly_months, 13);
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_keeps_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.set("horizon.yearly_years", "3").unwrap();
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().horizon.yearly_years, 3);
    }

    #[test]
    fn unparsable_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "horizon = [").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn entries_lists_leaf_keys() {
        let entries = Config::default().entries();
        assert!(entries
            .iter()
            .any(|(k, v)| k == "replenish.min_alive" && v == "5"));
        assert!(entries.iter().all(|(k, _)| k.contains('.')));
    }

    #[test]
    fn horizon_policy_follows_config() {
        let mut cfg = Config::default();
        cfg.set("scheduler.native_weekly", "false").unwrap();
        cfg.set("horizon.workday_days", "7").unwrap();
        let policy = cfg.horizon_policy();
        assert!(!policy.native_weekly);
        assert_eq!(policy.workday_days, 7);
        assert_eq!(policy.monthly_months, 13);
    }

    #[test]
    fn set_rejects_horizon_out_of_range() {
        let mut cfg = Config::default();
        for value in ["0", "100000000"] {
            match cfg.set("horizon.workday_days", value) {
                Err(ConfigError::InvalidValue { key, .. }) => {
                    assert_eq!(key, "horizon.workday_days")
                }
                other => panic!("expected InvalidValue for {value}, got {other:?}"),
            }
        }
        assert!(matches!(
            cfg.set("horizon.monthly_months", "3000000000"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg.horizon.workday_days, 31);
        assert_eq!(cfg.horizon.monthly_months, 13);

        cfg.set("horizon.workday_days", "366").unwrap();
        assert_eq!(cfg.horizon.workday_days, 366);
    }

    #[test]
    fn load_rejects_horizon_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[horizon]\nmonthly_months = 0\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("horizon.monthly_months"), "{err}");

        std::fs::write(&path, "[horizon]\nyearly_years = 4000000000\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn holiday_years_window() {
        let cfg = HolidaysConfig::default();
        assert_eq!(cfg.years_around(2026), 2025..=2027);
    }
}
