use std::collections::BTreeSet;
use std::error::Error;

use clap::{Args, Subcommand};
use serde::Serialize;
use wakeup_core::{
    AlarmSpec, AlarmStore, InstanceRegistry, RepeatMode, RepeatRule, Snooze, SyncReport,
    ValidationError,
};

use super::print_json;
use crate::context::Context;

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Create an alarm and register its upcoming instants
    Add {
        /// Time of day (HH:MM)
        #[arg(long)]
        time: String,
        #[command(flatten)]
        fields: AlarmFields,
        /// Create the alarm disabled
        #[arg(long)]
        disabled: bool,
    },
    /// List alarms
    List,
    /// Show one alarm with its registered instances
    Show {
        /// Alarm ID (or unique prefix)
        id: String,
    },
    /// Change an alarm and resync it
    Edit {
        /// Alarm ID (or unique prefix)
        id: String,
        /// Time of day (HH:MM)
        #[arg(long)]
        time: Option<String>,
        #[command(flatten)]
        fields: AlarmFields,
        /// Re-enable snooze
        #[arg(long, conflicts_with = "no_snooze")]
        snooze: bool,
    },
    /// Enable an alarm
    Enable {
        /// Alarm ID (or unique prefix)
        id: String,
    },
    /// Disable an alarm, cancelling every registration
    Disable {
        /// Alarm ID (or unique prefix)
        id: String,
    },
    /// Remove an alarm, cancelling every registration
    Remove {
        /// Alarm ID (or unique prefix)
        id: String,
    },
}

#[derive(Args)]
pub struct AlarmFields {
    /// Alarm label
    #[arg(long)]
    label: Option<String>,
    /// Sound name
    #[arg(long)]
    sound: Option<String>,
    /// Repeat mode: once, weekly, monthly, yearly, workday
    #[arg(long)]
    repeat: Option<String>,
    /// Weekdays (1-7, Sunday = 1) or days of the month, comma-separated
    #[arg(long, value_delimiter = ',')]
    days: Option<Vec<u32>>,
    /// Anniversary for yearly alarms (MM-DD)
    #[arg(long)]
    date: Option<String>,
    /// Snooze duration in minutes (1-10)
    #[arg(long)]
    snooze_minutes: Option<u32>,
    /// Turn snooze off
    #[arg(long)]
    no_snooze: bool,
}

#[derive(Serialize)]
struct AlarmView<'a> {
    #[serde(flatten)]
    alarm: &'a AlarmSpec,
    summary: String,
    instances: Vec<String>,
}

#[derive(Serialize)]
struct Applied<'a> {
    alarm: &'a AlarmSpec,
    sync: SyncReport,
}

pub async fn run(action: AlarmAction) -> Result<(), Box<dyn Error>> {
    let ctx = Context::open()?;
    match action {
        AlarmAction::Add {
            time,
            fields,
            disabled,
        } => {
            let defaults = &ctx.config.defaults;
            let mut spec = AlarmSpec::new(time.parse()?)
                .with_label(defaults.label.clone())
                .with_snooze(Snooze {
                    enabled: true,
                    minutes: defaults.snooze_minutes,
                });
            spec.sound_name = defaults.sound_name.clone();
            spec.enabled = !disabled;
            fields.apply(&mut spec)?;
            spec.validate()?;

            ctx.alarms().upsert(&spec)?;
            let sync = ctx.coordinator.resync(&spec).await?;
            print_json(&Applied { alarm: &spec, sync })?;
        }
        AlarmAction::List => {
            let alarms = ctx.alarms().list()?;
            let views = alarms
                .iter()
                .map(|a| view(&ctx, a))
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&views)?;
        }
        AlarmAction::Show { id } => {
            let spec = ctx.resolve_alarm(&id)?;
            print_json(&view(&ctx, &spec)?)?;
        }
        AlarmAction::Edit {
            id,
            time,
            fields,
            snooze,
        } => {
            let mut spec = ctx.resolve_alarm(&id)?;
            if let Some(time) = time {
                spec.time = time.parse()?;
            }
            if snooze {
                spec.snooze.enabled = true;
            }
            fields.apply(&mut spec)?;
            spec.validate()?;

            ctx.alarms().upsert(&spec)?;
            let sync = ctx.coordinator.resync(&spec).await?;
            print_json(&Applied { alarm: &spec, sync })?;
        }
        AlarmAction::Enable { id } => set_enabled(&ctx, &id, true).await?,
        AlarmAction::Disable { id } => set_enabled(&ctx, &id, false).await?,
        AlarmAction::Remove { id } => {
            let spec = ctx.resolve_alarm(&id)?;
            let cancelled = ctx.coordinator.remove(spec.id).await?;
            ctx.alarms().delete(spec.id)?;
            println!("Removed alarm {} ({cancelled} registrations cancelled)", spec.id);
        }
    }
    Ok(())
}

async fn set_enabled(ctx: &Context, id: &str, enabled: bool) -> Result<(), Box<dyn Error>> {
    let mut spec = ctx.resolve_alarm(id)?;
    spec.enabled = enabled;
    ctx.alarms().set_enabled(spec.id, enabled)?;
    let sync = ctx.coordinator.resync(&spec).await?;
    print_json(&Applied { alarm: &spec, sync })
}

fn view<'a>(ctx: &Context, alarm: &'a AlarmSpec) -> Result<AlarmView<'a>, Box<dyn Error>> {
    Ok(AlarmView {
        alarm,
        summary: format!("{} {}", alarm.time, alarm.describe_repeat()),
        instances: ctx.coordinator.registry().ids(alarm.id)?,
    })
}

impl AlarmFields {
    fn apply(self, spec: &mut AlarmSpec) -> Result<(), ValidationError> {
        if let Some(label) = self.label {
            spec.label = label;
        }
        if let Some(sound) = self.sound {
            spec.sound_name = sound;
        }
        if let Some(minutes) = self.snooze_minutes {
            spec.snooze.minutes = minutes;
        }
        if self.no_snooze {
            spec.snooze.enabled = false;
        }

        let mode = match &self.repeat {
            Some(mode) => mode.parse()?,
            None if self.days.is_some() || self.date.is_some() => spec.mode(),
            None => return Ok(()),
        };
        spec.repeat = repeat_rule(mode, self.days, self.date.as_deref(), spec)?;
        Ok(())
    }
}

/// Build a repeat rule. Payload not given on the command line is carried
/// over from the alarm's current rule when the mode matches.
fn repeat_rule(
    mode: RepeatMode,
    days: Option<Vec<u32>>,
    date: Option<&str>,
    current: &AlarmSpec,
) -> Result<RepeatRule, ValidationError> {
    let rule = match mode {
        RepeatMode::Once => RepeatRule::Once,
        RepeatMode::Workday => RepeatRule::Workday,
        RepeatMode::Weekly => {
            let days: BTreeSet<u8> = match (days, &current.repeat) {
                (Some(days), _) => days
                    .into_iter()
                    .map(|d| {
                        u8::try_from(d).map_err(|_| ValidationError::OutOfRange {
                            field: "weekday".into(),
                            value: d.into(),
                            min: 1,
                            max: 7,
                        })
                    })
                    .collect::<Result<_, _>>()?,
                (None, RepeatRule::Weekly { days }) => days.clone(),
                (None, _) => BTreeSet::new(),
            };
            RepeatRule::Weekly { days }
        }
        RepeatMode::Monthly => {
            let days: BTreeSet<u32> = match (days, &current.repeat) {
                (Some(days), _) => days.into_iter().collect(),
                (None, RepeatRule::Monthly { days }) => days.clone(),
                (None, _) => BTreeSet::new(),
            };
            RepeatRule::Monthly { days }
        }
        RepeatMode::Yearly => match (date, &current.repeat) {
            (Some(date), _) => {
                let (month, day) = parse_month_day(date)?;
                RepeatRule::Yearly { month, day }
            }
            (None, RepeatRule::Yearly { month, day }) => RepeatRule::Yearly {
                month: *month,
                day: *day,
            },
            (None, _) => {
                return Err(ValidationError::InvalidValue {
                    field: "date".into(),
                    message: "yearly alarms need --date MM-DD".into(),
                })
            }
        },
    };
    Ok(rule)
}

fn parse_month_day(s: &str) -> Result<(u32, u32), ValidationError> {
    let invalid = || ValidationError::InvalidValue {
        field: "date".into(),
        message: format!("expected MM-DD, got '{s}'"),
    };
    let (m, d) = s.trim().split_once('-').ok_or_else(invalid)?;
    let month = m.parse().map_err(|_| invalid())?;
    let day = d.parse().map_err(|_| invalid())?;
    Ok((month, day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wakeup_core::TimeOfDay;

    fn spec() -> AlarmSpec {
        AlarmSpec::new(TimeOfDay::new(7, 0).unwrap())
    }

    #[test]
    fn month_day_parses() {
        assert_eq!(parse_month_day("02-29").unwrap(), (2, 29));
        assert!(parse_month_day("0229").is_err());
        assert!(parse_month_day("xx-01").is_err());
    }

    #[test]
    fn weekly_days_carry_over_when_not_given() {
        let mut current = spec();
        current.repeat = RepeatRule::Weekly {
            days: BTreeSet::from([2, 4]),
        };
        let rule = repeat_rule(RepeatMode::Weekly, None, None, &current).unwrap();
        assert_eq!(rule, current.repeat);

        let rule = repeat_rule(RepeatMode::Weekly, Some(vec![1]), None, &current).unwrap();
        assert_eq!(
            rule,
            RepeatRule::Weekly {
                days: BTreeSet::from([1])
            }
        );
    }

    #[test]
    fn yearly_requires_a_date() {
        assert!(repeat_rule(RepeatMode::Yearly, None, None, &spec()).is_err());
        let rule = repeat_rule(RepeatMode::Yearly, None, Some("12-25"), &spec()).unwrap();
        assert_eq!(rule, RepeatRule::Yearly { month: 12, day: 25 });
    }

    #[test]
    fn fields_without_repeat_leave_the_rule_alone() {
        let mut current = spec();
        let fields = AlarmFields {
            label: Some("Gym".into()),
            sound: None,
            repeat: None,
            days: None,
            date: None,
            snooze_minutes: Some(8),
            no_snooze: false,
        };
        fields.apply(&mut current).unwrap();
        assert_eq!(current.label, "Gym");
        assert_eq!(current.snooze.minutes, 8);
        assert_eq!(current.repeat, RepeatRule::Once);
    }

    #[test]
    fn days_alone_keep_the_current_mode() {
        let mut current = spec();
        current.repeat = RepeatRule::Monthly {
            days: BTreeSet::from([1]),
        };
        let fields = AlarmFields {
            label: None,
            sound: None,
            repeat: None,
            days: Some(vec![15, 30]),
            date: None,
            snooze_minutes: None,
            no_snooze: true,
        };
        fields.apply(&mut current).unwrap();
        assert_eq!(
            current.repeat,
            RepeatRule::Monthly {
                days: BTreeSet::from([15, 30])
            }
        );
        assert!(!current.snooze.enabled);
    }
}
