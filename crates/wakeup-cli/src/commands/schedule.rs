//! Scheduling operations: preview, resync, startup reconciliation, and the
//! ring-time actions (stop, snooze) against the local scheduler.

use std::error::Error;

use serde::Serialize;
use wakeup_core::{Clock, Occurrence, ScheduledAlarm, StopDisposition};

use super::print_json;
use crate::context::Context;

#[derive(Serialize)]
struct PreviewView {
    alarm_id: String,
    summary: String,
    exempt_from_replenishment: bool,
    occurrences: Vec<Occurrence>,
}

#[derive(Serialize)]
struct StopView {
    instance_id: String,
    alarm_id: String,
    disposition: StopDisposition,
}

#[derive(Serialize)]
struct RingingView<'a> {
    #[serde(flatten)]
    registration: &'a ScheduledAlarm,
    ringing: bool,
}

pub fn preview(id: &str) -> Result<(), Box<dyn Error>> {
    let ctx = Context::open()?;
    let spec = ctx.resolve_alarm(id)?;
    let occurrences = ctx.coordinator.preview(&spec)?;
    print_json(&PreviewView {
        alarm_id: spec.id.to_string(),
        summary: format!("{} {}", spec.time, spec.describe_repeat()),
        exempt_from_replenishment: ctx.coordinator.is_exempt(&spec),
        occurrences,
    })
}

pub async fn sync(id: Option<&str>) -> Result<(), Box<dyn Error>> {
    let ctx = Context::open()?;
    match id {
        Some(id) => {
            let spec = ctx.resolve_alarm(id)?;
            let report = ctx.coordinator.resync_id(spec.id).await?;
            print_json(&report)
        }
        None => {
            let reports = ctx.coordinator.resync_all().await?;
            print_json(&reports)
        }
    }
}

pub async fn startup() -> Result<(), Box<dyn Error>> {
    let ctx = Context::open()?;
    let summary = ctx.coordinator.startup().await?;
    print_json(&summary)
}

pub fn pending(alarm: Option<&str>) -> Result<(), Box<dyn Error>> {
    let ctx = Context::open()?;
    let registrations = match alarm {
        Some(id) => {
            let spec = ctx.resolve_alarm(id)?;
            ctx.scheduler.registrations_for(spec.id)?
        }
        None => ctx.scheduler.registrations()?,
    };
    let now = ctx.clock.now();
    let views: Vec<RingingView<'_>> = registrations
        .iter()
        .map(|registration| RingingView {
            registration,
            ringing: !registration.is_alive_at(now),
        })
        .collect();
    print_json(&views)
}

pub async fn stop(instance: &str) -> Result<(), Box<dyn Error>> {
    let ctx = Context::open()?;
    let event = ctx
        .scheduler
        .stop(instance)?
        .ok_or_else(|| format!("no such registration: {instance}"))?;
    let disposition = ctx.coordinator.handle_stop(&event).await?;
    print_json(&StopView {
        instance_id: event.instance_id,
        alarm_id: event.alarm_id.to_string(),
        disposition,
    })
}

pub async fn snooze(alarm: &str, minutes: Option<u32>) -> Result<(), Box<dyn Error>> {
    let ctx = Context::open()?;
    let spec = ctx.resolve_alarm(alarm)?;
    let minutes = minutes.unwrap_or(spec.snooze.minutes);
    let instance_id = ctx.coordinator.snooze(spec.id, minutes).await?;
    println!("Snoozed {} for {minutes} min: {instance_id}", spec.label);
    Ok(())
}
