//! Wiring shared by every command: database, local scheduler, holiday
//! dataset and the coordinator over them.

use std::error::Error;
use std::sync::Arc;

use uuid::Uuid;
use wakeup_core::{
    AlarmDb, AlarmSpec, AlarmStore, Clock, Config, Database, HolidayCalendar, LocalScheduler,
    RegistryDb, SchedulingCoordinator, SharedHolidays, SystemClock, WorkdayOracle,
};

pub struct Context {
    pub config: Config,
    pub db: Arc<Database>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<LocalScheduler>,
    pub holidays: SharedHolidays,
    pub coordinator: Arc<SchedulingCoordinator>,
}

impl Context {
    pub fn open() -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let db = Arc::new(Database::open()?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let holidays = HolidayCalendar::load(&db)?.shared();
        let scheduler = Arc::new(
            LocalScheduler::new(db.clone(), clock.clone())
                .with_authorization(config.scheduler.authorized)
                .with_weekly_repeat(config.scheduler.native_weekly),
        );
        let coordinator = SchedulingCoordinator::new(
            scheduler.clone(),
            Arc::new(RegistryDb::new(db.clone())),
            Arc::new(AlarmDb::new(db.clone())),
            WorkdayOracle::new(holidays.clone()),
            clock.clone(),
        )
        .with_config(&config);

        Ok(Self {
            config,
            db,
            clock,
            scheduler,
            holidays,
            coordinator: Arc::new(coordinator),
        })
    }

    pub fn alarms(&self) -> &Arc<dyn AlarmStore> {
        self.coordinator.alarms()
    }

    /// Find an alarm by full ID or unique ID prefix.
    pub fn resolve_alarm(&self, id: &str) -> Result<AlarmSpec, Box<dyn Error>> {
        if let Ok(uuid) = Uuid::parse_str(id) {
            return self
                .alarms()
                .get(uuid)?
                .ok_or_else(|| format!("alarm not found: {id}").into());
        }

        let needle = id.to_ascii_lowercase();
        let mut matches: Vec<AlarmSpec> = self
            .alarms()
            .list()?
            .into_iter()
            .filter(|a| a.id.to_string().starts_with(&needle))
            .collect();
        match matches.len() {
            0 => Err(format!("alarm not found: {id}").into()),
            1 => Ok(matches.remove(0)),
            n => Err(format!("ambiguous alarm id '{id}' matches {n} alarms").into()),
        }
    }
}
