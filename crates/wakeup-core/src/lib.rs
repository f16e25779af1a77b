//! # Wakeup Core Library
//!
//! This library keeps logical, possibly-recurring alarms alive on an external
//! scheduler that only understands one-shot (and, optionally, weekly) fire
//! instants. It follows the same CLI-first layout as the rest of the
//! workspace: everything is reachable from the `wakeup` binary, and any host
//! application is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Workday Oracle**: classifies a day as holiday, make-up workday or an
//!   ordinary weekday/weekend from a downloadable holiday dataset
//! - **Recurrence Expander**: turns a repeat rule into a bounded horizon of
//!   concrete fire instants
//! - **Instance Registry**: remembers which scheduler ids belong to which alarm
//! - **Scheduling Coordinator**: cancel, expand, register, record; plus the
//!   replenishment check that tops the horizon back up as instants fire
//! - **Storage**: SQLite for alarms, registry and the local scheduler; TOML
//!   for configuration
//!
//! ## Key Components
//!
//! - [`SchedulingCoordinator`]: the orchestration entry point
//! - [`AlarmScheduler`]: trait implemented by external one-shot schedulers
//! - [`InstanceRegistry`]: alarm id to scheduler id bookkeeping
//! - [`WorkdayOracle`]: holiday-aware day classification

pub mod alarm;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod expand;
pub mod holiday;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use alarm::{AlarmSpec, RepeatMode, RepeatRule, Snooze, TimeOfDay};
pub use clock::{Clock, FixedClock, SystemClock};
pub use coordinator::{ReplenishOutcome, SchedulingCoordinator, StartupSummary, SyncReport};
pub use error::{
    ConfigError, CoreError, DatabaseError, HolidayError, Result, SchedulerError, ValidationError,
};
pub use events::{spawn_stop_listener, StopDisposition, StopEvent};
pub use expand::{expand, HorizonPolicy, Occurrence};
pub use holiday::{
    DayClassification, DayKind, HolidayCalendar, HolidayFetcher, HolidayYear, SharedHolidays,
    WorkdayOracle,
};
pub use registry::{InstanceRegistry, MemoryRegistry};
pub use scheduler::{
    AlarmScheduler, Authorization, LocalScheduler, MemoryScheduler, Presentation, ScheduledAlarm,
    SnoozeAction, Trigger,
};
pub use storage::{AlarmDb, Config, Database, RegistryDb};
pub use store::{AlarmStore, MemoryAlarmStore};
