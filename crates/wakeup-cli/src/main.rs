use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

#[derive(Parser)]
#[command(name = "wakeup", version, about = "Wakeup alarm scheduler CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Alarm management
    Alarm {
        #[command(subcommand)]
        action: commands::alarm::AlarmAction,
    },
    /// Show what an alarm would register, without registering it
    Preview {
        /// Alarm ID (or unique prefix)
        id: String,
    },
    /// Resync one alarm, or every alarm when no ID is given
    Sync {
        /// Alarm ID (or unique prefix)
        id: Option<String>,
    },
    /// Process-start reconciliation of every alarm
    Startup,
    /// List registrations held by the local scheduler
    Pending {
        /// Only show registrations of this alarm
        #[arg(long)]
        alarm: Option<String>,
    },
    /// Dismiss a ringing registration
    Stop {
        /// Registration (instance) ID
        instance: String,
    },
    /// Snooze an alarm
    Snooze {
        /// Alarm ID (or unique prefix)
        alarm: String,
        /// Minutes until the follow-up rings (1-10, default: the alarm's snooze setting)
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Holiday dataset management
    Holidays {
        #[command(subcommand)]
        action: commands::holidays::HolidaysAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("WAKEUP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Alarm { action } => commands::alarm::run(action).await,
        Commands::Preview { id } => commands::schedule::preview(&id),
        Commands::Sync { id } => commands::schedule::sync(id.as_deref()).await,
        Commands::Startup => commands::schedule::startup().await,
        Commands::Pending { alarm } => commands::schedule::pending(alarm.as_deref()),
        Commands::Stop { instance } => commands::schedule::stop(&instance).await,
        Commands::Snooze { alarm, minutes } => commands::schedule::snooze(&alarm, minutes).await,
        Commands::Holidays { action } => commands::holidays::run(action).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
