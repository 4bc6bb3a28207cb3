use chrono::Local;
use clap::Subcommand;
use pomotray_core::settings::{load_time_worked, read_settings};
use pomotray_core::storage::open_store;
use pomotray_core::{Config, HttpExecutor};
use serde::Serialize;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's work time against the daily goal
    Today,
}

#[derive(Serialize)]
struct TodayStats {
    date: String,
    time_worked: u32,
    daily_work_time_goal: u32,
    blocks_worked: f64,
    goal_reached: bool,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let http = HttpExecutor::new()?;
    let store = open_store(config.store.backend, &http)?;

    match action {
        StatsAction::Today => {
            let today = Local::now().date_naive();
            let refs = &config.store.refs;
            let settings = read_settings(store.as_ref(), refs, &config.default_settings);
            let time_worked = load_time_worked(store.as_ref(), refs, today);
            let stats = TodayStats {
                date: today.format("%Y-%m-%d").to_string(),
                time_worked,
                daily_work_time_goal: settings.daily_work_time_goal,
                blocks_worked: f64::from(time_worked) / f64::from(settings.work_timer),
                goal_reached: time_worked >= settings.daily_work_time_goal,
            };
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
