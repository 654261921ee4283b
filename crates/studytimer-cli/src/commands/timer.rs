use clap::Subcommand;
use studytimer_core::{Config, Database, Event, PomodoroTimerConfig, TimerService};
use uuid::Uuid;

use super::{open_oneshot, print_json, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// List pomodoro timer definitions
    List,
    /// Add a pomodoro timer definition
    Add {
        /// Timer name
        name: String,
        /// Work phase length in minutes
        #[arg(long)]
        work: Option<u32>,
        /// Short break length in minutes
        #[arg(long = "break")]
        break_min: Option<u32>,
        /// Long break length in minutes
        #[arg(long)]
        long_break: Option<u32>,
        /// Work sessions before a long break
        #[arg(long)]
        sessions: Option<u32>,
    },
    /// Remove a pomodoro timer definition
    Remove {
        /// Timer ID
        id: Uuid,
    },
    /// Select the timer the engine runs
    Select {
        /// Timer ID
        id: Uuid,
    },
    /// Start a work phase (or resume if paused)
    Start,
    /// Pause the running phase
    Pause,
    /// Resume a paused phase
    Resume,
    /// Stop the cycle, keeping lifetime totals
    Stop,
    /// Reset to the start of the cycle
    Reset,
    /// Skip to the next phase
    Skip,
    /// Zero lifetime totals
    ResetStats,
    /// Print current timer state as JSON
    Status,
}

pub fn run(action: TimerAction) -> CliResult {
    let config = Config::load()?;
    let mut service = open_oneshot(&config)?;

    match action {
        TimerAction::List => print_json(service.pomodoro_timers())?,
        TimerAction::Add {
            name,
            work,
            break_min,
            long_break,
            sessions,
        } => {
            let defaults = &config.pomodoro;
            let timer = PomodoroTimerConfig::new(
                name,
                u64::from(work.unwrap_or(defaults.work_duration_min)) * 60,
                u64::from(break_min.unwrap_or(defaults.break_duration_min)) * 60,
                u64::from(long_break.unwrap_or(defaults.long_break_duration_min)) * 60,
                sessions.unwrap_or(defaults.sessions_before_long_break),
            )?;
            print_json(&service.add_pomodoro_timer(timer)?)?;
        }
        TimerAction::Remove { id } => print_json(&service.remove_pomodoro_timer(id)?)?,
        TimerAction::Select { id } => {
            let event = service.select_timer(id)?;
            emit(&service, Some(event))?;
        }
        TimerAction::Start => {
            let event = service.start()?;
            emit(&service, event)?;
        }
        TimerAction::Pause => {
            let event = service.pause()?;
            emit(&service, event)?;
        }
        TimerAction::Resume => {
            let event = service.resume()?;
            emit(&service, event)?;
        }
        TimerAction::Stop => {
            let event = service.stop()?;
            emit(&service, Some(event))?;
        }
        TimerAction::Reset => {
            let event = service.reset()?;
            emit(&service, Some(event))?;
        }
        TimerAction::Skip => {
            let event = service.skip_to_next_phase()?;
            emit(&service, event)?;
        }
        TimerAction::ResetStats => {
            let event = service.reset_stats()?;
            emit(&service, Some(event))?;
        }
        TimerAction::Status => print_json(&service.status())?,
    }

    service.on_enter_background()?;
    Ok(())
}

/// Print the command's event, or the unchanged state when it was a no-op.
fn emit(service: &TimerService<Database>, event: Option<Event>) -> CliResult {
    match event {
        Some(event) => print_json(&event),
        None => print_json(&service.status()),
    }
}
