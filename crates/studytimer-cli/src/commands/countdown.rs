use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::Serialize;
use studytimer_core::{Config, CountdownTimerConfig};
use uuid::Uuid;

use super::{open_oneshot, print_json, CliResult};

#[derive(Subcommand)]
pub enum CountdownAction {
    /// List countdowns with time remaining
    List,
    /// Add a countdown
    Add {
        /// Countdown name
        name: String,
        /// Target date (RFC 3339, e.g. 2027-06-17T10:00:00+03:00)
        target: String,
        /// Display color
        #[arg(long)]
        color: Option<String>,
    },
    /// Edit a countdown's name, target date or color
    Edit {
        /// Countdown ID
        id: Uuid,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New target date (RFC 3339)
        #[arg(long)]
        target: Option<String>,
        /// New display color
        #[arg(long)]
        color: Option<String>,
    },
    /// Remove a countdown
    Remove {
        /// Countdown ID
        id: Uuid,
    },
}

#[derive(Serialize)]
struct CountdownView<'a> {
    #[serde(flatten)]
    countdown: &'a CountdownTimerConfig,
    remaining_secs: u64,
    expired: bool,
}

pub fn run(action: CountdownAction) -> CliResult {
    let config = Config::load()?;
    let mut service = open_oneshot(&config)?;

    match action {
        CountdownAction::List => {
            let now = Utc::now();
            let views: Vec<CountdownView<'_>> = service
                .countdowns()
                .iter()
                .map(|countdown| CountdownView {
                    countdown,
                    remaining_secs: countdown.time_remaining(now),
                    expired: countdown.is_expired(now),
                })
                .collect();
            print_json(&views)?;
        }
        CountdownAction::Add { name, target, color } => {
            let target = parse_target(&target)?;
            let color = color.unwrap_or_else(|| config.countdown.default_color.clone());
            let countdown = CountdownTimerConfig::new(name, target, color)?;
            print_json(&service.add_countdown(countdown)?)?;
        }
        CountdownAction::Edit {
            id,
            name,
            target,
            color,
        } => {
            let target = target.as_deref().map(parse_target).transpose()?;
            print_json(&service.update_countdown(id, name, target, color)?)?;
        }
        CountdownAction::Remove { id } => {
            print_json(&service.remove_countdown(id)?)?;
        }
    }

    service.on_enter_background()?;
    Ok(())
}

fn parse_target(target: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(target)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid target date '{target}': {e}"))
}
