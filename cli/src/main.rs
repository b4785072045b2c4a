mod commands;
mod config;
mod dictation;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    MealFields, cmd_clear, cmd_flareup_before, cmd_flareup_delete, cmd_flareup_list, cmd_flareup_log,
    cmd_flareup_show, cmd_guess, cmd_meal_add, cmd_meal_before, cmd_meal_delete, cmd_meal_edit,
    cmd_meal_list, cmd_meal_recent, cmd_meal_show, cmd_settings_set, cmd_settings_show,
    cmd_storage, cmd_tags, cmd_timeline,
};
use crate::config::Config;
use crate::logging::{Verbosity, init_logging};
use flare_core::models::{CORRELATION_WINDOW, PREVIEW_LIMIT};
use flare_core::service::JournalService;

#[derive(Parser)]
#[command(
    name = "flare",
    version,
    about = "A food and flare-up journal",
    long_about = "Log what you eat and when symptoms flare up. Each flare-up is linked \
                  to the meals eaten just before it so patterns are easier to spot."
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log and browse meals
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Log and browse flare-ups
    Flareup {
        #[command(subcommand)]
        command: FlareupCommands,
    },
    /// Meals and flare-ups together, grouped by day
    Timeline {
        /// Only show the most recent N days that have entries
        #[arg(short, long)]
        days: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// List predefined tags and custom tags used so far
    Tags {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest a meal type for a time of day
    Guess {
        /// Time to guess for (default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show how much storage the journal uses
    Storage {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every meal, flare-up, and setting
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Log a meal
    Add {
        /// What was eaten
        #[arg(required_unless_present = "voice")]
        description: Option<String>,
        /// Dictate the description instead of passing it as an argument
        #[arg(long, conflicts_with = "description")]
        voice: bool,
        #[command(flatten)]
        fields: MealFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all meals, newest first
    List {
        /// Show at most N meals
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the most recent meals
    Recent {
        /// Number of meals to show
        #[arg(short, default_value_t = PREVIEW_LIMIT)]
        n: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one meal
    Show {
        /// Meal ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a logged meal
    Edit {
        /// Meal ID
        id: String,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// Remove all tags
        #[arg(long, conflicts_with_all = ["tags", "custom_tags"])]
        clear_tags: bool,
        #[command(flatten)]
        fields: MealFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal
    Delete {
        /// Meal ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Meals eaten strictly before a point in time, newest first
    Before {
        /// Point in time (now, HH:MM, YYYY-MM-DD HH:MM, -3h, ...)
        when: String,
        /// Show at most N meals
        #[arg(short, long, default_value_t = CORRELATION_WINDOW)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FlareupCommands {
    /// Log a flare-up and link it to the meals eaten before it
    Log {
        /// What happened
        description: String,
        /// Severity: mild, moderate, severe
        #[arg(short, long)]
        severity: String,
        /// When it started (default: now)
        #[arg(long)]
        at: Option<String>,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List flare-ups, newest first
    List {
        /// Show at most N flare-ups
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a flare-up with its linked meals
    Show {
        /// Flare-up ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a flare-up
    Delete {
        /// Flare-up ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Flare-ups that started strictly before a point in time, newest first
    Before {
        /// Point in time (now, HH:MM, YYYY-MM-DD HH:MM, -3h, ...)
        when: String,
        /// Show at most N flare-ups
        #[arg(short, long, default_value_t = PREVIEW_LIMIT)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change settings
    Set {
        /// Theme: light, dark, system
        #[arg(long)]
        theme: Option<String>,
        /// Turn reminders on or off
        #[arg(long, value_parser = parse_on_off)]
        notifications: Option<bool>,
        /// Reminder time as HH:MM (repeatable, replaces the stored list)
        #[arg(long = "reminder")]
        reminders: Vec<String>,
        /// Remove all reminder times
        #[arg(long, conflicts_with = "reminders")]
        clear_reminders: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_on_off(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(format!("expected on or off, got '{s}'")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(Verbosity::from_flags(cli.verbose, cli.quiet));

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    tracing::debug!(path = %config.db_path.display(), "opening journal");
    let mut service = JournalService::new(&config.db_path)?;

    match cli.command {
        Commands::Meal { command } => match command {
            MealCommands::Add {
                description,
                voice,
                fields,
                json,
            } => cmd_meal_add(&service, description, voice, fields, json).await,
            MealCommands::List { limit, json } => cmd_meal_list(&service, limit, json),
            MealCommands::Recent { n, json } => cmd_meal_recent(&service, n, json),
            MealCommands::Show { id, json } => cmd_meal_show(&service, &id, json),
            MealCommands::Edit {
                id,
                description,
                clear_tags,
                fields,
                json,
            } => cmd_meal_edit(&service, &id, description, clear_tags, fields, json),
            MealCommands::Delete { id, json } => cmd_meal_delete(&service, &id, json),
            MealCommands::Before { when, limit, json } => {
                cmd_meal_before(&service, &when, limit, json)
            }
        },
        Commands::Flareup { command } => match command {
            FlareupCommands::Log {
                description,
                severity,
                at,
                notes,
                json,
            } => cmd_flareup_log(
                &service,
                &description,
                &severity,
                at.as_deref(),
                notes,
                json,
            ),
            FlareupCommands::List { limit, json } => cmd_flareup_list(&service, limit, json),
            FlareupCommands::Show { id, json } => cmd_flareup_show(&service, &id, json),
            FlareupCommands::Delete { id, json } => cmd_flareup_delete(&service, &id, json),
            FlareupCommands::Before { when, limit, json } => {
                cmd_flareup_before(&service, &when, limit, json)
            }
        },
        Commands::Timeline { days, json } => cmd_timeline(&service, days, json),
        Commands::Settings { command } => match command {
            SettingsCommands::Show { json } => cmd_settings_show(&service, json),
            SettingsCommands::Set {
                theme,
                notifications,
                reminders,
                clear_reminders,
                json,
            } => cmd_settings_set(
                &service,
                theme.as_deref(),
                notifications,
                &reminders,
                clear_reminders,
                json,
            ),
        },
        Commands::Tags { json } => cmd_tags(&service, json),
        Commands::Guess { at, json } => cmd_guess(at.as_deref(), json),
        Commands::Storage { json } => cmd_storage(&service, json),
        Commands::Clear { yes, json } => cmd_clear(&mut service, yes, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_on_off() {
        assert_eq!(parse_on_off("on"), Ok(true));
        assert_eq!(parse_on_off("OFF"), Ok(false));
        assert!(parse_on_off("maybe").is_err());
    }

    #[test]
    fn test_meal_add_requires_description_or_voice() {
        assert!(Cli::try_parse_from(["flare", "meal", "add"]).is_err());
        assert!(Cli::try_parse_from(["flare", "meal", "add", "toast"]).is_ok());
        assert!(Cli::try_parse_from(["flare", "meal", "add", "--voice"]).is_ok());
        assert!(Cli::try_parse_from(["flare", "meal", "add", "toast", "--voice"]).is_err());
    }

    #[test]
    fn test_meal_add_flags() {
        let cli = Cli::try_parse_from([
            "flare",
            "-v",
            "meal",
            "add",
            "Chicken sandwich",
            "--at",
            "12:30",
            "-t",
            "poultry",
            "--custom-tag",
            "aioli",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Meal {
            command:
                MealCommands::Add {
                    description,
                    fields,
                    json,
                    ..
                },
        } = cli.command
        else {
            panic!("expected meal add");
        };
        assert_eq!(description.as_deref(), Some("Chicken sandwich"));
        assert_eq!(fields.at.as_deref(), Some("12:30"));
        assert_eq!(fields.tags, vec!["poultry"]);
        assert_eq!(fields.custom_tags, vec!["aioli"]);
        assert!(json);
    }

    #[test]
    fn test_meal_type_flags_conflict() {
        assert!(
            Cli::try_parse_from([
                "flare",
                "meal",
                "add",
                "toast",
                "--meal-type",
                "lunch",
                "--no-meal-type"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_recent_default_count() {
        let cli = Cli::try_parse_from(["flare", "meal", "recent"]).unwrap();
        let Commands::Meal {
            command: MealCommands::Recent { n, .. },
        } = cli.command
        else {
            panic!("expected meal recent");
        };
        assert_eq!(n, PREVIEW_LIMIT);
    }

    #[test]
    fn test_flareup_log_requires_severity() {
        assert!(Cli::try_parse_from(["flare", "flareup", "log", "cramps"]).is_err());
        assert!(
            Cli::try_parse_from(["flare", "flareup", "log", "cramps", "-s", "severe"]).is_ok()
        );
    }
}
