use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Modify, Style, Width, object::Columns},
};

use flare_core::models::{Flareup, Meal, tag_label};

/// Parse a point in time relative to `now`.
///
/// Accepts `now`, `HH:MM` (today), `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM[:SS]`,
/// RFC 3339, and relative offsets like `-3h`, `-45m`, `-2d`.
pub(crate) fn parse_when_from<Tz: TimeZone>(s: &str, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("now") {
        return Ok(now.clone());
    }

    if let Some(offset) = s.strip_prefix('-') {
        return parse_offset(offset)
            .map(|d| now.clone() - d)
            .with_context(|| format!("Invalid relative time '{s}'. Use e.g. -3h, -45m, -2d"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&now.timezone()));
    }

    let tz = now.timezone();
    let naive = if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
        now.date_naive().and_time(time)
    } else {
        ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .with_context(|| {
                format!("Invalid time '{s}'. Use now, HH:MM, YYYY-MM-DD HH:MM, or -3h")
            })?
    };

    tz.from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("Time '{s}' does not exist in the local time zone"))
}

fn parse_offset(s: &str) -> Option<Duration> {
    let unit = s.chars().last()?;
    let amount: i64 = s[..s.len() - unit.len_utf8()].trim().parse().ok()?;
    if amount < 0 {
        return None;
    }
    match unit {
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    }
}

/// [`parse_when_from`] against the local clock, defaulting to now.
pub(crate) fn parse_when(s: Option<&str>) -> Result<DateTime<Local>> {
    let now = Local::now();
    match s {
        None => Ok(now),
        Some(s) => parse_when_from(s, &now),
    }
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn format_time(timestamp_ms: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp_ms)
        .earliest()
        .map_or_else(|| "?".to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

pub(crate) fn format_clock(timestamp_ms: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp_ms)
        .earliest()
        .map_or_else(|| "--:--".to_string(), |dt| dt.format("%H:%M").to_string())
}

pub(crate) fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| tag_label(t))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub(crate) fn print_meal_table(meals: &[Meal]) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "When")]
        when: String,
        #[tabled(rename = "Meal")]
        meal_type: String,
        #[tabled(rename = "Description")]
        description: String,
        #[tabled(rename = "Tags")]
        tags: String,
        #[tabled(rename = "Via")]
        via: String,
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: m.id.clone(),
            when: format_time(m.timestamp),
            meal_type: m.meal_type.map(|t| t.to_string()).unwrap_or_default(),
            description: truncate(&m.description, 40),
            tags: truncate(&format_tags(&m.tags), 30),
            via: m.entry_type.to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Width::wrap(40)))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_flareup_table(flareups: &[Flareup]) {
    #[derive(Tabled)]
    struct FlareupRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "When")]
        when: String,
        #[tabled(rename = "Severity")]
        severity: String,
        #[tabled(rename = "Description")]
        description: String,
        #[tabled(rename = "Meals")]
        meals: usize,
    }

    let rows: Vec<FlareupRow> = flareups
        .iter()
        .map(|f| FlareupRow {
            id: f.id.clone(),
            when: format_time(f.timestamp),
            severity: f.severity.to_string(),
            description: truncate(&f.description, 40),
            meals: f.associated_meal_ids.len(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing record and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

/// Report a delete. A missing id is reported, not treated as an error.
pub(crate) fn print_deleted(kind: &str, id: &str, existed: bool, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "deleted": id, "existed": existed }));
    } else if existed {
        println!("Deleted {kind} {id}");
    } else {
        println!("No {kind} {id} to delete");
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn require_yes(yes: bool, what: &str) -> Result<()> {
    if !yes {
        bail!("Refusing to {what} without --yes");
    }
    Ok(())
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
