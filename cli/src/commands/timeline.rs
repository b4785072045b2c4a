use anyhow::Result;
use chrono::Local;

use flare_core::service::JournalService;
use flare_core::timeline::{TimelineGroup, TimelineItem};

use super::helpers::{format_clock, format_tags, print_json, today, truncate};

pub(crate) fn cmd_timeline(service: &JournalService, days: Option<usize>, json: bool) -> Result<()> {
    let mut groups = service.timeline(today(), &Local)?;
    if let Some(days) = days {
        groups.truncate(days);
    }

    if json {
        return print_json(&groups);
    }
    if groups.is_empty() {
        println!("Nothing logged yet.");
        return Ok(());
    }
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_group(group);
    }
    Ok(())
}

fn print_group(group: &TimelineGroup) {
    println!("{}", group.label);
    for item in &group.items {
        println!("  {}", item_line(item));
    }
}

fn item_line(item: &TimelineItem) -> String {
    match item {
        TimelineItem::Meal(m) => {
            let kind = m.meal_type.map_or_else(|| "meal".to_string(), |t| t.to_string());
            let mut line = format!(
                "{}  {kind:<9}  {}",
                format_clock(m.timestamp),
                truncate(&m.description, 50)
            );
            if !m.tags.is_empty() {
                line.push_str(&format!(" [{}]", format_tags(&m.tags)));
            }
            line
        }
        TimelineItem::Flareup(f) => format!(
            "{}  {:<9}  {} ({} flare-up, {} linked meals)",
            format_clock(f.timestamp),
            "FLARE-UP",
            truncate(&f.description, 50),
            f.severity,
            f.associated_meal_ids.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flare_core::models::{EntryType, Flareup, Meal, MealType, Severity};

    #[test]
    fn test_item_lines() {
        let meal = TimelineItem::Meal(Meal {
            id: "m".to_string(),
            timestamp: 0,
            entry_type: EntryType::Text,
            meal_type: Some(MealType::Lunch),
            description: "Chicken sandwich".to_string(),
            notes: None,
            tags: vec!["poultry".to_string(), "custom:aioli".to_string()],
        });
        let line = item_line(&meal);
        assert!(line.contains("lunch"));
        assert!(line.ends_with("Chicken sandwich [poultry, aioli]"));

        let flareup = TimelineItem::Flareup(Flareup {
            id: "f".to_string(),
            timestamp: 0,
            description: "Cramps".to_string(),
            severity: Severity::Severe,
            associated_meal_ids: vec!["m".to_string()],
            notes: None,
        });
        let line = item_line(&flareup);
        assert!(line.contains("FLARE-UP"));
        assert!(line.ends_with("Cramps (severe flare-up, 1 linked meals)"));
    }
}
