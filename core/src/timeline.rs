use chrono::{Days, NaiveDate, TimeZone};
use serde::Serialize;

use crate::models::{Flareup, Meal};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TimelineItem {
    Meal(Meal),
    Flareup(Flareup),
}

impl TimelineItem {
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Meal(m) => m.timestamp,
            Self::Flareup(f) => f.timestamp,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Meal(m) => &m.id,
            Self::Flareup(f) => &f.id,
        }
    }
}

/// All entries sharing one date label, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineGroup {
    pub label: String,
    pub items: Vec<TimelineItem>,
}

/// Merge meals and flare-ups into date-labelled groups, newest first.
///
/// Ties on timestamp keep input order (meals before flare-ups). Groups
/// appear in the order their label is first seen.
#[must_use]
pub fn aggregate<Tz: TimeZone>(
    meals: Vec<Meal>,
    flareups: Vec<Flareup>,
    today: NaiveDate,
    tz: &Tz,
) -> Vec<TimelineGroup> {
    let mut items: Vec<TimelineItem> = meals
        .into_iter()
        .map(TimelineItem::Meal)
        .chain(flareups.into_iter().map(TimelineItem::Flareup))
        .collect();
    items.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));

    let mut groups: Vec<TimelineGroup> = Vec::new();
    for item in items {
        let label = date_label(item.timestamp(), today, tz);
        match groups.iter_mut().find(|g| g.label == label) {
            Some(group) => group.items.push(item),
            None => groups.push(TimelineGroup {
                label,
                items: vec![item],
            }),
        }
    }
    groups
}

/// "Today", "Yesterday", or a full date such as "Saturday, June 15, 2024".
#[must_use]
pub fn date_label<Tz: TimeZone>(timestamp_ms: i64, today: NaiveDate, tz: &Tz) -> String {
    let Some(date) = tz
        .timestamp_millis_opt(timestamp_ms)
        .earliest()
        .map(|dt| dt.date_naive())
    else {
        return "Unknown date".to_string();
    };
    if date == today {
        "Today".to_string()
    } else if today.checked_sub_days(Days::new(1)) == Some(date) {
        "Yesterday".to_string()
    } else {
        date.format("%A, %B %-d, %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryType, Severity};
    use chrono::{FixedOffset, Utc};

    const HOUR: i64 = 3_600_000;
    // 2024-06-15 00:00 UTC
    const DAY_START: i64 = 1_718_409_600_000;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn meal(id: &str, timestamp: i64) -> Meal {
        Meal {
            id: id.to_string(),
            timestamp,
            entry_type: EntryType::Text,
            meal_type: None,
            description: id.to_string(),
            notes: None,
            tags: vec![],
        }
    }

    fn flareup(id: &str, timestamp: i64) -> Flareup {
        Flareup {
            id: id.to_string(),
            timestamp,
            description: id.to_string(),
            severity: Severity::Mild,
            associated_meal_ids: vec![],
            notes: None,
        }
    }

    fn ids(group: &TimelineGroup) -> Vec<&str> {
        group.items.iter().map(TimelineItem::id).collect()
    }

    #[test]
    fn test_date_labels() {
        assert_eq!(date_label(DAY_START + HOUR, today(), &Utc), "Today");
        assert_eq!(date_label(DAY_START - HOUR, today(), &Utc), "Yesterday");
        assert_eq!(
            date_label(DAY_START - 25 * HOUR, today(), &Utc),
            "Thursday, June 13, 2024"
        );
    }

    #[test]
    fn test_date_label_respects_timezone() {
        // 23:00 UTC on the 14th is already the 15th at UTC+2.
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(date_label(DAY_START - HOUR, today(), &plus_two), "Today");
    }

    #[test]
    fn test_aggregate_groups_newest_first() {
        let meals = vec![
            meal("breakfast", DAY_START + 8 * HOUR),
            meal("dinner-yday", DAY_START - 5 * HOUR),
            meal("old", DAY_START - 50 * HOUR),
        ];
        let flareups = vec![
            flareup("flare-today", DAY_START + 11 * HOUR),
            flareup("flare-yday", DAY_START - 2 * HOUR),
        ];

        let groups = aggregate(meals, flareups, today(), &Utc);
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Today", "Yesterday", "Wednesday, June 12, 2024"]);
        assert_eq!(ids(&groups[0]), vec!["flare-today", "breakfast"]);
        assert_eq!(ids(&groups[1]), vec!["flare-yday", "dinner-yday"]);
        assert_eq!(ids(&groups[2]), vec!["old"]);
    }

    #[test]
    fn test_aggregate_ties_are_stable() {
        let ts = DAY_START + 9 * HOUR;
        let meals = vec![meal("m1", ts), meal("m2", ts)];
        let flareups = vec![flareup("f1", ts)];
        let groups = aggregate(meals, flareups, today(), &Utc);
        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups[0]), vec!["m1", "m2", "f1"]);
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate(vec![], vec![], today(), &Utc).is_empty());
    }

    #[test]
    fn test_item_serializes_with_kind() {
        let json = serde_json::to_value(TimelineItem::Flareup(flareup("f", 0))).unwrap();
        assert_eq!(json["kind"], "flareup");
        assert_eq!(json["severity"], "mild");
    }
}
