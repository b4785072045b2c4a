use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::JournalError;

/// Number of preceding meals attached to a new flare-up.
pub const CORRELATION_WINDOW: usize = 6;

/// Number of meals shown in "recent meals" previews.
pub const PREVIEW_LIMIT: usize = 8;

/// Marker that separates user-coined tags from the predefined vocabulary.
pub const CUSTOM_TAG_PREFIX: &str = "custom:";

/// Controlled tag vocabulary offered when logging a meal.
pub const PREDEFINED_TAGS: &[&str] = &[
    "dairy",
    "gluten",
    "spicy",
    "fried",
    "fatty",
    "caffeine",
    "alcohol",
    "carbonated",
    "high-fiber",
    "raw-vegetables",
    "legumes",
    "onion-garlic",
    "citrus",
    "red-meat",
    "poultry",
    "seafood",
    "eggs",
    "nuts",
    "sugar",
    "artificial-sweetener",
    "processed",
    "mayo-based",
];

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

pub const SEVERITIES: &[&str] = &["mild", "moderate", "severe"];

// --- Enums ---

/// How the meal description was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Text,
    Voice,
}

impl EntryType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "voice" => Ok(Self::Voice),
            other => anyhow::bail!("Invalid entry type '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            "snack" => Ok(Self::Snack),
            _ => Err(JournalError::validation(format!(
                "Invalid meal type '{s}'. Must be one of: {}",
                MEAL_TYPES.join(", ")
            ))
            .into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mild" => Ok(Self::Mild),
            "moderate" => Ok(Self::Moderate),
            "severe" => Ok(Self::Severe),
            _ => Err(JournalError::validation(format!(
                "Invalid severity '{s}'. Must be one of: {}",
                SEVERITIES.join(", ")
            ))
            .into()),
        }
    }
}

// --- Meals ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<MealType>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub timestamp: i64,
    pub entry_type: EntryType,
    pub meal_type: Option<MealType>,
    pub description: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

impl NewMeal {
    /// Trim text fields, normalize tags, and reject an empty description.
    pub fn validated(self) -> Result<Self> {
        Ok(Self {
            description: require_text(&self.description, "Meal description")?,
            notes: optional_text(self.notes),
            tags: normalize_tags(&self.tags)?,
            ..self
        })
    }
}

/// Partial edit of a meal. `None` leaves the field alone. The entry type
/// cannot be changed after creation.
#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct UpdateMeal {
    pub timestamp: Option<i64>,
    pub meal_type: Option<Option<MealType>>,
    pub description: Option<String>,
    pub notes: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

impl UpdateMeal {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none()
            && self.meal_type.is_none()
            && self.description.is_none()
            && self.notes.is_none()
            && self.tags.is_none()
    }

    /// Apply this edit to `meal`, validating the result.
    pub fn apply_to(self, meal: &Meal) -> Result<Meal> {
        let mut updated = meal.clone();
        if let Some(ts) = self.timestamp {
            updated.timestamp = ts;
        }
        if let Some(meal_type) = self.meal_type {
            updated.meal_type = meal_type;
        }
        if let Some(description) = self.description {
            updated.description = require_text(&description, "Meal description")?;
        }
        if let Some(notes) = self.notes {
            updated.notes = optional_text(notes);
        }
        if let Some(tags) = self.tags {
            updated.tags = normalize_tags(&tags)?;
        }
        Ok(updated)
    }
}

// --- Flare-ups ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flareup {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub description: String,
    pub severity: Severity,
    /// Snapshot taken when the flare-up was logged. Never recomputed, and
    /// may reference meals that have since been deleted.
    pub associated_meal_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFlareup {
    pub timestamp: i64,
    pub description: String,
    pub severity: Severity,
    pub notes: Option<String>,
}

impl NewFlareup {
    pub fn validated(self) -> Result<Self> {
        Ok(Self {
            description: require_text(&self.description, "Flare-up description")?,
            notes: optional_text(self.notes),
            ..self
        })
    }
}

/// A flare-up together with whichever of its associated meals still exist.
#[derive(Debug, Clone, Serialize)]
pub struct FlareupDetail {
    #[serde(flatten)]
    pub flareup: Flareup,
    pub associated_meals: Vec<Meal>,
}

// --- Settings ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    #[default]
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            _ => Err(JournalError::validation(format!(
                "Invalid theme '{s}'. Must be one of: light, dark, system"
            ))
            .into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub permission: PermissionState,
    /// "HH:MM" strings. Stored only; reminders are not scheduled.
    pub reminder_times: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub last_export: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notifications: NotificationSettings,
    pub export: ExportSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    /// Custom tag names (without the prefix) used on earlier meals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_tags: Option<Vec<String>>,
}

/// Shallow partial update of [`Settings`].
///
/// Each `Some` field replaces the whole corresponding field. Nested
/// structures are not merged: a patch carrying `notifications` must carry
/// the complete notification settings.
#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct SettingsPatch {
    pub notifications: Option<NotificationSettings>,
    pub export: Option<ExportSettings>,
    pub theme: Option<Option<Theme>>,
    pub custom_tags: Option<Option<Vec<String>>>,
}

impl SettingsPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifications.is_none()
            && self.export.is_none()
            && self.theme.is_none()
            && self.custom_tags.is_none()
    }
}

impl Settings {
    #[must_use]
    pub fn merged(&self, patch: SettingsPatch) -> Settings {
        Settings {
            notifications: patch
                .notifications
                .unwrap_or_else(|| self.notifications.clone()),
            export: patch.export.unwrap_or_else(|| self.export.clone()),
            theme: patch.theme.unwrap_or(self.theme),
            custom_tags: patch
                .custom_tags
                .unwrap_or_else(|| self.custom_tags.clone()),
        }
    }
}

/// Host storage usage, as far as it can be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageEstimate {
    pub used_bytes: u64,
    pub quota_bytes: u64,
}

// --- Tags ---

/// Build a custom tag from user input: `"aioli"` becomes `"custom:aioli"`.
#[must_use]
pub fn custom_tag(name: &str) -> String {
    format!("{CUSTOM_TAG_PREFIX}{}", name.trim())
}

#[must_use]
pub fn is_custom_tag(tag: &str) -> bool {
    tag.starts_with(CUSTOM_TAG_PREFIX)
}

/// Display label for a tag. Custom tags lose their prefix.
#[must_use]
pub fn tag_label(tag: &str) -> &str {
    tag.strip_prefix(CUSTOM_TAG_PREFIX).unwrap_or(tag)
}

/// Check every tag against the vocabulary and drop duplicates, keeping the
/// first occurrence.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for raw in tags {
        let raw = raw.trim();
        let tag = if let Some(name) = raw.strip_prefix(CUSTOM_TAG_PREFIX) {
            let name = name.trim();
            if name.is_empty() {
                return Err(JournalError::validation("Custom tag name cannot be empty").into());
            }
            custom_tag(name)
        } else {
            let lower = raw.to_lowercase();
            if !PREDEFINED_TAGS.contains(&lower.as_str()) {
                return Err(JournalError::validation(format!(
                    "Unknown tag '{raw}'. Use a predefined tag or add it as a custom tag"
                ))
                .into());
            }
            lower
        };
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    Ok(out)
}

// --- Validation helpers ---

fn require_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(JournalError::validation(format!("{field} is required")).into());
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate a reminder time in `HH:MM` 24-hour form.
pub fn validate_reminder_time(value: &str) -> Result<String> {
    let trimmed = value.trim();
    chrono::NaiveTime::parse_from_str(trimmed, "%H:%M").map_err(|_| {
        JournalError::validation(format!("Invalid reminder time '{value}'. Use HH:MM"))
    })?;
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meal() -> Meal {
        Meal {
            id: "m1".to_string(),
            timestamp: 1_700_000_000_000,
            entry_type: EntryType::Voice,
            meal_type: Some(MealType::Lunch),
            description: "Chicken sandwich".to_string(),
            notes: None,
            tags: vec!["poultry".to_string()],
        }
    }

    #[test]
    fn test_meal_type_parse() {
        assert_eq!("Lunch".parse::<MealType>().unwrap(), MealType::Lunch);
        assert_eq!(" snack ".parse::<MealType>().unwrap(), MealType::Snack);
        let err = "brunch".parse::<MealType>().unwrap_err();
        assert!(err.to_string().contains("breakfast, lunch, dinner, snack"));
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("SEVERE".parse::<Severity>().unwrap(), Severity::Severe);
        assert!("awful".parse::<Severity>().is_err());
    }

    #[test]
    fn test_theme_and_entry_type_display_match_storage() {
        for theme in [Theme::Light, Theme::Dark, Theme::System] {
            assert_eq!(theme.to_string().parse::<Theme>().unwrap(), theme);
            assert_eq!(
                serde_json::to_value(theme).unwrap(),
                serde_json::json!(theme.as_str())
            );
        }
        assert_eq!(EntryType::Voice.to_string(), "voice");
        assert_eq!("text".parse::<EntryType>().unwrap(), EntryType::Text);
    }

    #[test]
    fn test_custom_tag_round_trip() {
        let tag = custom_tag("aioli");
        assert_eq!(tag, "custom:aioli");
        assert!(is_custom_tag(&tag));
        assert_eq!(tag_label(&tag), "aioli");
        assert_eq!(tag_label("dairy"), "dairy");
    }

    #[test]
    fn test_normalize_tags_dedups_in_order() {
        let tags = vec![
            "poultry".to_string(),
            "Mayo-Based".to_string(),
            "poultry".to_string(),
            "custom: aioli".to_string(),
            "custom:aioli".to_string(),
        ];
        let out = normalize_tags(&tags).unwrap();
        assert_eq!(out, vec!["poultry", "mayo-based", "custom:aioli"]);
    }

    #[test]
    fn test_normalize_tags_rejects_unknown() {
        assert!(normalize_tags(&["pizza".to_string()]).is_err());
        assert!(normalize_tags(&["custom:   ".to_string()]).is_err());
    }

    #[test]
    fn test_new_meal_validated_trims() {
        let meal = NewMeal {
            timestamp: 0,
            entry_type: EntryType::Text,
            meal_type: None,
            description: "  toast  ".to_string(),
            notes: Some("   ".to_string()),
            tags: vec![],
        }
        .validated()
        .unwrap();
        assert_eq!(meal.description, "toast");
        assert_eq!(meal.notes, None);
    }

    #[test]
    fn test_new_meal_empty_description() {
        let err = NewMeal {
            timestamp: 0,
            entry_type: EntryType::Text,
            meal_type: None,
            description: " \n ".to_string(),
            notes: None,
            tags: vec![],
        }
        .validated()
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<JournalError>(),
            Some(&JournalError::validation("Meal description is required"))
        );
    }

    #[test]
    fn test_new_flareup_empty_description() {
        let res = NewFlareup {
            timestamp: 0,
            description: String::new(),
            severity: Severity::Mild,
            notes: None,
        }
        .validated();
        assert!(res.is_err());
    }

    #[test]
    fn test_update_meal_keeps_entry_type() {
        let meal = sample_meal();
        let update = UpdateMeal {
            description: Some("Turkey sandwich".to_string()),
            meal_type: Some(None),
            ..Default::default()
        };
        let updated = update.apply_to(&meal).unwrap();
        assert_eq!(updated.description, "Turkey sandwich");
        assert_eq!(updated.meal_type, None);
        assert_eq!(updated.entry_type, EntryType::Voice);
        assert_eq!(updated.tags, meal.tags);
    }

    #[test]
    fn test_update_meal_is_empty() {
        assert!(UpdateMeal::default().is_empty());
        let update = UpdateMeal {
            notes: Some(None),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_settings_merge_is_shallow() {
        let current = Settings {
            notifications: NotificationSettings {
                enabled: true,
                permission: PermissionState::Granted,
                reminder_times: vec!["08:00".to_string(), "19:00".to_string()],
            },
            theme: Some(Theme::Dark),
            ..Default::default()
        };
        let patch = SettingsPatch {
            notifications: Some(NotificationSettings {
                enabled: false,
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = current.merged(patch);
        // Whole sub-structure replaced, not field-merged.
        assert_eq!(merged.notifications.permission, PermissionState::Default);
        assert!(merged.notifications.reminder_times.is_empty());
        assert_eq!(merged.theme, Some(Theme::Dark));
    }

    #[test]
    fn test_settings_patch_clears_theme() {
        let current = Settings {
            theme: Some(Theme::Light),
            ..Default::default()
        };
        let merged = current.merged(SettingsPatch {
            theme: Some(None),
            ..Default::default()
        });
        assert_eq!(merged.theme, None);
    }

    #[test]
    fn test_settings_deserialize_partial_json() {
        let settings: Settings = serde_json::from_str(r#"{"theme":"system"}"#).unwrap();
        assert_eq!(settings.theme, Some(Theme::System));
        assert!(!settings.notifications.enabled);
        assert_eq!(settings.export.last_export, None);
    }

    #[test]
    fn test_meal_json_uses_type_key() {
        let json = serde_json::to_value(sample_meal()).unwrap();
        assert_eq!(json["type"], "voice");
        assert_eq!(json["meal_type"], "lunch");
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn test_validate_reminder_time() {
        assert_eq!(validate_reminder_time("07:30").unwrap(), "07:30");
        assert!(validate_reminder_time("7.30").is_err());
        assert!(validate_reminder_time("25:00").is_err());
    }
}
