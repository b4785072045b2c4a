use std::path::Path;

use anyhow::Result;
use chrono::{NaiveDate, TimeZone};

use crate::capability::Capability;
use crate::correlation::correlate;
use crate::db::Database;
use crate::error::JournalError;
use crate::models::{
    CORRELATION_WINDOW, Flareup, FlareupDetail, Meal, NewFlareup, NewMeal, PREDEFINED_TAGS,
    Settings, SettingsPatch, StorageEstimate, UpdateMeal, is_custom_tag, tag_label,
};
use crate::timeline::{TimelineGroup, aggregate};

/// Tags a user can pick from: the fixed vocabulary plus remembered custom
/// tag names.
#[derive(Debug, Clone, serde::Serialize)]
pub struct KnownTags {
    pub predefined: Vec<String>,
    pub custom: Vec<String>,
}

pub struct JournalService {
    db: Database,
}

impl JournalService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    #[must_use]
    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    // --- Meals ---

    pub fn log_meal(&self, meal: NewMeal) -> Result<Meal> {
        let meal = meal.validated()?;
        let stored = self.db.in_transaction(|db| {
            let stored = db.insert_meal(&meal)?;
            remember_custom_tags(db, &stored.tags)?;
            Ok(stored)
        })?;
        tracing::info!(id = %stored.id, "logged meal");
        Ok(stored)
    }

    pub fn edit_meal(&self, id: &str, update: UpdateMeal) -> Result<Meal> {
        if update.is_empty() {
            return Err(JournalError::validation("Nothing to update").into());
        }
        let current = self
            .db
            .get_meal(id)?
            .ok_or_else(|| JournalError::meal_not_found(id))?;
        let updated = update.apply_to(&current)?;
        self.db.in_transaction(|db| {
            let stored = db.update_meal(&updated)?;
            remember_custom_tags(db, &stored.tags)?;
            Ok(stored)
        })
    }

    pub fn delete_meal(&self, id: &str) -> Result<bool> {
        self.db.delete_meal(id)
    }

    pub fn get_meal(&self, id: &str) -> Result<Option<Meal>> {
        self.db.get_meal(id)
    }

    pub fn list_meals(&self) -> Result<Vec<Meal>> {
        self.db.get_all_meals()
    }

    pub fn recent_meals(&self, n: usize) -> Result<Vec<Meal>> {
        self.db.get_last_meals(n)
    }

    pub fn meals_before(&self, timestamp: i64, limit: usize) -> Result<Vec<Meal>> {
        self.db.get_meals_before(timestamp, limit)
    }

    // --- Flare-ups ---

    /// Log a flare-up, attaching the meals eaten just before it.
    ///
    /// Associations are computed from the meals stored right now and
    /// written in the same insert as the flare-up.
    pub fn log_flareup(&self, flareup: NewFlareup) -> Result<Flareup> {
        let flareup = flareup.validated()?;
        let meals = self.db.get_all_meals()?;
        let associated = correlate(flareup.timestamp, &meals, CORRELATION_WINDOW);
        tracing::debug!(
            candidates = meals.len(),
            associated = associated.len(),
            "correlated flare-up with preceding meals"
        );
        let stored = self.db.insert_flareup(&flareup, &associated)?;
        tracing::info!(id = %stored.id, "logged flare-up");
        Ok(stored)
    }

    pub fn get_flareup(&self, id: &str) -> Result<Option<Flareup>> {
        self.db.get_flareup(id)
    }

    pub fn flareup_detail(&self, id: &str) -> Result<FlareupDetail> {
        let flareup = self
            .db
            .get_flareup(id)?
            .ok_or_else(|| JournalError::flareup_not_found(id))?;
        let associated_meals = self.associated_meals(&flareup)?;
        Ok(FlareupDetail {
            flareup,
            associated_meals,
        })
    }

    /// Meals referenced by `flareup` that still exist, in stored order.
    pub fn associated_meals(&self, flareup: &Flareup) -> Result<Vec<Meal>> {
        let mut meals = Vec::with_capacity(flareup.associated_meal_ids.len());
        for id in &flareup.associated_meal_ids {
            match self.db.get_meal(id)? {
                Some(meal) => meals.push(meal),
                None => tracing::debug!(meal_id = %id, "skipping deleted meal"),
            }
        }
        Ok(meals)
    }

    pub fn list_flareups(&self) -> Result<Vec<Flareup>> {
        self.db.get_all_flareups()
    }

    pub fn recent_flareups(&self, n: usize) -> Result<Vec<Flareup>> {
        self.db.get_last_flareups(n)
    }

    pub fn flareups_before(&self, timestamp: i64, limit: usize) -> Result<Vec<Flareup>> {
        self.db.get_flareups_before(timestamp, limit)
    }

    pub fn delete_flareup(&self, id: &str) -> Result<bool> {
        self.db.delete_flareup(id)
    }

    // --- Timeline ---

    pub fn timeline<Tz: TimeZone>(&self, today: NaiveDate, tz: &Tz) -> Result<Vec<TimelineGroup>> {
        let meals = self.db.get_all_meals()?;
        let flareups = self.db.get_all_flareups()?;
        Ok(aggregate(meals, flareups, today, tz))
    }

    // --- Settings & tags ---

    pub fn settings(&self) -> Result<Settings> {
        self.db.get_settings()
    }

    pub fn update_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        self.db.update_settings(patch)
    }

    pub fn known_tags(&self) -> Result<KnownTags> {
        let settings = self.db.get_settings()?;
        Ok(KnownTags {
            predefined: PREDEFINED_TAGS.iter().map(ToString::to_string).collect(),
            custom: settings.custom_tags.unwrap_or_default(),
        })
    }

    // --- Maintenance ---

    pub fn storage_estimate(&self) -> Capability<StorageEstimate> {
        self.db.storage_estimate()
    }

    pub fn clear_all(&mut self) -> Result<()> {
        self.db.clear_all()
    }
}

/// Add custom tag names from `tags` to the remembered list in settings.
fn remember_custom_tags(db: &Database, tags: &[String]) -> Result<()> {
    let names: Vec<&str> = tags
        .iter()
        .filter(|t| is_custom_tag(t))
        .map(|t| tag_label(t))
        .collect();
    if names.is_empty() {
        return Ok(());
    }
    let mut known = db.get_settings()?.custom_tags.unwrap_or_default();
    let before = known.len();
    for name in names {
        if !known.iter().any(|k| k == name) {
            known.push(name.to_string());
        }
    }
    if known.len() != before {
        db.update_settings(SettingsPatch {
            custom_tags: Some(Some(known)),
            ..Default::default()
        })?;
    }
    Ok(())
}
