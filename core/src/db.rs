use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::capability::Capability;
use crate::error::JournalError;
use crate::models::{
    EntryType, Flareup, Meal, MealType, NewFlareup, NewMeal, Settings, SettingsPatch, Severity,
    StorageEstimate,
};

/// Key of the single settings row.
const SETTINGS_KEY: &str = "app";

pub struct Database {
    conn: Connection,
    in_memory: bool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "opened journal database");
        let db = Database {
            conn,
            in_memory: false,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn,
            in_memory: true,
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            tracing::debug!(from = version, to = 1, "migrating journal schema");
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS meals (
                    id TEXT PRIMARY KEY NOT NULL,
                    timestamp INTEGER NOT NULL,
                    entry_type TEXT NOT NULL CHECK (entry_type IN ('text', 'voice')),
                    meal_type TEXT,
                    description TEXT NOT NULL,
                    notes TEXT,
                    tags TEXT NOT NULL DEFAULT '[]'
                );

                CREATE TABLE IF NOT EXISTS flareups (
                    id TEXT PRIMARY KEY NOT NULL,
                    timestamp INTEGER NOT NULL,
                    description TEXT NOT NULL,
                    severity TEXT NOT NULL CHECK (severity IN ('mild', 'moderate', 'severe')),
                    associated_meal_ids TEXT NOT NULL DEFAULT '[]',
                    notes TEXT
                );

                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_meals_timestamp ON meals(timestamp);
                CREATE INDEX IF NOT EXISTS idx_flareups_timestamp ON flareups(timestamp);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    // Expects columns:
    // 0: id, 1: timestamp, 2: entry_type, 3: meal_type, 4: description,
    // 5: notes, 6: tags
    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Meal> {
        let entry_type: String = row.get(2)?;
        let meal_type: Option<String> = row.get(3)?;
        let tags: String = row.get(6)?;
        Ok(Meal {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            entry_type: entry_type
                .parse::<EntryType>()
                .map_err(|e| conversion_error(2, e))?,
            meal_type: meal_type
                .map(|m| m.parse::<MealType>())
                .transpose()
                .map_err(|e| conversion_error(3, e))?,
            description: row.get(4)?,
            notes: row.get(5)?,
            tags: serde_json::from_str(&tags).map_err(|e| conversion_error(6, e.into()))?,
        })
    }

    // Expects columns:
    // 0: id, 1: timestamp, 2: description, 3: severity,
    // 4: associated_meal_ids, 5: notes
    fn flareup_from_row(row: &rusqlite::Row) -> rusqlite::Result<Flareup> {
        let severity: String = row.get(3)?;
        let ids: String = row.get(4)?;
        Ok(Flareup {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            description: row.get(2)?,
            severity: severity.parse::<Severity>().map_err(|e| conversion_error(3, e))?,
            associated_meal_ids: serde_json::from_str(&ids)
                .map_err(|e| conversion_error(4, e.into()))?,
            notes: row.get(5)?,
        })
    }

    // --- Meals ---

    pub fn insert_meal(&self, meal: &NewMeal) -> Result<Meal> {
        let id = Uuid::new_v4().to_string();
        let tags = serde_json::to_string(&meal.tags)?;
        self.conn
            .execute(
                "INSERT INTO meals (id, timestamp, entry_type, meal_type, description, notes, tags)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    meal.timestamp,
                    meal.entry_type.as_str(),
                    meal.meal_type.map(|m| m.as_str()),
                    meal.description,
                    meal.notes,
                    tags,
                ],
            )
            .context("Failed to save meal")?;
        tracing::debug!(%id, timestamp = meal.timestamp, "inserted meal");
        self.get_meal(&id)?
            .ok_or_else(|| JournalError::meal_not_found(&id).into())
    }

    pub fn get_meal(&self, id: &str) -> Result<Option<Meal>> {
        let meal = self
            .conn
            .query_row(
                "SELECT id, timestamp, entry_type, meal_type, description, notes, tags
                 FROM meals WHERE id = ?1",
                params![id],
                Self::meal_from_row,
            )
            .optional()?;
        Ok(meal)
    }

    /// Every meal, newest first.
    pub fn get_all_meals(&self) -> Result<Vec<Meal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, entry_type, meal_type, description, notes, tags
             FROM meals ORDER BY timestamp",
        )?;
        let mut meals = stmt
            .query_map([], Self::meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        meals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(meals)
    }

    pub fn get_last_meals(&self, n: usize) -> Result<Vec<Meal>> {
        let mut meals = self.get_all_meals()?;
        meals.truncate(n);
        Ok(meals)
    }

    /// Meals strictly before `timestamp`, newest first, at most `limit`.
    pub fn get_meals_before(&self, timestamp: i64, limit: usize) -> Result<Vec<Meal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, entry_type, meal_type, description, notes, tags
             FROM meals WHERE timestamp < ?1 ORDER BY timestamp",
        )?;
        let mut meals = stmt
            .query_map(params![timestamp], Self::meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        meals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        meals.truncate(limit);
        Ok(meals)
    }

    /// Replace the stored meal with the same id.
    pub fn update_meal(&self, meal: &Meal) -> Result<Meal> {
        let tags = serde_json::to_string(&meal.tags)?;
        let rows = self
            .conn
            .execute(
                "UPDATE meals SET timestamp = ?1, entry_type = ?2, meal_type = ?3,
                        description = ?4, notes = ?5, tags = ?6
                 WHERE id = ?7",
                params![
                    meal.timestamp,
                    meal.entry_type.as_str(),
                    meal.meal_type.map(|m| m.as_str()),
                    meal.description,
                    meal.notes,
                    tags,
                    meal.id,
                ],
            )
            .context("Failed to update meal")?;
        if rows == 0 {
            return Err(JournalError::meal_not_found(&meal.id).into());
        }
        tracing::debug!(id = %meal.id, "updated meal");
        Ok(meal.clone())
    }

    pub fn delete_meal(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM meals WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Flare-ups ---

    /// Store a flare-up together with its already computed meal associations.
    pub fn insert_flareup(
        &self,
        flareup: &NewFlareup,
        associated_meal_ids: &[String],
    ) -> Result<Flareup> {
        let id = Uuid::new_v4().to_string();
        let ids = serde_json::to_string(associated_meal_ids)?;
        self.conn
            .execute(
                "INSERT INTO flareups (id, timestamp, description, severity, associated_meal_ids, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    flareup.timestamp,
                    flareup.description,
                    flareup.severity.as_str(),
                    ids,
                    flareup.notes,
                ],
            )
            .context("Failed to save flare-up")?;
        tracing::debug!(%id, timestamp = flareup.timestamp, "inserted flare-up");
        self.get_flareup(&id)?
            .ok_or_else(|| JournalError::flareup_not_found(&id).into())
    }

    pub fn get_flareup(&self, id: &str) -> Result<Option<Flareup>> {
        let flareup = self
            .conn
            .query_row(
                "SELECT id, timestamp, description, severity, associated_meal_ids, notes
                 FROM flareups WHERE id = ?1",
                params![id],
                Self::flareup_from_row,
            )
            .optional()?;
        Ok(flareup)
    }

    /// Every flare-up, newest first.
    pub fn get_all_flareups(&self) -> Result<Vec<Flareup>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, description, severity, associated_meal_ids, notes
             FROM flareups ORDER BY timestamp",
        )?;
        let mut flareups = stmt
            .query_map([], Self::flareup_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        flareups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(flareups)
    }

    pub fn get_last_flareups(&self, n: usize) -> Result<Vec<Flareup>> {
        let mut flareups = self.get_all_flareups()?;
        flareups.truncate(n);
        Ok(flareups)
    }

    pub fn get_flareups_before(&self, timestamp: i64, limit: usize) -> Result<Vec<Flareup>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, description, severity, associated_meal_ids, notes
             FROM flareups WHERE timestamp < ?1 ORDER BY timestamp",
        )?;
        let mut flareups = stmt
            .query_map(params![timestamp], Self::flareup_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        flareups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        flareups.truncate(limit);
        Ok(flareups)
    }

    pub fn delete_flareup(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM flareups WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Settings ---

    /// Load the settings record, creating it with defaults on first read.
    pub fn get_settings(&self) -> Result<Settings> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match value {
            Some(json) => serde_json::from_str(&json).context("Stored settings are corrupt"),
            None => {
                let settings = Settings::default();
                self.save_settings(&settings)?;
                Ok(settings)
            }
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let json = serde_json::to_string(settings)?;
        self.conn
            .execute(
                "INSERT INTO settings (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![SETTINGS_KEY, json, now],
            )
            .context("Failed to save settings")?;
        Ok(())
    }

    /// Shallow-merge `patch` into the stored settings. See [`SettingsPatch`].
    pub fn update_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        let merged = self.get_settings()?.merged(patch);
        self.save_settings(&merged)?;
        Ok(merged)
    }

    /// Run `f` inside one transaction. Any error rolls back every write `f`
    /// made.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let value = f(self)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    // --- Maintenance ---

    /// Empty every collection in one transaction.
    pub fn clear_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM meals;
             DELETE FROM flareups;
             DELETE FROM settings;",
        )
        .context("Failed to clear journal")?;
        tx.commit()?;
        tracing::info!("cleared all journal data");
        Ok(())
    }

    /// Bytes used by the database file and the most it may grow to.
    pub fn storage_estimate(&self) -> Capability<StorageEstimate> {
        if self.in_memory {
            return Capability::Unsupported;
        }
        let pragma = |name: &str| -> rusqlite::Result<i64> {
            self.conn.pragma_query_value(None, name, |row| row.get(0))
        };
        match (
            pragma("page_count"),
            pragma("page_size"),
            pragma("max_page_count"),
        ) {
            (Ok(count), Ok(size), Ok(max)) => Capability::Supported(StorageEstimate {
                used_bytes: u64::try_from(count * size).unwrap_or(0),
                quota_bytes: u64::try_from(max.saturating_mul(size)).unwrap_or(u64::MAX),
            }),
            _ => {
                tracing::warn!("storage estimate unavailable");
                Capability::Unsupported
            }
        }
    }
}

fn conversion_error(column: usize, err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, err.into())
}
