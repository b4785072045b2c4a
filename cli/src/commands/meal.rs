use anyhow::Result;
use chrono::Local;
use clap::Args;

use flare_core::capability::Capability;
use flare_core::error::{JournalError, is_not_found};
use flare_core::heuristics::guess_meal_type_at;
use flare_core::models::{EntryType, Meal, MealType, NewMeal, UpdateMeal, custom_tag};
use flare_core::service::JournalService;
use flare_core::transcription::SpeechEngine;

use super::helpers::{
    exit_not_found, format_tags, format_time, parse_when, print_deleted, print_json,
    print_meal_table,
};
use crate::dictation::{dictate, stdin_capability};

/// Meal fields shared by `meal add` and `meal edit`.
#[derive(Args, Debug, Default)]
pub(crate) struct MealFields {
    /// When the meal was eaten (now, HH:MM, YYYY-MM-DD HH:MM, -3h, ...)
    #[arg(long)]
    pub at: Option<String>,
    /// Meal type: breakfast, lunch, dinner, snack (guessed from the time when omitted)
    #[arg(long, conflicts_with = "no_meal_type")]
    pub meal_type: Option<String>,
    /// Leave the meal type unset
    #[arg(long)]
    pub no_meal_type: bool,
    /// Predefined tag (repeatable), e.g. dairy, spicy, gluten
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,
    /// Free-form tag name (repeatable)
    #[arg(long = "custom-tag")]
    pub custom_tags: Vec<String>,
    /// Optional notes
    #[arg(long)]
    pub notes: Option<String>,
}

impl MealFields {
    fn all_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .cloned()
            .chain(self.custom_tags.iter().map(|name| custom_tag(name)))
            .collect()
    }

    fn has_tags(&self) -> bool {
        !self.tags.is_empty() || !self.custom_tags.is_empty()
    }

    #[allow(clippy::option_option)]
    fn explicit_meal_type(&self) -> Result<Option<Option<MealType>>> {
        if self.no_meal_type {
            return Ok(Some(None));
        }
        self.meal_type
            .as_deref()
            .map(|t| t.parse::<MealType>().map(Some))
            .transpose()
    }
}

pub(crate) async fn cmd_meal_add(
    service: &JournalService,
    description: Option<String>,
    voice: bool,
    fields: MealFields,
    json: bool,
) -> Result<()> {
    let timestamp = parse_when(fields.at.as_deref())?.timestamp_millis();
    let meal_type = fields
        .explicit_meal_type()?
        .unwrap_or_else(|| Some(guess_meal_type_at(timestamp, &Local)));

    let (entry_type, description) = if voice {
        (EntryType::Voice, dictated_description(stdin_capability()).await?)
    } else {
        (EntryType::Text, description.unwrap_or_default())
    };

    let meal = service.log_meal(NewMeal {
        timestamp,
        entry_type,
        meal_type,
        description,
        tags: fields.all_tags(),
        notes: fields.notes,
    })?;

    if json {
        print_json(&meal)?;
    } else {
        let kind = meal.meal_type.map_or("meal", MealType::as_str);
        println!("Logged {kind} {}: {}", meal.id, meal.description);
        if !meal.tags.is_empty() {
            println!("  Tags: {}", format_tags(&meal.tags));
        }
    }
    Ok(())
}

/// Dictate a description, refusing up front when no engine is available.
async fn dictated_description(capability: Capability<Box<dyn SpeechEngine>>) -> Result<String> {
    let Capability::Supported(engine) = capability else {
        return Err(JournalError::DictationUnavailable.into());
    };
    dictate(engine).await
}

pub(crate) fn cmd_meal_list(service: &JournalService, limit: Option<usize>, json: bool) -> Result<()> {
    let mut meals = service.list_meals()?;
    if let Some(limit) = limit {
        meals.truncate(limit);
    }
    print_meals(&meals, json)
}

pub(crate) fn cmd_meal_recent(service: &JournalService, n: usize, json: bool) -> Result<()> {
    let meals = service.recent_meals(n)?;
    print_meals(&meals, json)
}

pub(crate) fn cmd_meal_before(
    service: &JournalService,
    when: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    let timestamp = parse_when(Some(when))?.timestamp_millis();
    let meals = service.meals_before(timestamp, limit)?;
    print_meals(&meals, json)
}

pub(crate) fn cmd_meal_show(service: &JournalService, id: &str, json: bool) -> Result<()> {
    let Some(meal) = service.get_meal(id)? else {
        exit_not_found(&JournalError::meal_not_found(id).to_string(), json);
    };
    if json {
        print_json(&meal)
    } else {
        print_meal_detail(&meal);
        Ok(())
    }
}

pub(crate) fn cmd_meal_edit(
    service: &JournalService,
    id: &str,
    description: Option<String>,
    clear_tags: bool,
    fields: MealFields,
    json: bool,
) -> Result<()> {
    let timestamp = fields
        .at
        .as_deref()
        .map(|at| parse_when(Some(at)).map(|dt| dt.timestamp_millis()))
        .transpose()?;
    let tags = if clear_tags {
        Some(Vec::new())
    } else if fields.has_tags() {
        Some(fields.all_tags())
    } else {
        None
    };

    let update = UpdateMeal {
        timestamp,
        meal_type: fields.explicit_meal_type()?,
        description,
        notes: fields.notes.map(Some),
        tags,
    };

    match service.edit_meal(id, update) {
        Ok(meal) => {
            if json {
                print_json(&meal)?;
            } else {
                println!("Updated meal {}", meal.id);
                print_meal_detail(&meal);
            }
            Ok(())
        }
        Err(e) if is_not_found(&e) => exit_not_found(&e.to_string(), json),
        Err(e) => Err(e),
    }
}

pub(crate) fn cmd_meal_delete(service: &JournalService, id: &str, json: bool) -> Result<()> {
    let existed = service.delete_meal(id)?;
    print_deleted("meal", id, existed, json);
    Ok(())
}

fn print_meals(meals: &[Meal], json: bool) -> Result<()> {
    if json {
        return print_json(&meals);
    }
    if meals.is_empty() {
        println!("No meals logged.");
    } else {
        print_meal_table(meals);
    }
    Ok(())
}

fn print_meal_detail(meal: &Meal) {
    println!("Meal {}", meal.id);
    println!("  When:  {}", format_time(meal.timestamp));
    if let Some(meal_type) = meal.meal_type {
        println!("  Type:  {meal_type}");
    }
    println!("  Via:   {}", meal.entry_type);
    println!("  What:  {}", meal.description);
    if !meal.tags.is_empty() {
        println!("  Tags:  {}", format_tags(&meal.tags));
    }
    if let Some(notes) = &meal.notes {
        println!("  Notes: {notes}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> MealFields {
        MealFields::default()
    }

    #[test]
    fn test_all_tags_prefixes_custom_names() {
        let f = MealFields {
            tags: vec!["dairy".to_string()],
            custom_tags: vec!["aioli".to_string()],
            ..fields()
        };
        assert_eq!(f.all_tags(), vec!["dairy", "custom:aioli"]);
        assert!(f.has_tags());
        assert!(!fields().has_tags());
    }

    #[test]
    fn test_explicit_meal_type() {
        assert_eq!(fields().explicit_meal_type().unwrap(), None);

        let unset = MealFields {
            no_meal_type: true,
            ..fields()
        };
        assert_eq!(unset.explicit_meal_type().unwrap(), Some(None));

        let dinner = MealFields {
            meal_type: Some("Dinner".to_string()),
            ..fields()
        };
        assert_eq!(
            dinner.explicit_meal_type().unwrap(),
            Some(Some(MealType::Dinner))
        );

        let bad = MealFields {
            meal_type: Some("brunch".to_string()),
            ..fields()
        };
        assert!(bad.explicit_meal_type().is_err());
    }

    #[test]
    fn test_delete_missing_meal_is_not_an_error() {
        let service = JournalService::new_in_memory().unwrap();
        let meal = service
            .log_meal(NewMeal {
                timestamp: 1_000,
                entry_type: EntryType::Text,
                meal_type: None,
                description: "Toast".to_string(),
                notes: None,
                tags: vec![],
            })
            .unwrap();

        cmd_meal_delete(&service, &meal.id, true).unwrap();
        assert!(service.get_meal(&meal.id).unwrap().is_none());
        cmd_meal_delete(&service, &meal.id, true).unwrap();
        cmd_meal_delete(&service, "never-existed", false).unwrap();
    }

    struct OnePhrase;

    impl SpeechEngine for OnePhrase {
        fn begin(
            &mut self,
            _config: &flare_core::transcription::SessionConfig,
            sink: flare_core::transcription::EventSink,
        ) -> Result<()> {
            sink.result("banana bread", true);
            sink.end();
            Ok(())
        }

        fn halt(&mut self) {}
    }

    #[tokio::test]
    async fn test_dictation_unavailable_is_refused_before_starting() {
        let err = dictated_description(Capability::Unsupported)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<JournalError>(),
            Some(&JournalError::DictationUnavailable)
        );
    }

    #[tokio::test]
    async fn test_dictated_description_uses_engine_text() {
        let text = dictated_description(Capability::Supported(Box::new(OnePhrase)))
            .await
            .unwrap();
        assert_eq!(text, "banana bread");
    }
}
