use anyhow::{Result, bail};
use chrono::Local;

use flare_core::capability::Capability;
use flare_core::heuristics::guess_meal_type_at;
use flare_core::models::{Settings, SettingsPatch, Theme, validate_reminder_time};
use flare_core::service::JournalService;

use super::helpers::{format_bytes, format_time, parse_when, print_json, require_yes};

pub(crate) fn cmd_settings_show(service: &JournalService, json: bool) -> Result<()> {
    let settings = service.settings()?;
    if json {
        print_json(&settings)
    } else {
        print_settings(&settings);
        Ok(())
    }
}

pub(crate) fn cmd_settings_set(
    service: &JournalService,
    theme: Option<&str>,
    notifications: Option<bool>,
    reminders: &[String],
    clear_reminders: bool,
    json: bool,
) -> Result<()> {
    let mut patch = SettingsPatch {
        theme: theme.map(|t| t.parse::<Theme>().map(Some)).transpose()?,
        ..Default::default()
    };

    if notifications.is_some() || !reminders.is_empty() || clear_reminders {
        // Patches replace `notifications` whole, so start from what is stored.
        let mut current = service.settings()?.notifications;
        if let Some(enabled) = notifications {
            current.enabled = enabled;
        }
        if clear_reminders {
            current.reminder_times.clear();
        }
        if !reminders.is_empty() {
            current.reminder_times = reminders
                .iter()
                .map(|r| validate_reminder_time(r))
                .collect::<Result<_>>()?;
        }
        patch.notifications = Some(current);
    }

    if patch.is_empty() {
        bail!("Nothing to update. Provide --theme, --notifications, or --reminder");
    }

    let settings = service.update_settings(patch)?;
    if json {
        print_json(&settings)
    } else {
        println!("Settings updated");
        print_settings(&settings);
        Ok(())
    }
}

pub(crate) fn cmd_tags(service: &JournalService, json: bool) -> Result<()> {
    let tags = service.known_tags()?;
    if json {
        return print_json(&tags);
    }
    println!("Tags: {}", tags.predefined.join(", "));
    if tags.custom.is_empty() {
        println!("Custom tags: (none yet, add one with --custom-tag)");
    } else {
        println!("Custom tags: {}", tags.custom.join(", "));
    }
    Ok(())
}

pub(crate) fn cmd_guess(at: Option<&str>, json: bool) -> Result<()> {
    let timestamp = parse_when(at)?.timestamp_millis();
    let meal_type = guess_meal_type_at(timestamp, &Local);
    if json {
        println!(
            "{}",
            serde_json::json!({ "timestamp": timestamp, "meal_type": meal_type })
        );
    } else {
        println!("{meal_type}");
    }
    Ok(())
}

pub(crate) fn cmd_storage(service: &JournalService, json: bool) -> Result<()> {
    let estimate = service.storage_estimate();
    if json {
        return print_json(&estimate);
    }
    match estimate {
        Capability::Supported(e) => {
            #[allow(clippy::cast_precision_loss)]
            let percent = if e.quota_bytes == 0 {
                0.0
            } else {
                e.used_bytes as f64 / e.quota_bytes as f64 * 100.0
            };
            println!(
                "Using {} of {} ({percent:.2}%)",
                format_bytes(e.used_bytes),
                format_bytes(e.quota_bytes)
            );
        }
        Capability::Unsupported => println!("Storage estimate unavailable"),
    }
    Ok(())
}

pub(crate) fn cmd_clear(service: &mut JournalService, yes: bool, json: bool) -> Result<()> {
    require_yes(yes, "clear the journal")?;
    service.clear_all()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": true }));
    } else {
        println!("Journal cleared");
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    let n = &settings.notifications;
    let theme = settings.theme.map_or("default", Theme::as_str);
    println!("Theme:         {theme}");
    println!(
        "Notifications: {}",
        if n.enabled { "on" } else { "off" }
    );
    if n.reminder_times.is_empty() {
        println!("Reminders:     none");
    } else {
        println!("Reminders:     {}", n.reminder_times.join(", "));
    }
    if let Some(ts) = settings.export.last_export {
        println!("Last export:   {}", format_time(ts));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flare_core::models::{EntryType, NewMeal};

    fn file_service(dir: &tempfile::TempDir) -> JournalService {
        JournalService::new(&dir.path().join("flare.db")).unwrap()
    }

    #[test]
    fn test_settings_set_keeps_other_notification_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let service = file_service(&dir);

        let reminders = vec!["08:00".to_string(), "19:30".to_string()];
        cmd_settings_set(&service, None, Some(true), &reminders, false, true).unwrap();
        cmd_settings_set(&service, Some("dark"), Some(false), &[], false, true).unwrap();

        let settings = service.settings().unwrap();
        assert_eq!(settings.theme, Some(Theme::Dark));
        assert!(!settings.notifications.enabled);
        assert_eq!(settings.notifications.reminder_times, reminders);

        cmd_settings_set(&service, None, None, &[], true, true).unwrap();
        assert!(service.settings().unwrap().notifications.reminder_times.is_empty());
    }

    #[test]
    fn test_settings_set_rejects_bad_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let service = file_service(&dir);
        assert!(cmd_settings_set(&service, None, None, &[], false, true).is_err());
        assert!(cmd_settings_set(&service, Some("neon"), None, &[], false, true).is_err());
        let bad = vec!["25:00".to_string()];
        assert!(cmd_settings_set(&service, None, None, &bad, false, true).is_err());
        assert_eq!(service.settings().unwrap(), Settings::default());
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut service = file_service(&dir);
        service
            .log_meal(NewMeal {
                timestamp: 1_000,
                entry_type: EntryType::Text,
                meal_type: None,
                description: "Toast".to_string(),
                notes: None,
                tags: vec![],
            })
            .unwrap();

        assert!(cmd_clear(&mut service, false, true).is_err());
        assert_eq!(service.list_meals().unwrap().len(), 1);

        cmd_clear(&mut service, true, true).unwrap();
        assert!(service.list_meals().unwrap().is_empty());
    }

    #[test]
    fn test_storage_on_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let service = file_service(&dir);
        assert!(service.storage_estimate().is_supported());
        cmd_storage(&service, false).unwrap();
        cmd_storage(&service, true).unwrap();
    }
}
