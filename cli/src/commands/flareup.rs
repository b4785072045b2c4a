use anyhow::Result;

use flare_core::error::is_not_found;
use flare_core::models::{Flareup, FlareupDetail, NewFlareup, Severity};
use flare_core::service::JournalService;

use super::helpers::{
    exit_not_found, format_time, parse_when, print_deleted, print_flareup_table, print_json,
    print_meal_table,
};

pub(crate) fn cmd_flareup_log(
    service: &JournalService,
    description: &str,
    severity: &str,
    at: Option<&str>,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let severity: Severity = severity.parse()?;
    let timestamp = parse_when(at)?.timestamp_millis();

    let flareup = service.log_flareup(NewFlareup {
        timestamp,
        description: description.to_string(),
        severity,
        notes,
    })?;
    let meals = service.associated_meals(&flareup)?;

    if json {
        return print_json(&FlareupDetail {
            flareup,
            associated_meals: meals,
        });
    }

    println!(
        "Logged {} flare-up {} at {}",
        flareup.severity,
        flareup.id,
        format_time(flareup.timestamp)
    );
    if meals.is_empty() {
        println!("No earlier meals to link.");
    } else {
        println!("Linked the {} meal(s) eaten before it:", meals.len());
        print_meal_table(&meals);
    }
    Ok(())
}

pub(crate) fn cmd_flareup_list(
    service: &JournalService,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let flareups = match limit {
        Some(n) => service.recent_flareups(n)?,
        None => service.list_flareups()?,
    };
    print_flareups(&flareups, json)
}

pub(crate) fn cmd_flareup_before(
    service: &JournalService,
    when: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    let timestamp = parse_when(Some(when))?.timestamp_millis();
    let flareups = service.flareups_before(timestamp, limit)?;
    print_flareups(&flareups, json)
}

pub(crate) fn cmd_flareup_show(service: &JournalService, id: &str, json: bool) -> Result<()> {
    let detail = match service.flareup_detail(id) {
        Ok(detail) => detail,
        Err(e) if is_not_found(&e) => exit_not_found(&e.to_string(), json),
        Err(e) => return Err(e),
    };
    if json {
        return print_json(&detail);
    }

    let f = &detail.flareup;
    println!("Flare-up {}", f.id);
    println!("  When:     {}", format_time(f.timestamp));
    println!("  Severity: {}", f.severity);
    println!("  What:     {}", f.description);
    if let Some(notes) = &f.notes {
        println!("  Notes:    {notes}");
    }

    let linked = f.associated_meal_ids.len();
    let found = detail.associated_meals.len();
    if linked == 0 {
        println!("No meals were linked when this was logged.");
    } else {
        if found < linked {
            println!("{found} of {linked} associated meals still in the journal");
        }
        if found > 0 {
            print_meal_table(&detail.associated_meals);
        }
    }
    Ok(())
}

pub(crate) fn cmd_flareup_delete(service: &JournalService, id: &str, json: bool) -> Result<()> {
    let existed = service.delete_flareup(id)?;
    print_deleted("flare-up", id, existed, json);
    Ok(())
}

fn print_flareups(flareups: &[Flareup], json: bool) -> Result<()> {
    if json {
        return print_json(&flareups);
    }
    if flareups.is_empty() {
        println!("No flare-ups logged.");
    } else {
        print_flareup_table(flareups);
    }
    Ok(())
}
