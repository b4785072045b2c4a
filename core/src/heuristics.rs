use chrono::{NaiveTime, TimeZone, Timelike};

use crate::models::MealType;

const BREAKFAST_START: u32 = 5 * 60;
const LUNCH_START: u32 = 10 * 60 + 30;
const DINNER_START: u32 = 15 * 60;
const SNACK_START: u32 = 21 * 60;

/// Suggest a meal type for a local clock time. Only ever a default.
#[must_use]
pub fn guess_meal_type(time: NaiveTime) -> MealType {
    let minutes = time.hour() * 60 + time.minute();
    match minutes {
        m if (BREAKFAST_START..LUNCH_START).contains(&m) => MealType::Breakfast,
        m if (LUNCH_START..DINNER_START).contains(&m) => MealType::Lunch,
        m if (DINNER_START..SNACK_START).contains(&m) => MealType::Dinner,
        _ => MealType::Snack,
    }
}

/// [`guess_meal_type`] for an epoch-millisecond timestamp seen in `tz`.
#[must_use]
pub fn guess_meal_type_at<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> MealType {
    match tz.timestamp_millis_opt(timestamp_ms).earliest() {
        Some(dt) => guess_meal_type(dt.time()),
        None => MealType::Snack,
    }
}
