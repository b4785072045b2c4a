use crate::models::Meal;

/// Pick the meals that preceded a flare-up.
///
/// Keeps meals eaten strictly before `flareup_timestamp`, newest first, and
/// returns the ids of the first `window` of them.
#[must_use]
pub fn correlate(flareup_timestamp: i64, meals: &[Meal], window: usize) -> Vec<String> {
    let mut before: Vec<&Meal> = meals
        .iter()
        .filter(|m| m.timestamp < flareup_timestamp)
        .collect();
    before.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    before
        .into_iter()
        .take(window)
        .map(|m| m.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CORRELATION_WINDOW, EntryType};

    const HOUR: i64 = 3_600_000;

    fn meal(id: &str, timestamp: i64) -> Meal {
        Meal {
            id: id.to_string(),
            timestamp,
            entry_type: EntryType::Text,
            meal_type: None,
            description: format!("meal {id}"),
            notes: None,
            tags: vec![],
        }
    }

    #[test]
    fn test_correlate_single_meal() {
        let meals = vec![meal("a", 0)];
        assert_eq!(correlate(3 * HOUR, &meals, CORRELATION_WINDOW), vec!["a"]);
    }

    #[test]
    fn test_correlate_excludes_same_time_and_later() {
        let meals = vec![meal("before", HOUR), meal("same", 2 * HOUR), meal("after", 3 * HOUR)];
        assert_eq!(correlate(2 * HOUR, &meals, CORRELATION_WINDOW), vec!["before"]);
    }

    #[test]
    fn test_correlate_window_and_order() {
        // Shuffled input, ten meals an hour apart.
        let order = [3, 9, 0, 5, 7, 1, 8, 2, 6, 4];
        let meals: Vec<Meal> = order
            .iter()
            .map(|i| meal(&format!("m{i}"), i * HOUR))
            .collect();

        let ids = correlate(20 * HOUR, &meals, CORRELATION_WINDOW);
        assert_eq!(ids, vec!["m9", "m8", "m7", "m6", "m5", "m4"]);

        let ids = correlate(4 * HOUR, &meals, CORRELATION_WINDOW);
        assert_eq!(ids, vec!["m3", "m2", "m1", "m0"]);
    }

    #[test]
    fn test_correlate_empty_inputs() {
        assert!(correlate(HOUR, &[], CORRELATION_WINDOW).is_empty());
        assert!(correlate(HOUR, &[meal("a", 0)], 0).is_empty());
        assert!(correlate(0, &[meal("a", HOUR)], CORRELATION_WINDOW).is_empty());
    }
}
