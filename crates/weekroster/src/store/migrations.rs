//! Snapshot structure migrations.
//!
//! Every backend hands the raw JSON it read to [`decode_snapshot`], which
//! rewrites older shapes into the current one before decoding. Each step is
//! idempotent, so a snapshot already in the current shape passes through
//! untouched and `save(load())` never changes content.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::roster::{Category, RosterSnapshot};
use crate::week::WeekKey;

/// Top-level maps every snapshot carries.
const SECTIONS: [&str; 3] = ["players", "signups", "waitlists"];

/// Week-keyed sections.
const WEEK_SECTIONS: [&str; 2] = ["signups", "waitlists"];

type Step = fn(&mut Map<String, Value>) -> Result<bool>;

/// Migration steps in the order they run.
const STEPS: &[(&str, Step)] = &[
    ("add missing sections", ensure_sections),
    ("normalize player records", normalize_players),
    ("normalize week buckets", normalize_week_buckets),
    ("rename legacy category keys", canonical_category_keys),
    ("convert legacy list encodings", normalize_lists),
    ("normalize week keys", canonical_week_keys),
    ("pair signup and waitlist weeks", pair_weeks),
    ("add missing categories", fill_categories),
    ("drop duplicate entries", drop_duplicates),
];

/// Bring a raw snapshot up to the current shape.
///
/// Returns the names of the steps that changed something.
///
/// # Errors
///
/// Returns [`Error::SnapshotFormat`] if the value cannot be interpreted as a
/// roster at all (not an object, or a week key that is not a date).
pub fn migrate(value: &mut Value) -> Result<Vec<&'static str>> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    let root = value
        .as_object_mut()
        .ok_or_else(|| Error::snapshot_format("snapshot root is not an object"))?;

    let mut applied = Vec::new();
    for (name, step) in STEPS {
        if step(root)? {
            debug!("Snapshot migration applied: {}", name);
            applied.push(*name);
        }
    }
    Ok(applied)
}

/// Migrate and decode a raw snapshot.
///
/// # Errors
///
/// Returns [`Error::SnapshotFormat`] if migration or decoding fails.
pub fn decode_snapshot(mut value: Value) -> Result<RosterSnapshot> {
    let applied = migrate(&mut value)?;
    if !applied.is_empty() {
        debug!("Upgraded stored snapshot ({} steps)", applied.len());
    }
    serde_json::from_value(value).map_err(|e| Error::snapshot_format(e.to_string()))
}

/// Parse, migrate and decode snapshot text.
///
/// # Errors
///
/// Returns [`Error::SnapshotFormat`] if the text is not JSON or cannot be
/// migrated.
pub fn decode_snapshot_str(text: &str) -> Result<RosterSnapshot> {
    if text.trim().is_empty() {
        return Ok(RosterSnapshot::new());
    }
    let value: Value =
        serde_json::from_str(text).map_err(|e| Error::snapshot_format(e.to_string()))?;
    decode_snapshot(value)
}

fn ensure_sections(root: &mut Map<String, Value>) -> Result<bool> {
    let mut changed = false;
    for section in SECTIONS {
        match root.get(section) {
            Some(Value::Object(_)) => {}
            None | Some(Value::Null) => {
                root.insert(section.to_string(), Value::Object(Map::new()));
                changed = true;
            }
            Some(_) => {
                return Err(Error::snapshot_format(format!(
                    "'{section}' is not an object"
                )))
            }
        }
    }
    Ok(changed)
}

/// Older snapshots stored a bare name per player, or omitted fields.
fn normalize_players(root: &mut Map<String, Value>) -> Result<bool> {
    let mut changed = false;
    let Some(Value::Object(players)) = root.get_mut("players") else {
        return Ok(false);
    };

    for (id, record) in players {
        match record {
            Value::Object(fields) => {
                if !matches!(fields.get("name"), Some(Value::String(_))) {
                    fields.insert("name".to_string(), Value::String(id.clone()));
                    changed = true;
                }
                if !matches!(fields.get("email"), Some(Value::String(_) | Value::Null)) {
                    fields.insert("email".to_string(), Value::Null);
                    changed = true;
                }
                let preferred = match fields.get("type") {
                    Some(Value::Null) => Some(Value::Null),
                    Some(Value::String(raw)) => {
                        let canonical = Category::from_alias(raw)
                            .map_or(Value::Null, |c| Value::String(c.key().to_string()));
                        (canonical != Value::String(raw.clone())).then_some(canonical)
                    }
                    _ => Some(Value::Null),
                };
                if let Some(preferred) = preferred {
                    if fields.get("type") != Some(&preferred) {
                        fields.insert("type".to_string(), preferred);
                        changed = true;
                    }
                }
            }
            Value::String(name) => {
                let mut fields = Map::new();
                fields.insert("name".to_string(), Value::String(name.clone()));
                fields.insert("email".to_string(), Value::Null);
                fields.insert("type".to_string(), Value::Null);
                *record = Value::Object(fields);
                changed = true;
            }
            other => {
                return Err(Error::snapshot_format(format!(
                    "player '{id}' has an unreadable record: {other}"
                )))
            }
        }
    }
    Ok(changed)
}

/// A week stored as `null` becomes an empty bucket.
fn normalize_week_buckets(root: &mut Map<String, Value>) -> Result<bool> {
    let mut changed = false;
    for section in WEEK_SECTIONS {
        let Some(Value::Object(weeks)) = root.get_mut(section) else {
            continue;
        };
        for (week, bucket) in weeks {
            match bucket {
                Value::Object(_) => {}
                Value::Null => {
                    *bucket = Value::Object(Map::new());
                    changed = true;
                }
                other => {
                    return Err(Error::snapshot_format(format!(
                        "{section} for week '{week}' is not an object: {other}"
                    )))
                }
            }
        }
    }
    Ok(changed)
}

fn canonical_category_keys(root: &mut Map<String, Value>) -> Result<bool> {
    let mut changed = false;
    for section in WEEK_SECTIONS {
        let Some(Value::Object(weeks)) = root.get_mut(section) else {
            continue;
        };
        for (week, bucket) in weeks {
            let Value::Object(categories) = bucket else {
                continue;
            };
            let stale: Vec<String> = categories
                .keys()
                .filter(|k| Category::from_alias(k).map(Category::key) != Some(k.as_str()))
                .cloned()
                .collect();

            for key in stale {
                let Some(list) = categories.remove(&key) else {
                    continue;
                };
                changed = true;
                let Some(category) = Category::from_alias(&key) else {
                    warn!("Dropping unknown category '{}' in {} for {}", key, section, week);
                    continue;
                };
                let target = categories
                    .entry(category.key().to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                append_entries(target, list);
            }
        }
    }
    Ok(changed)
}

/// Append the entries of `list` to `target`, whatever their encodings.
fn append_entries(target: &mut Value, list: Value) {
    let mut merged = decode_entries(target.take());
    merged.extend(decode_entries(list));
    *target = Value::Array(merged.into_iter().map(Value::String).collect());
}

/// Read the ids out of a list value in any encoding we have ever written.
fn decode_entries(list: Value) -> Vec<String> {
    match list {
        Value::Null => Vec::new(),
        Value::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(items) => items.into_iter().filter_map(decode_entry).collect(),
        other => decode_entry(other).into_iter().collect(),
    }
}

fn decode_entry(item: Value) -> Option<String> {
    match item {
        Value::String(id) => Some(id),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(mut fields) => ["id", "player_id"]
            .iter()
            .find_map(|key| fields.remove(*key))
            .and_then(decode_entry),
        _ => None,
    }
}

fn is_id_list(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string))
}

fn normalize_lists(root: &mut Map<String, Value>) -> Result<bool> {
    let mut changed = false;
    for section in WEEK_SECTIONS {
        let Some(Value::Object(weeks)) = root.get_mut(section) else {
            continue;
        };
        for bucket in weeks.values_mut() {
            let Value::Object(categories) = bucket else {
                continue;
            };
            for list in categories.values_mut() {
                if !is_id_list(list) {
                    let ids = decode_entries(list.take());
                    *list = Value::Array(ids.into_iter().map(Value::String).collect());
                    changed = true;
                }
            }
        }
    }
    Ok(changed)
}

/// Rewrite week keys to the Monday of their week, merging collisions in order.
fn canonical_week_keys(root: &mut Map<String, Value>) -> Result<bool> {
    let mut changed = false;
    for section in WEEK_SECTIONS {
        let Some(Value::Object(weeks)) = root.get_mut(section) else {
            continue;
        };

        let mut renames = Vec::new();
        for key in weeks.keys() {
            let canonical = WeekKey::parse(key)
                .map_err(|_| {
                    Error::snapshot_format(format!("{section} has a non-date week key '{key}'"))
                })?
                .to_string();
            if canonical != *key {
                renames.push((key.clone(), canonical));
            }
        }

        for (old, new) in renames {
            let Some(Value::Object(moved)) = weeks.remove(&old) else {
                continue;
            };
            changed = true;
            let target = weeks
                .entry(new)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(existing) = target {
                for (category, list) in moved {
                    let slot = existing
                        .entry(category)
                        .or_insert_with(|| Value::Array(Vec::new()));
                    append_entries(slot, list);
                }
            }
        }
    }
    Ok(changed)
}

fn pair_weeks(root: &mut Map<String, Value>) -> Result<bool> {
    let week_keys = |root: &Map<String, Value>, section: &str| -> Vec<String> {
        root.get(section)
            .and_then(Value::as_object)
            .map(|weeks| weeks.keys().cloned().collect())
            .unwrap_or_default()
    };
    let signup_weeks = week_keys(&*root, "signups");
    let waitlist_weeks = week_keys(&*root, "waitlists");

    let mut changed = false;
    for (section, missing) in [("waitlists", &signup_weeks), ("signups", &waitlist_weeks)] {
        if let Some(Value::Object(weeks)) = root.get_mut(section) {
            for week in missing {
                if !weeks.contains_key(week) {
                    weeks.insert(week.clone(), Value::Object(Map::new()));
                    changed = true;
                }
            }
        }
    }
    Ok(changed)
}

fn fill_categories(root: &mut Map<String, Value>) -> Result<bool> {
    let mut changed = false;
    for section in WEEK_SECTIONS {
        let Some(Value::Object(weeks)) = root.get_mut(section) else {
            continue;
        };
        for bucket in weeks.values_mut() {
            let Value::Object(categories) = bucket else {
                continue;
            };
            for category in Category::ALL {
                if !categories.contains_key(category.key()) {
                    categories.insert(category.key().to_string(), Value::Array(Vec::new()));
                    changed = true;
                }
            }
        }
    }
    Ok(changed)
}

/// Keep the first occurrence of each id per week and category, confirmed first.
fn drop_duplicates(root: &mut Map<String, Value>) -> Result<bool> {
    let Some(Value::Object(signups)) = root.get("signups").cloned() else {
        return Ok(false);
    };

    let mut changed = false;
    for (week, bucket) in &signups {
        for category in Category::ALL {
            let confirmed = bucket
                .get(category.key())
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let mut seen: Vec<Value> = Vec::new();
            let mut kept = Vec::new();
            for id in &confirmed {
                if !seen.contains(id) {
                    seen.push(id.clone());
                    kept.push(id.clone());
                }
            }
            if kept.len() != confirmed.len() {
                set_list(root, "signups", week, category, kept);
                changed = true;
            }

            let waiting = root
                .get("waitlists")
                .and_then(|w| w.get(week))
                .and_then(|b| b.get(category.key()))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let mut kept = Vec::new();
            for id in &waiting {
                if !seen.contains(id) {
                    seen.push(id.clone());
                    kept.push(id.clone());
                }
            }
            if kept.len() != waiting.len() {
                set_list(root, "waitlists", week, category, kept);
                changed = true;
            }
        }
    }
    Ok(changed)
}

fn set_list(
    root: &mut Map<String, Value>,
    section: &str,
    week: &str,
    category: Category,
    list: Vec<Value>,
) {
    if let Some(Value::Object(categories)) = root
        .get_mut(section)
        .and_then(|weeks| weeks.get_mut(week))
    {
        categories.insert(category.key().to_string(), Value::Array(list));
    }
}
