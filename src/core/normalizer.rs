use crate::core::error::NormalizeError;
use crate::models::raw::{CleanlinessValue, RawField, RawProfileRecord};
use crate::models::{
    AgeRange, BudgetRange, ColivingSize, CulturalOpenness, DietType, EventInterest, Frequency,
    GenderMix, MusicHabits, Profile, SharingOpenness, TimePreference, WorkSchedule,
};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Map a raw persisted row into the canonical [`Profile`].
///
/// Pure and deterministic. A missing or unparseable source value always
/// leaves the destination field absent; nothing is defaulted.
pub fn normalize(raw: &RawProfileRecord) -> Result<Profile, NormalizeError> {
    let user_id = text(raw, &["user_id", "userId", "id"]).ok_or(NormalizeError::MissingUserId)?;

    Ok(Profile {
        user_id,
        user_type: text(raw, &["user_type", "userType"]),

        first_name: text(raw, &["first_name", "firstName"]),
        last_name: text(raw, &["last_name", "lastName"]),
        date_of_birth: date(raw, &["date_of_birth", "dateOfBirth", "birth_date"]),
        gender: text(raw, &["gender", "gender_identity"]).map(|g| g.to_lowercase()),
        nationality: text(raw, &["nationality"]),
        languages: set(raw, &["languages_spoken", "languages"]),
        occupation_status: text(raw, &["occupation_status"]),
        bio: text(raw, &["bio"]),
        profile_photo_url: text(raw, &["profile_photo_url", "avatar_url"]),
        interests: set(raw, &["interests"]),
        hobbies: set(raw, &["hobbies"]),

        cleanliness: cleanliness(raw),
        social_energy: social_energy(raw),
        house_rules_preference: scale(raw, &["house_rules_preference"]),
        wake_up_time: time_preference(raw, &["wake_up_time", "wakeUp"]),
        sleep_time: time_preference(raw, &["sleep_time", "sleep"]),
        work_schedule: vocab(raw, &["work_schedule"], WorkSchedule::parse),
        exercise_frequency: vocab(raw, &["exercise_frequency", "sports_frequency"], Frequency::parse),
        cooking_frequency: vocab(raw, &["cooking_frequency"], Frequency::parse),
        guest_frequency: vocab(raw, &["guest_frequency"], Frequency::parse),
        smoking: flag(raw, &["smoking", "is_smoker"]),
        pets: flag(raw, &["pets", "has_pets"]),
        drinks_alcohol: flag(raw, &["drinks_alcohol"]),
        diet_type: vocab(raw, &["diet_type"], DietType::parse),
        music_habits: vocab(raw, &["music_habits"], MusicHabits::parse),
        openness_to_sharing: vocab(raw, &["openness_to_sharing"], SharingOpenness::parse),
        cultural_openness: vocab(raw, &["cultural_openness"], CulturalOpenness::parse),
        event_participation: vocab(
            raw,
            &["event_participation_interest", "event_interest"],
            EventInterest::parse,
        ),
        shared_meals_interest: flag(raw, &["shared_meals_interest"]),

        core_values: set(raw, &["core_values"]),
        important_qualities: set(raw, &["important_qualities"]),
        deal_breakers: set(raw, &["deal_breakers", "dealbreakers"]),
        preferred_coliving_size: vocab(raw, &["preferred_coliving_size"], ColivingSize::parse),
        preferred_gender_mix: vocab(
            raw,
            &["preferred_gender_mix", "gender_preference"],
            GenderMix::parse,
        ),
        age_range: age_range(raw),
        budget: budget(raw),
        preferred_neighborhoods: set(raw, &["preferred_neighborhoods"]),
        smoking_tolerance: flag(raw, &["smoking_tolerance"]),
        pets_tolerance: flag(raw, &["pets_tolerance"]),
    })
}

/// Cleanliness on the 1-10 scale. Numeric input is rounded; values outside
/// the scale are treated as unknown.
fn cleanliness(raw: &RawProfileRecord) -> Option<u8> {
    match CleanlinessValue::from_raw(raw.field(&["cleanliness_level", "cleanliness"])) {
        CleanlinessValue::Numeric(n) => on_scale(n, 10.0),
        CleanlinessValue::Vocabulary(tag) => Some(tag.level()),
        CleanlinessValue::Unknown => None,
    }
}

/// Social energy on 1-10. Falls back to the 1-5 introvert/extrovert scale,
/// stretched so 1 → 1 and 5 → 10.
fn social_energy(raw: &RawProfileRecord) -> Option<u8> {
    if let Some(energy) = scale(raw, &["social_energy"]) {
        return Some(energy);
    }
    match raw.field(&["introvert_extrovert_scale"]) {
        RawField::Number(n) => on_scale(n, 5.0).map(|s| (1.0 + (s as f64 - 1.0) * 2.25).round() as u8),
        _ => None,
    }
}

fn scale(raw: &RawProfileRecord, keys: &[&str]) -> Option<u8> {
    match raw.field(keys) {
        RawField::Number(n) => on_scale(n, 10.0),
        RawField::Text(text) => text.trim().parse::<f64>().ok().and_then(|n| on_scale(n, 10.0)),
        _ => None,
    }
}

fn on_scale(n: f64, max: f64) -> Option<u8> {
    let rounded = n.round();
    if rounded.is_finite() && rounded >= 1.0 && rounded <= max {
        Some(rounded as u8)
    } else {
        None
    }
}

fn time_preference(raw: &RawProfileRecord, keys: &[&str]) -> Option<TimePreference> {
    match raw.field(keys) {
        RawField::Text(text) => classify_time(text),
        _ => None,
    }
}

/// Free-text time preference → category. Early is checked before late so
/// "early morning" never reads as late.
pub fn classify_time(text: &str) -> Option<TimePreference> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let has_any = |needles: &[&str]| needles.iter().any(|n| lowered.contains(n));

    let preference = if has_any(&["early", "tôt", "morning"]) {
        TimePreference::Early
    } else if has_any(&["late", "tard", "night"]) {
        TimePreference::Late
    } else if has_any(&["moderate", "normal", "regular"]) {
        TimePreference::Moderate
    } else {
        TimePreference::Other(lowered)
    };
    Some(preference)
}

fn text(raw: &RawProfileRecord, keys: &[&str]) -> Option<String> {
    match raw.field(keys) {
        RawField::Text(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

fn flag(raw: &RawProfileRecord, keys: &[&str]) -> Option<bool> {
    match raw.field(keys) {
        RawField::Bool(flag) => Some(flag),
        RawField::Text(text) => match text.trim().to_lowercase().as_str() {
            "true" | "yes" | "oui" => Some(true),
            "false" | "no" | "non" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn number(raw: &RawProfileRecord, keys: &[&str]) -> Option<f64> {
    match raw.field(keys) {
        RawField::Number(n) if n.is_finite() => Some(n),
        RawField::Text(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn vocab<T>(raw: &RawProfileRecord, keys: &[&str], parse: fn(&str) -> Option<T>) -> Option<T> {
    match raw.field(keys) {
        RawField::Text(text) => {
            let parsed = parse(text);
            if parsed.is_none() {
                tracing::debug!("Unrecognised value {:?} for {:?}", text, keys);
            }
            parsed
        }
        _ => None,
    }
}

fn set(raw: &RawProfileRecord, keys: &[&str]) -> BTreeSet<String> {
    match raw.field(keys) {
        RawField::List(items) => items
            .into_iter()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        RawField::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => BTreeSet::new(),
    }
}

fn date(raw: &RawProfileRecord, keys: &[&str]) -> Option<NaiveDate> {
    match raw.field(keys) {
        // Accept plain dates and the date part of timestamps.
        RawField::Text(text) => text
            .get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()),
        _ => None,
    }
}

/// Both bounds are required; reversed bounds are swapped.
fn budget(raw: &RawProfileRecord) -> Option<BudgetRange> {
    let min = number(raw, &["min_budget", "budget_min"])?;
    let max = number(raw, &["max_budget", "budget_max"])?;
    if min < 0.0 || max < 0.0 {
        return None;
    }
    Some(BudgetRange {
        min: min.min(max),
        max: min.max(max),
    })
}

fn age_range(raw: &RawProfileRecord) -> Option<AgeRange> {
    let min = number(raw, &["age_range_min", "preferred_age_min"])?;
    let max = number(raw, &["age_range_max", "preferred_age_max"])?;
    if min < 0.0 || max < 0.0 {
        return None;
    }
    let (min, max) = (min.min(max).round() as u32, min.max(max).round() as u32);
    Some(AgeRange { min, max })
}
