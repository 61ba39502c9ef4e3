use crate::models::{Frequency, MusicHabits, Profile, TimePreference};
use serde::{Deserialize, Serialize};

/// A stated habit a deal-breaker can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Habit {
    Smoking,
    Pets,
    Alcohol,
    LoudMusic,
    FrequentGuests,
    LateNights,
    Untidiness,
}

impl Habit {
    /// Word patterns that tie a free-text deal-breaker to this habit.
    ///
    /// A trailing `*` matches any word starting with the stem; otherwise the
    /// word must equal the pattern, optionally pluralised with `s`. Patterns
    /// with several words must match consecutive words.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Smoking => &["smok*", "cigar*", "fumeur*", "tabac", "vape", "vaping"],
            Self::Pets => &["pet", "animal", "dog", "cat", "chien"],
            Self::Alcohol => &["alcohol*", "drink*", "drunk", "alcool"],
            Self::LoudMusic => &["music*", "noise", "noisy", "loud*", "bruit*"],
            Self::FrequentGuests => &["guest", "visitor", "party", "parties", "partying", "invité"],
            Self::LateNights => &["late night", "night owl", "nocturn*"],
            Self::Untidiness => &["mess", "messy", "dirt*", "untidy", "sale", "désordre"],
        }
    }

    const ALL: [Habit; 7] = [
        Habit::Smoking,
        Habit::Pets,
        Habit::Alcohol,
        Habit::LoudMusic,
        Habit::FrequentGuests,
        Habit::LateNights,
        Habit::Untidiness,
    ];

    /// Whether `profile` has declared this habit: `Some(true)` it practises
    /// it, `Some(false)` it explicitly does not, `None` unknown.
    pub fn practised_by(&self, profile: &Profile) -> Option<bool> {
        match self {
            Self::Smoking => profile.smoking,
            Self::Pets => profile.pets,
            Self::Alcohol => profile.drinks_alcohol,
            Self::LoudMusic => profile
                .music_habits
                .map(|m| m == MusicHabits::SocialListening),
            Self::FrequentGuests => profile
                .guest_frequency
                .map(|g| g.level() >= Frequency::Often.level()),
            Self::LateNights => profile.sleep_time.as_ref().map(|s| *s == TimePreference::Late),
            Self::Untidiness => profile.cleanliness.map(|c| c <= 3),
        }
    }
}

/// Habits a deal-breaker phrase refers to. One phrase may target several.
pub fn habits_in(phrase: &str) -> Vec<Habit> {
    let lowered = phrase.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    Habit::ALL
        .into_iter()
        .filter(|habit| habit.keywords().iter().any(|k| mentions(&words, k)))
        .collect()
}

fn mentions(words: &[&str], keyword: &str) -> bool {
    let patterns: Vec<&str> = keyword.split_whitespace().collect();
    words.windows(patterns.len()).any(|window| {
        window
            .iter()
            .zip(&patterns)
            .all(|(word, pattern)| word_matches(word, pattern))
    })
}

fn word_matches(word: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(stem) => word.starts_with(stem),
        None => word == pattern || word.strip_suffix('s') == Some(pattern),
    }
}

/// One owner constraint violated by the other side's habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub owner_id: String,
    pub other_id: String,
    pub habit: Habit,
    /// The deal-breaker phrase, or the tolerance flag that triggered it.
    pub constraint: String,
}

/// Result of checking one side's hard constraints against the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintCheck {
    pub conflicts: Vec<Conflict>,
    /// At least one constraint could be compared against declared data.
    pub evaluable: bool,
}

/// Check `owner`'s deal-breakers and explicit intolerances against
/// `other`'s stated habits.
///
/// A `smoking_tolerance` or `pets_tolerance` of `false` counts as an
/// implicit deal-breaker.
pub fn check(owner: &Profile, other: &Profile) -> ConstraintCheck {
    let mut result = ConstraintCheck::default();

    let mut test = |habit: Habit, constraint: &str| match habit.practised_by(other) {
        Some(true) => {
            result.evaluable = true;
            result.conflicts.push(Conflict {
                owner_id: owner.user_id.clone(),
                other_id: other.user_id.clone(),
                habit,
                constraint: constraint.to_string(),
            });
        }
        Some(false) => result.evaluable = true,
        None => {}
    };

    for phrase in &owner.deal_breakers {
        for habit in habits_in(phrase) {
            test(habit, phrase);
        }
    }
    if owner.smoking_tolerance == Some(false) {
        test(Habit::Smoking, "smoking_tolerance");
    }
    if owner.pets_tolerance == Some(false) {
        test(Habit::Pets, "pets_tolerance");
    }

    result
}
