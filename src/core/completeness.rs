use crate::models::{Profile, VerificationData};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Every profile attribute the completeness table may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    FirstName,
    LastName,
    DateOfBirth,
    Gender,
    ProfilePhoto,
    Bio,
    OccupationStatus,
    Nationality,
    Languages,
    CleanlinessLevel,
    SocialEnergy,
    HouseRulesPreference,
    Smoking,
    Pets,
    CookingFrequency,
    ExerciseFrequency,
    MusicHabits,
    WakeUpTime,
    SleepTime,
    WorkSchedule,
    GuestFrequency,
    OpennessToSharing,
    CulturalOpenness,
    EventParticipation,
    CoreValues,
    ImportantQualities,
    DealBreakers,
    Interests,
    Budget,
    PreferredColivingSize,
    PreferredGenderMix,
    AgeRange,
    PreferredNeighborhoods,
    SmokingTolerance,
    PetsTolerance,
    EmailVerified,
    PhoneVerified,
    KycVerified,
}

impl ProfileField {
    /// Fields answered by the verification provider rather than the profile.
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::EmailVerified | Self::PhoneVerified | Self::KycVerified)
    }

    /// Present and non-empty. Verification fields are filled only when true.
    pub fn is_filled(&self, profile: &Profile, verification: Option<&VerificationData>) -> bool {
        fn has_text(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        match self {
            Self::FirstName => has_text(&profile.first_name),
            Self::LastName => has_text(&profile.last_name),
            Self::DateOfBirth => profile.date_of_birth.is_some(),
            Self::Gender => has_text(&profile.gender),
            Self::ProfilePhoto => has_text(&profile.profile_photo_url),
            Self::Bio => has_text(&profile.bio),
            Self::OccupationStatus => has_text(&profile.occupation_status),
            Self::Nationality => has_text(&profile.nationality),
            Self::Languages => !profile.languages.is_empty(),
            Self::CleanlinessLevel => profile.cleanliness.is_some(),
            Self::SocialEnergy => profile.social_energy.is_some(),
            Self::HouseRulesPreference => profile.house_rules_preference.is_some(),
            Self::Smoking => profile.smoking.is_some(),
            Self::Pets => profile.pets.is_some(),
            Self::CookingFrequency => profile.cooking_frequency.is_some(),
            Self::ExerciseFrequency => profile.exercise_frequency.is_some(),
            Self::MusicHabits => profile.music_habits.is_some(),
            Self::WakeUpTime => profile.wake_up_time.is_some(),
            Self::SleepTime => profile.sleep_time.is_some(),
            Self::WorkSchedule => profile.work_schedule.is_some(),
            Self::GuestFrequency => profile.guest_frequency.is_some(),
            Self::OpennessToSharing => profile.openness_to_sharing.is_some(),
            Self::CulturalOpenness => profile.cultural_openness.is_some(),
            Self::EventParticipation => profile.event_participation.is_some(),
            Self::CoreValues => !profile.core_values.is_empty(),
            Self::ImportantQualities => !profile.important_qualities.is_empty(),
            Self::DealBreakers => !profile.deal_breakers.is_empty(),
            Self::Interests => !profile.interests.is_empty() || !profile.hobbies.is_empty(),
            Self::Budget => profile.budget.is_some(),
            Self::PreferredColivingSize => profile.preferred_coliving_size.is_some(),
            Self::PreferredGenderMix => profile.preferred_gender_mix.is_some(),
            Self::AgeRange => profile.age_range.is_some(),
            Self::PreferredNeighborhoods => !profile.preferred_neighborhoods.is_empty(),
            Self::SmokingTolerance => profile.smoking_tolerance.is_some(),
            Self::PetsTolerance => profile.pets_tolerance.is_some(),
            Self::EmailVerified => verification.is_some_and(|v| v.email_verified),
            Self::PhoneVerified => verification.is_some_and(|v| v.phone_verified),
            Self::KycVerified => verification.is_some_and(|v| v.kyc_verified),
        }
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to read completeness table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse completeness table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid completeness table: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedField {
    pub field: ProfileField,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub fields: Vec<WeightedField>,
}

/// A mandatory unlock condition: at least one of `any_of` must be filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub label: String,
    pub any_of: Vec<ProfileField>,
}

/// Versioned weighting table driving the completeness evaluator.
///
/// The bundled table is `config/completeness.toml`, embedded at build time;
/// deployments can load a newer version from disk without touching the
/// scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessTable {
    pub version: u32,
    /// Minimum weighted percentage to unlock matching and to treat a score
    /// as reliable.
    pub threshold: u8,
    pub categories: Vec<CategorySpec>,
    pub requirements: Vec<Requirement>,
}

const BUNDLED_TABLE: &str = include_str!("../../config/completeness.toml");

impl CompletenessTable {
    /// The table shipped with the crate.
    pub fn bundled() -> Result<Self, TableError> {
        Self::from_toml_str(BUNDLED_TABLE)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, TableError> {
        let table: Self = toml::from_str(source)?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), TableError> {
        if self.threshold > 100 {
            return Err(TableError::Invalid(format!("threshold {} exceeds 100", self.threshold)));
        }
        if self.categories.iter().all(|c| c.fields.is_empty()) {
            return Err(TableError::Invalid("no fields declared".to_string()));
        }
        for category in &self.categories {
            if let Some(bad) = category.fields.iter().find(|f| !(f.weight > 0.0)) {
                return Err(TableError::Invalid(format!(
                    "{:?} in {} has non-positive weight",
                    bad.field, category.name
                )));
            }
        }
        if let Some(empty) = self.requirements.iter().find(|r| r.any_of.is_empty()) {
            return Err(TableError::Invalid(format!("requirement {} lists no fields", empty.label)));
        }
        Ok(())
    }

    /// Evaluate one profile against the table.
    ///
    /// `verification` is `None` when evaluating someone else's profile for
    /// scoring: verification fields are then left out of the totals instead
    /// of counting as missing, though they still block unlocking.
    pub fn evaluate(
        &self,
        profile: &Profile,
        verification: Option<&VerificationData>,
    ) -> ProfileCompleteness {
        let mut filled_weight = 0.0;
        let mut total_weight = 0.0;
        let mut filled_fields = 0;
        let mut total_fields = 0;
        let mut categories = Vec::with_capacity(self.categories.len());
        let mut missing_categories = Vec::new();

        for category in &self.categories {
            let mut filled = 0;
            let mut total = 0;

            for entry in &category.fields {
                if entry.field.is_verification() && verification.is_none() {
                    continue;
                }
                total += 1;
                total_weight += entry.weight;
                if entry.field.is_filled(profile, verification) {
                    filled += 1;
                    filled_weight += entry.weight;
                }
            }

            if total == 0 {
                continue;
            }

            // A category counts as complete once half its fields are filled.
            let is_complete = filled * 2 >= total;
            if !is_complete {
                missing_categories.push(category.name.clone());
            }
            filled_fields += filled;
            total_fields += total;
            categories.push(CategoryProgress {
                category: category.name.clone(),
                filled,
                total,
                is_complete,
            });
        }

        let percentage = if total_weight > 0.0 {
            ((filled_weight / total_weight) * 100.0).round().clamp(0.0, 100.0) as u8
        } else {
            0
        };

        let required_for_unlock: Vec<String> = self
            .requirements
            .iter()
            .filter(|req| !req.any_of.iter().any(|f| f.is_filled(profile, verification)))
            .map(|req| req.label.clone())
            .collect();

        let meets_threshold = percentage >= self.threshold;

        ProfileCompleteness {
            table_version: self.version,
            percentage,
            filled_fields,
            total_fields,
            meets_threshold,
            is_unlocked: meets_threshold && required_for_unlock.is_empty(),
            missing_categories,
            categories,
            required_for_unlock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryProgress {
    pub category: String,
    pub filled: usize,
    pub total: usize,
    pub is_complete: bool,
}

/// Derived completeness report. Recomputed on every load, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCompleteness {
    pub table_version: u32,
    pub percentage: u8,
    pub filled_fields: usize,
    pub total_fields: usize,
    /// Percentage alone reaches the table threshold.
    pub meets_threshold: bool,
    pub is_unlocked: bool,
    pub missing_categories: Vec<String>,
    pub categories: Vec<CategoryProgress>,
    /// Missing mandatory items in table order.
    pub required_for_unlock: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetRange, Frequency, TimePreference};
    use chrono::NaiveDate;

    fn verified() -> VerificationData {
        VerificationData {
            email_verified: true,
            phone_verified: true,
            kyc_verified: false,
        }
    }

    fn rich_profile() -> Profile {
        let mut p = Profile::new("rich");
        p.first_name = Some("Léa".into());
        p.last_name = Some("Martin".into());
        p.date_of_birth = NaiveDate::from_ymd_opt(1996, 4, 2);
        p.gender = Some("female".into());
        p.bio = Some("Designer, plants, jazz".into());
        p.occupation_status = Some("employee".into());
        p.cleanliness = Some(7);
        p.social_energy = Some(6);
        p.smoking = Some(false);
        p.pets = Some(false);
        p.cooking_frequency = Some(Frequency::Often);
        p.wake_up_time = Some(TimePreference::Early);
        p.sleep_time = Some(TimePreference::Moderate);
        p.guest_frequency = Some(Frequency::Rarely);
        p.languages = ["fr".to_string()].into();
        p.core_values = ["respect".to_string()].into();
        p.interests = ["climbing".to_string()].into();
        p.budget = Some(BudgetRange { min: 600.0, max: 900.0 });
        p.smoking_tolerance = Some(false);
        p
    }

    fn bundled() -> CompletenessTable {
        CompletenessTable::bundled().unwrap()
    }

    #[test]
    fn test_bundled_table_is_valid() {
        let table = bundled();
        assert_eq!(table.version, 1);
        assert_eq!(table.threshold, 50);
        let labels: Vec<&str> = table.requirements.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["date_of_birth", "lifestyle", "verified_contact"]);
    }

    #[test]
    fn test_bundled_table_matches_config_file() {
        let table = CompletenessTable::from_path("config/completeness.toml").unwrap();
        assert_eq!(table, bundled());
    }

    #[test]
    fn test_empty_profile() {
        let report = bundled().evaluate(&Profile::new("u"), None);
        assert_eq!(report.percentage, 0);
        assert_eq!(report.filled_fields, 0);
        assert!(!report.is_unlocked);
        assert_eq!(
            report.required_for_unlock,
            vec!["date_of_birth", "lifestyle", "verified_contact"]
        );
    }

    #[test]
    fn test_rich_verified_profile_unlocks() {
        let table = bundled();
        let report = table.evaluate(&rich_profile(), Some(&verified()));

        assert!(report.percentage >= table.threshold, "got {}", report.percentage);
        assert!(report.required_for_unlock.is_empty());
        assert!(report.is_unlocked);
    }

    #[test]
    fn test_volume_cannot_bypass_mandatory_fields() {
        let table = bundled();
        let mut profile = rich_profile();
        profile.date_of_birth = None;

        let report = table.evaluate(&profile, Some(&verified()));

        assert!(report.meets_threshold);
        assert!(!report.is_unlocked);
        assert_eq!(report.required_for_unlock, vec!["date_of_birth"]);
    }

    #[test]
    fn test_unverified_contact_blocks_unlock() {
        let report = bundled().evaluate(&rich_profile(), None);
        assert!(!report.is_unlocked);
        assert_eq!(report.required_for_unlock, vec!["verified_contact"]);
        // Verification fields are not counted without provider data.
        assert!(report.categories.iter().all(|c| c.category != "verification"));
    }

    #[test]
    fn test_empty_strings_and_sets_are_not_filled() {
        let mut profile = Profile::new("u");
        profile.bio = Some("   ".into());
        profile.core_values.clear();

        let report = bundled().evaluate(&profile, None);
        assert_eq!(report.filled_fields, 0);
    }

    #[test]
    fn test_percentage_monotonic_as_fields_fill() {
        let table = bundled();
        let mut profile = Profile::new("u");
        let mut last = table.evaluate(&profile, None).percentage;

        let steps: [fn(&mut Profile); 7] = [
            |p| p.first_name = Some("A".into()),
            |p| p.cleanliness = Some(5),
            |p| p.budget = Some(BudgetRange { min: 1.0, max: 2.0 }),
            |p| p.core_values = ["fun".to_string()].into(),
            |p| p.sleep_time = Some(TimePreference::Late),
            |p| p.date_of_birth = NaiveDate::from_ymd_opt(2000, 1, 1),
            |p| p.pets_tolerance = Some(true),
        ];
        for step in steps {
            step(&mut profile);
            let next = table.evaluate(&profile, None).percentage;
            assert!(next >= last, "{} dropped to {}", last, next);
            last = next;
        }
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let table = bundled();
        let profile = rich_profile();
        assert_eq!(table.evaluate(&profile, None), table.evaluate(&profile, None));
    }

    #[test]
    fn test_rejects_invalid_tables() {
        let bad_threshold = r#"
            version = 2
            threshold = 140
            requirements = []
            [[categories]]
            name = "x"
            fields = [{ field = "bio" }]
        "#;
        assert!(matches!(
            CompletenessTable::from_toml_str(bad_threshold),
            Err(TableError::Invalid(_))
        ));

        let bad_field = r#"
            version = 2
            threshold = 50
            requirements = []
            [[categories]]
            name = "x"
            fields = [{ field = "shoe_size" }]
        "#;
        assert!(matches!(
            CompletenessTable::from_toml_str(bad_field),
            Err(TableError::Parse(_))
        ));
    }
}
