use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Declares a closed categorical vocabulary with its wire names.
///
/// Every vocabulary gets `parse` (case-insensitive, trims, accepts `-` or
/// space for `_`) and `as_str`.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn parse(raw: &str) -> Option<Self> {
                let key = raw.trim().to_lowercase().replace(['-', ' '], "_");
                match key.as_str() {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }
    };
}

vocabulary! {
    /// How often someone does something, never → daily.
    pub enum Frequency {
        Never => "never",
        Rarely => "rarely",
        Sometimes => "sometimes",
        Often => "often",
        Daily => "daily",
    }
}

impl Frequency {
    pub fn level(&self) -> u8 {
        match self {
            Self::Never => 0,
            Self::Rarely => 1,
            Self::Sometimes => 2,
            Self::Often => 3,
            Self::Daily => 4,
        }
    }
}

vocabulary! {
    pub enum WorkSchedule {
        Office => "office",
        Hybrid => "hybrid",
        Remote => "remote",
        Flexible => "flexible",
        Student => "student",
    }
}

impl WorkSchedule {
    /// Whether the person is home during working hours most days.
    pub fn home_during_day(&self) -> bool {
        matches!(self, Self::Remote | Self::Flexible)
    }
}

vocabulary! {
    pub enum MusicHabits {
        None => "none",
        HeadphonesOnly => "headphones_only",
        HeadphonesMostly => "headphones_mostly",
        QuietBackground => "quiet_background",
        SocialListening => "social_listening",
    }
}

impl MusicHabits {
    pub fn level(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::HeadphonesOnly => 1,
            Self::HeadphonesMostly => 2,
            Self::QuietBackground => 3,
            Self::SocialListening => 4,
        }
    }
}

vocabulary! {
    pub enum DietType {
        Omnivore => "omnivore",
        Vegetarian => "vegetarian",
        Vegan => "vegan",
        Flexitarian => "flexitarian",
        Pescatarian => "pescatarian",
    }
}

vocabulary! {
    pub enum SharingOpenness {
        Private => "private",
        Moderate => "moderate",
        Open => "open",
        VeryOpen => "very_open",
    }
}

impl SharingOpenness {
    pub fn level(&self) -> u8 {
        match self {
            Self::Private => 1,
            Self::Moderate => 2,
            Self::Open => 3,
            Self::VeryOpen => 4,
        }
    }
}

vocabulary! {
    pub enum CulturalOpenness {
        Conservative => "conservative",
        Moderate => "moderate",
        Open => "open",
        VeryOpen => "very_open",
    }
}

impl CulturalOpenness {
    pub fn level(&self) -> u8 {
        match self {
            Self::Conservative => 1,
            Self::Moderate => 2,
            Self::Open => 3,
            Self::VeryOpen => 4,
        }
    }
}

vocabulary! {
    pub enum EventInterest {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

impl EventInterest {
    pub fn level(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

vocabulary! {
    /// Preferred household size: small 2-3, medium 4-6, large 7-10, very large 10+.
    pub enum ColivingSize {
        Small => "small",
        Medium => "medium",
        Large => "large",
        VeryLarge => "very_large",
    }
}

impl ColivingSize {
    pub fn level(&self) -> u8 {
        match self {
            Self::Small => 1,
            Self::Medium => 2,
            Self::Large => 3,
            Self::VeryLarge => 4,
        }
    }
}

vocabulary! {
    pub enum GenderMix {
        NoPreference => "no_preference",
        SameGender => "same_gender",
        Mixed => "mixed",
    }
}

/// Wake or sleep time preference.
///
/// Unrecognised free text is kept lowercased in `Other` so downstream code
/// can still compare it for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePreference {
    Early,
    Moderate,
    Late,
    Other(String),
}

impl TimePreference {
    /// Position on the early → late axis, if known.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Early => Some(0),
            Self::Moderate => Some(1),
            Self::Late => Some(2),
            Self::Other(_) => None,
        }
    }
}

/// Inclusive monthly budget range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: f64,
    pub max: f64,
}

impl BudgetRange {
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Length of the shared interval; negative when the ranges are disjoint.
    pub fn overlap(&self, other: &BudgetRange) -> f64 {
        self.max.min(other.max) - self.min.max(other.min)
    }
}

/// Inclusive preferred roommate age range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

impl AgeRange {
    pub fn contains(&self, age: u32) -> bool {
        age >= self.min && age <= self.max
    }
}

/// Canonical, normalised profile used by every scoring component.
///
/// Every attribute is independently optional. Set-valued attributes use an
/// empty set for "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub user_type: Option<String>,

    // Demographics
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub languages: BTreeSet<String>,
    pub occupation_status: Option<String>,
    pub bio: Option<String>,
    pub profile_photo_url: Option<String>,
    pub interests: BTreeSet<String>,
    pub hobbies: BTreeSet<String>,

    // Lifestyle
    pub cleanliness: Option<u8>,
    pub social_energy: Option<u8>,
    pub house_rules_preference: Option<u8>,
    pub wake_up_time: Option<TimePreference>,
    pub sleep_time: Option<TimePreference>,
    pub work_schedule: Option<WorkSchedule>,
    pub exercise_frequency: Option<Frequency>,
    pub cooking_frequency: Option<Frequency>,
    pub guest_frequency: Option<Frequency>,
    pub smoking: Option<bool>,
    pub pets: Option<bool>,
    pub drinks_alcohol: Option<bool>,
    pub diet_type: Option<DietType>,
    pub music_habits: Option<MusicHabits>,
    pub openness_to_sharing: Option<SharingOpenness>,
    pub cultural_openness: Option<CulturalOpenness>,
    pub event_participation: Option<EventInterest>,
    pub shared_meals_interest: Option<bool>,

    // Values and preferences
    pub core_values: BTreeSet<String>,
    pub important_qualities: BTreeSet<String>,
    pub deal_breakers: BTreeSet<String>,
    pub preferred_coliving_size: Option<ColivingSize>,
    pub preferred_gender_mix: Option<GenderMix>,
    pub age_range: Option<AgeRange>,
    pub budget: Option<BudgetRange>,
    pub preferred_neighborhoods: BTreeSet<String>,
    pub smoking_tolerance: Option<bool>,
    pub pets_tolerance: Option<bool>,
}

impl Profile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Age in whole years on the given date.
    pub fn age_on(&self, date: NaiveDate) -> Option<u32> {
        let dob = self.date_of_birth?;
        if dob > date {
            return None;
        }
        let mut age = date.year() - dob.year();
        if (date.month(), date.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.user_id.clone(),
        }
    }
}

/// Auxiliary account facts from the verification provider. Only the
/// completeness evaluator reads these.
///
/// Missing or `null` flags read as unverified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationData {
    #[serde(default, deserialize_with = "null_as_false")]
    pub email_verified: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub phone_verified: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub kyc_verified: bool,
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_null_and_missing_flags_are_false() {
        let data: VerificationData = serde_json::from_value(serde_json::json!({
            "email_verified": true,
            "phone_verified": null
        }))
        .unwrap();

        assert!(data.email_verified);
        assert!(!data.phone_verified);
        assert!(!data.kyc_verified);
    }

    #[test]
    fn test_vocabulary_parse_is_lenient() {
        assert_eq!(Frequency::parse(" Daily "), Some(Frequency::Daily));
        assert_eq!(MusicHabits::parse("headphones-only"), Some(MusicHabits::HeadphonesOnly));
        assert_eq!(ColivingSize::parse("very large"), Some(ColivingSize::VeryLarge));
        assert_eq!(DietType::parse("carnivore"), None);
        assert_eq!(GenderMix::SameGender.as_str(), "same_gender");
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        let mut profile = Profile::new("u1");
        profile.date_of_birth = NaiveDate::from_ymd_opt(1995, 6, 15);

        let before = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
        let on = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();

        assert_eq!(profile.age_on(before), Some(29));
        assert_eq!(profile.age_on(on), Some(30));
    }

    #[test]
    fn test_budget_overlap() {
        let a = BudgetRange { min: 700.0, max: 1000.0 };
        let b = BudgetRange { min: 750.0, max: 950.0 };
        let c = BudgetRange { min: 500.0, max: 600.0 };

        assert_eq!(a.overlap(&b), 200.0);
        assert!(a.overlap(&c) < 0.0);
    }
}
