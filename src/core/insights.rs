use crate::core::dealbreakers::{ConstraintCheck, Habit};
use crate::core::scoring::{Dimension, DimensionScore};
use crate::models::Profile;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Coarse label for a 0-100 compatibility score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityQuality {
    Excellent,
    Great,
    Good,
    Fair,
    Low,
}

impl CompatibilityQuality {
    pub fn from_score(score: u8) -> Self {
        match score {
            85..=u8::MAX => Self::Excellent,
            70..=84 => Self::Great,
            55..=69 => Self::Good,
            40..=54 => Self::Fair,
            _ => Self::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent Match",
            Self::Great => "Great Match",
            Self::Good => "Good Match",
            Self::Fair => "Fair Match",
            Self::Low => "Low Compatibility",
        }
    }
}

/// Human-readable explanation attached to a compatibility result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInsights {
    pub strengths: Vec<String>,
    pub considerations: Vec<String>,
    /// Violated hard constraints, from either side.
    pub dealbreakers: Vec<String>,
}

fn habit_label(habit: Habit) -> &'static str {
    match habit {
        Habit::Smoking => "smoking",
        Habit::Pets => "pets",
        Habit::Alcohol => "alcohol",
        Habit::LoudMusic => "loud music",
        Habit::FrequentGuests => "frequent guests",
        Habit::LateNights => "late nights",
        Habit::Untidiness => "untidiness",
    }
}

fn measured(breakdown: &[DimensionScore], dimension: Dimension) -> Option<f64> {
    breakdown
        .iter()
        .find(|d| d.dimension == dimension && !d.estimated)
        .map(|d| d.score)
}

pub fn describe(
    breakdown: &[DimensionScore],
    a: &Profile,
    b: &Profile,
    own: &ConstraintCheck,
    reverse: &ConstraintCheck,
    today: NaiveDate,
) -> MatchInsights {
    let mut insights = MatchInsights::default();

    match measured(breakdown, Dimension::Lifestyle) {
        Some(s) if s >= 0.83 => insights
            .strengths
            .push("Very similar daily routines and lifestyle habits".into()),
        Some(s) if s >= 0.67 => insights.strengths.push("Compatible lifestyle preferences".into()),
        _ => {}
    }
    if let (Some(x), Some(y)) = (a.cleanliness, b.cleanliness) {
        if x.abs_diff(y) <= 2 {
            insights.strengths.push("Similar cleanliness standards".into());
        } else if x.abs_diff(y) > 3 {
            insights
                .considerations
                .push("Different cleanliness standards - consider agreeing on house rules".into());
        }
    }
    if a.shared_meals_interest == Some(true) && b.shared_meals_interest == Some(true) {
        insights.strengths.push("Both enjoy sharing meals".into());
    }

    match measured(breakdown, Dimension::Schedule) {
        Some(s) if s >= 0.8 => insights.strengths.push("Similar daily rhythm".into()),
        Some(s) if s < 0.6 => insights
            .considerations
            .push("Different daily rhythms - may need to discuss schedules".into()),
        _ => {}
    }

    match measured(breakdown, Dimension::Social) {
        Some(s) if s >= 0.8 => insights.strengths.push("Great social compatibility".into()),
        Some(s) if s >= 0.6 => insights.strengths.push("Good social vibe match".into()),
        Some(_) => insights
            .considerations
            .push("Different social preferences - communication will be key".into()),
        None => {}
    }
    if let (Some(x), Some(y)) = (a.guest_frequency, b.guest_frequency) {
        if x.level().abs_diff(y.level()) >= 2 {
            insights
                .considerations
                .push("Different expectations about having guests over".into());
        }
    }

    match measured(breakdown, Dimension::Budget) {
        Some(s) if s >= 0.8 => insights
            .strengths
            .push("Practical aspects align well (budget, location, preferences)".into()),
        Some(s) if s < 0.6 => insights
            .considerations
            .push("Some practical aspects may need discussion (budget, location)".into()),
        _ => {}
    }

    if let Some(s) = measured(breakdown, Dimension::Values) {
        if s >= 0.6 {
            insights.strengths.push("Shared values and interests".into());
        }
    }

    let estimated = breakdown.iter().filter(|d| d.estimated).count();
    if estimated >= 3 {
        insights
            .considerations
            .push("Several areas are estimated because profiles are incomplete".into());
    }

    for conflict in own.conflicts.iter().chain(&reverse.conflicts) {
        insights.dealbreakers.push(format!(
            "{} does not accept {} ({})",
            conflict.owner_id,
            habit_label(conflict.habit),
            conflict.constraint
        ));
    }
    for (viewer, other) in [(a, b), (b, a)] {
        if let (Some(range), Some(age)) = (viewer.age_range, other.age_on(today)) {
            if !range.contains(age) {
                insights.dealbreakers.push(format!(
                    "{} is outside {}'s preferred age range ({}-{})",
                    other.user_id, viewer.user_id, range.min, range.max
                ));
            }
        }
    }

    insights
}
