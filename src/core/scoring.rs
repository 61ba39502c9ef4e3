use crate::core::completeness::{CompletenessTable, ProfileCompleteness, TableError};
use crate::core::dealbreakers::{self, Conflict, ConstraintCheck};
use crate::core::insights::{self, CompatibilityQuality, MatchInsights};
use crate::models::{Profile, TimePreference};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Value a dimension takes when either side lacks the data to score it.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Scoring dimensions, in aggregation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Cleanliness, house rules, cooking, exercise and music habits.
    Lifestyle,
    /// Wake/sleep times and work schedule.
    Schedule,
    /// Budget overlap plus the housing practicalities that go with it:
    /// age preferences, household size, gender mix and neighbourhoods.
    Budget,
    /// Social energy, openness, events and guests.
    Social,
    /// Shared values, qualities, interests and languages.
    Values,
    /// Hard constraints of the first profile against the second.
    DealBreakers,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Lifestyle,
        Dimension::Schedule,
        Dimension::Budget,
        Dimension::Social,
        Dimension::Values,
        Dimension::DealBreakers,
    ];
}

/// Dimension weights. Normalised by their sum when aggregating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub lifestyle: f64,
    pub schedule: f64,
    pub budget: f64,
    pub social: f64,
    pub values: f64,
    pub deal_breakers: f64,
}

impl ScoringWeights {
    pub fn weight(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Lifestyle => self.lifestyle,
            Dimension::Schedule => self.schedule,
            Dimension::Budget => self.budget,
            Dimension::Social => self.social,
            Dimension::Values => self.values,
            Dimension::DealBreakers => self.deal_breakers,
        }
    }

    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.weight(*d)).sum()
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            lifestyle: 0.25,
            schedule: 0.15,
            budget: 0.20,
            social: 0.15,
            values: 0.15,
            deal_breakers: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScore {
    pub dimension: Dimension,
    /// Sub-score in [0, 1].
    pub score: f64,
    /// Contribution to the final 0-100 score.
    pub points: f64,
    /// No sub-field was present on both sides; `score` is neutral.
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessPair {
    pub user1: ProfileCompleteness,
    pub user2: ProfileCompleteness,
}

/// Compatibility of `user1` with `user2`. Derived on demand, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    pub user1_id: String,
    pub user2_id: String,
    pub score: u8,
    pub breakdown: Vec<DimensionScore>,
    pub profile_completeness: CompletenessPair,
    /// Both profiles reach the completeness threshold.
    pub is_score_reliable: bool,
    /// `user1`'s hard constraints that `user2` violates.
    pub conflicts: Vec<Conflict>,
    pub quality: CompatibilityQuality,
    pub insights: MatchInsights,
}

impl CompatibilityResult {
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionScore> {
        self.breakdown.iter().find(|d| d.dimension == dimension)
    }

    pub fn estimated_dimensions(&self) -> usize {
        self.breakdown.iter().filter(|d| d.estimated).count()
    }
}

/// Pairwise compatibility scorer.
///
/// Stateless apart from its configuration; safe to share between threads.
#[derive(Debug, Clone)]
pub struct CompatibilityScorer {
    weights: ScoringWeights,
    table: Arc<CompletenessTable>,
    reference_date: NaiveDate,
}

impl CompatibilityScorer {
    pub fn new(weights: ScoringWeights, table: Arc<CompletenessTable>) -> Self {
        Self {
            weights,
            table,
            reference_date: Utc::now().date_naive(),
        }
    }

    /// Default weights over the bundled completeness table.
    pub fn bundled() -> Result<Self, TableError> {
        Ok(Self::new(ScoringWeights::default(), Arc::new(CompletenessTable::bundled()?)))
    }

    /// Fix the date ages are computed against.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = date;
        self
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn table(&self) -> &CompletenessTable {
        &self.table
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// Score `a` against `b`.
    ///
    /// Every dimension except deal-breakers is symmetric, so swapping the
    /// arguments only changes whose hard constraints are enforced.
    pub fn score(&self, a: &Profile, b: &Profile) -> CompatibilityResult {
        let user1 = self.table.evaluate(a, None);
        let user2 = self.table.evaluate(b, None);
        let is_score_reliable = user1.meets_threshold && user2.meets_threshold;

        let own = dealbreakers::check(a, b);
        let reverse = dealbreakers::check(b, a);

        let total_weight = self.weights.sum();
        let breakdown: Vec<DimensionScore> = Dimension::ALL
            .iter()
            .map(|&dimension| {
                let computed = match dimension {
                    Dimension::Lifestyle => lifestyle(a, b),
                    Dimension::Schedule => schedule(a, b),
                    Dimension::Budget => budget(a, b, self.reference_date),
                    Dimension::Social => social(a, b),
                    Dimension::Values => values(a, b),
                    Dimension::DealBreakers => deal_breakers(&own, &reverse),
                };
                let (score, estimated) = match computed {
                    Some(score) => (score.clamp(0.0, 1.0), false),
                    None => (NEUTRAL_SCORE, true),
                };
                let points = if total_weight > 0.0 {
                    score * self.weights.weight(dimension) / total_weight * 100.0
                } else {
                    0.0
                };
                DimensionScore {
                    dimension,
                    score,
                    points,
                    estimated,
                }
            })
            .collect();

        let total: f64 = breakdown.iter().map(|d| d.points).sum();
        let score = total.clamp(0.0, 100.0).round() as u8;

        let insights = insights::describe(&breakdown, a, b, &own, &reverse, self.reference_date);

        CompatibilityResult {
            user1_id: a.user_id.clone(),
            user2_id: b.user_id.clone(),
            score,
            breakdown,
            profile_completeness: CompletenessPair { user1, user2 },
            is_score_reliable,
            conflicts: own.conflicts,
            quality: CompatibilityQuality::from_score(score),
            insights,
        }
    }
}


/// Points earned over points available, counting only sub-fields both
/// profiles declared.
#[derive(Debug, Default)]
struct Tally {
    earned: f64,
    available: f64,
}

impl Tally {
    fn add(&mut self, scored: Option<f64>, max: f64) {
        if let Some(earned) = scored {
            self.earned += earned.clamp(0.0, max);
            self.available += max;
        }
    }

    fn finish(self) -> Option<f64> {
        (self.available > 0.0).then(|| self.earned / self.available)
    }
}

fn both<T, U>(a: Option<T>, b: Option<U>) -> Option<(T, U)> {
    a.zip(b)
}

/// `max` points, minus `per_step` for each step apart.
fn closeness(a: u8, b: u8, max: f64, per_step: f64) -> f64 {
    (max - f64::from(a.abs_diff(b)) * per_step).max(0.0)
}

fn lifestyle(a: &Profile, b: &Profile) -> Option<f64> {
    let mut tally = Tally::default();
    tally.add(
        both(a.cleanliness, b.cleanliness).map(|(x, y)| closeness(x, y, 8.0, 0.8)),
        8.0,
    );
    tally.add(
        both(a.house_rules_preference, b.house_rules_preference).map(|(x, y)| closeness(x, y, 7.0, 0.7)),
        7.0,
    );
    tally.add(
        both(a.cooking_frequency, b.cooking_frequency).map(|(x, y)| closeness(x.level(), y.level(), 5.0, 1.25)),
        5.0,
    );
    tally.add(
        both(a.exercise_frequency, b.exercise_frequency).map(|(x, y)| closeness(x.level(), y.level(), 3.0, 0.75)),
        3.0,
    );
    tally.add(
        both(a.music_habits, b.music_habits).map(|(x, y)| closeness(x.level(), y.level(), 4.0, 1.0)),
        4.0,
    );
    tally.finish()
}

fn time_points(a: &TimePreference, b: &TimePreference) -> f64 {
    if a == b {
        return 5.0;
    }
    match (a.rank(), b.rank()) {
        (Some(x), Some(y)) if x.abs_diff(y) == 1 => 3.0,
        (Some(_), Some(_)) => 1.0,
        // Unrecognised wording only compares for equality.
        _ => 0.0,
    }
}

fn schedule(a: &Profile, b: &Profile) -> Option<f64> {
    let mut tally = Tally::default();
    tally.add(
        both(a.wake_up_time.as_ref(), b.wake_up_time.as_ref()).map(|(x, y)| time_points(x, y)),
        5.0,
    );
    tally.add(
        both(a.sleep_time.as_ref(), b.sleep_time.as_ref()).map(|(x, y)| time_points(x, y)),
        5.0,
    );
    tally.add(
        both(a.work_schedule, b.work_schedule).map(|(x, y)| {
            if x == y {
                3.0
            } else if x.home_during_day() == y.home_during_day() {
                2.0
            } else {
                1.0
            }
        }),
        3.0,
    );
    tally.finish()
}

fn budget(a: &Profile, b: &Profile, today: NaiveDate) -> Option<f64> {
    let mut tally = Tally::default();

    tally.add(
        both(a.budget, b.budget).map(|(x, y)| {
            let overlap = x.overlap(&y);
            let average_width = ((x.width() + y.width()) / 2.0).max(1.0);
            if overlap > 0.0 {
                (overlap / average_width).min(1.0) * 7.0
            } else {
                0.0
            }
        }),
        7.0,
    );

    tally.add(
        both(a.age_on(today), b.age_on(today)).map(|(age_a, age_b)| {
            let a_accepts = a.age_range.map_or(true, |r| r.contains(age_b));
            let b_accepts = b.age_range.map_or(true, |r| r.contains(age_a));
            let gap = age_a.abs_diff(age_b);
            if a_accepts && b_accepts {
                6.0
            } else if gap <= 5 {
                4.0
            } else if gap <= 10 {
                2.0
            } else {
                0.0
            }
        }),
        6.0,
    );

    tally.add(
        both(a.preferred_coliving_size, b.preferred_coliving_size).map(|(x, y)| {
            if x == y {
                4.0
            } else {
                closeness(x.level(), y.level(), 4.0, 1.5)
            }
        }),
        4.0,
    );

    let genders = both(a.gender.as_deref(), b.gender.as_deref());
    tally.add(
        both(a.preferred_gender_mix, b.preferred_gender_mix)
            .zip(genders)
            .map(|((mix_a, mix_b), (gender_a, gender_b))| {
                use crate::models::GenderMix::SameGender;
                let same = gender_a == gender_b;
                if (mix_a == SameGender || mix_b == SameGender) && !same {
                    0.0
                } else {
                    3.0
                }
            }),
        3.0,
    );

    if !a.preferred_neighborhoods.is_empty() && !b.preferred_neighborhoods.is_empty() {
        let shared = !lowercased(&a.preferred_neighborhoods).is_disjoint(&lowercased(&b.preferred_neighborhoods));
        tally.add(Some(if shared { 3.0 } else { 0.0 }), 3.0);
    }

    tally.finish()
}

fn social(a: &Profile, b: &Profile) -> Option<f64> {
    let mut tally = Tally::default();
    tally.add(
        both(a.social_energy, b.social_energy).map(|(x, y)| closeness(x, y, 8.0, 0.8)),
        8.0,
    );
    tally.add(
        both(a.openness_to_sharing, b.openness_to_sharing).map(|(x, y)| closeness(x.level(), y.level(), 7.0, 2.0)),
        7.0,
    );
    tally.add(
        both(a.cultural_openness, b.cultural_openness).map(|(x, y)| closeness(x.level(), y.level(), 5.0, 1.5)),
        5.0,
    );
    tally.add(
        both(a.event_participation, b.event_participation).map(|(x, y)| closeness(x.level(), y.level(), 5.0, 1.5)),
        5.0,
    );
    tally.add(
        both(a.guest_frequency, b.guest_frequency).map(|(x, y)| closeness(x.level(), y.level(), 5.0, 1.25)),
        5.0,
    );
    tally.finish()
}

fn lowercased(set: &BTreeSet<String>) -> BTreeSet<String> {
    set.iter().map(|s| s.trim().to_lowercase()).collect()
}

/// Shared / combined size of two sets; `None` unless both are non-empty.
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let (a, b) = (lowercased(a), lowercased(b));
    let shared = a.intersection(&b).count() as f64;
    let combined = a.union(&b).count() as f64;
    Some(shared / combined)
}

fn values(a: &Profile, b: &Profile) -> Option<f64> {
    let interests = |p: &Profile| -> BTreeSet<String> {
        p.interests
            .iter()
            .chain(&p.hobbies)
            .chain(&p.important_qualities)
            .cloned()
            .collect()
    };

    let mut tally = Tally::default();
    tally.add(jaccard(&a.core_values, &b.core_values).map(|j| j * 0.5), 0.5);
    tally.add(jaccard(&interests(a), &interests(b)).map(|j| j * 0.3), 0.3);
    if !a.languages.is_empty() && !b.languages.is_empty() {
        let shared = !lowercased(&a.languages).is_disjoint(&lowercased(&b.languages));
        tally.add(Some(if shared { 0.2 } else { 0.0 }), 0.2);
    }
    tally.finish()
}

/// Any violated constraint of the first profile drives this dimension to
/// its minimum regardless of everything else.
fn deal_breakers(own: &ConstraintCheck, reverse: &ConstraintCheck) -> Option<f64> {
    if !own.conflicts.is_empty() {
        Some(0.0)
    } else if own.evaluable || reverse.evaluable {
        Some(1.0)
    } else {
        None
    }
}
