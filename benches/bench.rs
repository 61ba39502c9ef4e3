// Criterion benchmarks for Coloc Match

use chrono::NaiveDate;
use coloc_match::core::{normalize, CompatibilityScorer, Matcher};
use coloc_match::models::{BudgetRange, Frequency, Profile, RawProfileRecord, TimePreference};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::collections::HashSet;

fn create_candidate(id: usize) -> Profile {
    let mut p = Profile::new(format!("user_{}", id));
    p.date_of_birth = NaiveDate::from_ymd_opt(1990 + (id % 12) as i32, 1 + (id % 12) as u32, 1);
    p.cleanliness = Some(1 + (id % 10) as u8);
    p.social_energy = Some(1 + ((id * 7) % 10) as u8);
    p.smoking = Some(id % 5 == 0);
    p.pets = Some(id % 7 == 0);
    p.wake_up_time = Some(if id % 2 == 0 { TimePreference::Early } else { TimePreference::Late });
    p.guest_frequency = Some(if id % 3 == 0 { Frequency::Often } else { Frequency::Rarely });
    p.budget = Some(BudgetRange {
        min: 400.0 + (id % 20) as f64 * 25.0,
        max: 800.0 + (id % 20) as f64 * 30.0,
    });
    p.core_values = ["respect", "honesty", "ambition", "calm"]
        .iter()
        .skip(id % 3)
        .map(|v| v.to_string())
        .collect();
    if id % 11 == 0 {
        p.deal_breakers = ["smoking indoors".to_string()].into_iter().collect();
    }
    p
}

fn create_viewer() -> Profile {
    let mut viewer = create_candidate(3);
    viewer.user_id = "viewer".to_string();
    viewer
}

fn scorer() -> CompatibilityScorer {
    CompatibilityScorer::bundled()
        .unwrap()
        .with_reference_date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
}

fn bench_pair_score(c: &mut Criterion) {
    let scorer = scorer();
    let viewer = create_viewer();
    let candidate = create_candidate(42);

    c.bench_function("pair_score", |b| {
        b.iter(|| scorer.score(black_box(&viewer), black_box(&candidate)));
    });
}

fn bench_normalize(c: &mut Criterion) {
    let record = RawProfileRecord::from_value(json!({
        "user_id": "u1",
        "first_name": "Camille",
        "date_of_birth": "1998-04-12",
        "languages_spoken": ["French", "English"],
        "cleanliness": "tidy",
        "introvert_extrovert_scale": 3,
        "wake_up_time": "early morning",
        "guest_frequency": "sometimes",
        "core_values": "respect, honesty",
        "deal_breakers": ["smoking indoors"],
        "min_budget": "600",
        "max_budget": 900
    }))
    .unwrap();

    c.bench_function("normalize_record", |b| {
        b.iter(|| normalize(black_box(&record)));
    });
}

fn bench_ranking(c: &mut Criterion) {
    let matcher = Matcher::new(scorer());
    let viewer = create_viewer();

    let mut group = c.benchmark_group("ranking");

    for candidate_count in [10, 50, 100, 500, 1000].iter() {
        let candidates: Vec<Profile> = (0..*candidate_count).map(create_candidate).collect();
        let decided: HashSet<String> = (0..*candidate_count)
            .step_by(10)
            .map(|i| format!("user_{}", i))
            .collect();

        group.bench_with_input(
            BenchmarkId::new("rank_candidates", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| matcher.rank_candidates(black_box(&viewer), black_box(&candidates), black_box(&decided)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_pair_score, bench_normalize, bench_ranking);

criterion_main!(benches);
