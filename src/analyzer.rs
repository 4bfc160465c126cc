use crate::filter::{matches_branch, matches_institute};
use crate::models::{Candidate, QuotaBand, RecommendationGroup, StudentQuery};
use crate::schema::Field;
use log::{debug, info};
use std::collections::HashMap;

pub const RANK_SAFETY_WEIGHT: f64 = 0.40;
pub const INSTITUTE_WEIGHT: f64 = 0.20;
pub const BRANCH_WEIGHT: f64 = 0.15;
pub const DISTANCE_WEIGHT: f64 = 0.15;
pub const HOME_STATE_WEIGHT: f64 = 0.10;

/// Lowest score a scored row can receive.
pub const MIN_SCORE: u32 = 10;

pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 50;

/// Per-factor scores in [0, 1] for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub rank_safety: f64,
    pub institute_match: f64,
    pub branch_match: f64,
    pub distance: f64,
    pub home_state: f64,
}

impl ScoreBreakdown {
    pub fn weighted_sum(&self) -> f64 {
        RANK_SAFETY_WEIGHT * self.rank_safety
            + INSTITUTE_WEIGHT * self.institute_match
            + BRANCH_WEIGHT * self.branch_match
            + DISTANCE_WEIGHT * self.distance
            + HOME_STATE_WEIGHT * self.home_state
    }

    /// Weighted sum scaled to 0-100 with halves rounded to even, never below [`MIN_SCORE`].
    pub fn score(&self) -> u32 {
        let total_weight =
            RANK_SAFETY_WEIGHT + INSTITUTE_WEIGHT + BRANCH_WEIGHT + DISTANCE_WEIGHT + HOME_STATE_WEIGHT;
        let score = (self.weighted_sum() / total_weight * 100.0).round_ties_even();
        if !score.is_finite() || score <= 0.0 {
            MIN_SCORE
        } else {
            (score as u32).clamp(MIN_SCORE, 100)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    institute: String,
    branch: String,
    category: String,
    gender: String,
    state: String,
    city: String,
}

impl GroupKey {
    fn from_candidate(candidate: &Candidate) -> Self {
        let record = &candidate.record;
        let upper = |field| record.text_or_unknown(field).trim().to_uppercase();
        Self {
            institute: upper(Field::Institute),
            branch: upper(Field::Branch),
            category: upper(Field::Category),
            gender: upper(Field::Gender),
            state: upper(Field::State),
            city: record
                .text(Field::City)
                .map(|city| city.trim().to_uppercase())
                .unwrap_or_default(),
        }
    }
}

pub struct RecommendationAnalyzer<'a> {
    pub query: &'a StudentQuery,
    pub max_recommendations: usize,
}

impl<'a> RecommendationAnalyzer<'a> {
    pub fn new(query: &'a StudentQuery) -> Self {
        Self {
            query,
            max_recommendations: DEFAULT_MAX_RECOMMENDATIONS,
        }
    }

    pub fn with_max_recommendations(mut self, max_recommendations: usize) -> Self {
        self.max_recommendations = max_recommendations;
        self
    }

    pub fn score(&self, candidate: &Candidate) -> u32 {
        self.breakdown(candidate).score()
    }

    pub fn breakdown(&self, candidate: &Candidate) -> ScoreBreakdown {
        let record = &candidate.record;
        ScoreBreakdown {
            rank_safety: self.rank_safety(record.closing_rank_or_zero()),
            institute_match: self.institute_match(record.text(Field::Institute)),
            branch_match: self.branch_match(record.text(Field::Branch)),
            distance: distance_score(candidate.distance_km),
            home_state: self.home_state_match(record.text(Field::State), record.text(Field::Quota)),
        }
    }

    fn rank_safety(&self, closing_rank: u32) -> f64 {
        if closing_rank == 0 || self.query.rank == 0 {
            return 0.2;
        }
        let margin = (closing_rank as f64 - self.query.rank as f64) / self.query.rank as f64;
        if margin > 0.5 {
            1.0
        } else if margin > 0.2 {
            0.7
        } else if margin > 0.0 {
            0.5
        } else {
            0.2
        }
    }

    fn institute_match(&self, institute: Option<&str>) -> f64 {
        if matches_institute(institute, &self.query.preferred_institutes) {
            1.0
        } else if institute.is_some() {
            0.2
        } else {
            0.0
        }
    }

    fn branch_match(&self, branch: Option<&str>) -> f64 {
        if matches_branch(branch, &self.query.preferred_branches) {
            1.0
        } else if branch.is_some() {
            0.2
        } else {
            0.0
        }
    }

    fn home_state_match(&self, state: Option<&str>, quota: Option<&str>) -> f64 {
        let home_state = self
            .query
            .home_state
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty());
        let in_home_state = match (&home_state, state) {
            (Some(home), Some(state)) => state.to_uppercase().contains(home.as_str()),
            _ => false,
        };
        let quota_upper = quota.map(str::to_uppercase).unwrap_or_default();
        let home_quota = quota_upper.contains("HS") || quota_upper.contains("HOME STATE");

        if in_home_state || home_quota {
            1.0
        } else if state.is_some() || quota.is_some() {
            0.2
        } else {
            0.0
        }
    }

    /// Collapses candidates into one group per (institute, branch, category,
    /// gender, state, city), scores each group from its first row, and returns
    /// the best groups.
    pub fn group_and_rank(&self, candidates: &[Candidate]) -> Vec<RecommendationGroup> {
        let mut groups: Vec<RecommendationGroup> = Vec::new();
        let mut positions: HashMap<GroupKey, usize> = HashMap::new();

        for candidate in candidates {
            let record = &candidate.record;
            let band = QuotaBand {
                quota: record.text_or_unknown(Field::Quota).to_string(),
                opening_rank: record.opening_rank,
                closing_rank: record.closing_rank_or_zero(),
            };

            let key = GroupKey::from_candidate(candidate);
            if let Some(&pos) = positions.get(&key) {
                groups[pos].quota_options.push(band);
                continue;
            }

            let breakdown = self.breakdown(candidate);
            let score = breakdown.score();
            debug!("Scored {:?} => {}", breakdown, score);

            let institute = record.text_or_unknown(Field::Institute).to_string();
            positions.insert(key, groups.len());
            groups.push(RecommendationGroup {
                college_name: institute.clone(),
                institute_name: institute,
                branch: record.text_or_unknown(Field::Branch).to_string(),
                category: record.text_or_unknown(Field::Category).to_string(),
                gender: record.text_or_unknown(Field::Gender).to_string(),
                state: record.text_or_unknown(Field::State).to_string(),
                city: record.text_or_unknown(Field::City).to_string(),
                distance_km: candidate.distance_km,
                institute_type: record.institute_type(),
                recommendation_score: score,
                quota_options: vec![band],
            });
        }

        for group in &mut groups {
            group.quota_options.sort_by_key(|band| band.closing_rank);
        }

        // Stable sort keeps first-seen order among equal scores
        groups.sort_by(|a, b| b.recommendation_score.cmp(&a.recommendation_score));

        info!(
            "Grouped {} rows into {} recommendations (returning at most {})",
            candidates.len(),
            groups.len(),
            self.max_recommendations
        );
        groups.truncate(self.max_recommendations);
        groups
    }
}

fn distance_score(distance_km: Option<f64>) -> f64 {
    match distance_km {
        Some(d) if d < 100.0 => 1.0,
        Some(d) if d < 300.0 => 0.7,
        Some(d) if d < 500.0 => 0.4,
        _ => 0.2,
    }
}
