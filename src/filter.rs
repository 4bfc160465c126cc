//! Narrows an admission table down to the rows matching a [`FilterSpec`].
//!
//! Predicates are applied one after another. A predicate whose field is empty
//! for every remaining record is skipped, so a table that simply lacks a column
//! (say, no gender split) is not wiped out by it.

use crate::models::{AdmissionRecord, AdmissionTable, FilterSpec, InstituteType};
use crate::schema::Field;
use log::debug;

pub fn apply(table: &AdmissionTable, spec: &FilterSpec) -> AdmissionTable {
    let mut records: Vec<&AdmissionRecord> = table.records.iter().collect();

    if let Some(rank) = spec.rank.filter(|rank| *rank > 0) {
        retain_if_present(&mut records, Field::ClosingRank, |r| {
            r.closing_rank.map_or(false, |closing| closing >= rank)
        });
    }

    if let Some(bound) = spec.max_closing_rank.filter(|bound| *bound > 0) {
        retain_if_present(&mut records, Field::ClosingRank, |r| {
            r.closing_rank.map_or(false, |closing| closing <= bound)
        });
    }

    if let Some(category) = non_empty_upper(spec.category.as_deref()) {
        let category = if category == "GENERAL" {
            "OPEN".to_string()
        } else {
            category
        };
        retain_if_present(&mut records, Field::Category, |r| {
            contains_upper(r.category.as_deref(), &category)
        });
    }

    if let Some(gender) = non_empty_upper(spec.gender.as_deref()) {
        retain_if_present(&mut records, Field::Gender, |r| {
            contains_upper(r.gender.as_deref(), &gender)
        });
    }

    if !spec.preferred_institutes.is_empty() {
        retain_if_present(&mut records, Field::Institute, |r| {
            matches_institute(r.institute.as_deref(), &spec.preferred_institutes)
        });
    }

    if !spec.preferred_branches.is_empty() {
        retain_if_present(&mut records, Field::Branch, |r| {
            matches_branch(r.branch.as_deref(), &spec.preferred_branches)
        });
    }

    if let Some(city) = non_empty_upper(spec.home_city.as_deref()) {
        retain_if_present(&mut records, Field::City, |r| {
            contains_upper(r.city.as_deref(), &city)
        });
    }

    debug!(
        "Filtered {}: {} of {} records kept",
        table.source,
        records.len(),
        table.records.len()
    );

    AdmissionTable {
        source: table.source.clone(),
        records: records.into_iter().cloned().collect(),
    }
}

/// Whether the institute's class is one of the preferred types.
pub fn matches_institute(institute: Option<&str>, preferred: &[InstituteType]) -> bool {
    preferred.contains(&InstituteType::classify(institute))
}

/// Whether any preferred branch token appears in the branch name.
pub fn matches_branch(branch: Option<&str>, preferred: &[String]) -> bool {
    let branch = match branch {
        Some(branch) => branch.to_uppercase(),
        None => return false,
    };
    preferred
        .iter()
        .map(|token| token.trim().to_uppercase())
        .any(|token| !token.is_empty() && branch.contains(&token))
}

fn retain_if_present<F>(records: &mut Vec<&AdmissionRecord>, field: Field, keep: F)
where
    F: Fn(&AdmissionRecord) -> bool,
{
    if records.iter().any(|r| r.has(field)) {
        records.retain(|r| keep(*r));
    }
}

fn contains_upper(value: Option<&str>, needle: &str) -> bool {
    value.map_or(false, |v| v.to_uppercase().contains(needle))
}

fn non_empty_upper(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(institute: &str, branch: &str, category: &str, gender: &str, closing: Option<u32>) -> AdmissionRecord {
        let text = |v: &str| if v.is_empty() { None } else { Some(v.to_string()) };
        AdmissionRecord {
            institute: text(institute),
            branch: text(branch),
            quota: Some("OS".to_string()),
            category: text(category),
            gender: text(gender),
            opening_rank: None,
            closing_rank: closing,
            city: Some("Warangal".to_string()),
            state: Some("Telangana".to_string()),
            source: "test".to_string(),
        }
    }

    fn table(records: Vec<AdmissionRecord>) -> AdmissionTable {
        AdmissionTable {
            source: "test".to_string(),
            records,
        }
    }

    const NIT: &str = "National Institute of Technology Warangal";
    const IIT: &str = "Indian Institute of Technology Delhi";
    const IIIT: &str = "Indian Institute of Information Technology Lucknow";
    const GFTI: &str = "Punjab Engineering College, Chandigarh";

    #[test]
    fn test_empty_spec_keeps_everything() {
        let input = table(vec![
            record(NIT, "Civil Engineering", "OPEN", "Gender-Neutral", Some(100)),
            record(IIT, "Mechanical Engineering", "SC", "Gender-Neutral", None),
        ]);
        let out = apply(&input, &FilterSpec::default());
        assert_eq!(out, input);
    }

    #[test]
    fn test_rank_filters_compose() {
        let input = table(vec![
            record(NIT, "CSE", "OPEN", "", Some(9_000)),
            record(NIT, "CSE", "OPEN", "", Some(24_000)),
            record(NIT, "CSE", "OPEN", "", Some(60_000)),
            record(NIT, "CSE", "OPEN", "", None),
        ]);
        let spec = FilterSpec {
            rank: Some(10_000),
            max_closing_rank: Some(50_000),
            ..FilterSpec::default()
        };
        let out = apply(&input, &spec);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].closing_rank, Some(24_000));
    }

    #[test]
    fn test_rank_filter_is_noop_without_usable_ranks() {
        let input = table(vec![
            record(NIT, "CSE", "OPEN", "", None),
            record(IIT, "CSE", "OPEN", "", None),
        ]);
        let spec = FilterSpec {
            rank: Some(10_000),
            ..FilterSpec::default()
        };
        assert_eq!(apply(&input, &spec).records.len(), 2);
    }

    #[test]
    fn test_general_category_matches_open_rows() {
        let input = table(vec![
            record(NIT, "CSE", "OPEN", "", None),
            record(NIT, "CSE", "OBC-NCL", "", None),
        ]);
        let spec = FilterSpec {
            category: Some("general".to_string()),
            ..FilterSpec::default()
        };
        let out = apply(&input, &spec);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].category.as_deref(), Some("OPEN"));
    }

    #[test]
    fn test_category_is_substring_match() {
        let input = table(vec![
            record(NIT, "CSE", "OBC-NCL", "", None),
            record(NIT, "CSE", "OBC-NCL (PwD)", "", None),
            record(NIT, "CSE", "SC", "", None),
        ]);
        let spec = FilterSpec {
            category: Some("OBC".to_string()),
            ..FilterSpec::default()
        };
        assert_eq!(apply(&input, &spec).records.len(), 2);
    }

    #[test]
    fn test_missing_gender_column_does_not_eliminate_rows() {
        let input = table(vec![
            record(NIT, "CSE", "OPEN", "", None),
            record(IIT, "CSE", "OPEN", "", None),
        ]);
        let spec = FilterSpec {
            gender: Some("Female-only (including Supernumerary)".to_string()),
            ..FilterSpec::default()
        };
        assert_eq!(apply(&input, &spec).records.len(), 2);
    }

    #[test]
    fn test_gender_filter() {
        let input = table(vec![
            record(NIT, "CSE", "OPEN", "Gender-Neutral", None),
            record(NIT, "CSE", "OPEN", "Female-only (including Supernumerary)", None),
        ]);
        let spec = FilterSpec {
            gender: Some("female-only".to_string()),
            ..FilterSpec::default()
        };
        let out = apply(&input, &spec);
        assert_eq!(out.records.len(), 1);
        assert!(out.records[0].gender.as_deref().unwrap().starts_with("Female"));
    }

    #[test]
    fn test_gfti_is_the_complement_class() {
        let input = table(vec![
            record(NIT, "CSE", "OPEN", "", None),
            record(IIT, "CSE", "OPEN", "", None),
            record(IIIT, "CSE", "OPEN", "", None),
            record(GFTI, "CSE", "OPEN", "", None),
        ]);
        let spec = FilterSpec {
            preferred_institutes: vec![InstituteType::Gfti],
            ..FilterSpec::default()
        };
        let out = apply(&input, &spec);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].institute.as_deref(), Some(GFTI));
    }

    #[test]
    fn test_iit_preference_does_not_pick_up_iiits() {
        let input = table(vec![
            record(IIT, "CSE", "OPEN", "", None),
            record(IIIT, "CSE", "OPEN", "", None),
        ]);
        let spec = FilterSpec {
            preferred_institutes: vec![InstituteType::Iit],
            ..FilterSpec::default()
        };
        let out = apply(&input, &spec);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].institute.as_deref(), Some(IIT));
    }

    #[test]
    fn test_branch_tokens_match_inside_names() {
        let input = table(vec![
            record(NIT, "Electronics and Communication Engineering (ECE)", "OPEN", "", None),
            record(NIT, "Metallurgical and Materials Engineering", "OPEN", "", None),
        ]);
        let spec = FilterSpec {
            preferred_branches: vec!["ece".to_string()],
            ..FilterSpec::default()
        };
        let out = apply(&input, &spec);
        assert_eq!(out.records.len(), 1);
    }

    #[test]
    fn test_home_city_filter() {
        let mut chennai = record(NIT, "CSE", "OPEN", "", None);
        chennai.city = Some("Chennai".to_string());
        let input = table(vec![chennai, record(NIT, "CSE", "OPEN", "", None)]);
        let spec = FilterSpec {
            home_city: Some("chennai".to_string()),
            ..FilterSpec::default()
        };
        let out = apply(&input, &spec);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].city.as_deref(), Some("Chennai"));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = table(vec![
            record(NIT, "CSE", "OPEN", "", Some(100)),
            record(NIT, "CSE", "OPEN", "", Some(900)),
        ]);
        let before = input.clone();
        let spec = FilterSpec {
            rank: Some(500),
            ..FilterSpec::default()
        };
        let out = apply(&input, &spec);
        assert_eq!(out.records.len(), 1);
        assert_eq!(input, before);
    }
}
