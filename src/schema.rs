//! Reconciles the column names used by different admission tables.
//!
//! Every source table names its columns a little differently ("Institute",
//! "College Name", "Academic Program Name", ...). [`ColumnMap`] resolves each
//! canonical [`Field`] to the columns that carry it, once per table, so rows can
//! be turned into [`AdmissionRecord`]s without repeated alias lookups.

use crate::models::AdmissionRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Institute,
    Branch,
    Category,
    Gender,
    City,
    State,
    Quota,
    OpeningRank,
    ClosingRank,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Institute,
        Field::Branch,
        Field::Category,
        Field::Gender,
        Field::City,
        Field::State,
        Field::Quota,
        Field::OpeningRank,
        Field::ClosingRank,
    ];

    /// Accepted source column names, most preferred first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Institute => &["institute", "institute_name", "college_name", "college"],
            Field::Branch => &["branch", "course", "program", "academic_program_name"],
            Field::Category => &["category", "caste_category", "seat_type"],
            Field::Gender => &["gender", "gender_type"],
            Field::City => &["city", "location", "place"],
            Field::State => &["state", "college_state", "institute_state"],
            Field::Quota => &["state_quota", "quota", "quota_type"],
            Field::OpeningRank => &["opening_rank"],
            Field::ClosingRank => &["closing_rank"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Institute => "institute",
            Field::Branch => "branch",
            Field::Category => "category",
            Field::Gender => "gender",
            Field::City => "city",
            Field::State => "state",
            Field::Quota => "quota",
            Field::OpeningRank => "opening_rank",
            Field::ClosingRank => "closing_rank",
        }
    }
}

/// Lowercases a header and joins its words with underscores ("Closing Rank" -> "closing_rank").
pub fn normalize_header(header: &str) -> String {
    let header = header.trim_start_matches('\u{feff}').trim();
    WHITESPACE.replace_all(header, "_").to_lowercase()
}

/// Lowercase ASCII alphanumerics only. Used for loose header matching and city keys.
pub fn compact_key(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Coerces a rank cell to an integer, keeping only digits and the decimal point.
///
/// Cutoff sheets often decorate ranks ("1234P", "5,210"); those still parse.
pub fn parse_rank(raw: &str) -> Option<u32> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map(|value| value.min(u32::MAX as f64) as u32)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<Field, Vec<usize>>,
}

impl ColumnMap {
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
        let compact: Vec<String> = headers.iter().map(|h| compact_key(h.as_ref())).collect();

        let mut columns = HashMap::new();
        for field in Field::ALL {
            let mut found: Vec<usize> = Vec::new();

            for alias in field.aliases() {
                for (idx, header) in normalized.iter().enumerate() {
                    if header == alias && !found.contains(&idx) {
                        found.push(idx);
                    }
                }
            }

            // Second pass tolerates punctuation drift ("Closing-Rank", "Institute.Name")
            for alias in field.aliases() {
                let alias = compact_key(alias);
                for (idx, header) in compact.iter().enumerate() {
                    if *header == alias && !found.contains(&idx) {
                        found.push(idx);
                    }
                }
            }

            if !found.is_empty() {
                columns.insert(field, found);
            }
        }

        Self { columns }
    }

    /// First non-empty value among the field's columns.
    pub fn value<'a, S: AsRef<str>>(&self, row: &'a [S], field: Field) -> Option<&'a str> {
        self.columns.get(&field)?.iter().find_map(|&idx| {
            row.get(idx)
                .map(|cell| cell.as_ref().trim())
                .filter(|cell| !cell.is_empty())
        })
    }

    pub fn rank<S: AsRef<str>>(&self, row: &[S], field: Field) -> Option<u32> {
        self.value(row, field).and_then(parse_rank)
    }

    pub fn record<S: AsRef<str>>(&self, row: &[S], source: &str) -> AdmissionRecord {
        let text = |field| self.value(row, field).map(str::to_string);
        AdmissionRecord {
            institute: text(Field::Institute),
            branch: text(Field::Branch),
            quota: text(Field::Quota),
            category: text(Field::Category),
            gender: text(Field::Gender),
            opening_rank: self.rank(row, Field::OpeningRank),
            closing_rank: self.rank(row, Field::ClosingRank),
            city: text(Field::City),
            state: text(Field::State),
            source: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Closing Rank"), "closing_rank");
        assert_eq!(normalize_header("  Institute   Name "), "institute_name");
        assert_eq!(normalize_header("\u{feff}City"), "city");
    }

    #[test]
    fn test_compact_key_strips_punctuation() {
        assert_eq!(compact_key("Closing-Rank"), "closingrank");
        assert_eq!(compact_key(" Chennai "), "chennai");
        assert_eq!(compact_key("Port Blair (A&N)"), "portblairan");
    }

    #[test]
    fn test_parse_rank() {
        assert_eq!(parse_rank("25000"), Some(25000));
        assert_eq!(parse_rank("1234P"), Some(1234));
        assert_eq!(parse_rank("5,210"), Some(5210));
        assert_eq!(parse_rank("812.0"), Some(812));
        assert_eq!(parse_rank("n/a"), None);
        assert_eq!(parse_rank(""), None);
    }

    #[test]
    fn test_first_alias_wins() {
        let headers = ["College Name", "Institute", "Course"];
        let map = ColumnMap::from_headers(&headers);
        let row = ["Govt. College", "National Institute of Technology Calicut", "Civil Engineering"];
        assert_eq!(
            map.value(&row, Field::Institute),
            Some("National Institute of Technology Calicut")
        );
        assert_eq!(map.value(&row, Field::Branch), Some("Civil Engineering"));
        assert_eq!(map.value(&row, Field::City), None);
    }

    #[test]
    fn test_value_falls_back_to_next_alias_when_empty() {
        let headers = ["Institute", "College Name"];
        let map = ColumnMap::from_headers(&headers);
        let row = ["", "NIT Trichy"];
        assert_eq!(map.value(&row, Field::Institute), Some("NIT Trichy"));
        let blank = ["", " "];
        assert_eq!(map.value(&blank, Field::Institute), None);
    }

    #[test]
    fn test_punctuation_drift_in_headers() {
        let headers = ["Closing-Rank", "Opening.Rank", "Seat Type"];
        let map = ColumnMap::from_headers(&headers);
        let row = ["4100", "2950", "EWS"];
        assert_eq!(map.rank(&row, Field::ClosingRank), Some(4100));
        assert_eq!(map.rank(&row, Field::OpeningRank), Some(2950));
        assert_eq!(map.value(&row, Field::Category), Some("EWS"));
    }

    #[test]
    fn test_record_keeps_missing_fields_as_none() {
        let headers = ["Institute", "Academic Program Name", "Closing Rank", "Quota"];
        let map = ColumnMap::from_headers(&headers);
        let row = ["National Institute of Technology Warangal", "Civil Engineering", "abc", "OS"];
        let record = map.record(&row, "josaa_2023");

        assert_eq!(record.institute.as_deref(), Some("National Institute of Technology Warangal"));
        assert_eq!(record.branch.as_deref(), Some("Civil Engineering"));
        assert_eq!(record.quota.as_deref(), Some("OS"));
        assert_eq!(record.closing_rank, None);
        assert_eq!(record.city, None);
        assert_eq!(record.source, "josaa_2023");
    }
}
