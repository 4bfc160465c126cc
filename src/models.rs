use crate::schema::Field;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder for text fields a table does not provide.
pub const UNKNOWN: &str = "Unknown";

pub const MAX_RANK: u32 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_directory: String,
    // File stem of the city coordinate table inside data_directory
    pub geo_table: String,
    pub max_recommendations: usize,
    pub log_level: String,
    pub output_directory: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_directory: "data".to_string(),
            geo_table: "Geo_data_INDIA_all_cities".to_string(),
            max_recommendations: 50,
            log_level: "info".to_string(),
            output_directory: Some("output".to_string()),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "GENERAL")]
    General,
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "OBC")]
    Obc,
    #[serde(rename = "OBC-NCL")]
    ObcNcl,
    #[serde(rename = "SC")]
    Sc,
    #[serde(rename = "ST")]
    St,
    #[serde(rename = "EWS")]
    Ews,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::General,
        Category::Open,
        Category::Obc,
        Category::ObcNcl,
        Category::Sc,
        Category::St,
        Category::Ews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "GENERAL",
            Category::Open => "OPEN",
            Category::Obc => "OBC",
            Category::ObcNcl => "OBC-NCL",
            Category::Sc => "SC",
            Category::St => "ST",
            Category::Ews => "EWS",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == wanted)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "Gender-Neutral")]
    Neutral,
    #[serde(rename = "Female-only (including Supernumerary)", alias = "Female-only")]
    FemaleOnly,
    #[serde(rename = "Male-only")]
    MaleOnly,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Neutral => "Gender-Neutral",
            Gender::FemaleOnly => "Female-only (including Supernumerary)",
            Gender::MaleOnly => "Male-only",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        if lowered.starts_with("female") {
            Ok(Gender::FemaleOnly)
        } else if lowered.starts_with("male") {
            Ok(Gender::MaleOnly)
        } else if lowered.starts_with("gender-neutral") || lowered == "neutral" {
            Ok(Gender::Neutral)
        } else {
            Err(format!("unknown gender: {}", s))
        }
    }
}

const IIIT_NAME: &str = "INDIAN INSTITUTE OF INFORMATION TECHNOLOGY";
const IIT_NAME: &str = "INDIAN INSTITUTE OF TECHNOLOGY";
const NIT_NAME: &str = "NATIONAL INSTITUTE OF TECHNOLOGY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstituteType {
    Iit,
    Nit,
    Iiit,
    Gfti,
    #[serde(rename = "Other")]
    Other,
}

impl InstituteType {
    /// Classifies an institute by its full name.
    ///
    /// IIIT is tested before IIT. GFTI is whatever named institute matches none
    /// of the three patterns; a missing name is `Other`.
    pub fn classify(name: Option<&str>) -> InstituteType {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_uppercase(),
            None => return InstituteType::Other,
        };

        if name.contains(IIIT_NAME) {
            InstituteType::Iiit
        } else if name.contains(IIT_NAME) {
            InstituteType::Iit
        } else if name.contains(NIT_NAME) {
            InstituteType::Nit
        } else {
            InstituteType::Gfti
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstituteType::Iit => "IIT",
            InstituteType::Nit => "NIT",
            InstituteType::Iiit => "IIIT",
            InstituteType::Gfti => "GFTI",
            InstituteType::Other => "Other",
        }
    }
}

impl fmt::Display for InstituteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstituteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IIT" => Ok(InstituteType::Iit),
            "NIT" => Ok(InstituteType::Nit),
            "IIIT" => Ok(InstituteType::Iiit),
            "GFTI" => Ok(InstituteType::Gfti),
            "OTHER" => Ok(InstituteType::Other),
            _ => Err(format!("unknown institute type: {}", s)),
        }
    }
}

fn default_institutes() -> Vec<InstituteType> {
    vec![
        InstituteType::Iit,
        InstituteType::Nit,
        InstituteType::Iiit,
        InstituteType::Gfti,
    ]
}

fn default_branches() -> Vec<String> {
    ["CSE", "ECE", "ME", "CE"].iter().map(|b| b.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentQuery {
    pub rank: u32,
    pub category: Category,
    pub gender: Gender,
    #[serde(default)]
    pub home_city: Option<String>,
    #[serde(default)]
    pub home_state: Option<String>,
    #[serde(default = "default_institutes")]
    pub preferred_institutes: Vec<InstituteType>,
    #[serde(default = "default_branches")]
    pub preferred_branches: Vec<String>,
    #[serde(default)]
    pub max_distance_km: Option<u32>,
    #[serde(default)]
    pub max_closing_rank: Option<u32>,
}

impl StudentQuery {
    pub fn new(rank: u32, category: Category, gender: Gender) -> Self {
        Self {
            rank,
            category,
            gender,
            home_city: None,
            home_state: None,
            preferred_institutes: default_institutes(),
            preferred_branches: default_branches(),
            max_distance_km: None,
            max_closing_rank: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.rank == 0 {
            return Err("rank must be a positive integer".to_string());
        }
        if self.rank > MAX_RANK {
            return Err(format!("rank {} is above the supported limit of {}", self.rank, MAX_RANK));
        }
        if self.max_closing_rank == Some(0) {
            return Err("max_closing_rank must be at least 1".to_string());
        }
        Ok(())
    }

    /// Home city if given, otherwise home state.
    pub fn home_location(&self) -> Option<&str> {
        self.home_city
            .as_deref()
            .or(self.home_state.as_deref())
            .map(str::trim)
            .filter(|location| !location.is_empty())
    }
}

/// Predicates applied to every admission table. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub rank: Option<u32>,
    pub max_closing_rank: Option<u32>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub preferred_institutes: Vec<InstituteType>,
    pub preferred_branches: Vec<String>,
    pub home_city: Option<String>,
}

impl From<&StudentQuery> for FilterSpec {
    // home_city stays unset: proximity is handled by the distance resolver
    fn from(query: &StudentQuery) -> Self {
        Self {
            rank: Some(query.rank),
            max_closing_rank: query.max_closing_rank,
            category: Some(query.category.as_str().to_string()),
            gender: Some(query.gender.as_str().to_string()),
            preferred_institutes: query.preferred_institutes.clone(),
            preferred_branches: query.preferred_branches.clone(),
            home_city: None,
        }
    }
}

/// One normalized row of an admission cutoff table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub institute: Option<String>,
    pub branch: Option<String>,
    pub quota: Option<String>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub opening_rank: Option<u32>,
    pub closing_rank: Option<u32>,
    pub city: Option<String>,
    pub state: Option<String>,
    // Cache key of the table the row came from
    pub source: String,
}

impl AdmissionRecord {
    pub fn text(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Institute => &self.institute,
            Field::Branch => &self.branch,
            Field::Category => &self.category,
            Field::Gender => &self.gender,
            Field::City => &self.city,
            Field::State => &self.state,
            Field::Quota => &self.quota,
            Field::OpeningRank | Field::ClosingRank => return None,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Whether the record carries any value for the field.
    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::OpeningRank => self.opening_rank.is_some(),
            Field::ClosingRank => self.closing_rank.is_some(),
            _ => self.text(field).is_some(),
        }
    }

    pub fn text_or_unknown(&self, field: Field) -> &str {
        self.text(field).unwrap_or(UNKNOWN)
    }

    pub fn closing_rank_or_zero(&self) -> u32 {
        self.closing_rank.unwrap_or(0)
    }

    pub fn institute_type(&self) -> InstituteType {
        InstituteType::classify(self.institute.as_deref())
    }
}

/// The normalized records of one source table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionTable {
    pub source: String,
    pub records: Vec<AdmissionRecord>,
}

/// A record that survived filtering, with its distance from home when known.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub record: AdmissionRecord,
    pub distance_km: Option<f64>,
}

impl From<AdmissionRecord> for Candidate {
    fn from(record: AdmissionRecord) -> Self {
        Self {
            record,
            distance_km: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaBand {
    pub quota: String,
    pub opening_rank: Option<u32>,
    pub closing_rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationGroup {
    pub institute_name: String,
    pub college_name: String,
    pub branch: String,
    pub category: String,
    pub gender: String,
    pub state: String,
    pub city: String,
    pub distance_km: Option<f64>,
    pub institute_type: InstituteType,
    pub recommendation_score: u32,
    pub quota_options: Vec<QuotaBand>, // sorted by closing rank
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_institutes() {
        assert_eq!(
            InstituteType::classify(Some("Indian Institute of Technology Madras")),
            InstituteType::Iit
        );
        assert_eq!(
            InstituteType::classify(Some("Indian Institute of Information Technology, Allahabad")),
            InstituteType::Iiit
        );
        assert_eq!(
            InstituteType::classify(Some("National Institute of Technology, Tiruchirappalli")),
            InstituteType::Nit
        );
        assert_eq!(
            InstituteType::classify(Some("Birla Institute of Technology, Mesra")),
            InstituteType::Gfti
        );
        assert_eq!(InstituteType::classify(Some("   ")), InstituteType::Other);
        assert_eq!(InstituteType::classify(None), InstituteType::Other);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(
            InstituteType::classify(Some("indian institute of technology bombay")),
            InstituteType::Iit
        );
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("obc-ncl".parse::<Category>(), Ok(Category::ObcNcl));
        assert_eq!("General".parse::<Category>(), Ok(Category::General));
        assert!("XYZ".parse::<Category>().is_err());

        assert_eq!("Female-only".parse::<Gender>(), Ok(Gender::FemaleOnly));
        assert_eq!("Male-only".parse::<Gender>(), Ok(Gender::MaleOnly));
        assert_eq!("Gender-Neutral".parse::<Gender>(), Ok(Gender::Neutral));

        assert_eq!("iiit".parse::<InstituteType>(), Ok(InstituteType::Iiit));
        assert!("college".parse::<InstituteType>().is_err());
    }

    #[test]
    fn test_query_validation() {
        let mut query = StudentQuery::new(23000, Category::Obc, Gender::FemaleOnly);
        assert!(query.validate().is_ok());

        query.rank = 0;
        assert!(query.validate().is_err());

        query.rank = MAX_RANK + 1;
        assert!(query.validate().is_err());

        query.rank = 10;
        query.max_closing_rank = Some(0);
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_query_defaults_from_json() {
        let query: StudentQuery =
            serde_json::from_str(r#"{"rank": 5000, "category": "OBC", "gender": "Female-only"}"#).unwrap();
        assert_eq!(query.gender, Gender::FemaleOnly);
        assert_eq!(query.preferred_institutes.len(), 4);
        assert_eq!(query.preferred_branches, vec!["CSE", "ECE", "ME", "CE"]);
        assert_eq!(query.max_distance_km, None);
    }

    #[test]
    fn test_home_location_prefers_city() {
        let mut query = StudentQuery::new(100, Category::Open, Gender::Neutral);
        assert_eq!(query.home_location(), None);

        query.home_state = Some("Tamil Nadu".to_string());
        assert_eq!(query.home_location(), Some("Tamil Nadu"));

        query.home_city = Some("Chennai".to_string());
        assert_eq!(query.home_location(), Some("Chennai"));
    }

    #[test]
    fn test_filter_spec_from_query() {
        let query = StudentQuery::new(23000, Category::General, Gender::FemaleOnly);
        let spec = FilterSpec::from(&query);
        assert_eq!(spec.rank, Some(23000));
        assert_eq!(spec.category.as_deref(), Some("GENERAL"));
        assert_eq!(spec.gender.as_deref(), Some("Female-only (including Supernumerary)"));
        assert_eq!(spec.home_city, None);
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        let config = Config {
            max_recommendations: 10,
            ..Config::default()
        };
        config.save_to_file(path).unwrap();

        let loaded = Config::load_from_file(path).unwrap();
        assert_eq!(loaded.max_recommendations, 10);
        assert_eq!(loaded.geo_table, "Geo_data_INDIA_all_cities");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("data_directory = \"cutoffs\"").unwrap();
        assert_eq!(config.data_directory, "cutoffs");
        assert_eq!(config.max_recommendations, 50);
    }
}
