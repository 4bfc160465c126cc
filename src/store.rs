use crate::error::DataError;
use crate::filter;
use crate::models::{AdmissionRecord, AdmissionTable, FilterSpec};
use crate::table::{is_table_file, RawTable};
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Distinct values per canonical field, each sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvailableFilters {
    pub states: Vec<String>,
    pub branches: Vec<String>,
    pub categories: Vec<String>,
    pub genders: Vec<String>,
    pub institutes: Vec<String>,
    pub quotas: Vec<String>,
    pub cities: Vec<String>,
}

#[derive(Default)]
struct FilterAccumulator {
    states: BTreeSet<String>,
    branches: BTreeSet<String>,
    categories: BTreeSet<String>,
    genders: BTreeSet<String>,
    institutes: BTreeSet<String>,
    quotas: BTreeSet<String>,
    cities: BTreeSet<String>,
}

impl FilterAccumulator {
    fn add(set: &mut BTreeSet<String>, value: Option<&String>) {
        if let Some(value) = value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
            set.insert(value.to_string());
        }
    }

    fn observe(&mut self, record: &AdmissionRecord) {
        Self::add(&mut self.states, record.state.as_ref());
        Self::add(&mut self.branches, record.branch.as_ref());
        Self::add(&mut self.categories, record.category.as_ref());
        Self::add(&mut self.genders, record.gender.as_ref());
        Self::add(&mut self.institutes, record.institute.as_ref());
        Self::add(&mut self.quotas, record.quota.as_ref());
        Self::add(&mut self.cities, record.city.as_ref());
    }

    fn finish(self) -> AvailableFilters {
        AvailableFilters {
            states: self.states.into_iter().collect(),
            branches: self.branches.into_iter().collect(),
            categories: self.categories.into_iter().collect(),
            genders: self.genders.into_iter().collect(),
            institutes: self.institutes.into_iter().collect(),
            quotas: self.quotas.into_iter().collect(),
            cities: self.cities.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a successful load. Non-empty `skipped` means a partial load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub tables: Vec<String>,
    pub total_records: usize,
    pub skipped: Vec<SkippedFile>,
}

impl LoadReport {
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub records: usize,
    pub columns: Vec<String>,
    pub sample_data: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataSummary {
    pub total_files: usize,
    pub total_records: usize,
    pub files: BTreeMap<String, TableSummary>,
}

struct LoadedTable {
    raw: RawTable,
    admissions: AdmissionTable,
}

#[derive(Default)]
struct StoreState {
    loaded: bool,
    tables: BTreeMap<String, LoadedTable>,
    // Cleared by every load
    filters: Option<AvailableFilters>,
}

/// In-memory cache of every admission table in the data directory.
pub struct DataStore {
    data_directory: PathBuf,
    geo_table: String,
    state: RwLock<StoreState>,
}

impl DataStore {
    pub fn new(data_directory: impl Into<PathBuf>, geo_table: &str) -> Self {
        Self {
            data_directory: data_directory.into(),
            geo_table: geo_table.to_lowercase(),
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Cache key of the city coordinate table.
    pub fn geo_table_key(&self) -> &str {
        &self.geo_table
    }

    /// Replaces the cache with the current contents of the data directory.
    ///
    /// The cache is cleared first; if the directory is missing or holds no CSV
    /// files it stays empty and `DataError::DirectoryNotFound`/`NoTables` is
    /// returned. Files that fail to read or parse are logged and skipped.
    pub async fn load(&self) -> Result<LoadReport, DataError> {
        let mut state = self.state.write().await;
        *state = StoreState::default();

        let dir = &self.data_directory;
        if !tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(DataError::DirectoryNotFound(dir.clone()));
        }

        let mut entries = tokio::fs::read_dir(dir).await.map_err(|source| DataError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| DataError::Io {
            path: dir.clone(),
            source,
        })? {
            let path = entry.path();
            if is_table_file(&path) {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(DataError::NoTables(dir.clone()));
        }
        paths.sort();

        let mut report = LoadReport::default();
        let mut tables = BTreeMap::new();

        for path in paths {
            match read_table(&path).await {
                Ok(raw) => {
                    if raw.is_empty() {
                        warn!("{} has a header but no data rows", path.display());
                    } else {
                        info!("Loaded {} records from {}", raw.len(), path.display());
                    }
                    let admissions = if raw.name == self.geo_table {
                        AdmissionTable {
                            source: raw.name.clone(),
                            records: Vec::new(),
                        }
                    } else {
                        raw.admission_records()
                    };
                    report.total_records += raw.len();
                    tables.insert(raw.name.clone(), LoadedTable { raw, admissions });
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.tables = tables.keys().cloned().collect();
        state.tables = tables;
        state.loaded = true;

        info!(
            "Successfully loaded {} tables ({} skipped)",
            report.tables.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.loaded
    }

    async fn ensure_loaded(&self) -> Result<(), DataError> {
        if !self.is_loaded().await {
            self.load().await?;
        }
        Ok(())
    }

    /// Distinct values per field across the admission tables. Computed once
    /// per load. Cities come from the coordinate table when it is present.
    pub async fn available_filters(&self) -> Result<AvailableFilters, DataError> {
        self.ensure_loaded().await?;

        {
            let state = self.state.read().await;
            if let Some(filters) = state.filters.as_ref() {
                return Ok(filters.clone());
            }
        }

        let mut state = self.state.write().await;
        if let Some(filters) = state.filters.as_ref() {
            return Ok(filters.clone());
        }

        let mut acc = FilterAccumulator::default();
        for (key, table) in &state.tables {
            if *key == self.geo_table {
                continue;
            }
            for record in &table.admissions.records {
                acc.observe(record);
            }
        }

        let mut filters = acc.finish();
        if let Some(geo) = state.tables.get(&self.geo_table) {
            if let Some(col) = geo.raw.column_index(&["city"]) {
                filters.cities = geo
                    .raw
                    .rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(|city| city.trim())
                    .filter(|city| !city.is_empty())
                    .map(str::to_string)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
            }
        }

        state.filters = Some(filters.clone());
        Ok(filters)
    }

    /// Filters every admission table and unions the results, dropping exact
    /// duplicates. Rows from different tables never count as duplicates.
    pub async fn filtered_records(&self, spec: &FilterSpec) -> Result<Vec<AdmissionRecord>, DataError> {
        self.ensure_loaded().await?;
        let state = self.state.read().await;

        let mut seen: HashSet<AdmissionRecord> = HashSet::new();
        let mut combined = Vec::new();
        let mut before_dedup = 0usize;

        for (key, table) in &state.tables {
            if *key == self.geo_table {
                continue;
            }
            let filtered = filter::apply(&table.admissions, spec);
            before_dedup += filtered.records.len();
            for record in filtered.records {
                if seen.insert(record.clone()) {
                    combined.push(record);
                }
            }
        }

        info!(
            "Filtered records: {} before dropping duplicates, {} after",
            before_dedup,
            combined.len()
        );
        Ok(combined)
    }

    /// A copy of the coordinate table, if one was loaded.
    pub async fn geo_table(&self) -> Result<Option<RawTable>, DataError> {
        self.ensure_loaded().await?;
        let state = self.state.read().await;
        Ok(state.tables.get(&self.geo_table).map(|t| t.raw.clone()))
    }

    pub async fn summary(&self) -> Result<DataSummary, DataError> {
        self.ensure_loaded().await?;
        let state = self.state.read().await;

        let mut summary = DataSummary::default();
        for (key, table) in &state.tables {
            summary.files.insert(
                key.clone(),
                TableSummary {
                    records: table.raw.len(),
                    columns: table.raw.headers.clone(),
                    sample_data: table.raw.sample(2),
                },
            );
            summary.total_records += table.raw.len();
        }
        summary.total_files = summary.files.len();
        Ok(summary)
    }
}

async fn read_table(path: &Path) -> Result<RawTable, DataError> {
    let content = tokio::fs::read(path).await.map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    RawTable::from_bytes(path, &content)
}
