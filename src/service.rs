use crate::analyzer::RecommendationAnalyzer;
use crate::distance::DistanceResolver;
use crate::error::{DataError, RecommendError};
use crate::geo::GeoIndex;
use crate::models::{Candidate, Config, FilterSpec, RecommendationGroup, StudentQuery};
use crate::store::{AvailableFilters, DataSummary, DataStore, LoadReport};
use log::{info, warn};
use once_cell::sync::OnceCell;

/// Entry point tying the data store, geo index and scoring together.
pub struct RecommendationService {
    store: DataStore,
    geo: OnceCell<GeoIndex>,
    max_recommendations: usize,
}

impl RecommendationService {
    pub fn new(config: &Config) -> Self {
        Self {
            store: DataStore::new(&config.data_directory, &config.geo_table),
            geo: OnceCell::new(),
            max_recommendations: config.max_recommendations,
        }
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Loads every table and builds the city index from the coordinate table.
    pub async fn load_data(&self) -> Result<LoadReport, DataError> {
        let report = self.store.load().await?;
        self.geo_index().await?;
        Ok(report)
    }

    pub async fn available_filters(&self) -> Result<AvailableFilters, DataError> {
        self.store.available_filters().await
    }

    pub async fn data_summary(&self) -> Result<DataSummary, DataError> {
        self.store.summary().await
    }

    /// The city index, built on first use. `None` when no coordinate table was loaded.
    pub async fn geo_index(&self) -> Result<Option<&GeoIndex>, DataError> {
        if let Some(geo) = self.geo.get() {
            return Ok(Some(geo));
        }

        match self.store.geo_table().await? {
            Some(table) => Ok(Some(self.geo.get_or_init(|| GeoIndex::from_table(&table)))),
            None => {
                warn!(
                    "Geo table {} not loaded, distances are unavailable",
                    self.store.geo_table_key()
                );
                Ok(None)
            }
        }
    }

    pub async fn recommend(&self, query: &StudentQuery) -> Result<Vec<RecommendationGroup>, RecommendError> {
        query.validate().map_err(RecommendError::InvalidQuery)?;

        info!(
            "Recommending for rank {} ({}, {})",
            query.rank, query.category, query.gender
        );

        let spec = FilterSpec::from(query);
        let records = self.store.filtered_records(&spec).await?;
        let mut candidates: Vec<Candidate> = records.into_iter().map(Candidate::from).collect();

        if let Some(max_km) = query.max_distance_km {
            match self.geo_index().await? {
                Some(geo) => {
                    candidates = DistanceResolver::new(geo).filter_by_distance(
                        candidates,
                        query.home_location(),
                        f64::from(max_km),
                    );
                }
                None => warn!("Skipping distance filter of {} km", max_km),
            }
        }

        if candidates.is_empty() {
            info!("No admission records match the query");
            return Ok(Vec::new());
        }

        let groups = RecommendationAnalyzer::new(query)
            .with_max_recommendations(self.max_recommendations)
            .group_and_rank(&candidates);

        info!(
            "{} recommendations from {} matching records",
            groups.len(),
            candidates.len()
        );
        Ok(groups)
    }
}
