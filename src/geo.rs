use crate::schema::compact_key;
use crate::table::RawTable;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use difflib::sequencematcher::SequenceMatcher;

/// Minimum similarity ratio (2 * matches / total length) for a fuzzy city match.
pub const FUZZY_CUTOFF: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// City name -> coordinates, with exact, prefix and fuzzy lookup.
///
/// Keys are normalized with [`compact_key`]. Results are memoized per raw
/// lookup string for the lifetime of the index, misses included.
#[derive(Debug, Default)]
pub struct GeoIndex {
    entries: Vec<(String, Coordinates)>,
    positions: HashMap<String, usize>,
    cities: BTreeSet<String>,
    cache: RwLock<HashMap<String, Option<Coordinates>>>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index from a City/Latitude/Longitude table.
    /// Rows without a city or with unparsable coordinates are skipped.
    pub fn from_table(table: &RawTable) -> Self {
        let mut index = Self::new();

        let (city_col, lat_col, lon_col) = match (
            table.column_index(&["city"]),
            table.column_index(&["latitude", "lat"]),
            table.column_index(&["longitude", "lon", "lng"]),
        ) {
            (Some(city), Some(lat), Some(lon)) => (city, lat, lon),
            _ => {
                warn!(
                    "Geo table {} has no City/Latitude/Longitude columns (found: {:?})",
                    table.name, table.headers
                );
                return index;
            }
        };

        let mut skipped = 0usize;
        for row in &table.rows {
            let city = row.get(city_col).map(|c| c.trim()).unwrap_or_default();
            let lat = row.get(lat_col).and_then(|v| v.trim().parse::<f64>().ok());
            let lon = row.get(lon_col).and_then(|v| v.trim().parse::<f64>().ok());

            match (lat, lon) {
                (Some(lat), Some(lon)) if !city.is_empty() && lat.is_finite() && lon.is_finite() => {
                    index.insert(city, Coordinates::new(lat, lon));
                }
                _ => skipped += 1,
            }
        }

        info!(
            "Loaded {} cities from {} ({} rows skipped)",
            index.len(),
            table.name,
            skipped
        );
        index
    }

    /// Adds a city. A later city with the same normalized key replaces the
    /// earlier coordinates but keeps its position.
    pub fn insert(&mut self, city: &str, coords: Coordinates) {
        let key = compact_key(city);
        if key.is_empty() {
            return;
        }
        self.cities.insert(city.trim().to_string());
        match self.positions.get(&key) {
            Some(&pos) => self.entries[pos].1 = coords,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, coords));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct city names as they appear in the source table, sorted.
    pub fn city_names(&self) -> Vec<String> {
        self.cities.iter().cloned().collect()
    }

    pub fn lookup(&self, location: &str) -> Option<Coordinates> {
        if let Ok(cache) = self.cache.read() {
            if let Some(cached) = cache.get(location) {
                return *cached;
            }
        }

        let result = self.resolve(location);

        if let Ok(mut cache) = self.cache.write() {
            cache.entry(location.to_string()).or_insert(result);
        }
        result
    }

    /// Number of memoized lookups.
    pub fn cached_lookups(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    fn resolve(&self, location: &str) -> Option<Coordinates> {
        // "Surathkal, Mangalore" -> "Surathkal"
        let city = location.split(',').next().unwrap_or(location);
        let key = compact_key(city);
        if key.is_empty() {
            return None;
        }

        if let Some(&pos) = self.positions.get(&key) {
            debug!("Geo exact match for '{}'", city);
            return Some(self.entries[pos].1);
        }

        if let Some((matched, coords)) = self.entries.iter().find(|(k, _)| k.starts_with(&key)) {
            debug!("Geo prefix match for '{}' -> {}", city, matched);
            return Some(*coords);
        }

        let mut best: Option<(f32, &String, Coordinates)> = None;
        for (candidate, coords) in &self.entries {
            let similarity = ratio(candidate, &key);
            if similarity < FUZZY_CUTOFF {
                continue;
            }
            if best.map_or(true, |(score, _, _)| similarity > score) {
                best = Some((similarity, candidate, *coords));
            }
        }

        match best {
            Some((similarity, matched, coords)) => {
                debug!(
                    "Geo fuzzy match for '{}' -> {} ({:.2})",
                    city, matched, similarity
                );
                Some(coords)
            }
            None => {
                debug!("Geo miss for '{}'", city);
                None
            }
        }
    }
}

fn ratio(a: &str, b: &str) -> f32 {
    SequenceMatcher::new(a, b).ratio()
}
