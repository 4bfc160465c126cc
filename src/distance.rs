use crate::geo::{Coordinates, GeoIndex};
use crate::models::Candidate;
use log::{info, warn};

/// Mean Earth radius (IUGG), in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub struct DistanceResolver<'a> {
    geo: &'a GeoIndex,
}

impl<'a> DistanceResolver<'a> {
    pub fn new(geo: &'a GeoIndex) -> Self {
        Self { geo }
    }

    /// Keeps candidates whose city lies within `max_km` of `home`, recording the distance.
    ///
    /// If `home` cannot be resolved the candidates come back untouched. Candidates
    /// without a city, or whose city cannot be resolved, are dropped.
    pub fn filter_by_distance(&self, candidates: Vec<Candidate>, home: Option<&str>, max_km: f64) -> Vec<Candidate> {
        let home_coords = match home.and_then(|location| self.geo.lookup(location)) {
            Some(coords) => coords,
            None => {
                warn!(
                    "Could not resolve coordinates for home location {:?}, skipping distance filter",
                    home
                );
                return candidates;
            }
        };

        let total = candidates.len();
        let mut unresolved = 0usize;
        let mut kept = Vec::new();

        for mut candidate in candidates {
            let city = match candidate.record.city.as_deref().map(str::trim) {
                Some(city) if !city.is_empty() => city,
                _ => {
                    unresolved += 1;
                    continue;
                }
            };

            let coords = match self.geo.lookup(city) {
                Some(coords) => coords,
                None => {
                    unresolved += 1;
                    continue;
                }
            };

            let distance = round_km(haversine_km(home_coords, coords));
            if distance <= max_km {
                candidate.distance_km = Some(distance);
                kept.push(candidate);
            }
        }

        if unresolved > 0 {
            warn!("Dropped {} rows with a missing or unknown city", unresolved);
        }
        info!(
            "Distance filter ({} km): {} of {} rows kept",
            max_km,
            kept.len(),
            total
        );
        kept
    }
}

fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdmissionRecord;

    fn geo() -> GeoIndex {
        let mut geo = GeoIndex::new();
        geo.insert("Chennai", Coordinates::new(13.0827, 80.2707));
        geo.insert("Vellore", Coordinates::new(12.9165, 79.1325));
        geo.insert("Tiruchirappalli", Coordinates::new(10.7905, 78.7047));
        geo.insert("Delhi", Coordinates::new(28.7041, 77.1025));
        geo
    }

    fn candidate(city: Option<&str>) -> Candidate {
        Candidate::from(AdmissionRecord {
            institute: Some("National Institute of Technology".to_string()),
            branch: Some("Computer Science and Engineering".to_string()),
            quota: None,
            category: None,
            gender: None,
            opening_rank: None,
            closing_rank: Some(1000),
            city: city.map(str::to_string),
            state: None,
            source: "test".to_string(),
        })
    }

    #[test]
    fn test_haversine_known_distances() {
        let chennai = Coordinates::new(13.0827, 80.2707);
        let delhi = Coordinates::new(28.7041, 77.1025);
        let d = haversine_km(chennai, delhi);
        assert!((d - 1765.0).abs() < 30.0, "got {}", d);
        assert_eq!(haversine_km(chennai, chennai), 0.0);
    }

    #[test]
    fn test_zero_radius_keeps_only_same_city() {
        let geo = geo();
        let resolver = DistanceResolver::new(&geo);
        let rows = vec![candidate(Some("Chennai")), candidate(Some("Vellore"))];

        let kept = resolver.filter_by_distance(rows, Some("Chennai"), 0.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].record.city.as_deref(), Some("Chennai"));
        assert_eq!(kept[0].distance_km, Some(0.0));
    }

    #[test]
    fn test_radius_and_attached_distance() {
        let geo = geo();
        let resolver = DistanceResolver::new(&geo);
        let rows = vec![
            candidate(Some("Vellore")),
            candidate(Some("Tiruchirappalli")),
            candidate(Some("Delhi")),
        ];

        let kept = resolver.filter_by_distance(rows, Some("chennai"), 500.0);
        assert_eq!(kept.len(), 2);
        let vellore = kept[0].distance_km.unwrap();
        assert!(vellore > 100.0 && vellore < 200.0, "got {}", vellore);
        let trichy = kept[1].distance_km.unwrap();
        assert!(trichy > 250.0 && trichy < 350.0, "got {}", trichy);
    }

    #[test]
    fn test_unresolved_home_returns_input_unchanged() {
        let geo = geo();
        let resolver = DistanceResolver::new(&geo);
        let rows = vec![candidate(Some("Delhi")), candidate(None)];

        let kept = resolver.filter_by_distance(rows.clone(), Some("Atlantis"), 10.0);
        assert_eq!(kept, rows);

        let kept = resolver.filter_by_distance(rows.clone(), None, 10.0);
        assert_eq!(kept, rows);
    }

    #[test]
    fn test_rows_without_resolvable_city_are_dropped() {
        let geo = geo();
        let resolver = DistanceResolver::new(&geo);
        let rows = vec![candidate(None), candidate(Some(" ")), candidate(Some("Atlantis")), candidate(Some("Chennai"))];

        let kept = resolver.filter_by_distance(rows, Some("Chennai"), 5000.0);
        assert_eq!(kept.len(), 1);
    }
}
