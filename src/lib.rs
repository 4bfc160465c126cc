//! College recommendations from JEE admission cutoff tables.
//!
//! [`service::RecommendationService`] loads every CSV table in a data
//! directory, filters the rows against a [`models::StudentQuery`], optionally
//! keeps only colleges within a distance of the student's home, and returns
//! scored recommendation groups.

pub mod analyzer;
pub mod distance;
pub mod error;
pub mod filter;
pub mod geo;
pub mod models;
pub mod schema;
pub mod service;
pub mod store;
pub mod table;
