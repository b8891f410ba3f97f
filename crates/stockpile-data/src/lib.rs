//! Data file loading for the stockpile planning engine.
//!
//! Catalogue content (items, formulas, activities, value pools, subject
//! progression tables) lives in a single `catalogue.{ron,toml,json}` file.
//! The schema structs in [`schema`] define the on-disk format with string
//! keys; [`loader`] resolves those keys into engine ids and hands the result
//! to the catalogue builder for validation.

pub mod loader;
pub mod schema;

pub use loader::{load_catalogue, load_catalogue_str, DataLoadError, Format};
