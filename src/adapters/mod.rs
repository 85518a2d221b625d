// Adapters layer: concrete loaders for data living outside the process.

pub mod json_catalog;

pub use json_catalog::{catalog_from_json, load_catalog, CatalogPaths};
