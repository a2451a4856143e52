pub mod asset_types;
pub mod import;
pub mod remove;
