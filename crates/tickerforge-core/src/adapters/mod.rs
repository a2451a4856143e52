mod openfigi;
mod polygon;
mod tiingo;
mod yahoo;

pub use openfigi::OpenFigiEnricher;
pub use polygon::{
    supported_asset_types, PolygonDetailEnricher, PolygonFeed, DEFAULT_ASSET_TYPE_CODES,
};
pub use tiingo::TiingoFeed;
pub use yahoo::YahooEnricher;
