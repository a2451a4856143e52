use tickerforge_core::adapters::supported_asset_types;

use crate::error::CliError;

pub fn run() -> Result<(), CliError> {
    for (code, asset_type) in supported_asset_types() {
        println!("{code}\t{asset_type}");
    }
    Ok(())
}
