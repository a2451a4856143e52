//! Plain fixed-width table output for `--print`.

use tickerforge_core::Asset;

const COLUMNS: [(&str, usize); 6] = [
    ("Ticker", 8),
    ("Name", 32),
    ("Composite FIGI", 14),
    ("Exchange", 10),
    ("Type", 22),
    ("Sector", 18),
];

pub fn print_assets(assets: &[Asset]) {
    let header: Vec<String> = COLUMNS
        .iter()
        .map(|&(name, width)| format!("{name:<width$}"))
        .collect();
    println!("{}", header.join("  "));
    println!(
        "{}",
        COLUMNS
            .iter()
            .map(|(_, width)| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  ")
    );

    for asset in assets {
        let cells = [
            clip(asset.ticker.as_str(), COLUMNS[0].1),
            clip(asset.name.as_deref().unwrap_or(""), COLUMNS[1].1),
            clip(asset.composite_figi.as_deref().unwrap_or(""), COLUMNS[2].1),
            clip(asset.primary_exchange.as_deref().unwrap_or(""), COLUMNS[3].1),
            clip(asset.asset_type.as_str(), COLUMNS[4].1),
            clip(asset.sector.as_deref().unwrap_or(""), COLUMNS[5].1),
        ];
        let row: Vec<String> = cells
            .iter()
            .zip(COLUMNS.iter())
            .map(|(cell, &(_, width))| format!("{cell:<width$}"))
            .collect();
        println!("{}", row.join("  "));
    }
}

fn clip(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_owned()
    } else {
        let clipped: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{clipped}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_truncates_long_values() {
        assert_eq!(clip("short", 8), "short");
        assert_eq!(clip("a very long company name", 8), "a very …");
    }
}
