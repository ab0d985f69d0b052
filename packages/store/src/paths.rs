//! Output file naming.

use std::path::{Path, PathBuf};

/// Suffix of the merged table file.
pub const CSV_SUFFIX: &str = "_ndvi_temp.csv";

/// Suffix of the curve image file.
pub const PLOT_SUFFIX: &str = "_ndvi_curve.png";

/// `{dir}/{region}_{year}_ndvi_temp.csv`
#[must_use]
pub fn csv_path(dir: &Path, region: &str, year: i32) -> PathBuf {
    dir.join(format!("{region}_{year}{CSV_SUFFIX}"))
}

/// `{dir}/{region}_{year}_ndvi_curve.png`
#[must_use]
pub fn plot_path(dir: &Path, region: &str, year: i32) -> PathBuf {
    dir.join(format!("{region}_{year}{PLOT_SUFFIX}"))
}

/// Sibling path a file is written to before being renamed over `path`.
///
/// The extension is kept last so format detection by extension still
/// works on the temporary file.
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_file_name(format!("{stem}.tmp.{ext}")),
        None => path.with_file_name(format!("{stem}.tmp")),
    }
}

/// Splits a table file name back into `(region, year)`.
#[must_use]
pub fn parse_csv_file_name(name: &str) -> Option<(String, i32)> {
    let base = name.strip_suffix(CSV_SUFFIX)?;
    let (region, year) = base.rsplit_once('_')?;
    if region.is_empty() {
        return None;
    }
    Some((region.to_string(), year.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_output_names() {
        let dir = Path::new("world");
        assert_eq!(
            csv_path(dir, "Japan_Tokyo", 2024),
            PathBuf::from("world/Japan_Tokyo_2024_ndvi_temp.csv")
        );
        assert_eq!(
            plot_path(dir, "Japan_Tokyo", 2024),
            PathBuf::from("world/Japan_Tokyo_2024_ndvi_curve.png")
        );
    }

    #[test]
    fn temp_path_keeps_extension_last() {
        assert_eq!(
            temp_path(Path::new("world/a_2024_ndvi_curve.png")),
            PathBuf::from("world/a_2024_ndvi_curve.tmp.png")
        );
    }

    #[test]
    fn parses_region_and_year() {
        assert_eq!(
            parse_csv_file_name("Bolivia,_Plurinational_State_of_Beni_2023_ndvi_temp.csv"),
            Some(("Bolivia,_Plurinational_State_of_Beni".to_string(), 2023))
        );
        assert_eq!(parse_csv_file_name("Japan_Tokyo_2024_ndvi_curve.png"), None);
        assert_eq!(parse_csv_file_name("Japan_Tokyo_latest_ndvi_temp.csv"), None);
        assert_eq!(parse_csv_file_name("_2024_ndvi_temp.csv"), None);
    }
}
