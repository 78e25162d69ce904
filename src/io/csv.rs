use crate::error::{BuildError, BuildResult};
use crate::io::timefmt;
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use std::path::Path;

// Read a boundary time series from a two-column csv: timestamp, value.
// Timestamps use the same format as the forcing file reference stamp.
pub fn read_time_series(path: &Path) -> BuildResult<Vec<(NaiveDateTime, f64)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| BuildError::serialization(format!("{}: {e}", path.display())))?;

    let mut series = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| BuildError::serialization(format!("{}: {e}", path.display())))?;
        if record.len() < 2 {
            return Err(BuildError::serialization(format!(
                "{}: expected two columns, got {}",
                path.display(),
                record.len()
            )));
        }
        let stamp = timefmt::parse_datetime(&record[0])?;
        let value: f64 = record[1].parse().map_err(|_| {
            BuildError::serialization(format!(
                "{}: bad value '{}' at {}",
                path.display(),
                &record[1],
                &record[0]
            ))
        })?;
        series.push((stamp, value));
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_series() {
        let path = std::env::temp_dir().join("hydronet_series_test.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "datetime,waterlevel").unwrap();
        writeln!(file, "2023-01-01 00:00:00, 1.5").unwrap();
        writeln!(file, "2023-01-01 06:30:00, 1.8").unwrap();
        drop(file);

        let series = read_time_series(&path).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].1, 1.5);
        assert_eq!(
            timefmt::format_datetime(&series[1].0),
            "2023-01-01 06:30:00"
        );
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let path = std::env::temp_dir().join("hydronet_series_bad_test.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "datetime,value").unwrap();
        writeln!(file, "01/01/2023, 1.5").unwrap();
        drop(file);

        assert!(read_time_series(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
