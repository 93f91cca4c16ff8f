//! JSON input and output for the command line tool

use anyhow::Context;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use track_core::{Observation, TrajectoryRow};

/// Parse a JSON array of observations
pub fn read_observations(reader: impl Read) -> anyhow::Result<Vec<Observation>> {
    serde_json::from_reader(reader).context("Failed to parse observations")
}

/// Read observations from `path`, or stdin when no path is given
pub fn load_observations(path: Option<&Path>) -> anyhow::Result<Vec<Observation>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            read_observations(BufReader::new(file))
        }
        None => read_observations(io::stdin().lock()),
    }
}

/// Write rows as a pretty JSON array
pub fn write_rows(mut writer: impl Write, rows: &[TrajectoryRow]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write rows to `path`, or stdout when no path is given
pub fn store_rows(path: Option<&Path>, rows: &[TrajectoryRow]) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_rows(BufWriter::new(file), rows)
        }
        None => write_rows(io::stdout().lock(), rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use track_core::TrackId;

    #[test]
    fn test_read_observations() {
        let json = r#"[
            {"id": "bat-1", "timestamp": "2024-08-15T20:00:00Z", "lon": -63.6, "lat": 44.5,
             "lon_sd": 0.002, "lat_sd": 0.002, "interval_weight": 0.4},
            {"id": "bat-1", "timestamp": "2024-08-15T20:15:00Z", "lon": -63.59, "lat": 44.51,
             "lon_sd": 0.002, "lat_sd": 0.002}
        ]"#;

        let observations = read_observations(json.as_bytes()).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].id, TrackId::new("bat-1"));
        assert_eq!(observations[0].interval_weight, Some(0.4));
        assert_eq!(observations[1].interval_weight, None);
        assert!(observations[1].covariates.is_empty());
    }

    #[test]
    fn test_malformed_input_reported() {
        let err = read_observations(&b"{\"id\": 1}"[..]).unwrap_err();
        assert!(err.to_string().contains("Failed to parse observations"));
    }

    #[test]
    fn test_write_rows() {
        let row = TrajectoryRow {
            timestamp: Utc.with_ymd_and_hms(2024, 8, 15, 20, 0, 0).unwrap(),
            id: TrackId::new("bat-1"),
            lon_mean: -63.6,
            lon_median: -63.6,
            lon_lower: -63.61,
            lon_upper: -63.59,
            lat_mean: 44.5,
            lat_median: 44.5,
            lat_lower: 44.49,
            lat_upper: 44.51,
            distance_m: None,
            speed_m_per_min: None,
        };

        let mut buffer = Vec::new();
        write_rows(&mut buffer, &[row.clone()]).unwrap();

        let parsed: Vec<TrajectoryRow> = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed, vec![row]);
        assert!(String::from_utf8(buffer).unwrap().contains("\"distance_m\": null"));
    }
}
