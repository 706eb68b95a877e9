//! Export helpers for burn plans (JSON) and patch timelines (CSV).

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Create a writer for the target path, handling stdout (`-`) by convention.
pub fn writer_for_path(path: &Path) -> io::Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    Ok(Box::new(BufWriter::new(file)))
}

pub mod plan {
    use serde::Serialize;
    use serde_json::to_writer_pretty;
    use std::io::Write;
    use std::path::Path;

    use super::{ExportError, writer_for_path};

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct BurnRecord {
        pub epoch_s: f64,
        pub delta_v_km_s: [f64; 3],
        pub magnitude_km_s: f64,
    }

    impl BurnRecord {
        pub fn new(epoch_s: f64, delta_v_km_s: [f64; 3]) -> Self {
            let magnitude_km_s = delta_v_km_s.iter().map(|c| c * c).sum::<f64>().sqrt();
            Self {
                epoch_s,
                delta_v_km_s,
                magnitude_km_s,
            }
        }
    }

    /// JSON envelope of a planned transfer.
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct BurnPlanRecord {
        pub origin: String,
        pub destination: String,
        pub departure: BurnRecord,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub arrival: Option<BurnRecord>,
        pub total_delta_v_km_s: f64,
        pub transfer_time_s: f64,
        pub lambert_path: String,
        pub iterations: usize,
        pub seed: u64,
    }

    pub fn write_json(writer: &mut dyn Write, record: &BurnPlanRecord) -> Result<(), ExportError> {
        to_writer_pretty(&mut *writer, record)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the plan as pretty JSON to `path` (`-` for stdout).
    pub fn write_plan(path: &Path, record: &BurnPlanRecord) -> Result<(), ExportError> {
        let mut writer = writer_for_path(path)?;
        write_json(writer.as_mut(), record)
    }
}

pub mod patches {
    use std::io::{self, Write};

    const HEADER: &str = "index,body,start_epoch_s,end_epoch_s,transition,semi_major_axis_km,eccentricity,periapsis_km";

    /// Write the standard patch timeline CSV header.
    pub fn write_header(writer: &mut dyn Write) -> io::Result<()> {
        writeln!(writer, "{}", HEADER)
    }

    /// CSV row for one patched-conic segment.
    #[derive(Debug, Clone)]
    pub struct Record<'a> {
        pub index: usize,
        pub body: &'a str,
        pub start_epoch_s: f64,
        pub end_epoch_s: f64,
        pub transition: &'a str,
        pub semi_major_axis_km: f64,
        pub eccentricity: f64,
        pub periapsis_km: f64,
    }

    impl<'a> Record<'a> {
        /// Serialize the record to CSV, matching the header ordering.
        pub fn write_to(&self, writer: &mut dyn Write) -> io::Result<()> {
            writeln!(
                writer,
                "{},{},{:.3},{:.3},{},{:.3},{:.6},{:.3}",
                self.index,
                self.body,
                self.start_epoch_s,
                self.end_epoch_s,
                self.transition,
                self.semi_major_axis_km,
                self.eccentricity,
                self.periapsis_km,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn plan_json_omits_missing_arrival() {
        let record = plan::BurnPlanRecord {
            origin: "Earth".into(),
            destination: "Earth".into(),
            departure: plan::BurnRecord::new(10.0, [3.0, 4.0, 0.0]),
            arrival: None,
            total_delta_v_km_s: 5.0,
            transfer_time_s: 1_000.0,
            lambert_path: "short".into(),
            iterations: 12,
            seed: 42,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/plan.json");
        plan::write_plan(&path, &record).unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["departure"]["magnitude_km_s"], 5.0);
        assert!(value.get("arrival").is_none());
    }

    #[test]
    fn patch_rows_follow_header() {
        let mut buffer = Vec::new();
        patches::write_header(&mut buffer).unwrap();
        patches::Record {
            index: 0,
            body: "Moon",
            start_epoch_s: 0.0,
            end_epoch_s: 3_600.0,
            transition: "escape",
            semi_major_axis_km: -5_000.0,
            eccentricity: 1.5,
            periapsis_km: 2_500.0,
        }
        .write_to(&mut buffer)
        .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());
        assert!(lines[1].starts_with("0,Moon,0.000,3600.000,escape"));
    }
}
