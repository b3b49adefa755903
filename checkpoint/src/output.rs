//! Export of results for analysis outside the simulator
//!
//! Sweeps go to CSV (one row per capacity combination) or JSON; single runs to
//! JSON. Undefined averages are written as empty CSV fields and JSON `null`.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::CheckpointError;
use crate::run::ExperimentResult;
use crate::sweep::SweepReport;

pub fn write_csv(report: &SweepReport, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in report.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CheckpointError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn write_json<T: Serialize + ?Sized>(value: &T, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
    fs::write(path, to_json(value)?)?;
    Ok(())
}

pub fn write_report_json(report: &SweepReport, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
    write_json(&report.rows(), path)
}

fn average(result: &ExperimentResult) -> String {
    match result.average_wait() {
        Ok(wait) => format!("{wait:.4}"),
        Err(_) => "undefined".to_string(),
    }
}

/// One-line summary of a run, as printed by the binary
pub fn render_result(name: &str, result: &ExperimentResult) -> String {
    format!(
        "{name} {:?}: {} arrived, {} completed, {} in flight, total wait {:.4}, average wait {}",
        result.capacities,
        result.arrived_count,
        result.completed_count,
        result.in_flight_count,
        result.total_wait_time,
        average(result)
    )
}

/// Fixed-width table of a sweep, best combination marked with `*`
pub fn render_table(report: &SweepReport) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    write_table(&mut out, report).ok();
    out
}

fn write_table(out: &mut String, report: &SweepReport) -> fmt::Result {
    let best = report.best().map(|entry| entry.capacities.clone());
    writeln!(
        out,
        "  {:<12} {:>10} {:>10} {:>14}",
        "capacities", "completed", "total wait", "average wait"
    )?;
    for entry in &report.entries {
        let marker = if best.as_ref() == Some(&entry.capacities) { '*' } else { ' ' };
        let label = format!("{:?}", entry.capacities);
        match &entry.outcome {
            Ok(result) => writeln!(
                out,
                "{marker} {label:<12} {:>10} {:>10.3} {:>14}",
                result.completed_count,
                result.total_wait_time,
                average(result)
            )?,
            Err(e) => writeln!(out, "{marker} {label:<12} error: {e}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FacilityConfig;
    use crate::sweep::{Sweep, SweepErrorPolicy};

    fn report() -> SweepReport {
        Sweep::new(
            FacilityConfig::airport(),
            vec![vec![1, 1], vec![0, 2], vec![2, 2]],
        )
        .policy(SweepErrorPolicy::Continue)
        .run()
        .unwrap()
    }

    #[test]
    fn csv_has_one_row_per_combination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.csv");

        write_csv(&report(), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("capacities,total_wait_time,completed_count"));
        assert!(lines[1].starts_with("\"1,1\","));
        assert!(lines[2].contains("capacity 0"));
    }

    #[test]
    fn json_rows_use_null_for_missing_values() {
        let json = to_json(&report().rows()).unwrap();
        let rows: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(rows.as_array().unwrap().len(), 3);
        assert!(rows[1]["average_wait"].is_null());
        assert_eq!(rows[2]["capacities"], "2,2");
    }

    #[test]
    fn undefined_average_is_spelled_out() {
        let result = crate::run_once(&FacilityConfig::airport().with_horizon(0.0)).unwrap();
        assert!(render_result("airport", &result).ends_with("average wait undefined"));
    }

    #[test]
    fn table_marks_best_combination() {
        let report = report();
        let table = render_table(&report);
        let best = report.best().unwrap();
        let marked = table.lines().find(|l| l.starts_with('*')).unwrap();
        assert!(marked.contains(&format!("{:?}", best.capacities)));
    }
}
