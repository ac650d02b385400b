use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Context;
use colored::*;

use sweepr_common::config::Config;
use sweepr_common::device::{DeviceErrorKind, WarrantyRecord};
use sweepr_core::store::csv_file::{CsvRecordStore, ErrorRow};

use crate::terminal::{colors, print};

/// Totals read from the output files.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub warranties: usize,
    pub failed_devices: usize,
    /// Error label to number of devices carrying it.
    pub errors_by_type: BTreeMap<String, usize>,
    /// Rows whose label predates the current error taxonomy.
    pub legacy_rows: usize,
}

impl Report {
    pub fn from_rows(records: &[WarrantyRecord], errors: &[ErrorRow]) -> Self {
        let mut errors_by_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut legacy_rows: usize = 0;
        for row in errors {
            *errors_by_type.entry(row.error_type.clone()).or_default() += 1;
            if row.error_type.parse::<DeviceErrorKind>().is_err() {
                legacy_rows += 1;
            }
        }
        let failed: HashSet<&str> = errors.iter().map(|row| row.device_name.as_str()).collect();

        Self {
            warranties: records.len(),
            failed_devices: failed.len(),
            errors_by_type,
            legacy_rows,
        }
    }
}

pub fn report(config_path: &Path) -> anyhow::Result<()> {
    let config: Config = Config::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let store = CsvRecordStore::new(&config.output.warranty_csv, &config.output.errors_csv);

    let records: Vec<WarrantyRecord> = if store.warranty_path().exists() {
        store
            .load_warranty_records()
            .context("Failed to read warranty file")?
    } else {
        Vec::new()
    };
    let errors: Vec<ErrorRow> = if store.errors_path().exists() {
        store.load_error_rows().context("Failed to read error file")?
    } else {
        Vec::new()
    };

    print_report(&Report::from_rows(&records, &errors));
    Ok(())
}

fn print_report(report: &Report) {
    print::header("warranty report");
    print::set_key_width(["Warranty records", "Devices with errors", "Legacy error rows"]);
    print::aligned_line("Warranty records", report.warranties.to_string().color(colors::SUCCESS));
    print::aligned_line(
        "Devices with errors",
        report.failed_devices.to_string().color(colors::FAILURE),
    );
    if report.legacy_rows > 0 {
        print::aligned_line(
            "Legacy error rows",
            report.legacy_rows.to_string().color(colors::ACCENT),
        );
    }

    if report.errors_by_type.is_empty() {
        return;
    }

    let lines: Vec<(String, ColoredString)> = report
        .errors_by_type
        .iter()
        .map(|(label, count)| (label.clone(), count.to_string().color(colors::ACCENT)))
        .collect();
    print::as_tree_one_level(lines);
}
