use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use colored::*;

use sweepr_common::config::Config;
use sweepr_core::network::SystemProbe;
use sweepr_core::pipeline::{Pipeline, PipelineSettings, RunSummary};
use sweepr_core::store::csv_file::CsvRecordStore;
use sweepr_protocols::ldap::LdapConnector;
use sweepr_protocols::powershell::PowerShellRemoting;
use sweepr_protocols::webdriver::WebDriverLauncher;

use crate::commands::RunArgs;
use crate::terminal::progress::PhaseBars;
use crate::terminal::{colors, print};

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config: Config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    apply_overrides(&args, &mut config);
    config.validate()?;

    print::header("sweeping directory");

    let pipeline = Pipeline::new(
        PipelineSettings::from_config(&config),
        Arc::new(LdapConnector::from_config(&config)),
        Arc::new(SystemProbe::from(&config.probe)),
        Arc::new(PowerShellRemoting::from(&config.remote)),
        Arc::new(WebDriverLauncher::from_config(&config)),
    )
    .with_progress(Arc::new(PhaseBars::new()));

    let store = CsvRecordStore::new(&config.output.warranty_csv, &config.output.errors_csv);

    let start_time: Instant = Instant::now();
    let summary: RunSummary = pipeline.run(Box::new(store)).await?;
    print_summary(&summary, start_time.elapsed(), &config);
    Ok(())
}

fn apply_overrides(args: &RunArgs, config: &mut Config) {
    if let Some(n) = args.probe_workers {
        config.workers.probe = Some(n);
    }
    if let Some(n) = args.identity_workers {
        config.workers.identity = n;
    }
    if let Some(n) = args.lookup_workers {
        config.workers.lookup = n;
    }
    if args.show_browser {
        config.browser.headless = false;
    }
}

fn print_summary(summary: &RunSummary, total_time: Duration, config: &Config) {
    let rows: [(&str, usize); 6] = [
        ("Directory entries", summary.entries),
        ("Already resolved", summary.skipped),
        ("Live devices", summary.pool),
        ("Serials read", summary.identified),
        ("Warranties recorded", summary.recorded),
        ("Device failures", summary.failures),
    ];

    print::header("run summary");
    print::set_key_width(rows.iter().map(|(key, _)| *key));
    for (key, value) in rows {
        print::aligned_line(key, value.to_string());
    }
    print::aligned_line("Warranty file", config.output.warranty_csv.display().to_string());
    print::aligned_line("Error file", config.output.errors_csv.display().to_string());

    let recorded: ColoredString = format!("{} warranties", summary.recorded)
        .bold()
        .color(colors::SUCCESS);
    let failed: ColoredString = format!("{} failures", summary.failures)
        .bold()
        .color(colors::FAILURE);
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();

    print::fat_separator();
    print::centerln(&format!("Sweep complete: {recorded}, {failed} in {total_time}"));
}
