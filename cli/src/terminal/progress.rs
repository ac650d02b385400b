use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::ProgressStyle;
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use sweepr_common::progress::{Phase, ProgressReporter};

const BAR_TEMPLATE: &str =
    "{spinner:.blue} {msg:<24} [{bar:30.green/bright_black}] {pos}/{len} {elapsed_precise}";

pub fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▆▁")
        .tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ])
}

/// One progress bar per running [`Phase`], each backed by a tracing span.
#[derive(Default)]
pub struct PhaseBars {
    spans: Mutex<HashMap<Phase, Span>>,
}

impl PhaseBars {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for PhaseBars {
    fn start(&self, phase: Phase, total: usize) {
        let span: Span = info_span!(target: "sweepr::progress", "phase", indicatif.pb_show = true);
        span.pb_set_style(&bar_style());
        span.pb_set_length(total as u64);
        span.pb_set_message(phase.label());
        span.pb_start();

        if let Ok(mut spans) = self.spans.lock() {
            spans.insert(phase, span);
        }
    }

    fn advance(&self, phase: Phase) {
        if let Ok(spans) = self.spans.lock()
            && let Some(span) = spans.get(&phase)
        {
            span.pb_inc(1);
        }
    }

    fn finish(&self, phase: Phase) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.remove(&phase);
        }
    }
}
