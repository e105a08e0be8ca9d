//! Progress bar for the detail fetch stage.

use std::sync::Arc;
use std::time::Duration;

use animal_etl::pipeline::ProgressObserver;
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "{spinner} [{bar:30}] {pos}/{len} animals fetched ({elapsed})";

/// An optional bar driven by fetch progress callbacks.
pub(crate) struct FetchProgressBar {
    bar: Option<ProgressBar>,
}

impl FetchProgressBar {
    /// Creates the bar, or a no-op stand-in when `enabled` is false.
    pub(crate) fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar: Some(bar) }
    }

    /// Observer that moves the bar, if the bar is enabled.
    pub(crate) fn observer(&self) -> Option<ProgressObserver> {
        let bar = self.bar.clone()?;
        Some(Arc::new(move |completed: usize, total: usize| {
            bar.set_length(u64::try_from(total).unwrap_or(u64::MAX));
            bar.set_position(u64::try_from(completed).unwrap_or(u64::MAX));
        }))
    }

    /// Removes the bar from the terminal.
    pub(crate) fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
