//! The persistent "export in progress" indicator.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

/// Capability for showing the persistent progress affordance.
/// Tests substitute a recording fake.
pub trait IndicatorHub: Send + Sync {
    /// Shows the indicator at 0 % and returns the handle used to update
    /// and later clear it.
    fn show(&self, title: &str) -> Result<Box<dyn Indicator>>;
}

/// A live indicator. Cleared exactly once during teardown; updates after
/// clearing are allowed to be no-ops.
pub trait Indicator: Send {
    fn set_percent(&mut self, percent: u8);
    fn clear(&mut self);
}

/// Terminal indicator backed by an indicatif progress bar.
pub struct TermIndicatorHub;

impl IndicatorHub for TermIndicatorHub {
    fn show(&self, title: &str) -> Result<Box<dyn Indicator>> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos:>3}%")?
                .progress_chars("=>-"),
        );
        bar.set_message(title.to_string());
        bar.set_position(0);
        Ok(Box::new(TermIndicator { bar }))
    }
}

struct TermIndicator {
    bar: ProgressBar,
}

impl Indicator for TermIndicator {
    fn set_percent(&mut self, percent: u8) {
        self.bar.set_position(percent.min(100) as u64);
    }

    fn clear(&mut self) {
        self.bar.finish_and_clear();
    }
}
