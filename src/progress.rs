use indicatif::{ProgressBar, ProgressStyle};

/// Thin wrapper over `indicatif` progress bars for the two long-running
/// phases the CLI drives: loading a corpus and running Gibbs epochs.
/// Suppressed entirely when `quiet` is set.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    fn style(template: &str) -> ProgressStyle {
        ProgressStyle::with_template(template)
            .expect("valid indicatif template")
            .progress_chars("=>-")
    }

    /// A bar tracking sentences loaded/processed within one corpus pass.
    pub fn for_corpus(len: u64, quiet: bool) -> Progress {
        if quiet || len == 0 {
            return Progress { bar: None };
        }
        let bar = ProgressBar::new(len);
        bar.set_style(Self::style("loading corpus [{bar:40}] {pos}/{len} sentences ({eta})"));
        Progress { bar: Some(bar) }
    }

    /// A bar tracking epochs of blocked Gibbs training.
    pub fn for_epochs(epochs: u64, quiet: bool) -> Progress {
        if quiet || epochs == 0 {
            return Progress { bar: None };
        }
        let bar = ProgressBar::new(epochs);
        bar.set_style(Self::style("training [{bar:40}] epoch {pos}/{len} ({eta})"));
        Progress { bar: Some(bar) }
    }

    pub fn inc(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        if let Some(bar) = &self.bar {
            bar.set_message(msg.into());
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
