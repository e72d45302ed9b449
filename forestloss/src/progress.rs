use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Returns a progress bar drawn to stderr.
pub fn bar(prefix: String, length: u64) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(length), ProgressDrawTarget::stderr_with_hz(4));
    pb.set_prefix(prefix);
    pb.set_style(
        ProgressStyle::with_template("{prefix}... {pos}/{len}\n[{wide_bar:.green/red}]")
            .expect("incorrect progress bar format string")
            .progress_chars("#>-"),
    );
    pb
}
