//! Progress bar utilities.

use indicatif::{ProgressBar, ProgressStyle};

/// Length of a sized bar; positions are whole percentages.
pub const BAR_LENGTH: u64 = 100;

const SIZED_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {percent}%";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} {bytes}";

/// Create a progress bar for one file download.
///
/// With a known size the bar runs from 0 to 100 percent; otherwise it
/// spins and shows the bytes received. Returns a hidden bar when `visible`
/// is false.
pub fn download_bar(name: &str, sized: bool, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = if sized {
        let bar = ProgressBar::new(BAR_LENGTH);
        if let Ok(style) = ProgressStyle::default_bar().template(SIZED_TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    } else {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
            bar.set_style(style);
        }
        bar
    };
    bar.set_message(name.to_string());
    bar
}

/// Bar position for a completed fraction.
pub fn percent(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * BAR_LENGTH as f64).round() as u64
}
