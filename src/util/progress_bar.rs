
use indicatif::{ProgressBar, ProgressState, ProgressStyle};

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}); ETA: {eta_precise}; {msg}";

/// Shared progress bar styling.
/// Falls back to the default bar if the template is rejected.
pub fn get_progress_style() -> ProgressStyle {
    let style = match ProgressStyle::with_template(PROGRESS_TEMPLATE) {
        Ok(style) => style,
        Err(_e) => ProgressStyle::default_bar()
    };
    style
        .with_key("percent", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.1}%", state.fraction() * 100.0);
        })
        .progress_chars("##-")
}

/// Progress bar over the major solutions being refined
pub fn model_progress_bar(num_models: usize) -> ProgressBar {
    let bar = ProgressBar::new(num_models as u64)
        .with_style(get_progress_style());
    bar.set_message("models refined");
    bar
}
