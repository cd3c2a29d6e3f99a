use app_limiter::{MonitoringSchedule, Selection};

/// Initialize logging
///
/// `RUST_LOG` wins, then `--verbose`, then the configured level.
pub fn init_logging(verbose: bool, configured_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if verbose { "debug" } else { configured_level };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Format a selection for display
pub fn format_selection(selection: &Selection) -> String {
    if selection.is_empty() {
        return "(none)".to_string();
    }

    let mut parts = Vec::new();
    if !selection.application_ids.is_empty() {
        let apps: Vec<&str> = selection.application_ids.iter().map(String::as_str).collect();
        parts.push(format!("apps: {}", apps.join(", ")));
    }
    if !selection.category_ids.is_empty() {
        let categories: Vec<&str> = selection.category_ids.iter().map(String::as_str).collect();
        parts.push(format!("categories: {}", categories.join(", ")));
    }
    parts.join("; ")
}

/// Format a schedule window for display
pub fn format_window(schedule: &MonitoringSchedule) -> String {
    format!(
        "{}–{}{}",
        schedule.window.start.format("%H:%M"),
        schedule.window.end.format("%H:%M"),
        if schedule.window.repeats { " (daily)" } else { " (once)" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_limiter::ScheduleTemplate;

    #[test]
    fn format_empty_selection() {
        assert_eq!(format_selection(&Selection::new()), "(none)");
    }

    #[test]
    fn format_selection_lists_sorted_ids() {
        let selection = Selection::from_ids(["com.z", "com.a"], ["games"]);
        assert_eq!(format_selection(&selection), "apps: com.a, com.z; categories: games");
    }

    #[test]
    fn format_default_window() {
        let schedule = ScheduleTemplate::default().schedule_for(&Selection::new());
        assert_eq!(format_window(&schedule), "15:08–16:08 (once)");
    }
}
