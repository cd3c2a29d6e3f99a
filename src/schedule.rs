use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::selection::Selection;

/// Daily time-of-day window during which usage is monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DailyWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub repeats: bool,
}

impl DailyWindow {
    /// Check if a time of day falls inside the window (end exclusive)
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time < self.end
    }

    /// Length of the window
    pub fn duration(&self) -> Duration {
        (self.end - self.start).to_std().unwrap_or_default()
    }
}

/// Usage threshold event submitted with a schedule
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActivityEvent {
    pub applications: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub threshold_secs: u64,
}

impl ActivityEvent {
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_secs)
    }
}

/// A monitoring request for the activity monitor service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitoringSchedule {
    /// Name of the monitored activity (e.g. "daily")
    pub activity: String,
    pub window: DailyWindow,
    /// Threshold events keyed by event name
    pub events: BTreeMap<String, ActivityEvent>,
}

impl MonitoringSchedule {
    /// Check if no event targets any app or category
    pub fn is_empty(&self) -> bool {
        self.events
            .values()
            .all(|e| e.applications.is_empty() && e.categories.is_empty())
    }
}

/// Fixed parts of the monitoring schedule; only the targets change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleTemplate {
    pub activity: String,
    pub event: String,
    pub window: DailyWindow,
    pub threshold: Duration,
}

impl ScheduleTemplate {
    /// Derive the schedule monitoring an encourage selection
    pub fn schedule_for(&self, selection: &Selection) -> MonitoringSchedule {
        let mut events = BTreeMap::new();
        events.insert(
            self.event.clone(),
            ActivityEvent {
                applications: selection.application_ids.clone(),
                categories: selection.category_ids.clone(),
                threshold_secs: self.threshold.as_secs(),
            },
        );

        MonitoringSchedule {
            activity: self.activity.clone(),
            window: self.window,
            events,
        }
    }
}

impl Default for ScheduleTemplate {
    fn default() -> Self {
        Self {
            activity: "daily".to_string(),
            event: "encouraged".to_string(),
            window: DailyWindow {
                start: NaiveTime::from_hms_opt(15, 8, 0).unwrap_or_default(),
                end: NaiveTime::from_hms_opt(16, 8, 0).unwrap_or_default(),
                repeats: false,
            },
            threshold: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn default_template_is_one_hour_one_shot() {
        let template = ScheduleTemplate::default();
        assert_eq!(template.activity, "daily");
        assert_eq!(template.event, "encouraged");
        assert_eq!(template.window.start, time(15, 8));
        assert_eq!(template.window.end, time(16, 8));
        assert!(!template.window.repeats);
        assert_eq!(template.window.duration(), Duration::from_secs(3600));
        assert_eq!(template.threshold, Duration::from_secs(60));
    }

    #[test]
    fn schedule_targets_encourage_selection() {
        let template = ScheduleTemplate::default();
        let selection = Selection::from_ids(["com.y"], ["education"]);

        let schedule = template.schedule_for(&selection);

        assert_eq!(schedule.activity, "daily");
        let event = &schedule.events["encouraged"];
        assert!(event.applications.contains("com.y"));
        assert!(event.categories.contains("education"));
        assert_eq!(event.threshold(), Duration::from_secs(60));
        assert!(!schedule.is_empty());
    }

    #[test]
    fn schedule_for_empty_selection_has_no_targets() {
        let schedule = ScheduleTemplate::default().schedule_for(&Selection::new());
        assert_eq!(schedule.events.len(), 1);
        assert!(schedule.is_empty());
    }

    #[test]
    fn window_contains_is_end_exclusive() {
        let window = ScheduleTemplate::default().window;
        assert!(window.contains(time(15, 8)));
        assert!(window.contains(time(16, 7)));
        assert!(!window.contains(time(16, 8)));
        assert!(!window.contains(time(9, 0)));
    }
}
