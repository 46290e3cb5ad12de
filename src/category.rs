//! The fixed set of diagnosis categories.
//!
//! Categories are terminal conclusions: rules vote for them, the classifier
//! scores them, and nothing chains further from them.

use serde::{Deserialize, Serialize};

/// One of the ten diagnosis categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Overheating,
    SlowPerformance,
    BatteryIssues,
    NetworkIssues,
    StartupFailure,
    ScreenProblems,
    StorageIssues,
    AudioProblems,
    AppCrashes,
    HardwareFailure,
}

impl Category {
    /// All categories, in declaration order.
    pub const ALL: [Category; 10] = [
        Self::Overheating,
        Self::SlowPerformance,
        Self::BatteryIssues,
        Self::NetworkIssues,
        Self::StartupFailure,
        Self::ScreenProblems,
        Self::StorageIssues,
        Self::AudioProblems,
        Self::AppCrashes,
        Self::HardwareFailure,
    ];

    /// Parse a category name. Accepts the display name ("Network Issues"),
    /// snake case ("network_issues") and kebab case, case-insensitively.
    /// Runs of spaces, hyphens and underscores count as one separator.
    pub fn parse(s: &str) -> Option<Self> {
        let key = s
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|word| !word.is_empty())
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>()
            .join("_");
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Stable snake_case identifier.
    pub fn key(self) -> &'static str {
        match self {
            Self::Overheating => "overheating",
            Self::SlowPerformance => "slow_performance",
            Self::BatteryIssues => "battery_issues",
            Self::NetworkIssues => "network_issues",
            Self::StartupFailure => "startup_failure",
            Self::ScreenProblems => "screen_problems",
            Self::StorageIssues => "storage_issues",
            Self::AudioProblems => "audio_problems",
            Self::AppCrashes => "app_crashes",
            Self::HardwareFailure => "hardware_failure",
        }
    }

    /// Human-readable name, also used for alphabetical tie-breaking.
    pub fn name(self) -> &'static str {
        match self {
            Self::Overheating => "Overheating",
            Self::SlowPerformance => "Slow Performance",
            Self::BatteryIssues => "Battery Issues",
            Self::NetworkIssues => "Network Issues",
            Self::StartupFailure => "Startup Failure",
            Self::ScreenProblems => "Screen Problems",
            Self::StorageIssues => "Storage Issues",
            Self::AudioProblems => "Audio Problems",
            Self::AppCrashes => "App Crashes",
            Self::HardwareFailure => "Hardware Failure",
        }
    }

    /// Short user-facing description of the category.
    pub fn description(self) -> &'static str {
        match self {
            Self::Overheating => "Device getting too hot",
            Self::SlowPerformance => "System is slow or lagging",
            Self::BatteryIssues => "Battery drains fast or won't charge",
            Self::NetworkIssues => "WiFi or internet connection issues",
            Self::StartupFailure => "Device won't turn on or boot",
            Self::ScreenProblems => "Display or screen issues",
            Self::StorageIssues => "Disk full or storage errors",
            Self::AudioProblems => "Sound or microphone issues",
            Self::AppCrashes => "Applications freezing or crashing",
            Self::HardwareFailure => "Physical component failure",
        }
    }

    /// Generic remedies, used when a category is ranked without any rule
    /// supplying a specific cause.
    pub fn general_solutions(self) -> &'static [&'static str] {
        match self {
            Self::Overheating => &[
                "Ensure proper ventilation around the device",
                "Clean dust from vents and fans",
                "Avoid using the device in direct sunlight or hot environments",
            ],
            Self::SlowPerformance => &[
                "Close unused applications",
                "Restart the device",
                "Free up storage space",
                "Scan for malware",
            ],
            Self::BatteryIssues => &[
                "Check battery health in settings",
                "Reduce screen brightness",
                "Use the original charger",
            ],
            Self::NetworkIssues => &[
                "Toggle airplane mode on and off",
                "Restart the router or modem",
                "Forget and reconnect to the network",
            ],
            Self::StartupFailure => &[
                "Perform a hard reset",
                "Check power connections",
                "Try booting in safe mode",
            ],
            Self::ScreenProblems => &[
                "Restart the device",
                "Check display connections",
                "Update display drivers",
            ],
            Self::StorageIssues => &[
                "Delete unnecessary files",
                "Clear app caches",
                "Check the disk for errors",
            ],
            Self::AudioProblems => &[
                "Check volume settings",
                "Ensure the correct output device is selected",
                "Update audio drivers",
            ],
            Self::AppCrashes => &[
                "Update the application",
                "Clear app cache and data",
                "Reinstall the application",
            ],
            Self::HardwareFailure => &[
                "Check all connections",
                "Run hardware diagnostics",
                "Consult a professional technician",
            ],
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_display_and_snake_case() {
        assert_eq!(Category::parse("Network Issues"), Some(Category::NetworkIssues));
        assert_eq!(Category::parse("network_issues"), Some(Category::NetworkIssues));
        assert_eq!(Category::parse("APP-CRASHES"), Some(Category::AppCrashes));
        assert_eq!(Category::parse("security"), None);
    }

    #[test]
    fn parse_collapses_separator_runs() {
        assert_eq!(Category::parse("Network  Issues"), Some(Category::NetworkIssues));
        assert_eq!(Category::parse(" slow - performance "), Some(Category::SlowPerformance));
        assert_eq!(Category::parse("app__crashes"), Some(Category::AppCrashes));
        assert_eq!(Category::parse("  "), None);
    }

    #[test]
    fn keys_round_trip_for_every_category() {
        for c in Category::ALL {
            assert_eq!(Category::parse(c.key()), Some(c));
            assert_eq!(Category::parse(c.name()), Some(c));
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Category::SlowPerformance).unwrap();
        assert_eq!(json, "\"slow_performance\"");
    }
}
