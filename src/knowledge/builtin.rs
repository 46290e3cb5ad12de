//! Built-in knowledge pack covering all ten categories for computers and
//! mobile devices.
//!
//! Device-specific rules condition on the `device` symptom. A few
//! intermediate facts (`thermal_load`, `memory_pressure`, `power_fault`,
//! `aging_disk`, `software_instability`) are derived first and feed the
//! category rules.

use serde_json::Value;

use crate::category::Category;
use crate::rules::Symptom;

use super::{ConclusionDef, ConditionDef, KnowledgePack, Operator, RuleDef};

const YES_NO: &[&str] = &["yes", "no"];
const YES_NO_UNSURE: &[&str] = &["yes", "no", "unsure"];

impl KnowledgePack {
    /// The pack shipped with fixwise.
    pub fn builtin() -> Self {
        Self {
            symptoms: symptoms(),
            rules: rules(),
        }
    }
}

fn symptoms() -> Vec<Symptom> {
    vec![
        ask("device", "Is this a computer or a mobile device?", &["computer", "mobile"]),
        // Overheating
        ask("device_hot", "Is the device hot to touch?", YES_NO),
        ask("fan_noise", "Is the fan making loud noise?", &["yes", "no", "sometimes"]),
        ask("high_cpu_usage", "Is CPU usage constantly high?", YES_NO_UNSURE),
        ask("poor_ventilation", "Is the device in an enclosed or dusty area?", YES_NO),
        mobile("hot_while_charging", "Does it get hot while charging?", YES_NO),
        mobile("hot_during_games", "Does it overheat during gaming?", YES_NO),
        // Slow performance
        ask("ram_percent", "Roughly how much memory is in use, in percent?", &[]),
        computer(
            "hdd_type",
            "What type of storage does the computer have?",
            &["mechanical", "ssd", "unsure"],
        ),
        computer(
            "startup_programs",
            "How many programs start with the system?",
            &["many", "few", "unsure"],
        ),
        ask("malware_detected", "Has any malware been detected recently?", YES_NO_UNSURE),
        ask("os_outdated", "Is the operating system outdated?", YES_NO_UNSURE),
        // Battery
        ask(
            "battery_drains_fast",
            "Is the battery draining faster than expected?",
            YES_NO,
        ),
        ask(
            "background_apps",
            "Are many apps running in the background?",
            &["many", "few", "unsure"],
        ),
        ask("battery_age_years", "How old is the battery, in years?", &[]),
        ask("not_charging", "Does the device refuse to charge?", YES_NO),
        ask("battery_swollen", "Is the battery visibly swollen?", YES_NO),
        // Network
        ask("wifi_drops", "Does the WiFi connection keep dropping?", YES_NO),
        ask("no_internet", "Is there no internet access at all?", YES_NO),
        ask("dns_error", "Are you getting DNS errors?", YES_NO_UNSURE),
        ask("vpn_connected", "Is a VPN connected?", YES_NO),
        ask("weak_wifi_signal", "Is the WiFi signal weak?", YES_NO),
        mobile("mobile_data_not_working", "Is mobile data not working?", YES_NO),
        // Startup
        ask("not_turning_on", "Does the device fail to turn on?", YES_NO),
        computer("power_led", "Is the power LED on?", &["on", "off", "blinking"]),
        ask("boot_loop", "Does the device restart repeatedly while booting?", YES_NO),
        mobile("stuck_on_logo", "Is the device stuck on the logo?", YES_NO),
        // Screen
        ask("flickering", "Is the screen flickering?", YES_NO),
        ask("dead_pixels", "Are there dead or stuck pixels?", YES_NO),
        mobile(
            "touch_not_responding",
            "Is the touch screen not responding?",
            &["yes", "no", "sometimes"],
        ),
        ask("recently_dropped", "Was the device dropped recently?", YES_NO),
        // Storage
        ask("storage_full", "Is storage almost full?", YES_NO_UNSURE),
        computer("drive_not_detected", "Is a drive not being detected?", YES_NO),
        ask("disk_read_errors", "Are there disk read or write errors?", YES_NO_UNSURE),
        // Audio
        ask("no_sound", "Is there no sound at all?", YES_NO),
        ask("crackling_audio", "Is the audio crackling or distorted?", YES_NO),
        ask(
            "headphones_not_detected",
            "Are headphones or speakers not detected?",
            YES_NO,
        ),
        computer("hdmi_output", "Is sound meant to play through HDMI?", YES_NO),
        // App crashes
        ask("app_crashing", "Is a specific app crashing?", YES_NO),
        ask("app_outdated", "Is the crashing app outdated?", YES_NO_UNSURE),
        ask("multiple_apps_crashing", "Are multiple apps crashing?", YES_NO),
        // Hardware
        computer("blue_screen", "Are you getting blue screen errors?", YES_NO),
        ask("random_shutdowns", "Does the device shut down randomly?", YES_NO),
        computer(
            "clicking_sounds",
            "Are there clicking sounds from the computer?",
            YES_NO,
        ),
        computer("usb_ports_dead", "Are USB ports not working?", YES_NO),
        mobile("buttons_not_working", "Are physical buttons not working?", YES_NO),
    ]
}

fn rules() -> Vec<RuleDef> {
    use Category::*;

    vec![
        // Intermediate facts
        derive(
            "THERMAL_LOAD",
            "thermal_load",
            vec![yes("high_cpu_usage"), yes("fan_noise")],
        ),
        derive(
            "MEMORY_PRESSURE",
            "memory_pressure",
            vec![cond("ram_percent", Operator::Ge, Value::from(85.0_f64))],
        ),
        derive(
            "POWER_FAULT",
            "power_fault",
            vec![yes("not_turning_on"), is("power_led", "off")],
        ),
        derive(
            "AGING_DISK",
            "aging_disk",
            vec![is("hdd_type", "mechanical"), yes("disk_read_errors")],
        ),
        derive(
            "SOFTWARE_INSTABILITY",
            "software_instability",
            vec![yes("multiple_apps_crashing"), yes("os_outdated")],
        ),
        // Overheating
        vote("HEAT_001", Overheating, 0.85, vec![yes("thermal_load"), yes("device_hot")])
            .explained("Device runs hot under sustained load ({conditions})")
            .cause(
                "Cooling cannot keep up with sustained CPU load",
                &[
                    "Check Task Manager for processes hogging the CPU",
                    "Clean the fans and heatsink",
                    "Use a cooling pad",
                ],
            ),
        vote("HEAT_002", Overheating, 0.8, vec![yes("poor_ventilation"), yes("device_hot")]).cause(
            "Blocked or dusty air vents",
            &["Move the device to an open, hard surface", "Clean the air vents"],
        ),
        vote("HEAT_003", Overheating, 0.6, vec![yes("battery_drains_fast"), yes("device_hot")])
            .cause(
                "A runaway background process is draining power and producing heat",
                &["Check battery usage per app", "Restart the device"],
            ),
        vote(
            "HEAT_004",
            Overheating,
            0.75,
            vec![is("device", "mobile"), yes("hot_while_charging")],
        )
        .cause(
            "Charging heat combined with use",
            &[
                "Avoid heavy use while charging",
                "Use the original charger",
                "Remove the case while charging",
            ],
        ),
        vote(
            "HEAT_005",
            Overheating,
            0.7,
            vec![is("device", "mobile"), yes("hot_during_games")],
        )
        .cause(
            "Sustained GPU load during games",
            &["Lower graphics settings", "Take breaks between sessions"],
        ),
        // Slow performance
        vote("SLOW_001", SlowPerformance, 0.8, vec![yes("memory_pressure")]).cause(
            "Not enough free memory",
            &["Close unused programs", "Add more RAM", "Disable heavy browser extensions"],
        ),
        vote(
            "SLOW_002",
            SlowPerformance,
            0.75,
            vec![
                is("device", "computer"),
                is("hdd_type", "mechanical"),
                is("startup_programs", "many"),
            ],
        )
        .cause(
            "Slow mechanical drive overloaded at startup",
            &["Disable startup programs", "Upgrade to an SSD"],
        ),
        vote("SLOW_003", SlowPerformance, 0.7, vec![yes("malware_detected")]).cause(
            "Malware consuming resources",
            &["Run a full antivirus scan", "Remove suspicious programs"],
        ),
        vote("SLOW_004", SlowPerformance, 0.5, vec![yes("thermal_load")]).cause(
            "Thermal throttling",
            &["Improve cooling", "Clean the fans"],
        ),
        // Battery
        vote(
            "BATT_001",
            BatteryIssues,
            0.8,
            vec![yes("battery_drains_fast"), is("background_apps", "many")],
        )
        .cause(
            "Background apps draining the battery",
            &["Restrict background activity", "Uninstall unused apps"],
        ),
        vote(
            "BATT_002",
            BatteryIssues,
            0.85,
            vec![
                yes("battery_drains_fast"),
                cond("battery_age_years", Operator::Ge, Value::from(3.0_f64)),
            ],
        )
        .cause(
            "Worn battery with reduced capacity",
            &["Check battery health", "Replace the battery"],
        ),
        vote("BATT_003", BatteryIssues, 0.75, vec![yes("not_charging")]).cause(
            "Faulty charger, cable or charging port",
            &["Try another charger and cable", "Clean the charging port"],
        ),
        vote("BATT_004", BatteryIssues, 0.95, vec![yes("battery_swollen")])
            .priority(5)
            .cause(
                "Swollen battery",
                &["Stop using the device", "Have the battery replaced by a professional"],
            ),
        // Network
        vote("NET_001", NetworkIssues, 0.7, vec![yes("wifi_drops")]).cause(
            "Unstable WiFi connection",
            &["Restart the router", "Forget and rejoin the network", "Update network drivers"],
        ),
        vote("NET_002", NetworkIssues, 0.85, vec![yes("dns_error"), yes("no_internet")]).cause(
            "DNS resolution failure",
            &["Flush the DNS cache", "Switch to a public DNS server"],
        ),
        vote("NET_003", NetworkIssues, 0.8, vec![yes("vpn_connected"), yes("no_internet")])
            .cause(
                "VPN connection issue",
                &["Disconnect the VPN", "Check the VPN server status"],
            ),
        vote("NET_004", NetworkIssues, 0.75, vec![yes("weak_wifi_signal")]).cause(
            "Distance from the router or interference",
            &["Move closer to the router", "Install a WiFi extender"],
        ),
        vote(
            "NET_005",
            NetworkIssues,
            0.75,
            vec![is("device", "mobile"), yes("mobile_data_not_working")],
        )
        .cause(
            "Mobile data disabled or misconfigured",
            &["Check that mobile data is on", "Reset network settings"],
        ),
        // Startup
        vote("START_001", StartupFailure, 0.85, vec![yes("power_fault")]).cause(
            "No power reaching the device",
            &["Check the power cable and outlet", "Test with another charger"],
        ),
        vote("START_002", StartupFailure, 0.8, vec![yes("boot_loop")]).cause(
            "Corrupted system update or boot files",
            &["Boot into safe or recovery mode", "Run startup repair"],
        ),
        vote(
            "START_003",
            StartupFailure,
            0.8,
            vec![is("device", "mobile"), yes("stuck_on_logo")],
        )
        .cause(
            "Failed system update",
            &["Force restart the device", "Boot into recovery mode and clear the cache"],
        ),
        // Screen
        vote("SCREEN_001", ScreenProblems, 0.75, vec![yes("flickering")]).cause(
            "Display driver or refresh rate problem",
            &["Update the graphics driver", "Check the display cable"],
        ),
        vote("SCREEN_002", ScreenProblems, 0.85, vec![yes("dead_pixels")]).cause(
            "Dead or stuck pixels",
            &["Run a pixel fixer tool", "Contact the manufacturer about a replacement"],
        ),
        vote(
            "SCREEN_003",
            ScreenProblems,
            0.75,
            vec![
                is("device", "mobile"),
                cond(
                    "touch_not_responding",
                    Operator::In,
                    Value::from(vec!["yes", "sometimes"]),
                ),
            ],
        )
        .cause(
            "Unresponsive touch digitizer",
            &["Remove the screen protector", "Restart the device"],
        ),
        // Storage
        vote("STOR_001", StorageIssues, 0.85, vec![yes("storage_full")]).cause(
            "Storage almost full",
            &["Delete unused files and apps", "Move media to cloud or external storage"],
        ),
        vote(
            "STOR_002",
            StorageIssues,
            0.8,
            vec![is("device", "computer"), yes("drive_not_detected")],
        )
        .cause(
            "Drive connection or controller fault",
            &["Reseat the drive cables", "Check the drive in the firmware settings"],
        ),
        vote("STOR_003", StorageIssues, 0.85, vec![yes("aging_disk")]).cause(
            "Failing mechanical drive",
            &["Back up your data now", "Replace the drive with an SSD"],
        ),
        // Audio
        vote("AUDIO_001", AudioProblems, 0.7, vec![yes("no_sound")]).cause(
            "Muted output or wrong playback device",
            &["Check the volume and mute settings", "Select the correct playback device"],
        ),
        vote("AUDIO_002", AudioProblems, 0.75, vec![yes("crackling_audio")]).cause(
            "Damaged speaker or driver problem",
            &["Lower the volume", "Update the audio driver"],
        ),
        vote("AUDIO_003", AudioProblems, 0.75, vec![yes("headphones_not_detected")]).cause(
            "Dirty or faulty audio jack",
            &["Clean the audio jack", "Test with another headset"],
        ),
        vote(
            "AUDIO_004",
            AudioProblems,
            0.9,
            vec![is("device", "computer"), yes("no_sound"), yes("hdmi_output")],
        )
        .priority(1)
        .cause(
            "Wrong audio output device (HDMI)",
            &["Select HDMI as the playback device", "Update the graphics driver"],
        ),
        // App crashes
        vote(
            "APP_001",
            AppCrashes,
            0.85,
            vec![yes("app_crashing"), yes("app_outdated")],
        )
        .cause(
            "Outdated app incompatible with the system",
            &["Update the app", "Clear the app cache", "Reinstall the app"],
        ),
        vote("APP_002", AppCrashes, 0.8, vec![yes("software_instability")]).cause(
            "Outdated operating system destabilizing apps",
            &["Install system updates", "Restart the device"],
        ),
        vote("APP_003", AppCrashes, 0.65, vec![yes("multiple_apps_crashing")]).cause(
            "System-wide instability",
            &["Free up memory and storage", "Check for corrupted system files"],
        ),
        // Hardware
        vote(
            "HW_001",
            HardwareFailure,
            0.75,
            vec![is("device", "computer"), yes("blue_screen")],
        )
        .cause(
            "Faulty RAM or driver crash",
            &["Run a memory diagnostic", "Update or roll back recent drivers"],
        ),
        vote("HW_002", HardwareFailure, 0.65, vec![yes("random_shutdowns")]).cause(
            "Failing power supply or battery",
            &["Test with another power supply", "Check the battery health"],
        ),
        vote("HW_003", HardwareFailure, 0.7, vec![yes("usb_ports_dead")]).cause(
            "Damaged ports or USB controller",
            &["Reinstall the USB controller drivers", "Have the ports inspected"],
        ),
        vote(
            "HW_004",
            HardwareFailure,
            0.9,
            vec![yes("aging_disk"), yes("clicking_sounds")],
        )
        .priority(2)
        .cause(
            "Mechanical hard drive failure",
            &["Back up your data immediately", "Replace the hard drive"],
        ),
        vote(
            "HW_005",
            HardwareFailure,
            0.8,
            vec![is("device", "mobile"), yes("buttons_not_working")],
        )
        .cause(
            "Worn or stuck physical buttons",
            &["Clean around the buttons", "Have the buttons repaired"],
        ),
        vote(
            "HW_006",
            HardwareFailure,
            0.7,
            vec![yes("recently_dropped"), yes("dead_pixels")],
        )
        .cause(
            "Impact damage to the display",
            &["Have the display inspected", "Replace the screen"],
        ),
    ]
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn ask(id: &str, question: &str, options: &[&str]) -> Symptom {
    Symptom::new(id, question, options)
}

fn computer(id: &str, question: &str, options: &[&str]) -> Symptom {
    Symptom {
        device: Some("computer".into()),
        ..ask(id, question, options)
    }
}

fn mobile(id: &str, question: &str, options: &[&str]) -> Symptom {
    Symptom {
        device: Some("mobile".into()),
        ..ask(id, question, options)
    }
}

fn cond(fact: &str, operator: Operator, value: Value) -> ConditionDef {
    ConditionDef {
        fact: fact.into(),
        operator,
        value,
    }
}

fn yes(fact: &str) -> ConditionDef {
    cond(fact, Operator::Eq, Value::Bool(true))
}

fn is(fact: &str, text: &str) -> ConditionDef {
    cond(fact, Operator::Eq, Value::from(text))
}

fn derive(id: &str, target: &str, conditions: Vec<ConditionDef>) -> RuleDef {
    RuleDef {
        id: id.into(),
        conditions,
        conclusion: ConclusionDef::Fact {
            target: target.into(),
            value: true.into(),
        },
        confidence: 1.0,
        priority: 0,
        explanation: None,
        cause: None,
        solutions: Vec::new(),
    }
}

fn vote(id: &str, category: Category, confidence: f64, conditions: Vec<ConditionDef>) -> RuleDef {
    RuleDef {
        id: id.into(),
        conditions,
        conclusion: ConclusionDef::Category {
            category: category.key().into(),
        },
        confidence,
        priority: 0,
        explanation: None,
        cause: None,
        solutions: Vec::new(),
    }
}

impl RuleDef {
    fn cause(mut self, cause: &str, solutions: &[&str]) -> Self {
        self.cause = Some(cause.into());
        self.solutions = solutions.iter().map(|s| s.to_string()).collect();
        self
    }

    fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn explained(mut self, template: &str) -> Self {
        self.explanation = Some(template.into());
        self
    }
}
