//! The scripted narrative: which tick emits which log line, which profile it
//! highlights, which camera swaps to a placeholder image and which gauge the
//! player keeps jittering.
//!
//! Scripts are sparse. Ticks without an event fall back to the heartbeat and
//! then to the idle filler line.

use std::collections::BTreeMap;
use std::path::Path;

use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::jitter::JitterSpec;
use crate::log_buffer::Severity;
use crate::profile::{ProfileRecord, ProfileStore};
use crate::template;

/// How a scripted entry picks its severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityRule {
    /// Always info.
    #[default]
    Info,
    /// Always warning.
    Warning,
    /// Always critical.
    Critical,
    /// Derived from the referenced profile's risk label.
    FromRisk,
}

impl SeverityRule {
    /// Resolve to a concrete severity.
    #[must_use]
    pub fn resolve(self, profile: Option<&ProfileRecord>) -> Severity {
        match self {
            Self::Info => Severity::Info,
            Self::Warning => Severity::Warning,
            Self::Critical => Severity::Critical,
            Self::FromRisk => profile.map_or(Severity::Info, |p| Severity::for_risk(p.risk)),
        }
    }
}

/// An action pinned to one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEvent {
    /// Tick the event fires on.
    pub tick: u32,
    /// Log message template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Severity of the log entry.
    #[serde(default)]
    pub severity: SeverityRule,
    /// Profile id looked up for this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Make the looked-up profile the active one.
    #[serde(default)]
    pub activate: bool,
    /// Toast notification template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toast: Option<String>,
}

impl ScriptEvent {
    /// An event that only logs a message.
    #[must_use]
    pub fn log(tick: u32, message: impl Into<String>) -> Self {
        Self {
            tick,
            message: Some(message.into()),
            severity: SeverityRule::Info,
            profile: None,
            activate: false,
            toast: None,
        }
    }

    /// Set the severity rule.
    #[must_use]
    pub fn with_severity(mut self, severity: SeverityRule) -> Self {
        self.severity = severity;
        self
    }

    /// Reference a profile, optionally making it active.
    #[must_use]
    pub fn with_profile(mut self, id: impl Into<String>, activate: bool) -> Self {
        self.profile = Some(id.into());
        self.activate = activate;
        self
    }

    /// Attach a toast notification.
    #[must_use]
    pub fn with_toast(mut self, toast: impl Into<String>) -> Self {
        self.toast = Some(toast.into());
        self
    }
}

/// Low-frequency filler emitted when no event applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Emit on ticks divisible by this.
    pub interval: u32,
    /// Message template.
    pub message: String,
}

/// A display camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSpec {
    /// Short id such as `CAM-01`.
    pub id: String,
    /// Panel title.
    pub label: String,
    /// Caption shown under noise frames.
    pub caption: String,
}

impl CameraSpec {
    /// Create a camera.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            caption: caption.into(),
        }
    }
}

/// A tick range during which one camera shows a placeholder image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealWindow {
    /// Camera id.
    pub camera: String,
    /// First tick, inclusive.
    pub start: u32,
    /// Last tick, exclusive.
    pub end: u32,
    /// Asset key passed to the fetcher.
    pub asset: String,
    /// Caption template shown under the image.
    pub caption: String,
    /// Profile the caption refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl RevealWindow {
    /// Whether `tick` falls inside the window.
    #[must_use]
    pub fn contains(&self, tick: u32) -> bool {
        (self.start..self.end).contains(&tick)
    }
}

/// A jittered display value derived from a profile attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeSpec {
    /// Metric name handed to the sink.
    pub name: String,
    /// Profile the base value comes from.
    pub profile: String,
    /// Attribute providing the base value.
    pub attribute: String,
    /// Perturbation applied to the base.
    #[serde(default)]
    pub jitter: JitterSpec,
    /// Update on ticks divisible by this.
    #[serde(default = "default_gauge_every")]
    pub every: u32,
}

fn default_gauge_every() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct ScriptFile {
    #[serde(default)]
    events: Vec<ScriptEvent>,
    heartbeat: Option<Heartbeat>,
    idle_message: Option<String>,
    #[serde(default)]
    cameras: Vec<CameraSpec>,
    reveal: Option<RevealWindow>,
    gauge: Option<GaugeSpec>,
}

/// A sparse tick → action mapping plus the fallbacks and display wiring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Script {
    events: BTreeMap<u32, ScriptEvent>,
    heartbeat: Option<Heartbeat>,
    idle_message: Option<String>,
    cameras: Vec<CameraSpec>,
    reveal: Option<RevealWindow>,
    gauge: Option<GaugeSpec>,
}

impl Script {
    /// Build a script from events.
    ///
    /// # Errors
    ///
    /// Returns an error if two events share a tick.
    pub fn new(events: Vec<ScriptEvent>) -> Result<Self> {
        Ok(Self::from_events(index_by_tick(events)?))
    }

    fn from_events(events: BTreeMap<u32, ScriptEvent>) -> Self {
        Self {
            events,
            heartbeat: None,
            idle_message: None,
            cameras: Vec::new(),
            reveal: None,
            gauge: None,
        }
    }

    /// Set the heartbeat.
    #[must_use]
    pub fn with_heartbeat(mut self, interval: u32, message: impl Into<String>) -> Self {
        self.heartbeat = Some(Heartbeat {
            interval,
            message: message.into(),
        });
        self
    }

    /// Set the idle filler line.
    #[must_use]
    pub fn with_idle_message(mut self, message: impl Into<String>) -> Self {
        self.idle_message = Some(message.into());
        self
    }

    /// Add a camera.
    #[must_use]
    pub fn with_camera(mut self, camera: CameraSpec) -> Self {
        self.cameras.push(camera);
        self
    }

    /// Set the reveal window.
    #[must_use]
    pub fn with_reveal(mut self, reveal: RevealWindow) -> Self {
        self.reveal = Some(reveal);
        self
    }

    /// Set the gauge.
    #[must_use]
    pub fn with_gauge(mut self, gauge: GaugeSpec) -> Self {
        self.gauge = Some(gauge);
        self
    }

    /// Load a script from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed, or has duplicate ticks.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("script file not found: {}", path.display()),
            )));
        }

        let file: ScriptFile = Figment::from(Toml::file(path)).extract()?;
        let mut script = Self::new(file.events)?;
        script.heartbeat = file.heartbeat;
        script.idle_message = file.idle_message;
        script.cameras = file.cameras;
        script.reveal = file.reveal;
        script.gauge = file.gauge;
        Ok(script)
    }

    /// The built-in identification narrative.
    #[must_use]
    pub fn demo() -> Self {
        const TARGET: &str = "12412824";
        const SCAN: &str = "SCANNING... Sector Clear.";

        let events = vec![
            ScriptEvent::log(0, SCAN),
            ScriptEvent::log(30, "MOTION DETECTED AT GATE A. ANALYZING...")
                .with_severity(SeverityRule::Warning),
            ScriptEvent::log(45, "MATCH FOUND: {name} ({id})")
                .with_severity(SeverityRule::FromRisk)
                .with_profile(TARGET, true)
                .with_toast("IDENTIFIED: {name}"),
            ScriptEvent::log(46, "Retrieving Academic Record..."),
            ScriptEvent::log(48, "Attendance: {score:attendance}% | Risk: {risk}")
                .with_profile(TARGET, false),
        ];

        // Built-in ticks are distinct, so indexing cannot fail.
        Self::from_events(index_by_tick(events).unwrap_or_default())
            .with_heartbeat(10, SCAN)
            .with_idle_message("Syncing neural weights...")
            .with_camera(CameraSpec::new(
                "CAM-01",
                "MAIN GATE [ENTRY]",
                "SCANNING SECTOR A...",
            ))
            .with_camera(CameraSpec::new(
                "CAM-02",
                "CLASSROOM [INTEL]",
                "CLASSROOM SENSORS ACTIVE",
            ))
            .with_reveal(RevealWindow {
                camera: "CAM-01".to_string(),
                start: 45,
                end: 60,
                asset: "face".to_string(),
                caption: "ID: {id} | MATCH: 98.4%".to_string(),
                profile: Some(TARGET.to_string()),
            })
            .with_gauge(GaugeSpec {
                name: "truancy_probability".to_string(),
                profile: TARGET.to_string(),
                attribute: "attendance".to_string(),
                jitter: JitterSpec::Offset { range: 2 },
                every: 1,
            })
    }

    /// The event pinned to `tick`, if any.
    #[must_use]
    pub fn event_at(&self, tick: u32) -> Option<&ScriptEvent> {
        self.events.get(&tick)
    }

    /// All events in tick order.
    pub fn events(&self) -> impl Iterator<Item = &ScriptEvent> {
        self.events.values()
    }

    /// Number of scripted events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the script has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Heartbeat, if configured.
    #[must_use]
    pub fn heartbeat(&self) -> Option<&Heartbeat> {
        self.heartbeat.as_ref()
    }

    /// Heartbeat message for `tick`, if the heartbeat fires on it.
    #[must_use]
    pub fn heartbeat_at(&self, tick: u32) -> Option<&str> {
        self.heartbeat
            .as_ref()
            .filter(|hb| hb.interval > 0 && tick % hb.interval == 0)
            .map(|hb| hb.message.as_str())
    }

    /// Idle filler line, if configured.
    #[must_use]
    pub fn idle_message(&self) -> Option<&str> {
        self.idle_message.as_deref()
    }

    /// Cameras in display order.
    #[must_use]
    pub fn cameras(&self) -> &[CameraSpec] {
        &self.cameras
    }

    /// Reveal window, if configured.
    #[must_use]
    pub fn reveal(&self) -> Option<&RevealWindow> {
        self.reveal.as_ref()
    }

    /// Gauge, if configured.
    #[must_use]
    pub fn gauge(&self) -> Option<&GaugeSpec> {
        self.gauge.as_ref()
    }

    /// Every profile id the script refers to, deduplicated, in first-use order.
    #[must_use]
    pub fn referenced_profiles(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        let candidates = self
            .events
            .values()
            .filter_map(|e| e.profile.as_deref())
            .chain(self.reveal.iter().filter_map(|r| r.profile.as_deref()))
            .chain(self.gauge.iter().map(|g| g.profile.as_str()));
        for id in candidates {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Check the script is consistent with itself and with `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileNotFound`] for an unknown profile id,
    /// [`Error::Template`] for a bad template, and [`Error::ScriptValidation`]
    /// for any other inconsistency.
    pub fn validate(&self, store: &ProfileStore) -> Result<()> {
        for id in self.referenced_profiles() {
            store.lookup(id)?;
        }

        for event in self.events.values() {
            let record = lookup_optional(store, event.profile.as_deref())?;
            if let Some(message) = &event.message {
                template::check(message, record)?;
            }
            if let Some(toast) = &event.toast {
                template::check(toast, record)?;
            }
            if event.activate && record.is_none() {
                return Err(Error::script(format!(
                    "event at tick {} activates a profile but names none",
                    event.tick
                )));
            }
        }

        if let Some(heartbeat) = &self.heartbeat {
            if heartbeat.interval == 0 {
                return Err(Error::script("heartbeat interval must be greater than 0"));
            }
            template::check(&heartbeat.message, None)?;
        }

        if let Some(idle) = &self.idle_message {
            template::check(idle, None)?;
        }

        let mut camera_ids: Vec<&str> = Vec::with_capacity(self.cameras.len());
        for camera in &self.cameras {
            if camera_ids.contains(&camera.id.as_str()) {
                return Err(Error::script(format!("duplicate camera id {}", camera.id)));
            }
            camera_ids.push(&camera.id);
        }

        if let Some(reveal) = &self.reveal {
            if !camera_ids.contains(&reveal.camera.as_str()) {
                return Err(Error::script(format!(
                    "reveal window targets unknown camera {}",
                    reveal.camera
                )));
            }
            if reveal.start >= reveal.end {
                return Err(Error::script(format!(
                    "reveal window {}..{} is empty",
                    reveal.start, reveal.end
                )));
            }
            let record = lookup_optional(store, reveal.profile.as_deref())?;
            template::check(&reveal.caption, record)?;
        }

        if let Some(gauge) = &self.gauge {
            if gauge.every == 0 {
                return Err(Error::script("gauge update interval must be greater than 0"));
            }
            gauge.jitter.validate()?;
            let record = store.lookup(&gauge.profile)?;
            if record.score(&gauge.attribute).is_none() {
                return Err(Error::script(format!(
                    "gauge attribute '{}' missing on profile {}",
                    gauge.attribute, gauge.profile
                )));
            }
        }

        Ok(())
    }
}

fn lookup_optional<'a>(
    store: &'a ProfileStore,
    id: Option<&str>,
) -> Result<Option<&'a ProfileRecord>> {
    id.map(|id| store.lookup(id)).transpose()
}

fn index_by_tick(events: Vec<ScriptEvent>) -> Result<BTreeMap<u32, ScriptEvent>> {
    let mut map = BTreeMap::new();
    for event in events {
        let tick = event.tick;
        if map.insert(tick, event).is_some() {
            return Err(Error::script(format!("more than one event at tick {tick}")));
        }
    }
    Ok(map)
}

impl Default for Script {
    fn default() -> Self {
        Self::demo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::RiskLevel;
    use std::io::Write;

    #[test]
    fn test_demo_is_valid() {
        let script = Script::demo();
        assert!(script.validate(&ProfileStore::demo()).is_ok());
        assert_eq!(script.len(), 5);
        assert_eq!(script.cameras().len(), 2);
    }

    #[test]
    fn test_demo_events() {
        let script = Script::demo();
        assert_eq!(
            script.event_at(0).unwrap().message.as_deref(),
            Some("SCANNING... Sector Clear.")
        );
        let reveal = script.event_at(45).unwrap();
        assert_eq!(reveal.profile.as_deref(), Some("12412824"));
        assert!(reveal.activate);
        assert_eq!(reveal.severity, SeverityRule::FromRisk);
        assert!(script.event_at(31).is_none());
    }

    #[test]
    fn test_duplicate_ticks_rejected() {
        let err = Script::new(vec![ScriptEvent::log(5, "a"), ScriptEvent::log(5, "b")]).unwrap_err();
        assert!(err.to_string().contains("tick 5"));
    }

    #[test]
    fn test_heartbeat_at() {
        let script = Script::new(vec![]).unwrap().with_heartbeat(10, "beat");
        assert_eq!(script.heartbeat_at(0), Some("beat"));
        assert_eq!(script.heartbeat_at(20), Some("beat"));
        assert_eq!(script.heartbeat_at(21), None);
    }

    #[test]
    fn test_events_in_tick_order() {
        let script = Script::new(vec![
            ScriptEvent::log(9, "late"),
            ScriptEvent::log(2, "early"),
        ])
        .unwrap();
        let ticks: Vec<u32> = script.events().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![2, 9]);
    }

    #[test]
    fn test_referenced_profiles_deduplicated() {
        let script = Script::demo();
        assert_eq!(script.referenced_profiles(), vec!["12412824"]);
    }

    #[test]
    fn test_validate_unknown_profile() {
        let script = Script::new(vec![ScriptEvent::log(1, "{name}").with_profile("999", true)]).unwrap();
        let err = script.validate(&ProfileStore::demo()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_validate_profile_placeholder_without_profile() {
        let script = Script::new(vec![ScriptEvent::log(1, "hello {name}")]).unwrap();
        let err = script.validate(&ProfileStore::demo()).unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
    }

    #[test]
    fn test_validate_activate_without_profile() {
        let mut event = ScriptEvent::log(1, "x");
        event.activate = true;
        let script = Script::new(vec![event]).unwrap();
        assert!(script.validate(&ProfileStore::demo()).is_err());
    }

    #[test]
    fn test_validate_zero_heartbeat() {
        let script = Script::new(vec![]).unwrap().with_heartbeat(0, "beat");
        let err = script.validate(&ProfileStore::demo()).unwrap_err();
        assert!(err.to_string().contains("heartbeat"));
    }

    #[test]
    fn test_validate_reveal_unknown_camera() {
        let script = Script::new(vec![]).unwrap().with_reveal(RevealWindow {
            camera: "CAM-09".to_string(),
            start: 1,
            end: 2,
            asset: "face".to_string(),
            caption: "x".to_string(),
            profile: None,
        });
        let err = script.validate(&ProfileStore::demo()).unwrap_err();
        assert!(err.to_string().contains("CAM-09"));
    }

    #[test]
    fn test_validate_empty_reveal_window() {
        let script = Script::new(vec![])
            .unwrap()
            .with_camera(CameraSpec::new("CAM-01", "Gate", "idle"))
            .with_reveal(RevealWindow {
                camera: "CAM-01".to_string(),
                start: 5,
                end: 5,
                asset: "face".to_string(),
                caption: "x".to_string(),
                profile: None,
            });
        assert!(script.validate(&ProfileStore::demo()).is_err());
    }

    #[test]
    fn test_validate_gauge_missing_attribute() {
        let script = Script::new(vec![]).unwrap().with_gauge(GaugeSpec {
            name: "g".to_string(),
            profile: "102".to_string(),
            attribute: "attentiveness".to_string(),
            jitter: JitterSpec::default(),
            every: 1,
        });
        let err = script.validate(&ProfileStore::demo()).unwrap_err();
        assert!(err.to_string().contains("attentiveness"));
    }

    #[test]
    fn test_validate_event_score_missing_attribute() {
        let script = Script::new(vec![ScriptEvent::log(48, "Attentiveness: {score:attentiveness}%")
            .with_profile("12412824", false)])
        .unwrap();
        let err = script.validate(&ProfileStore::demo()).unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
        assert!(err.to_string().contains("attentiveness"));
    }

    #[test]
    fn test_validate_toast_and_caption_scores() {
        let store = ProfileStore::demo();
        let toast = Script::new(vec![ScriptEvent::log(1, "ok")
            .with_profile("103", false)
            .with_toast("{score:attentiveness}")])
        .unwrap();
        assert!(toast.validate(&store).is_err());

        let caption = Script::new(vec![])
            .unwrap()
            .with_camera(CameraSpec::new("CAM-01", "Gate", "idle"))
            .with_reveal(RevealWindow {
                camera: "CAM-01".to_string(),
                start: 1,
                end: 2,
                asset: "face".to_string(),
                caption: "{score:attentiveness}".to_string(),
                profile: Some("103".to_string()),
            });
        assert!(caption.validate(&store).is_err());
    }

    #[test]
    fn test_reveal_window_contains() {
        let reveal = Script::demo().reveal().cloned().unwrap();
        assert!(!reveal.contains(44));
        assert!(reveal.contains(45));
        assert!(reveal.contains(59));
        assert!(!reveal.contains(60));
    }

    #[test]
    fn test_severity_rule_resolve() {
        let store = ProfileStore::demo();
        let low = store.lookup("12412824").unwrap();
        let high = store.lookup("102").unwrap();
        assert_eq!(SeverityRule::FromRisk.resolve(Some(low)), Severity::Info);
        assert_eq!(SeverityRule::FromRisk.resolve(Some(high)), Severity::Critical);
        assert_eq!(SeverityRule::FromRisk.resolve(None), Severity::Info);
        assert_eq!(SeverityRule::Warning.resolve(Some(low)), Severity::Warning);
        assert_eq!(high.risk, RiskLevel::High);
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
idle_message = "idle"

[heartbeat]
interval = 5
message = "beat {{time}}"

[[events]]
tick = 3
message = "MATCH FOUND: {{name}}"
severity = "from_risk"
profile = "102"
activate = true

[[cameras]]
id = "CAM-01"
label = "Gate"
caption = "noise"

[gauge]
name = "risk"
profile = "102"
attribute = "attendance"
jitter = {{ mode = "offset", range = 3 }}
"#
        )
        .unwrap();

        let script = Script::load(file.path()).unwrap();
        assert_eq!(script.len(), 1);
        assert_eq!(script.heartbeat().unwrap().interval, 5);
        assert_eq!(script.idle_message(), Some("idle"));
        assert_eq!(script.event_at(3).unwrap().severity, SeverityRule::FromRisk);
        assert_eq!(script.gauge().unwrap().every, 1);
        assert_eq!(script.gauge().unwrap().jitter, JitterSpec::Offset { range: 3 });
        assert!(script.validate(&ProfileStore::demo()).is_ok());
    }

    #[test]
    fn test_load_duplicate_ticks() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[[events]]
tick = 1
message = "a"

[[events]]
tick = 1
message = "b"
"#
        )
        .unwrap();
        assert!(Script::load(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Script::load("/nonexistent/script.toml").is_err());
    }
}
