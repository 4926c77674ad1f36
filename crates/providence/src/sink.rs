//! Display sinks: where the player sends everything it produces.
//!
//! The player never renders anything itself. It hands the log buffer, the
//! active profile, gauge values, camera frames and toasts to a
//! [`DisplaySink`].

use std::collections::HashMap;
use std::io::Write;

use serde_json::json;

use crate::error::Result;
use crate::feed::FeedFrame;
use crate::log_buffer::{LogEntry, Severity};
use crate::profile::ProfileRecord;
use crate::script::CameraSpec;
use crate::template::format_score;

/// Presentation collaborator for a playback run.
pub trait DisplaySink: Send {
    /// Called once per tick with the full buffer, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot write its output.
    fn render_log(&mut self, entries: &[LogEntry]) -> Result<()>;

    /// Called whenever the active profile changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot write its output.
    fn render_profile(&mut self, profile: Option<&ProfileRecord>) -> Result<()>;

    /// Called for each derived display value.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot write its output.
    fn render_metric(&mut self, name: &str, value: f64) -> Result<()>;

    /// Called once per camera per tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot write its output.
    fn render_feed(&mut self, camera: &CameraSpec, frame: &FeedFrame) -> Result<()>;

    /// Transient notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot write its output.
    fn notify(&mut self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Terminal output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalFormat {
    /// Human-readable, only what changed.
    #[default]
    Plain,
    /// One JSON object per sink call.
    Json,
}

/// Writes the dashboard to a terminal or any other writer.
pub struct TerminalSink {
    out: Box<dyn Write + Send>,
    format: TerminalFormat,
    last_printed_tick: Option<u32>,
    last_metrics: HashMap<String, f64>,
    last_feed_kinds: HashMap<String, &'static str>,
}

impl std::fmt::Debug for TerminalSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSink")
            .field("format", &self.format)
            .field("last_printed_tick", &self.last_printed_tick)
            .finish_non_exhaustive()
    }
}

impl TerminalSink {
    /// Create a sink writing to `out`.
    #[must_use]
    pub fn new(out: Box<dyn Write + Send>, format: TerminalFormat) -> Self {
        Self {
            out,
            format,
            last_printed_tick: None,
            last_metrics: HashMap::new(),
            last_feed_kinds: HashMap::new(),
        }
    }

    /// Create a sink writing to stdout.
    #[must_use]
    pub fn stdout(format: TerminalFormat) -> Self {
        Self::new(Box::new(std::io::stdout()), format)
    }

    fn emit_json(&mut self, value: &serde_json::Value) -> Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => " ",
        Severity::Warning => "!",
        Severity::Critical => "#",
    }
}

impl DisplaySink for TerminalSink {
    fn render_log(&mut self, entries: &[LogEntry]) -> Result<()> {
        if self.format == TerminalFormat::Json {
            return self.emit_json(&json!({ "type": "log", "entries": entries }));
        }

        // The buffer is re-sent every tick; print only what is new.
        let fresh: Vec<&LogEntry> = entries
            .iter()
            .filter(|e| self.last_printed_tick.map_or(true, |t| e.tick > t))
            .collect();
        for entry in &fresh {
            writeln!(self.out, "{} {entry}", severity_marker(entry.severity))?;
        }
        if let Some(last) = fresh.last() {
            self.last_printed_tick = Some(last.tick);
        }
        self.out.flush()?;
        Ok(())
    }

    fn render_profile(&mut self, profile: Option<&ProfileRecord>) -> Result<()> {
        if self.format == TerminalFormat::Json {
            return self.emit_json(&json!({ "type": "profile", "profile": profile }));
        }

        match profile {
            Some(p) => {
                writeln!(self.out, "  +-- TARGET PROFILE ----------------")?;
                writeln!(self.out, "  | {} ({})", p.name, p.id)?;
                writeln!(self.out, "  | Dept: {}", p.department)?;
                for score in &p.scores {
                    writeln!(self.out, "  | {}: {}", score.name, format_score(score.value))?;
                }
                writeln!(self.out, "  | Risk: {} | Status: {}", p.risk, p.status)?;
                writeln!(self.out, "  +----------------------------------")?;
            }
            None => writeln!(self.out, "  (no active target)")?,
        }
        Ok(())
    }

    fn render_metric(&mut self, name: &str, value: f64) -> Result<()> {
        if self.format == TerminalFormat::Json {
            return self.emit_json(&json!({ "type": "metric", "name": name, "value": value }));
        }

        let changed = self
            .last_metrics
            .insert(name.to_string(), value)
            .map_or(true, |previous| (previous - value).abs() > f64::EPSILON);
        if changed {
            writeln!(self.out, "    ~ {name} = {}", format_score(value))?;
        }
        Ok(())
    }

    fn render_feed(&mut self, camera: &CameraSpec, frame: &FeedFrame) -> Result<()> {
        if self.format == TerminalFormat::Json {
            return self.emit_json(&json!({
                "type": "feed",
                "camera": camera.id,
                "kind": frame.kind(),
                "caption": frame.caption(),
                "dimensions": frame.dimensions(),
            }));
        }

        let previous = self.last_feed_kinds.insert(camera.id.clone(), frame.kind());
        if previous != Some(frame.kind()) {
            writeln!(
                self.out,
                "  [{} {}] {}: {}",
                camera.id,
                camera.label,
                frame.kind(),
                frame.caption()
            )?;
        }
        Ok(())
    }

    fn notify(&mut self, message: &str) -> Result<()> {
        if self.format == TerminalFormat::Json {
            return self.emit_json(&json!({ "type": "toast", "message": message }));
        }
        writeln!(self.out, "  >>> {message} <<<")?;
        Ok(())
    }
}

/// Summary of one rendered camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRender {
    /// Camera id.
    pub camera: String,
    /// Frame kind.
    pub kind: &'static str,
    /// Caption.
    pub caption: String,
}

/// Sink that records every call. Useful for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Every buffer handed to `render_log`, in call order.
    pub logs: Vec<Vec<LogEntry>>,
    /// Every profile handed to `render_profile`.
    pub profiles: Vec<Option<ProfileRecord>>,
    /// Every metric update.
    pub metrics: Vec<(String, f64)>,
    /// Every camera frame.
    pub feeds: Vec<FeedRender>,
    /// Every toast.
    pub notifications: Vec<String>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last buffer rendered.
    #[must_use]
    pub fn last_log(&self) -> Option<&[LogEntry]> {
        self.logs.last().map(Vec::as_slice)
    }

    /// All values recorded for one metric.
    #[must_use]
    pub fn metric_values(&self, name: &str) -> Vec<f64> {
        self.metrics
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .collect()
    }

    /// All frames recorded for one camera.
    #[must_use]
    pub fn feeds_for(&self, camera: &str) -> Vec<&FeedRender> {
        self.feeds.iter().filter(|f| f.camera == camera).collect()
    }
}

impl DisplaySink for MemorySink {
    fn render_log(&mut self, entries: &[LogEntry]) -> Result<()> {
        self.logs.push(entries.to_vec());
        Ok(())
    }

    fn render_profile(&mut self, profile: Option<&ProfileRecord>) -> Result<()> {
        self.profiles.push(profile.cloned());
        Ok(())
    }

    fn render_metric(&mut self, name: &str, value: f64) -> Result<()> {
        self.metrics.push((name.to_string(), value));
        Ok(())
    }

    fn render_feed(&mut self, camera: &CameraSpec, frame: &FeedFrame) -> Result<()> {
        self.feeds.push(FeedRender {
            camera: camera.id.clone(),
            kind: frame.kind(),
            caption: frame.caption().to_string(),
        });
        Ok(())
    }

    fn notify(&mut self, message: &str) -> Result<()> {
        self.notifications.push(message.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileStore;
    use chrono::NaiveTime;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn entry(tick: u32, text: &str) -> LogEntry {
        LogEntry::new(
            tick,
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            text,
            Severity::Info,
        )
    }

    fn camera() -> CameraSpec {
        CameraSpec::new("CAM-01", "MAIN GATE [ENTRY]", "SCANNING SECTOR A...")
    }

    #[test]
    fn test_plain_log_prints_only_new_entries() {
        let buf = SharedBuf::default();
        let mut sink = TerminalSink::new(Box::new(buf.clone()), TerminalFormat::Plain);

        sink.render_log(&[entry(0, "first")]).unwrap();
        sink.render_log(&[entry(0, "first")]).unwrap();
        sink.render_log(&[entry(0, "first"), entry(1, "second")]).unwrap();

        let text = buf.text();
        assert_eq!(text.matches("first").count(), 1);
        assert_eq!(text.matches("second").count(), 1);
        assert!(text.contains("[10:00:00] first"));
    }

    #[test]
    fn test_plain_profile_card() {
        let buf = SharedBuf::default();
        let mut sink = TerminalSink::new(Box::new(buf.clone()), TerminalFormat::Plain);
        let store = ProfileStore::demo();

        sink.render_profile(Some(store.lookup("12412824").unwrap()))
            .unwrap();
        let text = buf.text();
        assert!(text.contains("Rohan Sonwane (12412824)"));
        assert!(text.contains("attendance: 85"));
        assert!(text.contains("Risk: LOW"));
    }

    #[test]
    fn test_plain_metric_only_on_change() {
        let buf = SharedBuf::default();
        let mut sink = TerminalSink::new(Box::new(buf.clone()), TerminalFormat::Plain);
        sink.render_metric("gauge", 85.0).unwrap();
        sink.render_metric("gauge", 85.0).unwrap();
        sink.render_metric("gauge", 86.0).unwrap();
        let text = buf.text();
        assert_eq!(text.matches("gauge = ").count(), 2);
    }

    #[test]
    fn test_plain_feed_only_on_kind_change() {
        let buf = SharedBuf::default();
        let mut sink = TerminalSink::new(Box::new(buf.clone()), TerminalFormat::Plain);
        let buffering = FeedFrame::Buffering {
            caption: "wait".to_string(),
        };
        sink.render_feed(&camera(), &buffering).unwrap();
        sink.render_feed(&camera(), &buffering).unwrap();
        assert_eq!(buf.text().matches("CAM-01").count(), 1);
    }

    #[test]
    fn test_json_lines() {
        let buf = SharedBuf::default();
        let mut sink = TerminalSink::new(Box::new(buf.clone()), TerminalFormat::Json);
        sink.render_log(&[entry(0, "first")]).unwrap();
        sink.render_metric("gauge", 84.0).unwrap();
        sink.notify("IDENTIFIED: Rohan Sonwane").unwrap();

        let text = buf.text();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "log");
        assert_eq!(lines[0]["entries"][0]["text"], "first");
        assert_eq!(lines[1]["value"], 84.0);
        assert_eq!(lines[2]["message"], "IDENTIFIED: Rohan Sonwane");
    }

    #[test]
    fn test_memory_sink_records() {
        let mut sink = MemorySink::new();
        sink.render_log(&[entry(0, "a")]).unwrap();
        sink.render_metric("g", 1.0).unwrap();
        sink.render_metric("h", 2.0).unwrap();
        sink.render_profile(None).unwrap();
        sink.render_feed(
            &camera(),
            &FeedFrame::Buffering {
                caption: "x".to_string(),
            },
        )
        .unwrap();
        sink.notify("hi").unwrap();

        assert_eq!(sink.last_log().unwrap().len(), 1);
        assert_eq!(sink.metric_values("g"), vec![1.0]);
        assert_eq!(sink.profiles, vec![None]);
        assert_eq!(sink.feeds_for("CAM-01")[0].kind, "buffering");
        assert_eq!(sink.notifications, vec!["hi".to_string()]);
    }
}
