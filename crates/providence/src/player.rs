//! The scripted timeline player.
//!
//! A run walks ticks `0..tick_count` in order. Each tick emits at most one
//! log entry (scripted event, else heartbeat, else idle filler), refreshes the
//! gauge and camera frames, hands the whole log buffer to the sink and then
//! waits on the tick source. Cancellation is cooperative and checked once at
//! the top of every tick, so the buffer is never left half-updated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::feed::{fetch_placeholder, AssetFetcher, FeedFrame, NoiseSpec, UnavailableAssetFetcher};
use crate::log_buffer::{LogBuffer, LogEntry, Severity, DEFAULT_CAPACITY};
use crate::profile::ProfileStore;
use crate::script::Script;
use crate::sink::DisplaySink;
use crate::template::{self, TemplateContext};
use crate::tick::{Clock, TickSource};

/// Constructor parameters for a [`TimelinePlayer`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    /// Number of ticks per run.
    pub tick_count: u32,
    /// Delay between ticks.
    pub tick_delay: Duration,
    /// Log buffer capacity.
    pub log_capacity: usize,
    /// RNG seed. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Noise frame shape.
    pub noise: NoiseSpec,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_count: 100,
            tick_delay: Duration::from_millis(100),
            log_capacity: DEFAULT_CAPACITY,
            seed: None,
            noise: NoiseSpec::default(),
        }
    }
}

/// Whether a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// No run in progress.
    Idle,
    /// Inside the tick loop.
    Playing,
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Playing => write!(f, "playing"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackOutcome {
    /// Every tick was processed.
    Completed,
    /// Stopped early through the handle.
    Cancelled,
}

/// Result of a run, returned exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackReport {
    /// Ticks fully processed.
    pub ticks_processed: u32,
    /// How the run ended.
    pub outcome: PlaybackOutcome,
    /// Log entries pushed during the run, including evicted ones.
    pub entries_emitted: u32,
    /// Buffer contents at the end of the run, oldest first.
    pub final_log: Vec<LogEntry>,
    /// Id of the active profile at the end of the run.
    pub active_profile: Option<String>,
}

impl PlaybackReport {
    /// Whether every tick was processed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcome == PlaybackOutcome::Completed
    }
}

/// Cloneable control handle for a player.
#[derive(Debug, Clone, Default)]
pub struct PlaybackHandle {
    cancel_signal: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
}

impl PlaybackHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the current run to stop before its next tick.
    pub fn cancel(&self) {
        self.cancel_signal.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_signal.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation so the player can run again.
    pub fn reset(&self) {
        self.cancel_signal.store(false, Ordering::SeqCst);
    }

    /// Current player state.
    #[must_use]
    pub fn state(&self) -> PlayerState {
        if self.playing.load(Ordering::SeqCst) {
            PlayerState::Playing
        } else {
            PlayerState::Idle
        }
    }
}

/// Flips the handle back to idle however the run exits.
struct PlayingGuard<'a>(&'a AtomicBool);

impl<'a> PlayingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Result<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(Error::internal("player is already playing"));
        }
        Ok(Self(flag))
    }
}

impl Drop for PlayingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Plays a [`Script`] against a [`ProfileStore`].
#[derive(Debug)]
pub struct TimelinePlayer {
    store: Arc<ProfileStore>,
    script: Script,
    settings: PlaybackSettings,
    fetcher: Arc<dyn AssetFetcher>,
    rng: StdRng,
    handle: PlaybackHandle,
}

impl TimelinePlayer {
    /// Create a player.
    ///
    /// # Errors
    ///
    /// Returns an error if the log capacity is zero or the script does not
    /// validate against the store.
    pub fn new(store: Arc<ProfileStore>, script: Script, settings: PlaybackSettings) -> Result<Self> {
        if settings.log_capacity == 0 {
            return Err(Error::config("log_capacity must be greater than 0"));
        }
        script.validate(&store)?;

        let rng = settings
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        Ok(Self {
            store,
            script,
            settings,
            fetcher: Arc::new(UnavailableAssetFetcher),
            rng,
            handle: PlaybackHandle::new(),
        })
    }

    /// Use `fetcher` for reveal-window placeholders.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// A handle for cancelling runs and observing state.
    #[must_use]
    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PlayerState {
        self.handle.state()
    }

    /// The script being played.
    #[must_use]
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// The player settings.
    #[must_use]
    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Play the script once.
    ///
    /// Log buffer and active profile start fresh on every call. A cancelled
    /// handle must be [`reset`](PlaybackHandle::reset) before the next run,
    /// otherwise the run stops before its first tick.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileNotFound`] if a scripted lookup misses, a
    /// template error if a message cannot be rendered, or any error raised by
    /// the sink. Placeholder fetch failures never surface here.
    pub async fn run<S, T, C>(
        &mut self,
        sink: &mut S,
        ticker: &mut T,
        clock: &C,
    ) -> Result<PlaybackReport>
    where
        S: DisplaySink + ?Sized,
        T: TickSource + ?Sized,
        C: Clock + ?Sized,
    {
        let playing = Arc::clone(&self.handle.playing);
        let _guard = PlayingGuard::enter(&playing)?;

        let tick_count = self.settings.tick_count;
        let delay = self.settings.tick_delay;
        info!(
            ticks = tick_count,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            capacity = self.settings.log_capacity,
            "Playback started"
        );

        let mut buffer = LogBuffer::new(self.settings.log_capacity);
        let mut active: Option<String> = None;
        let mut reveal_frame: Option<FeedFrame> = None;
        let mut entries_emitted = 0u32;
        let mut ticks_processed = 0u32;
        let mut outcome = PlaybackOutcome::Completed;

        for tick in 0..tick_count {
            if self.handle.is_cancelled() {
                warn!(tick, "Playback cancelled");
                outcome = PlaybackOutcome::Cancelled;
                break;
            }

            let now = clock.now();

            if let Some(entry) = self.log_action(tick, now, &mut active, sink)? {
                debug!(tick, severity = %entry.severity, text = %entry.text, "Log entry");
                buffer.push(entry);
                entries_emitted += 1;
            }

            self.update_gauge(tick, sink)?;
            self.update_feeds(tick, now, &mut reveal_frame, sink).await?;

            sink.render_log(&buffer.entries())?;
            ticks_processed += 1;

            ticker.wait(tick, delay).await;
        }

        info!(
            ticks = ticks_processed,
            entries = entries_emitted,
            outcome = ?outcome,
            "Playback finished"
        );

        Ok(PlaybackReport {
            ticks_processed,
            outcome,
            entries_emitted,
            final_log: buffer.entries(),
            active_profile: active,
        })
    }

    /// Pick this tick's log entry. Scripted events win over the heartbeat,
    /// the heartbeat wins over the idle line.
    fn log_action<S: DisplaySink + ?Sized>(
        &self,
        tick: u32,
        now: NaiveTime,
        active: &mut Option<String>,
        sink: &mut S,
    ) -> Result<Option<LogEntry>> {
        if let Some(event) = self.script.event_at(tick) {
            let profile = event
                .profile
                .as_deref()
                .map(|id| self.store.lookup(id))
                .transpose()?;
            let ctx = TemplateContext { time: now, profile };

            // Render everything before the sink sees any part of the event.
            let toast = event
                .toast
                .as_deref()
                .map(|toast| template::render(toast, &ctx))
                .transpose()?;
            let entry = event
                .message
                .as_deref()
                .map(|message| -> Result<LogEntry> {
                    let text = template::render(message, &ctx)?;
                    Ok(LogEntry::new(tick, now, text, event.severity.resolve(profile)))
                })
                .transpose()?;

            if event.activate {
                if let Some(record) = profile {
                    if active.as_deref() != Some(record.id.as_str()) {
                        *active = Some(record.id.clone());
                        sink.render_profile(Some(record))?;
                    }
                }
            }

            if let Some(toast) = toast {
                sink.notify(&toast)?;
            }

            return Ok(entry);
        }

        let ctx = TemplateContext {
            time: now,
            profile: None,
        };
        let fallback = self
            .script
            .heartbeat_at(tick)
            .or_else(|| self.script.idle_message());
        fallback
            .map(|message| -> Result<LogEntry> {
                let text = template::render(message, &ctx)?;
                Ok(LogEntry::new(tick, now, text, Severity::Info))
            })
            .transpose()
    }

    fn update_gauge<S: DisplaySink + ?Sized>(&mut self, tick: u32, sink: &mut S) -> Result<()> {
        let Some(gauge) = self.script.gauge() else {
            return Ok(());
        };
        if tick % gauge.every != 0 {
            return Ok(());
        }

        let base = self
            .store
            .lookup(&gauge.profile)?
            .score(&gauge.attribute)
            .ok_or_else(|| {
                Error::script(format!(
                    "gauge attribute '{}' missing on profile {}",
                    gauge.attribute, gauge.profile
                ))
            })?;
        let value = gauge.jitter.apply(base, &mut self.rng);
        sink.render_metric(&gauge.name, value)
    }

    async fn update_feeds<S: DisplaySink + ?Sized>(
        &mut self,
        tick: u32,
        now: NaiveTime,
        reveal_frame: &mut Option<FeedFrame>,
        sink: &mut S,
    ) -> Result<()> {
        let reveal = self.script.reveal().filter(|r| r.contains(tick));
        if reveal.is_none() {
            *reveal_frame = None;
        }

        for camera in self.script.cameras() {
            let frame = match reveal {
                Some(window) if window.camera == camera.id => {
                    // A loaded image is kept for the window; buffering retries.
                    if !matches!(reveal_frame, Some(FeedFrame::Asset { .. })) {
                        let profile = window
                            .profile
                            .as_deref()
                            .map(|id| self.store.lookup(id))
                            .transpose()?;
                        let caption =
                            template::render(&window.caption, &TemplateContext { time: now, profile })?;
                        debug!(tick, camera = %camera.id, asset = %window.asset, "Fetching placeholder");
                        *reveal_frame = Some(
                            fetch_placeholder(Arc::clone(&self.fetcher), &window.asset, caption).await,
                        );
                    }
                    match reveal_frame.as_ref() {
                        Some(frame) => frame.clone(),
                        None => return Err(Error::internal("reveal frame missing")),
                    }
                }
                _ => FeedFrame::Noise {
                    frame: self.settings.noise.generate(&mut self.rng),
                    caption: camera.caption.clone(),
                },
            };
            sink.render_feed(camera, &frame)?;
        }
        Ok(())
    }
}
