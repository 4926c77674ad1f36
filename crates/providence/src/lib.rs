//! `providence` - A scripted surveillance-dashboard timeline player
//!
//! This library drives a fixed narrative over a bounded number of ticks: log
//! lines, a jittered gauge, camera feeds with a placeholder reveal, and profile
//! matches against a static roster. Rendering goes through a [`DisplaySink`]
//! and pacing through a [`TickSource`], so playback runs the same in a
//! terminal and in tests.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod jitter;
pub mod log_buffer;
pub mod logging;
pub mod player;
pub mod profile;
pub mod script;
pub mod sink;
pub mod template;
pub mod tick;

pub use config::Config;
pub use error::{Error, Result};
pub use feed::{AssetFetcher, FeedFrame, NoiseSpec};
pub use log_buffer::{LogBuffer, LogEntry, Severity};
pub use logging::init_logging;
pub use player::{
    PlaybackHandle, PlaybackOutcome, PlaybackReport, PlaybackSettings, PlayerState,
    TimelinePlayer,
};
pub use profile::{ProfileRecord, ProfileStore, RiskLevel};
pub use script::{Script, ScriptEvent};
pub use sink::{DisplaySink, MemorySink, TerminalFormat, TerminalSink};
pub use tick::{Clock, FixedClock, ImmediateTicker, LocalClock, SleepTicker, TickSource};
