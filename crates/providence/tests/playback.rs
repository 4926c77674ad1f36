//! End-to-end playback through the public API.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;

use providence::feed::DirectoryAssetFetcher;
use providence::script::{CameraSpec, RevealWindow, SeverityRule};
use providence::{
    FixedClock, ImmediateTicker, MemorySink, NoiseSpec, PlaybackOutcome, PlaybackSettings,
    ProfileStore, Script, ScriptEvent, Severity, TimelinePlayer,
};

fn settings(tick_count: u32) -> PlaybackSettings {
    PlaybackSettings {
        tick_count,
        tick_delay: Duration::ZERO,
        log_capacity: 7,
        seed: Some(2025),
        noise: NoiseSpec {
            width: 4,
            height: 3,
            ceiling: 50,
        },
    }
}

fn clock() -> FixedClock {
    FixedClock(NaiveTime::from_hms_opt(9, 5, 0).unwrap())
}

fn narrative() -> Script {
    Script::new(vec![
        ScriptEvent::log(0, "Sector Clear"),
        ScriptEvent::log(30, "Motion Detected").with_severity(SeverityRule::Warning),
        ScriptEvent::log(45, "MATCH FOUND: {name} ({id}) | Risk: {risk}")
            .with_severity(SeverityRule::FromRisk)
            .with_profile("12412824", true),
    ])
    .unwrap()
    .with_heartbeat(10, "Scanning...")
}

#[tokio::test]
async fn hundred_ticks_leave_seven_entries() {
    let mut player =
        TimelinePlayer::new(Arc::new(ProfileStore::demo()), narrative(), settings(100)).unwrap();
    let mut sink = MemorySink::new();
    let mut ticker = ImmediateTicker::new();

    let report = player.run(&mut sink, &mut ticker, &clock()).await.unwrap();

    assert_eq!(report.outcome, PlaybackOutcome::Completed);
    assert_eq!(report.ticks_processed, 100);
    assert_eq!(report.entries_emitted, 11);
    assert_eq!(ticker.waits(), 100);
    assert_eq!(sink.logs.len(), 100);
    assert!(sink.logs.iter().all(|log| log.len() <= 7));

    let final_log = sink.last_log().unwrap();
    assert_eq!(final_log, report.final_log.as_slice());
    assert_eq!(final_log.len(), 7);
    let ticks: Vec<u32> = final_log.iter().map(|e| e.tick).collect();
    assert_eq!(ticks, vec![40, 45, 50, 60, 70, 80, 90]);

    // The match is still on screen but no longer the newest line.
    let matched = &final_log[1];
    assert!(matched.text.contains("Rohan Sonwane"));
    assert!(matched.text.contains("12412824"));
    assert_eq!(matched.severity, Severity::Info);
    assert!(!final_log[6].text.contains("Rohan Sonwane"));

    assert_eq!(report.active_profile.as_deref(), Some("12412824"));
    assert_eq!(sink.profiles.len(), 1);
}

#[tokio::test]
async fn match_is_newest_when_playback_stops_right_after_it() {
    let mut player =
        TimelinePlayer::new(Arc::new(ProfileStore::demo()), narrative(), settings(46)).unwrap();
    let mut sink = MemorySink::new();

    let report = player
        .run(&mut sink, &mut ImmediateTicker::new(), &clock())
        .await
        .unwrap();

    assert!(report.is_complete());
    let last = report.final_log.last().unwrap();
    assert_eq!(last.tick, 45);
    assert_eq!(last.text, "MATCH FOUND: Rohan Sonwane (12412824) | Risk: LOW");
    assert_eq!(last.to_string(), format!("[09:05:00] {}", last.text));
}

#[tokio::test]
async fn heartbeat_yields_to_scripted_tick() {
    let mut player =
        TimelinePlayer::new(Arc::new(ProfileStore::demo()), narrative(), settings(31)).unwrap();
    let mut sink = MemorySink::new();

    let report = player
        .run(&mut sink, &mut ImmediateTicker::new(), &clock())
        .await
        .unwrap();

    let at_30: Vec<_> = report.final_log.iter().filter(|e| e.tick == 30).collect();
    assert_eq!(at_30.len(), 1);
    assert_eq!(at_30[0].text, "Motion Detected");
    assert_eq!(at_30[0].severity, Severity::Warning);
}

#[tokio::test]
async fn demo_script_plays_to_completion() {
    let mut player =
        TimelinePlayer::new(Arc::new(ProfileStore::demo()), Script::demo(), settings(100))
            .unwrap();
    let mut sink = MemorySink::new();

    let report = player
        .run(&mut sink, &mut ImmediateTicker::new(), &clock())
        .await
        .unwrap();

    assert!(report.is_complete());
    // The idle line fills every tick without a scripted or heartbeat entry.
    assert_eq!(report.entries_emitted, 100);
    assert_eq!(report.final_log.len(), 7);
    assert_eq!(report.final_log[0].tick, 93);

    let at_match = &sink.logs[45];
    assert!(at_match.last().unwrap().text.contains("Rohan Sonwane"));
    assert_eq!(sink.notifications, vec!["IDENTIFIED: Rohan Sonwane".to_string()]);

    let gauge = sink.metric_values("truancy_probability");
    assert_eq!(gauge.len(), 100);
    assert!(gauge.iter().all(|v| (83.0..=87.0).contains(v)));

    // No asset source: the reveal window shows the buffering frame.
    let cam1 = sink.feeds_for("CAM-01");
    assert_eq!(cam1.len(), 100);
    assert_eq!(cam1[44].kind, "noise");
    assert_eq!(cam1[45].kind, "buffering");
    assert_eq!(cam1[59].kind, "buffering");
    assert_eq!(cam1[60].kind, "noise");
    assert!(sink.feeds_for("CAM-02").iter().all(|f| f.kind == "noise"));
}

#[tokio::test]
async fn reveal_shows_asset_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    image::RgbImage::from_pixel(2, 2, image::Rgb([200, 10, 10]))
        .save(dir.path().join("face.png"))
        .unwrap();

    let script = Script::new(vec![])
        .unwrap()
        .with_camera(CameraSpec::new("CAM-01", "MAIN GATE", "SCANNING"))
        .with_reveal(RevealWindow {
            camera: "CAM-01".to_string(),
            start: 2,
            end: 4,
            asset: "face".to_string(),
            caption: "ID: {id}".to_string(),
            profile: Some("103".to_string()),
        });

    let mut player = TimelinePlayer::new(Arc::new(ProfileStore::demo()), script, settings(5))
        .unwrap()
        .with_fetcher(Arc::new(DirectoryAssetFetcher::new(dir.path())));
    let mut sink = MemorySink::new();

    player
        .run(&mut sink, &mut ImmediateTicker::new(), &clock())
        .await
        .unwrap();

    let kinds: Vec<&str> = sink.feeds_for("CAM-01").iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec!["noise", "noise", "asset", "asset", "noise"]);
    assert_eq!(sink.feeds_for("CAM-01")[2].caption, "ID: 103");
}

#[test]
fn unknown_profile_fails_the_run() {
    let script = Script::new(vec![ScriptEvent::log(3, "MATCH {name}").with_profile("999", true)])
        .unwrap();
    let err = TimelinePlayer::new(Arc::new(ProfileStore::demo()), script, settings(10))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn cancelled_run_reports_once_and_stops_early() {
    let mut player =
        TimelinePlayer::new(Arc::new(ProfileStore::demo()), narrative(), settings(100)).unwrap();
    let handle = player.handle();
    handle.cancel();

    let mut sink = MemorySink::new();
    let report = player
        .run(&mut sink, &mut ImmediateTicker::new(), &clock())
        .await
        .unwrap();

    assert_eq!(report.outcome, PlaybackOutcome::Cancelled);
    assert_eq!(report.ticks_processed, 0);
    assert!(sink.logs.is_empty());
}
