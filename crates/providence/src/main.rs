//! `providence` - CLI for the surveillance dashboard
//!
//! This binary plays the timeline to the terminal and inspects the profile
//! roster, script and configuration it runs from.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use providence::cli::{Cli, Command, ConfigCommand, ProfilesCommand, RunCommand, ScriptCommand};
use providence::sink::TerminalFormat;
use providence::template::format_score;
use providence::{
    init_logging, Config, LocalClock, PlaybackOutcome, ProfileRecord, Script, SleepTicker,
    TerminalSink, TimelinePlayer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Run(run_cmd) => handle_run(config, &run_cmd).await,
        Command::Profiles(profiles_cmd) => handle_profiles(&config, profiles_cmd),
        Command::Script(script_cmd) => handle_script(&config, script_cmd),
        Command::Config(config_cmd) => handle_config(&config, cli.config, config_cmd),
    }
}

async fn handle_run(mut config: Config, cmd: &RunCommand) -> anyhow::Result<()> {
    cmd.apply(&mut config);
    config.validate()?;

    let format = TerminalFormat::from(cmd.format);
    let plain = format == TerminalFormat::Plain;

    if !config.system.active {
        println!("SYSTEM STANDBY. AUTHORIZATION REQUIRED.");
        return Ok(());
    }

    let store = Arc::new(config.profiles().context("loading profile roster")?);
    let script = config.script().context("loading script")?;
    let mut player = TimelinePlayer::new(store, script, config.playback_settings())?
        .with_fetcher(config.asset_fetcher());

    let handle = player.handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    if plain {
        println!("PROVIDENCE // {}", config.system.system_id);
        println!("SYSTEM STATUS: ONLINE");
        println!();
    }

    let mut sink = TerminalSink::stdout(format);
    let result = player.run(&mut sink, &mut SleepTicker, &LocalClock).await;
    interrupt.abort();
    let report = result?;

    if plain {
        println!();
        match report.outcome {
            PlaybackOutcome::Completed => {
                println!("SEQUENCE COMPLETE ({} ticks)", report.ticks_processed);
            }
            PlaybackOutcome::Cancelled => {
                println!(
                    "SEQUENCE ABORTED after {} of {} ticks",
                    report.ticks_processed, config.playback.tick_count
                );
            }
        }
    }
    Ok(())
}

fn print_profile(profile: &ProfileRecord) {
    println!("{} ({})", profile.name, profile.id);
    println!("  Department:  {}", profile.department);
    for score in &profile.scores {
        println!("  {:<12} {}", format!("{}:", score.name), format_score(score.value));
    }
    println!("  Risk:        {}", profile.risk);
    println!("  Last seen:   {}", profile.last_seen.as_deref().unwrap_or("n/a"));
    println!("  Status:      {}", profile.status);
}

fn handle_profiles(config: &Config, cmd: ProfilesCommand) -> anyhow::Result<()> {
    let store = config.profiles()?;
    match cmd {
        ProfilesCommand::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(store.all())?);
            } else {
                println!(
                    "{:<10} {:<16} {:<16} {:<9} STATUS",
                    "ID", "NAME", "DEPARTMENT", "RISK"
                );
                for p in store.all() {
                    println!(
                        "{:<10} {:<16} {:<16} {:<9} {}",
                        p.id,
                        p.name,
                        p.department,
                        p.risk.to_string(),
                        p.status
                    );
                }
            }
        }
        ProfilesCommand::Show { id, json } => {
            let profile = store.lookup(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(profile)?);
            } else {
                print_profile(profile);
            }
        }
    }
    Ok(())
}

fn print_script(script: &Script) {
    println!("Events ({})", script.len());
    for event in script.events() {
        let mut line = format!(
            "  {:>4}  {}",
            event.tick,
            event.message.as_deref().unwrap_or("-")
        );
        if let Some(id) = &event.profile {
            let activate = if event.activate { ", activate" } else { "" };
            line.push_str(&format!("  [profile {id}{activate}]"));
        }
        if let Some(toast) = &event.toast {
            line.push_str(&format!("  [toast \"{toast}\"]"));
        }
        println!("{line}");
    }
    if let Some(heartbeat) = script.heartbeat() {
        println!("Heartbeat: every {} ticks: {}", heartbeat.interval, heartbeat.message);
    }
    if let Some(idle) = script.idle_message() {
        println!("Idle: {idle}");
    }
    for camera in script.cameras() {
        println!("Camera {} {}: {}", camera.id, camera.label, camera.caption);
    }
    if let Some(reveal) = script.reveal() {
        println!(
            "Reveal: {} ticks {}..{} asset \"{}\"",
            reveal.camera, reveal.start, reveal.end, reveal.asset
        );
    }
    if let Some(gauge) = script.gauge() {
        println!(
            "Gauge: {} from {}.{} every {}",
            gauge.name, gauge.profile, gauge.attribute, gauge.every
        );
    }
}

fn handle_script(config: &Config, cmd: ScriptCommand) -> anyhow::Result<()> {
    match cmd {
        ScriptCommand::Show { json } => {
            let script = config.script()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&script)?);
            } else {
                print_script(&script);
            }
        }
        ScriptCommand::Validate { file } => {
            let store = config.profiles()?;
            let script = match &file {
                Some(path) => {
                    println!("Validating script: {}", path.display());
                    Script::load(path)
                }
                None => {
                    println!("Validating configured script");
                    config.script()
                }
            };
            match script.and_then(|s| s.validate(&store)) {
                Ok(()) => println!("Script is valid."),
                Err(e) => println!("Script error: {e}"),
            }
        }
    }
    Ok(())
}

fn handle_config(
    config: &Config,
    config_path: Option<PathBuf>,
    cmd: ConfigCommand,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[System]");
                println!("  Active:             {}", config.system.active);
                println!("  System id:          {}", config.system.system_id);
                println!();
                println!("[Playback]");
                println!("  Ticks:              {}", config.playback.tick_count);
                println!("  Tick delay (ms):    {}", config.playback.tick_delay_ms);
                println!("  Log capacity:       {}", config.playback.log_capacity);
                println!(
                    "  Seed:               {}",
                    config
                        .playback
                        .seed
                        .map_or_else(|| "random".to_string(), |s| s.to_string())
                );
                println!(
                    "  Script:             {}",
                    config
                        .playback
                        .script_path
                        .as_ref()
                        .map_or_else(|| "built-in".to_string(), |p| p.display().to_string())
                );
                println!(
                    "  Profiles:           {}",
                    config
                        .playback
                        .profiles_path
                        .as_ref()
                        .map_or_else(|| "built-in".to_string(), |p| p.display().to_string())
                );
                println!();
                println!("[Feed]");
                println!("  Frame:              {}x{}", config.feed.width, config.feed.height);
                println!("  Noise ceiling:      {}", config.feed.noise_ceiling);
                println!("  Asset source:       {:?}", config.feed.asset_source);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
