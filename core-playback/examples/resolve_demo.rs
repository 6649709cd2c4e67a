//! # Resolution Demo
//!
//! Plays a few dummy sounds through the player and prints what it does:
//! failed attempts, current-sound switches and position polls.
//!
//! Run with: `cargo run --example resolve_demo --package core-playback`
//!
//! Set `RUST_LOG=core_playback=debug` to see every attempt.

use core_playback::{LoadOptions, Player, PlayerEvent, Result};
use core_runtime::logging::init_logging;
use core_runtime::CoreConfig;
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let config = CoreConfig::builder()
        .connection("DummyConnection", json!({ "tick_ms": 100 }))
        .poll_interval(Duration::from_millis(250))
        .debug(true)
        .build()?;
    init_logging(config.logging_config())?;

    let player = Player::new(config)?;
    let mut events = player.event_stream();

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                PlayerEvent::PositionPolled { sound, position } => {
                    println!("  {:>24} {} at {}ms", event.name(), sound.url(), position)
                }
                PlayerEvent::CurrentSoundChanged { current, previous } => println!(
                    "  {:>24} {} (was {})",
                    event.name(),
                    current.url(),
                    previous
                        .as_ref()
                        .map(|p| p.url().to_string())
                        .unwrap_or_else(|| "nothing".to_string())
                ),
                _ => match event.sound() {
                    Some(sound) => println!("  {:>24} {}", event.name(), sound.url()),
                    None => println!("  {:>24}", event.name()),
                },
            }
        }
    });

    println!("== playing the first sound that loads");
    let first = player
        .play(
            ["/bad/1000/broken.mp3", "/good/1000/intro.mp3"],
            LoadOptions::default().with_metadata("title", json!("Intro")),
        )
        .await?;
    for failure in &first.failures {
        println!(
            "   skipped {} on {}: {}",
            failure.url, failure.connection_name, failure.error
        );
    }
    tokio::time::sleep(Duration::from_millis(600)).await;

    println!("== interrupting it with another sound");
    player
        .play("/good/800/outro.mp3", LoadOptions::default())
        .await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    println!("== muting, seeking to the end");
    player.toggle_mute();
    player.fast_forward(10_000)?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("== nothing can play this");
    match player
        .load(["/bad/1000/a.mp3", "/bad/1000/b.mp3"], LoadOptions::default())
        .await
    {
        Ok(_) => println!("   unexpectedly loaded"),
        Err(error) => println!(
            "   {} ({})",
            error,
            serde_json::to_string(error.failures()).unwrap_or_default()
        ),
    }

    Ok(())
}
