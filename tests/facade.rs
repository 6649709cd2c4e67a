use hifi::{LoadOptions, Player};
use serde_json::json;

#[tokio::test]
async fn plays_through_the_facade() {
    let config = hifi::CoreConfig::builder()
        .connection("DummyConnection", json!({}))
        .build()
        .unwrap();
    let player = Player::new(config).unwrap();
    let mut events = player.subscribe();

    let result = player
        .play("/good/1000/song.mp3", LoadOptions::default())
        .await
        .unwrap();

    assert!(result.sound.is_playing());
    assert_eq!(result.sound.connection_name(), "DummyConnection");

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event.name());
    }
    assert!(seen.contains(&"current-sound-changed"));
    assert!(seen.contains(&"audio-played"));
    assert_eq!(player.current_sound(), Some(result.sound));
}

#[test]
fn runtime_and_bridge_are_reachable() {
    let config = hifi::runtime::CoreConfig::default();
    assert_eq!(config.logging_config().level, hifi::bridge::LogLevel::Info);
}
