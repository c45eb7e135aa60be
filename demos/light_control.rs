//! Light control example
//!
//! Demonstrates the light control features including:
//! - Power, colour and brightness
//! - Named scenes from the profile's catalog
//! - Hexagon-only commands (music mode, schedule)
//! - Idle disconnect after the last command
//!
//! Run with: cargo run --example light_control -- --address AA:BB:CC:DD:EE:FF
//!
//! For a Hexagon light:
//!   cargo run --example light_control -- --address AA:BB:CC:DD:EE:FF --profile hexagon_light

use mergbw_light_ble::{
    Capability, DaysMask, Error, LightConfig, LightManager, ProfileKind, Result, RgbColor,
    Schedule, ScheduleEntry, TurnOnOptions,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mergbw_light_ble=debug".parse().unwrap()),
        )
        .init();

    println!("MeRGBW Light Control");
    println!("====================\n");

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let flag = |name: &str| {
        args.iter()
            .position(|arg| arg == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let address = flag("--address").ok_or_else(|| Error::InvalidParameter {
        name: "--address".to_string(),
        value: "missing".to_string(),
    })?;
    let profile = ProfileKind::from_key(flag("--profile").as_deref());

    println!("=== Profiles ===");
    for (key, label) in ProfileKind::all() {
        println!("- {} ({})", label, key);
    }
    println!();

    let manager = LightManager::new().await?;
    let light = manager
        .add_light(
            LightConfig::new(address)
                .with_profile(profile)
                .with_idle_timeout(Duration::from_secs(5)),
        )
        .await?;

    let info = light.device_info();
    println!("Light: {} ({} {})", info.name, info.manufacturer, info.model);
    println!("Address: {}", info.identifier);
    println!("Scenes: {}\n", light.effects().len());

    let _state_handle = light.on_state_changed(|state| {
        println!(
            "  state: on={:?} brightness={:?} color={} effect={:?}",
            state.is_on,
            state.brightness,
            state
                .color
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            state.effect
        );
    });

    println!("Turning on in red at half brightness...");
    light
        .turn_on(
            TurnOnOptions::new()
                .with_color(RgbColor::new(255, 0, 0))
                .with_brightness(128),
        )
        .await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    for color in [RgbColor::new(0, 255, 0), RgbColor::new(0, 0, 255)] {
        println!("Setting colour {}...", color);
        light.set_color(color).await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    if let Some(scene) = light.effects().first().cloned() {
        println!("Selecting scene '{}'...", scene);
        light.set_scene(&scene).await?;
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    if light.supports(Capability::MusicMode) {
        println!("Selecting music mode 'spectrum1'...");
        light.set_music_mode("spectrum1").await?;
        light.set_music_sensitivity(60).await?;
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    if light.supports(Capability::Schedule) {
        println!("Programming weekday schedule 07:00 on, 23:30 off...");
        let weekdays = DaysMask::from_day_names(["mon", "tue", "wed", "thu", "fri"])?;
        light
            .set_schedule(Schedule::new(
                ScheduleEntry::at(7, 0, weekdays),
                ScheduleEntry::at(23, 30, weekdays),
            ))
            .await?;
    }

    println!("Back to white...");
    light.set_white().await?;

    println!("\nWaiting for idle disconnect...");
    tokio::time::sleep(Duration::from_secs(6)).await;
    println!("Connection: {}", light.connection_state());

    println!("Turning off...");
    light.turn_off().await?;

    manager.shutdown().await?;
    println!("Done.");
    Ok(())
}
