use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::info;
use tokio::sync::mpsc;

use client::app::App;
use client::auth;
use client::calls::{AutoConfirmer, ProximityCallCoordinator};
use client::connection::{ConnectionConfig, ConnectionManager};
use client::directory::EntityDirectory;
use client::movement::MovementReporter;
use client::peer::{MediaGate, NullCallTransport};
use client::scene::{LocalAvatar, LoggingObserver, Wanderer};
use client::transport::WsConnector;
use shared::Event;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Session token; the player id is read from its payload
    #[arg(short = 't', long)]
    token: Option<String>,

    /// Player id override, skips token decoding
    #[arg(short = 'u', long)]
    user_id: Option<String>,

    /// Movement tick interval in milliseconds
    #[arg(long, default_value = "50")]
    tick_ms: u64,

    /// Side length of the square world the avatar wanders in
    #[arg(long, default_value = "800.0")]
    world_size: f32,

    /// Wander speed in units per second
    #[arg(long, default_value = "120.0")]
    speed: f32,

    /// Accept incoming call prompts instead of declining them
    #[arg(long)]
    answer_calls: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let user_id = match (&args.user_id, &args.token) {
        (Some(id), _) => id.clone(),
        (None, Some(token)) => auth::player_id_from_token(token)?,
        (None, None) => return Err("either --token or --user-id is required".into()),
    };

    info!("Starting client as {}", user_id);
    info!("Connecting to: {}", args.server);

    let manager = ConnectionManager::spawn(WsConnector, ConnectionConfig::default());

    // Announced ahead of any buffered traffic on every (re)connect
    manager.set_registration(Event::register(user_id.as_str()));

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    manager.on_message(move |event| {
        let _ = event_tx.send(event.clone());
    });

    let mut directory = EntityDirectory::new(user_id.as_str());
    directory.set_observer(Box::new(LoggingObserver));

    let start = (args.world_size / 2.0, args.world_size / 2.0);
    let avatar = LocalAvatar::new(start.0, start.1, args.world_size);
    let reporter = MovementReporter::new(user_id.as_str(), start);

    // The headless client has no capture pipeline; the gate opens at once
    let media = Arc::new(MediaGate::new());
    media.mark_ready();

    let (call_tx, call_rx) = mpsc::unbounded_channel();
    let coordinator = ProximityCallCoordinator::new(
        user_id.as_str(),
        Box::new(NullCallTransport::new(call_tx.clone())),
        Box::new(AutoConfirmer::new(args.answer_calls)),
        media,
        call_tx,
    );

    let app = App::new(
        manager,
        event_rx,
        call_rx,
        directory,
        reporter,
        coordinator,
        Box::new(avatar),
    )
    .with_tick(Duration::from_millis(args.tick_ms))
    .with_wanderer(Wanderer::new(args.speed, args.world_size));

    app.run(args.server).await;

    Ok(())
}
