//! Lobby demo: list servers, connect to one, exchange a few messages.
//!
//! The "server" is an in-process memory transport, so this runs without a
//! network. Pass a `server.json` path to add a configured server:
//!
//! ```text
//! RUST_LOG=gamelink=debug cargo run -p lobby -- server.json
//! ```

use std::time::Duration;

use gamelink::prelude::*;
use gamelink::registry::RegistryEvents;
use gamelink::session::SessionEvents;
use gamelink::transport::MemoryTransportHandle;

// ---------------------------------------------------------------------------
// Lobby steps
// ---------------------------------------------------------------------------

async fn list_servers(
    registry: &ServerRegistry,
    events: &mut RegistryEvents,
) -> Result<Vec<ServerRecord>, Box<dyn std::error::Error>> {
    registry.discover_servers().await;

    let mut servers = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RegistryEvent::Discovered(record) = event {
            println!("{}", serde_json::to_string(&record)?);
            servers.push(record);
        }
    }
    Ok(servers)
}

/// Plays the remote side: greets the client once it has identified itself.
async fn play_server(remote: MemoryTransportHandle) {
    while remote.send_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    remote.push_data(b"WELCOME TO THE TERMLINK");
    remote.push_diagnostic(gamelink::transport::IncomingKind::Debug, "rtt 3ms");
}

async fn play_session(
    session: &SessionManager<MemoryTransport>,
    events: &mut SessionEvents,
    server: &ServerRecord,
) -> Result<(), GamelinkError> {
    session.connect(&server.address, server.port).await?;
    session.send_message(b"READY", DeliveryTier::OrderedReliable)?;
    session.send_message(b"POS 12,40", DeliveryTier::SequencedUnreliable)?;

    let deadline = tokio::time::sleep(Duration::from_secs(1));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                SessionEvent::StatusChanged(status) => println!("status: {status:?}"),
                SessionEvent::DataReceived(data) => {
                    println!("server says: {}", String::from_utf8_lossy(&data));
                    break;
                }
            },
            _ = &mut deadline => {
                tracing::warn!("no greeting from server");
                break;
            }
        }
    }

    session.disconnect();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    gamelink::init_tracing("info");

    let mut config = RegistryConfig::default();
    if let Some(path) = std::env::args().nth(1) {
        config = config.with_config_file(path);
    }
    let (registry, mut registry_events) = ServerRegistry::new(config);

    let servers = list_servers(&registry, &mut registry_events).await?;
    let Some(server) = servers.first() else {
        eprintln!("no servers known");
        return Ok(());
    };
    println!("joining {} ({})", server.name, server.key());

    let (transport, remote) = MemoryTransport::auto_accept();
    let (session, mut events) = SessionManager::new(
        transport,
        SessionConfig {
            platform: "GOG".into(),
            ..SessionConfig::default()
        },
    )?;

    let server_task = tokio::spawn(play_server(remote.clone()));
    let result = play_session(&session, &mut events, server).await;
    session.shutdown().await;
    server_task.abort();

    result?;
    println!("sent {} messages, left cleanly", remote.send_count());
    Ok(())
}
