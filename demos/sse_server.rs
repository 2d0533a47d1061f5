//! Simple SSE server example
//!
//! Run with: cargo run --example sse_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example sse_server                    # binds to 0.0.0.0:8080
//!   cargo run --example sse_server localhost          # binds to 127.0.0.1:8080
//!   cargo run --example sse_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! ## Subscribing
//!
//! With curl:
//!   curl -N http://localhost:8080/
//!
//! From a browser:
//!   new EventSource("http://localhost:8080/").addEventListener("tick", e => console.log(e.data))
//!
//! The server publishes a `tick` counter every second and a `status` JSON
//! event every five seconds.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use sse_rs::{Hub, HubConfig, ServerConfig, SseServer};

#[derive(Serialize)]
struct Status {
    subscribers: u64,
    published: u64,
    dropped: u64,
}

fn print_usage() {
    eprintln!("Usage: sse_server [BIND_ADDR]");
    eprintln!();
    eprintln!("BIND_ADDR may be a full address (127.0.0.1:9000), a bare host");
    eprintln!("(localhost, 0.0.0.0) or omitted for 0.0.0.0:8080.");
}

fn parse_bind_addr(s: &str) -> Result<SocketAddr, String> {
    if s == "localhost" {
        return Ok(SocketAddr::from(([127, 0, 0, 1], 8080)));
    }
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = s.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, 8080));
    }
    Err(format!("invalid bind address: {}", s))
}

async fn publish_ticks(hub: Hub) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut count: u64 = 0;

    loop {
        ticker.tick().await;
        count += 1;

        if hub.send_uint("", "tick", count).await.is_err() {
            return;
        }

        if count % 5 == 0 {
            let stats = hub.stats();
            let status = Status {
                subscribers: stats.subscribers,
                published: stats.frames_published,
                dropped: stats.frames_dropped,
            };
            if let Err(e) = hub.send_json("", "status", &status).await {
                tracing::warn!(error = %e, "Status event not sent");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => ServerConfig::default().bind_addr,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sse_rs=debug".parse()?)
                .add_directive("sse_server=debug".parse()?),
        )
        .init();

    let hub = Hub::with_config(HubConfig::default().mailbox_capacity(16));
    let server = SseServer::new(ServerConfig::with_addr(bind_addr), hub.clone());

    println!("Starting SSE server on {}", server.bind_addr());
    println!("Subscribe: curl -N http://{}/", server.bind_addr());
    println!();

    tokio::spawn(publish_ticks(hub.clone()));

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
    }

    let released = hub.shutdown().await?;
    println!("Released {} subscribers", released);

    Ok(())
}
