//! `tutorstitch serve` — Start the HTTP API server.

use tutorstitch_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🧵 TutorStitch Gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:      {}", config.store.backend);
    println!(
        "   Generation: {}",
        if config.generation.enabled {
            config.generation.model.as_str()
        } else {
            "disabled (prompt only)"
        }
    );

    tutorstitch_gateway::start(config).await?;

    Ok(())
}
