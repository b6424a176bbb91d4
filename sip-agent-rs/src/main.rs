use anyhow::Context;
use eliza_sdk_rs::logger::init_logging;
use eliza_sdk_rs::socket::{SocketConfig, SocketManager};
use sip_agent_rs::character::AGENT_NAME;
use sip_agent_rs::{ActionContext, Character, SipAgent, SipChain, SipConfig, Web3Service};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    if std::env::args().any(|arg| arg == "--print-character") {
        let character = Character::sip_manager(|key| std::env::var(key).ok()).redacted();
        println!("{}", serde_json::to_string_pretty(&character)?);
        return Ok(());
    }

    init_logging("info");
    tracing::info!(name = AGENT_NAME, "starting SIP agent");

    let config = SipConfig::from_env().context("invalid agent configuration")?;
    config.log_status();

    let chain: Option<Arc<dyn SipChain>> = match Web3Service::from_config(&config)
        .context("failed to set up chain service")?
    {
        Some(service) => {
            let service: Arc<dyn SipChain> = Arc::new(service);
            service.log_balance_distribution().await;
            Some(service)
        }
        None => None,
    };

    let socket = Arc::new(
        SocketManager::new(config.entity_id.clone(), None).with_user_name(AGENT_NAME),
    );
    socket
        .initialize(SocketConfig::new(config.eliza_server_url.clone()))
        .await;
    for channel in &config.channels {
        socket
            .join_channel(channel, None)
            .await
            .with_context(|| format!("failed to join channel {}", channel))?;
    }
    if config.channels.is_empty() {
        tracing::warn!("SIP_AGENT_CHANNELS is empty, the agent will not receive messages");
    }

    let agent = Arc::new(SipAgent::new(
        socket.clone(),
        ActionContext::new(chain),
        config.user_address,
    ));

    tokio::select! {
        _ = agent.run() => {
            tracing::warn!("event bus closed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    socket.disconnect().await;
    Ok(())
}
