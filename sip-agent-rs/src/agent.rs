use crate::actions::{ActionContext, ActionRegistry};
use crate::providers::{ContextProvider, MarketAnalysisProvider, PortfolioStatusProvider, compose_context};
use alloy::primitives::Address;
use eliza_sdk_rs::socket::{MessageBroadcastData, RelayEvent, SocketManager};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Source tag attached to the agent's replies.
pub const REPLY_SOURCE: &str = "sip_agent";

const HELP_TEXT: &str = "I manage your SIP portfolio across Fuji, Echo and Dispatch. Try:
• \"Create a SIP plan with 10 tokens monthly\"
• \"Show me my portfolio status\"
• \"Move funds from fuji to echo for better yields\"
• \"Emergency! Protect my funds!\"
• \"Optimize my portfolio allocation\"";

/// Listens on the relay and answers chat messages addressed to its channels.
pub struct SipAgent {
    socket: Arc<SocketManager>,
    registry: ActionRegistry,
    providers: Vec<Box<dyn ContextProvider>>,
    ctx: ActionContext,
}

impl SipAgent {
    pub fn new(socket: Arc<SocketManager>, ctx: ActionContext, portfolio_owner: Option<Address>) -> Self {
        Self {
            socket,
            registry: ActionRegistry::sip_actions(),
            providers: vec![
                Box::new(MarketAnalysisProvider::default()),
                Box::new(PortfolioStatusProvider {
                    owner: portfolio_owner,
                }),
            ],
            ctx,
        }
    }

    /// Reply text for an incoming message: the matching action's reply, or
    /// help followed by provider context when no action matches.
    pub async fn respond(&self, text: &str) -> String {
        if let Some(reply) = self.registry.dispatch(&self.ctx, text).await {
            tracing::info!(actions = ?reply.actions, success = reply.success, "action replied");
            return reply.text;
        }
        let context = compose_context(&self.providers, &self.ctx).await;
        format!("{}\n\n{}", HELP_TEXT, context)
    }

    pub async fn on_message(&self, msg: MessageBroadcastData) {
        if msg.sender_id == self.socket.entity_id() {
            return;
        }
        let Some(channel_id) = msg.channel_id.clone().or_else(|| msg.room_id.clone()) else {
            tracing::warn!(sender = %msg.sender_id, "message without channel, ignoring");
            return;
        };
        if msg.text.to_lowercase().contains("sip") {
            let preview: String = msg.text.chars().take(100).collect();
            tracing::info!(%channel_id, %preview, "SIP-related message received");
        }

        let reply = self.respond(&msg.text).await;
        if let Err(e) = self
            .socket
            .send_channel_message(&reply, &channel_id, REPLY_SOURCE, None, None)
            .await
        {
            tracing::error!(%channel_id, error = %e, "failed to send reply");
        }
    }

    /// Handles relayed messages until the event bus closes. Each message is
    /// answered on its own task so slow chain calls do not hold up others.
    pub async fn run(self: Arc<Self>) {
        let mut events = self.socket.subscribe();
        loop {
            match events.recv().await {
                Ok(RelayEvent::MessageBroadcast(msg)) => {
                    let agent = self.clone();
                    tokio::spawn(async move { agent.on_message(msg).await });
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "agent fell behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
