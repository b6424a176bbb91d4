mod create_sip;
mod emergency;
pub mod extract;
mod manage_funds;
mod status;
mod transfer;

pub use create_sip::CreateSipAction;
pub use emergency::EmergencyAction;
pub use manage_funds::ManageFundsAction;
pub use status::CheckStatusAction;
pub use transfer::CrossChainTransferAction;

use crate::chain::{ChainError, DepositSchedule, Result, ScheduleRegistry, SipChain};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// What every action handler can reach.
#[derive(Clone)]
pub struct ActionContext {
    pub chain: Option<Arc<dyn SipChain>>,
    pub schedule: DepositSchedule,
    pub schedules: ScheduleRegistry,
}

impl ActionContext {
    pub fn new(chain: Option<Arc<dyn SipChain>>) -> Self {
        Self {
            chain,
            schedule: DepositSchedule::default(),
            schedules: ScheduleRegistry::default(),
        }
    }

    pub fn chain(&self) -> Result<&Arc<dyn SipChain>> {
        self.chain.as_ref().ok_or(ChainError::Unavailable)
    }

    /// Agent wallet for reply text, or `not configured`.
    pub fn agent_label(&self) -> String {
        self.chain
            .as_ref()
            .map(|c| c.agent_address().to_string())
            .unwrap_or_else(|| "not configured".to_string())
    }
}

/// Reply produced by a dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionReply {
    pub text: String,
    pub actions: Vec<String>,
    pub success: bool,
}

#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;
    fn similes(&self) -> &'static [&'static str];
    fn description(&self) -> &'static str;

    /// `text` is already lowercased.
    fn validate(&self, text: &str) -> bool;

    /// Performs the action and returns the success reply.
    async fn run(&self, ctx: &ActionContext, text: &str) -> Result<String>;

    /// Reply sent when `run` fails.
    fn failure_reply(&self, ctx: &ActionContext, error: &ChainError) -> String;

    async fn handle(&self, ctx: &ActionContext, text: &str) -> ActionReply {
        tracing::info!(action = self.name(), "handling action");
        let (text, success) = match self.run(ctx, text).await {
            Ok(reply) => (reply, true),
            Err(e) => {
                tracing::error!(action = self.name(), error = %e, "action failed");
                (self.failure_reply(ctx, &e), false)
            }
        };
        ActionReply {
            text,
            actions: vec![self.name().to_string()],
            success,
        }
    }
}

pub struct ActionRegistry {
    actions: Vec<Box<dyn Action>>,
}

impl ActionRegistry {
    pub fn new(actions: Vec<Box<dyn Action>>) -> Self {
        Self { actions }
    }

    /// The SIP actions in evaluation order.
    pub fn sip_actions() -> Self {
        Self::new(vec![
            Box::new(CreateSipAction),
            Box::new(ManageFundsAction),
            Box::new(CrossChainTransferAction),
            Box::new(EmergencyAction),
            Box::new(CheckStatusAction),
        ])
    }

    pub fn actions(&self) -> &[Box<dyn Action>] {
        &self.actions
    }

    /// First action, in registration order, whose keywords match.
    pub fn find(&self, text: &str) -> Option<&dyn Action> {
        let lower = text.to_lowercase();
        self.actions
            .iter()
            .find(|action| action.validate(&lower))
            .map(|action| action.as_ref())
    }

    /// Runs the matching action; `None` when nothing matched.
    pub async fn dispatch(&self, ctx: &ActionContext, text: &str) -> Option<ActionReply> {
        let action = self.find(text)?;
        Some(action.handle(ctx, text).await)
    }
}

pub(crate) fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}
