use super::extract::{extract_amount, extract_from_chain, extract_to_chain};
use super::{Action, ActionContext, contains_any};
use crate::chain::{Chain, ChainError, Result, parse_amount};
use async_trait::async_trait;

const DEFAULT_AMOUNT: &str = "10";

pub struct CrossChainTransferAction;

#[async_trait]
impl Action for CrossChainTransferAction {
    fn name(&self) -> &'static str {
        "CROSS_CHAIN_TRANSFER"
    }

    fn similes(&self) -> &'static [&'static str] {
        &[
            "MOVE_TOKENS",
            "TRANSFER_CROSS_CHAIN",
            "BRIDGE_FUNDS",
            "SEND_CROSS_CHAIN",
            "MOVE_FUNDS",
        ]
    }

    fn description(&self) -> &'static str {
        "Transfers agent tokens between chains over the interchain token bridge"
    }

    fn validate(&self, text: &str) -> bool {
        contains_any(text, &["transfer", "move", "bridge", "cross-chain", "send to"])
            && contains_any(text, &["fuji", "echo", "dispatch"])
    }

    async fn run(&self, ctx: &ActionContext, text: &str) -> Result<String> {
        let chain = ctx.chain()?;
        let agent = chain.agent_address();

        let amount = extract_amount(text).unwrap_or_else(|| DEFAULT_AMOUNT.to_string());
        let from = extract_from_chain(text).unwrap_or(Chain::Fuji);
        let to = extract_to_chain(text).unwrap_or(Chain::Echo);
        if from == to {
            return Err(ChainError::SameChain);
        }

        let receipt = chain
            .cross_chain_transfer(from, to, parse_amount(&amount)?, agent)
            .await?;

        let mut notes = Vec::new();
        match to {
            Chain::Echo => notes.push("🎯 Echo chain offers yield farming opportunities."),
            Chain::Dispatch => notes.push("🛡️ Dispatch chain provides emergency fund security."),
            Chain::Fuji => {}
        }
        if from == Chain::Echo {
            notes.push("📈 Moving out of the Echo yield position.");
        }

        Ok(format!(
            "🌉 Cross-chain transfer completed!

**🤖 AI Agent Transfer:**
• Amount: {amount} SIP tokens
• From: {from} Chain
• To: {to} Chain
• AI Agent: {agent}

**📋 Transaction Details:**
• TX Hash: {hash}
• Block: {block}
• Gas Used: {gas}

{notes}

Check on Explorer: {url}",
            amount = amount,
            from = from.title(),
            to = to.title(),
            agent = agent,
            hash = receipt.hash,
            block = receipt.block_label(),
            gas = receipt.gas_used,
            notes = notes.join("\n"),
            url = receipt.explorer_url(),
        ))
    }

    fn failure_reply(&self, ctx: &ActionContext, error: &ChainError) -> String {
        format!(
            "❌ Cross-chain transfer failed: {error}

**Possible Issues:**
• Insufficient AI agent balance on source chain
• Network connectivity problems
• Contract interaction failure

**AI Agent:** {agent}

Please check balances and try again.",
            error = error,
            agent = ctx.agent_label(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use std::sync::Arc;

    fn ctx(chain: &Arc<MockChain>) -> ActionContext {
        ActionContext::new(Some(chain.clone()))
    }

    #[tokio::test]
    async fn transfers_between_named_chains() {
        let chain = Arc::new(MockChain::new());
        let reply = CrossChainTransferAction
            .handle(&ctx(&chain), "Move 5 tokens from echo to dispatch")
            .await;

        assert!(reply.success);
        assert_eq!(chain.calls(), vec!["transfer echo dispatch 5"]);
        assert!(reply.text.contains("• From: Echo Chain"));
        assert!(reply.text.contains("• To: Dispatch Chain"));
        assert!(reply.text.contains("Gas Used: 21000"));
        assert!(reply.text.contains("emergency fund security"));
        assert!(reply.text.contains("Moving out of the Echo yield position"));
    }

    #[tokio::test]
    async fn defaults_to_ten_tokens_fuji_to_echo() {
        let chain = Arc::new(MockChain::new());
        let reply = CrossChainTransferAction
            .handle(&ctx(&chain), "bridge my funds over to echo")
            .await;
        assert!(reply.success);
        assert_eq!(chain.calls(), vec!["transfer fuji echo 10"]);
    }

    #[tokio::test]
    async fn same_chain_is_rejected_before_any_call() {
        let chain = Arc::new(MockChain::new());
        let reply = CrossChainTransferAction
            .handle(&ctx(&chain), "move 3 tokens from echo to echo")
            .await;
        assert!(!reply.success);
        assert!(chain.calls().is_empty());
        assert!(reply.text.starts_with(
            "❌ Cross-chain transfer failed: Source and destination chains cannot be the same"
        ));
    }
}
