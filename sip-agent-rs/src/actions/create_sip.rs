use super::extract::{extract_amount, extract_goal, extract_target};
use super::{Action, ActionContext, contains_any};
use crate::chain::{ChainError, Result, format_amount, parse_amount, spawn_deposit_schedule};
use alloy::primitives::U256;
use async_trait::async_trait;

const DEFAULT_MONTHLY: &str = "20";
const DEFAULT_GOAL: &str = "AI agent systematic investment";

pub struct CreateSipAction;

const MONTHS_PER_YEAR: u64 = 12;

/// Target used when none is given: twelve months of the whole-token amount.
fn default_target(monthly_units: U256) -> Result<U256> {
    let unit = U256::from(10u64).pow(U256::from(18));
    (monthly_units / unit)
        .checked_mul(U256::from(MONTHS_PER_YEAR))
        .and_then(|whole| whole.checked_mul(unit))
        .ok_or_else(|| ChainError::InvalidAmount(format!("{} monthly is too large", format_amount(monthly_units))))
}

#[async_trait]
impl Action for CreateSipAction {
    fn name(&self) -> &'static str {
        "CREATE_SIP"
    }

    fn similes(&self) -> &'static [&'static str] {
        &[
            "SETUP_SIP",
            "START_INVESTMENT",
            "CREATE_PLAN",
            "BEGIN_SIP",
            "MAKE_SIP",
            "SIP_PLAN",
        ]
    }

    fn description(&self) -> &'static str {
        "Creates a new SIP plan on the home chain for the agent wallet"
    }

    fn validate(&self, text: &str) -> bool {
        contains_any(text, &["create", "start", "begin", "setup", "make"])
            && contains_any(text, &["sip", "plan", "investment", "monthly", "systematic"])
    }

    async fn run(&self, ctx: &ActionContext, text: &str) -> Result<String> {
        let chain = ctx.chain()?;

        let monthly = extract_amount(text).unwrap_or_else(|| DEFAULT_MONTHLY.to_string());
        let goal = extract_goal(text).unwrap_or_else(|| DEFAULT_GOAL.to_string());

        let monthly_units = parse_amount(&monthly)?;
        let target_units = match extract_target(text) {
            Some(target) => parse_amount(&target)?,
            None => default_target(monthly_units)?,
        };
        tracing::info!(
            %monthly,
            total_target = %format_amount(target_units),
            %goal,
            "creating SIP for agent"
        );

        let receipt = chain.create_sip(monthly_units, target_units, &goal).await?;
        let automation = spawn_deposit_schedule(chain.clone(), monthly_units, ctx.schedule);
        ctx.schedules.track(&automation);

        let schedule = ctx.schedule;
        Ok(format!(
            "🎉 SIP created for the AI agent!

**✅ SIP CREATED ON AVALANCHE FUJI**
- AI Agent: {agent}
- Goal: {goal}
- Monthly: {monthly} SIP tokens
- Target: {target} SIP tokens
- TX Hash: {hash}
- Block: {block}

**💰 IMMEDIATE FIRST DEPOSIT**
- Amount: {monthly} SIP tokens
- Distribution: 60% Echo, 30% Fuji, 10% Dispatch

**🤖 AUTOMATED DEPOSITS**
- Starting in {delay} seconds
- Next deposit: every {interval} seconds, up to {max} deposits
- Cross-chain transfers and emergency protection available

Check transaction: {url}",
            agent = chain.agent_address(),
            goal = goal,
            monthly = monthly,
            target = format_amount(target_units),
            hash = receipt.hash,
            block = receipt.block_label(),
            delay = schedule.initial_delay.as_secs(),
            interval = schedule.interval.as_secs(),
            max = schedule.max_deposits,
            url = receipt.explorer_url(),
        ))
    }

    fn failure_reply(&self, ctx: &ActionContext, error: &ChainError) -> String {
        format!(
            "❌ AI Agent SIP creation failed: {error}

**Troubleshooting:**
- Check AI agent wallet balance
- Verify contract addresses
- Ensure network connectivity

**AI Agent Details:**
- Address: {agent}
- Network: Avalanche Fuji Testnet",
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

    fn target_for(monthly: &str) -> String {
        format_amount(default_target(parse_amount(monthly).unwrap()).unwrap())
    }

    #[test]
    fn default_target_uses_whole_tokens() {
        assert_eq!(target_for("20"), "240");
        assert_eq!(target_for("2.9"), "24");
    }

    #[test]
    fn default_target_handles_amounts_beyond_u64() {
        assert_eq!(target_for("2000000000000000000"), "24000000000000000000");
        assert_eq!(target_for("99999999999999999999"), "1199999999999999999988");
    }

    #[test]
    fn default_target_rejects_overflow() {
        assert!(matches!(
            default_target(U256::MAX),
            Err(ChainError::InvalidAmount(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn large_monthly_amount_keeps_full_target() {
        let chain = Arc::new(MockChain::new());
        let ctx = ActionContext::new(Some(chain.clone()));

        let reply = CreateSipAction
            .handle(&ctx, "create a sip with 2000000000000000000 tokens")
            .await;
        assert!(reply.success, "{}", reply.text);
        assert_eq!(
            chain.calls()[0],
            "create_sip 2000000000000000000 24000000000000000000 AI agent systematic investment"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn creates_plan_with_extracted_parameters() {
        let chain = Arc::new(MockChain::new());
        let ctx = ActionContext::new(Some(chain.clone()));

        let reply = CreateSipAction
            .handle(&ctx, "Create a SIP with 15 tokens monthly, target 300. Goal: new car")
            .await;

        assert!(reply.success, "{}", reply.text);
        assert_eq!(chain.calls()[0], "create_sip 15 300 new car");
        assert!(reply.text.contains("TX Hash: 0xcreate"));
        assert!(reply.text.contains("Block: 42"));
        assert!(reply.text.contains("https://testnet.snowtrace.io/tx/0xcreate"));
        assert!(reply.text.contains("every 90 seconds"));
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_defaults() {
        let chain = Arc::new(MockChain::new());
        let ctx = ActionContext::new(Some(chain.clone()));

        CreateSipAction.handle(&ctx, "start a sip").await;
        assert_eq!(chain.calls()[0], "create_sip 20 240 AI agent systematic investment");
    }

    #[tokio::test(start_paused = true)]
    async fn starts_automation_after_creation() {
        let chain = Arc::new(MockChain::new());
        let ctx = ActionContext::new(Some(chain.clone()));

        CreateSipAction.handle(&ctx, "make a sip with 5 tokens").await;
        tokio::time::sleep(std::time::Duration::from_secs(151)).await;
        assert_eq!(chain.calls(), vec!["create_sip 5 60 AI agent systematic investment", "deposit 5"]);
    }

    #[tokio::test]
    async fn chain_errors_become_failure_reply() {
        let chain = Arc::new(MockChain::new());
        *chain.fail_with.lock().unwrap() = Some("execution reverted".into());
        let ctx = ActionContext::new(Some(chain.clone()));

        let reply = CreateSipAction.handle(&ctx, "create sip plan").await;
        assert!(!reply.success);
        assert!(reply.text.starts_with(
            "❌ AI Agent SIP creation failed: contract call failed: execution reverted"
        ));
        assert!(reply.text.contains(&chain.address.to_string()));
    }
}
