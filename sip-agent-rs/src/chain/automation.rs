use super::{DepositOutcome, SipChain, format_amount};
use alloy::primitives::U256;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};

/// Timing of the recurring deposits that follow a new plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositSchedule {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub max_deposits: u32,
}

impl Default for DepositSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(60),
            interval: Duration::from_secs(90),
            max_deposits: 5,
        }
    }
}

/// Deposit schedules started by this agent, so they can be stopped together.
#[derive(Clone, Default)]
pub struct ScheduleRegistry {
    running: Arc<Mutex<Vec<AbortHandle>>>,
}

impl ScheduleRegistry {
    pub fn track(&self, handle: &JoinHandle<u32>) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        running.retain(|h| !h.is_finished());
        running.push(handle.abort_handle());
    }

    /// Number of schedules still running.
    pub fn active(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Aborts every running schedule and returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let handles: Vec<AbortHandle> = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let mut stopped = 0;
        for handle in handles.into_iter().filter(|h| !h.is_finished()) {
            handle.abort();
            stopped += 1;
        }
        if stopped > 0 {
            tracing::warn!(stopped, "deposit automation stopped");
        }
        stopped
    }
}

/// Runs up to `max_deposits` deposit attempts, the first one `initial_delay +
/// interval` from now. Stops early once the wallet cannot cover `amount`.
/// Resolves to the number of deposits that went through.
pub fn spawn_deposit_schedule(
    chain: Arc<dyn SipChain>,
    amount: U256,
    schedule: DepositSchedule,
) -> JoinHandle<u32> {
    tokio::spawn(async move {
        tokio::time::sleep(schedule.initial_delay).await;
        tracing::info!(
            agent = %chain.agent_address(),
            amount = %format_amount(amount),
            every_secs = schedule.interval.as_secs(),
            "starting deposit automation"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + schedule.interval, schedule.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut completed = 0;
        for attempt in 1..=schedule.max_deposits {
            ticker.tick().await;
            match chain.deposit(amount).await {
                Ok(DepositOutcome::Deposited(receipt)) => {
                    completed += 1;
                    tracing::info!(attempt, hash = %receipt.hash, "automated deposit executed");
                    chain.log_balance_distribution().await;
                }
                Ok(DepositOutcome::InsufficientBalance { need, have }) => {
                    tracing::warn!(
                        attempt,
                        need = %format_amount(need),
                        have = %format_amount(have),
                        "insufficient balance, stopping automation"
                    );
                    return completed;
                }
                Err(e) => tracing::error!(attempt, error = %e, "automated deposit failed"),
            }
        }

        tracing::info!(deposits = completed, "deposit automation finished");
        completed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::chain::parse_amount;

    fn schedule() -> DepositSchedule {
        DepositSchedule::default()
    }

    #[tokio::test(start_paused = true)]
    async fn first_deposit_waits_for_delay_plus_interval() {
        let chain = Arc::new(MockChain::new());
        let handle = spawn_deposit_schedule(chain.clone(), parse_amount("20").unwrap(), schedule());

        tokio::time::sleep(Duration::from_secs(149)).await;
        assert!(chain.calls().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(chain.calls(), vec!["deposit 20"]);

        assert_eq!(handle.await.unwrap(), 5);
        assert_eq!(chain.calls().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_balance_runs_out() {
        let chain = Arc::new(MockChain::new());
        {
            let mut scripted = chain.deposits.lock().unwrap();
            scripted.push(DepositOutcome::Deposited(MockChain::receipt("d1")));
            scripted.push(DepositOutcome::InsufficientBalance {
                need: parse_amount("20").unwrap(),
                have: parse_amount("3").unwrap(),
            });
        }

        let handle = spawn_deposit_schedule(chain.clone(), parse_amount("20").unwrap(), schedule());
        assert_eq!(handle.await.unwrap(), 1);
        assert_eq!(chain.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deposits_count_as_attempts() {
        let chain = Arc::new(MockChain::new());
        *chain.fail_with.lock().unwrap() = Some("nonce too low".into());

        let handle = spawn_deposit_schedule(chain.clone(), parse_amount("1").unwrap(), schedule());
        assert_eq!(handle.await.unwrap(), 0);
        assert_eq!(chain.calls().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_schedules_make_no_more_deposits() {
        let chain = Arc::new(MockChain::new());
        let registry = ScheduleRegistry::default();
        let handle = spawn_deposit_schedule(chain.clone(), parse_amount("20").unwrap(), schedule());
        registry.track(&handle);
        assert_eq!(registry.active(), 1);

        tokio::time::sleep(Duration::from_secs(151)).await;
        assert_eq!(chain.calls().len(), 1);

        assert_eq!(registry.stop_all(), 1);
        assert!(handle.await.unwrap_err().is_cancelled());
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(chain.calls().len(), 1);
        assert_eq!(registry.active(), 0);
    }
}
