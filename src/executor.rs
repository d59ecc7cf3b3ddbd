use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::digits::parse_price;
use crate::error::CoreError;
use crate::feed::Session;
use crate::types::{ContractResult, PatternEvent};

/// Contract type for the "Over 1" strategy: last digit strictly above 1.
const CONTRACT_TYPE: &str = "DIGITOVER";

/// Digit barrier. Win when the settlement digit is 2 or higher.
const BARRIER: u8 = 1;

/// Contract duration, in ticks.
const DURATION_TICKS: u8 = 1;

/// Delay between settlement polls.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Give up polling for settlement after this long.
const SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Places "Over 1" contracts on the venue over a shared [`Session`].
///
/// One pattern maps to one contract: proposal, buy by proposal id, then poll
/// the open contract until it settles. There is no automatic retry — a
/// failure is reported to the caller, which releases the engine guard so the
/// next pattern may attempt again.
pub struct TradeExecutor {
    session: Session,
    stake: f64,
    currency: String,
}

impl TradeExecutor {
    pub fn new(session: Session, stake: f64, currency: impl Into<String>) -> Self {
        Self {
            session,
            stake,
            currency: currency.into(),
        }
    }

    /// Execute one contract for a detected pattern and await settlement.
    pub async fn execute(&self, pattern: &PatternEvent) -> Result<ContractResult, CoreError> {
        let streak: String = pattern.streak.iter().map(|d| d.to_string()).collect();
        info!(
            symbol = %pattern.symbol,
            "pattern {streak} broken by {}, placing {CONTRACT_TYPE} contract at {}",
            pattern.break_digit,
            self.stake,
        );

        let proposal = self
            .request(json!({
                "proposal": 1,
                "amount": self.stake,
                "basis": "stake",
                "contract_type": CONTRACT_TYPE,
                "currency": self.currency,
                "symbol": pattern.symbol,
                "barrier": BARRIER,
                "duration": DURATION_TICKS,
                "duration_unit": "t",
            }))
            .await?;
        let proposal_id = proposal["proposal"]["id"]
            .as_str()
            .ok_or_else(|| CoreError::ExecutionFailure("proposal response without id".into()))?
            .to_string();

        let bought = self
            .request(json!({ "buy": proposal_id, "price": self.stake }))
            .await?;
        let contract_id = bought["buy"]["contract_id"].as_u64().ok_or_else(|| {
            CoreError::ExecutionFailure("buy response without contract_id".into())
        })?;
        let buy_price = bought["buy"]["buy_price"].as_f64().unwrap_or(self.stake);
        info!(contract_id, buy_price, "contract opened");

        self.poll_settlement(contract_id, buy_price).await
    }

    /// Query the account balance.
    pub async fn balance(&self) -> Result<f64, CoreError> {
        let (balance, _) = self
            .session
            .balance()
            .await
            .map_err(|e| CoreError::ExecutionFailure(e.to_string()))?;
        Ok(balance)
    }

    async fn poll_settlement(
        &self,
        contract_id: u64,
        buy_price: f64,
    ) -> Result<ContractResult, CoreError> {
        let deadline = tokio::time::Instant::now() + SETTLEMENT_TIMEOUT;
        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(CoreError::ExecutionFailure(format!(
                    "contract {contract_id} not settled within {SETTLEMENT_TIMEOUT:?}"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;

            let status = self
                .request(json!({ "proposal_open_contract": 1, "contract_id": contract_id }))
                .await?;
            let contract = &status["proposal_open_contract"];
            let sold = contract["is_sold"].as_u64().unwrap_or(0) == 1
                || contract["is_sold"].as_bool().unwrap_or(false);
            if !sold {
                continue;
            }

            let profit = contract["profit"].as_f64().unwrap_or(0.0);
            let won = profit > 0.0;
            let exit_tick = contract
                .get("exit_tick")
                .filter(|v| !v.is_null())
                .and_then(|v| parse_price(v).ok());
            if won {
                info!(contract_id, profit, "contract settled: won");
            } else {
                info!(contract_id, profit, "contract settled: lost");
            }
            return Ok(ContractResult {
                contract_id,
                buy_price,
                profit,
                won,
                exit_tick,
            });
        }
    }

    /// Send a request and reject venue-level errors as `ExecutionFailure`.
    async fn request(&self, body: Value) -> Result<Value, CoreError> {
        let resp = self
            .session
            .request(body)
            .await
            .map_err(|e| CoreError::ExecutionFailure(e.to_string()))?;
        if let Some(err) = resp.get("error") {
            let message = err
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown venue error");
            warn!("venue rejected request: {message}");
            return Err(CoreError::ExecutionFailure(message.to_string()));
        }
        Ok(resp)
    }
}
