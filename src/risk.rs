//! Risk management: stateful capital-safety gate
//!
//! Kelly-derived sizing behind hard circuit breakers. Breakers are
//! evaluated in strict priority order and are never overridden by AI
//! judgment; the AI-assisted variant can only veto or shrink a position
//! the deterministic gate already approved.

use crate::backend::{propose, ModelTier, ReasoningBackend};
use crate::config::RiskLimits;
use crate::error::Result;
use crate::models::{Recommendation, RiskDecision, SessionRiskState, StructuredAnalysis};
use crate::solver::Solver;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

//
// ================= Session State Handle =================
//

/// Caller-owned handle to the process-lifetime session state. Cloning
/// shares the same state. Settlement writes take the single write lock;
/// risk evaluation only reads (apart from calendar rollover).
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<SessionRiskState>>,
}

impl SessionHandle {
    pub fn new(trading_date: NaiveDate) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionRiskState::new(trading_date))),
        }
    }

    pub fn today() -> Self {
        Self::new(Utc::now().date_naive())
    }

    pub async fn snapshot(&self) -> SessionRiskState {
        *self.inner.read().await
    }

    /// Settlement callback, invoked externally when a prior trade
    /// resolves. The only non-rollover mutation of session state.
    pub async fn record_trade_result(&self, pnl: f64) {
        let mut state = self.inner.write().await;
        state.daily_pnl += pnl;
        state.trade_count += 1;
        if state.daily_pnl > state.peak_pnl {
            state.peak_pnl = state.daily_pnl;
        }
        info!(
            pnl,
            daily_pnl = state.daily_pnl,
            trade_count = state.trade_count,
            "Trade result recorded"
        );
    }

    /// Reset counters when the exchange-local date has changed. Runs
    /// before any breaker on every evaluation.
    pub async fn rollover_if_needed(&self, today: NaiveDate) {
        // Cheap read first; the write lock is taken only on an actual
        // date change.
        if self.inner.read().await.trading_date == today {
            return;
        }
        let mut state = self.inner.write().await;
        if state.trading_date != today {
            info!(from = %state.trading_date, to = %today, "Calendar rollover, resetting session");
            *state = SessionRiskState::new(today);
        }
    }
}

//
// ================= Deterministic Risk Manager =================

pub struct RiskManager {
    limits: RiskLimits,
    session: SessionHandle,
}

impl RiskManager {
    pub fn new(limits: RiskLimits, session: SessionHandle) -> Self {
        Self { limits, session }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Evaluate the hard breakers and, if clear, size the position.
    /// Infallible: risk evaluation never crashes a cycle.
    pub async fn evaluate(
        &self,
        analysis: &StructuredAnalysis,
        price_cents: f64,
        today: NaiveDate,
    ) -> RiskDecision {
        // 1. Calendar rollover before anything else.
        self.session.rollover_if_needed(today).await;
        let state = self.session.snapshot().await;

        // 2. No edge, no trade.
        if analysis.recommendation == Recommendation::NoTrade {
            return RiskDecision::rejected("edge below minimum threshold", &state);
        }

        // 3. Daily loss breaker.
        if state.daily_pnl <= self.limits.max_daily_loss {
            warn!(daily_pnl = state.daily_pnl, "Daily loss limit breaker tripped");
            return RiskDecision::rejected(
                format!(
                    "daily loss limit reached ({:.2} <= {:.2})",
                    state.daily_pnl, self.limits.max_daily_loss
                ),
                &state,
            );
        }

        // 4. Drawdown-from-peak breaker.
        let drawdown = state.drawdown_pct();
        if drawdown >= self.limits.max_drawdown_pct {
            warn!(drawdown_pct = drawdown, "Drawdown breaker tripped");
            return RiskDecision::rejected(
                format!(
                    "drawdown limit reached ({:.1}% >= {:.1}%)",
                    drawdown * 100.0,
                    self.limits.max_drawdown_pct * 100.0
                ),
                &state,
            );
        }

        // 5. Trade-count breaker.
        if state.trade_count >= self.limits.max_trades_per_day {
            return RiskDecision::rejected(
                format!("daily trade cap reached ({})", self.limits.max_trades_per_day),
                &state,
            );
        }

        if !(price_cents > 0.0 && price_cents < 100.0) {
            return RiskDecision::rejected("no tradeable quote", &state);
        }

        let contracts = kelly_contracts(price_cents, analysis.p_model, &self.limits);
        let max_loss = price_cents / 100.0 * contracts as f64;

        RiskDecision {
            approved: true,
            rejection_reason: None,
            position_size: contracts,
            max_loss,
            daily_pnl: state.daily_pnl,
            drawdown_pct: drawdown,
            trade_count: state.trade_count,
        }
    }
}

/// Fractional Kelly sizing on simplified binary odds:
/// b = (100 - price) / price, f = max(0, (b*p - (1-p)) / b),
/// then the fractional discount and the contract clamp.
pub(crate) fn kelly_contracts(price_cents: f64, p_model: f64, limits: &RiskLimits) -> u32 {
    let b = (100.0 - price_cents) / price_cents;
    let f = ((b * p_model - (1.0 - p_model)) / b).max(0.0);
    let raw = f * limits.kelly_fraction * limits.bankroll_contracts as f64;
    (raw.floor() as u32).clamp(limits.min_contracts, limits.max_contracts)
}

//
// ================= AI-Assisted Risk Manager =================

pub(crate) const AI_RISK_SCHEMA: &str =
    r#"{"approved": boolean, "position_size": integer, "reasoning": string}"#;

#[derive(Debug, Deserialize)]
struct AiRiskVerdict {
    approved: bool,
    position_size: u32,
    reasoning: String,
}

/// Runs the identical hard breakers first and unconditionally, then
/// asks a depth-0 solve to refine the approved position. Any failure in
/// the AI path falls back entirely to the deterministic decision.
pub struct AiRiskManager {
    base: RiskManager,
    solver: Solver,
    backend: Arc<dyn ReasoningBackend>,
}

impl AiRiskManager {
    pub fn new(base: RiskManager, solver: Solver, backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { base, solver, backend }
    }

    pub fn session(&self) -> &SessionHandle {
        self.base.session()
    }

    pub async fn evaluate(
        &self,
        analysis: &StructuredAnalysis,
        context: &str,
        price_cents: f64,
        today: NaiveDate,
    ) -> RiskDecision {
        let base = self.base.evaluate(analysis, price_cents, today).await;
        if !base.approved {
            return base;
        }

        match self.refine(analysis, context, &base, price_cents).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "AI risk path failed, keeping deterministic decision");
                base
            }
        }
    }

    async fn refine(
        &self,
        analysis: &StructuredAnalysis,
        context: &str,
        base: &RiskDecision,
        price_cents: f64,
    ) -> Result<RiskDecision> {
        let goal = format!(
            "A {} trade passed all hard risk breakers with model probability \
             {:.3} at {:.0}c and a deterministic size of {} contracts. \
             Judge whether the trade quality justifies that size, a smaller \
             size, or standing aside.",
            analysis.recommendation, analysis.p_model, price_cents, base.position_size
        );

        let solved = self.solver.solve_atomic(&goal, context).await?;

        let prompt = format!(
            "Risk assessment:\n{}\n\nDecide approval and position size \
             (at most {} contracts).",
            solved.answer, base.position_size
        );
        let verdict: AiRiskVerdict =
            propose(self.backend.as_ref(), &prompt, AI_RISK_SCHEMA, ModelTier::Smart).await?;

        if !verdict.approved {
            info!(reasoning = %verdict.reasoning, "AI risk veto");
            return Ok(RiskDecision {
                approved: false,
                rejection_reason: Some(format!("AI risk veto: {}", verdict.reasoning)),
                position_size: 0,
                max_loss: 0.0,
                ..base.clone()
            });
        }

        // Strictly a refinement: the AI can shrink the deterministic
        // size but never enlarge it past the approved bound.
        let contracts = verdict
            .position_size
            .clamp(self.base.limits.min_contracts, base.position_size);

        Ok(RiskDecision {
            position_size: contracts,
            max_loss: price_cents / 100.0 * contracts as f64,
            ..base.clone()
        })
    }
}
