//! Core data models for the market reader

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    StronglyBearish,
    Bearish,
    Neutral,
    Bullish,
    StronglyBullish,
}

impl SentimentLabel {
    /// Bucket a clamped sentiment score into its label.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.6 {
            SentimentLabel::StronglyBullish
        } else if score >= 0.2 {
            SentimentLabel::Bullish
        } else if score > -0.2 {
            SentimentLabel::Neutral
        } else if score > -0.6 {
            SentimentLabel::Bearish
        } else {
            SentimentLabel::StronglyBearish
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Yes,
    No,
    NoTrade,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    BuyYes,
    BuyNo,
    Pass,
}

//
// ================= Market Snapshot =================
//

/// Best bid/ask for one side of a binary market, in cents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SideQuote {
    pub bid_cents: f64,
    pub ask_cents: f64,
}

impl SideQuote {
    /// A quote is tradeable when the ask is a real price inside (0, 100).
    pub fn is_tradeable(&self) -> bool {
        self.ask_cents > 0.0 && self.ask_cents < 100.0
    }
}

/// One sampled orderbook level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price_cents: f64,
    pub quantity: f64,
}

/// Top-of-book quotes for both sides of the market.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TopOfBook {
    pub yes: SideQuote,
    pub no: SideQuote,
}

/// Periodic snapshot of a binary market, fetched fresh by the caller
/// each cycle. Opaque to the reasoning stages once formatted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_ticker: String,
    pub current_price: f64,
    pub change_1h_pct: f64,
    pub change_24h_pct: f64,
    pub strike_price: f64,
    /// Signed distance from strike as a percentage of strike; positive
    /// means the underlying trades above the strike.
    pub distance_from_strike_pct: f64,
    pub minutes_to_expiry: f64,
    pub book: TopOfBook,
    #[serde(default)]
    pub yes_depth: Vec<DepthLevel>,
    #[serde(default)]
    pub no_depth: Vec<DepthLevel>,
}

impl MarketSnapshot {
    /// Market-implied YES probability from the mid of the YES quote,
    /// clamped away from the degenerate 0/1 endpoints.
    pub fn p_market(&self) -> f64 {
        let mid = (self.book.yes.bid_cents + self.book.yes.ask_cents) / 2.0;
        (mid / 100.0).clamp(0.01, 0.99)
    }

    /// YES bid/ask spread expressed as a probability.
    pub fn spread(&self) -> f64 {
        ((self.book.yes.ask_cents - self.book.yes.bid_cents) / 100.0).max(0.0)
    }

    /// Resting-size imbalance between YES and NO depth, in [-1, 1].
    /// Zero when no depth was sampled.
    pub fn orderbook_skew(&self) -> f64 {
        let yes_qty: f64 = self.yes_depth.iter().map(|l| l.quantity).sum();
        let no_qty: f64 = self.no_depth.iter().map(|l| l.quantity).sum();
        let total = yes_qty + no_qty;
        if total <= 0.0 {
            return 0.0;
        }
        ((yes_qty - no_qty) / total).clamp(-1.0, 1.0)
    }

    /// Render the snapshot as the opaque context block handed to every
    /// reasoning stage. Passed unchanged through a recursion level.
    pub fn format_context(&self) -> String {
        format!(
            "Market: {}\n\
             Current price: {:.2}\n\
             Strike price: {:.2}\n\
             Distance from strike: {:+.3}%\n\
             1h change: {:+.3}%\n\
             24h change: {:+.3}%\n\
             Minutes to expiry: {:.1}\n\
             YES bid/ask: {:.0}c / {:.0}c\n\
             NO bid/ask: {:.0}c / {:.0}c\n\
             Orderbook skew (YES-NO resting size): {:+.3}",
            self.market_ticker,
            self.current_price,
            self.strike_price,
            self.distance_from_strike_pct,
            self.change_1h_pct,
            self.change_24h_pct,
            self.minutes_to_expiry,
            self.book.yes.bid_cents,
            self.book.yes.ask_cents,
            self.book.no.bid_cents,
            self.book.no.ask_cents,
            self.orderbook_skew(),
        )
    }
}

//
// ================= Solver Tree =================
//

/// One planned sub-question. Created by the Planner, filled by the
/// recursive solve; owned by its SolveResult, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub goal: String,
    #[serde(default)]
    pub result: Option<String>,
}

/// One recursion level's outcome. Parents absorb children's answers
/// through the Aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    pub answer: String,
    pub subtasks: Vec<SubTask>,
    pub was_atomic: bool,
}

//
// ================= Structured Analysis =================
//

/// Strictly-typed market thesis. All bounded fields are clamped at
/// construction; backend output is never trusted raw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub momentum: f64,
    pub orderbook_skew: f64,
    pub signals: Vec<String>,
    pub p_model: f64,
    pub recommendation: Recommendation,
    pub confidence: Confidence,
}

impl StructuredAnalysis {
    /// Clamp every bounded field into its documented range.
    #[allow(clippy::too_many_arguments)]
    pub fn clamped(
        sentiment_score: f64,
        momentum: f64,
        orderbook_skew: f64,
        signals: Vec<String>,
        p_model: f64,
        recommendation: Recommendation,
        confidence: Confidence,
    ) -> Self {
        let sentiment_score = clamp_finite(sentiment_score, -1.0, 1.0);
        Self {
            sentiment_score,
            sentiment_label: SentimentLabel::from_score(sentiment_score),
            momentum: clamp_finite(momentum, -1.0, 1.0),
            orderbook_skew: clamp_finite(orderbook_skew, -1.0, 1.0),
            signals,
            p_model: clamp_finite(p_model, 0.0, 1.0),
            recommendation,
            confidence,
        }
    }
}

/// Clamp with NaN/inf collapsed to the range midpoint.
pub fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        (min + max) / 2.0
    }
}

//
// ================= Session Risk State =================
//

/// Process-lifetime trading session state. Mutated only by the
/// settlement callback and by calendar-rollover reset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SessionRiskState {
    pub daily_pnl: f64,
    pub trade_count: u32,
    pub peak_pnl: f64,
    pub trading_date: NaiveDate,
}

impl SessionRiskState {
    pub fn new(trading_date: NaiveDate) -> Self {
        Self {
            daily_pnl: 0.0,
            trade_count: 0,
            peak_pnl: 0.0,
            trading_date,
        }
    }

    /// Percentage decline of current P&L from its session peak.
    pub fn drawdown_pct(&self) -> f64 {
        if self.peak_pnl > 0.0 {
            ((self.peak_pnl - self.daily_pnl) / self.peak_pnl).max(0.0)
        } else {
            0.0
        }
    }
}

//
// ================= Risk Decision =================
//

/// Output of a risk evaluation. Recomputed fresh every cycle and never
/// persisted; always carries the session snapshot for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDecision {
    pub approved: bool,
    pub rejection_reason: Option<String>,
    pub position_size: u32,
    pub max_loss: f64,
    pub daily_pnl: f64,
    pub drawdown_pct: f64,
    pub trade_count: u32,
}

impl RiskDecision {
    pub fn rejected(reason: impl Into<String>, state: &SessionRiskState) -> Self {
        Self {
            approved: false,
            rejection_reason: Some(reason.into()),
            position_size: 0,
            max_loss: 0.0,
            daily_pnl: state.daily_pnl,
            drawdown_pct: state.drawdown_pct(),
            trade_count: state.trade_count,
        }
    }
}

//
// ================= Execution Spec =================
//

/// Concrete order specification, or a PASS. Pure data; carries no
/// side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSpec {
    pub action: TradeAction,
    pub side: Option<String>,
    pub limit_price_cents: f64,
    pub contracts: u32,
    pub estimated_cost: f64,
    pub estimated_payout: f64,
    pub market_ticker: String,
    pub rationale: String,
}

//
// ================= Cycle Report =================
//

/// Everything one cycle produced, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub analysis: StructuredAnalysis,
    pub risk: RiskDecision,
    pub execution: ExecutionSpec,
    /// Human-readable solver subtask tree for observability.
    pub trace: String,
    /// SHA-256 of the formatted context, for replay verification.
    pub context_hash: String,
    pub duration_ms: u64,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Yes => "YES",
            Recommendation::No => "NO",
            Recommendation::NoTrade => "NO_TRADE",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeAction::BuyYes => "BUY_YES",
            TradeAction::BuyNo => "BUY_NO",
            TradeAction::Pass => "PASS",
        };
        write!(f, "{}", s)
    }
}
