//! Extractor: maps the solver's free-text thesis into strict fields
//!
//! One forced-schema call, then deterministic edge gating. On any
//! failure (solver failure, transport, schema violation) a pure
//! closed-form estimate takes over; it has no external dependency and
//! is the system's circuit breaker against total backend unavailability.

use crate::backend::{propose, ModelTier, ReasoningBackend};
use crate::config::ExtractorParams;
use crate::error::Result;
use crate::models::{
    clamp_finite, Confidence, MarketSnapshot, Recommendation, StructuredAnalysis,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

pub(crate) const EXTRACTION_SCHEMA: &str = r#"{"sentiment_score": number in [-1,1], "momentum": number in [-1,1], "orderbook_skew": number in [-1,1], "signals": [string], "p_model": number in [0,1]}"#;

#[derive(Debug, Deserialize)]
struct RawExtraction {
    sentiment_score: f64,
    momentum: f64,
    orderbook_skew: f64,
    #[serde(default)]
    signals: Vec<String>,
    p_model: f64,
}

pub struct Extractor {
    backend: Arc<dyn ReasoningBackend>,
    params: ExtractorParams,
}

impl Extractor {
    pub fn new(backend: Arc<dyn ReasoningBackend>, params: ExtractorParams) -> Self {
        Self { backend, params }
    }

    /// Produce a StructuredAnalysis, always. A missing or unparseable
    /// solver answer downgrades to the closed-form path; it never
    /// crashes the cycle.
    pub async fn extract(
        &self,
        solver_answer: Option<&str>,
        snapshot: &MarketSnapshot,
    ) -> StructuredAnalysis {
        if let Some(answer) = solver_answer {
            match self.extract_structured(answer, snapshot).await {
                Ok(analysis) => return analysis,
                Err(e) => {
                    warn!(error = %e, "Extraction failed, engaging closed-form fallback");
                }
            }
        } else {
            warn!("No solver answer this cycle, engaging closed-form fallback");
        }
        self.closed_form(snapshot)
    }

    async fn extract_structured(
        &self,
        answer: &str,
        snapshot: &MarketSnapshot,
    ) -> Result<StructuredAnalysis> {
        let prompt = format!(
            "Convert this market thesis into strict numeric fields. \
             The market currently implies a YES probability of {:.3}.\n\n\
             Thesis:\n{}",
            snapshot.p_market(),
            answer
        );

        let raw: RawExtraction =
            propose(self.backend.as_ref(), &prompt, EXTRACTION_SCHEMA, ModelTier::Smart).await?;

        Ok(self.finish(
            raw.sentiment_score,
            raw.momentum,
            raw.orderbook_skew,
            raw.signals,
            raw.p_model,
            snapshot,
        ))
    }

    /// Pure closed-form estimate:
    /// p_model = sigmoid(sentiment*k1 + (distance_pct/unit)*time_weight*k2),
    /// time_weight = max(0, 1 - minutes_remaining/window).
    pub fn closed_form(&self, snapshot: &MarketSnapshot) -> StructuredAnalysis {
        let skew = snapshot.orderbook_skew();
        let sentiment = clamp_finite(
            0.6 * snapshot.change_1h_pct + 0.2 * snapshot.change_24h_pct + 0.2 * skew,
            -1.0,
            1.0,
        );
        let momentum = clamp_finite(snapshot.change_1h_pct, -1.0, 1.0);

        let time_weight =
            (1.0 - snapshot.minutes_to_expiry / self.params.window_minutes).max(0.0);
        let z = sentiment * self.params.k1
            + (snapshot.distance_from_strike_pct / self.params.distance_unit_pct)
                * time_weight
                * self.params.k2;
        let p_model = sigmoid(z);

        self.finish(
            sentiment,
            momentum,
            skew,
            vec!["closed-form fallback".to_string()],
            p_model,
            snapshot,
        )
    }

    /// Deterministic edge gating applied to both paths. Backend numbers
    /// are clamped before the edge is computed.
    fn finish(
        &self,
        sentiment_score: f64,
        momentum: f64,
        orderbook_skew: f64,
        signals: Vec<String>,
        p_model: f64,
        snapshot: &MarketSnapshot,
    ) -> StructuredAnalysis {
        let p_model = clamp_finite(p_model, 0.0, 1.0);
        let edge = p_model - snapshot.p_market();
        let threshold = snapshot.spread() + self.params.edge_epsilon;

        let recommendation = if edge > threshold {
            Recommendation::Yes
        } else if edge < -threshold {
            Recommendation::No
        } else {
            Recommendation::NoTrade
        };

        // Tolerance so float noise at an exact cutoff (0.60 - 0.52 is
        // slightly below 0.08 in f64) never demotes the bucket.
        let magnitude = edge.abs() + BUCKET_TOLERANCE;
        let confidence = if magnitude >= self.params.high_confidence_edge {
            Confidence::High
        } else if magnitude >= self.params.medium_confidence_edge {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        StructuredAnalysis::clamped(
            sentiment_score,
            momentum,
            orderbook_skew,
            signals,
            p_model,
            recommendation,
            confidence,
        )
    }
}

const BUCKET_TOLERANCE: f64 = 1e-9;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
