//! Environment-driven configuration
//!
//! Model tiers map to concrete provider models here and nowhere else;
//! no reasoning stage depends on which model backs a tier.

use crate::error::{ReaderError, Result};

/// Closed set of reasoning providers, chosen at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenRouter,
}

impl Provider {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openrouter" => Ok(Provider::OpenRouter),
            other => Err(ReaderError::Config(format!(
                "unknown AI_PROVIDER '{}', expected gemini|openrouter",
                other
            ))),
        }
    }
}

/// Backend wiring: provider, credentials and the tier→model mapping.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub provider: Provider,
    pub api_key: String,
    pub fast_model: String,
    pub smart_model: String,
    /// Hard per-call timeout, seconds.
    pub request_timeout_secs: u64,
}

/// Hard capital-safety limits. Never overridden by AI judgment.
#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    /// Daily loss floor in dollars (negative number).
    pub max_daily_loss: f64,
    /// Drawdown-from-peak fraction that halts trading.
    pub max_drawdown_pct: f64,
    pub max_trades_per_day: u32,
    pub min_contracts: u32,
    pub max_contracts: u32,
    /// Fractional Kelly discount (0.5 = half Kelly).
    pub kelly_fraction: f64,
    /// Bankroll expressed in contracts; Kelly output scales against it.
    pub bankroll_contracts: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_daily_loss: -150.0,
            max_drawdown_pct: 0.30,
            max_trades_per_day: 10,
            min_contracts: 1,
            max_contracts: 100,
            kelly_fraction: 0.5,
            bankroll_contracts: 100,
        }
    }
}

impl RiskLimits {
    /// Reject limit combinations the sizing path cannot honor. A bad
    /// environment must fail configuration, not a later evaluation.
    pub fn validate(&self) -> Result<()> {
        if self.min_contracts > self.max_contracts {
            return Err(ReaderError::Config(format!(
                "MIN_CONTRACTS ({}) exceeds MAX_CONTRACTS ({})",
                self.min_contracts, self.max_contracts
            )));
        }
        if !(self.kelly_fraction > 0.0 && self.kelly_fraction <= 1.0) {
            return Err(ReaderError::Config(format!(
                "KELLY_FRACTION must be in (0, 1], got {}",
                self.kelly_fraction
            )));
        }
        Ok(())
    }
}

/// Constants of the closed-form probability estimate and edge gating.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorParams {
    /// Sentiment weight inside the sigmoid.
    pub k1: f64,
    /// Distance-from-strike weight inside the sigmoid.
    pub k2: f64,
    /// Distance percentage normalization unit.
    pub distance_unit_pct: f64,
    /// Contract window length in minutes (15 for KXBTC15M-style markets).
    pub window_minutes: f64,
    /// Fixed epsilon added to the spread to form the edge threshold.
    pub edge_epsilon: f64,
    /// |edge| at or above this is high confidence.
    pub high_confidence_edge: f64,
    /// |edge| at or above this is medium confidence.
    pub medium_confidence_edge: f64,
}

impl Default for ExtractorParams {
    fn default() -> Self {
        Self {
            k1: 2.0,
            k2: 1.5,
            distance_unit_pct: 0.5,
            window_minutes: 15.0,
            edge_epsilon: 0.02,
            high_confidence_edge: 0.15,
            medium_confidence_edge: 0.08,
        }
    }
}

/// Top-level configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub model: ModelConfig,
    pub risk: RiskLimits,
    pub extractor: ExtractorParams,
    /// Recursion bound for the solver. Small and hard; caps leaf calls
    /// at fanout^max_depth.
    pub max_depth: usize,
    /// Route risk evaluation through the AI-assisted variant.
    pub use_ai_risk: bool,
}

const MAX_DEPTH_CAP: usize = 2;

impl ReaderConfig {
    /// Load configuration from environment variables (`.env` honored by
    /// the binaries via dotenv before calling this).
    pub fn from_env() -> Result<Self> {
        let provider = Provider::parse(
            &std::env::var("AI_PROVIDER").unwrap_or_else(|_| "openrouter".to_string()),
        )?;

        let api_key = match provider {
            Provider::Gemini => std::env::var("GEMINI_API_KEY"),
            Provider::OpenRouter => std::env::var("OPENROUTER_API_KEY"),
        }
        .map_err(|_| ReaderError::Config("provider API key not set".to_string()))?;

        let (default_fast, default_smart) = match provider {
            Provider::Gemini => ("gemini-2.0-flash", "gemini-2.0-flash"),
            Provider::OpenRouter => (
                "anthropic/claude-3-5-haiku",
                "anthropic/claude-sonnet-4-5",
            ),
        };

        let model = ModelConfig {
            provider,
            api_key,
            fast_model: std::env::var("FAST_MODEL").unwrap_or_else(|_| default_fast.to_string()),
            smart_model: std::env::var("SMART_MODEL")
                .unwrap_or_else(|_| default_smart.to_string()),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30)?,
        };

        let risk = RiskLimits {
            max_daily_loss: env_parse("MAX_DAILY_LOSS", RiskLimits::default().max_daily_loss)?,
            max_drawdown_pct: env_parse(
                "MAX_DRAWDOWN_PCT",
                RiskLimits::default().max_drawdown_pct,
            )?,
            max_trades_per_day: env_parse(
                "MAX_TRADES_PER_DAY",
                RiskLimits::default().max_trades_per_day,
            )?,
            min_contracts: env_parse("MIN_CONTRACTS", RiskLimits::default().min_contracts)?,
            max_contracts: env_parse("MAX_CONTRACTS", RiskLimits::default().max_contracts)?,
            kelly_fraction: env_parse("KELLY_FRACTION", RiskLimits::default().kelly_fraction)?,
            bankroll_contracts: env_parse(
                "BANKROLL_CONTRACTS",
                RiskLimits::default().bankroll_contracts,
            )?,
        };
        risk.validate()?;

        let max_depth: usize = env_parse("MAX_DEPTH", 1)?;

        Ok(Self {
            model,
            risk,
            extractor: ExtractorParams::default(),
            max_depth: max_depth.min(MAX_DEPTH_CAP),
            use_ai_risk: std::env::var("USE_AI_RISK")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ReaderError::Config(format!("{} is not a valid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("gemini").unwrap(), Provider::Gemini);
        assert_eq!(Provider::parse("OpenRouter").unwrap(), Provider::OpenRouter);
        assert!(Provider::parse("mystery").is_err());
    }

    #[test]
    fn test_risk_limit_defaults_are_sane() {
        let limits = RiskLimits::default();
        assert!(limits.max_daily_loss < 0.0);
        assert!(limits.max_drawdown_pct > 0.0 && limits.max_drawdown_pct < 1.0);
        assert!(limits.min_contracts <= limits.max_contracts);
        assert!(limits.kelly_fraction > 0.0 && limits.kelly_fraction <= 1.0);
    }

    #[test]
    fn test_risk_limit_validation() {
        assert!(RiskLimits::default().validate().is_ok());

        let inverted = RiskLimits { min_contracts: 50, max_contracts: 10, ..RiskLimits::default() };
        assert!(matches!(inverted.validate(), Err(ReaderError::Config(_))));

        let bad_kelly = RiskLimits { kelly_fraction: 1.5, ..RiskLimits::default() };
        assert!(matches!(bad_kelly.validate(), Err(ReaderError::Config(_))));

        let zero_kelly = RiskLimits { kelly_fraction: 0.0, ..RiskLimits::default() };
        assert!(matches!(zero_kelly.validate(), Err(ReaderError::Config(_))));
    }

    #[test]
    fn test_extractor_defaults_ordered() {
        let params = ExtractorParams::default();
        assert!(params.medium_confidence_edge < params.high_confidence_edge);
        assert!(params.window_minutes > 0.0);
    }
}
