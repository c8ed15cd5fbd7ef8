//! Execution planning: approved recommendation to concrete order spec
//!
//! A pure function of recommendation, sizing and a live quote. No side
//! effects; request signing and order submission belong to collaborators.

use crate::models::{ExecutionSpec, Recommendation, TopOfBook, TradeAction};

/// Turn an approved recommendation into an order spec, or a PASS.
/// Limit price is the chosen side's current ask (aggressive,
/// fill-seeking). Payout assumes $1 settlement per contract.
pub fn plan_execution(
    recommendation: Recommendation,
    position_size: u32,
    book: Option<&TopOfBook>,
    risk_approved: bool,
    market_ticker: &str,
) -> ExecutionSpec {
    let pass = |reason: &str| ExecutionSpec {
        action: TradeAction::Pass,
        side: None,
        limit_price_cents: 0.0,
        contracts: 0,
        estimated_cost: 0.0,
        estimated_payout: 0.0,
        market_ticker: market_ticker.to_string(),
        rationale: format!("standing aside: {}", reason),
    };

    if !risk_approved {
        return pass("risk gate rejected the trade");
    }
    if recommendation == Recommendation::NoTrade || position_size == 0 {
        return pass("no actionable edge");
    }
    let Some(book) = book else {
        return pass("no live quote available");
    };

    let (action, side, quote) = match recommendation {
        Recommendation::Yes => (TradeAction::BuyYes, "yes", book.yes),
        Recommendation::No => (TradeAction::BuyNo, "no", book.no),
        Recommendation::NoTrade => unreachable!("handled above"),
    };

    if !quote.is_tradeable() {
        return pass("quote not tradeable");
    }

    let limit_price_cents = quote.ask_cents;
    let estimated_cost = limit_price_cents / 100.0 * position_size as f64;
    let estimated_payout = position_size as f64;

    ExecutionSpec {
        action,
        side: Some(side.to_string()),
        limit_price_cents,
        contracts: position_size,
        estimated_cost,
        estimated_payout,
        market_ticker: market_ticker.to_string(),
        rationale: format!(
            "{} {} x{} at {:.0}c limit, cost ${:.2}, payout ${:.2} if correct",
            action, side, position_size, limit_price_cents, estimated_cost, estimated_payout
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SideQuote;

    fn book() -> TopOfBook {
        TopOfBook {
            yes: SideQuote { bid_cents: 50.0, ask_cents: 54.0 },
            no: SideQuote { bid_cents: 46.0, ask_cents: 50.0 },
        }
    }

    #[test]
    fn test_buy_yes_at_yes_ask() {
        let spec = plan_execution(Recommendation::Yes, 20, Some(&book()), true, "KXBTC15M-T");
        assert_eq!(spec.action, TradeAction::BuyYes);
        assert_eq!(spec.side.as_deref(), Some("yes"));
        assert_eq!(spec.limit_price_cents, 54.0);
        assert_eq!(spec.contracts, 20);
        assert!((spec.estimated_cost - 10.8).abs() < 1e-9);
        assert!((spec.estimated_payout - 20.0).abs() < 1e-9);
        assert!(spec.rationale.contains("BUY_YES"));
    }

    #[test]
    fn test_buy_no_at_no_ask() {
        let spec = plan_execution(Recommendation::No, 5, Some(&book()), true, "KXBTC15M-T");
        assert_eq!(spec.action, TradeAction::BuyNo);
        assert_eq!(spec.limit_price_cents, 50.0);
        assert!((spec.estimated_cost - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_pass_when_risk_rejected() {
        let spec = plan_execution(Recommendation::Yes, 20, Some(&book()), false, "T");
        assert_eq!(spec.action, TradeAction::Pass);
        assert_eq!(spec.contracts, 0);
        assert_eq!(spec.estimated_cost, 0.0);
        assert_eq!(spec.estimated_payout, 0.0);
    }

    #[test]
    fn test_pass_on_no_trade_or_missing_quote() {
        let no_trade = plan_execution(Recommendation::NoTrade, 20, Some(&book()), true, "T");
        assert_eq!(no_trade.action, TradeAction::Pass);

        let no_quote = plan_execution(Recommendation::Yes, 20, None, true, "T");
        assert_eq!(no_quote.action, TradeAction::Pass);
        assert!(no_quote.rationale.contains("no live quote"));
    }

    #[test]
    fn test_pass_on_untradeable_ask() {
        let mut degenerate = book();
        degenerate.yes.ask_cents = 100.0;
        let spec = plan_execution(Recommendation::Yes, 20, Some(&degenerate), true, "T");
        assert_eq!(spec.action, TradeAction::Pass);
    }
}
