use market_reader_core::{
    backend::MockBackend,
    config::{ExtractorParams, ModelConfig, Provider, ReaderConfig, RiskLimits},
    models::{DepthLevel, MarketSnapshot, SideQuote, TopOfBook},
    pipeline::MarketPipeline,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Market Reader Core starting (deterministic demo backend)");

    let config = ReaderConfig {
        model: ModelConfig {
            provider: Provider::Gemini,
            api_key: String::new(),
            fast_model: "mock-fast".to_string(),
            smart_model: "mock-smart".to_string(),
            request_timeout_secs: 5,
        },
        risk: RiskLimits::default(),
        extractor: ExtractorParams::default(),
        max_depth: 1,
        use_ai_risk: false,
    };

    let backend = Arc::new(MockBackend::default());
    let pipeline = MarketPipeline::new(backend, &config);

    // A sample 15-minute BTC market snapshot
    let snapshot = MarketSnapshot {
        market_ticker: "KXBTC15M-26AUG1445-T97000".to_string(),
        current_price: 97_250.0,
        change_1h_pct: 0.42,
        change_24h_pct: -1.1,
        strike_price: 97_000.0,
        distance_from_strike_pct: 0.258,
        minutes_to_expiry: 9.0,
        book: TopOfBook {
            yes: SideQuote { bid_cents: 50.5, ask_cents: 53.5 },
            no: SideQuote { bid_cents: 46.5, ask_cents: 49.5 },
        },
        yes_depth: vec![DepthLevel { price_cents: 50.0, quantity: 120.0 }],
        no_depth: vec![DepthLevel { price_cents: 46.0, quantity: 80.0 }],
    };

    info!(
        market = %snapshot.market_ticker,
        minutes_to_expiry = snapshot.minutes_to_expiry,
        "Running one decision cycle"
    );

    match pipeline.run_cycle(&snapshot).await {
        Ok(report) => {
            info!("Cycle successful");
            println!("\n=== CYCLE REPORT ===");
            println!("Cycle ID: {}", report.cycle_id);
            println!(
                "Analysis: p_model {:.3}, {} ({:?})",
                report.analysis.p_model, report.analysis.recommendation, report.analysis.confidence
            );
            match &report.risk.rejection_reason {
                Some(reason) => println!("Risk: REJECTED ({})", reason),
                None => println!(
                    "Risk: approved, {} contracts, max loss ${:.2}",
                    report.risk.position_size, report.risk.max_loss
                ),
            }
            println!("Execution: {}", report.execution.rationale);
            println!("Context hash: {}", report.context_hash);
            println!("Duration: {}ms", report.duration_ms);
            println!("\nReasoning Trace:");
            for line in report.trace.lines() {
                println!("  {}", line);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Cycle failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
