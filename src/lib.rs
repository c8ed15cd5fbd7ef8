//! Market Reader Core
//!
//! A recursive multi-agent reasoning engine for 15-minute binary BTC
//! markets that:
//! - Decomposes a market question into concurrent reasoning subtasks
//! - Extracts a structured probability estimate, with a deterministic
//!   closed-form fallback when the model path fails
//! - Gates every recommendation behind hard capital-safety breakers
//! - Emits a bounded, auditable order spec (never submits orders)
//!
//! DECISION CYCLE:
//! SNAPSHOT → SOLVE → EXTRACT → RISK GATE → EXECUTION PLAN → REPORT

pub mod api;
pub mod audit;
pub mod backend;
pub mod config;
pub mod error;
pub mod execution;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod risk;
pub mod solver;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use pipeline::MarketPipeline;
