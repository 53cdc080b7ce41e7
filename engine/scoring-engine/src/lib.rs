//! Fantasy Scoring Engine
//!
//! This crate turns raw cricket match statistics into fantasy points and pushes
//! them forward through the rest of the platform:
//!
//! - **PointsCalculator**: per-player match performance -> integer points
//! - **TeamAggregator**: captain / vice-captain weighted team totals
//! - **ContestRanker**: contest leaderboards with distinct 1-based ranks
//! - **ProgressionUpdater**: user totals, levels and threshold achievements
//! - **ScoringEngine**: runs the four stages for one match's results
//!
//! Persistence is reached only through the [`ScoringStore`] trait. The crate
//! ships an in-memory store and a Postgres store.

pub mod aggregator;
pub mod calculator;
pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod models;
pub mod pg;
pub mod progression;
pub mod ranker;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use aggregator::TeamAggregator;
pub use calculator::{PointsCalculator, ScoreBreakdown};
pub use config::{DatabaseConfig, ProgressionConfig, RosterMultipliers, ScoringConfig, ScoringRules};
pub use engine::ScoringEngine;
pub use error::{Result, ScoringError};
pub use models::*;
pub use pg::PgStore;
pub use progression::{default_achievement_rules, ProgressionUpdater};
pub use ranker::{ContestRanker, Standing};
pub use store::{InMemoryStore, ScoringStore};
