//! Command-line interface
//!
//! Every subcommand prints a single JSON document on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use scoring_engine::{
    ContestId, MatchId, PgStore, PlayerId, PlayerPerformance, PointsCalculator, ScoreBreakdown,
    ScoringEngine, ScoringRules, TeamId, UserId,
};

use crate::config::ServiceConfig;

#[derive(Debug, Parser)]
#[command(name = "fantasy-scoring")]
#[command(about = "Fantasy scoring engine - score matches, aggregate teams, rank contests")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Apply a match's performances and update teams, contests and users
    Process {
        /// Match identifier used to skip performances already applied
        #[arg(long)]
        match_id: MatchId,

        /// JSON array of player performances
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Re-rank every entry of a contest
    Rank {
        #[arg(long)]
        contest: ContestId,
    },

    /// Recompute a team's weighted total
    Aggregate {
        #[arg(long)]
        team: TeamId,
    },

    /// Recompute a user's total, level and achievements
    Progress {
        #[arg(long)]
        user: UserId,
    },

    /// Score performances offline without touching the database
    Score {
        /// JSON array of player performances
        #[arg(short, long)]
        file: PathBuf,
    },
}

/// One row of `score` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredPerformance {
    pub player_id: PlayerId,
    pub points: i64,
    pub breakdown: ScoreBreakdown,
}

/// Read a JSON array of performances
pub fn read_performances(path: &Path) -> Result<Vec<PlayerPerformance>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read performances file: {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid performances in {:?}", path))
}

/// Score performances with the configured point table
pub fn score_performances(rules: &ScoringRules, performances: &[PlayerPerformance]) -> Vec<ScoredPerformance> {
    let calculator = PointsCalculator::new(rules.clone());
    performances
        .iter()
        .map(|performance| {
            let breakdown = calculator.score_breakdown(performance);
            ScoredPerformance { player_id: performance.player_id, points: breakdown.total(), breakdown }
        })
        .collect()
}

async fn connect_engine(config: &ServiceConfig) -> Result<ScoringEngine<PgStore>> {
    let store = PgStore::connect(&config.scoring.database)
        .await
        .context("Failed to connect to the scoring database")?;
    Ok(ScoringEngine::new(&config.scoring, Arc::new(store)))
}

/// Execute a subcommand and return its JSON output
pub async fn execute(command: &Commands, config: &ServiceConfig) -> Result<Value> {
    let output = match command {
        Commands::Process { match_id, file } => {
            let performances = read_performances(file)?;
            info!("Loaded {} performances from {:?}", performances.len(), file);
            let engine = connect_engine(config).await?;
            let events = engine.process_match_results(*match_id, &performances).await?;
            serde_json::to_value(events)?
        }
        Commands::Rank { contest } => {
            let ranked = connect_engine(config).await?.recompute_contest_rankings(*contest).await?;
            json!({ "contestId": contest, "entries": ranked })
        }
        Commands::Aggregate { team } => {
            let total_points = connect_engine(config).await?.recompute_team_points(*team).await?;
            json!({ "teamId": team, "totalPoints": total_points })
        }
        Commands::Progress { user } => {
            let progression = connect_engine(config).await?.recompute_user_progression(*user).await?;
            serde_json::to_value(progression)?
        }
        Commands::Score { file } => {
            let performances = read_performances(file)?;
            serde_json::to_value(score_performances(&config.scoring.rules, &performances))?
        }
    };

    Ok(output)
}

/// Execute a subcommand and print its output
pub async fn run(cli: &Cli, config: &ServiceConfig) -> Result<()> {
    let output = execute(&cli.command, config).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
