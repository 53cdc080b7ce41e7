use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ScoringRules;
use crate::models::PlayerPerformance;

/// Points earned in each scoring category for one performance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub runs: i64,
    pub boundaries: i64,
    pub batting_bonus: i64,
    pub duck_penalty: i64,
    pub wickets: i64,
    pub bowling_bonus: i64,
    pub maidens: i64,
    pub fielding: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.runs
            + self.boundaries
            + self.batting_bonus
            + self.duck_penalty
            + self.wickets
            + self.bowling_bonus
            + self.maidens
            + self.fielding
    }
}

/// Converts match performances into fantasy points
#[derive(Debug, Clone, Default)]
pub struct PointsCalculator {
    rules: ScoringRules,
}

impl PointsCalculator {
    /// Create a new points calculator
    pub fn new(rules: ScoringRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Total fantasy points for a performance. May be negative.
    pub fn calculate_points(&self, performance: &PlayerPerformance) -> i64 {
        let breakdown = self.score_breakdown(performance);
        let total = breakdown.total();

        debug!(
            "Scored player {}: {} pts (batting {}, bowling {}, fielding {})",
            performance.player_id,
            total,
            breakdown.runs + breakdown.boundaries + breakdown.batting_bonus + breakdown.duck_penalty,
            breakdown.wickets + breakdown.bowling_bonus + breakdown.maidens,
            breakdown.fielding
        );

        total
    }

    /// Per-category points for a performance
    pub fn score_breakdown(&self, performance: &PlayerPerformance) -> ScoreBreakdown {
        let rules = &self.rules;
        let runs = performance.runs.unwrap_or(0);
        let balls_faced = performance.balls_faced.unwrap_or(0);
        let wickets = performance.wickets.unwrap_or(0);

        // Out for zero only counts when the player actually faced a ball
        let duck_penalty =
            if performance.runs == Some(0) && balls_faced > 0 { rules.duck_penalty } else { 0 };

        let batting_bonus = if runs >= rules.century_threshold {
            rules.century_bonus
        } else if runs >= rules.fifty_threshold {
            rules.fifty_bonus
        } else {
            0
        };

        let bowling_bonus = match wickets {
            0..=2 => 0,
            3 => rules.three_wicket_bonus,
            4 => rules.four_wicket_bonus,
            _ => rules.five_wicket_bonus,
        };

        ScoreBreakdown {
            runs: count(runs) * rules.per_run,
            boundaries: count_of(performance.fours) * rules.per_four
                + count_of(performance.sixes) * rules.per_six,
            batting_bonus,
            duck_penalty,
            wickets: count(wickets) * rules.per_wicket,
            bowling_bonus,
            maidens: count_of(performance.maiden_overs) * rules.per_maiden_over,
            fielding: count_of(performance.catches) * rules.per_catch
                + count_of(performance.stumpings) * rules.per_stumping
                + count_of(performance.run_outs) * rules.per_run_out,
        }
    }
}

fn count(value: u32) -> i64 {
    i64::from(value)
}

fn count_of(value: Option<u32>) -> i64 {
    count(value.unwrap_or(0))
}
