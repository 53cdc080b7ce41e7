use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info};

use crate::config::RosterMultipliers;
use crate::error::{Result, ScoringError};
use crate::models::{RosterRole, TeamId};
use crate::store::ScoringStore;

/// Sums player points into team totals
#[derive(Debug, Clone, Default)]
pub struct TeamAggregator {
    multipliers: RosterMultipliers,
}

impl TeamAggregator {
    pub fn new(multipliers: RosterMultipliers) -> Self {
        Self { multipliers }
    }

    pub fn multiplier(&self, role: RosterRole) -> Decimal {
        match role {
            RosterRole::Captain => self.multipliers.captain,
            RosterRole::ViceCaptain => self.multipliers.vice_captain,
            RosterRole::Member => Decimal::ONE,
        }
    }

    /// Exact weighted sum of `(role, player points)` pairs
    pub fn weighted_total(&self, members: &[(RosterRole, i64)]) -> Decimal {
        members
            .iter()
            .map(|(role, points)| Decimal::from(*points) * self.multiplier(*role))
            .sum()
    }

    /// Round a weighted total to whole points, halves away from zero
    pub fn round_points(total: Decimal) -> Result<i64> {
        total
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| ScoringError::Internal(format!("team total {total} out of range")))
    }

    /// Recompute and persist a team's total from its roster's current points
    pub async fn recompute_team_points<S>(&self, store: &S, team_id: TeamId) -> Result<i64>
    where
        S: ScoringStore + ?Sized,
    {
        let members = store.get_team_players(team_id).await?;

        let mut weighted = Vec::with_capacity(members.len());
        for member in &members {
            let points = store.get_player_points(member.player_id).await?;
            debug!("Team {} member {} ({:?}): {} pts", team_id, member.player_id, member.role, points);
            weighted.push((member.role, points));
        }

        let total = Self::round_points(self.weighted_total(&weighted))?;
        store.set_team_total_points(team_id, total).await?;

        info!("Aggregated team {}: {} pts across {} players", team_id, total, members.len());
        Ok(total)
    }
}
