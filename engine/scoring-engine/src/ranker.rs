use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{ContestId, EntryId, RankedEntry, TeamId};
use crate::store::ScoringStore;

/// An entry with the points it is ranked by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub entry_id: EntryId,
    pub team_id: TeamId,
    pub created_at: DateTime<Utc>,
    pub points: i64,
}

/// Builds contest leaderboards
#[derive(Debug, Clone, Copy, Default)]
pub struct ContestRanker;

impl ContestRanker {
    pub fn new() -> Self {
        Self
    }

    /// Order standings by points descending and number them from 1.
    ///
    /// Ties go to the earlier entry, then to the lower entry id, so every
    /// entry gets a distinct rank regardless of input order.
    pub fn assign_ranks(&self, mut standings: Vec<Standing>) -> Vec<RankedEntry> {
        standings.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });

        standings
            .into_iter()
            .enumerate()
            .map(|(index, standing)| RankedEntry {
                entry_id: standing.entry_id,
                team_id: standing.team_id,
                points: standing.points,
                rank: i32::try_from(index + 1).unwrap_or(i32::MAX),
            })
            .collect()
    }

    /// Re-rank every entry of a contest from the teams' cached totals and
    /// persist rank and points for all of them
    pub async fn recompute_contest_rankings<S>(
        &self,
        store: &S,
        contest_id: ContestId,
    ) -> Result<Vec<RankedEntry>>
    where
        S: ScoringStore + ?Sized,
    {
        let entries = store.get_contest_entries(contest_id).await?;

        let mut standings = Vec::with_capacity(entries.len());
        for entry in entries {
            let points = store.get_team_total_points(entry.team_id).await?;
            standings.push(Standing {
                entry_id: entry.entry_id,
                team_id: entry.team_id,
                created_at: entry.created_at,
                points,
            });
        }

        let ranked = self.assign_ranks(standings);
        for entry in &ranked {
            store.set_contest_entry_rank_and_points(entry.entry_id, entry.rank, entry.points).await?;
            debug!("Contest {} entry {}: rank {} ({} pts)", contest_id, entry.entry_id, entry.rank, entry.points);
        }

        info!("Ranked contest {}: {} entries", contest_id, ranked.len());
        Ok(ranked)
    }
}
