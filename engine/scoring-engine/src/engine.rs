use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    aggregator::TeamAggregator,
    calculator::PointsCalculator,
    config::ScoringConfig,
    error::Result,
    locks::KeyedLocks,
    models::{
        ContestId, MatchId, PlayerId, PlayerPerformance, RankedEntry, ScoringEvent, TeamId,
        UserId, UserProgression,
    },
    progression::ProgressionUpdater,
    ranker::ContestRanker,
    store::ScoringStore,
};

/// Drives scoring, aggregation, ranking and progression against a store
pub struct ScoringEngine<S: ScoringStore> {
    store: Arc<S>,
    calculator: PointsCalculator,
    aggregator: TeamAggregator,
    ranker: ContestRanker,
    progression: ProgressionUpdater,
    player_locks: KeyedLocks<PlayerId>,
    team_locks: KeyedLocks<TeamId>,
    contest_locks: KeyedLocks<ContestId>,
    user_locks: KeyedLocks<UserId>,
}

impl<S: ScoringStore> ScoringEngine<S> {
    pub fn new(config: &ScoringConfig, store: Arc<S>) -> Self {
        Self {
            store,
            calculator: PointsCalculator::new(config.rules.clone()),
            aggregator: TeamAggregator::new(config.multipliers.clone()),
            ranker: ContestRanker::new(),
            progression: ProgressionUpdater::new(&config.progression),
            player_locks: KeyedLocks::new(),
            team_locks: KeyedLocks::new(),
            contest_locks: KeyedLocks::new(),
            user_locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn calculator(&self) -> &PointsCalculator {
        &self.calculator
    }

    /// Points for one performance
    pub fn calculate_points(&self, performance: &PlayerPerformance) -> i64 {
        self.calculator.calculate_points(performance)
    }

    /// Recompute a team's total while holding the team's lock
    pub async fn recompute_team_points(&self, team_id: TeamId) -> Result<i64> {
        let _guard = self.team_locks.lock(team_id).await;
        self.aggregator.recompute_team_points(self.store.as_ref(), team_id).await
    }

    /// Re-rank a contest while holding the contest's lock
    pub async fn recompute_contest_rankings(&self, contest_id: ContestId) -> Result<Vec<RankedEntry>> {
        let _guard = self.contest_locks.lock(contest_id).await;
        self.ranker.recompute_contest_rankings(self.store.as_ref(), contest_id).await
    }

    /// Recompute a user's progression while holding the user's lock
    pub async fn recompute_user_progression(&self, user_id: UserId) -> Result<UserProgression> {
        let _guard = self.user_locks.lock(user_id).await;
        self.progression.recompute_user_progression(self.store.as_ref(), user_id).await
    }

    /// Apply one match's performances and propagate them to every affected
    /// team, contest and user.
    ///
    /// A performance already applied for `match_id` adds no points, so running
    /// the same match twice leaves every total unchanged. Downstream totals are
    /// still recomputed for every player in the batch.
    pub async fn process_match_results(
        &self,
        match_id: MatchId,
        performances: &[PlayerPerformance],
    ) -> Result<Vec<ScoringEvent>> {
        info!("🏏 Processing match {} with {} performances", match_id, performances.len());

        let mut events = Vec::new();
        let mut scored_players = BTreeSet::new();
        // Skipped players still propagate, so a retry after a partial failure
        // repairs team, contest and user totals
        let mut batch_players = BTreeSet::new();
        let mut skipped_count = 0;

        for performance in performances {
            let player_id = performance.player_id;
            batch_players.insert(player_id);
            let points = self.calculator.calculate_points(performance);

            let applied = {
                let _guard = self.player_locks.lock(player_id).await;
                self.store.apply_match_points(match_id, player_id, points).await?
            };

            match applied {
                Some(total_points) => {
                    if points < 0 {
                        info!("Player {} lost {} pts in match {}", player_id, -points, match_id);
                    }
                    scored_players.insert(player_id);
                    events.push(ScoringEvent::PlayerScored {
                        match_id,
                        player_id,
                        points,
                        total_points,
                        timestamp: Utc::now(),
                    });
                }
                None => {
                    warn!("Match {} already applied for player {}, skipping", match_id, player_id);
                    skipped_count += 1;
                    events.push(ScoringEvent::PlayerSkipped { match_id, player_id, timestamp: Utc::now() });
                }
            }
        }

        let mut teams = BTreeSet::new();
        for player_id in &batch_players {
            teams.extend(self.store.get_teams_for_player(*player_id).await?);
        }

        let mut contests = BTreeSet::new();
        let mut users = BTreeSet::new();
        for team_id in &teams {
            let total_points = self.recompute_team_points(*team_id).await?;
            events.push(ScoringEvent::TeamAggregated { team_id: *team_id, total_points, timestamp: Utc::now() });

            contests.extend(self.store.get_contests_for_team(*team_id).await?);
            match self.store.get_team_owner(*team_id).await? {
                Some(user_id) => {
                    users.insert(user_id);
                }
                None => warn!("Team {} has no owner, skipping progression", team_id),
            }
        }

        for contest_id in &contests {
            let ranked = self.recompute_contest_rankings(*contest_id).await?;
            events.push(ScoringEvent::ContestRanked {
                contest_id: *contest_id,
                entry_count: ranked.len(),
                leader: ranked.first().map(|entry| entry.entry_id),
                timestamp: Utc::now(),
            });
        }

        for user_id in &users {
            let progression = self.recompute_user_progression(*user_id).await?;
            events.push(ScoringEvent::UserProgressed {
                user_id: *user_id,
                total_points: progression.total_points,
                level: progression.level,
                timestamp: Utc::now(),
            });
            for achievement_id in progression.newly_granted {
                events.push(ScoringEvent::AchievementGranted {
                    user_id: *user_id,
                    achievement_id,
                    timestamp: Utc::now(),
                });
            }
        }

        events.push(ScoringEvent::BatchCompleted {
            match_id,
            processed_count: scored_players.len(),
            skipped_count,
            teams_updated: teams.len(),
            contests_ranked: contests.len(),
            users_updated: users.len(),
            timestamp: Utc::now(),
        });

        info!(
            "✅ Match {} complete: {} players scored, {} skipped, {} teams, {} contests, {} users",
            match_id,
            scored_players.len(),
            skipped_count,
            teams.len(),
            contests.len(),
            users.len()
        );

        Ok(events)
    }
}
