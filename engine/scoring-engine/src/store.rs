//! Persistence collaborator interface and the in-memory implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{
    AchievementId, AchievementRule, ContestEntryRef, ContestId, EntryId, MatchId, PlayerId,
    TeamId, TeamMember, UserId, UserTeam,
};
use crate::progression::default_achievement_rules;

/// Data access used by the scoring engine.
///
/// Lookups of missing rows return empty collections or zero, never an error.
/// Errors are reserved for the storage itself failing.
#[async_trait]
pub trait ScoringStore: Send + Sync {
    /// Roster of a team
    async fn get_team_players(&self, team_id: TeamId) -> Result<Vec<TeamMember>>;

    /// Cumulative points of a player
    async fn get_player_points(&self, player_id: PlayerId) -> Result<i64>;

    /// Overwrite a player's cumulative points
    async fn set_player_points(&self, player_id: PlayerId, points: i64) -> Result<()>;

    /// Overwrite a team's cached total
    async fn set_team_total_points(&self, team_id: TeamId, total_points: i64) -> Result<()>;

    /// Every entry of a contest
    async fn get_contest_entries(&self, contest_id: ContestId) -> Result<Vec<ContestEntryRef>>;

    /// Cached total of a team
    async fn get_team_total_points(&self, team_id: TeamId) -> Result<i64>;

    /// Overwrite rank and points of one contest entry
    async fn set_contest_entry_rank_and_points(
        &self,
        entry_id: EntryId,
        rank: i32,
        points: i64,
    ) -> Result<()>;

    /// Teams owned by a user with their cached totals
    async fn get_user_teams(&self, user_id: UserId) -> Result<Vec<UserTeam>>;

    /// Overwrite a user's total points and level
    async fn set_user_progression(&self, user_id: UserId, total_points: i64, level: i32) -> Result<()>;

    /// Achievements already earned by a user
    async fn get_user_achievements(&self, user_id: UserId) -> Result<HashSet<AchievementId>>;

    /// Achievement catalogue
    async fn list_achievement_rules(&self) -> Result<Vec<AchievementRule>>;

    /// Record a newly earned achievement. Callers only grant achievements the
    /// user does not hold yet.
    async fn grant_achievement(&self, user_id: UserId, achievement_id: AchievementId) -> Result<()>;

    /// Record that a match performance was applied. Returns `false` when the
    /// `(match, player)` pair was already recorded.
    async fn record_match_performance(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        points: i64,
    ) -> Result<bool>;

    /// Teams whose roster contains the player
    async fn get_teams_for_player(&self, player_id: PlayerId) -> Result<Vec<TeamId>>;

    /// Contests holding an entry for the team
    async fn get_contests_for_team(&self, team_id: TeamId) -> Result<Vec<ContestId>>;

    /// Owner of a team
    async fn get_team_owner(&self, team_id: TeamId) -> Result<Option<UserId>>;

    /// Number of contest entries a user holds
    async fn count_user_contest_entries(&self, user_id: UserId) -> Result<i64>;

    /// Add match points to a player exactly once per `(match, player)`.
    ///
    /// Returns the new cumulative total, or `None` if the match was already
    /// applied for this player. Stores with transactions should override this
    /// so the ledger write and the increment commit together.
    async fn apply_match_points(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        points: i64,
    ) -> Result<Option<i64>> {
        if !self.record_match_performance(match_id, player_id, points).await? {
            return Ok(None);
        }

        let total = self.get_player_points(player_id).await? + points;
        self.set_player_points(player_id, total).await?;
        Ok(Some(total))
    }
}

#[derive(Debug, Clone)]
struct TeamRecord {
    owner: UserId,
    members: Vec<TeamMember>,
    total_points: i64,
}

#[derive(Debug, Clone)]
struct EntryRecord {
    contest_id: ContestId,
    user_id: UserId,
    team_id: TeamId,
    created_at: DateTime<Utc>,
    points: i64,
    rank: Option<i32>,
}

#[derive(Debug, Default)]
struct MemoryState {
    players: HashMap<PlayerId, i64>,
    teams: BTreeMap<TeamId, TeamRecord>,
    entries: BTreeMap<EntryId, EntryRecord>,
    users: HashMap<UserId, (i64, i32)>,
    achievement_rules: Vec<AchievementRule>,
    granted: Vec<(UserId, AchievementId)>,
    applied: HashSet<(MatchId, PlayerId)>,
}

/// In-memory store (for testing and offline runs)
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    /// Create an empty store seeded with the default achievement catalogue
    pub fn new() -> Self {
        Self::with_achievement_rules(default_achievement_rules())
    }

    pub fn with_achievement_rules(rules: Vec<AchievementRule>) -> Self {
        let state = MemoryState { achievement_rules: rules, ..Default::default() };
        Self { state: Arc::new(RwLock::new(state)) }
    }

    pub async fn add_player(&self, player_id: PlayerId, points: i64) {
        self.state.write().await.players.insert(player_id, points);
    }

    pub async fn add_team(&self, team_id: TeamId, owner: UserId, members: Vec<TeamMember>) {
        let record = TeamRecord { owner, members, total_points: 0 };
        self.state.write().await.teams.insert(team_id, record);
    }

    pub async fn add_contest_entry(
        &self,
        entry_id: EntryId,
        contest_id: ContestId,
        user_id: UserId,
        team_id: TeamId,
        created_at: DateTime<Utc>,
    ) {
        let record = EntryRecord { contest_id, user_id, team_id, created_at, points: 0, rank: None };
        self.state.write().await.entries.insert(entry_id, record);
    }

    pub async fn player_points(&self, player_id: PlayerId) -> Option<i64> {
        self.state.read().await.players.get(&player_id).copied()
    }

    pub async fn team_total(&self, team_id: TeamId) -> Option<i64> {
        self.state.read().await.teams.get(&team_id).map(|t| t.total_points)
    }

    /// `(rank, points)` of a contest entry
    pub async fn entry_standing(&self, entry_id: EntryId) -> Option<(Option<i32>, i64)> {
        self.state.read().await.entries.get(&entry_id).map(|e| (e.rank, e.points))
    }

    /// `(total_points, level)` of a user, if progression ever ran for them
    pub async fn user_progression(&self, user_id: UserId) -> Option<(i64, i32)> {
        self.state.read().await.users.get(&user_id).copied()
    }

    /// Every achievement row recorded for a user, duplicates included
    pub async fn granted_achievements(&self, user_id: UserId) -> Vec<AchievementId> {
        self.state
            .read()
            .await
            .granted
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, achievement)| *achievement)
            .collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScoringStore for InMemoryStore {
    async fn get_team_players(&self, team_id: TeamId) -> Result<Vec<TeamMember>> {
        let state = self.state.read().await;
        Ok(state.teams.get(&team_id).map(|t| t.members.clone()).unwrap_or_default())
    }

    async fn get_player_points(&self, player_id: PlayerId) -> Result<i64> {
        Ok(self.state.read().await.players.get(&player_id).copied().unwrap_or(0))
    }

    async fn set_player_points(&self, player_id: PlayerId, points: i64) -> Result<()> {
        self.state.write().await.players.insert(player_id, points);
        Ok(())
    }

    async fn set_team_total_points(&self, team_id: TeamId, total_points: i64) -> Result<()> {
        if let Some(team) = self.state.write().await.teams.get_mut(&team_id) {
            team.total_points = total_points;
        }
        Ok(())
    }

    async fn get_contest_entries(&self, contest_id: ContestId) -> Result<Vec<ContestEntryRef>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|(_, e)| e.contest_id == contest_id)
            .map(|(id, e)| ContestEntryRef { entry_id: *id, team_id: e.team_id, created_at: e.created_at })
            .collect())
    }

    async fn get_team_total_points(&self, team_id: TeamId) -> Result<i64> {
        Ok(self.state.read().await.teams.get(&team_id).map(|t| t.total_points).unwrap_or(0))
    }

    async fn set_contest_entry_rank_and_points(
        &self,
        entry_id: EntryId,
        rank: i32,
        points: i64,
    ) -> Result<()> {
        if let Some(entry) = self.state.write().await.entries.get_mut(&entry_id) {
            entry.rank = Some(rank);
            entry.points = points;
        }
        Ok(())
    }

    async fn get_user_teams(&self, user_id: UserId) -> Result<Vec<UserTeam>> {
        let state = self.state.read().await;
        Ok(state
            .teams
            .iter()
            .filter(|(_, t)| t.owner == user_id)
            .map(|(id, t)| UserTeam { team_id: *id, total_points: t.total_points })
            .collect())
    }

    async fn set_user_progression(&self, user_id: UserId, total_points: i64, level: i32) -> Result<()> {
        self.state.write().await.users.insert(user_id, (total_points, level));
        Ok(())
    }

    async fn get_user_achievements(&self, user_id: UserId) -> Result<HashSet<AchievementId>> {
        Ok(self.granted_achievements(user_id).await.into_iter().collect())
    }

    async fn list_achievement_rules(&self) -> Result<Vec<AchievementRule>> {
        Ok(self.state.read().await.achievement_rules.clone())
    }

    async fn grant_achievement(&self, user_id: UserId, achievement_id: AchievementId) -> Result<()> {
        self.state.write().await.granted.push((user_id, achievement_id));
        Ok(())
    }

    async fn record_match_performance(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        _points: i64,
    ) -> Result<bool> {
        Ok(self.state.write().await.applied.insert((match_id, player_id)))
    }

    async fn get_teams_for_player(&self, player_id: PlayerId) -> Result<Vec<TeamId>> {
        let state = self.state.read().await;
        Ok(state
            .teams
            .iter()
            .filter(|(_, t)| t.members.iter().any(|m| m.player_id == player_id))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn get_contests_for_team(&self, team_id: TeamId) -> Result<Vec<ContestId>> {
        let state = self.state.read().await;
        let mut contests: Vec<ContestId> =
            state.entries.values().filter(|e| e.team_id == team_id).map(|e| e.contest_id).collect();
        contests.sort_unstable();
        contests.dedup();
        Ok(contests)
    }

    async fn get_team_owner(&self, team_id: TeamId) -> Result<Option<UserId>> {
        Ok(self.state.read().await.teams.get(&team_id).map(|t| t.owner))
    }

    async fn count_user_contest_entries(&self, user_id: UserId) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.entries.values().filter(|e| e.user_id == user_id).count() as i64)
    }
}
