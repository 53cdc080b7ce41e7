use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScoringError;

pub type PlayerId = i64;
pub type TeamId = i64;
pub type ContestId = i64;
pub type EntryId = i64;
pub type UserId = i64;
pub type MatchId = i64;
pub type AchievementId = i64;

/// Raw statistics for one player in one match.
///
/// Every statistic is optional; an absent value counts as zero, except that
/// the duck penalty needs `runs` to be recorded as exactly zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPerformance {
    pub player_id: PlayerId,
    pub runs: Option<u32>,
    pub balls_faced: Option<u32>,
    pub fours: Option<u32>,
    pub sixes: Option<u32>,
    pub wickets: Option<u32>,
    pub maiden_overs: Option<u32>,
    pub catches: Option<u32>,
    pub stumpings: Option<u32>,
    pub run_outs: Option<u32>,
}

impl PlayerPerformance {
    /// Empty performance for a player
    pub fn for_player(player_id: PlayerId) -> Self {
        Self { player_id, ..Default::default() }
    }
}

/// Role of a player on a fantasy roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterRole {
    Captain,
    ViceCaptain,
    Member,
}

impl RosterRole {
    /// Map the two stored flags onto a single role. Captain wins if both are set.
    pub fn from_flags(is_captain: bool, is_vice_captain: bool) -> Self {
        match (is_captain, is_vice_captain) {
            (true, _) => RosterRole::Captain,
            (false, true) => RosterRole::ViceCaptain,
            (false, false) => RosterRole::Member,
        }
    }
}

/// One roster slot of a fantasy team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub player_id: PlayerId,
    pub role: RosterRole,
}

impl TeamMember {
    pub fn new(player_id: PlayerId, role: RosterRole) -> Self {
        Self { player_id, role }
    }

    pub fn member(player_id: PlayerId) -> Self {
        Self::new(player_id, RosterRole::Member)
    }
}

/// A contest entry as the ranker sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestEntryRef {
    pub entry_id: EntryId,
    pub team_id: TeamId,
    pub created_at: DateTime<Utc>,
}

/// Result of a ranking pass for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub entry_id: EntryId,
    pub team_id: TeamId,
    pub points: i64,
    pub rank: i32,
}

/// A team owned by a user, with its cached total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTeam {
    pub team_id: TeamId,
    pub total_points: i64,
}

/// Outcome of a progression pass for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgression {
    pub user_id: UserId,
    pub total_points: i64,
    pub level: i32,
    pub newly_granted: Vec<AchievementId>,
}

/// Quantity an achievement threshold is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementMetric {
    TotalPoints,
    Level,
    TeamCount,
    ContestCount,
}

impl AchievementMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementMetric::TotalPoints => "total_points",
            AchievementMetric::Level => "level",
            AchievementMetric::TeamCount => "team_count",
            AchievementMetric::ContestCount => "contest_count",
        }
    }
}

impl fmt::Display for AchievementMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementMetric {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_points" => Ok(AchievementMetric::TotalPoints),
            "level" => Ok(AchievementMetric::Level),
            "team_count" => Ok(AchievementMetric::TeamCount),
            "contest_count" => Ok(AchievementMetric::ContestCount),
            other => Err(ScoringError::invalid_data(format!("unknown achievement metric '{other}'"))),
        }
    }
}

/// Threshold rule that grants an achievement once `metric >= threshold`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementRule {
    pub id: AchievementId,
    pub name: String,
    pub metric: AchievementMetric,
    pub threshold: i64,
}

impl AchievementRule {
    pub fn new(id: AchievementId, name: impl Into<String>, metric: AchievementMetric, threshold: i64) -> Self {
        Self { id, name: name.into(), metric, threshold }
    }

    pub fn is_met(&self, snapshot: &ProgressSnapshot) -> bool {
        snapshot.value(self.metric) >= self.threshold
    }
}

/// Values achievement rules are evaluated against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total_points: i64,
    pub level: i32,
    pub team_count: i64,
    pub contest_count: i64,
}

impl ProgressSnapshot {
    pub fn value(&self, metric: AchievementMetric) -> i64 {
        match metric {
            AchievementMetric::TotalPoints => self.total_points,
            AchievementMetric::Level => i64::from(self.level),
            AchievementMetric::TeamCount => self.team_count,
            AchievementMetric::ContestCount => self.contest_count,
        }
    }
}

/// Events emitted while processing match results
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoringEvent {
    /// Match points were added to a player's cumulative total
    PlayerScored {
        match_id: MatchId,
        player_id: PlayerId,
        points: i64,
        total_points: i64,
        timestamp: DateTime<Utc>,
    },

    /// Performance was already applied for this match
    PlayerSkipped {
        match_id: MatchId,
        player_id: PlayerId,
        timestamp: DateTime<Utc>,
    },

    /// Team total recomputed
    TeamAggregated {
        team_id: TeamId,
        total_points: i64,
        timestamp: DateTime<Utc>,
    },

    /// Contest leaderboard recomputed
    ContestRanked {
        contest_id: ContestId,
        entry_count: usize,
        leader: Option<EntryId>,
        timestamp: DateTime<Utc>,
    },

    /// User totals and level recomputed
    UserProgressed {
        user_id: UserId,
        total_points: i64,
        level: i32,
        timestamp: DateTime<Utc>,
    },

    /// New achievement granted
    AchievementGranted {
        user_id: UserId,
        achievement_id: AchievementId,
        timestamp: DateTime<Utc>,
    },

    /// Match processing completed
    BatchCompleted {
        match_id: MatchId,
        processed_count: usize,
        skipped_count: usize,
        teams_updated: usize,
        contests_ranked: usize,
        users_updated: usize,
        timestamp: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_deserializes_camel_case() {
        let json = r#"{"playerId": 7, "runs": 0, "ballsFaced": 5, "runOuts": 1}"#;
        let perf: PlayerPerformance = serde_json::from_str(json).unwrap();
        assert_eq!(perf.player_id, 7);
        assert_eq!(perf.runs, Some(0));
        assert_eq!(perf.balls_faced, Some(5));
        assert_eq!(perf.run_outs, Some(1));
        assert_eq!(perf.wickets, None);
    }

    #[test]
    fn test_role_from_flags() {
        assert_eq!(RosterRole::from_flags(true, false), RosterRole::Captain);
        assert_eq!(RosterRole::from_flags(false, true), RosterRole::ViceCaptain);
        assert_eq!(RosterRole::from_flags(false, false), RosterRole::Member);
        assert_eq!(RosterRole::from_flags(true, true), RosterRole::Captain);
    }

    #[test]
    fn test_metric_round_trips_through_text() {
        for metric in [
            AchievementMetric::TotalPoints,
            AchievementMetric::Level,
            AchievementMetric::TeamCount,
            AchievementMetric::ContestCount,
        ] {
            assert_eq!(metric.as_str().parse::<AchievementMetric>().unwrap(), metric);
        }
        assert!("points".parse::<AchievementMetric>().is_err());
    }

    #[test]
    fn test_rule_threshold_is_inclusive() {
        let rule = AchievementRule::new(1, "Level 5", AchievementMetric::Level, 5);
        let mut snapshot = ProgressSnapshot { level: 4, ..Default::default() };
        assert!(!rule.is_met(&snapshot));
        snapshot.level = 5;
        assert!(rule.is_met(&snapshot));
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ScoringEvent::TeamAggregated { team_id: 3, total_points: 450, timestamp: Utc::now() };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "team_aggregated");
        assert_eq!(value["total_points"], 450);
    }
}
