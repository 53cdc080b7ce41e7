//! Postgres-backed scoring store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{
    AchievementId, AchievementMetric, AchievementRule, ContestEntryRef, ContestId, EntryId,
    MatchId, PlayerId, RosterRole, TeamId, TeamMember, UserId, UserTeam,
};
use crate::store::ScoringStore;

/// Scoring store over the relational schema in `migrations/`
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and, if configured, apply pending migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        if config.run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Scoring schema migrations applied");
        }

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ScoringStore for PgStore {
    async fn get_team_players(&self, team_id: TeamId) -> Result<Vec<TeamMember>> {
        let rows = sqlx::query(
            "SELECT player_id, is_captain, is_vice_captain FROM team_players WHERE team_id = $1 ORDER BY player_id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<TeamMember> {
                let role = RosterRole::from_flags(row.try_get("is_captain")?, row.try_get("is_vice_captain")?);
                Ok(TeamMember::new(row.try_get("player_id")?, role))
            })
            .collect()
    }

    async fn get_player_points(&self, player_id: PlayerId) -> Result<i64> {
        let points: Option<i64> = sqlx::query_scalar("SELECT points FROM players WHERE id = $1")
            .bind(player_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(points.unwrap_or(0))
    }

    async fn set_player_points(&self, player_id: PlayerId, points: i64) -> Result<()> {
        sqlx::query("UPDATE players SET points = $2 WHERE id = $1")
            .bind(player_id)
            .bind(points)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_team_total_points(&self, team_id: TeamId, total_points: i64) -> Result<()> {
        sqlx::query("UPDATE teams SET total_points = $2 WHERE id = $1")
            .bind(team_id)
            .bind(total_points)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_contest_entries(&self, contest_id: ContestId) -> Result<Vec<ContestEntryRef>> {
        let rows = sqlx::query(
            "SELECT id, team_id, created_at FROM contest_entries WHERE contest_id = $1 ORDER BY id",
        )
        .bind(contest_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ContestEntryRef> {
                Ok(ContestEntryRef {
                    entry_id: row.try_get("id")?,
                    team_id: row.try_get("team_id")?,
                    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                })
            })
            .collect()
    }

    async fn get_team_total_points(&self, team_id: TeamId) -> Result<i64> {
        let total: Option<i64> = sqlx::query_scalar("SELECT total_points FROM teams WHERE id = $1")
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(total.unwrap_or(0))
    }

    async fn set_contest_entry_rank_and_points(
        &self,
        entry_id: EntryId,
        rank: i32,
        points: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE contest_entries SET rank = $2, points = $3 WHERE id = $1")
            .bind(entry_id)
            .bind(rank)
            .bind(points)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_user_teams(&self, user_id: UserId) -> Result<Vec<UserTeam>> {
        let rows = sqlx::query("SELECT id, total_points FROM teams WHERE user_id = $1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<UserTeam> {
                Ok(UserTeam { team_id: row.try_get("id")?, total_points: row.try_get("total_points")? })
            })
            .collect()
    }

    async fn set_user_progression(&self, user_id: UserId, total_points: i64, level: i32) -> Result<()> {
        sqlx::query("UPDATE users SET total_points = $2, level = $3 WHERE id = $1")
            .bind(user_id)
            .bind(total_points)
            .bind(level)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_user_achievements(&self, user_id: UserId) -> Result<HashSet<AchievementId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT achievement_id FROM user_achievements WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn list_achievement_rules(&self) -> Result<Vec<AchievementRule>> {
        let rows = sqlx::query("SELECT id, name, metric, threshold FROM achievements ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<AchievementRule> {
                let metric: String = row.try_get("metric")?;
                Ok(AchievementRule {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    metric: metric.parse::<AchievementMetric>()?,
                    threshold: row.try_get("threshold")?,
                })
            })
            .collect()
    }

    async fn grant_achievement(&self, user_id: UserId, achievement_id: AchievementId) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO user_achievements (user_id, achievement_id) VALUES ($1, $2)
             ON CONFLICT (user_id, achievement_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(achievement_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!("Achievement {} already held by user {}", achievement_id, user_id);
        }
        Ok(())
    }

    async fn record_match_performance(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        points: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO match_performances (match_id, player_id, points) VALUES ($1, $2, $3)
             ON CONFLICT (match_id, player_id) DO NOTHING",
        )
        .bind(match_id)
        .bind(player_id)
        .bind(points)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_teams_for_player(&self, player_id: PlayerId) -> Result<Vec<TeamId>> {
        let ids: Vec<TeamId> = sqlx::query_scalar(
            "SELECT DISTINCT team_id FROM team_players WHERE player_id = $1 ORDER BY team_id",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn get_contests_for_team(&self, team_id: TeamId) -> Result<Vec<ContestId>> {
        let ids: Vec<ContestId> = sqlx::query_scalar(
            "SELECT DISTINCT contest_id FROM contest_entries WHERE team_id = $1 ORDER BY contest_id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn get_team_owner(&self, team_id: TeamId) -> Result<Option<UserId>> {
        let owner: Option<UserId> = sqlx::query_scalar("SELECT user_id FROM teams WHERE id = $1")
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }

    async fn count_user_contest_entries(&self, user_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contest_entries WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn apply_match_points(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        points: i64,
    ) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO match_performances (match_id, player_id, points) VALUES ($1, $2, $3)
             ON CONFLICT (match_id, player_id) DO NOTHING",
        )
        .bind(match_id)
        .bind(player_id)
        .bind(points)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let total: Option<i64> =
            sqlx::query_scalar("UPDATE players SET points = points + $2 WHERE id = $1 RETURNING points")
                .bind(player_id)
                .bind(points)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;

        match total {
            Some(total) => Ok(Some(total)),
            None => {
                warn!("Match {} scored unknown player {}", match_id, player_id);
                Ok(Some(points))
            }
        }
    }
}
