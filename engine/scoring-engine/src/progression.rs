//! User totals, levels and achievements

use tracing::{debug, info};

use crate::config::ProgressionConfig;
use crate::error::Result;
use crate::models::{AchievementMetric, AchievementRule, ProgressSnapshot, UserId, UserProgression};
use crate::store::ScoringStore;

/// Achievement catalogue seeded into new stores
pub fn default_achievement_rules() -> Vec<AchievementRule> {
    vec![
        AchievementRule::new(1, "100 Points", AchievementMetric::TotalPoints, 100),
        AchievementRule::new(2, "500 Points", AchievementMetric::TotalPoints, 500),
        AchievementRule::new(3, "1000 Points", AchievementMetric::TotalPoints, 1000),
        AchievementRule::new(4, "Level 5", AchievementMetric::Level, 5),
        AchievementRule::new(5, "Level 10", AchievementMetric::Level, 10),
        AchievementRule::new(6, "First Team", AchievementMetric::TeamCount, 1),
        AchievementRule::new(7, "First Contest", AchievementMetric::ContestCount, 1),
    ]
}

/// Recomputes user totals and grants achievements
#[derive(Debug, Clone)]
pub struct ProgressionUpdater {
    points_per_level: i64,
}

impl Default for ProgressionUpdater {
    fn default() -> Self {
        Self::new(&ProgressionConfig::default())
    }
}

impl ProgressionUpdater {
    pub fn new(config: &ProgressionConfig) -> Self {
        Self { points_per_level: config.points_per_level.max(1) }
    }

    /// `floor(total / points_per_level) + 1`, never below 1
    pub fn level_for_points(&self, total_points: i64) -> i32 {
        if total_points <= 0 {
            return 1;
        }
        i32::try_from((total_points / self.points_per_level).saturating_add(1)).unwrap_or(i32::MAX)
    }

    /// Recompute a user's total and level from their teams, then grant every
    /// achievement whose threshold is newly met
    pub async fn recompute_user_progression<S>(&self, store: &S, user_id: UserId) -> Result<UserProgression>
    where
        S: ScoringStore + ?Sized,
    {
        let teams = store.get_user_teams(user_id).await?;
        let total_points = teams.iter().fold(0i64, |sum, t| sum.saturating_add(t.total_points));
        let level = self.level_for_points(total_points);

        store.set_user_progression(user_id, total_points, level).await?;

        let earned = store.get_user_achievements(user_id).await?;
        let pending: Vec<AchievementRule> = store
            .list_achievement_rules()
            .await?
            .into_iter()
            .filter(|rule| !earned.contains(&rule.id))
            .collect();

        // Contest count is the only metric that needs another query
        let contest_count = if pending.iter().any(|r| r.metric == AchievementMetric::ContestCount) {
            store.count_user_contest_entries(user_id).await?
        } else {
            0
        };

        let snapshot = ProgressSnapshot {
            total_points,
            level,
            team_count: teams.len() as i64,
            contest_count,
        };

        let mut newly_granted = Vec::new();
        for rule in pending {
            if rule.is_met(&snapshot) {
                store.grant_achievement(user_id, rule.id).await?;
                info!("User {} earned achievement '{}'", user_id, rule.name);
                newly_granted.push(rule.id);
            } else {
                debug!(
                    "User {} below '{}': {} {} < {}",
                    user_id,
                    rule.name,
                    rule.metric,
                    snapshot.value(rule.metric),
                    rule.threshold
                );
            }
        }

        info!("User {} progression: {} pts, level {}", user_id, total_points, level);

        Ok(UserProgression { user_id, total_points, level, newly_granted })
    }
}
