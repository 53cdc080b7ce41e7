//! End-to-end tests for match processing on the in-memory store

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, ScoringError};
use crate::models::{
    AchievementId, AchievementRule, ContestEntryRef, ContestId, EntryId, MatchId, PlayerId,
    PlayerPerformance, RosterRole, ScoringEvent, TeamId, TeamMember, UserId, UserTeam,
};
use crate::{InMemoryStore, ScoringConfig, ScoringEngine, ScoringStore};

/// Two users, three teams, one contest.
///
/// Players 1..=4. Team 10 (user 100): 1 captain, 2 vice, 3.
/// Team 20 (user 200): 2 captain, 4. Team 30 (user 100): 4 only.
/// Contest 500 holds teams 10 and 20; team 20 entered first.
async fn fixture() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    for player_id in 1..=4 {
        store.add_player(player_id, 0).await;
    }

    store
        .add_team(
            10,
            100,
            vec![
                TeamMember::new(1, RosterRole::Captain),
                TeamMember::new(2, RosterRole::ViceCaptain),
                TeamMember::member(3),
            ],
        )
        .await;
    store.add_team(20, 200, vec![TeamMember::new(2, RosterRole::Captain), TeamMember::member(4)]).await;
    store.add_team(30, 100, vec![TeamMember::member(4)]).await;

    let now = Utc::now();
    store.add_contest_entry(1, 500, 100, 10, now).await;
    store.add_contest_entry(2, 500, 200, 20, now - Duration::hours(1)).await;

    Arc::new(store)
}

fn match_one() -> Vec<PlayerPerformance> {
    vec![
        // 50 + 4 + 4 + 8 = 66
        PlayerPerformance { player_id: 1, runs: Some(50), fours: Some(4), sixes: Some(2), ..Default::default() },
        // 5 wickets: 141
        PlayerPerformance { player_id: 2, wickets: Some(5), ..Default::default() },
        // duck: -2
        PlayerPerformance { player_id: 3, runs: Some(0), balls_faced: Some(5), ..Default::default() },
        // 16 + 12 + 6 = 34
        PlayerPerformance {
            player_id: 4,
            catches: Some(2),
            stumpings: Some(1),
            run_outs: Some(1),
            ..Default::default()
        },
    ]
}

#[tokio::test]
async fn test_match_flows_through_every_stage() {
    let store = fixture().await;
    let engine = ScoringEngine::new(&ScoringConfig::default(), store.clone());

    let events = engine.process_match_results(1, &match_one()).await.unwrap();

    assert_eq!(store.player_points(1).await, Some(66));
    assert_eq!(store.player_points(2).await, Some(141));
    assert_eq!(store.player_points(3).await, Some(-2));
    assert_eq!(store.player_points(4).await, Some(34));

    // 66*2 + 141*1.5 - 2 = 341.5 -> 342
    assert_eq!(store.team_total(10).await, Some(342));
    // 141*2 + 34 = 316
    assert_eq!(store.team_total(20).await, Some(316));
    assert_eq!(store.team_total(30).await, Some(34));

    assert_eq!(store.entry_standing(1).await, Some((Some(1), 342)));
    assert_eq!(store.entry_standing(2).await, Some((Some(2), 316)));

    // user 100 owns teams 10 and 30
    assert_eq!(store.user_progression(100).await, Some((376, 1)));
    assert_eq!(store.user_progression(200).await, Some((316, 1)));

    // 100 Points, First Team, First Contest for both users
    let mut granted = store.granted_achievements(100).await;
    granted.sort_unstable();
    assert_eq!(granted, vec![1, 6, 7]);

    match events.last() {
        Some(ScoringEvent::BatchCompleted {
            processed_count,
            skipped_count,
            teams_updated,
            contests_ranked,
            users_updated,
            ..
        }) => {
            assert_eq!(*processed_count, 4);
            assert_eq!(*skipped_count, 0);
            assert_eq!(*teams_updated, 3);
            assert_eq!(*contests_ranked, 1);
            assert_eq!(*users_updated, 2);
        }
        other => panic!("expected BatchCompleted, got {other:?}"),
    }

    let granted_events = events
        .iter()
        .filter(|e| matches!(e, ScoringEvent::AchievementGranted { .. }))
        .count();
    assert_eq!(granted_events, 6);
}

#[tokio::test]
async fn test_reprocessing_a_match_changes_nothing() {
    let store = fixture().await;
    let engine = ScoringEngine::new(&ScoringConfig::default(), store.clone());

    engine.process_match_results(1, &match_one()).await.unwrap();
    let events = engine.process_match_results(1, &match_one()).await.unwrap();

    assert_eq!(store.player_points(1).await, Some(66));
    assert_eq!(store.team_total(10).await, Some(342));
    assert_eq!(store.user_progression(100).await, Some((376, 1)));
    assert_eq!(store.granted_achievements(100).await.len(), 3);

    let skipped = events.iter().filter(|e| matches!(e, ScoringEvent::PlayerSkipped { .. })).count();
    assert_eq!(skipped, 4);
    assert!(matches!(
        events.last(),
        Some(ScoringEvent::BatchCompleted { processed_count: 0, skipped_count: 4, teams_updated: 3, .. })
    ));
}

#[tokio::test]
async fn test_points_accumulate_across_matches() {
    let store = fixture().await;
    let engine = ScoringEngine::new(&ScoringConfig::default(), store.clone());

    engine.process_match_results(1, &match_one()).await.unwrap();
    let second = vec![PlayerPerformance {
        player_id: 4,
        runs: Some(120),
        fours: Some(10),
        sixes: Some(5),
        ..Default::default()
    }];
    engine.process_match_results(2, &second).await.unwrap();

    // 34 + (120 + 10 + 10 + 16)
    assert_eq!(store.player_points(4).await, Some(190));
    // 141*2 + 190
    assert_eq!(store.team_total(20).await, Some(472));
    // team 10 untouched by match 2 but contest re-ranked with the new total
    assert_eq!(store.entry_standing(2).await, Some((Some(1), 472)));
    assert_eq!(store.entry_standing(1).await, Some((Some(2), 342)));
    // user 100: 342 + 190
    assert_eq!(store.user_progression(100).await, Some((532, 1)));

    let mut granted = store.granted_achievements(100).await;
    granted.sort_unstable();
    assert_eq!(granted, vec![1, 2, 6, 7]);
}

#[tokio::test]
async fn test_tied_entries_rank_earlier_entry_first() {
    let store = fixture().await;
    let engine = ScoringEngine::new(&ScoringConfig::default(), store.clone());

    let ranked = engine.recompute_contest_rankings(500).await.unwrap();
    // Both teams at 0; entry 2 was created an hour earlier
    assert_eq!(ranked[0].entry_id, 2);
    assert_eq!(ranked[1].entry_id, 1);
    assert_eq!(ranked.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn test_unrostered_player_only_updates_player() {
    let store = fixture().await;
    store.add_player(99, 5).await;
    let engine = ScoringEngine::new(&ScoringConfig::default(), store.clone());

    let perf = PlayerPerformance { player_id: 99, runs: Some(12), ..Default::default() };
    let events = engine.process_match_results(3, &[perf]).await.unwrap();

    assert_eq!(store.player_points(99).await, Some(17));
    assert_eq!(store.team_total(10).await, Some(0));
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_concurrent_matches_do_not_lose_updates() {
    let store = fixture().await;
    let engine = Arc::new(ScoringEngine::new(&ScoringConfig::default(), store.clone()));

    let handles: Vec<_> = (1..=8)
        .map(|match_id| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let perf = PlayerPerformance { player_id: 4, runs: Some(10), ..Default::default() };
                engine.process_match_results(match_id, &[perf]).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.player_points(4).await, Some(80));
    assert_eq!(store.team_total(30).await, Some(80));
    // Team 20 also rosters player 4 (member, no multiplier)
    assert_eq!(store.team_total(20).await, Some(80));
}

#[tokio::test]
async fn test_custom_multipliers() {
    let store = fixture().await;
    let mut config = ScoringConfig::default();
    config.multipliers.captain = rust_decimal::Decimal::from(3);
    let engine = ScoringEngine::new(&config, store.clone());

    store.add_player(1, 10).await;
    assert_eq!(engine.recompute_team_points(10).await.unwrap(), 30);
}

/// In-memory store whose first team total write fails
struct FailingOnceStore {
    inner: InMemoryStore,
    failed: AtomicBool,
}

#[async_trait]
impl ScoringStore for FailingOnceStore {
    async fn get_team_players(&self, team_id: TeamId) -> Result<Vec<TeamMember>> {
        self.inner.get_team_players(team_id).await
    }

    async fn get_player_points(&self, player_id: PlayerId) -> Result<i64> {
        self.inner.get_player_points(player_id).await
    }

    async fn set_player_points(&self, player_id: PlayerId, points: i64) -> Result<()> {
        self.inner.set_player_points(player_id, points).await
    }

    async fn set_team_total_points(&self, team_id: TeamId, total_points: i64) -> Result<()> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(ScoringError::Internal("connection reset".to_string()));
        }
        self.inner.set_team_total_points(team_id, total_points).await
    }

    async fn get_contest_entries(&self, contest_id: ContestId) -> Result<Vec<ContestEntryRef>> {
        self.inner.get_contest_entries(contest_id).await
    }

    async fn get_team_total_points(&self, team_id: TeamId) -> Result<i64> {
        self.inner.get_team_total_points(team_id).await
    }

    async fn set_contest_entry_rank_and_points(&self, entry_id: EntryId, rank: i32, points: i64) -> Result<()> {
        self.inner.set_contest_entry_rank_and_points(entry_id, rank, points).await
    }

    async fn get_user_teams(&self, user_id: UserId) -> Result<Vec<UserTeam>> {
        self.inner.get_user_teams(user_id).await
    }

    async fn set_user_progression(&self, user_id: UserId, total_points: i64, level: i32) -> Result<()> {
        self.inner.set_user_progression(user_id, total_points, level).await
    }

    async fn get_user_achievements(&self, user_id: UserId) -> Result<HashSet<AchievementId>> {
        self.inner.get_user_achievements(user_id).await
    }

    async fn list_achievement_rules(&self) -> Result<Vec<AchievementRule>> {
        self.inner.list_achievement_rules().await
    }

    async fn grant_achievement(&self, user_id: UserId, achievement_id: AchievementId) -> Result<()> {
        self.inner.grant_achievement(user_id, achievement_id).await
    }

    async fn record_match_performance(&self, match_id: MatchId, player_id: PlayerId, points: i64) -> Result<bool> {
        self.inner.record_match_performance(match_id, player_id, points).await
    }

    async fn get_teams_for_player(&self, player_id: PlayerId) -> Result<Vec<TeamId>> {
        self.inner.get_teams_for_player(player_id).await
    }

    async fn get_contests_for_team(&self, team_id: TeamId) -> Result<Vec<ContestId>> {
        self.inner.get_contests_for_team(team_id).await
    }

    async fn get_team_owner(&self, team_id: TeamId) -> Result<Option<UserId>> {
        self.inner.get_team_owner(team_id).await
    }

    async fn count_user_contest_entries(&self, user_id: UserId) -> Result<i64> {
        self.inner.count_user_contest_entries(user_id).await
    }
}

#[tokio::test]
async fn test_retry_after_failed_aggregation_repairs_totals() {
    let inner = InMemoryStore::new();
    inner.add_player(1, 0).await;
    inner.add_team(10, 100, vec![TeamMember::new(1, RosterRole::Captain)]).await;
    inner.add_contest_entry(1, 500, 100, 10, Utc::now()).await;

    let store = Arc::new(FailingOnceStore { inner: inner.clone(), failed: AtomicBool::new(false) });
    let engine = ScoringEngine::new(&ScoringConfig::default(), store);

    // 50 runs + fifty bonus = 58
    let performances = vec![PlayerPerformance { player_id: 1, runs: Some(50), ..Default::default() }];

    assert!(engine.process_match_results(1, &performances).await.is_err());
    assert_eq!(inner.player_points(1).await, Some(58));
    assert_eq!(inner.team_total(10).await, Some(0));

    let events = engine.process_match_results(1, &performances).await.unwrap();
    assert!(matches!(events[0], ScoringEvent::PlayerSkipped { player_id: 1, .. }));

    // Points are not applied twice, but everything downstream catches up
    assert_eq!(inner.player_points(1).await, Some(58));
    assert_eq!(inner.team_total(10).await, Some(116));
    assert_eq!(inner.entry_standing(1).await, Some((Some(1), 116)));
    assert_eq!(inner.user_progression(100).await, Some((116, 1)));
}
