//! End-to-end tests for the federation season pipeline

mod common;

use common::{
    make_controller, match_detail, player_record, schedule_entry, wait_terminal, FakeCity,
    FakeFederation,
};
use std::sync::Arc;
use volleysync::fetch::{RefereeRecord, TeamRecord};
use volleysync::jobs::{JobMode, JobSnapshot, JobState};
use volleysync::pipeline::{StepName, StepStatus};
use volleysync::storage::{Source, Store, Tournament};

fn step_status(snapshot: &JobSnapshot, name: StepName) -> StepStatus {
    snapshot
        .steps
        .iter()
        .find(|step| step.name == name)
        .map(|step| step.status)
        .expect("step missing from snapshot")
}

/// A season 5 with two championship matches, two teams and one referee
fn season_five() -> FakeFederation {
    let mut federation = FakeFederation::default();
    federation.seasons.insert(5, "2024/2025".to_string());
    federation.schedules.insert(
        (5, Tournament::Championship),
        vec![
            schedule_entry(301, Tournament::Championship),
            schedule_entry(302, Tournament::Championship),
        ],
    );
    federation.teams.insert(
        5,
        vec![
            TeamRecord {
                site_id: 1,
                name: "Team 1".to_string(),
                logo_url: None,
                is_women: false,
            },
            TeamRecord {
                site_id: 2,
                name: "Team 2".to_string(),
                logo_url: None,
                is_women: true,
            },
        ],
    );
    federation.details.insert((5, 301), match_detail(&[501, 502]));
    federation.details.insert((5, 302), match_detail(&[]));
    federation.players.insert((5, 501), player_record(501, "Ivanov"));
    federation.players.insert((5, 502), player_record(502, "Petrov"));
    federation.referees.insert(
        5,
        vec![RefereeRecord {
            site_id: 9,
            last_name: "Smirnov".to_string(),
            first_name: "Oleg".to_string(),
            photo_url: None,
        }],
    );
    federation
}

fn season_mode(number: u32) -> JobMode {
    JobMode::Season {
        number,
        step: None,
        refetch: false,
    }
}

#[tokio::test]
async fn test_full_season_run_populates_the_store() {
    let federation = Arc::new(season_five());
    let city = Arc::new(FakeCity::default());
    let (controller, store) = make_controller(city, Arc::clone(&federation) as _, 5);

    controller.start(season_mode(5)).unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.current_season, Some(5));
    for step in StepName::ALL {
        assert_eq!(step_status(&snapshot, step), StepStatus::Completed);
    }

    let store = store.lock().unwrap();
    let season = store.season_by_number(5).unwrap().expect("season missing");
    assert_eq!(season.name, "2024/2025");

    assert!(store.match_exists(Source::Federation, 301).unwrap());
    assert!(store.match_exists(Source::Federation, 302).unwrap());
    assert!(store.match_has_player_stats(Source::Federation, 301).unwrap());

    let player = store
        .player_by_site(Source::Federation, 501)
        .unwrap()
        .expect("player missing");
    assert_eq!(player.last_name, "Ivanov");
    assert_eq!(player.height, Some(190));

    let team = store
        .team_by_site(Source::Federation, 2)
        .unwrap()
        .expect("team missing");
    assert!(team.is_women);
    assert!(store.referee_by_site(Source::Federation, 9).unwrap().is_some());

    let counts = store.counts().unwrap();
    assert_eq!(counts.seasons, 1);
    assert_eq!(counts.federation_matches, 2);
    assert_eq!(counts.players, 2);
    assert_eq!(counts.referees, 1);
}

#[tokio::test]
async fn test_step_progress_totals_reflect_candidates() {
    let federation = Arc::new(season_five());
    let city = Arc::new(FakeCity::default());
    let (controller, _store) = make_controller(city, federation as _, 5);

    controller.start(season_mode(5)).unwrap();
    let snapshot = wait_terminal(&controller).await;

    let step = |name| {
        snapshot
            .steps
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .unwrap()
    };
    // One unit per tournament draw
    assert_eq!(step(StepName::Schedule).total, Some(2));
    assert_eq!(step(StepName::Schedule).done, 2);
    assert_eq!(step(StepName::Teams).total, Some(2));
    assert_eq!(step(StepName::Matches).total, Some(2));
    assert_eq!(step(StepName::Matches).done, 2);
    assert_eq!(step(StepName::Players).total, Some(2));
    assert_eq!(step(StepName::Referees).total, Some(1));
}

#[tokio::test]
async fn test_single_step_marks_others_skipped() {
    let federation = Arc::new(season_five());
    let city = Arc::new(FakeCity::default());
    let (controller, store) = make_controller(city, federation as _, 5);

    controller
        .start(JobMode::Season {
            number: 5,
            step: Some(StepName::Teams),
            refetch: false,
        })
        .unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(step_status(&snapshot, StepName::Teams), StepStatus::Completed);
    for step in [
        StepName::Schedule,
        StepName::Matches,
        StepName::Players,
        StepName::Referees,
    ] {
        assert_eq!(step_status(&snapshot, step), StepStatus::Skipped);
    }

    let store = store.lock().unwrap();
    assert!(store.team_by_site(Source::Federation, 1).unwrap().is_some());
    // The schedule step never ran
    assert!(!store.match_exists(Source::Federation, 301).unwrap());
}

#[tokio::test]
async fn test_matches_step_without_schedule_completes_empty() {
    let federation = Arc::new(season_five());
    let city = Arc::new(FakeCity::default());
    let (controller, store) = make_controller(city, Arc::clone(&federation) as _, 5);

    // No schedule pass has run, so the store holds no candidates
    controller
        .start(JobMode::Season {
            number: 5,
            step: Some(StepName::Matches),
            refetch: false,
        })
        .unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.errors, 0);
    assert_eq!(
        step_status(&snapshot, StepName::Matches),
        StepStatus::Completed
    );
    let matches = snapshot
        .steps
        .iter()
        .find(|step| step.name == StepName::Matches)
        .expect("step missing from snapshot");
    assert_eq!(matches.total, Some(0));
    assert_eq!(matches.done, 0);

    assert!(federation.detail_calls().is_empty());
    let store = store.lock().unwrap();
    assert_eq!(store.counts().unwrap().federation_matches, 0);
}

#[tokio::test]
async fn test_step_failure_aborts_the_job() {
    let mut federation = season_five();
    federation.teams_error.insert(5);
    let federation = Arc::new(federation);
    let city = Arc::new(FakeCity::default());
    let (controller, _store) = make_controller(city, federation as _, 5);

    controller.start(season_mode(5)).unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.state, JobState::Failed);
    assert!(snapshot.last_error.is_some());
    assert_eq!(
        step_status(&snapshot, StepName::Schedule),
        StepStatus::Completed
    );
    assert_eq!(step_status(&snapshot, StepName::Teams), StepStatus::Failed);
    for step in [StepName::Matches, StepName::Players, StepName::Referees] {
        assert_eq!(step_status(&snapshot, step), StepStatus::Pending);
    }
}

#[tokio::test]
async fn test_match_item_error_is_counted_but_not_fatal() {
    let mut federation = season_five();
    federation.detail_errors.insert((5, 302));
    let federation = Arc::new(federation);
    let city = Arc::new(FakeCity::default());
    let (controller, _store) = make_controller(city, federation as _, 5);

    controller.start(season_mode(5)).unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.errors, 1);
    assert_eq!(step_status(&snapshot, StepName::Matches), StepStatus::Completed);
}

#[tokio::test]
async fn test_matches_with_stats_are_skipped_unless_refetch() {
    let federation = Arc::new(season_five());
    let city = Arc::new(FakeCity::default());
    let (controller, _store) = make_controller(city, Arc::clone(&federation) as _, 5);

    controller.start(season_mode(5)).unwrap();
    wait_terminal(&controller).await;
    assert_eq!(federation.detail_calls(), vec![(5, 301), (5, 302)]);

    // 301 now has statistics and is skipped; 302 stored without any
    controller.start(season_mode(5)).unwrap();
    wait_terminal(&controller).await;
    assert_eq!(federation.detail_calls(), vec![(5, 301), (5, 302), (5, 302)]);

    controller
        .start(JobMode::Season {
            number: 5,
            step: None,
            refetch: true,
        })
        .unwrap();
    wait_terminal(&controller).await;
    assert_eq!(
        federation.detail_calls(),
        vec![(5, 301), (5, 302), (5, 302), (5, 301), (5, 302)]
    );
}

#[tokio::test]
async fn test_unknown_season_fails() {
    let federation = Arc::new(FakeFederation::default());
    let city = Arc::new(FakeCity::default());
    let (controller, _store) = make_controller(city, federation as _, 5);

    controller.start(season_mode(9)).unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.state, JobState::Failed);
    assert!(snapshot
        .last_error
        .as_deref()
        .unwrap_or_default()
        .contains("Season 9"));
}

#[tokio::test]
async fn test_stored_season_survives_a_missing_probe() {
    let federation = Arc::new(FakeFederation::default());
    let city = Arc::new(FakeCity::default());
    let (controller, store) = make_controller(city, federation as _, 5);
    {
        let mut store = store.lock().unwrap();
        store.insert_season(9, "Season Nine").unwrap();
    }

    controller.start(season_mode(9)).unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.current_season, Some(9));
}

#[tokio::test]
async fn test_seasons_span_runs_each_in_order() {
    let mut federation = FakeFederation::default();
    federation.seasons.insert(1, "First".to_string());
    federation.seasons.insert(2, "Second".to_string());
    let federation = Arc::new(federation);
    let city = Arc::new(FakeCity::default());
    let (controller, store) = make_controller(city, federation as _, 5);

    controller
        .start(JobMode::Seasons { first: 1, last: 2 })
        .unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.current_season, Some(2));

    let store = store.lock().unwrap();
    assert!(store.season_by_number(1).unwrap().is_some());
    assert!(store.season_by_number(2).unwrap().is_some());
}

#[tokio::test]
async fn test_inverted_seasons_span_fails() {
    let federation = Arc::new(FakeFederation::default());
    let city = Arc::new(FakeCity::default());
    let (controller, _store) = make_controller(city, federation as _, 5);

    controller
        .start(JobMode::Seasons { first: 3, last: 1 })
        .unwrap();
    let snapshot = wait_terminal(&controller).await;
    assert_eq!(snapshot.state, JobState::Failed);
}
