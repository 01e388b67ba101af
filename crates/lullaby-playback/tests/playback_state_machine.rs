//! State machine tests for `PlaybackSession`, driven directly with a fake
//! narration output.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::FakeNarration;
use lullaby_core::{CacheKey, CachedAudioHandle, FailureReason, FetchError, PlaybackState};
use lullaby_playback::{
    EngineStatus, Generation, PlaybackError, PlaybackEvent, PlaybackSession, PollOutcome,
};
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

const DURATION: u64 = 120_000;

fn handle() -> CachedAudioHandle {
    let key = CacheKey::derive("A sleepy bear", "en");
    let path = PathBuf::from(key.file_name("mp3"));
    CachedAudioHandle::new(key, path, 1024)
}

fn session(narration: &Arc<FakeNarration>) -> (PlaybackSession, mpsc::UnboundedReceiver<PlaybackEvent>) {
    PlaybackSession::new(narration.clone())
}

fn drain_states(rx: &mut mpsc::UnboundedReceiver<PlaybackEvent>) -> Vec<PlaybackState> {
    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PlaybackEvent::StateChanged { state } = event {
            states.push(state);
        }
    }
    states
}

async fn playing(narration: &Arc<FakeNarration>) -> (PlaybackSession, mpsc::UnboundedReceiver<PlaybackEvent>, Generation) {
    let (mut session, mut rx) = session(narration);
    let generation = session.begin_fetch().await;
    assert_ok!(session.complete_fetch(generation, Ok(handle())).await);
    drain_states(&mut rx);
    (session, rx, generation)
}

#[tokio::test]
async fn new_session_is_idle() {
    let narration = FakeNarration::new(DURATION);
    let (session, _rx) = session(&narration);

    assert_eq!(session.state(), &PlaybackState::Idle);
    assert!(!session.is_scrubbing());
    assert_eq!(session.pending_len(), 0);
}

#[tokio::test]
async fn successful_fetch_loads_and_autoplays() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, mut rx) = session(&narration);

    let generation = session.begin_fetch().await;
    assert_eq!(session.state(), &PlaybackState::Fetching);
    assert_ok!(session.complete_fetch(generation, Ok(handle())).await);

    assert_eq!(
        drain_states(&mut rx),
        vec![
            PlaybackState::Fetching,
            PlaybackState::Loaded { handle: handle() },
            PlaybackState::Playing {
                position_ms: 0,
                duration_ms: DURATION
            },
        ]
    );
    assert_eq!(narration.loads(), 1);
    assert_eq!(narration.plays(), 1);
    assert!(narration.is_playing());
}

#[tokio::test]
async fn fetch_failure_lands_in_failed_without_loading() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, _rx) = session(&narration);

    let generation = session.begin_fetch().await;
    let err = session
        .complete_fetch(
            generation,
            Err(FetchError::Service {
                status: 503,
                message: "busy".into(),
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PlaybackError::FetchFailed(_)));
    assert!(matches!(
        session.state(),
        PlaybackState::Failed {
            reason: FailureReason::FetchFailed { .. }
        }
    ));
    assert_eq!(narration.loads(), 0);
}

#[tokio::test]
async fn load_failure_lands_in_failed() {
    let narration = FakeNarration::new(DURATION);
    narration.set_fail_load(true);
    let (mut session, _rx) = session(&narration);

    let generation = session.begin_fetch().await;
    let err = session
        .complete_fetch(generation, Ok(handle()))
        .await
        .unwrap_err();

    assert!(matches!(err, PlaybackError::EngineLoadFailed(_)));
    assert!(matches!(
        session.state(),
        PlaybackState::Failed {
            reason: FailureReason::EngineLoadFailed { .. }
        }
    ));
    assert_eq!(narration.plays(), 0);
}

#[tokio::test]
async fn superseded_completion_is_rejected() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, _rx) = session(&narration);

    let first = session.begin_fetch().await;
    let second = session.begin_fetch().await;
    assert_ne!(first, second);

    let err = session.complete_fetch(first, Ok(handle())).await.unwrap_err();
    assert_eq!(err, PlaybackError::StaleCompletion);
    assert_eq!(session.state(), &PlaybackState::Fetching);
    assert_eq!(narration.loads(), 0);

    assert_ok!(session.complete_fetch(second, Ok(handle())).await);
    assert!(session.state().is_playing());
}

#[tokio::test]
async fn completion_after_release_is_rejected() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, _rx) = session(&narration);

    let generation = session.begin_fetch().await;
    session.release().await;

    assert_err!(session.complete_fetch(generation, Ok(handle())).await);
    assert_eq!(session.state(), &PlaybackState::Idle);
    assert_eq!(narration.loads(), 0);
}

#[tokio::test]
async fn pause_and_resume_alternate() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, mut rx, generation) = playing(&narration).await;

    narration.advance(3_000);
    assert_ok!(session.poll(generation).await);
    assert_ok!(session.pause().await);
    assert_eq!(
        session.state(),
        &PlaybackState::Paused {
            position_ms: 3_000,
            duration_ms: DURATION
        }
    );

    // Pausing twice changes nothing.
    assert_ok!(session.pause().await);
    assert_ok!(session.resume().await);
    assert_ok!(session.resume().await);

    let states = drain_states(&mut rx);
    assert_eq!(
        states,
        vec![
            PlaybackState::Playing {
                position_ms: 3_000,
                duration_ms: DURATION
            },
            PlaybackState::Paused {
                position_ms: 3_000,
                duration_ms: DURATION
            },
            PlaybackState::Playing {
                position_ms: 3_000,
                duration_ms: DURATION
            },
        ]
    );
    assert!(states.windows(2).all(|pair| pair[0] != pair[1]));
    assert!(narration.is_playing());
}

#[tokio::test]
async fn transport_without_a_track_is_rejected() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, _rx) = session(&narration);

    assert_eq!(session.pause().await, Err(PlaybackError::NotLoaded));
    assert_eq!(session.resume().await, Err(PlaybackError::NotLoaded));
    assert_eq!(session.seek(1_000).await, Err(PlaybackError::NotLoaded));
    assert_eq!(session.begin_scrub(), Err(PlaybackError::NotLoaded));
    assert_eq!(session.state(), &PlaybackState::Idle);
}

#[tokio::test]
async fn calls_during_fetch_are_replayed_in_order() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, _rx) = session(&narration);

    let generation = session.begin_fetch().await;
    assert_ok!(session.seek(30_000).await);
    assert_ok!(session.pause().await);
    assert_eq!(session.pending_len(), 2);
    assert_eq!(narration.seeks(), Vec::<u64>::new());

    assert_ok!(session.complete_fetch(generation, Ok(handle())).await);

    assert_eq!(session.pending_len(), 0);
    assert_eq!(narration.seeks(), vec![30_000]);
    assert_eq!(narration.pauses(), 1);
    assert_eq!(
        session.state(),
        &PlaybackState::Paused {
            position_ms: 30_000,
            duration_ms: DURATION
        }
    );
}

#[tokio::test]
async fn failed_fetch_drops_deferred_calls() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, _rx) = session(&narration);

    let generation = session.begin_fetch().await;
    assert_ok!(session.pause().await);
    assert_err!(
        session
            .complete_fetch(generation, Err(FetchError::Abandoned))
            .await
    );

    assert_eq!(session.pending_len(), 0);
    assert_eq!(narration.pauses(), 0);
}

#[tokio::test]
async fn seek_is_clamped_and_progress_follows_it() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, _rx, generation) = playing(&narration).await;

    assert_ok!(session.seek(60_000).await);
    narration.advance(250);
    let outcome = session.poll(generation).await.unwrap();

    let PollOutcome::Progress(sample) = outcome else {
        panic!("expected progress, got {outcome:?}");
    };
    assert!((60_000..=60_250).contains(&sample.position_ms));

    assert_ok!(session.seek(500_000).await);
    assert_eq!(narration.seeks(), vec![60_000, DURATION]);
}

#[tokio::test]
async fn scrub_ignores_samples_and_seeks_once() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, mut rx, generation) = playing(&narration).await;

    assert_ok!(session.begin_scrub());
    for position in [10_000, 35_000, 60_000] {
        assert_ok!(session.scrub_to(position));
    }
    assert_eq!(session.scrub_position(), Some(60_000));

    narration.advance(1_000);
    assert_eq!(session.poll(generation).await, Ok(PollOutcome::Skipped));
    let sample = EngineStatus {
        position_ms: 5_000,
        duration_ms: DURATION,
        did_just_finish: false,
    };
    assert_eq!(
        session.apply_status(generation, &sample),
        Ok(PollOutcome::Skipped)
    );
    assert_eq!(narration.seeks(), Vec::<u64>::new());

    assert_ok!(session.end_scrub(60_000).await);
    assert!(!session.is_scrubbing());
    assert_eq!(narration.seeks(), vec![60_000]);
    assert_eq!(
        session.state(),
        &PlaybackState::Playing {
            position_ms: 60_000,
            duration_ms: DURATION
        }
    );

    let scrubs: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|event| match event {
            PlaybackEvent::ScrubChanged { position_ms } => Some(position_ms),
            _ => None,
        })
        .collect();
    assert_eq!(
        scrubs,
        vec![
            Some(0),
            Some(10_000),
            Some(35_000),
            Some(60_000),
            None
        ]
    );
}

#[tokio::test]
async fn track_end_finishes_once() {
    let narration = FakeNarration::new(2_000);
    let (mut session, _rx, generation) = playing(&narration).await;

    narration.advance(2_500);
    assert_eq!(session.poll(generation).await, Ok(PollOutcome::Finished));
    assert_eq!(
        session.state(),
        &PlaybackState::Finished { duration_ms: 2_000 }
    );
    assert_eq!(session.poll(generation).await, Ok(PollOutcome::Skipped));
}

#[tokio::test]
async fn stale_samples_are_rejected() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, _rx, old) = playing(&narration).await;

    let current = session.begin_fetch().await;
    assert_ok!(session.complete_fetch(current, Ok(handle())).await);

    let sample = EngineStatus {
        position_ms: 90_000,
        duration_ms: DURATION,
        did_just_finish: false,
    };
    assert_eq!(
        session.apply_status(old, &sample),
        Err(PlaybackError::StaleCompletion)
    );
    assert_eq!(session.poll(old).await, Err(PlaybackError::StaleCompletion));
    assert_eq!(session.state().progress(), Some((0, DURATION)));
}

#[tokio::test]
async fn release_unloads_exactly_once() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, mut rx, _) = playing(&narration).await;

    session.release().await;
    session.release().await;

    assert_eq!(narration.unloads(), 1);
    assert!(!narration.is_loaded());
    assert_eq!(session.state(), &PlaybackState::Idle);
    let released = std::iter::from_fn(|| rx.try_recv().ok())
        .filter(|event| *event == PlaybackEvent::Released)
        .count();
    assert_eq!(released, 2);
}

#[tokio::test]
async fn transport_error_releases_the_track() {
    let narration = FakeNarration::new(DURATION);
    let (mut session, _rx, _) = playing(&narration).await;

    narration.set_fail_transport(true);
    let err = session.pause().await.unwrap_err();

    assert!(matches!(err, PlaybackError::EngineFailed(_)));
    assert!(matches!(
        session.state(),
        PlaybackState::Failed {
            reason: FailureReason::EngineFailed { .. }
        }
    ));
    assert_eq!(narration.unloads(), 1);

    // A new attempt can start from Failed.
    narration.set_fail_transport(false);
    let generation = session.begin_fetch().await;
    assert_ok!(session.complete_fetch(generation, Ok(handle())).await);
    assert!(session.state().is_playing());
}

#[tokio::test]
async fn duration_unknown_until_reported() {
    let narration = FakeNarration::new(0);
    let (mut session, _rx, generation) = playing(&narration).await;

    // Seeks are not clamped while the duration is unknown.
    assert_ok!(session.seek(45_000).await);
    assert_eq!(narration.seeks(), vec![45_000]);
    assert_eq!(session.state().progress(), Some((45_000, 0)));
    assert!(matches!(
        session.poll(generation).await,
        Ok(PollOutcome::Progress(_)) | Ok(PollOutcome::Finished)
    ));
}
