//! Tests for the volume synchronizer

use super::*;
use crate::backends::mock::{HangingBackend, MemoryStore, RecordingBackend};
use proptest::prelude::*;

struct Fixture {
    store: Arc<MemoryStore>,
    mixer: Arc<RecordingBackend>,
    mpd: Arc<RecordingBackend>,
    remote: Arc<RecordingBackend>,
    sync: VolumeSynchronizer,
}

fn make_fixture(current: i64, max: i64) -> Fixture {
    let store = Arc::new(MemoryStore::new(VolumeSettings { current, max }));
    let mixer = Arc::new(RecordingBackend::new("mixer"));
    let mpd = Arc::new(RecordingBackend::new("mpd"));
    let remote = Arc::new(RecordingBackend::new("plexamp"));
    let backends: Vec<Arc<dyn VolumeBackend>> = vec![mixer.clone(), mpd.clone(), remote.clone()];
    let sync = VolumeSynchronizer::new(store.clone(), backends, 80, Duration::from_secs(1));

    Fixture {
        store,
        mixer,
        mpd,
        remote,
        sync,
    }
}

#[test]
fn test_clamp_level_bounds() {
    assert_eq!(clamp_level(150, 90), 90);
    assert_eq!(clamp_level(-5, 100), 1);
    assert_eq!(clamp_level(0, 100), 1);
    assert_eq!(clamp_level(42, 100), 42);
}

#[test]
fn test_ceiling_never_below_floor() {
    assert_eq!(VolumeSettings { current: 10, max: 0 }.ceiling(), 1);
    assert_eq!(VolumeSettings { current: 10, max: 250 }.ceiling(), 100);
    assert_eq!(VolumeSettings { current: 10, max: 90 }.ceiling(), 90);
}

#[tokio::test]
async fn test_set_volume_fans_out_in_order() {
    let fx = make_fixture(50, 100);

    let report = fx.sync.set_volume(42).await.unwrap();
    assert_eq!(report.level, 42);
    assert!(report.all_succeeded());
    assert_eq!(
        report.outcomes.iter().map(|o| o.backend).collect::<Vec<_>>(),
        vec!["mixer", "mpd", "plexamp"]
    );
    assert_eq!(fx.store.current(), 42);
    assert_eq!(fx.mixer.calls(), vec![42]);
    assert_eq!(fx.mpd.calls(), vec![42]);
    assert_eq!(fx.remote.calls(), vec![42]);
}

#[tokio::test]
async fn test_set_volume_clamps_to_configured_max() {
    let fx = make_fixture(50, 90);

    let report = fx.sync.set_volume(150).await.unwrap();
    assert_eq!(report.level, 90);
    assert_eq!(fx.store.current(), 90);
}

#[tokio::test]
async fn test_set_volume_negative_persists_floor() {
    let fx = make_fixture(50, 100);

    fx.sync.set_volume(-5).await.unwrap();
    assert_eq!(fx.store.current(), 1);
    assert_eq!(fx.mixer.calls(), vec![1]);
}

#[tokio::test]
async fn test_set_volume_zero_applies_default() {
    let fx = make_fixture(50, 100);

    fx.sync.set_volume(0).await.unwrap();
    fx.sync.set_volume(80).await.unwrap();
    assert_eq!(fx.store.writes(), vec![80, 80]);
}

#[tokio::test]
async fn test_set_volume_is_idempotent_but_fans_out_twice() {
    let fx = make_fixture(50, 100);

    fx.sync.set_volume(30).await.unwrap();
    fx.sync.set_volume(30).await.unwrap();
    assert_eq!(fx.store.current(), 30);
    assert_eq!(fx.mixer.calls(), vec![30, 30]);
    assert_eq!(fx.remote.calls(), vec![30, 30]);
}

#[tokio::test]
async fn test_best_effort_failure_is_reported_not_raised() {
    let fx = make_fixture(50, 100);
    fx.mpd.set_fail(true);

    let report = fx.sync.set_volume(60).await.unwrap();
    assert!(!report.all_succeeded());
    let failed: Vec<_> = report.failures().map(|o| o.backend).collect();
    assert_eq!(failed, vec!["mpd"]);

    // Later backends still ran and the store holds the new level
    assert_eq!(fx.remote.calls(), vec![60]);
    assert_eq!(fx.store.current(), 60);
}

#[tokio::test]
async fn test_persistence_failure_stops_fan_out() {
    let fx = make_fixture(50, 100);
    fx.store.set_fail_writes(true);

    let err = fx.sync.set_volume(60).await.unwrap_err();
    assert!(matches!(err, VolumeError::Persistence { level: 60, .. }));
    assert!(fx.mixer.calls().is_empty());
    assert_eq!(fx.store.current(), 50);
}

#[tokio::test]
async fn test_unreadable_settings_fail_the_call() {
    let fx = make_fixture(50, 100);
    fx.store.set_fail_reads(true);

    let err = fx.sync.apply_delta(Direction::Up, 1).await.unwrap_err();
    assert!(matches!(err, VolumeError::SettingsUnavailable { .. }));
    assert!(fx.store.writes().is_empty());
}

#[tokio::test]
async fn test_apply_delta_moves_from_stored_level() {
    let fx = make_fixture(50, 100);

    fx.sync.apply_delta(Direction::Up, 3).await.unwrap();
    assert_eq!(fx.store.current(), 53);

    fx.sync.apply_delta(Direction::Down, 1).await.unwrap();
    assert_eq!(fx.store.current(), 52);
}

#[tokio::test]
async fn test_apply_delta_respects_bounds() {
    let fx = make_fixture(89, 90);
    fx.sync.apply_delta(Direction::Up, 3).await.unwrap();
    assert_eq!(fx.store.current(), 90);

    let fx = make_fixture(2, 100);
    fx.sync.apply_delta(Direction::Down, 3).await.unwrap();
    assert_eq!(fx.store.current(), 1);
}

#[tokio::test]
async fn test_apply_delta_after_persistence_failure() {
    let fx = make_fixture(50, 100);

    fx.store.set_fail_writes(true);
    assert!(fx.sync.apply_delta(Direction::Up, 1).await.is_err());

    fx.store.set_fail_writes(false);
    fx.sync.apply_delta(Direction::Up, 1).await.unwrap();
    assert_eq!(fx.store.current(), 51);
}

#[tokio::test]
async fn test_resync_applies_default_on_fresh_store() {
    let fx = make_fixture(0, 100);

    let report = fx.sync.resync().await.unwrap();
    assert_eq!(report.level, 80);
    assert_eq!(fx.mixer.calls(), vec![80]);
}

#[tokio::test]
async fn test_resync_pushes_stored_level() {
    let fx = make_fixture(37, 100);

    fx.sync.resync().await.unwrap();
    assert_eq!(fx.mpd.calls(), vec![37]);
    assert_eq!(fx.store.writes(), vec![37]);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_backend_times_out() {
    let store = Arc::new(MemoryStore::new(VolumeSettings { current: 50, max: 100 }));
    let after = Arc::new(RecordingBackend::new("after"));
    let backends: Vec<Arc<dyn VolumeBackend>> = vec![Arc::new(HangingBackend), after.clone()];
    let sync = VolumeSynchronizer::new(store.clone(), backends, 80, Duration::from_secs(2));

    let report = sync.set_volume(25).await.unwrap();
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0].result,
        Err(BackendError::Timeout { backend: "hanging", .. })
    ));
    assert_eq!(after.calls(), vec![25]);
    assert_eq!(store.current(), 25);
}

proptest! {
    #[test]
    fn prop_clamped_level_in_range(raw in -1000i64..1000, max in -10i64..200) {
        let settings = VolumeSettings { current: 0, max };
        let level = clamp_level(raw, settings.ceiling());
        prop_assert!(level >= MIN_VOLUME);
        prop_assert!(level <= MAX_VOLUME);
        prop_assert!(i64::from(level) <= max.max(1));
    }
}
