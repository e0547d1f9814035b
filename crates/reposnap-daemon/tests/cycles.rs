use pretty_assertions::assert_eq;
use reposnap_core::{Credential, RetryPolicy, Settings, Shutdown, ShutdownSignal};
use reposnap_daemon::{CycleError, Driver};
use reposnap_pipeline::ExportError;
use reposnap_rotation::{generation_dir, list_generations, Phase, RotationJournal};
use reposnap_test_utils::fixtures::{read_tree, tree, write_generation};
use reposnap_test_utils::{FakeArchiver, StaticApi};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    backup: TempDir,
    scratch: TempDir,
    api: Arc<StaticApi>,
    archiver: Arc<FakeArchiver>,
}

impl Harness {
    fn new(api: StaticApi, archiver: FakeArchiver) -> Self {
        Self {
            backup: tempfile::tempdir().unwrap(),
            scratch: tempfile::tempdir().unwrap(),
            api: Arc::new(api),
            archiver: Arc::new(archiver),
        }
    }

    fn settings(&self) -> Settings {
        Settings::new(Credential::new("token"), self.backup.path(), self.scratch.path())
            .with_retention_limit(3)
            .with_retry(RetryPolicy::new(1, Duration::ZERO))
            .with_poll_interval(Duration::from_secs(60))
    }

    fn driver(&self, shutdown: ShutdownSignal) -> Driver {
        Driver::new(&self.settings(), self.api.clone(), self.archiver.clone(), shutdown)
    }

    fn generations(&self) -> Vec<u32> {
        list_generations(self.backup.path()).unwrap()
    }

    fn generation(&self, n: u32) -> std::collections::BTreeMap<String, String> {
        read_tree(&generation_dir(self.backup.path(), n))
    }

    fn fingerprints(&self) -> Option<serde_json::Value> {
        let raw = std::fs::read(self.backup.path().join("fingerprints.json")).ok()?;
        Some(serde_json::from_slice(&raw).unwrap())
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path()).unwrap().next().is_none()
    }
}

fn two_repos() -> StaticApi {
    let api = StaticApi::new()
        .with_org_repo("acme", "widgets")
        .with_user_repo("me", "notes")
        .with_empty_repo("me", "blank");
    api.set_events("acme/widgets", &["push-1"]);
    api.set_events("me/notes", &["push-1"]);
    api
}

#[tokio::test]
async fn unchanged_cycle_skips_export_and_changed_cycle_rotates() {
    let h = Harness::new(two_repos(), FakeArchiver::new());
    let mut driver = h.driver(ShutdownSignal::never());

    let first = driver.run_cycle().await.unwrap();
    assert_eq!((first.discovered, first.changed, first.exported), (2, 2, 2));
    assert_eq!(h.generations(), vec![0]);
    assert_eq!(
        h.generation(0),
        tree(&[
            ("acme/widgets.bundle", "bundle of acme/widgets"),
            ("me/notes.bundle", "bundle of me/notes"),
        ])
    );
    assert_eq!(h.fingerprints().unwrap().as_object().unwrap().len(), 2);

    let second = driver.run_cycle().await.unwrap();
    assert_eq!(second.changed, 0);
    assert!(second.rotation.is_none());
    assert_eq!(h.archiver.total_calls(), 2);
    assert_eq!(h.generations(), vec![0]);

    h.api.push_event("acme/widgets", "push-2");
    h.archiver.set_contents("acme/widgets", "widgets v2");
    let third = driver.run_cycle().await.unwrap();
    assert_eq!((third.changed, third.exported), (1, 1));
    assert_eq!(h.generations(), vec![0, 1]);
    // The unchanged repository is carried forward into the newest generation.
    assert_eq!(
        h.generation(0),
        tree(&[
            ("acme/widgets.bundle", "widgets v2"),
            ("me/notes.bundle", "bundle of me/notes"),
        ])
    );
    assert_eq!(h.generation(1), tree(&[("acme/widgets.bundle", "bundle of acme/widgets")]));
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn exhausted_export_never_rotates_or_persists() {
    let h = Harness::new(two_repos(), FakeArchiver::new().failing("me/notes", 2));
    let mut driver = h.driver(ShutdownSignal::never());

    let err = driver.run_cycle().await.unwrap_err();
    assert!(
        matches!(err, CycleError::Export(ExportError::Exhausted { attempts: 2, .. })),
        "{err}"
    );
    assert!(h.generations().is_empty());
    assert!(h.fingerprints().is_none());
    assert!(h.scratch_is_empty());

    // Both repositories are still considered changed on the next cycle.
    let retry = driver.run_cycle().await.unwrap();
    assert_eq!(retry.exported, 2);
    assert_eq!(h.generations(), vec![0]);
}

#[tokio::test]
async fn rejected_repository_is_skipped_and_reevaluated() {
    let api = two_repos().with_user_repo("me", "x;reboot");
    let h = Harness::new(api, FakeArchiver::new());
    let mut driver = h.driver(ShutdownSignal::never());

    let summary = driver.run_cycle().await.unwrap();

    assert_eq!(summary.exported, 2);
    assert_eq!(summary.rejected.len(), 1);
    assert_eq!(h.archiver.calls("me/x;reboot"), 0);
    let fingerprints = h.fingerprints().unwrap();
    assert!(fingerprints.get("me/x;reboot").is_none());
    assert!(fingerprints.get("acme/widgets").is_some());
}

#[tokio::test]
async fn fingerprints_of_vanished_repositories_are_dropped() {
    let h = Harness::new(two_repos(), FakeArchiver::new());
    std::fs::write(
        h.backup.path().join("fingerprints.json"),
        br#"{"gone/repo": "abc"}"#,
    )
    .unwrap();
    let mut driver = h.driver(ShutdownSignal::never());

    driver.run_cycle().await.unwrap();

    assert!(h.fingerprints().unwrap().get("gone/repo").is_none());
}

#[tokio::test]
async fn event_feed_failure_aborts_cycle() {
    let h = Harness::new(two_repos(), FakeArchiver::new());
    h.api.fail_events("me/notes");
    let mut driver = h.driver(ShutdownSignal::never());

    let err = driver.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::ChangeDetection(_)));
    assert_eq!(h.archiver.total_calls(), 0);
    assert!(h.generations().is_empty());
}

#[tokio::test]
async fn cancelled_cycle_does_not_rotate() {
    let h = Harness::new(two_repos(), FakeArchiver::new());
    let shutdown = Shutdown::new();
    shutdown.trigger();
    let mut driver = h.driver(shutdown.signal());

    let err = driver.run_cycle().await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(h.generations().is_empty());
    assert!(h.fingerprints().is_none());
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_export_stops_loop() {
    let h = Harness::new(two_repos(), FakeArchiver::new().hanging("me/notes"));
    let shutdown = Shutdown::new();
    let driver = h.driver(shutdown.signal());
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        trigger.trigger();
    });

    tokio::time::timeout(Duration::from_secs(3600), driver.run())
        .await
        .unwrap();

    assert!(h.generations().is_empty());
    assert!(h.scratch_is_empty());
}

#[tokio::test(start_paused = true)]
async fn loop_sleeps_between_cycles_until_shutdown() {
    let h = Harness::new(two_repos(), FakeArchiver::new());
    let shutdown = Shutdown::new();
    let driver = h.driver(shutdown.signal());
    let api = h.api.clone();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        // First cycle runs at once; change something before the second.
        tokio::time::sleep(Duration::from_secs(30)).await;
        api.push_event("me/notes", "push-2");
        tokio::time::sleep(Duration::from_secs(60)).await;
        trigger.trigger();
    });

    driver.run().await;

    assert_eq!(h.generations(), vec![0, 1]);
    assert_eq!(h.archiver.calls("me/notes"), 2);
    assert_eq!(h.archiver.calls("acme/widgets"), 1);
}

#[tokio::test]
async fn startup_recovery_finishes_interrupted_rotation() {
    let h = Harness::new(two_repos(), FakeArchiver::new());
    for n in [1, 2, 3, 4] {
        write_generation(h.backup.path(), n, &[("acme/widgets.bundle", "old")]);
    }
    let mut journal = RotationJournal::begin(3, vec![3, 2, 1, 0]);
    journal.advance(Phase::Evicting, h.backup.path()).unwrap();

    let report = h.driver(ShutdownSignal::never()).recover().await.unwrap().unwrap();

    assert_eq!(report.evicted, vec![4]);
    assert_eq!(h.generations(), vec![1, 2, 3]);
    assert!(RotationJournal::load(h.backup.path()).unwrap().is_none());
}
