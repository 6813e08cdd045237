//! Run lock acquisition under contention.

use std::fs;
use std::time::Duration;

use stackwarden::application::lock::LockManager;
use stackwarden::application::shutdown::Shutdown;
use stackwarden::error::{Error, LockError};
use stackwarden::infrastructure::config::lock::LockPolicy;
use stackwarden::testkit::host::MockHost;
use tokio::sync::watch;

#[tokio::test]
async fn dead_owner_is_replaced_within_one_poll() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.lock");
    fs::write(&path, "4711\n").unwrap();
    let host = MockHost::new();
    let interval = Duration::from_millis(200);

    let started = std::time::Instant::now();
    let guard = LockManager::new(&path, host.processes())
        .wait(Duration::from_secs(30))
        .interval(interval)
        .acquire(&Shutdown::never())
        .await
        .unwrap();

    assert!(guard.is_held());
    assert!(started.elapsed() < interval);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        format!("{}\n", std::process::id())
    );
}

#[tokio::test]
async fn shutdown_cancels_an_indefinite_wait() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.lock");
    fs::write(&path, "77\n").unwrap();
    let host = MockHost::new().with_alive(77);
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    });

    let error = LockManager::new(&path, host.processes())
        .self_pid(1000)
        .wait(Duration::ZERO)
        .interval(Duration::from_millis(10))
        .policy(LockPolicy::Wait)
        .acquire(&Shutdown::new(rx))
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Lock(LockError::Cancelled)));
    assert_eq!(fs::read_to_string(&path).unwrap(), "77\n");
}

#[tokio::test]
async fn second_manager_sees_first_as_owner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.lock");
    let host = MockHost::new().with_alive(1000);

    let first = LockManager::new(&path, host.processes())
        .self_pid(1000)
        .acquire(&Shutdown::never())
        .await
        .unwrap();

    let error = LockManager::new(&path, host.processes())
        .self_pid(2000)
        .wait(Duration::ZERO)
        .acquire(&Shutdown::never())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        Error::Lock(LockError::Contended { owner_pid: 1000, .. })
    ));

    first.release();
    let second = LockManager::new(&path, host.processes())
        .self_pid(2000)
        .acquire(&Shutdown::never())
        .await
        .unwrap();
    assert!(second.is_held());
}
