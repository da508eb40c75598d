use async_trait::async_trait;
use core_playback::{PlaybackControl, Result, SleepTimer};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;

mock! {
    Control {}

    #[async_trait]
    impl PlaybackControl for Control {
        async fn stop(&self) -> Result<()>;
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_pending_timer() {
    let mut control = MockControl::new();
    control.expect_stop().times(1).returning(|| Ok(()));
    let timer = SleepTimer::new(Arc::new(control));

    timer.start(1_000);
    advance(600).await;
    timer.start(1_000);

    // The first deadline passes without a stop
    advance(600).await;
    assert!(timer.is_active());
    assert_eq!(timer.remaining(), Some(400));

    advance(500).await;
    assert!(!timer.is_active());

    // Nothing left to fire
    advance(5_000).await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_failure_still_disarms() {
    let mut control = MockControl::new();
    control.expect_stop().times(1).returning(|| {
        Err(core_playback::PlaybackError::PlayerFailed(
            "engine gone".to_string(),
        ))
    });
    let timer = SleepTimer::new(Arc::new(control));

    timer.start(50);
    advance(100).await;

    assert!(!timer.is_active());
    assert_eq!(timer.remaining(), None);
}
