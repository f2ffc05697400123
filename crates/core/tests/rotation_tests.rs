// ═══════════════════════════════════════════════════════════════════
// Rotation Tests — timer stepping, wrap-around, manual selection,
// start/stop lifecycle
// ═══════════════════════════════════════════════════════════════════

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{headlines, sample_holdings, sample_portfolio, MockDataService};
use portfolio_insight_core::models::news::ContextKey;
use portfolio_insight_core::models::settings::Settings;
use portfolio_insight_core::services::context_service::ContextCache;
use portfolio_insight_core::services::rotation_service::RotationScheduler;

const PERIOD: Duration = Duration::from_secs(10);

fn setup(ids: &[&str]) -> (Arc<MockDataService>, Arc<ContextCache>, RotationScheduler) {
    let service = Arc::new(
        MockDataService::new()
            .with_portfolio(sample_portfolio(), sample_holdings())
            .with_portfolio_news("1", headlines(&["Apple beats estimates"]))
            .with_generic_news(headlines(&["Markets rally"])),
    );
    let cache = Arc::new(ContextCache::new(service.clone(), &Settings::default()));
    let scheduler = RotationScheduler::new(Arc::clone(&cache), PERIOD);
    scheduler.set_portfolios(ids.iter().map(|s| s.to_string()).collect());
    (service, cache, scheduler)
}

fn index(scheduler: &RotationScheduler) -> Option<usize> {
    scheduler.current().map(|(i, _)| i)
}

// ── Timer ───────────────────────────────────────────────────────────

mod timer {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn steps_once_per_period() {
        let (_, _, scheduler) = setup(&["1", "2", "3"]);
        scheduler.start();
        assert!(scheduler.is_running());
        assert_eq!(index(&scheduler), Some(0));

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(scheduler.current(), Some((1, "2".to_string())));

        tokio::time::sleep(PERIOD).await;
        assert_eq!(index(&scheduler), Some(2));

        tokio::time::sleep(PERIOD).await;
        assert_eq!(index(&scheduler), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_happens_before_first_period() {
        let (service, _, scheduler) = setup(&["1", "2"]);
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(9_900)).await;
        assert_eq!(index(&scheduler), Some(0));
        assert!(service.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn each_step_refreshes_context() {
        let (service, cache, scheduler) = setup(&["2", "1"]);
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(10_500)).await;

        assert_eq!(index(&scheduler), Some(1));
        assert_eq!(service.count("portfolio-news:1"), 1);
        assert!(cache.entry(&ContextKey::portfolio("1")).is_some());
        assert_eq!(cache.active()[0].headline, "Apple beats estimates");
    }

    #[tokio::test(start_paused = true)]
    async fn single_portfolio_never_rotates() {
        let (service, _, scheduler) = setup(&["1"]);
        scheduler.start();
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(scheduler.current(), Some((0, "1".to_string())));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_list_has_no_current() {
        let (_, _, scheduler) = setup(&[]);
        scheduler.start();
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.current(), None);
        assert_eq!(scheduler.portfolio_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_runs_at_minimum_period() {
        let (_, cache, _) = setup(&[]);
        let scheduler = RotationScheduler::new(cache, Duration::ZERO);
        scheduler.set_portfolios(vec!["1".into(), "2".into(), "3".into()]);
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(index(&scheduler), Some(0));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(scheduler.is_running());
        assert_eq!(index(&scheduler), Some(1));
    }

    #[test]
    fn start_outside_runtime_is_noop() {
        let (_, _, scheduler) = setup(&["1", "2"]);
        scheduler.start();
        assert!(!scheduler.is_running());
    }
}

// ── Lifecycle ───────────────────────────────────────────────────────

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let (_, _, scheduler) = setup(&["1", "2"]);
        scheduler.start();
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(index(&scheduler), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_keeps_a_single_timer() {
        let (_, _, scheduler) = setup(&["1", "2", "3"]);
        scheduler.start();
        scheduler.start();
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(index(&scheduler), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_tears_down_timer() {
        let (_, cache, scheduler) = setup(&["1", "2"]);
        assert_eq!(Arc::strong_count(&cache), 2);

        scheduler.start();
        assert_eq!(Arc::strong_count(&cache), 3);

        drop(scheduler);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(Arc::strong_count(&cache), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shrinking_list_resets_index() {
        let (_, _, scheduler) = setup(&["1", "2", "3"]);
        scheduler.select(2).await;
        assert_eq!(index(&scheduler), Some(2));

        scheduler.set_portfolios(vec!["a".into(), "b".into()]);
        assert_eq!(scheduler.current(), Some((0, "a".to_string())));
        assert!(scheduler.is_running());
    }
}

// ── Manual navigation ───────────────────────────────────────────────

mod manual {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn select_restarts_period() {
        let (_, _, scheduler) = setup(&["1", "2", "3"]);
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(8)).await;
        let entry = scheduler.select(2).await;
        assert!(entry.is_some());
        assert_eq!(index(&scheduler), Some(2));

        // Without the restart the timer would have fired at 10 s.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(index(&scheduler), Some(2));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(index(&scheduler), Some(0));
    }

    #[tokio::test]
    async fn select_out_of_range_is_ignored() {
        let (service, _, scheduler) = setup(&["1", "2"]);
        assert!(scheduler.select(5).await.is_none());
        assert_eq!(index(&scheduler), Some(0));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn select_loads_context() {
        let (_, cache, scheduler) = setup(&["2", "1"]);
        let entry = scheduler.select(1).await.unwrap();
        assert_eq!(entry.items[0].headline, "Apple beats estimates");
        assert_eq!(cache.active(), entry.items);
    }

    #[tokio::test]
    async fn next_and_previous_wrap() {
        let (_, _, scheduler) = setup(&["1", "2", "3"]);

        scheduler.next().await;
        assert_eq!(index(&scheduler), Some(1));
        scheduler.previous().await;
        assert_eq!(index(&scheduler), Some(0));
        scheduler.previous().await;
        assert_eq!(index(&scheduler), Some(2));
        scheduler.next().await;
        assert_eq!(index(&scheduler), Some(0));
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn next_needs_two_portfolios() {
        let (_, _, scheduler) = setup(&["1"]);
        assert!(scheduler.next().await.is_none());
        assert!(scheduler.previous().await.is_none());
    }

    #[tokio::test]
    async fn subscribers_see_index_changes() {
        let (_, _, scheduler) = setup(&["1", "2", "3"]);
        let mut rx = scheduler.subscribe();
        assert_eq!(*rx.borrow_and_update(), 0);

        scheduler.next().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);

        scheduler.select(2).await;
        assert_eq!(*rx.borrow_and_update(), 2);
    }
}
