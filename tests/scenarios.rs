use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use alarmvisor::{AlarmError, AlarmManager, Config, Event, EventKind, Subscribe};

fn manager() -> Arc<AlarmManager> {
    AlarmManager::builder(Config::default()).build()
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test(start_paused = true)]
async fn expired_alarm_is_freed_once_by_the_dispatcher() {
    let m = manager();
    let mut rx = m.subscribe();
    m.start();

    m.submit(1, "wk", secs(5), "hi").await.unwrap();
    tokio::time::sleep(secs(6)).await;

    assert!(m.snapshot().await.is_empty());
    assert!(m.alarms().await.is_empty());

    // At t=5 the worker's render and the dispatcher tick coincide; the
    // worker may show the expiry first, but only the dispatcher frees it.
    let expiries: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| {
            matches!(
                e.kind,
                EventKind::AlarmExpired | EventKind::AlarmDisplayExpired
            )
        })
        .collect();
    assert!(expiries.iter().all(|e| e.alarm == Some(1)));
    let kinds: Vec<_> = expiries.iter().map(|e| e.kind).collect();
    assert!(
        kinds == vec![EventKind::AlarmExpired]
            || kinds == vec![EventKind::AlarmDisplayExpired, EventKind::AlarmExpired],
        "unexpected expiry events: {kinds:?}"
    );
    let freed = expiries
        .iter()
        .find(|e| e.kind == EventKind::AlarmExpired)
        .unwrap();
    assert_eq!(freed.message.as_deref(), Some("hi"));
    m.shutdown();
}

#[tokio::test(start_paused = true)]
async fn worker_shows_expiry_before_dispatcher_frees_it() {
    // Dispatcher ticks at 0,2,4,6; the worker renders at 0,5.
    let cfg = Config {
        dispatch_interval: secs(2),
        ..Config::default()
    };
    let m = AlarmManager::builder(cfg).build();
    let mut rx = m.subscribe();
    m.start();

    m.submit(1, "wk", secs(5), "hi").await.unwrap();
    tokio::time::sleep(secs(7)).await;

    let kinds: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| e.alarm == Some(1) || e.kind == EventKind::WorkerRetired)
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::AlarmInserted,
            EventKind::AlarmAssigned,
            EventKind::AlarmDisplayed,
            EventKind::AlarmDisplayExpired,
            EventKind::WorkerRetired,
            EventKind::AlarmExpired,
        ]
    );
    assert!(m.alarms().await.is_empty());
    m.shutdown();
}

#[tokio::test(start_paused = true)]
async fn same_type_alarms_fill_workers_two_at_a_time() {
    let m = manager();
    m.submit(1, "wk", secs(30), "a").await.unwrap();
    m.submit(2, "wk", secs(30), "b").await.unwrap();
    m.submit(3, "wk", secs(30), "c").await.unwrap();
    m.dispatch_once().await;

    let snap = m.snapshot().await;
    let held: Vec<_> = snap.workers_of("wk").map(|w| w.alarm_ids()).collect();
    assert_eq!(held, vec![vec![1, 2], vec![3]]);
}

#[tokio::test(start_paused = true)]
async fn cancel_before_first_tick_creates_no_worker() {
    let m = manager();
    let mut rx = m.subscribe();
    m.submit(1, "wk", secs(30), "a").await.unwrap();
    m.cancel(1).await.unwrap();
    m.dispatch_once().await;

    assert_eq!(m.snapshot().await.workers_of("wk").count(), 0);
    let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::AlarmInserted, EventKind::AlarmCancelled]);
}

#[tokio::test(start_paused = true)]
async fn modify_of_unknown_id_changes_nothing() {
    let m = manager();
    m.submit(1, "wk", secs(30), "a").await.unwrap();
    let before = m.alarms().await;

    let err = m.modify(99, secs(10), "x").await.unwrap_err();
    assert_eq!(err, AlarmError::NotFound { id: 99 });
    assert_eq!(err.to_string(), "ID not found: 99");
    assert_eq!(m.alarms().await, before);
}

#[tokio::test(start_paused = true)]
async fn registry_stays_sorted_by_id() {
    let m = manager();
    for id in [5, 3, 9, 1, 7, -2] {
        m.submit(id, "wk", secs(30), "x").await.unwrap();
    }
    let ids: Vec<_> = m.alarms().await.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![-2, 1, 3, 5, 7, 9]);

    m.cancel(5).await.unwrap();
    m.submit(4, "wk", secs(30), "x").await.unwrap();
    let ids: Vec<_> = m.alarms().await.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![-2, 1, 3, 4, 7, 9]);
}

#[tokio::test(start_paused = true)]
async fn no_worker_exceeds_capacity_and_each_alarm_has_one_slot() {
    let m = manager();
    for id in 1..=7 {
        m.submit(id, "wk", secs(30), "x").await.unwrap();
    }
    m.submit(8, "zz", secs(30), "y").await.unwrap();
    m.dispatch_once().await;

    let snap = m.snapshot().await;
    assert_eq!(snap.workers_of("wk").count(), 4);
    assert_eq!(snap.workers_of("zz").count(), 1);
    assert!(snap.workers.iter().all(|w| w.alarms.len() <= w.capacity));
    assert!(snap.workers.iter().all(|w| w.capacity == 2));

    for id in 1..=8 {
        let holders = snap
            .workers
            .iter()
            .filter(|w| w.alarm_ids().contains(&id))
            .count();
        assert_eq!(holders, 1, "alarm {id} held by {holders} workers");
    }
}

#[tokio::test(start_paused = true)]
async fn idle_worker_retires_and_is_never_reused() {
    let m = manager();
    m.start();

    m.submit(1, "wk", secs(2), "first").await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let first = m.snapshot().await.workers[0].id;

    tokio::time::sleep(secs(2)).await;
    assert!(m.snapshot().await.is_empty());

    m.submit(2, "wk", secs(30), "second").await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let snap = m.snapshot().await;
    assert_eq!(snap.workers.len(), 1);
    assert_ne!(snap.workers[0].id, first);
    assert_eq!(snap.workers[0].alarm_ids(), vec![2]);
    m.shutdown();
}

#[tokio::test(start_paused = true)]
async fn cancel_hides_the_alarm_from_every_later_snapshot() {
    let m = manager();
    m.start();
    m.submit(1, "wk", secs(30), "a").await.unwrap();
    m.submit(2, "wk", secs(30), "b").await.unwrap();
    tokio::time::sleep(secs(2)).await;
    assert!(m.snapshot().await.contains(1));

    m.cancel(1).await.unwrap();
    for _ in 0..5 {
        assert!(!m.snapshot().await.contains(1));
        tokio::time::sleep(secs(3)).await;
    }
    assert!(m.snapshot().await.contains(2));
    m.shutdown();
}

#[tokio::test(start_paused = true)]
async fn expiry_and_cancel_never_both_free_a_record() {
    let m = manager();
    let mut rx = m.subscribe();
    m.submit(1, "wk", secs(5), "a").await.unwrap();
    m.dispatch_once().await;
    tokio::time::advance(secs(5)).await;

    let (cancelled, report) = tokio::join!(m.cancel(1), m.dispatch_once());
    let freed_by_cancel = usize::from(cancelled.is_ok());
    assert_eq!(freed_by_cancel + report.expired, 1);

    let frees = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::AlarmExpired | EventKind::AlarmCancelled))
        .count();
    assert_eq!(frees, 1);
    assert!(m.alarms().await.is_empty());
    assert!(m.snapshot().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn ceiling_defers_until_a_worker_retires() {
    let cfg = Config {
        max_workers: 1,
        ..Config::default()
    };
    let m = AlarmManager::builder(cfg).build();
    m.submit(1, "aa", secs(3), "a").await.unwrap();
    m.submit(2, "bb", secs(30), "b").await.unwrap();

    let report = m.dispatch_once().await;
    assert_eq!((report.assigned, report.deferred), (1, 1));
    assert!(!m.snapshot().await.contains(2));
    assert_eq!(m.alarms().await.len(), 2);

    tokio::time::advance(secs(3)).await;
    let report = m.dispatch_once().await;
    assert_eq!((report.expired, report.assigned), (1, 1));
    assert!(m.snapshot().await.contains(2));
}

struct Collector(Mutex<Vec<EventKind>>);

#[async_trait]
impl Subscribe for Collector {
    async fn on_event(&self, event: &Event) {
        self.0.lock().unwrap().push(event.kind);
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_events_in_publish_order() {
    let collector = Arc::new(Collector(Mutex::new(Vec::new())));
    let m = AlarmManager::builder(Config::default())
        .with_subscribers(vec![collector.clone() as Arc<dyn Subscribe>])
        .build();

    m.submit(1, "wk", secs(30), "a").await.unwrap();
    m.modify(1, secs(60), "b").await.unwrap();
    let _ = m.cancel(7).await;
    m.cancel(1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let seen = collector.0.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            EventKind::AlarmInserted,
            EventKind::AlarmChanged,
            EventKind::AlarmNotFound,
            EventKind::AlarmCancelled,
        ]
    );
    m.shutdown();
}
