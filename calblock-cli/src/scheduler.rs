//! The control loop: reconcile "what should be blocked" with "what is".
//!
//! Single-threaded cooperative loop. The scheduler exclusively owns the
//! Timeline and the BlockState; fetches and actuator calls happen
//! synchronously from the loop, so no locking is needed. Each tick
//! recomputes the desired set from scratch and applies an exact diff, which
//! makes every failure self-healing: an item that could not be (un)blocked
//! simply shows up in the next tick's plan again.

use std::time::Duration as StdDuration;

use calblock_core::{BlockPlan, BlockState, CalBlockResult, ItemKind, Timeline, diff};
use chrono::{DateTime, Duration, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::actuator::{ActuationReport, Actuator};
use crate::config::Config;
use crate::feed::{FeedSource, load_timeline};

/// Injectable time source so tests can drive the loop deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct Scheduler {
    feed: Box<dyn FeedSource>,
    actuator: Box<dyn Actuator>,
    clock: Box<dyn Clock>,

    tick_interval: StdDuration,
    sync_interval: Duration,
    lookahead_days: i64,
    unblock_timeout: StdDuration,

    timeline: Timeline,
    state: BlockState,
    last_sync: Option<DateTime<Utc>>,
}

impl Scheduler {
    pub fn new(
        config: &Config,
        feed: Box<dyn FeedSource>,
        actuator: Box<dyn Actuator>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let started_at = clock.now();
        Scheduler {
            feed,
            actuator,
            clock,
            tick_interval: StdDuration::from_secs(config.tick_secs),
            sync_interval: Duration::seconds(config.sync_secs as i64),
            lookahead_days: config.lookahead_days,
            unblock_timeout: StdDuration::from_secs(config.unblock_timeout_secs),
            timeline: Timeline::empty(started_at),
            state: BlockState::new(),
            last_sync: None,
        }
    }

    /// Run until a shutdown signal arrives, then unblock everything still
    /// in BlockState before returning. Leaving the user's system blocked
    /// after exit is a resource leak we refuse to commit.
    pub async fn run(mut self) -> CalBlockResult<()> {
        info!(
            tick_secs = self.tick_interval.as_secs(),
            sync_secs = self.sync_interval.num_seconds(),
            "scheduler started"
        );

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!(error = %e, "failed to listen for shutdown signal");
                    }
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// One evaluation pass: resync the timeline if due, compute the desired
    /// block set at "now", and drive the actuator over the diff.
    pub(crate) async fn tick(&mut self) {
        let now = self.clock.now();

        if self.sync_due(now) {
            match load_timeline(self.feed.as_ref(), now, self.lookahead_days).await {
                Ok(timeline) => {
                    info!(events = timeline.len(), "timeline refreshed");
                    self.timeline = timeline;
                    self.last_sync = Some(now);
                }
                Err(e) => {
                    // Last-good policy beats blocking nothing: keep
                    // evaluating against the stale timeline.
                    warn!(error = %e, "feed sync failed, keeping previous timeline");
                }
            }
        }

        let desired = self.timeline.active_directive(now);
        let plan = diff(&desired, &self.state);
        if plan.is_empty() {
            return;
        }

        let active: Vec<&str> = self
            .timeline
            .active_events(now)
            .iter()
            .map(|e| e.summary.as_str())
            .collect();
        info!(
            active = ?active,
            to_block = %plan.to_block,
            to_unblock = %plan.to_unblock,
            "reconciling"
        );
        self.apply(&plan);
    }

    fn sync_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_sync {
            None => true,
            Some(last) => now - last >= self.sync_interval,
        }
    }

    /// Apps and websites are actuated as distinct kinds; a failure in one
    /// never rolls back the other. BlockState is only advanced for items
    /// whose actuator call succeeded.
    fn apply(&mut self, plan: &BlockPlan) {
        if !plan.to_block.apps.is_empty() {
            let report = self.actuator.block_apps(&plan.to_block.apps);
            self.record(ItemKind::App, &report, Direction::Block);
        }
        if !plan.to_block.websites.is_empty() {
            let report = self.actuator.block_websites(&plan.to_block.websites);
            self.record(ItemKind::Website, &report, Direction::Block);
        }
        if !plan.to_unblock.apps.is_empty() {
            let report = self.actuator.unblock_apps(&plan.to_unblock.apps);
            self.record(ItemKind::App, &report, Direction::Unblock);
        }
        if !plan.to_unblock.websites.is_empty() {
            let report = self.actuator.unblock_websites(&plan.to_unblock.websites);
            self.record(ItemKind::Website, &report, Direction::Unblock);
        }
    }

    fn record(&mut self, kind: ItemKind, report: &ActuationReport, direction: Direction) {
        for item in &report.succeeded {
            match direction {
                Direction::Block => self.state.mark_blocked(kind, item),
                Direction::Unblock => self.state.mark_unblocked(kind, item),
            }
        }
        for (item, reason) in &report.failed {
            warn!(
                item = %item,
                kind = ?kind,
                reason = %reason,
                "actuator call failed, will retry next tick"
            );
        }
    }

    /// Drain BlockState through the actuator before exit. The actuator does
    /// blocking I/O, so the drain runs on the blocking pool under the
    /// configured deadline; a hung actuator call cannot stall shutdown past
    /// it. Returns how many items were left blocked.
    pub(crate) async fn shutdown(self) -> usize {
        let Scheduler {
            mut actuator,
            mut state,
            unblock_timeout,
            ..
        } = self;

        let leftover = state.snapshot();
        if leftover.is_empty() {
            info!("nothing blocked, exiting");
            return 0;
        }

        info!(items = state.len(), "unblocking everything before exit");
        let deadline = tokio::time::Instant::now() + unblock_timeout;

        let drain = tokio::task::spawn_blocking(move || {
            let mut reports = Vec::new();
            if !leftover.apps.is_empty() {
                reports.push((ItemKind::App, actuator.unblock_apps(&leftover.apps)));
            }
            if !leftover.websites.is_empty() {
                reports.push((ItemKind::Website, actuator.unblock_websites(&leftover.websites)));
            }
            reports
        });

        match tokio::time::timeout_at(deadline, drain).await {
            Ok(Ok(reports)) => {
                for (kind, report) in reports {
                    for item in &report.succeeded {
                        state.mark_unblocked(kind, item);
                    }
                    for (item, reason) in &report.failed {
                        warn!(item = %item, kind = ?kind, reason = %reason, "unblock failed");
                    }
                }
            }
            Ok(Err(e)) => error!(error = %e, "shutdown drain task failed"),
            Err(_) => error!("shutdown drain hit the deadline"),
        }

        if state.is_empty() {
            info!("all items unblocked, exiting");
        } else {
            error!(
                remaining = state.len(),
                "could not unblock everything before exit; run `calblock unblock` to clean up"
            );
        }
        state.len()
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Block,
    Unblock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use calblock_core::CalBlockError;
    use chrono::TimeZone;
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    fn test_config(sync_secs: u64) -> Config {
        Config {
            feed_url: "https://example.com/feed.ics".into(),
            tick_secs: 30,
            sync_secs,
            lookahead_days: 7,
            redirect_ip: "127.0.0.1".into(),
            hosts_path: PathBuf::from("/dev/null"),
            unblock_timeout_secs: 30,
        }
    }

    /// Feed fixture: one event 10:00-11:00 blocking Safari and
    /// www.facebook.com.
    fn fixture_ics() -> String {
        [
            "BEGIN:VCALENDAR",
            "VERSION:2.0",
            "PRODID:-//calblock tests//EN",
            "BEGIN:VEVENT",
            "UID:focus-1",
            "SUMMARY:Deep work",
            "DTSTART:20260310T100000Z",
            "DTEND:20260310T110000Z",
            "DESCRIPTION:##BLOCKING\\nBlock_apps: Safari;\\nBlock_websites: www.facebook.com;\\n##BLOCKING",
            "END:VEVENT",
            "END:VCALENDAR",
        ]
        .join("\r\n")
    }

    struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    /// Returns queued responses in order, repeating the last one forever.
    struct ScriptedFeed(Mutex<Vec<CalBlockResult<String>>>);

    impl ScriptedFeed {
        fn ok(content: &str) -> Self {
            ScriptedFeed(Mutex::new(vec![Ok(content.to_string())]))
        }

        fn script(responses: Vec<CalBlockResult<String>>) -> Self {
            ScriptedFeed(Mutex::new(responses))
        }
    }

    #[async_trait]
    impl FeedSource for ScriptedFeed {
        async fn fetch(&self) -> CalBlockResult<String> {
            let mut responses = self.0.lock().unwrap();
            let response = if responses.len() > 1 {
                responses.remove(0)
            } else {
                match &responses[0] {
                    Ok(s) => Ok(s.clone()),
                    Err(_) => Err(CalBlockError::FeedFetch("scripted failure".into())),
                }
            };
            response
        }
    }

    #[derive(Default)]
    struct FakeInner {
        blocked_apps: BTreeSet<String>,
        blocked_websites: BTreeSet<String>,
        calls: Vec<String>,
        fail_items: BTreeSet<String>,
        /// When set, unblock calls stall to simulate a hung actuator.
        hang: bool,
    }

    /// Records calls instead of touching the OS; items listed in
    /// `fail_items` report per-item failure.
    struct FakeActuator(Arc<Mutex<FakeInner>>);

    impl FakeInner {
        fn report_for(&mut self, items: &BTreeSet<String>) -> ActuationReport {
            let mut report = ActuationReport::default();
            for item in items {
                if self.fail_items.contains(item) {
                    report.failed.push((item.clone(), "injected failure".into()));
                } else {
                    report.succeeded.push(item.clone());
                }
            }
            report
        }
    }

    impl Actuator for FakeActuator {
        fn block_apps(&mut self, apps: &BTreeSet<String>) -> ActuationReport {
            let mut inner = self.0.lock().unwrap();
            inner.calls.push(format!("block_apps:{}", apps.len()));
            let report = inner.report_for(apps);
            inner.blocked_apps.extend(report.succeeded.iter().cloned());
            report
        }

        fn unblock_apps(&mut self, apps: &BTreeSet<String>) -> ActuationReport {
            let mut inner = self.0.lock().unwrap();
            if inner.hang {
                std::thread::sleep(StdDuration::from_millis(250));
            }
            inner.calls.push(format!("unblock_apps:{}", apps.len()));
            let report = inner.report_for(apps);
            for item in &report.succeeded {
                inner.blocked_apps.remove(item);
            }
            report
        }

        fn block_websites(&mut self, hosts: &BTreeSet<String>) -> ActuationReport {
            let mut inner = self.0.lock().unwrap();
            inner.calls.push(format!("block_websites:{}", hosts.len()));
            let report = inner.report_for(hosts);
            inner
                .blocked_websites
                .extend(report.succeeded.iter().cloned());
            report
        }

        fn unblock_websites(&mut self, hosts: &BTreeSet<String>) -> ActuationReport {
            let mut inner = self.0.lock().unwrap();
            if inner.hang {
                std::thread::sleep(StdDuration::from_millis(250));
            }
            inner.calls.push(format!("unblock_websites:{}", hosts.len()));
            let report = inner.report_for(hosts);
            for item in &report.succeeded {
                inner.blocked_websites.remove(item);
            }
            report
        }
    }

    struct Harness {
        scheduler: Scheduler,
        actuator: Arc<Mutex<FakeInner>>,
        clock: Arc<Mutex<DateTime<Utc>>>,
    }

    fn harness(feed: ScriptedFeed, sync_secs: u64, start: DateTime<Utc>) -> Harness {
        harness_with(feed, sync_secs, start, 30)
    }

    fn harness_with(
        feed: ScriptedFeed,
        sync_secs: u64,
        start: DateTime<Utc>,
        unblock_timeout_secs: u64,
    ) -> Harness {
        let mut config = test_config(sync_secs);
        config.unblock_timeout_secs = unblock_timeout_secs;

        let actuator = Arc::new(Mutex::new(FakeInner::default()));
        let clock = Arc::new(Mutex::new(start));
        let scheduler = Scheduler::new(
            &config,
            Box::new(feed),
            Box::new(FakeActuator(actuator.clone())),
            Box::new(ManualClock(clock.clone())),
        );
        Harness {
            scheduler,
            actuator,
            clock,
        }
    }

    #[tokio::test]
    async fn test_active_event_blocks_within_one_tick() {
        let mut h = harness(ScriptedFeed::ok(&fixture_ics()), 300, at(10, 30));
        h.scheduler.tick().await;

        let inner = h.actuator.lock().unwrap();
        assert!(inner.blocked_apps.contains("Safari"));
        assert!(inner.blocked_websites.contains("www.facebook.com"));
        assert_eq!(h.scheduler.state.len(), 2);
    }

    #[tokio::test]
    async fn test_ended_event_unblocks_within_one_tick() {
        let mut h = harness(ScriptedFeed::ok(&fixture_ics()), 300, at(10, 30));
        h.scheduler.tick().await;
        assert_eq!(h.scheduler.state.len(), 2);

        *h.clock.lock().unwrap() = at(11, 0);
        h.scheduler.tick().await;

        let inner = h.actuator.lock().unwrap();
        assert!(inner.blocked_apps.is_empty());
        assert!(inner.blocked_websites.is_empty());
        assert!(h.scheduler.state.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_event_blocks_nothing() {
        let mut h = harness(ScriptedFeed::ok(&fixture_ics()), 300, at(9, 0));
        h.scheduler.tick().await;

        assert!(h.scheduler.state.is_empty());
        assert!(h.actuator.lock().unwrap().calls.is_empty());
    }

    #[tokio::test]
    async fn test_converged_state_makes_no_actuator_calls() {
        let mut h = harness(ScriptedFeed::ok(&fixture_ics()), 300, at(10, 30));
        h.scheduler.tick().await;
        h.actuator.lock().unwrap().calls.clear();

        *h.clock.lock().unwrap() = at(10, 31);
        h.scheduler.tick().await;

        assert!(h.actuator.lock().unwrap().calls.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_stale_timeline() {
        // sync_secs = 0 forces a resync attempt on every tick.
        let feed = ScriptedFeed::script(vec![
            Ok(fixture_ics()),
            Err(CalBlockError::FeedFetch("network down".into())),
        ]);
        let mut h = harness(feed, 0, at(10, 30));

        h.scheduler.tick().await;
        assert_eq!(h.scheduler.state.len(), 2);

        // Sync now fails, but the stale timeline still says "block".
        *h.clock.lock().unwrap() = at(10, 40);
        h.scheduler.tick().await;
        assert_eq!(h.scheduler.state.len(), 2);

        // And the stale timeline still drives the unblock at event end.
        *h.clock.lock().unwrap() = at(11, 5);
        h.scheduler.tick().await;
        assert!(h.scheduler.state.is_empty());
    }

    #[tokio::test]
    async fn test_failed_item_retried_next_tick() {
        let mut h = harness(ScriptedFeed::ok(&fixture_ics()), 300, at(10, 30));
        h.actuator.lock().unwrap().fail_items.insert("Safari".into());

        h.scheduler.tick().await;
        assert!(!h.scheduler.state.contains(ItemKind::App, "Safari"));
        assert!(
            h.scheduler
                .state
                .contains(ItemKind::Website, "www.facebook.com")
        );

        // Failure clears; the next tick recomputes the diff and retries.
        h.actuator.lock().unwrap().fail_items.clear();
        *h.clock.lock().unwrap() = at(10, 31);
        h.scheduler.tick().await;
        assert!(h.scheduler.state.contains(ItemKind::App, "Safari"));
    }

    #[tokio::test]
    async fn test_startup_fetch_failure_blocks_nothing() {
        let feed = ScriptedFeed::script(vec![Err(CalBlockError::FeedFetch("boot fail".into()))]);
        let mut h = harness(feed, 300, at(10, 30));
        h.scheduler.tick().await;

        assert!(h.scheduler.state.is_empty());
        assert!(h.actuator.lock().unwrap().calls.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_unblocks_everything() {
        let mut h = harness(ScriptedFeed::ok(&fixture_ics()), 300, at(10, 30));
        h.scheduler.tick().await;
        assert_eq!(h.scheduler.state.len(), 2);

        let remaining = h.scheduler.shutdown().await;
        assert_eq!(remaining, 0);

        let inner = h.actuator.lock().unwrap();
        assert!(inner.blocked_apps.is_empty());
        assert!(inner.blocked_websites.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_deadline_bounds_hung_actuator() {
        let mut h = harness_with(ScriptedFeed::ok(&fixture_ics()), 300, at(10, 30), 0);
        h.scheduler.tick().await;
        assert_eq!(h.scheduler.state.len(), 2);

        h.actuator.lock().unwrap().hang = true;

        let started = std::time::Instant::now();
        let remaining = h.scheduler.shutdown().await;

        // A zero deadline with a stalling actuator must return promptly,
        // reporting everything as still blocked.
        assert_eq!(remaining, 2);
        assert!(started.elapsed() < StdDuration::from_millis(200));
    }

    #[tokio::test]
    async fn test_empty_directive_never_reaches_actuator() {
        // Event with no ##BLOCKING region: active, but blocks nothing.
        let ics = [
            "BEGIN:VCALENDAR",
            "VERSION:2.0",
            "PRODID:-//calblock tests//EN",
            "BEGIN:VEVENT",
            "UID:plain-1",
            "SUMMARY:Just a meeting",
            "DTSTART:20260310T100000Z",
            "DTEND:20260310T110000Z",
            "END:VEVENT",
            "END:VCALENDAR",
        ]
        .join("\r\n");

        let mut h = harness(ScriptedFeed::ok(&ics), 300, at(10, 30));
        h.scheduler.tick().await;

        assert!(h.scheduler.state.is_empty());
        assert!(h.actuator.lock().unwrap().calls.is_empty());
    }
}
