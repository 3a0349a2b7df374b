//! Prometheus-compatible metrics for the quest server.
//!
//! HTTP counters are bumped by handlers; session, turn and provider counters are fed by a
//! task subscribed to the engine's event bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use quest_core::{Event, EventBus, Role, SessionStatus};

#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    http_requests_total: AtomicU64,
    http_errors_total: AtomicU64,
    /// Task-start requests that launched a session.
    solve_accepted_total: AtomicU64,
    /// Task-start requests refused (bad body, bad secret, missing config).
    solve_rejected_total: AtomicU64,
    sessions_started_total: AtomicU64,
    sessions_completed_total: AtomicU64,
    sessions_failed_total: AtomicU64,
    sessions_timed_out_total: AtomicU64,
    sessions_step_limited_total: AtomicU64,
    turns_total: AtomicU64,
    tool_calls_total: AtomicU64,
    tool_errors_total: AtomicU64,
    provider_calls_total: AtomicU64,
    provider_failures_total: AtomicU64,
    /// Events the subscriber missed because it lagged behind the bus.
    events_dropped_total: AtomicU64,
    started_at: Instant,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                http_requests_total: AtomicU64::new(0),
                http_errors_total: AtomicU64::new(0),
                solve_accepted_total: AtomicU64::new(0),
                solve_rejected_total: AtomicU64::new(0),
                sessions_started_total: AtomicU64::new(0),
                sessions_completed_total: AtomicU64::new(0),
                sessions_failed_total: AtomicU64::new(0),
                sessions_timed_out_total: AtomicU64::new(0),
                sessions_step_limited_total: AtomicU64::new(0),
                turns_total: AtomicU64::new(0),
                tool_calls_total: AtomicU64::new(0),
                tool_errors_total: AtomicU64::new(0),
                provider_calls_total: AtomicU64::new(0),
                provider_failures_total: AtomicU64::new(0),
                events_dropped_total: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.started_at.elapsed().as_secs_f64()
    }

    pub fn inc_http_requests(&self) {
        bump(&self.inner.http_requests_total);
    }

    pub fn inc_http_errors(&self) {
        bump(&self.inner.http_errors_total);
    }

    pub fn inc_solve_accepted(&self) {
        bump(&self.inner.solve_accepted_total);
    }

    pub fn inc_solve_rejected(&self) {
        bump(&self.inner.solve_rejected_total);
    }

    /// Fold one engine event into the counters.
    pub fn observe(&self, event: &Event) {
        let m = &self.inner;
        match event {
            Event::SessionStarted { .. } => bump(&m.sessions_started_total),
            Event::SessionFinished { status, .. } => match status {
                SessionStatus::Completed => bump(&m.sessions_completed_total),
                SessionStatus::Failed => bump(&m.sessions_failed_total),
                SessionStatus::TimedOut => bump(&m.sessions_timed_out_total),
                SessionStatus::StepLimitExceeded => bump(&m.sessions_step_limited_total),
                SessionStatus::Running => {}
            },
            Event::TurnAppended { role, success, .. } => {
                bump(&m.turns_total);
                if *role == Role::ToolResult {
                    bump(&m.tool_calls_total);
                    if !success {
                        bump(&m.tool_errors_total);
                    }
                }
            }
            Event::ProviderCall { success, .. } => {
                bump(&m.provider_calls_total);
                if !success {
                    bump(&m.provider_failures_total);
                }
            }
        }
    }

    /// Spawn a task that feeds every event on `events` into these counters.
    pub fn watch(&self, events: &EventBus) -> tokio::task::JoinHandle<()> {
        let mut rx = events.subscribe();
        let metrics = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => metrics.observe(&event),
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "metrics subscriber lagged behind the event bus");
                        metrics
                            .inner
                            .events_dropped_total
                            .fetch_add(n, Ordering::Relaxed);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Render metrics in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let m = &self.inner;
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        format!(
            r#"# HELP quest_uptime_seconds Time since the server started.
# TYPE quest_uptime_seconds gauge
quest_uptime_seconds {}

# HELP quest_http_requests_total Total HTTP requests served.
# TYPE quest_http_requests_total counter
quest_http_requests_total {}

# HELP quest_http_errors_total Total HTTP errors (4xx/5xx).
# TYPE quest_http_errors_total counter
quest_http_errors_total {}

# HELP quest_solve_requests_total Task-start requests by outcome.
# TYPE quest_solve_requests_total counter
quest_solve_requests_total{{outcome="accepted"}} {}
quest_solve_requests_total{{outcome="rejected"}} {}

# HELP quest_sessions_started_total Sessions started.
# TYPE quest_sessions_started_total counter
quest_sessions_started_total {}

# HELP quest_sessions_finished_total Sessions finished by terminal status.
# TYPE quest_sessions_finished_total counter
quest_sessions_finished_total{{status="completed"}} {}
quest_sessions_finished_total{{status="failed"}} {}
quest_sessions_finished_total{{status="timed_out"}} {}
quest_sessions_finished_total{{status="step_limit_exceeded"}} {}

# HELP quest_turns_total Turns appended to conversation logs.
# TYPE quest_turns_total counter
quest_turns_total {}

# HELP quest_tool_calls_total Tool calls dispatched.
# TYPE quest_tool_calls_total counter
quest_tool_calls_total {}

# HELP quest_tool_errors_total Tool calls that did not succeed.
# TYPE quest_tool_errors_total counter
quest_tool_errors_total {}

# HELP quest_provider_calls_total Reasoning provider attempts.
# TYPE quest_provider_calls_total counter
quest_provider_calls_total {}

# HELP quest_provider_failures_total Reasoning provider attempts that failed.
# TYPE quest_provider_failures_total counter
quest_provider_failures_total {}

# HELP quest_events_dropped_total Events missed by the metrics subscriber.
# TYPE quest_events_dropped_total counter
quest_events_dropped_total {}
"#,
            m.started_at.elapsed().as_secs(),
            load(&m.http_requests_total),
            load(&m.http_errors_total),
            load(&m.solve_accepted_total),
            load(&m.solve_rejected_total),
            load(&m.sessions_started_total),
            load(&m.sessions_completed_total),
            load(&m.sessions_failed_total),
            load(&m.sessions_timed_out_total),
            load(&m.sessions_step_limited_total),
            load(&m.turns_total),
            load(&m.tool_calls_total),
            load(&m.tool_errors_total),
            load(&m.provider_calls_total),
            load(&m.provider_failures_total),
            load(&m.events_dropped_total),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
