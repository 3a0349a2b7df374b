#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    use quest_core::{ConversationLog, Event, EventBus, QuestError, Role};
    use quest_llm::mock::{MockProvider, MockResponse};
    use quest_llm::{
        ActionRequest, ClientConfig, LlmProvider, LlmRequest, LlmResponse, MAX_RETRY_DELAY,
        RateLimiter, ReasoningClient, StepContext,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn config() -> ClientConfig {
        ClientConfig {
            model: "mock-model".into(),
            max_tokens: 256,
            temperature: 0.1,
            call_timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }

    fn seeded_log() -> ConversationLog {
        let mut log = ConversationLog::new(Uuid::new_v4());
        log.append_text(Role::System, "solve it");
        log.append_text(Role::User, "https://quiz.example/start");
        log
    }

    fn client(provider: Arc<MockProvider>, limiter: RateLimiter) -> ReasoningClient {
        ReasoningClient::new(provider, limiter, config())
    }

    fn roomy_limiter() -> RateLimiter {
        RateLimiter::new(100, Duration::from_secs(60))
    }

    /// Answers every call with a 429 carrying a fixed Retry-After.
    struct Throttled {
        retry_after_secs: u64,
        calls: AtomicUsize,
    }

    impl Throttled {
        fn new(retry_after_secs: u64) -> Self {
            Self {
                retry_after_secs,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for Throttled {
        fn name(&self) -> &str {
            "throttled"
        }

        async fn complete(&self, _request: &LlmRequest) -> quest_core::Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(QuestError::RateLimited {
                retry_after_secs: self.retry_after_secs,
            })
        }

        async fn health_check(&self) -> quest_core::Result<()> {
            Ok(())
        }
    }

    // ── Action parsing through the client ──────────────────────

    #[tokio::test]
    async fn test_text_response_is_finish() {
        let provider = Arc::new(MockProvider::new("mock").with_response("answer submitted"));
        let log = seeded_log();
        let action = client(provider.clone(), roomy_limiter())
            .next_action(&log, &StepContext::new(log.session_id()))
            .await
            .unwrap();
        assert!(action.is_terminal());
    }

    #[tokio::test]
    async fn test_request_carries_full_log_and_note() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_tool_call("render_page", serde_json::json!({"url": "https://quiz"})),
        );
        let log = seeded_log();
        let mut ctx = StepContext::new(log.session_id());
        ctx.note = Some("step 1, 179s remaining".into());

        let action = client(provider.clone(), roomy_limiter())
            .next_action(&log, &ctx)
            .await
            .unwrap();
        assert!(matches!(action, ActionRequest::Invoke { .. }));

        let recorded = provider.recorded_requests();
        assert_eq!(recorded[0].turns, log.turns().to_vec());
        assert_eq!(recorded[0].context_note.as_deref(), Some("step 1, 179s remaining"));
        assert_eq!(recorded[0].model, "mock-model");
    }

    #[tokio::test]
    async fn test_malformed_action_is_not_retried() {
        let provider = Arc::new(
            MockProvider::new("mock").with_mock_response(MockResponse::raw_tool_call("run_code", "{oops")),
        );
        let log = seeded_log();
        let err = client(provider.clone(), roomy_limiter())
            .next_action(&log, &StepContext::new(log.session_id()))
            .await
            .unwrap_err();
        assert!(matches!(err, QuestError::MalformedAction(_)));
        assert_eq!(provider.call_count(), 1);
    }

    // ── Retry / backoff ────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_error("HTTP 503: unavailable")
                .with_error("HTTP 429: slow down")
                .with_response("ok"),
        );
        let log = seeded_log();
        let action = client(provider.clone(), roomy_limiter())
            .next_action(&log, &StepContext::new(log.session_id()))
            .await
            .unwrap();
        assert!(action.is_terminal());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_is_provider_unavailable() {
        let provider = Arc::new(
            MockProvider::new("mock").always(MockResponse::error("HTTP 500: internal")),
        );
        let log = seeded_log();
        let err = client(provider.clone(), roomy_limiter())
            .next_action(&log, &StepContext::new(log.session_id()))
            .await
            .unwrap_err();
        assert!(matches!(err, QuestError::ProviderUnavailable(_)));
        // One initial attempt plus max_retries.
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_non_transient_error_fails_fast() {
        let provider = Arc::new(MockProvider::new("mock").with_error("HTTP 401: bad key"));
        let log = seeded_log();
        let err = client(provider.clone(), roomy_limiter())
            .next_action(&log, &StepContext::new(log.session_id()))
            .await
            .unwrap_err();
        assert!(matches!(err, QuestError::ProviderUnavailable(msg) if msg.contains("401")));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_never_crosses_deadline() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_error("HTTP 503: unavailable")
                .with_response("ok"),
        );
        let log = seeded_log();
        let mut ctx = StepContext::new(log.session_id());
        ctx.deadline = Some(Instant::now() + Duration::from_millis(50));

        let err = client(provider.clone(), roomy_limiter())
            .next_action(&log, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, QuestError::ProviderUnavailable(_)));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_call_is_bounded_and_retried() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_latency(Duration::from_secs(120))
                .always(MockResponse::text("late")),
        );
        let log = seeded_log();
        let mut cfg = config();
        cfg.max_retries = 1;
        let client = ReasoningClient::new(provider.clone(), roomy_limiter(), cfg);

        let started = Instant::now();
        let err = client
            .next_action(&log, &StepContext::new(log.session_id()))
            .await
            .unwrap_err();
        assert!(matches!(err, QuestError::ProviderUnavailable(msg) if msg.contains("timed out")));
        assert_eq!(provider.call_count(), 2);
        // Two bounded calls plus one backoff, nowhere near two full latencies.
        assert!(started.elapsed() < Duration::from_secs(70));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_wait_times_out_as_provider_timeout() {
        let limiter = RateLimiter::new(1, Duration::from_secs(600));
        limiter.try_acquire().unwrap();
        let provider = Arc::new(MockProvider::new("mock").with_response("ok"));
        let log = seeded_log();

        let err = client(provider.clone(), limiter)
            .next_action(&log, &StepContext::new(log.session_id()))
            .await
            .unwrap_err();
        assert!(matches!(err, QuestError::ProviderTimeout { .. }));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_retry_after_resolves_before_deadline() {
        let provider = Arc::new(Throttled::new(u64::MAX));
        let client = ReasoningClient::new(provider.clone(), roomy_limiter(), config());
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            let log = seeded_log();
            let mut ctx = StepContext::new(log.session_id());
            ctx.deadline = Some(Instant::now() + Duration::from_secs(180));
            client.next_action(&log, &ctx).await
        });
        let err = handle.await.expect("task must not panic").unwrap_err();
        assert!(matches!(err, QuestError::ProviderUnavailable(msg) if msg.contains("deadline")));
        assert!(started.elapsed() < Duration::from_secs(180));
        assert!(provider.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_capped_without_deadline() {
        let provider = Arc::new(Throttled::new(u64::MAX));
        let mut cfg = config();
        cfg.max_retries = 1;
        let client = ReasoningClient::new(provider.clone(), roomy_limiter(), cfg);
        let log = seeded_log();

        let started = Instant::now();
        let err = client
            .next_action(&log, &StepContext::new(log.session_id()))
            .await
            .unwrap_err();
        assert!(matches!(err, QuestError::ProviderUnavailable(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= MAX_RETRY_DELAY);
        assert!(elapsed < MAX_RETRY_DELAY + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_wait_and_call_share_one_timeout() {
        // A contended limiter: the only permit frees up 29s from now.
        let limiter = RateLimiter::new(1, Duration::from_secs(29));
        limiter.try_acquire().unwrap();
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_latency(Duration::from_secs(100))
                .always(MockResponse::text("late")),
        );
        let mut cfg = config();
        cfg.max_retries = 0;
        let call_timeout = cfg.call_timeout;
        let client = ReasoningClient::new(provider.clone(), limiter, cfg);

        let log = seeded_log();
        let mut ctx = StepContext::new(log.session_id());
        let deadline = Instant::now() + Duration::from_secs(1);
        ctx.deadline = Some(deadline);

        let err = client.next_action(&log, &ctx).await.unwrap_err();
        assert!(matches!(err, QuestError::ProviderUnavailable(msg) if msg.contains("timed out")));
        assert_eq!(provider.call_count(), 1);
        assert!(Instant::now() <= deadline + call_timeout);
    }

    #[tokio::test]
    async fn test_provider_calls_are_published() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let provider = Arc::new(MockProvider::new("mock").with_response("ok"));
        let log = seeded_log();
        client(provider, roomy_limiter())
            .with_events(bus)
            .next_action(&log, &StepContext::new(log.session_id()))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            Event::ProviderCall {
                session_id,
                attempt,
                success,
                ..
            } => {
                assert_eq!(session_id, log.session_id());
                assert_eq!(attempt, 1);
                assert!(success);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // ── Shared limiter across sessions ─────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_third_concurrent_call_waits_for_window() {
        let window = Duration::from_secs(10);
        let limiter = RateLimiter::new(2, window);
        let provider = Arc::new(MockProvider::new("mock").always(MockResponse::text("done")));
        let client = Arc::new(client(provider.clone(), limiter));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    let log = seeded_log();
                    client
                        .next_action(&log, &StepContext::new(log.session_id()))
                        .await
                        .unwrap();
                    start.elapsed()
                })
            })
            .collect();

        let mut finished: Vec<Duration> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        finished.sort();

        assert_eq!(finished[0], Duration::ZERO);
        assert_eq!(finished[1], Duration::ZERO);
        assert!(finished[2] >= window);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permits_never_exceed_max_per_window() {
        let window = Duration::from_secs(5);
        let limiter = RateLimiter::new(3, window);
        let grants = Arc::new(std::sync::Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = limiter.clone();
                let grants = Arc::clone(&grants);
                tokio::spawn(async move {
                    let permit = limiter.acquire().await;
                    grants.lock().unwrap().push(permit.granted_at);
                })
            })
            .collect();
        futures::future::join_all(handles).await;

        let mut times: Vec<Instant> = grants.lock().unwrap().clone();
        times.sort();
        assert_eq!(times.len(), 10);
        for (i, t) in times.iter().enumerate() {
            let in_window = times[i..]
                .iter()
                .take_while(|u| u.duration_since(*t) < window)
                .count();
            assert!(in_window <= 3, "{in_window} grants inside one window");
        }
    }
}
