//! Tool registry and dispatcher behaviour with small in-test capabilities.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use quest_core::{
    ArgKind, ArgSchema, QuestError, ToolCall, ToolCapability, ToolErrorKind, ToolOutput,
};
use quest_runtime::{ToolDescriptor, ToolDispatcher, ToolRegistry};

struct Counting {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ToolCapability for Counting {
    async fn invoke(&self, args: &Value) -> quest_core::Result<ToolOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ToolOutput::ok(format!("got {args}")).with_data(args.clone()))
    }
}

struct Sleeper(Duration);

#[async_trait]
impl ToolCapability for Sleeper {
    async fn invoke(&self, _args: &Value) -> quest_core::Result<ToolOutput> {
        tokio::time::sleep(self.0).await;
        Ok(ToolOutput::ok("woke up"))
    }
}

struct Broken;

#[async_trait]
impl ToolCapability for Broken {
    async fn invoke(&self, _args: &Value) -> quest_core::Result<ToolOutput> {
        Err(QuestError::Http("connection refused".into()))
    }
}

struct ExitsNonZero;

#[async_trait]
impl ToolCapability for ExitsNonZero {
    async fn invoke(&self, _args: &Value) -> quest_core::Result<ToolOutput> {
        Ok(ToolOutput::failed("{\"exit_code\":1}"))
    }
}

fn call(name: &str, args: Value) -> ToolCall {
    ToolCall {
        id: "call_1".into(),
        tool_name: name.into(),
        arguments: args,
    }
}

fn registry_with_counter() -> (ToolRegistry, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(ToolDescriptor::new(
        "echo",
        "echo the arguments",
        Duration::from_secs(5),
        ArgSchema::new()
            .required("text", ArgKind::String, "text to echo")
            .optional("times", ArgKind::Integer, "repeat count"),
        Arc::new(Counting {
            calls: Arc::clone(&calls),
        }),
    ));
    (registry, calls)
}

// ── Registry ───────────────────────────────────────────────────

#[test]
fn test_registry_specs_are_sorted_and_strict() {
    let (mut registry, _) = registry_with_counter();
    registry.register(ToolDescriptor::new(
        "analyse",
        "x",
        Duration::from_secs(1),
        ArgSchema::new(),
        Arc::new(Broken),
    ));
    let specs = registry.specs();
    let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["analyse", "echo"]);
    assert_eq!(specs[1].parameters["additionalProperties"], false);
    assert!(registry.has_tool("echo"));
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_reregistering_replaces() {
    let (mut registry, _) = registry_with_counter();
    registry.register(ToolDescriptor::new(
        "echo",
        "replacement",
        Duration::from_secs(9),
        ArgSchema::new(),
        Arc::new(Broken),
    ));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("echo").unwrap().timeout, Duration::from_secs(9));
}

// ── Dispatcher ─────────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_tool_never_invokes_anything() {
    let (registry, calls) = registry_with_counter();
    let dispatcher = ToolDispatcher::new(Arc::new(registry));

    let result = dispatcher.dispatch(&call("nonexistent", json!({}))).await;
    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ToolErrorKind::UnknownTool));
    assert_eq!(result.tool_call_id, "call_1");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_arguments_do_not_execute() {
    let (registry, calls) = registry_with_counter();
    let dispatcher = ToolDispatcher::new(Arc::new(registry));

    for args in [
        json!({}),
        json!({"text": 5}),
        json!({"text": "hi", "times": "2"}),
        json!({"text": "hi", "extra": true}),
        json!("hi"),
    ] {
        let result = dispatcher.dispatch(&call("echo", args.clone())).await;
        assert_eq!(
            result.error_kind(),
            Some(ToolErrorKind::InvalidArguments),
            "args {args} were accepted"
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_successful_dispatch() {
    let (registry, calls) = registry_with_counter();
    let dispatcher = ToolDispatcher::new(Arc::new(registry));

    let result = dispatcher
        .dispatch(&call("echo", json!({"text": "hi", "times": 2})))
        .await;
    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(result.data, Some(json!({"text": "hi", "times": 2})));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_at_tool_timeout_not_tool_duration() {
    let mut registry = ToolRegistry::new();
    registry.register(ToolDescriptor::new(
        "slow",
        "sleeps",
        Duration::from_secs(1),
        ArgSchema::new(),
        Arc::new(Sleeper(Duration::from_secs(10))),
    ));
    let dispatcher = ToolDispatcher::new(Arc::new(registry));

    let started = tokio::time::Instant::now();
    let result = dispatcher.dispatch(&call("slow", json!({}))).await;
    let took = started.elapsed();

    assert_eq!(result.error_kind(), Some(ToolErrorKind::ToolTimeout));
    assert!(took >= Duration::from_secs(1));
    assert!(took < Duration::from_secs(2), "took {took:?}");
    assert!(result.elapsed_ms >= 1000 && result.elapsed_ms < 2000);
}

#[tokio::test]
async fn test_capability_error_becomes_execution_error() {
    let mut registry = ToolRegistry::new();
    registry.register(ToolDescriptor::new(
        "broken",
        "always fails",
        Duration::from_secs(1),
        ArgSchema::new(),
        Arc::new(Broken),
    ));
    let dispatcher = ToolDispatcher::new(Arc::new(registry));

    let result = dispatcher.dispatch(&call("broken", json!({}))).await;
    assert_eq!(result.error_kind(), Some(ToolErrorKind::ToolExecutionError));
    assert!(result.content.contains("connection refused"));
}

#[tokio::test]
async fn test_completed_but_unsuccessful_output_has_no_error_kind() {
    let mut registry = ToolRegistry::new();
    registry.register(ToolDescriptor::new(
        "script",
        "exits 1",
        Duration::from_secs(1),
        ArgSchema::new(),
        Arc::new(ExitsNonZero),
    ));
    let dispatcher = ToolDispatcher::new(Arc::new(registry));

    let result = dispatcher.dispatch(&call("script", json!({}))).await;
    assert!(!result.success);
    assert!(result.error.is_none());
    assert!(result.content.contains("exit_code"));
}
