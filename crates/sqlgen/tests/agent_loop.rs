//! Integration tests for the generation loop.
//!
//! A scripted [`ChatModel`] stands in for the provider: each test queues
//! the completions the "model" returns and inspects the requests it saw.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use sqlgen::agent::{
    Agent, AgentEvent, FinishReason, FnEventHandler, GenerateOptions, GenerateResult,
};
use sqlgen::backend::StaticBackend;
use sqlgen::error::{GenerateError, ProviderError, ToolError};
use sqlgen::generator::SqlGenerator;
use sqlgen::tools::{FnTool, ParamType, ToolRegistry, ToolSpec, names};
use sqlgen::value::json;
use sqlgen::{ChatCompletion, ChatFuture, ChatModel, ChatRequest, MessageRole, ToolCall};

// ── Scripted model ───────────────────────────────────────────────────

enum Reply {
    Complete(ChatCompletion),
    Fail(ProviderError),
    Delayed(Duration, ChatCompletion),
}

/// Replays queued replies in order and records every request.
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedModel {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ChatModel for ScriptedModel {
    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        Box::pin(async move {
            match reply {
                Some(Reply::Complete(c)) => Ok(c),
                Some(Reply::Fail(e)) => Err(e),
                Some(Reply::Delayed(delay, c)) => {
                    tokio::time::sleep(delay).await;
                    Ok(c)
                }
                None => Err(ProviderError::Api("script exhausted".into())),
            }
        })
    }
}

/// Requests `list_databases` on every call, with text only on the first.
struct AlwaysCallsTools {
    calls: AtomicUsize,
}

impl ChatModel for AlwaysCallsTools {
    fn chat<'a>(&'a self, _request: &'a ChatRequest) -> ChatFuture<'a> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut completion =
            ChatCompletion::tool_calls(vec![ToolCall::new(format!("call_{n}"), names::LIST_DATABASES, "{}")]);
        if n == 0 {
            completion.content = Some("SELECT datname FROM pg_database;".into());
        }
        Box::pin(async move { Ok(completion) })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn text(content: &str) -> Reply {
    Reply::Complete(ChatCompletion::text(content))
}

fn tools(calls: Vec<ToolCall>) -> Reply {
    Reply::Complete(ChatCompletion::tool_calls(calls))
}

fn schema_call(id: &str, table: &str) -> ToolCall {
    ToolCall::new(
        id,
        names::GET_SCHEMA_FOR_TABLE,
        json!({"database_name": "app", "table_name": table}).to_string(),
    )
}

fn introspection(backend: Arc<StaticBackend>) -> ToolRegistry {
    ToolRegistry::builder()
        .with_introspection_tools(backend)
        .build()
        .unwrap()
}

async fn run(model: &dyn ChatModel, registry: &ToolRegistry, options: GenerateOptions) -> GenerateResult {
    Agent::new(model, registry, options).run().await
}

#[derive(Deserialize)]
struct SleepArgs {
    ms: u64,
}

fn sleep_registry() -> ToolRegistry {
    let sleep = FnTool::new(
        ToolSpec::builder("sleep")
            .purpose("Sleep, then report")
            .param("ms", ParamType::Integer, "Milliseconds")
            .build(),
        |args: SleepArgs| async move {
            tokio::time::sleep(Duration::from_millis(args.ms)).await;
            Ok::<_, ToolError>(json!({ "result": format!("slept {}", args.ms) }))
        },
    );
    ToolRegistry::builder().with(sleep).build().unwrap()
}

// ── Termination ──────────────────────────────────────────────────────

#[tokio::test]
async fn budget_ends_the_run_after_exactly_n_model_calls() {
    let model = AlwaysCallsTools {
        calls: AtomicUsize::new(0),
    };
    let registry = introspection(Arc::new(StaticBackend::new().with_databases(r#"["app"]"#)));
    let result = run(&model, &registry, GenerateOptions::new("list dbs").with_max_steps(3)).await;

    assert!(result.is_success());
    assert_eq!(result.finish, Some(FinishReason::StepBudgetExhausted));
    assert_eq!(result.model_calls, 3);
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.steps.len(), 3);
    assert!(result.steps.iter().all(|s| s.tool_results.len() == 1));
    // system + user + 3 × (assistant + tool)
    assert_eq!(result.messages.len(), 8);
    assert_eq!(result.into_answer().unwrap(), "SELECT datname FROM pg_database;");
}

#[tokio::test]
async fn zero_budget_still_makes_one_call() {
    let model = ScriptedModel::new(vec![text("SELECT 1;")]);
    let registry = ToolRegistry::empty();
    let result = run(&model, &registry, GenerateOptions::new("x").with_max_steps(0)).await;
    assert_eq!(result.model_calls, 1);
    assert_eq!(result.into_answer().unwrap(), "SELECT 1;");
}

#[tokio::test]
async fn tool_failure_does_not_end_the_run() {
    let model = ScriptedModel::new(vec![
        tools(vec![ToolCall::new("c1", names::LIST_TABLES, "{}")]),
        text("SELECT * FROM users;"),
    ]);
    let registry = introspection(Arc::new(StaticBackend::new().unavailable("connection refused")));
    let result = run(&model, &registry, GenerateOptions::new("show all users")).await;

    assert!(result.is_success());
    assert_eq!(result.finish, Some(FinishReason::Completed));
    let failed = &result.steps[0].tool_results[0];
    assert!(!failed.success);
    assert!(failed.result_text().unwrap().contains("connection refused"));
    assert_eq!(result.into_answer().unwrap(), "SELECT * FROM users;");
}

#[tokio::test]
async fn malformed_arguments_are_reported_to_the_model() {
    let model = ScriptedModel::new(vec![
        tools(vec![ToolCall::new("c1", names::GET_SCHEMA_FOR_TABLE, "{\"table_name\": ")]),
        text("SELECT 1;"),
    ]);
    let backend = Arc::new(StaticBackend::new());
    let registry = introspection(Arc::clone(&backend));
    let result = run(&model, &registry, GenerateOptions::new("x")).await;

    assert!(result.is_success());
    assert!(backend.schema_lookups().is_empty());
    let second = &model.requests()[1];
    let tool_msg = second.messages.last().unwrap();
    assert_eq!(tool_msg.role, MessageRole::Tool);
    assert!(tool_msg.content.as_deref().unwrap().contains("not valid JSON"));
}

// ── Failure and cancellation ─────────────────────────────────────────

#[tokio::test]
async fn provider_failure_keeps_partial_steps() {
    let model = ScriptedModel::new(vec![
        tools(vec![ToolCall::new("c1", names::LIST_DATABASES, "")]),
        Reply::Fail(ProviderError::Http {
            status: 500,
            body: "upstream error".into(),
        }),
    ]);
    let registry = introspection(Arc::new(StaticBackend::new()));
    let result = run(&model, &registry, GenerateOptions::new("x")).await;

    assert!(!result.is_success());
    assert_eq!(result.finish, None);
    assert_eq!(result.model_calls, 1);
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].tool_results.len(), 1);
    assert_eq!(
        result.error_message().as_deref(),
        Some("provider API HTTP 500: upstream error")
    );
    assert!(matches!(
        result.into_answer(),
        Err(GenerateError::Provider(ProviderError::Http { status: 500, .. }))
    ));
}

#[tokio::test]
async fn provider_failures_are_not_retried_by_the_loop() {
    let model = ScriptedModel::new(vec![
        Reply::Fail(ProviderError::Http {
            status: 503,
            body: String::new(),
        }),
        text("SELECT 1;"),
    ]);
    let registry = ToolRegistry::empty();
    let result = run(&model, &registry, GenerateOptions::new("x")).await;
    assert!(!result.is_success());
    assert_eq!(model.call_counter().load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_before_tool_round_skips_the_tools() {
    let model = ScriptedModel::new(vec![
        tools(vec![schema_call("c1", "users")]),
        text("never requested"),
    ]);
    let calls = model.call_counter();
    let backend = Arc::new(StaticBackend::new());
    let registry = introspection(Arc::clone(&backend));
    let options = GenerateOptions::new("x").with_stop_signal(move || calls.load(Ordering::SeqCst) >= 1);

    let result = run(&model, &registry, options).await;

    assert!(result.error.as_ref().is_some_and(GenerateError::is_cancelled));
    assert_eq!(result.model_calls, 1);
    assert_eq!(result.steps.len(), 1);
    assert!(result.steps[0].tool_results.is_empty());
    assert!(backend.schema_lookups().is_empty());
}

#[tokio::test]
async fn stop_before_next_model_call() {
    let model = ScriptedModel::new(vec![
        tools(vec![ToolCall::new("c1", names::LIST_DATABASES, "{}")]),
        text("never requested"),
    ]);
    let registry = introspection(Arc::new(StaticBackend::new()));

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let handler = FnEventHandler::new(move |event| {
        if matches!(event, AgentEvent::ToolResult { .. }) {
            flag.store(true, Ordering::SeqCst);
        }
    });
    let options = GenerateOptions::new("x").with_stop_signal(move || stop.load(Ordering::SeqCst));

    let result = Agent::new(&model, &registry, options)
        .with_event_handler(&handler)
        .run()
        .await;

    assert!(result.error.as_ref().is_some_and(GenerateError::is_cancelled));
    assert_eq!(result.model_calls, 1);
    assert_eq!(model.requests().len(), 1);
    assert_eq!(result.steps[0].tool_results.len(), 1);
    // The completed round is in the transcript.
    assert_eq!(result.messages.last().unwrap().role, MessageRole::Tool);
}

#[tokio::test]
async fn timeout_cancels_a_slow_model_call() {
    let model = ScriptedModel::new(vec![Reply::Delayed(
        Duration::from_secs(5),
        ChatCompletion::text("too late"),
    )]);
    let registry = ToolRegistry::empty();
    let options = GenerateOptions::new("x").with_timeout(Duration::from_millis(50));

    let result = run(&model, &registry, options).await;

    let error = result.error.clone().unwrap();
    assert!(error.is_cancelled());
    assert!(error.to_string().contains("timed out"));
    assert_eq!(result.model_calls, 0);
    assert!(result.steps.is_empty());
}

// ── Tool rounds ──────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_tool_results_keep_request_order() {
    let model = ScriptedModel::new(vec![
        tools(vec![
            ToolCall::new("slow", "sleep", r#"{"ms": 80}"#),
            ToolCall::new("fast", "sleep", r#"{"ms": 1}"#),
        ]),
        text("SELECT 1;"),
    ]);
    let registry = sleep_registry();
    let result = run(&model, &registry, GenerateOptions::new("x")).await;

    let ids: Vec<_> = result.steps[0]
        .tool_results
        .iter()
        .map(|r| r.call_id.as_str())
        .collect();
    assert_eq!(ids, ["slow", "fast"]);
    let tool_ids: Vec<_> = result
        .messages
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(tool_ids, ["slow", "fast"]);
}

#[tokio::test]
async fn qualified_table_name_reaches_backend_unqualified() {
    let ddl = "CREATE TABLE public.users ( id bigint NOT NULL, name text);";
    let model = ScriptedModel::new(vec![
        tools(vec![schema_call("c1", "public.users")]),
        text("INSERT INTO users (id, name) VALUES (1, 'a'), (2, 'b'), (3, 'c');"),
    ]);
    let backend = Arc::new(StaticBackend::new().with_schema("users", ddl));
    let registry = introspection(Arc::clone(&backend));
    let result = run(&model, &registry, GenerateOptions::new("insert 3 rows into users")).await;

    assert_eq!(backend.schema_lookups(), ["users"]);
    assert_eq!(result.steps[0].tool_results[0].value["schema"], ddl);
    assert!(result.into_answer().unwrap().starts_with("INSERT INTO users"));
}

// ── Answer selection ─────────────────────────────────────────────────

#[tokio::test]
async fn earlier_text_survives_an_empty_final_turn() {
    let model = ScriptedModel::new(vec![
        Reply::Complete(ChatCompletion {
            content: Some("SELECT * FROM accounts;".into()),
            ..ChatCompletion::tool_calls(vec![ToolCall::new("c1", names::LIST_TABLES, "{}")])
        }),
        text(""),
    ]);
    let registry = introspection(Arc::new(StaticBackend::new()));
    let result = run(&model, &registry, GenerateOptions::new("show accounts")).await;

    assert_eq!(result.text, "");
    assert_eq!(result.steps[1].text, "");
    assert_eq!(result.into_answer().unwrap(), "SELECT * FROM accounts;");
}

#[tokio::test]
async fn missing_table_does_not_block_create_table() {
    let model = ScriptedModel::new(vec![
        tools(vec![ToolCall::new("c1", names::LIST_TABLES, "{}")]),
        text(
            "CREATE TABLE orders (id BIGINT, user TEXT, created_at TIMESTAMP WITH TIME ZONE NOT NULL);",
        ),
    ]);
    let registry = introspection(Arc::new(StaticBackend::new().with_tables("[]")));
    let result = run(
        &model,
        &registry,
        GenerateOptions::new("create a table named orders for users"),
    )
    .await;

    let second = &model.requests()[1];
    let tool_msg = second.messages.last().unwrap().content.clone().unwrap();
    assert!(tool_msg.contains("Found 0 tables in database"));
    assert!(tool_msg.contains("No tables in this database"));
    assert!(result.into_answer().unwrap().starts_with("CREATE TABLE"));
}

// ── Transcript ───────────────────────────────────────────────────────

#[tokio::test]
async fn transcript_shape_and_request_contents() {
    let model = ScriptedModel::new(vec![
        tools(vec![
            ToolCall::new("c1", names::LIST_DATABASES, "{}"),
            ToolCall::new("c2", names::LIST_TABLES, "{}"),
        ]),
        text("SELECT 1;"),
    ]);
    let registry = introspection(Arc::new(StaticBackend::new()));
    let options = GenerateOptions::new("show all users").with_system("You write SQL.");
    let result = run(&model, &registry, options).await;

    let roles: Vec<_> = result.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Tool,
            MessageRole::Assistant,
        ]
    );
    assert_eq!(result.messages[0].content.as_deref(), Some("You write SQL."));
    assert_eq!(result.messages[2].tool_calls.as_ref().unwrap().len(), 2);

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let first = &requests[0];
    assert_eq!(first.model, "gpt-4.1-nano");
    assert_eq!(first.temperature, Some(1.0));
    assert_eq!(first.messages.len(), 2);
    assert_eq!(first.tools.as_ref().unwrap().len(), 3);
    assert_eq!(requests[1].messages.len(), 5);
}

#[tokio::test]
async fn empty_registry_sends_no_tools() {
    let model = ScriptedModel::new(vec![text("SELECT 1;")]);
    let registry = ToolRegistry::empty();
    run(&model, &registry, GenerateOptions::new("x")).await;
    assert!(model.requests()[0].tools.is_none());
}

// ── Generator ────────────────────────────────────────────────────────

/// Answers each request with SQL naming the user's prompt.
struct PromptEcho;

impl ChatModel for PromptEcho {
    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a> {
        let prompt = request.messages[1].content.clone().unwrap_or_default();
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(ChatCompletion::text(format!("SELECT '{prompt}';")))
        })
    }
}

#[tokio::test]
async fn concurrent_generations_are_independent() {
    let generator = SqlGenerator::new(
        Arc::new(PromptEcho),
        Arc::new(StaticBackend::new()),
        GenerateOptions::default(),
    )
    .unwrap();

    let prompts: Vec<String> = (0..8).map(|i| format!("request {i}")).collect();
    let answers =
        futures::future::join_all(prompts.iter().map(|p| generator.generate(p))).await;

    for (prompt, answer) in prompts.iter().zip(answers) {
        assert_eq!(answer.unwrap(), format!("SELECT '{prompt}';"));
    }
}

#[tokio::test]
async fn generator_reports_provider_errors_as_text_on_the_legacy_path() {
    let generator = SqlGenerator::new(
        Arc::new(ScriptedModel::new(vec![Reply::Fail(ProviderError::Transport(
            "dns error".into(),
        ))])),
        Arc::new(StaticBackend::new()),
        GenerateOptions::default(),
    )
    .unwrap();
    assert_eq!(generator.generate_text("x").await, "request failed: dns error");
}
