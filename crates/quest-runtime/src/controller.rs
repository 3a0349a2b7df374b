use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use quest_core::{
    ConversationLog, Event, EventBus, QuestError, Result, Role, SessionId, SessionStatus, Task,
    Turn, TurnContent,
};
use quest_llm::{ActionRequest, ReasoningClient, StepContext};

use crate::dispatch::ToolDispatcher;
use crate::prompt;
use crate::registry::ToolRegistry;
use crate::session::Session;
use crate::table::SessionTable;

/// Longest summary carried by a `TurnAppended` event.
const SUMMARY_CHARS: usize = 200;

/// The two hard budgets plus the malformed-output allowance.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub deadline: Duration,
    pub step_limit: u32,
    pub malformed_retries: u32,
}

impl From<&quest_config::SessionConfig> for SessionLimits {
    fn from(cfg: &quest_config::SessionConfig) -> Self {
        Self {
            deadline: cfg.deadline(),
            step_limit: cfg.step_limit,
            malformed_retries: cfg.malformed_retries,
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&quest_config::SessionConfig::default())
    }
}

/// How a session ended.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub steps: u32,
    pub elapsed: Duration,
    pub turns: Vec<Turn>,
    /// Why the session failed, for logs only.
    pub error: Option<String>,
}

/// Drives the step loop of one session at a time. Cheap to share: each `run` owns its
/// own log and session state.
pub struct SessionController {
    client: ReasoningClient,
    dispatcher: ToolDispatcher,
    limits: SessionLimits,
    events: EventBus,
    table: Option<SessionTable>,
}

impl SessionController {
    /// The client is handed the registry's tool specs so the provider sees what it may call.
    pub fn new(client: ReasoningClient, registry: Arc<ToolRegistry>, limits: SessionLimits) -> Self {
        let client = client.with_tools(registry.specs());
        Self {
            client,
            dispatcher: ToolDispatcher::new(registry),
            limits,
            events: EventBus::default(),
            table: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.client = self.client.with_events(events.clone());
        self.events = events;
        self
    }

    /// Mirror status and turns into `table` as the session progresses.
    pub fn with_table(mut self, table: SessionTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// Run a fresh session for `task` to a terminal status.
    pub async fn run(&self, task: &Task) -> SessionOutcome {
        self.run_with_id(Uuid::new_v4(), task).await
    }

    pub async fn run_with_id(&self, id: SessionId, task: &Task) -> SessionOutcome {
        let mut session = Session::new(id, &task.url, self.limits.deadline, self.limits.step_limit);
        let mut log = ConversationLog::new(id);

        if let Some(ref table) = self.table {
            table.open(id, &task.url);
        }
        self.events.publish(Event::SessionStarted {
            session_id: id,
            target: task.url.clone(),
        });
        info!(
            session = %id,
            target = %task.url,
            deadline_secs = self.limits.deadline.as_secs(),
            step_limit = self.limits.step_limit,
            "session started"
        );

        let tool_names = self.registry().names();
        self.record(
            &mut log,
            Role::System,
            TurnContent::Text {
                text: prompt::system_prompt(&tool_names),
            },
            true,
            None,
        );
        self.record(
            &mut log,
            Role::User,
            TurnContent::Text {
                text: prompt::initial_request(task),
            },
            true,
            None,
        );

        let mut failure: Option<String> = None;
        let status = loop {
            if session.is_past_deadline() {
                break SessionStatus::TimedOut;
            }
            if session.steps_exhausted() {
                break SessionStatus::StepLimitExceeded;
            }
            let step = session.begin_step();
            if let Some(ref table) = self.table {
                table.set_steps(id, step);
            }
            debug!(session = %id, step, remaining_ms = session.remaining().as_millis() as u64, "step");

            let asked = Instant::now();
            let action = match self.request_action(&log, &session, task).await {
                Ok(action) => action,
                Err(QuestError::DeadlineExceeded { .. }) => break SessionStatus::TimedOut,
                Err(e) => {
                    error!(session = %id, step, error = %e, "reasoning failed, ending session");
                    failure = Some(e.to_string());
                    break SessionStatus::Failed;
                }
            };
            let think_ms = asked.elapsed().as_millis() as u64;

            match action {
                ActionRequest::Finish { text } => {
                    let text = if text.trim().is_empty() {
                        "(no further action)".to_string()
                    } else {
                        text
                    };
                    self.record(
                        &mut log,
                        Role::Assistant,
                        TurnContent::Text { text },
                        true,
                        Some(think_ms),
                    );
                    break SessionStatus::Completed;
                }
                ActionRequest::Invoke { text, call } => {
                    self.record(
                        &mut log,
                        Role::Assistant,
                        TurnContent::ToolCall {
                            text,
                            call: call.clone(),
                        },
                        true,
                        Some(think_ms),
                    );
                    let result = self.dispatcher.dispatch(&call).await;
                    let success = result.success;
                    let elapsed_ms = result.elapsed_ms;
                    self.record(
                        &mut log,
                        Role::ToolResult,
                        TurnContent::ToolResult { result },
                        success,
                        Some(elapsed_ms),
                    );
                }
            }
        };

        session.finish(status);
        let steps = session.step_count();
        let elapsed = session.elapsed();
        if let Some(ref table) = self.table {
            table.close(id, status, steps);
        }
        self.events.publish(Event::SessionFinished {
            session_id: id,
            status,
            steps,
            elapsed_ms: elapsed.as_millis() as u64,
        });
        match status {
            SessionStatus::Failed => warn!(
                session = %id, %status, steps, elapsed_ms = elapsed.as_millis() as u64,
                "session failed"
            ),
            _ => info!(
                session = %id, %status, steps, elapsed_ms = elapsed.as_millis() as u64,
                "session finished"
            ),
        }

        SessionOutcome {
            session_id: id,
            status,
            steps,
            elapsed,
            turns: log.into_turns(),
            error: failure,
        }
    }

    /// Ask for the next action, re-asking with the same log after malformed output.
    async fn request_action(
        &self,
        log: &ConversationLog,
        session: &Session,
        task: &Task,
    ) -> Result<ActionRequest> {
        let mut malformed = 0;
        loop {
            let ctx = StepContext {
                session_id: session.id,
                deadline: Some(session.deadline()),
                note: Some(prompt::context_note(task, session)),
            };
            match self.client.next_action(log, &ctx).await {
                Err(QuestError::MalformedAction(reason)) => {
                    if session.is_past_deadline() {
                        return Err(QuestError::DeadlineExceeded {
                            elapsed_ms: session.elapsed().as_millis() as u64,
                        });
                    }
                    if malformed >= self.limits.malformed_retries {
                        return Err(QuestError::MalformedAction(reason));
                    }
                    malformed += 1;
                    warn!(
                        session = %session.id,
                        attempt = malformed,
                        max = self.limits.malformed_retries,
                        %reason,
                        "malformed action, asking again"
                    );
                }
                other => return other,
            }
        }
    }

    /// Append a turn, then emit its event and mirror it into the table.
    fn record(
        &self,
        log: &mut ConversationLog,
        role: Role,
        content: TurnContent,
        success: bool,
        duration_ms: Option<u64>,
    ) {
        let turn = log.append(role, content);
        let summary = turn.summary(SUMMARY_CHARS);
        debug!(
            session = %turn.session_id,
            seq = turn.seq,
            role = %turn.role,
            success,
            summary = %summary,
            "turn appended"
        );
        self.events.publish(Event::TurnAppended {
            session_id: turn.session_id,
            seq: turn.seq,
            role: turn.role,
            summary,
            success,
            duration_ms,
        });
        if let Some(ref table) = self.table {
            table.push_turn(turn.session_id, turn.clone());
        }
    }
}
