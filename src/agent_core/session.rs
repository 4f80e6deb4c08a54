//! Conversation Session: one chat, its history, and the tool-calling loop.
//!
//! A turn moves `idle → sending → (calling-function ⇄ awaiting-confirmation)
//! → generating → idle`. Only one turn runs at a time; the status gate rejects
//! sends while it is not idle. State sits behind a std `Mutex` that is never
//! held across an `.await`. Each turn carries the epoch it started in;
//! `clear_messages` bumps the epoch so a cleared turn's late updates are
//! dropped.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;

use crate::config::ChatConfig;
use crate::inference::{
    HistoryTurn, ModelBackend, ToolCallRequest, ToolResultPart, TurnContent,
};
use crate::search_client::{CollectionSchema, SearchBackend, SearchError};

use super::confirmation::ConfirmationGate;
use super::errors::{user_facing_message, AgentError, InputRejected};
use super::materializer::{condense_reply, derive_table, generic_summary};
use super::prompts::build_system_prompt;
use super::tool_executor::ToolExecutor;
use super::tool_registry::{describe_action, function_declarations, is_write_tool};
use super::types::{
    ConversationStatus, FunctionCallRecord, Message, MessageRole, PendingAction,
};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Sent to the model when the user denies a write.
const DENIED_FOR_MODEL: &str = "User denied this action. Do not retry.";

/// Stored on the function-call record when the user denies a write.
const DENIED_FOR_RECORD: &str = "User denied this action";

/// Reply used when the model finishes without text and nothing to tabulate.
const COMPLETED_FALLBACK: &str = "I've completed the requested operation.";

/// Shown when a turn is dropped before it finishes.
const CANCELLED_MESSAGE: &str = "The request was cancelled before it completed.";

// ─── Configuration ──────────────────────────────────────────────────────────

/// Conversation limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum tool rounds per turn.
    pub max_iterations: usize,
    /// Maximum messages retained, newest kept.
    pub max_history: usize,
    /// Minimum spacing between accepted sends.
    pub rate_limit: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for SessionConfig {
    fn from(chat: &ChatConfig) -> Self {
        Self {
            max_iterations: chat.max_iterations,
            max_history: chat.max_history,
            rate_limit: Duration::from_millis(chat.rate_limit_ms),
        }
    }
}

// ─── Round state ────────────────────────────────────────────────────────────

/// Where the tool-calling loop is within a turn.
enum RoundState {
    /// Content is ready to send to the model.
    AwaitingModel(TurnContent),
    /// The model asked for these calls.
    AwaitingTools(Vec<ToolCallRequest>),
    /// The model's final text, if any.
    Done(Option<String>),
}

// ─── Session ────────────────────────────────────────────────────────────────

struct SessionState {
    messages: Vec<Message>,
    status: ConversationStatus,
    last_send: Option<Instant>,
    epoch: u64,
    collections: Vec<CollectionSchema>,
    selected_collection: Option<String>,
}

/// A single conversation. Share it as `Arc<ConversationSession>`.
pub struct ConversationSession {
    model: Arc<dyn ModelBackend>,
    search: Arc<dyn SearchBackend>,
    executor: ToolExecutor,
    gate: ConfirmationGate,
    config: SessionConfig,
    state: Mutex<SessionState>,
    status_tx: watch::Sender<ConversationStatus>,
}

impl ConversationSession {
    pub fn new(
        model: Arc<dyn ModelBackend>,
        search: Arc<dyn SearchBackend>,
        config: SessionConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConversationStatus::Idle);
        Self {
            executor: ToolExecutor::new(search.clone()),
            model,
            search,
            gate: ConfirmationGate::new(),
            config,
            state: Mutex::new(SessionState {
                messages: Vec::new(),
                status: ConversationStatus::Idle,
                last_send: None,
                epoch: 0,
                collections: Vec::new(),
                selected_collection: None,
            }),
            status_tx,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ─── Observers ──────────────────────────────────────────────────────

    pub fn messages(&self) -> Vec<Message> {
        self.lock_state().messages.clone()
    }

    pub fn status(&self) -> ConversationStatus {
        self.lock_state().status
    }

    /// Status changes as they happen.
    pub fn subscribe_status(&self) -> watch::Receiver<ConversationStatus> {
        self.status_tx.subscribe()
    }

    /// The write action waiting for allow/deny, if any.
    pub fn pending_action(&self) -> Option<PendingAction> {
        self.gate.pending()
    }

    pub fn collections(&self) -> Vec<CollectionSchema> {
        self.lock_state().collections.clone()
    }

    pub fn selected_collection(&self) -> Option<String> {
        self.lock_state().selected_collection.clone()
    }

    pub fn is_model_ready(&self) -> bool {
        self.model.is_initialized()
    }

    // ─── Controls ───────────────────────────────────────────────────────

    /// Supply the model API key.
    pub fn initialize_model(&self, api_key: &str) {
        self.model.initialize(api_key);
    }

    /// Reload the collection catalogue used in the system prompt.
    pub async fn refresh_catalogue(&self) -> Result<usize, SearchError> {
        let collections = self.search.list_collections().await?;
        let count = collections.len();
        self.lock_state().collections = collections;
        tracing::info!(count, "collection catalogue refreshed");
        Ok(count)
    }

    pub fn set_selected_collection(&self, name: Option<String>) {
        tracing::debug!(collection = ?name, "selected collection changed");
        self.lock_state().selected_collection = name;
    }

    /// Allow or deny the pending write. Returns `false` when nothing is pending.
    ///
    /// The waiting turn moves itself back to `calling-function`.
    pub fn resolve_confirmation(&self, confirmed: bool) -> bool {
        self.gate.resolve(confirmed)
    }

    /// Drop every message, deny any pending write, and detach the running turn.
    pub fn clear_messages(&self) {
        {
            let mut state = self.lock_state();
            state.messages.clear();
            state.epoch += 1;
            self.publish(&mut state, ConversationStatus::Idle);
        }
        self.gate.abandon();
        tracing::info!("conversation cleared");
    }

    // ─── Turn ───────────────────────────────────────────────────────────

    /// Run one user turn to completion.
    ///
    /// Rejections leave the session untouched. Once accepted, the turn
    /// always ends with an assistant or error message and status `idle`.
    pub async fn send_message(&self, text: &str) -> Result<(), InputRejected> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InputRejected::Blank);
        }

        let (epoch, placeholder_id, history, system_prompt) = {
            let mut state = self.lock_state();
            if state.status != ConversationStatus::Idle {
                return Err(InputRejected::Busy);
            }
            if !self.model.is_initialized() {
                return Err(InputRejected::BackendUninitialized);
            }
            let now = Instant::now();
            if let Some(last) = state.last_send {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.config.rate_limit {
                    let retry_after_ms = (self.config.rate_limit - elapsed).as_millis() as u64;
                    return Err(InputRejected::RateLimited { retry_after_ms });
                }
            }
            state.last_send = Some(now);

            let history = build_history(&state.messages);
            let system_prompt =
                build_system_prompt(&state.collections, state.selected_collection.as_deref());

            state.messages.push(Message::user(text));
            let placeholder = Message::loading();
            let placeholder_id = placeholder.id.clone();
            state.messages.push(placeholder);
            self.publish(&mut state, ConversationStatus::Sending);

            (state.epoch, placeholder_id, history, system_prompt)
        };

        tracing::info!(epoch, history_len = history.len(), "turn started");
        let _idle = IdleOnDrop {
            session: self,
            epoch,
            placeholder_id: placeholder_id.clone(),
        };

        let reply = match self.run_turn(text, history, system_prompt, epoch).await {
            Ok(message) => message,
            Err(AgentError::Cleared) => {
                tracing::debug!(epoch, "turn detached by clear");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(epoch, error = %e, "turn failed");
                Message::error(user_facing_message(&e))
            }
        };
        self.finish_turn(epoch, &placeholder_id, reply);
        Ok(())
    }

    async fn run_turn(
        &self,
        text: &str,
        history: Vec<HistoryTurn>,
        system_prompt: String,
        epoch: u64,
    ) -> Result<Message, AgentError> {
        let mut round = self
            .model
            .start_round(history, system_prompt, function_declarations())
            .await?;

        let mut records: Vec<FunctionCallRecord> = Vec::new();
        let mut tool_rounds = 0usize;
        let mut state = RoundState::AwaitingModel(TurnContent::Text(text.to_string()));

        let final_text = loop {
            state = match state {
                RoundState::AwaitingModel(content) => {
                    self.ensure_current(epoch)?;
                    let response = round.send(content).await?;
                    self.ensure_current(epoch)?;

                    if !response.has_tool_calls() {
                        RoundState::Done(response.text)
                    } else if tool_rounds >= self.config.max_iterations {
                        tracing::warn!(
                            tool_rounds,
                            ignored_calls = response.tool_calls.len(),
                            "tool round limit reached"
                        );
                        RoundState::Done(response.text)
                    } else {
                        RoundState::AwaitingTools(response.tool_calls)
                    }
                }
                RoundState::AwaitingTools(calls) => {
                    tool_rounds += 1;
                    self.set_status(epoch, ConversationStatus::CallingFunction);
                    tracing::info!(round = tool_rounds, calls = calls.len(), "tool round");

                    let mut results = Vec::with_capacity(calls.len());
                    for call in calls {
                        let (for_model, for_record) = self.run_tool_call(&call, epoch).await?;
                        records.push(FunctionCallRecord {
                            name: call.name.clone(),
                            args: call.args,
                            result: Some(for_record),
                        });
                        results.push(ToolResultPart {
                            name: call.name,
                            response: for_model,
                        });
                    }

                    self.set_status(epoch, ConversationStatus::Generating);
                    RoundState::AwaitingModel(TurnContent::ToolResults(results))
                }
                RoundState::Done(text) => break text,
            };
        };

        self.set_status(epoch, ConversationStatus::Generating);
        Ok(compose_reply(final_text, records))
    }

    /// Gate writes, then execute. Returns (result for the model, result for the record).
    async fn run_tool_call(
        &self,
        call: &ToolCallRequest,
        epoch: u64,
    ) -> Result<(Value, Value), AgentError> {
        self.ensure_current(epoch)?;

        if is_write_tool(&call.name) {
            let action = PendingAction {
                tool_name: call.name.clone(),
                args: call.args.clone(),
                human_description: describe_action(&call.name, &call.args),
            };
            let decision = self.park_for_confirmation(epoch, action)?;
            tracing::info!(tool = %call.name, "awaiting user confirmation");

            let confirmed = decision.await.unwrap_or(false);
            self.ensure_current(epoch)?;
            self.set_status(epoch, ConversationStatus::CallingFunction);

            if !confirmed {
                tracing::info!(tool = %call.name, "tool call denied by user");
                return Ok((
                    json!({ "error": DENIED_FOR_MODEL }),
                    json!({ "error": DENIED_FOR_RECORD }),
                ));
            }
        }

        self.ensure_current(epoch)?;
        let result = match self.executor.execute(&call.name, &call.args).await {
            Ok(value) => value,
            Err(e) => json!({ "error": e.to_string() }),
        };
        Ok((result.clone(), result))
    }

    /// Park a write in the gate and publish `awaiting-confirmation`.
    ///
    /// Both happen under the state lock against the turn's epoch, so a turn
    /// detached by `clear_messages` can never leave an action behind.
    fn park_for_confirmation(
        &self,
        epoch: u64,
        action: PendingAction,
    ) -> Result<oneshot::Receiver<bool>, AgentError> {
        let mut state = self.lock_state();
        if state.epoch != epoch {
            return Err(AgentError::Cleared);
        }
        let decision = self.gate.request(action)?;
        self.publish(&mut state, ConversationStatus::AwaitingConfirmation);
        Ok(decision)
    }

    /// Swap the placeholder for the reply and enforce the history cap.
    fn finish_turn(&self, epoch: u64, placeholder_id: &str, reply: Message) {
        let mut state = self.lock_state();
        if state.epoch != epoch {
            tracing::debug!(epoch, "discarding reply from cleared turn");
            return;
        }

        match state.messages.iter_mut().find(|m| m.id == placeholder_id) {
            Some(slot) => *slot = reply,
            None => state.messages.push(reply),
        }

        let excess = state.messages.len().saturating_sub(self.config.max_history);
        if excess > 0 {
            state.messages.drain(..excess);
        }
        tracing::info!(epoch, messages = state.messages.len(), "turn finished");
    }

    // ─── Status helpers ─────────────────────────────────────────────────

    fn publish(&self, state: &mut SessionState, status: ConversationStatus) {
        state.status = status;
        self.status_tx.send_replace(status);
    }

    /// Set status only if the turn has not been cleared.
    fn set_status(&self, epoch: u64, status: ConversationStatus) {
        let mut state = self.lock_state();
        if state.epoch == epoch {
            self.publish(&mut state, status);
        }
    }

    fn ensure_current(&self, epoch: u64) -> Result<(), AgentError> {
        if self.lock_state().epoch == epoch {
            Ok(())
        } else {
            Err(AgentError::Cleared)
        }
    }
}

// ─── Drop guard ─────────────────────────────────────────────────────────────

/// Returns the session to idle however the turn ends, including cancellation.
struct IdleOnDrop<'a> {
    session: &'a ConversationSession,
    epoch: u64,
    placeholder_id: String,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.session.lock_state();
        if state.epoch != self.epoch {
            return;
        }
        if let Some(slot) = state
            .messages
            .iter_mut()
            .find(|m| m.id == self.placeholder_id && m.is_loading)
        {
            *slot = Message::error(CANCELLED_MESSAGE);
        }
        self.session.publish(&mut state, ConversationStatus::Idle);
        drop(state);
        self.session.gate.abandon();
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Prior turns for the model: no error messages, no placeholders.
fn build_history(messages: &[Message]) -> Vec<HistoryTurn> {
    messages
        .iter()
        .filter(|m| !m.is_loading && !m.content.trim().is_empty())
        .filter_map(|m| match m.role {
            MessageRole::User => Some(HistoryTurn::user(m.content.clone())),
            MessageRole::Assistant => Some(HistoryTurn::model(m.content.clone())),
            MessageRole::Error => None,
        })
        .collect()
}

fn compose_reply(text: Option<String>, records: Vec<FunctionCallRecord>) -> Message {
    let table = derive_table(&records);
    let raw = text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let content = match (raw, &table) {
        (Some(raw), Some(table)) => condense_reply(&raw, table),
        (Some(raw), None) => raw,
        (None, Some(table)) => generic_summary(table),
        (None, None) => COMPLETED_FALLBACK.to_string(),
    };
    Message::assistant(content, table, records)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
