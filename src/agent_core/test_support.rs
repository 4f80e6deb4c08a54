//! In-memory model and search backends for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::inference::{
    FunctionDeclaration, HistoryTurn, InferenceError, ModelBackend, ModelResponse, ModelRound,
    TurnContent,
};
use crate::search_client::{
    CollectionSchema, SearchBackend, SearchError, SearchHit, SearchParams, SearchResponse,
};

// ─── ScriptedModel ──────────────────────────────────────────────────────────

/// What a round was opened with.
#[derive(Debug, Clone)]
pub struct RoundStart {
    pub history: Vec<HistoryTurn>,
    pub system_prompt: String,
    pub tool_count: usize,
}

#[derive(Default)]
struct Script {
    queued: VecDeque<Result<ModelResponse, InferenceError>>,
    repeat: Option<ModelResponse>,
    sent: Vec<TurnContent>,
    rounds: Vec<RoundStart>,
}

/// Replays queued responses, then `repeat` forever if set.
pub struct ScriptedModel {
    initialized: AtomicBool,
    script: Arc<Mutex<Script>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        let script = Script {
            queued: responses.into_iter().map(Ok).collect(),
            ..Script::default()
        };
        Self {
            initialized: AtomicBool::new(true),
            script: Arc::new(Mutex::new(script)),
        }
    }

    /// Always answer with `response`.
    pub fn repeating(response: ModelResponse) -> Self {
        let model = Self::new(Vec::new());
        model.script.lock().unwrap().repeat = Some(response);
        model
    }

    pub fn uninitialized() -> Self {
        let model = Self::new(Vec::new());
        model.initialized.store(false, Ordering::SeqCst);
        model
    }

    pub fn push(&self, response: ModelResponse) {
        self.script.lock().unwrap().queued.push_back(Ok(response));
    }

    pub fn push_error(&self, err: InferenceError) {
        self.script.lock().unwrap().queued.push_back(Err(err));
    }

    /// Everything sent across all rounds, in order.
    pub fn sent(&self) -> Vec<TurnContent> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn rounds(&self) -> Vec<RoundStart> {
        self.script.lock().unwrap().rounds.clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedModel {
    fn initialize(&self, api_key: &str) {
        self.initialized
            .store(!api_key.trim().is_empty(), Ordering::SeqCst);
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn start_round(
        &self,
        history: Vec<HistoryTurn>,
        system_prompt: String,
        tools: Vec<FunctionDeclaration>,
    ) -> Result<Box<dyn ModelRound>, InferenceError> {
        tokio::task::yield_now().await;
        self.script.lock().unwrap().rounds.push(RoundStart {
            history,
            system_prompt,
            tool_count: tools.len(),
        });
        Ok(Box::new(ScriptedRound {
            script: self.script.clone(),
        }))
    }
}

struct ScriptedRound {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl ModelRound for ScriptedRound {
    async fn send(&mut self, content: TurnContent) -> Result<ModelResponse, InferenceError> {
        tokio::task::yield_now().await;
        let mut script = self.script.lock().unwrap();
        script.sent.push(content);
        match script.queued.pop_front() {
            Some(next) => next,
            None => script.repeat.clone().ok_or(InferenceError::InvalidResponse {
                reason: "script exhausted".into(),
            }),
        }
    }
}

// ─── MockSearch ─────────────────────────────────────────────────────────────

/// Holds one `list_collections` call open until released.
#[derive(Default)]
pub struct CallHold {
    /// Signalled once the held call has started.
    pub entered: Notify,
    /// Signal to let the held call return.
    pub release: Notify,
}

#[derive(Default)]
struct SearchState {
    collections: Vec<CollectionSchema>,
    documents: HashMap<(String, String), Value>,
    search_found: u64,
    search_hits: Vec<Value>,
    searches: Vec<SearchParams>,
    calls: Vec<String>,
    list_hold: Option<Arc<CallHold>>,
}

/// Records every call; answers from in-memory state.
#[derive(Default)]
pub struct MockSearch {
    state: Mutex<SearchState>,
}

fn not_found(what: &str) -> SearchError {
    SearchError::Http {
        status: 404,
        message: format!("Could not find {what}"),
    }
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_collection(&self, schema: CollectionSchema) {
        self.state.lock().unwrap().collections.push(schema);
    }

    pub fn add_document(&self, collection: &str, document: Value) {
        let id = document["id"].as_str().unwrap_or_default().to_string();
        self.state
            .lock()
            .unwrap()
            .documents
            .insert((collection.to_string(), id), document);
    }

    /// Every search returns these hits with `found` as the total.
    pub fn set_search_hits(&self, found: u64, hits: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        state.search_found = found;
        state.search_hits = hits;
    }

    pub fn last_search(&self) -> Option<SearchParams> {
        self.state.lock().unwrap().searches.last().cloned()
    }

    /// `"<method>:<collection>[/<id>]"` per call.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Block the next `list_collections` call on the returned hold.
    pub fn hold_next_list(&self) -> Arc<CallHold> {
        let hold = Arc::new(CallHold::default());
        self.state.lock().unwrap().list_hold = Some(hold.clone());
        hold
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl SearchBackend for MockSearch {
    async fn list_collections(&self) -> Result<Vec<CollectionSchema>, SearchError> {
        self.record("list_collections".into());
        let hold = self.state.lock().unwrap().list_hold.take();
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }
        tokio::task::yield_now().await;
        Ok(self.state.lock().unwrap().collections.clone())
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionSchema, SearchError> {
        self.record(format!("get_collection:{name}"));
        self.state
            .lock()
            .unwrap()
            .collections
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| not_found(&format!("collection {name}")))
    }

    async fn search_documents(
        &self,
        collection: &str,
        params: &SearchParams,
    ) -> Result<SearchResponse, SearchError> {
        self.record(format!("search_documents:{collection}"));
        let mut state = self.state.lock().unwrap();
        state.searches.push(params.clone());
        Ok(SearchResponse {
            found: state.search_found,
            page: params.page.unwrap_or(1),
            search_time_ms: 1,
            hits: state
                .search_hits
                .iter()
                .cloned()
                .map(|document| SearchHit { document })
                .collect(),
        })
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Value, SearchError> {
        self.record(format!("get_document:{collection}/{id}"));
        self.state
            .lock()
            .unwrap()
            .documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(&format!("document {id}")))
    }

    async fn create_document(
        &self,
        collection: &str,
        document: Value,
    ) -> Result<Value, SearchError> {
        self.record(format!("create_document:{collection}"));
        Ok(document)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        partial: Value,
    ) -> Result<Value, SearchError> {
        self.record(format!("update_document:{collection}/{id}"));
        let mut updated = json!({ "id": id });
        if let (Some(target), Some(fields)) = (updated.as_object_mut(), partial.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(updated)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<Value, SearchError> {
        self.record(format!("delete_document:{collection}/{id}"));
        tokio::task::yield_now().await;
        Ok(json!({ "id": id }))
    }
}
