//! The Scheduler (C6, §4.6): the ready-queue DAG executor that drives one
//! `Execution` from `pending` to a terminal status.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use flowright_action::{Credentials, HandlerCategory, NodeContext, NodeExecutionResult};
use flowright_core::{ExecutionId, FlowVersionId, JsonMap, NodeId};
use flowright_credential::CredentialResolver;
use flowright_error::{EngineError as NodeError, ErrorKind};
use flowright_eventbus::{EventBus, NodeStatusEvent};
use flowright_execution::{Execution, ExecutionStatus, ExecutionStore, NodeRun, NodeRunStatus};
use flowright_expression::{interpolate, EvaluationContext};
use flowright_node::NodeRegistry;
use flowright_workflow::{Definition, EdgeType, FlowVersion, RetryPolicy, ValidationReport};
use serde_json::Value;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::graph::GraphIndex;
use crate::retry::{decide, FailureDecision};
use crate::subflow::SubFlowStarter;

const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

/// The Scheduler drives Executions of any `FlowVersion` it is given. It is
/// stateless across Executions except for the bookkeeping needed to cancel
/// or resume one that is currently in flight.
pub struct Scheduler {
    registry: Arc<NodeRegistry>,
    credentials: Arc<dyn CredentialResolver>,
    store: Arc<dyn ExecutionStore>,
    sub_flow_starter: Arc<dyn SubFlowStarter>,
    events: Option<Arc<EventBus>>,
    cancel_tokens: DashMap<ExecutionId, (CancellationToken, Arc<AtomicBool>)>,
    resume_channels: DashMap<(ExecutionId, NodeId), oneshot::Sender<Value>>,
}

/// A single node attempt's outcome, as it flows back through the shared
/// completion channel (§4.6: the loop "blocks until at least one node
/// completes").
struct Completion {
    node_id: NodeId,
    attempt: u32,
    input: JsonMap,
    started_at: chrono::DateTime<Utc>,
    outcome: Outcome,
}

enum Outcome {
    Result(NodeExecutionResult),
    Timeout,
}

/// Per-Execution mutable state; owned exclusively by the execution loop.
struct RunState {
    ready: VecDeque<NodeId>,
    pending: HashMap<NodeId, i64>,
    outputs: HashMap<NodeId, Value>,
    attempts: HashMap<NodeId, u32>,
    pruned_edges: HashSet<String>,
    skipped: HashSet<NodeId>,
    running: HashSet<NodeId>,
    waiting: HashSet<NodeId>,
    forced_input: HashMap<NodeId, JsonMap>,
    uncaught_failure: Option<(NodeId, NodeError)>,
}

impl RunState {
    fn new(def: &Definition, graph: &GraphIndex, report: &ValidationReport) -> Self {
        let mut pending = HashMap::new();
        let mut ready = VecDeque::new();

        for node_id in def.nodes.keys() {
            if report.skipped.contains(node_id) {
                continue;
            }
            let has_non_error_inbound = def
                .inbound_edges(node_id)
                .any(|e| matches!(e.edge_type, EdgeType::Success | EdgeType::Always));
            let only_error_inbound = !has_non_error_inbound
                && def.inbound_edges(node_id).any(|e| e.edge_type == EdgeType::Error);

            #[allow(clippy::cast_possible_wrap)]
            let count = graph.initial_pending(node_id) as i64;
            pending.insert(node_id.clone(), count);

            if count == 0 && !only_error_inbound {
                ready.push_back(node_id.clone());
            }
        }

        Self {
            ready,
            pending,
            outputs: HashMap::new(),
            attempts: HashMap::new(),
            pruned_edges: HashSet::new(),
            skipped: report.skipped.clone(),
            running: HashSet::new(),
            waiting: HashSet::new(),
            forced_input: HashMap::new(),
            uncaught_failure: None,
        }
    }

    fn is_drained(&self) -> bool {
        self.ready.is_empty() && self.running.is_empty() && self.waiting.is_empty()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new(
        registry: Arc<NodeRegistry>,
        credentials: Arc<dyn CredentialResolver>,
        store: Arc<dyn ExecutionStore>,
        sub_flow_starter: Arc<dyn SubFlowStarter>,
    ) -> Self {
        Self {
            registry,
            credentials,
            store,
            sub_flow_starter,
            events: None,
            cancel_tokens: DashMap::new(),
            resume_channels: DashMap::new(),
        }
    }

    /// Stream every `NodeRun` transition this Scheduler records onto `events`
    /// (§6: "Node-status event stream ... emitted on every NodeRun transition").
    #[must_use]
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Record `run` through the Execution Store and, if wired, publish its
    /// transition onto the event bus.
    async fn record_node_run(&self, run: NodeRun) -> Result<(), EngineError> {
        if let Some(events) = &self.events {
            let at = run.finished_at.or(run.started_at).unwrap_or_else(Utc::now);
            let mut event = NodeStatusEvent::new(run.node_id.clone(), run.status, at);
            if !run.output.is_null() {
                event = event.with_output_preview(&run.output);
            }
            events.publish(run.execution_id, event);
        }
        self.store.record_node_run(run).await?;
        Ok(())
    }

    /// Request cancellation of a running Execution. Idempotent (§6:
    /// `POST /executions/{id}/cancel` "idempotent").
    pub fn cancel(&self, execution_id: ExecutionId) {
        if let Some(entry) = self.cancel_tokens.get(&execution_id) {
            entry.1.store(true, Ordering::SeqCst);
            entry.0.cancel();
        }
    }

    /// Deliver a resume payload to a parked node (§4.3 `Waiting`).
    pub fn resume(&self, execution_id: ExecutionId, node_id: NodeId, payload: Value) -> bool {
        self.resume_channels
            .remove(&(execution_id, node_id))
            .is_some_and(|(_, sender)| sender.send(payload).is_ok())
    }

    /// Drive `execution` (already persisted as `pending`) to a terminal
    /// status, writing every `NodeRun` and the final transition through the
    /// Execution Store.
    pub async fn execute(
        &self,
        flow_version: &FlowVersion,
        report: &ValidationReport,
        execution: Execution,
    ) -> Result<(), EngineError> {
        let execution_id = execution.id;
        let def = &flow_version.definition;
        let graph = GraphIndex::build(def, &self.registry);
        let mut state = RunState::new(def, &graph, report);

        let cancel_token = CancellationToken::new();
        let user_cancelled = Arc::new(AtomicBool::new(false));
        self.cancel_tokens
            .insert(execution_id, (cancel_token.clone(), user_cancelled.clone()));

        self.store.transition(execution_id, ExecutionStatus::Running).await?;

        let mut eval_ctx = EvaluationContext::new(execution.input.clone(), execution_id, Utc::now());
        let semaphore = Arc::new(Semaphore::new(flow_version.settings.max_concurrent_nodes as usize));
        let mut join_set: JoinSet<Completion> = JoinSet::new();

        loop {
            if !cancel_token.is_cancelled() && state.uncaught_failure.is_none() {
                self.drain_ready(
                    &mut state, def, &graph, flow_version, &execution, &eval_ctx, &semaphore,
                    &cancel_token, &mut join_set,
                )
                .await?;
            }

            if state.is_drained() {
                break;
            }

            let Some(join_result) = join_set.join_next().await else {
                break;
            };

            match join_result {
                Ok(completion) => {
                    self.handle_completion(
                        &mut state, def, flow_version, &execution, &mut eval_ctx, &cancel_token,
                        &mut join_set, completion,
                    )
                    .await?;
                }
                Err(join_err) => {
                    tracing::error!(?join_err, "node task panicked");
                }
            }
        }

        self.cancel_tokens.remove(&execution_id);

        if user_cancelled.load(Ordering::SeqCst) {
            tokio::time::timeout(DEFAULT_CANCEL_GRACE, join_set.shutdown()).await.ok();
            self.store
                .finalize(execution_id, ExecutionStatus::Cancelled, Value::Null, None)
                .await?;
            if let Some(events) = &self.events {
                events.close(execution_id);
            }
            return Ok(());
        }

        let result = self.finalize(execution_id, def, &graph, &state).await;
        if let Some(events) = &self.events {
            events.close(execution_id);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn drain_ready(
        &self,
        state: &mut RunState,
        def: &Definition,
        graph: &GraphIndex,
        flow_version: &FlowVersion,
        execution: &Execution,
        eval_ctx: &EvaluationContext,
        semaphore: &Arc<Semaphore>,
        cancel_token: &CancellationToken,
        join_set: &mut JoinSet<Completion>,
    ) -> Result<(), EngineError> {
        while let Some(node_id) = state.ready.pop_front() {
            if cancel_token.is_cancelled() || state.uncaught_failure.is_some() {
                break;
            }
            if state.skipped.contains(&node_id) {
                continue;
            }

            let attempt = *state.attempts.entry(node_id.clone()).or_insert(1);

            let pinned = self.store.load_pinned_data(flow_version.id, &node_id).await;
            if let Some(output) = pinned {
                let input = self.materialize_input(state, def, &node_id, execution);
                let run = NodeRun {
                    execution_id: execution.id,
                    node_id: node_id.clone(),
                    attempt,
                    status: NodeRunStatus::Completed,
                    input: Value::Object(input),
                    output: output.clone(),
                    branches_taken: Vec::new(),
                    started_at: Some(Utc::now()),
                    finished_at: Some(Utc::now()),
                    error: None,
                    logs: Vec::new(),
                    retry_of: None,
                };
                self.record_node_run(run).await?;
                self.on_node_terminal(state, def, &node_id, &output, true, None);
                continue;
            }

            match graph.category(&node_id) {
                HandlerCategory::Loop => {
                    self.run_loop(state, def, graph, execution, &eval_ctx.clone(), cancel_token, &node_id)
                        .await?;
                }
                HandlerCategory::SubWorkflow => {
                    self.run_subflow(state, def, execution, eval_ctx, &node_id, attempt).await?;
                }
                _ => {
                    self.spawn_generic(
                        state, def, flow_version, execution, eval_ctx, semaphore, cancel_token,
                        join_set, &node_id, attempt,
                    )
                    .await?;
                }
            }
        }
        Ok(())
    }

    /// Merge upstream outputs into this node's materialized `input`
    /// (§4.3: "Merged output of the node's upstream dependencies").
    fn materialize_input(
        &self,
        state: &RunState,
        def: &Definition,
        node_id: &NodeId,
        execution: &Execution,
    ) -> JsonMap {
        if let Some(forced) = state.forced_input.get(node_id) {
            return forced.clone();
        }

        let mut merged = JsonMap::new();
        let mut any = false;
        for edge in def.inbound_edges(node_id) {
            if edge.edge_type != EdgeType::Success || state.pruned_edges.contains(&edge.id) {
                continue;
            }
            if let Some(Value::Object(output)) = state.outputs.get(&edge.source) {
                flowright_core::merge_objects(&mut merged, output);
                any = true;
            }
        }
        if !any {
            if let Value::Object(input) = &execution.input {
                return input.clone();
            }
        }
        merged
    }

    #[allow(clippy::too_many_arguments)]
    async fn spawn_generic(
        &self,
        state: &mut RunState,
        def: &Definition,
        flow_version: &FlowVersion,
        execution: &Execution,
        eval_ctx: &EvaluationContext,
        semaphore: &Arc<Semaphore>,
        cancel_token: &CancellationToken,
        join_set: &mut JoinSet<Completion>,
        node_id: &NodeId,
        attempt: u32,
    ) -> Result<(), EngineError> {
        let node = &def.nodes[node_id];
        let handler = self.registry.get(&node.node_type)?;

        let input = self.materialize_input(state, def, node_id, execution);
        let config = interpolate(&Value::Object(node.config.clone()), eval_ctx)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_else(|| node.config.clone());

        let credentials = if handler.metadata().credential_type.is_some() {
            let credential_ref = config.get("credentialRef").and_then(Value::as_str).map(str::to_owned);
            let Some(reference) = credential_ref else {
                let error = NodeError::new(
                    ErrorKind::CredentialMissing,
                    format!("node `{node_id}` declares a credential type but no credentialRef was configured"),
                );
                self.record_generic_failure(state, def, execution, node_id, attempt, input, error)
                    .await?;
                return Ok(());
            };
            match self.credentials.resolve(&reference, execution.user_id).await {
                Ok(creds) => creds,
                Err(err) => {
                    let error = NodeError::new(ErrorKind::CredentialMissing, err.to_string());
                    self.record_generic_failure(state, def, execution, node_id, attempt, input, error)
                        .await?;
                    return Ok(());
                }
            }
        } else {
            Credentials::new()
        };

        let timeout_ms = config
            .get("timeoutMs")
            .and_then(Value::as_u64)
            .or(flow_version.settings.default_timeout_ms);

        let ctx = NodeContext::new(execution.id, node_id.clone(), input.clone(), config)
            .with_credentials(credentials)
            .with_cancellation(cancel_token.child_token());

        state.running.insert(node_id.clone());
        let node_id = node_id.clone();
        let started_at = Utc::now();
        let sem = semaphore.clone();

        join_set.spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            let outcome = match timeout_ms {
                Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), handler.execute(ctx)).await {
                    Ok(result) => Outcome::Result(result),
                    Err(_) => Outcome::Timeout,
                },
                None => Outcome::Result(handler.execute(ctx).await),
            };
            Completion {
                node_id,
                attempt,
                input,
                started_at,
                outcome,
            }
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_generic_failure(
        &self,
        state: &mut RunState,
        def: &Definition,
        execution: &Execution,
        node_id: &NodeId,
        attempt: u32,
        input: JsonMap,
        error: NodeError,
    ) -> Result<(), EngineError> {
        let run = NodeRun {
            execution_id: execution.id,
            node_id: node_id.clone(),
            attempt,
            status: NodeRunStatus::Failed,
            input: Value::Object(input),
            output: Value::Null,
            branches_taken: Vec::new(),
            started_at: Some(Utc::now()),
            finished_at: Some(Utc::now()),
            error: Some(error.clone()),
            logs: Vec::new(),
            retry_of: if attempt > 1 { Some(attempt - 1) } else { None },
        };
        self.record_node_run(run).await?;
        self.apply_failure(state, def, node_id, error);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_completion(
        &self,
        state: &mut RunState,
        def: &Definition,
        flow_version: &FlowVersion,
        execution: &Execution,
        eval_ctx: &mut EvaluationContext,
        cancel_token: &CancellationToken,
        join_set: &mut JoinSet<Completion>,
        completion: Completion,
    ) -> Result<(), EngineError> {
        state.running.remove(&completion.node_id);

        match completion.outcome {
            Outcome::Timeout => {
                let error = NodeError::timeout(format!("node `{}` exceeded its deadline", completion.node_id));
                self.finish_failed_attempt(state, def, flow_version, execution, &completion, error).await?;
            }
            Outcome::Result(NodeExecutionResult::Success {
                output,
                branches_to_follow,
                metadata: _,
            }) => {
                let run = NodeRun {
                    execution_id: execution.id,
                    node_id: completion.node_id.clone(),
                    attempt: completion.attempt,
                    status: NodeRunStatus::Completed,
                    input: Value::Object(completion.input),
                    output: Value::Object(output.clone()),
                    branches_taken: branches_to_follow.clone().unwrap_or_default(),
                    started_at: Some(completion.started_at),
                    finished_at: Some(Utc::now()),
                    error: None,
                    logs: Vec::new(),
                    retry_of: if completion.attempt > 1 { Some(completion.attempt - 1) } else { None },
                };
                self.record_node_run(run).await?;
                eval_ctx.record_node_output(completion.node_id.as_str(), Value::Object(output.clone()));
                self.on_node_terminal(
                    state, def, &completion.node_id, &Value::Object(output), true, branches_to_follow.as_deref(),
                );
            }
            Outcome::Result(NodeExecutionResult::Waiting { resume_token: _, waiting_on: _ }) => {
                state.waiting.insert(completion.node_id.clone());
                let run = NodeRun {
                    execution_id: execution.id,
                    node_id: completion.node_id.clone(),
                    attempt: completion.attempt,
                    status: NodeRunStatus::Waiting,
                    input: Value::Object(completion.input),
                    output: Value::Null,
                    branches_taken: Vec::new(),
                    started_at: Some(completion.started_at),
                    finished_at: None,
                    error: None,
                    logs: Vec::new(),
                    retry_of: None,
                };
                self.record_node_run(run).await?;

                let (tx, rx) = oneshot::channel();
                self.resume_channels.insert((execution.id, completion.node_id.clone()), tx);
                let node_id = completion.node_id.clone();
                let attempt = completion.attempt;
                let input = JsonMap::new();
                let cancelled = cancel_token.clone();
                join_set.spawn(async move {
                    let started_at = Utc::now();
                    tokio::select! {
                        payload = rx => {
                            let output = match payload {
                                Ok(Value::Object(map)) => map,
                                Ok(other) => {
                                    let mut m = JsonMap::new();
                                    m.insert("value".into(), other);
                                    m
                                }
                                Err(_) => JsonMap::new(),
                            };
                            Completion {
                                node_id,
                                attempt,
                                input,
                                started_at,
                                outcome: Outcome::Result(NodeExecutionResult::success(output)),
                            }
                        }
                        () = cancelled.cancelled() => Completion {
                            node_id,
                            attempt,
                            input,
                            started_at,
                            outcome: Outcome::Result(NodeExecutionResult::failure(ErrorKind::Cancelled, "cancelled while waiting")),
                        },
                    }
                });
                state.running.insert(completion.node_id.clone());
            }
            Outcome::Result(NodeExecutionResult::Failure { error_kind, message, metadata: _ }) => {
                let error = NodeError::new(error_kind, message);
                self.finish_failed_attempt(state, def, flow_version, execution, &completion, error).await?;
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_failed_attempt(
        &self,
        state: &mut RunState,
        def: &Definition,
        flow_version: &FlowVersion,
        execution: &Execution,
        completion: &Completion,
        error: NodeError,
    ) -> Result<(), EngineError> {
        let node = &def.nodes[&completion.node_id];
        let policy = resolve_retry_policy(&node.config, flow_version);

        let run = NodeRun {
            execution_id: execution.id,
            node_id: completion.node_id.clone(),
            attempt: completion.attempt,
            status: NodeRunStatus::Failed,
            input: Value::Object(completion.input.clone()),
            output: Value::Null,
            branches_taken: Vec::new(),
            started_at: Some(completion.started_at),
            finished_at: Some(Utc::now()),
            error: Some(error.clone()),
            logs: Vec::new(),
            retry_of: if completion.attempt > 1 { Some(completion.attempt - 1) } else { None },
        };
        self.record_node_run(run).await?;

        match decide(&policy, completion.attempt, error.kind) {
            FailureDecision::Retry { next_attempt, backoff_ms } => {
                state.attempts.insert(completion.node_id.clone(), next_attempt);
                if backoff_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                state.ready.push_back(completion.node_id.clone());
            }
            FailureDecision::GiveUp => {
                self.apply_failure(state, def, &completion.node_id, error);
            }
        }
        Ok(())
    }

    /// Route a final (non-retryable) failure through error edges if any
    /// exist; otherwise record it as the Execution's uncaught failure
    /// (§4.7 rule 3).
    fn apply_failure(&self, state: &mut RunState, def: &Definition, node_id: &NodeId, error: NodeError) {
        state.waiting.remove(node_id);

        let error_targets: Vec<NodeId> = def
            .outbound_edges(node_id)
            .filter(|e| e.edge_type == EdgeType::Error)
            .map(|e| e.target.clone())
            .collect();

        if error_targets.is_empty() && state.uncaught_failure.is_none() {
            state.uncaught_failure = Some((node_id.clone(), error.clone()));
        }

        for target in error_targets {
            let mut err_obj = JsonMap::new();
            err_obj.insert("kind".into(), Value::String(error.kind.to_string()));
            err_obj.insert("message".into(), Value::String(error.message.clone()));
            let mut forced = JsonMap::new();
            forced.insert("error".into(), Value::Object(err_obj));
            state.forced_input.insert(target.clone(), forced);
            if !state.ready.contains(&target) {
                state.ready.push_back(target);
            }
        }

        // A failed node's success edges are all pruned, and its always
        // edges still resolve, exactly like a successful node's would.
        self.on_node_terminal(state, def, node_id, &Value::Null, false, None);
    }

    /// Apply the readiness/pruning transition for a node that just reached
    /// a terminal outcome (§4.6 "Branching and tie-breaks").
    fn on_node_terminal(
        &self,
        state: &mut RunState,
        def: &Definition,
        node_id: &NodeId,
        output: &Value,
        success: bool,
        branches_to_follow: Option<&[String]>,
    ) {
        state.waiting.remove(node_id);
        if success {
            state.outputs.insert(node_id.clone(), output.clone());
        }

        for edge in def.outbound_edges(node_id) {
            match edge.edge_type {
                EdgeType::Success => {
                    let followed = success
                        && branches_to_follow
                            .map_or(true, |handles| handles.iter().any(|h| h == edge.handle_name()));
                    if !followed {
                        state.pruned_edges.insert(edge.id.clone());
                    }
                    self.decrement_pending(state, def, &edge.target);
                }
                EdgeType::Always => {
                    self.decrement_pending(state, def, &edge.target);
                }
                EdgeType::Error => {}
            }
        }
    }

    fn decrement_pending(&self, state: &mut RunState, def: &Definition, target: &NodeId) {
        if state.skipped.contains(target) || state.forced_input.contains_key(target) {
            return;
        }
        let Some(remaining) = state.pending.get_mut(target) else {
            return;
        };
        *remaining -= 1;
        if *remaining > 0 {
            return;
        }

        let success_inbound: Vec<_> =
            def.inbound_edges(target).filter(|e| e.edge_type == EdgeType::Success).collect();
        let all_pruned =
            !success_inbound.is_empty() && success_inbound.iter().all(|e| state.pruned_edges.contains(&e.id));

        if all_pruned {
            state.skipped.insert(target.clone());
        } else if !state.ready.contains(target) && !state.running.contains(target) {
            state.ready.push_back(target.clone());
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_loop(
        &self,
        state: &mut RunState,
        def: &Definition,
        graph: &GraphIndex,
        execution: &Execution,
        eval_ctx: &EvaluationContext,
        cancel_token: &CancellationToken,
        node_id: &NodeId,
    ) -> Result<(), EngineError> {
        let node = &def.nodes[node_id];
        let config = interpolate(&Value::Object(node.config.clone()), eval_ctx)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_else(|| node.config.clone());

        let items: Vec<Value> = config.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        let continue_on_error = config.get("continueOnError").and_then(Value::as_bool).unwrap_or(false);

        let loop_end = graph
            .loop_end_of(node_id)
            .cloned()
            .ok_or_else(|| EngineError::InvalidSubFlowConfig(node_id.clone(), "loop has no matching loopEnd".into()))?;
        let body: HashSet<NodeId> = graph.body_of(node_id).cloned().unwrap_or_default();

        let input = self.materialize_input(state, def, node_id, execution);
        let loop_output = Value::Object(input.clone());
        let run = NodeRun {
            execution_id: execution.id,
            node_id: node_id.clone(),
            attempt: 1,
            status: NodeRunStatus::Completed,
            input: Value::Object(input),
            output: loop_output,
            branches_taken: Vec::new(),
            started_at: Some(Utc::now()),
            finished_at: Some(Utc::now()),
            error: None,
            logs: Vec::new(),
            retry_of: None,
        };
        self.record_node_run(run).await?;

        let mut iteration_results = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            if cancel_token.is_cancelled() {
                break;
            }
            let iter_ctx = eval_ctx.with_loop_scope(index, item.clone());
            let result = self.run_loop_body(def, execution, &iter_ctx, cancel_token, &body, &item).await;

            match result {
                Ok(value) => iteration_results.push(value),
                Err(err) if continue_on_error => {
                    let mut record = JsonMap::new();
                    record.insert("error".into(), Value::String(err.to_string()));
                    iteration_results.push(Value::Object(record));
                }
                Err(err) => {
                    self.apply_failure(state, def, node_id, NodeError::internal(err.to_string()));
                    return Ok(());
                }
            }
        }

        let output = Value::Array(iteration_results);
        let run = NodeRun {
            execution_id: execution.id,
            node_id: loop_end.clone(),
            attempt: 1,
            status: NodeRunStatus::Completed,
            input: Value::Null,
            output: output.clone(),
            branches_taken: Vec::new(),
            started_at: Some(Utc::now()),
            finished_at: Some(Utc::now()),
            error: None,
            logs: Vec::new(),
            retry_of: None,
        };
        self.record_node_run(run).await?;
        self.on_node_terminal(state, def, &loop_end, &output, true, None);
        Ok(())
    }

    /// Run one iteration of a loop body as an isolated sub-schedule, scoped
    /// to `body`'s node ids, returning the iteration's representative
    /// output (the merged output of the body's sink nodes -- those with no
    /// outbound edge remaining inside `body`).
    async fn run_loop_body(
        &self,
        def: &Definition,
        execution: &Execution,
        iter_ctx: &EvaluationContext,
        cancel_token: &CancellationToken,
        body: &HashSet<NodeId>,
        item: &Value,
    ) -> Result<Value, EngineError> {
        let mut pending: HashMap<NodeId, i64> = HashMap::new();
        let mut ready: VecDeque<NodeId> = VecDeque::new();
        let mut pruned_edges: HashSet<String> = HashSet::new();
        for id in body {
            #[allow(clippy::cast_possible_wrap)]
            let count = def
                .inbound_edges(id)
                .filter(|e| e.edge_type == EdgeType::Success && body.contains(&e.source))
                .count() as i64;
            pending.insert(id.clone(), count);
            if count == 0 {
                ready.push_back(id.clone());
            }
        }

        let mut outputs: HashMap<NodeId, Value> = HashMap::new();
        let item_input = {
            let mut m = JsonMap::new();
            m.insert("item".into(), item.clone());
            m
        };

        while let Some(node_id) = ready.pop_front() {
            if cancel_token.is_cancelled() {
                break;
            }
            let node = &def.nodes[&node_id];
            let handler = self.registry.get(&node.node_type)?;

            let mut input = JsonMap::new();
            let mut any_predecessor = false;
            for edge in def.inbound_edges(&node_id) {
                if edge.edge_type == EdgeType::Success && body.contains(&edge.source) {
                    if let Some(Value::Object(out)) = outputs.get(&edge.source) {
                        flowright_core::merge_objects(&mut input, out);
                        any_predecessor = true;
                    }
                }
            }
            if !any_predecessor {
                input = item_input.clone();
            }

            let config = interpolate(&Value::Object(node.config.clone()), iter_ctx)
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_else(|| node.config.clone());

            let ctx = NodeContext::new(execution.id, node_id.clone(), input, config)
                .with_cancellation(cancel_token.child_token());
            let result = handler.execute(ctx).await;

            match result {
                NodeExecutionResult::Success {
                    output,
                    branches_to_follow,
                    ..
                } => {
                    outputs.insert(node_id.clone(), Value::Object(output));
                    for edge in def.outbound_edges(&node_id) {
                        if edge.edge_type != EdgeType::Success || !body.contains(&edge.target) {
                            continue;
                        }
                        let followed = branches_to_follow
                            .as_deref()
                            .map_or(true, |handles| handles.iter().any(|h| h == edge.handle_name()));
                        if !followed {
                            pruned_edges.insert(edge.id.clone());
                        }
                        let Some(remaining) = pending.get_mut(&edge.target) else {
                            continue;
                        };
                        *remaining -= 1;
                        if *remaining > 0 {
                            continue;
                        }
                        let inbound_success: Vec<_> = def
                            .inbound_edges(&edge.target)
                            .filter(|e| e.edge_type == EdgeType::Success && body.contains(&e.source))
                            .collect();
                        let all_pruned =
                            !inbound_success.is_empty() && inbound_success.iter().all(|e| pruned_edges.contains(&e.id));
                        if !all_pruned && !ready.contains(&edge.target) {
                            ready.push_back(edge.target.clone());
                        }
                    }
                }
                NodeExecutionResult::Failure { message, .. } => {
                    return Err(EngineError::InvalidSubFlowConfig(node_id, message));
                }
                NodeExecutionResult::Waiting { .. } => {
                    return Err(EngineError::InvalidSubFlowConfig(
                        node_id,
                        "async handlers are not supported inside a loop body".into(),
                    ));
                }
            }
        }

        let sinks: Vec<&NodeId> = body
            .iter()
            .filter(|id| !def.outbound_edges(id).any(|e| e.edge_type == EdgeType::Success && body.contains(&e.target)))
            .collect();

        let mut merged = JsonMap::new();
        for sink in sinks {
            if let Some(Value::Object(out)) = outputs.get(sink) {
                flowright_core::merge_objects(&mut merged, out);
            }
        }
        Ok(Value::Object(merged))
    }

    async fn run_subflow(
        &self,
        state: &mut RunState,
        def: &Definition,
        execution: &Execution,
        eval_ctx: &EvaluationContext,
        node_id: &NodeId,
        attempt: u32,
    ) -> Result<(), EngineError> {
        let node = &def.nodes[node_id];
        let config = interpolate(&Value::Object(node.config.clone()), eval_ctx)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_else(|| node.config.clone());

        let flow_version_id = config
            .get("flowVersionId")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<FlowVersionId>().ok())
            .ok_or_else(|| EngineError::InvalidSubFlowConfig(node_id.clone(), "missing flowVersionId".into()))?;
        let wait_for_completion = config.get("waitForCompletion").and_then(Value::as_bool).unwrap_or(false);

        let input = self.materialize_input(state, def, node_id, execution);
        let sub_id = self
            .sub_flow_starter
            .start_sub_execution(flow_version_id, execution.user_id, Value::Object(input.clone()), execution.id)
            .await?;

        if !wait_for_completion {
            let mut output = JsonMap::new();
            output.insert("subExecutionId".into(), Value::String(sub_id.to_string()));
            output.insert("status".into(), Value::String("triggered".into()));
            let run = NodeRun {
                execution_id: execution.id,
                node_id: node_id.clone(),
                attempt,
                status: NodeRunStatus::Completed,
                input: Value::Object(input),
                output: Value::Object(output.clone()),
                branches_taken: Vec::new(),
                started_at: Some(Utc::now()),
                finished_at: Some(Utc::now()),
                error: None,
                logs: Vec::new(),
                retry_of: None,
            };
            self.record_node_run(run).await?;
            self.on_node_terminal(state, def, node_id, &Value::Object(output), true, None);
            return Ok(());
        }

        state.waiting.insert(node_id.clone());
        let run = NodeRun {
            execution_id: execution.id,
            node_id: node_id.clone(),
            attempt,
            status: NodeRunStatus::Waiting,
            input: Value::Object(input),
            output: Value::Null,
            branches_taken: Vec::new(),
            started_at: Some(Utc::now()),
            finished_at: None,
            error: None,
            logs: Vec::new(),
            retry_of: None,
        };
        self.record_node_run(run).await?;

        loop {
            if let Some(output) = self.sub_flow_starter.poll_sub_execution(sub_id).await {
                let run = NodeRun {
                    execution_id: execution.id,
                    node_id: node_id.clone(),
                    attempt,
                    status: NodeRunStatus::Completed,
                    input: Value::Null,
                    output: output.clone(),
                    branches_taken: Vec::new(),
                    started_at: None,
                    finished_at: Some(Utc::now()),
                    error: None,
                    logs: Vec::new(),
                    retry_of: None,
                };
                self.record_node_run(run).await?;
                self.on_node_terminal(state, def, node_id, &output, true, None);
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn finalize(
        &self,
        execution_id: ExecutionId,
        def: &Definition,
        graph: &GraphIndex,
        state: &RunState,
    ) -> Result<(), EngineError> {
        let mut output = JsonMap::new();
        for node_id in graph.topo_order() {
            if state.skipped.contains(node_id) {
                continue;
            }
            let has_success_successor = def
                .outbound_edges(node_id)
                .any(|e| e.edge_type == EdgeType::Success && !state.pruned_edges.contains(&e.id));
            if has_success_successor {
                continue;
            }
            if let Some(Value::Object(node_output)) = state.outputs.get(node_id) {
                flowright_core::merge_objects(&mut output, node_output);
            }
        }

        let (status, error) = match &state.uncaught_failure {
            Some((node_id, err)) => (ExecutionStatus::Failed, Some(format!("node `{node_id}` failed: {err}"))),
            None => (ExecutionStatus::Completed, None),
        };

        self.store.finalize(execution_id, status, Value::Object(output), error).await?;
        Ok(())
    }
}

/// Resolve the effective retry policy for `node`: its own declared `retry`
/// config, falling back to the `FlowVersion`'s default (§3: "settings...
/// defaultRetryPolicy").
fn resolve_retry_policy(config: &JsonMap, flow_version: &FlowVersion) -> RetryPolicy {
    if let Some(value) = config.get("retry") {
        if let Ok(policy) = serde_json::from_value::<RetryPolicy>(value.clone()) {
            return policy;
        }
    }
    flow_version.settings.default_retry_policy.clone().unwrap_or_else(RetryPolicy::none)
}
