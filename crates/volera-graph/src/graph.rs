// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph builder and executor.
//!
//! The executor runs one node at a time per thread. Before each node it
//! checkpoints the merged state with status `running` and the node about to
//! run, so a crash loses at most that node's work. At END the checkpoint is
//! kept as `completed` (conversation history carries into the next turn); at
//! HUMAN it is kept as `suspended` with the node to resume at.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use volera_core::types::{Checkpoint, CheckpointStatus};
use volera_core::{Checkpointer, VoleraError};

use crate::command::{END, Goto, HUMAN, INPUT, Sink};
use crate::node::{Node, RunConfig, SinkHook};
use crate::state::GraphState;

/// Default cap on node invocations within one `invoke`.
pub const DEFAULT_RECURSION_LIMIT: u32 = 50;

/// Builder for a [`CompiledGraph`].
pub struct StateGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    duplicates: Vec<String>,
    entry: Option<String>,
    error_node: Option<String>,
    sink_hook: Option<Arc<dyn SinkHook<S>>>,
    recursion_limit: u32,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            duplicates: Vec::new(),
            entry: None,
            error_node: None,
            sink_hook: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    pub fn add_node(mut self, name: impl Into<String>, node: impl Node<S> + 'static) -> Self {
        let name = name.into();
        if self.nodes.insert(name.clone(), Arc::new(node)).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Node that receives control when another node fails. Without one, a
    /// node failure aborts the run.
    pub fn set_error_node(mut self, name: impl Into<String>) -> Self {
        self.error_node = Some(name.into());
        self
    }

    pub fn set_sink_hook(mut self, hook: impl SinkHook<S> + 'static) -> Self {
        self.sink_hook = Some(Arc::new(hook));
        self
    }

    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Validate the definition and bind it to a checkpointer.
    pub fn compile(self, checkpointer: Arc<dyn Checkpointer>) -> Result<CompiledGraph<S>, VoleraError> {
        if let Some(name) = self.duplicates.first() {
            return Err(VoleraError::Graph(format!("node `{name}` added twice")));
        }
        for reserved in [END, HUMAN, INPUT] {
            if self.nodes.contains_key(reserved) {
                return Err(VoleraError::Graph(format!("`{reserved}` is a reserved node name")));
            }
        }
        let entry = self
            .entry
            .ok_or_else(|| VoleraError::Graph("graph has no entry node".into()))?;
        if !self.nodes.contains_key(&entry) {
            return Err(VoleraError::Graph(format!("entry node `{entry}` is not defined")));
        }
        if let Some(handler) = &self.error_node
            && !self.nodes.contains_key(handler)
        {
            return Err(VoleraError::Graph(format!("error node `{handler}` is not defined")));
        }
        if self.recursion_limit == 0 {
            return Err(VoleraError::Graph("recursion limit must be at least 1".into()));
        }

        Ok(CompiledGraph {
            nodes: self.nodes,
            entry,
            error_node: self.error_node,
            sink_hook: self.sink_hook,
            recursion_limit: self.recursion_limit,
            checkpointer,
            locks: DashMap::new(),
        })
    }
}

/// Result of a run that reached a sink.
#[derive(Debug, Clone)]
pub struct GraphOutcome<S> {
    pub state: S,
    pub sink: Sink,
    /// Node invocations during this run.
    pub invocations: u32,
}

/// An executable graph.
pub struct CompiledGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    entry: String,
    error_node: Option<String>,
    sink_hook: Option<Arc<dyn SinkHook<S>>>,
    recursion_limit: u32,
    checkpointer: Arc<dyn Checkpointer>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: GraphState> CompiledGraph<S> {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn node_names(&self) -> HashSet<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    fn lock_for(&self, thread_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// The thread's checkpointed state and status, if any.
    pub async fn snapshot(&self, thread_id: &str) -> Result<Option<(S, CheckpointStatus)>, VoleraError> {
        match self.checkpointer.get(thread_id).await? {
            Some(cp) => Ok(Some((decode_state(&cp)?, cp.status))),
            None => Ok(None),
        }
    }

    /// Apply `input` to the thread's state and run until a sink.
    ///
    /// A suspended thread resumes at the node recorded when it suspended; any
    /// other thread starts at the entry node. State from earlier turns is kept.
    pub async fn invoke(&self, thread_id: &str, input: S::Update) -> Result<GraphOutcome<S>, VoleraError> {
        let lock = self.lock_for(thread_id);
        let _guard = lock.lock().await;

        let (mut state, step, start) = match self.checkpointer.get(thread_id).await? {
            Some(cp) => {
                let state: S = decode_state(&cp)?;
                let start = match cp.status {
                    CheckpointStatus::Suspended => cp
                        .next
                        .clone()
                        .or_else(|| state.resume_node())
                        .unwrap_or_else(|| self.entry.clone()),
                    CheckpointStatus::Completed => self.entry.clone(),
                    CheckpointStatus::Running => {
                        warn!(thread_id, next = ?cp.next, "previous run was interrupted, restarting at entry");
                        self.entry.clone()
                    }
                };
                (state, cp.step, start)
            }
            None => (S::default(), 0, self.entry.clone()),
        };
        if !self.nodes.contains_key(&start) {
            return Err(VoleraError::Graph(format!("cannot resume at unknown node `{start}`")));
        }

        state.apply(INPUT, input);
        info!(thread_id, start = %start, "graph run started");
        self.run_from(thread_id, state, step, start).await
    }

    /// Continue a run that was interrupted while a node was executing.
    pub async fn resume_interrupted(&self, thread_id: &str) -> Result<GraphOutcome<S>, VoleraError> {
        let lock = self.lock_for(thread_id);
        let _guard = lock.lock().await;

        let cp = self
            .checkpointer
            .get(thread_id)
            .await?
            .ok_or_else(|| VoleraError::Graph(format!("no checkpoint for thread `{thread_id}`")))?;
        if cp.status != CheckpointStatus::Running {
            return Err(VoleraError::Graph(format!(
                "thread `{thread_id}` is {}, not running",
                cp.status
            )));
        }
        let next = cp.next.clone().unwrap_or_else(|| self.entry.clone());
        let state = decode_state(&cp)?;
        self.run_from(thread_id, state, cp.step, next).await
    }

    async fn run_from(
        &self,
        thread_id: &str,
        mut state: S,
        mut step: u64,
        start: String,
    ) -> Result<GraphOutcome<S>, VoleraError> {
        let mut current = start;
        let mut invocations: u32 = 0;

        loop {
            if invocations >= self.recursion_limit {
                error!(thread_id, node = %current, limit = self.recursion_limit, "recursion limit reached");
                self.finish(thread_id, &mut state, step, Sink::End).await?;
                return Err(VoleraError::Graph(format!(
                    "recursion limit of {} reached before node `{current}`",
                    self.recursion_limit
                )));
            }

            self.save(thread_id, &state, CheckpointStatus::Running, Some(current.clone()), step)
                .await?;

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| VoleraError::Graph(format!("unknown node `{current}`")))?;
            let config = RunConfig {
                thread_id: thread_id.to_string(),
                step,
            };
            debug!(thread_id, node = %current, step, "running node");
            let result = node.run(&state, &config).await;
            invocations += 1;
            step += 1;

            let goto = match result {
                Ok(command) => {
                    state.apply(&current, command.update);
                    command.goto
                }
                Err(err) => match &self.error_node {
                    Some(handler) if *handler != current => {
                        warn!(thread_id, node = %current, error = %err, "node failed, routing to error node");
                        state.record_error(&current, &err);
                        Goto::Node(handler.clone())
                    }
                    _ => {
                        error!(thread_id, node = %current, error = %err, "node failed");
                        self.finish(thread_id, &mut state, step, Sink::End).await?;
                        return Err(err);
                    }
                },
            };

            match goto {
                Goto::Node(next) => {
                    if !self.nodes.contains_key(&next) {
                        self.finish(thread_id, &mut state, step, Sink::End).await?;
                        return Err(VoleraError::Graph(format!(
                            "node `{current}` routed to unknown node `{next}`"
                        )));
                    }
                    debug!(thread_id, from = %current, to = %next, "edge");
                    current = next;
                }
                Goto::End => {
                    self.finish(thread_id, &mut state, step, Sink::End).await?;
                    info!(thread_id, invocations, "graph run ended");
                    return Ok(GraphOutcome {
                        state,
                        sink: Sink::End,
                        invocations,
                    });
                }
                Goto::Human => {
                    self.finish(thread_id, &mut state, step, Sink::Human).await?;
                    info!(thread_id, invocations, resume = ?state.resume_node(), "graph suspended for user input");
                    return Ok(GraphOutcome {
                        state,
                        sink: Sink::Human,
                        invocations,
                    });
                }
            }
        }
    }

    /// Run the sink hook and write the final checkpoint.
    async fn finish(&self, thread_id: &str, state: &mut S, step: u64, sink: Sink) -> Result<(), VoleraError> {
        if let Some(hook) = &self.sink_hook
            && let Err(e) = hook.on_sink(state, sink).await
        {
            warn!(thread_id, %sink, error = %e, "sink hook failed");
        }
        let (status, next) = match sink {
            Sink::End => (CheckpointStatus::Completed, None),
            Sink::Human => (CheckpointStatus::Suspended, state.resume_node()),
        };
        self.save(thread_id, state, status, next, step).await
    }

    async fn save(
        &self,
        thread_id: &str,
        state: &S,
        status: CheckpointStatus,
        next: Option<String>,
        step: u64,
    ) -> Result<(), VoleraError> {
        let state = serde_json::to_value(state)
            .map_err(|e| VoleraError::Graph(format!("state is not serializable: {e}")))?;
        self.checkpointer
            .put(Checkpoint {
                thread_id: thread_id.to_string(),
                state,
                status,
                next,
                step,
            })
            .await
    }
}

fn decode_state<S: GraphState>(cp: &Checkpoint) -> Result<S, VoleraError> {
    serde_json::from_value(cp.state.clone()).map_err(|e| {
        VoleraError::Graph(format!("checkpoint for `{}` does not decode: {e}", cp.thread_id))
    })
}
