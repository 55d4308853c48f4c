//! Trigger activation and scheduling

use std::cell::Cell;
use std::fmt;
use std::mem;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use parking_lot::Mutex;

use super::cooldown::CooldownTable;
use super::reserved::ReservedCommands;
use super::runtime::TriggerRuntime;
use crate::core::{ExecutionMode, TriggerContext};
use crate::error::{Result, TriggerError};
use crate::interpreter::{Completion, Environment, ExecutionLimits, ExecutionScope, Interpreter};
use crate::script::{parse_script, Script, Variables};

thread_local! {
    /// Activations currently nested on this thread
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Holds one level of `CALL_DEPTH`, restored on drop so unwinding host
/// code cannot leak depth
struct DepthGuard(usize);

impl DepthGuard {
    fn enter(depth: usize) -> Self {
        CALL_DEPTH.with(|d| d.set(depth + 1));
        Self(depth)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|d| d.set(self.0));
    }
}

/// Lifecycle of one activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Created,
    Running,
    Completed,
    /// Vetoed, cancelled through the token, or skipped by a cooldown
    Cancelled,
    Error,
}

impl ActivationState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ActivationState::Completed | ActivationState::Cancelled | ActivationState::Error
        )
    }
}

enum Outcome {
    Ready(Result<ActivationState>),
    Pending(Receiver<Result<ActivationState>>),
}

/// Handle to a started activation
pub struct ActivationHandle {
    state: Arc<Mutex<ActivationState>>,
    outcome: Outcome,
}

impl ActivationHandle {
    fn ready(state: Arc<Mutex<ActivationState>>, result: Result<ActivationState>) -> Self {
        Self {
            state,
            outcome: Outcome::Ready(result),
        }
    }

    fn skipped() -> Self {
        let state = ActivationState::Cancelled;
        Self::ready(Arc::new(Mutex::new(state)), Ok(state))
    }

    pub fn state(&self) -> ActivationState {
        *self.state.lock()
    }

    /// Block until the activation finishes. Runtime errors of the script
    /// surface here.
    pub fn wait(self) -> Result<ActivationState> {
        match self.outcome {
            Outcome::Ready(result) => result,
            Outcome::Pending(receiver) => receiver.recv().map_err(|_| {
                TriggerError::runtime("activation was dropped before it finished")
            })?,
        }
    }
}

impl fmt::Debug for ActivationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// A named, parsed script
pub struct Trigger {
    name: String,
    source: String,
    script: Arc<Script>,
    default_mode: ExecutionMode,
    cooldowns: CooldownTable,
}

impl Trigger {
    /// Parse `source` into a trigger. Syntax errors abort the load.
    pub fn parse(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let source = source.into();
        let script = parse_script(&source)?;
        log::debug!("Parsed trigger '{}' ({} statements)", name, script.statements.len());

        Ok(Self {
            name,
            source,
            script: Arc::new(script),
            default_mode: ExecutionMode::Sync,
            cooldowns: CooldownTable::new(),
        })
    }

    pub fn with_default_mode(mut self, mode: ExecutionMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn script(&self) -> &Arc<Script> {
        &self.script
    }

    pub fn default_mode(&self) -> ExecutionMode {
        self.default_mode
    }

    pub fn cooldowns(&self) -> &CooldownTable {
        &self.cooldowns
    }

    /// Host entry point: fresh variables from the context bindings, default
    /// mode
    pub fn fire(
        self: &Arc<Self>,
        runtime: &Arc<TriggerRuntime>,
        context: &TriggerContext,
    ) -> Result<ActivationHandle> {
        let mut variables = context.bindings();
        self.activate(runtime, context, &mut variables, self.default_mode)
    }

    /// Start one activation.
    ///
    /// `Sync` runs to completion before returning, on the main thread,
    /// against `variables` itself. `Async` queues the run on a worker
    /// against a snapshot of `variables`, which are left untouched.
    ///
    /// Fails only when the runtime no longer accepts work; the script's own
    /// outcome is reported through the handle.
    pub fn activate(
        self: &Arc<Self>,
        runtime: &Arc<TriggerRuntime>,
        context: &TriggerContext,
        variables: &mut Variables,
        mode: ExecutionMode,
    ) -> Result<ActivationHandle> {
        runtime.ensure_accepting()?;

        if let Some(actor) = context.actor() {
            if self.cooldowns.is_cooling_down(&actor.id) {
                log::debug!("Trigger '{}' cooling down for {}", self.name, actor.id);
                return Ok(ActivationHandle::skipped());
            }
        }

        let state = Arc::new(Mutex::new(ActivationState::Created));

        match mode {
            ExecutionMode::Sync if runtime.main_thread().is_main_thread() => {
                let result = self.run(runtime, context, variables, mode, &state);
                Ok(ActivationHandle::ready(state, result))
            }
            ExecutionMode::Sync => {
                let trigger = self.clone();
                let job_runtime = runtime.clone();
                let job_context = context.clone();
                let job_state = state.clone();
                let mut live = mem::take(variables);

                let bridged = runtime.main_thread().call(move || {
                    let result = trigger.run(&job_runtime, &job_context, &mut live, mode, &job_state);
                    (result, live)
                });

                let result = match bridged {
                    Ok((result, live)) => {
                        *variables = live;
                        result
                    }
                    Err(e) => {
                        log::error!("Trigger '{}' could not reach the main thread: {}", self.name, e);
                        *state.lock() = ActivationState::Error;
                        Err(e)
                    }
                };
                Ok(ActivationHandle::ready(state, result))
            }
            ExecutionMode::Async => {
                let trigger = self.clone();
                let job_runtime = runtime.clone();
                let job_context = context.clone();
                let job_state = state.clone();
                let mut snapshot = variables.clone();
                let (reply, receiver) = mpsc::sync_channel(1);

                runtime.workers().execute(move || {
                    let result =
                        trigger.run(&job_runtime, &job_context, &mut snapshot, mode, &job_state);
                    if let Err(e) = &result {
                        log::error!("Async activation of trigger '{}' failed: {}", trigger.name, e);
                    }
                    // Fire-and-forget callers drop the handle
                    let _ = reply.send(result);
                })?;

                Ok(ActivationHandle {
                    state,
                    outcome: Outcome::Pending(receiver),
                })
            }
        }
    }

    /// Interpret the script on the current thread
    fn run(
        self: &Arc<Self>,
        runtime: &Arc<TriggerRuntime>,
        context: &TriggerContext,
        variables: &mut Variables,
        mode: ExecutionMode,
        state: &Mutex<ActivationState>,
    ) -> Result<ActivationState> {
        let max_depth = runtime.config().execution.max_call_depth;
        let depth = CALL_DEPTH.with(|d| d.get());
        if depth >= max_depth {
            *state.lock() = ActivationState::Error;
            return Err(TriggerError::runtime(format!(
                "trigger '{}' exceeded the maximum call depth of {}",
                self.name, max_depth
            )));
        }

        *state.lock() = ActivationState::Running;
        log::debug!("Activating trigger '{}' ({:?})", self.name, mode);

        let reserved = ReservedCommands::new(self.clone(), runtime.clone());
        let limits = ExecutionLimits::new(
            runtime.config().execution.activation_timeout(),
            context.token().clone(),
        );
        let interpreter = Interpreter::new(
            ExecutionScope::new(context, mode, runtime.main_thread()),
            runtime.executors(),
            runtime.placeholders(),
        )
        .with_interrupter(&reserved)
        .with_limits(limits);

        let mut env = Environment::new(mem::take(variables), runtime.globals().clone());

        let result = {
            let _depth = DepthGuard::enter(depth);
            interpreter.run(&self.script, &mut env)
        };

        *variables = env.into_locals();

        let outcome = match result {
            Ok(Completion::Completed) => Ok(ActivationState::Completed),
            Ok(completion) => {
                log::debug!("Trigger '{}' stopped early: {:?}", self.name, completion);
                Ok(ActivationState::Cancelled)
            }
            Err(e) => Err(e),
        };

        *state.lock() = match &outcome {
            Ok(state) => *state,
            Err(_) => ActivationState::Error,
        };
        outcome
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("name", &self.name)
            .field("default_mode", &self.default_mode)
            .finish()
    }
}
