//! Tree-walking interpreter for trigger scripts
//!
//! The interpreter holds no per-node state, so any number of activations may
//! walk the same [`Script`] at once. Everything mutable lives in the
//! [`Environment`] owned by one activation.
//!
//! Before each statement and expression the interpreter checks, in order:
//! the cancellation token, the deadline, then the interrupter's veto.

mod environment;
mod interrupter;
mod limits;
mod registry;

pub use environment::{Environment, GlobalStore, MemoryStore};
pub use interrupter::{Interrupter, NoInterrupter};
pub use limits::{CancellationToken, ExecutionLimits};
pub use registry::{Executor, ExecutorRegistry, Placeholder, PlaceholderRegistry};

use crate::core::{ExecutionMode, MainThread, TriggerContext};
use crate::error::{Result, TriggerError};
use crate::script::*;

/// Outcome of executing one statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    None,
    Continue,
    Break,
    Return,
}

/// Reason an activation stopped early
#[derive(Debug)]
pub enum Halt {
    /// The interrupter vetoed a node
    Vetoed,
    /// The cancellation token was set
    Cancelled,
    Failed(TriggerError),
}

impl From<TriggerError> for Halt {
    fn from(err: TriggerError) -> Self {
        Halt::Failed(err)
    }
}

/// How a whole script run ended, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Completed,
    Vetoed,
    Cancelled,
}

/// What executors, placeholders and the interrupter see of a running
/// activation
pub struct ExecutionScope<'a> {
    context: &'a TriggerContext,
    mode: ExecutionMode,
    bridge: &'a MainThread,
}

impl<'a> ExecutionScope<'a> {
    pub fn new(context: &'a TriggerContext, mode: ExecutionMode, bridge: &'a MainThread) -> Self {
        Self {
            context,
            mode,
            bridge,
        }
    }

    pub fn context(&self) -> &'a TriggerContext {
        self.context
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn is_sync(&self) -> bool {
        self.mode.is_sync()
    }

    pub fn bridge(&self) -> &'a MainThread {
        self.bridge
    }

    /// Run `f` on the mutation thread, inline when already there
    pub fn call_sync<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.bridge.call(f)
    }
}

/// Trigger script interpreter
pub struct Interpreter<'a> {
    scope: ExecutionScope<'a>,
    executors: &'a ExecutorRegistry,
    placeholders: &'a PlaceholderRegistry,
    interrupter: &'a dyn Interrupter,
    limits: ExecutionLimits,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        scope: ExecutionScope<'a>,
        executors: &'a ExecutorRegistry,
        placeholders: &'a PlaceholderRegistry,
    ) -> Self {
        Self {
            scope,
            executors,
            placeholders,
            interrupter: &NoInterrupter,
            limits: ExecutionLimits::unbounded(),
        }
    }

    pub fn with_interrupter(mut self, interrupter: &'a dyn Interrupter) -> Self {
        self.interrupter = interrupter;
        self
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn scope(&self) -> &ExecutionScope<'a> {
        &self.scope
    }

    /// Run a whole script. Veto and cancellation end the run cleanly;
    /// every other stop is an error.
    pub fn run(&self, script: &Script, env: &mut Environment) -> Result<Completion> {
        match self.execute_block(&script.statements, env) {
            Ok(_) => Ok(Completion::Completed),
            Err(Halt::Vetoed) => Ok(Completion::Vetoed),
            Err(Halt::Cancelled) => Ok(Completion::Cancelled),
            Err(Halt::Failed(err)) => Err(err),
        }
    }

    /// Execute a single statement
    pub fn execute(&self, stmt: &Statement, env: &mut Environment) -> std::result::Result<ControlSignal, Halt> {
        self.enter(Node::Statement(stmt))?;

        match &stmt.kind {
            StatementKind::Assignment { target, value } => {
                match target {
                    AssignTarget::Local(name) => {
                        let value = self.evaluate(value, env)?;
                        env.set(name, value);
                    }
                    AssignTarget::Global(name) => {
                        let value = self.evaluate(value, env)?;
                        env.set_global(name, value)?;
                    }
                    AssignTarget::GlobalIndex(key) => {
                        let key = self.global_key(key, env)?;
                        let value = self.evaluate(value, env)?;
                        env.set_global(&key, value)?;
                    }
                }
                Ok(ControlSignal::None)
            }

            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.execute_block(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.execute_block(else_branch, env)
                } else {
                    Ok(ControlSignal::None)
                }
            }

            StatementKind::While { condition, body } => {
                while self.evaluate(condition, env)?.is_truthy() {
                    match self.execute_block(body, env)? {
                        ControlSignal::Break => break,
                        ControlSignal::Return => return Ok(ControlSignal::Return),
                        ControlSignal::Continue | ControlSignal::None => {}
                    }
                }
                Ok(ControlSignal::None)
            }

            StatementKind::For {
                variable,
                start,
                end,
                body,
            } => {
                let start = self.loop_bound(start, env)?;
                let end = self.loop_bound(end, env)?;

                let mut i = start;
                while i < end {
                    env.set(variable, Value::Int(i));
                    match self.execute_block(body, env)? {
                        ControlSignal::Break => break,
                        ControlSignal::Return => return Ok(ControlSignal::Return),
                        ControlSignal::Continue | ControlSignal::None => {}
                    }
                    i += 1;
                }
                Ok(ControlSignal::None)
            }

            StatementKind::Block(statements) => self.execute_block(statements, env),

            StatementKind::Command { name, args } => {
                let args = self.evaluate_all(args, env)?;
                self.dispatch_command(name, &args, env)?;
                Ok(ControlSignal::None)
            }

            StatementKind::Break => Ok(ControlSignal::Break),
            StatementKind::Continue => Ok(ControlSignal::Continue),
            StatementKind::Return => Ok(ControlSignal::Return),

            StatementKind::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(ControlSignal::None)
            }
        }
    }

    /// Execute statements until one yields a control signal
    fn execute_block(
        &self,
        statements: &[Statement],
        env: &mut Environment,
    ) -> std::result::Result<ControlSignal, Halt> {
        for stmt in statements {
            let signal = self.execute(stmt, env)?;
            if signal != ControlSignal::None {
                return Ok(signal);
            }
        }
        Ok(ControlSignal::None)
    }

    /// Evaluate an expression
    pub fn evaluate(&self, expr: &Expression, env: &mut Environment) -> std::result::Result<Value, Halt> {
        self.enter(Node::Expression(expr))?;

        match &expr.kind {
            ExpressionKind::Literal(lit) => Ok(match lit {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::String(s) => Value::String(s.clone()),
            }),

            ExpressionKind::Variable(name) => Ok(env.get(name).unwrap_or_default()),

            ExpressionKind::Global(name) => Ok(env.get_global(name).unwrap_or_default()),

            ExpressionKind::GlobalIndex(key) => {
                let key = self.global_key(key, env)?;
                Ok(env.get_global(&key).unwrap_or_default())
            }

            ExpressionKind::Binary {
                left,
                op: BinaryOp::And,
                right,
            } => {
                if !self.evaluate(left, env)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.evaluate(right, env)?.is_truthy()))
            }

            ExpressionKind::Binary {
                left,
                op: BinaryOp::Or,
                right,
            } => {
                if self.evaluate(left, env)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.evaluate(right, env)?.is_truthy()))
            }

            ExpressionKind::Binary { left, op, right } => {
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                Ok(left.binary(*op, &right)?)
            }

            ExpressionKind::Unary { op, expr } => Ok(self.evaluate(expr, env)?.unary(*op)?),

            ExpressionKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.evaluate(then_expr, env)
                } else {
                    self.evaluate(else_expr, env)
                }
            }

            ExpressionKind::Placeholder { name, args } => {
                let args = self.evaluate_all(args, env)?;
                Ok(self.resolve_placeholder(name, &args)?)
            }
        }
    }

    fn evaluate_all(
        &self,
        exprs: &[Expression],
        env: &mut Environment,
    ) -> std::result::Result<Vec<Value>, Halt> {
        exprs.iter().map(|e| self.evaluate(e, env)).collect()
    }

    /// Interrupter first, then the executor registry
    fn dispatch_command(&self, name: &str, args: &[Value], env: &mut Environment) -> Result<()> {
        if self
            .interrupter
            .on_command(&self.scope, env.locals_mut(), name, args)?
        {
            return Ok(());
        }

        match self.executors.get(name) {
            Some(executor) => executor.execute(&self.scope, args),
            None => Err(TriggerError::UnknownCommand(name.to_uppercase())),
        }
    }

    /// Interrupter first, then the placeholder registry, then `Null`
    fn resolve_placeholder(&self, name: &str, args: &[Value]) -> Result<Value> {
        if let Some(value) = self.interrupter.on_placeholder(&self.scope, name, args)? {
            return Ok(value);
        }

        match self.placeholders.get(name) {
            Some(placeholder) => placeholder.evaluate(&self.scope, args),
            None => {
                log::trace!("Unresolved placeholder %{}%", name);
                Ok(Value::Null)
            }
        }
    }

    fn enter(&self, node: Node<'_>) -> std::result::Result<(), Halt> {
        self.limits.check()?;
        if self.interrupter.on_node_process(&self.scope, node) {
            let span = node.span();
            log::debug!("Node at {}:{} vetoed by interrupter", span.line, span.column);
            return Err(Halt::Vetoed);
        }
        Ok(())
    }

    fn global_key(&self, key: &Expression, env: &mut Environment) -> std::result::Result<String, Halt> {
        match self.evaluate(key, env)? {
            Value::String(s) => Ok(s),
            Value::Int(i) => Ok(i.to_string()),
            other => Err(TriggerError::runtime(format!(
                "global variable key must be a string, got {}",
                other.type_name()
            ))
            .into()),
        }
    }

    fn loop_bound(&self, expr: &Expression, env: &mut Environment) -> std::result::Result<i64, Halt> {
        let value = self.evaluate(expr, env)?;
        value.as_int().ok_or_else(|| {
            TriggerError::runtime(format!("FOR bound must be a number, got {}", value.type_name()))
                .into()
        })
    }
}
