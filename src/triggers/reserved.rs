//! Reserved commands: `#CALL`, `#CANCELEVENT`, `#COOLDOWN` and `%cooldown%`
//!
//! Installed as the interrupter of every trigger activation. The host hook
//! carried by the context (if any) sees every node, command and placeholder
//! first and may override the reserved names too.

use std::sync::Arc;
use std::time::Duration;

use super::cooldown::MAX_COOLDOWN;
use super::runtime::TriggerRuntime;
use super::trigger::Trigger;
use crate::core::ExecutionMode;
use crate::error::{Result, TriggerError};
use crate::interpreter::{ExecutionScope, Interrupter};
use crate::script::{Node, Value, Variables};

pub struct ReservedCommands {
    trigger: Arc<Trigger>,
    runtime: Arc<TriggerRuntime>,
}

impl ReservedCommands {
    pub fn new(trigger: Arc<Trigger>, runtime: Arc<TriggerRuntime>) -> Self {
        Self { trigger, runtime }
    }

    /// `#CALL "name"` or `#CALL "name", sync`
    fn call(&self, scope: &ExecutionScope<'_>, variables: &mut Variables, args: &[Value]) -> Result<()> {
        let name = match args.first() {
            Some(Value::String(name)) => name,
            Some(_) => {
                return Err(TriggerError::runtime(
                    "CALL: parameter type not match; the trigger name must be a String",
                ))
            }
            None => return Err(TriggerError::runtime("CALL: need parameter [String] or [String, boolean]")),
        };

        let mode = match args.get(1) {
            None => ExecutionMode::Sync,
            Some(Value::Bool(sync)) => ExecutionMode::from_sync_flag(*sync),
            Some(other) => {
                return Err(TriggerError::runtime(format!(
                    "CALL: sync flag must be a boolean, got {}",
                    other.type_name()
                )))
            }
        };

        let callee = self
            .runtime
            .named()
            .get(name)
            .ok_or_else(|| TriggerError::TriggerNotFound(name.clone()))?;

        log::debug!("Trigger '{}' calls '{}' ({:?})", self.trigger.name(), name, mode);

        let handle = callee.activate(&self.runtime, scope.context(), variables, mode)?;
        if mode.is_sync() {
            handle.wait()?;
        }
        Ok(())
    }

    fn cancel_event(&self, scope: &ExecutionScope<'_>) -> Result<()> {
        if !scope.is_sync() {
            return Err(TriggerError::runtime("CANCELEVENT is illegal in async mode!"));
        }

        let event = scope.context().event();
        match event.cancellable() {
            Some(cancellable) => {
                cancellable.set_cancelled(true);
                Ok(())
            }
            None => Err(TriggerError::runtime(format!(
                "{} is not a Cancellable event!",
                event.name()
            ))),
        }
    }

    /// `#COOLDOWN seconds`; silently ignored without an actor
    fn cooldown(&self, scope: &ExecutionScope<'_>, args: &[Value]) -> Result<()> {
        let seconds = match args.first() {
            Some(value) if value.is_number() => value.as_float().unwrap_or_default(),
            _ => return Err(TriggerError::runtime("COOLDOWN: parameter must be a number of seconds")),
        };

        // negative and NaN mean no cooldown, anything too large is capped
        let duration = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(MAX_COOLDOWN);

        if let Some(actor) = scope.context().actor() {
            self.trigger.cooldowns().start(&actor.id, duration);
        }
        Ok(())
    }

    fn cooldown_remaining(&self, scope: &ExecutionScope<'_>) -> Value {
        let millis = scope
            .context()
            .actor()
            .map(|actor| self.trigger.cooldowns().remaining(&actor.id).as_millis())
            .unwrap_or(0);
        Value::Int(i64::try_from(millis).unwrap_or(i64::MAX))
    }
}

impl Interrupter for ReservedCommands {
    fn on_node_process(&self, scope: &ExecutionScope<'_>, node: Node<'_>) -> bool {
        scope
            .context()
            .interrupter()
            .is_some_and(|hook| hook.on_node_process(scope, node))
    }

    fn on_command(
        &self,
        scope: &ExecutionScope<'_>,
        variables: &mut Variables,
        name: &str,
        args: &[Value],
    ) -> Result<bool> {
        if let Some(hook) = scope.context().interrupter() {
            if hook.on_command(scope, variables, name, args)? {
                return Ok(true);
            }
        }

        match name.to_uppercase().as_str() {
            "CALL" => self.call(scope, variables, args)?,
            "CANCELEVENT" => self.cancel_event(scope)?,
            "COOLDOWN" => self.cooldown(scope, args)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn on_placeholder(
        &self,
        scope: &ExecutionScope<'_>,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Value>> {
        if let Some(hook) = scope.context().interrupter() {
            if let Some(value) = hook.on_placeholder(scope, name, args)? {
                return Ok(Some(value));
            }
        }

        if name.eq_ignore_ascii_case("cooldown") {
            return Ok(Some(self.cooldown_remaining(scope)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::{Actor, SimpleEvent, TriggerContext};
    use crate::triggers::ActivationState;

    fn setup() -> Arc<TriggerRuntime> {
        TriggerRuntime::builder(EngineConfig::default())
            .attach_current_thread()
            .build()
            .unwrap()
    }

    fn run(runtime: &Arc<TriggerRuntime>, ctx: &TriggerContext, source: &str) -> Result<Variables> {
        let trigger = Arc::new(Trigger::parse("test", source)?);
        let mut vars = Variables::new();
        trigger
            .activate(runtime, ctx, &mut vars, ExecutionMode::Sync)?
            .wait()?;
        Ok(vars)
    }

    fn ctx() -> TriggerContext {
        TriggerContext::new(Arc::new(SimpleEvent::new_cancellable("click")))
            .with_actor(Actor::new("uuid-1"))
    }

    #[test]
    fn test_call_argument_checks() {
        let runtime = setup();
        let err = run(&runtime, &ctx(), "#CALL(1)").unwrap_err();
        assert!(err.to_string().contains("parameter type not match"));

        let err = run(&runtime, &ctx(), "#CALL").unwrap_err();
        assert!(err.to_string().contains("need parameter"));

        let err = run(&runtime, &ctx(), "#CALL(\"missing\")").unwrap_err();
        assert!(matches!(err, TriggerError::TriggerNotFound(ref n) if n == "missing"));

        runtime.named().register(Trigger::parse("noop", "").unwrap());
        let err = run(&runtime, &ctx(), "#CALL(\"noop\", 1)").unwrap_err();
        assert!(err.to_string().contains("boolean"));
        run(&runtime, &ctx(), "#CALL(\"noop\")").unwrap();
    }

    #[test]
    fn test_callee_errors_propagate_to_caller() {
        let runtime = setup();
        runtime.named().register(Trigger::parse("bad", "x = 1 / 0").unwrap());
        let err = run(&runtime, &ctx(), "#CALL(\"bad\", true)").unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_cancel_event() {
        let runtime = setup();
        let ctx = ctx();
        run(&runtime, &ctx, "#CANCELEVENT").unwrap();
        assert!(ctx.event().cancellable().unwrap().is_cancelled());

        let plain = TriggerContext::new(Arc::new(SimpleEvent::new("join")));
        let err = run(&runtime, &plain, "#CANCELEVENT()").unwrap_err();
        assert!(err.to_string().contains("join is not a Cancellable event!"));
    }

    #[test]
    fn test_cancel_event_rejected_async() {
        let runtime = setup();
        let trigger = Arc::new(Trigger::parse("t", "#CANCELEVENT").unwrap());
        let ctx = ctx();
        let err = trigger
            .activate(&runtime, &ctx, &mut Variables::new(), ExecutionMode::Async)
            .unwrap()
            .wait()
            .unwrap_err();
        assert!(err.to_string().contains("CANCELEVENT is illegal in async mode!"));
        assert!(!ctx.event().cancellable().unwrap().is_cancelled());
    }

    #[test]
    fn test_cooldown_and_remaining() {
        let runtime = setup();
        let vars = run(&runtime, &ctx(), "#COOLDOWN(2); left = %cooldown%").unwrap();
        let left = vars.get("left").and_then(Value::as_int).unwrap();
        assert!(left > 1900 && left <= 2000, "left = {}", left);

        let vars = run(&runtime, &ctx(), "#COOLDOWN(0); left = %cooldown%").unwrap();
        assert_eq!(vars.get("left"), Some(&Value::Int(0)));

        let err = run(&runtime, &ctx(), "#COOLDOWN(\"2\")").unwrap_err();
        assert!(err.to_string().contains("number"));

        let vars = run(&runtime, &ctx(), "#COOLDOWN(-1); left = %cooldown%").unwrap();
        assert_eq!(vars.get("left"), Some(&Value::Int(0)));

        let vars = run(&runtime, &ctx(), "#COOLDOWN(10000000000000000000.0); left = %cooldown%").unwrap();
        let left = vars.get("left").and_then(Value::as_int).unwrap();
        assert!(left > 365 * 24 * 60 * 60 * 1000, "left = {}", left);
    }

    #[test]
    fn test_cooldown_without_actor_is_noop() {
        let runtime = setup();
        let anonymous = TriggerContext::new(Arc::new(SimpleEvent::new("tick")));
        let vars = run(&runtime, &anonymous, "#COOLDOWN(5); left = %cooldown%").unwrap();
        assert_eq!(vars.get("left"), Some(&Value::Int(0)));
    }

    struct HostHook;

    impl Interrupter for HostHook {
        fn on_command(
            &self,
            _scope: &ExecutionScope<'_>,
            variables: &mut Variables,
            name: &str,
            _args: &[Value],
        ) -> Result<bool> {
            if name == "COOLDOWN" {
                variables.insert("hooked".into(), Value::Bool(true));
                return Ok(true);
            }
            Ok(false)
        }
    }

    #[test]
    fn test_host_hook_overrides_reserved() {
        let runtime = setup();
        let ctx = ctx().with_interrupter(Arc::new(HostHook));
        let trigger = Arc::new(Trigger::parse("t", "#COOLDOWN(10)").unwrap());
        let mut vars = Variables::new();
        let state = trigger
            .activate(&runtime, &ctx, &mut vars, ExecutionMode::Sync)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(state, ActivationState::Completed);
        assert_eq!(vars.get("hooked"), Some(&Value::Bool(true)));
        assert!(trigger.cooldowns().is_empty());
    }
}
