//! End-to-end trigger activation through a runtime with a dedicated main thread

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use trigger_engine::{
    ActivationState, Actor, CancellationToken, EngineConfig, ExecutionMode, HostHandle,
    SimpleEvent, Trigger, TriggerContext, TriggerError, TriggerRuntime, Value, Variables,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup(config: EngineConfig) -> (Arc<TriggerRuntime>, Arc<Mutex<Vec<String>>>) {
    init_logging();
    let runtime = TriggerRuntime::new(config.with_worker_threads(2)).unwrap();

    // #WHERE records the thread each call ran on
    let threads = Arc::new(Mutex::new(Vec::new()));
    let seen = threads.clone();
    runtime.executors().register_fn("WHERE", move |_, _| {
        let name = std::thread::current().name().unwrap_or("unnamed").to_string();
        seen.lock().push(name);
        Ok(())
    });
    (runtime, threads)
}

fn context(event: SimpleEvent) -> TriggerContext {
    TriggerContext::new(Arc::new(event)).with_actor(Actor::new("uuid-1"))
}

fn activate(
    runtime: &Arc<TriggerRuntime>,
    trigger: &Arc<Trigger>,
    ctx: &TriggerContext,
    vars: &mut Variables,
    mode: ExecutionMode,
) -> Result<ActivationState, TriggerError> {
    trigger.activate(runtime, ctx, vars, mode)?.wait()
}

#[derive(Debug, Default)]
struct Inventory {
    items: Mutex<Vec<String>>,
}

#[test]
fn test_sync_call_shares_variables_async_call_does_not() {
    let (runtime, _) = setup(EngineConfig::default());
    runtime.named().register(Trigger::parse("inc", "n = n + 1").unwrap());

    let caller = Arc::new(
        Trigger::parse(
            "caller",
            r#"
            n = 1
            #CALL("inc")
            after_sync = n
            #CALL("inc", false)
            after_async = n
            "#,
        )
        .unwrap(),
    );

    let mut vars = Variables::new();
    let state = activate(&runtime, &caller, &context(SimpleEvent::new("click")), &mut vars, ExecutionMode::Sync).unwrap();
    assert_eq!(state, ActivationState::Completed);
    assert_eq!(vars.get("after_sync"), Some(&Value::Int(2)));
    assert_eq!(vars.get("after_async"), Some(&Value::Int(2)));
}

#[test]
fn test_activation_threads() {
    let (runtime, threads) = setup(EngineConfig::default());
    let trigger = Arc::new(Trigger::parse("t", "#WHERE").unwrap());
    let ctx = context(SimpleEvent::new("click"));

    activate(&runtime, &trigger, &ctx, &mut Variables::new(), ExecutionMode::Sync).unwrap();
    activate(&runtime, &trigger, &ctx, &mut Variables::new(), ExecutionMode::Async).unwrap();

    let threads = threads.lock();
    assert_eq!(threads[0], "trigger-main");
    assert!(threads[1].starts_with("trigger-worker-"), "ran on {}", threads[1]);
}

#[test]
fn test_async_trigger_calls_sync_on_main_thread() {
    let (runtime, threads) = setup(EngineConfig::default());
    runtime
        .named()
        .register(Trigger::parse("mark", "global.marked = true\n#WHERE").unwrap());
    let caller = Arc::new(Trigger::parse("caller", "#WHERE; #CALL(\"mark\", true)").unwrap());

    let state = activate(
        &runtime,
        &caller,
        &context(SimpleEvent::new("tick")),
        &mut Variables::new(),
        ExecutionMode::Async,
    )
    .unwrap();
    assert_eq!(state, ActivationState::Completed);
    assert_eq!(runtime.globals().get("marked"), Some(Value::Bool(true)));

    let threads = threads.lock();
    assert!(threads[0].starts_with("trigger-worker-"));
    assert_eq!(threads[1], "trigger-main");
}

#[test]
fn test_cancel_event_depends_on_mode() {
    let (runtime, _) = setup(EngineConfig::default());
    let trigger = Arc::new(Trigger::parse("guard", "IF amount > 10 { #CANCELEVENT }").unwrap());
    let mut vars = Variables::new();
    vars.insert("amount".into(), Value::Int(50));

    let ctx = context(SimpleEvent::new_cancellable("purchase"));
    activate(&runtime, &trigger, &ctx, &mut vars.clone(), ExecutionMode::Sync).unwrap();
    assert!(ctx.event().cancellable().unwrap().is_cancelled());

    let ctx = context(SimpleEvent::new_cancellable("purchase"));
    let err = activate(&runtime, &trigger, &ctx, &mut vars, ExecutionMode::Async).unwrap_err();
    assert!(err.to_string().contains("CANCELEVENT is illegal in async mode!"));
    assert!(!ctx.event().cancellable().unwrap().is_cancelled());
}

#[test]
fn test_cooldown_gates_next_activation() {
    let (runtime, threads) = setup(EngineConfig::default());
    let trigger = Arc::new(Trigger::parse("reward", "#WHERE; #COOLDOWN(2); left = %cooldown%").unwrap());
    let ctx = context(SimpleEvent::new("click"));

    let mut vars = Variables::new();
    activate(&runtime, &trigger, &ctx, &mut vars, ExecutionMode::Sync).unwrap();
    let left = vars.get("left").and_then(Value::as_int).unwrap();
    assert!(left > 1900 && left <= 2000, "left = {}", left);

    let state = activate(&runtime, &trigger, &ctx, &mut Variables::new(), ExecutionMode::Sync).unwrap();
    assert_eq!(state, ActivationState::Cancelled);
    assert_eq!(threads.lock().len(), 1);
}

#[test]
fn test_unknown_command_fails_unknown_placeholder_is_null() {
    let (runtime, _) = setup(EngineConfig::default());
    let ctx = context(SimpleEvent::new("click"));

    let trigger = Arc::new(Trigger::parse("t", "x = %doesnotexist%; y = x == null").unwrap());
    let mut vars = Variables::new();
    activate(&runtime, &trigger, &ctx, &mut vars, ExecutionMode::Sync).unwrap();
    assert_eq!(vars.get("y"), Some(&Value::Bool(true)));

    let trigger = Arc::new(Trigger::parse("t", "#DOESNOTEXIST").unwrap());
    let err = activate(&runtime, &trigger, &ctx, &mut Variables::new(), ExecutionMode::Sync).unwrap_err();
    assert!(matches!(err, TriggerError::UnknownCommand(ref name) if name == "DOESNOTEXIST"));
}

#[test]
fn test_expression_semantics() {
    let (runtime, _) = setup(EngineConfig::default());
    let trigger = Arc::new(Trigger::parse("t", r#"a = 1 + 2 * 3; b = "a" + 1; c = 7 % 4"#).unwrap());
    let mut vars = Variables::new();
    activate(&runtime, &trigger, &context(SimpleEvent::new("e")), &mut vars, ExecutionMode::Sync).unwrap();
    assert_eq!(vars.get("a"), Some(&Value::Int(7)));
    assert_eq!(vars.get("b"), Some(&Value::from("a1")));
    assert_eq!(vars.get("c"), Some(&Value::Int(3)));
}

#[test]
fn test_async_snapshot_shares_host_objects() {
    let (runtime, _) = setup(EngineConfig::default());
    runtime.executors().register_fn("GIVE", |_, args: &[Value]| {
        let inventory = args
            .first()
            .and_then(Value::as_handle)
            .and_then(|h| h.downcast_ref::<Inventory>())
            .ok_or_else(|| TriggerError::runtime("GIVE needs a player"))?;
        inventory.items.lock().push(args.get(1).map(|v| v.to_string()).unwrap_or_default());
        Ok(())
    });

    let handle = HostHandle::new(Inventory::default());
    let ctx = TriggerContext::new(Arc::new(SimpleEvent::new("join")))
        .with_actor(Actor::new("uuid-1").with_handle(handle.clone()));
    let trigger = Arc::new(
        Trigger::parse("gift", "#GIVE(player, \"apple\")")
            .unwrap()
            .with_default_mode(ExecutionMode::Async),
    );

    let state = trigger.fire(&runtime, &ctx).unwrap().wait().unwrap();
    assert_eq!(state, ActivationState::Completed);
    let inventory = handle.downcast_ref::<Inventory>().unwrap();
    assert_eq!(*inventory.items.lock(), vec!["apple".to_string()]);
}

#[test]
fn test_deadline_and_cancellation_token() {
    let (runtime, _) = setup(EngineConfig::default().with_activation_timeout(Duration::from_millis(50)));
    let spin = Arc::new(Trigger::parse("spin", "WHILE true { x = 1 }").unwrap());

    let err = activate(&runtime, &spin, &context(SimpleEvent::new("e")), &mut Variables::new(), ExecutionMode::Async).unwrap_err();
    assert!(matches!(err, TriggerError::DeadlineExceeded(_)));

    let token = CancellationToken::new();
    token.cancel();
    let ctx = context(SimpleEvent::new("e")).with_token(token);
    let state = activate(&runtime, &spin, &ctx, &mut Variables::new(), ExecutionMode::Sync).unwrap();
    assert_eq!(state, ActivationState::Cancelled);
}

#[test]
fn test_sync_call_cycle_hits_depth_limit() {
    let mut config = EngineConfig::default();
    config.execution.max_call_depth = 8;
    let (runtime, _) = setup(config);
    runtime.named().register(Trigger::parse("loop", "#CALL(\"loop\")").unwrap());
    let err = runtime
        .call("loop", &context(SimpleEvent::new("e")), &mut Variables::new(), ExecutionMode::Sync)
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(err.to_string().contains("maximum call depth"));
}

#[test]
fn test_globals_persist_across_runtimes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("var.json");
    let bump = "global.visits = global.visits == null ? 1 : global.visits + 1";

    for expected in 1..=2 {
        let (runtime, _) = setup(EngineConfig::default().with_globals_path(&path));
        let trigger = Arc::new(runtime.parse_trigger("bump", bump).unwrap());
        trigger.fire(&runtime, &context(SimpleEvent::new("e"))).unwrap().wait().unwrap();
        assert_eq!(runtime.globals().get("visits"), Some(Value::Int(expected)));
        runtime.shutdown();
    }
}

#[test]
fn test_shutdown_rejects_activations() {
    let (runtime, _) = setup(EngineConfig::default());
    let trigger = Arc::new(Trigger::parse("t", "x = 1").unwrap());
    runtime.shutdown();
    let err = trigger
        .activate(&runtime, &context(SimpleEvent::new("e")), &mut Variables::new(), ExecutionMode::Async)
        .unwrap_err();
    assert!(matches!(err, TriggerError::ShuttingDown));
}

#[test]
fn test_host_panics_do_not_exhaust_call_depth() {
    let (runtime, _) = setup(EngineConfig::default());
    runtime.executors().register_fn("EXPLODE", |_, _| panic!("boom"));
    let explode = Arc::new(Trigger::parse("explode", "#EXPLODE").unwrap());
    let ctx = context(SimpleEvent::new("e"));

    for _ in 0..=runtime.config().execution.max_call_depth {
        let err = activate(&runtime, &explode, &ctx, &mut Variables::new(), ExecutionMode::Sync).unwrap_err();
        assert!(matches!(err, TriggerError::HostBridge(ref message) if message.contains("boom")));
    }

    let trigger = Arc::new(Trigger::parse("t", "x = 5").unwrap());
    let mut vars = Variables::new();
    let state = activate(&runtime, &trigger, &ctx, &mut vars, ExecutionMode::Sync).unwrap();
    assert_eq!(state, ActivationState::Completed);
    assert_eq!(vars.get("x"), Some(&Value::Int(5)));
}
