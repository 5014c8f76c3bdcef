use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use tck_core::lifecycle::{EventKind, FnListener, LifecycleEvent};
use tck_core::{Dispatcher, HarnessConfig, HarnessError, Registry, SuiteOverrides, TestSuite, TypeTag};

const BASE: TypeTag = TypeTag::new("QueueTestBase");
const TASKS: TypeTag = TypeTag::new("TasksTest");
const SIBLING: TypeTag = TypeTag::new("PullTest");

fn hierarchy_dispatcher() -> Dispatcher {
    let mut d = Dispatcher::new();
    d.declare_type(BASE, TypeTag::root()).expect("base");
    d.declare_type(TASKS, BASE).expect("tasks");
    d.declare_type(SIBLING, BASE).expect("sibling");
    d
}

fn suite(d: Dispatcher, owner: TypeTag) -> TestSuite {
    TestSuite::new(owner, Arc::new(d), HarnessConfig::with_resources("resources"))
}

#[test]
fn most_specific_registration_wins_and_siblings_fall_through() {
    let mut reg: Registry<&str, &str> = Registry::new();
    reg.declare_type(BASE, TypeTag::root()).expect("base");
    reg.declare_type(TASKS, BASE).expect("tasks");
    reg.declare_type(SIBLING, BASE).expect("sibling");
    reg.register(BASE, "k", "base");
    reg.register(TASKS, "k", "tasks");

    assert_eq!(reg.resolve(&TASKS, &"k"), Some(&"tasks"));
    assert_eq!(reg.resolve(&SIBLING, &"k"), Some(&"base"));
    assert_eq!(reg.resolve(&TypeTag::new("Unrelated"), &"k"), None);
    assert_eq!(reg.resolve(&TASKS, &"other"), None);

    // Mismo tipo: gana el último registrado.
    reg.register(TASKS, "k", "tasks-late");
    assert_eq!(reg.resolve(&TASKS, &"k"), Some(&"tasks-late"));
    assert_eq!(reg.resolve_all(&TASKS, &"k"), vec![&"base", &"tasks", &"tasks-late"]);
}

#[test]
fn cycles_and_reparenting_are_configuration_errors() {
    let mut d = hierarchy_dispatcher();
    assert!(d.declare_type(BASE, TASKS).expect_err("cycle").is_configuration());
    assert!(d.declare_type(TASKS, SIBLING).expect_err("reparent").is_configuration());
    // Repetir la misma arista es inocuo.
    d.declare_type(TASKS, BASE).expect("idempotent");
    assert!(d.hierarchy().is_subtype_of(&TASKS, &TypeTag::root()));
}

#[test]
fn property_defaults_to_required() {
    let s = suite(Dispatcher::new(), TASKS);
    let prop = s.property("tck.queue").expect("property");
    assert_eq!(prop.required(), None);
    assert!(prop.is_required());
    assert!(s.required("tck.queue").expect("required"));
}

#[test]
fn property_answer_from_specific_listener_overrides_base() {
    let mut d = hierarchy_dispatcher();
    d.on_property(BASE, "base", |ev| {
         ev.set_required(true);
         ev.set_value("base");
         Ok(())
     });
    d.on_property(TASKS, "tasks", |ev| {
         if ev.name() == "eta" {
             ev.set_required(false);
         }
         Ok(())
     });
    let tasks = suite(d, TASKS);
    let prop = tasks.property("eta").expect("eta");
    assert_eq!(prop.required(), Some(false));
    assert_eq!(prop.value(), Some("base"));
    assert!(tasks.required("other").expect("other"));
}

#[test]
fn execution_accessors_keep_or_collapse_unknown() {
    let mut d = Dispatcher::new();
    d.on_execution(TASKS, "skip-pull", |ev| {
         if ev.context() == "pull" {
             ev.set_execute(false);
         }
         if ev.context() == "push" {
             ev.set_execute(true);
         }
         Ok(())
     });
    let s = suite(d, TASKS);

    assert_eq!(s.execute_raw("eta").expect("raw"), None);
    assert!(s.execution("eta").expect("resolved"));
    assert!(!s.execute("eta").expect("convenience"));
    assert!(s.do_ignore("eta").expect("ignore"));

    assert_eq!(s.execute_raw("pull").expect("raw"), Some(false));
    assert!(!s.execution("pull").expect("resolved"));
    assert!(!s.execute("pull").expect("convenience"));

    assert!(s.execute("push").expect("push"));
    assert!(!s.do_ignore("push").expect("push"));
}

#[derive(Debug, PartialEq)]
struct QueueName(String);

#[test]
fn instances_resolve_by_type_or_fail_as_configuration() {
    let mut d = hierarchy_dispatcher();
    d.provide_instance::<QueueName, _>(BASE, "queue", |owner| Ok(QueueName(format!("{owner}-queue"))));
    let s = suite(d, TASKS);

    assert_eq!(s.instance::<QueueName>().expect("instance"), QueueName("TasksTest-queue".into()));
    assert_eq!(s.try_instance::<u64>().expect("absent"), None);
    let err = s.instance::<u64>().expect_err("missing");
    assert!(matches!(err, HarnessError::MissingInstance { .. }));
}

#[test]
fn wrong_instance_type_is_rejected() {
    let mut d = Dispatcher::new();
    d.register(TASKS,
               EventKind::Instance,
               FnListener::new("bogus", |ev: &mut LifecycleEvent<'_>| match ev {
                   LifecycleEvent::Instance(e) => e.provide(String::from("not a number")),
                   _ => Ok(()),
               }));
    let s = suite(d, TASKS);
    let err = s.instance::<u64>().expect_err("mismatch");
    assert!(matches!(err, HarnessError::InstanceTypeMismatch { .. }));
    assert!(err.is_configuration());
}

#[test]
fn listener_error_aborts_remaining_dispatch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut d = hierarchy_dispatcher();
    d.on_execution(BASE, "broken", |_| Err(HarnessError::config("provider misconfigured")));
    let seen = Arc::clone(&calls);
    d.on_execution(TASKS, "counter", move |_| {
         seen.fetch_add(1, Ordering::SeqCst);
         Ok(())
     });
    let s = suite(d, TASKS);
    assert!(s.execute_raw("any").is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn suite_overrides_answer_reserved_keys() {
    let mut values = IndexMap::new();
    values.insert("TCK_REQUIRED_TASK_ETA".to_string(), "false".to_string());
    values.insert("TCK_EXECUTE_PULL_QUEUE".to_string(), "FALSE".to_string());
    values.insert("tck.queue".to_string(), "tasks-queue".to_string());
    let d = Dispatcher::with_providers(&[&SuiteOverrides::new(values)]).expect("providers");
    let s = suite(d, TASKS);

    assert!(!s.required("task.eta").expect("eta"));
    assert_eq!(s.execute_raw("pull-queue").expect("pull"), Some(false));
    assert_eq!(s.property("tck.queue").expect("queue").value(), Some("tasks-queue"));
    assert!(s.required("tck.queue").expect("queue"));
}

#[test]
fn malformed_override_is_a_configuration_error() {
    let mut values = IndexMap::new();
    values.insert("TCK_EXECUTE_PUSH".to_string(), "maybe".to_string());
    let d = Dispatcher::with_providers(&[&SuiteOverrides::new(values)]).expect("providers");
    let s = suite(d, TASKS);
    assert!(s.execute_raw("push").expect_err("bad bool").is_configuration());
}
