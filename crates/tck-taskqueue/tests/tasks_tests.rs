use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tck_core::{AttemptTolerance, BuildMarker, InMemoryDatastore, PollPolicy, Poller, TempDataStore};
use tck_taskqueue::headers::{QUEUE_NAME, TASK_ETA, TASK_EXECUTION_COUNT, TASK_NAME, TASK_RETRY_COUNT};
use tck_taskqueue::support::{invocation_count_key, last_test_data, request_data_key, stored_request,
                             RecordingHandler, RetryTestHandler, RETRY_TEST_URL, TESTDATA_KEY_PARAM,
                             TIMES_TO_FAIL_PARAM};
use tck_taskqueue::{LocalQueueService, Method, Queue, QueueError, QueueMode, RetryOptions, TaskOptions};

const URL: &str = "/_ah/test";

struct Fixture {
    service: LocalQueueService,
    print: Arc<RecordingHandler>,
    default_handler: Arc<RecordingHandler>,
    test_handler: Arc<RecordingHandler>,
}

fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let service = LocalQueueService::new();
    service.declare("tasks-queue", QueueMode::Push);
    service.declare("test", QueueMode::Push);
    service.declare("pull-queue", QueueMode::Pull);

    let print = RecordingHandler::new();
    let default_handler = RecordingHandler::new();
    let test_handler = RecordingHandler::new();
    service.route_shared(URL, print.clone());
    service.route_shared(LocalQueueService::default_url("default"), default_handler.clone());
    service.route_shared(LocalQueueService::default_url("test"), test_handler.clone());
    Fixture { service,
              print,
              default_handler,
              test_handler }
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[test]
fn smoke() {
    let f = fixture();
    let queue = f.service.queue("tasks-queue").expect("queue");
    assert_eq!(queue.queue_name(), "tasks-queue");
    queue.add(TaskOptions::with_url(URL)).expect("add");
    f.service.join_workers();
    assert!(f.print.last_request().is_some());
}

#[test]
fn task_without_url_goes_to_queue_default_url() {
    let f = fixture();
    f.service.default_queue().expect("default").add(TaskOptions::with_method(Method::Post)).expect("add");
    f.service.join_workers();
    assert!(f.default_handler.was_invoked());

    f.service.queue("test").expect("test").add(TaskOptions::with_method(Method::Post)).expect("add");
    f.service.join_workers();
    assert!(f.test_handler.was_invoked());
}

#[test]
fn task_handle_carries_its_properties() {
    let f = fixture();
    let name = unique("handle-props");
    let handle = f.service
                  .default_queue()
                  .expect("default")
                  .add(TaskOptions::with_task_name(name.as_str()).payload("payload").eta_millis(0))
                  .expect("add");
    assert_eq!(handle.queue_name(), "default");
    assert_eq!(handle.name(), name);
    assert_eq!(handle.payload_str(), Some("payload"));
    assert_eq!(handle.eta_millis(), 0);
    assert_eq!(handle.retry_count(), 0);
    f.service.join_workers();
}

#[test]
fn task_name_is_generated_when_absent() {
    let f = fixture();
    let handle = f.service.default_queue().expect("default").add(TaskOptions::new()).expect("add");
    assert!(!handle.name().is_empty());
    f.service.join_workers();
}

#[test]
fn duplicate_task_names_are_rejected() {
    let f = fixture();
    let queue = f.service.default_queue().expect("default");
    let name = unique("dup");
    queue.add(TaskOptions::with_task_name(name.as_str())).expect("first");
    let err = queue.add(TaskOptions::with_task_name(name.as_str())).expect_err("second");
    assert!(matches!(err, QueueError::TaskAlreadyExists(_)));
    f.service.join_workers();
}

#[test]
fn request_headers_identify_queue_and_task() {
    let f = fixture();
    let name = unique("headers-1");
    f.service.default_queue().expect("default").add(TaskOptions::with_task_name(name.as_str())).expect("add");
    f.service.join_workers();
    let request = f.default_handler.last_request().expect("request");
    assert_eq!(request.header(QUEUE_NAME), Some("default"));
    assert_eq!(request.header(TASK_NAME), Some(name.as_str()));
    assert!(request.header(TASK_RETRY_COUNT).is_some());
    assert!(request.header(TASK_EXECUTION_COUNT).is_some());
    assert!(request.header(TASK_ETA).is_some());

    let name2 = unique("headers-2");
    f.service.queue("test").expect("test").add(TaskOptions::with_task_name(name2.as_str())).expect("add");
    f.service.join_workers();
    let request = f.test_handler.last_request().expect("request");
    assert_eq!(request.header(QUEUE_NAME), Some("test"));
    assert_eq!(request.header(TASK_NAME), Some(name2.as_str()));
}

#[test]
fn all_push_methods_are_delivered() {
    let f = fixture();
    let queue = f.service.queue("tasks-queue").expect("queue");
    for method in Method::PUSH_METHODS {
        f.print.reset();
        queue.add(TaskOptions::with_url(URL).method(method)).expect("add");
        f.service.join_workers();
        assert_eq!(f.print.last_request().expect("request").method, method.as_str());
    }
}

#[test]
fn payload_headers_and_params_reach_the_handler() {
    let f = fixture();
    let default = f.service.default_queue().expect("default");
    default.add(TaskOptions::with_payload("payload")).expect("add");
    f.service.join_workers();
    assert_eq!(f.default_handler.last_request().expect("request").body_str(), Some("payload"));

    default.add(TaskOptions::with_header("header_key", "header_value")).expect("add");
    f.service.join_workers();
    assert_eq!(f.default_handler.last_request().expect("request").header("header_key"),
               Some("header_value"));

    let queue = f.service.queue("tasks-queue").expect("queue");
    queue.add(TaskOptions::with_url(URL).param("single_value", "param_value")).expect("add");
    f.service.join_workers();
    assert_eq!(f.print.last_request().expect("request").param("single_value"), Some("param_value"));

    queue.add(TaskOptions::with_url(URL).param("multi_value", "param_value1")
                                        .param("multi_value", "param_value2"))
         .expect("add");
    f.service.join_workers();
    let request = f.print.last_request().expect("request");
    let values: HashSet<&str> = request.param_values("multi_value").into_iter().collect();
    assert_eq!(values, HashSet::from(["param_value1", "param_value2"]));
}

fn retry_fixture() -> (Fixture, Arc<TempDataStore<InMemoryDatastore>>) {
    let f = fixture();
    let store = Arc::new(TempDataStore::new(InMemoryDatastore::new(), BuildMarker::Stamped(42)));
    f.service.route(RETRY_TEST_URL, RetryTestHandler::new(Arc::clone(&store)));
    (f, store)
}

fn retry_poller() -> Poller {
    Poller::new(PollPolicy::attempts(100, Duration::from_millis(20)))
}

#[test]
fn failed_delivery_is_retried_with_increasing_counts() {
    let (f, store) = retry_fixture();
    let key = unique("testRetry");
    let times_to_fail = 1;
    f.service
     .default_queue()
     .expect("default")
     .add(TaskOptions::with_url(RETRY_TEST_URL).param(TESTDATA_KEY_PARAM, key.as_str())
                                               .param(TIMES_TO_FAIL_PARAM, times_to_fail.to_string())
                                               .retry_options(RetryOptions::with_task_retry_limit(5)))
     .expect("add");

    let poller = retry_poller();
    let count_key = invocation_count_key(&key);
    let expected = Some(times_to_fail + 1);
    let attempts = poller.wait_for_value(&expected, || last_test_data(&store, &count_key))
                         .expect("poll");
    assert_eq!(attempts, expected);

    let first = poller.wait_for_existence("first request", || stored_request(&store, &request_data_key(&key, 1)))
                      .expect("first");
    assert_eq!(first.header(TASK_RETRY_COUNT), Some("0"));
    assert_eq!(first.header(TASK_EXECUTION_COUNT), Some("0"));

    let second = poller.wait_for_existence("second request", || stored_request(&store, &request_data_key(&key, 2)))
                       .expect("second");
    assert_eq!(second.header(TASK_RETRY_COUNT), Some("1"));
    assert_eq!(second.header(TASK_EXECUTION_COUNT), Some("1"));
    f.service.join_workers();
}

#[test]
fn retry_limit_is_honored() {
    let (f, store) = retry_fixture();
    let key = unique("testRetryLimitIsHonored");
    let retry_limit = 2;
    f.service
     .default_queue()
     .expect("default")
     .add(TaskOptions::with_url(RETRY_TEST_URL).param(TESTDATA_KEY_PARAM, key.as_str())
                                               .param(TIMES_TO_FAIL_PARAM, "10")
                                               .retry_options(RetryOptions::with_task_retry_limit(retry_limit)))
     .expect("add");
    f.service.join_workers();

    let expected = i64::from(retry_limit) + 1;
    let actual = retry_poller().wait_for_value(&Some(expected), || last_test_data(&store, &invocation_count_key(&key)))
                               .expect("poll")
                               .unwrap_or_default();
    assert!(AttemptTolerance::one_short().accepts(expected, actual),
            "retries lower than the configured limit: expected {expected}, got {actual}");
}

#[test]
fn leasing_from_push_queue_is_a_mode_error() {
    let f = fixture();
    let err = f.service
               .default_queue()
               .expect("default")
               .lease_tasks(Duration::from_secs(1000), 1)
               .expect_err("push lease");
    assert!(matches!(err, QueueError::InvalidQueueMode(_)));
}

#[test]
fn only_pull_tasks_can_be_added_to_pull_queue() {
    let f = fixture();
    let pull = f.service.queue("pull-queue").expect("pull");
    pull.add(TaskOptions::with_method(Method::Pull)).expect("pull task");
    for method in Method::PUSH_METHODS {
        let err = pull.add(TaskOptions::with_method(method)).expect_err("push method on pull queue");
        assert!(matches!(err, QueueError::InvalidQueueMode(_)), "{method}");
    }
}

#[test]
fn pull_tasks_cannot_be_added_to_push_queue() {
    let f = fixture();
    let push = f.service.default_queue().expect("default");
    for method in Method::PUSH_METHODS {
        push.add(TaskOptions::with_method(method)).expect("push task");
    }
    let err = push.add(TaskOptions::with_method(Method::Pull)).expect_err("pull on push");
    assert!(matches!(err, QueueError::InvalidQueueMode(_)));
    f.service.join_workers();
}

#[test]
fn only_pull_tasks_can_have_tag() {
    let f = fixture();
    let handle = f.service
                  .queue("pull-queue")
                  .expect("pull")
                  .add(TaskOptions::with_method(Method::Pull).tag("foo"))
                  .expect("tagged pull");
    assert_eq!(handle.tag(), Some("foo"));
    let err = f.service
               .default_queue()
               .expect("default")
               .add(TaskOptions::with_tag("foo"))
               .expect_err("tag on push");
    assert!(matches!(err, QueueError::InvalidArgument(_)));
}

#[test]
fn pull_tasks_are_leased_once_and_purged() {
    let f = fixture();
    let pull = f.service.queue("pull-queue").expect("pull");
    pull.add(TaskOptions::with_method(Method::Pull).payload("a")).expect("a");
    pull.add(TaskOptions::with_method(Method::Pull).payload("b")).expect("b");

    let leased = pull.lease_tasks(Duration::from_secs(60), 1).expect("lease");
    assert_eq!(leased.len(), 1);
    assert_eq!(leased[0].payload_str(), Some("a"));
    assert_eq!(leased[0].retry_count(), 1);

    let rest = pull.lease_tasks(Duration::from_secs(60), 10).expect("lease");
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].payload_str(), Some("b"));

    pull.purge().expect("purge");
    assert!(pull.lease_tasks(Duration::from_secs(60), 10).expect("lease").is_empty());
}

#[test]
fn unknown_queue_is_reported() {
    let f = fixture();
    assert!(matches!(f.service.queue("nope"), Err(QueueError::UnknownQueue(_))));
}
