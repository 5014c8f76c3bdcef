use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use tck_core::tempdata::{prop_i64, prop_str};
use tck_core::{BuildMarker, Datastore, HarnessError, HarnessResult, InMemoryDatastore, PropertyMap, SortOrder,
               StoreError, TempData, TempDataStore};

#[derive(Debug, Clone, PartialEq)]
struct Probe {
    count: i64,
    label: String,
}

impl TempData for Probe {
    fn type_name() -> &'static str {
        "Probe"
    }

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("count".into(), json!(self.count));
        props.insert("label".into(), json!(self.label));
        props
    }

    fn from_properties(props: &PropertyMap) -> Result<Self, StoreError> {
        Ok(Self { count: prop_i64(props, "count")?,
                  label: prop_str(props, "label")?.to_string() })
    }
}

static DELETE_HOOKS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct Audited;

impl TempData for Audited {
    fn type_name() -> &'static str {
        "Audited"
    }

    fn to_properties(&self) -> PropertyMap {
        PropertyMap::new()
    }

    fn from_properties(_props: &PropertyMap) -> Result<Self, StoreError> {
        Ok(Self)
    }

    fn post_delete(&self, _ds: &dyn Datastore) -> HarnessResult<()> {
        DELETE_HOOKS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn probe(count: i64, label: &str) -> Probe {
    Probe { count,
            label: label.to_string() }
}

#[test]
fn records_come_back_in_insertion_order() {
    let store = TempDataStore::new(InMemoryDatastore::new(), BuildMarker::Stamped(1700));
    for (i, label) in ["a", "b", "c"].iter().enumerate() {
        store.put(&probe(i as i64, label)).expect("put");
    }

    let asc: Vec<String> = store.get_all::<Probe>().expect("all").into_iter().map(|p| p.label).collect();
    assert_eq!(asc, vec!["a", "b", "c"]);

    let desc: Vec<String> = store.get_all_ordered::<Probe>(SortOrder::Descending)
                                 .expect("desc")
                                 .into_iter()
                                 .map(|p| p.label)
                                 .collect();
    assert_eq!(desc, vec!["c", "b", "a"]);

    assert_eq!(store.get_last::<Probe>().expect("last"), Some(probe(2, "c")));
}

#[test]
fn get_last_on_empty_kind_is_none() {
    let store = TempDataStore::new(InMemoryDatastore::new(), BuildMarker::Unstamped);
    assert_eq!(store.get_last::<Probe>().expect("last"), None);
    assert!(store.get_all::<Probe>().expect("all").is_empty());
}

#[test]
fn kinds_are_isolated_by_build_marker() {
    let shared = InMemoryDatastore::new();
    let run_a = TempDataStore::new(shared.clone(), BuildMarker::Stamped(1));
    let run_b = TempDataStore::new(shared.clone(), BuildMarker::Stamped(2));
    assert_eq!(run_a.kind_of::<Probe>(), "Probe1");
    assert_eq!(run_b.kind_of::<Probe>(), "Probe2");

    run_a.put(&probe(1, "from-a")).expect("put a");
    run_b.put(&probe(2, "from-b")).expect("put b");
    assert_eq!(shared.len(), 2);

    assert_eq!(run_a.get_all::<Probe>().expect("a"), vec![probe(1, "from-a")]);
    assert_eq!(run_b.get_all::<Probe>().expect("b"), vec![probe(2, "from-b")]);
    assert_eq!(run_a.get_last::<Probe>().expect("last a"), Some(probe(1, "from-a")));
    assert_eq!(run_b.get_last::<Probe>().expect("last b"), Some(probe(2, "from-b")));

    assert_eq!(run_a.delete_all::<Probe>().expect("delete a"), 1);
    assert_eq!(run_b.get_all::<Probe>().expect("b after"), vec![probe(2, "from-b")]);
}

#[derive(Debug)]
struct Probe1;

impl TempData for Probe1 {
    fn type_name() -> &'static str {
        "Probe1"
    }

    fn to_properties(&self) -> PropertyMap {
        PropertyMap::new()
    }

    fn from_properties(_props: &PropertyMap) -> Result<Self, StoreError> {
        Ok(Self)
    }
}

/// `Probe1` + `23` y `Probe` + `123` darían el mismo kind.
#[test]
fn stamped_kinds_reject_type_names_ending_in_digit() {
    let ds = InMemoryDatastore::new();
    let stamped = TempDataStore::new(ds.clone(), BuildMarker::Stamped(23));
    assert!(matches!(stamped.put(&Probe1), Err(HarnessError::Configuration(_))));
    assert!(matches!(stamped.get_last::<Probe1>(), Err(HarnessError::Configuration(_))));
    assert_eq!(ds.writes(), 0);

    let unstamped = TempDataStore::new(ds, BuildMarker::Unstamped);
    unstamped.put(&Probe1).expect("no marker, no ambiguity");
}

#[test]
fn offline_delete_is_a_no_op_without_writes() {
    let ds = InMemoryDatastore::offline();
    let store = TempDataStore::new(ds.clone(), BuildMarker::Stamped(7));
    assert!(!store.is_in_container());
    assert_eq!(store.delete_all::<Probe>().expect("offline delete"), 0);
    assert_eq!(ds.writes(), 0);
}

#[test]
fn online_delete_removes_every_record_and_runs_hooks() {
    let ds = InMemoryDatastore::new();
    let store = TempDataStore::new(ds.clone(), BuildMarker::Stamped(7));
    store.put(&probe(1, "x")).expect("put");
    store.put(&Audited).expect("put");
    store.put(&Audited).expect("put");

    assert_eq!(store.delete_all::<Audited>().expect("delete"), 2);
    assert_eq!(DELETE_HOOKS.load(Ordering::SeqCst), 2);
    assert!(store.get_all::<Audited>().expect("all").is_empty());
    // Otros kinds no se tocan.
    assert_eq!(store.get_all::<Probe>().expect("probes").len(), 1);
}

#[test]
fn failed_commit_leaves_nothing_behind() {
    let ds = InMemoryDatastore::new();
    let store = TempDataStore::new(ds.clone(), BuildMarker::Unstamped);
    ds.fail_next_commit();
    let err = store.put(&probe(1, "lost")).expect_err("commit fails");
    assert!(matches!(err, HarnessError::State(StoreError::Transaction(_))));
    assert!(ds.is_empty());
    assert_eq!(store.get_last::<Probe>().expect("last"), None);
}

#[test]
fn ordering_field_is_visible_to_records() {
    let ds = InMemoryDatastore::new();
    let store = TempDataStore::new(ds.clone(), BuildMarker::Unstamped);
    store.put(&probe(1, "a")).expect("put");
    store.put(&probe(2, "b")).expect("put");
    let stored = ds.query("Probe", SortOrder::Ascending, None).expect("query");
    let ts: Vec<i64> = stored.iter().map(|e| prop_i64(&e.properties, "timestamp").expect("ts")).collect();
    assert!(ts[0] < ts[1]);
    assert_eq!(ts[0], stored[0].timestamp);
}
