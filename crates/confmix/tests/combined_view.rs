//! Behaviour of combined views over in-memory and file sources

use confmix::combined::{CombinedView, KeySource};
use confmix::combiner::{NodeCombiner, OverrideCombiner, UnionCombiner};
use confmix::event::{ConfigEvent, EventKind, EventSource};
use confmix::hierarchical::HierarchicalConfig;
use confmix::node::Node;
use confmix::source::{shared, ConfigSource, Configuration, SharedSource};
use confmix::sources::FileSource;
use confmix::value::Value;
use confmix::Error;
use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn config(properties: &[(&str, Value)]) -> Rc<RefCell<HierarchicalConfig>> {
    let mut config = HierarchicalConfig::new();
    for (key, value) in properties {
        config.add_property(key, value.clone()).unwrap();
    }
    shared(config)
}

fn override_view() -> CombinedView {
    CombinedView::with_combiner(Rc::new(OverrideCombiner::new()))
}

/// Records every event kind a view fires
fn record(view: &CombinedView) -> Rc<RefCell<Vec<EventKind>>> {
    let seen = Rc::new(RefCell::new(vec![]));
    let sink = seen.clone();
    view.events().add_listener(Rc::new(move |event: &ConfigEvent| {
        sink.borrow_mut().push(event.kind)
    }));
    seen
}

#[test]
fn override_scenario() {
    let a = config(&[("db.host", "alpha".into())]);
    let b = config(&[("db.host", "beta".into()), ("db.port", 5432.into())]);

    let mut view = override_view();
    view.add_source(a.clone(), Some("a"), None).unwrap();
    view.add_source(b.clone(), Some("b"), None).unwrap();

    assert_eq!(view.get("db.host").unwrap(), Some(Value::from("alpha")));
    assert_eq!(view.get_i64("db.port").unwrap(), Some(5432));

    let a: SharedSource = a;
    let b: SharedSource = b;
    assert!(view.get_source("db.host").unwrap().unwrap().is(&a));
    assert!(view.get_source("db.port").unwrap().unwrap().is(&b));
    assert!(view.get_source("db.user").unwrap().is_none());
}

#[test]
fn union_list_scenario() {
    let a = config(&[("server", 1.into()), ("server", 2.into())]);
    let b = config(&[("server", 3.into())]);

    let mut view = CombinedView::with_combiner(Rc::new(UnionCombiner::new()));
    view.add_list_node("server");
    view.add_source(a, None, None).unwrap();
    view.add_source(b, None, None).unwrap();

    assert_eq!(
        view.get_list("server").unwrap(),
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
    );
}

#[test]
fn union_keeps_every_value() {
    let a = config(&[("db.host", "alpha".into())]);
    let b = config(&[("db.host", "beta".into()), ("db.port", 5432.into())]);

    let mut view = CombinedView::new();
    view.add_source(a, None, None).unwrap();
    view.add_source(b, None, None).unwrap();

    assert_eq!(
        view.get_list("db.host").unwrap(),
        vec![Value::from("alpha"), Value::from("beta")]
    );
    assert_eq!(view.get_list("db.port").unwrap(), vec![Value::Integer(5432)]);
}

#[test]
fn duplicate_name_leaves_registrations_unchanged() {
    let mut view = override_view();
    view.add_source(config(&[]), Some("main"), None).unwrap();

    let result = view.add_source(config(&[]), Some("main"), None);

    assert!(matches!(result, Err(Error::DuplicateName(name)) if name == "main"));
    assert_eq!(view.source_count(), 1);
    assert_eq!(view.source_names(), vec!["main"]);
}

/// Counts how often its tree is requested
#[derive(Debug, Default)]
struct CountingSource {
    root: Node,
    loads: Rc<Cell<usize>>,
    events: EventSource,
}

impl ConfigSource for CountingSource {
    fn root_node(&self) -> confmix::Result<Node> {
        self.loads.set(self.loads.get() + 1);
        Ok(self.root.clone())
    }

    fn events(&self) -> &EventSource {
        &self.events
    }

    fn clone_source(&self) -> SharedSource {
        shared(CountingSource {
            root: self.root.clone(),
            loads: self.loads.clone(),
            events: Default::default(),
        })
    }
}

#[test]
fn reads_rebuild_once_per_invalidation() {
    let loads = Rc::new(Cell::new(0));
    let source = shared(CountingSource {
        root: Node::default().child(Node::with_value("key", "value")),
        loads: loads.clone(),
        events: Default::default(),
    });

    let mut view = override_view();
    view.add_source(source.clone(), None, None).unwrap();
    assert!(!view.is_valid());

    let first = view.get("key").unwrap();
    let second = view.get("key").unwrap();
    assert_eq!(first, second);
    assert_eq!(loads.get(), 1);
    assert!(view.is_valid());

    source
        .borrow()
        .events()
        .fire(ConfigEvent::new(EventKind::Reload, None, None, true));
    assert!(view.is_valid(), "before-update events do not invalidate");

    source
        .borrow()
        .events()
        .fire(ConfigEvent::new(EventKind::Reload, None, None, false));
    assert!(!view.is_valid());

    view.get("key").unwrap();
    view.keys().unwrap();
    assert_eq!(loads.get(), 2);
}

#[test]
fn get_source_prefers_own_properties() {
    let a = config(&[("db.host", "alpha".into())]);

    let mut view = override_view();
    view.add_source(a, None, None).unwrap();
    view.add_property("db.host", "local").unwrap();

    assert_eq!(view.get("db.host").unwrap(), Some(Value::from("local")));
    assert!(view.get_source("db.host").unwrap().unwrap().is_combined());

    view.clear_property("db.host").unwrap();
    assert_eq!(view.get("db.host").unwrap(), Some(Value::from("alpha")));
    assert!(!view.get_source("db.host").unwrap().unwrap().is_combined());
}

#[test]
fn get_source_with_prefix_and_attributes() {
    let a = config(&[("host", "alpha".into()), ("server[@id]", "s1".into())]);

    let mut view = override_view();
    view.add_source(a.clone(), Some("a"), Some("db")).unwrap();

    let a: SharedSource = a;
    assert_eq!(view.get("db.host").unwrap(), Some(Value::from("alpha")));
    assert!(view.get_source("db.host").unwrap().unwrap().is(&a));
    assert!(view.get_source("db.server[@id]").unwrap().unwrap().is(&a));
    assert!(view.get_source("host").unwrap().is_none());
}

#[test]
fn get_source_ambiguous() {
    let a = config(&[("server", "a1".into())]);
    let b = config(&[("server", "b1".into())]);

    let mut view = CombinedView::new();
    view.add_source(a, Some("a"), None).unwrap();
    view.add_source(b, Some("b"), None).unwrap();

    assert!(matches!(
        view.get_source("server"),
        Err(Error::AmbiguousSource { .. })
    ));
}

#[test]
fn get_source_of_list_in_one_source() {
    let a = config(&[("list.key", "1,2,3".into())]);
    let b = config(&[("other", "x".into())]);

    let mut view = CombinedView::new();
    view.add_source(a.clone(), Some("a"), None).unwrap();
    view.add_source(b, Some("b"), None).unwrap();

    let a: SharedSource = a;
    assert_eq!(view.get_list("list.key").unwrap().len(), 3);
    assert!(view.get_source("list.key").unwrap().unwrap().is(&a));
}

#[test]
fn get_source_with_index_across_sources() {
    let a = config(&[("server", 1.into()), ("server", 2.into())]);
    let b = config(&[("server", 3.into())]);

    let mut view = CombinedView::new();
    view.add_list_node("server");
    view.add_source(a.clone(), Some("a"), None).unwrap();
    view.add_source(b.clone(), Some("b"), None).unwrap();

    let a: SharedSource = a;
    let b: SharedSource = b;
    assert_eq!(view.get("server(2)").unwrap(), Some(Value::Integer(3)));
    assert!(view.get_source("server(2)").unwrap().unwrap().is(&b));
    assert!(view.get_source("server(1)").unwrap().unwrap().is(&a));
    assert!(view.get_source("server(3)").unwrap().is_none());
}

#[test]
fn get_source_rejects_empty_key() {
    let view = override_view();
    assert!(matches!(
        view.get_source(""),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn removed_source_is_detached() {
    let a = config(&[("db.host", "alpha".into())]);
    let b = config(&[("db.port", 5432.into())]);

    let mut view = override_view();
    view.add_source(a.clone(), Some("a"), None).unwrap();
    view.add_source(b, Some("b"), None).unwrap();
    assert_eq!(a.borrow().events().listener_count(), 1);

    let removed = view.remove_source("a").unwrap();
    let a_shared: SharedSource = a.clone();
    assert!(Rc::ptr_eq(&removed, &a_shared));
    assert_eq!(a.borrow().events().listener_count(), 0);

    assert_eq!(view.get("db.host").unwrap(), None);
    assert!(view.is_valid());

    a.borrow_mut().add_property("db.user", "root").unwrap();
    assert!(view.is_valid());

    assert!(view.remove_source("a").is_none());
    assert!(view.remove_source(5usize).is_none());
}

#[test]
fn source_changes_invalidate() {
    let a = config(&[("db.host", "alpha".into())]);

    let mut view = override_view();
    view.add_source(a.clone(), None, None).unwrap();
    view.get("db.host").unwrap();

    a.borrow_mut().set_property("db.host", "gamma").unwrap();

    assert!(!view.is_valid());
    assert_eq!(view.get("db.host").unwrap(), Some(Value::from("gamma")));
}

#[test]
fn structural_events() {
    let mut view = override_view();
    let seen = record(&view);

    view.add_source(config(&[]), Some("a"), None).unwrap();
    view.add_source(config(&[]), Some("b"), None).unwrap();
    view.remove_source(0usize).unwrap();
    view.clear();

    assert_eq!(
        *seen.borrow(),
        vec![
            EventKind::SourceAdded,
            EventKind::Invalidate,
            EventKind::SourceAdded,
            EventKind::Invalidate,
            EventKind::SourceRemoved,
            EventKind::Invalidate,
            EventKind::Clear,
            EventKind::SourceRemoved,
            EventKind::Clear,
            EventKind::Invalidate,
        ]
    );
    assert_eq!(view.source_count(), 0);
}

#[test]
fn list_nodes_invalidate_once() {
    let mut view = override_view();
    view.get("anything").unwrap();
    let seen = record(&view);

    view.add_list_node("table");
    view.add_list_node("table");

    assert_eq!(
        *seen.borrow(),
        vec![EventKind::ListNodesChanged, EventKind::Invalidate]
    );
    assert!(view.combiner().list_nodes().contains("table"));
}

#[test]
fn combiner_change_rebuilds() {
    let a = config(&[("db.host", "alpha".into())]);
    let b = config(&[("db.host", "beta".into())]);

    let mut view = override_view();
    view.add_source(a, None, None).unwrap();
    view.add_source(b, None, None).unwrap();
    assert_eq!(view.get_list("db.host").unwrap().len(), 1);

    view.set_combiner(Rc::new(UnionCombiner::new()));

    assert!(!view.is_valid());
    assert_eq!(view.get_list("db.host").unwrap().len(), 2);
}

#[test]
fn nested_views_propagate_invalidation() {
    let a = config(&[("db.host", "alpha".into())]);

    let mut inner = override_view();
    inner.add_source(a.clone(), None, None).unwrap();
    let inner = shared(inner);

    let mut outer = override_view();
    outer.add_source(inner.clone(), Some("inner"), Some("nested")).unwrap();
    assert_eq!(
        outer.get("nested.db.host").unwrap(),
        Some(Value::from("alpha"))
    );

    a.borrow_mut().set_property("db.host", "beta").unwrap();

    assert!(!outer.is_valid());
    assert_eq!(
        outer.get("nested.db.host").unwrap(),
        Some(Value::from("beta"))
    );
}

#[test]
fn clone_is_independent() {
    let a = config(&[("db.host", "alpha".into())]);

    let mut view = override_view();
    view.add_source(a.clone(), Some("a"), None).unwrap();
    view.add_property("local", true).unwrap();

    let copy = view.clone();
    assert_eq!(copy.source_names(), vec!["a"]);
    assert_eq!(copy.events().listener_count(), 0);
    assert!(Rc::ptr_eq(view.combiner(), copy.combiner()));

    a.borrow_mut().set_property("db.host", "beta").unwrap();

    assert_eq!(view.get("db.host").unwrap(), Some(Value::from("beta")));
    assert_eq!(copy.get("db.host").unwrap(), Some(Value::from("alpha")));
    assert_eq!(copy.get_bool("local").unwrap(), Some(true));
}

#[test]
fn reload_check_picks_up_file_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.properties");
    std::fs::write(&path, "db.host = alpha\n").unwrap();

    let file = shared(FileSource::load(&path, None).unwrap());
    let mut view = override_view();
    view.add_source(file, None, None).unwrap();
    assert_eq!(view.get_string("db.host").unwrap().as_deref(), Some("alpha"));

    std::fs::write(&path, "db.host = beta\n").unwrap();
    assert_eq!(view.get_string("db.host").unwrap().as_deref(), Some("alpha"));

    view.set_force_reload_check(true);
    assert_eq!(view.get_string("db.host").unwrap().as_deref(), Some("beta"));
}

/// Fails to merge on request
#[derive(Debug, Default)]
struct FailingCombiner {
    fail: Cell<bool>,
    list_nodes: confmix::combiner::ListNodes,
}

impl NodeCombiner for FailingCombiner {
    fn combine(&self, first: &Node, second: &Node) -> confmix::Result<Node> {
        if self.fail.get() {
            return Err(Error::MergeFailure {
                path: first.name().to_string(),
                reason: "failing on purpose",
            });
        }
        OverrideCombiner::new().combine(first, second)
    }

    fn list_nodes(&self) -> &confmix::combiner::ListNodes {
        &self.list_nodes
    }
}

#[test]
fn failed_rebuild_keeps_view_usable() {
    let combiner = Rc::new(FailingCombiner::default());
    let mut view = CombinedView::with_combiner(combiner.clone());
    view.add_source(config(&[("a", 1.into())]), None, None).unwrap();
    view.add_source(config(&[("b", 2.into())]), None, None).unwrap();

    combiner.fail.set(true);
    assert!(matches!(view.get("a"), Err(Error::MergeFailure { .. })));
    assert!(!view.is_valid());

    combiner.fail.set(false);
    assert_eq!(view.get("b").unwrap(), Some(Value::Integer(2)));
    assert!(view.is_valid());
}

#[test]
fn invalid_registration_arguments() {
    let mut view = override_view();

    assert!(matches!(
        view.add_source(config(&[]), Some(""), None),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        view.add_source(config(&[]), None, Some("db(1)")),
        Err(Error::InvalidKey { .. })
    ));
    assert_eq!(view.source_count(), 0);
}
