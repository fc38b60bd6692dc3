//! one read-only view over many source configurations
//!
//! [CombinedView] keeps an ordered list of registrations and a [NodeCombiner]. The merged tree is
//! built lazily: every structural change and every after-update event of a registered source only
//! marks the view as invalid, the next read rebuilds the whole tree.
//!
//! ```text
//!            add/remove/clear/set_combiner/add_list_node/source event
//!   +-------+ -------------------------------------------------------> +-------------+
//!   | Valid |                                                          | Invalidated |
//!   +-------+ <------------------------------------------------------- +-------------+
//!                            read (rebuild succeeded)
//! ```
use crate::combiner::{NodeCombiner, UnionCombiner};
use crate::error::{Error, Result};
use crate::event::{ChangeListener, ConfigEvent, EventKind, EventSource, ListenerId};
use crate::hierarchical::{add_to, clear_in};
use crate::key::{self, Key};
use crate::node::{Node, Origin};
use crate::source::{same_source, shared, ConfigSource, Configuration, SharedSource};
use crate::value::Value;
use indexmap::IndexSet;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// A source together with the way it was added
#[derive(Debug)]
pub struct Registration {
    source: SharedSource,
    name: Option<String>,
    at: Vec<String>,
    listener: ListenerId,
}

impl Registration {
    pub fn source(&self) -> &SharedSource {
        &self.source
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Prefix the source's tree is mounted at (escaped)
    pub fn at(&self) -> Option<String> {
        if self.at.is_empty() {
            return None;
        }
        let segments: Vec<_> = self.at.iter().map(|s| key::escape(s)).collect();
        Some(segments.join("."))
    }

    /// Whether the source itself defines `key` (given in the view's key space)
    fn defines(&self, key: &Key) -> Result<bool> {
        let Some(relative) = key.strip_prefix(&self.at) else {
            return Ok(false);
        };
        let root = self.source.borrow().root_node()?;
        Ok(relative.matches(&root))
    }

    fn detach(&self) {
        // a source that is borrowed right now cannot be notifying us either
        if let Ok(source) = self.source.try_borrow() {
            source.events().remove_listener(self.listener);
        }
    }

    fn describe(&self, index: usize) -> String {
        match &self.name {
            Some(name) => format!("{name:?}"),
            None => format!("#{index}"),
        }
    }
}

/// Selects a registration by name, position or identity
#[derive(Debug, Clone, Copy)]
pub enum SourceSelector<'a> {
    Name(&'a str),
    Index(usize),
    Source(&'a SharedSource),
}

impl<'a> From<&'a str> for SourceSelector<'a> {
    fn from(value: &'a str) -> Self {
        SourceSelector::Name(value)
    }
}

impl From<usize> for SourceSelector<'_> {
    fn from(value: usize) -> Self {
        SourceSelector::Index(value)
    }
}

impl<'a> From<&'a SharedSource> for SourceSelector<'a> {
    fn from(value: &'a SharedSource) -> Self {
        SourceSelector::Source(value)
    }
}

/// Answer of [CombinedView::get_source]
#[derive(Debug, Clone)]
pub enum KeySource {
    /// The key was added to the view itself
    Combined,
    Source(SharedSource),
}

impl KeySource {
    pub fn is_combined(&self) -> bool {
        matches!(self, KeySource::Combined)
    }

    pub fn is(&self, source: &SharedSource) -> bool {
        match self {
            KeySource::Combined => false,
            KeySource::Source(own) => same_source(own, source),
        }
    }
}

/// State reachable from the listeners installed on sources
#[derive(Debug)]
struct ViewState {
    invalid: Cell<bool>,
    events: EventSource,
}

impl ViewState {
    fn new() -> Self {
        Self {
            invalid: Cell::new(true),
            events: Default::default(),
        }
    }

    fn invalidate(&self) {
        self.invalid.set(true);
        tracing::debug!("combined view invalidated");
        self.events
            .fire(ConfigEvent::after(EventKind::Invalidate, None, None));
    }
}

/// Installed on every registered source
struct InvalidationListener {
    state: Weak<ViewState>,
}

impl ChangeListener for InvalidationListener {
    fn configuration_changed(&self, event: &ConfigEvent) {
        if event.before_update {
            return;
        }
        if let Some(state) = self.state.upgrade() {
            state.invalidate();
        }
    }
}

#[derive(Debug)]
pub struct CombinedView {
    registrations: Vec<Registration>,
    combiner: Rc<dyn NodeCombiner>,
    /// Properties added to the view itself
    local: Node,
    force_reload_check: bool,
    merged: RefCell<Option<Node>>,
    state: Rc<ViewState>,
}

impl Default for CombinedView {
    fn default() -> Self {
        Self::new()
    }
}

impl CombinedView {
    /// A view using a [UnionCombiner]
    pub fn new() -> Self {
        Self::with_combiner(Rc::new(UnionCombiner::new()))
    }

    pub fn with_combiner(combiner: Rc<dyn NodeCombiner>) -> Self {
        Self {
            registrations: vec![],
            combiner,
            local: Node::default(),
            force_reload_check: false,
            merged: RefCell::new(None),
            state: Rc::new(ViewState::new()),
        }
    }

    /// Register a source behind all existing ones
    ///
    /// `at` mounts the source's tree below a dot-delimited path (`..` escapes a dot).
    pub fn add_source(
        &mut self,
        source: SharedSource,
        name: Option<&str>,
        at: Option<&str>,
    ) -> Result<()> {
        if let Some(name) = name {
            if name.is_empty() {
                return Err(Error::InvalidArgument(
                    "source name must not be empty".into(),
                ));
            }
            if self.source_named(name).is_some() {
                return Err(Error::DuplicateName(name.to_string()));
            }
        }
        let at = at.map(key::parse_path).transpose()?.unwrap_or_default();

        tracing::debug!(?name, ?at, "add source");
        self.register(source, name.map(Into::into), at);

        self.state
            .events
            .fire(ConfigEvent::after(EventKind::SourceAdded, name, None));
        self.invalidate();
        Ok(())
    }

    fn register(&mut self, source: SharedSource, name: Option<String>, at: Vec<String>) {
        let listener = source
            .borrow()
            .events()
            .add_listener(Rc::new(InvalidationListener {
                state: Rc::downgrade(&self.state),
            }));

        self.registrations.push(Registration {
            source,
            name,
            at,
            listener,
        });
    }

    /// Unregister a source
    ///
    /// Returns [None] if nothing matched the selector.
    pub fn remove_source<'a>(
        &mut self,
        selector: impl Into<SourceSelector<'a>>,
    ) -> Option<SharedSource> {
        let position = match selector.into() {
            SourceSelector::Name(name) => self
                .registrations
                .iter()
                .position(|r| r.name.as_deref() == Some(name)),
            SourceSelector::Index(index) => (index < self.registrations.len()).then_some(index),
            SourceSelector::Source(source) => self
                .registrations
                .iter()
                .position(|r| same_source(&r.source, source)),
        }?;

        let registration = self.registrations.remove(position);
        registration.detach();
        tracing::debug!(name = ?registration.name, position, "source removed");

        self.state.events.fire(ConfigEvent::after(
            EventKind::SourceRemoved,
            registration.name.as_deref(),
            None,
        ));
        self.invalidate();
        Some(registration.source.clone())
    }

    /// Remove all sources and own properties
    pub fn clear(&mut self) {
        self.state
            .events
            .fire(ConfigEvent::before(EventKind::Clear, None, None));

        for registration in std::mem::take(&mut self.registrations) {
            registration.detach();
            self.state.events.fire(ConfigEvent::after(
                EventKind::SourceRemoved,
                registration.name.as_deref(),
                None,
            ));
        }
        self.local = Node::default();

        self.state
            .events
            .fire(ConfigEvent::after(EventKind::Clear, None, None));
        self.invalidate();
    }

    pub fn combiner(&self) -> &Rc<dyn NodeCombiner> {
        &self.combiner
    }

    pub fn set_combiner(&mut self, combiner: Rc<dyn NodeCombiner>) {
        self.combiner = combiner;
        self.state
            .events
            .fire(ConfigEvent::after(EventKind::CombinerChanged, None, None));
        self.invalidate();
    }

    /// Register a list node with the current combiner
    pub fn add_list_node(&mut self, name: &str) {
        if self.combiner.add_list_node(name) {
            self.state.events.fire(ConfigEvent::after(
                EventKind::ListNodesChanged,
                Some(name),
                None,
            ));
            self.invalidate();
        }
    }

    pub fn is_force_reload_check(&self) -> bool {
        self.force_reload_check
    }

    /// Ask every source for changed backing data before each read
    pub fn set_force_reload_check(&mut self, force_reload_check: bool) {
        self.force_reload_check = force_reload_check;
    }

    pub fn source_count(&self) -> usize {
        self.registrations.len()
    }

    /// Names of all named registrations, in registration order
    pub fn source_names(&self) -> Vec<&str> {
        self.registrations
            .iter()
            .filter_map(Registration::name)
            .collect()
    }

    pub fn source(&self, index: usize) -> Option<&SharedSource> {
        self.registrations.get(index).map(Registration::source)
    }

    pub fn source_named(&self, name: &str) -> Option<&SharedSource> {
        self.registrations
            .iter()
            .find(|r| r.name.as_deref() == Some(name))
            .map(Registration::source)
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Add a property to the view itself
    ///
    /// Own properties are merged ahead of all sources.
    pub fn add_property(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let parsed = Key::parse(key)?;
        let value = value.into();

        self.state.events.fire(ConfigEvent::before(
            EventKind::AddProperty,
            Some(key),
            Some(&value),
        ));
        add_to(&mut self.local, &parsed, value.clone());
        self.state.events.fire(ConfigEvent::after(
            EventKind::AddProperty,
            Some(key),
            Some(&value),
        ));
        self.invalidate();
        Ok(())
    }

    /// Remove a property added to the view itself
    pub fn clear_property(&mut self, key: &str) -> Result<()> {
        let parsed = Key::parse(key)?;

        self.state
            .events
            .fire(ConfigEvent::before(EventKind::ClearProperty, Some(key), None));
        clear_in(&mut self.local, &parsed);
        self.state
            .events
            .fire(ConfigEvent::after(EventKind::ClearProperty, Some(key), None));
        self.invalidate();
        Ok(())
    }

    /// Discard the merged tree; the next read rebuilds it
    pub fn invalidate(&self) {
        self.state.invalidate();
    }

    /// Whether the merged tree reflects the current registrations
    pub fn is_valid(&self) -> bool {
        !self.state.invalid.get()
    }

    /// The source that defines `key`
    ///
    /// Returns [KeySource::Combined] if the key was added to the view itself and [None] if no
    /// source defines it. A key whose values come from more than one source cannot be attributed
    /// and fails with [Error::AmbiguousSource].
    pub fn get_source(&self, key: &str) -> Result<Option<KeySource>> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("key must not be empty".into()));
        }
        let parsed = Key::parse(key)?;

        let origins = self.with_merged(|tree| origins_of(&parsed, tree))?;
        if origins.contains(&Origin::Local) {
            return Ok(Some(KeySource::Combined));
        }

        // an index counts siblings of the merged tree, not of any single source
        let indexed = parsed.elements().iter().any(|element| element.index.is_some());

        let mut defining = vec![];
        for origin in origins {
            let Origin::Source(index) = origin else {
                continue;
            };
            let Some(registration) = self.registrations.get(index) else {
                continue;
            };
            if indexed || registration.defines(&parsed)? {
                defining.push((index, registration));
            }
        }

        match defining.as_slice() {
            [] => Ok(None),
            [(_, registration)] => Ok(Some(KeySource::Source(registration.source.clone()))),
            several => Err(Error::AmbiguousSource {
                key: key.to_string(),
                sources: several
                    .iter()
                    .map(|(index, registration)| registration.describe(*index))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Run `f` on an up-to-date merged tree
    fn with_merged<R>(&self, f: impl FnOnce(&Node) -> R) -> Result<R> {
        if self.force_reload_check {
            self.poll_sources()?;
        }

        if !self.state.invalid.get() {
            if let Some(tree) = self.merged.borrow().as_ref() {
                return Ok(f(tree));
            }
        }

        // a failed rebuild leaves the view invalid
        let tree = self.rebuild()?;
        let result = f(&tree);
        *self.merged.borrow_mut() = Some(tree);
        self.state.invalid.set(false);
        Ok(result)
    }

    fn poll_sources(&self) -> Result<bool> {
        let mut changed = false;
        for registration in &self.registrations {
            if registration.source.borrow_mut().reload_if_changed()? {
                tracing::debug!(name = ?registration.name, "source reloaded");
                changed = true;
            }
        }

        if changed {
            self.state.invalid.set(true);
        }
        Ok(changed)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(sources = self.registrations.len()))]
    fn rebuild(&self) -> Result<Node> {
        let mut trees = vec![];

        if !self.local.is_empty() {
            let mut local = self.local.clone();
            local.tag(Origin::Local);
            trees.push(local);
        }

        for (index, registration) in self.registrations.iter().enumerate() {
            let mut root = registration.source.borrow().root_node()?;
            root.tag(Origin::Source(index));
            trees.push(root.nest_under(&registration.at));
        }

        let mut trees = trees.into_iter();
        let Some(first) = trees.next() else {
            return Ok(Node::default());
        };

        let merged = trees.try_fold(first, |merged, next| self.combiner.combine(&merged, &next))?;
        tracing::debug!("merged tree rebuilt");
        Ok(merged)
    }
}

/// Origins of all data `key` addresses in a merged tree
fn origins_of(key: &Key, tree: &Node) -> IndexSet<Origin> {
    let mut origins = IndexSet::new();
    for node in key.nodes(tree) {
        match key.attribute() {
            Some(attribute) => origins.extend(node.attribute_origin(attribute)),
            None => node.collect_origins(&mut origins),
        }
    }
    origins
}

/// Same combiner (shared), deep copies of all sources, no listeners
impl Clone for CombinedView {
    fn clone(&self) -> Self {
        let mut copy = CombinedView::with_combiner(self.combiner.clone());
        copy.local = self.local.clone();
        copy.force_reload_check = self.force_reload_check;

        for registration in &self.registrations {
            let source = registration.source.borrow().clone_source();
            copy.register(source, registration.name.clone(), registration.at.clone());
        }
        copy
    }
}

impl Drop for CombinedView {
    fn drop(&mut self) {
        for registration in &self.registrations {
            registration.detach();
        }
    }
}

impl ConfigSource for CombinedView {
    fn root_node(&self) -> Result<Node> {
        self.with_merged(Node::clone)
    }

    fn events(&self) -> &EventSource {
        &self.state.events
    }

    fn clone_source(&self) -> SharedSource {
        shared(self.clone())
    }

    fn reload_if_changed(&mut self) -> Result<bool> {
        self.poll_sources()
    }
}

impl Configuration for CombinedView {
    fn with_root<R>(&self, f: impl FnOnce(&Node) -> R) -> Result<R> {
        self.with_merged(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::combiner::OverrideCombiner;
    use crate::hierarchical::HierarchicalConfig;
    use pretty_assertions::assert_eq;

    fn test_config() -> Rc<RefCell<HierarchicalConfig>> {
        let mut config = HierarchicalConfig::new();
        config.add_property("test.value", true).unwrap();
        config.add_property("test.comment", "This is a test").unwrap();
        shared(config)
    }

    #[test]
    fn init() {
        let view = CombinedView::new();
        assert_eq!(view.source_count(), 0);
        assert!(view.source_names().is_empty());
        assert!(view.source_named("SUBCONFIG").is_none());
        assert!(!view.is_force_reload_check());
        assert!(view.is_empty().unwrap());
    }

    #[test]
    fn becomes_valid_only_on_read() {
        let mut view = CombinedView::new();
        view.add_source(test_config(), None, None).unwrap();
        assert!(!view.is_valid());

        assert_eq!(view.get_bool("test.value").unwrap(), Some(true));
        assert!(view.is_valid());

        view.set_combiner(Rc::new(OverrideCombiner::new()));
        assert!(!view.is_valid());
    }

    #[test]
    fn listener_installed_and_detached() {
        let config = test_config();
        let mut view = CombinedView::new();
        view.add_source(config.clone(), Some("SUBCONFIG"), None)
            .unwrap();
        assert_eq!(config.borrow().events().listener_count(), 1);

        let removed = view.remove_source("SUBCONFIG").unwrap();
        assert!(Rc::ptr_eq(&removed, &(config.clone() as SharedSource)));
        assert_eq!(config.borrow().events().listener_count(), 0);
    }

    #[test]
    fn at_with_escaped_dot() {
        let mut view = CombinedView::new();
        view.add_source(test_config(), None, Some("This..is.a.complex"))
            .unwrap();

        assert_eq!(view.registrations()[0].at().as_deref(), Some("This..is.a.complex"));
        assert_eq!(
            view.get_bool("This..is.a.complex.test.value").unwrap(),
            Some(true)
        );
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut view = CombinedView::new();
        assert!(matches!(
            view.add_source(test_config(), Some(""), None),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(view.source_count(), 0);
    }

    #[test]
    fn invalid_at_is_rejected() {
        let mut view = CombinedView::new();
        assert!(matches!(
            view.add_source(test_config(), None, Some("a.")),
            Err(Error::InvalidKey { .. })
        ));
        assert_eq!(view.source_count(), 0);
    }

    #[test]
    fn dropping_the_view_detaches() {
        let config = test_config();
        {
            let mut view = CombinedView::new();
            view.add_source(config.clone(), None, None).unwrap();
        }
        assert_eq!(config.borrow().events().listener_count(), 0);
    }

    #[test]
    fn list_node_change_invalidates() {
        let mut view = CombinedView::new();
        view.add_source(test_config(), None, None).unwrap();
        view.get("test.value").unwrap();

        view.add_list_node("server");
        assert!(!view.is_valid());
        view.get("test.value").unwrap();

        // already registered
        view.add_list_node("server");
        assert!(view.is_valid());
    }
}
