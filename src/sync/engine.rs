//! Per-shape synchronization state and the engine that drives it
//!
//! Each rendered shape owns a [`SyncState`]: the parse baseline, an
//! append-only override log and, optionally, a bound live subtree and the
//! geometry last pushed by the host. Overrides are always replayed in
//! ascending timestamp order with ties kept in insertion order.

use super::apply::{self, ApplyReport, DomRoot, ShapeProps};
use super::overrides::ElementOverride;
use crate::html::{Document, HtmlParseResult, NodeId, Snapshot, generate_selector, get_style_diff};
use crate::utils::{Result, SyncError, now_millis};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sync status of one shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Pending,
    /// Reserved for failure reporting; recovery currently always ends synced
    Error,
}

/// One entry of the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "override")]
    pub entry: ElementOverride,
    pub timestamp: u64,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Largest per-axis difference, in px, `validate_sync` accepts
    pub geometry_tolerance: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            geometry_tolerance: 1.0,
        }
    }
}

/// Synchronization state of one rendered shape
#[derive(Debug, Clone)]
pub struct SyncState {
    pub shape_id: String,
    pub original_html: HtmlParseResult,
    pub overrides: Vec<ElementOverride>,
    pub history: Vec<HistoryEntry>,
    pub status: SyncStatus,
    pub last_sync: u64,
    pub dom_root: Option<DomRoot>,
    pub shape_ref: Option<ShapeProps>,
    /// The bound subtree as it was when it was bound
    baseline: Option<Snapshot>,
}

impl SyncState {
    fn new(shape_id: &str, original_html: HtmlParseResult) -> Self {
        Self {
            shape_id: shape_id.to_string(),
            original_html,
            overrides: Vec::new(),
            history: Vec::new(),
            status: SyncStatus::Synced,
            last_sync: now_millis(),
            dom_root: None,
            shape_ref: None,
            baseline: None,
        }
    }

    /// Overrides in replay order
    pub fn ordered_overrides(&self) -> Vec<&ElementOverride> {
        let mut ordered: Vec<&ElementOverride> = self.overrides.iter().collect();
        // sort_by_key is stable, so equal timestamps keep insertion order
        ordered.sort_by_key(|entry| entry.timestamp);
        ordered
    }

    fn record(&mut self, entry: ElementOverride) {
        self.history.push(HistoryEntry {
            timestamp: entry.timestamp,
            entry: entry.clone(),
        });
        self.overrides.push(entry);
        self.status = SyncStatus::Pending;
    }

    /// Replay every override, then re-push recorded geometry
    fn replay(&self) -> Vec<ApplyReport> {
        let Some(root) = &self.dom_root else {
            return Vec::new();
        };
        let mut document = root.document.borrow_mut();
        let reports = self
            .ordered_overrides()
            .into_iter()
            .map(|entry| apply::apply_override(&mut document, root.node, entry))
            .collect();
        if let Some(props) = &self.shape_ref {
            apply::write_geometry(&mut document, root.node, props);
        }
        reports
    }
}

/// Synchronizes override logs with live documents
pub struct SyncEngine {
    states: BTreeMap<String, SyncState>,
    config: SyncConfig,
}

impl SyncEngine {
    /// Create an engine with default configuration
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            states: BTreeMap::new(),
            config,
        }
    }

    /// Start tracking a shape. Any previous state for the id is replaced.
    pub fn init_sync(&mut self, shape_id: &str, parse_result: HtmlParseResult) {
        debug!("init sync for {}", shape_id);
        self.states
            .insert(shape_id.to_string(), SyncState::new(shape_id, parse_result));
    }

    fn state_mut(&mut self, shape_id: &str) -> Result<&mut SyncState> {
        self.states
            .get_mut(shape_id)
            .ok_or_else(|| SyncError::UnknownShape(shape_id.to_string()))
    }

    /// Record an override and, when a DOM is bound, apply it right away.
    ///
    /// Returns `None` when no DOM is bound. A selector that matches nothing
    /// yields a report with `matched == 0`, never an error.
    pub fn apply_override(&mut self, shape_id: &str, entry: ElementOverride) -> Result<Option<ApplyReport>> {
        let state = self.state_mut(shape_id)?;
        let report = state.dom_root.as_ref().map(|root| {
            let mut document = root.document.borrow_mut();
            apply::apply_override(&mut document, root.node, &entry)
        });
        state.record(entry);
        debug!("{} -> pending ({} overrides)", shape_id, state.overrides.len());
        Ok(report)
    }

    /// Apply overrides to many shapes. Every shape is attempted; a failure
    /// for one never stops the others.
    pub fn apply_batch(
        &mut self,
        batch: BTreeMap<String, Vec<ElementOverride>>,
    ) -> Vec<(String, Result<Vec<ApplyReport>>)> {
        batch
            .into_iter()
            .map(|(shape_id, entries)| {
                let mut reports = Vec::new();
                let mut outcome = Ok(());
                for entry in entries {
                    match self.apply_override(&shape_id, entry) {
                        Ok(report) => reports.extend(report),
                        Err(err) => {
                            warn!("batch update skipped {}: {}", shape_id, err);
                            outcome = Err(err);
                            break;
                        }
                    }
                }
                let result = outcome.map(|_| reports);
                (shape_id, result)
            })
            .collect()
    }

    /// Record host geometry and push it onto the bound container
    pub fn sync_shape_to_dom(&mut self, shape_id: &str, props: ShapeProps) -> Result<()> {
        let state = self.state_mut(shape_id)?;
        state.shape_ref = Some(props);
        if let Some(root) = &state.dom_root {
            apply::write_geometry(&mut root.document.borrow_mut(), root.node, &props);
        }
        state.status = SyncStatus::Pending;
        Ok(())
    }

    /// Capture a live element's edits as a new override.
    ///
    /// The override carries the element's style diff against the parse
    /// baseline, its direct text when that changed, and the recorded host
    /// geometry. It is appended to the log but not re-applied.
    pub fn sync_dom_to_shape(&mut self, shape_id: &str, document: &Document, node: NodeId) -> Result<ElementOverride> {
        let state = self.state_mut(shape_id)?;
        let Some(props) = state.shape_ref else {
            warn!("{} has no recorded geometry", shape_id);
            return Err(SyncError::UnknownShape(shape_id.to_string()));
        };
        let element = document
            .element(node)
            .ok_or_else(|| SyncError::InvalidInput("node is not an element".to_string()))?;

        let selector = generate_selector(&element.tag_name, &element.attributes);
        let baseline = state.original_html.find_by_selector(&selector);
        let baseline_styles = baseline.map(|e| e.inline_styles.clone()).unwrap_or_default();
        let baseline_text = baseline.map(|e| e.text_content.as_str()).unwrap_or("");

        let mut entry = ElementOverride::new(selector)
            .with_position(props.x, props.y)
            .with_size(props.width, props.height);

        let diff = get_style_diff(&baseline_styles, &element.inline_style());
        if !diff.is_empty() {
            entry = entry.with_styles(diff);
        }
        let text = document.direct_text(node);
        if text != baseline_text {
            entry = entry.with_text(text);
        }

        state.record(entry.clone());
        Ok(entry)
    }

    /// Whether the bound container's geometry still matches the recorded
    /// host geometry within tolerance. Unknown shapes are never valid;
    /// shapes with nothing to compare always are.
    pub fn validate_sync(&self, shape_id: &str) -> bool {
        let Some(state) = self.states.get(shape_id) else {
            return false;
        };
        let (Some(expected), Some(root)) = (&state.shape_ref, &state.dom_root) else {
            return true;
        };

        let document = root.document.borrow();
        let Some(actual) = apply::read_geometry(&document, root.node) else {
            debug!("{} container has no inline geometry", shape_id);
            return false;
        };

        let tolerance = self.config.geometry_tolerance;
        [
            (expected.x, actual.x),
            (expected.y, actual.y),
            (expected.width, actual.width),
            (expected.height, actual.height),
        ]
        .iter()
        .all(|(e, a)| (e - a).abs() <= tolerance)
    }

    /// Reset the bound subtree to its baseline, replay the whole log and
    /// re-push recorded geometry. Unknown shapes are ignored.
    pub fn recover_sync(&mut self, shape_id: &str) -> Vec<ApplyReport> {
        let Some(state) = self.states.get_mut(shape_id) else {
            debug!("recover skipped for unknown shape {}", shape_id);
            return Vec::new();
        };

        if let (Some(root), Some(baseline)) = (&state.dom_root, &state.baseline) {
            root.document.borrow_mut().restore(root.node, baseline);
        }
        let reports = state.replay();

        state.status = SyncStatus::Synced;
        state.last_sync = now_millis();
        info!("recovered {} ({} overrides replayed)", shape_id, reports.len());
        reports
    }

    /// Drop every override newer than `timestamp`. The DOM is left as is;
    /// call [`recover_sync`](Self::recover_sync) to bring it in line.
    pub fn restore_to_version(&mut self, shape_id: &str, timestamp: u64) -> Result<()> {
        let state = self.state_mut(shape_id)?;
        state.overrides.retain(|entry| entry.timestamp <= timestamp);
        state.history.retain(|entry| entry.timestamp <= timestamp);
        state.status = SyncStatus::Synced;
        debug!("{} restored to {} ({} overrides kept)", shape_id, timestamp, state.overrides.len());
        Ok(())
    }

    /// Bind a live subtree and replay the existing log onto it
    pub fn set_dom_root(&mut self, shape_id: &str, root: DomRoot) -> Result<Vec<ApplyReport>> {
        let state = self.state_mut(shape_id)?;
        state.baseline = Some(root.document.borrow().snapshot(root.node));
        state.dom_root = Some(root);
        let reports = state.replay();
        debug!("bound DOM for {} ({} overrides replayed)", shape_id, reports.len());
        Ok(reports)
    }

    /// Stop tracking a shape. Returns whether it was tracked.
    pub fn remove_sync(&mut self, shape_id: &str) -> bool {
        self.states.remove(shape_id).is_some()
    }

    pub fn get_sync_state(&self, shape_id: &str) -> Option<&SyncState> {
        self.states.get(shape_id)
    }

    /// Every tracked state, ordered by shape id
    pub fn get_all_sync_states(&self) -> Vec<&SyncState> {
        self.states.values().collect()
    }

    pub fn clear_all_sync_states(&mut self) {
        self.states.clear();
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::{HtmlParser, Selector};
    use std::cell::RefCell;
    use std::rc::Rc;

    const PAGE: &str = r#"<div id="x" style="color: red">old</div><p class="note">n</p>"#;

    fn setup() -> (SyncEngine, Rc<RefCell<Document>>) {
        let mut parser = HtmlParser::new();
        let mut engine = SyncEngine::new();
        engine.init_sync("shape-1", parser.parse(PAGE, None, None).unwrap());
        let document = Rc::new(RefCell::new(Document::parse(PAGE)));
        (engine, document)
    }

    fn node(document: &Rc<RefCell<Document>>, selector: &str) -> NodeId {
        node_in(&document.borrow(), selector)
    }

    fn node_in(doc: &Document, selector: &str) -> NodeId {
        Selector::parse(selector).unwrap().query_first(doc, doc.root()).unwrap()
    }

    #[test]
    fn test_unknown_shape_errors() {
        let mut engine = SyncEngine::new();
        assert!(matches!(
            engine.apply_override("nope", ElementOverride::new("#x")),
            Err(SyncError::UnknownShape(_))
        ));
        assert!(engine.sync_shape_to_dom("nope", ShapeProps::default()).is_err());
        assert!(engine.restore_to_version("nope", 0).is_err());
        assert!(!engine.validate_sync("nope"));
        assert!(engine.recover_sync("nope").is_empty());
    }

    #[test]
    fn test_apply_override_on_bound_dom() {
        let (mut engine, document) = setup();
        engine.set_dom_root("shape-1", DomRoot::document(document.clone())).unwrap();
        engine.sync_shape_to_dom("shape-1", ShapeProps { x: 0.0, y: 0.0, width: 800.0, height: 600.0 }).unwrap();
        assert!(engine.validate_sync("shape-1"));

        let report = engine
            .apply_override("shape-1", ElementOverride::new("#x").with_text("hi"))
            .unwrap()
            .unwrap();
        assert_eq!(report.matched, 1);

        let x = node(&document, "#x");
        assert_eq!(document.borrow().text_content(x), "hi");
        // Text edits do not disturb geometry
        assert!(engine.validate_sync("shape-1"));

        let state = engine.get_sync_state("shape-1").unwrap();
        assert_eq!(state.status, SyncStatus::Pending);
        assert_eq!(state.overrides.len(), 1);
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_override_without_dom_is_recorded() {
        let (mut engine, document) = setup();
        let report = engine
            .apply_override("shape-1", ElementOverride::new("#x").with_text("later").at(1))
            .unwrap();
        assert!(report.is_none());

        // Binding replays the log
        let reports = engine.set_dom_root("shape-1", DomRoot::document(document.clone())).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(document.borrow().text_content(node(&document, "#x")), "later");
    }

    #[test]
    fn test_selector_miss_does_not_fail() {
        let (mut engine, document) = setup();
        engine.set_dom_root("shape-1", DomRoot::document(document)).unwrap();
        let report = engine
            .apply_override("shape-1", ElementOverride::new("#ghost").with_text("x"))
            .unwrap()
            .unwrap();
        assert_eq!(report.matched, 0);
        assert_eq!(engine.get_sync_state("shape-1").unwrap().overrides.len(), 1);
    }

    #[test]
    fn test_drift_detection_and_recovery() {
        let (mut engine, document) = setup();
        let x = node(&document, "#x");
        engine.set_dom_root("shape-1", DomRoot::new(document.clone(), x)).unwrap();
        engine
            .sync_shape_to_dom("shape-1", ShapeProps { x: 10.0, y: 20.0, width: 200.0, height: 100.0 })
            .unwrap();
        assert!(engine.validate_sync("shape-1"));

        // Sub-pixel rounding is tolerated
        document.borrow_mut().element_mut(x).unwrap().set_style_property("left", "10.6px");
        assert!(engine.validate_sync("shape-1"));

        document.borrow_mut().element_mut(x).unwrap().set_style_property("width", "250px");
        assert!(!engine.validate_sync("shape-1"));

        engine.recover_sync("shape-1");
        assert!(engine.validate_sync("shape-1"));
        assert_eq!(engine.get_sync_state("shape-1").unwrap().status, SyncStatus::Synced);
    }

    #[test]
    fn test_repeated_recovery_keeps_arena_bounded() {
        let (mut engine, document) = setup();
        engine.set_dom_root("shape-1", DomRoot::document(document.clone())).unwrap();
        engine
            .apply_override("shape-1", ElementOverride::new("#x").with_html("<b>bold</b> text").at(1))
            .unwrap();
        engine
            .apply_override("shape-1", ElementOverride::new(".note").with_text("edited").at(2))
            .unwrap();

        engine.recover_sync("shape-1");
        let allocated = document.borrow().allocated();
        let live = document.borrow().node_count();

        for _ in 0..1000 {
            engine.recover_sync("shape-1");
        }

        let doc = document.borrow();
        assert_eq!(doc.node_count(), live);
        assert_eq!(doc.allocated(), allocated);
        assert_eq!(doc.inner_html(node_in(&doc, "#x")), "<b>bold</b> text");
    }

    #[test]
    fn test_restore_to_version_truncates_inclusive() {
        let (mut engine, _) = setup();
        for t in [30, 10, 20] {
            engine
                .apply_override("shape-1", ElementOverride::new("#x").with_text(t.to_string()).at(t))
                .unwrap();
        }
        engine.restore_to_version("shape-1", 20).unwrap();
        let state = engine.get_sync_state("shape-1").unwrap();
        let kept: Vec<u64> = state.overrides.iter().map(|o| o.timestamp).collect();
        assert_eq!(kept, vec![10, 20]);
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.status, SyncStatus::Synced);
    }

    #[test]
    fn test_replay_is_timestamp_ordered_with_stable_ties() {
        let (mut engine, document) = setup();
        engine.apply_override("shape-1", ElementOverride::new("#x").with_text("third").at(5)).unwrap();
        engine.apply_override("shape-1", ElementOverride::new("#x").with_text("first").at(1)).unwrap();
        engine.apply_override("shape-1", ElementOverride::new("#x").with_text("tie-a").at(3)).unwrap();
        engine.apply_override("shape-1", ElementOverride::new("#x").with_text("tie-b").at(3)).unwrap();

        let order: Vec<&str> = engine
            .get_sync_state("shape-1")
            .unwrap()
            .ordered_overrides()
            .iter()
            .filter_map(|o| o.text.as_deref())
            .collect();
        assert_eq!(order, vec!["first", "tie-a", "tie-b", "third"]);

        engine.set_dom_root("shape-1", DomRoot::document(document.clone())).unwrap();
        assert_eq!(document.borrow().text_content(node(&document, "#x")), "third");
    }

    #[test]
    fn test_sync_dom_to_shape() {
        let (mut engine, document) = setup();
        let x = node(&document, "#x");
        assert!(matches!(
            engine.sync_dom_to_shape("shape-1", &document.borrow(), x),
            Err(SyncError::UnknownShape(_))
        ));

        engine
            .sync_shape_to_dom("shape-1", ShapeProps { x: 5.0, y: 6.0, width: 7.0, height: 8.0 })
            .unwrap();
        {
            let mut doc = document.borrow_mut();
            doc.element_mut(x).unwrap().set_style_property("fontSize", "20px");
            doc.set_text_content(x, "edited");
        }

        let entry = engine.sync_dom_to_shape("shape-1", &document.borrow(), x).unwrap();
        assert_eq!(entry.selector, "#x");
        assert_eq!(entry.text.as_deref(), Some("edited"));
        let styles = entry.styles.unwrap();
        assert_eq!(styles.len(), 1);
        assert_eq!(styles.get("fontSize").map(String::as_str), Some("20px"));
        assert_eq!(entry.size.unwrap().height, 8.0);
        assert_eq!(engine.get_sync_state("shape-1").unwrap().overrides.len(), 1);
    }

    #[test]
    fn test_batch_continues_past_unknown_shapes() {
        let (mut engine, _) = setup();
        let mut batch = BTreeMap::new();
        batch.insert("missing".to_string(), vec![ElementOverride::new(":root")]);
        batch.insert("shape-1".to_string(), vec![ElementOverride::new(":root")]);

        let results = engine.apply_batch(batch);
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
        assert_eq!(engine.get_sync_state("shape-1").unwrap().overrides.len(), 1);
    }

    #[test]
    fn test_lifecycle() {
        let (mut engine, _) = setup();
        let mut parser = HtmlParser::new();
        engine.init_sync("shape-2", parser.parse("<p>b</p>", None, None).unwrap());
        assert_eq!(engine.get_all_sync_states().len(), 2);
        assert!(engine.remove_sync("shape-2"));
        assert!(!engine.remove_sync("shape-2"));
        engine.clear_all_sync_states();
        assert!(engine.get_all_sync_states().is_empty());
    }
}
