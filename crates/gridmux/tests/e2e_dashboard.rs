//! End-to-end dashboard behavior through the public facade.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use gridmux::web::GridTexts;
use gridmux::{
    Dashboard, DashboardConfig, Document, DomError, Event, EventKind, FocusDirection, GridLayout,
    LayoutPreset, NodeId, Panel, PanelContext, PanelFactory, Phase, Rect, Size,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use web_time::Duration;

#[derive(Default)]
struct Counters {
    mounts: Cell<u32>,
    disposals: Cell<u32>,
    signals: Cell<u32>,
    measured: RefCell<Vec<Size>>,
}

struct Terminal {
    counters: Rc<Counters>,
}

impl Panel for Terminal {
    fn mount(&mut self, mut cx: PanelContext<'_>) -> Result<(), DomError> {
        self.counters.mounts.set(self.counters.mounts.get() + 1);
        let screen = cx.doc.create_element("canvas");
        cx.doc.append_child(cx.wrapper, screen)?;
        let counters = Rc::clone(&self.counters);
        cx.doc
            .add_listener(cx.wrapper, EventKind::BecameVisible, Phase::Bubble, move |_| {
                counters.signals.set(counters.signals.get() + 1);
            })?;
        let counters = Rc::clone(&self.counters);
        cx.measure_on_visible(move |size| counters.measured.borrow_mut().push(size))?;
        Ok(())
    }

    fn dispose(&mut self, _doc: &mut Document) {
        self.counters.disposals.set(self.counters.disposals.get() + 1);
    }
}

fn terminal() -> (PanelFactory<&'static str>, Rc<Counters>) {
    let counters = Rc::new(Counters::default());
    let shared = Rc::clone(&counters);
    let factory: PanelFactory<&'static str> =
        Box::new(move |_: &&'static str| -> Box<dyn Panel> { Box::new(Terminal { counters: shared }) });
    (factory, counters)
}

fn open(dash: &mut Dashboard<&'static str>, key: &'static str) -> Rc<Counters> {
    let (factory, counters) = terminal();
    assert!(dash.open_session(key, key.to_uppercase(), factory).unwrap());
    counters
}

fn dashboard(preset: LayoutPreset) -> Dashboard<&'static str> {
    let mut dash = Dashboard::new(DashboardConfig::default()).unwrap();
    dash.apply_preset(preset).unwrap();
    dash
}

fn cell_of_wrapper(dash: &Dashboard<&'static str>, key: &'static str) -> Option<usize> {
    let parent = dash.document().parent(dash.wrapper(&key)?)?;
    (0..dash.layout().cell_count()).find(|&index| dash.mount_point(index) == Some(parent))
}

fn in_pool(dash: &Dashboard<&'static str>, key: &'static str) -> bool {
    let wrapper = dash.wrapper(&key).unwrap();
    dash.document().parent(wrapper) == Some(dash.pool().container())
        && dash.document().is_hidden(wrapper)
}

#[test]
fn closing_the_visible_session_refills_from_the_parked_one() {
    let mut dash = dashboard(LayoutPreset::Single);
    let a = open(&mut dash, "a");
    let a_wrapper = dash.wrapper(&"a").unwrap();
    assert_eq!(cell_of_wrapper(&dash, "a"), Some(0));

    let b = open(&mut dash, "b");
    assert_eq!(dash.assignments(), &[Some("b")]);
    assert!(in_pool(&dash, "a"));

    assert!(dash.close_session(&"b").unwrap());
    assert_eq!(dash.assignments(), &[Some("a")]);
    assert_eq!(dash.wrapper(&"a"), Some(a_wrapper));
    assert_eq!(cell_of_wrapper(&dash, "a"), Some(0));
    assert!(dash.document().is_rendered(a_wrapper));

    assert_eq!(a.mounts.get(), 1);
    assert_eq!(a.disposals.get(), 0);
    assert_eq!(b.mounts.get(), 1);
    assert_eq!(b.disposals.get(), 1);
    assert_eq!(dash.wrapper(&"b"), None);
}

#[test]
fn closing_the_last_session_returns_to_the_empty_state() {
    let mut dash = dashboard(LayoutPreset::Single);
    let a = open(&mut dash, "a");
    dash.close_session(&"a").unwrap();
    assert_eq!(dash.assignments(), &[None]);
    assert!(dash.grid().empty_state().is_some());
    assert_eq!(a.disposals.get(), 1);
    assert!(dash.document().children(dash.pool().container()).is_empty());
}

#[test]
fn closing_with_nothing_parked_leaves_an_empty_cell() {
    let mut dash = dashboard(LayoutPreset::Columns2);
    open(&mut dash, "a");
    open(&mut dash, "b");
    dash.close_session(&"b").unwrap();
    // "a" is already shown, so cell 1 has nothing to take.
    assert_eq!(dash.assignments(), &[Some("a"), None]);
    assert!(dash.grid().cell(1).unwrap().assign_button().is_some());
}

#[test]
fn picker_assigns_through_dispatched_clicks() {
    let mut dash = dashboard(LayoutPreset::Columns2);
    open(&mut dash, "a");
    let b = open(&mut dash, "b");
    let b_wrapper = dash.wrapper(&"b").unwrap();

    let remove = dash.grid().cell(1).unwrap().remove_button().unwrap();
    dash.dispatch_event(remove, &Event::click()).unwrap();
    assert_eq!(dash.assignments(), &[Some("a"), None]);
    assert!(in_pool(&dash, "b"));

    let assign = dash.grid().cell(1).unwrap().assign_button().unwrap();
    dash.dispatch_event(assign, &Event::click()).unwrap();
    assert_eq!(dash.open_picker(), Some(1));
    let dropdown = dash.grid().cell(1).unwrap().dropdown().unwrap();
    assert_eq!(dash.grid().open_dropdown(), Some(dropdown));

    let option = dash.grid().cell(1).unwrap().option(&"b").unwrap();
    dash.dispatch_event(option, &Event::click()).unwrap();
    assert_eq!(dash.assignments(), &[Some("a"), Some("b")]);
    assert_eq!(dash.open_picker(), None);
    assert_eq!(dash.focused_cell(), 1);
    assert_eq!(dash.grid().open_dropdown(), None);

    assert_eq!(dash.wrapper(&"b"), Some(b_wrapper));
    assert_eq!(cell_of_wrapper(&dash, "b"), Some(1));
    assert_eq!(b.mounts.get(), 1);
}

#[test]
fn pointer_down_outside_dismisses_the_picker() {
    let mut dash = dashboard(LayoutPreset::Columns2);
    open(&mut dash, "a");
    let assign = dash.grid().cell(1).unwrap().assign_button().unwrap();
    dash.dispatch_event(assign, &Event::click()).unwrap();
    assert_eq!(dash.open_picker(), Some(1));

    // Inside the dropdown: stays open.
    let dropdown = dash.grid().cell(1).unwrap().dropdown().unwrap();
    dash.dispatch_event(dropdown, &Event::pointer_down()).unwrap();
    assert_eq!(dash.open_picker(), Some(1));

    dash.dispatch_event(dash.host(), &Event::pointer_down()).unwrap();
    assert_eq!(dash.open_picker(), None);
    assert_eq!(dash.grid().cell(1).unwrap().dropdown(), None);
}

#[test]
fn filling_the_picker_cell_closes_its_dropdown() {
    let mut dash = dashboard(LayoutPreset::Columns2);
    open(&mut dash, "a");
    let assign = dash.grid().cell(1).unwrap().assign_button().unwrap();
    dash.dispatch_event(assign, &Event::click()).unwrap();
    assert_eq!(dash.open_picker(), Some(1));

    open(&mut dash, "b");
    assert_eq!(dash.assignments(), &[Some("a"), Some("b")]);
    assert_eq!(dash.open_picker(), None);
    assert_eq!(dash.grid().open_dropdown(), None);

    // Emptying the cell again shows the closed picker.
    let remove = dash.grid().cell(1).unwrap().remove_button().unwrap();
    dash.dispatch_event(remove, &Event::click()).unwrap();
    assert_eq!(dash.assignments(), &[Some("a"), None]);
    assert_eq!(dash.open_picker(), None);
    assert_eq!(dash.grid().cell(1).unwrap().dropdown(), None);
    assert!(dash.grid().cell(1).unwrap().assign_button().is_some());
}

#[test]
fn pointer_down_in_another_cell_dismisses_and_focuses() {
    let mut dash = dashboard(LayoutPreset::Columns2);
    open(&mut dash, "a");
    dash.focus_cell(1).unwrap();
    let assign = dash.grid().cell(1).unwrap().assign_button().unwrap();
    dash.dispatch_event(assign, &Event::click()).unwrap();
    assert_eq!(dash.open_picker(), Some(1));

    let screen = dash.document().children(dash.wrapper(&"a").unwrap())[0];
    dash.dispatch_event(screen, &Event::pointer_down()).unwrap();
    assert_eq!(dash.open_picker(), None);
    assert_eq!(dash.focused_cell(), 0);
    assert_eq!(dash.grid().cell(1).unwrap().dropdown(), None);
}

#[test]
fn pointer_down_in_a_cell_focuses_it() {
    let mut dash = dashboard(LayoutPreset::Grid2x2);
    open(&mut dash, "a");
    open(&mut dash, "b");
    let wrapper = dash.wrapper(&"b").unwrap();
    let screen = dash.document().children(wrapper)[0];
    dash.dispatch_event(screen, &Event::pointer_down()).unwrap();
    assert_eq!(dash.focused_cell(), 1);
    let root = dash.grid().cell(1).unwrap().root();
    assert_eq!(dash.document().attr(root, "data-focused"), Some("true"));

    dash.move_focus(FocusDirection::Down).unwrap();
    assert_eq!(dash.focused_cell(), 3);
}

#[test]
fn batched_opens_commit_once_and_mount_each_panel_once() {
    let mut dash = dashboard(LayoutPreset::Grid2x2);
    let before = dash.commit_count();
    let counters = dash
        .batch(|d| ["a", "b", "c", "d"].map(|key| open(d, key)))
        .unwrap();
    assert_eq!(dash.commit_count(), before + 1);
    assert_eq!(dash.assignments(), &[Some("a"), Some("b"), Some("c"), Some("d")]);
    assert_eq!(dash.last_report().shown, 4);
    for c in &counters {
        assert_eq!(c.mounts.get(), 1);
        assert_eq!(c.signals.get(), 1);
    }
}

#[test]
fn shrinking_parks_and_growing_restores_the_same_wrappers() {
    let mut dash = dashboard(LayoutPreset::Grid2x2);
    let counters: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|key| open(&mut dash, key))
        .collect();
    let wrappers: Vec<NodeId> = ["a", "b", "c", "d"]
        .iter()
        .map(|key| dash.wrapper(key).unwrap())
        .collect();

    dash.apply_preset(LayoutPreset::Single).unwrap();
    assert_eq!(dash.assignments(), &[Some("a")]);
    for key in ["b", "c", "d"] {
        assert!(in_pool(&dash, key), "{key} parked");
    }
    assert_eq!(dash.snapshot().unplaced_sessions, vec!["B", "C", "D"]);

    dash.apply_preset(LayoutPreset::Grid2x2).unwrap();
    dash.batch(|d| {
        d.assign_cell(1, Some("b")).unwrap();
        d.assign_cell(2, Some("c")).unwrap();
        d.assign_cell(3, Some("d")).unwrap();
    })
    .unwrap();
    for (index, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
        assert_eq!(dash.wrapper(&key), Some(wrappers[index]));
        assert_eq!(cell_of_wrapper(&dash, key), Some(index));
    }
    for c in &counters {
        assert_eq!(c.mounts.get(), 1);
        assert_eq!(c.disposals.get(), 0);
    }
}

#[test]
fn viewport_sizes_reach_visible_panels_on_the_next_frame() {
    let mut dash = dashboard(LayoutPreset::Columns2);
    let a = open(&mut dash, "a");
    let b = open(&mut dash, "b");
    dash.set_viewport(Rect::new(0, 0, 800, 600)).unwrap();
    let mount_point = dash.mount_point(0).unwrap();
    assert_eq!(dash.document().size(mount_point), Size::new(400, 600));

    assert!(a.measured.borrow().is_empty());
    assert!(dash.run_frame(Duration::from_millis(16)) > 0);
    assert_eq!(a.measured.borrow().last(), Some(&Size::new(400, 600)));
    assert_eq!(b.measured.borrow().last(), Some(&Size::new(400, 600)));
}

#[test]
fn parked_panels_are_never_measured() {
    let mut dash = dashboard(LayoutPreset::Single);
    let a = open(&mut dash, "a");
    open(&mut dash, "b");
    dash.set_viewport(Rect::new(0, 0, 640, 480)).unwrap();
    let signals = a.signals.get();
    dash.run_frame(Duration::from_millis(16));
    dash.run_frame(Duration::from_millis(32));
    assert!(a.measured.borrow().is_empty());
    assert_eq!(a.signals.get(), signals);
}

#[test]
fn config_drives_initial_layout_and_texts() {
    let config = DashboardConfig::from_toml_str(
        r#"
        initial_layout = { rows = 1, cols = 3 }
        assign_label = "Pick"
        "#,
    )
    .unwrap();
    let mut dash: Dashboard<&'static str> = Dashboard::new(config).unwrap();
    assert_eq!(dash.layout(), GridLayout::new(1, 3).unwrap());
    open(&mut dash, "a");
    let button = dash.grid().cell(2).unwrap().assign_button().unwrap();
    assert_eq!(dash.document().text_content(button), "Pick");
}

#[test]
fn custom_empty_state_is_rendered_until_first_open() {
    let config = DashboardConfig::default();
    let mut dash: Dashboard<&'static str> = Dashboard::with_empty_state(
        config,
        Box::new(|doc: &mut Document, texts: &GridTexts| -> Result<NodeId, DomError> {
            let node = doc.create_element("section");
            doc.set_attr(node, "class", "welcome");
            let text = doc.create_text(format!("Welcome. {}", texts.empty_state));
            doc.append_child(node, text)?;
            Ok(node)
        }),
    )
    .unwrap();
    let welcome = dash.grid().empty_state().unwrap();
    assert_eq!(dash.document().attr(welcome, "class"), Some("welcome"));
    open(&mut dash, "a");
    assert_eq!(dash.grid().empty_state(), None);
    assert!(!dash.document().exists(welcome));
}

#[test]
fn snapshot_serializes_to_json() {
    let mut dash = dashboard(LayoutPreset::Columns2);
    open(&mut dash, "a");
    let json = dash.snapshot().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["layout"]["rows"], 1);
    assert_eq!(value["layout"]["cols"], 2);
    assert_eq!(value["preset"], "columns2");
    assert_eq!(value["cells"][0]["session"], "A");
    assert_eq!(value["cells"][1]["session"], serde_json::Value::Null);
    assert_eq!(value["open_sessions"][0], "A");
}

struct SpanNames(Arc<Mutex<Vec<String>>>);

impl<S> tracing_subscriber::Layer<S> for SpanNames
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        self.0
            .lock()
            .unwrap()
            .push(attrs.metadata().name().to_string());
    }
}

#[test]
fn commits_emit_commit_and_reconcile_spans() {
    let names = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(SpanNames(Arc::clone(&names)));
    tracing::subscriber::with_default(subscriber, || {
        let mut dash = dashboard(LayoutPreset::Columns2);
        open(&mut dash, "a");
    });
    let names = names.lock().unwrap();
    assert!(names.iter().any(|n| n == "gridmux.commit"), "{names:?}");
    assert!(names.iter().any(|n| n == "gridmux.reconcile"), "{names:?}");
}

#[derive(Debug, Clone)]
enum Op {
    Open(usize),
    Close(usize),
    Preset(usize),
    Assign(usize, Option<usize>),
    Swap(usize, usize),
    Focus(usize),
}

const KEYS: [&str; 6] = ["k0", "k1", "k2", "k3", "k4", "k5"];

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..KEYS.len()).prop_map(Op::Open),
        2 => (0..KEYS.len()).prop_map(Op::Close),
        1 => (0..LayoutPreset::ALL.len()).prop_map(Op::Preset),
        2 => (0..9usize, proptest::option::of(0..KEYS.len())).prop_map(|(i, k)| Op::Assign(i, k)),
        1 => (0..9usize, 0..9usize).prop_map(|(a, b)| Op::Swap(a, b)),
        1 => (0..9usize).prop_map(Op::Focus),
    ]
}

proptest! {
    #[test]
    fn wrappers_follow_assignments(ops in proptest::collection::vec(op(), 1..40)) {
        let mut dash = Dashboard::new(DashboardConfig::default()).unwrap();
        let mut live: Vec<(&'static str, Rc<Counters>, NodeId)> = Vec::new();
        let mut retired: Vec<Rc<Counters>> = Vec::new();

        for op in ops {
            match op {
                Op::Open(k) => {
                    let key = KEYS[k];
                    if !dash.is_open(&key) {
                        let counters = open(&mut dash, key);
                        let wrapper = dash.wrapper(&key).unwrap();
                        live.push((key, counters, wrapper));
                    }
                }
                Op::Close(k) => {
                    let key = KEYS[k];
                    if dash.close_session(&key).unwrap() {
                        let position = live.iter().position(|(k, _, _)| *k == key).unwrap();
                        retired.push(live.remove(position).1);
                    }
                }
                Op::Preset(p) => dash.apply_preset(LayoutPreset::ALL[p]).unwrap(),
                Op::Assign(index, key) => {
                    dash.assign_cell(index, key.map(|k| KEYS[k])).unwrap();
                }
                Op::Swap(a, b) => {
                    dash.swap_cells(a, b).unwrap();
                }
                Op::Focus(index) => {
                    dash.focus_cell(index).unwrap();
                }
            }

            let assignments = dash.assignments().to_vec();
            prop_assert_eq!(assignments.len(), dash.layout().cell_count());
            prop_assert!(dash.focused_cell() < dash.layout().cell_count());
            for (key, counters, wrapper) in &live {
                prop_assert_eq!(dash.wrapper(key), Some(*wrapper));
                prop_assert_eq!(counters.mounts.get(), 1);
                prop_assert_eq!(counters.disposals.get(), 0);
                let cells: Vec<usize> = assignments
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.as_ref() == Some(key))
                    .map(|(i, _)| i)
                    .collect();
                prop_assert!(cells.len() <= 1);
                match cells.first() {
                    Some(&index) => {
                        prop_assert_eq!(cell_of_wrapper(&dash, key), Some(index));
                        prop_assert!(dash.document().is_rendered(*wrapper));
                    }
                    None => prop_assert!(in_pool(&dash, key)),
                }
            }
            for counters in &retired {
                prop_assert_eq!(counters.mounts.get(), 1);
                prop_assert_eq!(counters.disposals.get(), 1);
            }
            if live.is_empty() {
                prop_assert!(assignments.iter().all(Option::is_none));
            }
        }
    }
}
