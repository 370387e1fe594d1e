//! ScriptedEngine: a deterministic in-memory engine.
//!
//! It builds the view tree from the element hierarchy of the session's
//! layout (tag, `android:id` and `android:text` only) or from an explicit
//! template, draws flat rectangles, and records every lifecycle call so tests
//! can assert ordering and release counts. Faults and panics can be injected
//! per step.

use std::borrow::Cow;
use std::cell::Cell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roxmltree::{Document, Node};

use crate::capture::RasterImage;
use crate::clock::VirtualClock;
use crate::engine::{EngineCapture, EngineFault, EngineResult, RawView, RenderEngine, RenderSession, ViewFactory};
use crate::environment::EngineProperties;
use crate::error::RenderStep;
use crate::resources::{ResourceKey, ResourceType};
use crate::session::{LayoutSource, SessionConfig};

/// Lifecycle counters shared between an engine and the test observing it.
#[derive(Debug, Default)]
pub struct EngineCounters {
    pub inits: AtomicUsize,
    pub disposes: AtomicUsize,
    pub sessions: AtomicUsize,
    pub inflates: AtomicUsize,
    pub renders: AtomicUsize,
    pub drains: AtomicUsize,
    pub releases: AtomicUsize,
    pub prepared_threads: AtomicUsize,
    pub cleaned_threads: AtomicUsize,
    events: Mutex<Vec<String>>,
}

impl EngineCounters {
    fn bump(&self, counter: &AtomicUsize, event: impl Into<String>) {
        counter.fetch_add(1, Ordering::SeqCst);
        self.record(event);
    }

    fn record(&self, event: impl Into<String>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.into());
        }
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    /// Lifecycle calls in the order they happened.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

/// Widget-compat view factory: swaps platform widgets for their compat
/// counterparts during inflation.
#[derive(Debug, Default)]
pub struct CompatViewFactory;

impl CompatViewFactory {
    pub const ID: &'static str = "appcompat";
}

impl ViewFactory for CompatViewFactory {
    fn id(&self) -> &str {
        Self::ID
    }

    fn create_view(&self, _parent: Option<&str>, name: &str) -> Option<String> {
        match name {
            "TextView" | "Button" | "ImageView" | "EditText" | "CheckBox" => {
                Some(format!("androidx.appcompat.widget.AppCompat{}", name))
            }
            _ => None,
        }
    }
}

/// One node of the template a scripted session inflates.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedView {
    pub id: Option<String>,
    /// Tag as written in the layout
    pub tag: String,
    /// Class actually instantiated (set at inflation)
    pub class_name: String,
    /// Literal text or a `@string/...` reference, resolved at inflation
    pub text: Option<String>,
    pub bounds: [i32; 4],
    pub baseline: i32,
    pub margins: [i32; 4],
    pub showing_layout_bounds: bool,
    pub children: Vec<ScriptedView>,
}

impl ScriptedView {
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            id: None,
            class_name: tag.clone(),
            tag,
            text: None,
            bounds: [RawView::UNMEASURED; 4],
            baseline: RawView::UNMEASURED,
            margins: [RawView::UNMEASURED; 4],
            showing_layout_bounds: false,
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_bounds(mut self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        self.bounds = [left, top, right, bottom];
        self
    }

    pub fn with_baseline(mut self, baseline: i32) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_margins(mut self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        self.margins = [left, top, right, bottom];
        self
    }

    pub fn with_child(mut self, child: ScriptedView) -> Self {
        self.children.push(child);
        self
    }

    fn is_measured(&self) -> bool {
        self.bounds.iter().all(|v| *v != RawView::UNMEASURED)
    }

    fn find(&self, id: &str) -> Option<&ScriptedView> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut ScriptedView> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    fn to_raw(&self) -> RawView {
        let [left, top, right, bottom] = self.bounds;
        let [left_margin, top_margin, right_margin, bottom_margin] = self.margins;
        RawView {
            class_name: self.class_name.clone(),
            left,
            top,
            right,
            bottom,
            baseline: self.baseline,
            left_margin,
            top_margin,
            right_margin,
            bottom_margin,
            children: self.children.iter().map(ScriptedView::to_raw).collect(),
        }
    }
}

/// The live tree of an inflated scripted session.
#[derive(Debug)]
pub struct ScriptedRoot {
    pub views: Vec<ScriptedView>,
    ticks: Rc<Cell<u64>>,
}

impl ScriptedRoot {
    pub fn find(&self, id: &str) -> Option<&ScriptedView> {
        self.views.iter().find_map(|v| v.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut ScriptedView> {
        self.views.iter_mut().find_map(|v| v.find_mut(id))
    }

    /// Resolved text of the view with `id`.
    pub fn text_of(&self, id: &str) -> Option<&str> {
        self.find(id)?.text.as_deref()
    }

    /// Ticker callbacks executed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }
}

/// Deterministic engine with fault injection.
pub struct ScriptedEngine {
    template: Option<Vec<ScriptedView>>,
    compat: Option<Arc<dyn ViewFactory>>,
    preinstalled_factory: Option<String>,
    init_fault: Option<String>,
    faults: Vec<(RenderStep, EngineFault)>,
    panic_step: Option<RenderStep>,
    ticker: Option<Duration>,
    counters: Arc<EngineCounters>,
    properties: Option<EngineProperties>,
}

impl ScriptedEngine {
    /// An engine inflating each session's [`LayoutSource`]. Views carry no
    /// measured geometry; the root is sized to the device on the first frame.
    pub fn new() -> Self {
        Self {
            template: None,
            compat: None,
            preinstalled_factory: None,
            init_fault: None,
            faults: Vec::new(),
            panic_step: None,
            ticker: None,
            counters: Arc::new(EngineCounters::default()),
            properties: None,
        }
    }

    /// An engine inflating `template` whatever layout the session names.
    pub fn with_template(template: Vec<ScriptedView>) -> Self {
        Self {
            template: Some(template),
            compat: None,
            preinstalled_factory: None,
            init_fault: None,
            faults: Vec::new(),
            panic_step: None,
            ticker: None,
            counters: Arc::new(EngineCounters::default()),
            properties: None,
        }
    }

    /// Report the widget-compat layer as available.
    pub fn with_compat_layer(mut self) -> Self {
        self.compat = Some(Arc::new(CompatViewFactory));
        self
    }

    /// Sessions start with a foreign view factory already attached.
    pub fn with_preinstalled_factory(mut self, id: impl Into<String>) -> Self {
        self.preinstalled_factory = Some(id.into());
        self
    }

    pub fn failing_init(mut self, message: impl Into<String>) -> Self {
        self.init_fault = Some(message.into());
        self
    }

    /// Fail the given session step with `fault`.
    pub fn failing_at(mut self, step: RenderStep, fault: EngineFault) -> Self {
        self.faults.push((step, fault));
        self
    }

    /// Panic inside the given session step, outside any caller mutation.
    pub fn panicking_at(mut self, step: RenderStep) -> Self {
        self.panic_step = Some(step);
        self
    }

    /// Schedule a repeating callback on the virtual clock after inflation.
    /// A zero interval reschedules forever at the same instant.
    pub fn with_ticker(mut self, interval: Duration) -> Self {
        self.ticker = Some(interval);
        self
    }

    pub fn counters(&self) -> Arc<EngineCounters> {
        self.counters.clone()
    }

    pub fn properties(&self) -> Option<&EngineProperties> {
        self.properties.as_ref()
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine for ScriptedEngine {
    type Session = ScriptedSession;

    fn init(&mut self, properties: &EngineProperties, _asset_paths: &[PathBuf]) -> EngineResult {
        self.counters.bump(&self.counters.inits, "engine.init");
        if let Some(message) = &self.init_fault {
            return Err(EngineFault::error(message.clone()));
        }
        self.properties = Some(properties.clone());
        Ok(())
    }

    fn probe_compat_layer(&self) -> Option<Arc<dyn ViewFactory>> {
        self.compat.clone()
    }

    fn prepare_thread(&mut self) {
        self.counters.bump(&self.counters.prepared_threads, "thread.prepare");
    }

    fn cleanup_thread(&mut self) {
        self.counters.bump(&self.counters.cleaned_threads, "thread.cleanup");
    }

    fn create_session(&mut self, config: &SessionConfig) -> EngineResult<ScriptedSession> {
        if let Some(fault) = fault_for(&self.faults, RenderStep::Create) {
            return Err(fault);
        }
        self.counters.bump(&self.counters.sessions, "session.create");
        Ok(ScriptedSession {
            config: config.clone(),
            template: self.template.clone(),
            root: None,
            factory_id: self.preinstalled_factory.clone(),
            factory: None,
            faults: self.faults.clone(),
            panic_step: self.panic_step,
            ticker: self.ticker,
            ticks: Rc::new(Cell::new(0)),
            counters: self.counters.clone(),
            elapsed: 0,
            first_frame_executed: false,
            showing_layout_bounds: false,
            image: None,
        })
    }

    fn dispose(&mut self) {
        self.counters.bump(&self.counters.disposes, "engine.dispose");
    }
}

fn fault_for(faults: &[(RenderStep, EngineFault)], step: RenderStep) -> Option<EngineFault> {
    faults.iter().find(|(s, _)| *s == step).map(|(_, f)| f.clone())
}

const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

fn views_from_layout(layout: &LayoutSource) -> EngineResult<Vec<ScriptedView>> {
    let text = match layout {
        LayoutSource::Xml(xml) => Cow::Borrowed(xml.as_str()),
        LayoutSource::File(path) => Cow::Owned(
            fs::read_to_string(path)
                .map_err(|e| EngineFault::error(format!("cannot read layout {}: {}", path.display(), e)))?,
        ),
    };
    let doc = Document::parse(&text).map_err(|e| EngineFault::error(format!("malformed layout: {}", e)))?;
    Ok(vec![view_from_node(doc.root_element())])
}

fn view_from_node(node: Node<'_, '_>) -> ScriptedView {
    let mut view = ScriptedView::new(node.tag_name().name());
    if let Some(id) = node.attribute((ANDROID_NS, "id")) {
        let id = id.trim_start_matches("@+id/").trim_start_matches("@id/");
        view.id = Some(id.to_string());
    }
    view.text = node.attribute((ANDROID_NS, "text")).map(str::to_string);
    view.children = node
        .children()
        .filter(|n| n.is_element())
        .map(view_from_node)
        .collect();
    view
}

fn schedule_tick(clock: &mut VirtualClock, due: u64, interval: u64, ticks: Rc<Cell<u64>>) {
    clock.post_at(due, move |c| {
        ticks.set(ticks.get() + 1);
        schedule_tick(c, due + interval, interval, ticks);
    });
}

pub struct ScriptedSession {
    config: SessionConfig,
    template: Option<Vec<ScriptedView>>,
    root: Option<ScriptedRoot>,
    factory_id: Option<String>,
    factory: Option<Arc<dyn ViewFactory>>,
    faults: Vec<(RenderStep, EngineFault)>,
    panic_step: Option<RenderStep>,
    ticker: Option<Duration>,
    ticks: Rc<Cell<u64>>,
    counters: Arc<EngineCounters>,
    elapsed: u64,
    first_frame_executed: bool,
    showing_layout_bounds: bool,
    image: Option<RasterImage>,
}

impl ScriptedSession {
    fn check(&self, step: RenderStep) -> EngineResult {
        if self.panic_step == Some(step) {
            panic!("scripted engine panicked during {}", step);
        }
        match fault_for(&self.faults, step) {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn inflate_view(&self, view: &mut ScriptedView, parent: Option<&str>) {
        if let Some(factory) = &self.factory {
            if let Some(class_name) = factory.create_view(parent, &view.tag) {
                view.class_name = class_name;
            }
        }
        let resolved = view
            .text
            .as_deref()
            .and_then(|text| self.config.resources.resolve_reference(text))
            .map(str::to_string);
        if resolved.is_some() {
            view.text = resolved;
        }
        let class_name = view.class_name.clone();
        for child in &mut view.children {
            self.inflate_view(child, Some(&class_name));
        }
    }

    fn background(&self) -> [u8; 4] {
        self.config
            .resources
            .lookup(&ResourceKey::new(ResourceType::Color, "background"))
            .and_then(parse_color)
            .unwrap_or([255, 255, 255, 255])
    }
}

fn parse_color(value: &str) -> Option<[u8; 4]> {
    let hex_digits = value.strip_prefix('#')?;
    let channel = |i: usize| u8::from_str_radix(hex_digits.get(i..i + 2)?, 16).ok();
    match hex_digits.len() {
        6 => Some([channel(0)?, channel(2)?, channel(4)?, 255]),
        8 => Some([channel(2)?, channel(4)?, channel(6)?, channel(0)?]),
        _ => None,
    }
}

fn paint(image: &mut RasterImage, view: &ScriptedView, depth: u8) {
    if view.is_measured() {
        let [l, t, r, b] = view.bounds;
        let shade = 255u8.saturating_sub(depth.saturating_mul(24));
        image.fill_rect(l, t, r, b, [shade, shade, shade, 255]);
        if view.showing_layout_bounds {
            image.fill_rect(l, t, r, t + 1, [255, 0, 255, 255]);
        }
    }
    for child in &view.children {
        paint(image, child, depth.saturating_add(1));
    }
}

impl RenderSession for ScriptedSession {
    type Root = ScriptedRoot;

    fn set_elapsed_time(&mut self, nanos: u64) {
        self.elapsed = nanos;
    }

    fn set_first_frame_executed(&mut self, executed: bool) {
        self.first_frame_executed = executed;
    }

    fn init(&mut self, timeout: Duration) -> EngineResult {
        self.counters.record("session.init");
        self.check(RenderStep::Init)?;
        if timeout.is_zero() {
            return Err(EngineFault::timeout("session lock not acquired within 0ms"));
        }
        Ok(())
    }

    fn installed_view_factory(&self) -> Option<String> {
        self.factory_id.clone()
    }

    fn install_view_factory(&mut self, factory: Arc<dyn ViewFactory>) {
        self.counters.record(format!("factory.install:{}", factory.id()));
        self.factory_id = Some(factory.id().to_string());
        self.factory = Some(factory);
    }

    fn inflate(&mut self, clock: &mut VirtualClock) -> EngineResult {
        self.counters.bump(&self.counters.inflates, "session.inflate");
        self.check(RenderStep::Inflate)?;
        let mut views = match &self.template {
            Some(template) => template.clone(),
            None => views_from_layout(&self.config.layout)?,
        };
        for view in &mut views {
            self.inflate_view(view, None);
        }
        if let Some(interval) = self.ticker {
            let interval = u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX);
            let first = clock.now().saturating_add(interval);
            schedule_tick(clock, first, interval, self.ticks.clone());
        }
        self.root = Some(ScriptedRoot {
            views,
            ticks: self.ticks.clone(),
        });
        Ok(())
    }

    fn root_mut(&mut self) -> Option<&mut ScriptedRoot> {
        self.root.as_mut()
    }

    fn set_showing_layout_bounds(&mut self, show: bool) {
        self.showing_layout_bounds = show;
        if let Some(root) = &mut self.root {
            for view in &mut root.views {
                for child in &mut view.children {
                    child.showing_layout_bounds = show;
                }
            }
        }
    }

    fn drain_scheduled_callbacks(&mut self, now: u64) -> EngineResult {
        self.counters.bump(&self.counters.drains, format!("session.drain@{}", now));
        self.check(RenderStep::Frame)
    }

    fn render(&mut self, force_measure: bool, _clock: &mut VirtualClock) -> EngineResult {
        self.counters.bump(&self.counters.renders, format!("session.render@{}", self.elapsed));
        self.check(RenderStep::Render)?;
        if !self.first_frame_executed {
            return Err(EngineFault::error("first frame was not marked as executed"));
        }
        let (width, height) = (self.config.device.width, self.config.device.height);
        let mut image = RasterImage::filled(width, height, self.background());
        let ticks = self.ticks.get();
        let Some(root) = &mut self.root else {
            return Err(EngineFault::error("render before inflate"));
        };
        if force_measure {
            for view in &mut root.views {
                if !view.is_measured() {
                    view.bounds = [0, 0, width as i32, height as i32];
                }
            }
        }
        for view in &root.views {
            paint(&mut image, view, 0);
        }
        // Frame marker pixel: ticker count in the red channel.
        image.fill_rect(0, 0, 1, 1, [(ticks % 256) as u8, 0, 0, 255]);
        self.image = Some(image);
        Ok(())
    }

    fn capture(&self) -> EngineResult<EngineCapture> {
        self.counters.record("session.capture");
        self.check(RenderStep::Capture)?;
        let image = self
            .image
            .clone()
            .ok_or_else(|| EngineFault::error("no frame has been rendered"))?;
        let root_views = self
            .root
            .as_ref()
            .map(|r| r.views.iter().map(ScriptedView::to_raw).collect())
            .unwrap_or_default();
        let system_views = if self.config.decor {
            let (w, h) = (self.config.device.width as i32, self.config.device.height as i32);
            let mut decor = RawView::unmeasured("com.android.internal.policy.DecorView");
            decor.left = 0;
            decor.top = 0;
            decor.right = w;
            decor.bottom = h;
            decor.children.push(RawView::unmeasured("StatusBar"));
            decor.children.push(RawView::unmeasured("NavigationBar"));
            vec![decor]
        } else {
            Vec::new()
        };
        Ok(EngineCapture {
            system_views,
            root_views,
            image,
        })
    }

    fn release(&mut self) {
        self.counters.bump(&self.counters.releases, "session.release");
        self.root = None;
        self.image = None;
        self.factory = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compat_factory_maps_platform_widgets() {
        let f = CompatViewFactory;
        assert_eq!(
            f.create_view(None, "TextView").as_deref(),
            Some("androidx.appcompat.widget.AppCompatTextView")
        );
        assert!(f.create_view(None, "FrameLayout").is_none());
    }

    #[test]
    fn parse_color_supports_rgb_and_argb() {
        assert_eq!(parse_color("#102030"), Some([0x10, 0x20, 0x30, 255]));
        assert_eq!(parse_color("#80102030"), Some([0x10, 0x20, 0x30, 0x80]));
        assert_eq!(parse_color("red"), None);
    }

    #[test]
    fn ticker_reschedules_within_one_drain() {
        let ticks = Rc::new(Cell::new(0));
        let mut clock = VirtualClock::default();
        schedule_tick(&mut clock, 10, 10, ticks.clone());
        clock.drain(35).unwrap();
        assert_eq!(ticks.get(), 3);
        assert_eq!(clock.next_due(), Some(40));
    }

    #[test]
    fn layout_elements_become_views() {
        let xml = r#"<LinearLayout xmlns:android="http://schemas.android.com/apk/res/android">
    <TextView android:id="@+id/title" android:text="@string/app_name"/>
    <FrameLayout><View android:id="@id/inner"/></FrameLayout>
</LinearLayout>"#;
        let views = views_from_layout(&LayoutSource::Xml(xml.to_string())).unwrap();
        assert_eq!(views.len(), 1);
        let root = &views[0];
        assert_eq!(root.tag, "LinearLayout");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.find("title").and_then(|v| v.text.as_deref()), Some("@string/app_name"));
        assert_eq!(root.find("inner").map(|v| v.tag.as_str()), Some("View"));
        assert_eq!(root.bounds, [RawView::UNMEASURED; 4]);
    }

    #[test]
    fn unreadable_layouts_are_inflate_faults() {
        assert!(views_from_layout(&LayoutSource::Xml("<LinearLayout>".into())).is_err());
        let missing = views_from_layout(&LayoutSource::File(PathBuf::from("/nonexistent/layout.xml")));
        assert!(missing.unwrap_err().message.contains("cannot read layout"));
    }

    #[test]
    fn views_find_by_id() {
        let tree = ScriptedView::new("FrameLayout")
            .with_id("root")
            .with_child(ScriptedView::new("TextView").with_id("title").with_text("Hi"));
        assert_eq!(tree.find("title").and_then(|v| v.text.as_deref()), Some("Hi"));
        assert!(tree.find("missing").is_none());
        let raw = tree.to_raw();
        assert_eq!(raw.children.len(), 1);
        assert_eq!(raw.left, RawView::UNMEASURED);
    }
}
