use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use epub_stream_webview::{
    Location, OverlayState, Rect, RendererDelegate, RendererError, RendererOptions,
    WebViewRenderer,
};
use epub_stream_webview_sim::{ManualClock, SimBook, SimEngine, SimHandle};

pub const FRAME: Rect = Rect::new(0.0, 0.0, 400.0, 600.0);

/// Everything the renderer told its delegate, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum DelegateEvent {
    ContentReady,
    Navigated(Location),
    Error(String),
    Overlay(OverlayState),
    Degraded(bool),
}

#[derive(Debug, Default)]
pub struct RecordingDelegate {
    events: RefCell<Vec<DelegateEvent>>,
}

impl RecordingDelegate {
    pub fn events(&self) -> Vec<DelegateEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                DelegateEvent::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<Location> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                DelegateEvent::Navigated(location) => Some(location.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn content_ready_count(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| **event == DelegateEvent::ContentReady)
            .count()
    }

    pub fn last_overlay(&self) -> Option<OverlayState> {
        self.events.borrow().iter().rev().find_map(|event| match event {
            DelegateEvent::Overlay(state) => Some(*state),
            _ => None,
        })
    }

    fn push(&self, event: DelegateEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl RendererDelegate for RecordingDelegate {
    fn content_ready(&self) {
        self.push(DelegateEvent::ContentReady);
    }

    fn navigated(&self, location: &Location) {
        self.push(DelegateEvent::Navigated(location.clone()));
    }

    fn error(&self, error: &RendererError) {
        self.push(DelegateEvent::Error(error.to_string()));
    }

    fn media_overlay_changed(&self, state: OverlayState) {
        self.push(DelegateEvent::Overlay(state));
    }

    fn engine_degraded(&self, degraded: bool) {
        self.push(DelegateEvent::Degraded(degraded));
    }
}

/// A renderer wired to the simulated engine, a manual clock and a recording
/// delegate.
pub struct Harness {
    pub renderer: WebViewRenderer<SimEngine>,
    pub engine: SimHandle,
    pub delegate: Rc<RecordingDelegate>,
    pub clock: ManualClock,
}

impl Harness {
    /// Session whose host document load has been requested but not pumped.
    pub fn new(layout: SimBook) -> Self {
        Self::with(layout, RendererOptions::default(), |_| {})
    }

    /// Like [`Harness::new`], with options and engine setup applied before
    /// the load is requested.
    pub fn with(layout: SimBook, options: RendererOptions, setup: impl FnOnce(&SimHandle)) -> Self {
        let book = Arc::new(layout.to_book("urn:uuid:harness"));
        let (engine, handle) = SimEngine::new(layout);
        setup(&handle);
        let delegate = Rc::new(RecordingDelegate::default());
        let clock = ManualClock::new();
        let renderer = WebViewRenderer::new(FRAME, book, &delegate, engine)
            .unwrap_or_else(|e| panic!("renderer: {}", e))
            .with_options(options)
            .with_clock(clock.clone());
        Self {
            renderer,
            engine: handle,
            delegate,
            clock,
        }
    }

    /// Session with the book open on its first page.
    pub fn open(layout: SimBook) -> Self {
        let mut harness = Self::new(layout);
        harness.renderer.pump();
        harness
    }

    /// Apply a builder step to the renderer.
    pub fn configure(
        self,
        step: impl FnOnce(WebViewRenderer<SimEngine>) -> WebViewRenderer<SimEngine>,
    ) -> Self {
        Self {
            renderer: step(self.renderer),
            ..self
        }
    }

    pub fn pump(&mut self) -> usize {
        self.renderer.pump()
    }

    /// Release held acknowledgments one at a time until none are left.
    pub fn ack_all(&mut self) {
        loop {
            self.renderer.pump();
            if !self.engine.ack_next() {
                break;
            }
        }
        self.renderer.pump();
    }

    /// `(spine_index, page_index)` as the renderer sees it.
    pub fn position(&self) -> (usize, usize) {
        let state = self.renderer.page_state();
        (state.position.spine_index, state.position.page_index)
    }
}
