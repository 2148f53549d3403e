//! In-memory content engine for exercising `epub-stream-webview` sessions.
//!
//! [`SimEngine`] understands the reader script grammar, keeps a page cursor
//! over a [`SimBook`] and answers element queries from declared link regions.
//! A [`SimHandle`] shares its state with the test: it can hold
//! acknowledgments back, release them in any order, reload the host document
//! and inject engine events.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use epub_stream_webview::script::{HOST_RECEIVER, READER_RECEIVER};
use epub_stream_webview::{
    Book, Clock, CommandId, ContentEngine, EngineError, EngineEvent, EngineEventSender,
    PageProgression, Point, Rect, ScriptCall, SpineItem,
};
use serde_json::{json, Value};

/// A link region in content coordinates of one spine item.
#[derive(Clone, Debug, PartialEq)]
pub struct SimLink {
    pub rect: Rect,
    pub href: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimChapter {
    pub idref: String,
    pub pages: usize,
    pub links: Vec<SimLink>,
    pub narrated: bool,
}

impl SimChapter {
    pub fn href(&self) -> String {
        format!("{}.xhtml", self.idref)
    }
}

/// Book layout the simulator paginates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimBook {
    chapters: Vec<SimChapter>,
    progression: PageProgression,
}

impl SimBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` chapters of `pages` pages each, named `c0`, `c1`, ...
    pub fn uniform(count: usize, pages: usize) -> Self {
        (0..count).fold(Self::new(), |book, idx| {
            book.chapter(format!("c{idx}"), pages)
        })
    }

    pub fn chapter(mut self, idref: impl Into<String>, pages: usize) -> Self {
        self.chapters.push(SimChapter {
            idref: idref.into(),
            pages: pages.max(1),
            links: Vec::new(),
            narrated: false,
        });
        self
    }

    /// Add a link to chapter `spine_index`. Ignored for unknown chapters.
    pub fn link(mut self, spine_index: usize, rect: Rect, href: impl Into<String>) -> Self {
        if let Some(chapter) = self.chapters.get_mut(spine_index) {
            chapter.links.push(SimLink {
                rect,
                href: href.into(),
            });
        }
        self
    }

    pub fn narrated(mut self, spine_index: usize) -> Self {
        if let Some(chapter) = self.chapters.get_mut(spine_index) {
            chapter.narrated = true;
        }
        self
    }

    pub fn right_to_left(mut self) -> Self {
        self.progression = PageProgression::RightToLeft;
        self
    }

    pub fn chapters(&self) -> &[SimChapter] {
        &self.chapters
    }

    /// Book value matching this layout.
    pub fn to_book(&self, id: &str) -> Book {
        let spine = self
            .chapters
            .iter()
            .map(|chapter| {
                let item = SpineItem::new(chapter.idref.clone(), chapter.href());
                if chapter.narrated {
                    item.with_media_overlay(format!("mo-{}", chapter.idref))
                } else {
                    item
                }
            })
            .collect();
        Book::new(id, spine).with_page_progression(self.progression)
    }
}

/// When script completions are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AckMode {
    /// During `evaluate`.
    #[default]
    Immediate,
    /// When the test releases them through [`SimHandle`].
    Manual,
}

#[derive(Debug, Default)]
struct SimState {
    book: SimBook,
    sender: Option<EngineEventSender>,
    ack_mode: AckMode,
    manual_load: bool,
    refuse_load: bool,
    refuse_scripts: bool,
    frame: Rect,
    spine_index: usize,
    page_index: usize,
    rtl: bool,
    playing: bool,
    held: VecDeque<(CommandId, Result<String, String>)>,
    scripts: Vec<String>,
    canned: HashMap<String, String>,
    loads: usize,
    shut_down: bool,
}

impl SimState {
    fn send(&self, event: EngineEvent) -> bool {
        match &self.sender {
            Some(sender) => sender.send(event),
            None => false,
        }
    }

    fn page_count(&self, spine_index: usize) -> usize {
        self.book
            .chapters
            .get(spine_index)
            .map_or(1, |chapter| chapter.pages)
    }

    fn chapter(&self) -> Option<&SimChapter> {
        self.book.chapters.get(self.spine_index)
    }

    fn pagination(&self) -> Value {
        let idref = self.chapter().map(|chapter| chapter.idref.as_str());
        json!({
            "openPages": [{
                "spineItemIndex": self.spine_index,
                "idref": idref,
                "spineItemPageIndex": self.page_index,
                "spineItemPageCount": self.page_count(self.spine_index),
            }]
        })
    }

    fn go_to(&mut self, spine_index: usize, page_index: usize) {
        let last_spine = self.book.chapters.len().saturating_sub(1);
        self.spine_index = spine_index.min(last_spine);
        self.page_index = page_index.min(self.page_count(self.spine_index) - 1);
    }

    fn forward(&mut self) {
        if self.page_index + 1 < self.page_count(self.spine_index) {
            self.page_index += 1;
        } else if self.spine_index + 1 < self.book.chapters.len() {
            self.spine_index += 1;
            self.page_index = 0;
        }
    }

    fn backward(&mut self) {
        if self.page_index > 0 {
            self.page_index -= 1;
        } else if self.spine_index > 0 {
            self.spine_index -= 1;
            self.page_index = self.page_count(self.spine_index) - 1;
        }
    }

    fn run(&mut self, script: &str) -> Result<String, String> {
        if let Some(result) = self.canned.get(script) {
            return Ok(result.clone());
        }
        let call = ScriptCall::parse(script)
            .ok_or_else(|| format!("SyntaxError: cannot evaluate `{script}`"))?;
        let result = match (call.receiver.as_str(), call.method.as_str()) {
            (READER_RECEIVER, "openBook") => {
                self.rtl = call.args.first().and_then(|package| {
                    package.pointer("/spine/direction").and_then(Value::as_str)
                }) == Some("rtl");
                let target = call.args.get(2).and_then(|page| {
                    let idref = page.get("idref")?.as_str()?;
                    let spine = self.book.chapters.iter().position(|c| c.idref == idref)?;
                    let page = page.get("spineItemPageIndex")?.as_u64()?;
                    Some((spine, usize::try_from(page).ok()?))
                });
                let (spine, page) = target.unwrap_or((0, 0));
                self.playing = false;
                self.go_to(spine, page);
                self.pagination()
            }
            (READER_RECEIVER, "openPageRight") => {
                self.playing = false;
                if self.rtl {
                    self.backward();
                } else {
                    self.forward();
                }
                self.pagination()
            }
            (READER_RECEIVER, "openPageLeft") => {
                self.playing = false;
                if self.rtl {
                    self.forward();
                } else {
                    self.backward();
                }
                self.pagination()
            }
            (READER_RECEIVER, "openSpineItemPage") => {
                let idref = call.args.first().and_then(Value::as_str).unwrap_or_default();
                let spine = self
                    .book
                    .chapters
                    .iter()
                    .position(|chapter| chapter.idref == idref)
                    .ok_or_else(|| format!("Error: no spine item {idref}"))?;
                let page = call.args.get(1).and_then(Value::as_u64).unwrap_or(0);
                self.go_to(spine, usize::try_from(page).unwrap_or(0));
                self.pagination()
            }
            (READER_RECEIVER, "openContentUrl") => {
                let href = call.args.first().and_then(Value::as_str).unwrap_or_default();
                let path = href.split_once('#').map_or(href, |(path, _)| path);
                let spine = self
                    .book
                    .chapters
                    .iter()
                    .position(|chapter| chapter.href() == path)
                    .ok_or_else(|| format!("Error: no content at {href}"))?;
                self.go_to(spine, 0);
                self.pagination()
            }
            (READER_RECEIVER, "updateSettings") | (READER_RECEIVER, "getPaginationInfo") => {
                self.pagination()
            }
            (READER_RECEIVER, "isMediaOverlayAvailable") => {
                Value::Bool(self.chapter().is_some_and(|chapter| chapter.narrated))
            }
            (READER_RECEIVER, "toggleMediaOverlay") => {
                if self.chapter().is_some_and(|chapter| chapter.narrated) {
                    self.playing = !self.playing;
                }
                Value::Bool(self.playing)
            }
            (READER_RECEIVER, "pauseMediaOverlay") => {
                self.playing = false;
                Value::Null
            }
            (HOST_RECEIVER, "elementAtPoint") => {
                let coord = |idx: usize| call.args.get(idx).and_then(Value::as_f64).unwrap_or(-1.0);
                let point = Point::new(coord(0) as f32, coord(1) as f32);
                let link = self.chapter().and_then(|chapter| {
                    chapter.links.iter().find(|link| link.rect.contains(point))
                });
                match link {
                    Some(link) => json!({ "tagName": "A", "href": link.href }),
                    None => json!({ "tagName": "P" }),
                }
            }
            (receiver, method) => {
                return Err(format!("TypeError: {receiver}.{method} is not a function"));
            }
        };
        Ok(result.to_string())
    }
}

/// Simulated engine handed to the renderer.
#[derive(Debug)]
pub struct SimEngine {
    state: Rc<RefCell<SimState>>,
}

/// Test-side view of a [`SimEngine`].
#[derive(Clone, Debug)]
pub struct SimHandle {
    state: Rc<RefCell<SimState>>,
}

impl SimEngine {
    pub fn new(book: SimBook) -> (Self, SimHandle) {
        let state = Rc::new(RefCell::new(SimState {
            book,
            ..SimState::default()
        }));
        (
            Self {
                state: Rc::clone(&state),
            },
            SimHandle { state },
        )
    }
}

impl ContentEngine for SimEngine {
    fn attach(&mut self, events: EngineEventSender) {
        self.state.borrow_mut().sender = Some(events);
    }

    fn load_host_document(&mut self, frame: Rect) -> Result<(), EngineError> {
        let mut state = self.state.borrow_mut();
        if state.refuse_load {
            return Err(EngineError::new("web view unavailable"));
        }
        state.frame = frame;
        state.loads += 1;
        state.send(EngineEvent::LoadStarted);
        if !state.manual_load {
            state.send(EngineEvent::LoadFinished);
        }
        Ok(())
    }

    fn evaluate(&mut self, id: CommandId, script: &str) -> Result<(), EngineError> {
        let mut state = self.state.borrow_mut();
        if state.refuse_scripts {
            return Err(EngineError::new("evaluation unavailable"));
        }
        state.scripts.push(script.to_string());
        let result = state.run(script);
        log::trace!("sim: {} {} -> {:?}", id, script, result);
        match state.ack_mode {
            AckMode::Immediate => {
                state.send(EngineEvent::ScriptCompleted { id, result });
            }
            AckMode::Manual => state.held.push_back((id, result)),
        }
        Ok(())
    }

    fn set_frame(&mut self, frame: Rect) {
        let mut state = self.state.borrow_mut();
        state.frame = frame;
        let payload = state.pagination().to_string();
        state.send(EngineEvent::PaginationChanged { payload });
    }

    fn shutdown(&mut self) {
        self.state.borrow_mut().shut_down = true;
    }
}

impl SimHandle {
    pub fn set_ack_mode(&self, mode: AckMode) {
        self.state.borrow_mut().ack_mode = mode;
    }

    /// Leave loads in progress until [`finish_load`](Self::finish_load).
    pub fn set_manual_load(&self, manual: bool) {
        self.state.borrow_mut().manual_load = manual;
    }

    pub fn set_refuse_load(&self, refuse: bool) {
        self.state.borrow_mut().refuse_load = refuse;
    }

    pub fn set_refuse_scripts(&self, refuse: bool) {
        self.state.borrow_mut().refuse_scripts = refuse;
    }

    /// Answer `script` verbatim with `result_json` instead of interpreting it.
    pub fn set_script_result(&self, script: impl Into<String>, result_json: impl Into<String>) {
        self.state
            .borrow_mut()
            .canned
            .insert(script.into(), result_json.into());
    }

    pub fn send(&self, event: EngineEvent) -> bool {
        self.state.borrow().send(event)
    }

    pub fn finish_load(&self) -> bool {
        self.send(EngineEvent::LoadFinished)
    }

    /// Reload the host document, as a web view does after its content
    /// process dies. Reader state inside the document is lost.
    pub fn reload(&self) {
        let mut state = self.state.borrow_mut();
        state.loads += 1;
        state.playing = false;
        state.spine_index = 0;
        state.page_index = 0;
        state.held.clear();
        state.send(EngineEvent::LoadStarted);
        if !state.manual_load {
            state.send(EngineEvent::LoadFinished);
        }
    }

    pub fn fail_load(&self, message: impl Into<String>) -> bool {
        self.send(EngineEvent::LoadFailed {
            message: message.into(),
        })
    }

    pub fn set_responding(&self, responding: bool) -> bool {
        self.send(EngineEvent::ResponderChanged { responding })
    }

    pub fn heartbeat(&self) -> bool {
        self.send(EngineEvent::Heartbeat)
    }

    /// Narration stopped or started from inside the content.
    pub fn report_playback(&self, playing: bool) -> bool {
        let mut state = self.state.borrow_mut();
        state.playing = playing;
        state.send(EngineEvent::MediaOverlayStatusChanged { playing })
    }

    /// Ids of completions held back in [`AckMode::Manual`], oldest first.
    pub fn held_ids(&self) -> Vec<CommandId> {
        self.state.borrow().held.iter().map(|(id, _)| *id).collect()
    }

    /// Release the held completion for `id`.
    pub fn ack(&self, id: CommandId) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(pos) = state.held.iter().position(|(held, _)| *held == id) else {
            return false;
        };
        let Some((id, result)) = state.held.remove(pos) else {
            return false;
        };
        state.send(EngineEvent::ScriptCompleted { id, result })
    }

    /// Release the oldest held completion.
    pub fn ack_next(&self) -> bool {
        let next = self.state.borrow().held.front().map(|(id, _)| *id);
        next.is_some_and(|id| self.ack(id))
    }

    /// Forget held completions without reporting them.
    pub fn drop_held(&self) -> usize {
        let mut state = self.state.borrow_mut();
        let dropped = state.held.len();
        state.held.clear();
        dropped
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state.borrow().scripts.clone()
    }

    pub fn script_count(&self) -> usize {
        self.state.borrow().scripts.len()
    }

    pub fn last_script(&self) -> Option<String> {
        self.state.borrow().scripts.last().cloned()
    }

    /// Scripts calling `method`, in dispatch order.
    pub fn calls_to(&self, method: &str) -> usize {
        self.state
            .borrow()
            .scripts
            .iter()
            .filter_map(|script| ScriptCall::parse(script))
            .filter(|call| call.method == method)
            .count()
    }

    /// Engine-side `(spine_index, page_index)`.
    pub fn position(&self) -> (usize, usize) {
        let state = self.state.borrow();
        (state.spine_index, state.page_index)
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    pub fn frame(&self) -> Rect {
        self.state.borrow().frame
    }

    pub fn load_count(&self) -> usize {
        self.state.borrow().loads
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.borrow().shut_down
    }
}

/// Clock advanced by hand.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
