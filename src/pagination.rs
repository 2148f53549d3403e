//! Discrete page state on top of the engine's continuous layout.
//!
//! The engine owns layout; this controller owns the answers the reader shell
//! asks synchronously (`can_go_left`, `can_go_right`, `is_page_turning`) and
//! keeps them consistent with acknowledged navigation only.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::book::{Book, PageProgression};
use crate::script::{OpenPageRequest, ScriptCommand};

/// Page within a spine item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePosition {
    pub spine_index: usize,
    pub page_index: usize,
    /// Pages in the spine item, at least 1.
    pub page_count: usize,
}

impl Default for PagePosition {
    fn default() -> Self {
        Self {
            spine_index: 0,
            page_index: 0,
            page_count: 1,
        }
    }
}

/// Physical turn direction, as pressed by the reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageTurnDirection {
    Left,
    Right,
}

/// Snapshot of navigation state exposed to the shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageState {
    pub position: PagePosition,
    pub can_go_left: bool,
    pub can_go_right: bool,
    pub is_page_turning: bool,
}

/// Result of a page-turn request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn was queued for the engine.
    Dispatched,
    /// The request was ignored.
    Rejected(TurnRejection),
    /// The turn could not be queued; the error went to the delegate.
    Failed,
}

/// Why a page-turn request was ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnRejection {
    /// Another turn has not settled yet.
    AlreadyTurning,
    /// No page exists in that direction.
    AtBoundary,
}

/// Persistable reading position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub idref: String,
    pub spine_index: usize,
    pub page_index: usize,
    pub page_count: usize,
    /// Progress through the whole book in `[0.0, 1.0]`.
    pub progress: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaginationInfo {
    #[serde(default)]
    open_pages: Vec<OpenPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenPage {
    #[serde(default)]
    spine_item_index: Option<usize>,
    #[serde(default)]
    idref: Option<String>,
    #[serde(default)]
    spine_item_page_index: usize,
    #[serde(default)]
    spine_item_page_count: usize,
}

/// Page-turn state machine.
#[derive(Clone, Debug)]
pub struct PaginationController {
    book: Arc<Book>,
    /// First visible page (left page of a spread in LTR books).
    first: PagePosition,
    /// Last visible page; equals `first` outside of spreads.
    last: PagePosition,
    turning: Option<PageTurnDirection>,
    can_go_left: bool,
    can_go_right: bool,
}

impl PaginationController {
    pub fn new(book: Arc<Book>) -> Self {
        let mut controller = Self {
            book,
            first: PagePosition::default(),
            last: PagePosition::default(),
            turning: None,
            can_go_left: false,
            can_go_right: false,
        };
        controller.recompute();
        controller
    }

    pub fn position(&self) -> PagePosition {
        self.first
    }

    pub fn can_go_left(&self) -> bool {
        self.can_go_left
    }

    pub fn can_go_right(&self) -> bool {
        self.can_go_right
    }

    pub fn is_page_turning(&self) -> bool {
        self.turning.is_some()
    }

    pub fn state(&self) -> PageState {
        PageState {
            position: self.first,
            can_go_left: self.can_go_left,
            can_go_right: self.can_go_right,
            is_page_turning: self.is_page_turning(),
        }
    }

    /// Start a turn. On success the controller is turning until
    /// [`complete_turn`](Self::complete_turn) or [`fail_turn`](Self::fail_turn).
    pub fn request_turn(
        &mut self,
        direction: PageTurnDirection,
    ) -> Result<ScriptCommand, TurnRejection> {
        if self.turning.is_some() {
            return Err(TurnRejection::AlreadyTurning);
        }
        let allowed = match direction {
            PageTurnDirection::Left => self.can_go_left,
            PageTurnDirection::Right => self.can_go_right,
        };
        if !allowed {
            return Err(TurnRejection::AtBoundary);
        }
        self.turning = Some(direction);
        Ok(match direction {
            PageTurnDirection::Left => ScriptCommand::OpenPageLeft,
            PageTurnDirection::Right => ScriptCommand::OpenPageRight,
        })
    }

    /// Settle the running turn with the engine's pagination payload.
    ///
    /// Payloads without open pages advance one spine item in the turn direction.
    pub fn complete_turn(&mut self, payload: &Value) -> PagePosition {
        let direction = self.turning.take();
        if !self.apply_pagination(payload) {
            if let Some(direction) = direction {
                let spine_index = self.step_spine_index(direction);
                self.set_visible(PagePosition {
                    spine_index,
                    page_index: 0,
                    page_count: 1,
                });
            }
        }
        self.recompute();
        self.first
    }

    /// Abandon the running turn; the position is unchanged.
    pub fn fail_turn(&mut self) {
        self.turning = None;
        self.recompute();
    }

    /// Apply a pagination payload (`{ openPages: [...] }`). Returns `false`
    /// when the payload carries no usable page.
    pub fn apply_pagination(&mut self, payload: &Value) -> bool {
        let info = match PaginationInfo::deserialize(payload) {
            Ok(info) => info,
            Err(err) => {
                log::debug!("pagination: ignoring payload: {}", err);
                return false;
            }
        };
        let mut pages = info
            .open_pages
            .iter()
            .filter_map(|page| self.resolve_open_page(page));
        let Some(first) = pages.next() else {
            return false;
        };
        let last = pages.last().unwrap_or(first);
        self.first = first;
        self.last = last;
        self.recompute();
        true
    }

    /// Move to `position` directly (initial location, jumps).
    pub fn jump_to(&mut self, position: PagePosition) {
        let spine_len = self.book.spine_len().max(1);
        let page_count = position.page_count.max(1);
        self.set_visible(PagePosition {
            spine_index: position.spine_index.min(spine_len - 1),
            page_index: position.page_index.min(page_count - 1),
            page_count,
        });
        self.recompute();
    }

    /// Position for a persisted location; the idref wins over the index.
    pub fn position_for_location(&self, location: &Location) -> PagePosition {
        let spine_index = self
            .book
            .spine_index_for_idref(&location.idref)
            .unwrap_or(location.spine_index);
        page_position(spine_index, location.page_index, location.page_count)
    }

    /// Page request passed to `openBook` so the engine opens where we are.
    pub fn open_page_request(&self) -> Option<OpenPageRequest> {
        let item = self.book.spine_item(self.first.spine_index)?;
        Some(OpenPageRequest {
            idref: item.idref.clone(),
            spine_item_page_index: self.first.page_index,
        })
    }

    pub fn location(&self) -> Location {
        let idref = self
            .book
            .spine_item(self.first.spine_index)
            .map(|item| item.idref.clone())
            .unwrap_or_default();
        Location {
            idref,
            spine_index: self.first.spine_index,
            page_index: self.first.page_index,
            page_count: self.first.page_count,
            progress: self.book_progress(),
        }
    }

    fn book_progress(&self) -> f32 {
        let spine_len = self.book.spine_len().max(1);
        let chapter = page_progress_from_count(self.first.page_index, self.first.page_count);
        normalize_progress((self.first.spine_index as f32 + chapter) / spine_len as f32)
    }

    fn resolve_open_page(&self, page: &OpenPage) -> Option<PagePosition> {
        let spine_index = page
            .spine_item_index
            .or_else(|| {
                page.idref
                    .as_deref()
                    .and_then(|idref| self.book.spine_index_for_idref(idref))
            })
            .filter(|index| *index < self.book.spine_len())?;
        Some(page_position(
            spine_index,
            page.spine_item_page_index,
            page.spine_item_page_count,
        ))
    }

    fn step_spine_index(&self, direction: PageTurnDirection) -> usize {
        let forward = match (direction, self.book.page_progression()) {
            (PageTurnDirection::Right, PageProgression::LeftToRight)
            | (PageTurnDirection::Left, PageProgression::RightToLeft) => true,
            (PageTurnDirection::Left, PageProgression::LeftToRight)
            | (PageTurnDirection::Right, PageProgression::RightToLeft) => false,
        };
        if forward {
            self.last
                .spine_index
                .saturating_add(1)
                .min(self.book.spine_len().saturating_sub(1))
        } else {
            self.first.spine_index.saturating_sub(1)
        }
    }

    fn set_visible(&mut self, position: PagePosition) {
        self.first = position;
        self.last = position;
    }

    fn at_start(&self) -> bool {
        self.first.spine_index == 0 && self.first.page_index == 0
    }

    fn at_end(&self) -> bool {
        self.last.spine_index.saturating_add(1) >= self.book.spine_len()
            && self.last.page_index.saturating_add(1) >= self.last.page_count
    }

    fn recompute(&mut self) {
        let has_previous = !self.at_start();
        let has_next = !self.at_end();
        match self.book.page_progression() {
            PageProgression::LeftToRight => {
                self.can_go_left = has_previous;
                self.can_go_right = has_next;
            }
            PageProgression::RightToLeft => {
                self.can_go_left = has_next;
                self.can_go_right = has_previous;
            }
        }
    }
}

/// A reported page count of zero means "unknown"; an index past the
/// reported count wins over the count.
fn page_position(spine_index: usize, page_index: usize, page_count: usize) -> PagePosition {
    PagePosition {
        spine_index,
        page_index,
        page_count: page_count.max(page_index.saturating_add(1)),
    }
}

fn normalize_progress(progress: f32) -> f32 {
    if progress.is_finite() {
        return progress.clamp(0.0, 1.0);
    }
    0.0
}

fn page_progress_from_count(page_index: usize, page_count: usize) -> f32 {
    if page_count <= 1 {
        return 1.0;
    }
    let clamped = page_index.min(page_count.saturating_sub(1));
    (clamped as f32 / (page_count - 1) as f32).clamp(0.0, 1.0)
}
