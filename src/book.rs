//! Read-only book model consumed by the renderer.
//!
//! Package parsing lives elsewhere; the renderer only needs spine order,
//! hrefs, media overlay references and the page progression direction.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Reading direction of the spine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageProgression {
    #[default]
    #[serde(rename = "ltr")]
    LeftToRight,
    #[serde(rename = "rtl")]
    RightToLeft,
}

/// One entry in spine order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpineItem {
    /// Spine index (0-based). Assigned by [`Book::new`].
    pub index: usize,
    /// Manifest id referenced by the spine.
    pub idref: String,
    /// Content href in package-relative form.
    pub href: String,
    /// Manifest id of the SMIL media overlay bound to this item, if any.
    pub media_overlay: Option<String>,
}

impl SpineItem {
    pub fn new(idref: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            index: 0,
            idref: idref.into(),
            href: href.into(),
            media_overlay: None,
        }
    }

    pub fn with_media_overlay(mut self, overlay_id: impl Into<String>) -> Self {
        self.media_overlay = Some(overlay_id.into());
        self
    }
}

/// Book identity and spine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Book {
    id: String,
    title: String,
    spine: Vec<SpineItem>,
    page_progression: PageProgression,
}

impl Book {
    /// Build a book; spine indices are renumbered to match order.
    pub fn new(id: impl Into<String>, spine: Vec<SpineItem>) -> Self {
        let spine = spine
            .into_iter()
            .enumerate()
            .map(|(index, mut item)| {
                item.index = index;
                item
            })
            .collect();
        Self {
            id: id.into(),
            title: String::new(),
            spine,
            page_progression: PageProgression::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_page_progression(mut self, progression: PageProgression) -> Self {
        self.page_progression = progression;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn spine(&self) -> &[SpineItem] {
        &self.spine
    }

    pub fn spine_len(&self) -> usize {
        self.spine.len()
    }

    pub fn spine_item(&self, index: usize) -> Option<&SpineItem> {
        self.spine.get(index)
    }

    pub fn page_progression(&self) -> PageProgression {
        self.page_progression
    }

    /// True when any spine item references a media overlay.
    pub fn has_media_overlays(&self) -> bool {
        self.spine.iter().any(|item| item.media_overlay.is_some())
    }

    /// Spine index for an href, ignoring any `#fragment`.
    pub fn spine_index_for_href(&self, href: &str) -> Option<usize> {
        let path = href.split_once('#').map_or(href, |(path, _)| path);
        self.spine
            .iter()
            .find(|item| item.href == path)
            .map(|item| item.index)
    }

    pub fn spine_index_for_idref(&self, idref: &str) -> Option<usize> {
        self.spine
            .iter()
            .find(|item| item.idref == idref)
            .map(|item| item.index)
    }

    /// Package description handed to the engine's `openBook` call.
    pub fn package_json(&self) -> Value {
        let items: Vec<Value> = self
            .spine
            .iter()
            .map(|item| {
                json!({
                    "idref": item.idref,
                    "href": item.href,
                    "media_overlay_id": item.media_overlay,
                })
            })
            .collect();
        json!({
            "id": self.id,
            "title": self.title,
            "spine": {
                "direction": self.page_progression,
                "items": items,
            },
        })
    }
}
