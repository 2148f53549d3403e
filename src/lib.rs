//! Page-based navigation coordinator for EPUB renderers backed by an embedded
//! web-content engine.
//!
//! The engine is an opaque scriptable surface (see [`ContentEngine`]). This
//! crate serializes script commands into it, tracks load and responder health,
//! turns pages, resolves link touches, and keeps media overlay playback in step
//! with navigation. [`WebViewRenderer`] composes all of it behind the
//! [`ReaderRenderer`] capability trait.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! use epub_stream_webview::{
//!     Book, ContentEngine, ReaderRenderer, Rect, RendererDelegate, SpineItem, WebViewRenderer,
//! };
//!
//! struct Shell;
//! impl RendererDelegate for Shell {}
//!
//! # fn example<E: ContentEngine>(engine: E) -> Result<(), epub_stream_webview::RendererError> {
//! let book = Arc::new(Book::new(
//!     "urn:isbn:9780000000000",
//!     vec![SpineItem::new("c1", "text/c1.xhtml"), SpineItem::new("c2", "text/c2.xhtml")],
//! ));
//! let shell = Rc::new(Shell);
//! let mut renderer = WebViewRenderer::new(Rect::new(0.0, 0.0, 480.0, 800.0), book, &shell, engine)?;
//!
//! // Called from the host's run loop whenever the engine may have produced events.
//! renderer.pump();
//! if renderer.can_go_right() {
//!     renderer.open_page_right();
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod book;
mod bridge;
mod clock;
mod delegate;
mod engine;
mod error;
mod geometry;
mod options;
mod overlay;
mod pagination;
mod readiness;
mod renderer;
pub mod script;

pub use book::{Book, PageProgression, SpineItem};
pub use bridge::{
    result_handler, CommandId, Dispatch, PendingCommand, ResultHandler, ScriptBridge, Settled,
};
pub use clock::{Clock, SystemClock};
pub use delegate::RendererDelegate;
pub use engine::{ContentEngine, EngineError, EngineEvent, EngineEventSender};
pub use error::RendererError;
pub use geometry::{Point, Rect, Size};
pub use hit_test::{HitTestAnswer, HitTestResolver, LinkHit, Touch, TouchPhase};
pub use options::{ReaderSettings, RendererOptions, SyntheticSpread};
pub use overlay::{MediaOverlayCoordinator, OverlayState};
pub use pagination::{
    Location, PagePosition, PageState, PageTurnDirection, PaginationController, TurnOutcome,
    TurnRejection,
};
pub use readiness::{LoadPhase, ReadinessChange, ReadinessTracker};
pub use renderer::{ReaderRenderer, WebViewRenderer};
pub use script::{ScriptCall, ScriptCommand};
