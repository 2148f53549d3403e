//! Renderer facade.
//!
//! [`WebViewRenderer`] is one reading session: it owns the content engine, the
//! script queue and every piece of navigation state, and reports to a weakly
//! held [`RendererDelegate`]. All methods run on the owner thread. Engine
//! completions are applied in [`WebViewRenderer::pump`].

use std::rc::{Rc, Weak};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use serde_json::Value;

use crate::book::Book;
use crate::bridge::{CommandId, Dispatch, PendingCommand, ResultHandler, ScriptBridge, Settled};
use crate::clock::{Clock, SystemClock};
use crate::delegate::RendererDelegate;
use crate::engine::{event_channel, ContentEngine, EngineEvent};
use crate::error::RendererError;
use crate::geometry::Rect;
use crate::hit_test::{HitTestResolver, LinkHit, Touch};
use crate::options::{ReaderSettings, RendererOptions};
use crate::overlay::{MediaOverlayCoordinator, OverlayState};
use crate::pagination::{
    Location, PageState, PageTurnDirection, PaginationController, TurnOutcome,
};
use crate::readiness::{ReadinessChange, ReadinessTracker};
use crate::script::ScriptCommand;

/// Capabilities the reader shell relies on.
pub trait ReaderRenderer {
    fn can_go_left(&self) -> bool;
    fn can_go_right(&self) -> bool;
    fn is_page_turning(&self) -> bool;
    fn book_has_media_overlays(&self) -> bool;
    fn book_has_media_overlays_being_played(&self) -> bool;
    fn open_page_left(&mut self) -> TurnOutcome;
    fn open_page_right(&mut self) -> TurnOutcome;
    /// Returns `false` when nothing was queued.
    fn apply_media_overlay_playback_toggle(&mut self) -> bool;
    /// Synchronous link test for gesture recognizers.
    fn touch_intersects_link(&mut self, touch: &Touch) -> bool;
}

/// Reading session backed by a [`ContentEngine`].
pub struct WebViewRenderer<E: ContentEngine> {
    frame: Rect,
    book: Arc<Book>,
    delegate: Weak<dyn RendererDelegate>,
    engine: E,
    events: Receiver<EngineEvent>,
    clock: Box<dyn Clock>,
    options: RendererOptions,
    settings: ReaderSettings,
    bridge: ScriptBridge,
    readiness: ReadinessTracker,
    pagination: PaginationController,
    hit_test: HitTestResolver,
    overlay: MediaOverlayCoordinator,
    /// A jump settled without pagination info; the follow-up location query
    /// completes the navigation.
    jump_unresolved: bool,
}

impl<E: ContentEngine> WebViewRenderer<E> {
    /// Start a session for `book` in `frame`.
    ///
    /// The engine is attached and asked to load its host document right away;
    /// the book is opened once the engine reports the load finished.
    pub fn new<D>(
        frame: Rect,
        book: Arc<Book>,
        delegate: &Rc<D>,
        mut engine: E,
    ) -> Result<Self, RendererError>
    where
        D: RendererDelegate + 'static,
    {
        if book.spine_len() == 0 {
            return Err(RendererError::EmptySpine);
        }
        let options = RendererOptions::default();
        let (sender, events) = event_channel();
        engine.attach(sender);
        engine.load_host_document(frame)?;
        log::debug!(
            "renderer: session for {} ({} spine items)",
            book.id(),
            book.spine_len()
        );
        let delegate: Weak<D> = Rc::downgrade(delegate);
        let delegate: Weak<dyn RendererDelegate> = delegate;
        Ok(Self {
            frame,
            delegate,
            engine,
            events,
            clock: Box::new(SystemClock),
            settings: options.settings,
            bridge: ScriptBridge::new(options.script_timeout()),
            readiness: ReadinessTracker::new(options.heartbeat_timeout()),
            pagination: PaginationController::new(Arc::clone(&book)),
            hit_test: HitTestResolver::new(
                frame,
                options.hit_test_debounce(),
                options.hit_test_tolerance_px,
            ),
            overlay: MediaOverlayCoordinator::new(book.has_media_overlays()),
            options,
            book,
            jump_unresolved: false,
        })
    }

    pub fn with_options(mut self, options: RendererOptions) -> Self {
        let options = options.normalized();
        self.bridge.set_ack_timeout(options.script_timeout());
        self.readiness
            .set_heartbeat_timeout(options.heartbeat_timeout());
        self.hit_test
            .configure(options.hit_test_debounce(), options.hit_test_tolerance_px);
        self.settings = options.settings;
        self.options = options;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Open the book at a previously saved location instead of the first page.
    pub fn with_initial_location(mut self, location: &Location) -> Self {
        let position = self.pagination.position_for_location(location);
        self.pagination.jump_to(position);
        self.hit_test.set_page(self.pagination.position().page_index);
        self
    }

    pub fn book(&self) -> &Arc<Book> {
        &self.book
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    pub fn settings(&self) -> ReaderSettings {
        self.settings
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn page_state(&self) -> PageState {
        self.pagination.state()
    }

    pub fn current_location(&self) -> Location {
        self.pagination.location()
    }

    pub fn overlay_state(&self) -> OverlayState {
        self.overlay.state()
    }

    /// Target of the most recently resolved link touch.
    pub fn last_link_hit(&self) -> Option<&LinkHit> {
        self.hit_test.last_link_hit()
    }

    pub fn javascript_is_running(&self) -> bool {
        self.bridge.javascript_is_running()
    }

    pub fn result_server_responding(&self) -> bool {
        self.readiness.result_server_responding()
    }

    pub fn performing_long_load(&self) -> bool {
        self.readiness.performing_long_load()
    }

    /// Commands waiting for dispatch, oldest first.
    pub fn javascript_handler_queue(&self) -> impl ExactSizeIterator<Item = &PendingCommand> + '_ {
        self.bridge.queued()
    }

    pub fn in_flight_command(&self) -> Option<&PendingCommand> {
        self.bridge.in_flight()
    }

    /// Apply engine events, expire stale commands and dispatch queued ones.
    ///
    /// Returns the number of events and settlements processed.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let mut progressed = false;
            while let Ok(event) = self.events.try_recv() {
                self.handle_event(event);
                processed += 1;
                progressed = true;
            }
            let now = self.clock.now();
            if let Some(change) = self.readiness.check(now) {
                self.apply_readiness_change(change);
                progressed = true;
            }
            if let Some(settled) = self.bridge.expire(now) {
                self.settle(settled);
                processed += 1;
                progressed = true;
            }
            if self.dispatch_ready() {
                progressed = true;
            }
            if !progressed {
                return processed;
            }
        }
    }

    /// Navigate to a content href (`chapter.xhtml#anchor`).
    pub fn go_to_href(&mut self, href: &str) -> Result<CommandId, RendererError> {
        self.submit(
            ScriptCommand::OpenContentUrl {
                href: href.to_string(),
            },
            None,
        )
    }

    /// Navigate to a saved location.
    pub fn open_location(&mut self, location: &Location) -> Result<CommandId, RendererError> {
        let position = self.pagination.position_for_location(location);
        let last = self.book.spine_len().saturating_sub(1);
        let idref = self
            .book
            .spine_item(position.spine_index.min(last))
            .map(|item| item.idref.clone())
            .unwrap_or_else(|| location.idref.clone());
        self.submit(
            ScriptCommand::OpenSpineItemPage {
                idref,
                page_index: position.page_index,
            },
            None,
        )
    }

    pub fn follow_link(&mut self, hit: &LinkHit) -> Result<CommandId, RendererError> {
        self.go_to_href(&hit.href)
    }

    /// Change presentation settings; the engine repaginates.
    pub fn apply_settings(&mut self, settings: ReaderSettings) -> Result<CommandId, RendererError> {
        self.settings = settings.normalized();
        self.submit(ScriptCommand::UpdateSettings(self.settings), None)
    }

    pub fn set_frame(&mut self, frame: Rect) {
        if frame == self.frame {
            return;
        }
        self.frame = frame;
        self.engine.set_frame(frame);
        self.hit_test.set_frame(frame);
    }

    /// Ask the engine to load its host document again, typically after a
    /// failed load. The book is reopened at the current position once the
    /// load finishes.
    pub fn reload(&mut self) -> Result<(), RendererError> {
        log::info!("renderer: reloading host document for {}", self.book.id());
        self.engine.load_host_document(self.frame)?;
        Ok(())
    }

    /// Queue raw script text behind everything already queued.
    pub fn evaluate_script(
        &mut self,
        script: impl Into<String>,
        handler: Option<ResultHandler>,
    ) -> Result<CommandId, RendererError> {
        self.submit(ScriptCommand::Raw(script.into()), handler)
    }

    fn open_page(&mut self, direction: PageTurnDirection) -> TurnOutcome {
        let command = match self.pagination.request_turn(direction) {
            Ok(command) => command,
            Err(rejection) => {
                log::debug!("renderer: {:?} turn ignored: {:?}", direction, rejection);
                return TurnOutcome::Rejected(rejection);
            }
        };
        match self.submit(command, None) {
            Ok(_) => TurnOutcome::Dispatched,
            Err(err) => {
                self.pagination.fail_turn();
                self.report(&err);
                TurnOutcome::Failed
            }
        }
    }

    fn submit(
        &mut self,
        command: ScriptCommand,
        handler: Option<ResultHandler>,
    ) -> Result<CommandId, RendererError> {
        let now = self.clock.now();
        let id = self.bridge.enqueue(command, handler, now)?;
        self.dispatch_ready();
        Ok(id)
    }

    fn submit_or_report(&mut self, command: ScriptCommand) {
        if let Err(err) = self.submit(command, None) {
            self.report(&err);
        }
    }

    /// Dispatch while the engine accepts commands. Returns `true` if anything
    /// left the queue.
    fn dispatch_ready(&mut self) -> bool {
        let mut progressed = false;
        while self.readiness.accepts_commands() {
            let now = self.clock.now();
            match self.bridge.dispatch_next(&mut self.engine, now) {
                Dispatch::Sent(_) => progressed = true,
                Dispatch::Refused(settled) => {
                    self.settle(settled);
                    progressed = true;
                }
                Dispatch::Idle | Dispatch::Busy => break,
            }
        }
        progressed
    }

    fn handle_event(&mut self, event: EngineEvent) {
        let now = self.clock.now();
        let change = match event {
            EngineEvent::LoadStarted => {
                self.readiness.load_started();
                None
            }
            EngineEvent::LoadFinished => self.readiness.load_finished(now),
            EngineEvent::LoadFailed { message } => Some(self.readiness.load_failed(message)),
            EngineEvent::ScriptCompleted { id, result } => {
                if let Some(settled) = self.bridge.complete(id, result) {
                    self.settle(settled);
                }
                None
            }
            EngineEvent::ResponderChanged { responding } => {
                self.readiness.set_responding(responding, now)
            }
            EngineEvent::Heartbeat => self.readiness.heartbeat(now),
            EngineEvent::PaginationChanged { payload } => {
                match serde_json::from_str::<Value>(&payload) {
                    Ok(payload) => {
                        if self.pagination.apply_pagination(&payload) {
                            self.after_reflow();
                        }
                    }
                    Err(err) => log::debug!("renderer: bad pagination event: {}", err),
                }
                None
            }
            EngineEvent::MediaOverlayStatusChanged { playing } => {
                if self.overlay.apply_status(playing) {
                    self.notify_overlay();
                }
                None
            }
        };
        if let Some(change) = change {
            self.apply_readiness_change(change);
        }
    }

    fn apply_readiness_change(&mut self, change: ReadinessChange) {
        match change {
            ReadinessChange::BecameReady { reload } => {
                if reload {
                    log::info!("renderer: engine reloaded, reopening {}", self.book.id());
                    if let Some(settled) = self.bridge.interrupt() {
                        self.settle(settled);
                    }
                    if self.overlay.apply_status(false) {
                        self.notify_overlay();
                    }
                }
                self.open_book();
            }
            ReadinessChange::LoadFailed { message } => {
                self.report(&RendererError::EngineLoad { message });
                for settled in self.bridge.interrupt_all() {
                    self.settle(settled);
                }
            }
            ReadinessChange::Degraded => {
                self.notify(|delegate| delegate.engine_degraded(true));
                self.report(&RendererError::EngineUnresponsive);
            }
            ReadinessChange::Recovered => {
                self.notify(|delegate| delegate.engine_degraded(false));
            }
        }
    }

    fn open_book(&mut self) {
        if self
            .bridge
            .any_pending(|command| matches!(command, ScriptCommand::OpenBook { .. }))
        {
            log::debug!("renderer: openBook already queued");
            return;
        }
        let command = ScriptCommand::OpenBook {
            package: self.book.package_json(),
            settings: self.settings,
            open_page: self.pagination.open_page_request(),
        };
        let now = self.clock.now();
        if let Err(err) = self.bridge.enqueue_front(command, None, now) {
            self.report(&err);
        }
    }

    fn settle(&mut self, mut settled: Settled) {
        let outcome = settled.outcome.as_ref();
        match &settled.command {
            ScriptCommand::OpenBook { .. } => {
                if let Ok(payload) = outcome {
                    self.pagination.apply_pagination(payload);
                    self.hit_test.set_page(self.pagination.position().page_index);
                    self.notify(|delegate| delegate.content_ready());
                    if let Some(refresh) = self.overlay.refresh_command() {
                        self.submit_or_report(refresh);
                    }
                    let location = self.pagination.location();
                    self.notify(|delegate| delegate.navigated(&location));
                }
            }
            ScriptCommand::OpenPageLeft | ScriptCommand::OpenPageRight => match outcome {
                Ok(payload) => {
                    self.pagination.complete_turn(payload);
                    self.after_navigation();
                }
                Err(_) => self.pagination.fail_turn(),
            },
            ScriptCommand::OpenSpineItemPage { .. } | ScriptCommand::OpenContentUrl { .. } => {
                if let Ok(payload) = outcome {
                    if self.pagination.apply_pagination(payload) {
                        self.after_navigation();
                    } else {
                        self.jump_unresolved = true;
                        self.submit_or_report(ScriptCommand::CurrentLocation);
                    }
                }
            }
            ScriptCommand::CurrentLocation => {
                let applied = outcome.is_ok_and(|payload| self.pagination.apply_pagination(payload));
                if std::mem::take(&mut self.jump_unresolved) {
                    self.after_navigation();
                } else if applied {
                    self.after_reflow();
                }
            }
            ScriptCommand::UpdateSettings(_) => {
                let applied = outcome.is_ok_and(|payload| self.pagination.apply_pagination(payload));
                if applied {
                    self.after_reflow();
                } else {
                    self.hit_test.invalidate();
                }
            }
            ScriptCommand::ElementAtPoint(_) => {
                self.hit_test.complete_query(outcome);
            }
            ScriptCommand::IsMediaOverlayAvailable => {
                if self.overlay.apply_availability(outcome) {
                    self.notify_overlay();
                }
            }
            ScriptCommand::ToggleMediaOverlay => {
                if self.overlay.complete_toggle(outcome) {
                    self.notify_overlay();
                }
            }
            ScriptCommand::PauseMediaOverlay | ScriptCommand::Raw(_) => {}
        }
        if let Err(err) = outcome {
            if !matches!(
                settled.command,
                ScriptCommand::ElementAtPoint(_) | ScriptCommand::IsMediaOverlayAvailable
            ) {
                self.report(err);
            }
        }
        settled.run_handler();
    }

    /// Visible content changed because of a turn or jump.
    fn after_navigation(&mut self) {
        if let Some(pause) = self.overlay.stop_for_navigation() {
            self.submit_or_report(pause);
            self.notify_overlay();
        }
        self.hit_test.set_page(self.pagination.position().page_index);
        if let Some(refresh) = self.overlay.refresh_command() {
            self.submit_or_report(refresh);
        }
        let location = self.pagination.location();
        self.notify(|delegate| delegate.navigated(&location));
    }

    /// Same content, new layout.
    fn after_reflow(&mut self) {
        self.hit_test.set_page(self.pagination.position().page_index);
        let location = self.pagination.location();
        self.notify(|delegate| delegate.navigated(&location));
    }

    fn notify_overlay(&self) {
        let state = self.overlay.state();
        self.notify(|delegate| delegate.media_overlay_changed(state));
    }

    fn report(&self, error: &RendererError) {
        if error.is_soft() {
            log::debug!("renderer: {}", error);
        } else {
            log::warn!("renderer: {}", error);
        }
        self.notify(|delegate| delegate.error(error));
    }

    fn notify(&self, callback: impl FnOnce(&dyn RendererDelegate)) {
        if let Some(delegate) = self.delegate.upgrade() {
            callback(&*delegate);
        }
    }
}

impl<E: ContentEngine> ReaderRenderer for WebViewRenderer<E> {
    fn can_go_left(&self) -> bool {
        self.pagination.can_go_left()
    }

    fn can_go_right(&self) -> bool {
        self.pagination.can_go_right()
    }

    fn is_page_turning(&self) -> bool {
        self.pagination.is_page_turning()
    }

    fn book_has_media_overlays(&self) -> bool {
        self.overlay.has_media_overlays()
    }

    fn book_has_media_overlays_being_played(&self) -> bool {
        self.overlay.is_playing()
    }

    fn open_page_left(&mut self) -> TurnOutcome {
        self.open_page(PageTurnDirection::Left)
    }

    fn open_page_right(&mut self) -> TurnOutcome {
        self.open_page(PageTurnDirection::Right)
    }

    fn apply_media_overlay_playback_toggle(&mut self) -> bool {
        let Some(command) = self.overlay.request_toggle() else {
            return false;
        };
        match self.submit(command, None) {
            Ok(_) => true,
            Err(err) => {
                self.overlay.complete_toggle(Err(&err));
                self.report(&err);
                false
            }
        }
    }

    fn touch_intersects_link(&mut self, touch: &Touch) -> bool {
        let now = self.clock.now();
        let answer = self.hit_test.evaluate(touch, now);
        if let Some(query) = answer.query {
            self.submit_or_report(query);
        }
        answer.intersects
    }
}

impl<E: ContentEngine> Drop for WebViewRenderer<E> {
    fn drop(&mut self) {
        let dropped = self.bridge.clear();
        if dropped > 0 {
            log::debug!("renderer: discarded {} pending commands", dropped);
        }
        self.engine.shutdown();
    }
}
