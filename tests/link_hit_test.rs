mod common;

use common::session::Harness;
use epub_stream_webview::{ReaderRenderer, Rect, RendererOptions, Touch, TouchPhase};
use epub_stream_webview_sim::{AckMode, SimBook};

fn linked_book() -> SimBook {
    SimBook::uniform(2, 2)
        .link(0, Rect::new(10.0, 10.0, 100.0, 20.0), "c1.xhtml#note")
        .link(0, Rect::new(410.0, 10.0, 100.0, 20.0), "c1.xhtml#second-page")
        .link(0, Rect::new(10.0, 100.0, 100.0, 20.0), "javascript:void(0)")
}

fn touch(x: f32, y: f32, phase: TouchPhase) -> Touch {
    Touch::new(x, y, phase)
}

#[test]
fn link_is_reported_once_its_element_resolves() {
    let mut h = Harness::open(linked_book());
    assert!(!h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Began)));
    assert_eq!(h.engine.calls_to("elementAtPoint"), 1);

    h.pump();
    assert!(h.renderer.touch_intersects_link(&touch(21.0, 16.0, TouchPhase::Moved)));
    assert!(h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Ended)));
    assert_eq!(h.engine.calls_to("elementAtPoint"), 1);

    let hit = h.renderer.last_link_hit().cloned().expect("link hit");
    assert_eq!(hit.href, "c1.xhtml#note");
    h.renderer.follow_link(&hit).expect("queued");
    h.pump();
    assert_eq!(h.position(), (1, 0));
}

#[test]
fn plain_text_and_script_links_are_not_links() {
    let mut h = Harness::open(linked_book());
    assert!(!h.renderer.touch_intersects_link(&touch(200.0, 300.0, TouchPhase::Began)));
    h.pump();
    assert!(!h.renderer.touch_intersects_link(&touch(200.0, 300.0, TouchPhase::Ended)));
    assert!(h.renderer.last_link_hit().is_none());

    h.clock.advance_ms(500);
    assert!(!h.renderer.touch_intersects_link(&touch(20.0, 110.0, TouchPhase::Began)));
    h.pump();
    assert!(!h.renderer.touch_intersects_link(&touch(20.0, 110.0, TouchPhase::Stationary)));
    assert_eq!(h.engine.calls_to("elementAtPoint"), 2);
}

#[test]
fn samples_outside_a_gesture_do_not_query() {
    let mut h = Harness::open(linked_book());
    let before = h.engine.script_count();
    assert!(!h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Moved)));
    assert!(!h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Ended)));
    h.pump();
    assert_eq!(h.engine.script_count(), before);
}

#[test]
fn a_burst_of_samples_issues_one_query() {
    let mut h = Harness::with(linked_book(), RendererOptions::default(), |engine| {
        engine.set_ack_mode(AckMode::Manual)
    });
    h.ack_all();
    assert!(!h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Began)));
    for step in 0..50 {
        let x = 20.0 + step as f32;
        assert!(!h.renderer.touch_intersects_link(&touch(x, 15.0, TouchPhase::Moved)));
    }
    assert_eq!(h.engine.calls_to("elementAtPoint"), 1);

    h.ack_all();
    assert!(h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Moved)));
    assert_eq!(h.engine.calls_to("elementAtPoint"), 1);
}

#[test]
fn later_pages_offset_the_content_point() {
    let mut h = Harness::open(linked_book());
    h.renderer.open_page_right();
    h.pump();
    assert_eq!(h.position(), (0, 1));

    assert!(!h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Began)));
    assert_eq!(
        h.engine.last_script().as_deref(),
        Some("hostBridge.elementAtPoint(420.0, 15.0)")
    );
    h.pump();
    assert!(h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Moved)));
    assert_eq!(
        h.renderer.last_link_hit().map(|hit| hit.href.as_str()),
        Some("c1.xhtml#second-page")
    );
}

#[test]
fn page_turn_discards_the_resolved_element() {
    let mut h = Harness::open(linked_book());
    h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Began));
    h.pump();
    assert!(h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Ended)));

    h.renderer.open_page_right();
    h.pump();
    h.clock.advance_ms(500);
    assert!(!h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Began)));
    assert_eq!(h.engine.calls_to("elementAtPoint"), 2);
}

#[test]
fn malformed_query_result_is_no_link_and_no_error() {
    let mut h = Harness::open(linked_book());
    h.engine
        .set_script_result("hostBridge.elementAtPoint(20.0, 15.0)", "{oops");
    h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Began));
    h.pump();
    assert!(!h.renderer.touch_intersects_link(&touch(20.0, 15.0, TouchPhase::Moved)));
    assert!(h.renderer.last_link_hit().is_none());
    assert!(h.delegate.errors().is_empty());
}

#[test]
fn touches_are_measured_from_the_frame_origin() {
    let mut h = Harness::open(linked_book());
    h.renderer.set_frame(Rect::new(0.0, 100.0, 400.0, 600.0));
    h.pump();
    assert!(!h.renderer.touch_intersects_link(&touch(20.0, 115.0, TouchPhase::Began)));
    assert_eq!(
        h.engine.last_script().as_deref(),
        Some("hostBridge.elementAtPoint(20.0, 15.0)")
    );
    h.pump();
    assert!(h.renderer.touch_intersects_link(&touch(21.0, 116.0, TouchPhase::Ended)));
    assert_eq!(
        h.renderer.last_link_hit().map(|hit| hit.href.as_str()),
        Some("c1.xhtml#note")
    );
}
