mod common;

use common::budget_alloc::BudgetAlloc;
use common::session::Harness;
use epub_stream_webview::{ReaderRenderer, Rect, Touch, TouchPhase};
use epub_stream_webview_sim::SimBook;

#[global_allocator]
static ALLOC: BudgetAlloc = BudgetAlloc::new();

const SAMPLES: usize = 1_000;

#[test]
fn resolved_touch_samples_do_not_allocate() {
    let layout = SimBook::uniform(1, 1).link(0, Rect::new(10.0, 10.0, 100.0, 20.0), "c0.xhtml#fn1");
    let mut h = Harness::open(layout);
    assert!(!h.renderer.touch_intersects_link(&Touch::new(20.0, 15.0, TouchPhase::Began)));
    h.pump();

    let samples: Vec<Touch> = (0..SAMPLES)
        .map(|i| Touch::new(20.0 + (i % 3) as f32, 15.0, TouchPhase::Moved))
        .collect();
    let (hits, stats) = ALLOC.measure(|| {
        samples
            .iter()
            .filter(|touch| h.renderer.touch_intersects_link(touch))
            .count()
    });

    assert_eq!(hits, SAMPLES);
    assert_eq!(
        stats.allocations, 0,
        "cached hit-test path allocated {} times (peak {} bytes)",
        stats.allocations, stats.peak_bytes
    );
}
