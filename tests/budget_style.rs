mod common;

use common::budget_alloc::BudgetAlloc;
use epub_flow::{CssParser, FlowItem, FlowPrep, FlowPrepOptions};

// Parsing a few hundred rules should stay well under this.
const STYLESHEET_BUDGET_BYTES: usize = 1024 * 1024;
// Streaming prep holds only the open-element chain, never the item list.
const STREAMING_PREP_BUDGET_BYTES: usize = 512 * 1024;

#[global_allocator]
static ALLOC: BudgetAlloc = BudgetAlloc::new();

fn synthetic_stylesheet(rules: usize) -> String {
    let mut css = String::with_capacity(rules * 96);
    for idx in 0..rules {
        css.push_str(&format!(
            "div.section{idx} > p.note{idx}, h{} em {{ margin: {}px 0; text-indent: 1.{}em; text-align: justify }}\n",
            idx % 6 + 1,
            idx % 17,
            idx % 10
        ));
    }
    css
}

fn synthetic_chapter(paragraphs: usize) -> String {
    let mut html = String::from("<html><head><title>t</title></head><body>");
    for idx in 0..paragraphs {
        html.push_str(&format!(
            "<p class=\"note{}\">The <em>quick</em> brown fox number {} jumps over the lazy dog.</p>",
            idx % 40,
            idx
        ));
    }
    html.push_str("</body></html>");
    html
}

#[test]
fn style_and_prep_stay_under_budget() {
    let css = synthetic_stylesheet(400);
    let (store, parse) = ALLOC.measure(|| CssParser::new().parse(&css));
    assert_eq!(store.len(), 800);
    assert!(
        parse.peak_bytes <= STYLESHEET_BUDGET_BYTES,
        "stylesheet parse peaked at {} bytes (budget {})",
        parse.peak_bytes,
        STYLESHEET_BUDGET_BYTES
    );

    let html = synthetic_chapter(2_000);
    let mut prep = FlowPrep::new(FlowPrepOptions::for_display(480, 800));
    prep.add_stylesheet(&css, "synthetic.css").unwrap();
    let (words, streaming) = ALLOC.measure(|| {
        let mut words = 0usize;
        prep.prepare_with(html.as_bytes(), |item| {
            if matches!(item, FlowItem::Word { .. }) {
                words += 1;
            }
        })
        .unwrap();
        words
    });
    assert_eq!(words, 2_000 * 11);
    assert!(
        streaming.peak_bytes <= STREAMING_PREP_BUDGET_BYTES,
        "streaming prep peaked at {} bytes (budget {})",
        streaming.peak_bytes,
        STREAMING_PREP_BUDGET_BYTES
    );
}
