use epub_flow::{FlowItem, FlowPrep, FlowPrepOptions};
use epub_flow_render::{
    DisplayListEntry, MonospaceFontEngine, NeverCancel, PageStart, Paginator, PaginatorOptions,
};

const SIZES: &[(i32, i32)] = &[(480, 800), (300, 400), (240, 180), (600, 220)];

fn mixed_chapter() -> String {
    let mut html = String::from(
        r#"<html><head><style>
            p { text-indent: 1.5em; text-align: justify; margin: 0.4em 0 }
            h2 { font-size: 1.6em; margin: 1em 0 0.5em }
            blockquote { margin: 0.5em 2em }
            .small { font-size: 0.8em }
        </style></head><body>"#,
    );
    for section in 0..6 {
        html.push_str(&format!("<h2>Section {}</h2>", section));
        for para in 0..5 {
            html.push_str("<p>");
            for word in 0..(20 + para * 9) {
                if word % 11 == 3 {
                    html.push_str(&format!("<em>em{}</em>phasis ", word));
                } else {
                    html.push_str(&format!("w{}s{}p{} ", word, section, para));
                }
            }
            html.push_str("</p>");
        }
        html.push_str("<blockquote><p class=\"small\">quoted text that runs on for a while<br/>and breaks once</p></blockquote>");
        html.push_str("<pre>fn main() {\n    println!(\"hi\");\n}</pre>");
        html.push_str("<ul><li>first item</li><li>second item</li></ul>");
        html.push_str("<div>loose text<p>nested paragraph</p>after nested</div>");
        html.push_str("<p><img src=\"fig.png\" width=\"120\" height=\"90\"/></p>");
    }
    html.push_str("</body></html>");
    html
}

fn prepare(width: i32, height: i32) -> Vec<FlowItem> {
    let mut prep = FlowPrep::new(FlowPrepOptions::for_display(width, height));
    prep.prepare(mixed_chapter().as_bytes()).unwrap()
}

fn display_paginate(paginator: &Paginator<'_>, items: &[FlowItem]) -> Vec<PageStart> {
    let mut starts = Vec::new();
    let mut next = items.first().map(|item| PageStart {
        item: 0,
        offset: item.offset(),
    });
    while let Some(start) = next {
        starts.push(start);
        let page = paginator.display_page(items, start.offset).unwrap();
        assert_eq!(page.start, start);
        next = page.next;
    }
    starts
}

fn visible_text(items: &[FlowItem]) -> String {
    items
        .iter()
        .flat_map(|item| match item {
            FlowItem::Word { text, .. } => text.chars().collect::<Vec<_>>(),
            FlowItem::Char { ch, .. } => vec![*ch],
            _ => Vec::new(),
        })
        .filter(|ch| !ch.is_whitespace())
        .collect()
}

#[test]
fn location_and_display_agree_on_every_page_start() {
    let fonts = MonospaceFontEngine::new();
    for &(width, height) in SIZES {
        let items = prepare(width, height);
        let paginator = Paginator::new(PaginatorOptions::for_display(width, height), &fonts);
        let located = paginator.locate(&items, &NeverCancel).unwrap();
        let displayed = display_paginate(&paginator, &items);
        assert!(located.len() > 1, "{}x{} produced a single page", width, height);
        assert_eq!(located, displayed, "page starts differ at {}x{}", width, height);
    }
}

#[test]
fn displayed_pages_show_every_glyph_exactly_once() {
    let fonts = MonospaceFontEngine::new();
    for &(width, height) in SIZES {
        let items = prepare(width, height);
        let paginator = Paginator::new(PaginatorOptions::for_display(width, height), &fonts);
        let mut shown = String::new();
        let mut images = 0;
        for start in paginator.locate(&items, &NeverCancel).unwrap() {
            let page = paginator.display_page(&items, start.offset).unwrap();
            shown.extend(page.display_list.text().chars().filter(|ch| !ch.is_whitespace()));
            images += page
                .display_list
                .iter()
                .filter(|entry| matches!(entry, DisplayListEntry::Image { .. }))
                .count();
        }
        assert_eq!(shown, visible_text(&items), "text mismatch at {}x{}", width, height);
        assert_eq!(images, 6);
    }
}

#[test]
fn move_mode_finds_the_page_holding_any_offset() {
    let fonts = MonospaceFontEngine::new();
    let (width, height) = (300, 400);
    let items = prepare(width, height);
    let paginator = Paginator::new(PaginatorOptions::for_display(width, height), &fonts);
    let pages = paginator.locate(&items, &NeverCancel).unwrap();

    for (number, start) in pages.iter().enumerate() {
        let found = paginator.page_containing(&items, start.offset).unwrap();
        assert_eq!(found.page, number);
        assert_eq!(found.start, *start);

        let end = pages.get(number + 1).map_or(items.len(), |next| next.item);
        let last = &items[end - 1];
        let found = paginator.page_containing(&items, last.offset()).unwrap();
        assert_eq!(found.page, number);
    }

    let before_everything = paginator.page_containing(&items, 0).unwrap();
    assert_eq!(before_everything.page, 0);
}

#[test]
fn located_offsets_are_strictly_increasing() {
    let fonts = MonospaceFontEngine::new();
    let items = prepare(240, 180);
    let paginator = Paginator::new(PaginatorOptions::for_display(240, 180), &fonts);
    let pages = paginator.locate(&items, &NeverCancel).unwrap();
    assert!(pages.windows(2).all(|pair| pair[0].offset < pair[1].offset));
    let index = paginator
        .locate_book([items.as_slice(), items.as_slice()], &NeverCancel)
        .unwrap();
    assert_eq!(index.chapter_count(), 2);
    assert_eq!(index.chapter(0), index.chapter(1));
    assert_eq!(index.page_count(), pages.len() * 2);
}
