use std::collections::BTreeMap;

use epub_flow::{Align, CascadeConfig, Format};
use epub_flow_render::{
    distribute_slack, ComputeMode, DisplayListEntry, FlowEngine, MonospaceFontEngine, PageConfig,
};

const WIDTH: i32 = 200;
const HEIGHT: i32 = 600;
// Screen margins are 20px left and right; glyphs are 8px wide.
const LEFT: i32 = 20;
const RIGHT: i32 = WIDTH - 20;
const ADVANCE: i32 = 8;

const TEXT: &str = "a bb ccc dddd eeeee ff g hhhhhh ii jjj kkkk l mm nnnnn o pp qqq rrrr";

fn format(align: Align) -> Format {
    let mut fmt = Format::root(&CascadeConfig::for_display(WIDTH, HEIGHT));
    fmt.align = align;
    fmt.line_height_factor = 1.0;
    fmt
}

/// Lays out `TEXT` as one paragraph; returns glyph x positions per line
/// as `(x, is_space)` in display order.
fn layout(align: Align) -> Vec<Vec<(i32, bool)>> {
    let fonts = MonospaceFontEngine::new();
    let fmt = format(align);
    let mut engine = FlowEngine::new(PageConfig::for_display(WIDTH, HEIGHT), ComputeMode::Display, &fonts);
    engine.start(&fmt);
    assert!(engine.new_paragraph(&fmt, false));
    for word in TEXT.split(' ') {
        assert!(engine.add_word(word, false, &fmt));
    }
    assert!(engine.end_paragraph(&fmt));

    let mut lines: BTreeMap<i32, Vec<(i32, bool)>> = BTreeMap::new();
    for entry in engine.display_list().iter() {
        if let DisplayListEntry::Glyph { pos, is_space, .. } = entry {
            lines.entry(pos.y).or_default().push((pos.x, *is_space));
        }
    }
    lines.into_values().collect()
}

fn right_edge(line: &[(i32, bool)]) -> i32 {
    line.iter()
        .filter(|(_, space)| !space)
        .map(|(x, _)| x + ADVANCE)
        .max()
        .unwrap_or(LEFT)
}

fn gaps(line: &[(i32, bool)]) -> Vec<i32> {
    line.windows(2)
        .filter(|pair| pair[0].1)
        .map(|pair| pair[1].0 - pair[0].0)
        .collect()
}

#[test]
fn slack_is_fully_distributed_with_remainder_last() {
    for (slots, slack) in [(1, 7), (3, 10), (5, 4), (6, 61)] {
        let extras = distribute_slack(slots, slack);
        assert_eq!(extras.len(), slots);
        assert_eq!(extras.iter().sum::<i32>(), slack);
        let base = slack / slots as i32;
        assert!(extras[..slots - 1].iter().all(|extra| *extra == base));
        assert_eq!(extras[slots - 1], base + slack % slots as i32);
    }
}

#[test]
fn justified_lines_reach_the_right_edge_except_the_last() {
    let lines = layout(Align::Justify);
    assert!(lines.len() >= 3);
    let (last, full) = lines.split_last().unwrap();
    for line in full {
        assert_eq!(line.first().map(|(x, _)| *x), Some(LEFT));
        assert_eq!(right_edge(line), RIGHT);
        let gaps = gaps(line);
        let natural = ADVANCE * gaps.len() as i32;
        let stretched: i32 = gaps.iter().sum::<i32>() - natural;
        let used: i32 = line.iter().filter(|(_, space)| !space).count() as i32 * ADVANCE + natural;
        assert_eq!(stretched, (RIGHT - LEFT) - used);
        let (head, tail) = gaps.split_at(gaps.len() - 1);
        assert!(head.iter().all(|gap| *gap == head[0]));
        assert!(tail[0] >= head.first().copied().unwrap_or(tail[0]));
    }
    assert!(gaps(last).iter().all(|gap| *gap == ADVANCE));
    assert!(right_edge(last) < RIGHT);
}

#[test]
fn alignment_offsets_lines() {
    let left = layout(Align::Left);
    let right = layout(Align::Right);
    let center = layout(Align::Center);
    assert_eq!(left.len(), right.len());
    for ((l, r), c) in left.iter().zip(&right).zip(&center) {
        assert_eq!(l.first().map(|(x, _)| *x), Some(LEFT));
        assert!(gaps(l).iter().all(|gap| *gap == ADVANCE));
        assert_eq!(right_edge(r), RIGHT);
        let slack = RIGHT - right_edge(l);
        assert_eq!(c.first().map(|(x, _)| *x), Some(LEFT + slack / 2));
    }
}

#[test]
fn glued_fragments_are_never_stretched() {
    let fonts = MonospaceFontEngine::new();
    let fmt = format(Align::Justify);
    let mut engine = FlowEngine::new(PageConfig::for_display(WIDTH, HEIGHT), ComputeMode::Display, &fonts);
    engine.start(&fmt);
    assert!(engine.new_paragraph(&fmt, false));
    assert!(engine.add_word("a", false, &fmt));
    assert!(engine.add_word("bb", true, &fmt));
    for _ in 0..8 {
        assert!(engine.add_word("ccc", false, &fmt));
    }
    assert!(engine.end_paragraph(&fmt));
    let xs: Vec<i32> = engine
        .display_list()
        .iter()
        .filter_map(|entry| match entry {
            DisplayListEntry::Glyph { pos, is_space: false, .. } => Some(pos.x),
            _ => None,
        })
        .take(4)
        .collect();
    // One line of "abb" plus four "ccc" leaves 8px of slack over four gaps.
    assert_eq!(xs, vec![LEFT, LEFT + 8, LEFT + 16, LEFT + 24 + 8 + 2]);
}
