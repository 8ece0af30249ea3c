use epub_flow::{
    get_values_from_suite, Align, Cascade, CascadeConfig, CssParser, ElementDescriptor,
    ElementLevel, ElementPath, FlowItem, FlowPrep, FlowPrepOptions, Format, PropertyId,
    ResolveContext, RuleStore, TextTransform, Unit, Value,
};

fn config() -> CascadeConfig {
    CascadeConfig {
        ppi: 72,
        ..CascadeConfig::for_display(480, 800)
    }
}

fn resolve(store: &RuleStore, levels: &[ElementLevel]) -> Format {
    let cascade = Cascade::new(store, config());
    let mut fmt = cascade.root_format();
    for depth in 1..=levels.len() {
        fmt = cascade.resolve(&ElementPath::new(&levels[..depth]), &fmt, None);
    }
    fmt
}

fn element(tag: &str, classes: &str) -> ElementLevel {
    ElementLevel::new(ElementDescriptor::new(tag).with_classes(classes))
}

#[test]
fn lead_paragraph_merges_justify_and_point_size() {
    let store = CssParser::new().parse("p { text-align: justify } p.lead { font-size: 18pt }");

    let lead = resolve(&store, &[element("body", ""), element("p", "lead")]);
    assert_eq!(lead.align, Align::Justify);
    assert_eq!(lead.font_size, 18);

    let plain = resolve(&store, &[element("body", ""), element("p", "")]);
    assert_eq!(plain.align, Align::Justify);
    assert_eq!(plain.font_size, 16);

    let suite = store.search("p", Some("lead")).unwrap();
    assert_eq!(
        get_values_from_suite(&suite, PropertyId::TextAlign),
        Some(&[Value::Align(Align::Justify)][..])
    );
    assert_eq!(
        get_values_from_suite(&suite, PropertyId::FontSize),
        Some(&[Value::number(18.0, Unit::Pt)][..])
    );
}

#[test]
fn specificity_orders_declarations_regardless_of_source_order() {
    let store = CssParser::new().parse(
        "#intro { text-align: right }
         p.a.b { text-align: center }
         .a { text-align: justify }
         p { text-align: left }",
    );
    let levels = [ElementLevel::new(
        ElementDescriptor::new("p").with_classes("a b").with_id("intro"),
    )];
    assert_eq!(resolve(&store, &levels).align, Align::Right);

    let levels = [element("p", "a b")];
    assert_eq!(resolve(&store, &levels).align, Align::Center);

    let levels = [element("p", "a")];
    assert_eq!(resolve(&store, &levels).align, Align::Justify);
}

#[test]
fn equal_specificity_falls_back_to_source_order() {
    let store = CssParser::new().parse("p { text-transform: uppercase } p { text-transform: lowercase }");
    assert_eq!(resolve(&store, &[element("p", "")]).text_transform, TextTransform::Lowercase);

    let store = CssParser::new().parse(".x { text-align: right } .y { text-align: center }");
    assert_eq!(resolve(&store, &[element("p", "x y")]).align, Align::Center);
}

#[test]
fn repeated_selector_appends_rather_than_overwrites() {
    let store = CssParser::new().parse("p { margin-top: 4px } p { text-indent: 3px }");
    assert_eq!(store.rules_for_key("p").len(), 2);
    let fmt = resolve(&store, &[element("p", "")]);
    assert_eq!(fmt.margin_top, 4);
    assert_eq!(fmt.indent, 3);
}

#[test]
fn units_resolve_against_their_references() {
    let ctx = ResolveContext::default().with_font_size(12.0).with_reference(100.0);
    assert_eq!(Value::number(1.5, Unit::Em).to_px(&ctx), Some(18));
    assert_eq!(Value::number(50.0, Unit::Percent).to_px(&ctx), Some(50));
    assert_eq!(Value::number(0.0, Unit::None).to_px(&ctx), Some(0));
    assert_eq!(Value::Ident("auto".into()).to_px(&ctx), None);
}

#[test]
fn descendant_and_child_combinators_select_through_the_path() {
    let store = CssParser::new().parse("div p { text-align: center } section > p { text-align: right }");
    assert_eq!(
        resolve(&store, &[element("div", ""), element("span", ""), element("p", "")]).align,
        Align::Center
    );
    assert_eq!(resolve(&store, &[element("section", ""), element("p", "")]).align, Align::Right);
    assert_eq!(
        resolve(&store, &[element("section", ""), element("div", ""), element("p", "")]).align,
        Align::Center
    );
}

#[test]
fn style_elements_and_inline_styles_reach_flow_items() {
    let html = r#"<html><head><style>p.lead { font-size: 24px } .quiet { text-transform: lowercase }</style></head>
        <body><p class="lead">Opening <span style="text-transform: uppercase">line</span></p>
        <p class="quiet">SOFT</p></body></html>"#;
    let mut prep = FlowPrep::new(FlowPrepOptions::for_display(480, 800));
    let items = prep.prepare(html.as_bytes()).unwrap();
    let words: Vec<(&str, i32)> = items
        .iter()
        .filter_map(|item| match item {
            FlowItem::Word { text, format, .. } => Some((text.as_str(), format.font_size)),
            _ => None,
        })
        .collect();
    assert_eq!(words, vec![("Opening", 24), ("LINE", 24), ("soft", 16)]);
}
