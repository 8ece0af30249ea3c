//! Inspect the style pipeline from the command line.
//!
//! Usage:
//!   epub-flow tokens <CSS_FILE>
//!   epub-flow rules <CSS_FILE>
//!   epub-flow resolve <CSS_FILE> <TAG> [.class ...] [#id]
//!   epub-flow flow [--size WxH] <XHTML_FILE> [CSS_FILES...]

use std::path::Path;
use std::process::ExitCode;

use epub_flow::{
    Cascade, CascadeConfig, CssParser, ElementDescriptor, ElementLevel, ElementPath, FlowItem,
    FlowPrep, FlowPrepOptions, RuleStore, Token, Tokenizer,
};

const DEFAULT_WIDTH: i32 = 480;
const DEFAULT_HEIGHT: i32 = 800;

fn usage() {
    eprintln!("Usage: epub-flow <COMMAND> [ARGS...]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  tokens <CSS_FILE>                          Print the token stream");
    eprintln!("  rules <CSS_FILE>                           Print parsed rules in source order");
    eprintln!("  resolve <CSS_FILE> <TAG> [.class] [#id]    Print the resolved format of an element");
    eprintln!("  flow [--size WxH] <XHTML> [CSS_FILES...]   Print the flow item stream of a chapter");
}

fn read_text(path: &str) -> Result<String, String> {
    std::fs::read_to_string(Path::new(path)).map_err(|e| format!("read {}: {}", path, e))
}

fn print_diagnostics(parser: &CssParser) {
    for diagnostic in parser.diagnostics() {
        eprintln!("warning: {}", diagnostic);
    }
}

fn cmd_tokens(args: &[String]) -> Result<(), String> {
    let [path] = args else {
        return Err("tokens expects one stylesheet".to_string());
    };
    let css = read_text(path)?;
    for spanned in Tokenizer::new(&css) {
        if spanned.token != Token::Whitespace {
            println!("{:>6}  {:?}", spanned.offset, spanned.token);
        }
    }
    Ok(())
}

fn parse_store(path: &str) -> Result<(CssParser, RuleStore), String> {
    let css = read_text(path)?;
    let mut parser = CssParser::new();
    let mut store = RuleStore::user_agent();
    parser
        .parse_into(&mut store, &css, path)
        .map_err(|e| e.to_string())?;
    Ok((parser, store))
}

fn cmd_rules(args: &[String]) -> Result<(), String> {
    let [path] = args else {
        return Err("rules expects one stylesheet".to_string());
    };
    let css = read_text(path)?;
    let mut parser = CssParser::new();
    let store = parser.parse(&css);
    print_diagnostics(&parser);
    for (selector, suite, rule) in store.iter() {
        println!(
            "#{:<4} {:<32} specificity={} origin={:?}",
            rule.order.0,
            selector.to_string(),
            selector.specificity(),
            rule.origin
        );
        for property in &suite.properties {
            println!(
                "        {:?}: {:?}{}",
                property.id,
                property.values,
                if property.important { " !important" } else { "" }
            );
        }
    }
    Ok(())
}

fn cmd_resolve(args: &[String]) -> Result<(), String> {
    let [path, tag, rest @ ..] = args else {
        return Err("resolve expects a stylesheet and a tag".to_string());
    };
    let (parser, store) = parse_store(path)?;
    print_diagnostics(&parser);

    let mut element = ElementDescriptor::new(tag.as_str());
    for part in rest {
        if let Some(class) = part.strip_prefix('.') {
            element = element.with_classes(class);
        } else if let Some(id) = part.strip_prefix('#') {
            element = element.with_id(id);
        } else {
            return Err(format!("expected .class or #id, got '{}'", part));
        }
    }

    let cascade = Cascade::new(&store, CascadeConfig::for_display(DEFAULT_WIDTH, DEFAULT_HEIGHT));
    let mut levels = vec![ElementLevel::new(ElementDescriptor::new("html"))];
    let mut format = cascade.root_format();
    for next in [ElementDescriptor::new("body"), element] {
        levels.push(ElementLevel::new(next));
        format = cascade.resolve(&ElementPath::new(&levels), &format, None);
    }
    println!("{:#?}", format);
    Ok(())
}

fn parse_size(text: &str) -> Result<(i32, i32), String> {
    let parsed = text
        .split_once('x')
        .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)));
    match parsed {
        Some((w, h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(format!("invalid size '{}', expected WIDTHxHEIGHT", text)),
    }
}

fn cmd_flow(args: &[String]) -> Result<(), String> {
    let (size, args) = match args {
        [flag, size, rest @ ..] if flag == "--size" => (parse_size(size)?, rest),
        _ => ((DEFAULT_WIDTH, DEFAULT_HEIGHT), args),
    };
    let [xhtml_path, css_paths @ ..] = args else {
        return Err("flow expects a chapter file".to_string());
    };
    let xhtml = std::fs::read(xhtml_path).map_err(|e| format!("read {}: {}", xhtml_path, e))?;

    let mut prep = FlowPrep::new(FlowPrepOptions::for_display(size.0, size.1));
    for css_path in css_paths {
        let css = read_text(css_path)?;
        prep.add_stylesheet(&css, css_path)
            .map_err(|e| e.to_string())?;
    }

    let mut depth = 0usize;
    prep.prepare_with(&xhtml, |item| {
        if matches!(item, FlowItem::BlockEnd { .. }) {
            depth = depth.saturating_sub(1);
        }
        let indent = "  ".repeat(depth);
        let fmt = item.format();
        match &item {
            FlowItem::BlockStart { offset, .. } => println!(
                "{:>7} {}block size={} align={:?} margins=({}, {}, {}, {}) indent={}",
                offset,
                indent,
                fmt.font_size,
                fmt.align,
                fmt.margin_top,
                fmt.margin_right,
                fmt.margin_bottom,
                fmt.margin_left,
                fmt.indent
            ),
            FlowItem::BlockEnd { offset, .. } => println!("{:>7} {}end", offset, indent),
            FlowItem::Word {
                text,
                glued,
                offset,
                ..
            } => println!(
                "{:>7} {}{}{:?} size={}",
                offset,
                indent,
                if *glued { "+" } else { "" },
                text,
                fmt.font_size
            ),
            FlowItem::Char { ch, offset, .. } => println!("{:>7} {}char {:?}", offset, indent, ch),
            FlowItem::LineBreak { offset, .. } => println!("{:>7} {}br", offset, indent),
            FlowItem::Image {
                src,
                width,
                height,
                offset,
                ..
            } => println!(
                "{:>7} {}img {} {:?}x{:?}",
                offset, indent, src, width, height
            ),
        }
        if matches!(item, FlowItem::BlockStart { .. }) {
            depth += 1;
        }
    })
    .map_err(|e| e.to_string())?;

    for diagnostic in prep.diagnostics() {
        eprintln!("warning: {}", diagnostic);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        usage();
        return ExitCode::FAILURE;
    };
    let result = match command.as_str() {
        "tokens" => cmd_tokens(rest),
        "rules" => cmd_rules(rest),
        "resolve" => cmd_resolve(rest),
        "flow" => cmd_flow(rest),
        "--help" | "-h" => {
            usage();
            return ExitCode::SUCCESS;
        }
        other => Err(format!("unknown command '{}'", other)),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}
