//! DHAT heap profiler for epub-flow.
//!
//! Profiles allocation patterns of the layout pipeline:
//! style -> prep -> locate -> display.
//!
//! Usage:
//!   cargo run -p epub-flow-heap-profile --release -- [OPTIONS] [XHTML_FILES...]
//!
//! Outputs dhat-<phase>-<name>.json files in the output directory (default: target/memory).
//! Open in https://nnethercote.github.io/dh_view/dh_view.html

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::path::{Path, PathBuf};
use std::process::Command;

use epub_flow::{CssParser, FlowPrep, FlowPrepOptions};
use epub_flow_render::{MonospaceFontEngine, NeverCancel, Paginator, PaginatorOptions};

const DISPLAY_WIDTH: i32 = 480;
const DISPLAY_HEIGHT: i32 = 800;
const SYNTHETIC: &str = "synthetic";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Style,
    Prep,
    Locate,
    Display,
    Full,
}

impl Phase {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "style" => Some(Self::Style),
            "prep" => Some(Self::Prep),
            "locate" => Some(Self::Locate),
            "display" => Some(Self::Display),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Prep => "prep",
            Self::Locate => "locate",
            Self::Display => "display",
            Self::Full => "full",
        }
    }
}

struct Input {
    name: String,
    xhtml: Vec<u8>,
    css: Vec<String>,
}

fn synthetic_input() -> Input {
    let mut xhtml = String::from("<html><head><style>p { text-indent: 1em }</style></head><body>");
    for idx in 0..1_500 {
        xhtml.push_str(&format!(
            "<p class=\"c{}\">Paragraph {} with <em>some</em> emphasis and a long tail of filler words to wrap.</p>",
            idx % 30,
            idx
        ));
    }
    xhtml.push_str("</body></html>");
    let mut css = String::new();
    for idx in 0..300 {
        css.push_str(&format!(
            "div p.c{} > em, .c{} + p {{ margin-left: {}px; font-size: 1.{}em }}\n",
            idx % 30,
            idx,
            idx % 9,
            idx % 10
        ));
    }
    Input {
        name: SYNTHETIC.to_string(),
        xhtml: xhtml.into_bytes(),
        css: vec![css],
    }
}

fn load_input(path: &Path, css_paths: &[PathBuf]) -> Input {
    if path.as_os_str() == SYNTHETIC {
        return synthetic_input();
    }
    let xhtml = std::fs::read(path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e));
    let css = css_paths
        .iter()
        .map(|css| {
            std::fs::read_to_string(css).unwrap_or_else(|e| panic!("read {}: {}", css.display(), e))
        })
        .collect();
    Input {
        name: short_name(path),
        xhtml,
        css,
    }
}

fn profile_input(input: &Input, phase: Phase) {
    let options = FlowPrepOptions::for_display(DISPLAY_WIDTH, DISPLAY_HEIGHT);
    if phase == Phase::Style {
        let mut parser = CssParser::new();
        for css in &input.css {
            let _store = parser.parse(css);
        }
        return;
    }

    let mut prep = FlowPrep::new(options);
    for css in &input.css {
        prep.add_stylesheet(css, "profile.css")
            .unwrap_or_else(|e| panic!("stylesheet {}: {}", input.name, e));
    }
    if phase == Phase::Prep {
        let mut items = 0usize;
        prep.prepare_with(&input.xhtml, |_| items += 1)
            .unwrap_or_else(|e| panic!("prep {}: {}", input.name, e));
        return;
    }

    let items = prep
        .prepare(&input.xhtml)
        .unwrap_or_else(|e| panic!("prep {}: {}", input.name, e));
    let fonts = MonospaceFontEngine::new();
    let paginator = Paginator::new(
        PaginatorOptions::for_display(DISPLAY_WIDTH, DISPLAY_HEIGHT),
        &fonts,
    );
    let pages = paginator
        .locate(&items, &NeverCancel)
        .unwrap_or_else(|e| panic!("locate {}: {}", input.name, e));
    match phase {
        Phase::Display => {
            if let Some(start) = pages.get(pages.len() / 2) {
                let _page = paginator
                    .display_page(&items, start.offset)
                    .unwrap_or_else(|e| panic!("display {}: {}", input.name, e));
            }
        }
        Phase::Full => {
            // Page-flip simulation: every page rendered once, none retained.
            for start in &pages {
                let _page = paginator
                    .display_page(&items, start.offset)
                    .unwrap_or_else(|e| panic!("display {}: {}", input.name, e));
            }
        }
        _ => {}
    }
}

/// Extract a short name from a file path for use in output filenames.
fn short_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

fn usage() {
    eprintln!("Usage: heap-profile [OPTIONS] [XHTML_FILES...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!(
        "  --phase <style|prep|locate|display|full>  Pipeline phase to profile (default: locate)"
    );
    eprintln!("  --css <FILE>                         Stylesheet applied to every chapter (repeatable)");
    eprintln!("  --out-dir <DIR>                      Output directory for dhat JSON (default: target/memory)");
    eprintln!(
        "  --aggregate                          Single profile for all files (default: per-file)"
    );
    eprintln!();
    eprintln!("By default, each chapter gets its own clean DHAT profile (separate process).");
    eprintln!("If no chapters are given, profiles a synthetic one.");
}

fn value_after(args: &[String], i: usize) -> &str {
    args.get(i).map(String::as_str).unwrap_or_else(|| {
        eprintln!("Missing value for {}", args[i - 1]);
        usage();
        std::process::exit(1);
    })
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut phase = Phase::Locate;
    let mut out_dir = PathBuf::from("target/memory");
    let mut files: Vec<PathBuf> = Vec::with_capacity(8);
    let mut css_paths: Vec<PathBuf> = Vec::new();
    let mut aggregate = false;
    // Internal flag: when set, we're a child process profiling a single file.
    let mut single_file_mode = false;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--phase" => {
                i += 1;
                let name = value_after(&args, i);
                phase = Phase::from_str(name).unwrap_or_else(|| {
                    eprintln!("Unknown phase: {}", name);
                    usage();
                    std::process::exit(1);
                });
            }
            "--css" => {
                i += 1;
                css_paths.push(PathBuf::from(value_after(&args, i)));
            }
            "--out-dir" => {
                i += 1;
                out_dir = PathBuf::from(value_after(&args, i));
            }
            "--aggregate" => {
                aggregate = true;
            }
            "--single-file" => {
                single_file_mode = true;
            }
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            other => {
                files.push(PathBuf::from(other));
            }
        }
        i += 1;
    }

    if files.is_empty() {
        files.push(PathBuf::from(SYNTHETIC));
    }

    std::fs::create_dir_all(&out_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create output dir {}: {}", out_dir.display(), e);
        std::process::exit(1);
    });

    let phase_name = phase.name();

    if single_file_mode {
        assert!(files.len() == 1, "--single-file expects exactly one file");
        let input = load_input(&files[0], &css_paths);
        let json_path = out_dir.join(format!("dhat-{phase_name}-{}.json", input.name));
        let _profiler = dhat::Profiler::builder().file_name(json_path).build();
        profile_input(&input, phase);
        return;
    }

    if aggregate {
        let json_path = out_dir.join(format!("dhat-{phase_name}.json"));
        eprintln!(
            "heap-profile: phase={}, files={} (aggregate), out={}",
            phase_name,
            files.len(),
            out_dir.display()
        );
        let inputs: Vec<Input> = files
            .iter()
            .map(|file| load_input(file, &css_paths))
            .collect();
        let _profiler = dhat::Profiler::builder()
            .file_name(json_path.clone())
            .build();
        for input in &inputs {
            eprintln!("  profiling: {}", input.name);
            profile_input(input, phase);
        }
        eprintln!(
            "Done. Open {} in https://nnethercote.github.io/dh_view/dh_view.html",
            json_path.display()
        );
        return;
    }

    let self_exe = std::env::current_exe().unwrap_or_else(|e| {
        eprintln!("Failed to determine own executable path: {}", e);
        std::process::exit(1);
    });

    eprintln!(
        "heap-profile: phase={}, files={} (per-file), out={}",
        phase_name,
        files.len(),
        out_dir.display()
    );

    let mut any_failed = false;
    for file in &files {
        eprintln!("  profiling: {}", file.display());
        let mut command = Command::new(&self_exe);
        command
            .arg("--single-file")
            .arg("--phase")
            .arg(phase_name)
            .arg("--out-dir")
            .arg(&out_dir);
        for css in &css_paths {
            command.arg("--css").arg(css);
        }
        match command.arg(file).status() {
            Ok(s) if s.success() => {}
            Ok(s) => {
                eprintln!("    FAILED (exit {})", s.code().unwrap_or(-1));
                any_failed = true;
            }
            Err(e) => {
                eprintln!("    FAILED to spawn: {}", e);
                any_failed = true;
            }
        }
    }

    eprintln!();
    eprintln!("Profiles saved to {}", out_dir.display());
    eprintln!("Open in https://nnethercote.github.io/dh_view/dh_view.html");

    if any_failed {
        std::process::exit(1);
    }
}
