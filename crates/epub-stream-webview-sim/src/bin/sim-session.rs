//! Drive a reading session against the simulated engine and print each
//! settled location as a JSON line.
//!
//! Usage:
//!   cargo run -p epub-stream-webview-sim --bin sim-session -- [OPTIONS]
//!
//! Set `RUST_LOG=debug` to see bridge and readiness traffic.

use std::env;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;

use epub_stream_webview::{
    Location, OverlayState, ReaderRenderer, Rect, RendererDelegate, RendererError,
    RendererOptions, TurnOutcome, WebViewRenderer,
};
use epub_stream_webview_sim::{SimBook, SimEngine};

#[derive(Clone, Debug)]
struct Args {
    chapters: usize,
    pages: usize,
    turns: usize,
    backwards: bool,
    rtl: bool,
    narrate: bool,
    width: f32,
    height: f32,
    options_path: Option<String>,
}

struct PrintingDelegate;

impl RendererDelegate for PrintingDelegate {
    fn content_ready(&self) {
        log::info!("content ready");
    }

    fn navigated(&self, location: &Location) {
        match serde_json::to_string(location) {
            Ok(line) => println!("{}", line),
            Err(err) => log::warn!("cannot encode location: {}", err),
        }
    }

    fn error(&self, error: &RendererError) {
        eprintln!("renderer error: {}", error);
    }

    fn media_overlay_changed(&self, state: OverlayState) {
        log::info!(
            "media overlay: available={} playing={}",
            state.available,
            state.playing
        );
    }

    fn engine_degraded(&self, degraded: bool) {
        log::warn!("engine degraded: {}", degraded);
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!("{}", help_text());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let cli = parse_args(args)?;
    let options = match &cli.options_path {
        Some(path) => {
            let bytes = std::fs::read(path).map_err(|e| format!("read {}: {}", path, e))?;
            RendererOptions::from_json_slice(&bytes).map_err(|e| e.to_string())?
        }
        None => RendererOptions::default(),
    };

    let mut layout = SimBook::uniform(cli.chapters, cli.pages);
    if cli.narrate {
        layout = (0..cli.chapters).fold(layout, SimBook::narrated);
    }
    if cli.rtl {
        layout = layout.right_to_left();
    }
    let book = Arc::new(layout.to_book("urn:uuid:sim-session"));
    let (engine, handle) = SimEngine::new(layout);
    let delegate = Rc::new(PrintingDelegate);
    let frame = Rect::new(0.0, 0.0, cli.width, cli.height);
    let mut renderer = WebViewRenderer::new(frame, book, &delegate, engine)
        .map_err(|e| e.to_string())?
        .with_options(options);
    renderer.pump();

    if cli.narrate && renderer.apply_media_overlay_playback_toggle() {
        renderer.pump();
    }

    let mut turned = 0;
    for _ in 0..cli.turns {
        let outcome = if cli.backwards {
            renderer.open_page_left()
        } else {
            renderer.open_page_right()
        };
        match outcome {
            TurnOutcome::Dispatched => turned += 1,
            TurnOutcome::Rejected(reason) => {
                log::info!("stopping: turn rejected ({:?})", reason);
                break;
            }
            TurnOutcome::Failed => return Err("page turn could not be queued".to_string()),
        }
        renderer.pump();
    }

    let state = renderer.page_state();
    eprintln!(
        "turned {} pages; at spine {} page {}/{}; {} scripts evaluated",
        turned,
        state.position.spine_index,
        state.position.page_index + 1,
        state.position.page_count,
        handle.script_count()
    );
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    let mut cfg = Args {
        chapters: 3,
        pages: 4,
        turns: 5,
        backwards: false,
        rtl: false,
        narrate: false,
        width: 480.0,
        height: 800.0,
        options_path: None,
    };

    let mut i = 1usize;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--help" | "-h" => return Err("help requested".to_string()),
            "--backwards" => cfg.backwards = true,
            "--rtl" => cfg.rtl = true,
            "--narrate" => cfg.narrate = true,
            "--chapters" | "--pages" | "--turns" | "--width" | "--height" | "--options" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| format!("{} requires a value", flag))?;
                match flag {
                    "--chapters" => cfg.chapters = parse_count(flag, v)?,
                    "--pages" => cfg.pages = parse_count(flag, v)?,
                    "--turns" => {
                        cfg.turns = v
                            .parse::<usize>()
                            .map_err(|_| format!("invalid {} value '{}'", flag, v))?
                    }
                    "--width" => cfg.width = parse_px(flag, v)?,
                    "--height" => cfg.height = parse_px(flag, v)?,
                    _ => cfg.options_path = Some(v.clone()),
                }
                i += 1;
            }
            other => return Err(format!("unknown argument '{}'", other)),
        }
        i += 1;
    }
    Ok(cfg)
}

fn parse_count(flag: &str, value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("invalid {} value '{}'", flag, value)),
    }
}

fn parse_px(flag: &str, value: &str) -> Result<f32, String> {
    match value.parse::<f32>() {
        Ok(px) if px.is_finite() && px > 0.0 => Ok(px),
        _ => Err(format!("invalid {} value '{}'", flag, value)),
    }
}

fn help_text() -> &'static str {
    "Usage: sim-session [OPTIONS]

Options:
  --chapters <N>      Spine items in the simulated book (default: 3)
  --pages <N>         Pages per spine item (default: 4)
  --turns <N>         Page turns to request (default: 5)
  --backwards         Turn left instead of right
  --rtl               Right-to-left page progression
  --narrate           Give every chapter a media overlay and start playback
  --width <PX>        Frame width (default: 480)
  --height <PX>       Frame height (default: 800)
  --options <FILE>    Renderer options as JSON"
}
