// ============================================================================
// MaskFE CLI: headless mask generation via command-line arguments
// ============================================================================
//
// Usage examples:
//   maskfe --input photo.png --gestures strokes.json --output photo_mask.png
//   maskfe -i shots/*.jpg --gestures select_sky.json --output-dir masks/
//   maskfe -i photo.png -o blank_mask.png              (no gestures: empty mask)
//   maskfe -i wide.png --container 1200x800 --embedded -g g.json -o m.png
//
// No GUI is opened in CLI mode.  Gestures are replayed through the same
// editing session the GUI uses, in display coordinates of the fitted surface.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::canvas::{ContainerBounds, SurfaceLayout};
use crate::components::tools::{PaintMode, SelectMode, Tool};
use crate::editor::MaskEditor;
use crate::error::EditorError;
use crate::settings::EditorSettings;

/// Container used when `--container` is not given.
pub const DEFAULT_CONTAINER: (u32, u32) = (1600, 1200);

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MaskFE headless mask generator.
///
/// Replay recorded brush / selection gestures on images and write the
/// resulting inpainting masks, no GUI required.
#[derive(Parser, Debug)]
#[command(
    name = "maskfe",
    about = "MaskFE headless inpainting mask generator",
    long_about = "Replay a JSON gesture script on image files and write the\n\
                  native-resolution inpainting mask (opaque black, transparent\n\
                  where the image should be regenerated) as PNG.\n\n\
                  Example:\n  \
                  maskfe --input photo.png --gestures strokes.json --output mask.png\n  \
                  maskfe -i *.jpg -g select.json --output-dir masks/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// JSON gesture script replayed on every input.
    /// If omitted, an empty (fully opaque) mask is written.
    #[arg(short, long, value_name = "SCRIPT.json")]
    pub gestures: Option<PathBuf>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Masks are written as `<stem>_mask.png`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Container the surface is fitted into, as WIDTHxHEIGHT.
    #[arg(long, value_name = "WxH")]
    pub container: Option<String>,

    /// Use the embedded layout (container width) instead of the capped one.
    #[arg(long)]
    pub embedded: bool,

    /// Echo log output to stderr and print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Gesture script
// ============================================================================

/// One scripted editor action.  Scripts are JSON arrays of these, e.g.
/// `[{"op":"brush","diameter":30},{"op":"stroke","points":[[10,10],[80,40]]}]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GestureOp {
    Tool { tool: Tool },
    PaintMode { mode: PaintMode },
    Brush { diameter: f32 },
    SelectMode { mode: SelectMode },
    /// Pointer down on the first point, moves through the rest, then up.
    Stroke { points: Vec<(f32, f32)> },
    /// Flood-select at a point.  Falls back to the current select mode.
    Select {
        x: f32,
        y: f32,
        #[serde(default)]
        mode: Option<SelectMode>,
    },
    Invert,
    ClearSelection,
    MarkSelection,
    MarkBackground,
    Clear,
    Undo,
    Redo,
}

pub fn parse_gestures(json: &str) -> Result<Vec<GestureOp>, EditorError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_gestures(path: &Path) -> Result<Vec<GestureOp>, EditorError> {
    parse_gestures(&std::fs::read_to_string(path)?)
}

/// Replay `ops` on a loaded editor.
pub fn replay(editor: &mut MaskEditor, ops: &[GestureOp]) {
    for op in ops {
        match op {
            GestureOp::Tool { tool } => editor.tools.active_tool = *tool,
            GestureOp::PaintMode { mode } => editor.tools.paint_mode = *mode,
            GestureOp::Brush { diameter } => editor.tools.set_brush_diameter(*diameter),
            GestureOp::SelectMode { mode } => editor.tools.select_mode = *mode,
            GestureOp::Stroke { points } => {
                let Some((first, rest)) = points.split_first() else {
                    continue;
                };
                let previous = editor.tools.active_tool;
                editor.tools.active_tool = Tool::Paint;
                if editor.pointer_down(*first) {
                    for p in rest {
                        editor.pointer_move(*p);
                    }
                    editor.pointer_up();
                }
                editor.tools.active_tool = previous;
            }
            GestureOp::Select { x, y, mode } => {
                let mode = mode.unwrap_or(editor.tools.select_mode);
                editor.select_at((*x, *y), mode);
            }
            GestureOp::Invert => {
                editor.invert_selection();
            }
            GestureOp::ClearSelection => {
                editor.clear_selection();
            }
            GestureOp::MarkSelection => {
                editor.mark_selection();
            }
            GestureOp::MarkBackground => {
                editor.mark_background();
            }
            GestureOp::Clear => {
                editor.clear_mask();
            }
            GestureOp::Undo => {
                editor.undo();
            }
            GestureOp::Redo => {
                editor.redo();
            }
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("maskfe: nothing to do, no source images found");
        return ExitCode::FAILURE;
    }

    // One --output path cannot hold several masks
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "maskfe: {} sources resolved but --output names a single file; pass --output-dir instead",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let container = match args.container.as_deref() {
        Some(spec) => match parse_container(spec) {
            Some(c) => c,
            None => {
                eprintln!("maskfe: --container '{}' is not WIDTHxHEIGHT", spec);
                return ExitCode::FAILURE;
            }
        },
        None => ContainerBounds::new(DEFAULT_CONTAINER.0, DEFAULT_CONTAINER.1),
    };

    let gestures: Vec<GestureOp> = match &args.gestures {
        Some(path) => match load_gestures(path) {
            Ok(ops) => ops,
            Err(e) => {
                eprintln!("maskfe: gesture script {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Vec::new(),
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("maskfe: cannot create {}: {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let settings = EditorSettings::load();
    let layout = if args.embedded {
        SurfaceLayout::Embedded
    } else {
        SurfaceLayout::Standalone {
            cap: settings.display_cap,
        }
    };

    let report = inputs.len() > 1 || args.verbose;
    let mut failed = 0usize;

    for input_path in &inputs {
        let started = Instant::now();
        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("maskfe: {}: no file name to derive a mask name from", input_path.display());
            failed += 1;
            continue;
        };

        let mut editor = MaskEditor::new(settings.clone(), container);
        match run_one(&mut editor, layout, input_path, &output_path, &gestures) {
            Ok(()) if report => println!(
                "{} -> {} in {} ms",
                input_path.display(),
                output_path.display(),
                started.elapsed().as_millis()
            ),
            Ok(()) => {}
            Err(e) => {
                log::error!("{}: {}", input_path.display(), e);
                eprintln!("maskfe: {}: {}", input_path.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        log::warn!("{} of {} masks failed", failed, inputs.len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

pub fn run_one(
    editor: &mut MaskEditor,
    layout: SurfaceLayout,
    input: &Path,
    output: &Path,
    gestures: &[GestureOp],
) -> Result<(), EditorError> {
    editor.set_layout(layout)?;
    editor.load_path(input)?;
    replay(editor, gestures);
    let artifact = editor
        .export_mask()
        .ok_or_else(|| EditorError::Encode("no surface to export".into()))?;
    artifact.save(output)
}

// ============================================================================
// Helpers
// ============================================================================

/// Turn `--input` arguments into source files, first occurrence wins.
///
/// An argument naming an existing file is taken as-is.  Anything else is a
/// glob whose matches are kept only when they are regular files with a
/// decodable extension, so `shots/*` skips gesture scripts and folders.
pub fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut inputs: Vec<PathBuf> = Vec::new();
    let mut push = |path: PathBuf| {
        if !inputs.contains(&path) {
            inputs.push(path);
        }
    };

    for pattern in patterns {
        let literal = PathBuf::from(pattern);
        if literal.is_file() {
            push(literal);
            continue;
        }
        let entries = match glob::glob(pattern) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Ignoring input '{}': {}", pattern, e);
                continue;
            }
        };
        let matches: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|p| p.is_file() && crate::io::is_supported_path(p))
            .collect();
        if matches.is_empty() {
            log::warn!("Input '{}' matched no images", pattern);
        }
        matches.into_iter().for_each(&mut push);
    }

    inputs
}

/// Parse `WIDTHxHEIGHT` (either `x` or `X`).  Zero sides are rejected.
pub fn parse_container(spec: &str) -> Option<ContainerBounds> {
    let (w, h) = spec.trim().split_once(['x', 'X'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some(ContainerBounds::new(w, h))
}

/// Compute the mask path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` joined with `<stem>_mask.png`
/// 3. Fallback: `<stem>_mask.png` next to the input
pub fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    input.file_stem()?;
    let name = crate::io::mask_file_name(input);
    match output_dir {
        Some(dir) => Some(dir.join(name)),
        None => Some(input.parent().unwrap_or(Path::new(".")).join(name)),
    }
}
