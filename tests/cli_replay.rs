use std::path::PathBuf;
use std::process::ExitCode;

use image::{Rgba, RgbaImage};

use maskfe::cli::{self, CliArgs, GestureOp};
use maskfe::components::tools::Tool;
use maskfe::{ContainerBounds, EditorSettings, MaskEditor, SurfaceLayout};

fn write_source(dir: &std::path::Path, name: &str, w: u32, h: u32) -> PathBuf {
    let path = dir.join(name);
    let mut img = RgbaImage::from_pixel(w, h, Rgba([30, 30, 30, 255]));
    // Bright square in the top-left quarter
    for y in 0..h / 2 {
        for x in 0..w / 2 {
            img.put_pixel(x, y, Rgba([240, 240, 240, 255]));
        }
    }
    img.save(&path).unwrap();
    path
}

fn args(input: Vec<String>) -> CliArgs {
    CliArgs {
        input,
        gestures: None,
        output: None,
        output_dir: None,
        container: None,
        embedded: false,
        verbose: false,
    }
}

#[test]
fn replay_select_and_mark_background() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "square.png", 40, 40);
    let out = dir.path().join("mask.png");

    let ops = cli::parse_gestures(
        r#"[
            {"op":"tool","tool":"select"},
            {"op":"select","x":5,"y":5},
            {"op":"mark_background"}
        ]"#,
    )
    .unwrap();

    let mut editor = MaskEditor::new(EditorSettings::default(), ContainerBounds::new(40, 40));
    cli::run_one(&mut editor, SurfaceLayout::Embedded, &src, &out, &ops).unwrap();

    let mask = image::open(&out).unwrap().to_rgba8();
    assert_eq!(mask.dimensions(), (40, 40));
    // Bright square kept, everything else marked for regeneration
    assert_eq!(mask.get_pixel(5, 5).0, [0, 0, 0, 255]);
    assert_eq!(mask.get_pixel(30, 30).0[3], 0);
    assert_eq!(mask.get_pixel(30, 5).0[3], 0);
}

#[test]
fn stroke_then_undo_leaves_blank_mask() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "s.png", 64, 64);
    let out = dir.path().join("m.png");
    let ops = vec![
        GestureOp::Brush { diameter: 20.0 },
        GestureOp::Stroke { points: vec![(10.0, 10.0), (50.0, 50.0)] },
        GestureOp::Undo,
    ];

    let mut editor = MaskEditor::new(EditorSettings::default(), ContainerBounds::new(64, 64));
    cli::run_one(&mut editor, SurfaceLayout::Embedded, &src, &out, &ops).unwrap();
    let mask = image::open(&out).unwrap().to_rgba8();
    assert!(mask.pixels().all(|p| p.0 == [0, 0, 0, 255]));
}

#[test]
fn stroke_keeps_active_tool() {
    let mut editor = MaskEditor::new(EditorSettings::default(), ContainerBounds::new(32, 32));
    editor
        .load_pixels(RgbaImage::from_pixel(32, 32, Rgba([0, 0, 0, 255])))
        .unwrap();
    cli::replay(
        &mut editor,
        &[
            GestureOp::Tool { tool: Tool::Select },
            GestureOp::Stroke { points: vec![(16.0, 16.0)] },
        ],
    );
    assert_eq!(editor.tools.active_tool, Tool::Select);
    assert!(editor.can_undo());
}

#[test]
fn batch_run_writes_one_mask_per_input() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "a.png", 20, 10);
    write_source(dir.path(), "b.png", 12, 12);
    let out_dir = dir.path().join("masks");

    let pattern = dir.path().join("*.png").to_string_lossy().into_owned();
    let mut a = args(vec![pattern]);
    a.output_dir = Some(out_dir.clone());
    a.embedded = true;
    a.container = Some("100x100".into());
    assert_eq!(cli::run(a), ExitCode::SUCCESS);

    let mask_a = image::open(out_dir.join("a_mask.png")).unwrap();
    let mask_b = image::open(out_dir.join("b_mask.png")).unwrap();
    assert_eq!((mask_a.width(), mask_a.height()), (20, 10));
    assert_eq!((mask_b.width(), mask_b.height()), (12, 12));
}

#[test]
fn undecodable_input_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("broken.png");
    std::fs::write(&bad, b"not a png").unwrap();
    let mut a = args(vec![bad.to_string_lossy().into_owned()]);
    a.output = Some(dir.path().join("out.png"));
    assert_eq!(cli::run(a), ExitCode::FAILURE);
}

#[test]
fn bad_container_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "c.png", 8, 8);
    let mut a = args(vec![src.to_string_lossy().into_owned()]);
    a.container = Some("wide".into());
    assert_eq!(cli::run(a), ExitCode::FAILURE);
}
