use std::path::{Path, PathBuf};

fn inkreel_exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_inkreel")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "inkreel.exe"
            } else {
                "inkreel"
            });
            p
        })
}

fn write_project(dir: &Path) -> PathBuf {
    let mut img = image::RgbImage::from_pixel(32, 32, image::Rgb([255, 255, 255]));
    for y in 8..24 {
        for x in 8..24 {
            img.put_pixel(x, y, image::Rgb([0, 0, 0]));
        }
    }
    img.save(dir.join("square.png")).unwrap();

    let project = serde_json::json!({
        "width": 64,
        "height": 64,
        "fps": { "num": 30, "den": 1 },
        "slides": [{
            "name": "intro",
            "duration_secs": 1.0,
            "layers": [
                { "source": { "type": "image", "path": "square.png" }, "position": [16, 16] }
            ]
        }]
    });
    let path = dir.join("project.json");
    let f = std::fs::File::create(&path).unwrap();
    serde_json::to_writer_pretty(f, &project).unwrap();
    path
}

#[test]
fn cli_still_writes_png() {
    let dir = tempfile::tempdir().unwrap();
    let project_path = write_project(dir.path());
    let out_path = dir.path().join("out").join("intro.png");

    let status = std::process::Command::new(inkreel_exe())
        .arg("still")
        .arg("--in")
        .arg(&project_path)
        .arg("--out")
        .arg(&out_path)
        .status()
        .unwrap();

    assert!(status.success());
    let still = image::open(&out_path).unwrap().to_rgb8();
    assert_eq!(still.dimensions(), (64, 64));
    assert_eq!(still.get_pixel(30, 30).0, [0, 0, 0]);
    assert_eq!(still.get_pixel(2, 2).0, [255, 255, 255]);
}

#[test]
fn cli_schedule_lists_layers() {
    let dir = tempfile::tempdir().unwrap();
    let project_path = write_project(dir.path());

    let out = std::process::Command::new(inkreel_exe())
        .arg("schedule")
        .arg("--in")
        .arg(&project_path)
        .output()
        .unwrap();

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("z=0 32x32"), "{stdout}");
}

#[test]
fn cli_rejects_unknown_slide() {
    let dir = tempfile::tempdir().unwrap();
    let project_path = write_project(dir.path());

    let status = std::process::Command::new(inkreel_exe())
        .arg("still")
        .arg("--in")
        .arg(&project_path)
        .arg("--slide")
        .arg("missing")
        .arg("--out")
        .arg(dir.path().join("x.png"))
        .status()
        .unwrap();

    assert!(!status.success());
}
