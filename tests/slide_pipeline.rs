use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use inkreel::{
    AssetLoader, FontBook, FrameHook, FrameSink, InMemorySink, InkResult, PixelBuffer, PixelRect,
    Project, RenderOptions, Rgb8, SpriteSet, render_project_with, render_slide,
};

fn write_png(path: &Path, width: u32, height: u32, squares: &[(u32, u32, u32)]) {
    let mut img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    for &(x, y, size) in squares {
        for yy in y..y + size {
            for xx in x..x + size {
                img.put_pixel(xx, yy, image::Rgb([0, 0, 0]));
            }
        }
    }
    img.save(path).unwrap();
}

fn project(json: serde_json::Value) -> Project {
    let p: Project = serde_json::from_value(json).unwrap();
    p.validate().unwrap();
    p
}

fn base_project(layers: serde_json::Value, duration_secs: f64) -> Project {
    project(serde_json::json!({
        "width": 40,
        "height": 40,
        "fps": { "num": 10, "den": 1 },
        "slides": [{ "name": "s0", "duration_secs": duration_secs, "layers": layers }]
    }))
}

fn render_in_memory(project: &Project, root: &Path) -> (inkreel::SlideReport, Vec<PixelBuffer>) {
    let mut loader = AssetLoader::with_fonts(root, FontBook::builtin());
    let sprites = SpriteSet::builtin();
    let mut sink = InMemorySink::new();
    let report = render_slide(
        project,
        &project.slides[0],
        &mut loader,
        &sprites,
        None,
        &mut sink,
    )
    .unwrap();
    assert!(sink.is_closed());
    (report, sink.into_frames())
}

mod duration {
    use super::*;

    #[test]
    fn short_content_is_padded_to_target() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 40, 40, &[(10, 10, 10)]);
        let p = base_project(
            serde_json::json!([{ "source": { "type": "image", "path": "a.png" }, "skip_rate": 1 }]),
            2.0,
        );
        let (report, frames) = render_in_memory(&p, dir.path());
        assert_eq!(frames.len(), 20);
        assert_eq!(report.summary.frames_written, 20);
        assert_eq!(report.summary.held_frames, 19);
        assert!(report.summary.warning.is_none());
        // Held frames show the finished slide without the hand.
        let mut expected = PixelBuffer::filled(40, 40, Rgb8::WHITE);
        expected.fill_rect(PixelRect::new(10, 10, 20, 20), Rgb8::BLACK);
        assert_eq!(frames.last(), Some(&expected));
    }

    #[test]
    fn long_content_is_never_cut() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 40, 40, &[(0, 0, 10)]);
        let p = base_project(
            serde_json::json!([{
                "source": { "type": "image", "path": "a.png" },
                "entrance": { "kind": "fade", "duration_secs": 3.0 }
            }]),
            2.0,
        );
        let (report, frames) = render_in_memory(&p, dir.path());
        assert_eq!(frames.len(), 31);
        assert_eq!(report.summary.held_frames, 0);
        let warning = report.summary.warning.unwrap();
        assert_eq!(warning.target_frames, 20);
        assert_eq!(warning.frames_written, 31);
    }
}

mod layers {
    use super::*;

    #[test]
    fn unreadable_layer_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 20, 20, &[(0, 0, 5)]);
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        let p = base_project(
            serde_json::json!([
                { "source": { "type": "image", "path": "missing.png" } },
                { "source": { "type": "image", "path": "broken.png" } },
                { "source": { "type": "image", "path": "a.png" }, "position": [20, 20] }
            ]),
            1.0,
        );
        let (report, frames) = render_in_memory(&p, dir.path());
        assert_eq!(report.layers_rendered, 1);
        assert_eq!(report.layers_skipped, 2);
        assert_eq!(frames.len(), 10);
        assert_eq!(frames[9].get(22, 22), Rgb8::BLACK);
        assert_eq!(frames[9].get(2, 2), Rgb8::WHITE);
    }

    #[test]
    fn layers_render_in_z_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("big.png"), 40, 40, &[(0, 0, 40)]);
        let red = image::RgbImage::from_pixel(10, 10, image::Rgb([200, 0, 0]));
        red.save(dir.path().join("red.png")).unwrap();
        let p = base_project(
            serde_json::json!([
                { "z_index": 5, "source": { "type": "image", "path": "red.png" }, "mode": "static" },
                { "z_index": 1, "source": { "type": "image", "path": "big.png" }, "mode": "static" }
            ]),
            0.0,
        );
        let (_, frames) = render_in_memory(&p, dir.path());
        let last = frames.last().unwrap();
        assert_eq!(last.get(5, 5), Rgb8::new(200, 0, 0));
        assert_eq!(last.get(30, 30), Rgb8::BLACK);
    }

    #[test]
    fn watermark_hook_marks_every_frame() {
        struct Corner;
        impl FrameHook for Corner {
            fn apply(&self, frame: &mut PixelBuffer) {
                frame.put(0, 0, Rgb8::new(1, 2, 3));
            }
        }

        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 40, 40, &[(20, 20, 10)]);
        let p = base_project(
            serde_json::json!([{ "source": { "type": "image", "path": "a.png" } }]),
            0.5,
        );
        let mut loader = AssetLoader::with_fonts(dir.path(), FontBook::builtin());
        let mut sink = InMemorySink::new();
        render_slide(
            &p,
            &p.slides[0],
            &mut loader,
            &SpriteSet::builtin(),
            Some(&Corner),
            &mut sink,
        )
        .unwrap();
        assert_eq!(sink.frames().len(), 5);
        assert!(sink.frames().iter().all(|f| f.get(0, 0) == Rgb8::new(1, 2, 3)));
    }

    #[test]
    fn still_honors_intelligent_erase() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("under.png"), 40, 40, &[(0, 0, 30)]);
        write_png(&dir.path().join("over.png"), 40, 40, &[(5, 5, 3), (22, 22, 3)]);
        let mut p = base_project(
            serde_json::json!([
                { "source": { "type": "image", "path": "under.png" } },
                { "source": { "type": "image", "path": "over.png" } }
            ]),
            1.0,
        );
        p.slides[0].intelligent_erase = true;
        let mut loader = AssetLoader::with_fonts(dir.path(), FontBook::builtin());
        let still = inkreel::pipeline::compose_slide_still(&p, &p.slides[0], &mut loader).unwrap();
        assert_eq!(still.get(15, 15), Rgb8::WHITE);
        assert_eq!(still.get(27, 27), Rgb8::BLACK);
        assert_eq!(still.get(6, 6), Rgb8::BLACK);
    }
}

mod project {
    use super::*;

    /// Sink that reports its frame count into a shared log on close.
    struct CountingSink {
        name: String,
        frames: u64,
        log: Arc<Mutex<Vec<(String, u64)>>>,
    }

    impl FrameSink for CountingSink {
        fn write(&mut self, _frame: &PixelBuffer) -> InkResult<()> {
            self.frames += 1;
            Ok(())
        }

        fn close(&mut self) -> InkResult<()> {
            self.log
                .lock()
                .unwrap()
                .push((self.name.clone(), self.frames));
            Ok(())
        }
    }

    fn multi_slide(parallel: bool) -> Project {
        project(serde_json::json!({
            "width": 40,
            "height": 40,
            "fps": { "num": 10, "den": 1 },
            "parallel_slides": parallel,
            "slides": [
                { "name": "a", "duration_secs": 1.0,
                  "layers": [{ "source": { "type": "image", "path": "a.png" } }] },
                { "name": "b", "duration_secs": 0.5,
                  "layers": [{ "source": { "type": "image", "path": "a.png" }, "mode": "eraser" }] },
                { "name": "c", "duration_secs": 2.0, "layers": [] }
            ]
        }))
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 40, 40, &[(4, 4, 8), (28, 28, 8)]);

        let mut results = Vec::new();
        for parallel in [false, true] {
            let log = Arc::new(Mutex::new(Vec::new()));
            let outcomes = render_project_with(
                &multi_slide(parallel),
                dir.path(),
                &FontBook::builtin(),
                &RenderOptions {
                    out_dir: None,
                    threads: Some(2),
                },
                |slide, _| {
                    Ok(Box::new(CountingSink {
                        name: slide.name.clone(),
                        frames: 0,
                        log: Arc::clone(&log),
                    }) as Box<dyn FrameSink>)
                },
            )
            .unwrap();
            let names: Vec<_> = outcomes.iter().map(|o| o.name.clone()).collect();
            assert_eq!(names, ["a", "b", "c"]);
            let reports: Vec<_> = outcomes
                .into_iter()
                .map(|o| o.result.unwrap().summary)
                .collect();
            let mut closed = log.lock().unwrap().clone();
            closed.sort();
            assert_eq!(
                closed,
                vec![
                    ("a".to_string(), 10),
                    ("b".to_string(), 5),
                    ("c".to_string(), 20)
                ]
            );
            results.push(reports);
        }
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn sink_failure_fails_only_that_slide() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 40, 40, &[(4, 4, 8)]);
        let outcomes = render_project_with(
            &multi_slide(false),
            dir.path(),
            &FontBook::builtin(),
            &RenderOptions::default(),
            |slide, _| {
                if slide.name == "b" {
                    Err(inkreel::InkError::sink("cannot open output"))
                } else {
                    Ok(Box::new(InMemorySink::new()) as Box<dyn FrameSink>)
                }
            },
        )
        .unwrap();
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.as_ref().unwrap_err().is_fatal());
        assert!(outcomes[2].result.is_ok());
    }
}
