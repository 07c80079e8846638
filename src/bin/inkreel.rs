use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "inkreel", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every slide of a project to video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Write one slide, fully drawn, as a PNG.
    Still(StillArgs),
    /// Print the reveal schedule of each layer of a slide.
    Schedule(ScheduleArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory for slide videos (defaults to the project directory).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Worker threads when the project enables parallel slides.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct StillArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Slide name (defaults to the first slide).
    #[arg(long)]
    slide: Option<String>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ScheduleArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Slide name (defaults to the first slide).
    #[arg(long)]
    slide: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Still(args) => cmd_still(args),
        Command::Schedule(args) => cmd_schedule(args),
    }
}

fn read_project_json(path: &Path) -> anyhow::Result<inkreel::Project> {
    let f = File::open(path).with_context(|| format!("open project '{}'", path.display()))?;
    let r = BufReader::new(f);
    let project: inkreel::Project =
        serde_json::from_reader(r).with_context(|| "parse project JSON")?;
    project.validate()?;
    Ok(project)
}

fn project_root(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

fn pick_slide<'p>(
    project: &'p inkreel::Project,
    name: Option<&str>,
) -> anyhow::Result<&'p inkreel::Slide> {
    match name {
        Some(n) => project
            .slides
            .iter()
            .find(|s| s.name == n)
            .with_context(|| format!("no slide named '{n}'")),
        None => project.slides.first().context("project has no slides"),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let project = read_project_json(&args.in_path)?;
    let opts = inkreel::RenderOptions {
        out_dir: args.out_dir,
        threads: args.threads,
    };
    let outcomes = inkreel::render_project(&project, project_root(&args.in_path), &opts)?;

    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => {
                eprintln!(
                    "wrote {} ({} frames, {} held, {} layers skipped)",
                    outcome.output.display(),
                    report.summary.frames_written,
                    report.summary.held_frames,
                    report.layers_skipped
                );
                if let Some(w) = report.summary.warning {
                    eprintln!("warning: {}: {w}", outcome.name);
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("failed {}: {e}", outcome.name);
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} slides failed", outcomes.len());
    }
    Ok(())
}

fn cmd_still(args: StillArgs) -> anyhow::Result<()> {
    let project = read_project_json(&args.in_path)?;
    let slide = pick_slide(&project, args.slide.as_deref())?;
    let mut loader = inkreel::AssetLoader::new(project_root(&args.in_path));
    let still = inkreel::pipeline::compose_slide_still(&project, slide, &mut loader)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output directory '{}'", parent.display()))?;
    }
    still
        .to_rgb_image()?
        .save(&args.out)
        .with_context(|| format!("write png '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_schedule(args: ScheduleArgs) -> anyhow::Result<()> {
    let project = read_project_json(&args.in_path)?;
    let slide = pick_slide(&project, args.slide.as_deref())?;
    let mut loader = inkreel::AssetLoader::new(project_root(&args.in_path));
    let (layers, skipped) = inkreel::pipeline::prepare_layers(&project, slide, &mut loader);

    for layer in &layers {
        let schedule = layer.schedule()?;
        let (w, h) = layer.pixels().dimensions();
        let strategy = match layer.strategy() {
            Some(s) => format!("{s:?}"),
            None => "static".to_string(),
        };
        println!(
            "z={} {w}x{h} {strategy}: {} units ({} drawable), ~{} reveal frames",
            layer.descriptor.z_index,
            schedule.len(),
            schedule.drawable_len(),
            (schedule.drawable_len() as u64).div_ceil(u64::from(layer.descriptor.skip_rate))
        );
    }
    if skipped > 0 {
        println!("{skipped} layer(s) skipped");
    }
    Ok(())
}
