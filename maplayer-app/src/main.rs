use anyhow::{bail, Context};
use maplayer::{LayerConfig, MapLayer};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A drawing job: the layer to open and the calls to run on it, in order
#[derive(Debug, Deserialize)]
struct Job {
    #[serde(default)]
    config: LayerConfig,
    #[serde(default)]
    operations: Vec<Call>,
}

#[derive(Debug, Deserialize)]
struct Call {
    op: String,
    #[serde(default)]
    args: serde_json::Value,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next().map(PathBuf::from) else {
        bail!("usage: maplayer-app <job.json>");
    };
    if args.next().is_some() {
        bail!("usage: maplayer-app <job.json>");
    }

    let job = load_job(&path)?;
    let total = job.operations.len();
    log::info!("running {} operations from {}", total, path.display());

    let mut layer = MapLayer::new(job.config).context("opening map layer")?;
    let outcome = run(&mut layer, &job.operations);
    let closed = layer.close().context("closing map layer");

    let touched = outcome?;
    closed?;
    println!("{} operations, {} tile updates", total, touched);
    Ok(())
}

fn load_job(path: &Path) -> anyhow::Result<Job> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading job file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing job file {}", path.display()))
}

fn run(layer: &mut MapLayer, calls: &[Call]) -> anyhow::Result<usize> {
    let mut touched = 0;
    for (index, call) in calls.iter().enumerate() {
        touched += layer
            .draw(&call.op, call.args.clone())
            .with_context(|| format!("operation #{} ({})", index + 1, call.op))?;
    }
    Ok(touched)
}
