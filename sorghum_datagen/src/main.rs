mod config;
mod pipeline;
mod trees;

use std::path::PathBuf;
use std::process::ExitCode;

use sorghum_core::{CpuRayTracer, Error, Result};
use sorghum_procgen::ProceduralDescriptor;

use config::DatasetConfig;
use pipeline::PointCloudCapture;

const USAGE: &str = "usage: sorghum_datagen <pointcloud|tree|init-config|descriptor> [--config FILE] [--out DIR] [--samples N] [--seed N]";

#[derive(Debug, Default)]
struct Args {
    mode: String,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    samples: Option<u32>,
    seed: Option<u32>,
    target: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .ok_or_else(|| Error::config(format!("{} needs a value", flag)))
        };
        match arg.as_str() {
            "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "--out" => args.out = Some(PathBuf::from(value("--out")?)),
            "--samples" => {
                let raw = value("--samples")?;
                args.samples = Some(raw.parse().map_err(|_| Error::config(format!("bad sample count {:?}", raw)))?);
            }
            "--seed" => {
                let raw = value("--seed")?;
                args.seed = Some(raw.parse().map_err(|_| Error::config(format!("bad seed {:?}", raw)))?);
            }
            other if args.mode.is_empty() => args.mode = other.to_string(),
            other if args.target.is_none() => args.target = Some(PathBuf::from(other)),
            other => return Err(Error::config(format!("unexpected argument {:?}", other))),
        }
    }
    if args.mode.is_empty() {
        return Err(Error::config(USAGE));
    }
    Ok(args)
}

fn load_config(args: &Args) -> Result<DatasetConfig> {
    let mut config = match &args.config {
        Some(path) => DatasetConfig::load(path)?,
        None => DatasetConfig::default(),
    };
    if let Some(out) = &args.out {
        config.output_dir = out.clone();
    }
    if let Some(samples) = args.samples {
        config.sample_count = samples;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    match args.mode.as_str() {
        "pointcloud" => {
            let config = load_config(&args)?;
            log::info!(
                "Capturing {} samples into {}",
                config.sample_count,
                config.output_dir.display()
            );
            let summary = PointCloudCapture::new(config, Box::new(CpuRayTracer::new())).run()?;
            if summary.failed > 0 {
                log::warn!("{} samples failed to export", summary.failed);
            }
            Ok(())
        }
        "tree" => {
            let config = load_config(&args)?;
            let mut oracle = CpuRayTracer::new();
            let written = trees::grow_trees(&config, &mut oracle)?;
            log::info!("Wrote {} meshes", written.len());
            Ok(())
        }
        "init-config" => {
            let path = args.target.clone().unwrap_or_else(|| PathBuf::from("datagen.json"));
            load_config(&args)?.save(&path)?;
            log::info!("Wrote default config to {}", path.display());
            Ok(())
        }
        "descriptor" => {
            let path = args.target.clone().unwrap_or_else(|| PathBuf::from("descriptor.json"));
            ProceduralDescriptor::default().save(&path)?;
            log::info!("Wrote default descriptor to {}", path.display());
            Ok(())
        }
        other => Err(Error::config(format!("unknown mode {:?}\n{}", other, USAGE))),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = parse_args().and_then(run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
