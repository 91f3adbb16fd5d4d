use anyhow::Context;
use clap::Parser;
use ecg_denoise::config::Args;
use ecg_denoise::data_loading::{load_intervals, load_signal};
use ecg_denoise::output::write_run;
use ecg_denoise::pipeline::Pipeline;
use log::info;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = args.pipeline_config()?;
    info!("Sampling rate {} Hz, memory lean: {}", config.fs, config.memory_lean);

    let signal = load_signal(&args.signal)?;
    let gaps = load_intervals(&args.gaps, Some(signal.len()))?;
    info!("Loaded {} samples and {} gap intervals", signal.len(), gaps.len());

    let result = Pipeline::new(config)
        .run(&signal, &gaps)
        .context("running denoising pipeline")?;

    let summary = write_run(&result, &args.output_dir, args.write_intermediates)?;
    println!("{}", summary);

    Ok(())
}
