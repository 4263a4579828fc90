use anyhow::{Context, Result};
use clap::Parser;
use fretline::{Args, Difficulty, PlayConfig, Session, chart_summary, import_chart_file, run_autoplay};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PlayConfig::load(path)?,
        None => PlayConfig::default(),
    };

    config.apply_args(&args);
    config.validate()?;
    debug!("Play settings: {:?}", config);

    let difficulty: Difficulty = args.difficulty.parse()?;
    info!("Importing chart: '{}'...", args.chart.display());
    let chart = import_chart_file(&args.chart, args.bpm, difficulty)?;

    if args.dry_run {
        info!("{}", chart_summary(&chart));
        return Ok(());
    }

    let mut session = Session::new(Arc::new(chart), config)?;
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_handler = Arc::clone(&stop);

    ctrlc::set_handler(move || {
        warn!("Ctrl-C received, stopping playback..!");
        stop_for_handler.store(true, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler..!")?;

    let score = run_autoplay(&mut session, args.tick_rate, !args.fast, &stop)?;
    let summary = score.summary();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!(
            "Score {} | {:.2}% | grade {} | max combo {} | P{} G{} B{} M{}",
            summary.score,
            summary.percentage,
            summary.grade,
            summary.max_combo,
            summary.perfect,
            summary.good,
            summary.bad,
            summary.miss
        );
    }

    Ok(())
}
