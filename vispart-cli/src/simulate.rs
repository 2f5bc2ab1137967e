use std::path::PathBuf;
use std::sync::Arc;

use num_complex::Complex32;
use vispart::dataset::{Dataset, MemDataset, SyntheticLayout};
use vispart::{
    Handle, PartitionOptions, PartitionPlan, Partitioner, Polarization, Selection, StoreMetrics,
};
use vispart_error::VispartResult;
use witchcraft_metrics::Metric;

const LINEAR: [Polarization; 4] = [
    Polarization::XX,
    Polarization::XY,
    Polarization::YX,
    Polarization::YY,
];
const CIRCULAR: [Polarization; 4] = [
    Polarization::RR,
    Polarization::RL,
    Polarization::LR,
    Polarization::LL,
];

#[derive(Debug, clap::Args)]
pub struct SimulateArgs {
    /// Directory for the shard files. A fresh temporary directory is used when omitted.
    #[arg(long)]
    temp_dir: Option<PathBuf>,
    /// Polarizations to partition, e.g. `I,Q` or `XX,YY`.
    #[arg(long, value_delimiter = ',', default_value = "I")]
    pol: Vec<Polarization>,
    /// Store circular instead of linear correlations in the generated dataset.
    #[arg(long)]
    circular: bool,
    #[arg(long, default_value_t = 6)]
    antennas: u32,
    #[arg(long, default_value_t = 4)]
    timesteps: usize,
    #[arg(long, default_value_t = 16)]
    channels: usize,
    #[arg(long, default_value_t = 4)]
    parts: usize,
    /// Replace the data by Gaussian noise with this standard deviation.
    #[arg(long)]
    noise: Option<f32>,
    /// Fraction of samples to flag, between 0 and 1.
    #[arg(long, default_value_t = 0.05, value_parser = parse_fraction)]
    flag_fraction: f64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Draw progress bars while partitioning and committing.
    #[arg(long)]
    progress: bool,
}

fn parse_fraction(value: &str) -> Result<f64, String> {
    let fraction: f64 = value.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
    if (0.0..=1.0).contains(&fraction) {
        Ok(fraction)
    } else {
        Err(format!("{fraction} is not between 0 and 1"))
    }
}

/// Partition a generated dataset, predict a model in every shard from its own data, and commit
/// the model back on close.
pub fn exec_simulate(args: SimulateArgs) -> VispartResult<()> {
    let scratch;
    let directory = match &args.temp_dir {
        Some(directory) => directory.clone(),
        None => {
            scratch = tempfile::tempdir()?;
            scratch.path().to_path_buf()
        }
    };

    let layout = SyntheticLayout {
        antenna_count: args.antennas,
        timestep_count: args.timesteps,
        channel_count: args.channels,
        band_ids: vec![0],
        polarizations: if args.circular { CIRCULAR } else { LINEAR }.to_vec(),
        flag_fraction: args.flag_fraction,
    };
    let dataset = Arc::new(MemDataset::synthetic("simulated.ms", &layout, args.seed)?);
    tracing::info!(
        rows = dataset.row_count(),
        channels = dataset.channel_count(),
        "Generated dataset"
    );

    let metrics = StoreMetrics::default();
    let mut options = PartitionOptions::default()
        .with_polarizations(args.pol.iter().copied())
        .with_temporary_directory(&directory)
        .with_include_model(true)
        .with_model_update_required(true)
        .with_progress(args.progress)
        .with_metrics(metrics.clone());
    if let Some(stddev) = args.noise {
        options = options.with_simulated_noise(stddev);
    }

    let plan = PartitionPlan::split(&layout.band_ids, args.channels, args.parts)?;
    let handle = Partitioner::new(options).partition(
        dataset.clone(),
        Arc::new(Selection::all()),
        &plan,
    )?;
    predict_models(&handle)?;
    handle.close()?;

    let with_model = (0..dataset.row_count())
        .filter(|&row| {
            dataset
                .model(row)
                .is_some_and(|cube| cube.iter().any(|v| *v != Complex32::default()))
        })
        .count();
    println!("rows with a non-zero model: {} of {}", with_model, dataset.row_count());
    print_metrics(&metrics);
    Ok(())
}

/// Write the unweighted data of every row back as its model.
fn predict_models(handle: &Handle) -> VispartResult<()> {
    for shard in 0..handle.shard_count() {
        for &polarization in handle.polarizations() {
            let mut reader = handle.open(shard, polarization)?;
            let stride = reader.row_stride();
            let mut data = vec![Complex32::default(); stride];
            let mut weights = vec![0.0; stride];
            let mut model = vec![Complex32::default(); stride];
            while reader.current_row_available() {
                reader.read_data(&mut data)?;
                reader.read_weights(&mut weights)?;
                for ((out, value), weight) in model.iter_mut().zip(&data).zip(&weights) {
                    *out = if *weight > 0.0 {
                        *value / *weight
                    } else {
                        Complex32::new(f32::NAN, f32::NAN)
                    };
                }
                reader.write_model(reader.current_row(), &model)?;
                reader.next_row()?;
            }
            tracing::debug!(
                shard,
                %polarization,
                rows = reader.row_count(),
                "Predicted model"
            );
        }
    }
    Ok(())
}

fn print_metrics(metrics: &StoreMetrics) {
    let snapshot = metrics.snapshot();
    let mut lines: Vec<(String, String)> = snapshot
        .iter()
        .filter_map(|(id, metric)| {
            let value = match metric {
                Metric::Counter(counter) => counter.count().to_string(),
                Metric::Timer(timer) => format!("{} calls", timer.count()),
                _ => return None,
            };
            Some((id.name().to_string(), value))
        })
        .collect();
    lines.sort();
    for (name, value) in lines {
        println!("{:<32} {}", name, value);
    }
}
