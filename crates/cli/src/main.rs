//! stochmap CLI - Monte Carlo propagation of spatial uncertainty

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use stochmap_core::io::{read_geotiff, write_geotiff};
use stochmap_core::{Field, GridTransform};
use stochmap_geostat::{
    empirical_variogram, fit_correlogram, global_morans_i, CorrelogramFamily, CorrelogramModel,
    VariogramParams,
};
use stochmap_mc::{
    ensemble_mean, ensemble_quantile, ensemble_sd, exceedance_probability, propagate,
    MarginalDistribution, MissingPolicy, NumericSpatialModel, PropagateParams, SampleMethod,
    SampleParams,
};

mod slope;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "stochmap")]
#[command(author, version, about = "Monte Carlo propagation of spatial uncertainty", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a field
    Info {
        /// Input GeoTIFF
        input: PathBuf,
    },
    /// Draw an ensemble of realizations and summarize it
    Sample {
        /// Input GeoTIFF holding the mean surface (omit for a synthetic one)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Side length of the synthetic surface when no input is given
        #[arg(long, default_value = "64")]
        synthetic_size: usize,
        /// Per-cell standard deviation
        #[arg(long, default_value = "1.0")]
        sd: f64,
        /// Correlogram family: exponential, spherical, linear, gaussian
        #[arg(long, default_value = "exponential")]
        family: String,
        /// Correlogram sill (0..1); 0 disables spatial correlation
        #[arg(long, default_value = "0.0")]
        sill: f64,
        /// Correlogram range in map units
        #[arg(long, default_value = "300.0")]
        range: f64,
        /// Ensemble size
        #[arg(short, long, default_value = "100")]
        n: usize,
        /// Sampling method: random, simulation, stratified
        #[arg(short, long, default_value = "random")]
        method: String,
        /// Neighborhood cap for sequential simulation (full-grid when absent)
        #[arg(long)]
        max_neighbors: Option<usize>,
        /// Master seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Number of leading realizations to write as GeoTIFFs
        #[arg(long, default_value = "0")]
        save_realizations: usize,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Propagate an ensemble through the slope model and summarize
    Propagate {
        /// Input GeoTIFF holding the elevation mean surface
        #[arg(long)]
        input: Option<PathBuf>,
        /// Side length of the synthetic surface when no input is given
        #[arg(long, default_value = "64")]
        synthetic_size: usize,
        /// Per-cell elevation standard deviation
        #[arg(long, default_value = "1.0")]
        sd: f64,
        /// Correlogram family: exponential, spherical, linear, gaussian
        #[arg(long, default_value = "exponential")]
        family: String,
        /// Correlogram sill (0..1); 0 disables spatial correlation
        #[arg(long, default_value = "0.0")]
        sill: f64,
        /// Correlogram range in map units
        #[arg(long, default_value = "300.0")]
        range: f64,
        /// Ensemble size
        #[arg(short, long, default_value = "100")]
        n: usize,
        /// Sampling method: random, simulation, stratified
        #[arg(short, long, default_value = "random")]
        method: String,
        /// Neighborhood cap for sequential simulation
        #[arg(long)]
        max_neighbors: Option<usize>,
        /// Master seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Run the model on only the leading realizations
        #[arg(long)]
        runs: Option<usize>,
        /// Quantile probability to map (strictly between 0 and 1)
        #[arg(short, long, default_value = "0.9")]
        quantile: f64,
        /// Map the probability of exceeding this slope (degrees)
        #[arg(long)]
        threshold: Option<f64>,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Estimate spatial structure of a field
    Diagnose {
        /// Input GeoTIFF
        input: PathBuf,
        /// Number of lag bins
        #[arg(long, default_value = "15")]
        n_lags: usize,
        /// Maximum lag distance in map units
        #[arg(long)]
        max_lag: Option<f64>,
        /// Anchor-cell stride for large grids
        #[arg(long, default_value = "1")]
        stride: usize,
        /// Correlogram family to fit
        #[arg(long, default_value = "exponential")]
        family: String,
        /// Write the diagnosis as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_field(path: &PathBuf) -> Result<Field<f64>> {
    let pb = spinner("Reading field...");
    let field = read_geotiff(path).context("Failed to read field")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", field.cols(), field.rows());
    Ok(field)
}

fn write_field(field: &Field<f64>, path: &PathBuf) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(field, path).context("Failed to write output")?;
    pb.finish_and_clear();
    println!("Saved: {}", path.display());
    Ok(())
}

fn parse_family(s: &str) -> Result<CorrelogramFamily> {
    match s.to_lowercase().as_str() {
        "exponential" | "exp" => Ok(CorrelogramFamily::Exponential),
        "spherical" | "sph" => Ok(CorrelogramFamily::Spherical),
        "linear" | "lin" => Ok(CorrelogramFamily::Linear),
        "gaussian" | "gau" => Ok(CorrelogramFamily::Gaussian),
        _ => anyhow::bail!(
            "Unknown family: {}. Use exponential, spherical, linear, or gaussian.",
            s
        ),
    }
}

fn parse_method(s: &str, max_neighbors: Option<usize>) -> Result<SampleMethod> {
    match s.to_lowercase().as_str() {
        "random" | "rand" => Ok(SampleMethod::Random),
        "simulation" | "sim" | "gaussian" => Ok(SampleMethod::GaussianSimulation { max_neighbors }),
        "stratified" | "lhs" => Ok(SampleMethod::Stratified),
        _ => anyhow::bail!(
            "Unknown method: {}. Use random, simulation, or stratified.",
            s
        ),
    }
}

/// Rolling synthetic surface for runs without an input file.
fn synthetic_surface(size: usize) -> Field<f64> {
    let mut field = Field::from_fn(size, size, |row, col| {
        let x = col as f64 / size as f64;
        let y = row as f64 / size as f64;
        100.0 + 40.0 * (2.0 * std::f64::consts::PI * x).sin() * (std::f64::consts::PI * y).cos()
            + 15.0 * y
    });
    field.set_transform(GridTransform::new(0.0, size as f64 * 30.0, 30.0, -30.0));
    field.set_nodata(Some(f64::NAN));
    field
}

fn build_model(
    mean: Field<f64>,
    sd: f64,
    family: &str,
    sill: f64,
    range: f64,
) -> Result<NumericSpatialModel> {
    let mut sd_field = mean.with_same_shape::<f64>();
    sd_field.set_nodata(Some(f64::NAN));
    let (rows, cols) = mean.shape();
    for row in 0..rows {
        for col in 0..cols {
            let m = unsafe { mean.get_unchecked(row, col) };
            let v = if mean.is_nodata(m) { f64::NAN } else { sd };
            unsafe { sd_field.set_unchecked(row, col, v) };
        }
    }

    let correlogram = if sill > 0.0 {
        Some(
            CorrelogramModel::new(parse_family(family)?, sill, range)
                .context("Invalid correlogram")?,
        )
    } else {
        None
    };

    NumericSpatialModel::new(
        true,
        MarginalDistribution::Normal {
            mean,
            sd: sd_field,
        },
        correlogram,
    )
    .context("Invalid uncertainty model")
}

fn load_mean(input: &Option<PathBuf>, synthetic_size: usize) -> Result<Field<f64>> {
    match input {
        Some(path) => read_field(path),
        None => {
            info!("No input given, using a {0} x {0} synthetic surface", synthetic_size);
            Ok(synthetic_surface(synthetic_size))
        }
    }
}

fn draw_ensemble(
    model: &NumericSpatialModel,
    n: usize,
    method: &str,
    max_neighbors: Option<usize>,
    seed: u64,
) -> Result<stochmap_core::Ensemble<f64>> {
    let params = SampleParams {
        n,
        method: parse_method(method, max_neighbors)?,
        seed,
    };
    let pb = spinner(&format!("Drawing {} realizations...", n));
    let ensemble = model.sample(&params).context("Sampling failed")?;
    pb.finish_and_clear();
    Ok(ensemble)
}

fn write_report(report: &serde_json::Value, path: &PathBuf) -> Result<()> {
    let text = serde_json::to_string_pretty(report)?;
    std::fs::write(path, text).context("Failed to write report")?;
    println!("Report: {}", path.display());
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let field = read_field(&input)?;
            let (rows, cols) = field.shape();
            let bounds = field.bounds();
            let summary = field.summary();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, field.len());
            println!("Cell size: {}", field.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(nodata) = field.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = summary.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = summary.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = summary.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                summary.valid_count,
                100.0 * summary.valid_count as f64 / field.len() as f64
            );
        }

        // ── Sample ───────────────────────────────────────────────────
        Commands::Sample {
            input,
            synthetic_size,
            sd,
            family,
            sill,
            range,
            n,
            method,
            max_neighbors,
            seed,
            save_realizations,
            output,
        } => {
            let mean = load_mean(&input, synthetic_size)?;
            let model = build_model(mean, sd, &family, sill, range)?;

            let start = Instant::now();
            let ensemble = draw_ensemble(&model, n, &method, max_neighbors, seed)?;
            let elapsed = start.elapsed();
            info!("Sampling took {:.2?}", elapsed);

            std::fs::create_dir_all(&output).context("Failed to create output directory")?;
            let mean_field = ensemble_mean(&ensemble, MissingPolicy::Propagate)?;
            let sd_field = ensemble_sd(&ensemble, MissingPolicy::Propagate)?;
            write_field(&mean_field, &output.join("ensemble_mean.tif"))?;
            write_field(&sd_field, &output.join("ensemble_sd.tif"))?;

            for i in 0..save_realizations.min(n) {
                let member = ensemble.member(i).expect("index below ensemble size");
                write_field(member, &output.join(format!("realization_{:04}.tif", i)))?;
            }

            let report = serde_json::json!({
                "command": "sample",
                "n": n,
                "method": method,
                "seed": seed,
                "sd": sd,
                "sill": sill,
                "range": range,
                "family": family,
                "elapsed_ms": elapsed.as_millis() as u64,
            });
            write_report(&report, &output.join("sample_report.json"))?;
        }

        // ── Propagate ────────────────────────────────────────────────
        Commands::Propagate {
            input,
            synthetic_size,
            sd,
            family,
            sill,
            range,
            n,
            method,
            max_neighbors,
            seed,
            runs,
            quantile,
            threshold,
            output,
        } => {
            let mean = load_mean(&input, synthetic_size)?;
            let model = build_model(mean, sd, &family, sill, range)?;
            let inputs = draw_ensemble(&model, n, &method, max_neighbors, seed)?;

            fn forward(
                fields: &[&Field<f64>],
            ) -> std::result::Result<Field<f64>, stochmap_mc::BoxError> {
                slope::horn_slope(fields[0])
            }
            let start = Instant::now();
            let pb = spinner("Propagating through slope model...");
            let outputs = propagate(&inputs, &forward, &PropagateParams { runs })
                .context("Propagation failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();
            info!("Propagation of {} realizations took {:.2?}", outputs.len(), elapsed);

            std::fs::create_dir_all(&output).context("Failed to create output directory")?;
            let mean_field = ensemble_mean(&outputs, MissingPolicy::Propagate)?;
            let sd_field = ensemble_sd(&outputs, MissingPolicy::Propagate)?;
            let q_field = ensemble_quantile(&outputs, quantile, MissingPolicy::Propagate)
                .context("Invalid quantile")?;
            write_field(&mean_field, &output.join("slope_mean.tif"))?;
            write_field(&sd_field, &output.join("slope_sd.tif"))?;
            write_field(
                &q_field,
                &output.join(format!("slope_q{:02}.tif", (quantile * 100.0).round() as u32)),
            )?;
            if let Some(t) = threshold {
                let p_field = exceedance_probability(&outputs, t, MissingPolicy::Propagate)?;
                write_field(&p_field, &output.join("slope_exceedance.tif"))?;
            }

            let report = serde_json::json!({
                "command": "propagate",
                "n": n,
                "runs": outputs.len(),
                "method": method,
                "seed": seed,
                "sd": sd,
                "sill": sill,
                "range": range,
                "family": family,
                "quantile": quantile,
                "threshold": threshold,
                "elapsed_ms": elapsed.as_millis() as u64,
            });
            write_report(&report, &output.join("propagate_report.json"))?;
        }

        // ── Diagnose ─────────────────────────────────────────────────
        Commands::Diagnose {
            input,
            n_lags,
            max_lag,
            stride,
            family,
            json,
        } => {
            let field = read_field(&input)?;

            let pb = spinner("Estimating spatial structure...");
            let start = Instant::now();
            let variogram = empirical_variogram(
                &field,
                &VariogramParams {
                    n_lags,
                    max_lag,
                    stride,
                },
            )
            .context("Variogram estimation failed")?;
            let fitted = fit_correlogram(&variogram, parse_family(&family)?)
                .context("Correlogram fit failed")?;
            let morans = global_morans_i(&field).context("Moran's I failed")?;
            pb.finish_and_clear();
            info!("Diagnosis took {:.2?}", start.elapsed());

            println!("File: {}", input.display());
            println!("Field variance: {:.4}", variogram.variance);
            println!("\nEmpirical variogram:");
            println!("{:>12} {:>14} {:>10}", "lag", "semivariance", "pairs");
            for ((lag, gamma), count) in variogram
                .lags
                .iter()
                .zip(variogram.semivariance.iter())
                .zip(variogram.pair_counts.iter())
            {
                println!("{:>12.2} {:>14.4} {:>10}", lag, gamma, count);
            }
            println!("\nFitted correlogram: {}", fitted);
            println!(
                "\nGlobal Moran's I: {:.4} (expected {:.4}, z = {:.2}, p = {:.4})",
                morans.i, morans.expected, morans.z_score, morans.p_value
            );

            if let Some(path) = json {
                let report = serde_json::json!({
                    "command": "diagnose",
                    "variance": variogram.variance,
                    "lags": variogram.lags,
                    "semivariance": variogram.semivariance,
                    "pair_counts": variogram.pair_counts,
                    "fit": {
                        "family": family,
                        "sill": fitted.sill(),
                        "range": fitted.range(),
                        "nugget": fitted.nugget(),
                    },
                    "morans_i": {
                        "i": morans.i,
                        "expected": morans.expected,
                        "z_score": morans.z_score,
                        "p_value": morans.p_value,
                    },
                });
                write_report(&report, &path)?;
            }
        }
    }

    Ok(())
}
