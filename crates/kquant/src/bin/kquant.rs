use clap::error::ErrorKind;
use clap::Parser;
use kquant::{CompressOptions, Execution, PixelBuffer};
use log::info;
use snafu::{ResultExt, Whatever};
use std::path::PathBuf;
use std::time::Instant;

/// Compress a PNG image by quantizing its colors with k-means.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Image to compress
    input: PathBuf,

    /// Where to write the compressed PNG
    output: PathBuf,

    /// Number of colors in the output
    clusters: usize,

    /// Number of assign/recompute rounds, always run in full
    iterations: usize,

    /// Seed for centroid initialization and empty cluster reseeding
    #[arg(long, default_value_t = kquant::rng::DEFAULT_SEED)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = Execution::Parallel)]
    execution: Execution,
}

/// A wrong number of arguments prints usage and exits cleanly, like an
/// explicit `--help`. Malformed values keep clap's failing exit.
fn exits_with_usage(err: &clap::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::MissingRequiredArgument
            | ErrorKind::UnknownArgument
            | ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
    )
}

impl Args {
    fn options(&self) -> CompressOptions {
        CompressOptions {
            clusters: self.clusters,
            iterations: self.iterations,
            seed: self.seed,
            execution: self.execution,
        }
    }
}

#[snafu::report]
fn main() -> Result<(), Whatever> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if exits_with_usage(&e) => {
            e.print().whatever_context("cannot print usage")?;
            return Ok(());
        }
        Err(e) => e.exit(),
    };

    let options = args.options();
    options.validate().whatever_context("invalid arguments")?;

    let mut img = image::open(&args.input)
        .with_whatever_context(|_| format!("cannot load {}", args.input.display()))?
        .to_rgba8();

    let (width, height) = img.dimensions();
    println!(
        "Image info: Width={width}; \tHeight={height}; \tPitch={}; \tBPP=32",
        width * 4
    );

    info!("compressing with {options:?}");

    let t = Instant::now();
    let centroids = {
        let mut pixels =
            PixelBuffer::try_from(&mut img).whatever_context("invalid input image")?;
        kquant::compress(&mut pixels, &options).whatever_context("compression failed")?
    };
    let elapsed = t.elapsed();

    println!("Elapsed: {:.6} seconds", elapsed.as_secs_f64());
    info!("final palette: {:?}", centroids.as_slice());

    img.save(&args.output)
        .with_whatever_context(|_| format!("cannot save {}", args.output.display()))?;

    Ok(())
}
