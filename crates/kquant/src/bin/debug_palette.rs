use clap::Parser;
use image::{Rgba, RgbaImage};
use kquant::debug_helpers::{ensure_out_dir, find_png_files, load_rgba8, FolderArgs};
use kquant::{kmeans, rng, Parallel, PixelBuffer, Sequential};
use snafu::{whatever, ResultExt, Whatever};
use std::time::Instant;

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    folder: FolderArgs,

    #[arg(long, default_value_t = 8)]
    clusters: usize,

    #[arg(long, default_value_t = 10)]
    iterations: usize,
}

#[snafu::report]
fn main() -> Result<(), Whatever> {
    env_logger::init();

    let args = Args::parse();
    let files = find_png_files(&args.folder.folder)?;
    let out_dir = ensure_out_dir(&args.folder.folder, "palette")?;

    for path in &files {
        let Some(filename) = path.file_name() else {
            continue;
        };

        let img = load_rgba8(path)?;
        let (w, h) = img.dimensions();

        let mut seq = img.clone();
        let t = Instant::now();
        let centroids = {
            let mut pixels = PixelBuffer::try_from(&mut seq).whatever_context("bad image")?;
            kmeans::run(&Sequential, &mut pixels, args.clusters, args.iterations, &mut rng::new())
                .whatever_context("sequential run failed")?
        };
        let seq_elapsed = t.elapsed();

        let mut par = img.clone();
        let t = Instant::now();
        let par_centroids = {
            let mut pixels = PixelBuffer::try_from(&mut par).whatever_context("bad image")?;
            kmeans::run(&Parallel, &mut pixels, args.clusters, args.iterations, &mut rng::new())
                .whatever_context("parallel run failed")?
        };
        let par_elapsed = t.elapsed();

        if centroids != par_centroids || seq.as_raw() != par.as_raw() {
            whatever!("{}: strategies disagree", filename.to_string_lossy());
        }

        // left: original, centre: palette swatches, right: compressed
        let swatch_w = (w / 5).max(1);
        let out_w = w * 2 + swatch_w;
        let mut out = RgbaImage::new(out_w, h);

        for y in 0..h {
            for x in 0..w {
                out.put_pixel(x, y, *img.get_pixel(x, y));
                out.put_pixel(w + swatch_w + x, y, *seq.get_pixel(x, y));
            }
        }

        let num_centroids = centroids.len() as u32;
        let swatch_h = (h / num_centroids).max(1);
        for (i, c) in centroids.as_slice().iter().enumerate() {
            let y_start = (i as u32 * swatch_h).min(h);
            let y_end = if i as u32 == num_centroids - 1 {
                h
            } else {
                (y_start + swatch_h).min(h)
            };
            for y in y_start..y_end {
                for x in w..(w + swatch_w) {
                    out.put_pixel(x, y, Rgba([c.r, c.g, c.b, c.a]));
                }
            }
        }

        out.save(out_dir.join(filename))
            .with_whatever_context(|_| format!("cannot save {}", filename.to_string_lossy()))?;
        println!(
            "{}: k={}, sequential {:?}, parallel {:?}",
            filename.to_string_lossy(),
            num_centroids,
            seq_elapsed,
            par_elapsed,
        );
    }

    Ok(())
}
