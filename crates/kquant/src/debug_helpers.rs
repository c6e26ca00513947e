use clap::Parser;
use image::RgbaImage;
use snafu::{ResultExt, Whatever};
use std::path::{Path, PathBuf};

#[derive(Parser)]
pub struct FolderArgs {
    /// Path to a folder of images
    pub folder: PathBuf,
}

pub fn find_png_files(folder: &Path) -> Result<Vec<PathBuf>, Whatever> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)
        .with_whatever_context(|_| format!("cannot read {}", folder.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    files.sort();
    Ok(files)
}

pub fn ensure_out_dir(folder: &Path, name: &str) -> Result<PathBuf, Whatever> {
    let dir = folder.join("debug_results").join(name);
    std::fs::create_dir_all(&dir)
        .with_whatever_context(|_| format!("cannot create {}", dir.display()))?;
    Ok(dir)
}

pub fn load_rgba8(path: &Path) -> Result<RgbaImage, Whatever> {
    let img = image::open(path)
        .with_whatever_context(|_| format!("cannot decode {}", path.display()))?;
    Ok(img.to_rgba8())
}
