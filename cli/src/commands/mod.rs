pub mod ask;
pub mod chat;
pub mod info;
pub mod sample;
pub mod scripts;

use anyhow::{Context, Result};
use pbi_lens::{LensConfig, PbiPackage};

pub fn load_config(path: Option<&str>) -> Result<LensConfig> {
    match path {
        Some(path) => LensConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path)),
        None => Ok(LensConfig::default()),
    }
}

pub fn open_package(path: &str, config: &LensConfig) -> Result<PbiPackage> {
    let pkg = PbiPackage::open_path(path, config)
        .with_context(|| format!("Failed to open Power BI file: {}", path))?;
    for warning in pkg.model().warnings() {
        log::info!("{}", warning);
    }
    Ok(pkg)
}
