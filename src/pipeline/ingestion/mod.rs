// Ingestion: reading the three raw inputs

pub mod demography;
pub mod immigration;

use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::pipeline::processing::parser::LabelCatalog;

pub use demography::{parse_demography, read_demography};
pub use immigration::read_immigration;

/// Loads the label-description file. Non-UTF-8 bytes are replaced.
pub fn read_label_catalog(path: &Path) -> Result<LabelCatalog> {
    let bytes = fs::read(path)?;
    info!(path = %path.display(), bytes = bytes.len(), "read label descriptions");
    Ok(LabelCatalog::new(String::from_utf8_lossy(&bytes).into_owned()))
}
