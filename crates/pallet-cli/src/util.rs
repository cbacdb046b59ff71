use anyhow::{Context, Result};
use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use pallet_classify::graph::{Document, DocumentFormat};
use pallet_classify::AlgorithmParams;

pub fn validate_tsv_or_csv_file(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("csv") => {}
        _ => anyhow::bail!("File must have a .tsv or .csv extension: {}", path.display()),
    }

    if !path.exists() {
        anyhow::bail!("File does not exist: {}", path.display());
    }

    Ok(())
}

/// Load algorithm hyper-parameters from JSON; fields left out keep their defaults.
pub fn load_params<P: AsRef<Path>>(path: P) -> Result<AlgorithmParams> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let params: AlgorithmParams = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(params)
}

pub fn read_document(path: &Path) -> Result<(String, Document)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model document: {}", path.display()))?;
    let document = Document::read(&text, DocumentFormat::NTriples)
        .with_context(|| format!("Failed to parse model document: {}", path.display()))?;
    Ok((text, document))
}

/// Write `text` to `path`, or to stdout when no path is given.
pub fn write_output(path: Option<&PathBuf>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            file.write_all(text.as_bytes())?;
            log::info!("Wrote {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(text.as_bytes())?;
            handle.flush()?;
        }
    }
    Ok(())
}
