//! Hash command implementation.

use std::path::PathBuf;

use anyhow::Result;
use attesta_core::ImageHash;
use serde_json::json;

use crate::utils::read_file;
use crate::OutputFormat;

/// Print the image hash of each file, in the layout of `sha256sum`.
pub fn execute(files: Vec<PathBuf>, format: OutputFormat) -> Result<()> {
    let mut hashes = Vec::with_capacity(files.len());
    for file in &files {
        let bytes = read_file(file)?;
        hashes.push((file, ImageHash::from_bytes(&bytes)));
    }

    match format {
        OutputFormat::Text => {
            for (file, hash) in &hashes {
                println!("{hash}  {}", file.display());
            }
        }
        OutputFormat::Json => {
            let out: Vec<_> = hashes
                .iter()
                .map(|(file, hash)| json!({ "file": file.display().to_string(), "imageHash": hash }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
