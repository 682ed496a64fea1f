//! Verify command implementation.
//!
//! Recomputes the SHA-256 of a stored image and compares it with the hash its
//! audit entry recorded at capture time.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use attesta_core::{AuditEntry, AuditReader, HttpAuditClient, ImageHash};
use colored::Colorize;
use tracing::{error, info};

use crate::utils::{format_timestamp, http_config, read_file};
use crate::ServerArgs;

/// Where the expected hash came from.
enum Expected {
    Entry(Box<AuditEntry>),
    Given,
}

/// Execute the verify command.
pub async fn execute(
    file: PathBuf,
    entry_id: Option<i64>,
    hash: Option<String>,
    server: ServerArgs,
    quiet: bool,
) -> Result<()> {
    let content = read_file(&file)?;
    let actual = ImageHash::from_bytes(&content);

    let (expected, source) = match (hash, entry_id) {
        (Some(given), _) => (
            ImageHash::parse(&given).context("Invalid image hash")?,
            Expected::Given,
        ),
        (None, Some(id)) => {
            let client = HttpAuditClient::new(http_config(&server))?;
            let entry = client.get_entry(id).await?;
            let Some(recorded) = entry.image_hash.as_deref() else {
                bail!("Audit entry {id} has no image hash to compare against");
            };
            let recorded = ImageHash::parse(recorded)
                .with_context(|| format!("Invalid image hash on audit entry {id}"))?;
            (recorded, Expected::Entry(Box::new(entry)))
        }
        (None, None) => bail!("Either --entry or --hash is required"),
    };

    if expected == actual {
        info!(path = %file.display(), image_hash = %actual, "Image matches");
        if !quiet {
            println!();
            println!("{}", "╔════════════════════════════════════════╗".green());
            println!(
                "{}",
                "║              AUTHENTIC                 ║".green().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".green());
            println!();
            println!("   {} {}", "Image hash:".dimmed(), actual.as_str().green());
            print_entry(&source);
        }
        return Ok(());
    }

    error!(
        expected = %expected,
        actual = %actual,
        "Image does not match recorded hash"
    );
    if !quiet {
        println!();
        println!("{}", "╔════════════════════════════════════════╗".red());
        println!(
            "{}",
            "║              TAMPERED                  ║".red().bold()
        );
        println!("{}", "╚════════════════════════════════════════╝".red());
        println!();
        println!("   {} {}", "Expected:".dimmed(), expected);
        println!("   {} {}", "Got:".dimmed(), actual.as_str().red());
        print_entry(&source);
    }
    match source {
        Expected::Entry(entry) => {
            bail!("TAMPERED: image hash does not match audit entry {}", entry.id)
        }
        Expected::Given => bail!("TAMPERED: image hash does not match the expected hash"),
    }
}

fn print_entry(source: &Expected) {
    let Expected::Entry(entry) = source else {
        return;
    };
    println!("   {} #{} ({})", "Audit entry:".dimmed(), entry.id, entry.action);
    if let Some(name) = &entry.captured_by_name {
        println!("   {} {}", "Captured by:".dimmed(), name);
    }
    if let Some(at) = &entry.captured_at {
        println!("   {} {}", "Captured at:".dimmed(), at);
    }
    println!(
        "   {} {}",
        "Recorded:".dimmed(),
        format_timestamp(&entry.created_at)
    );
    if let Some(barcode) = &entry.barcode {
        println!("   {} {}", "Barcode:".dimmed(), barcode);
    }
}
