//! Audit command implementation.

use anyhow::Result;
use attesta_core::{AuditEntry, AuditListQuery, AuditReader, HttpAuditClient};
use clap::Subcommand;
use colored::Colorize;

use crate::utils::{format_timestamp, http_config, short_hash};
use crate::{OutputFormat, ServerArgs};

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// List ledger entries, newest first
    List {
        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        page_size: Option<u32>,

        /// Sort key, e.g. `createdAt` or `-captureIndex`
        #[arg(long, allow_hyphen_values = true)]
        sort: Option<String>,

        #[arg(long)]
        attachment_id: Option<i64>,

        #[arg(long)]
        captured_by: Option<i64>,

        #[arg(long)]
        barcode: Option<String>,

        #[arg(long)]
        image_hash: Option<String>,
    },

    /// Show one ledger entry
    Get {
        #[arg(value_name = "ID")]
        id: i64,
    },
}

/// Execute the audit command.
pub async fn execute(command: AuditCommand, server: ServerArgs, format: OutputFormat) -> Result<()> {
    let client = HttpAuditClient::new(http_config(&server))?;

    match command {
        AuditCommand::List {
            page,
            page_size,
            sort,
            attachment_id,
            captured_by,
            barcode,
            image_hash,
        } => {
            let query = AuditListQuery {
                page,
                page_size,
                sort,
                attachment_id,
                captured_by_id: captured_by,
                barcode,
                image_hash,
            };
            let page = client.list_entries(&query).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
                OutputFormat::Text => {
                    for entry in &page.data {
                        print_row(entry);
                    }
                    println!(
                        "{}",
                        format!(
                            "page {}/{} ({} entries)",
                            page.meta.page, page.meta.total_page, page.meta.count
                        )
                        .dimmed()
                    );
                }
            }
        }
        AuditCommand::Get { id } => {
            let entry = client.get_entry(id).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entry)?),
                OutputFormat::Text => print_entry(&entry),
            }
        }
    }
    Ok(())
}

fn print_row(entry: &AuditEntry) {
    println!(
        "{:>6}  {:<12}  {:>3}  {:<16}  {}",
        entry.id,
        entry.action.as_str(),
        entry
            .capture_index
            .map_or_else(|| "-".to_string(), |i| i.to_string()),
        entry.image_hash.as_deref().map_or("-", short_hash),
        entry.captured_by_name.as_deref().unwrap_or("-"),
    );
}

fn print_entry(entry: &AuditEntry) {
    let field = |label: &str, value: Option<String>| {
        println!(
            "   {:<18} {}",
            label.dimmed(),
            value.unwrap_or_else(|| "-".to_string())
        );
    };

    println!("{} #{}", "Audit entry".bold(), entry.id);
    field("Action:", Some(entry.action.to_string()));
    field("Attachment:", entry.attachment_id.map(|id| id.to_string()));
    field("Capture index:", entry.capture_index.map(|i| i.to_string()));
    field("Image hash:", entry.image_hash.clone());
    field(
        "Captured by:",
        entry.captured_by_name.clone().map(|name| match entry.captured_by_id {
            Some(id) => format!("{name} ({id})"),
            None => name,
        }),
    );
    field("Captured at:", entry.captured_at.clone());
    field("Server time:", Some(entry.server_timestamp.clone()));
    field("Recorded:", Some(format_timestamp(&entry.created_at)));
    field(
        "Location:",
        entry.latitude.zip(entry.longitude).map(|(lat, lon)| match entry.accuracy {
            Some(acc) => format!("{lat:.6}, {lon:.6} (±{acc:.0} m)"),
            None => format!("{lat:.6}, {lon:.6}"),
        }),
    );
    field("Barcode:", entry.barcode.clone());
    field("Device:", entry.device_info.clone());
}
