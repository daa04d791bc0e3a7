use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_unix_timestamp, read_database_file};

pub fn cmd_inspect(database: PathBuf, json_output: bool) -> Result<()> {
    let reader = read_database_file(&database)?;
    let metadata = reader.metadata();
    let size = reader.as_bytes().len();

    if json_output {
        let output = json!({
            "file": database.display().to_string(),
            "size": size,
            "database_type": metadata.database_type,
            "ip_version": metadata.ip_version.bit_count(),
            "record_size": metadata.record_size.bits(),
            "node_count": metadata.node_count,
            "binary_format_major_version": metadata.binary_format_major_version,
            "binary_format_minor_version": metadata.binary_format_minor_version,
            "build_epoch": metadata.build_epoch,
            "languages": metadata.languages,
            "description": metadata.description,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Database:      {}", database.display());
    println!("Size:          {}", format_bytes(size));
    println!("Type:          {}", metadata.database_type);
    println!(
        "Format:        {}.{}",
        metadata.binary_format_major_version, metadata.binary_format_minor_version
    );
    println!("IP version:    {}", metadata.ip_version.bit_count());
    println!("Record size:   {} bits", metadata.record_size.bits());
    println!("Nodes:         {}", metadata.node_count);
    if metadata.build_epoch > 0 {
        println!("Built:         {}", format_unix_timestamp(metadata.build_epoch));
    }
    if !metadata.languages.is_empty() {
        println!("Languages:     {}", metadata.languages.join(", "));
    }
    for (lang, text) in &metadata.description {
        println!("Description:   [{}] {}", lang, text);
    }
    Ok(())
}
