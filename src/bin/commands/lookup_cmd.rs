use anyhow::{Context, Result};
use geolens::{Config, GeoManager};
use serde_json::json;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli_utils::{
    data_value_to_json, format_cidr, http_manager, parse_country_list, read_database_file,
};

pub struct LookupArgs {
    pub ips: Vec<String>,
    pub database: Option<PathBuf>,
    pub offline: bool,
    pub deny: Option<String>,
    pub allow: Option<String>,
    pub quiet: bool,
}

pub fn cmd_lookup(config: Config, args: LookupArgs) -> Result<()> {
    let found = match &args.database {
        Some(path) => lookup_raw(path, &args.ips, args.quiet)?,
        None => lookup_managed(config, &args)?,
    };
    std::process::exit(if found { 0 } else { 1 });
}

/// Query one database file directly and print the raw records
fn lookup_raw(path: &Path, ips: &[String], quiet: bool) -> Result<bool> {
    let reader = read_database_file(path)?;
    let mut all_found = true;

    for ip_str in ips {
        let ip: IpAddr = ip_str
            .trim()
            .parse()
            .with_context(|| format!("Invalid IP address: {}", ip_str))?;
        let output = match reader
            .lookup(ip)
            .with_context(|| format!("Lookup failed for: {}", ip_str))?
        {
            Some((data, prefix_len)) => {
                let mut record = data_value_to_json(&data);
                if let serde_json::Value::Object(ref mut map) = record {
                    map.insert("cidr".to_string(), json!(format_cidr(ip, prefix_len)));
                    map.insert("prefix_len".to_string(), json!(prefix_len));
                }
                json!({ "ip": ip_str, "found": true, "record": record })
            }
            None => {
                all_found = false;
                json!({ "ip": ip_str, "found": false })
            }
        };
        if !quiet {
            println!("{}", serde_json::to_string(&output)?);
        }
    }
    Ok(all_found)
}

/// Load the configured databases and print merged results
fn lookup_managed(config: Config, args: &LookupArgs) -> Result<bool> {
    let manager = if args.offline {
        Arc::new(GeoManager::new(config, geolens::manager::offline_fetcher()))
    } else {
        http_manager(config)
    };
    manager
        .load_databases()
        .context("Failed to load the country database")?;

    let deny = parse_country_list(args.deny.as_deref());
    let allow = parse_country_list(args.allow.as_deref());

    let results = manager.lookup_batch(&args.ips);
    let mut all_found = true;
    for result in results {
        all_found &= result.found;
        if args.quiet {
            continue;
        }
        let mut output = serde_json::to_value(&result)?;
        if let serde_json::Value::Object(ref mut map) = output {
            if !deny.is_empty() {
                map.insert("blocked".to_string(), json!(manager.is_blocked(&result.ip, &deny)));
            }
            if !allow.is_empty() {
                map.insert("allowed".to_string(), json!(manager.is_allowed(&result.ip, &allow)));
            }
        }
        println!("{}", serde_json::to_string(&output)?);
    }
    Ok(all_found)
}
