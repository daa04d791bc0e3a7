use anyhow::{Context, Result};
use geolens::{Config, DataValue, GeoManager, HttpFetcher};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install the stderr tracing subscriber (`RUST_LOG` wins over `-v`)
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "geolens=debug" } else { "geolens=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Read the config file (if any) and apply the directory override
pub fn load_config(path: Option<&Path>, directory: Option<PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(directory) = directory {
        config.directory = directory;
    }
    Ok(config)
}

/// Build a manager using the HTTP fetcher sized from the config
pub fn http_manager(config: Config) -> Arc<GeoManager> {
    let fetcher = Arc::new(HttpFetcher::new(config.max_download_bytes));
    Arc::new(GeoManager::new(config, fetcher))
}

/// Split comma-separated country lists, dropping blanks
pub fn parse_country_list(list: Option<&str>) -> Vec<String> {
    list.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

pub fn read_database_file(path: &Path) -> Result<geolens::Reader> {
    geolens::Reader::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))
}

pub fn data_value_to_json(data: &DataValue) -> serde_json::Value {
    match data {
        DataValue::String(s) => json!(s),
        DataValue::Double(d) => json!(d),
        DataValue::Bytes(b) => json!(b),
        DataValue::Uint16(u) => json!(u),
        DataValue::Uint32(u) => json!(u),
        DataValue::Uint64(u) => json!(u),
        DataValue::Uint128(u) => json!(u.to_string()),
        DataValue::Int32(i) => json!(i),
        DataValue::Bool(b) => json!(b),
        DataValue::Float(f) => json!(f),
        DataValue::Map(entries) => {
            let map: serde_json::Map<String, serde_json::Value> = entries
                .iter()
                .map(|(k, v)| (k.clone(), data_value_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
        DataValue::Array(items) => {
            json!(items.iter().map(data_value_to_json).collect::<Vec<_>>())
        }
    }
}

/// Mask an address down to its network
pub fn format_cidr(ip: std::net::IpAddr, prefix_len: u8) -> String {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    match ip {
        IpAddr::V4(v4) => {
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix_len.min(32))).unwrap_or(0);
            format!("{}/{}", Ipv4Addr::from(u32::from(v4) & mask), prefix_len)
        }
        IpAddr::V6(v6) => {
            let mask = u128::MAX
                .checked_shl(128 - u32::from(prefix_len.min(128)))
                .unwrap_or(0);
            format!("{}/{}", Ipv6Addr::from(u128::from(v6) & mask), prefix_len)
        }
    }
}

pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// `YYYY-MM-DD HH:MM:SS UTC` for a Unix timestamp
pub fn format_unix_timestamp(timestamp: u64) -> String {
    let days = timestamp / 86_400;
    let secs = timestamp % 86_400;

    // Civil-from-days (proleptic Gregorian)
    let z = days as i64 + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        year,
        month,
        day,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cidr() {
        assert_eq!(format_cidr("10.1.2.3".parse().unwrap(), 8), "10.0.0.0/8");
        assert_eq!(format_cidr("10.1.2.3".parse().unwrap(), 0), "0.0.0.0/0");
        assert_eq!(format_cidr("2001:db8::1".parse().unwrap(), 32), "2001:db8::/32");
    }

    #[test]
    fn test_format_unix_timestamp() {
        assert_eq!(format_unix_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_unix_timestamp(1_700_000_000), "2023-11-14 22:13:20 UTC");
        assert_eq!(format_unix_timestamp(951_782_400), "2000-02-29 00:00:00 UTC");
    }

    #[test]
    fn test_parse_country_list() {
        assert_eq!(parse_country_list(Some("us, de,,FR ")), vec!["us", "de", "FR"]);
        assert!(parse_country_list(None).is_empty());
    }
}
