mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{cmd_inspect, cmd_lookup, cmd_update, cmd_watch, LookupArgs};

#[derive(Parser)]
#[command(name = "geolens")]
#[command(
    about = "IP geolocation over MaxMind DB style databases",
    long_about = "geolens - load, refresh and query country, ASN, city and registrant databases\n\n\
    Databases live in one directory (country.mmdb, asn.mmdb, city.mmdb, whois.mmdb) and are\n\
    downloaded from the URLs in the config file when missing or on update.\n\n\
    Examples:\n\
      geolens --config geolens.json lookup 81.2.69.160 2001:db8::1\n\
      geolens lookup --database GeoLite2-City.mmdb 81.2.69.160\n\
      geolens inspect geodb/country.mmdb --json\n\
      geolens --config geolens.json update\n\
      geolens --config geolens.json watch --interval 3600"
)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Storage directory (overrides the config file)
    #[arg(short, long, global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one or more IP addresses
    Lookup {
        /// Addresses to look up
        #[arg(value_name = "IP", required = true)]
        ips: Vec<String>,

        /// Query this database file directly and print its raw records
        #[arg(long, value_name = "FILE")]
        database: Option<PathBuf>,

        /// Only use files already on disk, never download
        #[arg(long)]
        offline: bool,

        /// Report "blocked" for these comma-separated country codes
        #[arg(long, value_name = "CODES")]
        deny: Option<String>,

        /// Report "allowed" against these comma-separated country codes
        #[arg(long, value_name = "CODES")]
        allow: Option<String>,

        /// No output, only exit code (0 = every address found)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show the metadata of a database file
    Inspect {
        /// Path to the database file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output metadata as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Re-download and replace every enabled database once
    Update {
        /// Output status as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Load databases and keep them refreshed until interrupted
    Watch {
        /// Refresh interval in seconds (default: the configured cadence)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli_utils::init_tracing(cli.verbose);

    let config = || cli_utils::load_config(cli.config.as_deref(), cli.dir.clone());

    match cli.command {
        Commands::Lookup {
            ips,
            database,
            offline,
            deny,
            allow,
            quiet,
        } => cmd_lookup(
            config()?,
            LookupArgs {
                ips,
                database,
                offline,
                deny,
                allow,
                quiet,
            },
        ),
        Commands::Inspect { database, json } => cmd_inspect(database, json),
        Commands::Update { json } => cmd_update(config()?, json),
        Commands::Watch { interval } => cmd_watch(config()?, interval),
    }
}
