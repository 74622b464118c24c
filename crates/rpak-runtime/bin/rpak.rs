//! RPak command-line tool.
//!
//! Thin wrapper around the rpak-runtime library: decompresses containers to
//! disk, prints header and asset tables, loads containers through the
//! manager and hashes asset names.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rpak_formats::body::{AssetTag, PakBody};
use rpak_formats::header::PakHeader;
use rpak_formats::{decompress_to_vec, pak_guid};
use rpak_runtime::{
    AssetHandle, BindingTable, FnBinding, PakInfo, PakManager, PakStatus, RuntimeConfig, TypeInfo,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "rpak",
    about = "Inspect, decompress and load RPak asset containers",
    version
)]
struct Cli {
    /// Directory base containers are loaded from
    #[arg(long, global = true, env = "RPAK_BASE_PATH")]
    base_path: Option<PathBuf>,

    /// Directory searched before the base directory
    #[arg(long, global = true, env = "RPAK_OVERRIDE_PATH")]
    override_path: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, global = true, env = "RPAK_CONFIG")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompress a container from the base directory into the override directory
    Decompress {
        /// Container file name
        file: String,
    },

    /// Show the header and asset table of a container
    Info {
        /// Container path
        file: PathBuf,
    },

    /// Load containers and print the pak and type lists
    Load {
        /// Container names
        #[arg(required = true)]
        names: Vec<String>,

        /// Register a pass-through binding for a type, as TAG or TAG:VERSION
        #[arg(short, long = "bind", value_name = "TAG")]
        bindings: Vec<String>,
    },

    /// Hash asset names into GUIDs
    Guid {
        /// Asset names
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Serialize)]
struct AssetRow {
    guid: String,
    tag: String,
    version: u32,
    header_size: u32,
    header: Option<String>,
}

#[derive(Serialize)]
struct LoadReport {
    paks: Vec<PakInfo>,
    types: Vec<TypeInfo>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Decompress { file } => {
            let manager = PakManager::new(config, BindingTable::new())?;
            let report = manager.request_repak(file).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} -> {} ({} bytes)",
                    report.input.display(),
                    report.output.display(),
                    report.size
                );
            }
        }
        Commands::Info { file } => info(file, cli.json)?,
        Commands::Load { names, bindings } => {
            let manager = PakManager::new(config, parse_bindings(bindings)?)?;
            let handles = names
                .iter()
                .map(|name| manager.request_load(name))
                .collect::<Result<Vec<_>, _>>()?;
            for handle in handles {
                let status = manager.wait_for(handle).await?;
                if status == PakStatus::Error {
                    tracing::warn!(handle, "pak failed to load");
                }
            }
            print_load_report(&manager, cli.json)?;
        }
        Commands::Guid { names } => {
            for name in names {
                println!("{:#018x}  {name}", pak_guid(name));
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_json_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(path) = &cli.base_path {
        config = config.with_base_path(path);
    }
    if let Some(path) = &cli.override_path {
        config = config.with_override_path(path);
    }
    Ok(config)
}

fn parse_bindings(specs: &[String]) -> Result<BindingTable> {
    let mut table = BindingTable::new();
    for spec in specs {
        let (tag, version) = match spec.split_once(':') {
            Some((tag, version)) => (tag, version.parse().context("Invalid binding version")?),
            None => (spec.as_str(), 0),
        };
        let Ok(bytes) = <[u8; 4]>::try_from(tag.as_bytes()) else {
            bail!("Asset tag '{tag}' must be four characters");
        };
        table.register(FnBinding::new(AssetTag::new(bytes), version, tag, |asset| {
            Ok(AssetHandle(asset.guid()))
        }))?;
    }
    Ok(table)
}

fn info(path: &Path, json: bool) -> Result<()> {
    let file = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (header, _) = PakHeader::parse(&file, 0)?;
    let data = if header.is_compressed() {
        decompress_to_vec(&file)?
    } else {
        file
    };
    let body = PakBody::parse(&data, &header.decompressed())?;

    // Pages of a patch container need their sources, so only resolve base containers
    let pages = match body.patch {
        None => Some(body.page_table(&data, Vec::new())?),
        Some(_) => None,
    };

    let mut rows = Vec::with_capacity(body.assets.len());
    for (index, entry) in body.assets.iter().enumerate() {
        let header_bytes = match &pages {
            Some(pages) => {
                let asset = body.asset_data(index, pages)?;
                Some(hex::encode(&asset.raw_bytes[..asset.raw_bytes.len().min(16)]))
            }
            None => None,
        };
        rows.push(AssetRow {
            guid: format!("{:#018x}", entry.guid),
            tag: entry.tag.to_string(),
            version: entry.version,
            header_size: entry.header_size,
            header: header_bytes,
        });
    }

    if json {
        let value = serde_json::json!({
            "path": path,
            "compressed_size": header.compressed_size,
            "decompressed_size": header.decompressed_size,
            "patch_index": header.patch_index,
            "assets": rows,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", header.details());
    println!();
    println!("{:<20} {:<6} {:>7} {:>7}  header", "guid", "type", "version", "size");
    for row in &rows {
        println!(
            "{:<20} {:<6} {:>7} {:>7}  {}",
            row.guid,
            row.tag,
            row.version,
            row.header_size,
            row.header.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn print_load_report(manager: &PakManager, json: bool) -> Result<()> {
    let report = LoadReport {
        paks: manager.list_paks(),
        types: manager.list_types(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:>6}  {:<28} {:<6} {:<6} {:<8} {:<7}  name", "handle", "status", "assets", "bound", "replaced", "skipped");
    for pak in &report.paks {
        println!(
            "{:>6}  {:<28} {:<6} {:<6} {:<8} {:<7}  {}",
            pak.handle,
            pak.status.as_str(),
            pak.asset_count,
            pak.summary.bound,
            pak.summary.replaced,
            pak.summary.skipped,
            pak.name
        );
        if let Some(error) = &pak.error {
            println!("        error: {error}");
        }
        for skip in &pak.summary.skips {
            println!("        skipped {:#018x} ({}): {}", skip.guid, skip.tag, skip.reason);
        }
    }

    println!();
    println!("{:<6} {:>7} {:>10} {:>12} {:>9}  description", "type", "version", "header", "native", "align");
    for ty in &report.types {
        println!(
            "{:<6} {:>7} {:>10} {:>12} {:>9}  {}",
            ty.tag, ty.version, ty.sub_header_size, ty.native_class_size, ty.header_alignment, ty.description
        );
    }
    Ok(())
}
