#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the livestock map crawl.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use livestock_map_building_models::{BoundingBox, TileStatus};
use livestock_map_crawl::{
    BuildingPipeline, CrawlConfig, CrawlOrchestrator, create_country_tiles, maintenance,
};
use livestock_map_database::{DuckDbStore, Repository};
use livestock_map_livestock::LivestockStats;
use livestock_map_osm::OverpassClient;
use livestock_map_registry::{RegistryGateway, UittrekselRegisterClient};
use livestock_map_schedule::{Shutdown, TokioSleeper, shutdown_channel};
use livestock_map_tiles::regions;

#[derive(Parser)]
#[command(name = "livestock_map", about = "Livestock building crawler")]
struct Cli {
    /// `DuckDB` file (defaults to `data/livestock_map.duckdb`)
    #[arg(long, global = true, env = "LIVESTOCK_MAP_DB")]
    db: Option<PathBuf>,
    /// TOML file overriding crawl settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the country tile grid (existing tiles are kept)
    CreateTiles {
        /// Number of tiles; rounded down to a square grid
        #[arg(long)]
        tile_count: Option<u32>,
        /// Grid level the tiles are stored at
        #[arg(long, default_value = "0")]
        level: u32,
        /// Area to cover as `lon_min,lat_min,lon_max,lat_max` (defaults to
        /// the Netherlands)
        #[arg(long)]
        bbox: Option<BoundingBox>,
    },
    /// Crawl pending tiles, or a single named region
    Crawl {
        /// Region id (see `regions`); crawls it directly without tiles
        #[arg(long)]
        region: Option<String>,
    },
    /// Move failed tiles back to pending
    RequeueFailed,
    /// Delete all tiles
    DeleteTiles,
    /// Delete all buildings
    DeleteBuildings,
    /// List the named regions
    Regions,
    /// Show tile progress and livestock totals
    Stats,
    /// Re-run the livestock classifier on stored companies
    Reclassify,
    /// Re-link stored buildings to companies and recount animals
    Relink,
    /// Trim nearby addresses and delete companies without description
    Cleanup,
    /// Show the Overpass API status page
    OsmStatus,
    /// Abort the Overpass queries still running for this client
    KillQueries,
}

fn open_store(path: Option<&PathBuf>) -> Result<Arc<DuckDbStore>, Box<dyn std::error::Error>> {
    let store = match path {
        Some(path) => DuckDbStore::open(path)?,
        None => DuckDbStore::open_default()?,
    };
    Ok(Arc::new(store))
}

/// Triggers shutdown on the first Ctrl-C.
fn listen_for_ctrl_c() -> Shutdown {
    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received, stopping after releasing in-flight tiles");
            trigger.trigger();
        }
    });
    shutdown
}

async fn crawl(
    repo: Arc<dyn Repository>,
    config: CrawlConfig,
    region: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let region = region
        .map(|id| regions::find_region(&id).ok_or_else(|| format!("Unknown region: {id}")))
        .transpose()?;

    let shutdown = listen_for_ctrl_c();
    let sleeper = Arc::new(TokioSleeper::new(shutdown.clone()));

    let provider = Arc::new(OverpassClient::new(config.overpass.clone())?);
    let registry = Arc::new(UittrekselRegisterClient::new()?);
    let gateway = Arc::new(RegistryGateway::new(
        registry,
        sleeper.clone(),
        config.registry.clone(),
    ));
    let pipeline = Arc::new(BuildingPipeline::new(
        provider,
        gateway,
        repo.clone(),
        config,
    ));
    let orchestrator = CrawlOrchestrator::new(pipeline, repo, sleeper, shutdown);

    if let Some(region) = region {
        let summary = orchestrator.run_region(&region).await?;
        println!(
            "{}: {} buildings, {} companies",
            region.display_name(),
            summary.building_count,
            summary.company_count
        );
    } else {
        let summary = orchestrator.run().await?;
        println!(
            "{} tiles complete, {} failed, {} released",
            summary.completed, summary.failed, summary.released
        );
    }

    Ok(())
}

fn print_stats(repo: &dyn Repository) -> Result<(), Box<dyn std::error::Error>> {
    let mut by_status = BTreeMap::<TileStatus, usize>::new();
    for tile in repo.tiles()? {
        *by_status.entry(tile.status).or_default() += 1;
    }

    println!("{:<12} TILES", "STATUS");
    println!("{}", "-".repeat(24));
    for (status, count) in &by_status {
        println!("{:<12} {count}", status.as_ref());
    }

    let companies = repo.companies()?;
    let stats = LivestockStats::from_companies(companies.iter().map(|record| &record.company));

    println!();
    println!("{:<10} {:>10} {:>14}", "ANIMAL", "COMPANIES", "ANIMALS");
    println!("{}", "-".repeat(36));
    for row in stats.rows() {
        println!(
            "{:<10} {:>10} {:>14.0}",
            row.animal_type.as_ref(),
            row.companies,
            row.animals
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = CrawlConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Regions => {
            println!("{:<12} BBOX (lon_min, lon_max, lat_min, lat_max)", "ID");
            println!("{}", "-".repeat(60));
            for region in regions::all_regions() {
                println!("{:<12} {}", region.id, region.bbox()?);
            }
        }
        Commands::OsmStatus => {
            let client = OverpassClient::new(config.overpass.clone())?;
            println!("{}", client.status().await?);
        }
        Commands::KillQueries => {
            let client = OverpassClient::new(config.overpass.clone())?;
            println!("{}", client.kill_my_queries().await?);
        }
        Commands::CreateTiles {
            tile_count,
            level,
            bbox,
        } => {
            let repo = open_store(cli.db.as_ref())?;
            let country = regions::country();
            let bbox = match bbox {
                Some(bbox) => bbox,
                None => country.region.bbox()?,
            };
            let summary = create_country_tiles(
                repo.as_ref(),
                &bbox,
                tile_count.unwrap_or(country.tile_count),
                level,
            )?;
            println!(
                "{} tiles generated, {} created",
                summary.generated, summary.created
            );
        }
        Commands::Crawl { region } => {
            let repo = open_store(cli.db.as_ref())?;
            crawl(repo, config, region).await?;
        }
        Commands::RequeueFailed => {
            let repo = open_store(cli.db.as_ref())?;
            println!(
                "{} tiles re-queued",
                maintenance::requeue_failed_tiles(repo.as_ref())?
            );
        }
        Commands::DeleteTiles => {
            let repo = open_store(cli.db.as_ref())?;
            println!("{} tiles deleted", maintenance::delete_tiles(repo.as_ref())?);
        }
        Commands::DeleteBuildings => {
            let repo = open_store(cli.db.as_ref())?;
            println!(
                "{} buildings deleted",
                maintenance::delete_buildings(repo.as_ref())?
            );
        }
        Commands::Stats => {
            let repo = open_store(cli.db.as_ref())?;
            print_stats(repo.as_ref())?;
        }
        Commands::Reclassify => {
            let repo = open_store(cli.db.as_ref())?;
            println!(
                "{} companies reclassified",
                maintenance::reclassify_companies(repo.as_ref())?
            );
        }
        Commands::Relink => {
            let repo = open_store(cli.db.as_ref())?;
            let summary =
                maintenance::relink_buildings(repo.as_ref(), &config.address_filter())?;
            println!(
                "{} of {} buildings linked to {} companies",
                summary.linked_buildings, summary.buildings, summary.linked_companies
            );
        }
        Commands::Cleanup => {
            let repo = open_store(cli.db.as_ref())?;
            let summary = maintenance::cleanup(repo.as_ref(), config.max_nearby_addresses)?;
            println!(
                "{} buildings trimmed, {} companies deleted",
                summary.buildings_trimmed, summary.companies_deleted
            );
        }
    }

    Ok(())
}
