//! Resumable crawl over the persisted tiles.
//!
//! Workers repeatedly claim the lowest pending tile, run the
//! [`BuildingPipeline`] on it and record the result. A registry
//! malfunction takes the claim gate, fails the tile and holds the gate for
//! the cooldown, so no worker starts new work until the registry has had time
//! to recover. Any other pipeline error fails only that tile.
//!
//! Shutdown aborts the in-flight pipeline and any cooldown; the tiles that
//! were interrupted go back to `Pending`. The only error that stops a run
//! is the tile store itself failing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use livestock_map_building_models::{Tile, TileOutcome, truncate_error};
use livestock_map_database::Repository;
use livestock_map_schedule::{Shutdown, Sleeper};
use livestock_map_tiles::regions::Region;
use tokio::sync::Mutex;

use crate::{BuildingPipeline, CrawlError, PipelineError, TileSummary};

/// Tile counts of a finished (or interrupted) run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tiles marked `Complete`.
    pub completed: u64,
    /// Tiles marked `Failed`.
    pub failed: u64,
    /// Tiles returned to `Pending` because of shutdown.
    pub released: u64,
}

impl RunSummary {
    const fn add(self, other: Self) -> Self {
        Self {
            completed: self.completed + other.completed,
            failed: self.failed + other.failed,
            released: self.released + other.released,
        }
    }
}

enum TileResult {
    Done(Result<TileSummary, PipelineError>),
    Interrupted,
}

/// Drives the pipeline over every pending tile.
pub struct CrawlOrchestrator {
    pipeline: Arc<BuildingPipeline>,
    repo: Arc<dyn Repository>,
    sleeper: Arc<dyn Sleeper>,
    shutdown: Shutdown,
    workers: usize,
    cooldown: Duration,
    claim_gate: Arc<Mutex<()>>,
}

impl std::fmt::Debug for CrawlOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlOrchestrator")
            .field("workers", &self.workers)
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

impl CrawlOrchestrator {
    /// Worker count and cooldown are taken from the pipeline's config.
    #[must_use]
    pub fn new(
        pipeline: Arc<BuildingPipeline>,
        repo: Arc<dyn Repository>,
        sleeper: Arc<dyn Sleeper>,
        shutdown: Shutdown,
    ) -> Self {
        let config = pipeline.config();
        let workers = config.tile_workers.max(1);
        let cooldown = config.malfunction_cooldown();

        Self {
            pipeline,
            repo,
            sleeper,
            shutdown,
            workers,
            cooldown,
            claim_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Crawls pending tiles until none are left or shutdown is requested.
    ///
    /// Tiles left `InProgress` by an earlier, interrupted process are
    /// returned to `Pending` first.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Store`] if a tile's state cannot be read or
    /// recorded. Other workers are stopped; their tiles stay `InProgress`
    /// until the next run resets them.
    pub async fn run(&self) -> Result<RunSummary, CrawlError> {
        let reset = self.repo.reset_in_progress()?;
        if reset > 0 {
            log::info!("{reset} interrupted tiles returned to pending");
        }

        log::info!("Starting crawl with {} worker(s)", self.workers);
        let tallies = try_join_all((0..self.workers).map(|worker| self.worker(worker))).await?;
        let summary = tallies
            .into_iter()
            .fold(RunSummary::default(), RunSummary::add);

        log::info!(
            "Crawl finished: {} complete, {} failed, {} released",
            summary.completed,
            summary.failed,
            summary.released
        );
        Ok(summary)
    }

    /// Processes a named region directly, without tiles.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError`] if the region is invalid, the pipeline fails
    /// or shutdown is requested.
    pub async fn run_region(&self, region: &Region) -> Result<TileSummary, CrawlError> {
        let bbox = region
            .bbox()
            .map_err(livestock_map_tiles::TileError::from)?;
        log::info!("Processing region {} ({bbox})", region.display_name());

        let started = Instant::now();
        match self.process(&bbox).await {
            TileResult::Done(result) => {
                let summary = result?;
                log::info!(
                    "Region {} done in {:.1}s: {} buildings, {} companies",
                    region.display_name(),
                    started.elapsed().as_secs_f64(),
                    summary.building_count,
                    summary.company_count
                );
                Ok(summary)
            }
            TileResult::Interrupted => Err(PipelineError::Cancelled(
                livestock_map_schedule::Cancelled,
            )
            .into()),
        }
    }

    async fn process(&self, bbox: &livestock_map_building_models::BoundingBox) -> TileResult {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => TileResult::Interrupted,
            result = self.pipeline.create_for_bbox(bbox) => match result {
                Err(e) if e.is_cancelled() => TileResult::Interrupted,
                other => TileResult::Done(other),
            },
        }
    }

    async fn claim(&self) -> Result<Option<Tile>, CrawlError> {
        // Blocks while another worker is cooling down.
        let _gate = self.claim_gate.lock().await;
        if self.shutdown.is_triggered() {
            return Ok(None);
        }
        Ok(self.repo.claim_next_pending()?)
    }

    async fn worker(&self, worker: usize) -> Result<RunSummary, CrawlError> {
        let mut tally = RunSummary::default();

        while let Some(tile) = self.claim().await? {
            log::info!("[worker {worker}] Tile {} start: {}", tile.id, tile.bbox);
            let started = Instant::now();
            let result = self.process(&tile.bbox).await;
            let duration_seconds = started.elapsed().as_secs_f64();

            match result {
                TileResult::Interrupted => {
                    self.repo.release_tile(tile.id)?;
                    tally.released += 1;
                    log::info!("[worker {worker}] Tile {} interrupted", tile.id);
                    break;
                }
                TileResult::Done(Ok(summary)) => {
                    self.repo.complete_tile(
                        tile.id,
                        &TileOutcome {
                            duration_seconds,
                            building_count: summary.building_count,
                            company_count: summary.company_count,
                        },
                    )?;
                    tally.completed += 1;
                    log::info!(
                        "[worker {worker}] Tile {} finished in {duration_seconds:.1}s: {} buildings, {} companies",
                        tile.id,
                        summary.building_count,
                        summary.company_count
                    );
                }
                TileResult::Done(Err(e)) => {
                    log::error!("[worker {worker}] Tile {} failed: {e}", tile.id);
                    let gate = if e.is_malfunction() {
                        Some(self.claim_gate.lock().await)
                    } else {
                        None
                    };
                    self.repo
                        .fail_tile(tile.id, &truncate_error(&e.to_string()), duration_seconds)?;
                    tally.failed += 1;

                    if gate.is_some() && !self.cool_down(worker).await {
                        break;
                    }
                }
            }
        }

        Ok(tally)
    }

    /// Sleeps for the cooldown; the caller holds the claim gate. Returns
    /// `false` if shutdown cut it short.
    async fn cool_down(&self, worker: usize) -> bool {
        log::warn!(
            "[worker {worker}] Registry malfunction, pausing all workers for {}s",
            self.cooldown.as_secs()
        );
        self.sleeper.sleep(self.cooldown).await.is_ok()
    }
}
