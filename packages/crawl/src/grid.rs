//! Persisting the country tile grid.

use livestock_map_building_models::BoundingBox;
use livestock_map_database::Repository;
use livestock_map_tiles::country_grid;

use crate::CrawlError;

/// Result of [`create_country_tiles`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridSummary {
    /// Boxes in the generated grid.
    pub generated: usize,
    /// Tiles that did not exist yet.
    pub created: usize,
}

/// Generates the grid over `bbox` and stores every box as a `Pending` tile
/// at `level`, unless a tile with the same box and level already exists.
/// Running it again with the same arguments creates nothing.
///
/// # Errors
///
/// Returns [`CrawlError`] if the grid is invalid or the store fails.
pub fn create_country_tiles(
    repo: &dyn Repository,
    bbox: &BoundingBox,
    tile_count: u32,
    level: u32,
) -> Result<GridSummary, CrawlError> {
    let boxes = country_grid(bbox, tile_count)?;

    let mut created = 0;
    for tile_bbox in &boxes {
        let (_, is_new) = repo.upsert_tile(tile_bbox, level)?;
        if is_new {
            created += 1;
        }
    }

    log::info!(
        "{created} of {} tiles created at level {level}",
        boxes.len()
    );

    Ok(GridSummary {
        generated: boxes.len(),
        created,
    })
}

#[cfg(test)]
mod tests {
    use livestock_map_building_models::TileStatus;
    use livestock_map_database::{MemoryStore, TileRepository};

    use super::*;

    fn netherlands() -> BoundingBox {
        BoundingBox::new(3.33, 7.24, 50.7, 53.6).unwrap()
    }

    #[test]
    fn creates_pending_tiles_once() {
        let repo = MemoryStore::new();

        let first = create_country_tiles(&repo, &netherlands(), 900, 0).unwrap();
        assert_eq!(
            first,
            GridSummary {
                generated: 900,
                created: 900
            }
        );
        assert!(
            repo.tiles()
                .unwrap()
                .iter()
                .all(|tile| tile.status == TileStatus::Pending && tile.level == 0)
        );

        let again = create_country_tiles(&repo, &netherlands(), 900, 0).unwrap();
        assert_eq!(again.generated, 900);
        assert_eq!(again.created, 0);
        assert_eq!(repo.tiles().unwrap().len(), 900);
    }

    #[test]
    fn other_level_is_a_separate_grid() {
        let repo = MemoryStore::new();
        create_country_tiles(&repo, &netherlands(), 4, 0).unwrap();
        let finer = create_country_tiles(&repo, &netherlands(), 4, 1).unwrap();
        assert_eq!(finer.created, 4);
        assert_eq!(repo.tiles().unwrap().len(), 8);
    }

    #[test]
    fn zero_tiles_is_rejected() {
        let repo = MemoryStore::new();
        let err = create_country_tiles(&repo, &netherlands(), 0, 0).unwrap_err();
        assert!(matches!(err, CrawlError::Grid(_)));
    }
}
