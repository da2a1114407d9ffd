#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tile grid generation.
//!
//! Two kinds of grids are produced here:
//!
//! 1. [`sub_tiles`] splits a single area into boxes small enough for one
//!    map-provider query each.
//! 2. [`country_grid`] splits a whole country into the uniform work units
//!    that the crawl persists as tiles.
//!
//! Both are pure functions. Named regions and the country extent are
//! embedded from `regions.toml` (see [`regions`]).

pub mod regions;

use livestock_map_building_models::{BoundingBox, InvalidBoundingBox};

/// Guards the country grid loop bound against floating-point round-off
/// dropping the last row or column.
pub const GRID_EPSILON: f64 = 1.000_000_1;

/// Default sub-tile size in degrees, sized to keep one provider query
/// within its data-volume limit.
pub const DEFAULT_SUB_TILE_DELTA: f64 = 0.07;

/// Errors from grid generation.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    /// A step size was zero, negative or not a number.
    #[error("Invalid grid step: {message}")]
    InvalidStep {
        /// Description of the invalid input.
        message: String,
    },

    /// A generated box was invalid.
    #[error(transparent)]
    BoundingBox(#[from] InvalidBoundingBox),
}

fn check_step(name: &str, value: f64) -> Result<(), TileError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TileError::InvalidStep {
            message: format!("{name} must be positive, got {value}"),
        })
    }
}

/// Partitions `bbox` into a row-major grid of boxes no larger than
/// `delta_lat` x `delta_lon`. The last row and column are clamped to the
/// original bounds.
///
/// # Errors
///
/// Returns [`TileError::InvalidStep`] if either delta is not a positive
/// finite number.
pub fn sub_tiles(
    bbox: &BoundingBox,
    delta_lat: f64,
    delta_lon: f64,
) -> Result<Vec<BoundingBox>, TileError> {
    check_step("delta_lat", delta_lat)?;
    check_step("delta_lon", delta_lon)?;

    let mut tiles = Vec::new();

    let mut row = 0u32;
    loop {
        let lat = f64::from(row).mul_add(delta_lat, bbox.lat_min());
        if lat >= bbox.lat_max() {
            break;
        }
        let lat_top = (lat + delta_lat).min(bbox.lat_max());

        let mut col = 0u32;
        loop {
            let lon = f64::from(col).mul_add(delta_lon, bbox.lon_min());
            if lon >= bbox.lon_max() {
                break;
            }
            let lon_right = (lon + delta_lon).min(bbox.lon_max());

            tiles.push(BoundingBox::new(lon, lon_right, lat, lat_top)?);
            col += 1;
        }
        row += 1;
    }

    log::debug!("{} sub-tiles created for {bbox}", tiles.len());
    Ok(tiles)
}

/// Loop bound `value * GRID_EPSILON`, applied to the magnitude so that it
/// always loosens the bound, west and south of the origin too.
fn loosen(value: f64) -> f64 {
    value.abs().mul_add(GRID_EPSILON - 1.0, value)
}

/// Splits `bbox` into `dim x dim` uniform tiles where
/// `dim = floor(sqrt(tile_count))`.
///
/// Tiles are enumerated column by column (longitude outer, latitude
/// inner). The outermost column and row end exactly on the bbox edges.
///
/// # Errors
///
/// Returns [`TileError::InvalidStep`] if `tile_count` is zero.
pub fn country_grid(bbox: &BoundingBox, tile_count: u32) -> Result<Vec<BoundingBox>, TileError> {
    let dim = f64::from(tile_count).sqrt().floor();
    if dim < 1.0 {
        return Err(TileError::InvalidStep {
            message: format!("tile_count must be at least 1, got {tile_count}"),
        });
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let dim_count = dim as u32;

    let lon_delta = bbox.lon_span() / dim;
    let lat_delta = bbox.lat_span() / dim;
    log::info!("Creating {dim_count}x{dim_count} tiles ({lon_delta}° x {lat_delta}°)");

    let lon_bound = loosen(bbox.lon_max() - lon_delta);
    let lat_bound = loosen(bbox.lat_max() - lat_delta);

    let mut tiles = Vec::with_capacity((dim_count as usize).pow(2));

    let mut i = 0u32;
    while i < dim_count {
        let lon = f64::from(i).mul_add(lon_delta, bbox.lon_min());
        if lon > lon_bound {
            break;
        }
        let lon_right = if i + 1 == dim_count {
            bbox.lon_max()
        } else {
            (lon + lon_delta).min(bbox.lon_max())
        };

        let mut j = 0u32;
        while j < dim_count {
            let lat = f64::from(j).mul_add(lat_delta, bbox.lat_min());
            if lat > lat_bound {
                break;
            }
            let lat_top = if j + 1 == dim_count {
                bbox.lat_max()
            } else {
                (lat + lat_delta).min(bbox.lat_max())
            };

            tiles.push(BoundingBox::new(lon, lon_right, lat, lat_top)?);
            j += 1;
        }
        i += 1;
    }

    log::info!("{} tiles generated", tiles.len());
    Ok(tiles)
}
