#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry engine for building footprints.
//!
//! Building outlines arrive as geodetic (lat/lon) rings. Areas and lengths
//! are never computed on raw degrees: each ring is first projected into the
//! UTM zone of its first vertex ([`utm`]), and all measurements happen in
//! that planar, meter-based system ([`metrics`]). Point-to-point distances
//! for address matching use the haversine formula ([`distance`]).

pub mod distance;
pub mod metrics;
pub mod utm;

pub use distance::{EARTH_RADIUS_METERS, haversine_meters};
pub use metrics::{area_square_meters, centroid, compute_metrics, oriented_length_width};
pub use utm::UtmZone;
