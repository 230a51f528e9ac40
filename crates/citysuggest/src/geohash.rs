//! The pinned integer geohash encoding shared by both indexes.
//!
//! Points are projected onto `[-180, 180] x [-85.05112878, 85.05112878]`,
//! quantized to 26 bits per axis and interleaved into a 52-bit integer with
//! latitude bits on even positions and longitude bits on odd positions. This
//! is the score a Redis-compatible geo set assigns a member, and it is the
//! value ingestion writes as the text document key. Both sides must agree on
//! it bit for bit or the merge step finds no intersection.

use crate::city::{Coordinates, GeoHash};
use crate::coordinate::{MAX_LONGITUDE, MAX_PROJECTED_LATITUDE};

/// Bits of precision per axis.
pub const STEP: u32 = 26;

const MAX_CELL: u32 = (1 << STEP) - 1;

/// Mean Earth radius used for distances, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6372.797560856;

/// Encodes an already validated and clamped point.
pub fn encode(location: Coordinates) -> GeoHash {
    let lat_bits = quantize(location.latitude, MAX_PROJECTED_LATITUDE);
    let lon_bits = quantize(location.longitude, MAX_LONGITUDE);
    GeoHash::new(spread(lat_bits) | (spread(lon_bits) << 1))
}

/// Maps `value` in `[-max, max]` onto a cell index in `[0, 2^STEP)`.
fn quantize(value: f64, max: f64) -> u32 {
    let offset = (value + max) / (2.0 * max);
    let cell = offset * f64::from(1_u32 << STEP);
    // Values on the upper edge land one past the last cell.
    (cell as u32).min(MAX_CELL)
}

/// Moves the low 32 bits of `value` onto the even bit positions of a u64.
fn spread(value: u32) -> u64 {
    let mut x = u64::from(value);
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    (x | (x << 1)) & 0x5555_5555_5555_5555
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let u = ((lat2 - lat1) / 2.0).sin();
    let v = ((b.longitude.to_radians() - a.longitude.to_radians()) / 2.0).sin();
    2.0 * EARTH_RADIUS_KM * (u * u + lat1.cos() * lat2.cos() * v * v).sqrt().asin()
}
