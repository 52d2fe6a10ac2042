//! Coarse EGM96 geoid separation.
//!
//! A 30 degree grid, good to a few tens of meters.  Used only when a receiver reports MSL
//! altitude without its geoid separation.

const SPACING: f64 = 30.0;

// rows from 90N to 90S, columns from 180W to 180E, meters
const SEPARATION: [[f64; 13]; 7] = [
    [13.0, 13.0, 13.0, 13.0, 13.0, 13.0, 13.0, 13.0, 13.0, 13.0, 13.0, 13.0, 13.0],
    [2.0, 10.0, -14.0, -46.0, 6.0, 65.0, 47.0, 18.0, -3.0, -32.0, -15.0, 17.0, 2.0],
    [-7.0, -15.0, -42.0, -26.0, -40.0, 31.0, 36.0, 17.0, -15.0, -34.0, 7.0, 20.0, -7.0],
    [22.0, 13.0, -23.0, -3.0, -15.0, 3.0, 18.0, -9.0, -62.0, -63.0, 58.0, 63.0, 22.0],
    [46.0, -2.0, -10.0, 1.0, 16.0, 4.0, 22.0, 29.0, 15.0, -25.0, -23.0, 33.0, 46.0],
    [-45.0, -32.0, -23.0, -10.0, 20.0, 24.0, 16.0, 30.0, 33.0, 10.0, -23.0, -29.0, -45.0],
    [-30.0, -30.0, -30.0, -30.0, -30.0, -30.0, -30.0, -30.0, -30.0, -30.0, -30.0, -30.0, -30.0],
];

/// Height of the geoid above the WGS 84 ellipsoid at a position, bilinearly interpolated.
pub fn wgs84_separation(latitude: f64, longitude: f64) -> f64 {
    let latitude = latitude.clamp(-90.0, 90.0);
    let longitude = if longitude.is_finite() {
        (longitude + 180.0).rem_euclid(360.0) - 180.0
    } else {
        0.0
    };

    let row = (90.0 - latitude) / SPACING;
    let col = (longitude + 180.0) / SPACING;

    let r0 = (row.floor() as usize).min(SEPARATION.len() - 2);
    let c0 = (col.floor() as usize).min(SEPARATION[0].len() - 2);

    let dr = row - r0 as f64;
    let dc = col - c0 as f64;

    let top = SEPARATION[r0][c0] * (1.0 - dc) + SEPARATION[r0][c0 + 1] * dc;
    let bottom = SEPARATION[r0 + 1][c0] * (1.0 - dc) + SEPARATION[r0 + 1][c0 + 1] * dc;

    top * (1.0 - dr) + bottom * dr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_points() {
        assert_approx_eq!(13.0, wgs84_separation(90.0, 45.0));
        assert_approx_eq!(-30.0, wgs84_separation(-90.0, -120.0));
        assert_approx_eq!(47.0, wgs84_separation(60.0, 0.0));
        assert_approx_eq!(22.0, wgs84_separation(0.0, 180.0));
        assert_approx_eq!(22.0, wgs84_separation(0.0, -180.0));
    }

    #[test]
    fn test_interpolates() {
        let midway = wgs84_separation(45.0, 0.0);

        assert_approx_eq!((47.0 + 36.0) / 2.0, midway);
    }
}
