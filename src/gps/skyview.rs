use crate::gps::ChangedMask;

use chrono::DateTime;
use chrono::Utc;

use tracing::debug;

/// Most satellites a skyview holds.
pub const MAXCHANNELS: usize = 184;

/// Canonical constellation identifiers.
pub mod gnss {
    pub const GPS: u8 = 0;
    pub const SBAS: u8 = 1;
    pub const GALILEO: u8 = 2;
    pub const BEIDOU: u8 = 3;
    pub const IMES: u8 = 4;
    pub const QZSS: u8 = 5;
    pub const GLONASS: u8 = 6;
    pub const IRNSS: u8 = 7;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Satellite {
    /// Extended NMEA PRN, 0 when the id could not be translated.
    pub prn: i16,
    pub gnss_id: u8,
    pub sv_id: u8,
    pub sig_id: u8,
    pub elevation: Option<f64>,
    pub azimuth: Option<f64>,
    pub ss: Option<f64>,
    pub pr: Option<f64>,
    pub pr_res: Option<f64>,
    pub quality: Option<u8>,
    pub used: bool,
}

/// Dilution of precision.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dop {
    pub xdop: Option<f64>,
    pub ydop: Option<f64>,
    pub pdop: Option<f64>,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,
    pub tdop: Option<f64>,
    pub gdop: Option<f64>,
}

impl Dop {
    pub fn clear(&mut self) {
        *self = Dop::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == Dop::default()
    }

    /// Compute DOPs from the line-of-sight geometry of the used satellites.
    ///
    /// Values reported by the receiver are kept, only missing ones are filled.  Returns
    /// `ChangedMask::DOP` when at least four usable satellites gave an invertible solution.
    pub fn fill(&mut self, skyview: &Skyview) -> ChangedMask {
        let rows: Vec<[f64; 4]> = skyview
            .satellites
            .iter()
            .filter(|s| s.used && s.prn > 0)
            .filter_map(|s| match (s.azimuth, s.elevation) {
                (Some(az), Some(el)) if (0.0..=359.0).contains(&az) && el.abs() <= 90.0 => {
                    let (az, el) = (az.to_radians(), el.to_radians());

                    Some([az.sin() * el.cos(), az.cos() * el.cos(), el.sin(), 1.0])
                }
                _ => None,
            })
            .collect();

        if rows.len() < 4 {
            return ChangedMask::empty();
        }

        let mut product = [[0.0; 4]; 4];

        for (i, row) in product.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = rows.iter().map(|r| r[i] * r[j]).sum();
            }
        }

        let inverse = match invert(product) {
            Some(inverse) => inverse,
            None => {
                debug!("line-of-sight matrix singular, DOPs not computed");
                return ChangedMask::empty();
            }
        };

        let fill = |to: &mut Option<f64>, v: f64| {
            if to.is_none() && v.is_finite() {
                *to = Some(v);
            }
        };

        fill(&mut self.xdop, inverse[0][0].sqrt());
        fill(&mut self.ydop, inverse[1][1].sqrt());
        fill(&mut self.hdop, (inverse[0][0] + inverse[1][1]).sqrt());
        fill(&mut self.vdop, inverse[2][2].sqrt());
        fill(
            &mut self.pdop,
            (inverse[0][0] + inverse[1][1] + inverse[2][2]).sqrt(),
        );
        fill(&mut self.tdop, inverse[3][3].sqrt());
        fill(
            &mut self.gdop,
            (inverse[0][0] + inverse[1][1] + inverse[2][2] + inverse[3][3]).sqrt(),
        );

        ChangedMask::DOP
    }
}

// Gauss-Jordan elimination with partial pivoting
fn invert(mut m: [[f64; 4]; 4]) -> Option<[[f64; 4]; 4]> {
    let mut inv = [[0.0; 4]; 4];

    for (i, row) in inv.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for col in 0..4 {
        let pivot = (col..4).max_by(|a, b| {
            m[*a][col]
                .abs()
                .partial_cmp(&m[*b][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

        if m[pivot][col].abs() < 1e-12 {
            return None;
        }

        m.swap(col, pivot);
        inv.swap(col, pivot);

        let p = m[col][col];

        for k in 0..4 {
            m[col][k] /= p;
            inv[col][k] /= p;
        }

        for row in 0..4 {
            if row == col {
                continue;
            }

            let factor = m[row][col];

            for k in 0..4 {
                m[row][k] -= factor * m[col][k];
                inv[row][k] -= factor * inv[col][k];
            }
        }
    }

    Some(inv)
}

/// Satellites in view, accumulated across a GSV burst.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skyview {
    pub time: Option<DateTime<Utc>>,
    pub satellites: Vec<Satellite>,
}

impl Skyview {
    pub fn clear(&mut self) {
        self.time = None;
        self.satellites.clear();
    }

    pub fn visible(&self) -> usize {
        self.satellites.len()
    }

    pub fn used(&self) -> usize {
        self.satellites.iter().filter(|s| s.used).count()
    }

    pub fn is_full(&self) -> bool {
        self.satellites.len() >= MAXCHANNELS
    }

    /// Mark the satellites whose PRN is in `used` as used in the solution.
    pub fn mark_used(&mut self, used: &[i16]) {
        for satellite in self.satellites.iter_mut() {
            satellite.used = satellite.prn > 0
                && satellite.ss.map(|ss| ss > 0.0).unwrap_or(false)
                && used.contains(&satellite.prn);
        }
    }
}
