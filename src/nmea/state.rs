use crate::gps::time::decode_ddmmyy;
use crate::gps::time::decode_hhmmss;
use crate::gps::time::DateRecord;
use crate::gps::time::Hhmmss;
use crate::gps::Context;

use tracing::warn;

bitflags! {
    /// Talkers seen sending a paginated sentence family.
    #[derive(Default)]
    pub struct Seen: u8 {
        const GP = 1 << 0;
        const GL = 1 << 1;
        const GA = 1 << 2;
        const BD = 1 << 3;
        const GI = 1 << 4;
        const QZ = 1 << 5;
        const GN = 1 << 6;
    }
}

impl Seen {
    /// Anything but GPS alone.
    pub fn any_non_gps(&self) -> bool {
        !(*self - Seen::GP).is_empty()
    }
}

/// Decoder state carried from one sentence to the next on one device.
///
/// Survives driver promotion, learned cycle enders included.
#[derive(Clone, Debug)]
pub struct State {
    /// Calendar assembled from time and date fields.
    pub date: DateRecord,

    /// Seconds of day of the latest timestamp, and the one before it.
    pub this_frac_time: f64,
    pub last_frac_time: f64,
    /// The current sentence registered a timestamp.
    pub latch_frac_time: bool,
    /// The current sentence extends the reporting cycle.
    pub cycle_continue: bool,
    /// Learned cycle enders, indexed by dispatch tag.
    pub cycle_enders: Vec<bool>,
    pub lasttag: usize,
    /// A GSV or GSA burst is incomplete.
    pub gsx_more: bool,

    /// GGA kept repeating a timestamp, mode and status are not trusted.
    pub latch_mode: bool,
    pub last_gga_talker: Option<char>,
    pub last_gga_timestamp: String,
    pub gga_sats_used: i64,

    pub last_gsa_talker: Option<char>,
    /// PRNs accumulated from this cycle's GSA sentences.
    pub sats_used: Vec<i16>,
    pub seen_gsa: Seen,

    pub last_gsv_talker: Option<char>,
    pub end_gsv_talker: Option<char>,
    pub seen_gsv: Seen,
    /// Parts expected in the current GSV burst and the part last decoded.
    pub await_parts: i64,
    pub part: i64,

    /// Firmware version already requested from the receiver.
    pub version_queried: bool,
}

impl State {
    pub fn new(tags: usize) -> State {
        State {
            date: DateRecord::default(),
            this_frac_time: 0.0,
            last_frac_time: 0.0,
            latch_frac_time: false,
            cycle_continue: false,
            cycle_enders: vec![false; tags + 1],
            lasttag: 0,
            gsx_more: false,
            latch_mode: false,
            last_gga_talker: None,
            last_gga_timestamp: String::new(),
            gga_sats_used: 0,
            last_gsa_talker: None,
            sats_used: Vec::new(),
            seen_gsa: Seen::empty(),
            last_gsv_talker: None,
            end_gsv_talker: None,
            seen_gsv: Seen::empty(),
            await_parts: 0,
            part: 0,
            version_queried: false,
        }
    }

    /// Record the sub-second epoch of this sentence for cycle detection.
    pub fn register_fractional_time(&mut self, time: Option<Hhmmss>) {
        if let Some(time) = time {
            self.last_frac_time = self.this_frac_time;
            self.this_frac_time = time.seconds_of_day();
            self.latch_frac_time = true;
        }
    }

    /// Merge an `hhmmss` field into the calendar, returning the decoded time.
    pub fn merge_hhmmss(&mut self, field: &str) -> Option<Hhmmss> {
        let time = decode_hhmmss(field)?;

        self.date.merge_hhmmss(time);

        Some(time)
    }

    /// Merge a `ddmmyy` field into the calendar, resolving the century from `context`.
    pub fn merge_ddmmyy(&mut self, context: &mut Context, field: &str) -> bool {
        match decode_ddmmyy(field) {
            Some((day, month, yy)) => {
                let year = context.resolve_year(yy);

                self.date.merge_date(year, month, day);

                true
            }
            None => {
                warn!("malformed ddmmyy {:?}", field);

                false
            }
        }
    }

    /// Merge time then date, both must decode.  The frac time is registered on success.
    pub fn merge_time_and_date(&mut self, context: &mut Context, hhmmss: &str, ddmmyy: &str) -> bool {
        let time = match self.merge_hhmmss(hhmmss) {
            Some(time) => time,
            None => return false,
        };

        if !self.merge_ddmmyy(context, ddmmyy) {
            return false;
        }

        self.register_fractional_time(Some(time));

        true
    }

    /// Learned cycle enders by tag index, for diagnostics.
    pub fn enders(&self) -> impl Iterator<Item = usize> + '_ {
        self.cycle_enders
            .iter()
            .enumerate()
            .filter(|(_, ender)| **ender)
            .map(|(tag, _)| tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::time::decode_hhmmss;

    #[test]
    fn test_register_fractional_time() {
        let mut state = State::new(3);

        state.register_fractional_time(decode_hhmmss("123519.50"));

        assert!(state.latch_frac_time);
        assert_approx_eq!(45_319.5, state.this_frac_time);
        assert_approx_eq!(0.0, state.last_frac_time);

        state.latch_frac_time = false;
        state.register_fractional_time(decode_hhmmss("bogus"));

        assert!(!state.latch_frac_time);
    }

    #[test]
    fn test_seen() {
        assert!(!Seen::GP.any_non_gps());
        assert!((Seen::GP | Seen::GL).any_non_gps());
        assert!(!Seen::empty().any_non_gps());
    }
}
