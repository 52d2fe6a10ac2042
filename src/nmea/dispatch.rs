//! Sentence dispatch and reporting cycle detection.

use crate::gps::time::utc_resolve;
use crate::gps::ChangedMask;
use crate::gps::Mode;
use crate::gps::Session;
use crate::nmea::nautical;
use crate::nmea::position;
use crate::nmea::proprietary;
use crate::nmea::satellites;
use crate::nmea::Sentence;
use crate::packet::NMEA_MAX;

use tracing::debug;
use tracing::trace;

pub type Decoder = fn(&Sentence<'_>, &mut Session) -> ChangedMask;

/// One dispatch table entry.
pub struct Phrase {
    /// Mnemonic for three character names, the whole tag otherwise.
    pub name: &'static str,
    /// Required field 1, for `$PSTI,030` style sub-sentences.
    pub name1: Option<&'static str>,
    /// Fewest fields the decoder needs.
    pub nf: usize,
    /// The sentence belongs to the cycle of the timestamped sentence before it.
    pub cycle_continue: bool,
    pub decoder: Option<Decoder>,
}

const fn phrase(name: &'static str, nf: usize, decoder: Option<Decoder>) -> Phrase {
    Phrase {
        name,
        name1: None,
        nf,
        cycle_continue: false,
        decoder,
    }
}

const fn ignore(name: &'static str) -> Phrase {
    phrase(name, 0, None)
}

const fn psti(name1: &'static str, nf: usize, decoder: Option<Decoder>) -> Phrase {
    Phrase {
        name: "PSTI",
        name1: Some(name1),
        nf,
        cycle_continue: false,
        decoder,
    }
}

pub static PHRASES: &[Phrase] = &[
    ignore("PGRMB"),
    ignore("PGRMC"),
    phrase("PGRME", 7, Some(proprietary::pgrme)),
    phrase("PGRMF", 15, Some(proprietary::pgrmf)),
    ignore("PGRMH"),
    ignore("PGRMI"),
    phrase("PGRMM", 2, Some(proprietary::pgrmm)),
    ignore("PGRMO"),
    phrase("PGRMT", 10, Some(proprietary::pgrmt)),
    phrase("PGRMV", 4, Some(proprietary::pgrmv)),
    phrase("PGRMZ", 4, Some(proprietary::pgrmz)),
    ignore("AAM"),
    ignore("ALM"),
    ignore("APB"),
    ignore("BOD"),
    ignore("BWC"),
    ignore("DBK"),
    ignore("DBS"),
    phrase("DBT", 7, Some(nautical::dbt)),
    phrase("DPT", 4, Some(nautical::dpt)),
    phrase("DTM", 2, Some(nautical::dtm)),
    phrase("GBS", 7, Some(position::gbs)),
    phrase("GGA", 13, Some(position::gga)),
    Phrase {
        name: "GLL",
        name1: None,
        nf: 7,
        cycle_continue: true,
        decoder: Some(position::gll),
    },
    phrase("GNS", 13, Some(position::gns)),
    ignore("GRS"),
    phrase("GSA", 18, Some(satellites::gsa)),
    phrase("GST", 8, Some(position::gst)),
    phrase("GSV", 4, Some(satellites::gsv)),
    phrase("HDG", 0, Some(nautical::hdg)),
    phrase("HDM", 3, Some(nautical::hdm)),
    phrase("HDT", 1, Some(nautical::hdt)),
    phrase("MTW", 3, Some(nautical::mtw)),
    phrase("MWD", 0, Some(nautical::mwd)),
    phrase("MWV", 0, Some(nautical::mwv)),
    ignore("OSD"),
    phrase("PASHR", 3, Some(proprietary::pashr)),
    phrase("PMGNST", 8, Some(proprietary::pmgnst)),
    phrase("PMTK001", 3, Some(proprietary::pmtk001)),
    ignore("PMTK010"),
    ignore("PMTK011"),
    phrase("PMTK424", 3, Some(proprietary::pmtk424)),
    phrase("PMTK705", 4, Some(proprietary::pmtk705)),
    phrase("PSRFEPE", 7, Some(proprietary::psrfepe)),
    psti("000", 4, None),
    psti("001", 2, None),
    psti("005", 2, None),
    psti("030", 16, Some(proprietary::psti030)),
    psti("032", 16, Some(proprietary::psti032)),
    psti("033", 27, Some(proprietary::psti033)),
    psti("035", 8, Some(proprietary::psti035)),
    psti("036", 2, Some(proprietary::psti036)),
    phrase("PTNTA", 8, Some(proprietary::ptnta)),
    phrase("PTNTHTM", 9, Some(proprietary::ptnthtm)),
    ignore("PUBX"),
    ignore("RMB"),
    phrase("RMC", 8, Some(position::rmc)),
    phrase("ROT", 3, Some(nautical::rot)),
    ignore("RTE"),
    phrase("STI", 2, Some(nautical::sti)),
    phrase("THS", 0, Some(nautical::ths)),
    phrase("TXT", 5, Some(nautical::txt)),
    ignore("VHW"),
    ignore("VLW"),
    phrase("VTG", 5, Some(position::vtg)),
    ignore("WPL"),
    phrase("XDR", 5, Some(nautical::xdr)),
    ignore("XTE"),
    phrase("ZDA", 4, Some(position::zda)),
    ignore("ZTG"),
];

/// Count of dispatch tags, tag 0 is "no tag".
pub fn tags() -> usize {
    PHRASES.len()
}

fn matches(phrase: &Phrase, sentence: &Sentence<'_>) -> bool {
    let tag = sentence.tag();

    // $STI carries no talker
    let name = if phrase.name.len() == 3 && tag != "STI" {
        sentence.mnemonic()
    } else {
        tag
    };

    if phrase.name != name {
        return false;
    }

    match phrase.name1 {
        Some(name1) => name1 == sentence.field(1),
        None => true,
    }
}

/// Decode one NMEA sentence into `session`, returning what changed.
///
/// The returned mask carries `CLEAR` when the sentence starts a new reporting cycle and
/// `REPORT` when it completes one.
pub fn parse(text: &str, session: &mut Session) -> ChangedMask {
    if text.len() > NMEA_MAX {
        debug!("overlong sentence of {} bytes ignored", text.len());
        return ChangedMask::ONLINE;
    }

    let sentence = Sentence::new(text);

    session.nmea.latch_frac_time = false;
    session.nmea.gsx_more = false;

    let mut mask = ChangedMask::ONLINE;
    let mut thistag = 0;

    match PHRASES
        .iter()
        .enumerate()
        .find(|(_, phrase)| matches(phrase, &sentence))
    {
        None => {
            trace!("unknown sentence type {}", sentence.tag());
            session.nmea.cycle_continue = false;
        }
        Some((_, phrase)) if phrase.decoder.is_none() => {
            trace!("no decoder for sentence type {}", sentence.tag());
            session.nmea.cycle_continue = false;
        }
        Some((_, phrase)) if sentence.count() < phrase.nf => {
            trace!("sentence {} too short", sentence.tag());
            session.nmea.cycle_continue = false;
        }
        Some((i, phrase)) => {
            if let Some(decoder) = phrase.decoder {
                mask = decoder(&sentence, session);
            }

            session.nmea.cycle_continue = phrase.cycle_continue;
            thistag = i + 1;
        }
    }

    talker_bookkeeping(&sentence, session);

    if mask.contains(ChangedMask::TIME) {
        let date = &mut session.nmea.date;

        session.newdata.time = if date.year == 0 && date.day == 0 {
            None
        } else {
            utc_resolve(&session.context, date)
        };

        mask |= ChangedMask::NTPTIME;
    }

    if session.nmea.latch_frac_time {
        mask |= ChangedMask::EPOCH;
    }

    mask |= detect_cycle(&sentence, session, mask, thistag);

    // RMC carries no dimension, do not drop a 3D fix for it
    if mask.contains(ChangedMask::MODE)
        && session.fix.mode == Mode::Fix3D
        && session.newdata.mode != Mode::NoFix
        && (session.lastfix.has_altitude() || session.oldfix.has_altitude())
    {
        session.newdata.mode = session.fix.mode;
    }

    mask
}

// GSV and GSA bursts are contiguous, anything else ends them
fn talker_bookkeeping(sentence: &Sentence<'_>, session: &mut Session) {
    let state = &mut session.nmea;

    if !sentence.mnemonic().starts_with("GSV") {
        if state.last_gsv_talker.is_some() {
            state.end_gsv_talker = state.last_gsv_talker;
        }

        state.last_gsv_talker = None;
    }

    if !sentence.mnemonic().starts_with("GSA") {
        state.last_gsa_talker = None;
    }
}

fn detect_cycle(
    sentence: &Sentence<'_>,
    session: &mut Session,
    mask: ChangedMask,
    thistag: usize,
) -> ChangedMask {
    let state = &mut session.nmea;
    let lasttag = state.lasttag;
    let mut cycle = ChangedMask::empty();

    if state.gsx_more {
        // wait for the rest of the burst
    } else if state.latch_frac_time {
        let delta = state.this_frac_time - state.last_frac_time;

        if delta.abs() > 0.01 {
            cycle |= ChangedMask::CLEAR;

            debug!("{} starts a reporting cycle, lasttag {}", sentence.tag(), lasttag);

            if lasttag > 0 && !state.cycle_enders[lasttag] && !state.cycle_continue {
                state.cycle_enders[lasttag] = true;
                session.cycle_end_reliable = true;

                debug!("{} learned as a cycle ender", PHRASES[lasttag - 1].name);
            }
        }
    } else {
        if state.cycle_enders[lasttag] && !(mask - ChangedMask::ONLINE).is_empty() {
            trace!("{} is just after a cycle ender", sentence.tag());
            cycle |= ChangedMask::REPORT;
        }

        if state.cycle_continue {
            trace!("{} extends the reporting cycle", sentence.tag());

            state.cycle_enders[lasttag] = false;
            state.cycle_enders[thistag] = true;
            session.cycle_end_reliable = true;
        }
    }

    if (state.latch_frac_time || state.cycle_continue)
        && state.cycle_enders[thistag]
        && !state.gsx_more
    {
        debug!("{} ends a reporting cycle", sentence.tag());
        cycle |= ChangedMask::REPORT;
    }

    if state.latch_frac_time {
        state.lasttag = thistag;
    }

    cycle
}
