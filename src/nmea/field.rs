//! Decoders for single NMEA fields.
//!
//! Every decoder takes one already-split field and returns `None` for an empty or
//! malformed field.  Numeric decoders accept a valid prefix, so `"545.4M"` reads as 545.4,
//! the way receivers with sloppy formatting expect.

use nom::branch::alt;
use nom::bytes::complete::take_while_m_n;
use nom::character::complete::char;
use nom::character::complete::digit1;
use nom::character::complete::one_of;
use nom::combinator::map;
use nom::combinator::map_res;
use nom::combinator::opt;
use nom::combinator::recognize;
use nom::number::complete::double;
use nom::sequence::pair;
use nom::sequence::tuple;
use nom::IResult;

type Result<'a, O> = IResult<&'a str, O, nom::error::Error<&'a str>>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NorthSouth {
    North,
    South,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EastWest {
    East,
    West,
}

fn north_south(input: &str) -> Result<NorthSouth> {
    map(one_of("NS"), |ns| match ns {
        'N' => NorthSouth::North,
        _ => NorthSouth::South,
    })(input)
}

fn east_west(input: &str) -> Result<EastWest> {
    map(one_of("EW"), |ew| match ew {
        'E' => EastWest::East,
        _ => EastWest::West,
    })(input)
}

fn signed_integer(input: &str) -> Result<i64> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), |s: &str| {
        s.trim_start_matches('+').parse()
    })(input)
}

fn two_digit(input: &str) -> Result<u32> {
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_digit()), |s: &str| {
        s.parse()
    })(input)
}

/// A finite floating point value.
pub fn float(field: &str) -> Option<f64> {
    let field = field.trim();

    if field.is_empty() {
        return None;
    }

    match double::<_, nom::error::Error<&str>>(field) {
        Ok((_, v)) if v.is_finite() => Some(v),
        _ => None,
    }
}

/// A signed integer, ignoring anything after the digits.
pub fn int(field: &str) -> Option<i64> {
    signed_integer(field.trim()).ok().map(|(_, v)| v)
}

/// An integer, or zero, like C `atoi`.
pub fn int_or_zero(field: &str) -> i64 {
    int(field).unwrap_or(0)
}

/// First character of a field.
pub fn first(field: &str) -> Option<char> {
    field.chars().next()
}

/// A single hexadecimal digit, used for NMEA 4.10 signal ids.
pub fn hex_digit(field: &str) -> Option<u8> {
    first(field)?.to_digit(16).map(|d| d as u8)
}

/// Degrees from `dddmm.mmmm`, any number of degree digits.
pub fn degrees_minutes(field: &str) -> Option<f64> {
    let ddmm = float(field)?;
    let degrees = (ddmm / 100.0).trunc();
    let minutes = ddmm - degrees * 100.0;

    Some(degrees + minutes / 60.0)
}

/// A signed latitude and longitude from four fields: `ddmm.mm,N,dddmm.mm,E`.
pub fn lat_lon(lat: &str, ns: &str, lon: &str, ew: &str) -> Option<(f64, f64)> {
    if lat.is_empty() || ns.is_empty() || lon.is_empty() || ew.is_empty() {
        return None;
    }

    let mut latitude = degrees_minutes(lat)?;
    let mut longitude = degrees_minutes(lon)?;

    if let Ok((_, NorthSouth::South)) = north_south(ns) {
        latitude = -latitude;
    }

    if let Ok((_, EastWest::West)) = east_west(ew) {
        longitude = -longitude;
    }

    Some((latitude, longitude))
}

/// A signed value whose sign comes from an `E`/`W` field, `None` for any other direction.
pub fn east_west_value(value: &str, direction: &str) -> Option<f64> {
    let value = float(value)?;

    match east_west(direction) {
        Ok((_, EastWest::East)) => Some(value),
        Ok((_, EastWest::West)) => Some(-value),
        Err(_) => None,
    }
}

/// `yyyymmddhhmmss` as used by Trimble Thunderbolt style sentences.
pub fn compact_datetime(field: &str) -> Option<(i32, u32, u32, u32, u32, u32)> {
    let century = map_res(take_while_m_n(4, 4, |c: char| c.is_ascii_digit()), |s: &str| {
        s.parse::<i32>()
    });

    tuple((century, two_digit, two_digit, two_digit, two_digit, two_digit))(field)
        .ok()
        .map(|(_, v)| v)
}

/// `A`/`V` style validity flags.
pub fn is_valid(field: &str) -> bool {
    alt((char::<_, nom::error::Error<&str>>('A'), char('D')))(field).is_ok()
}
