use serde::Deserialize;

use serde_json::Value;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::character::complete::multispace0;
use nom::combinator::eof;
use nom::combinator::map;
use nom::combinator::peek;
use nom::combinator::rest;
use nom::combinator::value;
use nom::error::ErrorKind;
use nom::error::ParseError;
use nom::sequence::preceded;
use nom::sequence::terminated;
use nom::Err;
use nom::IResult;

/// The body of a `?DEVICE=` request.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceRequest {
    pub path: Option<String>,
    pub bps: Option<u32>,
    pub parity: Option<String>,
    pub stopbits: Option<u8>,
    pub native: Option<u8>,
    pub cycle: Option<f64>,
    pub hexdata: Option<String>,
}

impl DeviceRequest {
    /// Changes the serial line settings.
    pub fn changes_serial(&self) -> bool {
        self.bps.is_some() || self.parity.is_some() || self.stopbits.is_some()
    }

    /// Asks for any change at all, rather than just naming a device.
    pub fn has_settings(&self) -> bool {
        self.changes_serial()
            || self.native.is_some()
            || self.cycle.is_some()
            || self.hexdata.as_deref().map_or(false, |hex| !hex.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Device(Option<DeviceRequest>),
    Devices,
    /// Reply with an `ERROR` carrying this message.
    Error(String),
    Poll,
    Version,
    Watch(Option<Value>),
}

/// A JSON object with balanced braces, strings may contain braces.
fn json_object<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    if !input.starts_with('{') {
        return Err(Err::Error(E::from_error_kind(input, ErrorKind::Char)));
    }

    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if in_string {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => (),
            }

            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;

                if depth == 0 {
                    return Ok((&input[i + 1..], &input[..=i]));
                }
            }
            _ => (),
        }
    }

    Err(Err::Error(E::from_error_kind(input, ErrorKind::TakeUntil)))
}

/// End of one request: `;`, the end of the line, or the next request.
fn terminator<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, (), E> {
    preceded(
        multispace0,
        alt((
            value((), char(';')),
            value((), eof),
            value((), peek(char('?'))),
        )),
    )(input)
}

/// `=` followed by an object, converted by `convert`.  An object that cannot be read becomes an
/// `ERROR` naming `word`, the rest of the line is consumed.
fn argument<'a, E, F>(word: &'static str, convert: F) -> impl FnMut(&'a str) -> IResult<&'a str, Command, E>
where
    E: ParseError<&'a str>,
    F: Fn(&str) -> Result<Command, String> + Copy,
{
    move |input: &'a str| {
        let (input, _) = preceded(multispace0, char('='))(input)?;
        let (input, _) = multispace0(input)?;

        let invalid = move |reason: String| Command::Error(format!("Invalid {}: {}", word, reason));

        alt((
            map(terminated(json_object, terminator), move |blob: &str| {
                convert(blob).unwrap_or_else(invalid)
            }),
            map(rest, move |_| invalid("unterminated object".to_string())),
        ))(input)
    }
}

fn device<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Command, E> {
    let convert = |blob: &str| {
        serde_json::from_str::<DeviceRequest>(blob)
            .map(|request| Command::Device(Some(request)))
            .map_err(|e| e.to_string())
    };

    preceded(
        tag("?DEVICE"),
        alt((
            argument("DEVICE", convert),
            value(Command::Device(None), terminator),
        )),
    )(input)
}

fn devices<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Command, E> {
    value(Command::Devices, preceded(tag("?DEVICES"), terminator))(input)
}

fn poll<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Command, E> {
    value(Command::Poll, preceded(tag("?POLL"), terminator))(input)
}

fn version<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Command, E> {
    value(Command::Version, preceded(tag("?VERSION"), terminator))(input)
}

fn watch<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Command, E> {
    let convert = |blob: &str| {
        serde_json::from_str::<Value>(blob)
            .map(|json| Command::Watch(Some(json)))
            .map_err(|e| e.to_string())
    };

    preceded(
        tag("?WATCH"),
        alt((
            argument("WATCH", convert),
            value(Command::Watch(None), terminator),
        )),
    )(input)
}

fn command<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Command, E> {
    preceded(multispace0, alt((devices, device, poll, version, watch)))(input)
}

/// Parse one line into its requests.
///
/// Several requests may share a line.  Parsing stops at the first unrecognized request, which
/// is returned as an `Error` quoting the rest of the line.
pub fn parse(line: &str) -> Vec<Command> {
    let mut input = line.trim();
    let mut commands = vec![];

    while !input.is_empty() {
        match command::<()>(input) {
            Ok((remaining, command)) => {
                commands.push(command);
                input = remaining.trim_start();
            }
            Err(_) => {
                commands.push(Command::Error(format!("Unrecognized request '{}'", input)));
                break;
            }
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_object() {
        assert_eq!(
            ("", "{\"hello\":true}"),
            json_object::<()>("{\"hello\":true}").unwrap()
        );

        assert_eq!(
            (";", "{\"a\":{\"b\":\"}\"}}"),
            json_object::<()>("{\"a\":{\"b\":\"}\"}};").unwrap()
        );

        assert!(json_object::<()>("{\"a\":1").is_err());
    }

    #[test]
    fn test_terminator() {
        assert!(terminator::<()>(";").is_ok());
        assert!(terminator::<()>("").is_ok());
        assert!(terminator::<()>("  ?POLL;").is_ok());
        assert!(terminator::<()>("X").is_err());
    }

    #[test]
    fn test_device() {
        assert_eq!(Command::Device(None), device::<()>("?DEVICE;").unwrap().1);

        let request = DeviceRequest {
            path: Some("/dev/gps0".to_string()),
            bps: Some(38400),
            ..DeviceRequest::default()
        };

        assert_eq!(
            Command::Device(Some(request)),
            device::<()>("?DEVICE={\"path\":\"/dev/gps0\",\"bps\":38400};")
                .unwrap()
                .1
        );
    }

    #[test]
    fn test_device_invalid() {
        match device::<()>("?DEVICE={\"bps\":\"fast\"};").unwrap().1 {
            Command::Error(message) => assert!(message.starts_with("Invalid DEVICE: ")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_devices() {
        assert_eq!(Command::Devices, devices::<()>("?DEVICES;").unwrap().1);
    }

    #[test]
    fn test_poll() {
        assert_eq!(Command::Poll, poll::<()>("?POLL;").unwrap().1);
    }

    #[test]
    fn test_version() {
        assert_eq!(Command::Version, version::<()>("?VERSION;").unwrap().1);
        assert!(version::<()>("?VERSIONS;").is_err());
    }

    #[test]
    fn test_watch() {
        assert_eq!(Command::Watch(None), watch::<()>("?WATCH;").unwrap().1);

        let watch_data = json!({
            "device": "/dev/gps0",
            "enable": true,
        });

        assert_eq!(
            Command::Watch(Some(watch_data)),
            watch::<()>("?WATCH = {\"device\":\"/dev/gps0\", \"enable\":true} ;")
                .unwrap()
                .1
        );
    }

    #[test]
    fn test_watch_unterminated() {
        assert_eq!(
            Command::Error("Invalid WATCH: unterminated object".to_string()),
            watch::<()>("?WATCH={\"enable\":true").unwrap().1
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(vec![Command::Watch(None)], parse("?WATCH;\r\n"));
        assert_eq!(vec![Command::Version], parse("?VERSION"));
        assert!(parse("\r\n").is_empty());
    }

    #[test]
    fn test_parse_several() {
        assert_eq!(
            vec![
                Command::Watch(Some(json!({"enable": true}))),
                Command::Poll
            ],
            parse("?WATCH={\"enable\":true};?POLL;\n")
        );
    }

    #[test]
    fn test_parse_unrecognized() {
        assert_eq!(
            vec![Command::Error("Unrecognized request 'garbage'".to_string())],
            parse("garbage\n")
        );

        assert_eq!(
            vec![
                Command::Version,
                Command::Error("Unrecognized request '?FOO;'".to_string())
            ],
            parse("?VERSION;?FOO;\n")
        );
    }
}
