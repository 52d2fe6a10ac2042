//! Receiver configuration sentences built with serde.
//!
//! A command is a struct whose serde name is the sentence address, `PMTK314` or `PUBX,40`, and
//! whose fields are the comma separated values in declaration order.  [`to_sentence`] adds the
//! `$`, checksum and line ending.

use crate::packet::checksum::nmea_add_checksum;

use serde::ser;
use serde::ser::SerializeStruct;
use serde::ser::Serializer;
use serde::Serialize;

use std::fmt;
use std::fmt::Display;

pub type NResult<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Message(String),
    Unsupported(&'static str),
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Message(msg) => formatter.write_str(msg),
            Error::Unsupported(what) => write!(formatter, "{} can't be written as NMEA", what),
        }
    }
}

impl std::error::Error for Error {}

/// MediaTek sentence output frequencies, in fixes per sentence, 0 disables.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename = "PMTK314")]
pub struct MtkSetNmeaOutput {
    pub gll: u32,
    pub rmc: u32,
    pub vtg: u32,
    pub gga: u32,
    pub gsa: u32,
    pub gsv: u32,
    _6: u32,
    _7: u32,
    _8: u32,
    _9: u32,
    _10: u32,
    _11: u32,
    _12: u32,
    _13: u32,
    _14: u32,
    _15: u32,
    _16: u32,
    pub zda: u32,
    pub mchn: u32,
}

impl MtkSetNmeaOutput {
    /// The sentences the NMEA decoder wants every fix, GSV every fifth.
    pub fn standard() -> Self {
        MtkSetNmeaOutput {
            rmc: 1,
            gga: 1,
            gsa: 1,
            gsv: 5,
            ..MtkSetNmeaOutput::default()
        }
    }
}

/// MediaTek line speed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename = "PMTK251")]
pub struct MtkSetBaud {
    pub baudrate: u32,
}

/// MediaTek position fix interval in milliseconds.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename = "PMTK220")]
pub struct MtkSetFixInterval {
    pub interval: u32,
}

/// MediaTek firmware release query, answered with `$PMTK705`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename = "PMTK605")]
pub struct MtkQueryRelease {}

/// u-blox per-port output rate of one sentence.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename = "PUBX,40")]
pub struct UbxRate {
    pub message: String,
    pub rddc: u32,
    pub rus1: u32,
    pub rus2: u32,
    pub rusb: u32,
    pub rspi: u32,
    pub reserved: u32,
}

impl UbxRate {
    /// Rate on UART 1 only.
    pub fn uart1(message: &str, enabled: bool) -> Self {
        UbxRate {
            message: message.to_string(),
            rddc: 0,
            rus1: u32::from(enabled),
            rus2: 0,
            rusb: 0,
            rspi: 0,
            reserved: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UbxPort {
    I2c = 0,
    Usart1 = 1,
    Usart2 = 2,
    Usb = 3,
    Spi = 4,
}

impl Serialize for UbxPort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(*self as u32)
    }
}

bitflags! {
    /// Protocols enabled on a u-blox port.
    pub struct UbxProtocols: u16 {
        const UBX   = 0x0001;
        const NMEA  = 0x0002;
        const RTCM2 = 0x0004;
        const RTCM3 = 0x0020;
    }
}

impl Serialize for UbxProtocols {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.bits())
    }
}

/// u-blox port configuration, the speed switcher.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename = "PUBX,41")]
pub struct UbxConfig {
    pub port: UbxPort,
    pub in_proto: UbxProtocols,
    pub out_proto: UbxProtocols,
    pub baudrate: u32,
    pub autobauding: bool,
}

/// Garmin sensor configuration.  Only the baud rate code in field 8 is set, empty fields
/// leave the receiver's values alone.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename = "PGRMC")]
pub struct GarminSensorConfig {
    _1: Option<u32>,
    _2: Option<u32>,
    _3: Option<u32>,
    _4: Option<u32>,
    _5: Option<u32>,
    _6: Option<u32>,
    _7: Option<u32>,
    pub baud_code: Option<u32>,
}

impl GarminSensorConfig {
    pub fn speed(speed: u32) -> Option<Self> {
        let baud_code = match speed {
            1200 => 1,
            2400 => 2,
            4800 => 3,
            9600 => 4,
            19200 => 5,
            38400 => 8,
            _ => return None,
        };

        Some(GarminSensorConfig {
            baud_code: Some(baud_code),
            ..GarminSensorConfig::default()
        })
    }
}

/// Serialize a command to its sentence body, without `$` or checksum.
pub fn to_string<T>(value: &T) -> NResult<String>
where
    T: Serialize,
{
    let mut serializer = ToNmea {
        output: String::new(),
    };

    value.serialize(&mut serializer)?;

    Ok(serializer.output)
}

/// Serialize a command to a complete sentence ready for the wire.
pub fn to_sentence<T>(value: &T) -> NResult<String>
where
    T: Serialize,
{
    to_string(value).map(|body| nmea_add_checksum(&body))
}

pub struct ToNmea {
    output: String,
}

impl<'a> ser::Serializer for &'a mut ToNmea {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = ser::Impossible<(), Error>;
    type SerializeTuple = ser::Impossible<(), Error>;
    type SerializeTupleStruct = ser::Impossible<(), Error>;
    type SerializeTupleVariant = ser::Impossible<(), Error>;
    type SerializeMap = ser::Impossible<(), Error>;
    type SerializeStruct = Self;
    type SerializeStructVariant = ser::Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> NResult<()> {
        self.output += if v { "1" } else { "0" };

        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> NResult<()> {
        Err(Error::Unsupported("bytes"))
    }

    fn serialize_char(self, v: char) -> NResult<()> {
        self.output.push(v);

        Ok(())
    }

    fn serialize_f32(self, v: f32) -> NResult<()> {
        self.output += &v.to_string();

        Ok(())
    }

    fn serialize_f64(self, v: f64) -> NResult<()> {
        self.output += &v.to_string();

        Ok(())
    }

    fn serialize_i8(self, v: i8) -> NResult<()> {
        self.output += &v.to_string();

        Ok(())
    }

    fn serialize_i16(self, v: i16) -> NResult<()> {
        self.output += &v.to_string();

        Ok(())
    }

    fn serialize_i32(self, v: i32) -> NResult<()> {
        self.output += &v.to_string();

        Ok(())
    }

    fn serialize_i64(self, v: i64) -> NResult<()> {
        self.output += &v.to_string();

        Ok(())
    }

    fn serialize_u8(self, v: u8) -> NResult<()> {
        self.output += &v.to_string();

        Ok(())
    }

    // u-blox protocol masks are four hex digits
    fn serialize_u16(self, v: u16) -> NResult<()> {
        self.output += format!("{:04X}", v).as_str();

        Ok(())
    }

    fn serialize_u32(self, v: u32) -> NResult<()> {
        self.output += &v.to_string();

        Ok(())
    }

    fn serialize_u64(self, v: u64) -> NResult<()> {
        self.output += &v.to_string();

        Ok(())
    }

    fn serialize_str(self, v: &str) -> NResult<()> {
        if v.contains(|c| c == ',' || c == '*' || c == '$') {
            return Err(Error::Message(format!("field {:?} contains a delimiter", v)));
        }

        self.output += v;

        Ok(())
    }

    fn serialize_none(self) -> NResult<()> {
        Ok(())
    }

    fn serialize_some<T>(self, v: &T) -> NResult<()>
    where
        T: ?Sized + Serialize,
    {
        v.serialize(self)
    }

    fn serialize_unit(self) -> NResult<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, name: &'static str) -> NResult<()> {
        self.output += name;

        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> NResult<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, v: &T) -> NResult<()>
    where
        T: ?Sized + Serialize,
    {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _v: &T,
    ) -> NResult<()>
    where
        T: ?Sized + Serialize,
    {
        Err(Error::Unsupported("enum with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> NResult<Self::SerializeSeq> {
        Err(Error::Unsupported("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> NResult<Self::SerializeTuple> {
        Err(Error::Unsupported("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> NResult<Self::SerializeTupleStruct> {
        Err(Error::Unsupported("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> NResult<Self::SerializeTupleVariant> {
        Err(Error::Unsupported("tuple variant"))
    }

    fn serialize_map(self, _len: Option<usize>) -> NResult<Self::SerializeMap> {
        Err(Error::Unsupported("map"))
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> NResult<Self::SerializeStruct> {
        if !self.output.is_empty() {
            return Err(Error::Unsupported("nested struct"));
        }

        self.output += name;

        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> NResult<Self::SerializeStructVariant> {
        Err(Error::Unsupported("struct variant"))
    }
}

impl<'a> SerializeStruct for &'a mut ToNmea {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, _k: &'static str, v: &T) -> NResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.output += ",";

        v.serialize(&mut **self)
    }

    fn end(self) -> NResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mtk_output() {
        let nmea = to_string(&MtkSetNmeaOutput::standard()).unwrap();

        assert_eq!("PMTK314,0,1,0,1,1,5,0,0,0,0,0,0,0,0,0,0,0,0,0", nmea);
    }

    #[test]
    fn test_mtk_release() {
        assert_eq!("$PMTK605*31\r\n", to_sentence(&MtkQueryRelease {}).unwrap());
    }

    #[test]
    fn test_ubx_rate() {
        let nmea = to_string(&UbxRate::uart1("GLL", true)).unwrap();

        assert_eq!("PUBX,40,GLL,0,1,0,0,0,0", nmea);

        let nmea = to_string(&UbxRate::uart1("ZDA", false)).unwrap();

        assert_eq!("PUBX,40,ZDA,0,0,0,0,0,0", nmea);
    }

    #[test]
    fn test_ubx_config() {
        let config = UbxConfig {
            port: UbxPort::Usart1,
            in_proto: UbxProtocols::UBX | UbxProtocols::NMEA | UbxProtocols::RTCM2,
            out_proto: UbxProtocols::NMEA,
            baudrate: 19200,
            autobauding: false,
        };

        let nmea = to_string(&config).unwrap();

        assert_eq!("PUBX,41,1,0007,0002,19200,0", nmea);
    }

    #[test]
    fn test_garmin_speed() {
        let nmea = to_string(&GarminSensorConfig::speed(9600).unwrap()).unwrap();

        assert_eq!("PGRMC,,,,,,,,4", nmea);

        assert!(GarminSensorConfig::speed(57600).is_none());
    }

    #[test]
    fn test_delimiter_rejected() {
        let rate = UbxRate::uart1("G,LL", true);

        assert!(matches!(to_string(&rate), Err(Error::Message(_))));
    }
}
