use std::fmt;

bitflags! {
    /// Which parts of a session one decoded packet touched.
    ///
    /// The low bits describe data, the bits from 48 up are private flags used by the cycle
    /// assembler and the publication path.
    #[derive(Default)]
    pub struct ChangedMask: u64 {
        const ONLINE         = 1 << 1;
        const TIME           = 1 << 2;
        const TIMERR         = 1 << 3;
        const LATLON         = 1 << 4;
        const ALTITUDE       = 1 << 5;
        const SPEED          = 1 << 6;
        const TRACK          = 1 << 7;
        const CLIMB          = 1 << 8;
        const STATUS         = 1 << 9;
        const MODE           = 1 << 10;
        const DOP            = 1 << 11;
        const HERR           = 1 << 12;
        const VERR           = 1 << 13;
        const ATTITUDE       = 1 << 14;
        const SATELLITE      = 1 << 15;
        const SPEEDERR       = 1 << 16;
        const TRACKERR       = 1 << 17;
        const CLIMBERR       = 1 << 18;
        const DEVICE         = 1 << 19;
        const DEVICELIST     = 1 << 20;
        const DEVICEID       = 1 << 21;
        const RTCM2          = 1 << 22;
        const RTCM3          = 1 << 23;
        const AIS            = 1 << 24;
        const PACKET         = 1 << 25;
        const SUBFRAME       = 1 << 26;
        const GST            = 1 << 27;
        const VERSION        = 1 << 28;
        const POLICY         = 1 << 29;
        const LOGMESSAGE     = 1 << 30;
        const ERROR          = 1 << 31;
        const TOFF           = 1 << 32;
        const PPS            = 1 << 33;
        const NAVDATA        = 1 << 34;
        const OSCILLATOR     = 1 << 35;
        const ECEF           = 1 << 36;
        const VECEF          = 1 << 37;
        const MAGNETIC_TRACK = 1 << 38;
        const RAW            = 1 << 39;
        const NED            = 1 << 40;
        const VNED           = 1 << 41;

        /// First sentence of a new cycle, the running fix is reset before merging.
        const CLEAR          = 1 << 48;
        /// The cycle is complete, publish it.
        const REPORT         = 1 << 49;
        /// The time carried by this packet is good enough for clock disciplining.
        const NTPTIME        = 1 << 50;
        const PASSTHROUGH    = 1 << 51;
        /// The driver binding changed.
        const DRIVER         = 1 << 52;
        /// The satellites-used accumulator changed.
        const USED           = 1 << 53;
        /// This packet latched a sub-second timestamp.
        const EPOCH          = 1 << 54;
    }
}

impl ChangedMask {
    /// The bookkeeping bits that never reach a client.
    pub fn private() -> ChangedMask {
        ChangedMask::CLEAR
            | ChangedMask::REPORT
            | ChangedMask::NTPTIME
            | ChangedMask::PASSTHROUGH
            | ChangedMask::DRIVER
            | ChangedMask::USED
            | ChangedMask::EPOCH
    }

    /// Everything except the bookkeeping bits, "did this packet carry data".
    pub fn data(&self) -> ChangedMask {
        *self - (ChangedMask::ONLINE | ChangedMask::PACKET | ChangedMask::private())
    }
}

impl fmt::Display for ChangedMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (ChangedMask::ONLINE, "ONLINE"),
            (ChangedMask::TIME, "TIME"),
            (ChangedMask::LATLON, "LATLON"),
            (ChangedMask::ALTITUDE, "ALTITUDE"),
            (ChangedMask::SPEED, "SPEED"),
            (ChangedMask::TRACK, "TRACK"),
            (ChangedMask::CLIMB, "CLIMB"),
            (ChangedMask::STATUS, "STATUS"),
            (ChangedMask::MODE, "MODE"),
            (ChangedMask::DOP, "DOP"),
            (ChangedMask::HERR, "HERR"),
            (ChangedMask::VERR, "VERR"),
            (ChangedMask::ATTITUDE, "ATTITUDE"),
            (ChangedMask::SATELLITE, "SATELLITE"),
            (ChangedMask::GST, "GST"),
            (ChangedMask::RTCM3, "RTCM3"),
            (ChangedMask::AIS, "AIS"),
            (ChangedMask::NAVDATA, "NAVDATA"),
            (ChangedMask::OSCILLATOR, "OSCILLATOR"),
            (ChangedMask::MAGNETIC_TRACK, "MAGNETIC_TRACK"),
            (ChangedMask::NED, "NED"),
            (ChangedMask::VNED, "VNED"),
            (ChangedMask::CLEAR, "CLEAR"),
            (ChangedMask::REPORT, "REPORT"),
            (ChangedMask::NTPTIME, "NTPTIME"),
            (ChangedMask::DRIVER, "DRIVER"),
            (ChangedMask::USED, "USED"),
            (ChangedMask::EPOCH, "EPOCH"),
        ];

        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();

        write!(f, "{{{}}}", set.join("|"))
    }
}
