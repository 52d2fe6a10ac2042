use crate::nmea::field;

/// A sentence split into its comma separated fields.
///
/// The lead `$`/`!`, the checksum and the line ending are dropped.  `count` follows the
/// receiver convention where a sentence with a checksum has one more field than commas:
/// `$GPHDT,341.8,T*21` has a count of 3 while `$GPHDT,341.8,T` has a count of 2.
/// Fields past the end read as empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Sentence<'a> {
    fields: Vec<&'a str>,
    count: usize,
}

impl<'a> Sentence<'a> {
    pub fn new(text: &'a str) -> Sentence<'a> {
        let text = text.strip_prefix(|c| c == '$' || c == '!').unwrap_or(text);

        let end = text
            .find(|c: char| c == '*' || c < ' ')
            .unwrap_or(text.len());

        let checksummed = text[end..].starts_with('*');
        let body = &text[..end];

        let fields: Vec<&str> = body.split(',').collect();
        let commas = fields.len() - 1;

        let count = if checksummed { commas + 1 } else { commas };

        Sentence { fields, count }
    }

    /// Field `n`, empty when absent.
    pub fn field(&self, n: usize) -> &'a str {
        self.fields.get(n).copied().unwrap_or("")
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Field 0, talker and mnemonic together: `GPGGA`, `PGRME`, `STI`.
    pub fn tag(&self) -> &'a str {
        self.field(0)
    }

    /// Mnemonic without the two character talker.
    pub fn mnemonic(&self) -> &'a str {
        self.tag().get(2..).unwrap_or("")
    }

    /// The second character of the talker, `P` for `GP`, `N` for `GN`.
    pub fn talker(&self) -> Option<char> {
        self.tag().chars().nth(1)
    }

    pub fn is_empty(&self, n: usize) -> bool {
        self.field(n).is_empty()
    }

    pub fn float(&self, n: usize) -> Option<f64> {
        field::float(self.field(n))
    }

    pub fn int(&self, n: usize) -> Option<i64> {
        field::int(self.field(n))
    }

    /// Integer value, zero when empty or malformed.
    pub fn atoi(&self, n: usize) -> i64 {
        field::int_or_zero(self.field(n))
    }

    pub fn char(&self, n: usize) -> Option<char> {
        field::first(self.field(n))
    }

    /// Latitude and longitude from fields `n` to `n + 3`.
    pub fn lat_lon(&self, n: usize) -> Option<(f64, f64)> {
        field::lat_lon(
            self.field(n),
            self.field(n + 1),
            self.field(n + 2),
            self.field(n + 3),
        )
    }
}
