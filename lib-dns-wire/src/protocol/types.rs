use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Maximum encoded length of a domain name.  The number of labels
/// plus sum of the lengths of the labels.
pub const DOMAINNAME_MAX_LEN: usize = 255;

/// Maximum length of a single label in a domain name.
pub const LABEL_MAX_LEN: usize = 63;

/// Octet mask for the RD flag being set (recursion desired).
pub const HEADER_MASK_RD: u8 = 0b0000_0001;

/// Octet mask for the rcode field.
pub const HEADER_MASK_RCODE: u8 = 0b0000_1111;

/// A decoded DNS response.
///
/// ```text
///     +---------------------+
///     |        Header       |
///     +---------------------+
///     |       Question      | the question for the name server
///     +---------------------+
///     |        Answer       | RRs answering the question
///     +---------------------+
///     |      Authority      | RRs pointing toward an authority
///     +---------------------+
///     |      Additional     | RRs holding additional information
///     +---------------------+
/// ```
///
/// See section 4.1 of RFC 1035.  Unlike the wire layout, the decoded
/// form does not keep the three resource record sections apart:
/// records from all of them land in one bucket per record type.
/// Buckets exist only for types actually present in the message, and
/// hold records in the order they were parsed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Message {
    pub status: Status,
    pub questions: Vec<QuestionRecord>,
    pub records: HashMap<RecordType, Vec<ResourceRecord>>,
}

impl Message {
    /// All records of the given type, in parse order.  Empty if the
    /// message had none.
    pub fn records_of(&self, rtype: RecordType) -> &[ResourceRecord] {
        self.records.get(&rtype).map_or(&[], Vec::as_slice)
    }
}

/// The response status: the rcode from the header, paired with its
/// human-readable description.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Status {
    pub rcode: u16,
    pub message: &'static str,
}

impl Status {
    pub fn from_rcode(rcode: u16) -> Self {
        Self {
            rcode,
            message: rcode_message(rcode),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.rcode)
    }
}

/// Human-readable descriptions of the documented rcodes, covering the
/// RFC 1035 and RFC 2136 / RFC 2845 ranges.  Codes 11 to 15 are
/// unassigned, so the table has a gap there.
pub fn rcode_message(rcode: u16) -> &'static str {
    match rcode {
        0 => "Success",
        1 => "Format Error",
        2 => "Server Failure",
        3 => "Non-Existent Domain",
        4 => "Not Implemented",
        5 => "Query Refused",
        6 => "Name Exists when it should not",
        7 => "RR Set Exists when it should not",
        8 => "RR Set that should exist does not",
        9 => "Not Authorized",
        10 => "Name not contained in zone",
        16 => "TSIG Signature Failure",
        17 => "Key not recognized",
        18 => "Signature out of time window",
        19 => "Bad TKEY Mode",
        20 => "Duplicate key name",
        21 => "Algorithm not supported",
        22 => "Bad Truncation",
        23 => "Bad/missing server cookie",
        _ => "UNKNOWN ERROR",
    }
}

/// One entry of the question section.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                                               |
///     /                     QNAME                     /
///     /                                               /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     QTYPE                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     QCLASS                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.2 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QuestionRecord {
    /// Dotted name, without the trailing root dot.
    pub name: String,
    pub rtype: RecordType,
    pub rclass: RecordClass,
}

impl fmt::Display for QuestionRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.rclass, self.rtype)
    }
}

/// A single resource record from the answer, authority, or additional
/// section.  See section 4.1.3 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResourceRecord {
    /// Dotted name, without the trailing root dot.
    pub name: String,
    pub rclass: RecordClass,
    pub ttl: u32,
    pub data: RecordData,
}

impl ResourceRecord {
    pub fn rtype(&self) -> RecordType {
        self.data.rtype()
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name,
            self.ttl,
            self.rclass,
            self.rtype(),
            self.data
        )
    }
}

/// A record type with its decoded payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RecordData {
    /// A 32 bit Internet address.  `None` if the record carried the
    /// single-zero-octet placeholder payload instead of an address
    /// (the decoder also forces the ttl of such records to 5).
    A { ip: Option<Ipv4Addr> },

    /// A 128 bit Internet address, with the same placeholder rule as
    /// `A`.
    AAAA { ip: Option<Ipv6Addr> },

    /// The name of a host which should be authoritative for the
    /// record's class and domain.
    NS { ns: String },

    /// The canonical name for the owner.  The owner name is an alias.
    CNAME { cname: String },

    /// Start-of-authority data for a zone.  `nx` is the "minimum" ttl
    /// field of RFC 1035, widely repurposed as the negative-caching
    /// interval.
    SOA {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        nx: u32,
    },

    /// A mail exchange for the owner name, with its preference (lower
    /// values preferred).
    MX { preference: u16, exchange: String },

    /// All of the record's character-strings, concatenated.
    TXT { text: String },

    /// The location of a service: RFC 2782.
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },

    /// Any other record.  The payload is skipped, not decoded.
    Unknown { tag: RecordTypeUnknown },
}

impl RecordData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RecordData::A { .. } => RecordType::A,
            RecordData::AAAA { .. } => RecordType::AAAA,
            RecordData::NS { .. } => RecordType::NS,
            RecordData::CNAME { .. } => RecordType::CNAME,
            RecordData::SOA { .. } => RecordType::SOA,
            RecordData::MX { .. } => RecordType::MX,
            RecordData::TXT { .. } => RecordType::TXT,
            RecordData::SRV { .. } => RecordType::SRV,
            RecordData::Unknown { tag } => RecordType::Unknown(*tag),
        }
    }
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordData::A { ip: Some(ip) } => write!(f, "{ip}"),
            RecordData::AAAA { ip: Some(ip) } => write!(f, "{ip}"),
            RecordData::A { ip: None } | RecordData::AAAA { ip: None } => write!(f, "-"),
            RecordData::NS { ns } => write!(f, "{ns}"),
            RecordData::CNAME { cname } => write!(f, "{cname}"),
            RecordData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                nx,
            } => write!(
                f,
                "{mname} {rname} {serial} {refresh} {retry} {expire} {nx}"
            ),
            RecordData::MX {
                preference,
                exchange,
            } => write!(f, "{preference} {exchange}"),
            RecordData::TXT { text } => write!(f, "{text:?}"),
            RecordData::SRV {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{priority} {weight} {port} {target}"),
            RecordData::Unknown { .. } => write!(f, "?"),
        }
    }
}

/// Record types are used by resource records and by queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    MX,
    TXT,
    AAAA,
    SRV,
    Unknown(RecordTypeUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `RecordType`s cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordTypeUnknown(u16);

impl RecordType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordType::Unknown(_))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::SOA => write!(f, "SOA"),
            RecordType::MX => write!(f, "MX"),
            RecordType::TXT => write!(f, "TXT"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::SRV => write!(f, "SRV"),
            RecordType::Unknown(RecordTypeUnknown(n)) => write!(f, "UNK({n})"),
        }
    }
}

impl FromStr for RecordType {
    type Err = RecordTypeFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(RecordType::A),
            "NS" => Ok(RecordType::NS),
            "CNAME" => Ok(RecordType::CNAME),
            "SOA" => Ok(RecordType::SOA),
            "MX" => Ok(RecordType::MX),
            "TXT" => Ok(RecordType::TXT),
            "AAAA" => Ok(RecordType::AAAA),
            "SRV" => Ok(RecordType::SRV),
            _ => Err(RecordTypeFromStr::NoParse),
        }
    }
}

/// Errors that can arise when converting a `&str` into a `RecordType`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordTypeFromStr {
    NoParse,
}

impl fmt::Display for RecordTypeFromStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "could not parse string to type")
    }
}

impl std::error::Error for RecordTypeFromStr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            15 => RecordType::MX,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            33 => RecordType::SRV,
            _ => RecordType::Unknown(RecordTypeUnknown(value)),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::SRV => 33,
            RecordType::Unknown(RecordTypeUnknown(value)) => value,
        }
    }
}

/// Record classes are used by resource records and by queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordClass {
    IN,
    Unknown(RecordClassUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `RecordClass`es cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordClassUnknown(u16);

impl RecordClass {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordClass::Unknown(_))
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordClass::IN => write!(f, "IN"),
            RecordClass::Unknown(RecordClassUnknown(n)) => write!(f, "UNK({n})"),
        }
    }
}

impl FromStr for RecordClass {
    type Err = RecordClassFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(RecordClass::IN),
            _ => Err(RecordClassFromStr::NoParse),
        }
    }
}

/// Errors that can arise when converting a `&str` into a `RecordClass`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordClassFromStr {
    NoParse,
}

impl fmt::Display for RecordClassFromStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "could not parse string to class")
    }
}

impl std::error::Error for RecordClassFromStr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::IN,
            _ => RecordClass::Unknown(RecordClassUnknown(value)),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::IN => 1,
            RecordClass::Unknown(RecordClassUnknown(value)) => value,
        }
    }
}

/// A question to put on the wire: name, type, class.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QuestionSpec {
    pub name: String,
    pub rtype: RecordType,
    pub rclass: RecordClass,
}

impl QuestionSpec {
    pub fn new(name: &str, rtype: RecordType, rclass: RecordClass) -> Self {
        Self {
            name: name.to_string(),
            rtype,
            rclass,
        }
    }

    /// Parse a `name[:type[:class]]` identifier, defaulting the type
    /// to `A` and the class to `IN`.
    ///
    /// # Errors
    ///
    /// If the type or class string has no entry in the lookup tables.
    pub fn from_identifier(identifier: &str) -> Result<Self, IdentifierError> {
        let mut parts = identifier.splitn(3, ':');
        let name = parts.next().unwrap_or_default();
        let rtype_str = parts.next().unwrap_or("A");
        let rclass_str = parts.next().unwrap_or("IN");

        let rtype = RecordType::from_str(rtype_str)
            .map_err(|_| IdentifierError::UnknownRecordType(rtype_str.to_string()))?;
        let rclass = RecordClass::from_str(rclass_str)
            .map_err(|_| IdentifierError::UnknownRecordClass(rclass_str.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            rtype,
            rclass,
        })
    }
}

/// Errors that can arise when resolving a query identifier through
/// the type and class tables.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum IdentifierError {
    UnknownRecordType(String),
    UnknownRecordClass(String),
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdentifierError::UnknownRecordType(s) => write!(f, "unknown record type '{s}'"),
            IdentifierError::UnknownRecordClass(s) => write!(f, "unknown record class '{s}'"),
        }
    }
}

impl std::error::Error for IdentifierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u16_recordtype_roundtrip() {
        for i in 0..100 {
            assert_eq!(u16::from(RecordType::from(i)), i);
        }
    }

    #[test]
    fn u16_recordclass_roundtrip() {
        for i in 0..100 {
            assert_eq!(u16::from(RecordClass::from(i)), i);
        }
    }

    #[test]
    fn unknown_type_displays_code() {
        assert_eq!("UNK(999)", RecordType::from(999).to_string());
        assert_eq!("UNK(4)", RecordClass::from(4).to_string());
    }

    #[test]
    fn rcode_table_documented_codes() {
        assert_eq!("Success", rcode_message(0));
        assert_eq!("Non-Existent Domain", rcode_message(3));
        assert_eq!("Name not contained in zone", rcode_message(10));
        assert_eq!("TSIG Signature Failure", rcode_message(16));
        assert_eq!("Bad/missing server cookie", rcode_message(23));
    }

    #[test]
    fn rcode_table_gaps_and_out_of_range() {
        for rcode in 11..16 {
            assert_eq!("UNKNOWN ERROR", rcode_message(rcode));
        }
        assert_eq!("UNKNOWN ERROR", rcode_message(24));
        assert_eq!("UNKNOWN ERROR", rcode_message(u16::MAX));
    }

    #[test]
    fn identifier_defaults() {
        assert_eq!(
            Ok(QuestionSpec::new("example.com", RecordType::A, RecordClass::IN)),
            QuestionSpec::from_identifier("example.com")
        );
    }

    #[test]
    fn identifier_with_type() {
        assert_eq!(
            Ok(QuestionSpec::new("example.com", RecordType::MX, RecordClass::IN)),
            QuestionSpec::from_identifier("example.com:MX")
        );
    }

    #[test]
    fn identifier_with_type_and_class() {
        assert_eq!(
            Ok(QuestionSpec::new("example.com", RecordType::SRV, RecordClass::IN)),
            QuestionSpec::from_identifier("example.com:SRV:IN")
        );
    }

    #[test]
    fn identifier_unknown_type() {
        assert_eq!(
            Err(IdentifierError::UnknownRecordType("ZZZZ".to_string())),
            QuestionSpec::from_identifier("example.com:ZZZZ")
        );
    }

    #[test]
    fn identifier_unknown_class() {
        assert_eq!(
            Err(IdentifierError::UnknownRecordClass("XX".to_string())),
            QuestionSpec::from_identifier("example.com:A:XX")
        );
    }
}
