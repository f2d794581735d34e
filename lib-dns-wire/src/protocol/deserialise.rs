//! Deserialisation of DNS messages from the network.  See the `types`
//! module for details of the format.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::protocol::types::*;

impl Message {
    /// Decode a complete DNS message.
    ///
    /// The transaction ID and all header flags other than the rcode
    /// are consumed but deliberately not surfaced: response pairing
    /// happens a layer up, and the flag bits have no consumer here.
    /// The header counts only bound the parse loops; the buckets in
    /// the result reflect what was actually parsed.
    ///
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        if octets.len() < 10 {
            return Err(Error::HeaderTooShort);
        }

        let mut cursor = Cursor::new(octets);

        let _id = cursor.read_u16().ok_or(Error::HeaderTooShort)?;
        let _flags1 = cursor.read_u8().ok_or(Error::HeaderTooShort)?;
        let flags2 = cursor.read_u8().ok_or(Error::HeaderTooShort)?;
        let rcode = u16::from(flags2 & HEADER_MASK_RCODE);

        let qdcount = cursor.read_u16().ok_or(Error::HeaderTooShort)?;
        let ancount = cursor.read_u16().ok_or(Error::HeaderTooShort)?;
        let nscount = cursor.read_u16().ok_or(Error::HeaderTooShort)?;
        let arcount = cursor.read_u16().ok_or(Error::HeaderTooShort)?;

        let mut questions = Vec::with_capacity(qdcount.into());
        for _ in 0..qdcount {
            questions.push(QuestionRecord::deserialise(&mut cursor)?);
        }

        // answer, authority, and additional records all share one
        // format and land in the same per-type buckets
        let mut records = HashMap::new();
        let rrcount = usize::from(ancount) + usize::from(nscount) + usize::from(arcount);
        for _ in 0..rrcount {
            let rr = ResourceRecord::deserialise(&mut cursor)?;
            records
                .entry(rr.rtype())
                .or_insert_with(Vec::new)
                .push(rr);
        }

        Ok(Self {
            status: Status::from_rcode(rcode),
            questions,
            records,
        })
    }
}

impl QuestionRecord {
    /// # Errors
    ///
    /// If the question cannot be parsed.
    pub fn deserialise(cursor: &mut Cursor) -> Result<Self, Error> {
        let name = deserialise_name(cursor)?;
        let rtype = RecordType::from(cursor.read_u16().ok_or(Error::QuestionTooShort)?);
        let rclass = RecordClass::from(cursor.read_u16().ok_or(Error::QuestionTooShort)?);

        Ok(Self {
            name,
            rtype,
            rclass,
        })
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the record cannot be parsed.
    pub fn deserialise(cursor: &mut Cursor) -> Result<Self, Error> {
        let name = deserialise_name(cursor)?;
        let rtype = RecordType::from(cursor.read_u16().ok_or(Error::ResourceRecordTooShort)?);
        let rclass = RecordClass::from(cursor.read_u16().ok_or(Error::ResourceRecordTooShort)?);
        let mut ttl = cursor.read_u32().ok_or(Error::ResourceRecordTooShort)?;
        let rdlength = cursor.read_u16().ok_or(Error::ResourceRecordTooShort)?;

        let rdata_start = cursor.position();
        let rdata_end = rdata_start + usize::from(rdlength);

        // A single-zero-octet A/AAAA payload is a negative answer
        // placeholder: no address, and the ttl on the wire is
        // overridden with a short one.
        let data = match rtype {
            RecordType::A | RecordType::AAAA if rdlength == 1 => {
                let octet = cursor.read_u8().ok_or(Error::ResourceRecordTooShort)?;
                if octet != 0 {
                    return Err(Error::ResourceRecordInvalid);
                }
                ttl = 5;
                if rtype == RecordType::A {
                    RecordData::A { ip: None }
                } else {
                    RecordData::AAAA { ip: None }
                }
            }
            RecordType::A => RecordData::A {
                ip: Some(Ipv4Addr::from(
                    cursor.read_u32().ok_or(Error::ResourceRecordTooShort)?,
                )),
            },
            RecordType::AAAA => {
                let mut segments = [0u16; 8];
                for segment in &mut segments {
                    *segment = cursor.read_u16().ok_or(Error::ResourceRecordTooShort)?;
                }
                RecordData::AAAA {
                    ip: Some(Ipv6Addr::from(segments)),
                }
            }
            RecordType::NS => RecordData::NS {
                ns: deserialise_name(cursor)?,
            },
            RecordType::CNAME => RecordData::CNAME {
                cname: deserialise_name(cursor)?,
            },
            RecordType::SOA => RecordData::SOA {
                mname: deserialise_name(cursor)?,
                rname: deserialise_name(cursor)?,
                serial: cursor.read_u32().ok_or(Error::ResourceRecordTooShort)?,
                refresh: cursor.read_u32().ok_or(Error::ResourceRecordTooShort)?,
                retry: cursor.read_u32().ok_or(Error::ResourceRecordTooShort)?,
                expire: cursor.read_u32().ok_or(Error::ResourceRecordTooShort)?,
                nx: cursor.read_u32().ok_or(Error::ResourceRecordTooShort)?,
            },
            RecordType::MX => RecordData::MX {
                preference: cursor.read_u16().ok_or(Error::ResourceRecordTooShort)?,
                exchange: deserialise_name(cursor)?,
            },
            RecordType::TXT => {
                // one or more length-prefixed character-strings; the
                // length byte is always consumed, so the remainder
                // shrinks on every round and the loop terminates
                let mut text = String::new();
                while cursor.position() < rdata_end {
                    let len = cursor.read_u8().ok_or(Error::ResourceRecordTooShort)?;
                    let available = rdata_end - cursor.position();
                    let chunk = cursor
                        .take(usize::from(len).min(available))
                        .ok_or(Error::ResourceRecordTooShort)?;
                    text.push_str(&String::from_utf8_lossy(chunk));
                }
                RecordData::TXT { text }
            }
            RecordType::SRV => RecordData::SRV {
                priority: cursor.read_u16().ok_or(Error::ResourceRecordTooShort)?,
                weight: cursor.read_u16().ok_or(Error::ResourceRecordTooShort)?,
                port: cursor.read_u16().ok_or(Error::ResourceRecordTooShort)?,
                target: deserialise_name(cursor)?,
            },
            RecordType::Unknown(tag) => {
                cursor
                    .take(usize::from(rdlength))
                    .ok_or(Error::ResourceRecordTooShort)?;
                RecordData::Unknown { tag }
            }
        };

        if cursor.position() == rdata_end {
            Ok(Self {
                name,
                rclass,
                ttl,
                data,
            })
        } else {
            Err(Error::ResourceRecordInvalid)
        }
    }
}

/// Parse a domain name into its dotted form, without the trailing
/// root dot.  Labels are lowercased.
///
/// A label length octet with the top two bits set introduces a
/// compression pointer instead: its low 14 bits are an offset into
/// the full original message at which the rest of the name continues.
/// The pointer must point strictly earlier than the name being parsed
/// (RFC 1035 section 4.1.4 requires an earlier occurrence), which
/// also rules out pointer loops.
///
/// # Errors
///
/// If the name cannot be parsed.
pub fn deserialise_name(cursor: &mut Cursor) -> Result<String, Error> {
    let mut name = String::with_capacity(DOMAINNAME_MAX_LEN);
    let mut encoded_len = 0;
    let start = cursor.position();

    loop {
        let size = cursor.read_u8().ok_or(Error::NameTooShort)?;

        if size == 0 {
            break;
        } else if usize::from(size) <= LABEL_MAX_LEN {
            encoded_len += 1 + usize::from(size);
            if encoded_len > DOMAINNAME_MAX_LEN {
                return Err(Error::NameTooLong);
            }

            let label = cursor
                .take(usize::from(size))
                .ok_or(Error::NameTooShort)?;
            if !name.is_empty() {
                name.push('.');
            }
            for octet in label {
                name.push(octet.to_ascii_lowercase() as char);
            }
        } else if size >= 192 {
            let hi = size & 0b0011_1111;
            let lo = cursor.read_u8().ok_or(Error::NameTooShort)?;
            let offset = usize::from(u16::from_be_bytes([hi, lo]));

            if offset >= start {
                return Err(Error::NamePointerInvalid);
            }

            // the rest of the name is decoded against the original
            // buffer; only the two pointer octets are consumed here
            let rest = deserialise_name(&mut cursor.at_offset(offset))?;
            if !rest.is_empty() {
                if !name.is_empty() {
                    name.push('.');
                }
                name.push_str(&rest);
            }
            break;
        } else {
            return Err(Error::NameLabelInvalid);
        }
    }

    // `encoded_len` only counts labels read through the local cursor;
    // a pointer splices in a suffix of any length, so the assembled
    // name is re-checked as a whole
    if name.len() + 1 > DOMAINNAME_MAX_LEN {
        return Err(Error::NameTooLong);
    }

    Ok(name)
}

/// Errors encountered when parsing a message.  They are all shades of
/// the same condition: the octets do not form a valid message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// The header is missing one or more required fields.
    HeaderTooShort,

    /// A question ends with an incomplete field.
    QuestionTooShort,

    /// A resource record ends with an incomplete field.
    ResourceRecordTooShort,

    /// A resource record payload does not match its declared length
    /// or shape.
    ResourceRecordInvalid,

    /// A domain name is incomplete.
    NameTooShort,

    /// A domain name is over 255 octets in size.
    NameTooLong,

    /// A compression pointer points at or after the name it occurs in.
    NamePointerInvalid,

    /// A label length octet is over 63 but is not a pointer.
    NameLabelInvalid,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::HeaderTooShort => write!(f, "header too short"),
            Error::QuestionTooShort => write!(f, "question too short"),
            Error::ResourceRecordTooShort => write!(f, "resource record too short"),
            Error::ResourceRecordInvalid => write!(f, "resource record invalid"),
            Error::NameTooShort => write!(f, "name too short"),
            Error::NameTooLong => write!(f, "name too long"),
            Error::NamePointerInvalid => write!(f, "name compression pointer invalid"),
            Error::NameLabelInvalid => write!(f, "name label invalid"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A read cursor over an immutable buffer.  Every read consumes
/// exactly the octets of the field it decodes; `at_offset` gives a
/// second cursor into the same buffer for compression pointers.
pub struct Cursor<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self { octets, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let octet = *self.octets.get(self.position)?;
        self.position += 1;
        Some(octet)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        let slice = self.take(2)?;
        Some(u16::from_be_bytes([slice[0], slice[1]]))
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        let slice = self.take(4)?;
        Some(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        let slice = self.octets.get(self.position..self.position + size)?;
        self.position += size;
        Some(slice)
    }

    pub fn at_offset(&self, position: usize) -> Cursor<'a> {
        Self {
            octets: self.octets,
            position,
        }
    }
}
