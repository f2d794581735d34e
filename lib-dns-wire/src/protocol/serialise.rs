//! Serialisation of DNS queries to the wire format.  See the `types`
//! module for details of the format.

use bytes::{BufMut, BytesMut};

use crate::protocol::types::*;

impl QuestionSpec {
    /// Encode a query message carrying this single question.
    ///
    /// The header is fixed: QR=0, OPCODE=0, RD=1, everything else
    /// zero, QDCOUNT=1.  The name is written as plain length-prefixed
    /// labels, never compressed.
    ///
    /// # Errors
    ///
    /// If the name does not fit the wire limits.
    pub fn encode(&self, id: u16) -> Result<BytesMut, Error> {
        let mut octets = BytesMut::with_capacity(12 + self.name.len() + 6);

        octets.put_u16(id);
        octets.put_u8(HEADER_MASK_RD);
        octets.put_u8(0);
        octets.put_u16(1); // QDCOUNT
        octets.put_u16(0); // ANCOUNT
        octets.put_u16(0); // NSCOUNT
        octets.put_u16(0); // ARCOUNT

        serialise_name(&mut octets, &self.name)?;
        octets.put_u16(u16::from(self.rtype));
        octets.put_u16(u16::from(self.rclass));

        Ok(octets)
    }
}

/// Write a dotted name as length-prefixed labels plus the zero-length
/// terminator.  A trailing root dot is accepted and ignored.
fn serialise_name(octets: &mut BytesMut, name: &str) -> Result<(), Error> {
    let start = octets.len();

    for label in name.split('.').filter(|l| !l.is_empty()) {
        if label.len() > LABEL_MAX_LEN {
            return Err(Error::LabelTooLong { length: label.len() });
        }
        // length is checked, the cast cannot truncate
        #[allow(clippy::cast_possible_truncation)]
        octets.put_u8(label.len() as u8);
        octets.put_slice(label.as_bytes());
    }
    octets.put_u8(0);

    let length = octets.len() - start;
    if length > DOMAINNAME_MAX_LEN {
        return Err(Error::NameTooLong { length });
    }

    Ok(())
}

/// Errors encountered when serialising a query.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// A label is over 63 octets.
    LabelTooLong { length: usize },

    /// The encoded name is over 255 octets.
    NameTooLong { length: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::LabelTooLong { length } => {
                write!(f, "label of {length} octets exceeds the 63-octet limit")
            }
            Error::NameTooLong { length } => {
                write!(f, "name of {length} octets exceeds the 255-octet limit")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
