//! The request/response correlator: one long-lived connection that
//! encodes outgoing queries, frames them for its transport, and pairs
//! decoded inbound messages with the callers waiting on them.

use std::collections::VecDeque;
use std::fmt;

use bytes::{BufMut, BytesMut};
use tokio::sync::oneshot;

use dns_wire::protocol::serialise;
use dns_wire::protocol::types::{IdentifierError, Message, QuestionSpec};

use crate::framing::StreamFramer;
use crate::transport::{Transport, TransportKind};

/// How inbound responses are paired with pending queries.
///
/// The default pairs purely by order: the first response on the
/// connection answers the first query, regardless of the wire
/// transaction ID.  On a datagram
/// transport that reorders or duplicates, FIFO pairing can hand a
/// response to the wrong caller; `TransactionId` pairs by the ID in
/// the first two octets of the frame instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum MatchStrategy {
    #[default]
    Fifo,
    TransactionId,
}

/// Why a query produced no response.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum QueryError {
    /// The record type string has no entry in the lookup table.
    UnknownRecordType(String),

    /// The record class string has no entry in the lookup table.
    UnknownRecordClass(String),

    /// The name cannot be encoded (label or name over the wire
    /// limits).
    InvalidName(serialise::Error),

    /// The connection closed or errored before a response arrived.
    TransportFailure,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryError::UnknownRecordType(s) => write!(f, "unknown record type '{s}'"),
            QueryError::UnknownRecordClass(s) => write!(f, "unknown record class '{s}'"),
            QueryError::InvalidName(err) => write!(f, "invalid name: {err}"),
            QueryError::TransportFailure => write!(f, "connection failed before a response"),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::InvalidName(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IdentifierError> for QueryError {
    fn from(err: IdentifierError) -> Self {
        match err {
            IdentifierError::UnknownRecordType(s) => QueryError::UnknownRecordType(s),
            IdentifierError::UnknownRecordClass(s) => QueryError::UnknownRecordClass(s),
        }
    }
}

pub type QueryResult = Result<Message, QueryError>;

/// Resolves once the matching response is decoded, or with a
/// `QueryError` if it never will be.
pub type ResponseHandle = oneshot::Receiver<QueryResult>;

struct Pending {
    id: u16,
    tx: oneshot::Sender<QueryResult>,
}

/// A single client connection over one transport.
///
/// Not for concurrent use: the host must serialise `query` calls and
/// inbound-data events, which the usual one-task-per-connection setup
/// does naturally.
pub struct Connection<T: Transport> {
    transport: T,
    seq: u16,
    pending: VecDeque<Pending>,
    framer: StreamFramer,
    strategy: MatchStrategy,
    keepalive: bool,
    free: bool,
    closed: bool,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            seq: 0,
            pending: VecDeque::new(),
            framer: StreamFramer::new(),
            strategy: MatchStrategy::Fifo,
            keepalive: false,
            free: true,
            closed: false,
        }
    }

    /// Keep the connection open after a response so a pool can reuse
    /// it.  Off by default: one query, one response, done.
    pub fn set_keepalive(&mut self, keepalive: bool) {
        self.keepalive = keepalive;
    }

    pub fn set_match_strategy(&mut self, strategy: MatchStrategy) {
        self.strategy = strategy;
    }

    /// Whether a pool may hand this connection a new query.
    pub fn is_free(&self) -> bool {
        self.free && !self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Issue a query for a `name[:type[:class]]` identifier (type
    /// defaults to `A`, class to `IN`).
    ///
    /// The returned handle resolves when the matching response
    /// arrives.  If the identifier does not resolve through the
    /// type/class tables, or the connection is already closed, the
    /// handle resolves immediately with the failure and nothing is
    /// written to the transport.
    pub async fn query(&mut self, identifier: &str) -> ResponseHandle {
        let (tx, rx) = oneshot::channel();

        if self.closed {
            let _ = tx.send(Err(QueryError::TransportFailure));
            return rx;
        }

        let spec = match QuestionSpec::from_identifier(identifier) {
            Ok(spec) => spec,
            Err(err) => {
                let _ = tx.send(Err(err.into()));
                return rx;
            }
        };

        // used only as the wire ID, never for matching (see
        // `MatchStrategy`); wraps silently
        self.seq = self.seq.wrapping_add(1);
        let id = self.seq;

        let octets = match spec.encode(id) {
            Ok(octets) => octets,
            Err(err) => {
                let _ = tx.send(Err(QueryError::InvalidName(err)));
                return rx;
            }
        };

        self.free = false;
        self.pending.push_back(Pending { id, tx });

        let written = match self.transport.kind() {
            TransportKind::Stream => {
                let mut framed = BytesMut::with_capacity(octets.len() + 2);
                // encode() caps the name length, so the message
                // always fits in the u16 prefix
                framed.put_u16(u16::try_from(octets.len()).unwrap_or(u16::MAX));
                framed.extend_from_slice(&octets);
                self.transport.send(&framed).await
            }
            TransportKind::Datagram => self.transport.send(&octets).await,
        };

        if let Err(err) = written {
            tracing::debug!(%err, "query write failed, tearing down");
            self.teardown();
        }

        rx
    }

    /// Feed inbound octets from the transport's read side.  Complete
    /// messages are decoded and dispatched to pending handles; on a
    /// stream transport, octets are buffered until a frame completes.
    pub fn handle_input(&mut self, octets: &[u8]) {
        match self.transport.kind() {
            TransportKind::Datagram => self.dispatch_frame(octets),
            TransportKind::Stream => {
                self.framer.push(octets);
                while let Some(frame) = self.framer.next_frame() {
                    self.dispatch_frame(&frame);
                    if self.closed {
                        break;
                    }
                }
            }
        }
    }

    /// The transport has closed, cleanly or not.  Every caller still
    /// waiting is failed, in submission order.
    pub fn handle_close(&mut self) {
        self.teardown();
    }

    fn dispatch_frame(&mut self, frame: &[u8]) {
        let message = match Message::from_octets(frame) {
            Ok(message) => message,
            Err(err) => {
                // a message we cannot decode answers nobody; the
                // caller it was meant for fails at teardown
                tracing::debug!(%err, "discarding malformed message");
                return;
            }
        };

        let pending = match self.strategy {
            MatchStrategy::Fifo => self.pending.pop_front(),
            MatchStrategy::TransactionId => {
                // the codec discards the ID, so take it from the raw
                // frame; decode guarantees at least a full header
                let id = u16::from_be_bytes([frame[0], frame[1]]);
                self.pending
                    .iter()
                    .position(|p| p.id == id)
                    .and_then(|index| self.pending.remove(index))
            }
        };

        match pending {
            Some(p) => {
                let _ = p.tx.send(Ok(message));
            }
            None => tracing::debug!("response with no pending query"),
        }

        if self.keepalive {
            if self.pending.is_empty() {
                self.free = true;
            }
        } else {
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        self.closed = true;
        self.free = false;
        while let Some(p) = self.pending.pop_front() {
            let _ = p.tx.send(Err(QueryError::TransportFailure));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::io;
    use std::sync::{Arc, Mutex};

    use dns_wire::protocol::types::{RecordClass, RecordType};

    struct MockTransport {
        kind: TransportKind,
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl MockTransport {
        fn new(kind: TransportKind) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
            let writes = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    kind,
                    writes: writes.clone(),
                },
                writes,
            )
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn kind(&self) -> TransportKind {
            self.kind
        }

        async fn send(&mut self, octets: &[u8]) -> io::Result<()> {
            self.writes.lock().unwrap().push(octets.to_vec());
            Ok(())
        }
    }

    // succeeds for the first `remaining` sends, then errors
    struct FailingAfter {
        remaining: usize,
    }

    #[async_trait]
    impl Transport for FailingAfter {
        fn kind(&self) -> TransportKind {
            TransportKind::Datagram
        }

        async fn send(&mut self, _octets: &[u8]) -> io::Result<()> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            self.remaining -= 1;
            Ok(())
        }
    }

    fn datagram_connection() -> (Connection<MockTransport>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let (transport, writes) = MockTransport::new(TransportKind::Datagram);
        (Connection::new(transport), writes)
    }

    fn stream_connection() -> (Connection<MockTransport>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let (transport, writes) = MockTransport::new(TransportKind::Stream);
        (Connection::new(transport), writes)
    }

    // a query message is decodable as a response with rcode 0, which
    // is all the dispatch path needs
    fn response_octets(name: &str, id: u16) -> Vec<u8> {
        QuestionSpec::new(name, RecordType::A, RecordClass::IN)
            .encode(id)
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn fifo_pairs_responses_in_submission_order() {
        let (mut conn, _) = datagram_connection();
        conn.set_keepalive(true);

        let rx_a = conn.query("a.example.com").await;
        let rx_b = conn.query("b.example.com").await;

        // responses arrive with IDs that contradict submission order;
        // FIFO pairing ignores them
        conn.handle_input(&response_octets("first.example.com", 9999));
        conn.handle_input(&response_octets("second.example.com", 1));

        let message_a = rx_a.await.unwrap().unwrap();
        let message_b = rx_b.await.unwrap().unwrap();

        assert_eq!("first.example.com", message_a.questions[0].name);
        assert_eq!("second.example.com", message_b.questions[0].name);
    }

    #[tokio::test]
    async fn transaction_id_strategy_pairs_by_wire_id() {
        let (mut conn, _) = datagram_connection();
        conn.set_keepalive(true);
        conn.set_match_strategy(MatchStrategy::TransactionId);

        // the sequence counter starts at 0, so queries get IDs 1, 2
        let rx_a = conn.query("a.example.com").await;
        let rx_b = conn.query("b.example.com").await;

        conn.handle_input(&response_octets("for-b.example.com", 2));

        let message_b = rx_b.await.unwrap().unwrap();
        assert_eq!("for-b.example.com", message_b.questions[0].name);

        conn.handle_input(&response_octets("for-a.example.com", 1));

        let message_a = rx_a.await.unwrap().unwrap();
        assert_eq!("for-a.example.com", message_a.questions[0].name);
    }

    #[tokio::test]
    async fn teardown_drains_pending_in_submission_order() {
        let (mut conn, _) = datagram_connection();

        let rx_a = conn.query("a.example.com").await;
        let rx_b = conn.query("b.example.com").await;

        conn.handle_close();

        assert_eq!(Err(QueryError::TransportFailure), rx_a.await.unwrap());
        assert_eq!(Err(QueryError::TransportFailure), rx_b.await.unwrap());
        assert!(conn.is_closed());
        assert!(!conn.is_free());
    }

    #[tokio::test]
    async fn unknown_type_fails_immediately_with_no_write() {
        let (mut conn, writes) = datagram_connection();

        let rx = conn.query("example.com:ZZZZ").await;

        assert_eq!(
            Err(QueryError::UnknownRecordType("ZZZZ".to_string())),
            rx.await.unwrap()
        );
        assert!(writes.lock().unwrap().is_empty());
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn unknown_class_fails_immediately_with_no_write() {
        let (mut conn, writes) = datagram_connection();

        let rx = conn.query("example.com:A:XX").await;

        assert_eq!(
            Err(QueryError::UnknownRecordClass("XX".to_string())),
            rx.await.unwrap()
        );
        assert!(writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn datagram_write_is_a_raw_message() {
        let (mut conn, writes) = datagram_connection();

        let _rx = conn.query("example.com:MX").await;

        let writes = writes.lock().unwrap();
        assert_eq!(1, writes.len());

        let decoded = Message::from_octets(&writes[0]).unwrap();
        assert_eq!("example.com", decoded.questions[0].name);
        assert_eq!(RecordType::MX, decoded.questions[0].rtype);
    }

    #[tokio::test]
    async fn stream_write_is_length_prefixed() {
        let (mut conn, writes) = stream_connection();

        let _rx = conn.query("example.com").await;

        let writes = writes.lock().unwrap();
        assert_eq!(1, writes.len());

        let declared = usize::from(u16::from_be_bytes([writes[0][0], writes[0][1]]));
        assert_eq!(writes[0].len() - 2, declared);
        assert!(Message::from_octets(&writes[0][2..]).is_ok());
    }

    #[tokio::test]
    async fn stream_response_arriving_byte_by_byte() {
        let (mut conn, _) = stream_connection();
        conn.set_keepalive(true);

        let mut rx = conn.query("example.com").await;

        let payload = response_octets("example.com", 1);
        let mut framed = Vec::with_capacity(payload.len() + 2);
        framed.extend_from_slice(&u16::try_from(payload.len()).unwrap().to_be_bytes());
        framed.extend_from_slice(&payload);

        for octet in framed {
            assert!(rx.try_recv().is_err());
            conn.handle_input(&[octet]);
        }

        assert!(rx.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn non_keepalive_connection_closes_after_dispatch() {
        let (mut conn, _) = datagram_connection();

        let rx_a = conn.query("a.example.com").await;
        let rx_b = conn.query("b.example.com").await;

        conn.handle_input(&response_octets("a.example.com", 1));

        assert!(rx_a.await.unwrap().is_ok());
        assert!(conn.is_closed());
        // the connection died with b still pending
        assert_eq!(Err(QueryError::TransportFailure), rx_b.await.unwrap());
    }

    #[tokio::test]
    async fn keepalive_connection_becomes_free_when_drained() {
        let (mut conn, _) = datagram_connection();
        conn.set_keepalive(true);

        let rx = conn.query("example.com").await;
        assert!(!conn.is_free());

        conn.handle_input(&response_octets("example.com", 1));

        assert!(rx.await.unwrap().is_ok());
        assert!(conn.is_free());
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn malformed_message_is_discarded_quietly() {
        let (mut conn, _) = datagram_connection();
        conn.set_keepalive(true);

        let mut rx = conn.query("example.com").await;

        conn.handle_input(&[0xde, 0xad, 0xbe]);

        // still waiting: the bad message answered nobody
        assert!(rx.try_recv().is_err());
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn write_failure_tears_down_and_drains_pending() {
        let mut conn = Connection::new(FailingAfter { remaining: 1 });
        conn.set_keepalive(true);

        let rx_a = conn.query("a.example.com").await;
        assert!(!conn.is_closed());

        // this write fails; both the new query and the one already
        // pending are drained
        let rx_b = conn.query("b.example.com").await;

        assert_eq!(Err(QueryError::TransportFailure), rx_a.await.unwrap());
        assert_eq!(Err(QueryError::TransportFailure), rx_b.await.unwrap());
        assert!(conn.is_closed());
        assert!(!conn.is_free());
    }

    #[tokio::test]
    async fn query_after_teardown_fails_immediately() {
        let (mut conn, writes) = datagram_connection();
        conn.handle_close();

        let rx = conn.query("example.com").await;

        assert_eq!(Err(QueryError::TransportFailure), rx.await.unwrap());
        assert!(writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sequence_counter_wraps_silently() {
        let (mut conn, writes) = datagram_connection();
        conn.seq = u16::MAX;

        let _rx = conn.query("example.com").await;

        let writes = writes.lock().unwrap();
        assert_eq!([0, 0], writes[0][0..2]);
    }
}
