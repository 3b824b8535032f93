//! Issues `GET /estado` polls and decodes their responses.
//!
//! At most one poll is outstanding at any time. A tick that arrives while a
//! poll is in flight is skipped, not queued, so responses can never pile up
//! behind a slow service.

use crux_http::Http;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::capabilities::{HttpResult, ServiceRequest};
use crate::error::TransportError;
use crate::event::Event;
use crate::snapshot::Snapshot;

pub const SNAPSHOT_PATH: &str = "/estado";

/// Monotonic sequence number stamped on every issued poll.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PollSeq(pub u64);

impl PollSeq {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for PollSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    Issued(PollSeq),
    Skipped { outstanding: PollSeq },
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotClient {
    next_seq: PollSeq,
    outstanding: Option<PollSeq>,
    polls_issued: u64,
    polls_skipped: u64,
}

impl SnapshotClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next sequence number unless a poll is already in flight.
    pub fn begin_poll(&mut self) -> PollDecision {
        if let Some(outstanding) = self.outstanding {
            self.polls_skipped += 1;
            return PollDecision::Skipped { outstanding };
        }
        let seq = self.next_seq;
        self.next_seq = seq.next();
        self.outstanding = Some(seq);
        self.polls_issued += 1;
        PollDecision::Issued(seq)
    }

    /// Marks `seq` complete. Returns false when `seq` was not the poll in
    /// flight, which happens after a reset.
    pub fn finish_poll(&mut self, seq: PollSeq) -> bool {
        if self.outstanding == Some(seq) {
            self.outstanding = None;
            true
        } else {
            false
        }
    }

    /// Issues a poll through the HTTP capability. The shell's result comes
    /// back as [`Event::SnapshotFetched`] carrying the decoded snapshot or
    /// the transport failure.
    pub fn poll(&mut self, base: &Url, http: &Http<Event>) -> PollDecision {
        let decision = self.begin_poll();
        let PollDecision::Issued(seq) = decision else {
            return decision;
        };

        let sent = ServiceRequest::get(SNAPSHOT_PATH)
            .and_then(|r| r.with_header("Accept", "application/json"))
            .and_then(|r| {
                r.send(base, http, move |result| Event::SnapshotFetched {
                    poll: seq,
                    result: Box::new(Self::decode(result)),
                })
            });

        if let Err(err) = sent {
            tracing::error!(error = %err, poll = %seq, "failed to build snapshot request");
            self.outstanding = None;
        }
        decision
    }

    /// Maps a raw HTTP result to a snapshot. Any failure, including a body
    /// that does not parse, is a [`TransportError`].
    pub fn decode(result: HttpResult) -> Result<Snapshot, TransportError> {
        let response = result?;
        if !response.is_success() {
            return Err(TransportError::from_response(&response));
        }
        response.json::<Snapshot>().map_err(TransportError::from)
    }

    #[must_use]
    pub const fn is_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    #[must_use]
    pub const fn outstanding(&self) -> Option<PollSeq> {
        self.outstanding
    }

    /// The sequence number the next issued poll will carry.
    #[must_use]
    pub const fn next_seq(&self) -> PollSeq {
        self.next_seq
    }

    #[must_use]
    pub const fn polls_issued(&self) -> u64 {
        self.polls_issued
    }

    #[must_use]
    pub const fn polls_skipped(&self) -> u64 {
        self.polls_skipped
    }

    /// Forgets the in-flight poll. Sequence numbers keep increasing so a late
    /// response from before the reset still loses the staleness check.
    pub fn reset(&mut self) {
        self.outstanding = None;
    }
}
