//! In-process activity journal.
//!
//! The liveness probe needs "did anything actually happen recently" as a
//! connectivity signal independent of what the transport library claims.
//! Rather than tailing the process log and parsing it back, the relay loop
//! records inbound/outbound events here and the probe scans the tail.
//! Entries are rendered as timestamped lines so the probe still works by
//! pattern match + embedded-timestamp parse.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const JOURNAL_CAP: usize = 256;

static INBOUND_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"inbound message\b").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Inbound,
    Outbound,
}

struct JournalInner {
    lines: VecDeque<String>,
    last_receive: Option<Instant>,
    last_send: Option<Instant>,
}

pub struct ActivityJournal {
    inner: Mutex<JournalInner>,
}

impl Default for ActivityJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityJournal {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(JournalInner {
                lines: VecDeque::with_capacity(JOURNAL_CAP),
                last_receive: None,
                last_send: None,
            }),
        }
    }

    pub fn record(&self, kind: ActivityKind, chat_id: &str) {
        let verb = match kind {
            ActivityKind::Inbound => "inbound message",
            ActivityKind::Outbound => "outbound message",
        };
        let line = format!("{} {} chat={}", Utc::now().to_rfc3339(), verb, chat_id);

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.lines.len() == JOURNAL_CAP {
            inner.lines.pop_front();
        }
        inner.lines.push_back(line);
        match kind {
            ActivityKind::Inbound => inner.last_receive = Some(Instant::now()),
            ActivityKind::Outbound => inner.last_send = Some(Instant::now()),
        }
    }

    /// True iff an inbound-activity line with a parseable timestamp appears
    /// in the journal tail within `window`.
    pub fn recent_inbound(&self, window: Duration) -> bool {
        let now = Utc::now();
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.lines.iter().rev().take(64).any(|line| {
            INBOUND_PATTERN.is_match(line)
                && parse_line_timestamp(line)
                    .map(|ts| age_within(now, ts, window))
                    .unwrap_or(false)
        })
    }

    /// True iff the last successful send happened within `window`.
    pub fn recent_outbound(&self, window: Duration) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .last_send
            .map(|at| at.elapsed() <= window)
            .unwrap_or(false)
    }

    /// Any activity at all (either direction) within `window`.
    pub fn recent_activity(&self, window: Duration) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let fresh = |at: Option<Instant>| at.map(|t| t.elapsed() <= window).unwrap_or(false);
        fresh(inner.last_send) || fresh(inner.last_receive)
    }

    /// Seconds since the most recent activity, if any.
    pub fn last_activity_secs_ago(&self) -> Option<u64> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        [inner.last_send, inner.last_receive]
            .into_iter()
            .flatten()
            .map(|at| at.elapsed().as_secs())
            .min()
    }
}

fn parse_line_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let stamp = line.split_whitespace().next()?;
    DateTime::parse_from_rfc3339(stamp)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn age_within(now: DateTime<Utc>, ts: DateTime<Utc>, window: Duration) -> bool {
    let age = now.signed_duration_since(ts);
    age >= chrono::Duration::zero() && age.to_std().map(|a| a <= window).unwrap_or(false)
}
