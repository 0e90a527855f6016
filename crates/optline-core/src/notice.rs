// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! User-visible notices raised by effect handlers and the pipeline, queued
//! until the presentation layer drains them.

use std::collections::VecDeque;

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Informational note.
    Info,
    /// Something degraded but the operation went ahead.
    Warn,
    /// An operation was aborted.
    Error,
}

/// Identifier for a queued notice.
pub type NoticeId = u64;

/// A queued notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Stable identifier.
    pub id: NoticeId,
    /// Severity.
    pub kind: NoticeKind,
    /// Short title line.
    pub title: String,
    /// Optional details.
    pub body: Option<String>,
}

/// Bounded FIFO of pending notices. Identical pending notices are merged.
#[derive(Debug)]
pub struct NoticeQueue {
    pending: VecDeque<Notice>,
    max: usize,
    next_id: NoticeId,
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new(32)
    }
}

impl NoticeQueue {
    /// Create a queue holding at most `max` notices; the oldest is dropped on overflow.
    pub fn new(max: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            max: max.max(1),
            next_id: 1,
        }
    }

    /// Queue a notice, returning the id of the new or merged entry.
    pub fn push<S, B>(&mut self, kind: NoticeKind, title: S, body: B) -> NoticeId
    where
        S: Into<String>,
        B: Into<Option<String>>,
    {
        let title = title.into();
        let body = body.into();

        if let Some(existing) = self
            .pending
            .iter()
            .find(|n| n.kind == kind && n.title == title && n.body == body)
        {
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.pending.len() == self.max {
            self.pending.pop_front();
        }
        self.pending.push_back(Notice {
            id,
            kind,
            title,
            body,
        });
        id
    }

    /// Take up to `max` notices, oldest first.
    pub fn drain(&mut self, max: usize) -> Vec<Notice> {
        let take = max.min(self.pending.len());
        self.pending.drain(..take).collect()
    }

    /// Pending notices without removing them.
    pub fn pending(&self) -> impl Iterator<Item = &Notice> {
        self.pending.iter()
    }

    /// Number of pending notices.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_pending_notices_are_merged() {
        let mut q = NoticeQueue::new(8);
        let a = q.push(NoticeKind::Error, "stylesheet unreachable", None);
        let b = q.push(NoticeKind::Error, "stylesheet unreachable", None);
        assert_eq!(a, b);
        assert_eq!(q.len(), 1);

        q.drain(8);
        let c = q.push(NoticeKind::Error, "stylesheet unreachable", None);
        assert_ne!(a, c);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut q = NoticeQueue::new(2);
        q.push(NoticeKind::Info, "one", None);
        q.push(NoticeKind::Info, "two", None);
        q.push(NoticeKind::Info, "three", Some("body".to_owned()));
        let titles: Vec<_> = q.drain(10).into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["two", "three"]);
        assert!(q.is_empty());
    }

    #[test]
    fn drain_respects_limit() {
        let mut q = NoticeQueue::default();
        q.push(NoticeKind::Warn, "a", None);
        q.push(NoticeKind::Warn, "b", None);
        assert_eq!(q.drain(1).len(), 1);
        assert_eq!(q.len(), 1);
    }
}
