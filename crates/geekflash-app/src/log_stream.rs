//! Log stream: ordered, clearable buffer of backend output
//!
//! Lines are appended in arrival order and never reordered or de-duplicated.
//! Each line gets a sequence number so followers can read incrementally with
//! [`LogStream::lines_since`]; a `watch` revision counter announces changes.
//! With a capacity set the buffer behaves as a ring, evicting the oldest lines.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use geekflash_backend::EventFeed;
use geekflash_core::prelude::*;
use geekflash_core::LogLine;

use crate::subscription::Subscription;

/// A buffered line and its position in the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedLine {
    /// Starts at 1 and is never reused, including across clears
    pub seq: u64,
    pub line: LogLine,
}

#[derive(Debug)]
struct Buffer {
    lines: VecDeque<SequencedLine>,
    next_seq: u64,
    capacity: Option<usize>,
}

impl Buffer {
    fn push(&mut self, line: LogLine) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.lines.push_back(SequencedLine { seq, line });
        if let Some(cap) = self.capacity {
            while self.lines.len() > cap {
                self.lines.pop_front();
            }
        }
    }
}

#[derive(Clone)]
struct Shared {
    buffer: Arc<Mutex<Buffer>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Shared {
    fn with_buffer<R>(&self, f: impl FnOnce(&mut Buffer) -> R) -> R {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut buffer)
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}

pub struct LogStream {
    shared: Shared,
    subscription: Mutex<Option<Subscription>>,
}

impl Default for LogStream {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LogStream {
    /// `capacity` of `None` keeps every line
    pub fn new(capacity: Option<usize>) -> Self {
        let (revision, _rx) = watch::channel(0);
        Self {
            shared: Shared {
                buffer: Arc::new(Mutex::new(Buffer {
                    lines: VecDeque::new(),
                    next_seq: 1,
                    capacity: capacity.filter(|c| *c > 0),
                })),
                revision: Arc::new(revision),
            },
            subscription: Mutex::new(None),
        }
    }

    /// Subscribe to `feed`. Returns `false` when already started.
    pub fn start(&self, feed: &EventFeed<LogLine>) -> bool {
        let mut slot = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            debug!("Log stream already started");
            return false;
        }

        let shared = self.shared.clone();
        *slot = Some(Subscription::spawn(feed.name(), feed.subscribe(), move |line| {
            shared.with_buffer(|b| b.push(line));
            shared.bump();
        }));
        true
    }

    /// Tear down the subscription; nothing is appended after this returns
    pub async fn shutdown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe().await;
        }
    }

    pub fn append(&self, line: LogLine) {
        self.shared.with_buffer(|b| b.push(line));
        self.shared.bump();
    }

    /// Empty the buffer. Local only; the backend is not told.
    pub fn clear(&self) {
        self.shared.with_buffer(|b| b.lines.clear());
        self.shared.bump();
    }

    pub fn snapshot(&self) -> Vec<LogLine> {
        self.shared
            .with_buffer(|b| b.lines.iter().map(|s| s.line.clone()).collect())
    }

    /// Buffered lines with a sequence number greater than `seq`
    pub fn lines_since(&self, seq: u64) -> Vec<SequencedLine> {
        self.shared.with_buffer(|b| {
            b.lines
                .iter()
                .filter(|s| s.seq > seq)
                .cloned()
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.shared.with_buffer(|b| b.lines.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter bumped on every append and clear
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geekflash_backend::EventBus;
    use std::time::Duration;

    fn contents(stream: &LogStream) -> Vec<String> {
        stream.snapshot().into_iter().map(|l| l.content).collect()
    }

    async fn wait_for_len(stream: &LogStream, len: usize) {
        let mut rx = stream.watch_revision();
        tokio::time::timeout(Duration::from_secs(2), async {
            while stream.len() < len {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_append_preserves_order_and_clear_empties() {
        let stream = LogStream::default();
        stream.append(LogLine::stdout("a"));
        stream.append(LogLine::stderr("b"));
        assert_eq!(contents(&stream), vec!["a", "b"]);

        stream.clear();
        assert!(stream.is_empty());

        stream.append(LogLine::stdout("c"));
        assert_eq!(contents(&stream), vec!["c"]);
    }

    #[test]
    fn test_sequence_numbers_survive_clear() {
        let stream = LogStream::default();
        stream.append(LogLine::stdout("a"));
        stream.append(LogLine::stdout("b"));
        let last = stream.lines_since(0).last().unwrap().seq;
        assert_eq!(last, 2);

        stream.clear();
        stream.append(LogLine::stdout("c"));

        let new = stream.lines_since(last);
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].seq, 3);
        assert_eq!(new[0].line.content, "c");
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let stream = LogStream::new(Some(3));
        for n in 0..5 {
            stream.append(LogLine::stdout(n.to_string()));
        }
        assert_eq!(contents(&stream), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let stream = LogStream::new(Some(0));
        for n in 0..10 {
            stream.append(LogLine::stdout(n.to_string()));
        }
        assert_eq!(stream.len(), 10);
    }

    #[tokio::test]
    async fn test_feed_lines_arrive_in_emission_order() {
        let bus = EventBus::new();
        let stream = LogStream::default();
        assert!(stream.start(&bus.log_lines));
        assert!(!stream.start(&bus.log_lines));

        bus.log_lines.emit(LogLine::stdout("one"));
        bus.log_lines.emit(LogLine::stderr("oops"));
        bus.log_lines.emit(LogLine::stdout("two"));
        wait_for_len(&stream, 3).await;

        let lines = stream.snapshot();
        assert_eq!(contents(&stream), vec!["one", "oops", "two"]);
        assert!(lines[1].is_error());

        stream.shutdown().await;
        bus.log_lines.emit(LogLine::stdout("late"));
        tokio::task::yield_now().await;
        assert_eq!(stream.len(), 3);
    }
}
