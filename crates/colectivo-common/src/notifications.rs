use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Severity of a toast notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    /// How long a notice of this level stays visible.
    pub fn ttl(self) -> Duration {
        match self {
            NoticeLevel::Success | NoticeLevel::Info => Duration::from_secs(3),
            NoticeLevel::Warning => Duration::from_secs(5),
            NoticeLevel::Error => Duration::from_secs(6),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoticeLevel::Success => "success",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

/// A short-lived user-facing message ("toast").
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
            created_at: Instant::now(),
            ttl: level.ttl(),
        }
    }

    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title, body)
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title, body)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, title, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, body)
    }

    /// Returns `true` if this notice has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// Bounded stack of visible notices; expired entries are evicted lazily.
#[derive(Debug)]
pub struct NoticeBoard {
    items: VecDeque<Notice>,
    capacity: usize,
}

impl NoticeBoard {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes a notice, evicting expired entries first.
    /// If still at capacity after eviction, the oldest entry is dropped.
    pub fn push(&mut self, notice: Notice) {
        self.evict_expired();
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(notice);
    }

    /// Returns all currently visible (non-expired) notices, oldest first.
    pub fn visible(&mut self) -> Vec<&Notice> {
        self.evict_expired();
        self.items.iter().collect()
    }

    /// Removes and returns every notice, expired or not.
    pub fn drain(&mut self) -> Vec<Notice> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn evict_expired(&mut self) {
        self.items.retain(|n| !n.is_expired());
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_depends_on_level() {
        assert_eq!(Notice::success("a", "b").ttl, Duration::from_secs(3));
        assert_eq!(Notice::info("a", "b").ttl, Duration::from_secs(3));
        assert_eq!(Notice::warning("a", "b").ttl, Duration::from_secs(5));
        assert_eq!(Notice::error("a", "b").ttl, Duration::from_secs(6));
    }

    #[test]
    fn board_drops_oldest_at_capacity() {
        let mut board = NoticeBoard::new(2);
        board.push(Notice::info("first", ""));
        board.push(Notice::info("second", ""));
        board.push(Notice::info("third", ""));

        let titles: Vec<_> = board.visible().iter().map(|n| n.title.clone()).collect();
        assert_eq!(titles, vec!["second", "third"]);
    }

    #[test]
    fn board_evicts_expired_notices() {
        let mut board = NoticeBoard::new(4);
        let mut stale = Notice::warning("Connection lost", "");
        stale.ttl = Duration::ZERO;
        board.push(stale);
        board.push(Notice::info("New passenger waiting", "ana"));

        let visible = board.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "New passenger waiting");
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut board = NoticeBoard::new(0);
        board.push(Notice::info("only", ""));
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn drain_empties_board() {
        let mut board = NoticeBoard::default();
        board.push(Notice::success("Reconnected", ""));
        let drained = board.drain();
        assert_eq!(drained.len(), 1);
        assert!(board.is_empty());
    }
}
