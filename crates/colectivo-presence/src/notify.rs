//! Where user-facing notices go.

use colectivo_common::{Notice, NoticeBoard, NoticeLevel};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Receives toast notices about presence changes.
///
/// Sinks are consumers only; nothing they do feeds back into presence state.
pub trait NotificationSink {
    fn notify(&mut self, notice: Notice);
}

impl NotificationSink for NoticeBoard {
    fn notify(&mut self, notice: Notice) {
        self.push(notice);
    }
}

impl NotificationSink for Vec<Notice> {
    fn notify(&mut self, notice: Notice) {
        self.push(notice);
    }
}

/// Forwards notices to another task. A closed receiver drops them.
impl NotificationSink for mpsc::UnboundedSender<Notice> {
    fn notify(&mut self, notice: Notice) {
        let _ = self.send(notice);
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for Box<S> {
    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice);
    }
}

/// Writes notices to the log. Used when no other sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success | NoticeLevel::Info => {
                info!(title = %notice.title, body = %notice.body, "notice")
            }
            NoticeLevel::Warning => warn!(title = %notice.title, body = %notice.body, "notice"),
            NoticeLevel::Error => error!(title = %notice.title, body = %notice.body, "notice"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_sink_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink: Box<dyn NotificationSink + Send> = Box::new(tx);
        sink.notify(Notice::info("Driver available", "carla"));
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.title, "Driver available");
    }

    #[test]
    fn closed_channel_sink_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel::<Notice>();
        drop(rx);
        let mut sink = tx;
        sink.notify(Notice::error("Authentication failed", ""));
    }

    #[test]
    fn notice_board_sink_keeps_notices() {
        let mut board = NoticeBoard::new(4);
        board.notify(Notice::warning("Connection lost", "Reconnecting..."));
        assert_eq!(board.len(), 1);
    }
}
