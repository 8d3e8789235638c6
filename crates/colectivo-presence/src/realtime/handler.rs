//! Incoming text frame handling.

use tracing::debug;

use super::subscription::ChannelShared;
use super::types::Envelope;

/// Decode one text frame and hand it to the subscribers.
///
/// Frames that are not a JSON envelope are skipped; they never end the session.
pub(crate) fn handle_text_frame(text: &str, shared: &ChannelShared, epoch: u64) {
    match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => {
            debug!(event = %envelope.event, "Frame received");
            shared.dispatch_message(epoch, &envelope.event, &envelope.data);
        }
        Err(e) => {
            debug!(error = %e, len = text.len(), "Unrecognized frame from presence server");
        }
    }
}
