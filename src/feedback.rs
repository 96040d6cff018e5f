use crate::{
    error::{ClientError, ClientResult},
    transport::Transport,
};
use tracing::info;

/// One-shot feedback submission. No retry.
pub async fn send_feedback(transport: &dyn Transport, text: &str) -> ClientResult<serde_json::Value> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ClientError::validation("feedback is empty"));
    }
    let ack = transport
        .feedback(text)
        .await
        .map_err(ClientError::Feedback)?;
    info!("feedback submitted ({} chars)", text.chars().count());
    Ok(ack)
}
