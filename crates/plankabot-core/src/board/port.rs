use async_trait::async_trait;

use crate::{
    board::types::{ActivityPage, Attachment, Board, Card, CardDetails, Task, TaskList},
    Result,
};

/// Hexagonal port for the kanban service.
///
/// Errors follow the core taxonomy: `Error::Auth` for rejected credentials,
/// `Error::NotFound` for missing resources, `Error::Api` for everything else
/// (transport, timeout, unexpected status, malformed body).
#[async_trait]
pub trait BoardPort: Send + Sync {
    async fn list_boards(&self) -> Result<Vec<Board>>;

    /// Create a card at the top of `list_id`.
    async fn create_card(&self, list_id: &str, name: &str, card_type: &str) -> Result<Card>;

    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>>;

    /// `None` when the card does not exist.
    async fn get_card(&self, card_id: &str) -> Result<Option<CardDetails>>;

    /// See `POSITION_TOP` / `POSITION_END` for the conventional positions.
    async fn move_card(&self, card_id: &str, list_id: &str, position: f64) -> Result<Card>;

    async fn create_task_list(&self, card_id: &str, name: &str) -> Result<TaskList>;

    async fn create_task(&self, task_list_id: &str, name: &str, position: f64) -> Result<Task>;

    async fn create_attachment(
        &self,
        card_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Attachment>;

    /// Best-effort download; `None` on any failure.
    async fn download_attachment(&self, attachment_id: &str) -> Option<Vec<u8>>;

    /// Newest-first page of board actions, optionally older than `before_id`.
    async fn activity_feed(&self, board_id: &str, before_id: Option<&str>)
        -> Result<ActivityPage>;
}
