//! Writing outcome records to the project board.

use dupewatch_store::{BoardSchema, FieldValue, ProjectBoard, StoreError, StoreResult};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::outcome::OutcomeRecord;

pub const OUTCOME_FIELD: &str = "Outcome";
pub const STATUS_FIELD: &str = "Status";
pub const CLOSED_AS_FIELD: &str = "Closed as";
pub const NOTES_FIELD: &str = "Notes";
pub const BOT_VERSION_FIELD: &str = "Bot version";

/// Board schema fetched at most once per run.
#[derive(Debug, Default)]
pub struct BoardSchemaCache {
    cell: OnceCell<BoardSchema>,
}

impl BoardSchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get<B>(&self, board: &B) -> StoreResult<&BoardSchema>
    where
        B: ProjectBoard + ?Sized,
    {
        self.cell
            .get_or_try_init(|| async {
                let schema = board.fetch_schema().await?;
                info!("Project config loaded: {} fields", schema.fields.len());
                Ok::<_, StoreError>(schema)
            })
            .await
    }
}

/// Idempotent upserts of outcome records onto one board.
pub struct BoardSync<'a, B: ?Sized> {
    board: &'a B,
    schema: BoardSchemaCache,
}

impl<'a, B> BoardSync<'a, B>
where
    B: ProjectBoard + ?Sized,
{
    pub fn new(board: &'a B) -> Self {
        BoardSync {
            board,
            schema: BoardSchemaCache::new(),
        }
    }

    /// Whether the issue already has an item on the board.
    pub async fn is_on_board(&self, issue_node_id: &str) -> Result<bool> {
        Ok(self.board.find_item(issue_node_id).await?.is_some())
    }

    /// Add the issue if absent, then write every field of `record`.
    ///
    /// Returns the board item id.
    pub async fn upsert(&self, issue_node_id: &str, record: &OutcomeRecord) -> Result<String> {
        let schema = self.schema.get(self.board).await?;

        let item_id = match self.board.find_item(issue_node_id).await? {
            Some(item_id) => {
                info!("Issue already on board, updating (item {})", item_id);
                item_id
            }
            None => {
                let item_id = self.board.add_item(&schema.project_id, issue_node_id).await?;
                info!("Added to project board (item {})", item_id);
                item_id
            }
        };

        self.set_field(schema, &item_id, OUTCOME_FIELD, record.outcome.label())
            .await?;
        self.set_field(schema, &item_id, STATUS_FIELD, record.status.label())
            .await?;
        if let Some(reason) = record.closed_as.filter(|r| r.is_recordable()) {
            self.set_field(schema, &item_id, CLOSED_AS_FIELD, reason.as_str())
                .await?;
        }
        if let Some(notes) = &record.notes {
            self.set_field(schema, &item_id, NOTES_FIELD, notes).await?;
        }
        if let Some(version) = &record.bot_version {
            self.set_field(schema, &item_id, BOT_VERSION_FIELD, version)
                .await?;
        }

        Ok(item_id)
    }

    /// Unknown fields and options are skipped with a warning.
    async fn set_field(
        &self,
        schema: &BoardSchema,
        item_id: &str,
        field_name: &str,
        value: &str,
    ) -> Result<()> {
        let Some(field) = schema.fields.get(field_name) else {
            warn!("Field '{}' not found on project board", field_name);
            return Ok(());
        };

        let field_value = match &field.options {
            Some(options) => match options.get(value) {
                Some(option_id) => FieldValue::SingleSelectOption(option_id.clone()),
                None => {
                    warn!("Option '{}' not found for field '{}'", value, field_name);
                    return Ok(());
                }
            },
            None => FieldValue::Text(value.to_string()),
        };

        debug!("Setting {} = {} on item {}", field_name, value, item_id);
        self.board
            .set_field(&schema.project_id, item_id, &field.id, &field_value)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dupewatch_store::fakes::MemoryProjectBoard;

    #[tokio::test]
    async fn test_schema_cache_fetches_once() {
        let board = MemoryProjectBoard::new(
            BoardSchema::new("PVT_dupes").with_single_select(OUTCOME_FIELD, &["Success"]),
        );
        let cache = BoardSchemaCache::new();

        let first = cache.get(&board).await.unwrap();
        assert_eq!(first.project_id, "PVT_dupes");
        let second = cache.get(&board).await.unwrap();
        assert!(second.fields.contains_key(OUTCOME_FIELD));
        assert_eq!(board.schema_fetches(), 1);
    }
}
