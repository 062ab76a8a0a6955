//! Shared database mapping utilities
//!
//! Row decoding reports failures as [`sqlx::Error`] so that it runs inside
//! the storage boundary together with the query that produced the row.
//! SQLite has no native UUID, array or JSON column types, so those fields
//! are stored as text and parsed here.

use marketplace_domain::{ItemStatus, MarketplaceItem, User};
use sqlx::error::BoxDynError;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Helper functions for decoding rows across the two backends
pub struct MappingHelpers;

impl MappingHelpers {
    fn decode_error(column: &str, source: impl Into<BoxDynError>) -> sqlx::Error {
        sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: source.into(),
        }
    }

    /// Parse the nullable status column
    pub fn parse_status(column: &str, value: Option<String>) -> Result<Option<ItemStatus>, sqlx::Error> {
        value
            .map(|raw| {
                raw.parse::<ItemStatus>()
                    .map_err(|e| Self::decode_error(column, e))
            })
            .transpose()
    }

    pub fn parse_uuid_text(column: &str, raw: &str) -> Result<Uuid, sqlx::Error> {
        Uuid::parse_str(raw).map_err(|e| Self::decode_error(column, e))
    }

    pub fn parse_uuid_sqlite(row: &SqliteRow, column: &str) -> Result<Uuid, sqlx::Error> {
        let raw: String = row.try_get(column)?;
        Self::parse_uuid_text(column, &raw)
    }

    /// Parse tags stored as a JSON array; NULL reads as no tags
    pub fn parse_tags_sqlite(row: &SqliteRow, column: &str) -> Result<Vec<String>, sqlx::Error> {
        match row.try_get::<Option<String>, _>(column)? {
            Some(json_str) => serde_json::from_str(&json_str).map_err(|e| Self::decode_error(column, e)),
            None => Ok(Vec::new()),
        }
    }

    pub fn parse_job_config_sqlite(
        row: &SqliteRow,
        column: &str,
    ) -> Result<Option<serde_json::Value>, sqlx::Error> {
        row.try_get::<Option<String>, _>(column)?
            .map(|json_str| serde_json::from_str(&json_str).map_err(|e| Self::decode_error(column, e)))
            .transpose()
    }

    pub fn tags_to_sqlite(tags: &[String]) -> String {
        serde_json::Value::from(tags.to_vec()).to_string()
    }

    pub fn job_config_to_sqlite(job_config: Option<&serde_json::Value>) -> Option<String> {
        job_config.map(|value| value.to_string())
    }

    pub fn item_from_pg_row(row: &PgRow) -> Result<MarketplaceItem, sqlx::Error> {
        let status = Self::parse_status("status", row.try_get("status")?)?;

        Ok(MarketplaceItem {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            author: row.try_get("author")?,
            category: row.try_get("category")?,
            tags: row.try_get::<Option<Vec<String>>, _>("tags")?.unwrap_or_default(),
            introduction: row.try_get("introduction")?,
            description: row.try_get("description")?,
            job_config: row.try_get("job_config")?,
            submits: row.try_get("submits")?,
            star_number: row.try_get("star_number")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    pub fn item_from_sqlite_row(row: &SqliteRow) -> Result<MarketplaceItem, sqlx::Error> {
        let status = Self::parse_status("status", row.try_get("status")?)?;

        Ok(MarketplaceItem {
            id: Self::parse_uuid_sqlite(row, "id")?,
            name: row.try_get("name")?,
            author: row.try_get("author")?,
            category: row.try_get("category")?,
            tags: Self::parse_tags_sqlite(row, "tags")?,
            introduction: row.try_get("introduction")?,
            description: row.try_get("description")?,
            job_config: Self::parse_job_config_sqlite(row, "job_config")?,
            submits: row.try_get("submits")?,
            star_number: row.try_get("star_number")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    pub fn user_from_pg_row(row: &PgRow) -> Result<User, sqlx::Error> {
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }

    pub fn user_from_sqlite_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
        Ok(User {
            id: Self::parse_uuid_sqlite(row, "id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(MappingHelpers::parse_status("status", None).unwrap(), None);
        assert_eq!(
            MappingHelpers::parse_status("status", Some("approved".to_string())).unwrap(),
            Some(ItemStatus::Approved)
        );

        let error = MappingHelpers::parse_status("status", Some("archived".to_string())).unwrap_err();
        match error {
            sqlx::Error::ColumnDecode { index, .. } => assert_eq!(index, "status"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_sqlite_text_encodings() {
        let tags = vec!["ai".to_string(), "cv".to_string()];
        assert_eq!(MappingHelpers::tags_to_sqlite(&tags), r#"["ai","cv"]"#);
        assert_eq!(MappingHelpers::tags_to_sqlite(&[]), "[]");

        let job_config = serde_json::json!({"protocolVersion": 2});
        assert_eq!(
            MappingHelpers::job_config_to_sqlite(Some(&job_config)).as_deref(),
            Some(r#"{"protocolVersion":2}"#)
        );
        assert_eq!(MappingHelpers::job_config_to_sqlite(None), None);
    }
}
