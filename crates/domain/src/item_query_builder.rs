use crate::entities::{ItemFilter, ItemPatch, ItemStatus};

/// Business logic for building marketplace item queries.
///
/// Decides *which* columns take part in a filter or an update; the storage
/// backends decide how each parameter is bound.
pub struct ItemQueryBuilder;

impl ItemQueryBuilder {
    pub const TABLE: &'static str = "marketplace_items";

    pub const COLUMNS: &'static str = "id, name, author, category, tags, introduction, description, job_config, submits, star_number, status, created_at, updated_at";

    /// Equality conditions for every filter field that is set
    ///
    /// Empty strings count as unset, like a missing query parameter.
    pub fn filter_conditions(filter: &ItemFilter) -> Vec<(&'static str, ItemQueryParam)> {
        let mut conditions = Vec::new();
        let text_fields = [
            ("name", &filter.name),
            ("author", &filter.author),
            ("category", &filter.category),
        ];

        for (column, value) in text_fields {
            if let Some(value) = value.as_deref().filter(|value| !value.is_empty()) {
                conditions.push((column, ItemQueryParam::Text(value.to_string())));
            }
        }
        if let Some(status) = filter.status {
            conditions.push(("status", ItemQueryParam::Status(status)));
        }

        conditions
    }

    /// Column assignments for every patch field that is set
    ///
    /// A nullable field set to `Some(None)` becomes `column = NULL`.
    pub fn patch_assignments(patch: &ItemPatch) -> Vec<(&'static str, ItemQueryParam)> {
        fn nullable<T: Clone>(
            value: &Option<T>,
            param: impl FnOnce(T) -> ItemQueryParam,
        ) -> ItemQueryParam {
            value.clone().map_or(ItemQueryParam::Null, param)
        }

        let mut assignments = Vec::new();

        if let Some(name) = &patch.name {
            assignments.push(("name", nullable(name, ItemQueryParam::Text)));
        }
        if let Some(author) = &patch.author {
            assignments.push(("author", nullable(author, ItemQueryParam::Text)));
        }
        if let Some(category) = &patch.category {
            assignments.push(("category", nullable(category, ItemQueryParam::Text)));
        }
        if let Some(tags) = &patch.tags {
            assignments.push(("tags", ItemQueryParam::Tags(tags.clone())));
        }
        if let Some(introduction) = &patch.introduction {
            assignments.push(("introduction", nullable(introduction, ItemQueryParam::Text)));
        }
        if let Some(description) = &patch.description {
            assignments.push(("description", nullable(description, ItemQueryParam::Text)));
        }
        if let Some(job_config) = &patch.job_config {
            assignments.push(("job_config", nullable(job_config, ItemQueryParam::Json)));
        }
        if let Some(status) = &patch.status {
            assignments.push(("status", nullable(status, ItemQueryParam::Status)));
        }

        assignments
    }

    /// `SELECT` over all item columns, ready for a `WHERE` clause
    pub fn select_prefix() -> String {
        format!("SELECT {} FROM {}", Self::COLUMNS, Self::TABLE)
    }
}

/// Query parameter types for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum ItemQueryParam {
    Text(String),
    Tags(Vec<String>),
    Json(serde_json::Value),
    Status(ItemStatus),
    /// Rendered as a literal `NULL`, never bound
    Null,
}
