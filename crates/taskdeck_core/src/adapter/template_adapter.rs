use super::filter::{self, Filterable, ListQuery};
use super::BaseAdapter;
use crate::db::{StorageEngine, StoreError, StoreResult};
use crate::model::generate_id;
use crate::model::template::Template;
use std::ops::Deref;

const ID_PREFIX: &str = "template";

/// Template records with usage tracking and filtered listings.
#[derive(Clone)]
pub struct TemplateAdapter {
    base: BaseAdapter<Template>,
}

impl TemplateAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            base: BaseAdapter::new(engine),
        }
    }

    /// Persists a new template. A blank id is replaced with a generated one
    /// and usage tracking starts from zero.
    ///
    /// # Errors
    /// - `InvalidOperation` when the name is blank.
    pub async fn create_template(&self, mut template: Template) -> StoreResult<Template> {
        if template.name.trim().is_empty() {
            return Err(StoreError::InvalidOperation(
                "template name must not be blank".to_string(),
            ));
        }
        if template.id.trim().is_empty() {
            template.id = generate_id(ID_PREFIX, self.base.engine().now_ms());
        }
        template.usage_count = 0;
        template.last_used = None;
        self.base.save(&template).await
    }

    pub async fn get_by_category(&self, category: &str) -> StoreResult<Vec<Template>> {
        self.base.get_by_index("category", category).await
    }

    /// Bumps `usageCount` and `lastUsed`.
    pub async fn record_usage(&self, id: &str) -> StoreResult<Option<Template>> {
        let now = self.base.engine().now_ms();
        self.base
            .update(id, move |template| {
                template.usage_count = template.usage_count.saturating_add(1);
                template.last_used = Some(now);
                Ok(())
            })
            .await
    }

    pub async fn get_filtered(&self, query: &ListQuery) -> StoreResult<Vec<Template>> {
        let templates = self.base.get_all().await?;
        Ok(filter::apply(templates, query))
    }
}

impl Filterable for Template {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn matches_text(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .is_some_and(|description| description.to_lowercase().contains(needle))
            || self.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
    }

    fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    fn usage(&self) -> u64 {
        self.usage_count
    }
}

impl Deref for TemplateAdapter {
    type Target = BaseAdapter<Template>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
