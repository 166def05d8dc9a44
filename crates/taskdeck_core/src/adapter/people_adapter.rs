use super::BaseAdapter;
use crate::db::{StorageEngine, StoreResult};
use crate::model::person::Person;
use std::ops::Deref;

/// Contact queries over the `people` collection.
#[derive(Clone)]
pub struct PeopleAdapter {
    base: BaseAdapter<Person>,
}

impl PeopleAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            base: BaseAdapter::new(engine),
        }
    }

    /// Case-insensitive substring match on `name`; linear scan.
    pub async fn search_by_name(&self, term: &str) -> StoreResult<Vec<Person>> {
        let needle = term.trim().to_lowercase();
        let mut people = self.base.get_all().await?;
        if !needle.is_empty() {
            people.retain(|person| person.name.to_lowercase().contains(&needle));
        }
        Ok(people)
    }

    pub async fn get_by_relationship_type(&self, relationship_type: &str) -> StoreResult<Vec<Person>> {
        self.base
            .get_by_index("relationshipType", relationship_type)
            .await
    }

    pub async fn get_by_email(&self, email: &str) -> StoreResult<Vec<Person>> {
        self.base.get_by_index("email", email).await
    }

    pub async fn get_by_tag(&self, tag: &str) -> StoreResult<Vec<Person>> {
        self.base.get_by_index("tags", tag).await
    }

    /// People whose last interaction is older than `cutoff_ms`.
    ///
    /// People with no recorded interaction are included.
    pub async fn get_people_needing_follow_up(&self, cutoff_ms: i64) -> StoreResult<Vec<Person>> {
        let mut people = self.base.get_all().await?;
        people.retain(|person| person.last_interaction.map_or(true, |at| at < cutoff_ms));
        Ok(people)
    }

    /// Sets `lastInteraction`, never moving it backwards.
    pub async fn record_interaction(&self, id: &str, at_ms: i64) -> StoreResult<Option<Person>> {
        self.base
            .update(id, move |person| {
                let latest = person.last_interaction.map_or(at_ms, |last| last.max(at_ms));
                person.last_interaction = Some(latest);
                Ok(())
            })
            .await
    }
}

impl Deref for PeopleAdapter {
    type Target = BaseAdapter<Person>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
