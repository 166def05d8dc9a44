//! Tag adapter.
//!
//! # Responsibility
//! - Keep tag names normalized (trimmed, lower-cased) and soft-unique.
//! - Maintain usage counters and the parent/child tree.
//!
//! # Invariants
//! - Name uniqueness is enforced here by lookup-and-insert inside one
//!   read-write transaction, not by a store constraint.
//! - `usageCount` never goes below zero.
//! - Counter updates are read-modify-write inside one transaction, so
//!   concurrent increments do not lose updates.

use super::base::{decode, decode_listing, stamp};
use super::BaseAdapter;
use crate::db::{StorageEngine, StoreError, StoreResult, TxMode};
use crate::model::generate_id;
use crate::model::tag::{normalize_tag_name, NewTag, Tag, TagNode};
use crate::schema::TAGS;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::ops::Deref;

const ID_PREFIX: &str = "tag";

#[derive(Clone)]
pub struct TagsAdapter {
    base: BaseAdapter<Tag>,
}

impl TagsAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            base: BaseAdapter::new(engine),
        }
    }

    /// Creates a tag, or returns the existing one with the same normalized name.
    ///
    /// # Errors
    /// - `InvalidOperation` when the name is blank.
    pub async fn create_tag(&self, input: NewTag) -> StoreResult<Tag> {
        let name = require_name(&input.name)?;
        let engine = self.base.engine().clone();
        let now = engine.now_ms();
        engine.open().await?;
        let (tag, created) = engine
            .transaction(&[TAGS], TxMode::ReadWrite)?
            .run(move |tx| {
                let tags: Vec<Tag> = decode_listing(TAGS, tx.get_all(TAGS)?);
                if let Some(existing) = tags
                    .into_iter()
                    .find(|tag| normalize_tag_name(&tag.name).as_deref() == Some(name.as_str()))
                {
                    return Ok((existing, false));
                }
                let tag = Tag {
                    id: generate_id(ID_PREFIX, now),
                    name,
                    color: input.color,
                    category: input.category,
                    parent: input.parent,
                    usage_count: 0,
                    created_at: None,
                    updated_at: None,
                };
                let mut document = serde_json::to_value(&tag)?;
                stamp(&mut document, now)?;
                tx.put(TAGS, &document)?;
                Ok((decode(TAGS, document)?, true))
            })
            .await?;
        if !created {
            debug!(
                "event=tag_create module=adapter status=existing tag_id={}",
                tag.id
            );
        }
        Ok(tag)
    }

    /// Case-insensitive exact match on the normalized name; linear scan.
    pub async fn find_by_name(&self, name: &str) -> StoreResult<Option<Tag>> {
        let Some(needle) = normalize_tag_name(name) else {
            return Ok(None);
        };
        let tags = self.base.get_all().await?;
        Ok(tags
            .into_iter()
            .find(|tag| normalize_tag_name(&tag.name).as_deref() == Some(needle.as_str())))
    }

    /// Renames a tag. Returns `None` when the tag is absent.
    ///
    /// # Errors
    /// - `InvalidOperation` when the name is blank or taken by another tag.
    pub async fn rename_tag(&self, id: &str, new_name: &str) -> StoreResult<Option<Tag>> {
        let name = require_name(new_name)?;
        let id = id.to_string();
        let engine = self.base.engine().clone();
        let now = engine.now_ms();
        engine.open().await?;
        engine
            .transaction(&[TAGS], TxMode::ReadWrite)?
            .run(move |tx| {
                let tags: Vec<Tag> = decode_listing(TAGS, tx.get_all(TAGS)?);
                if let Some(clash) = tags.iter().find(|tag| {
                    tag.id != id && normalize_tag_name(&tag.name).as_deref() == Some(name.as_str())
                }) {
                    return Err(StoreError::InvalidOperation(format!(
                        "tag name `{name}` is already used by tag `{}`",
                        clash.id
                    )));
                }
                let Some(mut tag) = tags.into_iter().find(|tag| tag.id == id) else {
                    return Ok(None);
                };
                tag.name = name;
                let mut document = serde_json::to_value(&tag)?;
                stamp(&mut document, now)?;
                tx.put(TAGS, &document)?;
                decode(TAGS, document).map(Some)
            })
            .await
    }

    pub async fn increment_usage(&self, id: &str) -> StoreResult<Option<Tag>> {
        self.base
            .update(id, |tag| {
                tag.usage_count = tag.usage_count.saturating_add(1);
                Ok(())
            })
            .await
    }

    /// Decrements the usage counter, flooring at zero.
    pub async fn decrement_usage(&self, id: &str) -> StoreResult<Option<Tag>> {
        self.base
            .update(id, |tag| {
                tag.usage_count = tag.usage_count.saturating_sub(1);
                Ok(())
            })
            .await
    }

    pub async fn get_by_category(&self, category: &str) -> StoreResult<Vec<Tag>> {
        self.base.get_by_index("category", category).await
    }

    pub async fn get_children(&self, parent_id: &str) -> StoreResult<Vec<Tag>> {
        self.base.get_by_index("parent", parent_id).await
    }

    /// Most used tags first; ties break by name.
    pub async fn get_popular(&self, limit: usize) -> StoreResult<Vec<Tag>> {
        let mut tags = self.base.get_all().await?;
        tags.sort_by(|left, right| {
            right
                .usage_count
                .cmp(&left.usage_count)
                .then_with(|| left.name.cmp(&right.name))
        });
        tags.truncate(limit);
        Ok(tags)
    }

    /// Builds the tag forest.
    ///
    /// Tags without a parent, or whose parent is missing, become roots.
    /// Siblings are sorted by name. Parent cycles are cut at their smallest id.
    pub async fn get_tag_tree(&self) -> StoreResult<Vec<TagNode>> {
        let tags = self.base.get_all().await?;
        Ok(build_tree(tags))
    }
}

fn require_name(name: &str) -> StoreResult<String> {
    normalize_tag_name(name)
        .ok_or_else(|| StoreError::InvalidOperation("tag name must not be blank".to_string()))
}

fn build_tree(tags: Vec<Tag>) -> Vec<TagNode> {
    let ids: HashSet<String> = tags.iter().map(|tag| tag.id.clone()).collect();
    let mut children: HashMap<String, Vec<Tag>> = HashMap::new();
    let mut roots = Vec::new();
    for tag in tags {
        match tag.parent.as_deref() {
            Some(parent) if parent != tag.id && ids.contains(parent) => {
                children.entry(parent.to_string()).or_default().push(tag);
            }
            _ => roots.push(tag),
        }
    }

    let mut visited = HashSet::new();
    let mut forest = attach(roots, &mut children, &mut visited);

    // Whatever is left sits on a parent cycle; cut each cycle at its smallest id.
    let mut stranded: Vec<Tag> = children.values().flatten().cloned().collect();
    stranded.sort_by(|left, right| left.id.cmp(&right.id));
    for tag in stranded {
        if !visited.contains(&tag.id) {
            forest.extend(attach(vec![tag], &mut children, &mut visited));
        }
    }
    forest
}

fn attach(
    mut level: Vec<Tag>,
    children: &mut HashMap<String, Vec<Tag>>,
    visited: &mut HashSet<String>,
) -> Vec<TagNode> {
    level.sort_by(|left, right| left.name.cmp(&right.name));
    let mut nodes = Vec::with_capacity(level.len());
    for tag in level {
        if !visited.insert(tag.id.clone()) {
            continue;
        }
        let below = children.remove(&tag.id).unwrap_or_default();
        nodes.push(TagNode {
            children: attach(below, children, visited),
            tag,
        });
    }
    nodes
}

impl Deref for TagsAdapter {
    type Target = BaseAdapter<Tag>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::build_tree;
    use crate::model::tag::Tag;

    fn tag(id: &str, name: &str, parent: Option<&str>) -> Tag {
        Tag {
            id: id.to_string(),
            name: name.to_string(),
            color: None,
            category: None,
            parent: parent.map(str::to_string),
            usage_count: 0,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn tree_nests_children_and_promotes_orphans() {
        let forest = build_tree(vec![
            tag("t2", "meetings", Some("t1")),
            tag("t1", "work", None),
            tag("t3", "errands", Some("missing")),
        ]);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].tag.name, "errands");
        assert_eq!(forest[1].tag.name, "work");
        assert_eq!(forest[1].children[0].tag.id, "t2");
    }

    #[test]
    fn tree_breaks_parent_cycles() {
        let forest = build_tree(vec![tag("a", "a", Some("b")), tag("b", "b", Some("a"))]);
        let total: usize = forest.iter().map(|node| 1 + node.children.len()).sum();
        assert_eq!(total, 2);
    }
}
