//! Weekly planning adapter over `weeklyPlans` and `weeklyItems`.
//!
//! # Invariants
//! - Week keys are validated ISO weeks; malformed keys fail with `InvalidKey`.
//! - A plan exists for every week that holds items; `add_item` creates it
//!   in the same transaction.
//! - Items of one day are ranked by `order`; new items append.

use super::base::{decode, decode_listing, stamp};
use super::BaseAdapter;
use crate::db::{StorageEngine, StoreError, StoreResult, TxMode};
use crate::model::generate_id;
use crate::model::weekly::{week_start_for, WeekDay, WeeklyItem, WeeklyPlan};
use crate::schema::{WEEKLY_ITEMS, WEEKLY_PLANS};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeSet;

pub use crate::model::weekly::week_key_for;

const ITEM_ID_PREFIX: &str = "weekitem";

#[derive(Clone)]
pub struct WeeklyAdapter {
    plans: BaseAdapter<WeeklyPlan>,
    items: BaseAdapter<WeeklyItem>,
}

impl WeeklyAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            plans: BaseAdapter::new(engine.clone()),
            items: BaseAdapter::new(engine),
        }
    }

    pub fn plans(&self) -> &BaseAdapter<WeeklyPlan> {
        &self.plans
    }

    pub fn items(&self) -> &BaseAdapter<WeeklyItem> {
        &self.items
    }

    /// Loads the plan for `week_key`, creating an empty one when absent.
    pub async fn get_or_create_plan(&self, week_key: &str) -> StoreResult<WeeklyPlan> {
        let week_start = parse_week(week_key)?;
        let key = week_key.to_string();
        let stored = self
            .plans
            .upsert_with(week_key, move |current| match current {
                Some(_) => Ok(None),
                None => Ok(Some(empty_plan(key, week_start))),
            })
            .await?;
        match stored {
            Some(plan) => Ok(plan),
            None => self.plans.get_by_id(week_key).await?.ok_or_else(|| {
                StoreError::TransactionAborted(format!("plan `{week_key}` vanished during read"))
            }),
        }
    }

    /// Saves a plan; `weekStart` is recomputed from the key.
    pub async fn save_plan(&self, plan: &WeeklyPlan) -> StoreResult<WeeklyPlan> {
        let week_start = parse_week(&plan.week_key)?;
        let mut plan = plan.clone();
        plan.week_start = week_start.format("%Y-%m-%d").to_string();
        self.plans.save(&plan).await
    }

    /// Schedules `entity_id` on one day, appended after existing items.
    pub async fn add_item(
        &self,
        week_key: &str,
        entity_id: &str,
        day: WeekDay,
    ) -> StoreResult<WeeklyItem> {
        let week_start = parse_week(week_key)?;
        let engine = self.items.engine().clone();
        let now = engine.now_ms();
        let week_key = week_key.to_string();
        let entity_id = entity_id.to_string();
        engine.open().await?;
        engine
            .transaction(&[WEEKLY_PLANS, WEEKLY_ITEMS], TxMode::ReadWrite)?
            .run(move |tx| {
                if tx.get(WEEKLY_PLANS, &week_key)?.is_none() {
                    let mut plan = serde_json::to_value(empty_plan(week_key.clone(), week_start))?;
                    stamp(&mut plan, now)?;
                    tx.put(WEEKLY_PLANS, &plan)?;
                }
                let scheduled: Vec<WeeklyItem> = decode_listing(
                    WEEKLY_ITEMS,
                    tx.get_by_index(WEEKLY_ITEMS, "weekKey", &Value::String(week_key.clone()))?,
                );
                let order = scheduled
                    .iter()
                    .filter(|item| item.day == day)
                    .map(|item| item.order + 1)
                    .max()
                    .unwrap_or(0);
                let item = WeeklyItem {
                    id: generate_id(ITEM_ID_PREFIX, now),
                    week_key,
                    entity_id,
                    day,
                    order,
                    completed: false,
                    created_at: None,
                    updated_at: None,
                };
                let mut document = serde_json::to_value(&item)?;
                stamp(&mut document, now)?;
                tx.put(WEEKLY_ITEMS, &document)?;
                decode(WEEKLY_ITEMS, document)
            })
            .await
    }

    /// Moves an item to another week/day slot. Returns `None` when absent.
    pub async fn move_item(
        &self,
        item_id: &str,
        week_key: &str,
        day: WeekDay,
        order: i64,
    ) -> StoreResult<Option<WeeklyItem>> {
        parse_week(week_key)?;
        self.get_or_create_plan(week_key).await?;
        let week_key = week_key.to_string();
        self.items
            .update(item_id, move |item| {
                item.week_key = week_key;
                item.day = day;
                item.order = order;
                Ok(())
            })
            .await
    }

    pub async fn remove_item(&self, item_id: &str) -> StoreResult<bool> {
        self.items.delete(item_id).await
    }

    /// Items of one week ordered by day, then `order`.
    pub async fn get_items_for_week(&self, week_key: &str) -> StoreResult<Vec<WeeklyItem>> {
        parse_week(week_key)?;
        let mut items = self.items.get_by_index("weekKey", week_key).await?;
        items.sort_by(|left, right| {
            (left.day, left.order, &left.id).cmp(&(right.day, right.order, &right.id))
        });
        Ok(items)
    }

    pub async fn get_items_for_day(&self, week_key: &str, day: WeekDay) -> StoreResult<Vec<WeeklyItem>> {
        let mut items = self.get_items_for_week(week_key).await?;
        items.retain(|item| item.day == day);
        Ok(items)
    }

    /// Distinct week keys in which `entity_id` is scheduled, ascending.
    pub async fn get_weeks_for_entity(&self, entity_id: &str) -> StoreResult<Vec<String>> {
        let items = self.items.get_by_index("entityId", entity_id).await?;
        let weeks: BTreeSet<String> = items.into_iter().map(|item| item.week_key).collect();
        Ok(weeks.into_iter().collect())
    }
}

fn parse_week(week_key: &str) -> StoreResult<NaiveDate> {
    week_start_for(week_key)
        .ok_or_else(|| StoreError::InvalidKey(format!("`{week_key}` is not an ISO week key")))
}

fn empty_plan(week_key: String, week_start: NaiveDate) -> WeeklyPlan {
    WeeklyPlan {
        week_key,
        week_start: week_start.format("%Y-%m-%d").to_string(),
        goals: Vec::new(),
        notes: None,
        created_at: None,
        updated_at: None,
    }
}
