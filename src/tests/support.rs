use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use crate::gateway::{GatewayError, Order, RecordStore};
use crate::model::{NewSchool, RecordId, SchoolDraft, SchoolPatch, SchoolRecord};

pub fn record(id: &str, name: &str, city: &str, state: &str) -> SchoolRecord {
    SchoolRecord {
        id: RecordId::from(id),
        name: name.to_string(),
        address: "1 Main Street".to_string(),
        city: city.to_string(),
        state: state.to_string(),
        contact: "5125550100".to_string(),
        image: None,
        email_id: "office@example.edu".to_string(),
        created_at: None,
    }
}

pub fn valid_draft() -> SchoolDraft {
    SchoolDraft {
        name: "Lakeside High".to_string(),
        email_id: "office@lakeside.edu".to_string(),
        address: "12 Shore Road".to_string(),
        city: "Austin".to_string(),
        state: "TX".to_string(),
        contact: "5125550100".to_string(),
        image: String::new(),
    }
}

#[derive(Default)]
struct Inner {
    rows: Vec<SchoolRecord>,
    calls: HashMap<&'static str, usize>,
    fail_next: Option<String>,
    next_id: u64,
    clock: i64,
}

/// In-memory stand-in for the remote table. Counts calls per operation and
/// can be told to fail the next one with a 500.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Seeds rows in insertion order; rows without a timestamp get ascending
    /// ones so the last given is the newest.
    pub fn with_records(records: Vec<SchoolRecord>) -> Self {
        let store = MemoryStore::default();
        {
            let mut inner = store.inner.lock().unwrap();
            for mut rec in records {
                if rec.created_at.is_none() {
                    rec.created_at = Some(inner.tick());
                }
                inner.rows.push(rec);
            }
            inner.next_id = 1000;
        }
        store
    }

    pub fn calls(&self, op: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.calls.get(op).copied().unwrap_or(0)
    }

    pub fn fail_next(&self, message: &str) {
        self.inner.lock().unwrap().fail_next = Some(message.to_string());
    }

    pub fn rows(&self) -> Vec<SchoolRecord> {
        self.inner.lock().unwrap().rows.clone()
    }

    fn enter(&self, op: &'static str) -> Result<std::sync::MutexGuard<'_, Inner>, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.calls.entry(op).or_insert(0) += 1;
        match inner.fail_next.take() {
            Some(message) => Err(GatewayError::remote(500, message)),
            None => Ok(inner),
        }
    }
}

impl Inner {
    fn tick(&mut self) -> chrono::DateTime<Utc> {
        self.clock += 1;
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(self.clock)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_all(&self, order: Option<Order>) -> Result<Vec<SchoolRecord>, GatewayError> {
        let inner = self.enter("list_all")?;
        let mut rows = inner.rows.clone();
        if let Some(order) = order {
            rows.sort_by_key(|r| r.created_at);
            if !order.ascending {
                rows.reverse();
            }
        }
        Ok(rows)
    }

    async fn get_by_id(&self, id: &RecordId) -> Result<Option<SchoolRecord>, GatewayError> {
        let inner = self.enter("get_by_id")?;
        Ok(inner.rows.iter().find(|r| &r.id == id).cloned())
    }

    async fn insert(&self, row: &NewSchool) -> Result<SchoolRecord, GatewayError> {
        let mut inner = self.enter("insert")?;
        inner.next_id += 1;
        let created_at = inner.tick();
        let rec = SchoolRecord {
            id: RecordId::new(inner.next_id.to_string()),
            name: row.name.clone(),
            address: row.address.clone(),
            city: row.city.clone(),
            state: row.state.clone(),
            contact: row.contact.clone(),
            image: row.image.clone(),
            email_id: row.email_id.clone(),
            created_at: Some(created_at),
        };
        inner.rows.push(rec.clone());
        Ok(rec)
    }

    async fn update_by_id(
        &self,
        id: &RecordId,
        patch: &SchoolPatch,
    ) -> Result<SchoolRecord, GatewayError> {
        let mut inner = self.enter("update_by_id")?;
        let Some(rec) = inner.rows.iter_mut().find(|r| &r.id == id) else {
            return Err(GatewayError::NotFound { id: id.clone() });
        };
        rec.name = patch.name.clone();
        rec.email_id = patch.email_id.clone();
        rec.address = patch.address.clone();
        rec.city = patch.city.clone();
        rec.state = patch.state.clone();
        rec.contact = patch.contact.clone();
        rec.image = patch.image.clone();
        Ok(rec.clone())
    }

    async fn delete_by_id(&self, id: &RecordId) -> Result<(), GatewayError> {
        let mut inner = self.enter("delete_by_id")?;
        inner.rows.retain(|r| &r.id != id);
        Ok(())
    }

    async fn count(&self) -> Result<u64, GatewayError> {
        let inner = self.enter("count")?;
        Ok(inner.rows.len() as u64)
    }
}
