//! In-memory store used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::store::{GatewayStore, NotificationStore, TemplateStore};
use crate::models::{
    gateway::GatewayInstance,
    notification::{NewNotification, NotificationFilter, ScheduledNotification},
    template::NotificationTemplate,
};

#[derive(Default)]
pub struct MemoryStore {
    notifications: Mutex<Vec<(String, ScheduledNotification)>>,
    templates: Mutex<Vec<(String, NotificationTemplate)>>,
    gateways: Mutex<Vec<(String, GatewayInstance)>>,
    /// Ids whose `claim` should report a lost race.
    pub stolen: Mutex<Vec<Uuid>>,
    /// Ids whose `claim` should fail with a storage error.
    pub broken_claims: Mutex<Vec<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&self, tenant: &str, template_type: &str, text: &str, is_active: bool) {
        let mut templates = self.templates.lock().unwrap();
        templates.retain(|(t, tpl)| !(t == tenant && tpl.template_type == template_type));
        templates.push((
            tenant.to_string(),
            NotificationTemplate {
                id: Uuid::new_v4(),
                template_type: template_type.to_string(),
                message_template: text.to_string(),
                is_active,
                updated_at: Utc::now(),
            },
        ));
    }

    pub fn add_gateway(&self, tenant: &str, name: &str, status: &str, created_at: DateTime<Utc>) {
        self.gateways.lock().unwrap().push((
            tenant.to_string(),
            GatewayInstance {
                id: Uuid::new_v4(),
                instance_name: name.to_string(),
                status: status.to_string(),
                api_url: "http://gateway.test".to_string(),
                api_key: "secret".to_string(),
                created_at,
            },
        ));
    }

    pub fn rows(&self, tenant: &str) -> Vec<ScheduledNotification> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == tenant)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn row(&self, id: Uuid) -> ScheduledNotification {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .find(|(_, n)| n.id == id)
            .map(|(_, n)| n.clone())
            .expect("notification exists")
    }

    /// Force a row into a given state, bypassing the worker.
    pub fn set_status(&self, id: Uuid, status: &str, sent_at: Option<DateTime<Utc>>) {
        let mut rows = self.notifications.lock().unwrap();
        if let Some((_, n)) = rows.iter_mut().find(|(_, n)| n.id == id) {
            n.status = status.to_string();
            n.sent_at = sent_at;
            n.updated_at = Utc::now();
        }
    }

    /// Move both timestamps back, as if the row was created and last
    /// changed at `at`.
    pub fn backdate(&self, id: Uuid, at: DateTime<Utc>) {
        let mut rows = self.notifications.lock().unwrap();
        if let Some((_, n)) = rows.iter_mut().find(|(_, n)| n.id == id) {
            n.created_at = at;
            n.updated_at = at;
        }
    }

    fn update<F: FnOnce(&mut ScheduledNotification)>(&self, tenant: &str, id: Uuid, f: F) {
        let mut rows = self.notifications.lock().unwrap();
        if let Some((_, n)) = rows.iter_mut().find(|(t, n)| t == tenant && n.id == id) {
            let status = n.status.clone();
            f(n);
            if n.status != status {
                n.updated_at = Utc::now();
            }
        }
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(&self, tenant: &str, new: NewNotification) -> anyhow::Result<ScheduledNotification> {
        let row = ScheduledNotification {
            id: Uuid::new_v4(),
            business_event_id: new.business_event_id,
            template_type: new.template_type,
            recipient_phone: new.recipient_phone,
            recipient_name: new.recipient_name,
            rendered_message: new.rendered_message,
            variables: Json(new.variables),
            scheduled_for: new.scheduled_for,
            status: "pending".to_string(),
            sent_at: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.notifications
            .lock()
            .unwrap()
            .push((tenant.to_string(), row.clone()));
        Ok(row)
    }

    async fn get(&self, tenant: &str, id: Uuid) -> anyhow::Result<Option<ScheduledNotification>> {
        Ok(self.rows(tenant).into_iter().find(|n| n.id == id))
    }

    async fn has_blocking(
        &self,
        tenant: &str,
        event_id: Uuid,
        template_type: &str,
        sent_since: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        Ok(self.rows(tenant).iter().any(|n| {
            n.business_event_id == event_id
                && n.template_type == template_type
                && (n.status == "pending"
                    || (n.status == "sent" && n.sent_at.is_some_and(|at| at >= sent_since)))
        }))
    }

    async fn due(&self, tenant: &str, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<ScheduledNotification>> {
        let mut due: Vec<_> = self
            .rows(tenant)
            .into_iter()
            .filter(|n| n.status == "pending" && n.scheduled_for <= now)
            .collect();
        due.sort_by_key(|n| n.scheduled_for);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn claim(&self, tenant: &str, id: Uuid) -> anyhow::Result<bool> {
        if self.broken_claims.lock().unwrap().contains(&id) {
            anyhow::bail!("connection reset while claiming {id}");
        }
        if self.stolen.lock().unwrap().contains(&id) {
            return Ok(false);
        }
        let mut claimed = false;
        self.update(tenant, id, |n| {
            if n.status == "pending" {
                n.status = "processing".to_string();
                claimed = true;
            }
        });
        Ok(claimed)
    }

    async fn mark_sent(&self, tenant: &str, id: Uuid, sent_at: DateTime<Utc>) -> anyhow::Result<()> {
        self.update(tenant, id, |n| {
            if n.status == "processing" {
                n.status = "sent".to_string();
                n.sent_at = Some(sent_at);
                n.error_message = None;
            }
        });
        Ok(())
    }

    async fn mark_failed(&self, tenant: &str, id: Uuid, error: &str) -> anyhow::Result<()> {
        self.update(tenant, id, |n| {
            if n.status == "processing" {
                n.status = "failed".to_string();
                n.error_message = Some(error.to_string());
            }
        });
        Ok(())
    }

    async fn cancel_pending(&self, tenant: &str, event_id: Uuid) -> anyhow::Result<u64> {
        let mut rows = self.notifications.lock().unwrap();
        let mut count = 0;
        for (_, n) in rows
            .iter_mut()
            .filter(|(t, n)| t == tenant && n.business_event_id == event_id && n.status == "pending")
        {
            n.status = "cancelled".to_string();
            n.updated_at = Utc::now();
            count += 1;
        }
        Ok(count)
    }

    async fn list(&self, tenant: &str, filter: &NotificationFilter) -> anyhow::Result<Vec<ScheduledNotification>> {
        let mut rows: Vec<_> = self
            .rows(tenant)
            .into_iter()
            .filter(|n| filter.status.map_or(true, |s| n.status == s.as_str()))
            .filter(|n| filter.event_id.map_or(true, |e| n.business_event_id == e))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.per_page() as usize)
            .collect())
    }

    async fn count_by_status(&self, tenant: &str) -> anyhow::Result<Vec<(String, i64)>> {
        let mut counts: std::collections::BTreeMap<String, i64> = Default::default();
        for n in self.rows(tenant) {
            *counts.entry(n.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn purge_terminal(&self, tenant: &str, before: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut rows = self.notifications.lock().unwrap();
        let len = rows.len();
        rows.retain(|(t, n)| {
            !(t == tenant
                && matches!(n.status.as_str(), "sent" | "failed" | "cancelled")
                && n.sent_at.unwrap_or(n.updated_at) < before)
        });
        Ok((len - rows.len()) as u64)
    }

    async fn fail_stale(&self, tenant: &str, before: DateTime<Utc>, error: &str) -> anyhow::Result<u64> {
        let mut rows = self.notifications.lock().unwrap();
        let mut count = 0;
        for (_, n) in rows
            .iter_mut()
            .filter(|(t, n)| t == tenant && n.status == "processing" && n.updated_at < before)
        {
            n.status = "failed".to_string();
            n.error_message = Some(error.to_string());
            n.updated_at = Utc::now();
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn active_template(&self, tenant: &str, template_type: &str) -> anyhow::Result<Option<NotificationTemplate>> {
        Ok(self
            .templates
            .lock()
            .unwrap()
            .iter()
            .find(|(t, tpl)| t == tenant && tpl.template_type == template_type && tpl.is_active)
            .map(|(_, tpl)| tpl.clone()))
    }

    async fn list_templates(&self, tenant: &str) -> anyhow::Result<Vec<NotificationTemplate>> {
        Ok(self
            .templates
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == tenant)
            .map(|(_, tpl)| tpl.clone())
            .collect())
    }

    async fn upsert_template(
        &self,
        tenant: &str,
        template_type: &str,
        message_template: &str,
        is_active: bool,
    ) -> anyhow::Result<NotificationTemplate> {
        self.add_template(tenant, template_type, message_template, is_active);
        Ok(self
            .list_templates(tenant)
            .await?
            .into_iter()
            .find(|tpl| tpl.template_type == template_type)
            .expect("template just inserted"))
    }
}

#[async_trait]
impl GatewayStore for MemoryStore {
    async fn instances(&self, tenant: &str) -> anyhow::Result<Vec<GatewayInstance>> {
        Ok(self
            .gateways
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == tenant)
            .map(|(_, g)| g.clone())
            .collect())
    }
}
