// libs/scheduling-cell/src/services/calendar.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{DateOverride, ProviderProfile, SchedulingError};

/// Read side of the provider calendar: the weekly working-hours template and
/// any date-specific override schedules.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn find_provider(&self, id: Uuid) -> Result<Option<ProviderProfile>, SchedulingError>;

    async fn find_date_override(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DateOverride>, SchedulingError>;
}

// ==============================================================================
// SUPABASE-BACKED DIRECTORY
// ==============================================================================

pub struct SupabaseProviderDirectory {
    supabase: Arc<SupabaseClient>,
    service_token: Option<String>,
}

impl SupabaseProviderDirectory {
    pub fn new(supabase: Arc<SupabaseClient>, service_token: Option<String>) -> Self {
        Self {
            supabase,
            service_token,
        }
    }

    fn token(&self) -> Option<&str> {
        self.service_token.as_deref()
    }
}

#[async_trait]
impl ProviderDirectory for SupabaseProviderDirectory {
    async fn find_provider(&self, id: Uuid) -> Result<Option<ProviderProfile>, SchedulingError> {
        let path = format!("/rest/v1/providers?id=eq.{}", id);

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| SchedulingError::Storage(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    SchedulingError::Storage(format!("Failed to parse provider: {}", e))
                })
            })
            .transpose()
    }

    async fn find_date_override(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DateOverride>, SchedulingError> {
        let path = format!(
            "/rest/v1/provider_schedule_overrides?provider_id=eq.{}&date=eq.{}",
            provider_id, date
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| SchedulingError::Storage(e.to_string()))?;

        if rows.is_empty() {
            debug!("No schedule override for {} on {}", provider_id, date);
        }

        rows.into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    SchedulingError::Storage(format!("Failed to parse schedule override: {}", e))
                })
            })
            .transpose()
    }
}

// ==============================================================================
// IN-MEMORY DIRECTORY
// ==============================================================================

/// Directory backed by plain maps. Used by tests and single-process setups.
#[derive(Default)]
pub struct InMemoryProviderDirectory {
    providers: Mutex<HashMap<Uuid, ProviderProfile>>,
    overrides: Mutex<HashMap<(Uuid, NaiveDate), DateOverride>>,
}

impl InMemoryProviderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_provider(&self, provider: ProviderProfile) {
        self.providers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(provider.id, provider);
    }

    pub fn insert_override(&self, date_override: DateOverride) {
        self.overrides
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(
                (date_override.provider_id, date_override.date),
                date_override,
            );
    }
}

#[async_trait]
impl ProviderDirectory for InMemoryProviderDirectory {
    async fn find_provider(&self, id: Uuid) -> Result<Option<ProviderProfile>, SchedulingError> {
        Ok(self
            .providers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned())
    }

    async fn find_date_override(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DateOverride>, SchedulingError> {
        Ok(self
            .overrides
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(provider_id, date))
            .cloned())
    }
}
