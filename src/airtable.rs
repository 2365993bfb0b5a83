//! Airtable sink: upserts scored leads by their (name, address) natural key.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::Lead;

/// Client for the Airtable records API.
#[derive(Clone)]
pub struct AirtableClient {
    client: Client,
    base_url: String,
    api_key: String,
    base_id: String,
    table: String,
}

/// What an upsert did with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Per-run sink statistics.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct SyncSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AirtableRecordList {
    #[serde(default)]
    records: Vec<AirtableRecord>,
}

impl AirtableClient {
    /// Fails when the token or base id is missing.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let api_key = config.airtable_api_key.clone().ok_or_else(|| {
            AppError::BadRequest("AIRTABLE_API_KEY is not configured".to_string())
        })?;
        let base_id = config.airtable_base_id.clone().ok_or_else(|| {
            AppError::BadRequest("AIRTABLE_BASE_ID is not configured".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create Airtable client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.airtable_base_url.clone(),
            api_key,
            base_id,
            table: config.airtable_table.clone(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/{}/{}", self.base_url, self.base_id, self.table)
    }

    /// Probe connection and token permissions before spending source credits.
    pub async fn test_connection(&self) -> bool {
        let response = self
            .client
            .get(self.table_url())
            .query(&[("maxRecords", "1")])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Airtable: connection and permissions OK");
                true
            }
            Ok(response) => {
                match response.status().as_u16() {
                    403 => tracing::error!(
                        "Airtable: permission denied (403). The token needs \
                         data.records:read and data.records:write, and the base \
                         must be added to it."
                    ),
                    404 => tracing::error!(
                        "Airtable: base or table not found. Base: {}, table: {}",
                        self.base_id,
                        self.table
                    ),
                    status => tracing::error!("Airtable: unexpected status {}", status),
                }
                false
            }
            Err(e) => {
                tracing::error!("Airtable: connection error: {}", e);
                false
            }
        }
    }

    /// Find the record id for a lead's natural key, if one is stored.
    pub async fn find_existing(&self, lead: &Lead) -> Result<Option<String>, AppError> {
        let formula = format!(
            "AND({{Name}}='{}',{{Address}}='{}')",
            escape_formula_value(&lead.name),
            escape_formula_value(lead.address.as_deref().unwrap_or("")),
        );

        let response = self
            .client
            .get(self.table_url())
            .query(&[("filterByFormula", formula.as_str()), ("maxRecords", "1")])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| AppError::Sink(format!("Airtable lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Sink(format!(
                "Airtable lookup returned status {}",
                response.status()
            )));
        }

        let list: AirtableRecordList = response
            .json()
            .await
            .map_err(|e| AppError::Sink(format!("Failed to parse Airtable response: {}", e)))?;

        Ok(list.records.into_iter().next().map(|r| r.id))
    }

    /// Insert or update one lead. Re-capturing the same (name, address)
    /// updates the stored record instead of duplicating it.
    pub async fn upsert(&self, lead: &mut Lead) -> Result<UpsertOutcome, AppError> {
        let fields = lead_to_fields(lead);

        let (response, outcome) = match self.find_existing(lead).await? {
            Some(record_id) => {
                tracing::info!("Updating lead: {}", lead.name);
                let response = self
                    .client
                    .patch(format!("{}/{}", self.table_url(), record_id))
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&json!({ "fields": fields }))
                    .send()
                    .await
                    .map_err(|e| AppError::Sink(format!("Airtable update failed: {}", e)))?;
                (response, UpsertOutcome::Updated)
            }
            None => {
                tracing::info!("Creating lead: {}", lead.name);
                let response = self
                    .client
                    .post(self.table_url())
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&json!({ "fields": fields }))
                    .send()
                    .await
                    .map_err(|e| AppError::Sink(format!("Airtable create failed: {}", e)))?;
                (response, UpsertOutcome::Created)
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Sink(format!(
                "Airtable returned {}: {}",
                status, error_text
            )));
        }

        let record: AirtableRecord = response
            .json()
            .await
            .map_err(|e| AppError::Sink(format!("Failed to parse Airtable response: {}", e)))?;

        lead.id = Some(record.id);
        lead.synced = true;
        Ok(outcome)
    }

    /// Upsert a batch. A failed lead is counted and logged; the batch
    /// continues.
    pub async fn sync_leads(&self, leads: &mut [Lead]) -> SyncSummary {
        let mut summary = SyncSummary {
            total: leads.len(),
            ..Default::default()
        };

        let total = leads.len();
        for (i, lead) in leads.iter_mut().enumerate() {
            tracing::info!("Syncing {}/{}: {}", i + 1, total, lead.name);

            match self.upsert(lead).await {
                Ok(UpsertOutcome::Created) => summary.created += 1,
                Ok(UpsertOutcome::Updated) => summary.updated += 1,
                Err(e) => {
                    let message = format!("Failed to sync {}: {}", lead.name, e);
                    tracing::error!("{}", message);
                    summary.errors.push(message);
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "Airtable sync done: {} created, {} updated, {} failed",
            summary.created,
            summary.updated,
            summary.failed
        );

        summary
    }
}

/// Single quotes would terminate the formula string literal.
fn escape_formula_value(value: &str) -> String {
    value.replace('\'', "\\'")
}

/// Map a lead onto the table's columns. Optional fields are sent only when
/// present so existing cell values are not blanked.
fn lead_to_fields(lead: &Lead) -> Value {
    let mut fields = serde_json::Map::new();
    fields.insert("Name".to_string(), json!(lead.name));
    fields.insert("Category".to_string(), json!(lead.category));
    fields.insert("City".to_string(), json!(lead.city));
    fields.insert("Score".to_string(), json!(lead.score));
    fields.insert("Tier".to_string(), json!(lead.tier.as_str()));
    fields.insert("Status".to_string(), json!(lead.status.as_str()));
    fields.insert(
        "Captured At".to_string(),
        json!(lead.captured_at.to_rfc3339()),
    );

    if let Some(phone) = &lead.phone {
        fields.insert("Phone".to_string(), json!(phone));
    }
    if let Some(email) = &lead.email {
        fields.insert("Email".to_string(), json!(email));
    }
    if let Some(address) = &lead.address {
        fields.insert("Address".to_string(), json!(address));
    }
    if let Some(website) = &lead.website {
        fields.insert("Website".to_string(), json!(website));
    }
    if let Some(instagram) = &lead.social.instagram {
        fields.insert("Instagram".to_string(), json!(instagram));
    }
    if let Some(linkedin) = &lead.social.linkedin {
        fields.insert("LinkedIn".to_string(), json!(linkedin));
    }
    if let Some(rating) = lead.maps.rating {
        fields.insert("Rating".to_string(), json!(rating));
    }
    if let Some(reviews) = lead.maps.review_count {
        fields.insert("Num Reviews".to_string(), json!(reviews));
    }
    if let Some(notes) = &lead.notes {
        fields.insert("Notes".to_string(), json!(notes));
    }

    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_values_escape_quotes() {
        assert_eq!(escape_formula_value("D'Angelo"), "D\\'Angelo");
        assert_eq!(escape_formula_value("plain"), "plain");
    }

    #[test]
    fn optional_fields_omitted_when_absent() {
        let lead = Lead::new("Acme", "pet shop", "Belo Horizonte");
        let fields = lead_to_fields(&lead);

        assert_eq!(fields["Name"], "Acme");
        assert_eq!(fields["Tier"], "low");
        assert!(fields.get("Phone").is_none());
        assert!(fields.get("Email").is_none());
        assert!(fields.get("Rating").is_none());
    }

    #[test]
    fn present_fields_included() {
        let mut lead = Lead::new("Acme", "pet shop", "Belo Horizonte");
        lead.phone = Some("+5531999998888".to_string());
        lead.maps.rating = Some(4.5);
        lead.score = 25;

        let fields = lead_to_fields(&lead);
        assert_eq!(fields["Phone"], "+5531999998888");
        assert_eq!(fields["Rating"], 4.5);
        assert_eq!(fields["Score"], 25);
    }
}
