//! Seen-lead cache: avoids spending source and enrichment credits on leads
//! already processed in earlier runs.
//!
//! A plain JSON file keyed by a truncated SHA-256 of the normalized natural
//! key. Good enough for daily runs; swap for a real store if volume grows.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::AppError;
use crate::models::{Lead, LeadTier};

/// Cached snapshot of a processed lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedLead {
    pub name: String,
    pub category: String,
    pub city: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub score: u8,
    pub tier: LeadTier,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_processed: u64,
    pub duplicates_skipped: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    leads: HashMap<String, CachedLead>,
    last_updated: Option<DateTime<Utc>>,
    stats: CacheStats,
}

/// Cross-run lead dedup store.
pub struct LeadCache {
    path: PathBuf,
    data: CacheFile,
}

impl LeadCache {
    /// Load the cache file, starting fresh when it is missing or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let data = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<CacheFile>(&content) {
                Ok(data) => {
                    tracing::info!("Cache loaded: {} leads", data.leads.len());
                    data
                }
                Err(e) => {
                    tracing::warn!("Failed to parse cache file, starting fresh: {}", e);
                    CacheFile::default()
                }
            },
            Err(_) => CacheFile::default(),
        };

        Self { path, data }
    }

    fn save(&mut self) -> Result<(), AppError> {
        self.data.last_updated = Some(Utc::now());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Stable key for a lead: truncated SHA-256 of the normalized
    /// (name, address) pair.
    pub fn cache_key(lead: &Lead) -> String {
        let mut hasher = Sha256::new();
        hasher.update(lead.natural_key().as_bytes());
        hex::encode(hasher.finalize())[..16].to_string()
    }

    pub fn contains(&self, lead: &Lead) -> bool {
        self.data.leads.contains_key(&Self::cache_key(lead))
    }

    /// Keep only leads not seen in earlier runs.
    pub fn filter_new(&mut self, leads: Vec<Lead>) -> Vec<Lead> {
        let total = leads.len();
        let new_leads: Vec<Lead> = leads.into_iter().filter(|l| !self.contains(l)).collect();
        let duplicates = (total - new_leads.len()) as u64;

        self.data.stats.duplicates_skipped += duplicates;
        if duplicates > 0 {
            tracing::info!(
                "Cache: {} duplicates skipped, {} new leads",
                duplicates,
                new_leads.len()
            );
        }

        new_leads
    }

    /// Record processed leads. Re-adding an existing key refreshes its
    /// snapshot and `updated_at` but keeps `added_at`.
    pub fn add_many(&mut self, leads: &[Lead]) -> Result<(), AppError> {
        let now = Utc::now();

        for lead in leads {
            let key = Self::cache_key(lead);
            let added_at = self
                .data
                .leads
                .get(&key)
                .map(|c| c.added_at)
                .unwrap_or(now);

            self.data.leads.insert(
                key,
                CachedLead {
                    name: lead.name.clone(),
                    category: lead.category.clone(),
                    city: lead.city.clone(),
                    phone: lead.phone.clone(),
                    email: lead.email.clone(),
                    website: lead.website.clone(),
                    instagram: lead.social.instagram.clone(),
                    linkedin: lead.social.linkedin.clone(),
                    score: lead.score,
                    tier: lead.tier,
                    added_at,
                    updated_at: now,
                },
            );
            self.data.stats.total_processed += 1;
        }

        self.save()?;
        tracing::info!("Cache updated: {} leads stored", self.data.leads.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.leads.is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.data.stats
    }

    /// Drop entries older than the given number of days. Returns how many
    /// were removed.
    pub fn clear_old(&mut self, days: i64) -> Result<usize, AppError> {
        let cutoff = Utc::now() - Duration::days(days);
        let before = self.data.leads.len();
        self.data.leads.retain(|_, entry| entry.added_at >= cutoff);
        let removed = before - self.data.leads.len();

        if removed > 0 {
            self.save()?;
            tracing::info!("Removed {} stale cache entries", removed);
        }
        Ok(removed)
    }

    /// Wipe everything, including stats.
    pub fn clear(&mut self) -> Result<(), AppError> {
        self.data = CacheFile::default();
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache() -> LeadCache {
        let path = std::env::temp_dir().join(format!("leadscope-cache-{}.json", uuid::Uuid::new_v4()));
        LeadCache::load(path)
    }

    fn lead(name: &str, address: Option<&str>) -> Lead {
        let mut lead = Lead::new(name, "academia", "Belo Horizonte");
        lead.address = address.map(String::from);
        lead
    }

    #[test]
    fn key_is_stable_across_formatting() {
        let a = lead("Academia Corpo", Some("Rua B, 20"));
        let b = lead("academia  corpo", Some("RUA B, 20"));
        assert_eq!(LeadCache::cache_key(&a), LeadCache::cache_key(&b));
    }

    #[test]
    fn filter_new_drops_seen_leads() {
        let mut cache = temp_cache();
        let first = lead("Academia Corpo", Some("Rua B, 20"));
        cache.add_many(std::slice::from_ref(&first)).unwrap();

        let batch = vec![
            lead("Academia Corpo", Some("Rua B, 20")),
            lead("Academia Nova", Some("Rua C, 30")),
        ];
        let fresh = cache.filter_new(batch);

        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].name, "Academia Nova");
        assert_eq!(cache.stats().duplicates_skipped, 1);
    }

    #[test]
    fn cache_survives_reload() {
        let path = std::env::temp_dir().join(format!("leadscope-cache-{}.json", uuid::Uuid::new_v4()));
        {
            let mut cache = LeadCache::load(&path);
            cache.add_many(&[lead("Pet Mania", None)]).unwrap();
        }

        let cache = LeadCache::load(&path);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&lead("Pet Mania", None)));
    }

    #[test]
    fn readd_refreshes_snapshot_keeps_added_at() {
        let mut cache = temp_cache();
        let mut l = lead("Pet Mania", None);
        cache.add_many(std::slice::from_ref(&l)).unwrap();
        let added_at = cache.data.leads.values().next().unwrap().added_at;

        l.score = 60;
        cache.add_many(std::slice::from_ref(&l)).unwrap();

        let entry = cache.data.leads.values().next().unwrap();
        assert_eq!(entry.score, 60);
        assert_eq!(entry.added_at, added_at);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_old_removes_stale_entries() {
        let mut cache = temp_cache();
        cache.add_many(&[lead("Pet Mania", None)]).unwrap();

        // Nothing is older than a day yet.
        assert_eq!(cache.clear_old(1).unwrap(), 0);

        // Backdate the entry and evict it.
        for entry in cache.data.leads.values_mut() {
            entry.added_at = Utc::now() - Duration::days(90);
        }
        assert_eq!(cache.clear_old(30).unwrap(), 1);
        assert!(cache.is_empty());
    }
}
