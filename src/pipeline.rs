//! The capture-and-qualify pipeline.
//!
//! Stages: fetch -> website audit -> social extraction -> enrichment ->
//! scoring -> sink. Leads flow through one at a time; a failure in any
//! collaborator is logged and skips only the lead (or, for the source, only
//! the category batch). After each stage the lead list is checkpointed so an
//! interrupted run can resume.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::airtable::{AirtableClient, SyncSummary};
use crate::cache::LeadCache;
use crate::config::Config;
use crate::errors::AppError;
use crate::maps_scraper::DirectMapsScraper;
use crate::models::Lead;
use crate::scoring::{LeadScorer, ScoreSummary};
use crate::services::{GoogleSearchService, HunterService, MapsSearchService};
use crate::social::{InstagramFinder, SocialExtractor};
use crate::website::{PageFetcher, WebsiteAuditor};

/// Which collaborators a run wires up.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Prefer the paid SerpAPI source over the direct scraper.
    pub use_serpapi: bool,
    /// Run the Hunter.io enrichment stage.
    pub use_hunter: bool,
    /// Upsert results into Airtable.
    pub sync_to_airtable: bool,
    /// Skip leads already processed in earlier runs.
    pub use_cache: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            use_serpapi: true,
            use_hunter: false,
            sync_to_airtable: true,
            use_cache: true,
        }
    }
}

/// The configured lead source.
enum LeadSource {
    SerpApi(MapsSearchService),
    Direct(DirectMapsScraper),
}

impl LeadSource {
    async fn fetch_all(&self, categories: &[String], limit: usize) -> Vec<Lead> {
        match self {
            LeadSource::SerpApi(service) => service.search_all_categories(categories, limit).await,
            LeadSource::Direct(scraper) => scraper.search_all_categories(categories, limit).await,
        }
    }
}

/// Per-stage counters surfaced to the user at the end of a run.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StageStats {
    pub leads_found: usize,
    pub new_leads: usize,
    pub cached_skipped: usize,
    pub sites_reachable: usize,
    pub sites_https: usize,
    pub instagram_found: usize,
    pub linkedin_found: usize,
    pub emails_found: usize,
    pub phones_found: usize,
    pub scoring: Option<ScoreSummary>,
    pub sync: Option<SyncSummary>,
}

/// Serializable summary of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub categories: Vec<String>,
    pub total_leads: usize,
    pub stages: StageStats,
    pub error: Option<String>,
}

impl RunReport {
    fn new(categories: &[String]) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            duration_seconds: 0.0,
            categories: categories.to_vec(),
            total_leads: 0,
            stages: StageStats::default(),
            error: None,
        }
    }
}

/// Report plus the scored leads, for export.
pub struct RunOutcome {
    pub report: RunReport,
    pub leads: Vec<Lead>,
}

#[derive(Serialize, Deserialize)]
struct Checkpoint {
    stage: u8,
    leads: Vec<Lead>,
    report: RunReport,
    saved_at: DateTime<Utc>,
}

/// Sequences the collaborators for each run.
pub struct LeadPipeline {
    source: LeadSource,
    auditor: WebsiteAuditor,
    extractor: SocialExtractor,
    instagram_finder: Option<InstagramFinder>,
    hunter: Option<HunterService>,
    scorer: LeadScorer,
    airtable: Option<AirtableClient>,
    cache: Option<LeadCache>,
    checkpoint_path: PathBuf,
}

impl LeadPipeline {
    pub fn new(config: &Config, settings: &PipelineSettings) -> Result<Self, AppError> {
        let source = if settings.use_serpapi {
            match MapsSearchService::new(config) {
                Ok(service) => {
                    tracing::info!("Using SerpAPI maps source");
                    LeadSource::SerpApi(service)
                }
                Err(_) => {
                    tracing::warn!("SerpAPI not configured, falling back to direct scraping");
                    LeadSource::Direct(DirectMapsScraper::new(config)?)
                }
            }
        } else {
            tracing::info!("Using direct maps scraping");
            LeadSource::Direct(DirectMapsScraper::new(config)?)
        };

        let fetcher = PageFetcher::new(config)?;
        let auditor = WebsiteAuditor::new(fetcher.clone());
        let extractor = SocialExtractor::new(fetcher);

        let instagram_finder = match GoogleSearchService::new(config) {
            Ok(search) => Some(InstagramFinder::new(search, config.search_city.clone())),
            Err(_) => None,
        };

        let hunter = if settings.use_hunter {
            match HunterService::new(config) {
                Ok(service) => {
                    tracing::info!("Hunter.io enrichment enabled");
                    Some(service)
                }
                Err(e) => {
                    tracing::warn!("Hunter.io unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let airtable = if settings.sync_to_airtable {
            match AirtableClient::new(config) {
                Ok(client) => {
                    tracing::info!("Airtable sink enabled");
                    Some(client)
                }
                Err(e) => {
                    tracing::warn!("Airtable unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let cache = if settings.use_cache {
            let cache = LeadCache::load(&config.cache_path);
            tracing::info!("Cache active: {} leads stored", cache.len());
            Some(cache)
        } else {
            None
        };

        Ok(Self {
            source,
            auditor,
            extractor,
            instagram_finder,
            hunter,
            scorer: LeadScorer::new(config.scoring.clone()),
            airtable,
            cache,
            checkpoint_path: PathBuf::from(&config.checkpoint_path),
        })
    }

    /// Run the full pipeline for the given categories.
    pub async fn run(
        &mut self,
        categories: &[String],
        limit_per_category: usize,
        resume: bool,
    ) -> Result<RunOutcome, AppError> {
        let started = Instant::now();
        let mut resume_stage = 0u8;
        let mut leads: Vec<Lead> = Vec::new();
        let mut report = RunReport::new(categories);

        if resume {
            if let Some(checkpoint) = self.load_checkpoint() {
                tracing::info!(
                    "Resuming from stage {} with {} leads (saved {})",
                    checkpoint.stage + 1,
                    checkpoint.leads.len(),
                    checkpoint.saved_at
                );
                resume_stage = checkpoint.stage;
                leads = checkpoint.leads;
                report = checkpoint.report;
            } else {
                tracing::info!("No checkpoint found, starting from scratch");
            }
        }

        tracing::info!(
            "Starting pipeline: {} categories, limit={}",
            categories.len(),
            limit_per_category
        );

        // Probe the sink before spending source credits.
        if let Some(airtable) = &self.airtable {
            if !airtable.test_connection().await {
                tracing::error!(
                    "Aborting: Airtable rejected the token. Fix permissions or \
                     run with --no-airtable."
                );
                report.error = Some("Airtable permission check failed".to_string());
                report.duration_seconds = started.elapsed().as_secs_f64();
                report.finished_at = Some(Utc::now());
                return Ok(RunOutcome { report, leads });
            }
        }

        // Stage 1: fetch raw leads.
        if resume_stage < 1 {
            tracing::info!("=== Stage 1: Maps search ===");
            leads = self.source.fetch_all(categories, limit_per_category).await;
            report.stages.leads_found = leads.len();
            tracing::info!("Search: {} leads found", leads.len());

            if leads.is_empty() {
                tracing::warn!("No leads found, finishing early");
                report.duration_seconds = started.elapsed().as_secs_f64();
                report.finished_at = Some(Utc::now());
                return Ok(RunOutcome { report, leads });
            }

            if let Some(cache) = &mut self.cache {
                let before = leads.len();
                leads = cache.filter_new(leads);
                report.stages.new_leads = leads.len();
                report.stages.cached_skipped = before - leads.len();

                if leads.is_empty() {
                    tracing::info!("All leads already cached");
                    report.duration_seconds = started.elapsed().as_secs_f64();
                    report.finished_at = Some(Utc::now());
                    return Ok(RunOutcome { report, leads });
                }
            } else {
                report.stages.new_leads = leads.len();
            }

            self.save_checkpoint(1, &leads, &report);
        }

        // Stage 2: website audit.
        if resume_stage < 2 {
            tracing::info!("=== Stage 2: Website audit ===");
            self.auditor.audit_leads(&mut leads).await;
            report.stages.sites_reachable = leads.iter().filter(|l| l.site_reachable).count();
            report.stages.sites_https = leads.iter().filter(|l| l.site_https).count();
            tracing::info!("Websites: {} reachable", report.stages.sites_reachable);
            self.save_checkpoint(2, &leads, &report);
        }

        // Stage 3: social extraction, with the search fallback for Instagram.
        if resume_stage < 3 {
            tracing::info!("=== Stage 3: Social extraction ===");
            self.extractor.extract_leads(&mut leads).await;

            if let Some(finder) = &self.instagram_finder {
                finder.enrich_leads(&mut leads).await;
            }

            report.stages.instagram_found =
                leads.iter().filter(|l| l.social.instagram.is_some()).count();
            report.stages.linkedin_found =
                leads.iter().filter(|l| l.social.linkedin.is_some()).count();
            report.stages.emails_found = leads.iter().filter(|l| l.email.is_some()).count();
            report.stages.phones_found = leads.iter().filter(|l| l.phone.is_some()).count();
            tracing::info!(
                "Social: {} Instagram, {} LinkedIn, {} emails, {} phones",
                report.stages.instagram_found,
                report.stages.linkedin_found,
                report.stages.emails_found,
                report.stages.phones_found
            );
            self.save_checkpoint(3, &leads, &report);
        }

        // Stage 4: optional Hunter.io enrichment.
        if resume_stage < 4 {
            if let Some(hunter) = &self.hunter {
                tracing::info!("=== Stage 4: Hunter.io enrichment ===");

                if let Some(available) = hunter.available_searches().await {
                    tracing::info!("Hunter.io: {} searches available", available);
                    if (available as usize) < leads.len() {
                        tracing::warn!(
                            "Hunter.io credits short: {} available, {} needed",
                            available,
                            leads.len()
                        );
                    }
                }

                for lead in leads.iter_mut() {
                    if lead.website.is_none() {
                        continue;
                    }
                    if let Err(e) = hunter.enrich(lead).await {
                        tracing::warn!("Enrichment failed for {}: {}", lead.name, e);
                    }
                }
                report.stages.emails_found = leads.iter().filter(|l| l.email.is_some()).count();
                tracing::info!("Hunter.io: {} emails total", report.stages.emails_found);
            }
            self.save_checkpoint(4, &leads, &report);
        }

        // Stage 5: scoring. Always runs, even on resume: cheap and pure.
        tracing::info!("=== Stage 5: Scoring ===");
        self.scorer.score_leads(&mut leads);
        let summary = self.scorer.summary(&leads);
        tracing::info!(
            "Scoring: mean={:.1}, hot={}, warm={}",
            summary.mean_score,
            summary.hot,
            summary.warm
        );
        report.stages.scoring = Some(summary);
        self.save_checkpoint(5, &leads, &report);

        // Stage 6: sink.
        if let Some(airtable) = &self.airtable {
            tracing::info!("=== Stage 6: Airtable sync ===");
            let sync = airtable.sync_leads(&mut leads).await;
            tracing::info!("Airtable: {} created, {} updated", sync.created, sync.updated);
            report.stages.sync = Some(sync);
        }

        // Only leads the sink accepted enter the cache; failed ones get
        // re-processed next run. With the sink off, cache everything.
        if let Some(cache) = &mut self.cache {
            let to_cache: Vec<Lead> = if self.airtable.is_some() {
                leads.iter().filter(|l| l.synced).cloned().collect()
            } else {
                leads.clone()
            };
            if !to_cache.is_empty() {
                if let Err(e) = cache.add_many(&to_cache) {
                    tracing::error!("Failed to persist cache: {}", e);
                }
            }
            let unsynced = leads.len() - to_cache.len();
            if self.airtable.is_some() && unsynced > 0 {
                tracing::warn!(
                    "{} leads not cached (sink failures), they will be reprocessed",
                    unsynced
                );
            }
        }

        report.total_leads = leads.len();
        report.duration_seconds = started.elapsed().as_secs_f64();
        report.finished_at = Some(Utc::now());
        self.clear_checkpoint();

        tracing::info!(
            "Pipeline finished in {:.1}s, {} leads processed",
            report.duration_seconds,
            report.total_leads
        );

        Ok(RunOutcome { report, leads })
    }

    fn save_checkpoint(&self, stage: u8, leads: &[Lead], report: &RunReport) {
        let checkpoint = Checkpoint {
            stage,
            leads: leads.to_vec(),
            report: report.clone(),
            saved_at: Utc::now(),
        };

        let write = || -> Result<(), AppError> {
            if let Some(parent) = self.checkpoint_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(&checkpoint)?;
            std::fs::write(&self.checkpoint_path, content)?;
            Ok(())
        };

        match write() {
            Ok(()) => tracing::info!("Checkpoint saved: stage {}, {} leads", stage, leads.len()),
            Err(e) => tracing::warn!("Failed to save checkpoint: {}", e),
        }
    }

    fn load_checkpoint(&self) -> Option<Checkpoint> {
        let content = std::fs::read_to_string(&self.checkpoint_path).ok()?;
        match serde_json::from_str(&content) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                tracing::warn!("Failed to parse checkpoint: {}", e);
                None
            }
        }
    }

    fn clear_checkpoint(&self) {
        if self.checkpoint_path.exists() {
            if std::fs::remove_file(&self.checkpoint_path).is_ok() {
                tracing::info!("Checkpoint removed (run complete)");
            }
        }
    }
}

/// Write scored leads as CSV. No csv crate in the stack; the quoting rules
/// are small enough to keep inline.
pub fn export_csv(leads: &[Lead], path: &Path) -> Result<(), AppError> {
    let mut out = String::new();
    let header = [
        "Name", "Category", "Phone", "Email", "Address", "Website", "Instagram", "LinkedIn",
        "Rating", "Reviews", "Score", "Tier",
    ];
    out.push_str(&header.join(","));
    out.push('\n');

    for lead in leads {
        let rating = lead.maps.rating.map(|r| r.to_string()).unwrap_or_default();
        let reviews = lead
            .maps
            .review_count
            .map(|n| n.to_string())
            .unwrap_or_default();
        let row = [
            lead.name.as_str(),
            lead.category.as_str(),
            lead.phone.as_deref().unwrap_or(""),
            lead.email.as_deref().unwrap_or(""),
            lead.address.as_deref().unwrap_or(""),
            lead.website.as_deref().unwrap_or(""),
            lead.social.instagram.as_deref().unwrap_or(""),
            lead.social.linkedin.as_deref().unwrap_or(""),
            rating.as_str(),
            reviews.as_str(),
        ];

        let mut fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        fields.push(lead.score.to_string());
        fields.push(lead.tier.as_str().to_string());
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, out)?;
    tracing::info!("Exported {} leads to {}", leads.len(), path.display());
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
