use serde::{Deserialize, Serialize};

/// Runtime configuration, loaded once from the environment and passed into
/// every component at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// SerpAPI key. Absent means the paid maps source is unavailable and the
    /// direct scraper must be used.
    pub serpapi_key: Option<String>,
    /// SerpAPI endpoint, overridable for tests.
    pub serpapi_base_url: String,
    /// Hunter.io key. Absent disables the enrichment stage.
    pub hunter_api_key: Option<String>,
    /// Hunter.io endpoint, overridable for tests.
    pub hunter_base_url: String,
    /// Airtable personal access token.
    pub airtable_api_key: Option<String>,
    /// Airtable base id.
    pub airtable_base_id: Option<String>,
    /// Airtable table name.
    pub airtable_table: String,
    /// Airtable endpoint, overridable for tests.
    pub airtable_base_url: String,
    /// Location appended to every maps query.
    pub search_location: String,
    /// City used for natural keys and the Instagram finder.
    pub search_city: String,
    /// Interface language for maps queries.
    pub search_language: String,
    /// Country code for maps queries.
    pub search_country: String,
    /// User agent for direct site visits.
    pub user_agent: String,
    /// Per-request timeout, seconds.
    pub timeout_secs: u64,
    /// Seen-lead cache file.
    pub cache_path: String,
    /// Pipeline checkpoint file.
    pub checkpoint_path: String,
    /// Categories searched when the CLI names none.
    pub business_types: Vec<String>,
    /// Scoring weights and priority categories.
    pub scoring: ScoringConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            serpapi_key: optional_env("SERPAPI_KEY"),
            serpapi_base_url: std::env::var("SERPAPI_BASE_URL")
                .unwrap_or_else(|_| "https://serpapi.com".to_string()),
            hunter_api_key: optional_env("HUNTER_API_KEY"),
            hunter_base_url: std::env::var("HUNTER_BASE_URL")
                .unwrap_or_else(|_| "https://api.hunter.io/v2".to_string()),
            airtable_api_key: optional_env("AIRTABLE_API_KEY"),
            airtable_base_id: optional_env("AIRTABLE_BASE_ID"),
            airtable_table: std::env::var("AIRTABLE_TABLE_NAME")
                .unwrap_or_else(|_| "Leads".to_string()),
            airtable_base_url: std::env::var("AIRTABLE_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(validate_url)
                .transpose()?
                .unwrap_or_else(|| "https://api.airtable.com/v0".to_string()),
            search_location: std::env::var("SEARCH_LOCATION")
                .unwrap_or_else(|_| "Belo Horizonte, MG, Brasil".to_string()),
            search_city: std::env::var("SEARCH_CITY")
                .unwrap_or_else(|_| "Belo Horizonte".to_string()),
            search_language: std::env::var("SEARCH_LANGUAGE").unwrap_or_else(|_| "pt-br".to_string()),
            search_country: std::env::var("SEARCH_COUNTRY").unwrap_or_else(|_| "br".to_string()),
            user_agent: std::env::var("USER_AGENT").unwrap_or_else(|_| {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                 AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/120.0.0.0 Safari/537.36"
                    .to_string()
            }),
            timeout_secs: std::env::var("TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("TIMEOUT_SECONDS must be a number of seconds"))?,
            cache_path: std::env::var("LEAD_CACHE_PATH")
                .unwrap_or_else(|_| "data/lead_cache.json".to_string()),
            checkpoint_path: std::env::var("CHECKPOINT_PATH")
                .unwrap_or_else(|_| "data/checkpoint.json".to_string()),
            business_types: default_business_types(),
            scoring: ScoringConfig::default(),
        };

        if config.serpapi_key.is_none() {
            tracing::warn!("SERPAPI_KEY not set, only the direct maps scraper is available");
        }

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("SerpAPI endpoint: {}", config.serpapi_base_url);
        tracing::debug!("Search location: {}", config.search_location);
        if config.airtable_api_key.is_some() {
            tracing::debug!(
                "Airtable target: {}/{}",
                config.airtable_base_id.as_deref().unwrap_or("<missing base>"),
                config.airtable_table
            );
        }

        Ok(config)
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn validate_url(url: String) -> anyhow::Result<String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", url);
    }
    Ok(url)
}

/// Business categories searched by default.
pub fn default_business_types() -> Vec<String> {
    [
        "clinica medica",
        "clinica odontologica",
        "escritorio advocacia",
        "escritorio contabilidade",
        "imobiliaria",
        "academia",
        "restaurante",
        "pet shop",
        "salao de beleza",
        "loja de roupas",
        "escola particular",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Point weights for the scorer, one per criterion.
///
/// Every criterion contributes either zero or its full weight. Group totals
/// with the defaults: contact 40, digital presence 30, business quality 30.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub has_phone: u32,
    pub has_email: u32,
    pub has_website: u32,
    pub website_https: u32,
    pub website_reachable: u32,
    pub has_instagram: u32,
    pub instagram_active: u32,
    pub has_linkedin: u32,
    pub linkedin_company_page: u32,
    pub high_rating: u32,
    pub many_reviews: u32,
    pub has_hours: u32,
    pub priority_category: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            has_phone: 10,
            has_email: 10,
            has_website: 10,
            website_https: 5,
            website_reachable: 5,
            has_instagram: 10,
            instagram_active: 5,
            has_linkedin: 10,
            linkedin_company_page: 5,
            high_rating: 10,
            many_reviews: 10,
            has_hours: 5,
            priority_category: 5,
        }
    }
}

/// Scorer configuration: weights, thresholds and the priority category list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    /// Minimum rating counted as "high".
    pub min_rating: f64,
    /// Minimum review count counted as "many".
    pub min_reviews: u32,
    /// Categories that earn the priority bonus, matched case-insensitively.
    pub priority_categories: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            min_rating: 4.0,
            min_reviews: 50,
            priority_categories: [
                "clinica medica",
                "clinica odontologica",
                "escritorio advocacia",
                "escritorio contabilidade",
                "imobiliaria",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl ScoringConfig {
    /// Case-insensitive membership test against the priority list.
    pub fn is_priority_category(&self, category: &str) -> bool {
        let category = category.to_lowercase();
        self.priority_categories
            .iter()
            .any(|c| c.to_lowercase() == category)
    }
}
