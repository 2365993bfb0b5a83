//! Website auditing: reachability and HTTPS checks plus opportunistic
//! contact scavenging from page content.

use std::time::Duration;

use moka::future::Cache;
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::Lead;

/// Shared page fetcher with a per-run cache, so the auditor and the social
/// extractor visit each page once.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    cache: Cache<String, String>,
}

impl PageFetcher {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        // Sized for one run: a handful of pages per lead, 30 minute TTL.
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(30 * 60))
            .max_capacity(10_000)
            .build();

        Ok(Self { client, cache })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Remember a body fetched elsewhere (e.g. by the audit visit).
    pub async fn remember(&self, url: &str, body: String) {
        self.cache.insert(url.to_string(), body).await;
    }

    /// Fetch a page, serving repeats from the cache. `None` on any failure;
    /// a missing page is never fatal for the lead.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        if let Some(cached) = self.cache.get(url).await {
            return Some(cached);
        }

        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    self.cache.insert(url.to_string(), body.clone()).await;
                    Some(body)
                }
                Err(e) => {
                    tracing::warn!("Failed to read body of {}: {}", url, e);
                    None
                }
            },
            Ok(response) => {
                tracing::debug!("{} answered {}", url, response.status());
                None
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                None
            }
        }
    }
}

/// Audits lead websites: one visit sets the `site_reachable` and `site_https`
/// signals independently and scavenges missing contact fields from the page.
pub struct WebsiteAuditor {
    fetcher: PageFetcher,
}

impl WebsiteAuditor {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }

    /// Visit the lead's site. Both flags come from the same visit but stay
    /// independent: an unreachable site keeps whatever HTTPS signal the
    /// source URL carried.
    pub async fn audit(&self, lead: &mut Lead) {
        let Some(site) = lead.website.clone() else {
            return;
        };
        let url = normalize_url(&site);
        tracing::info!("Auditing site: {}", url);

        match self.fetcher.client().get(&url).send().await {
            Ok(response) => {
                lead.site_reachable = response.status() == reqwest::StatusCode::OK;

                // The final URL after redirects decides HTTPS and replaces
                // the captured one.
                let final_url = response.url().to_string();
                lead.site_https = final_url.starts_with("https://");
                lead.website = Some(final_url.trim_end_matches('/').to_string());

                if lead.site_reachable {
                    if let Ok(body) = response.text().await {
                        self.scavenge_contacts(lead, &body);
                        if let Some(site) = lead.website.as_deref() {
                            self.fetcher.remember(site, body).await;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Site {} unreachable: {}", url, e);
                lead.site_reachable = false;
            }
        }
    }

    /// Fill missing email/phone from the fetched page.
    fn scavenge_contacts(&self, lead: &mut Lead, html: &str) {
        if lead.email.is_none() {
            lead.email = find_email_in_html(html);
        }
        if lead.phone.is_none() {
            lead.phone = find_phone_in_html(html);
        }
    }

    /// Audit a batch, one lead at a time. A failed audit leaves the lead with
    /// its flags unset and moves on.
    pub async fn audit_leads(&self, leads: &mut [Lead]) {
        let total = leads.len();
        for (i, lead) in leads.iter_mut().enumerate() {
            tracing::info!("Auditing {}/{}: {}", i + 1, total, lead.name);
            self.audit(lead).await;
        }
    }
}

/// Prefix a scheme when missing and drop the trailing slash.
pub fn normalize_url(url: &str) -> String {
    let url = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };
    url.trim_end_matches('/').to_string()
}

/// Substrings that mark an address as noise rather than a business contact.
const BOGUS_EMAIL_PATTERNS: [&str; 8] = [
    "example.com",
    "teste.com",
    "email.com",
    "sentry.io",
    "wix.com",
    ".png",
    ".jpg",
    ".gif",
];

/// Validate a scavenged email address.
///
/// Checks basic shape, placeholder digit runs, and domains that show up in
/// page noise (asset names, error trackers, site builders).
pub fn is_plausible_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    let lower = email.to_lowercase();
    if BOGUS_EMAIL_PATTERNS.iter().any(|p| lower.contains(p)) {
        return false;
    }

    // Placeholder patterns (repeated digit runs) seen in form templates.
    for fake in ["999999", "111111", "000000", "123456789"] {
        if lower.contains(fake) {
            return false;
        }
    }

    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap();

    email_regex.is_match(email)
}

/// Validate and normalize a Brazilian phone number to E.164
/// (+5531987654321). `None` for anything libphonenumber rejects.
pub fn normalize_br_phone(raw: &str) -> Option<String> {
    if raw.trim().is_empty() || raw.len() < 8 {
        return None;
    }

    match phonenumber::parse(Some(CountryId::BR), raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            Some(number.format().mode(Mode::E164).to_string())
        }
        Ok(_) => None,
        Err(_) => None,
    }
}

/// First plausible email on a page: mailto links win over raw text matches.
pub fn find_email_in_html(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").unwrap();

    for a in document.select(&anchors) {
        if let Some(href) = a.value().attr("href") {
            if let Some(rest) = href.strip_prefix("mailto:") {
                let email = rest.split('?').next().unwrap_or("");
                if is_plausible_email(email) {
                    return Some(email.to_lowercase());
                }
            }
        }
    }

    let email_regex = Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap();
    let found = email_regex
        .find_iter(html)
        .map(|m| m.as_str())
        .find(|e| is_plausible_email(e))
        .map(|e| e.to_lowercase());
    found
}

/// First Brazilian phone number found in page text, normalized when valid.
pub fn find_phone_in_html(html: &str) -> Option<String> {
    let patterns = [
        r"\+55\s*\d{2}\s*\d{4,5}[-.\s]?\d{4}",
        r"\(?\d{2}\)?\s*\d{4,5}[-.\s]?\d{4}",
    ];

    for pattern in patterns {
        let regex = Regex::new(pattern).unwrap();
        for m in regex.find_iter(html) {
            if let Some(normalized) = normalize_br_phone(m.as_str()) {
                return Some(normalized);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_adds_scheme() {
        assert_eq!(normalize_url("acme.com.br"), "https://acme.com.br");
        assert_eq!(normalize_url("http://acme.com.br/"), "http://acme.com.br");
        assert_eq!(
            normalize_url("https://acme.com.br/contato/"),
            "https://acme.com.br/contato"
        );
    }

    #[test]
    fn plausible_emails_accepted() {
        assert!(is_plausible_email("contato@acme.com.br"));
        assert!(is_plausible_email("user+tag@example.org"));
        assert!(is_plausible_email("a.b@c.de"));
    }

    #[test]
    fn malformed_emails_rejected() {
        assert!(!is_plausible_email("not-an-email"));
        assert!(!is_plausible_email("user@domain"));
        assert!(!is_plausible_email("@acme.com"));
        assert!(!is_plausible_email("a@b"));
    }

    #[test]
    fn noise_emails_rejected() {
        assert!(!is_plausible_email("icon@2x.png"));
        assert!(!is_plausible_email("errors@sentry.io"));
        assert!(!is_plausible_email("demo@example.com"));
        assert!(!is_plausible_email("form999999@acme.com.br"));
    }

    #[test]
    fn br_phone_normalizes_to_e164() {
        assert_eq!(
            normalize_br_phone("(31) 98765-4321"),
            Some("+5531987654321".to_string())
        );
        assert_eq!(
            normalize_br_phone("31987654321"),
            Some("+5531987654321".to_string())
        );
        assert_eq!(
            normalize_br_phone("+5531987654321"),
            Some("+5531987654321".to_string())
        );
        // Landline
        assert_eq!(
            normalize_br_phone("(31) 3333-4444"),
            Some("+553133334444".to_string())
        );
    }

    #[test]
    fn invalid_phones_rejected() {
        assert_eq!(normalize_br_phone(""), None);
        assert_eq!(normalize_br_phone("1234"), None);
        assert_eq!(normalize_br_phone("   "), None);
    }

    #[test]
    fn email_found_via_mailto_first() {
        let html = r#"
            <html><body>
            <p>escreva para vendas@acme.com.br</p>
            <a href="mailto:contato@acme.com.br?subject=Oi">Fale conosco</a>
            </body></html>
        "#;
        assert_eq!(
            find_email_in_html(html),
            Some("contato@acme.com.br".to_string())
        );
    }

    #[test]
    fn email_noise_skipped_in_text() {
        let html = r#"<img src="a@2x.png"> <p>contato@acme.com.br</p>"#;
        assert_eq!(
            find_email_in_html(html),
            Some("contato@acme.com.br".to_string())
        );
    }

    #[test]
    fn phone_found_in_text() {
        let html = "<footer>Ligue: (31) 99999-8888</footer>";
        assert_eq!(find_phone_in_html(html), Some("+5531999998888".to_string()));
    }

    #[test]
    fn garbage_digit_runs_ignored() {
        // Matches the loose pattern but fails libphonenumber validation:
        // no Brazilian subscriber number starts with 1.
        let html = "<p>protocolo (99) 1234-5678</p>";
        assert_eq!(find_phone_in_html(html), None);
    }
}
