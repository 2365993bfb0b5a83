//! Social profile discovery: link extraction from lead websites, plus a
//! Google-search fallback for Instagram profiles the site never links.

use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::models::{Lead, SocialProfiles};
use crate::services::GoogleSearchService;
use crate::website::{is_plausible_email, normalize_url, PageFetcher};

/// Paths checked on every site besides the homepage.
const COMMON_PAGES: [&str; 6] = ["", "/contato", "/contact", "/sobre", "/about", "/fale-conosco"];

/// Extracts social profiles from the pages of a lead's website.
pub struct SocialExtractor {
    fetcher: PageFetcher,
}

impl SocialExtractor {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }

    /// Visit the homepage and common contact pages, harvest links, and fill
    /// the lead's social profiles. Additive: fields already present are kept.
    pub async fn extract(&self, lead: &mut Lead) {
        let Some(site) = lead.website.clone() else {
            tracing::debug!("Lead {} has no site, skipping", lead.name);
            return;
        };

        tracing::info!("Extracting social profiles from {}", site);
        let base_url = normalize_url(&site);

        let mut links: HashSet<String> = HashSet::new();
        for page in COMMON_PAGES {
            let url = format!("{}{}", base_url, page);
            if let Some(html) = self.fetcher.fetch(&url).await {
                collect_links(&html, &base_url, &mut links);
            }
        }

        let found = parse_social_links(&links);
        merge_profiles(&mut lead.social, found);

        if lead.email.is_none() {
            lead.email = mailto_email(&links);
        }

        lead.social_enriched = true;
        tracing::info!(
            "Lead {}: instagram={:?}, linkedin={:?}",
            lead.name,
            lead.social.instagram,
            lead.social.linkedin
        );
    }

    /// Extract for a batch, isolating failures per lead.
    pub async fn extract_leads(&self, leads: &mut [Lead]) {
        let total = leads.len();
        for (i, lead) in leads.iter_mut().enumerate() {
            tracing::info!("Processing {}/{}: {}", i + 1, total, lead.name);
            self.extract(lead).await;
        }
    }
}

/// Pull every link out of a page: anchor hrefs (resolved against the base)
/// and bare URLs in the text.
fn collect_links(html: &str, base_url: &str, links: &mut HashSet<String>) {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").unwrap();

    let base = Url::parse(base_url).ok();
    for a in document.select(&anchors) {
        if let Some(href) = a.value().attr("href") {
            if href.starts_with("mailto:") {
                links.insert(href.to_string());
            } else if let Some(base) = &base {
                if let Ok(resolved) = base.join(href) {
                    links.insert(resolved.to_string());
                }
            }
        }
    }

    // Some pages carry URLs as plain text only.
    let url_regex = Regex::new(r#"https?://[^\s<>"']+|www\.[^\s<>"']+"#).unwrap();
    for m in url_regex.find_iter(html) {
        links.insert(m.as_str().to_string());
    }
}

/// Identify social profiles among harvested links.
fn parse_social_links(links: &HashSet<String>) -> SocialProfiles {
    let instagram_re =
        Regex::new(r"(?i)(?:https?://)?(?:www\.)?(?:instagram\.com|instagr\.am)/([a-zA-Z0-9_.]+)/?").unwrap();
    let linkedin_company_re =
        Regex::new(r"(?i)(?:https?://)?(?:[a-z]{2}\.|www\.)?linkedin\.com/company/([a-zA-Z0-9-]+)/?").unwrap();
    let linkedin_profile_re =
        Regex::new(r"(?i)(?:https?://)?(?:[a-z]{2}\.|www\.)?linkedin\.com/in/([a-zA-Z0-9-]+)/?").unwrap();
    let facebook_re =
        Regex::new(r"(?i)(?:https?://)?(?:www\.)?(?:facebook\.com|fb\.com)/([a-zA-Z0-9.]+)/?").unwrap();
    let twitter_re =
        Regex::new(r"(?i)(?:https?://)?(?:www\.)?(?:twitter\.com|x\.com)/([a-zA-Z0-9_]+)/?").unwrap();
    let youtube_re =
        Regex::new(r"(?i)(?:https?://)?(?:www\.)?youtube\.com/(?:c/|channel/|user/)?([a-zA-Z0-9_-]+)/?").unwrap();

    let mut social = SocialProfiles::default();

    for link in links {
        let lower = link.to_lowercase();

        if lower.contains("instagram.com") || lower.contains("instagr.am") {
            if social.instagram.is_none() {
                if let Some(caps) = instagram_re.captures(link) {
                    let username = &caps[1];
                    if !matches!(username, "p" | "reel" | "stories" | "explore" | "accounts") {
                        social.instagram = Some(format!("https://instagram.com/{}", username));
                    }
                }
            }
        } else if lower.contains("linkedin.com") {
            if let Some(caps) = linkedin_company_re.captures(link) {
                // A company page beats a previously seen personal profile.
                social.linkedin = Some(format!("https://linkedin.com/company/{}", &caps[1]));
                social.linkedin_company = true;
            } else if social.linkedin.is_none() {
                if let Some(caps) = linkedin_profile_re.captures(link) {
                    social.linkedin = Some(format!("https://linkedin.com/in/{}", &caps[1]));
                    social.linkedin_company = false;
                }
            }
        } else if lower.contains("facebook.com") || lower.contains("fb.com") {
            if social.facebook.is_none() {
                if let Some(caps) = facebook_re.captures(link) {
                    let page = &caps[1];
                    if !matches!(page, "sharer" | "share" | "dialog") {
                        social.facebook = Some(format!("https://facebook.com/{}", page));
                    }
                }
            }
        } else if lower.contains("twitter.com") || lower.contains("x.com") {
            if social.twitter.is_none() {
                if let Some(caps) = twitter_re.captures(link) {
                    let username = &caps[1];
                    if !matches!(username, "share" | "intent" | "home") {
                        social.twitter = Some(format!("https://twitter.com/{}", username));
                    }
                }
            }
        } else if lower.contains("youtube.com") {
            if social.youtube.is_none() {
                if let Some(caps) = youtube_re.captures(link) {
                    let channel = &caps[1];
                    if !matches!(channel, "watch" | "results" | "playlist") {
                        social.youtube = Some(format!("https://youtube.com/{}", channel));
                    }
                }
            }
        }
    }

    social
}

/// Copy discovered profiles into the lead, never clearing what is there.
fn merge_profiles(existing: &mut SocialProfiles, found: SocialProfiles) {
    if existing.instagram.is_none() {
        existing.instagram = found.instagram;
    }
    if existing.linkedin.is_none() {
        existing.linkedin = found.linkedin;
        existing.linkedin_company = found.linkedin_company;
    }
    if existing.facebook.is_none() {
        existing.facebook = found.facebook;
    }
    if existing.twitter.is_none() {
        existing.twitter = found.twitter;
    }
    if existing.youtube.is_none() {
        existing.youtube = found.youtube;
    }
}

/// First plausible address among the mailto links.
fn mailto_email(links: &HashSet<String>) -> Option<String> {
    for link in links {
        if let Some(rest) = link.strip_prefix("mailto:") {
            let email = rest.split('?').next().unwrap_or("");
            if is_plausible_email(email) {
                return Some(email.to_lowercase());
            }
        }
    }
    None
}

// ============ Instagram Finder ============

/// Usernames that are never the business profile.
const USERNAME_BLACKLIST: [&str; 11] = [
    "instagram",
    "explore",
    "p",
    "reel",
    "stories",
    "esselimarketing",
    "agenciadigital",
    "marketingdigital",
    "socialmedia",
    "agenciamkt",
    "publicidade",
];

/// Result-title words that flag a marketing agency instead of the business.
const TITLE_BLACKLIST: [&str; 8] = [
    "marketing",
    "agencia",
    "publicidade",
    "midia",
    "social media",
    "designer",
    "propaganda",
    "assessoria",
];

/// Finds Instagram profiles via Google search when site extraction comes up
/// empty: `"<name>" <city> site:instagram.com`, gated by a blacklist and a
/// name-similarity check.
pub struct InstagramFinder {
    search: GoogleSearchService,
    city: String,
}

impl InstagramFinder {
    pub fn new(search: GoogleSearchService, city: String) -> Self {
        Self { search, city }
    }

    /// Search for the business profile. `None` on miss or search failure;
    /// never fatal for the lead.
    pub async fn find(&self, business_name: &str) -> Option<String> {
        let clean_name = clean_business_name(business_name);
        if clean_name.is_empty() {
            return None;
        }

        let query = format!("\"{}\" {} site:instagram.com", clean_name, self.city);
        tracing::info!("Searching Instagram: {}", query);

        let hits = match self.search.organic_results(&query, 5).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!("Instagram search failed: {}", e);
                return None;
            }
        };

        for hit in hits {
            if !hit.link.to_lowercase().contains("instagram.com") {
                continue;
            }
            if let Some(username) = extract_instagram_username(&hit.link) {
                if is_profile_match(&username, &clean_name, &hit.title) {
                    let url = format!("https://instagram.com/{}", username);
                    tracing::info!("Instagram found: {}", url);
                    return Some(url);
                }
            }
        }

        None
    }

    /// Fill Instagram for every lead still missing it.
    pub async fn enrich_leads(&self, leads: &mut [Lead]) -> usize {
        let mut found = 0;
        let total = leads.len();

        for (i, lead) in leads.iter_mut().enumerate() {
            if lead.social.instagram.is_some() {
                continue;
            }
            tracing::info!("Searching Instagram {}/{}: {}", i + 1, total, lead.name);
            if let Some(url) = self.find(&lead.name).await {
                lead.social.instagram = Some(url);
                found += 1;
            }
        }

        tracing::info!("Instagram finder: {} new profiles", found);
        found
    }
}

/// Strip legal suffixes and punctuation so the name compares cleanly.
fn clean_business_name(name: &str) -> String {
    let suffixes = [
        "ltda",
        "eireli",
        "s/a",
        "s.a.",
        "- belo horizonte",
        "- bh",
    ];

    let mut clean = name.to_lowercase();
    for suffix in suffixes {
        clean = clean.replace(suffix, "");
    }

    let clean: String = clean
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    clean.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_instagram_username(url: &str) -> Option<String> {
    let re = Regex::new(r"(?i)instagram\.com/([a-zA-Z0-9_.]+)/?").unwrap();
    let caps = re.captures(url)?;
    let username = caps[1].to_lowercase();
    if matches!(username.as_str(), "p" | "reel" | "stories" | "explore" | "accounts") {
        return None;
    }
    Some(username)
}

/// Accept a candidate only when it plausibly belongs to the business:
/// blacklists first, then shared name words or string similarity.
fn is_profile_match(username: &str, business_name: &str, result_title: &str) -> bool {
    let username_lower = username.to_lowercase();
    let title_lower = result_title.to_lowercase();
    let name_lower = business_name.to_lowercase();

    if USERNAME_BLACKLIST.contains(&username_lower.as_str()) {
        return false;
    }
    for word in TITLE_BLACKLIST {
        if title_lower.contains(word) && !name_lower.contains(word) {
            return false;
        }
    }

    let clean_username: String = username_lower.chars().filter(|c| c.is_alphanumeric()).collect();
    let clean_name: String = name_lower.chars().filter(|c| c.is_alphanumeric()).collect();

    // A significant name word inside the username is enough.
    for word in name_lower.split_whitespace() {
        if word.len() >= 4 && clean_username.contains(word) {
            return true;
        }
    }

    if strsim::normalized_levenshtein(&clean_username, &clean_name) >= 0.4 {
        return true;
    }

    // Last resort: the result title mentions the business.
    name_lower
        .split_whitespace()
        .any(|word| word.len() >= 4 && title_lower.contains(word))
}
