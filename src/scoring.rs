//! Lead scoring and tier classification.
//!
//! The scorer is a pure function over a populated `Lead`: no I/O, no shared
//! state, safe to call concurrently. Points accumulate across three groups,
//! each criterion contributing zero or its full weight:
//!
//! - contact data (40): phone, email, website, HTTPS, reachable
//! - digital presence (30): Instagram, Instagram active, LinkedIn, company page
//! - business quality (30): rating >= 4.0, 50+ reviews, published hours,
//!   priority category
//!
//! An absent field fails its criterion; it is never an error.

use chrono::Utc;

use crate::config::ScoringConfig;
use crate::models::{Lead, LeadTier};

/// Computes qualification scores and tiers.
pub struct LeadScorer {
    config: ScoringConfig,
}

impl LeadScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score and classify a lead. Pure and total: defined for every
    /// combination of present/absent fields, never fails.
    pub fn score_and_classify(&self, lead: &Lead) -> (u8, LeadTier) {
        let total = self.score_contact_data(lead)
            + self.score_digital_presence(lead)
            + self.score_business_quality(lead);

        let score = total.min(100) as u8;
        (score, classify(score))
    }

    /// Score the lead and stamp the derived fields. The only place `score`,
    /// `tier` and `scored_at` are written.
    pub fn apply(&self, lead: &mut Lead) {
        let (score, tier) = self.score_and_classify(lead);
        lead.score = score;
        lead.tier = tier;
        lead.scored_at = Some(Utc::now());

        tracing::info!(
            "Lead {}: score={}, tier={}",
            lead.name,
            score,
            tier.as_str()
        );
    }

    /// Score a batch and order it best-first.
    pub fn score_leads(&self, leads: &mut [Lead]) {
        for lead in leads.iter_mut() {
            self.apply(lead);
        }
        leads.sort_by(|a, b| b.score.cmp(&a.score));
    }

    /// Contact data group, capped at 40 with the default weights.
    fn score_contact_data(&self, lead: &Lead) -> u32 {
        let w = &self.config.weights;
        let mut score = 0;

        if lead.phone.is_some() {
            score += w.has_phone;
        }
        if lead.email.is_some() {
            score += w.has_email;
        }
        if lead.website.is_some() {
            score += w.has_website;

            // HTTPS and reachability only mean something with a website.
            if lead.site_https {
                score += w.website_https;
            }
            if lead.site_reachable {
                score += w.website_reachable;
            }
        }

        score
    }

    /// Digital presence group, capped at 30 with the default weights.
    fn score_digital_presence(&self, lead: &Lead) -> u32 {
        let w = &self.config.weights;
        let social = &lead.social;
        let mut score = 0;

        if social.instagram.is_some() {
            score += w.has_instagram;
            if social.instagram_active == Some(true) {
                score += w.instagram_active;
            }
        }
        if social.linkedin.is_some() {
            score += w.has_linkedin;
            if social.linkedin_company {
                score += w.linkedin_company_page;
            }
        }

        score
    }

    /// Business quality group, capped at 30 with the default weights.
    fn score_business_quality(&self, lead: &Lead) -> u32 {
        let w = &self.config.weights;
        let maps = &lead.maps;
        let mut score = 0;

        if maps.rating.is_some_and(|r| r >= self.config.min_rating) {
            score += w.high_rating;
        }
        if maps.review_count.is_some_and(|n| n >= self.config.min_reviews) {
            score += w.many_reviews;
        }
        if maps.has_hours {
            score += w.has_hours;
        }
        if self.config.is_priority_category(&lead.category) {
            score += w.priority_category;
        }

        score
    }

    /// Aggregate statistics for a scored batch.
    pub fn summary(&self, leads: &[Lead]) -> ScoreSummary {
        let mut summary = ScoreSummary {
            total: leads.len(),
            ..Default::default()
        };
        if leads.is_empty() {
            return summary;
        }

        let mut sum = 0u32;
        summary.min_score = u8::MAX;
        for lead in leads {
            sum += lead.score as u32;
            summary.min_score = summary.min_score.min(lead.score);
            summary.max_score = summary.max_score.max(lead.score);
            match lead.tier {
                LeadTier::Hot => summary.hot += 1,
                LeadTier::Warm => summary.warm += 1,
                LeadTier::Cold => summary.cold += 1,
                LeadTier::Low => summary.low += 1,
            }
        }
        summary.mean_score = sum as f64 / leads.len() as f64;

        summary
    }
}

/// Map a score to its tier. Total over 0-255; every integer 0-100 lands in
/// exactly one band.
pub fn classify(score: u8) -> LeadTier {
    match score {
        80..=u8::MAX => LeadTier::Hot,
        60..=79 => LeadTier::Warm,
        40..=59 => LeadTier::Cold,
        _ => LeadTier::Low,
    }
}

/// Tier distribution and score statistics for one run.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScoreSummary {
    pub total: usize,
    pub mean_score: f64,
    pub min_score: u8,
    pub max_score: u8,
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
    pub low: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SocialProfiles;

    fn scorer() -> LeadScorer {
        LeadScorer::new(ScoringConfig::default())
    }

    fn bare_lead() -> Lead {
        Lead::new("Empresa Teste", "restaurante", "Belo Horizonte")
    }

    #[test]
    fn empty_lead_scores_zero_low() {
        let (score, tier) = scorer().score_and_classify(&bare_lead());
        assert_eq!(score, 0);
        assert_eq!(tier, LeadTier::Low);
    }

    #[test]
    fn fully_populated_lead_scores_hundred_hot() {
        let mut lead = Lead::new("Clinica Premium", "clinica medica", "Belo Horizonte");
        lead.phone = Some("+5531999999999".to_string());
        lead.email = Some("contato@clinica.com.br".to_string());
        lead.website = Some("https://clinica.com.br".to_string());
        lead.site_https = true;
        lead.site_reachable = true;
        lead.social = SocialProfiles {
            instagram: Some("https://instagram.com/clinica".to_string()),
            instagram_active: Some(true),
            linkedin: Some("https://linkedin.com/company/clinica".to_string()),
            linkedin_company: true,
            ..Default::default()
        };
        lead.maps.rating = Some(4.8);
        lead.maps.review_count = Some(150);
        lead.maps.has_hours = true;

        let (score, tier) = scorer().score_and_classify(&lead);
        assert_eq!(score, 100);
        assert_eq!(tier, LeadTier::Hot);
    }

    #[test]
    fn full_contact_plus_quality_is_warm() {
        // phone + email + site(https, reachable) = 40; rating 4.5 and 60
        // reviews = 20; no hours, no priority category.
        let mut lead = bare_lead();
        lead.phone = Some("+5531988888888".to_string());
        lead.email = Some("contato@empresa.com.br".to_string());
        lead.website = Some("https://empresa.com.br".to_string());
        lead.site_https = true;
        lead.site_reachable = true;
        lead.maps.rating = Some(4.5);
        lead.maps.review_count = Some(60);

        let (score, tier) = scorer().score_and_classify(&lead);
        assert_eq!(score, 60);
        assert_eq!(tier, LeadTier::Warm);
    }

    #[test]
    fn phone_only_is_low() {
        let mut lead = bare_lead();
        lead.phone = Some("+5531977777777".to_string());

        let (score, tier) = scorer().score_and_classify(&lead);
        assert_eq!(score, 10);
        assert_eq!(tier, LeadTier::Low);
    }

    #[test]
    fn contact_and_social_with_rating_is_hot() {
        // 40 contact + 15 Instagram + 15 LinkedIn + 10 rating = 80.
        let mut lead = bare_lead();
        lead.phone = Some("+5531966666666".to_string());
        lead.email = Some("oi@empresa.com.br".to_string());
        lead.website = Some("https://empresa.com.br".to_string());
        lead.site_https = true;
        lead.site_reachable = true;
        lead.social = SocialProfiles {
            instagram: Some("https://instagram.com/empresa".to_string()),
            instagram_active: Some(true),
            linkedin: Some("https://linkedin.com/company/empresa".to_string()),
            linkedin_company: true,
            ..Default::default()
        };
        lead.maps.rating = Some(4.2);

        let (score, tier) = scorer().score_and_classify(&lead);
        assert_eq!(score, 80);
        assert_eq!(tier, LeadTier::Hot);
    }

    #[test]
    fn https_without_website_earns_nothing() {
        // The flag alone must not count when no website was captured.
        let mut lead = bare_lead();
        lead.site_https = true;
        lead.site_reachable = true;

        let (score, _) = scorer().score_and_classify(&lead);
        assert_eq!(score, 0);
    }

    #[test]
    fn unknown_instagram_activity_earns_no_bonus() {
        let mut lead = bare_lead();
        lead.social.instagram = Some("https://instagram.com/empresa".to_string());
        lead.social.instagram_active = None;

        let (score, _) = scorer().score_and_classify(&lead);
        assert_eq!(score, 10);
    }

    #[test]
    fn rating_below_threshold_earns_nothing() {
        let mut lead = bare_lead();
        lead.maps.rating = Some(3.9);
        lead.maps.review_count = Some(49);

        let (score, _) = scorer().score_and_classify(&lead);
        assert_eq!(score, 0);
    }

    #[test]
    fn priority_category_is_case_insensitive() {
        let mut lead = bare_lead();
        lead.category = "Clinica Medica".to_string();

        let (score, _) = scorer().score_and_classify(&lead);
        assert_eq!(score, 5);
    }

    #[test]
    fn classify_band_edges() {
        assert_eq!(classify(0), LeadTier::Low);
        assert_eq!(classify(39), LeadTier::Low);
        assert_eq!(classify(40), LeadTier::Cold);
        assert_eq!(classify(59), LeadTier::Cold);
        assert_eq!(classify(60), LeadTier::Warm);
        assert_eq!(classify(79), LeadTier::Warm);
        assert_eq!(classify(80), LeadTier::Hot);
        assert_eq!(classify(100), LeadTier::Hot);
    }

    #[test]
    fn scoring_is_idempotent() {
        let mut lead = bare_lead();
        lead.phone = Some("+5531955555555".to_string());
        lead.maps.rating = Some(4.4);

        let s = scorer();
        let first = s.score_and_classify(&lead);
        let second = s.score_and_classify(&lead);
        assert_eq!(first, second);
    }

    #[test]
    fn apply_stamps_derived_fields() {
        let mut lead = bare_lead();
        lead.phone = Some("+5531944444444".to_string());

        scorer().apply(&mut lead);
        assert_eq!(lead.score, 10);
        assert_eq!(lead.tier, LeadTier::Low);
        assert!(lead.scored_at.is_some());
    }

    #[test]
    fn score_leads_orders_best_first() {
        let mut leads = vec![
            Lead::new("Lead 1", "academia", "Belo Horizonte"),
            {
                let mut l = Lead::new("Lead 2", "pet shop", "Belo Horizonte");
                l.phone = Some("+5531999999999".to_string());
                l
            },
            {
                let mut l = Lead::new("Lead 3", "clinica medica", "Belo Horizonte");
                l.website = Some("https://site.com".to_string());
                l
            },
        ];

        scorer().score_leads(&mut leads);
        assert!(leads[0].score >= leads[1].score);
        assert!(leads[1].score >= leads[2].score);
    }

    #[test]
    fn summary_counts_tiers() {
        let mut leads = vec![bare_lead(), bare_lead(), bare_lead()];
        leads[0].score = 85;
        leads[0].tier = LeadTier::Hot;
        leads[1].score = 65;
        leads[1].tier = LeadTier::Warm;
        leads[2].score = 45;
        leads[2].tier = LeadTier::Cold;

        let summary = scorer().summary(&leads);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.hot, 1);
        assert_eq!(summary.warm, 1);
        assert_eq!(summary.cold, 1);
        assert_eq!(summary.low, 0);
        assert_eq!(summary.max_score, 85);
        assert_eq!(summary.min_score, 45);
        assert!((summary.mean_score - 65.0).abs() < f64::EPSILON);
    }
}
