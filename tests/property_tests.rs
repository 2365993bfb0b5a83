/// Property-based tests using proptest
/// Invariants of the scoring core and the boundary validators.
use proptest::prelude::*;

use leadscope::cache::LeadCache;
use leadscope::config::ScoringConfig;
use leadscope::models::{Lead, LeadTier};
use leadscope::scoring::{classify, LeadScorer};
use leadscope::website::{is_plausible_email, normalize_br_phone};

/// Build a lead from one flag per scoring criterion.
#[allow(clippy::too_many_arguments)]
fn lead_from_flags(
    phone: bool,
    email: bool,
    website: bool,
    https: bool,
    reachable: bool,
    instagram: bool,
    instagram_active: bool,
    linkedin: bool,
    linkedin_company: bool,
    rating: Option<f64>,
    reviews: Option<u32>,
    hours: bool,
    priority: bool,
) -> Lead {
    let category = if priority { "clinica medica" } else { "restaurante" };
    let mut lead = Lead::new("Empresa", category, "Belo Horizonte");

    if phone {
        lead.phone = Some("+5531999999999".to_string());
    }
    if email {
        lead.email = Some("contato@empresa.com.br".to_string());
    }
    if website {
        lead.website = Some("https://empresa.com.br".to_string());
    }
    lead.site_https = https;
    lead.site_reachable = reachable;
    if instagram {
        lead.social.instagram = Some("https://instagram.com/empresa".to_string());
    }
    if instagram_active {
        lead.social.instagram_active = Some(true);
    }
    if linkedin {
        lead.social.linkedin = Some("https://linkedin.com/company/empresa".to_string());
    }
    lead.social.linkedin_company = linkedin_company;
    lead.maps.rating = rating;
    lead.maps.review_count = reviews;
    lead.maps.has_hours = hours;

    lead
}

prop_compose! {
    fn arb_lead()(
        phone in any::<bool>(),
        email in any::<bool>(),
        website in any::<bool>(),
        https in any::<bool>(),
        reachable in any::<bool>(),
        instagram in any::<bool>(),
        instagram_active in any::<bool>(),
        linkedin in any::<bool>(),
        linkedin_company in any::<bool>(),
        rating in proptest::option::of(0.0f64..=5.0),
        reviews in proptest::option::of(0u32..500),
        hours in any::<bool>(),
        priority in any::<bool>(),
    ) -> Lead {
        lead_from_flags(
            phone, email, website, https, reachable,
            instagram, instagram_active, linkedin, linkedin_company,
            rating, reviews, hours, priority,
        )
    }
}

proptest! {
    // Score never leaves [0, 100] and the tier always matches its band.
    #[test]
    fn score_stays_in_bounds(lead in arb_lead()) {
        let scorer = LeadScorer::new(ScoringConfig::default());
        let (score, tier) = scorer.score_and_classify(&lead);

        prop_assert!(score <= 100);
        prop_assert_eq!(tier, classify(score));
    }

    // Pure function: the same lead always scores the same.
    #[test]
    fn scoring_is_deterministic(lead in arb_lead()) {
        let scorer = LeadScorer::new(ScoringConfig::default());
        prop_assert_eq!(
            scorer.score_and_classify(&lead),
            scorer.score_and_classify(&lead)
        );
    }

    // Satisfying one more criterion never lowers the score.
    #[test]
    fn satisfying_a_criterion_never_lowers_score(lead in arb_lead(), criterion in 0usize..13) {
        let scorer = LeadScorer::new(ScoringConfig::default());
        let (before, _) = scorer.score_and_classify(&lead);

        let mut improved = lead;
        match criterion {
            0 => improved.phone = Some("+5531999999999".to_string()),
            1 => improved.email = Some("contato@empresa.com.br".to_string()),
            2 => improved.website = Some("https://empresa.com.br".to_string()),
            3 => improved.site_https = true,
            4 => improved.site_reachable = true,
            5 => improved.social.instagram = Some("https://instagram.com/empresa".to_string()),
            6 => improved.social.instagram_active = Some(true),
            7 => improved.social.linkedin = Some("https://linkedin.com/company/e".to_string()),
            8 => improved.social.linkedin_company = true,
            9 => improved.maps.rating = Some(5.0),
            10 => improved.maps.review_count = Some(500),
            11 => improved.maps.has_hours = true,
            _ => improved.category = "clinica medica".to_string(),
        }

        let (after, _) = scorer.score_and_classify(&improved);
        prop_assert!(after >= before, "score dropped from {} to {}", before, after);
    }
}

proptest! {
    // Every integer score maps to exactly one tier, with no gaps at the
    // documented boundaries.
    #[test]
    fn tiers_are_total_over_scores(score in 0u8..=100) {
        let tier = classify(score);
        let expected = if score >= 80 {
            LeadTier::Hot
        } else if score >= 60 {
            LeadTier::Warm
        } else if score >= 40 {
            LeadTier::Cold
        } else {
            LeadTier::Low
        };
        prop_assert_eq!(tier, expected);
    }
}

proptest! {
    // Boundary validators must be total over arbitrary input.
    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = is_plausible_email(&email);
    }

    #[test]
    fn phone_validation_never_panics(phone in "\\PC*") {
        let _ = normalize_br_phone(&phone);
    }

    #[test]
    fn normalized_phones_are_e164(ddd in 11u8..=99, number in 900000000u32..=999999999) {
        let phone = format!("{}{}", ddd, number);
        if let Some(normalized) = normalize_br_phone(&phone) {
            prop_assert!(normalized.starts_with("+55"));
            prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit()));
            prop_assert!(normalized.len() >= 13 && normalized.len() <= 14);
        }
    }

    #[test]
    fn very_short_phones_always_invalid(phone in "[0-9]{0,7}") {
        prop_assert_eq!(normalize_br_phone(&phone), None);
    }
}

proptest! {
    // Cache keys ignore case and whitespace but respect the address.
    #[test]
    fn cache_key_is_case_insensitive(name in "[a-zA-Z ]{1,30}", address in "[a-zA-Z0-9 ]{0,30}") {
        let mut a = Lead::new(name.clone(), "academia", "Belo Horizonte");
        a.address = Some(address.clone());
        let mut b = Lead::new(name.to_uppercase(), "academia", "Belo Horizonte");
        b.address = Some(address.to_uppercase());

        prop_assert_eq!(LeadCache::cache_key(&a), LeadCache::cache_key(&b));
    }

    #[test]
    fn cache_key_length_is_fixed(name in "\\PC{1,40}") {
        let lead = Lead::new(name, "academia", "Belo Horizonte");
        prop_assert_eq!(LeadCache::cache_key(&lead).len(), 16);
    }
}
