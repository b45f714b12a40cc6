//! Domain expert keyword scoring (C6).

use crate::config::DomainConfig;

pub struct DomainSpec {
    pub domain: &'static str,
    pub agent_id: &'static str,
    pub keywords: &'static [&'static str],
}

/// Keyword taxonomy, grounded verbatim in the original's domain-expert
/// keyword mappings. Domain order is the tie-break order for equal scores.
pub const KEYWORD_MAPPINGS: &[DomainSpec] = &[
    DomainSpec {
        domain: "healthcare",
        agent_id: "healthcare_expert",
        keywords: &[
            "health", "medical", "patient", "clinical", "hospital", "diagnosis", "treatment",
            "hipaa", "ehr", "emr", "healthcare", "doctor", "nurse", "prescription", "pharmacy",
            "telemedicine",
        ],
    },
    DomainSpec {
        domain: "finance",
        agent_id: "finance_expert",
        keywords: &[
            "bank", "banking", "payment", "transaction", "trading", "stock", "investment", "loan",
            "credit", "debit", "fintech", "pci", "sox", "financial", "money", "wallet", "ledger",
        ],
    },
    DomainSpec {
        domain: "ecommerce",
        agent_id: "ecommerce_expert",
        keywords: &[
            "shop", "shopping", "cart", "checkout", "product", "catalog", "order", "inventory",
            "ecommerce", "store", "merchant", "customer", "purchase", "retail",
        ],
    },
    DomainSpec {
        domain: "edtech",
        agent_id: "edtech_expert",
        keywords: &[
            "learning", "course", "student", "education", "school", "university", "lms",
            "training", "curriculum", "assessment", "grade", "classroom", "teacher", "ferpa",
        ],
    },
    DomainSpec {
        domain: "iot",
        agent_id: "iot_expert",
        keywords: &[
            "sensor", "device", "embedded", "telemetry", "iot", "connected", "smart", "mqtt",
            "edge", "firmware", "gateway", "actuator",
        ],
    },
    DomainSpec {
        domain: "gaming",
        agent_id: "gaming_expert",
        keywords: &[
            "game", "gaming", "player", "multiplayer", "score", "level", "match", "leaderboard",
            "realtime", "lobby",
        ],
    },
    DomainSpec {
        domain: "social",
        agent_id: "social_expert",
        keywords: &[
            "social", "feed", "post", "community", "follow", "like", "share", "comment", "friend",
            "network", "timeline", "notification",
        ],
    },
    DomainSpec {
        domain: "legaltech",
        agent_id: "legaltech_expert",
        keywords: &[
            "contract", "legal", "compliance", "document", "attorney", "law", "signature",
            "esign", "clause", "agreement", "regulation",
        ],
    },
    DomainSpec {
        domain: "logistics",
        agent_id: "logistics_expert",
        keywords: &[
            "shipping", "tracking", "warehouse", "delivery", "logistics", "supply chain", "fleet",
            "route", "carrier", "freight", "package",
        ],
    },
    DomainSpec {
        domain: "hrtech",
        agent_id: "hrtech_expert",
        keywords: &[
            "employee", "hiring", "payroll", "hr", "recruitment", "onboarding", "benefits",
            "performance", "applicant", "workforce", "talent",
        ],
    },
];

pub fn agent_id_for_domain(domain: &str) -> Option<&'static str> {
    KEYWORD_MAPPINGS.iter().find(|d| d.domain == domain).map(|d| d.agent_id)
}

/// True if `needle` occurs in `haystack` at a word boundary: the characters
/// immediately before and after the match (if any) are not alphanumeric.
/// `needle` may itself contain a space ("supply chain"), in which case the
/// match spans that phrase literally.
fn word_boundary_contains(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let bytes = haystack.as_bytes();
    let needle_bytes = needle.as_bytes();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !(bytes[abs - 1] as char).is_ascii_alphanumeric();
        let after = abs + needle_bytes.len();
        let after_ok = after >= bytes.len() || !(bytes[after] as char).is_ascii_alphanumeric();
        if before_ok && after_ok {
            return true;
        }
        start = abs + 1;
        if start >= haystack.len() {
            break;
        }
    }
    false
}

fn calculate_score(text: &str, keywords: &[&str]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let matches = keywords.iter().filter(|k| word_boundary_contains(text, k)).count();
    let score = (matches as f64 / (keywords.len() as f64 * 0.3)).min(1.0);
    (score * 100.0).round() / 100.0
}

/// Scores `overview`/`features`/`constraints` against the domain taxonomy.
///
/// Returns domains scoring at or above `config.confidence_threshold`, sorted
/// descending by score, truncated to `config.max_experts`; ties keep the
/// taxonomy's declared order (stable sort over a stable iteration).
pub fn detect_domains(
    overview: &str,
    features: &str,
    constraints: &str,
    config: &DomainConfig,
) -> Vec<(String, f64)> {
    let combined = format!("{} {} {}", overview, features, constraints).to_lowercase();

    let mut scored: Vec<(String, f64)> = KEYWORD_MAPPINGS
        .iter()
        .map(|spec| (spec.domain.to_string(), calculate_score(&combined, spec.keywords)))
        .filter(|(_, score)| *score >= config.confidence_threshold)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(config.max_experts);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> DomainConfig {
        DomainConfig {
            confidence_threshold: 0.3,
            max_experts: 3,
        }
    }

    #[test]
    fn detects_healthcare_from_overview() {
        let domains = detect_domains(
            "Patient records system with HIPAA compliance, doctor scheduling",
            "EHR, prescriptions",
            "",
            &default_config(),
        );
        assert_eq!(domains[0].0, "healthcare");
        assert!(domains[0].1 >= 0.3);
    }

    #[test]
    fn word_boundary_rejects_substring_match() {
        // "bank" must not match inside "embankment".
        assert!(!word_boundary_contains("the embankment collapsed", "bank"));
        assert!(word_boundary_contains("the bank collapsed", "bank"));
    }

    #[test]
    fn multi_word_keyword_matches_as_phrase() {
        assert!(word_boundary_contains("we run a supply chain network", "supply chain"));
        assert!(!word_boundary_contains("we supply chaining services", "supply chain"));
    }

    #[test]
    fn deterministic_for_identical_input() {
        let config = default_config();
        let a = detect_domains("a gaming platform with multiplayer scoring", "", "", &config);
        let b = detect_domains("a gaming platform with multiplayer scoring", "", "", &config);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_matches_excludes_domain() {
        let domains = detect_domains("a simple text editor", "", "", &default_config());
        assert!(!domains.iter().any(|(d, _)| d == "healthcare"));
    }

    #[test]
    fn truncates_to_max_experts() {
        let text = "health medical patient bank payment shop cart learning course sensor device game";
        let domains = detect_domains(text, "", "", &default_config());
        assert!(domains.len() <= 3);
    }
}
