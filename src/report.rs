//! Console rendering of a classified batch.

use crate::aggregator::TierBreakdown;
use crate::classifier::ClassificationTier;
use crate::classifier::prompt::truncate_chars;
use crate::email::CanonicalEmail;
use crate::orchestrator::ClassifiedItem;

const BODY_PREVIEW_CHARS: usize = 1000;

pub fn tier_icon(tier: ClassificationTier) -> &'static str {
    match tier {
        ClassificationTier::Tier1 => "🟢",
        ClassificationTier::Tier2 => "🟡",
        ClassificationTier::Tier3 => "🔴",
        ClassificationTier::NotSponsorship => "⚪",
        ClassificationTier::Unclear => "🔵",
    }
}

pub fn tier_title(tier: ClassificationTier) -> &'static str {
    match tier {
        ClassificationTier::Tier1 => "Tier 1: fixed payment only",
        ClassificationTier::Tier2 => "Tier 2: fixed payment + view-based revenue",
        ClassificationTier::Tier3 => "Tier 3: fixed payment + view-based revenue + sales commission",
        ClassificationTier::NotSponsorship => "Not a sponsorship inquiry",
        ClassificationTier::Unclear => "Unclear",
    }
}

/// Body preview, snippet when the body is empty, capped at 1000 characters.
pub fn body_preview(email: &CanonicalEmail) -> String {
    let content = email.content();
    let preview = truncate_chars(content, BODY_PREVIEW_CHARS);
    if preview.len() < content.len() {
        format!("{}...", preview)
    } else {
        preview.to_string()
    }
}

pub fn print_summary(breakdown: &TierBreakdown<'_>) {
    println!("{}", "=".repeat(80));
    println!("📊 Total emails: {}", breakdown.total());
    for (tier, count) in breakdown.counts() {
        println!("   {} {:<16} {}", tier_icon(tier), tier.as_str(), count);
    }
    println!("{}", "=".repeat(80));
}

pub fn print_breakdown(breakdown: &TierBreakdown<'_>) {
    for (tier, items) in breakdown.iter() {
        println!("\n{} {} ({})", tier_icon(tier), tier_title(tier), items.len());
        println!("{}", "-".repeat(60));

        if items.is_empty() {
            println!("   No matching emails.");
            continue;
        }

        for item in items {
            print_card(item);
        }
    }
}

pub fn print_card(item: &ClassifiedItem) {
    println!("### {} {}", tier_icon(item.tier), item.email.subject);
    println!("   From: {}", item.email.sender);
    println!("   Date: {}", item.email.date);
    println!("   Classification: {}", item.tier.as_str().to_uppercase());
    println!("   Explanation: {}", item.explanation);

    let entries = item.details.entries();
    if !entries.is_empty() {
        println!("   Details:");
        for (key, value) in entries {
            println!("     - {}: {}", key, value);
        }
    }

    println!("   📄 Body:");
    for line in body_preview(&item.email).lines() {
        println!("      {}", line);
    }
    println!();
}

/// Dry-run listing of a normalized email.
pub fn print_canonical(index: usize, total: usize, email: &CanonicalEmail) {
    println!("📧 Email {}/{} (ID: {})", index, total, email.id);
    println!("{}", "-".repeat(60));
    println!("   Subject: {}", email.subject);
    println!("   From: {}", email.sender);
    println!("   Date: {}", email.date);
    println!("   Body: {} chars{}", email.body.chars().count(),
             if email.body.is_empty() { " (snippet fallback)" } else { "" });
    for line in truncate_chars(email.content(), 300).lines().take(10) {
        println!("      {}", line);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_preview_caps_and_falls_back() {
        let email = CanonicalEmail {
            body: "가".repeat(1200),
            ..Default::default()
        };
        let preview = body_preview(&email);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 1003);

        let email = CanonicalEmail {
            snippet: "short snippet".to_string(),
            ..Default::default()
        };
        assert_eq!(body_preview(&email), "short snippet");
    }

    #[test]
    fn test_every_tier_has_presentation() {
        for tier in ClassificationTier::ALL {
            assert!(!tier_icon(tier).is_empty());
            assert!(!tier_title(tier).is_empty());
        }
    }
}
