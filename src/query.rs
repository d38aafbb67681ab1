//! Builds the search query handed to the mail source.

/// Sponsorship, advertisement, partnership and influencer-marketing terms,
/// Korean first with their English equivalents.
pub const SPONSORSHIP_KEYWORDS: &[&str] = &[
    "협찬",
    "광고",
    "홍보",
    "제휴",
    "파트너십",
    "sponsorship",
    "sponsored",
    "partnership",
    "collaboration",
    "influencer",
    "인플루언서",
    "마케팅",
    "브랜드",
    "수익",
    "광고비",
    "협찬료",
];

pub struct QueryBuilder;

impl QueryBuilder {
    /// A user-supplied query is passed through untouched; otherwise the
    /// keyword set is joined with `OR`. Terms stay unquoted so the provider
    /// can match them partially.
    pub fn build(user_query: Option<&str>) -> String {
        match user_query.map(str::trim) {
            Some(query) if !query.is_empty() => query.to_string(),
            _ => Self::keyword_query(SPONSORSHIP_KEYWORDS),
        }
    }

    pub fn keyword_query(keywords: &[&str]) -> String {
        keywords.join(" OR ")
    }
}
