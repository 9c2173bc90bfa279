use lens_types::PageKind;

/// URL path substrings per page kind, checked in table order.
const KIND_RULES: &[(PageKind, &[&str])] = &[
    (
        PageKind::Form,
        &["/login", "/signup", "/register", "/checkout", "/contact", "/form"],
    ),
    (
        PageKind::Dashboard,
        &["/dashboard", "/admin", "/analytics", "/metrics", "/stats"],
    ),
    (
        PageKind::Document,
        &["/article", "/blog", "/post", "/news", "/wiki", "/doc"],
    ),
    (
        PageKind::Listing,
        &["/search", "/results", "/find", "/query", "/list", "/catalog"],
    ),
];

/// Classify a page from its URL path and an optional `og:type` meta hint.
pub fn classify(path: &str, og_type: Option<&str>) -> PageKind {
    let path = path.to_ascii_lowercase();
    for (kind, patterns) in KIND_RULES {
        if patterns.iter().any(|p| path.contains(p)) {
            return *kind;
        }
    }
    match og_type {
        Some(t) if t.eq_ignore_ascii_case("article") => PageKind::Document,
        _ => PageKind::Unknown,
    }
}
