//! Request classification
//!
//! Ordered route table evaluated first-match, plus the cache-eligibility
//! rules for dynamic paths. Both are pure and independent of request
//! handling.

use axum::http::Method;
use regex::Regex;

/// Route outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// `GET /health`
    Health,
    /// `/uploads/*` object serving
    Upload,
    /// Static asset by extension, or the root document
    StaticAsset,
    /// `/api/*` and `/public/*` proxy
    Dynamic,
    /// No rule matched
    Unmatched,
}

/// Path predicate of a route rule
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// Whole path equals
    Exact(&'static str),
    /// Path starts with any of the prefixes
    Prefix(Vec<&'static str>),
    /// Path matches the regex
    Pattern(Regex),
    /// Any of the inner matchers
    AnyOf(Vec<PathMatcher>),
}

impl PathMatcher {
    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == *p,
            Self::Prefix(prefixes) => prefixes.iter().any(|p| path.starts_with(p)),
            Self::Pattern(re) => re.is_match(path),
            Self::AnyOf(inner) => inner.iter().any(|m| m.matches(path)),
        }
    }
}

/// One entry of the route table
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// Rule name, for logs
    pub name: &'static str,
    /// Required method; `None` accepts any
    pub method: Option<Method>,
    /// Path predicate
    pub matcher: PathMatcher,
    /// Outcome when matched
    pub kind: RouteKind,
}

/// Static asset extensions served cache-first
pub const STATIC_EXTENSIONS: &str = r"\.(?:html|js|css|png|jpg|jpeg|gif|svg|webp|ico|woff2?|ttf|mp4|webm)$";

/// Ordered route table
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Empty table; everything is unmatched
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule; earlier rules win
    pub fn with_rule(mut self, rule: RouteRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The edge's route table.
    ///
    /// Uploads are checked before the static-extension rule so uploaded
    /// images and videos come from the object store, not the asset origin.
    pub fn standard() -> Self {
        Self::new()
            .with_rule(RouteRule {
                name: "health",
                method: Some(Method::GET),
                matcher: PathMatcher::Exact("/health"),
                kind: RouteKind::Health,
            })
            .with_rule(RouteRule {
                name: "uploads",
                method: None,
                matcher: PathMatcher::Prefix(vec!["/uploads/"]),
                kind: RouteKind::Upload,
            })
            .with_rule(RouteRule {
                name: "static",
                method: Some(Method::GET),
                matcher: PathMatcher::AnyOf(vec![
                    PathMatcher::Exact("/"),
                    PathMatcher::Pattern(compile(STATIC_EXTENSIONS)),
                ]),
                kind: RouteKind::StaticAsset,
            })
            .with_rule(RouteRule {
                name: "dynamic",
                method: None,
                matcher: PathMatcher::Prefix(vec!["/api/", "/public/"]),
                kind: RouteKind::Dynamic,
            })
    }

    /// Classify a request
    pub fn classify(&self, method: &Method, path: &str) -> RouteKind {
        self.rules
            .iter()
            .find(|r| r.method.as_ref().map_or(true, |m| m == method) && r.matcher.matches(path))
            .map(|r| r.kind)
            .unwrap_or(RouteKind::Unmatched)
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Dynamic paths whose GET responses may be cached and served stale
#[derive(Debug, Clone)]
pub struct CacheRules {
    patterns: Vec<(&'static str, Regex)>,
}

impl CacheRules {
    /// The pre-approved idempotent read endpoints
    pub fn standard() -> Self {
        Self {
            patterns: vec![
                ("client_measurements_meals", compile(r"/clients/\d+/(?:measurements|meals)")),
                ("public_profile", compile(r"/public/profile/[a-zA-Z0-9_-]+")),
                ("trainer_dashboard", compile(r"/trainers/dashboard")),
            ],
        }
    }

    /// Eligible iff GET and a pattern matches
    pub fn is_eligible(&self, method: &Method, path: &str) -> bool {
        method == Method::GET && self.matching_rule(path).is_some()
    }

    /// Name of the first matching pattern
    pub fn matching_rule(&self, path: &str) -> Option<&'static str> {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(path))
            .map(|(name, _)| *name)
    }
}

impl Default for CacheRules {
    fn default() -> Self {
        Self::standard()
    }
}

/// KV key for a dynamic path: `kv:` + path without `/api/`, separators as `:`
pub fn cache_key(path: &str) -> String {
    let rest = path.strip_prefix("/api/").unwrap_or(path);
    let mut key = String::with_capacity(rest.len() + 3);
    key.push_str("kv:");
    key.extend(rest.chars().map(|c| match c {
        '/' | '#' | '?' => ':',
        other => other,
    }));
    key
}

/// Path forwarded to the origin: a leading `/api/` becomes `/`
pub fn forward_path(path: &str) -> String {
    match path.strip_prefix("/api/") {
        Some(rest) => format!("/{}", rest),
        None => path.to_string(),
    }
}

/// Join a base address, a path and an optional query
pub fn join_url(base: &str, path: &str, query: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    match query {
        Some(q) if !q.is_empty() => format!("{}{}?{}", base, path, q),
        _ => format!("{}{}", base, path),
    }
}

// Patterns are compile-time constants covered by the tests below
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid route pattern {pattern}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_route_order() {
        let table = RouteTable::standard();

        assert_eq!(table.classify(&Method::GET, "/health"), RouteKind::Health);
        assert_eq!(table.classify(&Method::POST, "/health"), RouteKind::Unmatched);
        assert_eq!(table.classify(&Method::GET, "/"), RouteKind::StaticAsset);
        assert_eq!(table.classify(&Method::GET, "/assets/app.3f9a.js"), RouteKind::StaticAsset);
        assert_eq!(table.classify(&Method::GET, "/fonts/inter.woff2"), RouteKind::StaticAsset);
        assert_eq!(table.classify(&Method::GET, "/uploads/avatars/1.png"), RouteKind::Upload);
        assert_eq!(table.classify(&Method::GET, "/api/clients/42/meals"), RouteKind::Dynamic);
        assert_eq!(table.classify(&Method::POST, "/api/meals"), RouteKind::Dynamic);
        assert_eq!(table.classify(&Method::GET, "/public/profile/abc"), RouteKind::Dynamic);
        assert_eq!(table.classify(&Method::GET, "/login"), RouteKind::Unmatched);
    }

    #[test]
    fn test_static_requires_get() {
        let table = RouteTable::standard();
        assert_eq!(table.classify(&Method::POST, "/index.html"), RouteKind::Unmatched);
        assert_eq!(table.classify(&Method::POST, "/api/report.html"), RouteKind::Dynamic);
    }

    #[test]
    fn test_eligibility() {
        let rules = CacheRules::standard();

        assert!(rules.is_eligible(&Method::GET, "/api/clients/42/measurements"));
        assert!(rules.is_eligible(&Method::GET, "/api/clients/7/meals"));
        assert!(rules.is_eligible(&Method::GET, "/public/profile/tok_3-x"));
        assert!(rules.is_eligible(&Method::GET, "/api/trainers/dashboard"));

        assert!(!rules.is_eligible(&Method::POST, "/api/clients/42/measurements"));
        assert!(!rules.is_eligible(&Method::GET, "/api/clients/abc/meals"));
        assert!(!rules.is_eligible(&Method::GET, "/api/clients/42/profile"));
        assert!(!rules.is_eligible(&Method::GET, "/api/ai/suggest-meal"));
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("/api/clients/42/measurements"), "kv:clients:42:measurements");
        assert_eq!(cache_key("/api/trainers/dashboard"), "kv:trainers:dashboard");
        assert_eq!(cache_key("/public/profile/abc"), "kv::public:profile:abc");
    }

    #[test]
    fn test_forward_url() {
        assert_eq!(forward_path("/api/clients/1/meals"), "/clients/1/meals");
        assert_eq!(forward_path("/public/profile/x"), "/public/profile/x");
        assert_eq!(
            join_url("https://t.trycloudflare.com/", "/clients/1/meals", Some("day=mon")),
            "https://t.trycloudflare.com/clients/1/meals?day=mon"
        );
        assert_eq!(join_url("http://localhost:8000", "/x", Some("")), "http://localhost:8000/x");
    }

    proptest! {
        #[test]
        fn prop_cache_key_has_no_separators(path in "/api/[a-z0-9/#?]{0,40}") {
            let key = cache_key(&path);
            prop_assert!(key.starts_with("kv:"));
            prop_assert!(!key.contains('/') && !key.contains('#') && !key.contains('?'));
            prop_assert_eq!(key.len(), path.len() - "/api/".len() + "kv:".len());
        }
    }
}
