use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Placeholder substituted for volatile path segments (UUIDs, numeric
/// ids) so detail-page variants collapse into one logical route.
pub const ID_PLACEHOLDER: &str = ":id";

/// Configuration for URL scoping during a crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Domain restriction for crawling (links off this domain are dropped)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_domain: Option<String>,

    /// Regex patterns for URLs to include (if empty, all URLs are included unless excluded)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude (these take precedence over include patterns)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            required_domain: None,
            include_patterns: Vec::new(),
            exclude_patterns: vec![
                // Asset and document URLs are never exploration targets
                r"\.(jpg|jpeg|png|gif|css|js|ico|svg|woff|woff2|ttf|eot|pdf)$".to_string(),
                // Leaving the session is a crawl-killer, not a discovery
                r"/log[-_]?out".to_string(),
            ],
        }
    }
}

/// Decides which discovered URLs stay in the crawl and produces the
/// canonical keys the frontier dedups on.
#[derive(Debug)]
pub struct UrlScope {
    config: ScopeConfig,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
    uuid_segment: Regex,
    numeric_segment: Regex,
}

impl UrlScope {
    /// Create a scope from configuration, compiling all patterns
    pub fn new(config: ScopeConfig) -> Result<Self, regex::Error> {
        let mut include_regexes = Vec::with_capacity(config.include_patterns.len());
        for pattern in &config.include_patterns {
            include_regexes.push(Regex::new(pattern)?);
        }

        let mut exclude_regexes = Vec::with_capacity(config.exclude_patterns.len());
        for pattern in &config.exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        Ok(Self {
            config,
            include_regexes,
            exclude_regexes,
            uuid_segment: Regex::new(
                r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
            )?,
            numeric_segment: Regex::new(r"^\d+$")?,
        })
    }

    /// Scope restricted to the domain of a crawl's start URL
    pub fn for_start_url(start: &Url, extra_excludes: &[String]) -> Result<Self, regex::Error> {
        let mut config = ScopeConfig {
            required_domain: start.domain().map(|d| d.to_string()),
            ..ScopeConfig::default()
        };
        config.exclude_patterns.extend(extra_excludes.iter().cloned());
        Self::new(config)
    }

    /// Determine if a URL should be explored at all
    pub fn should_visit(&self, url: &Url) -> bool {
        if let Some(required) = &self.config.required_domain {
            match url.domain() {
                Some(domain) if domain == required => {}
                _ => return false,
            }
        }

        let url_str = url.as_str();
        for regex in &self.exclude_regexes {
            if regex.is_match(url_str) {
                return false;
            }
        }

        if !self.include_regexes.is_empty() {
            return self.include_regexes.iter().any(|r| r.is_match(url_str));
        }

        true
    }

    /// Exact-route dedup key: query and fragment stripped, volatile
    /// segments kept. Two detail pages of the same logical route get
    /// distinct normalized keys but share a canonical route.
    pub fn normalized_key(&self, url: &Url) -> String {
        let host = url.host_str().unwrap_or_default();
        let path = url.path().trim_end_matches('/');
        let path = if path.is_empty() { "/" } else { path };
        format!("{}://{}{}", url.scheme(), host, path)
    }

    /// Canonical route path: volatile segments replaced by a
    /// placeholder, fragment and query dropped.
    pub fn canonical_route(&self, url: &Url) -> String {
        let segments: Vec<&str> = match url.path_segments() {
            Some(segments) => segments.collect(),
            None => return "/".to_string(),
        };

        let mut canonical = String::new();
        for segment in segments {
            if segment.is_empty() {
                continue;
            }
            canonical.push('/');
            if self.uuid_segment.is_match(segment) || self.numeric_segment.is_match(segment) {
                canonical.push_str(ID_PLACEHOLDER);
            } else {
                canonical.push_str(segment);
            }
        }

        if canonical.is_empty() {
            canonical.push('/');
        }
        canonical
    }

    /// Resolve a possibly-relative href against a base page URL.
    pub fn resolve(&self, base: &str, href: &str) -> Option<Url> {
        let base = Url::parse(base).ok()?;
        base.join(href).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> UrlScope {
        let start = Url::parse("https://app.example.com/dashboard").unwrap();
        UrlScope::for_start_url(&start, &[]).unwrap()
    }

    #[test]
    fn rejects_assets_and_external_domains() {
        let scope = scope();
        let asset = Url::parse("https://app.example.com/logo.png").unwrap();
        assert!(!scope.should_visit(&asset));

        let external = Url::parse("https://other.example.net/page").unwrap();
        assert!(!scope.should_visit(&external));

        let logout = Url::parse("https://app.example.com/logout").unwrap();
        assert!(!scope.should_visit(&logout));

        let page = Url::parse("https://app.example.com/orders").unwrap();
        assert!(scope.should_visit(&page));
    }

    #[test]
    fn uuid_and_numeric_segments_collapse() {
        let scope = scope();
        let a = Url::parse(
            "https://app.example.com/orders/3f1e9a2c-1d2b-4c5d-8e9f-0a1b2c3d4e5f/edit",
        )
        .unwrap();
        let b = Url::parse(
            "https://app.example.com/orders/9a8b7c6d-5e4f-3a2b-1c0d-e9f8a7b6c5d4/edit",
        )
        .unwrap();
        assert_eq!(scope.canonical_route(&a), scope.canonical_route(&b));
        assert_eq!(scope.canonical_route(&a), "/orders/:id/edit");

        let numbered = Url::parse("https://app.example.com/items/42").unwrap();
        assert_eq!(scope.canonical_route(&numbered), "/items/:id");
    }

    #[test]
    fn normalized_keys_distinguish_ids_but_ignore_queries() {
        let scope = scope();
        let a = Url::parse("https://app.example.com/orders/1?tab=2#x").unwrap();
        let b = Url::parse("https://app.example.com/orders/1").unwrap();
        let c = Url::parse("https://app.example.com/orders/2").unwrap();
        assert_eq!(scope.normalized_key(&a), scope.normalized_key(&b));
        assert_ne!(scope.normalized_key(&b), scope.normalized_key(&c));
        assert_eq!(scope.canonical_route(&b), scope.canonical_route(&c));
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let scope = scope();
        let url = Url::parse("https://app.example.com/orders/42?page=2#row-3").unwrap();
        let once = scope.canonical_route(&url);
        let again = Url::parse(&format!("https://app.example.com{once}")).unwrap();
        assert_eq!(scope.canonical_route(&again), once);
    }

    #[test]
    fn query_and_fragment_are_dropped() {
        let scope = scope();
        let with_query = Url::parse("https://app.example.com/list?filter=open#top").unwrap();
        let bare = Url::parse("https://app.example.com/list").unwrap();
        assert_eq!(
            scope.canonical_route(&with_query),
            scope.canonical_route(&bare)
        );
    }

    #[test]
    fn include_patterns_limit_scope() {
        let config = ScopeConfig {
            required_domain: Some("app.example.com".to_string()),
            include_patterns: vec![r"/admin/".to_string()],
            exclude_patterns: vec![],
        };
        let scope = UrlScope::new(config).unwrap();

        let admin = Url::parse("https://app.example.com/admin/users").unwrap();
        assert!(scope.should_visit(&admin));

        let other = Url::parse("https://app.example.com/orders").unwrap();
        assert!(!scope.should_visit(&other));
    }
}
