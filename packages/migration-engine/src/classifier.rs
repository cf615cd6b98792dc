//! URL classification: drop non-content URLs before any network or
//! provider cost is spent on them.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

use crate::config::MatcherConfig;

/// Asset extensions that never point at a content page.
const BLOCKED_EXTENSIONS: &[&str] = &[
    // Styles/scripts
    "css", "js", "mjs",
    // Images
    "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "avif",
    // Fonts
    "woff", "woff2", "ttf", "eot", "otf",
    // Documents/archives
    "pdf", "zip", "tar", "gz", "rar",
    // Data/config
    "csv", "txt", "json", "xml", "rss",
    // Media
    "mp4", "mp3", "webm", "wav", "mov",
];

fn dated_post_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)/(blog|news)/\d{4}([-/]|$)").expect("valid regex")
    })
}

/// Filter both URL lists down to probable content pages, preserving order.
///
/// Malformed URLs are kept rather than rejected; a bad entry costs one
/// wasted fetch, a dropped page costs a missing redirect.
pub fn classify_urls(
    old_urls: Vec<String>,
    new_urls: Vec<String>,
    config: &MatcherConfig,
) -> (Vec<String>, Vec<String>) {
    let keep = |urls: Vec<String>| -> Vec<String> {
        urls.into_iter()
            .filter(|url| {
                let kept = is_content_url(url)
                    && !(config.skip_blog_posts && is_blog_post_url(url));
                if !kept {
                    debug!(url = %url, "Dropping non-content URL");
                }
                kept
            })
            .collect()
    };

    (keep(old_urls), keep(new_urls))
}

/// Whether the URL plausibly points at an HTML page.
///
/// URLs with no extension or an `.html`/`.htm` extension are kept; known
/// asset extensions are rejected. The check is case-insensitive and
/// ignores query strings and fragments.
pub fn is_content_url(url: &str) -> bool {
    let path = url_path(url);

    match path_extension(&path) {
        Some(ext) => !BLOCKED_EXTENSIONS.contains(&ext.as_str()),
        None => true,
    }
}

/// Whether the URL looks like an individual dated blog or news post.
///
/// Section landing and index pages are not posts.
pub fn is_blog_post_url(url: &str) -> bool {
    let path = url_path(url);

    if dated_post_pattern().is_match(&path) {
        return true;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for (i, segment) in segments.iter().enumerate() {
        let lowered = segment.to_ascii_lowercase();
        if (lowered == "blog" || lowered == "news") && i + 1 < segments.len() {
            let leaf = segments[segments.len() - 1].to_ascii_lowercase();
            return !leaf.starts_with("index");
        }
    }

    false
}

/// The path component of the URL; relative inputs are treated as paths
/// directly.
pub(crate) fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => {
            let trimmed = url.split(['?', '#']).next().unwrap_or(url);
            trimmed.to_string()
        }
    }
}

/// Lowercased extension of the path's last segment, if it has one.
fn path_extension(path: &str) -> Option<String> {
    let last_segment = path.rsplit('/').next()?;
    let (_, ext) = last_segment.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_asset_extensions() {
        for url in [
            "http://example.com/styles.css",
            "http://example.com/assets/main.js",
            "http://example.com/logo.png",
            "http://example.com/photo.jpg",
            "http://example.com/icon.gif",
            "http://example.com/graphic.svg",
            "http://example.com/favicon.ico",
            "http://example.com/font.woff2",
            "http://example.com/doc.pdf",
            "http://example.com/archive.zip",
            "http://example.com/data.csv",
            "http://example.com/config.json",
            "http://example.com/sitemap.xml",
            "http://example.com/video.mp4",
            "/assets/styles.css",
        ] {
            assert!(!is_content_url(url), "expected {} to be blocked", url);
        }
    }

    #[test]
    fn test_keeps_html_and_extensionless_urls() {
        for url in [
            "http://example.com/",
            "http://example.com/about",
            "http://example.com/about/",
            "http://example.com/index.html",
            "http://example.com/page.htm",
            "http://example.com/blog/post-title",
            "/about.html",
            "/blog/post",
        ] {
            assert!(is_content_url(url), "expected {} to be kept", url);
        }
    }

    #[test]
    fn test_extension_check_ignores_query_and_fragment() {
        assert!(is_content_url("http://example.com/page.html?id=123"));
        assert!(is_content_url("http://example.com/search?q=test"));
        assert!(is_content_url("http://example.com/about#team"));
        assert!(!is_content_url("http://example.com/style.css?v=2"));
        assert!(!is_content_url("http://example.com/app.js?v=1.2"));
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        assert!(!is_content_url("http://example.com/image.PNG"));
        assert!(!is_content_url("http://example.com/style.CSS"));
        assert!(is_content_url("http://example.com/page.HTML"));
    }

    #[test]
    fn test_dots_in_directories_are_not_extensions() {
        assert!(is_content_url("http://example.com/v1.0/about"));
        assert!(is_content_url("http://example.com/api.v2/docs"));
    }

    #[test]
    fn test_malformed_urls_are_kept() {
        assert!(is_content_url("not-a-valid-url"));
        assert!(is_content_url(""));
    }

    #[test]
    fn test_blog_post_detection() {
        assert!(is_blog_post_url("http://example.com/blog/2023-06-my-post"));
        assert!(is_blog_post_url("http://example.com/news/2024/03/launch"));
        assert!(is_blog_post_url("http://example.com/blog/some-post.html"));
        assert!(is_blog_post_url("http://example.com/news/announcement"));

        assert!(!is_blog_post_url("http://example.com/blog"));
        assert!(!is_blog_post_url("http://example.com/blog/"));
        assert!(!is_blog_post_url("http://example.com/news/index.html"));
        assert!(!is_blog_post_url("http://example.com/about"));
    }

    #[test]
    fn test_classify_preserves_order_and_sides() {
        let old = vec![
            "http://old.com/a".to_string(),
            "http://old.com/style.css".to_string(),
            "http://old.com/b.html".to_string(),
        ];
        let new = vec![
            "http://new.com/logo.png".to_string(),
            "http://new.com/a".to_string(),
        ];

        let (old_kept, new_kept) = classify_urls(old, new, &MatcherConfig::default());

        assert_eq!(old_kept, vec!["http://old.com/a", "http://old.com/b.html"]);
        assert_eq!(new_kept, vec!["http://new.com/a"]);
    }

    #[test]
    fn test_classify_blog_filter_is_opt_in() {
        let urls = vec!["http://old.com/blog/2023-06-post".to_string()];

        let (kept, _) = classify_urls(urls.clone(), vec![], &MatcherConfig::default());
        assert_eq!(kept.len(), 1);

        let config = MatcherConfig {
            skip_blog_posts: true,
            ..MatcherConfig::default()
        };
        let (kept, _) = classify_urls(urls, vec![], &config);
        assert!(kept.is_empty());
    }
}
