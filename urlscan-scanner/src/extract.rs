use crate::fetch::Fetcher;
use crate::observer::CrawlObserver;
use crate::scope::is_valid_url;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::{LazyLock, Mutex};
use tracing::debug;
use url::{ParseError, Url};

/// Path suffixes of assets whose text is fetched and scanned for absolute URLs.
pub const CODE_ASSET_EXTENSIONS: &[&str] = &[
    ".js", ".jsp", ".xml", ".html", ".htm", ".php", ".asp", ".aspx", ".css", ".json", ".txt",
    ".md", ".yaml", ".csv", ".doc", ".docx", ".pdf", ".ppt", ".pptx", ".xls", ".xlsx", ".ts",
    ".py", ".rb", ".java", ".c", ".h", ".cs", ".swift", ".kt", ".pl", ".sh", ".bat", ".go",
];

static EMBEDDED_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"']+"#).expect("embedded URL pattern is valid"));

/// Link-bearing attributes for a tag. `meta` is handled separately.
fn link_attributes(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" | "link" | "img" | "iframe" | "frame" | "embed" | "script" | "source" | "track"
        | "video" | "audio" | "applet" | "object" | "area" | "base" | "input" | "form" => {
            &["href", "src", "data", "action"]
        }
        "button" => &["formaction"],
        "blockquote" | "del" | "ins" | "q" => &["cite"],
        "command" => &["icon"],
        "data" => &["value"],
        _ => &[],
    }
}

/// Walks the parsed document and returns every link-bearing attribute value,
/// resolved against `base`. Duplicates are kept.
pub fn extract_document_links(base: &str, html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    // explicit stack, children pushed in reverse to keep document order
    let mut stack = vec![document.tree.root()];
    while let Some(node) = stack.pop() {
        if let Some(element) = node.value().as_element() {
            let tag = element.name();
            if tag == "meta" {
                if let Some(target) = element.attr("content").and_then(meta_refresh_target) {
                    links.push(resolve_url(base, target));
                }
            } else {
                let wanted = link_attributes(tag);
                for (name, value) in element.attrs() {
                    if wanted.contains(&name) {
                        links.push(resolve_url(base, value));
                    }
                }
            }
        }
        stack.extend(node.children().rev());
    }

    links
}

/// Value after the `=` of a `url=` / `URL=` meta content, e.g. `0; url=/next`.
fn meta_refresh_target(content: &str) -> Option<&str> {
    if !content.contains("url=") && !content.contains("URL=") {
        return None;
    }
    let (_, target) = content.split_once('=')?;
    Some(target.trim_matches(|c: char| c.is_whitespace() || c == '\'' || c == '"'))
}

/// Resolves `candidate` against `base`.
///
/// Absolute candidates come back in their parsed, serialized form, so
/// surrounding whitespace and case in scheme or host never produce a second
/// spelling of the same URL. Relative references are resolved per RFC 3986.
/// Anything that cannot be resolved is passed through as-is and left for
/// validation to discard.
pub fn resolve_url(base: &str, candidate: &str) -> String {
    match Url::parse(candidate) {
        Ok(parsed) => parsed.to_string(),
        Err(ParseError::RelativeUrlWithoutBase) => Url::parse(base)
            .and_then(|base| base.join(candidate))
            .map(|resolved| resolved.to_string())
            .unwrap_or_else(|_| candidate.to_string()),
        Err(_) => candidate.to_string(),
    }
}

/// True if the URL path ends in one of [`CODE_ASSET_EXTENSIONS`].
pub fn is_code_asset(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };
    CODE_ASSET_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(ext))
}

/// Every literal `http://` / `https://` URL in `text`, up to the first
/// whitespace or quote character.
pub fn scan_text_for_urls(text: &str) -> Vec<String> {
    EMBEDDED_URL
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Two-phase link discovery: document attributes first, then the text of
/// every code/document asset among those candidates.
pub struct LinkExtractor {
    fetcher: Fetcher,
    scanned_assets: Option<Mutex<HashSet<String>>>,
}

impl LinkExtractor {
    /// Fetches an asset every time it is referenced.
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            scanned_assets: None,
        }
    }

    /// Fetches each asset URL at most once for the extractor's lifetime.
    pub fn with_asset_dedupe(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            scanned_assets: Some(Mutex::new(HashSet::new())),
        }
    }

    pub async fn extract(
        &self,
        base: &str,
        html: &str,
        observer: &dyn CrawlObserver,
    ) -> Vec<String> {
        let mut candidates = extract_document_links(base, html);

        let assets: Vec<String> = candidates
            .iter()
            .filter(|candidate| is_code_asset(candidate) && is_valid_url(candidate))
            .filter(|candidate| self.claim_asset(candidate))
            .cloned()
            .collect();

        for asset in assets {
            match self.fetcher.fetch(&asset).await {
                Ok(page) => {
                    let found = scan_text_for_urls(&page.body);
                    debug!("Scanned {} and found {} URL(s)", asset, found.len());
                    observer.asset_scanned(&asset, &found);
                    candidates.extend(found.iter().map(|url| resolve_url(base, url)));
                }
                Err(e) => observer.asset_failed(&asset, &e),
            }
        }

        candidates
    }

    fn claim_asset(&self, asset: &str) -> bool {
        match &self.scanned_assets {
            None => true,
            Some(seen) => {
                let mut seen = seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                seen.insert(asset.to_string())
            }
        }
    }
}
