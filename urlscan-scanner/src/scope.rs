use serde::{Deserialize, Serialize};
use url::Url;

/// Host-suffix allow/deny lists deciding which discovered URLs get followed.
///
/// Suffixes are matched against the parsed host (no port). The URL parser
/// lowercases hosts, so entries are lowercased on construction too. Empty
/// entries carry no constraint and are dropped, so a list built from an
/// empty flag value behaves like an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopePolicy {
    in_scope: Vec<String>,
    out_scope: Vec<String>,
}

/// Outcome of classifying a single URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    InScope,
    OutOfScope,
    Invalid,
}

impl ScopePolicy {
    pub fn new<I, O, S>(in_scope: I, out_scope: O) -> Self
    where
        I: IntoIterator<Item = S>,
        O: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            in_scope: normalize_entries(in_scope),
            out_scope: normalize_entries(out_scope),
        }
    }

    /// Builds a policy from two comma-separated suffix lists.
    pub fn from_lists(in_scope: &str, out_scope: &str) -> Self {
        Self::new(in_scope.split(','), out_scope.split(','))
    }

    /// Open policy: everything valid is in scope.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn in_scope(&self) -> &[String] {
        &self.in_scope
    }

    pub fn out_scope(&self) -> &[String] {
        &self.out_scope
    }

    pub fn classify(&self, url: &str) -> Verdict {
        let Some(host) = valid_host(url) else {
            return Verdict::Invalid;
        };

        if matches_any(&host, &self.in_scope) {
            // out-of-scope entries veto an in-scope match
            return if matches_any(&host, &self.out_scope) {
                Verdict::OutOfScope
            } else {
                Verdict::InScope
            };
        }

        if matches_any(&host, &self.out_scope) {
            return Verdict::OutOfScope;
        }

        if self.in_scope.is_empty() {
            Verdict::InScope
        } else {
            Verdict::OutOfScope
        }
    }
}

/// True when `url` parses and uses the http or https scheme.
pub fn is_valid_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn valid_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    Some(parsed.host_str().unwrap_or_default().to_string())
}

fn matches_any(host: &str, suffixes: &[String]) -> bool {
    suffixes.iter().any(|suffix| host.ends_with(suffix.as_str()))
}

fn normalize_entries<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    entries
        .into_iter()
        .map(|entry| entry.into().trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}
