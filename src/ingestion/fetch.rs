//! Fetching source pages, with an optional filesystem cache.

use std::path::{Path, PathBuf};

use reqwest::Client;
use tokio::fs;
use url::Url;

use crate::types::PipelineError;

/// Filesystem-backed cache for downloaded pages.
///
/// URLs are normalized into deterministic file names so repeated harvest runs
/// reuse previously downloaded pages instead of hitting the network.
#[derive(Clone, Debug)]
pub struct DocumentCache {
    root: PathBuf,
}

impl DocumentCache {
    /// Creates a cache rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Computes the cache file path for a specific URL.
    pub fn cache_path(&self, url: &Url) -> PathBuf {
        let mut components: Vec<String> = Vec::new();
        if let Some(host) = url.host_str() {
            components.push(sanitize_component(host));
        }
        components.extend(
            url.path()
                .trim_start_matches('/')
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(sanitize_component),
        );

        if components.is_empty() {
            components.push("index".to_string());
        }

        let mut file_name = components.join("_");

        if let Some(query) = url.query() {
            file_name.push('_');
            file_name.push_str(&sanitize_component(query));
        }

        if Path::new(&file_name).extension().is_none() {
            file_name.push_str(".html");
        }

        self.root.join(file_name)
    }
}

/// A downloaded page, possibly served from the cache.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub html: String,
    pub from_cache: bool,
}

/// Fetches the page behind `url`, optionally persisting it in `cache`.
///
/// When a cache entry already exists the contents are loaded from disk and no
/// network request is performed. Network and HTTP-status failures surface as
/// [`PipelineError::Fetch`].
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    cache: Option<&DocumentCache>,
) -> Result<FetchedPage, PipelineError> {
    if let Some(cache) = cache {
        let cache_path = cache.cache_path(url);
        if cache_path.exists() {
            let html = fs::read_to_string(&cache_path).await?;
            return Ok(FetchedPage {
                url: url.clone(),
                html,
                from_cache: true,
            });
        }

        let html = fetch_from_network(client, url).await?;
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&cache_path, &html).await?;
        return Ok(FetchedPage {
            url: url.clone(),
            html,
            from_cache: false,
        });
    }

    let html = fetch_from_network(client, url).await?;
    Ok(FetchedPage {
        url: url.clone(),
        html,
        from_cache: false,
    })
}

async fn fetch_from_network(client: &Client, url: &Url) -> Result<String, PipelineError> {
    let fetch_err = |err: reqwest::Error| PipelineError::Fetch {
        url: url.to_string(),
        message: err.to_string(),
    };
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(fetch_err)?
        .error_for_status()
        .map_err(fetch_err)?;
    response.text().await.map_err(fetch_err)
}

fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cache_path_sanitizes_segments() {
        let cache = DocumentCache::new("tmp");
        let url = Url::parse("https://example.com/foo/bar?lang=en").unwrap();
        let path = cache.cache_path(&url);
        assert!(path.ends_with("example.com_foo_bar_lang_en.html"));
    }

    #[test]
    fn cache_path_for_site_root_uses_host() {
        let cache = DocumentCache::new("tmp");
        let url = Url::parse("https://www.changiairport.com/").unwrap();
        let path = cache.cache_path(&url);
        assert!(path.ends_with("www.changiairport.com.html"));
    }

    #[tokio::test]
    async fn fetch_uses_cache_when_available() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path());
        let url = Url::parse("https://example.com/cached").unwrap();
        let cache_path = cache.cache_path(&url);
        tokio::fs::create_dir_all(cache_path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&cache_path, "<p>cached html</p>")
            .await
            .unwrap();

        let client = Client::new();
        let page = fetch_page(&client, &url, Some(&cache)).await.unwrap();
        assert_eq!(page.html, "<p>cached html</p>");
        assert!(page.from_cache);
    }
}
