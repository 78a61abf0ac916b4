use crate::error::{Result, ScanError};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Chrome on Windows; widely accepted by servers that sniff user agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

/// Body and metadata of a successful GET.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the content was actually served from, after redirects and any scheme flip.
    pub final_url: String,
    pub body: String,
}

/// HTTP GET with a single http<->https fallback.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Fetcher without a request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Fetches `url`, retrying exactly once with the scheme flipped when the
    /// first attempt fails or returns a non-success status. The error of the
    /// second attempt is the one surfaced.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed = Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{url}: {e}")))?;

        let first_error = match self.fetch_once(parsed.clone()).await {
            Ok(page) => return Ok(page),
            Err(e) => e,
        };

        let Some(flipped) = flip_scheme(&parsed) else {
            return Err(first_error);
        };

        debug!("Fetch of {} failed ({}), retrying as {}", url, first_error, flipped);
        self.fetch_once(flipped).await
    }

    async fn fetch_once(&self, target: Url) -> Result<FetchedPage> {
        let response = self.client.get(target).send().await?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                url: final_url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;

        Ok(FetchedPage { final_url, body })
    }
}

/// Returns `url` with `http` swapped for `https` or vice versa.
pub fn flip_scheme(url: &Url) -> Option<Url> {
    let target = match url.scheme() {
        "http" => "https",
        "https" => "http",
        _ => return None,
    };
    let mut flipped = url.clone();
    flipped.set_scheme(target).ok()?;
    Some(flipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[test]
    fn test_flip_scheme() {
        let http = Url::parse("http://a.com/x?y=1").unwrap();
        assert_eq!(flip_scheme(&http).unwrap().as_str(), "https://a.com/x?y=1");

        let https = Url::parse("https://a.com/").unwrap();
        assert_eq!(flip_scheme(&https).unwrap().as_str(), "http://a.com/");

        let ftp = Url::parse("ftp://a.com/").unwrap();
        assert!(flip_scheme(&ftp).is_none());
    }

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>hi</html>"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let url = format!("{}/page", mock_server.uri());
        let page = fetcher.fetch(&url).await.unwrap();

        assert_eq!(page.body, "<html>hi</html>");
        assert_eq!(page.final_url, url);

        // the header matcher splits on commas, and the agent string has one
        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let agent = requests[0].headers.get("user-agent").unwrap();
        assert_eq!(agent.to_str().unwrap(), USER_AGENT);
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let result = fetcher
            .fetch(&format!("{}/missing", mock_server.uri()))
            .await;

        // the https retry cannot reach a plain-http mock, so a transport error surfaces
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_falls_back_from_https_to_http() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/secure"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let https_url = format!("{}/secure", mock_server.uri()).replacen("http://", "https://", 1);
        let fetcher = Fetcher::new().unwrap();
        let page = fetcher.fetch(&https_url).await.unwrap();

        assert_eq!(page.body, "plain");
        assert!(page.final_url.starts_with("http://"));
    }

    /// http 500, then one https attempt that the plain mock can't answer.
    /// A second http request would show up in the mock's log.
    #[tokio::test]
    async fn test_failed_fetch_is_retried_exactly_once() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/error"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let result = fetcher.fetch(&format!("{}/error", mock_server.uri())).await;

        // the surfaced error is the flipped attempt's transport failure, not the 500
        assert!(matches!(result, Err(ScanError::HttpError(_))));
        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    /// https first (unreachable), then exactly one http attempt whose 500 is surfaced.
    #[tokio::test]
    async fn test_retry_error_is_the_one_surfaced() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/error"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let https_url = format!("{}/error", mock_server.uri()).replacen("http://", "https://", 1);
        let fetcher = Fetcher::new().unwrap();
        let result = fetcher.fetch(&https_url).await;

        assert!(matches!(
            result,
            Err(ScanError::HttpStatus { status: 500, .. })
        ));
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let fetcher = Fetcher::new().unwrap();
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(ScanError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_with_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::with_timeout(Some(Duration::from_millis(50))).unwrap();
        let result = fetcher.fetch(&format!("{}/slow", mock_server.uri())).await;
        assert!(result.is_err());
    }
}
