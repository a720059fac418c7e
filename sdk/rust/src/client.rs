use reqwest::{Client, StatusCode};
use url::Url;

/// Port joined when a sidecar is started without any explicit ports.
pub const DEFAULT_SERVICE_PORT: u16 = 80;

/// Error returned when a join call does not succeed.
#[derive(Debug)]
pub enum JoinError {
    /// The proxy URL (or a join URL derived from it) is malformed.
    InvalidUrl(url::ParseError),
    /// The HTTP call itself failed.
    Transport(reqwest::Error),
    /// The proxy answered with something other than `200 OK`.
    Rejected { status: StatusCode, body: String },
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinError::InvalidUrl(e) => write!(f, "invalid proxy url: {}", e),
            JoinError::Transport(e) => write!(f, "join request failed: {}", e),
            JoinError::Rejected { status, body } => {
                write!(f, "failed to join: proxy returned {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for JoinError {}

impl From<reqwest::Error> for JoinError {
    fn from(e: reqwest::Error) -> Self {
        JoinError::Transport(e)
    }
}

impl From<url::ParseError> for JoinError {
    fn from(e: url::ParseError) -> Self {
        JoinError::InvalidUrl(e)
    }
}

/// Registers co-located services with a proxy.
pub struct SideCar {
    client: Client,
    proxy_url: String,
}

impl SideCar {
    pub fn new(proxy_url: &str) -> Self {
        Self {
            client: Client::new(),
            proxy_url: proxy_url.trim_end_matches('/').to_string(),
        }
    }

    /// Self-report join: one `GET /rebalance/join?port=` call per port.
    ///
    /// The proxy derives the host from the connection, so only the port is sent.
    /// Stops at the first failed join. Returns the proxy's reply per port.
    pub async fn join(&self, ports: &[u16]) -> Result<Vec<String>, JoinError> {
        let ports = if ports.is_empty() {
            &[DEFAULT_SERVICE_PORT][..]
        } else {
            ports
        };

        let mut replies = Vec::with_capacity(ports.len());
        for port in ports {
            let url = self.join_url("/rebalance/join", "port", &port.to_string())?;
            replies.push(self.send(url).await?);
        }
        Ok(replies)
    }

    /// Explicit join: one `GET /rebalance/joinconfig?host=` call per host.
    pub async fn join_from_config(&self, hosts: &[String]) -> Result<Vec<String>, JoinError> {
        let mut replies = Vec::with_capacity(hosts.len());
        for host in hosts {
            let url = self.join_url("/rebalance/joinconfig", "host", host)?;
            replies.push(self.send(url).await?);
        }
        Ok(replies)
    }

    fn join_url(&self, path: &str, key: &str, value: &str) -> Result<Url, JoinError> {
        let mut url = Url::parse(&format!("{}{}", self.proxy_url, path))?;
        url.query_pairs_mut().append_pair(key, value);
        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<String, JoinError> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if status != StatusCode::OK {
            return Err(JoinError::Rejected { status, body });
        }

        tracing::info!(url = %url, reply = %body, "Joined proxy");
        Ok(body)
    }
}
