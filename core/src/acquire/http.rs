use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

pub const METADATA_TIMEOUT_SECS: u64 = 30;
pub const DOCUMENT_TIMEOUT_SECS: u64 = 60;

/// Response with a streaming body so large documents can be hashed and
/// written without buffering in memory.
pub struct FetchedBody {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub reader: Box<dyn Read>,
}

/// HTTP seam. Production uses the reqwest-backed client; tests use the
/// fixture client, so no test ever touches the network.
pub trait HttpFetcher {
    fn get(&self, url: &str, timeout_secs: u64) -> CoreResult<FetchedBody>;
}

pub fn fetch_json(
    fetcher: &dyn HttpFetcher,
    url: &str,
    timeout_secs: u64,
) -> CoreResult<serde_json::Value> {
    let mut body = fetcher.get(url, timeout_secs)?;
    if body.status != 200 {
        return Err(CoreError::Transport(format!(
            "http_status_non_200: {} status={}",
            url, body.status
        )));
    }
    let mut buf = Vec::new();
    body.reader
        .read_to_end(&mut buf)
        .map_err(|e| CoreError::Transport(format!("transport_error: {} error={}", url, e)))?;
    serde_json::from_slice(&buf)
        .map_err(|e| CoreError::Transport(format!("transport_error: {} bad json: {}", url, e)))
}

pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str) -> CoreResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| CoreError::Transport(format!("transport_error: client build: {}", e)))?;
        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn get(&self, url: &str, timeout_secs: u64) -> CoreResult<FetchedBody> {
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .map_err(|e| CoreError::Transport(format!("transport_error: {} error={}", url, e)))?;
        let status = resp.status().as_u16();
        let mut headers = BTreeMap::new();
        for (k, v) in resp.headers() {
            if let Ok(v) = v.to_str() {
                headers.insert(k.to_string(), v.to_string());
            }
        }
        Ok(FetchedBody {
            status,
            headers,
            reader: Box::new(resp),
        })
    }
}

/// Fixture-backed fetcher for tests: URL → (status, body). URLs with no
/// fixture surface as transport errors, matching a dead host.
#[derive(Default)]
pub struct FixtureFetcher {
    pub fixtures: BTreeMap<String, (u16, Vec<u8>)>,
}

impl FixtureFetcher {
    pub fn with(mut self, url: &str, status: u16, body: &[u8]) -> Self {
        self.fixtures.insert(url.to_string(), (status, body.to_vec()));
        self
    }
}

impl HttpFetcher for FixtureFetcher {
    fn get(&self, url: &str, _timeout_secs: u64) -> CoreResult<FetchedBody> {
        match self.fixtures.get(url) {
            Some((status, body)) => Ok(FetchedBody {
                status: *status,
                headers: BTreeMap::new(),
                reader: Box::new(std::io::Cursor::new(body.clone())),
            }),
            None => Err(CoreError::Transport(format!(
                "transport_error: no route to {}",
                url
            ))),
        }
    }
}
