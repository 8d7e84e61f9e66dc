pub mod http;
pub mod rate_limit;
pub mod robots;
pub mod sec_edgar;

use crate::catalog::{OrgEntry, Provider};
use crate::config::RunConfig;
use crate::determinism::json_canonical::to_canonical_bytes;
use crate::error::{CoreError, CoreResult};
use crate::model::AcquisitionRecord;
use http::{FetchedBody, HttpFetcher, DOCUMENT_TIMEOUT_SECS};
use rate_limit::RateLimiter;
use robots::RobotsCache;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use url::Url;

const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// Polite document acquirer: robots-aware, rate-limited, manifest-tracked.
/// Every failure is fatal for its record; no partial file survives.
pub struct Acquirer<'a> {
    config: &'a RunConfig,
    fetcher: Box<dyn HttpFetcher>,
    robots: RobotsCache,
    rate: RateLimiter,
    cik_cache: BTreeMap<String, String>,
}

impl<'a> Acquirer<'a> {
    pub fn new(config: &'a RunConfig, fetcher: Box<dyn HttpFetcher>) -> Self {
        Self {
            config,
            fetcher,
            robots: RobotsCache::default(),
            rate: RateLimiter::new(config.sec_delay_secs),
            cik_cache: BTreeMap::new(),
        }
    }

    pub fn acquire(&mut self, org: &OrgEntry, raw_dir: &Path) -> CoreResult<AcquisitionRecord> {
        std::fs::create_dir_all(raw_dir)?;
        if org.provider.needs_network() {
            self.config.require_user_agent()?;
        }
        let record = match org.provider {
            Provider::Local => self.acquire_local(org, raw_dir)?,
            Provider::SecEdgar => self.acquire_sec_edgar(org, raw_dir)?,
            Provider::Cdp | Provider::CompanyIr => {
                let url = org.source_url.as_deref().ok_or_else(|| {
                    CoreError::Config(format!(
                        "{} provider for {} requires source_url",
                        org.provider.as_str(),
                        org.org_id
                    ))
                })?;
                self.acquire_url(org, url, raw_dir)?
            }
        };
        write_fetch_manifest(raw_dir, &org.doc_id(), &record)?;
        Ok(record)
    }

    fn acquire_local(&mut self, org: &OrgEntry, raw_dir: &Path) -> CoreResult<AcquisitionRecord> {
        let src = PathBuf::from(org.pdf_path.as_deref().unwrap_or_default());
        let file = std::fs::File::open(&src).map_err(|e| {
            CoreError::InputMissing(format!("local document {}: {}", src.display(), e))
        })?;
        let ext = extension_of(&src).unwrap_or_else(|| "pdf".to_string());
        let dest = raw_dir.join(format!("{}.{}", org.doc_id(), ext));
        let (sha256, size_bytes) = stream_to_file(file, &dest)?;
        Ok(AcquisitionRecord {
            local_path: dest.to_string_lossy().into_owned(),
            source_url: format!("file://{}", src.display()),
            sha256,
            size_bytes,
            fetched_at: self.config.now(),
            provider: org.provider.as_str().to_string(),
            http_headers: BTreeMap::new(),
            diagnostics: Vec::new(),
        })
    }

    fn acquire_sec_edgar(
        &mut self,
        org: &OrgEntry,
        raw_dir: &Path,
    ) -> CoreResult<AcquisitionRecord> {
        let cik = sec_edgar::resolve_cik(
            self.fetcher.as_ref(),
            &mut self.rate,
            &mut self.cik_cache,
            &org.org_id,
        )?;
        let filings = sec_edgar::list_10k_filings(
            self.fetcher.as_ref(),
            &mut self.rate,
            &cik,
            org.year,
            1,
        )?;
        let filing = &filings[0];
        tracing::info!(
            org_id = %org.org_id,
            accession = %filing.accession,
            "discovered 10-K filing"
        );
        self.acquire_url(org, &filing.primary_doc_url.clone(), raw_dir)
    }

    fn acquire_url(
        &mut self,
        org: &OrgEntry,
        source_url: &str,
        raw_dir: &Path,
    ) -> CoreResult<AcquisitionRecord> {
        let user_agent = self.config.require_user_agent()?.to_string();
        let url = Url::parse(source_url).map_err(|e| {
            CoreError::Config(format!("invalid source_url {}: {}", source_url, e))
        })?;

        let verdict = self
            .robots
            .check(self.fetcher.as_ref(), &user_agent, &url)?;
        if !verdict.allowed {
            return Err(CoreError::Transport(format!(
                "robots_disallow: {}",
                source_url
            )));
        }

        self.rate.wait(org.provider.as_str());
        let body = self.fetcher.get(source_url, DOCUMENT_TIMEOUT_SECS)?;
        if body.status != 200 {
            return Err(CoreError::Transport(format!(
                "http_status_non_200: {} status={}",
                source_url, body.status
            )));
        }

        let ext = url_extension(&url).unwrap_or_else(|| "bin".to_string());
        let dest = raw_dir.join(format!("{}.{}", org.doc_id(), ext));
        let FetchedBody {
            headers, reader, ..
        } = body;
        let (sha256, size_bytes) = stream_to_file(reader, &dest)?;

        Ok(AcquisitionRecord {
            local_path: dest.to_string_lossy().into_owned(),
            source_url: source_url.to_string(),
            sha256,
            size_bytes,
            fetched_at: self.config.now(),
            provider: org.provider.as_str().to_string(),
            http_headers: headers,
            diagnostics: verdict.diagnostics,
        })
    }
}

/// Streams into a temp path while hashing in 64 KiB chunks; hash and size are
/// final only after the stream completes, and the file moves into place only
/// then. A pre-existing temp path means a second writer and is an error.
fn stream_to_file(mut reader: impl Read, dest: &Path) -> CoreResult<(String, u64)> {
    let tmp = dest.with_extension("part");
    let mut out = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp)
        .map_err(|e| {
            CoreError::Transport(format!("write_error: temp path {}: {}", tmp.display(), e))
        })?;

    let mut hasher = Sha256::new();
    let mut size: u64 = 0;
    let mut buf = vec![0u8; STREAM_CHUNK_BYTES];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                drop(out);
                let _ = std::fs::remove_file(&tmp);
                return Err(CoreError::Transport(format!(
                    "transport_error: stream read: {}",
                    e
                )));
            }
        };
        if let Err(e) = out.write_all(&buf[..n]) {
            drop(out);
            let _ = std::fs::remove_file(&tmp);
            return Err(CoreError::Transport(format!("write_error: {}", e)));
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    out.flush()
        .map_err(|e| CoreError::Transport(format!("write_error: flush: {}", e)))?;
    drop(out);
    std::fs::rename(&tmp, dest)
        .map_err(|e| CoreError::Transport(format!("write_error: rename: {}", e)))?;
    Ok((hex::encode(hasher.finalize()), size))
}

fn write_fetch_manifest(
    raw_dir: &Path,
    doc_id: &str,
    record: &AcquisitionRecord,
) -> CoreResult<()> {
    let bytes = to_canonical_bytes(record)?;
    std::fs::write(raw_dir.join(format!("{}.manifest.json", doc_id)), bytes)?;
    Ok(())
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn url_extension(url: &Url) -> Option<String> {
    let path = url.path();
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
