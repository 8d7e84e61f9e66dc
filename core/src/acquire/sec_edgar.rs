use crate::acquire::http::{fetch_json, HttpFetcher, METADATA_TIMEOUT_SECS};
use crate::acquire::rate_limit::RateLimiter;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SEC_BASE: &str = "https://data.sec.gov";
pub const SEC_ARCHIVES: &str = "https://www.sec.gov/Archives/edgar";
pub const PROVIDER: &str = "sec_edgar";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filing {
    pub accession: String,
    pub filing_date: String,
    pub form: String,
    pub primary_doc: String,
    pub primary_doc_url: String,
}

/// Resolves a ticker (or passthrough numeric CIK) to a zero-padded 10-digit
/// CIK using the SEC company tickers file. Resolutions are cached per process.
pub fn resolve_cik(
    fetcher: &dyn HttpFetcher,
    rate: &mut RateLimiter,
    cache: &mut BTreeMap<String, String>,
    ticker_or_cik: &str,
) -> CoreResult<String> {
    let key = ticker_or_cik.to_ascii_uppercase();
    if let Some(cik) = cache.get(&key) {
        return Ok(cik.clone());
    }

    if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) && key.len() <= 10 {
        let cik = format!("{:0>10}", key);
        cache.insert(key, cik.clone());
        return Ok(cik);
    }

    rate.wait(PROVIDER);
    let url = format!("{}/files/company_tickers.json", SEC_BASE);
    let tickers = fetch_json(fetcher, &url, METADATA_TIMEOUT_SECS)?;

    // { "0": {"cik_str": 320193, "ticker": "AAPL", ...}, ... }
    let entries = tickers.as_object().ok_or_else(|| {
        CoreError::Transport(format!("transport_error: {} unexpected shape", url))
    })?;
    for entry in entries.values() {
        let ticker = entry.get("ticker").and_then(|t| t.as_str()).unwrap_or("");
        if ticker.eq_ignore_ascii_case(ticker_or_cik) {
            let cik_num = entry
                .get("cik_str")
                .map(|c| match c {
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::String(s) => s.clone(),
                    _ => String::new(),
                })
                .unwrap_or_default();
            if cik_num.is_empty() {
                break;
            }
            let cik = format!("{:0>10}", cik_num);
            cache.insert(key, cik.clone());
            return Ok(cik);
        }
    }

    Err(CoreError::Transport(format!(
        "transport_error: ticker {} not found in SEC tickers file",
        ticker_or_cik
    )))
}

/// Walks the recent-filings parallel arrays and keeps 10-K filings whose
/// filing year matches. Empty result is fatal for that org/year.
pub fn list_10k_filings(
    fetcher: &dyn HttpFetcher,
    rate: &mut RateLimiter,
    cik: &str,
    year: i32,
    limit: usize,
) -> CoreResult<Vec<Filing>> {
    rate.wait(PROVIDER);
    let url = format!("{}/submissions/CIK{}.json", SEC_BASE, cik);
    let data = fetch_json(fetcher, &url, METADATA_TIMEOUT_SECS)?;

    let recent = data
        .pointer("/filings/recent")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    let forms = string_array(&recent, "form");
    let accessions = string_array(&recent, "accessionNumber");
    let dates = string_array(&recent, "filingDate");
    let docs = string_array(&recent, "primaryDocument");

    let mut filings = Vec::new();
    for i in 0..forms.len().min(accessions.len()).min(dates.len()).min(docs.len()) {
        if forms[i] != "10-K" {
            continue;
        }
        let filing_year = dates[i]
            .split('-')
            .next()
            .and_then(|y| y.parse::<i32>().ok())
            .unwrap_or(0);
        if filing_year != year {
            continue;
        }
        let accession_nodash = accessions[i].replace('-', "");
        // CIK in archive paths is unpadded.
        let cik_unpadded = cik.trim_start_matches('0');
        filings.push(Filing {
            accession: accessions[i].clone(),
            filing_date: dates[i].clone(),
            form: "10-K".to_string(),
            primary_doc: docs[i].clone(),
            primary_doc_url: format!(
                "{}/data/{}/{}/{}",
                SEC_ARCHIVES, cik_unpadded, accession_nodash, docs[i]
            ),
        });
        if filings.len() >= limit {
            break;
        }
    }

    if filings.is_empty() {
        return Err(CoreError::InputMissing(format!(
            "no_10k_found: cik={} year={}",
            cik, year
        )));
    }
    Ok(filings)
}

fn string_array(v: &serde_json::Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(|a| a.as_array())
        .map(|arr| {
            arr.iter()
                .map(|x| x.as_str().unwrap_or("").to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::http::FixtureFetcher;
    use serde_json::json;

    fn submissions_fixture() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "filings": {
                "recent": {
                    "form": ["8-K", "10-K", "10-K"],
                    "accessionNumber": ["0000320193-23-000001", "0000320193-23-000106", "0000320193-22-000108"],
                    "filingDate": ["2023-01-05", "2023-11-03", "2022-10-28"],
                    "primaryDocument": ["x8k.htm", "aapl-20230930.htm", "aapl-20220924.htm"]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn numeric_cik_is_zero_padded_without_network() {
        let fetcher = FixtureFetcher::default();
        let mut rate = RateLimiter::new(0.0);
        let mut cache = BTreeMap::new();
        let cik = resolve_cik(&fetcher, &mut rate, &mut cache, "320193").unwrap();
        assert_eq!(cik, "0000320193");
    }

    #[test]
    fn ticker_resolution_uses_tickers_file_and_cache() {
        let tickers = serde_json::to_vec(&json!({
            "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."}
        }))
        .unwrap();
        let fetcher = FixtureFetcher::default().with(
            "https://data.sec.gov/files/company_tickers.json",
            200,
            &tickers,
        );
        let mut rate = RateLimiter::new(0.0);
        let mut cache = BTreeMap::new();
        assert_eq!(
            resolve_cik(&fetcher, &mut rate, &mut cache, "aapl").unwrap(),
            "0000320193"
        );
        // Second resolution hits the cache; the fixture would error if refetched
        // with a different URL, so just assert the cached value.
        assert_eq!(cache.get("AAPL").map(String::as_str), Some("0000320193"));
    }

    #[test]
    fn ten_k_discovery_filters_by_form_and_year() {
        let fetcher = FixtureFetcher::default().with(
            "https://data.sec.gov/submissions/CIK0000320193.json",
            200,
            &submissions_fixture(),
        );
        let mut rate = RateLimiter::new(0.0);
        let filings = list_10k_filings(&fetcher, &mut rate, "0000320193", 2023, 5).unwrap();
        assert_eq!(filings.len(), 1);
        assert_eq!(filings[0].accession, "0000320193-23-000106");
        assert_eq!(
            filings[0].primary_doc_url,
            "https://www.sec.gov/Archives/edgar/data/320193/000032019323000106/aapl-20230930.htm"
        );
    }

    #[test]
    fn missing_10k_is_input_missing() {
        let fetcher = FixtureFetcher::default().with(
            "https://data.sec.gov/submissions/CIK0000320193.json",
            200,
            &submissions_fixture(),
        );
        let mut rate = RateLimiter::new(0.0);
        let err = list_10k_filings(&fetcher, &mut rate, "0000320193", 2019, 5);
        assert!(matches!(err, Err(CoreError::InputMissing(_))));
    }
}
