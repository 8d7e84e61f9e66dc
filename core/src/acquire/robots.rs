use crate::acquire::http::{HttpFetcher, METADATA_TIMEOUT_SECS};
use crate::error::CoreResult;
use std::collections::BTreeMap;
use std::io::Read;
use url::Url;

#[derive(Debug, Clone)]
struct RobotsGroup {
    agents: Vec<String>,
    /// (allow, path_prefix) in file order.
    rules: Vec<(bool, String)>,
}

/// Parsed robots.txt. Longest matching path prefix wins; on equal length an
/// Allow rule wins over Disallow.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    groups: Vec<RobotsGroup>,
}

impl RobotsPolicy {
    pub fn parse(text: &str) -> Self {
        let mut groups: Vec<RobotsGroup> = Vec::new();
        let mut current: Option<RobotsGroup> = None;
        let mut last_was_agent = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim().to_string();

            match field.as_str() {
                "user-agent" => {
                    if last_was_agent {
                        if let Some(g) = current.as_mut() {
                            g.agents.push(value.to_ascii_lowercase());
                        }
                    } else {
                        if let Some(g) = current.take() {
                            groups.push(g);
                        }
                        current = Some(RobotsGroup {
                            agents: vec![value.to_ascii_lowercase()],
                            rules: Vec::new(),
                        });
                    }
                    last_was_agent = true;
                }
                "disallow" | "allow" => {
                    last_was_agent = false;
                    if let Some(g) = current.as_mut() {
                        // An empty Disallow means "allow everything".
                        if !value.is_empty() {
                            g.rules.push((field == "allow", value));
                        }
                    }
                }
                _ => {
                    last_was_agent = false;
                }
            }
        }
        if let Some(g) = current.take() {
            groups.push(g);
        }
        Self { groups }
    }

    pub fn can_fetch(&self, user_agent: &str, path: &str) -> bool {
        let ua = user_agent.to_ascii_lowercase();
        let group = self
            .groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a != "*" && ua.contains(a.as_str())))
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")));

        let Some(group) = group else {
            return true;
        };

        let mut best: Option<(usize, bool)> = None;
        for (allow, prefix) in &group.rules {
            if path.starts_with(prefix.as_str()) {
                let len = prefix.len();
                match best {
                    Some((best_len, best_allow)) => {
                        if len > best_len || (len == best_len && *allow && !best_allow) {
                            best = Some((len, *allow));
                        }
                    }
                    None => best = Some((len, *allow)),
                }
            }
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
pub struct RobotsVerdict {
    pub allowed: bool,
    pub diagnostics: Vec<String>,
}

enum CacheEntry {
    Policy(RobotsPolicy),
    /// robots.txt could not be fetched; default is permissive but recorded.
    PermissiveDefault(String),
}

/// Per-origin robots.txt cache. Read-mostly; one fetch per origin per process.
#[derive(Default)]
pub struct RobotsCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl RobotsCache {
    pub fn check(
        &mut self,
        fetcher: &dyn HttpFetcher,
        user_agent: &str,
        url: &Url,
    ) -> CoreResult<RobotsVerdict> {
        let origin = format!(
            "{}://{}",
            url.scheme(),
            url.host_str().unwrap_or_default()
        );

        if !self.entries.contains_key(&origin) {
            let robots_url = format!("{}/robots.txt", origin);
            let entry = match fetcher.get(&robots_url, METADATA_TIMEOUT_SECS) {
                Ok(mut body) if body.status == 200 => {
                    let mut buf = Vec::new();
                    match body.reader.read_to_end(&mut buf) {
                        Ok(_) => {
                            CacheEntry::Policy(RobotsPolicy::parse(&String::from_utf8_lossy(&buf)))
                        }
                        Err(e) => CacheEntry::PermissiveDefault(format!(
                            "robots.txt read failed for {}: {}",
                            origin, e
                        )),
                    }
                }
                Ok(body) => CacheEntry::PermissiveDefault(format!(
                    "robots.txt returned status {} for {}",
                    body.status, origin
                )),
                Err(e) => CacheEntry::PermissiveDefault(format!(
                    "robots.txt fetch failed for {}: {}",
                    origin, e
                )),
            };
            if let CacheEntry::PermissiveDefault(reason) = &entry {
                tracing::warn!(%origin, reason = %reason, "robots.txt unavailable, defaulting permissive");
            }
            self.entries.insert(origin.clone(), entry);
        }

        match &self.entries[&origin] {
            CacheEntry::Policy(policy) => Ok(RobotsVerdict {
                allowed: policy.can_fetch(user_agent, url.path()),
                diagnostics: Vec::new(),
            }),
            CacheEntry::PermissiveDefault(reason) => Ok(RobotsVerdict {
                allowed: true,
                diagnostics: vec![reason.clone()],
            }),
        }
    }
}
