use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_HASH_SEED: u64 = 0;
pub const DEFAULT_FIXED_TIME: &str = "2025-10-28T06:00:00Z";
pub const DEFAULT_SEC_DELAY_SECS: f64 = 1.0;
pub const DEFAULT_ALIGNMENT_FUZZY_PREFIX: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserBackend {
    Default,
    Docling,
}

/// Immutable run configuration. Built once from the environment at process
/// start; components take a reference and never re-read the environment.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub seed: u64,
    pub hash_seed: u64,
    pub offline_replay: bool,
    pub fixed_time: String,
    pub user_agent: Option<String>,
    pub parser_backend: ParserBackend,
    pub sec_delay_secs: f64,
    pub strict_retrieval: bool,
    pub alignment_fuzzy_prefix: usize,
    pub workspace_root: PathBuf,
}

impl RunConfig {
    pub fn from_env(workspace_root: &Path) -> CoreResult<Self> {
        let seed = parse_int_var("SEED", DEFAULT_SEED)?;
        let hash_seed = parse_int_var("HASH_SEED", DEFAULT_HASH_SEED)?;
        let offline_replay = parse_bool_var("OFFLINE_REPLAY");
        let fixed_time =
            std::env::var("FIXED_TIME").unwrap_or_else(|_| DEFAULT_FIXED_TIME.to_string());
        let user_agent = std::env::var("USER_AGENT").ok().filter(|s| !s.is_empty());
        let parser_backend = match std::env::var("PARSER_BACKEND") {
            Ok(v) if v.eq_ignore_ascii_case("docling") => ParserBackend::Docling,
            _ => ParserBackend::Default,
        };
        let sec_delay_secs = match std::env::var("SEC_RPS_DELAY") {
            Ok(v) => v.parse::<f64>().map_err(|_| {
                CoreError::Config(format!("SEC_RPS_DELAY must be a number, got {}", v))
            })?,
            Err(_) => DEFAULT_SEC_DELAY_SECS,
        };
        let strict_retrieval = parse_bool_var("STRICT_RETRIEVAL");

        Ok(Self {
            seed,
            hash_seed,
            offline_replay,
            fixed_time,
            user_agent,
            parser_backend,
            sec_delay_secs,
            strict_retrieval,
            alignment_fuzzy_prefix: DEFAULT_ALIGNMENT_FUZZY_PREFIX,
            workspace_root: workspace_root.to_path_buf(),
        })
    }

    /// Fixed configuration for tests and self-audit runs: replay on, no network identity.
    pub fn replay_fixture(workspace_root: &Path) -> Self {
        Self {
            seed: DEFAULT_SEED,
            hash_seed: DEFAULT_HASH_SEED,
            offline_replay: true,
            fixed_time: DEFAULT_FIXED_TIME.to_string(),
            user_agent: None,
            parser_backend: ParserBackend::Default,
            sec_delay_secs: 0.0,
            strict_retrieval: false,
            alignment_fuzzy_prefix: DEFAULT_ALIGNMENT_FUZZY_PREFIX,
            workspace_root: workspace_root.to_path_buf(),
        }
    }

    /// Artifact timestamp. Pinned to `fixed_time` under offline replay so
    /// re-runs hash identically.
    pub fn now(&self) -> String {
        if self.offline_replay {
            return self.fixed_time.clone();
        }
        time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| self.fixed_time.clone())
    }

    /// Network providers require an operator-identifying User-Agent with a
    /// contact address. Absent or placeholder values are a config error.
    pub fn require_user_agent(&self) -> CoreResult<&str> {
        match self.user_agent.as_deref() {
            None => Err(CoreError::Config(
                "USER_AGENT is required for network providers".to_string(),
            )),
            Some(ua) if ua.contains("missing@example.com") || !ua.contains('@') => {
                Err(CoreError::Config(format!(
                    "USER_AGENT must identify the operator with a contact address, got {}",
                    ua
                )))
            }
            Some(ua) => Ok(ua),
        }
    }
}

fn parse_int_var(name: &str, default: u64) -> CoreResult<u64> {
    match std::env::var(name) {
        Ok(v) => v
            .parse::<u64>()
            .map_err(|_| CoreError::Config(format!("{} must be an integer, got {}", name, v))),
        Err(_) => Ok(default),
    }
}

fn parse_bool_var(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("True") | Ok("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_user_agent_is_config_error() {
        let cfg = RunConfig::replay_fixture(Path::new("."));
        assert!(matches!(
            cfg.require_user_agent(),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn placeholder_user_agent_is_rejected() {
        let mut cfg = RunConfig::replay_fixture(Path::new("."));
        cfg.user_agent = Some("esg-pipeline/0.1 (contact=missing@example.com)".to_string());
        assert!(cfg.require_user_agent().is_err());
        cfg.user_agent = Some("esg-pipeline/0.1 (ops@acme.com)".to_string());
        assert!(cfg.require_user_agent().is_ok());
    }

    #[test]
    fn replay_now_is_pinned() {
        let cfg = RunConfig::replay_fixture(Path::new("."));
        assert_eq!(cfg.now(), DEFAULT_FIXED_TIME);
        assert_eq!(cfg.now(), cfg.now());
    }
}
