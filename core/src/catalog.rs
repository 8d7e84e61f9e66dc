use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Local,
    SecEdgar,
    Cdp,
    CompanyIr,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::SecEdgar => "sec_edgar",
            Provider::Cdp => "cdp",
            Provider::CompanyIr => "company_ir",
        }
    }

    pub fn needs_network(&self) -> bool {
        !matches!(self, Provider::Local)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgEntry {
    pub org_id: String,
    pub year: i32,
    pub provider: Provider,
    #[serde(default)]
    pub pdf_path: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl OrgEntry {
    pub fn doc_id(&self) -> String {
        format!("{}_{}", self.org_id, self.year)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgCatalog {
    pub orgs: Vec<OrgEntry>,
}

impl OrgCatalog {
    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::InputMissing(format!("org catalog {}: {}", path.display(), e))
        })?;
        let catalog: OrgCatalog = serde_yaml::from_str(&text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Partition keys land in filesystem paths; reject anything that is not
    /// lowercase alphanumeric before it reaches the store.
    pub fn validate(&self) -> CoreResult<()> {
        for org in &self.orgs {
            if org.org_id.is_empty()
                || !org
                    .org_id
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            {
                return Err(CoreError::Config(format!(
                    "org_id must be lowercase alphanumeric, got {:?}",
                    org.org_id
                )));
            }
            if org.year < 1900 || org.year > 2200 {
                return Err(CoreError::Config(format!(
                    "year out of range for {}: {}",
                    org.org_id, org.year
                )));
            }
            if org.provider == Provider::Local && org.pdf_path.is_none() {
                return Err(CoreError::Config(format!(
                    "local provider for {} requires pdf_path",
                    org.org_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_parses_and_validates() {
        let yaml = r#"
orgs:
  - org_id: aapl
    year: 2023
    provider: sec_edgar
  - org_id: msft
    year: 2023
    provider: local
    pdf_path: data/raw/msft_2023.pdf
"#;
        let catalog: OrgCatalog = serde_yaml::from_str(yaml).unwrap();
        catalog.validate().unwrap();
        assert_eq!(catalog.orgs[0].doc_id(), "aapl_2023");
        assert_eq!(catalog.orgs[1].provider, Provider::Local);
    }

    #[test]
    fn uppercase_org_id_is_rejected() {
        let catalog = OrgCatalog {
            orgs: vec![OrgEntry {
                org_id: "MSFT".to_string(),
                year: 2023,
                provider: Provider::Local,
                pdf_path: Some("x.pdf".to_string()),
                source_url: None,
            }],
        };
        assert!(matches!(catalog.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn local_provider_without_pdf_path_is_rejected() {
        let catalog = OrgCatalog {
            orgs: vec![OrgEntry {
                org_id: "msft".to_string(),
                year: 2023,
                provider: Provider::Local,
                pdf_path: None,
                source_url: None,
            }],
        };
        assert!(catalog.validate().is_err());
    }
}
