use crate::error::{CoreError, CoreResult};
use crate::index::enriched::{cmp_published_desc_nulls_last, EnrichedDoc};

/// First retrieval tier: equality selection on (org, theme) over the enriched
/// table, ordered by (published_at DESC NULLS LAST, id), capped at `limit`.
pub fn prefilter<'a>(
    docs: &'a [EnrichedDoc],
    org: Option<&str>,
    theme: Option<&str>,
    limit: usize,
    strict: bool,
) -> CoreResult<Vec<&'a EnrichedDoc>> {
    if docs.is_empty() {
        if strict {
            return Err(CoreError::InputMissing("no_index".to_string()));
        }
        return Ok(Vec::new());
    }
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut selected: Vec<&EnrichedDoc> = docs
        .iter()
        .filter(|d| org.map(|o| d.org == o).unwrap_or(true))
        .filter(|d| theme.map(|t| d.theme == t).unwrap_or(true))
        .collect();
    selected.sort_by(|a, b| cmp_published_desc_nulls_last(a, b));
    selected.truncate(limit);
    Ok(selected)
}
