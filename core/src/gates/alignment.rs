use crate::config::RunConfig;
use crate::extract::pdf::PdfDoc;
use crate::gates::GateReport;
use crate::model::Evidence;
use serde_json::json;
use std::path::Path;

pub const GATE: &str = "quote_alignment";
pub const SKIP_NO_PDF: &str = "no_pdf_available";

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Verifies each paginated quote against the raw page text of the source PDF:
/// exact substring match after whitespace normalization, or a fuzzy prefix
/// match of `config.alignment_fuzzy_prefix` chars. Documents without a PDF
/// are skipped with a recorded reason; present PDFs with failing quotes fail.
pub fn alignment_gate(
    config: &RunConfig,
    doc_id: &str,
    evidence: &[Evidence],
    pdf_path: Option<&Path>,
) -> GateReport {
    let Some(pdf_path) = pdf_path else {
        return GateReport::skipped(GATE, doc_id, SKIP_NO_PDF);
    };
    if !pdf_path.exists() {
        return GateReport::skipped(GATE, doc_id, SKIP_NO_PDF);
    }
    let pdf = match PdfDoc::open(pdf_path) {
        Ok(pdf) => pdf,
        Err(e) => {
            return GateReport::fail(
                GATE,
                doc_id,
                json!({"pdf_path": pdf_path.display().to_string(), "error": e.to_string()}),
            );
        }
    };

    let fuzzy_prefix = config.alignment_fuzzy_prefix;
    let mut failures = Vec::new();
    let mut checked = 0usize;

    for ev in evidence {
        let Some(page) = ev.page else {
            continue;
        };
        let quote = normalize(ev.extract_30w.trim_end_matches("..."));
        if quote.is_empty() {
            continue;
        }
        checked += 1;
        let page_text = normalize(&pdf.text_on_page(page));

        let exact = page_text.contains(&quote);
        let fuzzy = if exact {
            true
        } else {
            let prefix: String = quote.chars().take(fuzzy_prefix).collect();
            !prefix.is_empty() && page_text.contains(&prefix)
        };
        if !fuzzy {
            failures.push(json!({
                "evidence_id": ev.evidence_id,
                "page": page,
                "quote_preview": quote.chars().take(80).collect::<String>(),
            }));
        }
    }

    let diagnostics = json!({
        "pdf_path": pdf_path.display().to_string(),
        "quotes_checked": checked,
        "fuzzy_prefix_chars": fuzzy_prefix,
        "failures": failures,
    });
    if diagnostics["failures"].as_array().map(|f| f.is_empty()).unwrap_or(false) {
        GateReport::pass(GATE, doc_id, diagnostics)
    } else {
        GateReport::fail(GATE, doc_id, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::Verdict;

    #[test]
    fn missing_pdf_is_skipped_with_reason() {
        let config = RunConfig::replay_fixture(Path::new("."));
        let gate = alignment_gate(&config, "demo_2023", &[], None);
        assert_eq!(gate.verdict, Verdict::Skipped);
        assert_eq!(gate.skip_reason.as_deref(), Some(SKIP_NO_PDF));

        let gate = alignment_gate(
            &config,
            "demo_2023",
            &[],
            Some(Path::new("/nonexistent/report.pdf")),
        );
        assert_eq!(gate.verdict, Verdict::Skipped);
    }
}
