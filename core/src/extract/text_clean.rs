use regex::Regex;

/// Fraction of control characters at which text is classified binary-like.
pub const BINARY_CONTROL_THRESHOLD: f32 = 0.15;

fn is_kept_whitespace(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\t')
}

/// Binary/corrupted-extraction detector: any NUL byte, or more than the
/// threshold fraction of control characters outside `\t \n \r`.
pub fn is_binary_like(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    let mut control = 0usize;
    let mut nulls = 0usize;
    let mut total = 0usize;
    for c in text.chars() {
        total += 1;
        if c == '\0' {
            nulls += 1;
        }
        if c.is_control() && !is_kept_whitespace(c) {
            control += 1;
        }
    }
    if nulls > 0 {
        return true;
    }
    control as f32 / total as f32 > BINARY_CONTROL_THRESHOLD
}

/// Removes NUL bytes and control characters (keeping `\t \n \r`), collapses
/// runs of spaces, and squeezes three-plus blank lines down to one.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let stripped: String = text
        .chars()
        .filter(|c| !c.is_control() || is_kept_whitespace(*c))
        .collect();

    let spaces_re = Regex::new(r" {2,}").unwrap_or_else(|_| Regex::new("^$").unwrap());
    let collapsed = spaces_re.replace_all(&stripped, " ");

    let newlines_re = Regex::new(r"\n{3,}").unwrap_or_else(|_| Regex::new("^$").unwrap());
    let collapsed = newlines_re.replace_all(&collapsed, "\n\n");

    collapsed.trim().to_string()
}

/// Quality score in [0, 1]: printable fraction, halved when the original
/// classifies as binary-like.
pub fn quality_score(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let total = text.chars().count();
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || is_kept_whitespace(*c))
        .count();
    let mut quality = printable as f32 / total as f32;
    if is_binary_like(text) {
        quality *= 0.5;
    }
    quality.min(1.0)
}

/// Cleans a quote and scores it, penalizing binary input by taking the lower
/// of the original and cleaned scores. Truncated at `max_length` chars.
pub fn extract_clean_quote(text: &str, max_length: usize) -> (String, f32) {
    let original_score = quality_score(text);
    let mut cleaned = clean_text(text);
    let final_score = original_score.min(quality_score(&cleaned));

    if cleaned.chars().count() > max_length {
        cleaned = cleaned.chars().take(max_length).collect::<String>() + "...";
    }
    (cleaned, final_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_binary() {
        assert!(!is_binary_like("Hello world"));
        assert_eq!(quality_score("Hello world"), 1.0);
    }

    #[test]
    fn null_bytes_mark_binary() {
        assert!(is_binary_like("\u{0}\u{1}\u{2}ABC"));
        assert!(quality_score("\u{0}\u{1}\u{2}") < 0.2);
    }

    #[test]
    fn clean_text_strips_controls_and_collapses_whitespace() {
        assert_eq!(clean_text("Hello\u{0}\u{1}world"), "Helloworld");
        assert_eq!(clean_text("Too   many    spaces"), "Too many spaces");
        assert_eq!(clean_text("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean_text("  padded  "), "padded");
    }

    #[test]
    fn tab_and_newline_survive_cleaning() {
        assert_eq!(clean_text("col1\tcol2\nrow"), "col1\tcol2\nrow");
    }

    #[test]
    fn quote_extraction_truncates_and_scores() {
        let (quote, score) = extract_clean_quote("  Too   many    spaces  ", 100);
        assert_eq!(quote, "Too many spaces");
        assert_eq!(score, 1.0);

        let long = "x".repeat(600);
        let (quote, _) = extract_clean_quote(&long, 500);
        assert!(quote.ends_with("..."));
        assert_eq!(quote.chars().count(), 503);
    }

    #[test]
    fn binary_original_halves_quality() {
        let noisy = format!("ok text{}", "\u{1}".repeat(10));
        assert!(is_binary_like(&noisy));
        let (_, score) = extract_clean_quote(&noisy, 100);
        assert!(score <= 0.5);
    }
}
