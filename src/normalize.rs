//! Text artifact normalization.
//!
//! The `normalize` stage canonicalizes extracted text before anchoring:
//! line endings become `\n`, trailing whitespace is trimmed per line, and
//! runs of blank lines collapse to one. Non-text artifacts pass through
//! unchanged — normalization never drops a record.

use crate::models::ExtractedArtifact;

/// Normalize every artifact from the `extract` stage. Output order matches
/// input order.
pub fn normalize_artifacts(artifacts: Vec<ExtractedArtifact>) -> Vec<ExtractedArtifact> {
    artifacts
        .into_iter()
        .map(|mut artifact| {
            if artifact.mime_type.starts_with("text/") {
                let normalized = normalize_text(&String::from_utf8_lossy(&artifact.payload));
                artifact.payload = normalized.into_bytes();
            }
            artifact
        })
        .collect()
}

fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    for line in unified.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_artifact(payload: &str) -> ExtractedArtifact {
        ExtractedArtifact {
            payload: payload.as_bytes().to_vec(),
            mime_type: "text/plain".to_string(),
            method: "text/plain".to_string(),
        }
    }

    #[test]
    fn crlf_becomes_lf() {
        let out = normalize_artifacts(vec![text_artifact("one\r\ntwo\rthree")]);
        assert_eq!(out[0].payload, b"one\ntwo\nthree");
    }

    #[test]
    fn trailing_whitespace_is_trimmed() {
        let out = normalize_artifacts(vec![text_artifact("line one   \nline two\t")]);
        assert_eq!(out[0].payload, b"line one\nline two");
    }

    #[test]
    fn blank_runs_collapse_to_one() {
        let out = normalize_artifacts(vec![text_artifact("a\n\n\n\nb")]);
        assert_eq!(out[0].payload, b"a\n\nb");
    }

    #[test]
    fn non_text_passes_through_untouched() {
        let binary = ExtractedArtifact {
            payload: vec![0x00, 0x01, 0x0d, 0x0a],
            mime_type: "application/octet-stream".to_string(),
            method: "binary".to_string(),
        };
        let out = normalize_artifacts(vec![binary.clone()]);
        assert_eq!(out[0].payload, binary.payload);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(normalize_artifacts(Vec::new()).is_empty());
    }

    #[test]
    fn order_is_preserved() {
        let out = normalize_artifacts(vec![text_artifact("first"), text_artifact("second")]);
        assert_eq!(out[0].payload, b"first");
        assert_eq!(out[1].payload, b"second");
    }

    #[test]
    fn deterministic() {
        let input = "Alpha\r\n\r\n\r\nBeta  ";
        let a = normalize_artifacts(vec![text_artifact(input)]);
        let b = normalize_artifacts(vec![text_artifact(input)]);
        assert_eq!(a[0].payload, b[0].payload);
    }
}
