//! Pulls a single JSON document out of raw model text.
//!
//! Models regularly wrap the JSON they were told to emit bare in markdown
//! fences, and some return object-shaped values where a string was asked
//! for. This module absorbs both so the rest of the crate only sees typed
//! results.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::AnalysisError;

/// Decode `raw` into `T`, stripping markdown fences first.
///
/// Selection order: content of the first ```` ```json ```` fenced block, else
/// the content between the first pair of plain fences, else the trimmed raw
/// text. Unknown fields are ignored by the target types themselves.
pub fn extract<T: DeserializeOwned>(raw: &str) -> Result<T, AnalysisError> {
    let candidate = strip_fences(raw);
    serde_json::from_str(candidate).map_err(|err| AnalysisError::parse(err, candidate))
}

fn strip_fences(raw: &str) -> &str {
    if let Some(start) = raw.find("```json") {
        let rest = &raw[start + "```json".len()..];
        return match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    }

    if let Some(start) = raw.find("```") {
        let rest = &raw[start + "```".len()..];
        return match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    }

    raw.trim()
}

/// Deserializer for fields the model sometimes returns as an object keyed by
/// option letter instead of a plain string. Object input is flattened to
/// `"{key}: {value}"` lines separated by blank lines, in encounter order.
pub fn flexible_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(flatten_value(value))
}

fn flatten_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                format!("{key}: {text}")
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{CertificationResult, GenericExamResult, SolutionResult};

    const SOLUTION_JSON: &str = r#"{"code":"x","explanation":"y","timeComplexity":"O(1)","spaceComplexity":"O(1)"}"#;

    fn expected_solution() -> SolutionResult {
        SolutionResult {
            code: "x".into(),
            explanation: "y".into(),
            time_complexity: "O(1)".into(),
            space_complexity: "O(1)".into(),
        }
    }

    #[test]
    fn json_fenced_block_decodes_like_bare_json() {
        let fenced = format!("```json\n{SOLUTION_JSON}\n```");
        let from_fenced: SolutionResult = extract(&fenced).unwrap();
        let from_bare: SolutionResult = extract(SOLUTION_JSON).unwrap();
        assert_eq!(from_fenced, from_bare);
        assert_eq!(from_fenced, expected_solution());
    }

    #[test]
    fn plain_fence_without_tag_is_stripped() {
        let fenced = format!("```\n{SOLUTION_JSON}\n```");
        let result: SolutionResult = extract(&fenced).unwrap();
        assert_eq!(result, expected_solution());
    }

    #[test]
    fn surrounding_prose_around_json_fence_is_ignored() {
        let wrapped = format!("Here is the solution:\n```json\n{SOLUTION_JSON}\n```\nGood luck!");
        let result: SolutionResult = extract(&wrapped).unwrap();
        assert_eq!(result, expected_solution());
    }

    #[test]
    fn unfenced_prose_fails_with_parse_error() {
        let err = extract::<SolutionResult>("I cannot solve this").unwrap_err();
        match err {
            AnalysisError::Parse { text, .. } => assert_eq!(text, "I cannot solve this"),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn extraction_is_idempotent() {
        let fenced = format!("```json\n{SOLUTION_JSON}\n```");
        let first: SolutionResult = extract(&fenced).unwrap();
        let second: SolutionResult = extract(&fenced).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let with_extra = r#"{"code":"x","explanation":"y","timeComplexity":"O(1)","spaceComplexity":"O(1)","confidence":0.93}"#;
        let result: SolutionResult = extract(with_extra).unwrap();
        assert_eq!(result, expected_solution());
    }

    #[test]
    fn object_shaped_incorrect_answers_become_joined_string() {
        let raw = r#"{
            "answers": [{
                "questionNumber": 1,
                "questionSummary": "Which service stores objects?",
                "correctAnswer": "B. Amazon S3",
                "explanation": "S3 is object storage.",
                "incorrectAnswersExplanation": {"A": "wrong because X", "B": "wrong because Y"},
                "relatedServices": ["Amazon S3"]
            }],
            "examTips": "Read carefully."
        }"#;

        let result: CertificationResult = extract(raw).unwrap();
        assert_eq!(
            result.answers[0].incorrect_answers_explanation,
            "A: wrong because X\n\nB: wrong because Y"
        );
    }

    #[test]
    fn string_shaped_incorrect_answers_pass_through() {
        let raw = r#"{
            "answers": [{
                "questionNumber": 3,
                "questionSummary": "s",
                "correctAnswer": "c",
                "explanation": "e",
                "incorrectAnswersExplanation": "A is wrong",
                "relatedServices": []
            }],
            "examTips": "t"
        }"#;

        let result: CertificationResult = extract(raw).unwrap();
        assert_eq!(result.answers[0].incorrect_answers_explanation, "A is wrong");
        // question numbers are passed through untouched, gaps included
        assert_eq!(result.answers[0].question_number, 3);
    }

    #[test]
    fn generic_exam_defaults_detected_language() {
        let raw = r#"{"answers": [], "studyTips": "sleep well"}"#;
        let result: GenericExamResult = extract(raw).unwrap();
        assert_eq!(result.detected_language, "Unknown");
    }

    #[test]
    fn parse_error_carries_offending_substring() {
        let raw = "```json\n{not json at all}\n```";
        let err = extract::<SolutionResult>(raw).unwrap_err();
        match err {
            AnalysisError::Parse { text, .. } => assert_eq!(text, "{not json at all}"),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }
}
