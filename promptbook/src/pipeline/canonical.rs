//! Canonical (unprepared) form of a pipeline.
//!
//! Two pipelines describe the same thing when their canonical strings are
//! byte-identical. Preparation output and the file a pipeline was loaded from
//! are not part of that identity.

use super::PipelineJson;

/// Returns true if the pipeline went through a preparation pass.
#[must_use]
pub fn is_pipeline_prepared(pipeline: &PipelineJson) -> bool {
    !pipeline.preparations.is_empty()
}

/// Strips everything preparation and loading added to a pipeline.
#[must_use]
pub fn unprepare_pipeline(pipeline: &PipelineJson) -> PipelineJson {
    PipelineJson {
        knowledge_pieces: Vec::new(),
        preparations: Vec::new(),
        source_file: None,
        ..pipeline.clone()
    }
}

/// Serializes the unprepared pipeline deterministically.
#[must_use]
pub fn pipeline_to_canonical_string(pipeline: &PipelineJson) -> String {
    // PipelineJson has no map with non-string keys and no non-finite floats
    // after parsing, so serialization cannot fail.
    serde_json::to_string_pretty(&unprepare_pipeline(pipeline)).unwrap_or_default()
}

/// Returns true if both pipelines have the same canonical form.
#[must_use]
pub fn is_same_pipeline(a: &PipelineJson, b: &PipelineJson) -> bool {
    pipeline_to_canonical_string(a) == pipeline_to_canonical_string(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{KnowledgePiece, ParameterJson, PreparationRecord};

    fn sample() -> PipelineJson {
        PipelineJson::new("Sample")
            .with_url("https://example.com/sample.book.md")
            .with_parameter(ParameterJson::input("thing"))
    }

    #[test]
    fn test_prepared_flag() {
        let mut pipeline = sample();
        assert!(!is_pipeline_prepared(&pipeline));

        pipeline.preparations.push(PreparationRecord {
            id: "p1".to_string(),
            promptbook_version: "0.1.0".to_string(),
            usage: crate::execution::Usage::zero(),
        });
        assert!(is_pipeline_prepared(&pipeline));
        assert!(!is_pipeline_prepared(&unprepare_pipeline(&pipeline)));
    }

    #[test]
    fn test_canonical_ignores_preparation_and_source() {
        let plain = sample();
        let mut prepared = sample().with_source_file("./a.book.json");
        prepared.knowledge_pieces.push(KnowledgePiece {
            name: "k".to_string(),
            content: "text".to_string(),
            sources: Vec::new(),
        });

        assert!(is_same_pipeline(&plain, &prepared));
    }

    #[test]
    fn test_canonical_detects_content_change() {
        let a = sample();
        let b = sample().with_parameter(ParameterJson::output("response"));
        assert!(!is_same_pipeline(&a, &b));
    }
}
