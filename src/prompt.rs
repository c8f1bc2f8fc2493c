use crate::error::{PipelineError, Result};
use std::path::Path;

pub const SUMMARY_PLACEHOLDER: &str = "__fill sum info__";
pub const SEQUENCE_PLACEHOLDER: &str = "__fill seq info__";
pub const INTERACTIONS_PLACEHOLDER: &str = "__fill pdb info__";

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Missing placeholders are a configuration error, not a retryable one.
    pub fn parse(text: String) -> Result<Self> {
        for placeholder in [SUMMARY_PLACEHOLDER, SEQUENCE_PLACEHOLDER, INTERACTIONS_PLACEHOLDER] {
            if !text.contains(placeholder) {
                return Err(PipelineError::Template(format!(
                    "template is missing placeholder `{placeholder}`"
                )));
            }
        }
        Ok(Self { text })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Template(format!("cannot read template {:?}: {}", path, e))
        })?;
        Self::parse(text)
    }

    pub fn fill(&self, summary: &str, sequence: &str, interactions: &str) -> String {
        self.text
            .replace(SUMMARY_PLACEHOLDER, summary)
            .replace(SEQUENCE_PLACEHOLDER, sequence)
            .replace(INTERACTIONS_PLACEHOLDER, interactions)
    }
}

/// The model receives the prompt on a single line.
pub fn flatten(prompt: &str) -> String {
    prompt.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "Summary:\n__fill sum info__\nSequence:\n__fill seq info__\nContacts:\n__fill pdb info__\n";

    #[test]
    fn fills_all_placeholders() {
        let template = PromptTemplate::parse(TEMPLATE.to_string()).unwrap();
        let prompt = template.fill("Title: kinase", ">1C8K_A\nMK", "\"\"\"hbond\"\"\":");
        assert!(prompt.contains("Title: kinase"));
        assert!(prompt.contains(">1C8K_A\nMK"));
        assert!(!prompt.contains("__fill"));
    }

    #[test]
    fn empty_inputs_degrade_silently() {
        let template = PromptTemplate::parse(TEMPLATE.to_string()).unwrap();
        let prompt = template.fill("", "", "");
        assert_eq!(prompt, "Summary:\n\nSequence:\n\nContacts:\n\n");
    }

    #[test]
    fn missing_placeholder_is_fatal() {
        let err = PromptTemplate::parse("Summary: __fill sum info__".to_string()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn missing_template_file_is_fatal() {
        let err = PromptTemplate::load(Path::new("/nonexistent/template.txt")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn flattens_newlines() {
        assert_eq!(flatten("a\nb\nc"), "a b c");
    }
}
