//! Template re-embedding.
//!
//! Each word is substituted into a phrase template and the resulting phrases
//! are embedded with one batch call, so similarity is computed between
//! words in context rather than in isolation.

use simwords_core::config::DEFAULT_PLACEHOLDER;
use simwords_core::error::{Result, SimWordsError};
use simwords_core::types::Vector;

use crate::embedding::{expect_batch_len, EmbeddingService};

/// A phrase template with a placeholder token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateReembedder {
    template: String,
    placeholder: String,
}

impl TemplateReembedder {
    /// Fails if `template` does not contain `placeholder`.
    pub fn new(template: impl Into<String>, placeholder: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let placeholder = placeholder.into();
        if placeholder.is_empty() {
            return Err(SimWordsError::InvalidArgument(
                "template placeholder must not be empty".into(),
            ));
        }
        if !template.contains(&placeholder) {
            return Err(SimWordsError::InvalidArgument(format!(
                "template {:?} does not contain the placeholder {}",
                template, placeholder
            )));
        }
        Ok(Self {
            template,
            placeholder,
        })
    }

    /// Template using the default `{{placeholder}}` token.
    pub fn with_default_placeholder(template: impl Into<String>) -> Result<Self> {
        Self::new(template, DEFAULT_PLACEHOLDER)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitute `phrase` for every occurrence of the placeholder.
    pub fn fill(&self, phrase: &str) -> String {
        self.template.replace(&self.placeholder, phrase)
    }

    /// Embed every phrase inside the template with a single batch call.
    ///
    /// `context` names the step in the error if the provider fails.
    pub async fn reembed<E, S>(&self, phrases: &[S], embedder: &E, context: &str) -> Result<Vec<Vector>>
    where
        E: EmbeddingService,
        S: AsRef<str>,
    {
        if phrases.is_empty() {
            return Ok(Vec::new());
        }
        let inputs: Vec<String> = phrases.iter().map(|p| self.fill(p.as_ref())).collect();
        let vectors = embedder
            .embed_batch(&inputs)
            .await
            .map_err(|e| e.within(context))?;
        expect_batch_len(context, inputs.len(), &vectors)?;
        Ok(vectors)
    }
}
