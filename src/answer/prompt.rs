//! The grounded-answer prompt template.

use crate::types::PipelineError;

/// Slot replaced with the retrieved context.
pub const CONTEXT_SLOT: &str = "{context}";
/// Slot replaced with the user's question.
pub const QUESTION_SLOT: &str = "{question}";

/// Template used when no custom template is configured.
pub const AIRPORT_TEMPLATE: &str = "\
You are a helpful assistant for Changi Airport and Jewel Changi Airport.
Answer the question based only on the following context, do not make up answers:
{context}

Question: {question}
";

/// A prompt template with exactly two substitution slots: the retrieved
/// context and the user question.
#[derive(Clone, Debug)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Validates that both slots are present and builds the template.
    pub fn new(template: impl Into<String>) -> Result<Self, PipelineError> {
        let template = template.into();
        for slot in [CONTEXT_SLOT, QUESTION_SLOT] {
            if !template.contains(slot) {
                return Err(PipelineError::Configuration(format!(
                    "prompt template is missing the {slot} slot"
                )));
            }
        }
        Ok(Self { template })
    }

    /// The default airport-assistant template.
    pub fn airport_default() -> Self {
        Self {
            template: AIRPORT_TEMPLATE.to_string(),
        }
    }

    /// Substitutes both slots and returns the finished prompt.
    pub fn render(&self, context: &str, question: &str) -> String {
        self.template
            .replace(CONTEXT_SLOT, context)
            .replace(QUESTION_SLOT, question)
    }
}
