//! Study tools: quizzes, flashcards, summaries and answers generated from an
//! indexed document.
//!
//! Prompting and parsing live behind [`Generator`]; this module only decides
//! what content a task gets and normalizes the task parameters.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};
use crate::service::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
    #[default]
    Mixed,
}

impl QuestionType {
    /// Unknown names fall back to [`QuestionType::Mixed`].
    pub fn parse_lenient(name: &str) -> Self {
        match name {
            "multiple_choice" => Self::MultipleChoice,
            "short_answer" => Self::ShortAnswer,
            _ => Self::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StudyTask {
    Quiz { num_questions: u32, question_type: QuestionType },
    Flashcards { num_cards: u32 },
    Summary { num_points: u32 },
    Answer { question: String },
}

impl StudyTask {
    pub fn quiz(num_questions: u32, question_type: QuestionType) -> Self {
        Self::Quiz { num_questions: num_questions.clamp(1, 10), question_type }
    }

    pub fn flashcards(num_cards: u32) -> Self {
        Self::Flashcards { num_cards: num_cards.clamp(5, 20) }
    }

    pub fn summary(num_points: u32) -> Self {
        Self::Summary { num_points: num_points.clamp(3, 10) }
    }

    pub fn answer(question: impl Into<String>) -> Self {
        Self::Answer { question: question.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Quiz { .. } => "quiz",
            Self::Flashcards { .. } => "flashcards",
            Self::Summary { .. } => "summary",
            Self::Answer { .. } => "answer",
        }
    }
}

/// External text generator (an LLM behind prompt templates).
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, task: &StudyTask, content: &str) -> Result<serde_json::Value>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyOutput {
    pub document_id: String,
    pub kind: String,
    pub output: serde_json::Value,
}

pub struct StudyAssistant {
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
}

impl StudyAssistant {
    pub fn new(retriever: Arc<Retriever>, generator: Arc<dyn Generator>) -> Self {
        Self { retriever, generator }
    }

    /// Answers get a budgeted query context; every other task gets the
    /// reconstructed full text.
    pub async fn run(&self, doc_id: &str, task: StudyTask) -> Result<StudyOutput> {
        if !self.retriever.is_indexed(doc_id) {
            return Err(RetrievalError::DocumentNotIndexed(doc_id.to_string()));
        }
        let content = match &task {
            StudyTask::Answer { question } => {
                let budget = self.retriever.config().max_context_tokens;
                self.retriever.get_context_for_query(doc_id, question, budget).await?
            }
            _ => self.retriever.get_full_text(doc_id)?,
        };
        let output = self.generator.generate(&task, &content).await.map_err(|e| match e {
            RetrievalError::GenerationError(_) => e,
            other => RetrievalError::GenerationError(other.to_string()),
        })?;
        tracing::info!(doc_id, kind = task.kind(), "generated study material");
        Ok(StudyOutput { document_id: doc_id.to_string(), kind: task.kind().to_string(), output })
    }
}
