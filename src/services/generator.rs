use std::time::Duration;

use color_eyre::{
    eyre::{bail, ensure, eyre, OptionExt},
    Result,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{GeneratedDesafio, GeneratedQuiz};
use crate::names;

/// Raised when the generator does not answer within the application timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("content generator timed out")]
pub struct GeneratorTimeout;

/// Raised when no generator endpoint is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("content generator is not configured")]
pub struct GeneratorDisabled;

// ---------------------------------------------------------------------------
// ContentGenerator trait
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait ContentGenerator: Send + Sync {
    /// Whether a generator endpoint is configured.
    fn is_enabled(&self) -> bool;

    /// Send one system + user prompt pair and return the raw text answer.
    fn complete(
        &self,
        system: &str,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatAnswer,
}

#[derive(Deserialize)]
struct ChatAnswer {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct HttpContentGenerator {
    client: reqwest::Client,
    url: Option<String>,
    api_key: String,
    model: String,
}

impl HttpContentGenerator {
    pub fn new(url: Option<String>, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            model,
        }
    }
}

impl ContentGenerator for HttpContentGenerator {
    fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let Some(url) = &self.url else {
            return Err(GeneratorDisabled.into());
        };

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.7,
        };

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::error!("generator API error: {status} - {text}");
            bail!("generator API returned {status}");
        }

        let answer: ChatResponse = resp.json().await?;
        answer
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_eyre("generator returned no content")
    }
}

// ---------------------------------------------------------------------------
// GeneratorService
// ---------------------------------------------------------------------------

const QUIZ_SYSTEM_PROMPT: &str = "Você cria quizzes de programação para alunos. \
Responda somente com JSON no formato \
{\"title\": string, \"questions\": [{\"prompt\": string, \"options\": [string], \
\"correctOption\": number, \"explanation\": string}]}. \
correctOption é o índice (a partir de 0) da opção correta.";

const DESAFIO_SYSTEM_PROMPT: &str = "Você cria desafios práticos de programação para alunos. \
Responda somente com JSON no formato {\"title\": string, \"description\": string}. \
A descrição deve trazer o objetivo, os requisitos e os critérios de aceite.";

pub struct GeneratorService<G: ContentGenerator = HttpContentGenerator> {
    generator: G,
    timeout: Duration,
}

impl<G: ContentGenerator + Clone> Clone for GeneratorService<G> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            timeout: self.timeout,
        }
    }
}

impl<G: ContentGenerator> GeneratorService<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            timeout: names::GENERATOR_TIMEOUT,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_enabled()
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        if !self.generator.is_enabled() {
            return Err(GeneratorDisabled.into());
        }

        match tokio::time::timeout(self.timeout, self.generator.complete(system, prompt)).await {
            Ok(answer) => answer,
            Err(_) => {
                tracing::warn!("generator call exceeded {:?}", self.timeout);
                Err(GeneratorTimeout.into())
            }
        }
    }

    pub async fn generate_quiz(
        &self,
        technology: &str,
        level: &str,
        question_count: usize,
    ) -> Result<GeneratedQuiz> {
        let prompt = format!(
            "Crie um quiz de {question_count} perguntas de múltipla escolha sobre \
             {technology}, nível {level}."
        );
        let text = self.complete(QUIZ_SYSTEM_PROMPT, &prompt).await?;
        let quiz = parse_quiz(&text)?;

        tracing::info!(
            "quiz generated for {technology}/{level}: {} questions",
            quiz.questions.len()
        );
        Ok(quiz)
    }

    pub async fn generate_desafio(&self, technology: &str, level: &str) -> Result<GeneratedDesafio> {
        let prompt = format!("Crie um desafio prático de {technology}, nível {level}.");
        let text = self.complete(DESAFIO_SYSTEM_PROMPT, &prompt).await?;
        let desafio = parse_desafio(&text)?;

        tracing::info!("desafio generated for {technology}/{level}: {}", desafio.title);
        Ok(desafio)
    }
}

/// Cut the outermost JSON object out of free text (markdown fences, chatter).
fn extract_json(text: &str) -> Result<&str> {
    let start = text.find('{').ok_or_eyre("no JSON object in generator output")?;
    let end = text.rfind('}').ok_or_eyre("no JSON object in generator output")?;
    ensure!(start < end, "no JSON object in generator output");
    Ok(&text[start..=end])
}

pub fn parse_quiz(text: &str) -> Result<GeneratedQuiz> {
    let quiz: GeneratedQuiz = serde_json::from_str(extract_json(text)?)
        .map_err(|e| eyre!("generator output is not a quiz: {e}"))?;

    ensure!(!quiz.title.trim().is_empty(), "generated quiz has no title");
    ensure!(!quiz.questions.is_empty(), "generated quiz has no questions");
    for (i, question) in quiz.questions.iter().enumerate() {
        ensure!(
            !question.prompt.trim().is_empty(),
            "question {i} has an empty prompt"
        );
        ensure!(
            question.options.len() >= 2,
            "question {i} has fewer than two options"
        );
        ensure!(
            question.correct_option < question.options.len(),
            "question {i} points at a missing option"
        );
    }

    Ok(quiz)
}

pub fn parse_desafio(text: &str) -> Result<GeneratedDesafio> {
    let desafio: GeneratedDesafio = serde_json::from_str(extract_json(text)?)
        .map_err(|e| eyre!("generator output is not a desafio: {e}"))?;

    ensure!(!desafio.title.trim().is_empty(), "generated desafio has no title");
    ensure!(
        !desafio.description.trim().is_empty(),
        "generated desafio has no description"
    );
    Ok(desafio)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const QUIZ_TEXT: &str = r#"Claro! Aqui está:
```json
{
  "title": "Ownership em Rust",
  "questions": [
    {
      "prompt": "O que acontece com um String após ser movido?",
      "options": ["Continua válido", "Não pode mais ser usado"],
      "correctOption": 1,
      "explanation": "O valor foi movido."
    }
  ]
}
```"#;

    #[test]
    fn parse_quiz_strips_surrounding_text() {
        let quiz = parse_quiz(QUIZ_TEXT).unwrap();
        assert_eq!(quiz.title, "Ownership em Rust");
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].correct_option, 1);
    }

    #[test]
    fn parse_quiz_rejects_out_of_range_answer() {
        let text = r#"{"title": "T", "questions": [{"prompt": "P", "options": ["a", "b"], "correctOption": 2}]}"#;
        assert!(parse_quiz(text).is_err());
    }

    #[test]
    fn parse_quiz_rejects_plain_text() {
        assert!(parse_quiz("desculpe, não consigo").is_err());
    }

    #[test]
    fn parse_desafio_requires_description() {
        assert!(parse_desafio(r#"{"title": "API", "description": "  "}"#).is_err());
        let desafio =
            parse_desafio(r#"{"title": "API", "description": "Crie uma API"}"#).unwrap();
        assert_eq!(desafio.title, "API");
    }

    #[tokio::test]
    async fn generate_quiz_parses_generator_answer() {
        let mut mock = MockContentGenerator::new();
        mock.expect_is_enabled().return_const(true);
        mock.expect_complete()
            .withf(|_, prompt| prompt.contains("rust") && prompt.contains("iniciante"))
            .returning(|_, _| Box::pin(async { Ok(QUIZ_TEXT.to_string()) }));

        let quiz = GeneratorService::new(mock)
            .generate_quiz("rust", "iniciante", 1)
            .await
            .unwrap();
        assert_eq!(quiz.questions.len(), 1);
    }

    #[tokio::test]
    async fn disabled_generator_is_reported() {
        let mut mock = MockContentGenerator::new();
        mock.expect_is_enabled().return_const(false);
        mock.expect_complete().never();

        let err = GeneratorService::new(mock)
            .generate_desafio("rust", "iniciante")
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<GeneratorDisabled>().is_some());
        assert_eq!(err.to_string(), "content generator is not configured");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generator_times_out() {
        let mut mock = MockContentGenerator::new();
        mock.expect_is_enabled().return_const(true);
        mock.expect_complete().returning(|_, _| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(120)).await;
                Ok(QUIZ_TEXT.to_string())
            })
        });

        let err = GeneratorService::new(mock)
            .generate_quiz("rust", "iniciante", 1)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<GeneratorTimeout>().is_some());
        assert_eq!(err.to_string(), "content generator timed out");
    }
}
