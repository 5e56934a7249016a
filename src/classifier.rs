//! Sentiment classification.
//!
//! [`Classify`] is the boundary the aggregator sees: a batch of headlines in,
//! one [`SentimentLabel`] per headline out, same order. Two implementations
//! ship with the tracker:
//!
//! - [`LlmClassifier`]: asks an OpenAI-compatible model (via `awful_aj`) to
//!   label the whole batch in one request.
//! - [`LexiconClassifier`]: weighted word lists, fully offline.
//!
//! [`Classifier`] picks one at startup. It is built once and shared read-only
//! for the life of the process.

use crate::api::{AskAsync, AskFnWrapper, RetryAsk, with_backoff};
use crate::models::{NEGATIVE, NEUTRAL, POSITIVE, SentimentLabel};
use crate::utils::{extract_json_object, looks_truncated, truncate_for_log};
use awful_aj::{config, config_dir, template};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Why a batch could not be labelled.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classifier request failed: {0}")]
    Request(String),

    #[error("classifier reply was not usable: {0}")]
    Parse(String),

    #[error("classifier returned {got} labels for {expected} headlines")]
    LengthMismatch { expected: usize, got: usize },

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("classifier setup failed: {0}")]
    Setup(String),
}

/// Label a batch of headlines.
///
/// Implementations return exactly one label per input, in input order.
pub trait Classify {
    /// Label `headlines`.
    ///
    /// # Arguments
    ///
    /// * `headlines` - One source's batch, in document order
    ///
    /// # Returns
    ///
    /// `labels[i]` for `headlines[i]`, or a [`ClassifyError`]. An empty batch
    /// yields an empty result.
    async fn classify(&self, headlines: &[String]) -> Result<Vec<SentimentLabel>, ClassifyError>;
}

/// The classifier chosen at startup.
#[derive(Debug)]
pub enum Classifier {
    Llm(LlmClassifier),
    Lexicon(LexiconClassifier),
}

impl Classify for Classifier {
    async fn classify(&self, headlines: &[String]) -> Result<Vec<SentimentLabel>, ClassifyError> {
        match self {
            Classifier::Llm(c) => c.classify(headlines).await,
            Classifier::Lexicon(c) => c.classify(headlines).await,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LabelsReply {
    labels: Vec<String>,
}

/// Classifies through a chat model.
///
/// Generic over the transport so the prompt/parse/re-ask logic can run
/// against any [`AskAsync`]; in production that is the `awful_aj` client
/// wrapped in [`RetryAsk`].
#[derive(Debug)]
pub struct LlmClassifier<A = RetryAsk<AskFnWrapper>> {
    api: A,
}

impl LlmClassifier {
    /// Load the model config and chat template.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Path to `config.yaml`; defaults to the one in the
    ///   `awful_aj` config dir
    /// * `template_name` - Chat template the batch prompt is sent through
    ///
    /// # Returns
    ///
    /// A classifier backed by the retrying `awful_aj` client, or
    /// [`ClassifyError::Setup`] if either file cannot be loaded.
    #[instrument(level = "info")]
    pub async fn load(config_path: Option<&str>, template_name: &str) -> Result<Self, ClassifyError> {
        let conf_file = match config_path {
            Some(path) => PathBuf::from(path),
            None => config_dir()
                .map_err(|e| ClassifyError::Setup(format!("no config dir: {e}")))?
                .join("config.yaml"),
        };
        let path = conf_file.to_str().ok_or_else(|| {
            ClassifyError::Setup(format!("config path is not UTF-8: {}", conf_file.display()))
        })?;

        let config = config::load_config(path)
            .map_err(|e| ClassifyError::Setup(format!("loading {path}: {e}")))?;
        info!(config_path = path, "Loaded model configuration");

        let template = template::load_template(template_name)
            .await
            .map_err(|e| ClassifyError::Setup(format!("loading template {template_name}: {e}")))?;
        info!(template = template_name, "Loaded chat template");

        Ok(Self::with_api(with_backoff(config, template)))
    }
}

impl<A> LlmClassifier<A>
where
    A: AskAsync<Response = String>,
{
    /// Classify through `api` instead of the configured model.
    pub fn with_api(api: A) -> Self {
        Self { api }
    }

    async fn ask(&self, prompt: &str) -> Result<String, ClassifyError> {
        self.api
            .ask(prompt)
            .await
            .map_err(|e| ClassifyError::Request(e.to_string()))
    }
}

impl<A> Classify for LlmClassifier<A>
where
    A: AskAsync<Response = String>,
{
    #[instrument(level = "info", skip_all, fields(batch = headlines.len()))]
    async fn classify(&self, headlines: &[String]) -> Result<Vec<SentimentLabel>, ClassifyError> {
        if headlines.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_prompt(headlines);
        let mut reply = self.ask(&prompt).await?;
        let mut parsed = parse_reply(&reply);

        // A reply cut off mid-JSON gets exactly one second chance.
        if let Err(ref e) = parsed {
            if looks_truncated(e) {
                warn!(error = %e, "Reply truncated; re-asking once");
                reply = self.ask(&prompt).await?;
                parsed = parse_reply(&reply);
            }
        }

        let parsed = parsed.map_err(|e| {
            ClassifyError::Parse(format!("{e}; reply: {}", truncate_for_log(&reply, 200)))
        })?;
        let labels = labels_from_reply(parsed, headlines.len())?;
        debug!(?labels, "Model labelled batch");
        Ok(labels)
    }
}

/// Numbered prompt asking for one label per headline as JSON.
///
/// # Examples
///
/// ```ignore
/// let prompt = build_prompt(&["Markets rally on strong jobs data".to_string()]);
/// assert!(prompt.ends_with("1. Markets rally on strong jobs data\n"));
/// ```
pub fn build_prompt(headlines: &[String]) -> String {
    let mut prompt = format!(
        "Classify the sentiment of each of the following {} news headlines as {POSITIVE}, {NEGATIVE} or {NEUTRAL}.\n\
         Respond with only a JSON object of the form {{\"labels\": [\"{POSITIVE}\", ...]}} \
         containing exactly one label per headline, in the same order.\n\n",
        headlines.len()
    );
    for (i, headline) in headlines.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, headline);
    }
    prompt
}

fn parse_reply(reply: &str) -> Result<LabelsReply, serde_json::Error> {
    serde_json::from_str(extract_json_object(reply))
}

fn labels_from_reply(reply: LabelsReply, expected: usize) -> Result<Vec<SentimentLabel>, ClassifyError> {
    if reply.labels.len() != expected {
        return Err(ClassifyError::LengthMismatch {
            expected,
            got: reply.labels.len(),
        });
    }
    Ok(reply
        .labels
        .iter()
        .map(|l| SentimentLabel::new(l.to_uppercase()))
        .collect())
}

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").unwrap());

const POSITIVE_WORDS: &[(&str, f64)] = &[
    ("agreement", 1.0),
    ("approves", 1.0),
    ("best", 1.5),
    ("boost", 1.5),
    ("breakthrough", 2.0),
    ("celebrate", 1.5),
    ("cure", 2.0),
    ("gain", 1.5),
    ("gains", 1.5),
    ("good", 1.0),
    ("growth", 1.5),
    ("hope", 1.5),
    ("improve", 1.5),
    ("improves", 1.5),
    ("peace", 2.0),
    ("rally", 2.0),
    ("record", 1.0),
    ("recovery", 1.5),
    ("rescue", 1.5),
    ("rescued", 1.5),
    ("rise", 1.0),
    ("soar", 2.0),
    ("success", 1.5),
    ("surge", 1.5),
    ("wins", 1.5),
    ("win", 1.5),
];

const NEGATIVE_WORDS: &[(&str, f64)] = &[
    ("attack", -2.0),
    ("collapse", -2.0),
    ("conflict", -1.5),
    ("crash", -2.5),
    ("crisis", -2.0),
    ("dead", -2.5),
    ("death", -2.5),
    ("decline", -1.5),
    ("disaster", -2.5),
    ("drop", -1.0),
    ("fall", -1.0),
    ("falls", -1.0),
    ("fear", -1.5),
    ("fears", -1.5),
    ("fire", -1.5),
    ("fraud", -2.0),
    ("killed", -2.5),
    ("loss", -1.5),
    ("plunge", -2.0),
    ("protest", -1.0),
    ("scandal", -2.0),
    ("storm", -1.5),
    ("threat", -1.5),
    ("war", -2.5),
    ("warning", -1.5),
    ("without", -0.5),
];

const NEGATORS: &[&str] = &["no", "not", "never", "without"];

/// Offline word-list classifier.
///
/// Sums word weights over a headline; a negator flips the sign of the next
/// scored word. Positive totals are [`POSITIVE`], negative totals
/// [`NEGATIVE`], zero is [`NEUTRAL`].
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    weights: HashMap<&'static str, f64>,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconClassifier {
    /// Build the classifier from the built-in word lists.
    pub fn new() -> Self {
        let weights = POSITIVE_WORDS
            .iter()
            .chain(NEGATIVE_WORDS)
            .copied()
            .collect();
        Self { weights }
    }

    /// Sum of word weights in `text`, case-insensitive.
    ///
    /// # Arguments
    ///
    /// * `text` - A headline
    ///
    /// # Returns
    ///
    /// Positive for good news, negative for bad, `0.0` when no listed word
    /// appears. A negator (`no`, `not`, `never`, `without`) flips the sign of
    /// the next listed word.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let lexicon = LexiconClassifier::new();
    /// assert!(lexicon.score("Markets rally") > 0.0);
    /// assert!(lexicon.score("Talks end with no agreement") < 0.0);
    /// ```
    pub fn score(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let mut score = 0.0;
        let mut negate = false;
        for word in WORD.find_iter(&lower).map(|m| m.as_str()) {
            if let Some(weight) = self.weights.get(word) {
                score += if negate { -weight } else { *weight };
                negate = false;
            }
            if NEGATORS.contains(&word) {
                negate = true;
            }
        }
        score
    }

    /// Map [`score`](Self::score) to [`POSITIVE`], [`NEGATIVE`] or [`NEUTRAL`].
    pub fn label(&self, text: &str) -> SentimentLabel {
        let score = self.score(text);
        let label = if score > 0.0 {
            POSITIVE
        } else if score < 0.0 {
            NEGATIVE
        } else {
            NEUTRAL
        };
        SentimentLabel::new(label)
    }
}

impl Classify for LexiconClassifier {
    async fn classify(&self, headlines: &[String]) -> Result<Vec<SentimentLabel>, ClassifyError> {
        Ok(headlines.iter().map(|h| self.label(h)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::error::Error;

    /// Replays canned replies in order and records every prompt it was sent.
    #[derive(Default)]
    struct ScriptedAsk {
        replies: RefCell<VecDeque<Result<String, String>>>,
        prompts: RefCell<Vec<String>>,
    }

    impl ScriptedAsk {
        fn reply(self, text: &str) -> Self {
            self.replies.borrow_mut().push_back(Ok(text.to_string()));
            self
        }

        fn fail(self, message: &str) -> Self {
            self.replies.borrow_mut().push_back(Err(message.to_string()));
            self
        }

        fn calls(&self) -> usize {
            self.prompts.borrow().len()
        }
    }

    impl AskAsync for ScriptedAsk {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            self.prompts.borrow_mut().push(text.to_string());
            match self.replies.borrow_mut().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(message)) => Err(message.into()),
                None => Err("no scripted reply left".into()),
            }
        }
    }

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_lexicon_returns_one_label_per_headline_in_order() {
        let headlines = strings(&[
            "Markets rally as inflation cools faster than expected",
            "Storm kills dozens and leaves thousands without power",
            "Parliament to debate the annual budget on Tuesday",
            "Scientists hail breakthrough in battery technology",
        ]);
        let labels = LexiconClassifier::new().classify(&headlines).await.unwrap();

        assert_eq!(labels.len(), headlines.len());
        let raw: Vec<&str> = labels.iter().map(|l| l.as_str()).collect();
        assert_eq!(raw, vec![POSITIVE, NEGATIVE, NEUTRAL, POSITIVE]);
    }

    #[tokio::test]
    async fn test_lexicon_empty_batch() {
        let labels = LexiconClassifier::new().classify(&[]).await.unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_lexicon_negation_flips_next_word() {
        let lexicon = LexiconClassifier::new();
        assert!(lexicon.score("Talks end with no agreement on tariffs") < 0.0);
        assert!(lexicon.score("Officials say the outbreak is not a crisis") > 0.0);
    }

    #[test]
    fn test_lexicon_is_case_insensitive() {
        let lexicon = LexiconClassifier::new();
        assert_eq!(lexicon.label("WAR AND DISASTER").as_str(), NEGATIVE);
    }

    #[test]
    fn test_build_prompt_numbers_headlines() {
        let prompt = build_prompt(&strings(&["First headline here", "Second headline here"]));
        assert!(prompt.contains("following 2 news headlines"));
        assert!(prompt.contains("1. First headline here\n"));
        assert!(prompt.contains("2. Second headline here\n"));
    }

    #[test]
    fn test_parse_reply_with_fences() {
        let reply = "```json\n{\"labels\": [\"positive\", \" NEGATIVE \"]}\n```";
        let labels = labels_from_reply(parse_reply(reply).unwrap(), 2).unwrap();
        assert_eq!(labels, vec![SentimentLabel::new(POSITIVE), SentimentLabel::new(NEGATIVE)]);
    }

    #[test]
    fn test_reply_length_mismatch_is_an_error() {
        let reply = parse_reply(r#"{"labels": ["NEUTRAL"]}"#).unwrap();
        let err = labels_from_reply(reply, 3).unwrap_err();
        assert!(matches!(err, ClassifyError::LengthMismatch { expected: 3, got: 1 }));
    }

    #[test]
    fn test_truncated_reply_is_detected() {
        let err = parse_reply(r#"{"labels": ["NEUTRAL", "POS"#).unwrap_err();
        assert!(looks_truncated(&err));
    }

    #[tokio::test]
    async fn test_llm_empty_batch_sends_no_request() {
        let classifier = LlmClassifier::with_api(ScriptedAsk::default());
        let labels = classifier.classify(&[]).await.unwrap();

        assert!(labels.is_empty());
        assert_eq!(classifier.api.calls(), 0);
    }

    #[tokio::test]
    async fn test_llm_labels_batch_in_order() {
        let headlines = strings(&["Markets rally on strong jobs data", "Storm kills dozens overnight"]);
        let classifier =
            LlmClassifier::with_api(ScriptedAsk::default().reply(r#"{"labels": ["positive", "NEGATIVE"]}"#));

        let labels = classifier.classify(&headlines).await.unwrap();

        assert_eq!(labels, vec![SentimentLabel::new(POSITIVE), SentimentLabel::new(NEGATIVE)]);
        assert_eq!(classifier.api.calls(), 1);
        assert!(classifier.api.prompts.borrow()[0].contains("2. Storm kills dozens overnight"));
    }

    #[tokio::test]
    async fn test_llm_reasks_once_after_truncated_reply() {
        let headlines = strings(&[
            "Markets rally on strong jobs data",
            "Storm kills dozens overnight",
            "Parliament to debate the budget",
        ]);
        let api = ScriptedAsk::default()
            .reply(r#"{"labels": ["POSITIVE", "NEG"#)
            .reply(r#"{"labels": ["POSITIVE", "NEGATIVE", "NEUTRAL"]}"#);
        let classifier = LlmClassifier::with_api(api);

        let labels = classifier.classify(&headlines).await.unwrap();

        let raw: Vec<&str> = labels.iter().map(|l| l.as_str()).collect();
        assert_eq!(raw, vec![POSITIVE, NEGATIVE, NEUTRAL]);
        assert_eq!(classifier.api.calls(), 2);
        let prompts = classifier.api.prompts.borrow();
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test]
    async fn test_llm_gives_up_after_second_truncated_reply() {
        let api = ScriptedAsk::default()
            .reply(r#"{"labels": ["POS"#)
            .reply(r#"{"labels": ["POSITIVE""#)
            .reply(r#"{"labels": ["POSITIVE"]}"#);
        let classifier = LlmClassifier::with_api(api);

        let err = classifier
            .classify(&strings(&["Markets rally on strong jobs data"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifyError::Parse(_)));
        assert_eq!(classifier.api.calls(), 2);
    }

    #[tokio::test]
    async fn test_llm_malformed_reply_is_not_reasked() {
        let classifier = LlmClassifier::with_api(ScriptedAsk::default().reply("I think these are mostly positive."));

        let err = classifier
            .classify(&strings(&["Markets rally on strong jobs data"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifyError::Parse(_)));
        assert_eq!(classifier.api.calls(), 1);
    }

    #[tokio::test]
    async fn test_llm_label_count_mismatch() {
        let classifier = LlmClassifier::with_api(ScriptedAsk::default().reply(r#"{"labels": ["NEUTRAL"]}"#));

        let err = classifier
            .classify(&strings(&["First headline here", "Second headline here"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifyError::LengthMismatch { expected: 2, got: 1 }));
    }

    #[tokio::test]
    async fn test_llm_request_failure() {
        let classifier = LlmClassifier::with_api(ScriptedAsk::default().fail("connection reset"));

        let err = classifier
            .classify(&strings(&["Markets rally on strong jobs data"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifyError::Request(ref m) if m.contains("connection reset")));
    }
}
