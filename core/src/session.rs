//! The conversation loop over one loaded file.
//!
//! A turn moves `Idle -> AwaitingBackend` and then either straight to
//! `Answered`, or through `NeedsData -> AwaitingBackend2 -> Answered` when
//! the backend asks for rows. Every turn ends back in `Idle`, including
//! turns whose backend call failed.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::chat::{
    BackendError, BackendReply, ChatBackend, ChatRequest, ConversationTurn, Credential,
    enriched_prompt, parse_reply, render_model, strip_directives, system_prompt,
    tables_mentioned, turn_prompt,
};
use crate::config::LensConfig;
use crate::error_codes;
use crate::model::MetadataModel;
use crate::package::PbiPackage;
use crate::quick_answer;
use crate::sample::{SampleTier, TableSample, TabularDataAccessor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    AwaitingBackend,
    Answered,
    NeedsData,
    AwaitingBackend2,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no API key has been provided for this session")]
    MissingCredential,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::MissingCredential => error_codes::SESSION_MISSING_CREDENTIAL,
        }
    }
}

/// What happened during one call to [`Session::ask`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    /// Text of the assistant turn that was appended.
    pub answer: String,
    /// States entered during the turn, in order, ending with `Idle`.
    pub states: Vec<ConversationState>,
    pub backend_calls: usize,
    /// Tables the backend asked for, deduplicated.
    pub requested_tables: Vec<String>,
    /// Tables whose large samples were handed to the second call.
    pub fetched_tables: Vec<String>,
    /// Set when a backend call failed and the answer is an error notice.
    pub failed: bool,
}

impl TurnOutcome {
    fn new() -> TurnOutcome {
        TurnOutcome {
            answer: String::new(),
            states: Vec::new(),
            backend_calls: 0,
            requested_tables: Vec::new(),
            fetched_tables: Vec::new(),
            failed: false,
        }
    }
}

/// A conversation about one loaded file. Turns are strictly sequential.
pub struct Session<B: ChatBackend> {
    backend: B,
    config: LensConfig,
    model: Arc<MetadataModel>,
    model_text: String,
    system: String,
    accessor: TabularDataAccessor,
    history: Vec<ConversationTurn>,
    credential: Option<Credential>,
    state: ConversationState,
    /// Tables fetched for earlier data requests; they get small samples on
    /// later turns.
    requested: Vec<String>,
}

impl<B: ChatBackend> Session<B> {
    pub fn new(package: &PbiPackage, backend: B, config: LensConfig) -> Session<B> {
        let accessor = package.data_accessor(&config);
        let model = Arc::clone(package.model());
        let model_text = render_model(&model, &config);
        let system = system_prompt(accessor.has_row_data());
        Session {
            backend,
            config,
            model,
            model_text,
            system,
            accessor,
            history: Vec::new(),
            credential: None,
            state: ConversationState::Idle,
            requested: Vec::new(),
        }
    }

    /// Switches to another file. The sample cache and history start over;
    /// the credential is kept.
    pub fn load(&mut self, package: &PbiPackage) {
        self.accessor = package.data_accessor(&self.config);
        self.model = Arc::clone(package.model());
        self.model_text = render_model(&self.model, &self.config);
        self.system = system_prompt(self.accessor.has_row_data());
        self.history.clear();
        self.requested.clear();
        self.state = ConversationState::Idle;
    }

    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    pub fn clear_credential(&mut self) {
        self.credential = None;
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn model(&self) -> &Arc<MetadataModel> {
        &self.model
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn accessor(&self) -> &TabularDataAccessor {
        &self.accessor
    }

    pub fn accessor_mut(&mut self) -> &mut TabularDataAccessor {
        &mut self.accessor
    }

    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    /// Offline answer for common questions; needs neither backend nor
    /// credential and leaves the history untouched.
    pub fn quick_answer(&self, question: &str) -> Option<String> {
        quick_answer::answer(&self.model, question)
    }

    /// Runs one conversation turn.
    ///
    /// Fails only when no credential is set, in which case nothing is
    /// recorded. Backend failures are reported in the outcome and leave a
    /// single error turn in the history.
    pub async fn ask(&mut self, question: &str) -> Result<TurnOutcome, SessionError> {
        let Some(credential) = self.credential.clone() else {
            return Err(SessionError::MissingCredential);
        };

        let mut outcome = TurnOutcome::new();
        let prior = self.history.len();
        self.history.push(ConversationTurn::user(question));

        let small = self.relevant_samples(question);
        let prompt = turn_prompt(
            &self.model_text,
            &small,
            question,
            self.config.max_sample_cell_chars,
        );

        self.enter(ConversationState::AwaitingBackend, &mut outcome);
        let first = self.call_backend(prior, prompt, &credential, &mut outcome).await;
        let reply = match first {
            Ok(text) => parse_reply(&text),
            Err(err) => return Ok(self.fail(err, outcome)),
        };

        let (tables, preamble) = match reply {
            BackendReply::PlainAnswer(text) => {
                self.history.push(ConversationTurn::assistant(text.clone()));
                outcome.answer = text;
                self.enter(ConversationState::Answered, &mut outcome);
                self.enter(ConversationState::Idle, &mut outcome);
                return Ok(outcome);
            }
            BackendReply::DataRequest { tables, preamble } => (tables, preamble),
        };

        self.enter(ConversationState::NeedsData, &mut outcome);
        log::debug!("backend requested data for {:?}", tables);
        if !preamble.is_empty() {
            log::debug!("discarding data request preamble: {}", preamble);
        }
        outcome.requested_tables = tables.clone();

        let mut samples: Vec<Arc<TableSample>> = Vec::new();
        let mut unavailable: Vec<String> = Vec::new();
        for (name, result) in self.accessor.fetch_large_many(&tables).await {
            match result {
                Ok(sample) => {
                    if !self.requested.iter().any(|t| t.eq_ignore_ascii_case(&sample.table)) {
                        self.requested.push(sample.table.clone());
                    }
                    outcome.fetched_tables.push(sample.table.clone());
                    samples.push(sample);
                }
                Err(err) => {
                    log::warn!("[{}] dropping requested table '{}': {}", err.code(), name, err);
                    unavailable.push(format!("{}: {}", name, err));
                }
            }
        }

        let prompt = enriched_prompt(
            &self.model_text,
            &samples,
            question,
            &unavailable,
            self.config.max_sample_cell_chars,
        );
        self.enter(ConversationState::AwaitingBackend2, &mut outcome);
        let second = self.call_backend(prior, prompt, &credential, &mut outcome).await;
        let text = match second {
            Ok(text) => text,
            Err(err) => return Ok(self.fail(err, outcome)),
        };

        let mut answer = strip_directives(&text);
        if answer.is_empty() {
            answer = "The assistant asked for more data instead of answering. \
                      Try rephrasing the question."
                .to_string();
        }
        self.history.push(ConversationTurn {
            data_request: Some(tables),
            ..ConversationTurn::assistant(answer.clone())
        });
        outcome.answer = answer;
        self.enter(ConversationState::Answered, &mut outcome);
        self.enter(ConversationState::Idle, &mut outcome);
        Ok(outcome)
    }

    fn enter(&mut self, state: ConversationState, outcome: &mut TurnOutcome) {
        log::debug!("conversation state {:?} -> {:?}", self.state, state);
        self.state = state;
        outcome.states.push(state);
    }

    /// Small samples for tables named in the question and tables requested
    /// earlier. Only files with row data get any.
    fn relevant_samples(&mut self, question: &str) -> Vec<Arc<TableSample>> {
        if !self.accessor.has_row_data() {
            return Vec::new();
        }
        let mut names = tables_mentioned(&self.model, question);
        for table in &self.requested {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(table)) {
                names.push(table.clone());
            }
        }

        let mut samples = Vec::with_capacity(names.len());
        for name in names {
            match self.accessor.fetch_sample(&name, SampleTier::Small) {
                Ok(sample) => samples.push(sample),
                Err(err) => log::debug!("[{}] no small sample for '{}': {}", err.code(), name, err),
            }
        }
        samples
    }

    /// History sent along with a prompt: turns before the current question,
    /// minus error notices, capped to the most recent configured count.
    fn history_window(&self, prior: usize) -> Vec<&ConversationTurn> {
        let sendable: Vec<&ConversationTurn> =
            self.history[..prior].iter().filter(|t| !t.is_error).collect();
        let skip = sendable.len().saturating_sub(self.config.max_history_turns);
        sendable.into_iter().skip(skip).collect()
    }

    async fn call_backend(
        &self,
        prior: usize,
        prompt: String,
        credential: &Credential,
        outcome: &mut TurnOutcome,
    ) -> Result<String, BackendError> {
        let request = ChatRequest {
            system: &self.system,
            history: self.history_window(prior),
            prompt,
        };
        outcome.backend_calls += 1;
        self.backend.complete(&request, credential).await
    }

    fn fail(&mut self, err: BackendError, mut outcome: TurnOutcome) -> TurnOutcome {
        log::warn!("[{}] backend call failed: {}", err.code(), err);
        let notice = format!(
            "[{}] The assistant could not answer: {}. Please try again.",
            err.code(),
            err
        );
        self.history.push(ConversationTurn::error(notice.clone()));
        outcome.answer = notice;
        outcome.failed = true;
        self.enter(ConversationState::Idle, &mut outcome);
        outcome
    }
}
