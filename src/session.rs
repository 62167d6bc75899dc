use crate::ai::stages::Stage;
use crate::core::compiler::{self, CompiledPrompt};
use crate::core::results::{
    AnalysisResult, EvaluationResult, OptimizationResult, RestructureResult, TestResult,
    UpgradeResult,
};
use crate::core::template::Template;
use crate::error::WorkbenchError;
use crate::store::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Both persisted lists keep at most this many entries, newest first.
pub const MAX_ENTRIES: usize = 10;

const HISTORY_KEY: &str = "promptHistory";
const VERSIONS_KEY: &str = "promptVersions";

/// A saved (prompt, evaluation, timestamp) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub prompt: String,
    pub evaluation: EvaluationResult,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Latest result per stage; each stage only ever writes its own slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageResults {
    pub analysis: Option<AnalysisResult>,
    pub evaluation: Option<EvaluationResult>,
    pub upgrade: Option<UpgradeResult>,
    pub test: Option<TestResult>,
    pub optimization: Option<OptimizationResult>,
    pub restructure: Option<RestructureResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageResult {
    Analysis(AnalysisResult),
    Evaluation(EvaluationResult),
    Upgrade(UpgradeResult),
    Test(TestResult),
    Optimization(OptimizationResult),
    Restructure(RestructureResult),
}

impl StageResult {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Analysis(_) => Stage::Analyze,
            Self::Evaluation(_) => Stage::Evaluate,
            Self::Upgrade(_) => Stage::Upgrade,
            Self::Test(_) => Stage::Test,
            Self::Optimization(_) => Stage::Optimize,
            Self::Restructure(_) => Stage::Restructure,
        }
    }
}

type InFlight = Arc<Mutex<HashSet<Stage>>>;

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashSet<Stage>> {
    in_flight.lock().unwrap_or_else(|e| e.into_inner())
}

/// Permission to run one stage against the prompt that was current when it was issued.
///
/// The stage stays reserved until the ticket is applied or dropped, so a call
/// that is cancelled mid-flight frees its stage too.
#[derive(Debug)]
pub struct StageTicket {
    stage: Stage,
    prompt: CompiledPrompt,
    source: Option<Template>,
    in_flight: InFlight,
}

impl StageTicket {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn prompt(&self) -> &CompiledPrompt {
        &self.prompt
    }

    /// The template the prompt was compiled from, when this session knows it.
    pub fn source(&self) -> Option<&Template> {
        self.source.as_ref()
    }
}

impl Drop for StageTicket {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.stage);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Current,
    /// The prompt changed while the call was out; the result was dropped.
    Stale,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Refusal {
    #[error("Please generate a prompt first")]
    NoPrompt,
    #[error("{0} is already running")]
    InFlight(Stage),
}

pub struct Session {
    template: Template,
    compiled: Option<CompiledPrompt>,
    /// Template behind `compiled`; unknown for prompts rehydrated from storage.
    source: Option<Template>,
    results: StageResults,
    history: Vec<String>,
    /// Runs parallel to `history` and is never persisted.
    history_sources: Vec<Option<Template>>,
    versions: Vec<Version>,
    in_flight: InFlight,
    store: Box<dyn KeyValueStore>,
}

impl Session {
    /// Rehydrates history and versions; unreadable data starts the lists empty.
    pub fn open(store: Box<dyn KeyValueStore>) -> Self {
        let mut history: Vec<String> = load(store.as_ref(), HISTORY_KEY);
        let mut versions: Vec<Version> = load(store.as_ref(), VERSIONS_KEY);
        history.truncate(MAX_ENTRIES);
        versions.truncate(MAX_ENTRIES);
        log::info!(
            "Session opened with {} history entries and {} versions",
            history.len(),
            versions.len()
        );

        Self {
            template: Template::default(),
            compiled: None,
            source: None,
            results: StageResults::default(),
            history_sources: vec![None; history.len()],
            history,
            versions,
            in_flight: InFlight::default(),
            store,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn set_template(&mut self, template: Template) {
        self.template = template;
    }

    pub fn compiled(&self) -> Option<&CompiledPrompt> {
        self.compiled.as_ref()
    }

    /// The template the current prompt was compiled from, if known.
    pub fn source(&self) -> Option<&Template> {
        self.source.as_ref()
    }

    pub fn results(&self) -> &StageResults {
        &self.results
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Compiles the current template, makes it the current prompt and records it in history.
    ///
    /// Results computed for the previous prompt no longer apply and are dropped.
    pub fn compile(&mut self) -> Result<&CompiledPrompt, WorkbenchError> {
        let prompt = compiler::compile(&self.template)?;
        self.remember(prompt.text(), Some(self.template.clone()));
        self.source = Some(self.template.clone());
        self.results = StageResults::default();
        Ok(&*self.compiled.insert(prompt))
    }

    pub fn record_history(&mut self, prompt: &str) {
        self.remember(prompt, None);
    }

    fn remember(&mut self, prompt: &str, source: Option<Template>) {
        push_capped(&mut self.history, prompt.to_string());
        push_capped(&mut self.history_sources, source);
        self.persist(HISTORY_KEY, &self.history);
    }

    pub fn record_version(&mut self, prompt: &str, evaluation: EvaluationResult) {
        let version = Version {
            prompt: prompt.to_string(),
            evaluation,
            timestamp: now_millis(),
        };
        push_capped(&mut self.versions, version);
        self.persist(VERSIONS_KEY, &self.versions);
    }

    /// Makes a past prompt current again, restoring its template when it is known.
    pub fn select_history(&mut self, index: usize) -> Option<&CompiledPrompt> {
        let text = self.history.get(index)?.clone();
        self.source = self.history_sources.get(index).cloned().flatten();
        if let Some(template) = &self.source {
            self.template = template.clone();
        }
        self.results = StageResults::default();
        Some(&*self.compiled.insert(CompiledPrompt::from_text(text)))
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.history_sources.clear();
        if let Err(e) = self.store.remove(HISTORY_KEY) {
            log::error!("Failed to remove {HISTORY_KEY}: {e}");
        }
    }

    /// Drops the current prompt and every stage result; template, history and versions stay.
    pub fn clear(&mut self) {
        self.compiled = None;
        self.source = None;
        self.results = StageResults::default();
    }

    /// Reserves `stage` for one call against the current prompt.
    pub fn begin(&mut self, stage: Stage) -> Result<StageTicket, Refusal> {
        let prompt = self.compiled.clone().ok_or(Refusal::NoPrompt)?;
        if !lock(&self.in_flight).insert(stage) {
            return Err(Refusal::InFlight(stage));
        }
        Ok(StageTicket {
            stage,
            prompt,
            source: self.source.clone(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Releases a ticket without a result.
    pub fn abandon(&mut self, ticket: StageTicket) {
        log::debug!("{} call abandoned", ticket.stage);
        drop(ticket);
    }

    /// Stores a result if the prompt it was computed for is still current.
    ///
    /// The ticket is consumed either way, which frees its stage.
    pub fn apply(&mut self, ticket: StageTicket, result: StageResult) -> Applied {
        if result.stage() != ticket.stage {
            log::error!(
                "Dropping {} result delivered on a {} ticket",
                result.stage(),
                ticket.stage
            );
            return Applied::Stale;
        }

        let current = self.compiled.as_ref().map(CompiledPrompt::id);
        if current != Some(ticket.prompt.id()) {
            log::info!("Discarding stale {} result", ticket.stage);
            return Applied::Stale;
        }

        match result {
            StageResult::Analysis(r) => self.results.analysis = Some(r),
            StageResult::Evaluation(r) => self.results.evaluation = Some(r),
            StageResult::Upgrade(r) => self.results.upgrade = Some(r),
            StageResult::Test(r) => self.results.test = Some(r),
            StageResult::Optimization(r) => self.results.optimization = Some(r),
            StageResult::Restructure(r) => self.results.restructure = Some(r),
        }
        Applied::Current
    }

    fn persist<T: Serialize>(&self, key: &str, items: &[T]) {
        let outcome = serde_json::to_string(items)
            .map_err(WorkbenchError::from)
            .and_then(|json| self.store.set(key, &json));
        if let Err(e) = outcome {
            log::error!("Failed to persist {key}: {e}");
        }
    }
}

fn push_capped<T>(list: &mut Vec<T>, item: T) {
    list.insert(0, item);
    list.truncate(MAX_ENTRIES);
}

fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Vec<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            log::warn!("Failed to read {key}: {e}");
            return Vec::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        log::warn!("Failed to parse {key}, starting empty: {e}");
        Vec::new()
    })
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};

    fn session() -> Session {
        Session::open(Box::new(MemoryStore::default()))
    }

    fn evaluation(q: f64) -> EvaluationResult {
        EvaluationResult {
            scores: crate::core::results::Scores::new(q, q, q, q),
            feedback: vec!["ok".into()],
            suggestions: vec![],
        }
    }

    #[test]
    fn history_is_capped_newest_first() {
        let mut s = session();
        for i in 0..11 {
            s.record_history(&format!("p{i}"));
        }
        assert_eq!(s.history().len(), MAX_ENTRIES);
        assert_eq!(s.history()[0], "p10");
        assert_eq!(s.history()[9], "p1");
        assert!(!s.history().contains(&"p0".to_string()));
    }

    #[test]
    fn versions_are_capped_newest_first() {
        let mut s = session();
        for i in 0..11 {
            s.record_version(&format!("p{i}"), evaluation(i as f64));
        }
        assert_eq!(s.versions().len(), MAX_ENTRIES);
        assert_eq!(s.versions()[0].prompt, "p10");
        assert_eq!(s.versions()[9].prompt, "p1");
        assert!(s.versions()[0].timestamp >= s.versions()[9].timestamp);
    }

    #[test]
    fn persisted_lists_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Session::open(Box::new(FileStore::open(dir.path()).unwrap()));
        for i in 0..12 {
            s.record_history(&format!("prompt {i}"));
            s.record_version(&format!("prompt {i}"), evaluation(50.0 + i as f64));
        }
        let history = s.history().to_vec();
        let versions = s.versions().to_vec();
        drop(s);

        let reopened = Session::open(Box::new(FileStore::open(dir.path()).unwrap()));
        assert_eq!(reopened.history(), history.as_slice());
        assert_eq!(reopened.versions(), versions.as_slice());
    }

    #[test]
    fn corrupt_storage_means_no_history() {
        let store = MemoryStore::default();
        store.set(HISTORY_KEY, "{not json").unwrap();
        store.set(VERSIONS_KEY, "[{\"prompt\": 3}]").unwrap();

        let s = Session::open(Box::new(store));
        assert!(s.history().is_empty());
        assert!(s.versions().is_empty());
    }

    #[test]
    fn compile_records_history_and_resets_results() {
        let mut s = session();
        s.set_template(Template::new("Write a haiku"));
        let ticket = {
            s.compile().unwrap();
            s.begin(Stage::Test).unwrap()
        };
        s.apply(ticket, StageResult::Test(TestResult::default()));
        assert!(s.results().test.is_some());

        s.compile().unwrap();
        assert!(s.results().test.is_none());
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn blank_input_blocks_compile_and_keeps_state() {
        let mut s = session();
        s.set_template(Template::new("   "));
        assert!(matches!(s.compile(), Err(WorkbenchError::InvalidTemplate(_))));
        assert!(s.compiled().is_none());
        assert!(s.history().is_empty());
    }

    #[test]
    fn clear_keeps_template_and_lists() {
        let mut s = session();
        s.set_template(Template::new("Explain lifetimes"));
        let text = s.compile().unwrap().text().to_string();
        s.record_version(&text, evaluation(90.0));
        let ticket = s.begin(Stage::Evaluate).unwrap();
        s.apply(ticket, StageResult::Evaluation(evaluation(90.0)));

        s.clear();
        assert!(s.compiled().is_none());
        assert_eq!(s.results(), &StageResults::default());
        assert_eq!(s.template().input, "Explain lifetimes");
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.versions().len(), 1);
    }

    #[test]
    fn begin_requires_a_prompt_and_one_call_per_stage() {
        let mut s = session();
        assert_eq!(s.begin(Stage::Analyze).unwrap_err(), Refusal::NoPrompt);

        s.set_template(Template::new("task"));
        s.compile().unwrap();
        let first = s.begin(Stage::Analyze).unwrap();
        assert_eq!(s.begin(Stage::Analyze).unwrap_err(), Refusal::InFlight(Stage::Analyze));
        let other = s.begin(Stage::Test).unwrap();

        s.abandon(first);
        assert!(s.begin(Stage::Analyze).is_ok());
        s.abandon(other);
    }

    #[test]
    fn results_for_a_replaced_prompt_are_discarded() {
        let mut s = session();
        s.set_template(Template::new("first"));
        s.compile().unwrap();
        let ticket = s.begin(Stage::Upgrade).unwrap();
        assert!(ticket.prompt().text().contains("Task: first"));

        s.set_template(Template::new("second"));
        s.compile().unwrap();

        let applied = s.apply(ticket, StageResult::Upgrade(UpgradeResult::default()));
        assert_eq!(applied, Applied::Stale);
        assert!(s.results().upgrade.is_none());
        assert!(s.begin(Stage::Upgrade).is_ok());
    }

    #[test]
    fn recompiling_identical_text_still_invalidates_tickets() {
        let mut s = session();
        s.set_template(Template::new("same"));
        s.compile().unwrap();
        let ticket = s.begin(Stage::Analyze).unwrap();
        s.compile().unwrap();
        assert_eq!(
            s.apply(ticket, StageResult::Analysis(AnalysisResult::default())),
            Applied::Stale
        );
    }

    #[test]
    fn mismatched_result_kind_is_dropped() {
        let mut s = session();
        s.set_template(Template::new("task"));
        s.compile().unwrap();
        let ticket = s.begin(Stage::Analyze).unwrap();
        assert_eq!(s.apply(ticket, StageResult::Test(TestResult::default())), Applied::Stale);
        assert!(s.results().test.is_none());
    }

    #[test]
    fn select_and_clear_history() {
        let mut s = session();
        s.record_history("older");
        s.record_history("newer");

        let selected = s.select_history(1).unwrap().text().to_string();
        assert_eq!(selected, "older");
        assert_eq!(s.compiled().unwrap().text(), "older");
        assert!(s.select_history(5).is_none());

        s.clear_history();
        assert!(s.history().is_empty());
    }

    #[test]
    fn select_history_restores_the_source_template() {
        let mut s = session();
        let mut first = Template::new("Write a sort function");
        first.purpose = "teaching".into();
        s.set_template(first.clone());
        s.compile().unwrap();
        s.set_template(Template::new("Plan a trip"));
        s.compile().unwrap();

        s.select_history(1).unwrap();
        assert_eq!(s.template(), &first);
        assert_eq!(s.source(), Some(&first));
        let ticket = s.begin(Stage::Upgrade).unwrap();
        assert_eq!(ticket.source().map(|t| t.input.as_str()), Some("Write a sort function"));
    }

    #[test]
    fn rehydrated_history_has_no_known_template() {
        let store = MemoryStore::default();
        store.set(HISTORY_KEY, r#"["Task: old prompt"]"#).unwrap();
        let mut s = Session::open(Box::new(store));
        s.set_template(Template::new("unrelated"));

        s.select_history(0).unwrap();
        assert_eq!(s.source(), None);
        assert_eq!(s.template().input, "unrelated");
        assert!(s.begin(Stage::Upgrade).unwrap().source().is_none());
    }

    #[test]
    fn dropping_a_ticket_frees_its_stage() {
        let mut s = session();
        s.set_template(Template::new("task"));
        s.compile().unwrap();

        let ticket = s.begin(Stage::Analyze).unwrap();
        drop(ticket);
        let again = s.begin(Stage::Analyze).unwrap();
        s.apply(again, StageResult::Analysis(AnalysisResult::default()));
        assert!(s.begin(Stage::Analyze).is_ok());
    }

    #[test]
    fn rehydration_truncates_long_lists() {
        let store = MemoryStore::default();
        let history: Vec<String> = (0..12).map(|i| format!("p{i}")).collect();
        let versions: Vec<Version> = (0..12)
            .map(|i| Version {
                prompt: format!("p{i}"),
                evaluation: evaluation(50.0),
                timestamp: i,
            })
            .collect();
        store.set(HISTORY_KEY, &serde_json::to_string(&history).unwrap()).unwrap();
        store.set(VERSIONS_KEY, &serde_json::to_string(&versions).unwrap()).unwrap();

        let s = Session::open(Box::new(store));
        assert_eq!(s.history(), &history[..MAX_ENTRIES]);
        assert_eq!(s.versions(), &versions[..MAX_ENTRIES]);
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, WorkbenchError> {
            Err(std::io::Error::other("disk unavailable").into())
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), WorkbenchError> {
            Err(std::io::Error::other("disk unavailable").into())
        }

        fn remove(&self, _key: &str) -> Result<(), WorkbenchError> {
            Err(std::io::Error::other("disk unavailable").into())
        }
    }

    #[test]
    fn unreadable_store_starts_empty_and_keeps_working() {
        let mut s = Session::open(Box::new(BrokenStore));
        assert!(s.history().is_empty());
        assert!(s.versions().is_empty());

        s.record_history("still recorded");
        s.clear_history();
        assert!(s.history().is_empty());
    }
}
