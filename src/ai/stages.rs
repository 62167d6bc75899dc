use super::client::ModelGateway;
use super::fallback;
use super::prompts;
use super::response::{
    self, AnalysisResponse, BreakdownResponse, EvaluationResponse, OptimizationResponse,
    StageResponse, StructuredPromptResponse, TestResponse, UpgradeResponse,
};
use super::schema_utils;
use crate::core::results::{
    AnalysisResult, EvaluationResult, OptimizationResult, PromptBreakdown, StructuredPrompt,
    TestResult, UpgradeResult,
};
use crate::core::template::Template;
use crate::error::WorkbenchError;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Analyze,
    Upgrade,
    Evaluate,
    Test,
    Optimize,
    /// First step of `Restructure`; never holds a session slot of its own.
    Breakdown,
    Restructure,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Analyze => "Analysis",
            Self::Upgrade => "Upgrade",
            Self::Evaluate => "Evaluation",
            Self::Test => "Test",
            Self::Optimize => "Optimization",
            Self::Breakdown => "Breakdown",
            Self::Restructure => "Restructure",
        })
    }
}

/// What a stage hands back: always a usable result, plus a warning when that
/// result is the local fallback rather than the model's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    pub result: T,
    pub warning: Option<String>,
}

impl<T> StageOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        self.warning.is_some()
    }
}

/// The model-assisted operations on a compiled prompt.
pub struct Stages {
    gateway: Arc<dyn ModelGateway>,
}

impl Stages {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    pub async fn analyze(&self, prompt: &str) -> StageOutcome<AnalysisResult> {
        let res = self
            .run::<AnalysisResponse>(prompts::ANALYZE_PROMPT, prompt, None)
            .await;
        settle(Stage::Analyze, res, || fallback::analysis(&mut rand::thread_rng()))
    }

    pub async fn evaluate(&self, prompt: &str) -> StageOutcome<EvaluationResult> {
        let res = self
            .run::<EvaluationResponse>(prompts::EVALUATE_PROMPT, prompt, None)
            .await;
        settle(Stage::Evaluate, res, || fallback::evaluation(&mut rand::thread_rng()))
    }

    /// `source` is the template `prompt` was compiled from, if known. It supplies
    /// the purpose sent to the model and the fields the fallback rewrite uses.
    pub async fn upgrade(
        &self,
        prompt: &str,
        source: Option<&Template>,
    ) -> StageOutcome<UpgradeResult> {
        let purpose = source.and_then(Template::purpose);
        let res = self
            .run::<UpgradeResponse>(prompts::UPGRADE_PROMPT, prompt, purpose)
            .await;
        settle(Stage::Upgrade, res, || fallback::upgrade(source, prompt))
    }

    pub async fn test(&self, prompt: &str) -> StageOutcome<TestResult> {
        let res = self.run::<TestResponse>(prompts::TEST_PROMPT, prompt, None).await;
        settle(Stage::Test, res, fallback::test_result)
    }

    pub async fn optimize(
        &self,
        prompt: &str,
        source: Option<&Template>,
    ) -> StageOutcome<OptimizationResult> {
        let purpose = prompts::purpose_or_default(source.and_then(Template::purpose));
        let res = self
            .run::<OptimizationResponse>(prompts::OPTIMIZE_PROMPT, prompt, Some(purpose))
            .await;
        settle(Stage::Optimize, res, || fallback::optimization(source, prompt))
    }

    pub async fn breakdown(
        &self,
        prompt: &str,
        source: Option<&Template>,
    ) -> StageOutcome<PromptBreakdown> {
        let res = self
            .run::<BreakdownResponse>(prompts::BREAKDOWN_PROMPT, prompt, None)
            .await;
        settle(Stage::Breakdown, res, || fallback::breakdown(source, prompt))
    }

    /// Rebuilds `prompt` as a structured prompt, guided by its breakdown.
    pub async fn restructure(
        &self,
        prompt: &str,
        breakdown: &PromptBreakdown,
        source: Option<&Template>,
    ) -> StageOutcome<StructuredPrompt> {
        let res = self
            .restructure_call(prompt, breakdown, source.and_then(Template::purpose))
            .await;
        settle(Stage::Restructure, res, || fallback::structured(breakdown))
    }

    async fn restructure_call(
        &self,
        prompt: &str,
        breakdown: &PromptBreakdown,
        purpose: Option<&str>,
    ) -> Result<StructuredPrompt, WorkbenchError> {
        let analysis = serde_json::to_string_pretty(breakdown)?;
        let preamble = prompts::restructure_preamble(&analysis);
        self.run::<StructuredPromptResponse>(&preamble, prompt, purpose).await
    }

    async fn run<R: StageResponse>(
        &self,
        preamble: &str,
        subject: &str,
        purpose: Option<&str>,
    ) -> Result<R::Output, WorkbenchError> {
        let shape = schema_utils::describe_shape::<R>()?;
        let instruction = prompts::stage_instruction(preamble, subject, purpose, &shape);
        let text = self.gateway.invoke(&instruction).await?;
        response::parse::<R>(&text)
    }
}

fn settle<T, F>(stage: Stage, res: Result<T, WorkbenchError>, fallback: F) -> StageOutcome<T>
where
    F: FnOnce() -> T,
{
    match res {
        Ok(result) => {
            log::info!("   -> {stage} completed");
            StageOutcome { result, warning: None }
        }
        Err(e) => {
            let cause = if e.is_gateway() { "model call failed" } else { "unusable model output" };
            log::warn!("{stage} stage fell back ({cause}): {e}");
            StageOutcome {
                result: fallback(),
                warning: Some(format!(
                    "{stage} failed ({cause}). Showing a fallback result instead."
                )),
            }
        }
    }
}
