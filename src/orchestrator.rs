use crate::ai::stages::{Stage, StageOutcome, Stages};
use crate::core::compiler::CompiledPrompt;
use crate::core::results::{
    AnalysisResult, EvaluationResult, OptimizationResult, PromptBreakdown, RestructureResult,
    StructuredPrompt, TestResult, UpgradeResult,
};
use crate::error::WorkbenchError;
use crate::session::{Applied, Refusal, Session, StageResult, StageTicket};

/// Everything one generate cycle produced.
#[derive(Debug)]
pub struct Cycle {
    pub prompt: CompiledPrompt,
    pub evaluation: StageOutcome<EvaluationResult>,
    pub analysis: StageOutcome<AnalysisResult>,
}

impl Cycle {
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        [&self.evaluation.warning, &self.analysis.warning]
            .into_iter()
            .filter_map(|w| w.as_deref())
    }
}

/// The breakdown of a prompt and the structured upgrade built from it.
#[derive(Debug)]
pub struct Restructuring {
    pub breakdown: StageOutcome<PromptBreakdown>,
    pub upgrade: StageOutcome<StructuredPrompt>,
}

impl Restructuring {
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        [&self.breakdown.warning, &self.upgrade.warning]
            .into_iter()
            .filter_map(|w| w.as_deref())
    }
}

/// Drives stage calls against the session's current prompt.
pub struct Orchestrator {
    stages: Stages,
    session: Session,
}

impl Orchestrator {
    pub fn new(stages: Stages, session: Session) -> Self {
        Self { stages, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Compile, evaluate, save a version, then analyze.
    ///
    /// Only an invalid template stops the cycle; stage failures come back as fallbacks.
    pub async fn generate(&mut self) -> Result<Cycle, WorkbenchError> {
        log::info!("🧩 Phase 1: Compile");
        let prompt = self.session.compile()?.clone();
        log::info!("   -> {} chars", prompt.text().len());

        log::info!("📏 Phase 2: Evaluation");
        let evaluation = self.evaluate().await?;
        self.session
            .record_version(prompt.text(), evaluation.result.clone());

        log::info!("🔍 Phase 3: Analysis");
        let analysis = self.analyze().await?;

        Ok(Cycle {
            prompt,
            evaluation,
            analysis,
        })
    }

    pub async fn analyze(&mut self) -> Result<StageOutcome<AnalysisResult>, Refusal> {
        let ticket = self.session.begin(Stage::Analyze)?;
        let outcome = self.stages.analyze(ticket.prompt().text()).await;
        self.finish(ticket, StageResult::Analysis(outcome.result.clone()));
        Ok(outcome)
    }

    pub async fn evaluate(&mut self) -> Result<StageOutcome<EvaluationResult>, Refusal> {
        let ticket = self.session.begin(Stage::Evaluate)?;
        let outcome = self.stages.evaluate(ticket.prompt().text()).await;
        self.finish(ticket, StageResult::Evaluation(outcome.result.clone()));
        Ok(outcome)
    }

    pub async fn upgrade(&mut self) -> Result<StageOutcome<UpgradeResult>, Refusal> {
        let ticket = self.session.begin(Stage::Upgrade)?;
        let outcome = self
            .stages
            .upgrade(ticket.prompt().text(), ticket.source())
            .await;
        self.finish(ticket, StageResult::Upgrade(outcome.result.clone()));
        Ok(outcome)
    }

    pub async fn test(&mut self) -> Result<StageOutcome<TestResult>, Refusal> {
        let ticket = self.session.begin(Stage::Test)?;
        let outcome = self.stages.test(ticket.prompt().text()).await;
        self.finish(ticket, StageResult::Test(outcome.result.clone()));
        Ok(outcome)
    }

    pub async fn optimize(&mut self) -> Result<StageOutcome<OptimizationResult>, Refusal> {
        let ticket = self.session.begin(Stage::Optimize)?;
        let outcome = self
            .stages
            .optimize(ticket.prompt().text(), ticket.source())
            .await;
        self.finish(ticket, StageResult::Optimization(outcome.result.clone()));
        Ok(outcome)
    }

    /// Breaks the prompt into components, then rebuilds it from that breakdown.
    pub async fn restructure(&mut self) -> Result<Restructuring, Refusal> {
        let ticket = self.session.begin(Stage::Restructure)?;
        let prompt = ticket.prompt().text();
        let breakdown = self.stages.breakdown(prompt, ticket.source()).await;
        let upgrade = self
            .stages
            .restructure(prompt, &breakdown.result, ticket.source())
            .await;

        let result = RestructureResult {
            breakdown: breakdown.result.clone(),
            upgrade: upgrade.result.clone(),
        };
        self.finish(ticket, StageResult::Restructure(result));
        Ok(Restructuring { breakdown, upgrade })
    }

    fn finish(&mut self, ticket: StageTicket, result: StageResult) {
        let stage = ticket.stage();
        if self.session.apply(ticket, result) == Applied::Stale {
            log::warn!("{stage} result arrived for an outdated prompt and was not kept");
        }
    }
}
