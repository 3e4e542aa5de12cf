#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStage {
    LoadingScenario,
    CheckingCache,
    LoadingCachedResult,
    CompilingCircuit,
    Stepping,
    SavingResults,
    Completed,
}

impl RunStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LoadingScenario => "loading scenario",
            Self::CheckingCache => "checking cache",
            Self::LoadingCachedResult => "loading cached run",
            Self::CompilingCircuit => "compiling circuit",
            Self::Stepping => "stepping",
            Self::SavingResults => "saving results",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    /// Steps solved so far, while stepping.
    pub step: Option<usize>,
    pub total_steps: usize,
}

impl RunProgressEvent {
    pub fn stage(
        stage: RunStage,
        elapsed_wall_s: f64,
        message: Option<String>,
        total_steps: usize,
    ) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
            step: None,
            total_steps,
        }
    }

    pub fn fraction_complete(&self) -> f64 {
        match (self.step, self.total_steps) {
            (Some(step), total) if total > 0 => step as f64 / total as f64,
            _ if self.stage == RunStage::Completed => 1.0,
            _ => 0.0,
        }
    }
}
