//! 批量运行结果

use std::time::Duration;

use crate::error::AppError;

/// 单个任务成功时的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 已完成
    Done,
    /// 目标已存在，未做任何事（计为成功）
    Skipped,
}

/// 失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub code: String,
    pub message: String,
}

impl FailureDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&AppError> for FailureDetail {
    fn from(err: &AppError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// 单个任务的结果
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub id: String,
    pub outcome: Option<Outcome>,
    pub elapsed: Duration,
    pub error: Option<FailureDetail>,
}

impl BatchResult {
    pub fn succeeded(id: impl Into<String>, elapsed: Duration) -> Self {
        Self::finished(id, Outcome::Done, elapsed)
    }

    pub fn finished(id: impl Into<String>, outcome: Outcome, elapsed: Duration) -> Self {
        Self {
            id: id.into(),
            outcome: Some(outcome),
            elapsed,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, elapsed: Duration, error: FailureDetail) -> Self {
        Self {
            id: id.into(),
            outcome: None,
            elapsed,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_skipped(&self) -> bool {
        self.outcome == Some(Outcome::Skipped)
    }
}

/// 一次批量运行的汇总
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub discovered: usize,
    /// 包含跳过的任务
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// 按任务提交顺序排列
    pub results: Vec<BatchResult>,
}

impl RunSummary {
    pub fn from_results(results: Vec<BatchResult>, elapsed: Duration) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let skipped = results.iter().filter(|r| r.is_skipped()).count();
        Self {
            discovered: results.len(),
            succeeded,
            skipped,
            failed: results.len() - succeeded,
            elapsed,
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// 合并多次运行（如按收货方式拆分的多个输出目录）
    pub fn merge(&mut self, other: RunSummary) {
        self.discovered += other.discovered;
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.elapsed += other.elapsed;
        self.results.extend(other.results);
    }
}
