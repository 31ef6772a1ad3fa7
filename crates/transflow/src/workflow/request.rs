//! The translation request and its transitions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{WorkflowHandle, WorkflowStatus};
use crate::analysis::DocumentAnalysis;
use crate::error::WorkflowError;
use crate::gateway::{JobId, JobSubmission};
use crate::pricing::{CalculationSummary, CostCalculator, Money};

/// A single document moving from upload to submission.
///
/// Transitions are only reachable through the methods below, each of which
/// checks the current status first and leaves the request untouched on error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    handle: WorkflowHandle,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<DocumentAnalysis>,
    target_languages: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    calculation: Option<CalculationSummary>,
    status: WorkflowStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TranslationRequest {
    /// Creates a request in `Draft`.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            handle: WorkflowHandle::new(),
            id: None,
            analysis: None,
            target_languages: BTreeSet::new(),
            calculation: None,
            status: WorkflowStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn handle(&self) -> WorkflowHandle {
        self.handle
    }

    pub fn id(&self) -> Option<&JobId> {
        self.id.as_ref()
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn analysis(&self) -> Option<&DocumentAnalysis> {
        self.analysis.as_ref()
    }

    pub fn target_languages(&self) -> &BTreeSet<String> {
        &self.target_languages
    }

    /// The computed cost; present only while `Calculated` or `Submitted`.
    pub fn calculation(&self) -> Option<&CalculationSummary> {
        self.calculation.as_ref()
    }

    pub fn credits_required(&self) -> Option<u64> {
        self.calculation.as_ref().map(|c| c.credits_required)
    }

    pub fn total_cost(&self) -> Option<Money> {
        self.calculation.as_ref().map(|c| c.total_cost)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn require(&self, required: WorkflowStatus) -> Result<(), WorkflowError> {
        if self.status == required {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                current: self.status,
                required,
            })
        }
    }

    fn transition(&mut self, next: WorkflowStatus) {
        if self.status != next {
            log::debug!("Request {}: {} -> {}", self.handle, self.status, next);
        }
        self.status = next;
        self.updated_at = Utc::now();
    }

    /// `Draft -> Analyzed`.
    pub fn attach_analysis(&mut self, analysis: DocumentAnalysis) -> Result<(), WorkflowError> {
        self.require(WorkflowStatus::Draft)?;
        self.analysis = Some(analysis);
        self.transition(WorkflowStatus::Analyzed);
        Ok(())
    }

    /// Replaces the language selection.
    ///
    /// Blank names are dropped and duplicates collapse. From `Analyzed` a
    /// non-empty selection advances to `LanguagesSelected`; once there, any
    /// selection (including an empty one) keeps the request in place.
    pub fn select_languages<I, S>(&mut self, languages: I) -> Result<(), WorkflowError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.status {
            WorkflowStatus::Analyzed | WorkflowStatus::LanguagesSelected => {}
            WorkflowStatus::Draft => {
                return Err(WorkflowError::InvalidTransition {
                    current: self.status,
                    required: WorkflowStatus::Analyzed,
                })
            }
            WorkflowStatus::Calculated | WorkflowStatus::Submitted => {
                return Err(WorkflowError::InvalidTransition {
                    current: self.status,
                    required: WorkflowStatus::LanguagesSelected,
                })
            }
        }

        self.target_languages = languages
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        if self.status == WorkflowStatus::Analyzed && self.target_languages.is_empty() {
            self.updated_at = Utc::now();
            return Ok(());
        }

        self.transition(WorkflowStatus::LanguagesSelected);
        Ok(())
    }

    /// `LanguagesSelected -> Calculated`.
    pub fn complete_selection(
        &mut self,
        calculator: &CostCalculator,
    ) -> Result<CalculationSummary, WorkflowError> {
        self.require(WorkflowStatus::LanguagesSelected)?;
        if self.target_languages.is_empty() {
            return Err(WorkflowError::EmptySelection);
        }

        let analysis = self.analysis.as_ref().ok_or(WorkflowError::InvalidTransition {
            current: self.status,
            required: WorkflowStatus::Analyzed,
        })?;

        let summary = calculator.calculate(analysis, &self.target_languages);
        self.calculation = Some(summary.clone());
        self.transition(WorkflowStatus::Calculated);
        Ok(summary)
    }

    /// `Calculated -> LanguagesSelected`, discarding the computed cost but
    /// keeping the analysis and the language selection.
    pub fn edit_selection(&mut self) -> Result<(), WorkflowError> {
        self.require(WorkflowStatus::Calculated)?;
        self.calculation = None;
        self.transition(WorkflowStatus::LanguagesSelected);
        Ok(())
    }

    /// Builds the payload for the job service. Only a `Calculated` request
    /// produces one.
    pub fn submission(&self) -> Result<JobSubmission, WorkflowError> {
        let not_calculated = || WorkflowError::NotCalculated {
            current: self.status,
        };
        if self.status != WorkflowStatus::Calculated {
            return Err(not_calculated());
        }
        let analysis = self.analysis.as_ref().ok_or_else(not_calculated)?;
        let calculation = self.calculation.as_ref().ok_or_else(not_calculated)?;

        Ok(JobSubmission {
            reference: self.handle.to_string(),
            file_name: analysis.file_name.clone(),
            file_format: analysis.file_format,
            source_language: analysis.source_language.clone(),
            subject_matter: analysis.subject_matter.clone(),
            target_languages: self.target_languages.iter().cloned().collect(),
            word_count: analysis.word_count,
            char_count: analysis.char_count,
            credits_required: calculation.credits_required,
            total_cost: calculation.total_cost,
        })
    }

    /// `Calculated -> Submitted`. Irreversible.
    pub fn mark_submitted(&mut self, job_id: JobId) -> Result<(), WorkflowError> {
        if self.status != WorkflowStatus::Calculated {
            return Err(WorkflowError::NotCalculated {
                current: self.status,
            });
        }
        self.id = Some(job_id);
        self.transition(WorkflowStatus::Submitted);
        Ok(())
    }
}

impl Default for TranslationRequest {
    fn default() -> Self {
        Self::new()
    }
}
