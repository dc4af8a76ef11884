//! Dispatch jobs: which amount goes from which account to which.
//!
//! The job file is a JSON document with a single `dispatch` list. Loading
//! fails hard on I/O and syntax problems; business rules are collected into a
//! [`Validation`] report instead, so the caller decides what to do with it.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::account::is_account_id;
use crate::amount::Amount;

#[derive(Debug, Error)]
pub enum JobListError {
    #[error("reading job config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing job config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("job config file '{0}' has no 'dispatch' list")]
    MissingDispatchKey(PathBuf),
    #[error("{share}% of income {income} for job '{job}' does not fit into an amount")]
    ShareOverflow { job: String, income: u64, share: u32 },
}

/// Largest whole-EUR value an [`Amount`] can hold.
const MAX_WHOLE: u64 = (i64::MAX / 100) as u64;

/// One transfer instruction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Job {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "SourceAccount", default)]
    pub source: String,
    #[serde(rename = "TargetAccount", default)]
    pub target: String,
    /// Percentage of the income.
    #[serde(rename = "Share", default)]
    pub share: Option<u32>,
    /// Absolute amount in whole EUR.
    #[serde(rename = "ShareValue", default)]
    pub share_value: Option<u64>,
    /// Creditor name, needed for transfers to another bank.
    #[serde(rename = "Remittee", default)]
    pub remittee: Option<String>,
    /// Purpose line.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
}

impl Job {
    /// The absolute amount, once known. `None` also for values too large to represent.
    pub fn amount(&self) -> Option<Amount> {
        self.share_value
            .and_then(|v| i64::try_from(v).ok())
            .and_then(Amount::checked_from_whole)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobIssue {
    MissingName { index: usize },
    InvalidSourceAccount { job: String, account: String },
    InvalidTargetAccount { job: String, account: String },
    /// Neither or both of `Share` / `ShareValue`.
    AmbiguousShare { job: String },
    SharesExceedTotal { total: u64 },
    ShareValueTooLarge { job: String, value: u64 },
}

/// Outcome of validating a job list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub issues: Vec<JobIssue>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Deserialize)]
struct DispatchFile {
    dispatch: Option<Vec<Job>>,
}

#[derive(Debug)]
pub struct JobList {
    jobs: Vec<Job>,
    validation: Validation,
}

impl JobList {
    pub fn load(path: &Path) -> Result<Self, JobListError> {
        let file = File::open(path).map_err(|source| {
            error!(path = %path.display(), %source, "reading job config file");
            JobListError::Io {
                path: path.to_owned(),
                source,
            }
        })?;
        let doc: DispatchFile =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                error!(path = %path.display(), %source, "parsing job config file");
                JobListError::Parse {
                    path: path.to_owned(),
                    source,
                }
            })?;
        let jobs = doc
            .dispatch
            .ok_or_else(|| JobListError::MissingDispatchKey(path.to_owned()))?;
        Ok(Self::from_jobs(jobs))
    }

    pub fn from_jobs(jobs: Vec<Job>) -> Self {
        let validation = validate(&jobs);
        for issue in &validation.issues {
            warn!(?issue, "invalid job");
        }
        Self { jobs, validation }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn validation(&self) -> &Validation {
        &self.validation
    }

    pub fn is_valid(&self) -> bool {
        self.validation.is_valid()
    }

    pub fn has_relative_share(&self) -> bool {
        self.jobs.iter().any(|j| j.share.is_some())
    }

    /// Turns percentage shares into absolute amounts: `income * share / 100`, rounded down.
    /// Jobs that already carry a value are left alone. On overflow no job is changed.
    pub fn calculate_share_value(&mut self, income: u64) -> Result<(), JobListError> {
        info!(income, "calculate job amounts");
        let mut values = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let value = match job.share_value {
                Some(value) => value,
                None => {
                    let share = job.share.unwrap_or(0);
                    income
                        .checked_mul(u64::from(share))
                        .map(|v| v / 100)
                        .filter(|v| *v <= MAX_WHOLE)
                        .ok_or_else(|| JobListError::ShareOverflow {
                            job: job.name.clone(),
                            income,
                            share,
                        })?
                }
            };
            values.push(value);
        }
        for (job, value) in self.jobs.iter_mut().zip(values) {
            job.share_value = Some(value);
        }
        Ok(())
    }
}

fn validate(jobs: &[Job]) -> Validation {
    let mut issues = Vec::new();
    let mut total: u64 = 0;

    for (index, job) in jobs.iter().enumerate() {
        if job.name.trim().is_empty() {
            issues.push(JobIssue::MissingName { index });
        }
        if !is_account_id(&job.source) {
            issues.push(JobIssue::InvalidSourceAccount {
                job: job.name.clone(),
                account: job.source.clone(),
            });
        }
        if !is_account_id(&job.target) {
            issues.push(JobIssue::InvalidTargetAccount {
                job: job.name.clone(),
                account: job.target.clone(),
            });
        }
        if job.share.is_some() == job.share_value.is_some() {
            issues.push(JobIssue::AmbiguousShare {
                job: job.name.clone(),
            });
        }
        if let Some(value) = job.share_value.filter(|v| *v > MAX_WHOLE) {
            issues.push(JobIssue::ShareValueTooLarge {
                job: job.name.clone(),
                value,
            });
        }
        total += u64::from(job.share.unwrap_or(0));
    }

    if total > 100 {
        issues.push(JobIssue::SharesExceedTotal { total });
    }
    Validation { issues }
}
