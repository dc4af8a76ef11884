//! Runs a job list against a logged-in session and reports what happened.

use std::io::Write;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::amount::Amount;
use crate::errors::{BankError, ContractViolation, Result};
use crate::job::{Job, JobList};
use crate::navigator::PageNavigator;
use crate::session::Session;
use crate::transfer::{StagedTransfer, TransferRequest};

/// Supplies a TAN for a staged transfer. `None` leaves the transfer unconfirmed
/// and the run moves on to the next job.
pub trait TanSource {
    fn tan_for(&mut self, staged: &StagedTransfer) -> Option<String>;
}

impl<F> TanSource for F
where
    F: FnMut(&StagedTransfer) -> Option<String>,
{
    fn tan_for(&mut self, staged: &StagedTransfer) -> Option<String> {
        self(staged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Transferred,
    /// Staged and accepted, but not submitted.
    DryRun,
    /// Balance did not cover the amount, or nothing to transfer.
    Skipped,
    /// Staged, but no TAN was given.
    Unconfirmed,
    /// Submitted without a success confirmation; the run stops here.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job: String,
    pub source: String,
    pub target: String,
    pub amount: Amount,
    pub status: Status,
}

impl JobOutcome {
    fn new(job: &Job, amount: Amount, status: Status) -> Self {
        Self {
            job: job.name.clone(),
            source: job.source.clone(),
            target: job.target.clone(),
            amount,
            status,
        }
    }
}

/// Everything a run produced. `error` is set when the run stopped early;
/// `outcomes` still lists every job handled before that.
#[derive(Debug, Default)]
pub struct DispatchRun {
    pub outcomes: Vec<JobOutcome>,
    pub error: Option<BankError>,
}

pub struct Dispatcher<T> {
    tans: T,
}

impl<T: TanSource> Dispatcher<T> {
    pub fn new(tans: T) -> Self {
        Self { tans }
    }

    /// Stages and confirms every job in order.
    ///
    /// * insufficient balance skips the job,
    /// * a missing TAN leaves the job unconfirmed,
    /// * a failed submission ends the run,
    /// * any other error ends the run and is kept in [`DispatchRun::error`].
    pub fn run<N: PageNavigator>(&mut self, session: &mut Session<N>, jobs: &JobList) -> DispatchRun {
        let mut run = DispatchRun {
            outcomes: Vec::with_capacity(jobs.jobs().len()),
            error: None,
        };

        for job in jobs.jobs() {
            match self.dispatch(session, job) {
                Ok(outcome) => {
                    let failed = outcome.status == Status::Failed;
                    run.outcomes.push(outcome);
                    if failed {
                        break;
                    }
                }
                Err(e) => {
                    error!(job = %job.name, %e, "aborting dispatch");
                    run.error = Some(e);
                    break;
                }
            }
        }
        run
    }

    fn dispatch<N: PageNavigator>(&mut self, session: &mut Session<N>, job: &Job) -> Result<JobOutcome> {
        let amount = job
            .amount()
            .ok_or_else(|| ContractViolation::AmountNotCalculated(job.name.clone()))?;
        if amount == Amount::ZERO {
            info!(job = %job.name, "nothing to transfer");
            return Ok(JobOutcome::new(job, amount, Status::Skipped));
        }

        let request = TransferRequest {
            creditor_name: job.remittee.clone(),
            purpose: job.description.clone(),
            ..TransferRequest::new(&job.source, &job.target, amount)
        };
        info!(job = %job.name, source = %job.source, target = %job.target, %amount, "dispatching");

        let staged = match session.stage(&request) {
            Ok(staged) => staged,
            Err(e @ BankError::BalanceNotSufficient { .. }) => {
                warn!(job = %job.name, %e, "skipping job");
                return Ok(JobOutcome::new(job, amount, Status::Skipped));
            }
            Err(e) => return Err(e),
        };

        let tan = if staged.kind.requires_tan() && !session.is_dry_run() {
            let Some(tan) = self.tans.tan_for(&staged) else {
                warn!(job = %job.name, "no TAN given, transfer left unconfirmed");
                return Ok(JobOutcome::new(job, amount, Status::Unconfirmed));
            };
            Some(tan)
        } else {
            None
        };

        match session.confirm(&request, tan.as_deref()) {
            Ok(_) if session.is_dry_run() => Ok(JobOutcome::new(job, amount, Status::DryRun)),
            Ok(_) => Ok(JobOutcome::new(job, amount, Status::Transferred)),
            Err(e @ BankError::TransactionFailed { .. }) => {
                error!(job = %job.name, %e, "stopping dispatch");
                Ok(JobOutcome::new(job, amount, Status::Failed))
            }
            Err(e) => Err(e),
        }
    }
}

/// CSV row of the dispatch report.
#[derive(Serialize)]
pub struct ReportRow {
    pub name: String,
    pub source: String,
    pub target: String,
    pub amount: String,
    pub status: Status,
}

impl From<&JobOutcome> for ReportRow {
    fn from(outcome: &JobOutcome) -> Self {
        Self {
            name: outcome.job.clone(),
            source: outcome.source.clone(),
            target: outcome.target.clone(),
            amount: outcome.amount.to_string(),
            status: outcome.status,
        }
    }
}

pub fn write_report<W: Write>(outcomes: &[JobOutcome], sink: W) -> csv::Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(sink);
    for outcome in outcomes {
        wtr.serialize(ReportRow::from(outcome))?;
    }
    wtr.flush()?;
    Ok(())
}
