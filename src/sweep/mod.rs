//! Parameter Sweep Driver
//!
//! Enumerates the variants of a [`SweepConfig`], runs each one through the
//! checkpoint timer `repetitions` times, averages the runs, and finally
//! writes one summary file per group.
//!
//! ```text
//! for each variant:
//!     SET SESSION OPTIONS -> EXECUTE -> DRAIN (timer) -> ACCUMULATE (averager)
//! WRITE SUMMARIES
//! ```
//!
//! A variant that fails is logged and recorded in the [`SweepReport`]; the
//! sweep moves on to the next one. Nothing is retried.

mod report;

pub use report::{SummaryOutcome, SweepReport, VariantOutcome, VariantStatus};

use std::fs::File;
use std::io::BufWriter;

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn};

use crate::averager::{average_runs, write_summary, AveragedTrace, GroupAccumulator};
use crate::config::SweepConfig;
use crate::cursor::{Session, SessionSettings};
use crate::runlog::RunLog;
use crate::timer::{CheckpointTimer, Clock, RunTrace};
use crate::variant::{ParamSpace, QueryTemplate, QueryVariant, Template};
use crate::Result;

/// Runs a configured sweep against one session.
pub struct SweepDriver<S: Session, K: Clock> {
    config: SweepConfig,
    timer: CheckpointTimer,
    space: ParamSpace,
    query: QueryTemplate,
    detail: Template,
    summary: Template,
    session: S,
    clock: K,
}

impl<S: Session, K: Clock> SweepDriver<S, K> {
    /// Validate `config` and prepare a driver.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(config: SweepConfig, session: S, clock: K) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            timer: config.timer()?,
            space: config.param_space()?,
            query: config.query_template()?,
            detail: config.detail_template()?,
            summary: config.summary_template()?,
            config,
            session,
            clock,
        })
    }

    /// The configuration being run.
    #[must_use]
    pub const fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// The session queries run on.
    #[must_use]
    pub const fn session(&self) -> &S {
        &self.session
    }

    /// Give the session back.
    #[must_use]
    pub fn into_session(self) -> S {
        self.session
    }

    /// Run every variant, then write the group summaries.
    ///
    /// `detail_base` and `summary_base` fill the `{base}` placeholder of the
    /// detail and summary path templates. Failures of single variants or
    /// summary files are recorded in the report, never returned.
    pub fn run(&mut self, detail_base: &str, summary_base: &str) -> SweepReport {
        let started_at = Utc::now();
        let variants = self.space.variants();
        info!(variants = variants.len(), repetitions = self.config.repetitions, "sweep started");

        let mut accumulator = GroupAccumulator::new();
        let mut outcomes = Vec::with_capacity(variants.len());
        for variant in &variants {
            let span = info_span!("variant", %variant);
            let _guard = span.enter();

            let mut outcome = VariantOutcome {
                variant: variant.to_string(),
                query: None,
                status: VariantStatus::Failed,
                error: None,
                runs: Vec::new(),
                averaged: None,
            };
            match self.run_variant(variant, detail_base, &mut outcome) {
                Ok(averaged) => {
                    debug!(phase = "accumulate", points = averaged.points().len());
                    accumulator.record(&variant.project(&self.config.group_by), &averaged);
                    outcome.status = VariantStatus::Completed;
                    outcome.averaged = Some(averaged);
                }
                Err(err) => {
                    error!(error = %err, "variant failed, moving on");
                    outcome.error = Some(err.to_string());
                }
            }
            outcomes.push(outcome);
        }

        let summaries = self.write_summaries(&variants, &accumulator, summary_base);
        let report = SweepReport {
            started_at,
            finished_at: Utc::now(),
            variants: outcomes,
            summaries,
        };
        info!(
            completed = report.completed(),
            failed = report.failed(),
            "sweep finished"
        );

        if let Some(path) = &self.config.report_path {
            match report.write_json(path) {
                Ok(()) => info!(%path, "report written"),
                Err(err) => error!(%path, error = %err, "could not write report"),
            }
        }
        report
    }

    fn run_variant(
        &mut self,
        variant: &QueryVariant,
        detail_base: &str,
        outcome: &mut VariantOutcome,
    ) -> Result<AveragedTrace> {
        let sql = self.query.render(variant)?;
        outcome.query = Some(sql.clone());
        let settings = self.config.settings.render(variant)?;
        let path = self.detail.render_with(|name| {
            if name == "base" {
                Some(detail_base)
            } else {
                variant.get(name)
            }
        })?;

        for iteration in 1..=self.config.repetitions {
            info!(iteration, "running query");
            let trace = self.run_once(&settings, &sql, &path, iteration)?;
            outcome.runs.push(trace);
        }

        let averaged = average_runs(&outcome.runs);
        let mut log = RunLog::append(&path)?;
        log.averages(&sql, &averaged)?;
        Ok(averaged)
    }

    fn run_once(
        &mut self,
        settings: &SessionSettings,
        sql: &str,
        path: &str,
        iteration: usize,
    ) -> Result<RunTrace> {
        let mut log = RunLog::append(path)?;

        debug!(phase = "set_options", settings = settings.len());
        self.session.apply_settings(settings)?;
        log.header(&self.config.label, sql, iteration)?;

        debug!(phase = "execute");
        let timer = &self.timer;
        let clock = &self.clock;
        let submitted = clock.now();
        self.session
            .with_cursor(sql, |cursor| -> Result<RunTrace> {
                log.time_before_fetch(clock.now().saturating_sub(submitted).as_secs_f64())?;
                debug!(phase = "drain");
                timer.run(cursor, clock, &mut log)
            })?
    }

    fn write_summaries(
        &self,
        variants: &[QueryVariant],
        accumulator: &GroupAccumulator<QueryVariant>,
        summary_base: &str,
    ) -> Vec<SummaryOutcome> {
        let mut groups: Vec<QueryVariant> = Vec::new();
        for variant in variants {
            let group = variant.project(&self.config.group_by);
            if !groups.contains(&group) {
                groups.push(group);
            }
        }

        groups
            .iter()
            .map(|group| {
                let lines = accumulator.summary(
                    group,
                    self.timer.schedule(),
                    self.config.missing_values,
                );
                let mut outcome = SummaryOutcome {
                    group: group.to_string(),
                    path: String::new(),
                    variants: accumulator.contributors(group),
                    lines,
                    error: None,
                };
                if outcome.variants == 0 {
                    warn!(group = %group, "no variant of this group completed");
                }
                let written = self
                    .summary
                    .render_with(|name| {
                        if name == "base" {
                            Some(summary_base)
                        } else {
                            group.get(name)
                        }
                    })
                    .and_then(|path| {
                        outcome.path.clone_from(&path);
                        let mut out = BufWriter::new(File::create(&path)?);
                        write_summary(&mut out, &outcome.lines, self.config.summary_format)?;
                        Ok(())
                    });
                match written {
                    Ok(()) => info!(group = %group, path = %outcome.path, "summary written"),
                    Err(err) => {
                        error!(group = %group, error = %err, "could not write summary");
                        outcome.error = Some(err.to_string());
                    }
                }
                outcome
            })
            .collect()
    }
}
