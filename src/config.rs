//! Sweep configuration
//!
//! A sweep is described by one JSON file. Every field has a default, so a
//! config only needs the parts that differ:
//!
//! ```json
//! {
//!   "database": "postgres://bench@localhost:5447/tpch",
//!   "query": "select o_orderkey, l_orderkey from order1{shuffle}{skew} join lineitem1{shuffle}{skew} on o_orderkey = l_orderkey limit 100000;",
//!   "axes": [
//!     { "name": "skew", "values": ["0", "1", "1_5"] },
//!     { "name": "shuffle", "values": ["1", "2", "3"] }
//!   ],
//!   "group_by": ["skew"],
//!   "time_budget_secs": 60
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::averager::{MissingValuePolicy, SummaryFormat};
use crate::cursor::SessionSettings;
use crate::timer::{CheckpointSchedule, CheckpointTimer, DEFAULT_PROGRESS_INTERVAL};
use crate::variant::{Axis, ParamSpace, QueryTemplate, Template};
use crate::{Error, Result};

/// Checkpoints used by the TPC-H join experiments.
pub const DEFAULT_CHECKPOINTS: [u64; 46] = [
    10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 150, 200, 250, 300, 350, 400, 450, 500, 550, 600,
    650, 700, 750, 800, 850, 900, 950, 1000, 1050, 1100, 1150, 1200, 2000, 3000, 4000, 5000,
    10000, 20000, 30000, 40000, 50000, 60000, 70000, 80000, 90000, 100_000,
];

/// Everything a sweep needs besides the two output base paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// Database URL (`postgres://...`, `sqlite://path`, `sqlite::memory:`)
    pub database: String,
    /// Algorithm label written in each run header
    pub label: String,
    /// Row counts at which samples are taken
    pub checkpoints: Vec<u64>,
    /// Decay factor for weighted time, in (0, 1)
    pub sigma: f64,
    /// Stop fetching after this many seconds
    pub time_budget_secs: f64,
    /// Executions per variant (averaged)
    pub repetitions: usize,
    /// Rows between progress lines in the detail log (0 disables)
    pub progress_interval: u64,
    /// Session options applied before every execution
    pub settings: SessionSettings,
    /// Query template with `{axis}` placeholders
    pub query: String,
    /// Sweep dimensions
    pub axes: Vec<Axis>,
    /// Axes that identify a summary group; variants differing only in the
    /// remaining axes are averaged together
    pub group_by: Vec<String>,
    /// Detail log path template (`{base}` = detail argument)
    pub detail_path: String,
    /// Summary path template (`{base}` = summary argument)
    pub summary_path: String,
    /// Summary file layout
    pub summary_format: SummaryFormat,
    /// Treatment of checkpoints some variants never reached
    pub missing_values: MissingValuePolicy,
    /// Optional JSON report of every run
    pub report_path: Option<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            database: "postgres://localhost:5432/postgres".to_string(),
            label: "BNL".to_string(),
            checkpoints: DEFAULT_CHECKPOINTS.to_vec(),
            sigma: 0.99,
            time_budget_secs: 900.0,
            repetitions: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            settings: SessionSettings::nested_loop_only(),
            query: "select * from part{shuffle}{skew}, supplier{shuffle}{skew}, \
                    partsupp{shuffle}{skew} where p_partkey = ps_partkey and s_suppkey = ps_suppkey;"
                .to_string(),
            axes: vec![
                Axis::new("shuffle", ["1", "3", "4"]),
                Axis::new("skew", ["1_5"]),
            ],
            group_by: Vec::new(),
            detail_path: "{base}".to_string(),
            summary_path: "{base}".to_string(),
            summary_format: SummaryFormat::Pair,
            missing_values: MissingValuePolicy::Skip,
            report_path: None,
        }
    }
}

impl SweepConfig {
    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid JSON, or fails
    /// [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field that can be checked without a database.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.timer()?;
        self.settings.validate()?;
        if self.repetitions == 0 {
            return Err(Error::InvalidConfig("repetitions must be at least 1".to_string()));
        }
        let space = self.param_space()?;
        for name in &self.group_by {
            if !space.axes().iter().any(|a| &a.name == name) {
                return Err(Error::InvalidConfig(format!(
                    "group_by names unknown axis `{name}`"
                )));
            }
        }
        let known = |name: &str| name == "base" || space.axes().iter().any(|a| a.name == name);
        let detail = self.detail_template()?;
        if let Some(bad) = detail.placeholders().find(|n| !known(*n)) {
            return Err(Error::InvalidConfig(format!(
                "detail_path uses unknown placeholder `{bad}`"
            )));
        }
        let summary = self.summary_template()?;
        if let Some(bad) = summary
            .placeholders()
            .find(|n| *n != "base" && !self.group_by.iter().any(|g| g.as_str() == *n))
        {
            return Err(Error::InvalidConfig(format!(
                "summary_path may only use `base` and group_by axes, found `{bad}`"
            )));
        }
        if let Some(bad) = self.settings.placeholders()?.into_iter().find(|n| !known(n)) {
            return Err(Error::InvalidConfig(format!(
                "settings use unknown placeholder `{bad}`"
            )));
        }
        let query = self.query_template()?;
        for variant in space.variants() {
            self.settings.render(&variant)?;
            query.render(&variant)?;
        }
        Ok(())
    }

    /// Timer built from checkpoints, sigma, budget and progress interval.
    ///
    /// # Errors
    ///
    /// Returns error for an invalid schedule, sigma or budget.
    pub fn timer(&self) -> Result<CheckpointTimer> {
        if !(self.time_budget_secs.is_finite() && self.time_budget_secs > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "time_budget_secs must be positive, got {}",
                self.time_budget_secs
            )));
        }
        // Beyond `Duration::MAX` the budget can never be reached.
        let budget = Duration::try_from_secs_f64(self.time_budget_secs).unwrap_or(Duration::MAX);
        let schedule = CheckpointSchedule::new(self.checkpoints.clone())?;
        Ok(CheckpointTimer::new(schedule, self.sigma)?
            .with_time_budget(budget)
            .with_progress_interval(self.progress_interval))
    }

    /// Parameter space from the axes.
    ///
    /// # Errors
    ///
    /// Returns error for empty, duplicate or unsafe axes.
    pub fn param_space(&self) -> Result<ParamSpace> {
        ParamSpace::new(self.axes.clone())
    }

    /// Parsed query template.
    ///
    /// # Errors
    ///
    /// Returns error if the template is malformed.
    pub fn query_template(&self) -> Result<QueryTemplate> {
        QueryTemplate::new(self.query.clone())
    }

    /// Parsed detail path template.
    ///
    /// # Errors
    ///
    /// Returns error if the template is malformed.
    pub fn detail_template(&self) -> Result<Template> {
        Template::new(self.detail_path.clone())
    }

    /// Parsed summary path template.
    ///
    /// # Errors
    ///
    /// Returns error if the template is malformed.
    pub fn summary_template(&self) -> Result<Template> {
        Template::new(self.summary_path.clone())
    }
}
