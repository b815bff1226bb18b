//! Session options applied before every benchmarked query

use serde::{Deserialize, Serialize};

use crate::variant::{check_identifier, check_value, QueryVariant, Template};
use crate::Result;

/// One `name = value` session option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    /// Option name, e.g. `enable_hashjoin`
    pub name: String,
    /// Option value, e.g. `off`, `64kB` or a `{name}` template such as
    /// `{fastjoin}`
    pub value: String,
}

impl Setting {
    /// Create a setting.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered list of session options.
///
/// Names must be identifiers and values plain tokens, so the rendered
/// statements cannot smuggle in extra SQL. A value may hold `{name}`
/// placeholders filled from the variant being run; see [`Self::render`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSettings(Vec<Setting>);

impl SessionSettings {
    /// Create from a list of settings.
    ///
    /// # Errors
    ///
    /// Returns error if a name is not an identifier, a value template is
    /// malformed, or a value contains characters other than letters, digits,
    /// `_` and `.` outside its placeholders.
    pub fn new(settings: Vec<Setting>) -> Result<Self> {
        let settings = Self(settings);
        settings.validate()?;
        Ok(settings)
    }

    /// No settings at all.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Nested-loop-only planner configuration: every other join and scan
    /// strategy disabled, no parallel workers, a 64kB work memory and a
    /// 30 minute statement timeout.
    #[must_use]
    pub fn nested_loop_only() -> Self {
        Self(
            [
                ("enable_material", "off"),
                ("max_parallel_workers_per_gather", "0"),
                ("enable_hashjoin", "off"),
                ("enable_mergejoin", "off"),
                ("enable_indexonlyscan", "off"),
                ("enable_indexscan", "off"),
                ("enable_block", "off"),
                ("enable_bitmapscan", "off"),
                ("enable_fastjoin", "off"),
                ("enable_seqscan", "off"),
                ("enable_fliporder", "off"),
                ("enable_nestloop", "on"),
                ("work_mem", "64kB"),
                ("statement_timeout", "1800000"),
            ]
            .into_iter()
            .map(|(name, value)| Setting::new(name, value))
            .collect(),
        )
    }

    /// Check every name and value.
    ///
    /// # Errors
    ///
    /// Returns the first invalid name or value.
    pub fn validate(&self) -> Result<()> {
        for setting in &self.0 {
            check_identifier(&setting.name)?;
            let template = Template::new(setting.value.as_str())?;
            check_value(&setting.name, &template.render_with(|_| Some("x"))?)?;
        }
        Ok(())
    }

    /// Fill value placeholders from `variant`.
    ///
    /// # Errors
    ///
    /// Returns error for a placeholder the variant lacks, or a rendered value
    /// that is not a plain token.
    pub fn render(&self, variant: &QueryVariant) -> Result<Self> {
        self.0
            .iter()
            .map(|setting| {
                let value = Template::new(setting.value.as_str())?.render(variant)?;
                check_value(&setting.name, &value)?;
                Ok(Setting::new(setting.name.as_str(), value))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Placeholder names used by any value.
    pub(crate) fn placeholders(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for setting in &self.0 {
            let template = Template::new(setting.value.as_str())?;
            names.extend(template.placeholders().map(str::to_string));
        }
        Ok(names)
    }

    /// Iterate over the settings in order.
    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.0.iter()
    }

    /// Number of settings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as `<keyword> name = 'value';` statements, one per setting.
    pub(crate) fn statements(&self, keyword: &str) -> Vec<String> {
        self.0
            .iter()
            .map(|s| format!("{keyword} {} = '{}';", s.name, s.value))
            .collect()
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::nested_loop_only()
    }
}
