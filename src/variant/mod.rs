//! Query variants and the parameter space they come from
//!
//! A [`QueryVariant`] is one point of a sweep, e.g.
//! `shuffle=2, dist=1`. Its values are substituted into a
//! [`QueryTemplate`] to get the literal query and into path [`Template`]s to
//! get output file names. Values are restricted to plain tokens, so
//! substitution can never change the shape of the SQL.
//!
//! ```rust
//! use joinprobe::variant::{Axis, ParamSpace, QueryTemplate};
//!
//! # fn main() -> joinprobe::Result<()> {
//! let space = ParamSpace::new(vec![
//!     Axis::new("shuffle", ["1", "2", "3"]),
//!     Axis::new("skew", ["0", "1_5"]),
//! ])?;
//! let template = QueryTemplate::new(
//!     "select * from order{shuffle}{skew} join lineitem{shuffle}{skew} on o_orderkey = l_orderkey;",
//! )?;
//!
//! let variants = space.variants();
//! assert_eq!(variants.len(), 6);
//! assert_eq!(
//!     template.render(&variants[1])?,
//!     "select * from order11_5 join lineitem11_5 on o_orderkey = l_orderkey;"
//! );
//! # Ok(())
//! # }
//! ```

mod template;

pub use template::{QueryTemplate, Template};

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Check that `name` is a SQL-style identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] otherwise.
pub fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name: "identifier".to_string(),
            value: name.to_string(),
        })
    }
}

/// Check that `value` is a non-empty token of letters, digits, `_` and `.`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] naming `name` otherwise.
pub fn check_value(name: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

/// One point in a sweep's parameter space. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryVariant {
    params: Vec<(String, String)>,
}

impl QueryVariant {
    /// Build a variant from `(name, value)` pairs, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns error if a name is not an identifier, a name repeats, or a
    /// value is not a plain token.
    pub fn new<I, N, V>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (name, value) in params {
            let (name, value) = (name.into(), value.into());
            check_identifier(&name)?;
            check_value(&name, &value)?;
            if !seen.insert(name.clone()) {
                return Err(Error::InvalidParameter { name, value });
            }
            out.push((name, value));
        }
        Ok(Self { params: out })
    }

    /// Value of parameter `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Sub-variant with only `names` (in that order), skipping absent ones.
    ///
    /// Used as the grouping key when averaging across variants.
    #[must_use]
    pub fn project(&self, names: &[String]) -> Self {
        Self {
            params: names
                .iter()
                .filter_map(|n| self.get(n).map(|v| (n.clone(), v.to_string())))
                .collect(),
        }
    }

    /// Whether the variant has no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for QueryVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            return f.write_str("(default)");
        }
        for (i, (name, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// A named sweep dimension and the values it takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    /// Placeholder name used in templates
    pub name: String,
    /// Values, in sweep order
    pub values: Vec<String>,
}

impl Axis {
    /// Create an axis.
    pub fn new<V: Into<String>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Cartesian product of axes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSpace {
    axes: Vec<Axis>,
}

impl ParamSpace {
    /// Build a parameter space.
    ///
    /// # Errors
    ///
    /// Returns error if an axis has no values, names repeat, or a name or
    /// value is not safe to substitute.
    pub fn new(axes: Vec<Axis>) -> Result<Self> {
        let mut names = HashSet::new();
        for axis in &axes {
            check_identifier(&axis.name)?;
            if !names.insert(axis.name.as_str()) {
                return Err(Error::InvalidConfig(format!("axis `{}` appears twice", axis.name)));
            }
            if axis.values.is_empty() {
                return Err(Error::InvalidConfig(format!("axis `{}` has no values", axis.name)));
            }
            for value in &axis.values {
                check_value(&axis.name, value)?;
            }
        }
        Ok(Self { axes })
    }

    /// Axes in order.
    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Number of variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Always false: an empty space still has the one parameterless variant.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, first axis outermost.
    #[must_use]
    pub fn variants(&self) -> Vec<QueryVariant> {
        let mut combos: Vec<Vec<(String, String)>> = vec![Vec::new()];
        for axis in &self.axes {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    axis.values.iter().map(move |value| {
                        let mut next = prefix.clone();
                        next.push((axis.name.clone(), value.clone()));
                        next
                    })
                })
                .collect();
        }
        combos
            .into_iter()
            .map(|params| QueryVariant { params })
            .collect()
    }
}
