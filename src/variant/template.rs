//! `{name}` placeholder templates for queries and output paths

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use super::{check_identifier, QueryVariant};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Text with `{name}` placeholders. `{{` and `}}` are literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] on an unterminated or stray brace, or a
    /// placeholder name that is not an identifier.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(Error::Template(format!(
                                    "unterminated placeholder `{{{name}` in `{source}`"
                                )))
                            }
                        }
                    }
                    check_identifier(&name).map_err(|_| {
                        Error::Template(format!("bad placeholder name `{name}` in `{source}`"))
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => {
                    return Err(Error::Template(format!(
                        "unmatched `}}` in `{source}` (use `}}}}` for a literal brace)"
                    )))
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { source, segments })
    }

    /// The template text as written.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance (repeats included).
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder with `lookup(name)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] for a placeholder `lookup` does not know.
    pub fn render_with<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = lookup(name).ok_or_else(|| {
                        Error::Template(format!(
                            "unknown placeholder `{{{name}}}` in `{}`",
                            self.source
                        ))
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Substitute the variant's parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] for a placeholder the variant lacks.
    pub fn render(&self, variant: &QueryVariant) -> Result<String> {
        self.render_with(|name| variant.get(name))
    }
}

/// A [`Template`] whose rendering must be exactly one SQL query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    template: Template,
}

impl QueryTemplate {
    /// Parse a query template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] if the template itself is malformed.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        Ok(Self {
            template: Template::new(source)?,
        })
    }

    /// The underlying template.
    #[must_use]
    pub const fn template(&self) -> &Template {
        &self.template
    }

    /// Render for `variant` and check the result parses as one query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] for unknown placeholders and
    /// [`Error::ParseError`] if the SQL is not a single query statement.
    pub fn render(&self, variant: &QueryVariant) -> Result<String> {
        let sql = self.template.render(variant)?;
        let statements = Parser::parse_sql(&PostgreSqlDialect {}, &sql)
            .map_err(|e| Error::ParseError(format!("{e} in `{sql}`")))?;
        match statements.as_slice() {
            [Statement::Query(_)] => Ok(sql),
            [_] => Err(Error::ParseError(format!(
                "only queries can be benchmarked: `{sql}`"
            ))),
            _ => Err(Error::ParseError(format!(
                "expected exactly one statement, found {}: `{sql}`",
                statements.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(pairs: &[(&str, &str)]) -> QueryVariant {
        QueryVariant::new(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_render_repeated_placeholders() {
        let t = Template::new("books_data{val} JOIN reviews{val} <= {dist}").unwrap();
        let out = t.render(&variant(&[("val", "2"), ("dist", "1")])).unwrap();
        assert_eq!(out, "books_data2 JOIN reviews2 <= 1");
        assert_eq!(t.placeholders().collect::<Vec<_>>(), vec!["val", "val", "dist"]);
    }

    #[test]
    fn test_escaped_braces() {
        let t = Template::new("{{literal}} {x}").unwrap();
        assert_eq!(t.render(&variant(&[("x", "1")])).unwrap(), "{literal} 1");
    }

    #[test]
    fn test_malformed_templates() {
        assert!(Template::new("select {x").is_err());
        assert!(Template::new("select x}").is_err());
        assert!(Template::new("select {a b}").is_err());
    }

    #[test]
    fn test_unknown_placeholder() {
        let t = Template::new("{missing}").unwrap();
        let err = t.render(&QueryVariant::default()).unwrap_err();
        assert!(err.to_string().contains("unknown placeholder `{missing}`"));
    }

    #[test]
    fn test_query_template_accepts_similarity_join() {
        let q = QueryTemplate::new(
            "SELECT books_data{val}.title, reviews{val}.title FROM books_data{val} \
             JOIN reviews{val} ON levenshtein(trim(books_data{val}.title::varchar(10)), \
             trim(reviews{val}.title::varchar(10))) <= {dist} LIMIT 32124;",
        )
        .unwrap();
        let sql = q.render(&variant(&[("val", "1"), ("dist", "3")])).unwrap();
        assert!(sql.contains("FROM books_data1 JOIN reviews1"));
    }

    #[test]
    fn test_query_template_rejects_non_queries() {
        let q = QueryTemplate::new("DROP TABLE t{x}").unwrap();
        assert!(q.render(&variant(&[("x", "1")])).is_err());
        let q = QueryTemplate::new("SELECT 1; SELECT 2").unwrap();
        assert!(q.render(&QueryVariant::default()).is_err());
    }
}
