//! Read path: single-file and glob queries with optional structured parsing.
//!
//! Reads never go through the task queue. A read racing a write may see the
//! new file contents before the commit lands.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::bundle::{Bundle, PartBody};
use crate::error::{Error, Result};
use crate::{glob, paths};

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// How a queried file is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Yaml,
    Csv,
    Toml,
    /// Markdown with optional YAML front matter.
    Markdown,
    /// Raw bytes, unparsed.
    #[default]
    Binary,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Csv => "csv",
            Self::Toml => "toml",
            Self::Markdown => "markdown",
            Self::Binary => "binary",
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "csv" => Ok(Self::Csv),
            "toml" => Ok(Self::Toml),
            "markdown" | "md" => Ok(Self::Markdown),
            "binary" | "" => Ok(Self::Binary),
            other => Err(Error::unsupported_format(other)),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Dotted-path equality predicate, written `key.sub.path=value` or
/// `key:value`.
///
/// Path segments index objects by key and arrays by position. The value at
/// the path matches when its text form equals the expected string exactly:
/// strings compare as-is, numbers and booleans by their JSON rendering.
/// Null, arrays and objects never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    path: Vec<String>,
    expected: String,
}

impl Filter {
    pub fn new(path: &str, expected: impl Into<String>) -> Result<Self> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(Error::invalid_query(format!("invalid filter path '{}'", path)));
        }
        Ok(Self {
            path: path.split('.').map(str::to_string).collect(),
            expected: expected.into(),
        })
    }

    pub fn matches(&self, value: &Value) -> bool {
        let Some(found) = self.lookup(value) else {
            return false;
        };
        match found {
            Value::String(s) => *s == self.expected,
            Value::Number(n) => n.to_string() == self.expected,
            Value::Bool(b) => b.to_string() == self.expected,
            Value::Null | Value::Array(_) | Value::Object(_) => false,
        }
    }

    fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.path.iter().try_fold(value, |current, seg| match current {
            Value::Object(map) => map.get(seg),
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?),
            _ => None,
        })
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (path, expected) = s
            .split_once('=')
            .or_else(|| s.split_once(':'))
            .ok_or_else(|| {
                Error::invalid_query(format!("filter '{}' must look like key.path=value", s))
            })?;
        Self::new(path, expected)
    }
}

// ---------------------------------------------------------------------------
// Options / output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub format: Format,
    /// Column names for tabular formats; ignored by the others.
    pub columns: Option<Vec<String>>,
    /// Applied to glob results only.
    pub filter: Option<Filter>,
}

/// Result of a single-file query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Value(Value),
    Raw(Vec<u8>),
}

// ---------------------------------------------------------------------------
// QueryAggregator
// ---------------------------------------------------------------------------

/// Answers read queries against the working copy at `root`.
#[derive(Debug, Clone)]
pub struct QueryAggregator {
    root: PathBuf,
}

impl QueryAggregator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read one file, parsed according to `opts.format`.
    pub async fn query_file(&self, file: &str, opts: &QueryOptions) -> Result<QueryOutput> {
        let path = paths::resolve(&self.root, file)?;
        debug!(file = path.relative(), format = %opts.format, "query file");

        let meta = tokio::fs::metadata(path.absolute())
            .await
            .map_err(|e| Error::io(path.relative(), e))?;
        if !meta.is_file() {
            return Err(Error::invalid_path(format!("'{}' is not a file", path.relative())));
        }

        let data = tokio::fs::read(path.absolute())
            .await
            .map_err(|e| Error::io(path.relative(), e))?;

        Ok(match parse_file(path.relative(), &data, opts)? {
            Some(value) => QueryOutput::Value(value),
            None => QueryOutput::Raw(data),
        })
    }

    /// Relative paths of the regular files matching `pattern`.
    pub async fn expand(&self, pattern: &str) -> Result<Vec<String>> {
        let root = self.root.clone();
        let pattern = pattern.to_string();
        tokio::task::spawn_blocking(move || glob::expand(&root, &pattern))
            .await
            .map_err(|_| Error::TaskAborted)?
    }

    /// Read and parse every file matching `pattern` into one bundle keyed by
    /// relative path. Parsed values failing `opts.filter` are left out.
    pub async fn query_glob(&self, pattern: &str, opts: &QueryOptions) -> Result<Bundle> {
        if opts.filter.is_some() && opts.format == Format::Binary {
            return Err(Error::invalid_query("filter requires a structured format"));
        }

        let matches = self.expand(pattern).await?;
        debug!(pattern, format = %opts.format, matched = matches.len(), "query glob");

        let mut bundle = Bundle::new();
        for relative in matches {
            let full = self.root.join(&relative);
            let data = match tokio::fs::read(&full).await {
                Ok(data) => data,
                // Removed since expansion, e.g. by a rolled back write.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io(&relative, e)),
            };

            match parse_file(&relative, &data, opts)? {
                Some(value) => {
                    if let Some(ref filter) = opts.filter {
                        if !filter.matches(&value) {
                            continue;
                        }
                    }
                    bundle.push(relative, PartBody::Json(value));
                }
                None => bundle.push(relative, PartBody::Bytes(data)),
            }
        }

        Ok(bundle)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse `data` according to `opts.format`; `None` for [`Format::Binary`].
pub fn parse_file(path: &str, data: &[u8], opts: &QueryOptions) -> Result<Option<Value>> {
    if opts.format == Format::Binary {
        return Ok(None);
    }

    let text = std::str::from_utf8(data).map_err(|e| Error::parse(path, e))?;
    let value = match opts.format {
        Format::Json => serde_json::from_str(text).map_err(|e| Error::parse(path, e))?,
        Format::Yaml => parse_yaml(text).map_err(|e| Error::parse(path, e))?,
        Format::Toml => parse_toml(text).map_err(|e| Error::parse(path, e))?,
        Format::Csv => parse_csv(text, opts.columns.as_deref()).map_err(|e| Error::parse(path, e))?,
        Format::Markdown => parse_markdown(text).map_err(|e| Error::parse(path, e))?,
        Format::Binary => unreachable!("handled above"),
    };
    Ok(Some(value))
}

fn parse_yaml(text: &str) -> std::result::Result<Value, serde_yaml::Error> {
    let value: serde_yaml::Value = serde_yaml::from_str(text)?;
    Ok(yaml_to_json(value))
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect::<Map<_, _>>(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => "null".into(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn parse_toml(text: &str) -> std::result::Result<Value, toml::de::Error> {
    let table: toml::Table = text.parse()?;
    Ok(toml_to_json(toml::Value::Table(table)))
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect::<Map<_, _>>(),
        ),
    }
}

/// Without `columns`, rows are arrays of strings. With `columns`, every row
/// becomes an object keyed by those names and must have exactly that many
/// fields. The first row is data, not a header.
fn parse_csv(text: &str, columns: Option<&[String]>) -> std::result::Result<Value, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        let row = match columns {
            None => Value::Array(record.iter().map(|f| Value::String(f.into())).collect()),
            Some(columns) => {
                if record.len() != columns.len() {
                    let line = record.position().map(|p| p.line()).unwrap_or_default();
                    return Err(format!(
                        "record on line {} has {} fields, but {} columns were given",
                        line,
                        record.len(),
                        columns.len()
                    ));
                }
                Value::Object(
                    columns
                        .iter()
                        .zip(record.iter())
                        .map(|(c, f)| (c.clone(), Value::String(f.into())))
                        .collect(),
                )
            }
        };
        rows.push(row);
    }
    Ok(Value::Array(rows))
}

/// `{ "attributes": <front matter>, "body": <rest> }`.
fn parse_markdown(text: &str) -> std::result::Result<Value, serde_yaml::Error> {
    let (front, body) = split_front_matter(text);
    let attributes = match front {
        Some(yaml) if !yaml.trim().is_empty() => parse_yaml(yaml)?,
        _ => Value::Object(Map::new()),
    };

    let mut out = Map::new();
    out.insert("attributes".into(), attributes);
    out.insert("body".into(), Value::String(body.to_string()));
    Ok(Value::Object(out))
}

/// Split a leading `---` fenced block off `text`.
fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = text
        .strip_prefix("---\r\n")
        .or_else(|| text.strip_prefix("---\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, text)
}
