//! Search specifications and pagination for data-source fetches

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filter operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "$eq")]
    Eq,
    #[serde(rename = "$ne")]
    Ne,
    #[serde(rename = "$lt")]
    Lt,
    #[serde(rename = "$lte")]
    Lte,
    #[serde(rename = "$gt")]
    Gt,
    #[serde(rename = "$gte")]
    Gte,
    #[serde(rename = "$contains")]
    Contains,
    #[serde(rename = "$containsi")]
    ContainsI,
    #[serde(rename = "$startsWith")]
    StartsWith,
    #[serde(rename = "$endsWith")]
    EndsWith,
    #[serde(rename = "$in")]
    In,
    #[serde(rename = "$null")]
    Null,
    #[serde(rename = "$notNull")]
    NotNull,
}

impl std::str::FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$contains" => Self::Contains,
            "$containsi" => Self::ContainsI,
            "$startsWith" => Self::StartsWith,
            "$endsWith" => Self::EndsWith,
            "$in" => Self::In,
            "$null" => Self::Null,
            "$notNull" => Self::NotNull,
            other => return Err(Error::InvalidSearch(format!("unknown operator {}", other))),
        })
    }
}

/// A single `field op value` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Single-field sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Parsed search: conjunction of filter conditions plus optional sort
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpec {
    #[serde(default)]
    pub filters: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
}

impl SearchSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(
        mut self,
        field: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(Condition {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.sort.is_none()
    }
}

/// Parse a query-string style search
///
/// Accepts `filters[field]=v`, `filters[field][$op]=v`,
/// `filters[field][$in][n]=v` and `sort=field:asc|desc`, separated by `&`.
/// Unknown keys are ignored.
pub fn parse_search(input: &str) -> Result<SearchSpec> {
    let mut spec = SearchSpec::new();
    let input = input.trim().trim_start_matches('?');

    for pair in input.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key);
        let value = decode_component(raw_value);

        if key == "sort" {
            spec.sort = Some(parse_sort(&value)?);
        } else if let Some(rest) = key.strip_prefix("filters") {
            push_filter(&mut spec, rest, &value)?;
        } else {
            tracing::debug!("Ignoring unknown search key: {}", key);
        }
    }

    Ok(spec)
}

fn parse_sort(value: &str) -> Result<SortSpec> {
    let (field, direction) = value.split_once(':').unwrap_or((value, "asc"));
    if field.is_empty() {
        return Err(Error::InvalidSearch("empty sort field".to_string()));
    }
    let direction = match direction.to_ascii_lowercase().as_str() {
        "asc" => SortDirection::Asc,
        "desc" => SortDirection::Desc,
        other => {
            return Err(Error::InvalidSearch(format!(
                "invalid sort direction {}",
                other
            )))
        }
    };
    Ok(SortSpec {
        field: field.to_string(),
        direction,
    })
}

fn push_filter(spec: &mut SearchSpec, brackets: &str, raw: &str) -> Result<()> {
    let segments = bracket_segments(brackets)
        .ok_or_else(|| Error::InvalidSearch(format!("malformed filter key filters{}", brackets)))?;

    let (field, op) = match segments.as_slice() {
        [field] => (field.clone(), Operator::Eq),
        [field, op] | [field, op, _] => (field.clone(), op.parse::<Operator>()?),
        _ => {
            return Err(Error::InvalidSearch(format!(
                "unsupported filter key filters{}",
                brackets
            )))
        }
    };
    if field.is_empty() {
        return Err(Error::InvalidSearch("empty filter field".to_string()));
    }

    let value = coerce_value(raw);
    if op == Operator::In {
        // Repeated `$in` keys accumulate into one condition
        if let Some(existing) = spec
            .filters
            .iter_mut()
            .find(|c| c.field == field && c.op == Operator::In)
        {
            if let Value::Array(items) = &mut existing.value {
                items.push(value);
            }
            return Ok(());
        }
        spec.filters.push(Condition {
            field,
            op,
            value: Value::Array(vec![value]),
        });
        return Ok(());
    }

    spec.filters.push(Condition { field, op, value });
    Ok(())
}

/// Split `[a][b][c]` into `["a", "b", "c"]`
fn bracket_segments(s: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let end = inner.find(']')?;
        segments.push(inner[..end].to_string());
        rest = &inner[end + 1..];
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

fn coerce_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = raw.parse::<i64>() {
                Value::from(n)
            } else if let Ok(f) = raw.parse::<f64>() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(raw.to_string()))
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}

/// Decode `+` and `%XX` escapes
fn decode_component(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(b) => {
                        out.push(b);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Pagination options (1-indexed pages)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number, starting at 1
    pub page: usize,

    /// Number of records per page
    pub page_size: usize,
}

impl Pagination {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size,
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.page_size
    }
}

/// Parameters of one discovery-mode page fetch
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery<'a> {
    pub filters: &'a [Condition],
    pub sort: Option<&'a SortSpec>,
    pub pagination: Pagination,
}

impl<'a> PageQuery<'a> {
    pub fn new(search: Option<&'a SearchSpec>, pagination: Pagination) -> Self {
        Self {
            filters: search.map(|s| s.filters.as_slice()).unwrap_or(&[]),
            sort: search.and_then(|s| s.sort.as_ref()),
            pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_filters_and_sort() {
        let spec =
            parse_search("filters[title][$containsi]=hello+world&filters[views][$gt]=10&sort=title:desc")
                .unwrap();

        assert_eq!(spec.filters.len(), 2);
        assert_eq!(spec.filters[0].field, "title");
        assert_eq!(spec.filters[0].op, Operator::ContainsI);
        assert_eq!(spec.filters[0].value, json!("hello world"));
        assert_eq!(spec.filters[1].op, Operator::Gt);
        assert_eq!(spec.filters[1].value, json!(10));
        assert_eq!(spec.sort, Some(SortSpec::desc("title")));
    }

    #[test]
    fn test_parse_bare_filter_is_eq() {
        let spec = parse_search("?filters[slug]=my%2Dpost").unwrap();
        assert_eq!(spec.filters[0].op, Operator::Eq);
        assert_eq!(spec.filters[0].value, json!("my-post"));
        assert!(spec.sort.is_none());
    }

    #[test]
    fn test_parse_in_accumulates() {
        let spec = parse_search("filters[id][$in][0]=1&filters[id][$in][1]=3").unwrap();
        assert_eq!(spec.filters.len(), 1);
        assert_eq!(spec.filters[0].value, json!([1, 3]));
    }

    #[test]
    fn test_parse_sort_default_direction() {
        let spec = parse_search("sort=publishedAt").unwrap();
        assert_eq!(spec.sort, Some(SortSpec::asc("publishedAt")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_search("sort=title:sideways").is_err());
        assert!(parse_search("filters[title][$like]=x").is_err());
        assert!(parse_search("filters[title=x").is_err());
    }

    #[test]
    fn test_parse_ignores_unknown_keys() {
        let spec = parse_search("locale=fr&page=2").unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn test_pagination() {
        assert_eq!(Pagination::new(1, 500).offset(), 0);
        assert_eq!(Pagination::new(3, 500).offset(), 1000);
        assert_eq!(Pagination::new(0, 10).page, 1);
    }
}
