//! Strongly-typed query parameters.
//!
//! Front ends receive string-typed parameters (`q`, `t`, `k`, `l`, `self`).
//! They are parsed and validated once here; everything downstream works
//! with named, typed fields.

use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;
use crate::error::{Result, SimWordsError};

/// A validated similar-words query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Word (or phrase) to search for.
    pub query: String,
    /// Optional phrase template containing the placeholder token.
    pub template: Option<String>,
    /// Clusters scanned from each end of the similarity ranking.
    pub top_k: usize,
    /// Words emitted per scanned cluster.
    pub limit_per_cluster: usize,
    pub include_self: bool,
}

impl QueryRequest {
    /// A request for `query` using the given defaults.
    pub fn new(query: impl Into<String>, defaults: &QueryConfig) -> Self {
        Self {
            query: query.into(),
            template: None,
            top_k: defaults.top_k,
            limit_per_cluster: defaults.candidates_per_cluster,
            include_self: defaults.include_self,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Parse loosely-typed boundary parameters.
    ///
    /// Recognized keys: `q` (query), `t` (template, empty means none),
    /// `k` (top_k), `l` (limit per cluster), `self` (include self).
    /// Unknown keys are ignored. Missing keys take `defaults`.
    pub fn from_params<'a, I>(params: I, defaults: &QueryConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut request = Self::new(String::new(), defaults);
        for (key, value) in params {
            match key {
                "q" => request.query = value.trim().to_string(),
                "t" => {
                    request.template = if value.is_empty() {
                        None
                    } else {
                        Some(value.to_string())
                    }
                }
                "k" => request.top_k = parse_count("k", value)?,
                "l" => request.limit_per_cluster = parse_count("l", value)?,
                "self" => request.include_self = parse_flag("self", value)?,
                _ => {}
            }
        }
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.is_empty() {
            return Err(SimWordsError::InvalidArgument("query must not be empty".into()));
        }
        if self.top_k == 0 {
            return Err(SimWordsError::InvalidArgument("k must be at least 1".into()));
        }
        if self.limit_per_cluster == 0 {
            return Err(SimWordsError::InvalidArgument("l must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize> {
    value.trim().parse::<usize>().map_err(|_| {
        SimWordsError::InvalidArgument(format!("{}={} is not a valid number", name, value))
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(SimWordsError::InvalidArgument(format!(
            "{}={} is not a valid flag",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_params_defaults() {
        let request = QueryRequest::from_params([("q", "cat")], &QueryConfig::default()).unwrap();
        assert_eq!(request.query, "cat");
        assert_eq!(request.template, None);
        assert_eq!(request.top_k, 3);
        assert_eq!(request.limit_per_cluster, 5);
        assert!(!request.include_self);
    }

    #[test]
    fn test_from_params_all_fields() {
        let params = [
            ("q", "happy"),
            ("t", "I feel {{placeholder}} today"),
            ("k", "2"),
            ("l", "10"),
            ("self", "true"),
        ];
        let request = QueryRequest::from_params(params, &QueryConfig::default()).unwrap();
        assert_eq!(request.query, "happy");
        assert_eq!(
            request.template.as_deref(),
            Some("I feel {{placeholder}} today")
        );
        assert_eq!(request.top_k, 2);
        assert_eq!(request.limit_per_cluster, 10);
        assert!(request.include_self);
    }

    #[test]
    fn test_empty_template_means_none() {
        let request =
            QueryRequest::from_params([("q", "cat"), ("t", "")], &QueryConfig::default()).unwrap();
        assert_eq!(request.template, None);
    }

    #[test]
    fn test_non_numeric_k_is_rejected() {
        let err = QueryRequest::from_params([("q", "cat"), ("k", "three")], &QueryConfig::default())
            .unwrap_err();
        assert!(matches!(err, SimWordsError::InvalidArgument(_)));
        assert!(err.to_string().contains("k=three"));
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let err = QueryRequest::from_params([("q", "cat"), ("l", "0")], &QueryConfig::default())
            .unwrap_err();
        assert!(matches!(err, SimWordsError::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_query_is_rejected() {
        let err = QueryRequest::from_params([("k", "3")], &QueryConfig::default()).unwrap_err();
        assert!(err.to_string().contains("query must not be empty"));
    }

    #[test]
    fn test_bad_flag_is_rejected() {
        let result =
            QueryRequest::from_params([("q", "cat"), ("self", "maybe")], &QueryConfig::default());
        assert!(result.is_err());
    }
}
