//! Per-query parameters.

use std::time::Duration;

use super::property_function::PropertyFunctionRegistry;
use crate::storage::time::{SharedTimeSource, system_time};
use crate::storage::ActiveGraph;

/// Default streaming batch size.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Parameters a query is evaluated with.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Target size of batches produced by the streaming evaluator.
    pub batch_size: usize,
    /// `None` means no timeout.
    pub timeout: Option<Duration>,
    /// Return what has been accumulated instead of failing on timeout.
    pub partial_results_on_timeout: bool,
    /// Drop solutions whose filter raises an error instead of failing.
    pub fail_silently_on_filter_error: bool,
    /// Declared output variable order, applied to the final result.
    pub output_variables: Option<Vec<String>>,
    pub active_graph: ActiveGraph,
    /// Remove `_:` variables at the end of each BGP.
    pub trim_temporary_variables: bool,
    pub property_functions: PropertyFunctionRegistry,
    /// Clock used for timeout checks.
    pub time_source: SharedTimeSource,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: None,
            partial_results_on_timeout: false,
            fail_silently_on_filter_error: true,
            output_variables: None,
            active_graph: ActiveGraph::Default,
            trim_temporary_variables: true,
            property_functions: PropertyFunctionRegistry::with_builtins(),
            time_source: system_time(),
        }
    }
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_partial_results_on_timeout(mut self, partial: bool) -> Self {
        self.partial_results_on_timeout = partial;
        self
    }

    #[must_use]
    pub const fn with_fail_silently_on_filter_error(mut self, silent: bool) -> Self {
        self.fail_silently_on_filter_error = silent;
        self
    }

    #[must_use]
    pub fn with_output_variables<S: Into<String>>(mut self, variables: impl IntoIterator<Item = S>) -> Self {
        self.output_variables = Some(variables.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_active_graph(mut self, graph: ActiveGraph) -> Self {
        self.active_graph = graph;
        self
    }

    #[must_use]
    pub const fn with_trim_temporary_variables(mut self, trim: bool) -> Self {
        self.trim_temporary_variables = trim;
        self
    }

    #[must_use]
    pub fn with_property_functions(mut self, registry: PropertyFunctionRegistry) -> Self {
        self.property_functions = registry;
        self
    }

    #[must_use]
    pub fn with_time_source(mut self, time_source: SharedTimeSource) -> Self {
        self.time_source = time_source;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = QueryOptions::default();
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
        assert!(options.timeout.is_none());
        assert!(!options.partial_results_on_timeout);
        assert!(options.fail_silently_on_filter_error);
        assert!(options.trim_temporary_variables);
        assert_eq!(options.active_graph, ActiveGraph::Default);
    }

    #[test]
    fn test_builders() {
        let options = QueryOptions::new()
            .with_batch_size(0)
            .with_timeout(Some(Duration::from_millis(5)))
            .with_output_variables(["b", "a"])
            .with_fail_silently_on_filter_error(false);
        assert_eq!(options.batch_size, 1);
        assert_eq!(options.timeout, Some(Duration::from_millis(5)));
        assert_eq!(options.output_variables, Some(vec!["b".to_string(), "a".to_string()]));
        assert!(!options.fail_silently_on_filter_error);
    }
}
