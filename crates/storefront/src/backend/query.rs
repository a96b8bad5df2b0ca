//! Row filters, ordering and column selection for data API requests.
//!
//! Values are carried as text, the same way the data API receives them in
//! the query string, so a `Query` can be rendered to URL parameters or
//! evaluated against in-memory rows without loss.

use std::fmt::Display;

/// Sort direction for [`Query::order_asc`] / [`Query::order_desc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A single row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, String),
    Neq(String, String),
    Gt(String, String),
    In(String, Vec<String>),
    /// Case-insensitive substring match.
    Contains(String, String),
}

impl Filter {
    /// Column this filter applies to.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Eq(column, _)
            | Self::Neq(column, _)
            | Self::Gt(column, _)
            | Self::In(column, _)
            | Self::Contains(column, _) => column,
        }
    }

    /// Operator and operand in data API syntax, e.g. `eq.42`.
    fn to_param(&self) -> String {
        match self {
            Self::Eq(_, value) => format!("eq.{value}"),
            Self::Neq(_, value) => format!("neq.{value}"),
            Self::Gt(_, value) => format!("gt.{value}"),
            Self::In(_, values) => {
                let list = values.iter().map(|v| quote_list_value(v)).collect::<Vec<_>>();
                format!("in.({})", list.join(","))
            }
            Self::Contains(_, needle) => format!("ilike.*{}*", needle.replace('*', "")),
        }
    }
}

/// Values containing list syntax characters must be double-quoted.
fn quote_list_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// A data API query: column selection, filters, ordering and limit.
///
/// ```rust,ignore
/// let q = Query::new()
///     .select("*,stores(name)")
///     .eq("is_available", true)
///     .gt("stock", 0)
///     .order_desc("created_at");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    select: Option<String>,
    filters: Vec<Filter>,
    order: Vec<(String, SortOrder)>,
    limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Column list, including one level of embedded tables (`*,stores(name)`).
    #[must_use]
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn neq(mut self, column: &str, value: impl Display) -> Self {
        self.filters.push(Filter::Neq(column.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn gt(mut self, column: &str, value: impl Display) -> Self {
        self.filters.push(Filter::Gt(column.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn in_list<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    /// Case-insensitive substring match on a text column.
    #[must_use]
    pub fn contains(mut self, column: &str, needle: &str) -> Self {
        self.filters
            .push(Filter::Contains(column.to_string(), needle.to_string()));
        self
    }

    #[must_use]
    pub fn order_asc(mut self, column: &str) -> Self {
        self.order.push((column.to_string(), SortOrder::Asc));
        self
    }

    #[must_use]
    pub fn order_desc(mut self, column: &str) -> Self {
        self.order.push((column.to_string(), SortOrder::Desc));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn selected_columns(&self) -> Option<&str> {
        self.select.as_deref()
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    #[must_use]
    pub fn ordering(&self) -> &[(String, SortOrder)] {
        &self.order
    }

    #[must_use]
    pub const fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Render as data API query-string pairs.
    ///
    /// `for_read` controls whether `select`, `order` and `limit` are emitted;
    /// writes and counts only carry the filters.
    #[must_use]
    pub fn to_params(&self, for_read: bool) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 3);
        if for_read {
            let columns: String = self
                .select
                .as_deref()
                .unwrap_or("*")
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            params.push(("select".to_string(), columns));
        }
        params.extend(
            self.filters
                .iter()
                .map(|f| (f.column().to_string(), f.to_param())),
        );
        if for_read {
            if !self.order.is_empty() {
                let order = self
                    .order
                    .iter()
                    .map(|(column, dir)| match dir {
                        SortOrder::Asc => format!("{column}.asc"),
                        SortOrder::Desc => format!("{column}.desc"),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                params.push(("order".to_string(), order));
            }
            if let Some(limit) = self.limit {
                params.push(("limit".to_string(), limit.to_string()));
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_read_params() {
        let query = Query::new()
            .select("*, stores (name)")
            .eq("is_available", true)
            .gt("stock", 0)
            .order_desc("created_at")
            .limit(20);
        let params = query.to_params(true);

        assert_eq!(param(&params, "select"), Some("*,stores(name)"));
        assert_eq!(param(&params, "is_available"), Some("eq.true"));
        assert_eq!(param(&params, "stock"), Some("gt.0"));
        assert_eq!(param(&params, "order"), Some("created_at.desc"));
        assert_eq!(param(&params, "limit"), Some("20"));
    }

    #[test]
    fn test_write_params_carry_filters_only() {
        let params = Query::new()
            .eq("user_id", "u1")
            .order_asc("created_at")
            .limit(1)
            .to_params(false);
        assert_eq!(params, vec![("user_id".to_string(), "eq.u1".to_string())]);
    }

    #[test]
    fn test_default_select_is_star() {
        let params = Query::new().to_params(true);
        assert_eq!(param(&params, "select"), Some("*"));
        assert_eq!(param(&params, "order"), None);
    }

    #[test]
    fn test_in_list_quotes_reserved_characters() {
        let params = Query::new()
            .in_list("name", ["rose", "red, tulip"])
            .to_params(false);
        assert_eq!(param(&params, "name"), Some("in.(rose,\"red, tulip\")"));
    }

    #[test]
    fn test_multiple_orderings_join() {
        let params = Query::new()
            .order_desc("is_default")
            .order_desc("created_at")
            .to_params(true);
        assert_eq!(
            param(&params, "order"),
            Some("is_default.desc,created_at.desc")
        );
    }

    #[test]
    fn test_contains_renders_ilike() {
        let params = Query::new().contains("name", "rose*").to_params(false);
        assert_eq!(param(&params, "name"), Some("ilike.*rose*"));
    }
}
