//! Table API query construction.
//!
//! Pure data: nothing here performs I/O. A [`QueryDescriptor`] describes one
//! Table API read and renders to `sysparm_*` parameters; [`EncodedQuery`]
//! composes the `^`-separated filter expressions the platform expects.

/// Limit applied when a query does not specify one.
pub const DEFAULT_LIMIT: u32 = 10;
/// Ceiling for generic record queries.
pub const MAX_QUERY_LIMIT: u32 = 1000;
/// Ceiling for configuration item searches.
pub const MAX_CMDB_CI_LIMIT: u32 = 100;

/// A single Table API read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub table: String,
    pub query: Option<String>,
    pub fields: Option<Vec<String>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order_by: Option<String>,
}

impl QueryDescriptor {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Set the encoded query. Empty strings are ignored.
    pub fn query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    pub fn query_opt(self, query: Option<impl Into<String>>) -> Self {
        match query {
            Some(q) => self.query(q),
            None => self,
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn fields_opt(mut self, fields: Option<Vec<String>>) -> Self {
        if fields.is_some() {
            self.fields = fields;
        }
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn limit_opt(mut self, limit: Option<u32>) -> Self {
        if limit.is_some() {
            self.limit = limit;
        }
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sort by a field; a leading `-` sorts descending.
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// The requested limit, defaulted and clamped to `ceiling`.
    pub fn effective_limit(&self, ceiling: u32) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(ceiling)
    }

    /// The filter with any ordering directive appended.
    pub fn filter_expression(&self) -> Option<String> {
        let ordering = self.order_by.as_deref().filter(|f| !f.is_empty()).map(|field| {
            match field.strip_prefix('-') {
                Some(desc) => format!("ORDERBY{}^ORDERBYDESC", desc),
                None => format!("ORDERBY{}", field),
            }
        });

        match (self.query.as_deref(), ordering) {
            (Some(q), Some(o)) => Some(format!("{}^{}", q, o)),
            (Some(q), None) => Some(q.to_string()),
            (None, Some(o)) => Some(o),
            (None, None) => None,
        }
    }

    /// Render as `sysparm_*` request parameters.
    pub fn to_params(&self, ceiling: u32) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(filter) = self.filter_expression() {
            params.push(("sysparm_query".to_string(), filter));
        }
        if let Some(fields) = self.fields.as_ref().filter(|f| !f.is_empty()) {
            params.push(("sysparm_fields".to_string(), fields.join(",")));
        }
        params.push((
            "sysparm_limit".to_string(),
            self.effective_limit(ceiling).to_string(),
        ));
        if let Some(offset) = self.offset {
            params.push(("sysparm_offset".to_string(), offset.to_string()));
        }
        params
    }

    /// Render as a form-encoded query string.
    pub fn to_query_string(&self, ceiling: u32) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_params(ceiling))
            .finish()
    }

    /// Parse a query string produced by [`to_query_string`](Self::to_query_string).
    ///
    /// Ordering cannot be told apart from the filter once it has been
    /// appended, so it stays part of `query`.
    pub fn from_query_string(table: impl Into<String>, qs: &str) -> Self {
        let mut descriptor = Self::new(table);
        for (key, value) in url::form_urlencoded::parse(qs.as_bytes()) {
            match key.as_ref() {
                "sysparm_query" => descriptor.query = Some(value.into_owned()),
                "sysparm_fields" => {
                    descriptor.fields = Some(value.split(',').map(str::to_string).collect())
                }
                "sysparm_limit" => descriptor.limit = value.parse().ok(),
                "sysparm_offset" => descriptor.offset = value.parse().ok(),
                _ => {}
            }
        }
        descriptor
    }
}

/// Builder for `^`-joined encoded queries.
#[derive(Debug, Clone, Default)]
pub struct EncodedQuery {
    parts: Vec<String>,
}

impl EncodedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing expression. Empty input yields an empty query.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self::new().and(raw)
    }

    /// Append a condition with `^`. Empty conditions are skipped.
    pub fn and(mut self, condition: impl Into<String>) -> Self {
        let condition = condition.into();
        if !condition.is_empty() {
            self.parts.push(condition);
        }
        self
    }

    pub fn and_opt<S: Into<String>>(self, condition: Option<S>) -> Self {
        match condition {
            Some(c) => self.and(c),
            None => self,
        }
    }

    /// Append alternatives joined with `^OR`, as one `^` term.
    pub fn or<I, S>(self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let joined = alternatives
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect::<Vec<_>>()
            .join("^OR");
        self.and(joined)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn build(&self) -> String {
        self.parts.join("^")
    }

    /// `None` when no condition was added.
    pub fn build_opt(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.build())
    }
}

impl std::fmt::Display for EncodedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.build())
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
    fn test_limit_defaults_and_clamps() {
        assert_eq!(QueryDescriptor::new("incident").effective_limit(MAX_QUERY_LIMIT), 10);
        assert_eq!(
            QueryDescriptor::new("incident").limit(5000).effective_limit(MAX_QUERY_LIMIT),
            1000
        );
        assert_eq!(
            QueryDescriptor::new("cmdb_ci").limit(500).effective_limit(MAX_CMDB_CI_LIMIT),
            100
        );
        assert_eq!(
            QueryDescriptor::new("incident").limit(25).effective_limit(MAX_QUERY_LIMIT),
            25
        );
    }

    #[test]
    fn test_order_by_ascending_and_descending() {
        let asc = QueryDescriptor::new("incident").query("active=true").order_by("number");
        assert_eq!(
            asc.filter_expression().as_deref(),
            Some("active=true^ORDERBYnumber")
        );

        let desc = QueryDescriptor::new("incident")
            .query("active=true")
            .order_by("-sys_updated_on");
        assert_eq!(
            desc.filter_expression().as_deref(),
            Some("active=true^ORDERBYsys_updated_on^ORDERBYDESC")
        );

        let bare = QueryDescriptor::new("syslog").order_by("-sys_created_on");
        assert_eq!(
            bare.filter_expression().as_deref(),
            Some("ORDERBYsys_created_on^ORDERBYDESC")
        );
    }

    #[test]
    fn test_params_are_separate() {
        let params = QueryDescriptor::new("incident")
            .query("priority=1")
            .fields(["sys_id", "number"])
            .limit(5)
            .offset(20)
            .to_params(MAX_QUERY_LIMIT);

        assert_eq!(param(&params, "sysparm_query"), Some("priority=1"));
        assert_eq!(param(&params, "sysparm_fields"), Some("sys_id,number"));
        assert_eq!(param(&params, "sysparm_limit"), Some("5"));
        assert_eq!(param(&params, "sysparm_offset"), Some("20"));
    }

    #[test]
    fn test_empty_query_is_omitted() {
        let params = QueryDescriptor::new("incident").query("").to_params(MAX_QUERY_LIMIT);
        assert_eq!(param(&params, "sysparm_query"), None);
        assert_eq!(param(&params, "sysparm_limit"), Some("10"));
    }

    #[test]
    fn test_query_string_round_trip() {
        let original = QueryDescriptor::new("change_request")
            .query("state=-5^priority<=2")
            .fields(["sys_id", "number", "short_description"])
            .limit(50)
            .offset(100);

        let qs = original.to_query_string(MAX_QUERY_LIMIT);
        let parsed = QueryDescriptor::from_query_string("change_request", &qs);

        assert_eq!(parsed, original);
    }

    #[test]
    fn test_encoded_query_builder() {
        let query = EncodedQuery::from_raw("active=true")
            .and("state!=3")
            .and_opt(None::<String>)
            .and_opt(Some("assigned_to.user_name=beth.anglin"))
            .build();
        assert_eq!(query, "active=true^state!=3^assigned_to.user_name=beth.anglin");

        let alternatives = EncodedQuery::new()
            .or(["email=a@b.com", "user_name=a@b.com"])
            .build();
        assert_eq!(alternatives, "email=a@b.com^ORuser_name=a@b.com");

        assert!(EncodedQuery::from_raw("").build_opt().is_none());
    }
}
