//! Pagination cursors for list endpoints
//!
//! List endpoints take an `after` XOR `before` cursor (supplying both is
//! a caller error the API would reject anyway) and an optional result
//! limit. The conflict is rejected locally, before any request is built.

use crate::error::{Error, Result};

/// Cursor window for a list request.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub after: Option<String>,
    pub before: Option<String>,
    pub limit: Option<u32>,
}

impl Page {
    /// Items after the given marker (markers come from a previous
    /// response's `paging.cursors`).
    pub fn after(marker: impl Into<String>) -> Self {
        Self {
            after: Some(marker.into()),
            ..Self::default()
        }
    }

    /// Items before the given marker.
    pub fn before(marker: impl Into<String>) -> Self {
        Self {
            before: Some(marker.into()),
            ..Self::default()
        }
    }

    /// Cap the number of items returned.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the query-string suffix (`""` when no parameter is set).
    ///
    /// Fails with a validation error when both cursors are set.
    pub fn query(&self) -> Result<String> {
        if self.after.is_some() && self.before.is_some() {
            return Err(Error::Validation(
                "'after' and 'before' cannot both be specified".into(),
            ));
        }

        let mut params = Vec::new();
        if let Some(after) = &self.after {
            params.push(format!("after={after}"));
        }
        if let Some(before) = &self.before {
            params.push(format!("before={before}"));
        }
        if let Some(limit) = self.limit {
            params.push(format!("limit={limit}"));
        }

        if params.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!("?{}", params.join("&")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_page_renders_no_query() {
        assert_eq!(Page::default().query().unwrap(), "");
    }

    #[test]
    fn single_cursor_renders() {
        assert_eq!(Page::after("abc").query().unwrap(), "?after=abc");
        assert_eq!(Page::before("xyz").query().unwrap(), "?before=xyz");
    }

    #[test]
    fn limit_combines_with_cursor() {
        assert_eq!(
            Page::after("abc").with_limit(25).query().unwrap(),
            "?after=abc&limit=25"
        );
    }

    #[test]
    fn limit_alone_renders() {
        assert_eq!(
            Page::default().with_limit(10).query().unwrap(),
            "?limit=10"
        );
    }

    #[test]
    fn conflicting_cursors_are_rejected() {
        let page = Page {
            after: Some("abc".into()),
            before: Some("xyz".into()),
            limit: None,
        };
        let err = page.query().unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got: {err}");
    }
}
