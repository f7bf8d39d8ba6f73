use orgscan_core::{OrgScanError, QuerySurface, Result};
use serde::{Deserialize, Serialize};

/// One query request against a remote surface.
///
/// Entities that reject the native continuation protocol declare an
/// `ordering_field` instead, switching the executor to windowed custom
/// pagination over that field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub query: String,
    pub surface: QuerySurface,
    /// Server error codes tolerated as "zero rows" instead of failing
    /// the batch.
    pub bypass_error_codes: Vec<String>,
    pub ordering_field: Option<String>,
}

impl QueryDescriptor {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            surface: QuerySurface::Data,
            bypass_error_codes: Vec::new(),
            ordering_field: None,
        }
    }

    pub fn tooling(query: impl Into<String>) -> Self {
        Self {
            surface: QuerySurface::Tooling,
            ..Self::new(query)
        }
    }

    pub fn with_bypass(mut self, codes: &[&str]) -> Self {
        self.bypass_error_codes = codes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_custom_paging(mut self, ordering_field: impl Into<String>) -> Self {
        self.ordering_field = Some(ordering_field.into());
        self
    }

    pub fn bypasses(&self, code: &str) -> bool {
        self.bypass_error_codes.iter().any(|c| c == code)
    }

    /// Rejects descriptors whose ordering field also appears in the
    /// query's GROUP BY clause: ordering by an aggregation key is
    /// ambiguous and would silently miscompute the windowed walk.
    pub fn validate(&self) -> Result<()> {
        let Some(field) = &self.ordering_field else {
            return Ok(());
        };
        let grouped = group_by_fields(&self.query);
        if grouped.iter().any(|g| g.eq_ignore_ascii_case(field)) {
            return Err(OrgScanError::Query {
                query: self.query.clone(),
                code: "AMBIGUOUS_ORDERING".to_string(),
                cause: format!("ordering field {field} is part of the GROUP BY clause"),
            });
        }
        Ok(())
    }
}

/// Field names in the query's GROUP BY clause, if any.
fn group_by_fields(query: &str) -> Vec<String> {
    // Byte offsets into `upper` must map back into `query`, so the
    // uppercase pass has to be length-preserving.
    let upper = query.to_ascii_uppercase();
    let Some(start) = upper.find("GROUP BY") else {
        return Vec::new();
    };
    let after = &query[start + "GROUP BY".len()..];
    let upper_after = &upper[start + "GROUP BY".len()..];

    // The clause runs until the next keyword or the end of the query.
    // Keywords only count on word boundaries, so a field like
    // `RateLimit__c` never ends the clause early.
    let end = ["HAVING", "ORDER BY", "LIMIT", "OFFSET"]
        .iter()
        .filter_map(|kw| keyword_position(upper_after, kw))
        .min()
        .unwrap_or(after.len());

    after[..end]
        .split(',')
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

/// First occurrence of `keyword` in `haystack` delimited by whitespace
/// (or the string ends) on both sides.
fn keyword_position(haystack: &str, keyword: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(rel) = haystack[from..].find(keyword) {
        let at = from + rel;
        let end = at + keyword.len();
        let starts_word = at == 0 || bytes[at - 1].is_ascii_whitespace();
        let ends_word = end == bytes.len() || bytes[end].is_ascii_whitespace();
        if starts_word && ends_word {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_descriptor_validates() {
        let d = QueryDescriptor::new("SELECT Id FROM Account");
        assert!(d.validate().is_ok());
    }

    #[test]
    fn ordering_field_in_group_by_is_rejected() {
        let d = QueryDescriptor::new(
            "SELECT CreatedDate, COUNT(Id) FROM LoginHistory GROUP BY CreatedDate",
        )
        .with_custom_paging("CreatedDate");
        let err = d.validate().unwrap_err();
        assert_eq!(err.code(), "QUERY_ERROR");
    }

    #[test]
    fn ordering_field_outside_group_by_is_allowed() {
        let d = QueryDescriptor::new(
            "SELECT UserId, COUNT(Id) FROM LoginHistory GROUP BY UserId ORDER BY UserId",
        )
        .with_custom_paging("LoginTime");
        assert!(d.validate().is_ok());
    }

    #[test]
    fn group_by_parsing_stops_at_keywords() {
        let fields =
            group_by_fields("SELECT A, B FROM X GROUP BY A, B HAVING COUNT(Id) > 1 LIMIT 10");
        assert_eq!(fields, vec!["A", "B"]);
    }

    #[test]
    fn group_by_fields_may_embed_keywords() {
        let fields = group_by_fields(
            "SELECT RateLimit__c, OffsetKind__c, COUNT(Id) FROM X \
             GROUP BY RateLimit__c, OffsetKind__c LIMIT 5",
        );
        assert_eq!(fields, vec!["RateLimit__c", "OffsetKind__c"]);

        // The conflict check still sees such a field.
        let d = QueryDescriptor::new(
            "SELECT RateLimit__c, COUNT(Id) FROM X GROUP BY RateLimit__c",
        )
        .with_custom_paging("RateLimit__c");
        assert!(d.validate().is_err());
    }

    #[test]
    fn bypass_matching() {
        let d = QueryDescriptor::new("SELECT Id FROM Unsupported")
            .with_bypass(&["INVALID_TYPE", "EXTERNAL_OBJECT_UNSUPPORTED_EXCEPTION"]);
        assert!(d.bypasses("INVALID_TYPE"));
        assert!(!d.bypasses("MALFORMED_QUERY"));
    }
}
