use crate::error::{DatabaseError, DatabaseResult, ParameterValue};

/// Validated `limit`/`offset` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    /// `None` means unbounded.
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Pagination {
    /// Validate raw parameters. Either being negative is an error, checked
    /// `limit` first.
    pub fn new(limit: Option<i64>, offset: i64) -> DatabaseResult<Self> {
        let limit = match limit {
            Some(limit) => Some(
                usize::try_from(limit)
                    .map_err(|_| DatabaseError::pagination("limit", ParameterValue::Known(limit)))?,
            ),
            None => None,
        };
        let offset = usize::try_from(offset)
            .map_err(|_| DatabaseError::pagination("offset", ParameterValue::Known(offset)))?;

        Ok(Self { limit, offset })
    }

    /// Skip `offset` items, then keep at most `limit`.
    pub fn apply<I: Iterator>(&self, items: I) -> impl Iterator<Item = I::Item> {
        items.skip(self.offset).take(self.limit.unwrap_or(usize::MAX))
    }

    /// Number of items a collection of `total` yields.
    pub fn expected_len(&self, total: usize) -> usize {
        let remaining = total.saturating_sub(self.offset);
        self.limit.map_or(remaining, |limit| limit.min(remaining))
    }
}
