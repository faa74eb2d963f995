//! # Pagination Module
//!
//! A `Pagination` value that deserializes from query parameters
//! (`?page=1&limit=20`) and turns into `LIMIT` / `OFFSET` on a query builder.
//!
//! ## Example
//!
//! ```rust,ignore
//! use keel_orm::Pagination;
//!
//! let page = Pagination::new(2, 20).paginate(db.model::<User>().where_map([("age >=", 18)])).await?;
//! println!("{} of {} users, {} pages", page.data.len(), page.total, page.total_pages);
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Record, database::Executor, query_builder::QueryBuilder};

/// Page request. Pages are 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// The page number (0-indexed). Default: 0.
    #[serde(default)]
    pub page: u64,

    /// The number of items per page. Default: 10.
    #[serde(default = "default_limit")]
    pub limit: u64,
}

/// One page of results plus the totals of the whole filtered set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    /// Rows matching the filters, ignoring the page window.
    pub total: i64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: i64,
}

fn default_limit() -> u64 {
    10
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 0, limit: default_limit() }
    }
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }
    }

    /// Sets `limit` and `offset` on `query`.
    pub fn apply<T: Record, E: Executor>(self, query: QueryBuilder<T, E>) -> QueryBuilder<T, E> {
        query.limit(self.limit).offset(self.offset())
    }

    /// Runs a `COUNT(*)` over the builder's filters, then loads the requested page.
    pub async fn paginate<T: Record, E: Executor>(self, mut query: QueryBuilder<T, E>) -> Result<Paginated<T>, Error> {
        let total = query.count_in_place().await?;
        let data = self.apply(query).scan().await?;

        Ok(Paginated { data, total, page: self.page, limit: self.limit, total_pages: self.total_pages(total) })
    }

    fn offset(&self) -> u64 {
        self.page.saturating_mul(self.limit)
    }

    fn total_pages(&self, total: i64) -> i64 {
        if self.limit == 0 || total <= 0 {
            return 0;
        }
        let pages = total.unsigned_abs().div_ceil(self.limit);
        i64::try_from(pages).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_query() {
        let page: Pagination = from_query(&[]);
        assert_eq!(page, Pagination { page: 0, limit: 10 });
    }

    #[test]
    fn test_partial_query() {
        assert_eq!(from_query(&[("page", 4)]), Pagination { page: 4, limit: 10 });
        assert_eq!(from_query(&[("limit", 50)]), Pagination { page: 0, limit: 50 });
    }

    #[test]
    fn test_page_math() {
        let page = Pagination::new(3, 25);
        assert_eq!(page.offset(), 75);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(25), 1);
        assert_eq!(page.total_pages(26), 2);
        assert_eq!(Pagination::new(0, 0).total_pages(10), 0);
        assert_eq!(Pagination::new(0, u64::MAX).total_pages(i64::MAX), 1);
        assert_eq!(Pagination::new(0, 2).total_pages(i64::MAX), i64::MAX / 2 + 1);
    }

    fn from_query(entries: &[(&str, u64)]) -> Pagination {
        use serde::de::value::{Error as ValueError, MapDeserializer};
        let map = MapDeserializer::<_, ValueError>::new(entries.iter().copied());
        Pagination::deserialize(map).unwrap()
    }
}
