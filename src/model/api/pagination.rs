use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

use crate::Config;

const DEFAULT_PAGE_SIZE: u32 = 50;

/// Pagination parameters, taken from the `page_num` (1-based) and
/// `page_size` query parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pagination {
    page_num: u32,
    page_size: u32,
}

impl Pagination {
    /// Validate raw parameters against the maximum page size.
    pub fn new(page_num: u32, page_size: u32, max_page_size: u32) -> Option<Self> {
        if page_num == 0 || page_size == 0 || page_size > max_page_size {
            return None;
        }
        Some(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of items before the start of this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page_num - 1) * u64::from(self.page_size)
    }

    /// Wrap a page of items with the pagination metadata.
    pub fn paginate<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = match req.query_value::<u32>("page_num").unwrap_or(Ok(1)) {
            Ok(page_num) => page_num,
            Err(_) => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        let page_size = match req
            .query_value::<u32>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE))
        {
            Ok(page_size) => page_size,
            Err(_) => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        let max_page_size = req
            .rocket()
            .state::<Config>()
            .map(Config::max_page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        match Self::new(page_num, page_size, max_page_size) {
            Some(pagination) => request::Outcome::Success(pagination),
            None => request::Outcome::Failure((Status::BadRequest, ())),
        }
    }
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}

impl<T> Paginated<T> {
    /// Convert every item on the page.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: u32,
    pub page_size: u32,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert!(Pagination::new(0, 10, 100).is_none());
        assert!(Pagination::new(1, 0, 100).is_none());
        assert!(Pagination::new(1, 101, 100).is_none());
        assert!(Pagination::new(1, 100, 100).is_some());
    }

    #[test]
    fn skip() {
        assert_eq!(Pagination::new(1, 20, 100).unwrap().skip(), 0);
        assert_eq!(Pagination::new(3, 20, 100).unwrap().skip(), 40);
    }
}
