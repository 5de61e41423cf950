//! Page-number pagination with absolute next/previous links

use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri},
    http::{header, request::Parts},
};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::{IntoParams, ToSchema};

use super::error::ApiError;
use crate::domain::{DomainError, PageRequest, Paginated};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number
    pub page: Option<String>,
    /// Results per page (max 100)
    pub page_size: Option<String>,
}

impl PageParams {
    pub fn to_request(&self) -> Result<PageRequest, DomainError> {
        let page = match self.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(value) => match value.parse::<u64>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(DomainError::InvalidPage),
            },
        };
        let page_size = self
            .page_size
            .as_deref()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(PageRequest::DEFAULT_PAGE_SIZE);

        Ok(PageRequest::new(page, page_size))
    }
}

/// Absolute URL of the current request, used to build page links
#[derive(Debug, Clone)]
pub struct RequestUrl(pub Url);

#[async_trait]
impl<S> FromRequestParts<S> for RequestUrl
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("http");
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let url = Url::parse(&format!("{}://{}{}", scheme, host, path_and_query))
            .map_err(|e| ApiError::BadRequest(format!("Invalid request URL: {}", e)))?;
        Ok(RequestUrl(url))
    }
}

impl RequestUrl {
    /// Same URL with the `page` parameter replaced. Page 1 drops it.
    fn with_page(&self, page: u64) -> String {
        let mut url = self.0.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "page")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() && page == 1 {
            url.set_query(None);
        } else {
            let mut pairs = url.query_pairs_mut();
            pairs.clear().extend_pairs(kept.iter());
            if page > 1 {
                pairs.append_pair("page", &page.to_string());
            }
        }
        url.to_string()
    }
}

/// Paginated list envelope
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[aliases(
    AuthorPage = Page<crate::domain::Author>,
    CategoryPage = Page<crate::domain::Category>,
    PublisherPage = Page<crate::domain::Publisher>,
    BookPage = Page<crate::domain::BookSummary>,
    ReviewPage = Page<crate::domain::Review>
)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wrap a repository page. Pages past the end are an error, an empty
    /// first page is not.
    pub fn build(
        url: &RequestUrl,
        request: PageRequest,
        result: Paginated<T>,
    ) -> Result<Self, DomainError> {
        let last_page = result.total.div_ceil(request.page_size).max(1);
        if request.page > last_page {
            return Err(DomainError::InvalidPage);
        }

        Ok(Page {
            count: result.total,
            next: (request.page < last_page).then(|| url.with_page(request.page + 1)),
            previous: (request.page > 1).then(|| url.with_page(request.page - 1)),
            results: result.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> RequestUrl {
        RequestUrl(Url::parse(raw).unwrap())
    }

    fn paginated(total: u64) -> Paginated<u32> {
        Paginated {
            items: vec![1, 2],
            total,
        }
    }

    #[test]
    fn page_params_default_and_clamp() {
        let params = PageParams::default();
        assert_eq!(params.to_request().unwrap(), PageRequest::new(1, 10));

        let params = PageParams {
            page: Some("3".into()),
            page_size: Some("500".into()),
        };
        assert_eq!(params.to_request().unwrap(), PageRequest::new(3, 100));
    }

    #[test]
    fn garbage_page_is_invalid() {
        for raw in ["0", "abc", "-1"] {
            let params = PageParams {
                page: Some(raw.into()),
                page_size: None,
            };
            assert!(matches!(params.to_request(), Err(DomainError::InvalidPage)));
        }
    }

    #[test]
    fn links_keep_other_parameters() {
        let current = url("http://api.test/api/books/?search=rust&page=2");
        let page = Page::build(&current, PageRequest::new(2, 2), paginated(6)).unwrap();

        assert_eq!(page.count, 6);
        assert_eq!(
            page.next.as_deref(),
            Some("http://api.test/api/books/?search=rust&page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("http://api.test/api/books/?search=rust")
        );
    }

    #[test]
    fn out_of_range_page_is_rejected() {
        let current = url("http://api.test/api/books/?page=4");
        let result = Page::build(&current, PageRequest::new(4, 2), paginated(6));
        assert!(matches!(result, Err(DomainError::InvalidPage)));

        let empty = Paginated::<u32> {
            items: vec![],
            total: 0,
        };
        let empty = Page::build(&url("http://api.test/api/books/"), PageRequest::default(), empty)
            .unwrap();
        assert!(empty.next.is_none() && empty.previous.is_none());
    }
}
