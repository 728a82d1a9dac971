// 🔎 Query parameters - keyword filters and pagination of lists

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};

// ============================================================================
// FILTER KEYWORDS
// ============================================================================

/// Keywords of the `filter` parameter, split on spaces.
///
/// An expenditure matches when its description contains every keyword,
/// ignoring case.
pub fn filter_keywords(filter: Option<&str>) -> Vec<String> {
    filter
        .unwrap_or_default()
        .split(' ')
        .filter(|kw| !kw.is_empty())
        .map(str::to_string)
        .collect()
}

/// Human readable summary: "keyword X" or "keywords A, B and C"
pub fn describe_keywords(keywords: &[String]) -> Option<String> {
    match keywords {
        [] => None,
        [only] => Some(format!("keyword {}", only)),
        [others @ .., last] => Some(format!("keywords {} and {}", others.join(", "), last)),
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

/// Raw list parameters as received in a query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub paginate_by: Option<String>,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Number(usize),
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: PageNumber,
    pub per_page: usize,
}

impl PageRequest {
    /// Unparseable or non-positive `paginate_by` values fall back to
    /// `default_per_page`; a malformed page number is an error.
    pub fn from_params(
        page: Option<&str>,
        paginate_by: Option<&str>,
        default_per_page: usize,
    ) -> Result<Self> {
        let per_page = paginate_by
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(default_per_page);

        let number = match page.map(str::trim) {
            None | Some("") => PageNumber::Number(1),
            Some("last") => PageNumber::Last,
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n > 0 => PageNumber::Number(n),
                _ => return Err(TrackerError::NotFound("Page")),
            },
        };

        Ok(PageRequest { number, per_page })
    }

    pub fn first(per_page: usize) -> Self {
        PageRequest {
            number: PageNumber::Number(1),
            per_page,
        }
    }

    /// Resolve against the total number of items.
    ///
    /// Page 1 always exists, even for an empty list.
    pub fn resolve(&self, total: usize) -> Result<PageInfo> {
        let num_pages = if total == 0 {
            1
        } else {
            total.div_ceil(self.per_page)
        };

        let number = match self.number {
            PageNumber::Last => num_pages,
            PageNumber::Number(n) if n <= num_pages => n,
            PageNumber::Number(_) => return Err(TrackerError::NotFound("Page")),
        };

        Ok(PageInfo {
            number,
            per_page: self.per_page,
            num_pages,
            total,
            has_previous: number > 1,
            has_next: number < num_pages,
        })
    }
}

/// Position of a page inside a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub number: usize,
    pub per_page: usize,
    pub num_pages: usize,
    pub total: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageInfo {
    pub fn offset(&self) -> usize {
        (self.number - 1) * self.per_page
    }
}

/// One page of items
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(flatten)]
    pub info: PageInfo,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            info: self.info,
        }
    }
}

/// Count, resolve the requested page, then fetch it
pub fn paginate<T, C, F>(request: &PageRequest, count: C, fetch: F) -> Result<Page<T>>
where
    C: FnOnce() -> Result<usize>,
    F: FnOnce(usize, usize) -> Result<Vec<T>>,
{
    let info = request.resolve(count()?)?;
    let items = fetch(info.per_page, info.offset())?;
    Ok(Page { items, info })
}
