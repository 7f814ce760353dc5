//! Page arithmetic and page-link generation.
//!
//! Page numbers usually come from query strings, so out-of-range input is
//! clamped rather than rejected.

use crate::html_escape;
use crate::value::Value;
use indexmap::IndexMap;

/// Placeholder replaced by the page number in page URLs.
pub const PAGE_PLACEHOLDER: &str = "[PAGE]";

/// Result of [`paginate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub take: usize,
    pub total_pages: usize,
    pub current_page: usize,
}

/// Compute the window of items for `current_page`.
///
/// `page_size <= 0` disables pagination: everything on a single page.
pub fn paginate(total: i64, page_size: i64, current_page: i64) -> Page {
    let total = usize::try_from(total).unwrap_or(0);

    let Ok(page_size) = usize::try_from(page_size) else {
        return single_page(total);
    };
    if page_size == 0 {
        return single_page(total);
    }

    let total_pages = (total + page_size - 1) / page_size;
    let last = total_pages.max(1) as i64;
    let current_page = current_page.clamp(1, last) as usize;

    let skip = (current_page - 1) * page_size;
    let take = page_size.min(total.saturating_sub(skip));

    Page {
        skip,
        take,
        total_pages,
        current_page,
    }
}

fn single_page(total: usize) -> Page {
    Page {
        skip: 0,
        take: total,
        total_pages: 1,
        current_page: 1,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub num: usize,
    pub url: String,
    pub current: bool,
}

impl PageLink {
    pub fn to_value(&self) -> Value {
        let mut obj = IndexMap::new();
        obj.insert("num".to_string(), Value::from(self.num));
        obj.insert("url".to_string(), Value::String(self.url.clone()));
        obj.insert("current".to_string(), Value::Bool(self.current));
        Value::Object(obj)
    }
}

pub fn page_url(pattern: &str, num: usize) -> String {
    pattern.replace(PAGE_PLACEHOLDER, &num.to_string())
}

/// Links for a window of at most `size` pages around the current one
/// (`size == 0` lists every page).
pub fn page_links(page: &Page, url_pattern: &str, size: usize) -> Vec<PageLink> {
    let total = page.total_pages.max(1);
    let (start, end) = if size == 0 || size >= total {
        (1, total)
    } else {
        let ideal = page.current_page.saturating_sub(size / 2).max(1);
        let start = ideal.min(total + 1 - size);
        (start, start + size - 1)
    };

    (start..=end)
        .map(|num| PageLink {
            num,
            url: page_url(url_pattern, num),
            current: num == page.current_page,
        })
        .collect()
}

/// `<ul class="pagination">` markup with previous/next arrows.
/// Empty when there is at most one page.
pub fn render_page_list(page: &Page, url_pattern: &str, size: usize) -> String {
    if page.total_pages <= 1 {
        return String::new();
    }

    let link = |num: usize| html_escape::escape(&page_url(url_pattern, num));
    let mut out = String::from("<ul class=\"pagination\">");

    if page.current_page > 1 {
        out.push_str(&format!(
            "<li class=\"prev\"><a href=\"{}\">&laquo;</a></li>",
            link(page.current_page - 1)
        ));
    }
    for entry in page_links(page, url_pattern, size) {
        if entry.current {
            out.push_str(&format!("<li class=\"active\"><span>{}</span></li>", entry.num));
        } else {
            out.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>",
                html_escape::escape(&entry.url),
                entry.num
            ));
        }
    }
    if page.current_page < page.total_pages {
        out.push_str(&format!(
            "<li class=\"next\"><a href=\"{}\">&raquo;</a></li>",
            link(page.current_page + 1)
        ));
    }

    out.push_str("</ul>");
    out
}
