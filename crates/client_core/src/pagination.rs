//! Page navigation derived from backend-reported counters.

const MAX_VISIBLE_PAGES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    Page(u32),
    Gap,
}

/// Numbered links for a pager: every page when there are at most five,
/// otherwise the first page, the current page with its neighbours, and the
/// last page, with gaps in between.
pub fn page_window(page: u32, total_pages: u32) -> Vec<PageLink> {
    if total_pages <= MAX_VISIBLE_PAGES {
        return (1..=total_pages).map(PageLink::Page).collect();
    }

    let mut links = vec![PageLink::Page(1)];
    if page > 3 {
        links.push(PageLink::Gap);
    }
    let start = page.saturating_sub(1).max(2);
    let end = page.saturating_add(1).min(total_pages - 1);
    links.extend((start..=end).map(PageLink::Page));
    if page.saturating_add(2) < total_pages {
        links.push(PageLink::Gap);
    }
    links.push(PageLink::Page(total_pages));
    links
}

/// 1-based bounds of the rows shown on `page`, or `None` for an empty result.
pub fn visible_range(page: u32, page_size: u32, total_count: u64) -> Option<(u64, u64)> {
    if total_count == 0 || page == 0 || page_size == 0 {
        return None;
    }
    let first = u64::from(page - 1) * u64::from(page_size) + 1;
    let last = (u64::from(page) * u64::from(page_size)).min(total_count);
    (first <= last).then_some((first, last))
}
