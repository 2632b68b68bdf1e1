//! Filter, sort and pagination selections for one dashboard session.
//!
//! Fields are private; every change goes through a named setter so that any
//! change to a filter or the sort sends the user back to the first page.

use std::collections::BTreeSet;

use shared::domain::{SortBy, SortOrder};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    search_query: Option<String>,
    customer_regions: Option<BTreeSet<String>>,
    genders: Option<BTreeSet<String>>,
    product_categories: Option<BTreeSet<String>>,
    tags: Option<BTreeSet<String>>,
    payment_methods: Option<BTreeSet<String>>,
    age_min: Option<i64>,
    age_max: Option<i64>,
    date_start: Option<String>,
    date_end: Option<String>,
    sort_by: SortBy,
    sort_order: SortOrder,
    page: u32,
    page_size: u32,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

fn non_empty_text(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

fn non_empty_set<I, S>(values: I) -> Option<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set = values.into_iter().map(Into::into).collect::<BTreeSet<_>>();
    (!set.is_empty()).then_some(set)
}

impl QueryState {
    /// Default state with a product-specific page size. The page size has
    /// no setter and survives [`QueryState::reset`].
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            search_query: None,
            customer_regions: None,
            genders: None,
            product_categories: None,
            tags: None,
            payment_methods: None,
            age_min: None,
            age_max: None,
            date_start: None,
            date_end: None,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn search_query(&self) -> Option<&str> {
        self.search_query.as_deref()
    }

    pub fn customer_regions(&self) -> Option<&BTreeSet<String>> {
        self.customer_regions.as_ref()
    }

    pub fn genders(&self) -> Option<&BTreeSet<String>> {
        self.genders.as_ref()
    }

    pub fn product_categories(&self) -> Option<&BTreeSet<String>> {
        self.product_categories.as_ref()
    }

    pub fn tags(&self) -> Option<&BTreeSet<String>> {
        self.tags.as_ref()
    }

    pub fn payment_methods(&self) -> Option<&BTreeSet<String>> {
        self.payment_methods.as_ref()
    }

    pub fn age_min(&self) -> Option<i64> {
        self.age_min
    }

    pub fn age_max(&self) -> Option<i64> {
        self.age_max
    }

    pub fn date_start(&self) -> Option<&str> {
        self.date_start.as_deref()
    }

    pub fn date_end(&self) -> Option<&str> {
        self.date_end.as_deref()
    }

    pub fn sort_by(&self) -> SortBy {
        self.sort_by
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// True when search text or any filter is set. Sort and page are ignored.
    pub fn has_active_filters(&self) -> bool {
        self.search_query.is_some()
            || self.customer_regions.is_some()
            || self.genders.is_some()
            || self.product_categories.is_some()
            || self.tags.is_some()
            || self.payment_methods.is_some()
            || self.age_min.is_some()
            || self.age_max.is_some()
            || self.date_start.is_some()
            || self.date_end.is_some()
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = non_empty_text(Some(query.into()));
        self.page = 1;
    }

    pub fn set_customer_regions<I, S>(&mut self, regions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.customer_regions = non_empty_set(regions);
        self.page = 1;
    }

    pub fn set_genders<I, S>(&mut self, genders: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genders = non_empty_set(genders);
        self.page = 1;
    }

    pub fn set_product_categories<I, S>(&mut self, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.product_categories = non_empty_set(categories);
        self.page = 1;
    }

    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = non_empty_set(tags);
        self.page = 1;
    }

    pub fn set_payment_methods<I, S>(&mut self, methods: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payment_methods = non_empty_set(methods);
        self.page = 1;
    }

    /// Bounds are stored as given; `min > max` is left for the backend.
    pub fn set_age_range(&mut self, min: Option<i64>, max: Option<i64>) {
        self.age_min = min;
        self.age_max = max;
        self.page = 1;
    }

    /// Dates are ISO `YYYY-MM-DD` strings and are not parsed here.
    pub fn set_date_range(&mut self, start: Option<String>, end: Option<String>) {
        self.date_start = non_empty_text(start);
        self.date_end = non_empty_text(end);
        self.page = 1;
    }

    pub fn set_sorting(&mut self, sort_by: SortBy, sort_order: SortOrder) {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn reset(&mut self) {
        *self = Self::with_page_size(self.page_size);
    }
}

#[cfg(test)]
#[path = "tests/query_state_tests.rs"]
mod tests;
