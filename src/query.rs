//! Paginated/filtered order listing support.
//!
//! Both dashboards build their listing requests here: 1-based UI pages are
//! translated to the backend's 0-based pages, empty filter values are omitted
//! from the request entirely (never sent as wildcards), and multi-field
//! filters combine with AND semantics on the backend.
//!
//! `ResponseParser` keeps the previous page-metadata object and hands it back
//! unchanged (same `Arc`) when nothing moved, so consuming views can skip
//! re-renders on pointer equality.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::PageEnvelope;

/// Free-text filters wait this long after the last keystroke before a
/// request is issued.
pub const FILTER_DEBOUNCE: Duration = Duration::from_millis(300);

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Which listing endpoint to hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    Active,
    Historical,
}

/// User-chosen filter values for an order listing.
///
/// Vendor depends on station: changing the station resets the vendor filter
/// to its unfiltered state, since the vendor choices are scoped to a station.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilters {
    pub station_id: Option<String>,
    pub vendor_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
}

impl OrderFilters {
    /// Select (or clear) the station filter. Resets the dependent vendor
    /// filter to unfiltered.
    pub fn set_station(&mut self, station_id: Option<String>) {
        self.station_id = normalize_text(station_id);
        self.vendor_id = None;
    }

    pub fn set_vendor(&mut self, vendor_id: Option<i64>) {
        self.vendor_id = vendor_id;
    }

    pub fn set_date_range(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.start_date = start;
        self.end_date = end;
    }

    /// Commit a free-text search value. Blank input clears the filter.
    pub fn set_search(&mut self, search: Option<String>) {
        self.search = normalize_text(search);
    }
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Request descriptor
// ---------------------------------------------------------------------------

/// Normalized request descriptor for a listing call.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderListQuery {
    pub scope: OrderScope,
    /// 0-based page index for the backend.
    pub page: u64,
    pub size: u64,
    pub filters: OrderFilters,
}

impl OrderListQuery {
    /// Query-string pairs for the request. Absent filters are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("size", self.size.to_string()),
        ];
        if let Some(ref station) = self.filters.station_id {
            pairs.push(("stationId", station.clone()));
        }
        if let Some(vendor) = self.filters.vendor_id {
            pairs.push(("vendorId", vendor.to_string()));
        }
        if let Some(start) = self.filters.start_date {
            pairs.push(("startDate", start.to_string()));
        }
        if let Some(end) = self.filters.end_date {
            pairs.push(("endDate", end.to_string()));
        }
        if let Some(ref search) = self.filters.search {
            pairs.push(("search", search.clone()));
        }
        pairs
    }
}

/// Build a request descriptor from UI-level inputs.
///
/// `page_number` is 1-based as shown to the user; values below 1 clamp to
/// the first page.
pub fn build_query(
    scope: OrderScope,
    filters: &OrderFilters,
    page_number: u64,
    page_size: u64,
) -> OrderListQuery {
    OrderListQuery {
        scope,
        page: page_number.max(1) - 1,
        size: page_size.max(1),
        filters: filters.clone(),
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// View-model page metadata derived from a backend envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    /// 1-based page number as shown in the UI.
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
    /// 1-based index of the first row on this page, 0 when empty.
    pub from: u64,
    /// 1-based index of the last row on this page, 0 when empty.
    pub to: u64,
}

/// A parsed page: the rows plus reference-stable metadata.
#[derive(Debug, Clone)]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub meta: Arc<PageMeta>,
}

/// Stateful envelope parser. Keeps the last metadata object and returns the
/// same `Arc` while all of its fields are unchanged.
#[derive(Debug, Default)]
pub struct ResponseParser {
    last_meta: Option<Arc<PageMeta>>,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse<T>(&mut self, envelope: PageEnvelope<T>) -> PageView<T> {
        let page_size = envelope.pageable.page_size.max(1);
        let offset = envelope.pageable.offset;
        let (from, to) = if envelope.number_of_elements == 0 {
            (0, 0)
        } else {
            (offset + 1, offset + envelope.number_of_elements)
        };
        let meta = PageMeta {
            current_page: offset / page_size + 1,
            per_page: page_size,
            total: envelope.total_elements,
            last_page: envelope.total_pages,
            from,
            to,
        };

        let meta = match &self.last_meta {
            Some(prev) if **prev == meta => Arc::clone(prev),
            _ => {
                let fresh = Arc::new(meta);
                self.last_meta = Some(Arc::clone(&fresh));
                fresh
            }
        };

        PageView {
            items: envelope.content,
            meta,
        }
    }
}

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

/// Debounce over a stream of committed values.
///
/// Each `submit` stores the value immediately and waits out the quiet
/// window; only the newest submission survives, and it reads the *latest*
/// committed value at fire time rather than the value captured at call time.
#[derive(Debug)]
pub struct Debouncer<T> {
    latest: Arc<Mutex<Option<T>>>,
    generation: Arc<AtomicU64>,
    delay: Duration,
}

impl<T: Clone> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            latest: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            delay,
        }
    }

    /// Commit a value and wait for the quiet window. Returns the committed
    /// value when this submission is still the newest after the window, or
    /// `None` when a later submission superseded it.
    pub async fn submit(&self, value: T) -> Option<T> {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
            *latest = Some(value);
        }

        tokio::time::sleep(self.delay).await;

        if self.generation.load(Ordering::SeqCst) != my_generation {
            return None;
        }
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        latest.clone()
    }
}

impl<T: Clone> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(FILTER_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pageable;

    fn envelope(offset: u64, page_size: u64, rows: u64, total: u64) -> PageEnvelope<u32> {
        PageEnvelope {
            content: (0..rows as u32).collect(),
            pageable: Pageable { offset, page_size },
            number_of_elements: rows,
            total_elements: total,
            total_pages: total.div_ceil(page_size),
        }
    }

    #[test]
    fn test_page_numbers_translate_to_zero_based() {
        let q = build_query(OrderScope::Active, &OrderFilters::default(), 3, 20);
        assert_eq!(q.page, 2);
        assert_eq!(q.size, 20);

        // Page 0 from a buggy caller clamps to the first page.
        let q = build_query(OrderScope::Active, &OrderFilters::default(), 0, 20);
        assert_eq!(q.page, 0);
    }

    #[test]
    fn test_empty_filters_are_omitted() {
        let mut filters = OrderFilters::default();
        filters.set_search(Some("   ".into()));
        let q = build_query(OrderScope::Historical, &filters, 1, 10);
        let pairs = q.query_pairs();
        assert_eq!(
            pairs,
            vec![("page", "0".to_string()), ("size", "10".to_string())]
        );
    }

    #[test]
    fn test_all_filters_present() {
        let mut filters = OrderFilters::default();
        filters.set_station(Some("NDLS".into()));
        filters.set_vendor(Some(4));
        filters.set_date_range(
            NaiveDate::from_ymd_opt(2025, 1, 1),
            NaiveDate::from_ymd_opt(2025, 1, 31),
        );
        filters.set_search(Some("thali".into()));
        let q = build_query(OrderScope::Active, &filters, 2, 25);
        let pairs = q.query_pairs();
        assert!(pairs.contains(&("stationId", "NDLS".into())));
        assert!(pairs.contains(&("vendorId", "4".into())));
        assert!(pairs.contains(&("startDate", "2025-01-01".into())));
        assert!(pairs.contains(&("endDate", "2025-01-31".into())));
        assert!(pairs.contains(&("search", "thali".into())));
        assert!(pairs.contains(&("page", "1".into())));
    }

    #[test]
    fn test_station_change_resets_vendor() {
        let mut filters = OrderFilters::default();
        filters.set_station(Some("NDLS".into()));
        filters.set_vendor(Some(4));
        filters.set_station(Some("BCT".into()));
        assert_eq!(filters.station_id.as_deref(), Some("BCT"));
        assert_eq!(filters.vendor_id, None);
    }

    #[test]
    fn test_page_meta_is_reference_stable() {
        let mut parser = ResponseParser::new();
        let first = parser.parse(envelope(20, 10, 10, 95));
        let second = parser.parse(envelope(20, 10, 10, 95));
        assert!(Arc::ptr_eq(&first.meta, &second.meta));

        // Any field change yields a fresh object.
        let third = parser.parse(envelope(30, 10, 10, 95));
        assert!(!Arc::ptr_eq(&second.meta, &third.meta));
        assert_eq!(third.meta.current_page, 4);
    }

    #[test]
    fn test_page_meta_row_window() {
        let mut parser = ResponseParser::new();
        let view = parser.parse(envelope(20, 10, 7, 27));
        assert_eq!(view.meta.current_page, 3);
        assert_eq!(view.meta.from, 21);
        assert_eq!(view.meta.to, 27);
        assert_eq!(view.meta.total, 27);

        let empty = parser.parse(envelope(0, 10, 0, 0));
        assert_eq!(empty.meta.from, 0);
        assert_eq!(empty.meta.to, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_suppresses_superseded_submissions() {
        let debouncer = Arc::new(Debouncer::<String>::default());

        let d1 = Arc::clone(&debouncer);
        let first = tokio::spawn(async move { d1.submit("th".to_string()).await });
        // Let the first submission register before the second supersedes it.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let d2 = Arc::clone(&debouncer);
        let second = tokio::spawn(async move { d2.submit("thali".to_string()).await });

        assert_eq!(first.await.unwrap(), None);
        assert_eq!(second.await.unwrap(), Some("thali".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_fires_after_quiet_window() {
        let debouncer = Debouncer::<String>::default();
        let fired = debouncer.submit("ndls".to_string()).await;
        assert_eq!(fired, Some("ndls".to_string()));
    }
}
