use txwatch_api::{
    MAX_PAGE_SIZE, PageSize, QueryParams, SearchQuery, SortOrder, TermFilter, TIMESTAMP_FIELD,
    TxError,
};

/// Fixed engine policy: most recent records first.
pub const SORT_ORDER: SortOrder = SortOrder::Desc;

/// Source field matched by the `order_id` filter.
pub const ORDER_ID_FIELD: &str = "order_id";
/// Source field matched by the `customer_id` filter.
pub const CUSTOMER_ID_FIELD: &str = "customer_id";

/// Текущее время как UTC ISO-8601 фиксированной ширины, например
/// `2024-09-03T05:03:52.123Z`. Лексикографический порядок = временной.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Translate request parameters into a structured search query.
///
/// `now` is the upper time bound used when `params.until` is absent.
/// Pure construction: nothing is executed here.
pub fn build_query(params: &QueryParams, now: &str) -> Result<SearchQuery, TxError> {
    if params.index.trim().is_empty() {
        return Err(TxError::InvalidArgument("index is required".into()));
    }
    if params.page < 1 {
        return Err(TxError::InvalidArgument(format!(
            "page must be >= 1, got {}",
            params.page
        )));
    }

    let size = match params.size {
        PageSize::All => MAX_PAGE_SIZE,
        PageSize::Limited(n) if n < 1 => {
            return Err(TxError::InvalidArgument(format!("size must be >= 1, got {n}")));
        }
        PageSize::Limited(n) if n > MAX_PAGE_SIZE => {
            return Err(TxError::InvalidArgument(format!(
                "size must be <= {MAX_PAGE_SIZE}, got {n}"
            )));
        }
        PageSize::Limited(n) => n,
    };

    // Здесь page >= 1 и size >= 1.
    let from = (params.page - 1)
        .checked_mul(size)
        .ok_or_else(|| TxError::InvalidArgument(format!("page {} is out of range", params.page)))?;
    // Окно from+size не может выйти за MAX_PAGE_SIZE (max_result_window в ES).
    if from > MAX_PAGE_SIZE - size {
        return Err(TxError::InvalidArgument(format!(
            "page {} of size {size} reaches past record {MAX_PAGE_SIZE}",
            params.page
        )));
    }

    let mut filters = Vec::new();
    if let Some(order_id) = non_empty(&params.order_id) {
        filters.push(TermFilter {
            field: ORDER_ID_FIELD.to_string(),
            value: order_id.to_string(),
        });
    }
    if let Some(customer_id) = non_empty(&params.customer_id) {
        filters.push(TermFilter {
            field: CUSTOMER_ID_FIELD.to_string(),
            value: customer_id.to_string(),
        });
    }

    let until = non_empty(&params.until).unwrap_or(now).to_string();

    Ok(SearchQuery {
        timestamp_field: TIMESTAMP_FIELD.to_string(),
        until,
        filters,
        sort: SORT_ORDER,
        from: from as u64,
        size: size as u64,
    })
}

/// HTTP слой присылает пустую строку вместо "без фильтра".
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2024-09-03T05:03:52.000Z";

    #[test]
    fn offset_is_page_minus_one_times_size() {
        for page in 1..=20 {
            for size in [1_i64, 2, 5, 10, 50, 100, 500] {
                let params = QueryParams::new("txn").page(page).size(PageSize::Limited(size));
                let q = build_query(&params, NOW).unwrap();
                assert_eq!(q.from, ((page - 1) * size) as u64);
                assert_eq!(q.size, size as u64);
            }
        }
    }

    #[test]
    fn window_past_the_result_limit_is_invalid() {
        let last = QueryParams::new("txn").page(2).size(PageSize::Limited(5_000));
        let q = build_query(&last, NOW).unwrap();
        assert_eq!(q.from + q.size, MAX_PAGE_SIZE as u64);

        let second_all = QueryParams::new("txn").page(2).size(PageSize::All);
        assert!(matches!(build_query(&second_all, NOW), Err(TxError::InvalidArgument(_))));

        let deep = QueryParams::new("txn").page(1_001).size(PageSize::Limited(10));
        assert!(matches!(build_query(&deep, NOW), Err(TxError::InvalidArgument(_))));
    }

    #[test]
    fn rejects_page_and_size_below_one() {
        let bad_page = QueryParams::new("txn").page(0);
        assert!(matches!(build_query(&bad_page, NOW), Err(TxError::InvalidArgument(_))));

        let negative_page = QueryParams::new("txn").page(-4);
        assert!(matches!(build_query(&negative_page, NOW), Err(TxError::InvalidArgument(_))));

        let bad_size = QueryParams::new("txn").size(PageSize::Limited(0));
        assert!(matches!(build_query(&bad_size, NOW), Err(TxError::InvalidArgument(_))));

        let too_big = QueryParams::new("txn").size(PageSize::Limited(MAX_PAGE_SIZE + 1));
        assert!(matches!(build_query(&too_big, NOW), Err(TxError::InvalidArgument(_))));
    }

    #[test]
    fn huge_page_is_rejected_not_wrapped() {
        let params = QueryParams::new("txn").page(i64::MAX).size(PageSize::All);
        assert!(matches!(build_query(&params, NOW), Err(TxError::InvalidArgument(_))));
    }

    #[test]
    fn all_resolves_to_bounded_size() {
        let q = build_query(&QueryParams::new("txn").size(PageSize::All), NOW).unwrap();
        assert_eq!(q.size, MAX_PAGE_SIZE as u64);
        assert_eq!(q.from, 0);
    }

    #[test]
    fn upper_bound_defaults_to_now() {
        let q = build_query(&QueryParams::new("txn"), NOW).unwrap();
        assert_eq!(q.until, NOW);
        assert_eq!(q.timestamp_field, "@timestamp");
        assert_eq!(q.sort, SortOrder::Desc);

        let q = build_query(&QueryParams::new("txn").until("2024-01-01T00:00:00Z"), NOW).unwrap();
        assert_eq!(q.until, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn both_filters_are_combined() {
        let params = QueryParams::new("txn").order_id("o-1").customer_id("c-9");
        let q = build_query(&params, NOW).unwrap();
        assert_eq!(
            q.filters,
            vec![
                TermFilter {
                    field: "order_id".into(),
                    value: "o-1".into()
                },
                TermFilter {
                    field: "customer_id".into(),
                    value: "c-9".into()
                },
            ]
        );
    }

    #[test]
    fn blank_filters_are_ignored() {
        let params = QueryParams::new("txn").order_id("  ").customer_id("");
        let q = build_query(&params, NOW).unwrap();
        assert!(q.filters.is_empty());
    }

    #[test]
    fn missing_index_is_invalid() {
        assert!(matches!(
            build_query(&QueryParams::new(" "), NOW),
            Err(TxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn now_iso_is_fixed_width_utc() {
        let ts = now_iso();
        assert_eq!(ts.len(), "2024-09-03T05:03:52.123Z".len());
        assert!(ts.ends_with('Z'));
    }
}
