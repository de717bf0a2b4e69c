use serde::Serialize;

/// Pages shown on each side of the current page when there is room.
pub const WINDOW_RADIUS: usize = 3;

/// Inclusive range of page numbers to render in the navigation bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub first: usize,
    pub last: usize,
}

impl PageWindow {
    /// Window of up to `2 * WINDOW_RADIUS + 1` pages around `page`, shifted
    /// right near the first page and left near the last page so it keeps its
    /// width whenever there are enough pages.
    ///
    /// A page past the end gets the same window as the last page.
    pub fn compute(total_hits: usize, page: usize, page_size: usize) -> Self {
        let total_pages = total_pages(total_hits, page_size);
        let page = page.clamp(1, total_pages);
        let r = WINDOW_RADIUS;

        let mut first = page.saturating_sub(r).max(1);
        let mut last = page.saturating_add(r).min(total_pages);
        if page <= r {
            last = (last + r + 1 - page).min(total_pages);
        }
        let right = total_pages - page;
        if right <= r {
            first = (first + right).saturating_sub(r).max(1);
        }

        Self {
            first,
            last: last.max(first),
        }
    }

    pub fn pages(&self) -> Vec<usize> {
        (self.first..=self.last).collect()
    }
}

/// Number of result pages; at least one even for an empty result.
pub fn total_pages(total_hits: usize, page_size: usize) -> usize {
    total_hits.div_ceil(page_size.max(1)).max(1)
}

/// Page numbers to show for `page` (1-based), ascending and contiguous.
pub fn page_window(total_hits: usize, page: usize, page_size: usize) -> Vec<usize> {
    PageWindow::compute(total_hits, page, page_size).pages()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_page_extends_right() {
        assert_eq!(page_window(95, 1, 10), (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn last_page_extends_left() {
        assert_eq!(page_window(95, 10, 10), (4..=10).collect::<Vec<_>>());
    }

    #[test]
    fn middle_page_is_centered() {
        assert_eq!(page_window(95, 5, 10), (2..=8).collect::<Vec<_>>());
    }

    #[test]
    fn no_hits_still_shows_one_page() {
        assert_eq!(page_window(0, 1, 10), vec![1]);
    }

    #[test]
    fn few_pages_show_all() {
        assert_eq!(page_window(25, 2, 10), vec![1, 2, 3]);
    }

    #[test]
    fn exact_multiple_has_no_extra_page() {
        assert_eq!(total_pages(100, 10), 10);
        assert_eq!(total_pages(101, 10), 11);
    }

    #[test]
    fn page_past_the_end_shows_last_window() {
        assert_eq!(page_window(95, 11, 10), (4..=10).collect::<Vec<_>>());
        assert_eq!(page_window(95, 1_000, 10), (4..=10).collect::<Vec<_>>());
        assert_eq!(page_window(95, i64::MAX as usize, 10), (4..=10).collect::<Vec<_>>());
        assert_eq!(page_window(95, usize::MAX, 10), (4..=10).collect::<Vec<_>>());
        assert_eq!(page_window(0, usize::MAX, 10), vec![1]);
    }

    #[test]
    fn zero_page_and_page_size_are_clamped() {
        assert_eq!(page_window(30, 0, 10), vec![1, 2, 3]);
        assert_eq!(page_window(3, 1, 0), vec![1, 2, 3]);
    }

    proptest! {
        #[test]
        fn window_is_contiguous_and_sized(
            total_hits in 0usize..5_000,
            page_size in 1usize..50,
            page_offset in 0usize..200,
        ) {
            let pages = total_pages(total_hits, page_size);
            let page = 1 + page_offset % pages;
            let window = page_window(total_hits, page, page_size);
            prop_assert!(window.contains(&page));
            prop_assert_eq!(window.len(), pages.min(2 * WINDOW_RADIUS + 1));
            prop_assert!(window.windows(2).all(|w| w[1] == w[0] + 1));
            prop_assert!(*window.first().unwrap() >= 1);
            prop_assert!(*window.last().unwrap() <= pages);
        }
    }
}
