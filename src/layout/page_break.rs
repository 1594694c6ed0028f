//! # Page Break Decisions
//!
//! A table or form row is measured before anything in it is drawn, and is
//! never split: it is either placed below the cursor or moved whole to the
//! next page.

use crate::surface::Surface;

/// What to do with a measured row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakDecision {
    /// The row fits on the current page.
    Place,
    /// Start a new page before drawing the row.
    MoveToNextPage,
}

/// Decide whether a row of `row_height` starting at `y` fits above
/// `page_bottom`.
///
/// A row that overflows a page it would start at the top of is placed
/// anyway, since a new page would not give it more room.
pub fn decide_row_break(
    y: f64,
    row_height: f64,
    page_bottom: f64,
    fresh_page: bool,
) -> BreakDecision {
    if row_height <= 0.0 || y + row_height <= page_bottom {
        return BreakDecision::Place;
    }
    if fresh_page {
        return BreakDecision::Place;
    }
    BreakDecision::MoveToNextPage
}

/// The lowest y content may reach: the automatic break trigger when
/// automatic breaking is on, otherwise the page height.
pub fn page_bottom(surface: &dyn Surface) -> f64 {
    let (_, height) = surface.page_size();
    match surface.auto_page_break() {
        (true, margin) => height - margin,
        (false, _) => height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfSurface;

    #[test]
    fn row_that_fits_is_placed() {
        assert_eq!(decide_row_break(100.0, 20.0, 277.0, false), BreakDecision::Place);
        assert_eq!(decide_row_break(257.0, 20.0, 277.0, false), BreakDecision::Place);
    }

    #[test]
    fn overflowing_row_moves() {
        assert_eq!(
            decide_row_break(260.0, 20.0, 277.0, false),
            BreakDecision::MoveToNextPage
        );
    }

    #[test]
    fn oversized_row_stays_on_fresh_page() {
        assert_eq!(decide_row_break(10.0, 400.0, 277.0, true), BreakDecision::Place);
    }

    #[test]
    fn empty_row_never_breaks() {
        assert_eq!(decide_row_break(290.0, 0.0, 277.0, false), BreakDecision::Place);
    }

    #[test]
    fn bottom_respects_auto_break_margin() {
        let mut surface = PdfSurface::new();
        surface.set_auto_page_break(true, 15.0);
        assert!((page_bottom(&surface) - (297.0 - 15.0)).abs() < 0.01);
        surface.set_auto_page_break(false, 15.0);
        assert!((page_bottom(&surface) - 297.0).abs() < 0.01);
    }
}
