//! Cursor and row state for a single render.

/// Mutable layout state threaded through every dispatched operation.
///
/// A fresh value is created per render and dropped afterwards. Row-scoped
/// fields are reset by [`LayoutState::begin_row`]; page anchors are reset
/// by [`LayoutState::begin_page`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutState {
    /// 1-based page number as last reported by the surface.
    pub page: usize,
    /// Set when a page starts; cleared once a cell has been drawn on it.
    pub new_page: bool,

    /// Cursor snapshot taken before each operation.
    pub current_x: f64,
    pub current_y: f64,
    /// Top of the row currently being drawn.
    pub current_row_y: f64,
    /// Lowest y reached by any cell of the current row.
    pub next_y: f64,
    /// Y set by the last `updatey`.
    pub manual_y: f64,
    /// Top offset used by `setinity`.
    pub init_y: f64,

    /// Pre-measured height of the current row.
    pub row_height: f64,
    /// Pre-measured wrapped line count of the tallest cell in the row.
    pub row_cells: usize,

    pub table_index: usize,
    pub row_index: usize,
    /// Positional cell consumed by the next untargeted cell operation.
    pub cell_index: usize,
    /// Cell position the pre-pass is measuring.
    pub cell_pre_index: usize,
    /// Which row template the table body uses next.
    pub template_index: usize,
    /// Position of the operation being run within the row template.
    pub template_op: Option<usize>,
    /// Template operations the pre-pass enabled for this row, by position.
    pub measured_ops: Vec<bool>,

    /// Source of unique ids for embedded cell images.
    pub media_index: usize,
}

impl LayoutState {
    pub fn new(init_y: Option<f64>) -> Self {
        Self {
            init_y: init_y.unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Reset the row-scoped counters before the pre-pass of row `index`.
    pub fn begin_row(&mut self, index: usize, template_len: usize) {
        self.row_index = index;
        self.row_height = 0.0;
        self.row_cells = 0;
        self.cell_index = 0;
        self.cell_pre_index = 0;
        self.template_op = None;
        self.measured_ops.clear();
        self.measured_ops.resize(template_len, false);
    }

    /// Fold the row's lowest point into the running y and anchor the next
    /// row at the cursor.
    pub fn end_row(&mut self, cursor_y: f64) {
        if self.next_y > self.current_y {
            self.current_y = self.next_y;
        }
        self.current_row_y = cursor_y;
        self.template_op = None;
    }

    /// A page was started and its header has run; `y` is where content
    /// begins.
    pub fn begin_page(&mut self, page: usize, y: f64) {
        self.page = page;
        self.new_page = true;
        self.current_y = y;
        self.current_row_y = y;
        self.next_y = y;
    }

    /// Record the cursor after a cell was drawn.
    pub fn reach(&mut self, y: f64) {
        if y > self.next_y {
            self.next_y = y;
        }
        self.new_page = false;
    }

    /// Mark the running template operation as measured by the pre-pass.
    pub fn mark_measured(&mut self) {
        if let Some(slot) = self.template_op.and_then(|op| self.measured_ops.get_mut(op)) {
            *slot = true;
        }
    }

    /// Was the running template operation disabled by the pre-pass?
    /// Operations outside a row template never are.
    pub fn is_disabled(&self) -> bool {
        match self.template_op {
            Some(op) => !self.measured_ops.get(op).copied().unwrap_or(false),
            None => false,
        }
    }

    /// Next unique id for an embedded cell image.
    pub fn next_media_name(&mut self) -> String {
        let name = format!("media{}", self.media_index);
        self.media_index += 1;
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_row_resets_row_counters_only() {
        let mut state = LayoutState::new(Some(30.0));
        state.row_height = 12.0;
        state.row_cells = 3;
        state.cell_index = 2;
        state.media_index = 4;
        state.template_index = 1;
        state.begin_row(5, 2);

        assert_eq!(state.row_index, 5);
        assert_eq!(state.row_height, 0.0);
        assert_eq!(state.row_cells, 0);
        assert_eq!(state.cell_index, 0);
        assert_eq!(state.measured_ops, vec![false, false]);
        assert_eq!(state.media_index, 4);
        assert_eq!(state.template_index, 1);
        assert_eq!(state.init_y, 30.0);
    }

    #[test]
    fn end_row_carries_the_tallest_cell() {
        let mut state = LayoutState::new(None);
        state.current_y = 20.0;
        state.reach(42.0);
        state.reach(35.0);
        state.end_row(42.0);
        assert_eq!(state.current_y, 42.0);
        assert_eq!(state.current_row_y, 42.0);
    }

    #[test]
    fn new_page_suppresses_carry_over() {
        let mut state = LayoutState::new(None);
        state.reach(250.0);
        state.begin_page(2, 10.0);
        assert!(state.new_page);
        assert_eq!(state.next_y, 10.0);

        state.end_row(10.0);
        assert_eq!(state.current_y, 10.0);

        state.reach(18.0);
        assert!(!state.new_page);
    }

    #[test]
    fn disabled_operations_are_tracked_per_template_position() {
        let mut state = LayoutState::new(None);
        state.begin_row(0, 3);
        state.template_op = Some(1);
        state.mark_measured();

        state.template_op = Some(0);
        assert!(state.is_disabled());
        state.template_op = Some(1);
        assert!(!state.is_disabled());
        state.template_op = None;
        assert!(!state.is_disabled());
    }

    #[test]
    fn media_names_are_unique() {
        let mut state = LayoutState::default();
        assert_eq!(state.next_media_name(), "media0");
        assert_eq!(state.next_media_name(), "media1");
    }
}
