//! # Two-Phase Cell Measurement
//!
//! Wrapping cells in a table or form row must all end up the same height,
//! and the surface can only tell how tall wrapped text is by splitting it.
//! So every row is walked twice: a pre-pass that resolves and splits each
//! cell's text without drawing, then the render pass that draws with the
//! row height and line count the pre-pass found.
//!
//! Both passes pick a cell's content through [`CellRequest`], so the text
//! measured is exactly the text drawn. Resolution order:
//!
//! 1. literal `text` (after any `calculation`)
//! 2. `target` matched by key or path (current row, every table with
//!    `loop`, or the field registry in form mode)
//! 3. `target` naming a global
//! 4. the positional cell (table mode) or the field at the row index
//!    (form mode)
//!
//! In the pre-pass, a targeted operation whose target is neither in the
//! row nor a global is left unmeasured; the render pass then draws only
//! blank padding for it.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::calc::{self, CalcError, Calculation};
use crate::format::FormatSpec;
use crate::instruction::Instruction;
use crate::model::{Cell, RenderData, RenderOptions, Row};
use crate::resolve::Resolver;
use crate::surface::{Align, Border, CellBox, Surface};

use super::state::LayoutState;
use super::Interpreter;

/// Where cell operations look up their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellSource {
    /// Rows of the active table (`multicell`).
    Table,
    /// The field registry (`multicellformfield`).
    Form,
}

/// The parameters of a wrapping cell operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRequest {
    pub attribute: String,
    pub target: String,
    /// Search every table for the target, not just the current row.
    pub search_all_tables: bool,
    pub width: f64,
    /// Height of one wrapped line.
    pub line_height: f64,
    pub border: Border,
    pub align: Align,
    pub fill: bool,
    /// Literal text, also the fallback of a calculation.
    pub text: String,
    pub format: FormatSpec,
    pub calculation: Option<Calculation>,
}

impl CellRequest {
    pub fn read(resolver: &Resolver<'_>, params: &Map<String, Value>) -> Self {
        CellRequest {
            attribute: resolver.string(params, "attribute", ""),
            target: resolver.string(params, "target", ""),
            search_all_tables: resolver.boolean(params, "loop", false),
            width: resolver.float(params, "width", 0.0),
            line_height: resolver.float(params, "height", 0.0),
            border: Border::parse(&resolver.string(params, "border", "")),
            align: Align::parse(&resolver.string(params, "align", "L")),
            fill: resolver.boolean(params, "fill", false),
            text: resolver.string(params, "text", ""),
            format: params
                .get("format")
                .map_or(FormatSpec::None, |f| FormatSpec::from_param(f, resolver.options)),
            calculation: params.get("calculation").and_then(Calculation::from_param),
        }
    }

    /// The literal text, replaced by the calculation result when there is
    /// one. An undefined calculation is an error; the caller falls back to
    /// [`CellRequest::text`].
    pub fn literal(&self, data: &RenderData, state: &LayoutState) -> Result<String, CalcError> {
        let Some(calculation) = &self.calculation else {
            return Ok(self.text.clone());
        };
        match data.tables.get(state.table_index) {
            Some(table) => calc::calculate(calculation, table, state.row_index, &self.text),
            None => Ok(self.text.clone()),
        }
    }

    /// Pick the cell to draw in the render pass.
    pub fn select(
        &self,
        source: CellSource,
        data: &RenderData,
        state: &LayoutState,
        literal: &str,
    ) -> Option<Cell> {
        if !literal.is_empty() {
            return Some(Cell::literal(literal));
        }
        if !self.target.is_empty() {
            return self
                .find_target(source, data, state)
                .or_else(|| global_cell(data, &self.target));
        }
        match source {
            CellSource::Table => current_row(data, state)?.cells.get(state.cell_index).cloned(),
            CellSource::Form => data.fields.get(state.row_index).map(|f| f.to_cell()),
        }
    }

    /// Pick the cell to measure in the pre-pass. `None` leaves the
    /// operation disabled for this pre-pass position. A `loop` target is
    /// looked up across all tables, as in the render pass.
    pub fn pre_select(
        &self,
        source: CellSource,
        data: &RenderData,
        state: &LayoutState,
        literal: &str,
    ) -> Option<Cell> {
        if !literal.is_empty() {
            return Some(Cell::literal(literal));
        }
        match source {
            CellSource::Table if self.search_all_tables && !self.target.is_empty() => {
                self.select(source, data, state, literal)
            }
            CellSource::Table => {
                let candidate = current_row(data, state)?.cells.get(state.cell_pre_index);
                if self.target.is_empty() {
                    return candidate.cloned();
                }
                match candidate.filter(|c| c.matches(&self.target)) {
                    Some(cell) => Some(cell.clone()),
                    None => global_cell(data, &self.target),
                }
            }
            CellSource::Form => self.select(source, data, state, literal),
        }
    }

    fn find_target(&self, source: CellSource, data: &RenderData, state: &LayoutState) -> Option<Cell> {
        let target = self.target.as_str();
        match source {
            CellSource::Form => data
                .fields
                .iter()
                .rev()
                .find(|f| f.matches(target))
                .map(|f| f.to_cell()),
            CellSource::Table if self.search_all_tables => data
                .tables
                .iter()
                .flat_map(|t| t.rows.iter())
                .flat_map(|r| r.cells.iter())
                .filter(|c| c.matches(target))
                .last()
                .cloned(),
            CellSource::Table => current_row(data, state)?
                .cells
                .iter()
                .rev()
                .find(|c| c.matches(target))
                .cloned(),
        }
    }

    /// The text a cell contributes, formatted but not yet substituted.
    ///
    /// A `currency`/`date` type tag wins, then the cell's own format hint,
    /// then the operation's `format` parameter.
    pub fn text_for(&self, cell: &Cell, literal: &str, options: &RenderOptions) -> String {
        let raw = if !literal.is_empty() {
            literal.to_string()
        } else {
            match self.attribute.as_str() {
                "title" => cell.title.clone(),
                "value" => cell.value.to_text(),
                _ => String::new(),
            }
        };
        let hint = match cell.kind.as_str() {
            "currency" | "date" => &cell.kind,
            _ => &cell.format,
        };
        match FormatSpec::from_param(&Value::String(hint.clone()), options) {
            FormatSpec::None => self.format.apply(&raw),
            spec => spec.apply(&raw),
        }
    }

    /// A wrapping cell box for `text`.
    pub fn cell_box(&self, text: String) -> CellBox {
        CellBox {
            width: self.width,
            height: self.line_height,
            text,
            border: self.border,
            align: self.align,
            fill: self.fill,
            ..Default::default()
        }
    }
}

fn current_row<'d>(data: &'d RenderData, state: &LayoutState) -> Option<&'d Row> {
    data.tables.get(state.table_index)?.rows.get(state.row_index)
}

fn global_cell(data: &RenderData, name: &str) -> Option<Cell> {
    data.globals
        .get(name)
        .map(|value| Cell::synthetic(name, value.clone()))
}

/// Substitute globals and the `{nn}` page number into rendered text.
pub fn substitute(text: &str, data: &RenderData, page: usize) -> String {
    let mut out = text.to_string();
    for (name, value) in &data.globals {
        if !name.is_empty() && out.contains(name.as_str()) {
            out = out.replace(name.as_str(), &value.to_text());
        }
    }
    out.replace("{nn}", &page.to_string())
}

/// [`substitute`], then turn `<br>` into line breaks for wrapping cells.
pub fn wrap_text(text: &str, data: &RenderData, page: usize) -> String {
    substitute(text, data, page).replace("<br>", "\n")
}

impl Interpreter<'_> {
    /// Measure every wrapping cell of `template` at the current pre-pass
    /// position, without drawing.
    pub(super) fn pre_pass(&mut self, surface: &mut dyn Surface, template: &[Instruction]) {
        for (position, instruction) in template.iter().enumerate() {
            let source = match instruction.op.as_str() {
                "multicell" => CellSource::Table,
                "multicellformfield" => CellSource::Form,
                _ => continue,
            };
            self.state.template_op = Some(position);
            self.measure(surface, instruction.params(), source);
        }
        self.state.template_op = None;
    }

    fn measure(&mut self, surface: &dyn Surface, params: &Map<String, Value>, source: CellSource) {
        let request = CellRequest::read(&self.resolver(), params);
        let literal = request.literal(self.data, &self.state).unwrap_or_else(|e| {
            debug!(error = %e, "calculation undefined while measuring");
            request.text.clone()
        });

        let Some(cell) = request.pre_select(source, self.data, &self.state, &literal) else {
            trace!(
                target = %request.target,
                position = self.state.cell_pre_index,
                "cell disabled for this position"
            );
            return;
        };
        self.state.mark_measured();

        let text = wrap_text(
            &request.text_for(&cell, &literal, self.options),
            self.data,
            surface.page_no(),
        );
        let lines = if text.is_empty() {
            0
        } else {
            surface.split_lines(&text, request.width).len()
        };
        let height = lines as f64 * request.line_height;

        self.state.row_cells = self.state.row_cells.max(lines);
        if height > self.state.row_height {
            self.state.row_height = height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldEntry, Scalar, Table};
    use serde_json::json;

    fn cell(key: &str, title: &str, value: Scalar) -> Cell {
        Cell {
            key: key.into(),
            path: format!("items.{key}"),
            title: title.into(),
            value,
            ..Default::default()
        }
    }

    fn data() -> RenderData {
        let mut data = RenderData {
            tables: vec![
                Table {
                    rows: vec![Row {
                        cells: vec![
                            cell("name", "Name", Scalar::from("Widget")),
                            Cell {
                                kind: "currency".into(),
                                ..cell("price", "Price", Scalar::Float(1234.5))
                            },
                        ],
                    }],
                    records: vec![],
                },
                Table {
                    rows: vec![Row {
                        cells: vec![cell("total", "Total", Scalar::Int(99))],
                    }],
                    records: vec![],
                },
            ],
            fields: vec![
                FieldEntry {
                    key: "first".into(),
                    title: "First name".into(),
                    value: Scalar::from("Ada"),
                    ..Default::default()
                },
                FieldEntry {
                    key: "last".into(),
                    title: "Last name".into(),
                    value: Scalar::from("Lovelace"),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        data.globals.insert("company".into(), Scalar::from("Acme Ltd"));
        data
    }

    fn request(params: Value) -> CellRequest {
        let data = RenderData::default();
        let options = RenderOptions::default();
        let resolver = Resolver::new(&data, &options, 0);
        CellRequest::read(&resolver, params.as_object().unwrap())
    }

    #[test]
    fn reads_defaults() {
        let req = request(json!({}));
        assert_eq!(req.align, Align::Left);
        assert!(req.border.is_empty());
        assert_eq!(req.format, FormatSpec::None);
        assert!(req.calculation.is_none());
    }

    #[test]
    fn positional_cells_follow_the_cell_index() {
        let data = data();
        let mut state = LayoutState::default();
        let req = request(json!({ "attribute": "title" }));
        assert_eq!(req.select(CellSource::Table, &data, &state, "").unwrap().key, "name");
        state.cell_index = 1;
        assert_eq!(req.select(CellSource::Table, &data, &state, "").unwrap().key, "price");
        state.cell_index = 2;
        assert!(req.select(CellSource::Table, &data, &state, "").is_none());
    }

    #[test]
    fn literal_text_wins_over_target() {
        let data = data();
        let state = LayoutState::default();
        let req = request(json!({ "attribute": "title", "target": "price", "text": "Fixed" }));
        let cell = req.select(CellSource::Table, &data, &state, "Fixed").unwrap();
        assert_eq!(req.text_for(&cell, "Fixed", &RenderOptions::default()), "Fixed");
    }

    #[test]
    fn target_then_global() {
        let data = data();
        let state = LayoutState::default();

        let by_path = request(json!({ "target": "items.price" }));
        assert_eq!(by_path.select(CellSource::Table, &data, &state, "").unwrap().key, "price");

        let global = request(json!({ "target": "company", "attribute": "value" }));
        let cell = global.select(CellSource::Table, &data, &state, "").unwrap();
        assert_eq!(cell.value, Scalar::from("Acme Ltd"));

        let missing = request(json!({ "target": "nothing" }));
        assert!(missing.select(CellSource::Table, &data, &state, "").is_none());
    }

    #[test]
    fn loop_searches_every_table() {
        let data = data();
        let state = LayoutState::default();
        let local = request(json!({ "target": "total" }));
        assert!(local.select(CellSource::Table, &data, &state, "").is_none());
        let looped = request(json!({ "target": "total", "loop": true }));
        assert_eq!(looped.select(CellSource::Table, &data, &state, "").unwrap().key, "total");
    }

    #[test]
    fn pre_select_disables_non_matching_positions() {
        let data = data();
        let mut state = LayoutState::default();
        let req = request(json!({ "target": "price" }));

        state.cell_pre_index = 0;
        assert!(req.pre_select(CellSource::Table, &data, &state, "").is_none());
        state.cell_pre_index = 1;
        assert_eq!(req.pre_select(CellSource::Table, &data, &state, "").unwrap().key, "price");

        let global = request(json!({ "target": "company" }));
        state.cell_pre_index = 0;
        assert!(global.pre_select(CellSource::Table, &data, &state, "").is_some());
    }

    #[test]
    fn form_source_uses_the_row_index() {
        let data = data();
        let mut state = LayoutState::default();
        let req = request(json!({ "attribute": "title" }));
        state.row_index = 1;
        let cell = req.select(CellSource::Form, &data, &state, "").unwrap();
        assert_eq!(cell.title, "Last name");

        let targeted = request(json!({ "target": "first", "attribute": "value" }));
        let cell = targeted.pre_select(CellSource::Form, &data, &state, "").unwrap();
        assert_eq!(cell.value, Scalar::from("Ada"));
    }

    #[test]
    fn cell_type_forces_format() {
        let data = data();
        let mut state = LayoutState::default();
        state.cell_index = 1;
        let req = request(json!({ "attribute": "value" }));
        let cell = req.select(CellSource::Table, &data, &state, "").unwrap();
        assert_eq!(req.text_for(&cell, "", &RenderOptions::default()), "£1,234.50");
    }

    #[test]
    fn cell_format_hint_precedes_the_format_parameter() {
        let req = request(json!({ "attribute": "value", "format": "date" }));
        let hinted = Cell {
            format: "currency".into(),
            ..cell("fee", "Fee", Scalar::Float(12.5))
        };
        assert_eq!(req.text_for(&hinted, "", &RenderOptions::default()), "£12.50");

        let plain = cell("due", "Due", Scalar::from("2024-1-31"));
        assert_eq!(req.text_for(&plain, "", &RenderOptions::default()), "31/1/2024");
    }

    #[test]
    fn looped_target_is_measured_from_another_table() {
        let data = data();
        let state = LayoutState::default();
        let looped = request(json!({ "target": "total", "loop": true, "attribute": "value" }));
        let cell = looped.pre_select(CellSource::Table, &data, &state, "").unwrap();
        assert_eq!(cell.value, Scalar::Int(99));

        let local = request(json!({ "target": "total" }));
        assert!(local.pre_select(CellSource::Table, &data, &state, "").is_none());
    }

    #[test]
    fn format_parameter_applies_to_literal_text() {
        let req = request(json!({ "format": "date" }));
        let cell = Cell::literal("2023-5-9");
        assert_eq!(req.text_for(&cell, "2023-5-9", &RenderOptions::default()), "9/5/2023");
    }

    #[test]
    fn calculation_replaces_literal_text() {
        let data = RenderData {
            tables: vec![Table {
                rows: vec![],
                records: vec![json!({ "n": 2 }), json!({ "n": 3 })],
            }],
            ..Default::default()
        };
        let state = LayoutState::default();
        let req = request(json!({
            "text": "N/A",
            "calculation": { "type": "sum", "formula": { "var": "n" } }
        }));
        assert_eq!(req.literal(&data, &state), Ok("5".to_string()));

        let empty = RenderData {
            tables: vec![Table::default()],
            ..Default::default()
        };
        assert_eq!(req.literal(&empty, &state), Ok("N/A".to_string()));
    }

    #[test]
    fn substitution_order() {
        let data = data();
        assert_eq!(
            wrap_text("company<br>page {nn}", &data, 3),
            "Acme Ltd\npage 3"
        );
        assert_eq!(substitute("a<br>b", &data, 1), "a<br>b");
    }
}
