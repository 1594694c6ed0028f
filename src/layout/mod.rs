//! # Instruction Interpreter
//!
//! Walks an instruction tree depth first and turns each operation into
//! calls on a [`Surface`]. This is where the document actually gets laid
//! out.
//!
//! ## Rows are measured before they are drawn
//!
//! Table and form bodies repeat a row template per data row. Before any
//! cell of a row is drawn, the template is pre-measured (see [`measure`]):
//! every wrapping cell's text is split at its width, and the tallest
//! cell's height and line count are recorded. Then:
//!
//! 1. If the row would run past the bottom of the page, a new page is
//!    started first, so a row is never split.
//! 2. The template runs for real. Every wrapping cell pads itself with
//!    blank lines up to the row's line count, so all cells in the row end
//!    at the same y.
//! 3. The lowest y any cell reached is carried into the next row.
//!
//! ## Page hooks
//!
//! `setheaderfunc` / `setfooterfunc` register instruction programs that
//! the surface triggers whenever it starts or finishes a page, including
//! breaks it takes on its own while drawing an overflowing cell. The
//! interpreter is the surface's [`PageHooks`]: when a page starts it runs
//! the header program, then re-reads the page number and re-anchors the
//! row state at the cursor. Page breaks requested from inside a header or
//! footer program are ignored.
//!
//! ## Errors
//!
//! Unknown operations, unreadable images and undefined calculations are
//! logged and skipped. Only a malformed nested instruction tree or a table
//! body addressing data that isn't there stops the render.

pub mod measure;
pub mod page_break;
pub mod state;

use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::error::FormpressError;
use crate::image_loader::{self, ImageKind};
use crate::instruction::{self, Instruction};
use crate::model::{
    Cell, DocumentSetup, Orientation, PageSize, RenderData, RenderOptions, Table, Unit,
};
use crate::resolve::Resolver;
use crate::surface::{Align, Border, CellBox, CursorMove, ImagePlacement, PageHooks, Rgb, Surface};

use measure::{CellRequest, CellSource};
use page_break::BreakDecision;

pub use state::LayoutState;

/// Run `program` against `surface`, then close the document.
pub fn render(
    surface: &mut dyn Surface,
    program: &[Instruction],
    data: &RenderData,
    options: &RenderOptions,
) -> Result<(), FormpressError> {
    let mut interpreter = Interpreter::new(data, options);
    interpreter.run(surface, program)?;
    surface.close(&mut interpreter);
    Ok(())
}

/// Executes instruction trees against a surface.
pub struct Interpreter<'a> {
    data: &'a RenderData,
    options: &'a RenderOptions,
    state: LayoutState,
    header: Option<Rc<[Instruction]>>,
    footer: Option<Rc<[Instruction]>>,
    in_hook: bool,
}

impl<'a> Interpreter<'a> {
    pub fn new(data: &'a RenderData, options: &'a RenderOptions) -> Self {
        Self {
            data,
            options,
            state: LayoutState::new(options.init_y),
            header: None,
            footer: None,
            in_hook: false,
        }
    }

    pub fn state(&self) -> &LayoutState {
        &self.state
    }

    /// Execute each operation in order.
    pub fn run(
        &mut self,
        surface: &mut dyn Surface,
        program: &[Instruction],
    ) -> Result<(), FormpressError> {
        for instruction in program {
            self.dispatch(surface, instruction)?;
        }
        Ok(())
    }

    fn resolver(&self) -> Resolver<'a> {
        Resolver::new(self.data, self.options, self.state.row_index)
    }

    fn dispatch(
        &mut self,
        surface: &mut dyn Surface,
        instruction: &Instruction,
    ) -> Result<(), FormpressError> {
        self.state.current_x = surface.x();
        self.state.current_y = surface.y();

        let p = instruction.params();
        let r = self.resolver();
        trace!(op = %instruction.op, "dispatch");

        match instruction.op.as_str() {
            // ── Document and page ───────────────────────────────────
            "new" => {
                let orientation = match r.string(p, "orientation", "P").to_ascii_uppercase() {
                    o if o.starts_with('L') => Orientation::Landscape,
                    _ => Orientation::Portrait,
                };
                surface.open(&DocumentSetup {
                    orientation,
                    unit: Unit::from_name(&r.string(p, "unit", "mm")),
                    size: PageSize::from_name(&r.string(p, "size", "A4")),
                    resource_dir: r.string(p, "dir", ""),
                });
            }
            "addpage" => {
                if self.in_hook {
                    debug!("addpage ignored inside a page hook");
                } else {
                    surface.add_page(self);
                }
            }
            "setmargins" => {
                let right = r.scalar(p, "right").map(|s| s.to_f64());
                surface.set_margins(r.float(p, "left", 0.0), r.float(p, "top", 0.0), right);
            }
            "setleftmargin" => surface.set_left_margin(r.float(p, "margin", 0.0)),
            "settopmargin" => surface.set_top_margin(r.float(p, "margin", 0.0)),
            "setrightmargin" => surface.set_right_margin(r.float(p, "margin", 0.0)),
            "setcellmargin" => surface.set_cell_margin(r.float(p, "margin", 0.0)),
            "setautopagebreak" => {
                surface.set_auto_page_break(r.boolean(p, "auto", true), r.float(p, "margin", 15.0))
            }
            "aliasnbpages" => surface.alias_nb_pages(&r.string(p, "alias", "")),
            "setheaderfunc" => self.header = hook_program(&instruction.args)?,
            "setfooterfunc" => self.footer = hook_program(&instruction.args)?,

            // ── Style ───────────────────────────────────────────────
            "setfont" => surface.set_font(
                &r.string(p, "family", "Arial"),
                &r.string(p, "style", ""),
                r.float(p, "size", 8.0),
            ),
            "setfillcolor" => surface.set_fill_color(color(&r, p)),
            "settextcolor" => surface.set_text_color(color(&r, p)),
            "setdrawcolor" => surface.set_draw_color(color(&r, p)),

            // ── Cursor ──────────────────────────────────────────────
            "setx" => surface.set_x(r.float(p, "x", 0.0)),
            "sety" => surface.set_y(r.float(p, "y", 0.0)),
            "setxy" => surface.set_xy(r.float(p, "x", 0.0), r.float(p, "y", 0.0)),
            "updatex" => {
                surface.set_x(self.state.current_x + r.float(p, "width", 0.0));
                self.state.current_x = surface.x();
            }
            "updatey" => {
                self.state.manual_y = surface.y() + r.float(p, "height", 0.0);
                surface.set_y(self.state.manual_y);
            }
            "setinity" => {
                surface.set_y(self.state.init_y);
                self.state.next_y = self.state.init_y;
            }
            "rowy" => surface.set_y(self.state.current_row_y),
            "ln" => {
                let height = r.float(p, "height", -1.0);
                surface.ln((height >= 0.0).then_some(height));
            }

            // ── Drawing ─────────────────────────────────────────────
            "cell" => {
                let text = measure::substitute(&r.string(p, "text", ""), self.data, surface.page_no());
                surface.cell(r.float(p, "width", 0.0), r.float(p, "height", 0.0), &text, self);
                self.state.new_page = false;
            }
            "cellformat" => {
                let text = measure::substitute(&r.string(p, "text", ""), self.data, surface.page_no());
                let cell = CellBox {
                    width: r.float(p, "width", 0.0),
                    height: r.float(p, "height", 0.0),
                    text,
                    border: Border::parse(&r.string(p, "border", "")),
                    cursor: CursorMove::from_code(r.int(p, "line", 0)),
                    align: Align::parse(&r.string(p, "align", "L")),
                    fill: r.boolean(p, "fill", false),
                    link: Some(r.string(p, "linkstr", "")).filter(|l| !l.is_empty()),
                };
                surface.cell_format(&cell, self);
                self.state.new_page = false;
            }
            "multicell" => self.wrapping_cell(surface, p, CellSource::Table),
            "multicellformfield" => self.wrapping_cell(surface, p, CellSource::Form),
            "line" => {
                let x = r.float(p, "x", 0.0);
                let y = match r.string(p, "auto", "").as_str() {
                    "P" | "R" => self.state.current_row_y,
                    "C" => surface.y(),
                    "M" => self.state.manual_y,
                    _ => r.float(p, "y", 0.0),
                };
                let width = r.float(p, "width", 0.0);
                let height = r.float(p, "height", 1.0);
                surface.line(x, y, x + width, y + height);
            }
            "linerow" => {
                let x = surface.x();
                let y = self.state.current_row_y;
                surface.line(
                    x,
                    y,
                    x + r.float(p, "width", 0.0),
                    y + r.float(p, "height", 0.0),
                );
            }
            "image" => self.image(surface, p),

            // ── Structured content ──────────────────────────────────
            "table" => self.table(surface, p)?,
            "form" => self.form(surface, p)?,

            other => warn!(op = other, "unknown operation skipped"),
        }
        Ok(())
    }

    // ── Table and form bodies ───────────────────────────────────────

    fn table(
        &mut self,
        surface: &mut dyn Surface,
        params: &Map<String, Value>,
    ) -> Result<(), FormpressError> {
        let data = self.data;
        let index = self.resolver().int(params, "index", 0);
        let table = usize::try_from(index)
            .ok()
            .and_then(|i| data.tables.get(i))
            .ok_or(FormpressError::OutOfBounds {
                what: "table",
                index: usize::try_from(index).unwrap_or(0),
                len: data.tables.len(),
            })?;
        let templates = row_templates(params.get("body"))?;

        self.state.table_index = usize::try_from(index).unwrap_or(0);
        self.state.template_index = 0;
        self.state.current_row_y = surface.y();
        debug!(table = index, rows = table.rows.len(), templates = templates.len(), "table body");

        let result = self.table_body(surface, table, &templates);
        self.end_body();
        result
    }

    fn table_body(
        &mut self,
        surface: &mut dyn Surface,
        table: &Table,
        templates: &[Vec<Instruction>],
    ) -> Result<(), FormpressError> {
        if templates.is_empty() {
            return Ok(());
        }
        for (x, row) in table.rows.iter().enumerate() {
            let template = &templates[self.state.template_index % templates.len()];
            self.state.begin_row(x, template.len());

            for pre_index in 0..row.cells.len() {
                self.state.cell_pre_index = pre_index;
                self.pre_pass(surface, template);
            }
            self.break_before_row(surface);
            self.run_template(surface, template)?;

            self.state.template_index = (self.state.template_index + 1) % templates.len();
            self.state.end_row(surface.y());
        }
        Ok(())
    }

    fn form(
        &mut self,
        surface: &mut dyn Surface,
        params: &Map<String, Value>,
    ) -> Result<(), FormpressError> {
        let fields = self.data.fields.len();
        let start = self.resolver().int(params, "start", 0);
        let start = usize::try_from(start)
            .ok()
            .filter(|s| *s <= fields)
            .ok_or(FormpressError::OutOfBounds {
                what: "field",
                index: usize::try_from(start).unwrap_or(0),
                len: fields,
            })?;

        let main = match params.get("main") {
            Some(value) => instruction::parse(value)?,
            None => Vec::new(),
        };
        let alternative = match params.get("alternative") {
            Some(value) => Some(instruction::parse(value)?),
            None => None,
        };
        debug!(fields, start, alternating = alternative.is_some(), "form body");

        self.state.current_row_y = surface.y();
        let result = self.form_body(surface, start, &main, alternative.as_deref());
        self.end_body();
        result
    }

    fn form_body(
        &mut self,
        surface: &mut dyn Surface,
        start: usize,
        main: &[Instruction],
        alternative: Option<&[Instruction]>,
    ) -> Result<(), FormpressError> {
        for index in start..self.data.fields.len() {
            let template = match alternative {
                Some(alt) if index % 2 == 1 => alt,
                _ => main,
            };
            self.state.begin_row(index, template.len());
            self.pre_pass(surface, template);
            self.break_before_row(surface);
            self.run_template(surface, template)?;
            self.state.end_row(surface.y());
        }
        Ok(())
    }

    fn run_template(
        &mut self,
        surface: &mut dyn Surface,
        template: &[Instruction],
    ) -> Result<(), FormpressError> {
        for (position, instruction) in template.iter().enumerate() {
            self.state.template_op = Some(position);
            self.dispatch(surface, instruction)?;
        }
        self.state.template_op = None;
        Ok(())
    }

    fn break_before_row(&mut self, surface: &mut dyn Surface) {
        if self.in_hook {
            return;
        }
        let decision = page_break::decide_row_break(
            surface.y(),
            self.state.row_height,
            page_break::page_bottom(surface),
            self.state.new_page,
        );
        if decision == BreakDecision::MoveToNextPage {
            debug!(
                row = self.state.row_index,
                height = self.state.row_height,
                y = surface.y(),
                "row moved to next page"
            );
            surface.add_page(self);
        }
    }

    fn end_body(&mut self) {
        self.state.table_index = 0;
        self.state.row_height = 0.0;
        self.state.row_cells = 0;
        self.state.template_op = None;
        self.state.measured_ops.clear();
    }

    // ── Cells and images ────────────────────────────────────────────

    fn wrapping_cell(
        &mut self,
        surface: &mut dyn Surface,
        params: &Map<String, Value>,
        source: CellSource,
    ) {
        let request = CellRequest::read(&self.resolver(), params);
        let literal = request.literal(self.data, &self.state).unwrap_or_else(|e| {
            warn!(error = %e, "calculation undefined, keeping fallback text");
            request.text.clone()
        });

        let cell = if self.state.is_disabled() {
            None
        } else {
            request.select(source, self.data, &self.state, &literal)
        };
        if source == CellSource::Table && request.target.is_empty() && literal.is_empty() {
            self.state.cell_index += 1;
        }

        let page = surface.page_no();
        let text = cell.as_ref().map_or_else(String::new, |c| {
            measure::wrap_text(&request.text_for(c, &literal, self.options), self.data, page)
        });

        let cell_x = surface.x();
        let lines = if text.is_empty() {
            0
        } else {
            surface.split_lines(&text, request.width).len()
        };

        let mut cell_box = request.cell_box(text);
        if !cell_box.text.is_empty() {
            surface.multi_cell(&cell_box, self);
        }
        cell_box.text.clear();
        for _ in lines..self.state.row_cells {
            surface.set_x(cell_x);
            surface.multi_cell(&cell_box, self);
        }

        if let Some(cell) = cell.filter(|_| request.attribute == "value") {
            self.cell_images(surface, &cell, cell_x, request.width);
        }
        self.state.reach(surface.y());
    }

    /// Draw a cell's embedded images below its text, clamped to the cell
    /// width.
    fn cell_images(&mut self, surface: &mut dyn Surface, cell: &Cell, x: f64, width: f64) {
        let ppu = if self.options.pixels_per_unit > 0.0 {
            self.options.pixels_per_unit
        } else {
            RenderOptions::default().pixels_per_unit
        };

        for image in &cell.images {
            let bytes = match image_loader::decode_payload(image) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(cell = %cell.key, error = %e, "cell image skipped");
                    continue;
                }
            };
            let Some(kind) = ImageKind::from_tag(&image.kind).or_else(|| ImageKind::sniff(&bytes))
            else {
                warn!(cell = %cell.key, kind = %image.kind, "unsupported cell image type");
                continue;
            };

            let name = self.state.next_media_name();
            if let Err(e) = surface.register_image(&name, kind, &bytes) {
                warn!(cell = %cell.key, error = %e, "cell image skipped");
                continue;
            }

            let mut w = f64::from(image.width) / ppu;
            let mut h = f64::from(image.height) / ppu;
            if width > 0.0 && w > width {
                w = width;
                h = 0.0;
            }
            let placement = ImagePlacement {
                name,
                x,
                y: surface.y(),
                width: w,
                height: h,
                flow: true,
                link: None,
            };
            surface.image(&placement, self);
        }
    }

    fn image(&mut self, surface: &mut dyn Surface, params: &Map<String, Value>) {
        let r = self.resolver();
        let src = r.string(params, "src", "");
        let file = match image_loader::inspect_image(&src) {
            Ok(file) => file,
            Err(e) => {
                warn!(src = %src, error = %e, "image skipped");
                return;
            }
        };
        let bytes = match image_loader::decode_payload(&file) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(src = %src, error = %e, "image skipped");
                return;
            }
        };
        let Some(kind) = ImageKind::from_tag(&file.kind) else {
            warn!(src = %src, kind = %file.kind, "unsupported image type");
            return;
        };

        let name = match r.string(params, "name", "") {
            name if name.is_empty() => src.clone(),
            name => name,
        };
        if let Err(e) = surface.register_image(&name, kind, &bytes) {
            warn!(src = %src, error = %e, "image skipped");
            return;
        }

        let placement = ImagePlacement {
            name,
            x: r.float(params, "x", 0.0),
            y: r.float(params, "y", 0.0),
            width: r.float(params, "width", 0.0),
            height: r.float(params, "height", 0.0),
            flow: r.boolean(params, "flow", false),
            link: Some(r.string(params, "linkstr", "")).filter(|l| !l.is_empty()),
        };
        surface.image(&placement, self);
        self.state.new_page = false;
    }

    // ── Page hooks ──────────────────────────────────────────────────

    /// Run a header or footer program with the row scope cleared, then put
    /// the interrupted row's state back.
    fn run_hook(&mut self, surface: &mut dyn Surface, program: &[Instruction], hook: &'static str) {
        let saved = self.state.clone();
        let was_in_hook = std::mem::replace(&mut self.in_hook, true);
        self.state.row_cells = 0;
        self.state.row_height = 0.0;
        self.state.template_op = None;

        if let Err(e) = self.run(surface, program) {
            warn!(hook, error = %e, "page hook program failed");
        }

        let media_index = self.state.media_index;
        self.state = saved;
        self.state.media_index = media_index;
        self.in_hook = was_in_hook;
    }
}

impl PageHooks for Interpreter<'_> {
    fn header(&mut self, surface: &mut dyn Surface) {
        if let Some(program) = self.header.clone() {
            self.run_hook(surface, &program, "header");
        }
        let page = surface.page_no();
        let y = surface.y();
        self.state.begin_page(page, y);
        if page == 1 && self.options.init_y.is_none() {
            self.state.init_y = y;
        }
        debug!(page, y, "page started");
    }

    fn footer(&mut self, surface: &mut dyn Surface) {
        if let Some(program) = self.footer.clone() {
            self.run_hook(surface, &program, "footer");
        }
    }
}

fn color(r: &Resolver<'_>, params: &Map<String, Value>) -> Rgb {
    Rgb::clamped(r.int(params, "r", 0), r.int(params, "g", 0), r.int(params, "b", 0))
}

/// A header/footer program: a bare operation array, or an object holding
/// one under `body`. An empty program unregisters the hook.
fn hook_program(args: &Value) -> Result<Option<Rc<[Instruction]>>, FormpressError> {
    let program = match args {
        Value::Array(_) => instruction::parse(args)?,
        Value::Object(map) => match map.get("body") {
            Some(body) => instruction::parse(body)?,
            None => Vec::new(),
        },
        _ => Vec::new(),
    };
    Ok((!program.is_empty()).then(|| Rc::from(program)))
}

/// Collect the `row` templates of a table `body`, in order.
fn row_templates(body: Option<&Value>) -> Result<Vec<Vec<Instruction>>, FormpressError> {
    let Some(body) = body else {
        return Ok(Vec::new());
    };
    let entries = body.as_array().ok_or_else(|| {
        FormpressError::InvalidOperation("table body must be an array of rows".to_string())
    })?;
    entries
        .iter()
        .filter_map(|entry| entry.get("row"))
        .map(instruction::parse)
        .collect()
}
