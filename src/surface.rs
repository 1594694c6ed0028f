//! # Rendering Surface
//!
//! The capabilities the interpreter drives: document and page setup, a
//! cursor, text cells, lines, images, and a line-splitting measurement
//! primitive. [`crate::pdf::PdfSurface`] is the production implementation.
//!
//! Any call that can start a new page takes a `&mut dyn PageHooks`. The
//! surface hands itself to those hooks while the page is being created,
//! which is how header and footer programs re-enter the interpreter.

use crate::image_loader::{ImageError, ImageKind};
use crate::model::DocumentSetup;

/// Callbacks run by the surface around page creation.
pub trait PageHooks {
    /// Runs after a new page is started.
    fn header(&mut self, _surface: &mut dyn Surface) {}
    /// Runs before a page is finished.
    fn footer(&mut self, _surface: &mut dyn Surface) {}
}

/// Hooks that do nothing.
pub struct NoHooks;

impl PageHooks for NoHooks {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// Clamp integer components into 0..=255.
    pub fn clamped(r: i64, g: i64, b: i64) -> Self {
        let c = |v: i64| v.clamp(0, 255) as u8;
        Rgb(c(r), c(g), c(b))
    }
}

/// Which sides of a cell get a border line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Border {
    pub left: bool,
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
}

impl Border {
    pub const NONE: Border = Border {
        left: false,
        top: false,
        right: false,
        bottom: false,
    };
    pub const ALL: Border = Border {
        left: true,
        top: true,
        right: true,
        bottom: true,
    };

    /// `"1"` frames the cell, `"0"` or empty draws nothing, otherwise any
    /// of the letters `L`, `T`, `R`, `B`.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if spec == "1" {
            return Border::ALL;
        }
        let upper = spec.to_ascii_uppercase();
        Border {
            left: upper.contains('L'),
            top: upper.contains('T'),
            right: upper.contains('R'),
            bottom: upper.contains('B'),
        }
    }

    pub fn is_all(&self) -> bool {
        *self == Border::ALL
    }

    pub fn is_empty(&self) -> bool {
        *self == Border::NONE
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// `L`, `C` or `R`; anything else aligns left.
    pub fn parse(spec: &str) -> Self {
        match spec.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => Align::Center,
            Some('R') => Align::Right,
            _ => Align::Left,
        }
    }
}

/// Where the cursor goes after a cell is drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorMove {
    /// To the right of the cell.
    #[default]
    Right,
    /// To the start of the next line.
    NextLine,
    /// Below the cell, same x.
    Below,
}

impl CursorMove {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => CursorMove::NextLine,
            2 => CursorMove::Below,
            _ => CursorMove::Right,
        }
    }
}

/// A formatted or wrapping text cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellBox {
    /// Zero extends the cell to the right margin.
    pub width: f64,
    /// Cell height, or line height for wrapping cells.
    pub height: f64,
    pub text: String,
    pub border: Border,
    pub cursor: CursorMove,
    pub align: Align,
    pub fill: bool,
    pub link: Option<String>,
}

/// An image draw of a previously registered image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImagePlacement {
    pub name: String,
    /// Negative means the current x.
    pub x: f64,
    /// Ignored when `flow` is set.
    pub y: f64,
    /// Zero width and height use the natural size at 96 dpi; one zero
    /// dimension keeps the aspect ratio.
    pub width: f64,
    pub height: f64,
    /// Place at the cursor and move it below the image.
    pub flow: bool,
    pub link: Option<String>,
}

/// The page-rendering capabilities consumed by the interpreter.
///
/// Coordinates are in the document's user unit, measured from the top-left
/// corner of the page.
pub trait Surface {
    fn open(&mut self, setup: &DocumentSetup);
    fn add_page(&mut self, hooks: &mut dyn PageHooks);
    /// Finish the last page, running its footer. Adds a page if none exists.
    fn close(&mut self, hooks: &mut dyn PageHooks);
    /// 1-based number of the current page, 0 before the first page.
    fn page_no(&self) -> usize;
    fn page_size(&self) -> (f64, f64);
    /// Whether automatic page breaks are on, and the bottom margin.
    fn auto_page_break(&self) -> (bool, f64);

    fn x(&self) -> f64;
    fn y(&self) -> f64;
    fn set_x(&mut self, x: f64);
    /// Also moves x back to the left margin.
    fn set_y(&mut self, y: f64);
    fn set_xy(&mut self, x: f64, y: f64);
    /// Line break; `None` uses the height of the last cell.
    fn ln(&mut self, height: Option<f64>);

    /// `None` for `right` keeps the right margin equal to the left.
    fn set_margins(&mut self, left: f64, top: f64, right: Option<f64>);
    fn set_left_margin(&mut self, margin: f64);
    fn set_top_margin(&mut self, margin: f64);
    fn set_right_margin(&mut self, margin: f64);
    fn set_cell_margin(&mut self, margin: f64);
    fn set_auto_page_break(&mut self, auto: bool, margin: f64);
    /// Text replaced by the total page count when the document is finished.
    fn alias_nb_pages(&mut self, alias: &str);

    fn set_font(&mut self, family: &str, style: &str, size: f64);
    fn set_fill_color(&mut self, color: Rgb);
    fn set_text_color(&mut self, color: Rgb);
    fn set_draw_color(&mut self, color: Rgb);

    fn cell(&mut self, width: f64, height: f64, text: &str, hooks: &mut dyn PageHooks);
    fn cell_format(&mut self, cell: &CellBox, hooks: &mut dyn PageHooks);
    /// Wrapping text; each line is `cell.height` tall.
    fn multi_cell(&mut self, cell: &CellBox, hooks: &mut dyn PageHooks);
    /// The lines `text` wraps to in a cell of `width`, using the current font.
    fn split_lines(&self, text: &str, width: f64) -> Vec<String>;
    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64);

    /// Register image bytes under `name`. Registering a name twice keeps
    /// the first image.
    fn register_image(&mut self, name: &str, kind: ImageKind, data: &[u8])
        -> Result<(), ImageError>;
    fn image(&mut self, placement: &ImagePlacement, hooks: &mut dyn PageHooks);
}

// ── Recording ───────────────────────────────────────────────────────

/// One logged state-changing surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Open(DocumentSetup),
    AddPage { page: usize },
    Close,
    SetX(f64),
    SetY(f64),
    SetXY(f64, f64),
    Ln(Option<f64>),
    SetMargins { left: f64, top: f64, right: Option<f64> },
    SetLeftMargin(f64),
    SetTopMargin(f64),
    SetRightMargin(f64),
    SetCellMargin(f64),
    SetAutoPageBreak { auto: bool, margin: f64 },
    AliasNbPages(String),
    SetFont { family: String, style: String, size: f64 },
    SetFillColor(Rgb),
    SetTextColor(Rgb),
    SetDrawColor(Rgb),
    Cell { x: f64, y: f64, width: f64, height: f64, text: String },
    CellFormat { x: f64, y: f64, cell: CellBox },
    MultiCell { x: f64, y: f64, cell: CellBox },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    RegisterImage { name: String, kind: ImageKind },
    Image { page: usize, placement: ImagePlacement },
}

/// A surface decorator that logs every state-changing call before
/// forwarding it, including calls made from header and footer hooks.
/// Queries and measurements are not logged.
pub struct RecordingSurface<S> {
    inner: S,
    calls: Vec<SurfaceCall>,
}

impl<S: Surface> RecordingSurface<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_parts(self) -> (S, Vec<SurfaceCall>) {
        (self.inner, self.calls)
    }

    fn tap(&mut self) -> Tap<'_> {
        Tap {
            inner: &mut self.inner,
            calls: &mut self.calls,
        }
    }
}

/// Borrowed view that logs into `calls` and forwards to `inner`.
struct Tap<'a> {
    inner: &'a mut dyn Surface,
    calls: &'a mut Vec<SurfaceCall>,
}

/// Wraps the caller's hooks so that hook programs draw through a [`Tap`].
struct TapHooks<'a> {
    hooks: &'a mut dyn PageHooks,
    calls: &'a mut Vec<SurfaceCall>,
}

impl PageHooks for TapHooks<'_> {
    fn header(&mut self, surface: &mut dyn Surface) {
        let mut tap = Tap {
            inner: surface,
            calls: &mut *self.calls,
        };
        self.hooks.header(&mut tap);
    }

    fn footer(&mut self, surface: &mut dyn Surface) {
        let mut tap = Tap {
            inner: surface,
            calls: &mut *self.calls,
        };
        self.hooks.footer(&mut tap);
    }
}

impl Surface for Tap<'_> {
    fn open(&mut self, setup: &DocumentSetup) {
        self.calls.push(SurfaceCall::Open(setup.clone()));
        self.inner.open(setup);
    }

    fn add_page(&mut self, hooks: &mut dyn PageHooks) {
        self.calls.push(SurfaceCall::AddPage {
            page: self.inner.page_no() + 1,
        });
        let mut hooks = TapHooks {
            hooks,
            calls: &mut *self.calls,
        };
        self.inner.add_page(&mut hooks);
    }

    fn close(&mut self, hooks: &mut dyn PageHooks) {
        self.calls.push(SurfaceCall::Close);
        let mut hooks = TapHooks {
            hooks,
            calls: &mut *self.calls,
        };
        self.inner.close(&mut hooks);
    }

    fn page_no(&self) -> usize {
        self.inner.page_no()
    }

    fn page_size(&self) -> (f64, f64) {
        self.inner.page_size()
    }

    fn auto_page_break(&self) -> (bool, f64) {
        self.inner.auto_page_break()
    }

    fn x(&self) -> f64 {
        self.inner.x()
    }

    fn y(&self) -> f64 {
        self.inner.y()
    }

    fn set_x(&mut self, x: f64) {
        self.calls.push(SurfaceCall::SetX(x));
        self.inner.set_x(x);
    }

    fn set_y(&mut self, y: f64) {
        self.calls.push(SurfaceCall::SetY(y));
        self.inner.set_y(y);
    }

    fn set_xy(&mut self, x: f64, y: f64) {
        self.calls.push(SurfaceCall::SetXY(x, y));
        self.inner.set_xy(x, y);
    }

    fn ln(&mut self, height: Option<f64>) {
        self.calls.push(SurfaceCall::Ln(height));
        self.inner.ln(height);
    }

    fn set_margins(&mut self, left: f64, top: f64, right: Option<f64>) {
        self.calls.push(SurfaceCall::SetMargins { left, top, right });
        self.inner.set_margins(left, top, right);
    }

    fn set_left_margin(&mut self, margin: f64) {
        self.calls.push(SurfaceCall::SetLeftMargin(margin));
        self.inner.set_left_margin(margin);
    }

    fn set_top_margin(&mut self, margin: f64) {
        self.calls.push(SurfaceCall::SetTopMargin(margin));
        self.inner.set_top_margin(margin);
    }

    fn set_right_margin(&mut self, margin: f64) {
        self.calls.push(SurfaceCall::SetRightMargin(margin));
        self.inner.set_right_margin(margin);
    }

    fn set_cell_margin(&mut self, margin: f64) {
        self.calls.push(SurfaceCall::SetCellMargin(margin));
        self.inner.set_cell_margin(margin);
    }

    fn set_auto_page_break(&mut self, auto: bool, margin: f64) {
        self.calls.push(SurfaceCall::SetAutoPageBreak { auto, margin });
        self.inner.set_auto_page_break(auto, margin);
    }

    fn alias_nb_pages(&mut self, alias: &str) {
        self.calls.push(SurfaceCall::AliasNbPages(alias.to_string()));
        self.inner.alias_nb_pages(alias);
    }

    fn set_font(&mut self, family: &str, style: &str, size: f64) {
        self.calls.push(SurfaceCall::SetFont {
            family: family.to_string(),
            style: style.to_string(),
            size,
        });
        self.inner.set_font(family, style, size);
    }

    fn set_fill_color(&mut self, color: Rgb) {
        self.calls.push(SurfaceCall::SetFillColor(color));
        self.inner.set_fill_color(color);
    }

    fn set_text_color(&mut self, color: Rgb) {
        self.calls.push(SurfaceCall::SetTextColor(color));
        self.inner.set_text_color(color);
    }

    fn set_draw_color(&mut self, color: Rgb) {
        self.calls.push(SurfaceCall::SetDrawColor(color));
        self.inner.set_draw_color(color);
    }

    fn cell(&mut self, width: f64, height: f64, text: &str, hooks: &mut dyn PageHooks) {
        self.calls.push(SurfaceCall::Cell {
            x: self.inner.x(),
            y: self.inner.y(),
            width,
            height,
            text: text.to_string(),
        });
        let mut hooks = TapHooks {
            hooks,
            calls: &mut *self.calls,
        };
        self.inner.cell(width, height, text, &mut hooks);
    }

    fn cell_format(&mut self, cell: &CellBox, hooks: &mut dyn PageHooks) {
        self.calls.push(SurfaceCall::CellFormat {
            x: self.inner.x(),
            y: self.inner.y(),
            cell: cell.clone(),
        });
        let mut hooks = TapHooks {
            hooks,
            calls: &mut *self.calls,
        };
        self.inner.cell_format(cell, &mut hooks);
    }

    fn multi_cell(&mut self, cell: &CellBox, hooks: &mut dyn PageHooks) {
        self.calls.push(SurfaceCall::MultiCell {
            x: self.inner.x(),
            y: self.inner.y(),
            cell: cell.clone(),
        });
        let mut hooks = TapHooks {
            hooks,
            calls: &mut *self.calls,
        };
        self.inner.multi_cell(cell, &mut hooks);
    }

    fn split_lines(&self, text: &str, width: f64) -> Vec<String> {
        self.inner.split_lines(text, width)
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.calls.push(SurfaceCall::Line { x1, y1, x2, y2 });
        self.inner.line(x1, y1, x2, y2);
    }

    fn register_image(
        &mut self,
        name: &str,
        kind: ImageKind,
        data: &[u8],
    ) -> Result<(), ImageError> {
        self.calls.push(SurfaceCall::RegisterImage {
            name: name.to_string(),
            kind,
        });
        self.inner.register_image(name, kind, data)
    }

    fn image(&mut self, placement: &ImagePlacement, hooks: &mut dyn PageHooks) {
        self.calls.push(SurfaceCall::Image {
            page: self.inner.page_no(),
            placement: placement.clone(),
        });
        let mut hooks = TapHooks {
            hooks,
            calls: &mut *self.calls,
        };
        self.inner.image(placement, &mut hooks);
    }
}

impl<S: Surface> Surface for RecordingSurface<S> {
    fn open(&mut self, setup: &DocumentSetup) {
        self.tap().open(setup)
    }

    fn add_page(&mut self, hooks: &mut dyn PageHooks) {
        self.tap().add_page(hooks)
    }

    fn close(&mut self, hooks: &mut dyn PageHooks) {
        self.tap().close(hooks)
    }

    fn page_no(&self) -> usize {
        self.inner.page_no()
    }

    fn page_size(&self) -> (f64, f64) {
        self.inner.page_size()
    }

    fn auto_page_break(&self) -> (bool, f64) {
        self.inner.auto_page_break()
    }

    fn x(&self) -> f64 {
        self.inner.x()
    }

    fn y(&self) -> f64 {
        self.inner.y()
    }

    fn set_x(&mut self, x: f64) {
        self.tap().set_x(x)
    }

    fn set_y(&mut self, y: f64) {
        self.tap().set_y(y)
    }

    fn set_xy(&mut self, x: f64, y: f64) {
        self.tap().set_xy(x, y)
    }

    fn ln(&mut self, height: Option<f64>) {
        self.tap().ln(height)
    }

    fn set_margins(&mut self, left: f64, top: f64, right: Option<f64>) {
        self.tap().set_margins(left, top, right)
    }

    fn set_left_margin(&mut self, margin: f64) {
        self.tap().set_left_margin(margin)
    }

    fn set_top_margin(&mut self, margin: f64) {
        self.tap().set_top_margin(margin)
    }

    fn set_right_margin(&mut self, margin: f64) {
        self.tap().set_right_margin(margin)
    }

    fn set_cell_margin(&mut self, margin: f64) {
        self.tap().set_cell_margin(margin)
    }

    fn set_auto_page_break(&mut self, auto: bool, margin: f64) {
        self.tap().set_auto_page_break(auto, margin)
    }

    fn alias_nb_pages(&mut self, alias: &str) {
        self.tap().alias_nb_pages(alias)
    }

    fn set_font(&mut self, family: &str, style: &str, size: f64) {
        self.tap().set_font(family, style, size)
    }

    fn set_fill_color(&mut self, color: Rgb) {
        self.tap().set_fill_color(color)
    }

    fn set_text_color(&mut self, color: Rgb) {
        self.tap().set_text_color(color)
    }

    fn set_draw_color(&mut self, color: Rgb) {
        self.tap().set_draw_color(color)
    }

    fn cell(&mut self, width: f64, height: f64, text: &str, hooks: &mut dyn PageHooks) {
        self.tap().cell(width, height, text, hooks)
    }

    fn cell_format(&mut self, cell: &CellBox, hooks: &mut dyn PageHooks) {
        self.tap().cell_format(cell, hooks)
    }

    fn multi_cell(&mut self, cell: &CellBox, hooks: &mut dyn PageHooks) {
        self.tap().multi_cell(cell, hooks)
    }

    fn split_lines(&self, text: &str, width: f64) -> Vec<String> {
        self.inner.split_lines(text, width)
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.tap().line(x1, y1, x2, y2)
    }

    fn register_image(
        &mut self,
        name: &str,
        kind: ImageKind,
        data: &[u8],
    ) -> Result<(), ImageError> {
        self.tap().register_image(name, kind, data)
    }

    fn image(&mut self, placement: &ImagePlacement, hooks: &mut dyn PageHooks) {
        self.tap().image(placement, hooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_specs() {
        assert!(Border::parse("1").is_all());
        assert!(Border::parse("0").is_empty());
        assert!(Border::parse("").is_empty());
        assert_eq!(
            Border::parse("lb"),
            Border {
                left: true,
                bottom: true,
                ..Border::NONE
            }
        );
        assert!(Border::parse("LTRB").is_all());
    }

    #[test]
    fn align_and_cursor_codes() {
        assert_eq!(Align::parse("C"), Align::Center);
        assert_eq!(Align::parse("right"), Align::Right);
        assert_eq!(Align::parse("J"), Align::Left);
        assert_eq!(CursorMove::from_code(1), CursorMove::NextLine);
        assert_eq!(CursorMove::from_code(7), CursorMove::Right);
    }

    #[test]
    fn colors_clamp() {
        assert_eq!(Rgb::clamped(-4, 128, 999), Rgb(0, 128, 255));
    }
}
