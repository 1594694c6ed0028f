//! # PDF Surface
//!
//! A [`Surface`] that writes PDF 1.7 directly. Drawing calls append
//! operators to the current page's content stream; [`PdfSurface::finish`]
//! serializes everything into a document.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- catalog, page tree, fonts, images, pages
//! 2 0 obj ... endobj
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! Text uses the standard Type1 fonts with WinAnsiEncoding, so nothing is
//! embedded. Characters outside WinAnsi are written as `?`.
//!
//! Geometry follows the classic cell model: a cursor in user units from
//! the top-left corner, left/top/right margins, a cell margin that pads
//! text horizontally, and an automatic page break when a cell would cross
//! `page height - bottom margin`.

pub mod font;

use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>
use std::path::Path;

use miniz_oxide::deflate::compress_to_vec_zlib;
use tracing::{debug, warn};

use crate::error::FormpressError;
use crate::image_loader::{self, DecodedImage, ImageError, ImageKind, JpegColorSpace, PixelData};
use crate::model::{DocumentSetup, Orientation};
use crate::surface::{
    Align, Border, CellBox, CursorMove, ImagePlacement, NoHooks, PageHooks, Rgb, Surface,
};

use self::font::StandardFont;

/// Font and colour state that survives page changes.
#[derive(Debug, Clone, PartialEq)]
struct GraphicsState {
    font: StandardFont,
    font_size_pt: f64,
    draw_color: Rgb,
    fill_color: Rgb,
    text_color: Rgb,
    line_width: f64,
}

#[derive(Debug, Default)]
struct Page {
    content: String,
    links: Vec<LinkArea>,
    /// Font last selected in this content stream.
    selected_font: Option<(StandardFont, f64)>,
}

/// A link rectangle in points: x, y of the top-left corner, width, height.
#[derive(Debug)]
struct LinkArea {
    rect: [f64; 4],
    uri: String,
}

#[derive(Debug)]
struct ImageEntry {
    name: String,
    image: DecodedImage,
}

pub struct PdfSurface {
    /// Points per user unit.
    k: f64,
    w_pt: f64,
    h_pt: f64,
    w: f64,
    h: f64,
    l_margin: f64,
    t_margin: f64,
    r_margin: f64,
    b_margin: f64,
    c_margin: f64,
    x: f64,
    y: f64,
    /// Height of the last cell, for `ln(None)`.
    lasth: f64,
    auto_page_break: bool,
    page_break_trigger: f64,
    in_header: bool,
    in_footer: bool,
    state: GraphicsState,
    fonts: Vec<StandardFont>,
    pages: Vec<Page>,
    images: Vec<ImageEntry>,
    alias: Option<String>,
    closed: bool,
}

impl Default for PdfSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfSurface {
    /// A portrait A4 document in millimetres.
    pub fn new() -> Self {
        let mut surface = PdfSurface {
            k: 1.0,
            w_pt: 0.0,
            h_pt: 0.0,
            w: 0.0,
            h: 0.0,
            l_margin: 0.0,
            t_margin: 0.0,
            r_margin: 0.0,
            b_margin: 0.0,
            c_margin: 0.0,
            x: 0.0,
            y: 0.0,
            lasth: 0.0,
            auto_page_break: true,
            page_break_trigger: 0.0,
            in_header: false,
            in_footer: false,
            state: GraphicsState {
                font: StandardFont::Helvetica,
                font_size_pt: 12.0,
                draw_color: Rgb::BLACK,
                fill_color: Rgb::BLACK,
                text_color: Rgb::BLACK,
                line_width: 0.0,
            },
            fonts: Vec::new(),
            pages: Vec::new(),
            images: Vec::new(),
            alias: None,
            closed: false,
        };
        surface.configure(&DocumentSetup::default());
        surface
    }

    pub fn with_setup(setup: &DocumentSetup) -> Self {
        let mut surface = Self::new();
        surface.configure(setup);
        surface
    }

    /// Reset geometry for a new document setup. Margins default to 1cm,
    /// the cell margin to 1mm and the automatic break margin to 2cm.
    fn configure(&mut self, setup: &DocumentSetup) {
        self.k = setup.unit.scale();
        let (w_pt, h_pt) = setup.size.dimensions();
        let (w_pt, h_pt) = match setup.orientation {
            Orientation::Portrait => (w_pt.min(h_pt), w_pt.max(h_pt)),
            Orientation::Landscape => (w_pt.max(h_pt), w_pt.min(h_pt)),
        };
        self.w_pt = w_pt;
        self.h_pt = h_pt;
        self.w = w_pt / self.k;
        self.h = h_pt / self.k;

        let margin = 28.35 / self.k;
        self.l_margin = margin;
        self.t_margin = margin;
        self.r_margin = margin;
        self.c_margin = margin / 10.0;
        self.state.line_width = 0.567 / self.k;
        self.set_auto_page_break(true, 2.0 * margin);
    }

    /// Serialize the document. Closes the last page first when needed.
    pub fn finish(mut self) -> Vec<u8> {
        if !self.closed {
            self.close(&mut NoHooks);
        }
        self.write_document()
    }

    /// Serialize the document to a file, returning the bytes written.
    pub fn save(self, path: &Path) -> Result<usize, FormpressError> {
        let bytes = self.finish();
        std::fs::write(path, &bytes)?;
        Ok(bytes.len())
    }

    /// The raw (uncompressed) content stream of a 1-based page.
    pub fn page_content(&self, page: usize) -> Option<&str> {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .map(|p| p.content.as_str())
    }

    /// Width of a wrapping cell: zero extends from the cursor to the
    /// right margin.
    fn wrap_width(&self, width: f64) -> f64 {
        if width == 0.0 {
            self.w - self.r_margin - self.x
        } else {
            width
        }
    }

    /// Break `text` into the lines a wrapping cell of width `w` draws.
    ///
    /// Lines break at `\n`, or at the last space before the text passes the
    /// usable width; a word wider than the cell is cut between characters.
    /// Always yields at least one line, empty for empty text.
    fn wrap(&self, text: &str, w: f64) -> Vec<String> {
        let wmax = (w - 2.0 * self.c_margin) * 1000.0 / self.font_size();
        let chars: Vec<char> = text.chars().filter(|c| *c != '\r').collect();
        let mut nb = chars.len();
        if nb > 0 && chars[nb - 1] == '\n' {
            nb -= 1;
        }

        let mut lines = Vec::new();
        let (mut sep, mut i, mut j) = (None::<usize>, 0usize, 0usize);
        let mut l = 0.0;
        while i < nb {
            let c = chars[i];
            if c == '\n' {
                lines.push(chars[j..i].iter().collect());
                i += 1;
                sep = None;
                j = i;
                l = 0.0;
                continue;
            }
            if c == ' ' {
                sep = Some(i);
            }
            l += self.char_units(c);
            if l > wmax {
                match sep {
                    None => {
                        if i == j {
                            i += 1;
                        }
                        lines.push(chars[j..i].iter().collect());
                    }
                    Some(s) => {
                        lines.push(chars[j..s].iter().collect());
                        i = s + 1;
                    }
                }
                sep = None;
                j = i;
                l = 0.0;
            } else {
                i += 1;
            }
        }
        lines.push(chars[j..i].iter().collect());
        lines
    }

    fn font_size(&self) -> f64 {
        self.state.font_size_pt / self.k
    }

    fn accepts_page_break(&self) -> bool {
        self.auto_page_break && !self.in_header && !self.in_footer
    }

    fn out(&mut self, ops: &str) {
        if let Some(page) = self.pages.last_mut() {
            page.content.push_str(ops);
            page.content.push('\n');
        }
    }

    /// Drawing before the first page opens one without hooks.
    fn ensure_page(&mut self) {
        if self.pages.is_empty() {
            self.begin_page();
        }
    }

    fn begin_page(&mut self) {
        self.pages.push(Page::default());
        self.x = self.l_margin;
        self.y = self.t_margin;

        let state = self.state.clone();
        self.out(&format!("{:.2} w", state.line_width * self.k));
        if state.draw_color != Rgb::BLACK {
            self.out(&color_op(state.draw_color, "RG"));
        }
        if state.fill_color != Rgb::BLACK {
            self.out(&color_op(state.fill_color, "rg"));
        }
        debug!(page = self.pages.len(), "page started");
    }

    /// Put back font and colours changed by a header or footer program.
    fn restore_graphics(&mut self, saved: GraphicsState) {
        if self.state.line_width != saved.line_width {
            self.out(&format!("{:.2} w", saved.line_width * self.k));
        }
        if self.state.draw_color != saved.draw_color {
            self.out(&color_op(saved.draw_color, "RG"));
        }
        if self.state.fill_color != saved.fill_color {
            self.out(&color_op(saved.fill_color, "rg"));
        }
        self.state = saved;
    }

    /// Select the current font in the page's content stream if needed.
    fn select_font(&mut self) {
        let wanted = (self.state.font, self.state.font_size_pt);
        let Some(page) = self.pages.last() else {
            return;
        };
        if page.selected_font == Some(wanted) {
            return;
        }
        let index = match self.fonts.iter().position(|f| *f == wanted.0) {
            Some(i) => i,
            None => {
                self.fonts.push(wanted.0);
                self.fonts.len() - 1
            }
        };
        self.out(&format!("BT /F{} {:.2} Tf ET", index + 1, wanted.1));
        if let Some(page) = self.pages.last_mut() {
            page.selected_font = Some(wanted);
        }
    }

    fn text_width(&self, bytes: &[u8]) -> f64 {
        self.state.font.measure(bytes, self.state.font_size_pt) / self.k
    }

    fn char_units(&self, c: char) -> f64 {
        f64::from(self.state.font.byte_width(to_winansi(c)))
    }

    fn add_link(&mut self, x: f64, y: f64, w: f64, h: f64, uri: &str) {
        let k = self.k;
        let rect = [x * k, self.h_pt - y * k, w * k, h * k];
        if let Some(page) = self.pages.last_mut() {
            page.links.push(LinkArea {
                rect,
                uri: uri.to_string(),
            });
        }
    }

    fn break_if_needed(&mut self, height: f64, hooks: &mut dyn PageHooks) {
        if self.y + height > self.page_break_trigger && self.accepts_page_break() {
            let x = self.x;
            self.add_page(hooks);
            self.x = x;
        }
    }

    // ── Serialization ───────────────────────────────────────────────

    /// Page content with the page-count alias substituted.
    fn final_content(&self, page: &Page) -> String {
        match self.alias.as_deref() {
            Some(alias) => {
                let alias = escape_pdf_string(&encode_winansi(alias));
                page.content
                    .replace(&alias, &self.pages.len().to_string())
            }
            None => page.content.clone(),
        }
    }

    fn write_document(&self) -> Vec<u8> {
        let mut builder = PdfBuilder {
            objects: Vec::new(),
        };

        // Reserve object IDs:
        // 0 = placeholder (PDF objects are 1-indexed)
        // 1 = Catalog
        // 2 = Pages (page tree root)
        builder.objects.push(PdfObject { data: vec![] });
        builder.objects.push(PdfObject { data: vec![] });
        builder.objects.push(PdfObject { data: vec![] });

        let font_ids: Vec<usize> = self
            .fonts
            .iter()
            .map(|f| {
                builder.push(
                    format!(
                        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                        f.pdf_name()
                    )
                    .into_bytes(),
                )
            })
            .collect();

        let image_ids: Vec<usize> = self
            .images
            .iter()
            .map(|entry| write_image_xobject(&mut builder, &entry.image))
            .collect();

        let resources = build_resource_dict(&font_ids, &image_ids);

        let mut page_obj_ids: Vec<usize> = Vec::new();
        for page in &self.pages {
            let content = self.final_content(page);
            let compressed = compress_to_vec_zlib(content.as_bytes(), 6);
            let mut content_data: Vec<u8> = Vec::new();
            let _ = write!(
                content_data,
                "<< /Length {} /Filter /FlateDecode >>\nstream\n",
                compressed.len()
            );
            content_data.extend_from_slice(&compressed);
            content_data.extend_from_slice(b"\nendstream");
            let content_obj_id = builder.push(content_data);

            let annot_ids: Vec<usize> = page
                .links
                .iter()
                .map(|link| {
                    let [x, y, w, h] = link.rect;
                    builder.push(
                        format!(
                            "<< /Type /Annot /Subtype /Link /Rect [{:.2} {:.2} {:.2} {:.2}] \
                             /Border [0 0 0] /A << /S /URI /URI ({}) >> >>",
                            x,
                            y,
                            x + w,
                            y - h,
                            escape_pdf_string(link.uri.as_bytes())
                        )
                        .into_bytes(),
                    )
                })
                .collect();
            let annots = if annot_ids.is_empty() {
                String::new()
            } else {
                format!(" /Annots [{}]", object_refs(&annot_ids))
            };

            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << {} >>{} >>",
                self.w_pt, self.h_pt, content_obj_id, resources, annots
            );
            page_obj_ids.push(builder.push(page_dict.into_bytes()));
        }

        builder.objects[1].data = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
        builder.objects[2].data = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            object_refs(&page_obj_ids),
            page_obj_ids.len()
        )
        .into_bytes();

        let info_obj_id = builder.push(b"<< /Producer (formpress) /Creator (formpress) >>".to_vec());

        serialize(&builder, info_obj_id)
    }
}

impl Surface for PdfSurface {
    fn open(&mut self, setup: &DocumentSetup) {
        self.configure(setup);
    }

    fn add_page(&mut self, hooks: &mut dyn PageHooks) {
        let saved = self.state.clone();
        if !self.pages.is_empty() {
            self.in_footer = true;
            hooks.footer(self);
            self.in_footer = false;
            self.state = saved.clone();
        }
        self.closed = false;
        self.begin_page();

        self.in_header = true;
        hooks.header(self);
        self.in_header = false;
        if self.state != saved {
            self.restore_graphics(saved);
        }
    }

    fn close(&mut self, hooks: &mut dyn PageHooks) {
        if self.closed {
            return;
        }
        if self.pages.is_empty() {
            self.add_page(hooks);
        }
        self.in_footer = true;
        hooks.footer(self);
        self.in_footer = false;
        self.closed = true;
    }

    fn page_no(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self) -> (f64, f64) {
        (self.w, self.h)
    }

    fn auto_page_break(&self) -> (bool, f64) {
        (self.auto_page_break, self.b_margin)
    }

    fn x(&self) -> f64 {
        self.x
    }

    fn y(&self) -> f64 {
        self.y
    }

    fn set_x(&mut self, x: f64) {
        self.x = if x >= 0.0 { x } else { self.w + x };
    }

    fn set_y(&mut self, y: f64) {
        self.x = self.l_margin;
        self.y = if y >= 0.0 { y } else { self.h + y };
    }

    fn set_xy(&mut self, x: f64, y: f64) {
        self.set_y(y);
        self.set_x(x);
    }

    fn ln(&mut self, height: Option<f64>) {
        self.x = self.l_margin;
        self.y += height.unwrap_or(self.lasth);
    }

    fn set_margins(&mut self, left: f64, top: f64, right: Option<f64>) {
        self.l_margin = left;
        self.t_margin = top;
        self.r_margin = right.unwrap_or(left);
    }

    fn set_left_margin(&mut self, margin: f64) {
        self.l_margin = margin;
        if !self.pages.is_empty() && self.x < margin {
            self.x = margin;
        }
    }

    fn set_top_margin(&mut self, margin: f64) {
        self.t_margin = margin;
    }

    fn set_right_margin(&mut self, margin: f64) {
        self.r_margin = margin;
    }

    fn set_cell_margin(&mut self, margin: f64) {
        self.c_margin = margin;
    }

    fn set_auto_page_break(&mut self, auto: bool, margin: f64) {
        self.auto_page_break = auto;
        self.b_margin = margin;
        self.page_break_trigger = self.h - margin;
    }

    fn alias_nb_pages(&mut self, alias: &str) {
        let alias = if alias.is_empty() { "{nb}" } else { alias };
        self.alias = Some(alias.to_string());
    }

    fn set_font(&mut self, family: &str, style: &str, size: f64) {
        self.state.font = StandardFont::resolve(family, style);
        if size > 0.0 {
            self.state.font_size_pt = size;
        }
    }

    fn set_fill_color(&mut self, color: Rgb) {
        self.state.fill_color = color;
        if !self.pages.is_empty() {
            self.out(&color_op(color, "rg"));
        }
    }

    fn set_text_color(&mut self, color: Rgb) {
        self.state.text_color = color;
    }

    fn set_draw_color(&mut self, color: Rgb) {
        self.state.draw_color = color;
        if !self.pages.is_empty() {
            self.out(&color_op(color, "RG"));
        }
    }

    fn cell(&mut self, width: f64, height: f64, text: &str, hooks: &mut dyn PageHooks) {
        let cell = CellBox {
            width,
            height,
            text: text.to_string(),
            ..Default::default()
        };
        self.cell_format(&cell, hooks);
    }

    fn cell_format(&mut self, cell: &CellBox, hooks: &mut dyn PageHooks) {
        self.ensure_page();
        let h = cell.height;
        self.break_if_needed(h, hooks);

        let k = self.k;
        let w = if cell.width == 0.0 {
            self.w - self.r_margin - self.x
        } else {
            cell.width
        };
        let (x, y) = (self.x, self.y);
        let mut s = String::new();

        if cell.fill || cell.border.is_all() {
            let op = match (cell.fill, cell.border.is_all()) {
                (true, true) => "B",
                (true, false) => "f",
                _ => "S",
            };
            let _ = write!(
                s,
                "{:.2} {:.2} {:.2} {:.2} re {} ",
                x * k,
                (self.h - y) * k,
                w * k,
                -h * k,
                op
            );
        }

        if !cell.border.is_all() {
            let sides = [
                (cell.border.left, (x, y, x, y + h)),
                (cell.border.top, (x, y, x + w, y)),
                (cell.border.right, (x + w, y, x + w, y + h)),
                (cell.border.bottom, (x, y + h, x + w, y + h)),
            ];
            for (_, (x1, y1, x2, y2)) in sides.iter().filter(|(on, _)| *on) {
                let _ = write!(
                    s,
                    "{:.2} {:.2} m {:.2} {:.2} l S ",
                    x1 * k,
                    (self.h - y1) * k,
                    x2 * k,
                    (self.h - y2) * k
                );
            }
        }

        let mut link_area = None;
        if !cell.text.is_empty() {
            if !s.is_empty() {
                self.out(s.trim_end());
                s.clear();
            }
            self.select_font();

            let bytes = encode_winansi(&cell.text);
            let text_w = self.text_width(&bytes);
            let dx = match cell.align {
                Align::Right => w - self.c_margin - text_w,
                Align::Center => (w - text_w) / 2.0,
                Align::Left => self.c_margin,
            };
            let fs = self.font_size();
            let color_flag = self.state.text_color != self.state.fill_color;
            if color_flag {
                let _ = write!(s, "q {} ", color_op(self.state.text_color, "rg"));
            }
            let _ = write!(
                s,
                "BT {:.2} {:.2} Td ({}) Tj ET",
                (x + dx) * k,
                (self.h - (y + 0.5 * h + 0.3 * fs)) * k,
                escape_pdf_string(&bytes)
            );
            if color_flag {
                s.push_str(" Q");
            }
            if let Some(link) = cell.link.as_deref().filter(|l| !l.is_empty()) {
                link_area = Some((x + dx, y + 0.5 * h - 0.5 * fs, text_w, fs, link));
            }
        }

        if !s.is_empty() {
            self.out(s.trim_end());
        }
        if let Some((lx, ly, lw, lh, uri)) = link_area {
            self.add_link(lx, ly, lw, lh, uri);
        }

        self.lasth = h;
        match cell.cursor {
            CursorMove::Right => self.x += w,
            CursorMove::NextLine => {
                self.y += h;
                self.x = self.l_margin;
            }
            CursorMove::Below => self.y += h,
        }
    }

    fn multi_cell(&mut self, cell: &CellBox, hooks: &mut dyn PageHooks) {
        self.ensure_page();
        let w = self.wrap_width(cell.width);
        let lines = self.wrap(&cell.text, w);
        let last = lines.len().saturating_sub(1);

        for (n, text) in lines.into_iter().enumerate() {
            let border = if cell.border.is_empty() {
                Border::NONE
            } else {
                Border {
                    left: cell.border.left,
                    right: cell.border.right,
                    top: cell.border.top && n == 0,
                    bottom: cell.border.bottom && n == last,
                }
            };
            let line_cell = CellBox {
                width: w,
                height: cell.height,
                text,
                border,
                cursor: CursorMove::Below,
                align: cell.align,
                fill: cell.fill,
                link: None,
            };
            self.cell_format(&line_cell, hooks);
        }
        self.x = self.l_margin;
    }

    fn split_lines(&self, text: &str, width: f64) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        self.wrap(text, self.wrap_width(width))
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.ensure_page();
        let k = self.k;
        let ops = format!(
            "{:.2} {:.2} m {:.2} {:.2} l S",
            x1 * k,
            (self.h - y1) * k,
            x2 * k,
            (self.h - y2) * k
        );
        self.out(&ops);
    }

    fn register_image(
        &mut self,
        name: &str,
        kind: ImageKind,
        data: &[u8],
    ) -> Result<(), ImageError> {
        if self.images.iter().any(|e| e.name == name) {
            return Ok(());
        }
        let image = image_loader::decode(data, kind)?;
        self.images.push(ImageEntry {
            name: name.to_string(),
            image,
        });
        Ok(())
    }

    fn image(&mut self, placement: &ImagePlacement, hooks: &mut dyn PageHooks) {
        let Some(index) = self.images.iter().position(|e| e.name == placement.name) else {
            warn!(name = %placement.name, "image drawn before it was registered");
            return;
        };
        self.ensure_page();

        let (px_w, px_h) = {
            let image = &self.images[index].image;
            (f64::from(image.width_px), f64::from(image.height_px))
        };
        let (mut w, mut h) = (placement.width, placement.height);
        if w == 0.0 && h == 0.0 {
            w = px_w * 72.0 / 96.0 / self.k;
            h = px_h * 72.0 / 96.0 / self.k;
        }
        if w == 0.0 && px_h > 0.0 {
            w = h * px_w / px_h;
        }
        if h == 0.0 && px_w > 0.0 {
            h = w * px_h / px_w;
        }

        let mut y = placement.y;
        if placement.flow {
            self.break_if_needed(h, hooks);
            y = self.y;
            self.y += h;
        }
        let x = if placement.x < 0.0 { self.x } else { placement.x };

        let k = self.k;
        let ops = format!(
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /I{} Do Q",
            w * k,
            h * k,
            x * k,
            (self.h - (y + h)) * k,
            index + 1
        );
        self.out(&ops);
        if let Some(link) = placement.link.as_deref().filter(|l| !l.is_empty()) {
            self.add_link(x, y, w, h, link);
        }
    }
}

// ── Object writing ──────────────────────────────────────────────────

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    objects: Vec<PdfObject>,
}

struct PdfObject {
    data: Vec<u8>,
}

impl PdfBuilder {
    fn push(&mut self, data: Vec<u8>) -> usize {
        self.objects.push(PdfObject { data });
        self.objects.len() - 1
    }
}

fn object_refs(ids: &[usize]) -> String {
    ids.iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_resource_dict(font_ids: &[usize], image_ids: &[usize]) -> String {
    let fonts: Vec<String> = font_ids
        .iter()
        .enumerate()
        .map(|(i, id)| format!("/F{} {} 0 R", i + 1, id))
        .collect();
    let images: Vec<String> = image_ids
        .iter()
        .enumerate()
        .map(|(i, id)| format!("/I{} {} 0 R", i + 1, id))
        .collect();

    let mut resources = format!("/Font << {} >>", fonts.join(" "));
    if !images.is_empty() {
        let _ = write!(resources, " /XObject << {} >>", images.join(" "));
    }
    resources
}

/// Write a single image as one or two XObject PDF objects.
/// Returns the main XObject ID.
fn write_image_xobject(builder: &mut PdfBuilder, image: &DecodedImage) -> usize {
    match &image.pixels {
        PixelData::Jpeg { data, color_space } => {
            let color_space_str = match color_space {
                JpegColorSpace::DeviceRGB => "/DeviceRGB",
                JpegColorSpace::DeviceGray => "/DeviceGray",
            };
            let mut obj_data: Vec<u8> = Vec::new();
            let _ = write!(
                obj_data,
                "<< /Type /XObject /Subtype /Image \
                 /Width {} /Height {} \
                 /ColorSpace {} \
                 /BitsPerComponent 8 \
                 /Filter /DCTDecode \
                 /Length {} >>\nstream\n",
                image.width_px,
                image.height_px,
                color_space_str,
                data.len()
            );
            obj_data.extend_from_slice(data);
            obj_data.extend_from_slice(b"\nendstream");
            builder.push(obj_data)
        }

        PixelData::Decoded { rgb, alpha } => {
            let smask_id = alpha.as_ref().map(|alpha_data| {
                let compressed_alpha = compress_to_vec_zlib(alpha_data, 6);
                let mut smask_data: Vec<u8> = Vec::new();
                let _ = write!(
                    smask_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace /DeviceGray \
                     /BitsPerComponent 8 \
                     /Filter /FlateDecode \
                     /Length {} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    compressed_alpha.len()
                );
                smask_data.extend_from_slice(&compressed_alpha);
                smask_data.extend_from_slice(b"\nendstream");
                builder.push(smask_data)
            });

            let compressed_rgb = compress_to_vec_zlib(rgb, 6);
            let smask_ref = smask_id
                .map(|id| format!(" /SMask {} 0 R", id))
                .unwrap_or_default();

            let mut obj_data: Vec<u8> = Vec::new();
            let _ = write!(
                obj_data,
                "<< /Type /XObject /Subtype /Image \
                 /Width {} /Height {} \
                 /ColorSpace /DeviceRGB \
                 /BitsPerComponent 8 \
                 /Filter /FlateDecode \
                 /Length {}{} >>\nstream\n",
                image.width_px,
                image.height_px,
                compressed_rgb.len(),
                smask_ref
            );
            obj_data.extend_from_slice(&compressed_rgb);
            obj_data.extend_from_slice(b"\nendstream");
            builder.push(obj_data)
        }
    }
}

/// Serialize all objects into the final PDF byte stream.
fn serialize(builder: &PdfBuilder, info_obj_id: usize) -> Vec<u8> {
    let mut output: Vec<u8> = Vec::new();
    let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

    // Header
    output.extend_from_slice(b"%PDF-1.7\n");
    output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

    for (i, obj) in builder.objects.iter().enumerate().skip(1) {
        offsets[i] = output.len();
        let header = format!("{} 0 obj\n", i);
        output.extend_from_slice(header.as_bytes());
        output.extend_from_slice(&obj.data);
        output.extend_from_slice(b"\nendobj\n\n");
    }

    let xref_offset = output.len();
    let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
    let _ = write!(output, "0000000000 65535 f \n");
    for offset in offsets.iter().skip(1) {
        let _ = write!(output, "{:010} 00000 n \n", offset);
    }

    let _ = write!(
        output,
        "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
        builder.objects.len(),
        info_obj_id,
        xref_offset
    );

    output
}

// ── Text encoding ───────────────────────────────────────────────────

fn color_op(color: Rgb, op: &str) -> String {
    format!(
        "{:.3} {:.3} {:.3} {}",
        f64::from(color.0) / 255.0,
        f64::from(color.1) / 255.0,
        f64::from(color.2) / 255.0,
        op
    )
}

fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars().map(to_winansi).collect()
}

fn to_winansi(ch: char) -> u8 {
    unicode_to_winansi(ch).unwrap_or(b'?')
}

/// Escape a WinAnsi byte string for a PDF literal string. Bytes outside
/// printable ASCII are written as octal escapes.
fn escape_pdf_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(char::from(b)),
            _ => {
                let _ = write!(out, "\\{:03o}", b);
            }
        }
    }
    out
}

/// Map a Unicode codepoint to a WinAnsiEncoding byte value.
///
/// WinAnsiEncoding is based on Windows-1252. Most codepoints in
/// 0x20..=0x7E and 0xA0..=0xFF map directly. The 0x80..=0x9F range
/// contains special mappings for smart quotes, bullets, dashes, etc.
fn unicode_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    match cp {
        0x20AC => Some(0x80), // Euro sign
        0x201A => Some(0x82), // Single low-9 quotation mark
        0x0192 => Some(0x83), // Latin small letter f with hook
        0x201E => Some(0x84), // Double low-9 quotation mark
        0x2026 => Some(0x85), // Horizontal ellipsis
        0x2020 => Some(0x86), // Dagger
        0x2021 => Some(0x87), // Double dagger
        0x02C6 => Some(0x88), // Modifier letter circumflex accent
        0x2030 => Some(0x89), // Per mille sign
        0x0160 => Some(0x8A), // Latin capital letter S with caron
        0x2039 => Some(0x8B), // Single left-pointing angle quotation
        0x0152 => Some(0x8C), // Latin capital ligature OE
        0x017D => Some(0x8E), // Latin capital letter Z with caron
        0x2018 => Some(0x91), // Left single quotation mark
        0x2019 => Some(0x92), // Right single quotation mark
        0x201C => Some(0x93), // Left double quotation mark
        0x201D => Some(0x94), // Right double quotation mark
        0x2022 => Some(0x95), // Bullet
        0x2013 => Some(0x96), // En dash
        0x2014 => Some(0x97), // Em dash
        0x02DC => Some(0x98), // Small tilde
        0x2122 => Some(0x99), // Trade mark sign
        0x0161 => Some(0x9A), // Latin small letter s with caron
        0x203A => Some(0x9B), // Single right-pointing angle quotation
        0x0153 => Some(0x9C), // Latin small ligature oe
        0x017E => Some(0x9E), // Latin small letter z with caron
        0x0178 => Some(0x9F), // Latin capital letter Y with diaeresis
        _ => None,
    }
}
