//! Integration tests for the formpress rendering pipeline.
//!
//! These tests drive the public API from JSON input to surface calls and
//! PDF bytes. They verify:
//! - Every cell of a table row ends at the same height
//! - Rows are moved whole to the next page instead of being split
//! - Targets missing from a row render as blank padding
//! - Form bodies alternate templates and read metadata operands
//! - Renders are deterministic and PDF output is structurally valid

use formpress::surface::CellBox;
use formpress::{
    instruction, render, render_pdf, FormpressError, PdfSurface, RecordingSurface, RenderData,
    RenderOptions, SurfaceCall,
};
use serde_json::{json, Value};

// ─── Helpers ────────────────────────────────────────────────────

fn data(value: Value) -> RenderData {
    serde_json::from_value(value).unwrap()
}

fn record(program: Value, data: &RenderData) -> Vec<SurfaceCall> {
    let program = instruction::parse(&program).unwrap();
    let mut surface = RecordingSurface::new(PdfSurface::new());
    render(&mut surface, &program, data, &RenderOptions::default()).unwrap();
    surface.into_parts().1
}

/// (x, y, text) of every wrapping cell drawn.
fn multi_cells(calls: &[SurfaceCall]) -> Vec<(f64, f64, String)> {
    calls
        .iter()
        .filter_map(|call| match call {
            SurfaceCall::MultiCell { x, y, cell } => Some((*x, *y, cell.text.clone())),
            _ => None,
        })
        .collect()
}

fn texts(calls: &[SurfaceCall]) -> Vec<String> {
    multi_cells(calls).into_iter().map(|(_, _, text)| text).collect()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// Two columns of wrapping cells, each 40 wide with 5-unit lines.
fn two_column_row() -> Value {
    json!([
        { "setx": { "x": 10 } },
        { "multicell": { "width": 40, "height": 5, "attribute": "value" } },
        { "rowy": {} },
        { "setx": { "x": 60 } },
        { "multicell": { "width": 40, "height": 5, "attribute": "value" } }
    ])
}

fn two_row_table() -> RenderData {
    data(json!({
        "tables": [{
            "rows": [
                { "cells": [
                    { "key": "name", "value": "x" },
                    { "key": "notes", "value": "a<br>b<br>c" }
                ] },
                { "cells": [
                    { "key": "name", "value": "y" },
                    { "key": "notes", "value": "d" }
                ] }
            ]
        }]
    }))
}

// ─── Table rows ─────────────────────────────────────────────────

#[test]
fn short_cells_are_padded_to_the_row_height() {
    let calls = record(
        json!([{ "addpage": {} }, { "table": { "body": [{ "row": two_column_row() }] } }]),
        &two_row_table(),
    );
    let cells = multi_cells(&calls);

    // Row 1: "x" plus two blank lines beside a three-line cell.
    assert_eq!(cells.len(), 6);
    let (x, y, text) = &cells[0];
    assert!(close(*x, 10.0) && close(*y, 10.0));
    assert_eq!(text, "x");
    assert!(close(cells[1].1, 15.0) && cells[1].2.is_empty());
    assert!(close(cells[2].1, 20.0) && cells[2].2.is_empty());
    assert!(close(cells[1].0, 10.0) && close(cells[2].0, 10.0));
    let (x, y, text) = &cells[3];
    assert!(close(*x, 60.0) && close(*y, 10.0));
    assert_eq!(text, "a\nb\nc");

    // Row 2 starts where the tallest cell of row 1 ended.
    assert!(close(cells[4].1, 25.0));
    assert!(close(cells[5].1, 25.0));
    assert_eq!(texts(&calls)[4..], ["y".to_string(), "d".to_string()]);
}

#[test]
fn row_that_does_not_fit_moves_to_the_next_page() {
    let calls = record(
        json!([
            { "addpage": {} },
            { "cellformat": { "width": 20, "height": 5, "text": "top", "line": 1 } },
            { "sety": { "y": 265 } },
            { "table": { "body": [{ "row": two_column_row() }] } }
        ]),
        &two_row_table(),
    );

    // The first row is three lines (15) tall; 265 + 15 passes the 277 trigger.
    let add_pages: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, SurfaceCall::AddPage { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(add_pages.len(), 2);
    let first_cell = calls
        .iter()
        .position(|c| matches!(c, SurfaceCall::MultiCell { .. }))
        .unwrap();
    assert!(add_pages[1] < first_cell);

    // The whole row lands at the top of page 2, unsplit.
    let cells = multi_cells(&calls);
    assert!(close(cells[0].1, 10.0));
    assert!(close(cells[3].1, 10.0));
    assert!(close(cells[2].1, 20.0));
}

#[test]
fn row_on_a_fresh_page_is_placed_even_when_too_tall() {
    let tall = (0..80).map(|i| i.to_string()).collect::<Vec<_>>().join("<br>");
    let data = data(json!({ "tables": [{ "rows": [{ "cells": [{ "value": tall }] }] }] }));
    let calls = record(
        json!([
            { "addpage": {} },
            { "table": { "body": [{ "row": [
                { "multicell": { "width": 40, "height": 5, "attribute": "value" } }
            ] }] } }
        ]),
        &data,
    );
    let first_cell = calls
        .iter()
        .position(|c| matches!(c, SurfaceCall::MultiCell { .. }))
        .unwrap();
    let pages_before = calls[..first_cell]
        .iter()
        .filter(|c| matches!(c, SurfaceCall::AddPage { .. }))
        .count();
    assert_eq!(pages_before, 1);
}

#[test]
fn missing_target_renders_blank_padding() {
    let data = data(json!({
        "tables": [{ "rows": [{ "cells": [
            { "key": "notes", "value": "a<br>b" }
        ] }] }]
    }));
    let calls = record(
        json!([
            { "addpage": {} },
            { "table": { "body": [{ "row": [
                { "multicell": { "width": 40, "height": 5, "attribute": "value", "target": "notes" } },
                { "rowy": {} },
                { "setx": { "x": 60 } },
                { "multicell": { "width": 40, "height": 5, "attribute": "value", "target": "absent" } }
            ] }] } }
        ]),
        &data,
    );
    assert_eq!(
        texts(&calls),
        ["a\nb".to_string(), String::new(), String::new()]
    );
}

#[test]
fn target_falls_back_to_a_global() {
    let data = data(json!({
        "tables": [{ "rows": [{ "cells": [{ "key": "name", "value": "Widget" }] }] }],
        "globals": { "company": "Acme" }
    }));
    let calls = record(
        json!([
            { "addpage": {} },
            { "table": { "body": [{ "row": [
                { "multicell": { "width": 40, "height": 5, "attribute": "value", "target": "company" } }
            ] }] } }
        ]),
        &data,
    );
    assert_eq!(texts(&calls), ["Acme".to_string()]);
}

#[test]
fn measured_lines_match_drawn_lines_near_the_wrap_limit() {
    // Ten Helvetica "a" glyphs at 8pt just overflow a 17.689 wide cell.
    let data = data(json!({
        "tables": [{ "rows": [{ "cells": [
            { "key": "long", "value": "aaaaaaaaaa" },
            { "key": "short", "value": "b" }
        ] }] }]
    }));
    let calls = record(
        json!([
            { "addpage": {} },
            { "setfont": { "family": "Arial", "size": 8 } },
            { "table": { "body": [{ "row": [
                { "setx": { "x": 10 } },
                { "multicell": { "width": 17.689, "height": 5, "attribute": "value" } },
                { "rowy": {} },
                { "setx": { "x": 60 } },
                { "multicell": { "width": 40, "height": 5, "attribute": "value" } }
            ] }] } }
        ]),
        &data,
    );
    let cells = multi_cells(&calls);
    assert_eq!(
        texts(&calls),
        ["aaaaaaaaaa".to_string(), "b".to_string(), String::new()]
    );
    assert!(close(cells[1].1, 10.0) && close(cells[2].1, 15.0));
}

#[test]
fn full_width_cell_does_not_force_a_break() {
    let data = data(json!({
        "tables": [{ "rows": [{ "cells": [{ "value": "Hello world" }] }] }]
    }));
    let calls = record(
        json!([
            { "addpage": {} },
            { "cellformat": { "width": 20, "height": 5, "text": "top", "line": 1 } },
            { "sety": { "y": 230 } },
            { "table": { "body": [{ "row": [
                { "multicell": { "height": 5, "attribute": "value" } }
            ] }] } }
        ]),
        &data,
    );
    let pages = calls
        .iter()
        .filter(|c| matches!(c, SurfaceCall::AddPage { .. }))
        .count();
    assert_eq!(pages, 1);
    let cells = multi_cells(&calls);
    assert_eq!(cells.len(), 1);
    assert!(close(cells[0].1, 230.0));
}

#[test]
fn looped_target_draws_a_cell_from_another_table() {
    let data = data(json!({
        "tables": [
            { "rows": [{ "cells": [{ "key": "item", "value": "Widget" }] }] },
            { "rows": [{ "cells": [{ "key": "grand", "value": "99.00" }] }] }
        ]
    }));
    let calls = record(
        json!([
            { "addpage": {} },
            { "table": { "body": [{ "row": [
                { "multicell": {
                    "width": 40, "height": 5, "attribute": "value",
                    "target": "grand", "loop": true
                } }
            ] }] } }
        ]),
        &data,
    );
    assert_eq!(texts(&calls), ["99.00".to_string()]);
}

#[test]
fn cell_format_hint_is_applied() {
    let data = data(json!({
        "tables": [{ "rows": [{ "cells": [
            { "key": "fee", "value": 1234.5, "format": "currency" }
        ] }] }]
    }));
    let calls = record(
        json!([
            { "addpage": {} },
            { "table": { "body": [{ "row": [
                { "multicell": { "width": 40, "height": 5, "attribute": "value" } }
            ] }] } }
        ]),
        &data,
    );
    assert_eq!(texts(&calls), ["£1,234.50".to_string()]);
}

#[test]
fn table_outside_the_data_is_an_error() {
    let program = instruction::parse(&json!([{ "table": { "index": 4, "body": [] } }])).unwrap();
    let mut surface = PdfSurface::new();
    let err = render(&mut surface, &program, &two_row_table(), &RenderOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        FormpressError::OutOfBounds { what: "table", index: 4, len: 1 }
    ));
}

// ─── Form mode ──────────────────────────────────────────────────

fn registry() -> RenderData {
    data(json!({
        "fields": [
            { "key": "name", "title": "Name", "value": "Ada" },
            { "key": "age", "title": "Age", "value": 36 },
            { "key": "city", "title": "City", "value": "London" }
        ],
        "form": { "title": "Membership" }
    }))
}

#[test]
fn form_alternates_main_and_alternative_templates() {
    let calls = record(
        json!([
            { "addpage": {} },
            { "form": {
                "main": [
                    { "setx": { "x": 11 } },
                    { "multicellformfield": { "width": 40, "height": 5, "attribute": "title" } }
                ],
                "alternative": [
                    { "setx": { "x": 22 } },
                    { "multicellformfield": { "width": 40, "height": 5, "attribute": "value" } }
                ]
            } }
        ]),
        &registry(),
    );
    let xs: Vec<f64> = calls
        .iter()
        .filter_map(|c| match c {
            SurfaceCall::SetX(x) => Some(*x),
            _ => None,
        })
        .collect();
    assert_eq!(xs, [11.0, 22.0, 11.0]);
    assert_eq!(
        texts(&calls),
        ["Name".to_string(), "36".to_string(), "City".to_string()]
    );
}

#[test]
fn form_start_past_the_registry_is_an_error() {
    let program = instruction::parse(&json!([{ "form": { "start": 9, "main": [] } }])).unwrap();
    let mut surface = PdfSurface::new();
    let err =
        render(&mut surface, &program, &registry(), &RenderOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        FormpressError::OutOfBounds { what: "field", index: 9, len: 3 }
    ));
}

#[test]
fn form_title_operand_feeds_cell_text() {
    let calls = record(
        json!([
            { "addpage": {} },
            { "multicell": { "width": 80, "height": 6, "text": { "form": "title" } } }
        ]),
        &registry(),
    );
    assert_eq!(texts(&calls), ["Membership".to_string()]);
}

// ─── Headers and footers ────────────────────────────────────────

#[test]
fn footer_runs_on_every_page_including_the_last() {
    let calls = record(
        json!([
            { "setfooterfunc": { "body": [
                { "cell": { "width": 20, "height": 5, "text": "p{nn}" } }
            ] } },
            { "addpage": {} },
            { "addpage": {} }
        ]),
        &RenderData::default(),
    );
    let footers: Vec<&str> = calls
        .iter()
        .filter_map(|c| match c {
            SurfaceCall::Cell { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(footers, ["p1", "p2"]);
}

// ─── Whole documents ────────────────────────────────────────────

#[test]
fn unknown_operations_do_not_stop_the_render() {
    let calls = record(
        json!([
            { "addpage": {} },
            { "drawrainbow": { "colours": 7 } },
            { "cellformat": { "width": 30, "height": 5, "text": "after" } }
        ]),
        &RenderData::default(),
    );
    assert!(calls.iter().any(|c| matches!(
        c,
        SurfaceCall::CellFormat { cell: CellBox { text, .. }, .. } if text == "after"
    )));
}

#[test]
fn malformed_tree_is_rejected() {
    let err = render_pdf(r#"{"addpage": {}}"#, &RenderData::default(), &RenderOptions::default())
        .unwrap_err();
    assert!(matches!(err, FormpressError::InvalidOperation(_)));

    let err = render_pdf("[{", &RenderData::default(), &RenderOptions::default()).unwrap_err();
    assert!(matches!(err, FormpressError::Parse { .. }));
}

#[test]
fn renders_are_deterministic() {
    let program = json!([
        { "addpage": {} },
        { "setfont": { "family": "Arial", "size": 10 } },
        { "table": { "body": [{ "row": two_column_row() }] } }
    ]);
    let first = record(program.clone(), &two_row_table());
    let second = record(program, &two_row_table());
    assert_eq!(first, second);
}

#[test]
fn render_pdf_produces_a_pdf() {
    let program = json!([
        { "new": { "orientation": "P", "unit": "mm", "size": "A4" } },
        { "aliasnbpages": { "alias": "{nb}" } },
        { "addpage": {} },
        { "setfont": { "family": "Helvetica", "style": "B", "size": 12 } },
        { "cellformat": { "width": 0, "height": 8, "text": "Page {nn} of {nb}", "line": 1 } },
        { "table": { "body": [{ "row": two_column_row() }] } }
    ])
    .to_string();

    let bytes = render_pdf(&program, &two_row_table(), &RenderOptions::default()).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    let tail = String::from_utf8_lossy(&bytes[bytes.len().saturating_sub(32)..]).to_string();
    assert!(tail.contains("%%EOF"));

    let again = render_pdf(&program, &two_row_table(), &RenderOptions::default()).unwrap();
    assert_eq!(bytes, again);
}
