//! ZPL for 50x25 mm product labels, single or two across.

use std::fmt::Write;

use serde_json::{Map, Value};

use super::template::value_to_string;
use crate::config::LabelConfig;

const DESCRIPTION_MAX_CHARS: usize = 28;
const LOT_MAX_CHARS: usize = 8;
const EXPIRY_MAX_CHARS: usize = 10;

/// Dot geometry derived from the physical label size and printer resolution.
struct Layout {
    width: i64,
    height: i64,
    margin_left: i64,
    margin_top: i64,
    gap: i64,
    scale: f64,
}

impl Layout {
    fn new(config: &LabelConfig) -> Self {
        let dpi = if config.dpi == 0 { 300 } else { config.dpi };
        let dots_per_mm = dpi as f64 / 25.4;
        Self {
            width: (config.width_mm as f64 * dots_per_mm) as i64,
            height: (config.height_mm as f64 * dots_per_mm) as i64,
            margin_left: ((config.margin_left_mm as f64 * dots_per_mm) as i64).max(5),
            margin_top: ((config.margin_top_mm as f64 * dots_per_mm) as i64).max(5),
            gap: (config.column_gap_mm.max(0.0) * dots_per_mm) as i64,
            // Font sizes are tuned for 203 dpi heads.
            scale: dpi as f64 / 203.0,
        }
    }

    fn font(&self, base: f64, min: i64) -> i64 {
        ((base * self.scale) as i64).max(min)
    }
}

pub fn product_label(data: &Map<String, Value>, config: &LabelConfig) -> String {
    let layout = Layout::new(config);
    let mut zpl = header(layout.width, layout.height);
    product_fields(&mut zpl, data, &layout, 0);
    zpl.push_str("^XZ");
    zpl
}

/// Two product labels side by side on a two-across liner.
pub fn dual_column_label(
    left: &Map<String, Value>,
    right: &Map<String, Value>,
    config: &LabelConfig,
) -> String {
    let layout = Layout::new(config);
    let mut zpl = header(layout.width * 2 + layout.gap, layout.height);
    product_fields(&mut zpl, left, &layout, 0);
    product_fields(&mut zpl, right, &layout, layout.width + layout.gap);
    zpl.push_str("^XZ");
    zpl
}

fn header(print_width: i64, label_length: i64) -> String {
    // ^CI28: UTF-8, ^PQ1: one copy, ^LH0,0: home at top-left
    format!("^XA\n^CI28\n^PQ1\n^PW{print_width}^LL{label_length}^LH0,0\n")
}

fn product_fields(zpl: &mut String, data: &Map<String, Value>, layout: &Layout, x_offset: i64) {
    let code = field(data, &["code", "codigo"]);
    let description = field(data, &["description", "descricao"]);
    let description2 = field(data, &["description2", "descricao2"]);
    let reference = match field(data, &["ref", "reference"]) {
        r if r.is_empty() => code.clone(),
        r => r,
    };
    let order = field(data, &["order", "pedido"]);
    let barcode = field(data, &["barcode", "ean", "codigo_barras"]).trim().to_string();
    let lot = field(data, &["lot", "lote"]);
    let expiry = field(data, &["expiry", "validade"]);

    let f_desc = layout.font(18.0, 18);
    let f_desc2 = layout.font(15.0, 15);
    let f_ref = layout.font(14.0, 14);
    let f_barcode = layout.font(36.0, 28);
    let f_lot = layout.font(12.0, 12);

    let x = x_offset + layout.margin_left;
    let mut y = layout.margin_top;

    if !description.is_empty() {
        let line = truncate(&description, DESCRIPTION_MAX_CHARS);
        text_field(zpl, x, y, f_desc, &line);
        y += (f_desc as f64 * 1.2) as i64;
    }

    if !description2.is_empty() {
        text_field(zpl, x, y, f_desc2, &description2);
        y += (f_desc2 as f64 * 1.2) as i64;
    }

    if !reference.is_empty() || !order.is_empty() {
        if !reference.is_empty() {
            text_field(zpl, x, y, f_ref, &format!("REF:{reference}"));
        }
        if !order.is_empty() {
            let order_x = x_offset + layout.width - (90.0 * layout.scale) as i64;
            text_field(zpl, order_x, y, f_ref, &format!("Order:{order}"));
        }
        y += (f_ref as f64 * 1.2) as i64;
    }

    if !barcode.is_empty() {
        let is_ean13 = barcode.len() == 13 && barcode.chars().all(|c| c.is_ascii_digit());
        let symbology = if is_ean13 {
            format!("^BEN,{f_barcode},Y,N")
        } else {
            format!("^BCN,{f_barcode},Y,N,N")
        };
        let _ = writeln!(zpl, "^FO{x},{y}^BY2{symbology}^FH^FD{}^FS", escape(&barcode));
        y += (f_barcode as f64 * 1.4) as i64;
    }

    if !lot.is_empty() || !expiry.is_empty() {
        let mut parts = Vec::new();
        if !lot.is_empty() {
            parts.push(format!("Lot:{}", truncate(&lot, LOT_MAX_CHARS)));
        }
        if !expiry.is_empty() {
            parts.push(format!("Exp:{}", truncate(&expiry, EXPIRY_MAX_CHARS)));
        }
        text_field(zpl, x, y, f_lot, &parts.join(" "));
    }
}

fn text_field(zpl: &mut String, x: i64, y: i64, size: i64, text: &str) {
    let _ = writeln!(zpl, "^FO{x},{y}^A0N,{size},{size}^FH^FD{}^FS", escape(text));
}

/// Hex-escape characters ZPL would read as command prefixes inside ^FH fields.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '_' => out.push_str("_5F"),
            '^' => out.push_str("_5E"),
            '~' => out.push_str("_7E"),
            c => out.push(c),
        }
    }
    out
}

fn field(data: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| data.get(*k))
        .map(value_to_string)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
