//! Plotly 3-D scatter grid, one scene per (input 0, input 1) memory pair.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::{Value, json};

use super::escape_xml;
use crate::error::{PerfModelError, Result};
use crate::features::tiles_per_core;
use crate::schema::{Dataset, MemoryLayout, PipelineConfig};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.27.0.min.js";

#[derive(Default)]
struct Facet {
    tiles_per_core: Vec<u64>,
    core_count: Vec<u64>,
    duration_ns: Vec<f64>,
    text: Vec<String>,
}

/// Render `dataset` as a self-contained HTML page.
///
/// Records whose tiles per core cannot be derived are left out.
pub fn scatter3d_html(dataset: &Dataset, config: &PipelineConfig) -> Result<String> {
    let mut facets: BTreeMap<(MemoryLayout, MemoryLayout), Facet> = BTreeMap::new();
    for record in &dataset.records {
        let Ok(tpc) = tiles_per_core(record, config.tiles_formula) else {
            continue;
        };
        let facet = facets
            .entry((record.input_0_memory, record.input_1_memory))
            .or_default();
        facet.tiles_per_core.push(tpc);
        facet.core_count.push(record.core_count);
        facet.duration_ns.push(record.duration_ns);
        facet.text.push(format!(
            "{}x{} {} (line {})",
            record.input_0_x, record.input_0_y, record.input_0_datatype, record.line
        ));
    }
    if facets.is_empty() {
        return Err(PerfModelError::invalid("no plottable records"));
    }

    let (traces, layout) = figure(&facets, &config.name);
    let mut out = String::new();
    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html>");
    let _ = writeln!(out, "<head>");
    let _ = writeln!(out, "<meta charset=\"utf-8\">");
    let _ = writeln!(out, "<title>{}</title>", escape_xml(&config.name));
    let _ = writeln!(out, "<script src=\"{PLOTLY_CDN}\"></script>");
    let _ = writeln!(out, "</head>");
    let _ = writeln!(out, "<body>");
    let _ = writeln!(
        out,
        "<div id=\"plot\" style=\"width:100%;height:{}px;\"></div>",
        450 * grid_shape(facets.len()).0
    );
    let _ = writeln!(out, "<script>");
    let _ = writeln!(
        out,
        "Plotly.newPlot(\"plot\", {}, {});",
        script_json(&traces)?,
        script_json(&layout)?
    );
    let _ = writeln!(out, "</script>");
    let _ = writeln!(out, "</body>");
    let _ = writeln!(out, "</html>");
    Ok(out)
}

/// Rows and columns of a near-square grid holding `n` scenes.
fn grid_shape(n: usize) -> (usize, usize) {
    let mut cols = 1;
    while cols * cols < n {
        cols += 1;
    }
    (n.div_ceil(cols), cols)
}

fn scene_id(index: usize) -> String {
    if index == 0 {
        "scene".to_string()
    } else {
        format!("scene{}", index + 1)
    }
}

#[allow(clippy::cast_precision_loss)]
fn figure(facets: &BTreeMap<(MemoryLayout, MemoryLayout), Facet>, title: &str) -> (Value, Value) {
    let (rows, cols) = grid_shape(facets.len());
    let mut traces = Vec::with_capacity(facets.len());
    let mut layout = json!({
        "title": { "text": title },
        "showlegend": true,
        "margin": { "l": 0, "r": 0, "t": 40, "b": 0 },
    });

    for (i, ((in0, in1), facet)) in facets.iter().enumerate() {
        let scene = scene_id(i);
        traces.push(json!({
            "type": "scatter3d",
            "mode": "markers",
            "name": format!("{in0} / {in1}"),
            "scene": scene,
            "x": facet.tiles_per_core,
            "y": facet.core_count,
            "z": facet.duration_ns,
            "text": facet.text,
            "marker": { "size": 3 },
        }));

        let (row, col) = (i / cols, i % cols);
        layout[scene.as_str()] = json!({
            "domain": {
                "x": [col as f64 / cols as f64, (col + 1) as f64 / cols as f64],
                "y": [1.0 - (row + 1) as f64 / rows as f64, 1.0 - row as f64 / rows as f64],
            },
            "xaxis": { "title": { "text": "tiles per core" } },
            "yaxis": { "title": { "text": "core count" } },
            "zaxis": { "title": { "text": "duration [ns]" } },
        });
    }
    (Value::Array(traces), layout)
}

/// JSON safe to embed inside a `<script>` element.
fn script_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}
