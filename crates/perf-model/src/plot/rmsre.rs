//! Mean RMSRE against `num_tiles`, one SVG per (input, output) memory pair.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::escape_xml;
use crate::aggregate::AggregatedRecord;
use crate::schema::{DataType, MemoryLayout};

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 420.0;
const LEFT: f64 = 70.0;
const RIGHT: f64 = 150.0;
const TOP: f64 = 40.0;
const BOTTOM: f64 = 50.0;
const TICKS: usize = 5;

/// A rendered chart for one memory combination.
#[derive(Debug, Clone)]
pub struct RmsreChart {
    pub input_memory: MemoryLayout,
    pub output_memory: MemoryLayout,
    pub svg: String,
}

impl RmsreChart {
    pub fn file_name(&self) -> String {
        format!("rmsre_{}_{}.svg", self.input_memory, self.output_memory)
    }
}

fn color(datatype: DataType) -> &'static str {
    match datatype {
        DataType::Bfloat16 => "#1f77b4",
        DataType::Bfloat8B => "#ff7f0e",
        DataType::Bfloat4B => "#2ca02c",
    }
}

type Series = BTreeMap<DataType, Vec<(u64, f64)>>;

/// One chart per memory combination present in `aggregated`.
pub fn rmsre_svg(aggregated: &[AggregatedRecord]) -> Vec<RmsreChart> {
    let mut charts: BTreeMap<(MemoryLayout, MemoryLayout), Series> = BTreeMap::new();
    for r in aggregated {
        charts
            .entry((r.input_memory, r.output_memory))
            .or_default()
            .entry(r.datatype)
            .or_default()
            .push((r.num_tiles, r.mean_rmsre));
    }
    charts
        .into_iter()
        .map(|((input_memory, output_memory), mut series)| {
            for points in series.values_mut() {
                points.sort_by_key(|&(tiles, _)| tiles);
            }
            RmsreChart {
                input_memory,
                output_memory,
                svg: render(&format!("{input_memory} → {output_memory}"), &series),
            }
        })
        .collect()
}

struct Scale {
    lo: f64,
    hi: f64,
    from: f64,
    to: f64,
}

impl Scale {
    fn new(lo: f64, hi: f64, from: f64, to: f64) -> Self {
        let hi = if hi > lo { hi } else { lo + 1.0 };
        Self { lo, hi, from, to }
    }

    fn map(&self, v: f64) -> f64 {
        self.from + (v - self.lo) / (self.hi - self.lo) * (self.to - self.from)
    }

    fn tick(&self, i: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let t = i as f64 / TICKS as f64;
        self.lo + t * (self.hi - self.lo)
    }
}

#[allow(clippy::cast_precision_loss)]
fn render(title: &str, series: &Series) -> String {
    let points = series.values().flatten();
    let max_tiles = points.clone().map(|&(t, _)| t).max().unwrap_or(0) as f64;
    let min_tiles = points.clone().map(|&(t, _)| t).min().unwrap_or(0) as f64;
    let max_rmsre = points.map(|&(_, r)| r).fold(0.0, f64::max);

    let x = Scale::new(min_tiles, max_tiles, LEFT, WIDTH - RIGHT);
    let y = Scale::new(0.0, max_rmsre * 1.1, HEIGHT - BOTTOM, TOP);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\" font-family=\"sans-serif\" font-size=\"12\">"
    );
    let _ = writeln!(out, "<rect width=\"100%\" height=\"100%\" fill=\"white\"/>");
    let _ = writeln!(
        out,
        "<text x=\"{:.1}\" y=\"24\" text-anchor=\"middle\" font-size=\"14\">{}</text>",
        (LEFT + WIDTH - RIGHT) / 2.0,
        escape_xml(title)
    );
    write_axes(&mut out, &x, &y);

    for (i, (datatype, points)) in series.iter().enumerate() {
        let stroke = color(*datatype);
        let coords: Vec<String> = points
            .iter()
            .map(|&(t, r)| format!("{:.1},{:.1}", x.map(t as f64), y.map(r)))
            .collect();
        let _ = writeln!(
            out,
            "<polyline fill=\"none\" stroke=\"{stroke}\" stroke-width=\"2\" points=\"{}\"/>",
            coords.join(" ")
        );
        for &(t, r) in points {
            let _ = writeln!(
                out,
                "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"{stroke}\"><title>{t} tiles: {r:.4}</title></circle>",
                x.map(t as f64),
                y.map(r)
            );
        }
        let ly = TOP + 20.0 * i as f64;
        let lx = WIDTH - RIGHT + 15.0;
        let _ = writeln!(
            out,
            "<line x1=\"{lx:.1}\" y1=\"{ly:.1}\" x2=\"{:.1}\" y2=\"{ly:.1}\" stroke=\"{stroke}\" stroke-width=\"2\"/>",
            lx + 20.0
        );
        let _ = writeln!(
            out,
            "<text x=\"{:.1}\" y=\"{:.1}\">{datatype}</text>",
            lx + 26.0,
            ly + 4.0
        );
    }
    let _ = writeln!(out, "</svg>");
    out
}

fn write_axes(out: &mut String, x: &Scale, y: &Scale) {
    let _ = writeln!(
        out,
        "<line x1=\"{LEFT}\" y1=\"{0}\" x2=\"{1}\" y2=\"{0}\" stroke=\"black\"/>",
        HEIGHT - BOTTOM,
        WIDTH - RIGHT
    );
    let _ = writeln!(
        out,
        "<line x1=\"{LEFT}\" y1=\"{TOP}\" x2=\"{LEFT}\" y2=\"{}\" stroke=\"black\"/>",
        HEIGHT - BOTTOM
    );
    for i in 0..=TICKS {
        let xv = x.tick(i);
        let _ = writeln!(
            out,
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{xv:.0}</text>",
            x.map(xv),
            HEIGHT - BOTTOM + 18.0
        );
        let yv = y.tick(i);
        let _ = writeln!(
            out,
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\">{yv:.3}</text>",
            LEFT - 6.0,
            y.map(yv) + 4.0
        );
    }
    let _ = writeln!(
        out,
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">Num Tiles</text>",
        (LEFT + WIDTH - RIGHT) / 2.0,
        HEIGHT - 10.0
    );
    let _ = writeln!(
        out,
        "<text x=\"16\" y=\"{:.1}\" text-anchor=\"middle\" transform=\"rotate(-90 16 {:.1})\">Mean RMSRE</text>",
        (TOP + HEIGHT - BOTTOM) / 2.0,
        (TOP + HEIGHT - BOTTOM) / 2.0
    );
}
