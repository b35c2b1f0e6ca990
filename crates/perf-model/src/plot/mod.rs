//! Static plot generation.
//!
//! Produces an HTML 3-D scatter grid of measured durations and one SVG
//! chart of mean RMSRE per memory combination. Plots are pure sinks: they
//! read finished data and never touch the CSV outputs.

mod rmsre;
mod scatter3d;

pub use rmsre::{RmsreChart, rmsre_svg};
pub use scatter3d::scatter3d_html;

/// Escape text for inclusion in HTML or SVG markup.
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
