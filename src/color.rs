use std::collections::{BTreeMap, BTreeSet};

use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::{Table, Value};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Srgb<u8>> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            rgb.into_format::<u8>()
        })
        .collect()
}

/// `#rrggbb` form of a colour.
pub fn to_hex(color: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

// ---------------------------------------------------------------------------
// Series legend: series label → colour
// ---------------------------------------------------------------------------

/// Maps each series label of a table to a distinct colour, so a renderer
/// can draw one line per series.
#[derive(Debug, Clone)]
pub struct SeriesPalette {
    pub column: String,
    mapping: BTreeMap<String, Srgb<u8>>,
    default_color: Srgb<u8>,
}

impl SeriesPalette {
    /// Build a palette from the distinct labels in `series_column`.
    /// Labels are sorted, so the same set of series always gets the same colours.
    pub fn new(table: &Table, series_column: &str) -> Self {
        let labels: BTreeSet<String> = table
            .column_values(series_column)
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let palette = generate_palette(labels.len());
        let mapping = labels.into_iter().zip(palette).collect();

        SeriesPalette {
            column: series_column.to_string(),
            mapping,
            default_color: Srgb::new(128, 128, 128),
        }
    }

    /// Look up the colour for a series label.
    pub fn color_for(&self, label: &str) -> Srgb<u8> {
        self.mapping.get(label).copied().unwrap_or(self.default_color)
    }

    /// Return the legend entries (label → hex colour).
    pub fn legend_entries(&self) -> Vec<(String, String)> {
        self.mapping
            .iter()
            .map(|(label, c)| (label.clone(), to_hex(*c)))
            .collect()
    }
}
