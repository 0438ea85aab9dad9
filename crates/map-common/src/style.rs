//! Style configuration for rendering points, lines, polygons and text.

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl HorizontalAlign {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" => Some(HorizontalAlign::Left),
            "center" => Some(HorizontalAlign::Center),
            "right" => Some(HorizontalAlign::Right),
            _ => None,
        }
    }
}

/// Vertical text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

impl VerticalAlign {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "top" => Some(VerticalAlign::Top),
            "middle" => Some(VerticalAlign::Middle),
            "bottom" => Some(VerticalAlign::Bottom),
            _ => None,
        }
    }
}

/// A font reference by family name and pixel size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub name: String,
    pub size: u32,
}

/// Mutable style value for map rendering.
///
/// Setters are best-effort: invalid values (negative widths, unknown
/// alignment strings, zero wrap widths) are silently ignored so a style
/// built from untrusted configuration degrades to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapStyle {
    color: Option<Color>,
    border_color: Option<Color>,
    border_width: Option<f32>,
    font: Option<FontSpec>,
    align: HorizontalAlign,
    valign: VerticalAlign,
    text_wrap: Option<u32>,
}

impl MapStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = Some(color);
    }

    pub fn border_color(&self) -> Option<Color> {
        self.border_color
    }

    pub fn set_border_color(&mut self, color: Color) {
        self.border_color = Some(color);
    }

    pub fn border_width(&self) -> Option<f32> {
        self.border_width
    }

    /// Negative widths are ignored.
    pub fn set_border_width(&mut self, width: f32) {
        if width < 0.0 {
            return;
        }
        self.border_width = Some(width);
    }

    pub fn font(&self) -> Option<&FontSpec> {
        self.font.as_ref()
    }

    pub fn set_font(&mut self, name: &str, size: u32) {
        self.font = Some(FontSpec {
            name: name.to_string(),
            size,
        });
    }

    pub fn text_align(&self) -> HorizontalAlign {
        self.align
    }

    /// Unknown alignment strings are ignored.
    pub fn set_text_align(&mut self, align: &str) {
        if let Some(a) = HorizontalAlign::parse(align) {
            self.align = a;
        }
    }

    pub fn text_valign(&self) -> VerticalAlign {
        self.valign
    }

    /// Unknown alignment strings are ignored.
    pub fn set_text_valign(&mut self, valign: &str) {
        if let Some(v) = VerticalAlign::parse(valign) {
            self.valign = v;
        }
    }

    pub fn text_wrap(&self) -> Option<u32> {
        self.text_wrap
    }

    /// Wrap widths below one pixel are ignored.
    pub fn set_text_wrap(&mut self, pixels: u32) {
        if pixels < 1 {
            return;
        }
        self.text_wrap = Some(pixels);
    }

    /// Parse a hex color, falling back to black for anything unparsable.
    pub fn color_from_hex(hex: &str) -> Color {
        Color::from_hex(hex).unwrap_or(Color::BLACK)
    }
}
