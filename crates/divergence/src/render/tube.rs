use crate::{Error, Material, Result};
use core::fmt::Write as _;
use std::path::Path;

/// Width of a single tube, in pixels.
pub const TUBE_WIDTH: u32 = 88;
/// Height of a single tube, in pixels.
pub const TUBE_HEIGHT: u32 = 255;

// Cathode outline: seven segments inside the glass envelope.
const LEFT: f32 = 20.0;
const RIGHT: f32 = 68.0;
const TOP: f32 = 48.0;
const MIDDLE: f32 = 127.0;
const BOTTOM: f32 = 207.0;

type Segment = ((f32, f32), (f32, f32));

const SEG_A: Segment = ((LEFT, TOP), (RIGHT, TOP));
const SEG_B: Segment = ((RIGHT, TOP), (RIGHT, MIDDLE));
const SEG_C: Segment = ((RIGHT, MIDDLE), (RIGHT, BOTTOM));
const SEG_D: Segment = ((LEFT, BOTTOM), (RIGHT, BOTTOM));
const SEG_E: Segment = ((LEFT, MIDDLE), (LEFT, BOTTOM));
const SEG_F: Segment = ((LEFT, TOP), (LEFT, MIDDLE));
const SEG_G: Segment = ((LEFT, MIDDLE), (RIGHT, MIDDLE));

const CATHODES: [&[Segment]; 10] = [
    &[SEG_A, SEG_B, SEG_C, SEG_D, SEG_E, SEG_F],
    &[SEG_B, SEG_C],
    &[SEG_A, SEG_B, SEG_G, SEG_E, SEG_D],
    &[SEG_A, SEG_B, SEG_G, SEG_C, SEG_D],
    &[SEG_F, SEG_G, SEG_B, SEG_C],
    &[SEG_A, SEG_F, SEG_G, SEG_C, SEG_D],
    &[SEG_A, SEG_F, SEG_G, SEG_E, SEG_D, SEG_C],
    &[SEG_A, SEG_B, SEG_C],
    &[SEG_A, SEG_B, SEG_C, SEG_D, SEG_E, SEG_F, SEG_G],
    &[SEG_A, SEG_B, SEG_C, SEG_D, SEG_F, SEG_G],
];

/// How one material paints a cathode.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MaterialStyle {
    /// SVG colour, e.g. `#ff8a2a`.
    pub color: String,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Glow blur radius; `0` disables the halo.
    #[serde(default)]
    pub glow: f32,
}

fn default_opacity() -> f32 {
    1.0
}

/// The three cathode materials plus the glass envelope colours.
///
/// All three materials are required when a theme is loaded from disk; a theme
/// that lacks one cannot render the display and fails startup.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TubeTheme {
    pub on: MaterialStyle,
    pub half: MaterialStyle,
    pub off: MaterialStyle,
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default = "default_glass")]
    pub glass: String,
}

fn default_background() -> String {
    "#08080a".to_string()
}

fn default_glass() -> String {
    "#1a1612".to_string()
}

impl Default for TubeTheme {
    fn default() -> Self {
        Self {
            on: MaterialStyle {
                color: "#ff8a2a".to_string(),
                opacity: 1.0,
                glow: 6.0,
            },
            half: MaterialStyle {
                color: "#c2561a".to_string(),
                opacity: 0.6,
                glow: 3.0,
            },
            off: MaterialStyle {
                color: "#4a3b30".to_string(),
                opacity: 0.35,
                glow: 0.0,
            },
            background: default_background(),
            glass: default_glass(),
        }
    }
}

impl TubeTheme {
    /// Loads and validates a JSON theme file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingResource`] if the file is missing, is not valid
    /// JSON, lacks one of the materials, or contains an unusable colour.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::MissingResource {
            reason: format!("cannot read tube theme '{}': {e}", path.display()),
        })?;
        let theme: Self = serde_json::from_str(&raw).map_err(|e| Error::MissingResource {
            reason: format!("invalid tube theme '{}': {e}", path.display()),
        })?;
        theme.validate()?;
        Ok(theme)
    }

    /// # Errors
    ///
    /// Returns [`Error::MissingResource`] for colours that cannot be embedded
    /// in the scene or non-finite opacity/glow values.
    pub fn validate(&self) -> Result<()> {
        let colours = [
            ("on", self.on.color.as_str()),
            ("half", self.half.color.as_str()),
            ("off", self.off.color.as_str()),
            ("background", self.background.as_str()),
            ("glass", self.glass.as_str()),
        ];
        for (name, colour) in colours {
            let usable = !colour.is_empty()
                && colour
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "#(),. %".contains(c));
            if !usable {
                return Err(Error::MissingResource {
                    reason: format!("material `{name}` has unusable colour {colour:?}"),
                });
            }
        }
        for (name, style) in [("on", &self.on), ("half", &self.half), ("off", &self.off)] {
            if !style.opacity.is_finite() || !(0.0..=1.0).contains(&style.opacity) {
                return Err(Error::MissingResource {
                    reason: format!("material `{name}` opacity must be within [0, 1]"),
                });
            }
            if !style.glow.is_finite() || style.glow < 0.0 {
                return Err(Error::MissingResource {
                    reason: format!("material `{name}` glow must be a non-negative number"),
                });
            }
        }
        Ok(())
    }

    pub fn style(&self, material: Material) -> &MaterialStyle {
        match material {
            Material::On => &self.on,
            Material::Half => &self.half,
            Material::Off => &self.off,
        }
    }
}

/// Builds SVG documents of the nixie display.
///
/// For every tube, the cathode matching the digit gets that tube's material
/// and every other cathode gets [`Material::Off`]. A character that is not a
/// digit leaves the whole tube dark.
#[derive(Clone, Debug)]
pub struct TubeScene {
    theme: TubeTheme,
}

impl TubeScene {
    pub fn new(theme: TubeTheme) -> Self {
        Self { theme }
    }

    pub fn theme(&self) -> &TubeTheme {
        &self.theme
    }

    /// Pixel size of a display with `tubes` tubes.
    pub const fn size(tubes: usize) -> (u32, u32) {
        (TUBE_WIDTH * tubes as u32, TUBE_HEIGHT)
    }

    /// Full SVG document for `digits`, one material per tube.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] if `digits` and `materials` differ in length
    /// or are empty.
    pub fn document(&self, digits: &str, materials: &[Material]) -> Result<String> {
        self.build(digits, materials, None)
    }

    /// SVG of the static counter: all tubes lit, rounded corners.
    pub fn counter_document(&self, digits: &str, border_radius: u32) -> Result<String> {
        let materials = vec![Material::On; digits.chars().count()];
        self.build(digits, &materials, Some(border_radius))
    }

    fn build(
        &self,
        digits: &str,
        materials: &[Material],
        border_radius: Option<u32>,
    ) -> Result<String> {
        let tubes = digits.chars().count();
        if tubes == 0 {
            return Err(Error::render("cannot render an empty display"));
        }
        if tubes != materials.len() {
            return Err(Error::render(format!(
                "{tubes} digits but {} tube states",
                materials.len()
            )));
        }

        let (width, height) = Self::size(tubes);
        let mut svg = String::with_capacity(2048 * tubes);
        if border_radius.is_some() {
            svg.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        }
        let style = border_radius
            .map(|r| format!(r#" style="image-rendering: pixelated; border-radius: {r}px;""#))
            .unwrap_or_default();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{width}" height="{height}" viewBox="0 0 {width} {height}"{style}>"#
        );
        if border_radius.is_some() {
            svg.push_str("<title>View Count</title>");
        }
        self.push_defs(&mut svg);
        let _ = write!(
            svg,
            r#"<rect width="{width}" height="{height}" fill="{}"/>"#,
            self.theme.background
        );

        for (i, (digit, material)) in digits.chars().zip(materials).enumerate() {
            self.push_tube(&mut svg, i as u32 * TUBE_WIDTH, digit.to_digit(10), *material);
        }

        svg.push_str("</svg>");
        Ok(svg)
    }

    fn push_defs(&self, svg: &mut String) {
        svg.push_str("<defs>");
        for material in [Material::On, Material::Half, Material::Off] {
            let glow = self.theme.style(material).glow;
            if glow > 0.0 {
                let _ = write!(
                    svg,
                    r#"<filter id="glow-{}" x="-50%" y="-50%" width="200%" height="200%"><feGaussianBlur stdDeviation="{glow}"/></filter>"#,
                    filter_id(material)
                );
            }
        }
        svg.push_str("</defs>");
    }

    fn push_tube(&self, svg: &mut String, x: u32, lit: Option<u32>, material: Material) {
        let _ = write!(svg, r#"<g transform="translate({x} 0)">"#);
        let _ = write!(
            svg,
            r#"<rect x="4" y="6" width="{}" height="{}" rx="34" fill="{}" stroke="{}" stroke-opacity="0.5" stroke-width="2"/>"#,
            TUBE_WIDTH - 8,
            TUBE_HEIGHT - 12,
            self.theme.glass,
            self.theme.off.color,
        );

        // Unlit cathodes sit behind the lit one.
        for digit in 0..10 {
            if Some(digit) != lit {
                self.push_cathode(svg, digit, Material::Off);
            }
        }
        if let Some(digit) = lit {
            self.push_cathode(svg, digit, material);
        }
        svg.push_str("</g>");
    }

    fn push_cathode(&self, svg: &mut String, digit: u32, material: Material) {
        let style = self.theme.style(material);
        let path = cathode_path(digit);
        if style.glow > 0.0 {
            let _ = write!(
                svg,
                r#"<path d="{path}" fill="none" stroke="{}" stroke-opacity="{}" stroke-width="9" stroke-linecap="round" filter="url(#glow-{})"/>"#,
                style.color,
                style.opacity,
                filter_id(material)
            );
        }
        let _ = write!(
            svg,
            r#"<path d="{path}" fill="none" stroke="{}" stroke-opacity="{}" stroke-width="4" stroke-linecap="round" stroke-linejoin="round"/>"#,
            style.color, style.opacity
        );
    }
}

fn filter_id(material: Material) -> &'static str {
    match material {
        Material::On => "on",
        Material::Half => "half",
        Material::Off => "off",
    }
}

fn cathode_path(digit: u32) -> String {
    let mut d = String::new();
    for ((x1, y1), (x2, y2)) in CATHODES[digit as usize % 10] {
        let _ = write!(d, "M{x1} {y1}L{x2} {y2}");
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_has_one_group_per_tube() {
        let scene = TubeScene::new(TubeTheme::default());
        let svg = scene
            .document("0042", &[Material::On, Material::Half, Material::Off, Material::On])
            .unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<g transform=").count(), 4);
        assert!(svg.contains(r#"width="352""#));
    }

    #[test]
    fn lit_cathode_uses_tube_material() {
        let scene = TubeScene::new(TubeTheme::default());
        let theme = scene.theme().clone();
        let svg = scene.document("7", &[Material::Half]).unwrap();
        assert!(svg.contains(&theme.half.color));
        assert!(!svg.contains(&format!(r#"stroke="{}""#, theme.on.color)));
    }

    #[test]
    fn non_digit_leaves_tube_dark() {
        let scene = TubeScene::new(TubeTheme::default());
        let theme = scene.theme().clone();
        let svg = scene.document("-", &[Material::On]).unwrap();
        assert!(!svg.contains(&theme.on.color));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let scene = TubeScene::new(TubeTheme::default());
        assert!(scene.document("12", &[Material::On]).is_err());
        assert!(scene.document("", &[]).is_err());
    }

    #[test]
    fn counter_document_is_titled_and_rounded() {
        let scene = TubeScene::new(TubeTheme::default());
        let svg = scene.counter_document("0000001", 15).unwrap();
        assert!(svg.contains("<title>View Count</title>"));
        assert!(svg.contains("border-radius: 15px"));
        assert!(svg.contains(r#"width="616""#));
    }

    #[test]
    fn theme_requires_all_materials() {
        let missing_half = r##"{"on": {"color": "#fff"}, "off": {"color": "#000"}}"##;
        assert!(serde_json::from_str::<TubeTheme>(missing_half).is_err());

        let complete = r##"{"on": {"color": "#fff"}, "half": {"color": "#888"}, "off": {"color": "#000"}}"##;
        let theme: TubeTheme = serde_json::from_str(complete).unwrap();
        assert_eq!(theme.half.opacity, 1.0);
        assert_eq!(theme.off.glow, 0.0);
        assert!(theme.validate().is_ok());
    }

    #[test]
    fn theme_rejects_markup_in_colours() {
        let mut theme = TubeTheme::default();
        theme.on.color = r#"red"/><script>"#.to_string();
        assert!(matches!(
            theme.validate(),
            Err(Error::MissingResource { .. })
        ));
    }

    #[test]
    fn loading_a_missing_theme_is_a_missing_resource() {
        let err = TubeTheme::load(Path::new("/nonexistent/divergence-theme.json")).unwrap_err();
        assert!(matches!(err, Error::MissingResource { .. }));
    }
}
