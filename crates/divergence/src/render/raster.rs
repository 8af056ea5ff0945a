use crate::{Error, FfmpegEncoder, Frame, Material, RenderBackend, Result, TubeScene, TubeTheme};

/// [`RenderBackend`] that rasterizes [`TubeScene`] documents with `resvg` and
/// hands the frames to an [`FfmpegEncoder`].
pub struct TubeRenderer {
    scene: TubeScene,
    digits: usize,
    encoder: FfmpegEncoder,
}

impl core::fmt::Debug for TubeRenderer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TubeRenderer")
            .field("digits", &self.digits)
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}

impl TubeRenderer {
    /// Builds the renderer and performs a probe render of a fully lit
    /// display.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingResource`] if the theme is unusable or the
    /// probe render fails. Callers treat this as fatal.
    pub fn new(theme: TubeTheme, digits: usize, encoder: FfmpegEncoder) -> Result<Self> {
        theme.validate()?;
        if digits == 0 {
            return Err(Error::MissingResource {
                reason: "display must have at least one tube".to_string(),
            });
        }
        let mut renderer = Self {
            scene: TubeScene::new(theme),
            digits,
            encoder,
        };

        let probe = "8".repeat(digits);
        renderer
            .render_frame(&probe, &vec![Material::On; digits])
            .map_err(|e| Error::MissingResource {
                reason: format!("probe render failed: {e}"),
            })?;
        tracing::debug!(digits, "tube renderer ready");
        Ok(renderer)
    }

    pub fn digits(&self) -> usize {
        self.digits
    }

    pub fn encoder(&self) -> &FfmpegEncoder {
        &self.encoder
    }
}

impl RenderBackend for TubeRenderer {
    fn render_frame(&mut self, digits: &str, materials: &[Material]) -> Result<Frame> {
        if digits.chars().count() != self.digits {
            return Err(Error::render(format!(
                "expected {} digits, got {digits:?}",
                self.digits
            )));
        }
        let svg = self.scene.document(digits, materials)?;
        let tree = usvg::Tree::from_str(&svg, &usvg::Options::default())
            .map_err(|e| Error::render(format!("scene did not parse: {e}")))?;

        let (width, height) = TubeScene::size(self.digits);
        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| Error::render("failed to allocate frame pixmap"))?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );

        // The scene paints an opaque background, so premultiplied and
        // straight alpha coincide.
        Ok(Frame {
            width,
            height,
            data: pixmap.take(),
        })
    }

    fn encode_sequence(&mut self, frames: &[Frame], framerate: u32) -> Result<Vec<u8>> {
        self.encoder.encode(frames, framerate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetFormat, TUBE_HEIGHT, TUBE_WIDTH};

    fn renderer(digits: usize) -> TubeRenderer {
        let encoder = FfmpegEncoder::new("ffmpeg", AssetFormat::Gif);
        TubeRenderer::new(TubeTheme::default(), digits, encoder).unwrap()
    }

    #[test]
    fn frames_have_display_dimensions() {
        let mut r = renderer(3);
        let frame = r
            .render_frame("042", &[Material::On, Material::Half, Material::Off])
            .unwrap();
        assert_eq!(frame.width, 3 * TUBE_WIDTH);
        assert_eq!(frame.height, TUBE_HEIGHT);
        assert_eq!(frame.data.len(), Frame::byte_len(frame.width, frame.height));
        assert!(frame.data.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn materials_change_the_frame() {
        let mut r = renderer(1);
        let lit = r.render_frame("8", &[Material::On]).unwrap();
        let dark = r.render_frame("8", &[Material::Off]).unwrap();
        assert_ne!(lit.data, dark.data);
    }

    #[test]
    fn identical_input_renders_identically() {
        let mut r = renderer(2);
        let a = r.render_frame("17", &[Material::Half, Material::On]).unwrap();
        let b = r.render_frame("17", &[Material::Half, Material::On]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_digit_count_is_a_render_error() {
        let mut r = renderer(2);
        let err = r.render_frame("123", &[Material::On; 3]).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }

    #[test]
    fn unusable_theme_fails_construction() {
        let mut theme = TubeTheme::default();
        theme.off.opacity = 2.0;
        let encoder = FfmpegEncoder::new("ffmpeg", AssetFormat::Gif);
        let err = TubeRenderer::new(theme, 4, encoder).unwrap_err();
        assert!(matches!(err, Error::MissingResource { .. }));
    }
}
