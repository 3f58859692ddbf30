use image::RgbaImage;

/// Turns a staged scene into pixels.
pub trait Rasterizer: Send + Sync {
    /// Rasterize `scene` (logical `width`×`height`) at `scale`, producing a
    /// lossless `width*scale`×`height*scale` RGBA image.
    fn rasterize(
        &self,
        scene: &str,
        width: u32,
        height: u32,
        scale: u32,
    ) -> Result<RgbaImage, String>;
}

#[cfg(feature = "svg")]
pub use svg::SvgRasterizer;

#[cfg(feature = "svg")]
mod svg {
    use std::path::PathBuf;
    use std::sync::Arc;

    use image::RgbaImage;
    use log::{debug, warn};
    use resvg::tiny_skia::{Pixmap, Transform};
    use resvg::usvg;

    use super::Rasterizer;

    pub struct SvgRasterizer {
        fontdb: Arc<usvg::fontdb::Database>,
    }

    impl SvgRasterizer {
        /// Build the font database once; every capture shares it.
        pub fn new(font_dirs: &[PathBuf]) -> Self {
            let mut fontdb = usvg::fontdb::Database::new();
            fontdb.load_system_fonts();
            for dir in font_dirs {
                if dir.is_dir() {
                    fontdb.load_fonts_dir(dir);
                } else {
                    warn!("Font directory {} does not exist", dir.display());
                }
            }
            debug!("Rasterizer font database holds {} faces", fontdb.len());
            Self {
                fontdb: Arc::new(fontdb),
            }
        }
    }

    impl Rasterizer for SvgRasterizer {
        fn rasterize(
            &self,
            scene: &str,
            width: u32,
            height: u32,
            scale: u32,
        ) -> Result<RgbaImage, String> {
            let options = usvg::Options {
                fontdb: Arc::clone(&self.fontdb),
                ..usvg::Options::default()
            };
            let tree = usvg::Tree::from_str(scene, &options).map_err(|e| e.to_string())?;

            let scale = scale.max(1);
            let out_width = width.saturating_mul(scale);
            let out_height = height.saturating_mul(scale);
            let mut pixmap = Pixmap::new(out_width, out_height)
                .ok_or_else(|| format!("cannot allocate a {out_width}x{out_height} surface"))?;

            let size = tree.size();
            let transform = Transform::from_scale(
                out_width as f32 / size.width(),
                out_height as f32 / size.height(),
            );
            resvg::render(&tree, transform, &mut pixmap.as_mut());

            let mut rgba = pixmap.take();
            unpremultiply_rgba(&mut rgba);
            RgbaImage::from_raw(out_width, out_height, rgba)
                .ok_or_else(|| "pixel buffer does not match the surface size".to_string())
        }
    }

    fn unpremultiply_rgba(data: &mut [u8]) {
        for pixel in data.chunks_mut(4) {
            let alpha = pixel[3];
            if alpha == 0 {
                pixel[0] = 0;
                pixel[1] = 0;
                pixel[2] = 0;
                continue;
            }
            let a = alpha as u32;
            pixel[0] = ((pixel[0] as u32 * 255 + a / 2) / a).min(255) as u8;
            pixel[1] = ((pixel[1] as u32 * 255 + a / 2) / a).min(255) as u8;
            pixel[2] = ((pixel[2] as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }

}
