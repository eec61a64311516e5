//! SVG word cloud renderer.
//!
//! Words are sized by weight and placed along an Archimedean spiral from the
//! canvas centre, skipping positions whose bounding box would overlap an
//! already placed word. Text widths are estimated, so no font files are needed.

use mailsift_core::error::{MailSiftError, Result};
use mailsift_core::traits::{KeywordWeights, Renderer};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const PALETTE: [&str; 5] = ["#1b1b1b", "#48484b", "#593aee", "#65cdfa", "#70d6bf"];
const MIN_FONT: f64 = 14.0;
const MAX_FONT: f64 = 96.0;
/// Average glyph advance as a fraction of the font size.
const GLYPH_RATIO: f64 = 0.58;
const SPIRAL_STEP: f64 = 0.05;
const MAX_SPIRAL_STEPS: usize = 20_000;

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl Rect {
    fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}

/// A positioned word.
#[derive(Debug, Clone)]
pub struct Placement {
    pub word: String,
    pub font_size: f64,
    /// Baseline-left anchor.
    pub x: f64,
    pub y: f64,
    pub color: &'static str,
}

/// Writes word clouds as `<uuid>.svg` into an output directory.
#[derive(Debug, Clone)]
pub struct SvgWordCloud {
    output_dir: PathBuf,
    width: u32,
    height: u32,
}

impl SvgWordCloud {
    pub fn new(output_dir: &Path, width: u32, height: u32) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            width,
            height,
        }
    }

    /// Place words, heaviest first. Words that do not fit are dropped.
    pub fn layout(&self, keywords: &KeywordWeights) -> Vec<Placement> {
        let (w, h) = (self.width as f64, self.height as f64);
        let max_weight = keywords
            .iter()
            .map(|(_, weight)| *weight)
            .fold(0.0_f64, f64::max);
        if max_weight <= 0.0 {
            return Vec::new();
        }

        let mut sorted: Vec<&(String, f64)> = keywords.iter().filter(|(_, wt)| *wt > 0.0).collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut placed: Vec<Rect> = Vec::new();
        let mut out = Vec::new();
        for (idx, (word, weight)) in sorted.into_iter().enumerate() {
            let size = MIN_FONT + (MAX_FONT - MIN_FONT) * (weight / max_weight).sqrt();
            let bw = size * GLYPH_RATIO * word.chars().count() as f64;
            let bh = size;
            if bw > w || bh > h {
                continue;
            }

            let mut t: f64 = 0.0;
            for _ in 0..MAX_SPIRAL_STEPS {
                let r = 2.0 * t;
                let rect = Rect {
                    x: w / 2.0 + r * t.cos() - bw / 2.0,
                    y: h / 2.0 + r * t.sin() - bh / 2.0,
                    w: bw,
                    h: bh,
                };
                t += SPIRAL_STEP;
                let inside = rect.x >= 0.0 && rect.y >= 0.0 && rect.x + bw <= w && rect.y + bh <= h;
                if inside && !placed.iter().any(|p| p.overlaps(&rect)) {
                    placed.push(rect);
                    out.push(Placement {
                        word: word.clone(),
                        font_size: size,
                        x: rect.x,
                        y: rect.y + bh * 0.8,
                        color: PALETTE[idx % PALETTE.len()],
                    });
                    break;
                }
            }
        }
        out
    }

    /// Serialize a layout as an SVG document.
    pub fn to_svg(&self, placements: &[Placement]) -> String {
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n\
             <rect width=\"100%\" height=\"100%\" fill=\"#ffffff\"/>\n",
            w = self.width,
            h = self.height
        );
        for p in placements {
            let _ = writeln!(
                svg,
                "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"Roboto, Helvetica, Arial, sans-serif\" font-size=\"{:.1}\" fill=\"{}\">{}</text>",
                p.x,
                p.y,
                p.font_size,
                p.color,
                escape_xml(&p.word)
            );
        }
        svg.push_str("</svg>\n");
        svg
    }
}

impl Renderer for SvgWordCloud {
    fn render(&self, keywords: &KeywordWeights) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| MailSiftError::Render(format!("Create {}: {e}", self.output_dir.display())))?;

        let placements = self.layout(keywords);
        let path = self.output_dir.join(format!("{}.svg", uuid::Uuid::new_v4()));
        std::fs::write(&path, self.to_svg(&placements))
            .map_err(|e| MailSiftError::Render(format!("Write {}: {e}", path.display())))?;

        tracing::debug!("☁️ Word cloud with {} words at {}", placements.len(), path.display());
        Ok(path)
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> SvgWordCloud {
        SvgWordCloud::new(&std::env::temp_dir().join("mailsift-test-cloud"), 800, 600)
    }

    fn kw(items: &[(&str, f64)]) -> KeywordWeights {
        items.iter().map(|(k, w)| (k.to_string(), *w)).collect()
    }

    #[test]
    fn test_layout_no_overlap() {
        let words = kw(&[
            ("invoice", 9.0),
            ("payment due", 6.0),
            ("march", 4.0),
            ("total", 3.0),
            ("acme corp", 2.0),
            ("friday", 1.0),
        ]);
        let placements = cloud().layout(&words);
        assert_eq!(placements.len(), 6);
        assert_eq!(placements[0].word, "invoice");
        assert!(placements[0].font_size > placements[5].font_size);

        let rects: Vec<Rect> = placements
            .iter()
            .map(|p| Rect {
                x: p.x,
                y: p.y - p.font_size * 0.8,
                w: p.font_size * GLYPH_RATIO * p.word.chars().count() as f64,
                h: p.font_size,
            })
            .collect();
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                assert!(!rects[i].overlaps(&rects[j]), "{} overlaps {}", placements[i].word, placements[j].word);
            }
        }
    }

    #[test]
    fn test_empty_weights() {
        assert!(cloud().layout(&kw(&[])).is_empty());
        assert!(cloud().layout(&kw(&[("zero", 0.0)])).is_empty());
    }

    #[test]
    fn test_render_writes_svg() {
        let c = cloud();
        let path = c.render(&kw(&[("a<b", 2.0), ("invoice", 1.0)])).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("a&lt;b"));
        assert_eq!(path.extension().unwrap(), "svg");
        std::fs::remove_file(&path).ok();
    }
}
