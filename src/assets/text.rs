//! Text layers rasterized through an SVG document with `usvg`/`resvg`.
//!
//! Fonts are resolved from an ordered candidate list (configured files, configured family names,
//! then generic families) and the first candidate that loads wins. Every font book also carries a
//! bundled DejaVu Sans face, and generic families the system cannot serve map to it, so the
//! generic `sans-serif` last resort always renders.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use kurbo::{Affine, BezPath, PathEl};
use usvg::fontdb;

use crate::{
    core::{PixelBuffer, Point, Rgb8},
    error::{InkError, InkResult},
    schedule::stroke::Contour,
};

/// Face bundled into every [`FontBook`] as the last-resort font.
const BUILTIN_FONT: &[u8] = include_bytes!("../../fonts/DejaVuSans.ttf");
const BUILTIN_FAMILY: &str = "DejaVu Sans";

/// Curve flattening tolerance for glyph outlines, in pixels.
const OUTLINE_TOLERANCE: f64 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub color: Rgb8,
    /// Baseline distance as a multiple of `font_size`.
    pub line_spacing: f32,
    pub background: Rgb8,
}

#[derive(Clone, Debug)]
pub struct TextBlock {
    pub pixels: PixelBuffer,
    /// Glyph outlines in `pixels` coordinates, `None` when they could not be extracted.
    pub contours: Option<Vec<Contour>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenericFamily {
    SansSerif,
    Serif,
    Monospace,
}

impl GenericFamily {
    pub const ALL: [Self; 3] = [Self::SansSerif, Self::Serif, Self::Monospace];

    pub fn css_name(self) -> &'static str {
        match self {
            Self::SansSerif => "sans-serif",
            Self::Serif => "serif",
            Self::Monospace => "monospace",
        }
    }

    fn fontdb_family(self) -> fontdb::Family<'static> {
        match self {
            Self::SansSerif => fontdb::Family::SansSerif,
            Self::Serif => fontdb::Family::Serif,
            Self::Monospace => fontdb::Family::Monospace,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontCandidate {
    File(PathBuf),
    Family(String),
    Generic(GenericFamily),
}

fn is_font_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    [".ttf", ".otf", ".ttc"].iter().any(|ext| lower.ends_with(ext))
}

/// Candidates in resolution order: files, then named families, then generic families.
pub fn font_candidates(root: &Path, fonts: &[String]) -> Vec<FontCandidate> {
    let mut out: Vec<FontCandidate> = fonts
        .iter()
        .filter(|f| is_font_file(f))
        .map(|f| FontCandidate::File(root.join(f)))
        .collect();
    out.extend(
        fonts
            .iter()
            .filter(|f| !is_font_file(f) && !f.trim().is_empty())
            .map(|f| FontCandidate::Family(f.trim().to_string())),
    );
    out.extend(GenericFamily::ALL.into_iter().map(FontCandidate::Generic));
    out
}

/// Shared font database used for every text layer of a run.
#[derive(Clone)]
pub struct FontBook {
    db: Arc<fontdb::Database>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.db.len())
            .finish()
    }
}

impl Default for FontBook {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FontBook {
    /// Only the bundled fallback face.
    pub fn builtin() -> Self {
        let mut db = fontdb::Database::new();
        install_builtin(&mut db);
        Self { db: Arc::new(db) }
    }

    /// System fonts plus every font file directly under `<root>/fonts`, plus the bundled face.
    pub fn with_system_fonts(root: &Path) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        load_fonts_from_dir(&mut db, &root.join("fonts"));
        install_builtin(&mut db);
        tracing::debug!(faces = db.len(), "font database ready");
        Self { db: Arc::new(db) }
    }

    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    fn load_file(&mut self, path: &Path) -> Option<String> {
        let bytes = std::fs::read(path).ok()?;
        let ids = Arc::make_mut(&mut self.db).load_font_source(fontdb::Source::Binary(Arc::new(bytes)));
        let id = ids.first().copied()?;
        let face = self.db.face(id)?;
        face.families.first().map(|(name, _)| name.clone())
    }

    fn has_family(&self, family: fontdb::Family<'_>) -> bool {
        db_has_family(&self.db, family)
    }

    fn try_candidate(&mut self, candidate: &FontCandidate) -> Option<String> {
        match candidate {
            FontCandidate::File(path) => self
                .load_file(path)
                .map(|family| css_quote(&family)),
            FontCandidate::Family(name) => self
                .has_family(fontdb::Family::Name(name))
                .then(|| css_quote(name)),
            FontCandidate::Generic(g) => self
                .has_family(g.fontdb_family())
                .then(|| g.css_name().to_string()),
        }
    }

    /// CSS `font-family` value for the first candidate that loads.
    pub fn resolve_family(&mut self, root: &Path, fonts: &[String]) -> String {
        let candidates = font_candidates(root, fonts);
        for candidate in &candidates {
            if let Some(family) = self.try_candidate(candidate) {
                if !fonts.is_empty() && matches!(candidate, FontCandidate::Generic(_)) {
                    tracing::warn!(?fonts, family, "configured fonts unavailable, using fallback");
                }
                return family;
            }
            tracing::debug!(?candidate, "font candidate unavailable");
        }
        tracing::warn!("no font candidate matched, using last-resort sans-serif");
        GenericFamily::SansSerif.css_name().to_string()
    }

    /// Rasterize `text` tightly cropped (plus a small margin) on the style background.
    pub fn render(
        &mut self,
        root: &Path,
        text: &str,
        fonts: &[String],
        style: &TextStyle,
    ) -> InkResult<TextBlock> {
        if text.trim().is_empty() {
            return Ok(TextBlock {
                pixels: PixelBuffer::filled(1, 1, style.background),
                contours: None,
            });
        }
        let family = self.resolve_family(root, fonts);
        let svg = text_svg(text, &family, style);
        let opts = usvg::Options {
            fontdb: Arc::clone(&self.db),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts)
            .context("parse text svg")
            .map_err(|e| InkError::font(format!("{e:#}")))?;
        if !tree.root().has_children() {
            return Err(InkError::font(format!(
                "no font face could render text with font-family {family}"
            )));
        }

        let bbox = tree.root().abs_bounding_box();
        let pad = (style.font_size * 0.1).ceil().max(2.0);
        let width = (bbox.width() + 2.0 * pad).ceil() as u32;
        let height = (bbox.height() + 2.0 * pad).ceil() as u32;
        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| InkError::font(format!("failed to allocate {width}x{height} text pixmap")))?;
        let [r, g, b] = style.background.0;
        pixmap.fill(resvg::tiny_skia::Color::from_rgba8(r, g, b, 255));
        let (dx, dy) = (pad - bbox.left(), pad - bbox.top());
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::from_translate(dx, dy),
            &mut pixmap.as_mut(),
        );

        let rgb: Vec<u8> = pixmap
            .data()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        let pixels = PixelBuffer::from_raw(width, height, rgb)?;
        let contours = glyph_contours(
            &tree,
            Affine::translate((f64::from(dx), f64::from(dy))),
        );
        Ok(TextBlock { pixels, contours })
    }
}

fn db_has_family(db: &fontdb::Database, family: fontdb::Family<'_>) -> bool {
    let families = [family];
    let query = fontdb::Query {
        families: &families,
        weight: fontdb::Weight::NORMAL,
        stretch: fontdb::Stretch::Normal,
        style: fontdb::Style::Normal,
    };
    db.query(&query).is_some()
}

/// Load the bundled face and point generic families with no installed match at it.
fn install_builtin(db: &mut fontdb::Database) {
    db.load_font_source(fontdb::Source::Binary(Arc::new(BUILTIN_FONT)));
    for generic in GenericFamily::ALL {
        if db_has_family(db, generic.fontdb_family()) {
            continue;
        }
        tracing::debug!(generic = generic.css_name(), "mapping generic family to built-in font");
        match generic {
            GenericFamily::SansSerif => db.set_sans_serif_family(BUILTIN_FAMILY),
            GenericFamily::Serif => db.set_serif_family(BUILTIN_FAMILY),
            GenericFamily::Monospace => db.set_monospace_family(BUILTIN_FAMILY),
        }
    }
}

fn load_fonts_from_dir(db: &mut fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in rd.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.to_str().is_some_and(is_font_file)
            && let Err(e) = db.load_font_file(&path)
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to load font file");
        }
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn css_quote(family: &str) -> String {
    format!("'{}'", family.replace('\'', ""))
}

/// SVG document with one `tspan` per line, baselines `line_spacing × font_size` apart.
pub fn text_svg(text: &str, family: &str, style: &TextStyle) -> String {
    let size = style.font_size;
    let advance = size * style.line_spacing;
    let lines: Vec<&str> = text.lines().collect();
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let width = ((widest as f32 + 1.0) * size).ceil().max(1.0);
    let height = ((lines.len() as f32 + 1.0) * advance).ceil().max(1.0);
    let [r, g, b] = style.color.0;

    let mut spans = String::new();
    for (i, line) in lines.iter().enumerate() {
        let content = if line.is_empty() {
            " ".to_string()
        } else {
            xml_escape(line)
        };
        if i == 0 {
            spans.push_str(&format!(r#"<tspan x="0" y="{size}">{content}</tspan>"#));
        } else {
            spans.push_str(&format!(r#"<tspan x="0" dy="{advance}">{content}</tspan>"#));
        }
    }
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}">"#,
            r##"<text xml:space="preserve" font-family="{family}" font-size="{size}" fill="#{r:02x}{g:02x}{b:02x}">"##,
            "{spans}</text></svg>"
        ),
        w = width,
        h = height,
        family = xml_escape(family),
        size = size,
        r = r,
        g = g,
        b = b,
        spans = spans,
    )
}

fn to_affine(ts: usvg::Transform) -> Affine {
    Affine::new([
        f64::from(ts.sx),
        f64::from(ts.ky),
        f64::from(ts.kx),
        f64::from(ts.sy),
        f64::from(ts.tx),
        f64::from(ts.ty),
    ])
}

/// Closed glyph outlines of every text node, flattened to polylines and mapped through `offset`.
pub fn glyph_contours(tree: &usvg::Tree, offset: Affine) -> Option<Vec<Contour>> {
    let mut out = Vec::new();
    collect_text(tree.root(), offset, &mut out);
    (!out.is_empty()).then_some(out)
}

fn collect_text(group: &usvg::Group, offset: Affine, out: &mut Vec<Contour>) {
    for node in group.children() {
        match node {
            usvg::Node::Group(g) => collect_text(g, offset, out),
            usvg::Node::Text(t) => collect_paths(t.flattened(), offset, out),
            _ => {}
        }
    }
}

fn collect_paths(group: &usvg::Group, offset: Affine, out: &mut Vec<Contour>) {
    for node in group.children() {
        match node {
            usvg::Node::Group(g) => collect_paths(g, offset, out),
            usvg::Node::Path(p) => path_contours(p, offset * to_affine(p.abs_transform()), out),
            _ => {}
        }
    }
}

fn path_contours(path: &usvg::Path, xform: Affine, out: &mut Vec<Contour>) {
    use usvg::tiny_skia_path::PathSegment;

    let pt = |p: usvg::tiny_skia_path::Point| Point::new(f64::from(p.x), f64::from(p.y));
    let mut bez = BezPath::new();
    for seg in path.data().segments() {
        match seg {
            PathSegment::MoveTo(a) => bez.move_to(pt(a)),
            PathSegment::LineTo(a) => bez.line_to(pt(a)),
            PathSegment::QuadTo(a, b) => bez.quad_to(pt(a), pt(b)),
            PathSegment::CubicTo(a, b, c) => bez.curve_to(pt(a), pt(b), pt(c)),
            PathSegment::Close => bez.close_path(),
        }
    }
    bez.apply_affine(xform);

    let mut current: Contour = Vec::new();
    kurbo::flatten(&bez, OUTLINE_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            flush_contour(&mut current, out);
            current.push(p);
        }
        PathEl::LineTo(p) => current.push(p),
        PathEl::ClosePath => flush_contour(&mut current, out),
        _ => {}
    });
    flush_contour(&mut current, out);
}

fn flush_contour(current: &mut Contour, out: &mut Vec<Contour>) {
    let contour = std::mem::take(current);
    if contour.len() >= 2 {
        out.push(contour);
    }
}
