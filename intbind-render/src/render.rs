use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use anyhow::{Context, Result};
use intbind_core::{AngleClock, Color as Rgba};
use std::f64::consts::TAU;
use tiny_skia::{
    Color, LineCap, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Stroke, Transform,
};

const WHITE: Color = Color::WHITE;

/// Candidate paths for a face font; the first readable one wins. Numerals
/// are skipped when no font is available, which keeps headless test
/// environments working.
pub fn find_system_font() -> Option<FontVec> {
    const CANDIDATES: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/Library/Fonts/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];
    CANDIDATES
        .iter()
        .filter_map(|p| std::fs::read(p).ok())
        .find_map(|bytes| FontVec::try_from_vec(bytes).ok())
}

/// Rasterizes a short text label into a transparent premultiplied pixmap.
pub fn render_text_pixmap<F: Font>(text: &str, font_size: f32, font: &F, color: Rgba) -> Pixmap {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Layout with baseline at ascent.
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    // Union pixel bounds of the outlined glyphs.
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }
    }
    if min_x == f32::INFINITY {
        return Pixmap::new(1, 1).expect("pixmap");
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h).expect("pixmap");

    let stride = pm.width() as usize;
    let dst = pm.pixels_mut();

    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            out.draw(|x, y, cov| {
                if cov <= f32::EPSILON {
                    return;
                }
                let ix = (x as f32 + b.min.x - min_x).floor() as i32;
                let iy = (y as f32 + b.min.y - min_y).floor() as i32;
                if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                    return;
                }
                let i = iy as usize * stride + ix as usize;

                // Premultiply source by coverage * alpha.
                let a_lin = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
                let sr = (color[0] as f32 * a_lin) as u8;
                let sg = (color[1] as f32 * a_lin) as u8;
                let sb = (color[2] as f32 * a_lin) as u8;
                let sa = (a_lin * 255.0) as u8;
                let src = PremultipliedColorU8::from_rgba(sr, sg, sb, sa).unwrap();
                let bg = dst[i];

                // Porter-Duff over in premultiplied space.
                let inv = 1.0 - (sa as f32 / 255.0);
                let r = src.red().saturating_add((bg.red() as f32 * inv) as u8);
                let g2 = src.green().saturating_add((bg.green() as f32 * inv) as u8);
                let b2 = src.blue().saturating_add((bg.blue() as f32 * inv) as u8);
                let a = src.alpha().saturating_add((bg.alpha() as f32 * inv) as u8);
                dst[i] = PremultipliedColorU8::from_rgba(r, g2, b2, a).unwrap();
            });
        }
    }

    pm
}

/// Draws the clock face: circle, the twelve five-unit ticks, numerals, a
/// fixation cross, and the hand. A pure function of the clock state plus
/// the static geometry captured at construction; one full-canvas redraw
/// per frame.
pub struct ClockRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),
    radius: f32,
    tick_len: f32,
    hand_len: f32,
    fix_len: f32,
    // Pre-rendered numeral labels with their face positions.
    numerals: Vec<(Pixmap, (f32, f32))>,
    canvas: Pixmap,
}

impl ClockRenderer {
    /// `diameter` is the clock face diameter in pixels; the drawing surface
    /// is a square of twice that, matching the reference layout.
    pub fn new(diameter: u32, font: Option<&FontVec>) -> Result<Self> {
        let width = diameter * 2;
        let height = diameter * 2;
        let canvas = Pixmap::new(width, height).context("canvas allocation failed")?;

        let diam = diameter as f32;
        let center = (width as f32 / 2.0, height as f32 / 2.0);
        let radius = diam / 2.0;
        let tick_len = 2.0 / 30.0 * diam;

        let mut numerals = Vec::new();
        if let Some(font) = font {
            let label_r = radius + 2.0 * tick_len;
            for i in (5..=60).step_by(5) {
                let theta = std::f32::consts::FRAC_PI_2 - TAU as f32 * i as f32 / 60.0;
                let pos = (
                    center.0 + label_r * theta.cos(),
                    center.1 - label_r * theta.sin(),
                );
                let pm = render_text_pixmap(&i.to_string(), diam / 12.0, font, [0, 0, 0, 255]);
                numerals.push((pm, pos));
            }
        }

        Ok(Self {
            width,
            height,
            center,
            radius,
            tick_len,
            hand_len: 11.0 / 30.0 * diam,
            fix_len: diam / 30.0,
            numerals,
            canvas,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Redraws the whole face from `clock`. Reads the clock, never
    /// mutates it.
    pub fn render(&mut self, clock: &AngleClock) {
        self.canvas.fill(WHITE);

        let mut paint = Paint::default();
        paint.anti_alias = true;
        paint.set_color(Color::BLACK);
        let stroke = Stroke {
            width: 1.5,
            line_cap: LineCap::Round,
            ..Stroke::default()
        };

        // Face circle.
        let mut pb = PathBuilder::new();
        pb.push_circle(self.center.0, self.center.1, self.radius);
        if let Some(path) = pb.finish() {
            self.canvas
                .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }

        // Tick marks every five units.
        let mut pb = PathBuilder::new();
        for i in (5..=60).step_by(5) {
            let theta = std::f32::consts::FRAC_PI_2 - TAU as f32 * i as f32 / 60.0;
            let (cos, sin) = (theta.cos(), theta.sin());
            pb.move_to(
                self.center.0 + self.radius * cos,
                self.center.1 - self.radius * sin,
            );
            pb.line_to(
                self.center.0 + (self.radius + self.tick_len) * cos,
                self.center.1 - (self.radius + self.tick_len) * sin,
            );
        }
        if let Some(path) = pb.finish() {
            self.canvas
                .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }

        // Numerals (cached pixmaps; absent when no font was found).
        for i in 0..self.numerals.len() {
            let pos = self.numerals[i].1;
            self.blit_numeral(i, pos);
        }

        // Fixation cross in the clock's current fixation color.
        paint.set_color(rgba_color(clock.fixation_color));
        let mut pb = PathBuilder::new();
        for (dx, dy) in [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)] {
            pb.move_to(self.center.0, self.center.1);
            pb.line_to(
                self.center.0 + dx * self.fix_len,
                self.center.1 + dy * self.fix_len,
            );
        }
        if let Some(path) = pb.finish() {
            self.canvas
                .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }

        // Hand, when the trial wants it visible.
        if clock.hand_visible {
            paint.set_color(rgba_color(clock.hand_color));
            let hand_stroke = Stroke {
                width: 2.0,
                line_cap: LineCap::Round,
                ..Stroke::default()
            };
            let theta = clock.snapshot() as f32;
            let mut pb = PathBuilder::new();
            pb.move_to(self.center.0, self.center.1);
            pb.line_to(
                self.center.0 + self.hand_len * theta.cos(),
                self.center.1 - self.hand_len * theta.sin(),
            );
            if let Some(path) = pb.finish() {
                self.canvas
                    .stroke_path(&path, &paint, &hand_stroke, Transform::identity(), None);
            }
        }
    }

    /// Blanks the surface, used when the trial ends.
    pub fn clear(&mut self) {
        self.canvas.fill(WHITE);
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Copies the canvas into an RGBA frame buffer of the same dimensions.
    pub fn copy_to(&self, frame_buffer: &mut [u8]) {
        let data = self.canvas.data();
        let n = data.len().min(frame_buffer.len());
        frame_buffer[..n].copy_from_slice(&data[..n]);
    }

    fn blit_numeral(&mut self, index: usize, pos: (f32, f32)) {
        let pm = &self.numerals[index].0;
        let (w, h) = (pm.width() as i32, pm.height() as i32);
        let (cw, ch) = (self.width as i32, self.height as i32);

        let x0 = (pos.0 - w as f32 * 0.5).floor() as i32;
        let y0 = (pos.1 - h as f32 * 0.5).floor() as i32;
        if x0 + w <= 0 || y0 + h <= 0 || x0 >= cw || y0 >= ch {
            return;
        }

        let dst_x = x0.max(0) as usize;
        let dst_y = y0.max(0) as usize;
        let src_x = (-x0).max(0) as usize;
        let src_y = (-y0).max(0) as usize;
        let copy_w = (w as usize - src_x).min(cw as usize - dst_x);
        let copy_h = (h as usize - src_y).min(ch as usize - dst_y);

        let src = pm.data();
        let src_stride = pm.width() as usize * 4;
        let dst_stride = self.width as usize * 4;
        let dst = self.canvas.data_mut();

        // Premultiplied over-blend, per pixel.
        for row in 0..copy_h {
            let src_off = (src_y + row) * src_stride + src_x * 4;
            let dst_off = (dst_y + row) * dst_stride + dst_x * 4;
            for col in 0..copy_w {
                let s = &src[src_off + col * 4..src_off + col * 4 + 4];
                let sa = s[3] as u32;
                if sa == 0 {
                    continue;
                }
                let d = &mut dst[dst_off + col * 4..dst_off + col * 4 + 4];
                let inv = 255 - sa;
                for c in 0..4 {
                    d[c] = (s[c] as u32 + (d[c] as u32 * inv + 127) / 255) as u8;
                }
            }
        }
    }
}

fn rgba_color(c: Rgba) -> Color {
    Color::from_rgba8(c[0], c[1], c[2], c[3])
}
