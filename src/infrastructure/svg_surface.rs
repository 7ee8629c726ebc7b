// SVG surface - renders draw commands to SVG documents and publishes each frame
use crate::domain::surface::{DrawCommand, Point, Stroke, Surface, TextAnchor, TextStyle};
use std::fmt::Write;
use tokio::sync::watch;

const BACKGROUND: &str = "#15151a";
const FONT_FAMILY: &str = "system-ui, -apple-system, sans-serif";

/// Map a theme token to a CSS color. Anything that isn't a known token is
/// passed through unchanged.
pub fn resolve_color(token: &str) -> &str {
    match token {
        "cyan" | "upload" => "#06b6d4",
        "emerald" | "download" => "#10b981",
        "violet" => "#8b5cf6",
        "amber" => "#f59e0b",
        "rose" => "#f43f5e",
        "blue" => "#3b82f6",
        "grid" | "track" => "rgba(255,255,255,0.1)",
        "axis" => "#25252f",
        "text" => "#999",
        "muted" => "rgba(255,255,255,0.3)",
        "background" => BACKGROUND,
        other => other,
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Trim coordinates to two decimals.
fn num(v: f64) -> String {
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", num(p.x), num(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn stroke_attrs(stroke: &Stroke) -> String {
    let mut attrs = format!(
        r#"stroke="{}" stroke-width="{}" fill="none""#,
        resolve_color(&stroke.color),
        num(stroke.width)
    );
    if let Some(dash) = stroke.dash {
        let _ = write!(
            attrs,
            r#" stroke-dasharray="{}" stroke-dashoffset="{}" stroke-linecap="round""#,
            num(dash.array),
            num(dash.offset)
        );
    }
    attrs
}

fn text_attrs(style: &TextStyle) -> String {
    let anchor = match style.anchor {
        TextAnchor::Start => "start",
        TextAnchor::Middle => "middle",
        TextAnchor::End => "end",
    };
    let mut attrs = format!(
        r#"fill="{}" font-size="{}" font-family="{}" text-anchor="{}""#,
        resolve_color(&style.color),
        num(style.size),
        FONT_FAMILY,
        anchor
    );
    if style.bold {
        attrs.push_str(r#" font-weight="bold""#);
    }
    attrs
}

/// Builds one SVG document per frame. `Clear` opens the document and
/// `present` closes it and publishes it to every subscriber.
pub struct SvgSurface {
    document: String,
    open: bool,
    frames: watch::Sender<String>,
}

impl SvgSurface {
    pub fn new() -> (Self, watch::Receiver<String>) {
        let (frames, receiver) = watch::channel(String::new());
        (
            Self {
                document: String::new(),
                open: false,
                frames,
            },
            receiver,
        )
    }

    fn element(command: DrawCommand) -> String {
        match command {
            DrawCommand::Clear { width, height } => format!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect x="0" y="0" width="{w}" height="{h}" fill="{bg}"/>"#,
                w = num(width),
                h = num(height),
                bg = BACKGROUND
            ),
            DrawCommand::Line { from, to, stroke } => format!(
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" {}/>"#,
                num(from.x),
                num(from.y),
                num(to.x),
                num(to.y),
                stroke_attrs(&stroke)
            ),
            DrawCommand::Polyline { points, stroke } => format!(
                r#"<polyline points="{}" {} stroke-linejoin="round"/>"#,
                points_attr(&points),
                stroke_attrs(&stroke)
            ),
            DrawCommand::Rect {
                x,
                y,
                width,
                height,
                fill,
            } => format!(
                r#"<rect x="{}" y="{}" width="{}" height="{}" rx="2" fill="{}"/>"#,
                num(x),
                num(y),
                num(width),
                num(height),
                resolve_color(&fill)
            ),
            DrawCommand::Polygon {
                points,
                fill,
                opacity,
            } => format!(
                r#"<polygon points="{}" fill="{}" fill-opacity="{}" stroke="none"/>"#,
                points_attr(&points),
                resolve_color(&fill),
                num(opacity)
            ),
            DrawCommand::Dot {
                center,
                radius,
                fill,
            } => format!(
                r#"<circle cx="{}" cy="{}" r="{}" fill="{}"/>"#,
                num(center.x),
                num(center.y),
                num(radius),
                resolve_color(&fill)
            ),
            DrawCommand::Circle {
                center,
                radius,
                stroke,
            } => {
                let rotate = if stroke.dash.is_some() {
                    format!(
                        r#" transform="rotate(-90 {} {})""#,
                        num(center.x),
                        num(center.y)
                    )
                } else {
                    String::new()
                };
                format!(
                    r#"<circle cx="{}" cy="{}" r="{}" {}{}/>"#,
                    num(center.x),
                    num(center.y),
                    num(radius),
                    stroke_attrs(&stroke),
                    rotate
                )
            }
            DrawCommand::Text { at, content, style } => format!(
                r#"<text x="{}" y="{}" {}>{}</text>"#,
                num(at.x),
                num(at.y),
                text_attrs(&style),
                escape(&content)
            ),
        }
    }
}

impl Surface for SvgSurface {
    fn submit(&mut self, command: DrawCommand) {
        if matches!(command, DrawCommand::Clear { .. }) {
            self.document.clear();
            self.open = true;
        } else if !self.open {
            tracing::debug!("Dropping draw command submitted before clear");
            return;
        }

        let element = Self::element(command);
        self.document.push_str(&element);
    }

    fn present(&mut self) {
        if !self.open {
            return;
        }
        self.document.push_str("</svg>");
        self.open = false;

        let frame = std::mem::take(&mut self.document);
        tracing::trace!("Publishing SVG frame ({} bytes)", frame.len());
        // no receivers is fine; the latest frame is still kept
        self.frames.send_replace(frame);
    }
}
