//! rustc-like source snippets for located errors.

use annotate_snippets::{
    AnnotationKind, Level, Renderer, Snippet as AnnotateSnippet, renderer::DecorStyle,
};

use crate::location::Location;

/// Lines of context shown above and below the error line.
const CONTEXT_LINES: usize = 2;

/// Render `msg` against a small window of `text` around `location`.
///
/// Long lines are cropped to `crop_radius` characters on each side of the error
/// column so the caret stays visible. Falls back to `"{msg} at line L, column C"`
/// when the location is outside the text.
pub(crate) fn render(msg: &str, location: &Location, text: &str, crop_radius: usize) -> String {
    let fallback = || format!("{msg} at {location}");
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);

    let lines: Vec<&str> = text.lines().collect();
    let row = location.line as usize;
    let col = location.column as usize;
    if row == 0 || col == 0 || row > lines.len() {
        return fallback();
    }

    let first = row.saturating_sub(CONTEXT_LINES).max(1);
    let last = (row + CONTEXT_LINES).min(lines.len());
    let left_col = col.saturating_sub(crop_radius).max(1);

    let mut window = String::new();
    let mut span = 0..0;
    for (idx, line) in lines[first - 1..last].iter().enumerate() {
        let cropped = crop(sanitize(line), left_col, crop_radius * 2 + 1);
        if first + idx == row {
            let caret = col - left_col;
            let start = window.len()
                + cropped
                    .char_indices()
                    .nth(caret)
                    .map(|(i, _)| i)
                    .unwrap_or(cropped.len());
            let end = cropped[start - window.len()..]
                .chars()
                .next()
                .map(|c| start + c.len_utf8())
                .unwrap_or(start);
            span = start..end;
        }
        window.push_str(&cropped);
        window.push('\n');
    }

    let report = &[Level::ERROR
        .primary_title(format!("line {row} column {col}: {msg}"))
        .element(
            AnnotateSnippet::source(&window)
                .line_start(first)
                .path("<input>")
                .fold(false)
                .annotation(AnnotationKind::Primary.span(span).label(msg)),
        )];

    // Plain ASCII decorations keep error strings stable and free of escape codes.
    let renderer = Renderer::plain().decor_style(DecorStyle::Ascii);
    renderer.render(report).to_string()
}

/// Replace control characters that would garble a terminal.
fn sanitize(line: &str) -> String {
    line.chars()
        .map(|c| if c.is_control() && c != '\t' { '\u{FFFD}' } else { c })
        .collect()
}

/// Keep at most `width` characters starting at 1-based column `left_col`.
fn crop(line: String, left_col: usize, width: usize) -> String {
    if left_col == 1 && line.chars().count() <= width {
        return line;
    }
    line.chars().skip(left_col - 1).take(width).collect()
}
