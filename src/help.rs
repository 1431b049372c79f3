use crate::render::Surface;
use crossterm::style::Color;

/// Full key reference shown by `?`.
pub const HELP: &str = "\
MILKSHAKER
─────────────────────────
s        Start / stop capture
r        Restart capture
+ / -    Sensitivity up / down
d        Next audio device
p, Tab   Next pattern
n        Random pattern
x        Toggle shuffle
1-9      Toggle scene layer
? / h    Toggle this help
q, Esc   Quit";

/// One-line hint for the bottom of the screen.
pub fn key_hint(capturing: bool) -> &'static str {
    if capturing {
        "s:stop r:restart +/-:sens d:device p:pattern n:random x:shuffle ?:help q:quit"
    } else {
        "s:start r:restart d:device p:pattern ?:help q:quit"
    }
}

/// Render a centered help overlay box with the provided text.
pub fn render_help_overlay(surface: &mut dyn Surface, width: u16, height: u16, help_text: &str) {
    if help_text.is_empty() {
        return;
    }

    let lines: Vec<&str> = help_text.lines().collect();
    let max_width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let box_width = max_width + 4; // 2 chars padding each side
    let box_height = lines.len() + 2;

    let start_x = (width as usize).saturating_sub(box_width) / 2;
    let start_y = (height as usize).saturating_sub(box_height) / 2;

    let border = Some(Color::White);
    let text = Some(Color::Grey);

    let right = (start_x + box_width - 1) as i32;
    let bottom = (start_y + box_height - 1) as i32;
    let (left, top) = (start_x as i32, start_y as i32);

    surface.set(left, top, '┌', border, false);
    surface.set(right, top, '┐', border, false);
    surface.set(left, bottom, '└', border, false);
    surface.set(right, bottom, '┘', border, false);
    for x in left + 1..right {
        surface.set(x, top, '─', border, false);
        surface.set(x, bottom, '─', border, false);
    }

    for (i, line) in lines.iter().enumerate() {
        let y = top + 1 + i as i32;
        surface.set(left, y, '│', border, false);
        let padding = max_width.saturating_sub(line.chars().count());
        let padded = format!(" {}{} ", line, " ".repeat(padding));
        surface.set_str(left + 1, y, &padded, text, i == 0);
        surface.set(right, y, '│', border, false);
    }
}
