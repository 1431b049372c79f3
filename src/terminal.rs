use crate::render::{Display, Surface};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    execute,
};
use std::io::{self, stdout, Write};

/// A single cell in the frame buffer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bold: false,
        }
    }
}

/// Off-screen grid of cells; patterns draw here.
#[derive(Clone, Debug)]
pub struct Canvas {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Canvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.cells = vec![Cell::default(); width as usize * height as usize];
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if x < self.width && y < self.height {
            self.cells.get(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// Row `y` as plain text, for tests and headless output.
    pub fn row_text(&self, y: u16) -> String {
        (0..self.width)
            .filter_map(|x| self.get(x, y).map(|c| c.ch))
            .collect()
    }

    /// Number of non-blank cells.
    pub fn ink(&self) -> usize {
        self.cells.iter().filter(|c| c.ch != ' ').count()
    }
}

impl Surface for Canvas {
    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            let idx = y as usize * self.width as usize + x as usize;
            self.cells[idx] = Cell { ch, fg, bold };
        }
    }
}

impl Display for Canvas {
    fn begin_frame(&mut self) -> io::Result<()> {
        self.clear();
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Double-buffered crossterm terminal.
///
/// `present` only writes cells that changed since the previous frame.
pub struct Terminal {
    back: Canvas,
    front: Canvas,
    alternate_screen: bool,
}

impl Terminal {
    /// Initialize the terminal for drawing
    pub fn new(alternate_screen: bool) -> io::Result<Self> {
        let (width, height) = size()?;

        if alternate_screen {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        }

        Ok(Self {
            back: Canvas::new(width, height),
            front: Canvas::new(width, height),
            alternate_screen,
        })
    }

    pub fn clear(&mut self) {
        self.back.clear();
    }

    pub fn clear_screen(&mut self) -> io::Result<()> {
        execute!(stdout(), Clear(ClearType::All))?;
        self.front.clear();
        Ok(())
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.back.resize(width, height);
        self.front.resize(width, height);
    }

    /// Write changed cells to the screen.
    pub fn present(&mut self) -> io::Result<()> {
        let mut out = stdout().lock();
        let (width, height) = self.back.size();

        for y in 0..height {
            let mut cursor_ok = false;
            for x in 0..width {
                let (Some(cell), Some(shown)) = (self.back.get(x, y), self.front.get(x, y)) else {
                    continue;
                };
                if cell == shown {
                    cursor_ok = false;
                    continue;
                }
                if !cursor_ok {
                    queue!(out, MoveTo(x, y))?;
                    cursor_ok = true;
                }
                if cell.bold {
                    queue!(out, SetAttribute(Attribute::Bold))?;
                }
                match cell.fg {
                    Some(color) => queue!(out, SetForegroundColor(color), Print(cell.ch), ResetColor)?,
                    None => queue!(out, Print(cell.ch))?,
                }
                if cell.bold {
                    queue!(out, SetAttribute(Attribute::Reset))?;
                }
            }
        }

        out.flush()?;
        self.front.clone_from(&self.back);
        Ok(())
    }
}

impl Surface for Terminal {
    fn size(&self) -> (u16, u16) {
        self.back.size()
    }

    fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        self.back.set(x, y, ch, fg, bold);
    }
}

impl Display for Terminal {
    fn begin_frame(&mut self) -> io::Result<()> {
        let (width, height) = size().unwrap_or(self.back.size());
        if (width, height) != self.back.size() {
            self.resize(width, height);
            self.clear_screen()?;
        }
        self.clear();
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.present()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.alternate_screen {
            let _ = execute!(stdout(), ResetColor, Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }
    }
}

/// Helper to create RGB colors
pub fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}
