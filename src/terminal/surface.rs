//! `Surface`: full-screen text output for render callbacks.

use crossterm::{
    cursor::{self, MoveTo},
    queue,
    style::Print,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Stdout, Write};
use unicode_width::UnicodeWidthChar;

/// A fixed-size text surface over any writer.
///
/// Each [`Surface::draw`] is accumulated in one buffer and written with a
/// single `write()` so the terminal never shows a half-drawn frame.
pub struct Surface<W: Write> {
    writer: W,
    data: Vec<u8>,
    width: u16,
    height: u16,
    /// Whether the alternate screen was entered and must be left on drop.
    owns_screen: bool,
}

impl Surface<Stdout> {
    /// Take over the terminal: alternate screen, hidden cursor.
    ///
    /// The terminal is restored when the surface is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal size cannot be read or setup fails.
    pub fn stdout() -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
        let mut surface = Self::new(stdout, width, height);
        surface.owns_screen = true;
        Ok(surface)
    }
}

impl<W: Write> Surface<W> {
    /// Wrap a writer with the given dimensions.
    pub fn new(writer: W, width: u16, height: u16) -> Self {
        Self {
            writer,
            data: Vec::with_capacity(4096),
            width,
            height,
            owns_screen: false,
        }
    }

    /// Surface width in columns.
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Surface height in rows.
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Update the dimensions after a terminal resize.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    /// Clear the screen and draw `lines` from the top.
    ///
    /// Lines wider than the surface are truncated, lines past the bottom
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn draw<S: AsRef<str>>(&mut self, lines: &[S]) -> io::Result<()> {
        self.data.clear();
        queue!(self.data, Clear(ClearType::All))?;
        for (row, line) in (0..self.height).zip(lines) {
            queue!(
                self.data,
                MoveTo(0, row),
                Print(truncate(line.as_ref(), self.width))
            )?;
        }
        self.writer.write_all(&self.data)?;
        self.writer.flush()
    }

    /// Borrow the writer.
    pub const fn writer(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> Drop for Surface<W> {
    fn drop(&mut self) {
        if self.owns_screen {
            let _ = crossterm::execute!(self.writer, cursor::Show, LeaveAlternateScreen);
        }
    }
}

/// Cut `line` to at most `width` display columns.
pub fn truncate(line: &str, width: u16) -> &str {
    let limit = usize::from(width);
    let mut used = 0;
    for (idx, c) in line.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > limit {
            return &line[..idx];
        }
        used += w;
    }
    line
}
