//! Screen view model
//!
//! The controller describes each screen as a title, a few lines of text and
//! a tone. Drawing it (fonts, colours, the round display) is the host's job.

use core::fmt::{self, Write};

use heapless::{String, Vec};

/// Lines below the title
pub const MAX_LINES: usize = 6;

/// Characters per line
pub const LINE_LEN: usize = 24;

/// Overall colour of a screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tone {
    #[default]
    Neutral,
    /// Red: something failed
    Error,
    /// Green: something finished
    Success,
    /// Amber: needs attention
    Alert,
}

/// One line of text, truncated to [`LINE_LEN`]
pub type Line = String<LINE_LEN>;

/// Text-only screen description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    title: Line,
    lines: Vec<Line, MAX_LINES>,
    selected: Option<usize>,
    tone: Tone,
}

/// Copy as much of `text` as fits, on a char boundary
fn truncated(text: &str) -> Line {
    let mut line = Line::new();
    for c in text.chars() {
        if line.push(c).is_err() {
            break;
        }
    }
    line
}

/// `fmt::Write` adapter that drops what does not fit
struct Truncating<'a>(&'a mut Line);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

impl Screen {
    pub fn new(title: &str, tone: Tone) -> Self {
        Self {
            title: truncated(title),
            lines: Vec::new(),
            selected: None,
            tone,
        }
    }

    /// Append a line; lines past [`MAX_LINES`] are dropped
    pub fn line(mut self, text: &str) -> Self {
        self.push(text);
        self
    }

    pub fn push(&mut self, text: &str) {
        let _ = self.lines.push(truncated(text));
    }

    /// Append a formatted line
    pub fn push_fmt(&mut self, args: fmt::Arguments<'_>) {
        let mut line = Line::new();
        let _ = Truncating(&mut line).write_fmt(args);
        let _ = self.lines.push(line);
    }

    /// Highlight the most recently added line
    pub fn select_last(&mut self) {
        self.selected = self.lines.len().checked_sub(1);
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.as_str())
    }

    /// Text of one line, empty if absent
    pub fn get_line(&self, row: usize) -> &str {
        self.lines.get(row).map(|l| l.as_str()).unwrap_or("")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Highlighted line, if any
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_long_lines() {
        let screen = Screen::new("A title that is far too long to fit", Tone::Neutral)
            .line("0123456789012345678901234567890");
        assert_eq!(screen.title().len(), LINE_LEN);
        assert_eq!(screen.get_line(0), "012345678901234567890123");
    }

    #[test]
    fn test_drops_extra_lines() {
        let mut screen = Screen::new("t", Tone::Alert);
        for _ in 0..10 {
            screen.push("x");
        }
        assert_eq!(screen.line_count(), MAX_LINES);
        assert_eq!(screen.get_line(MAX_LINES), "");
    }

    #[test]
    fn test_formatted_line() {
        let mut screen = Screen::new("t", Tone::Success);
        screen.push_fmt(format_args!("Port {}", 3));
        screen.select_last();
        assert_eq!(screen.get_line(0), "Port 3");
        assert_eq!(screen.selected(), Some(0));
        assert_eq!(screen.tone(), Tone::Success);
    }

    #[test]
    fn test_multibyte_boundary() {
        let screen = Screen::new("t", Tone::Neutral).line("µµµµµµµµµµµµµµµµµµ");
        assert!(screen.get_line(0).chars().all(|c| c == 'µ'));
        assert!(screen.get_line(0).len() <= LINE_LEN);
    }
}
