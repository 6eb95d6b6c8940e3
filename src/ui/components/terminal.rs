use std::io::Stdout;

use crossterm::{execute, terminal};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};

use crate::error::{Context, Result};

type Backend = CrosstermBackend<Stdout>;

/// Holds raw mode and the alternate screen for as long as the dashboard runs.
pub struct TerminalGuard {
    terminal: Terminal<Backend>,
    restored: bool,
}

impl TerminalGuard {
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = std::io::stdout();
        if let Err(err) = execute!(stdout, terminal::EnterAlternateScreen) {
            let _ = terminal::disable_raw_mode();
            return Err(err.into());
        }

        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;
        terminal.clear()?;
        Ok(Self {
            terminal,
            restored: false,
        })
    }

    pub fn draw<F>(&mut self, render: F) -> Result<()>
    where
        F: FnOnce(&mut Frame<'_>),
    {
        self.terminal.draw(render)?;
        Ok(())
    }

    /// Idempotent; also runs on drop.
    pub fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        self.terminal.show_cursor()?;
        execute!(self.terminal.backend_mut(), terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()?;
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}
