// src/security/capture.rs - Blocking keystroke capture capability
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};

use crate::utils::epoch_ms;

/// One raw key event with press and (when reported) release timestamps in
/// milliseconds
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyEvent {
    pub key: char,
    pub press_ms: f64,
    pub release_ms: Option<f64>,
}

/// A completed capture round: the line as typed plus its timed events
#[derive(Clone, Debug, Default)]
pub struct CapturedLine {
    pub text: String,
    pub events: Vec<KeyEvent>,
}

/// Blocking source of typed lines with per-key timing.
///
/// The engine suspends on `capture_line` until one line is complete; there is
/// no callback surface and no shared listener state.
pub trait KeystrokeCapture: Send {
    fn capture_line(&mut self, prompt: &str) -> io::Result<CapturedLine>;
}

/// Interactive capture from the controlling terminal.
///
/// Release timestamps require the keyboard enhancement protocol; on terminals
/// without it events carry `release_ms = None`.
pub struct ConsoleCapture;

impl KeystrokeCapture for ConsoleCapture {
    fn capture_line(&mut self, prompt: &str) -> io::Result<CapturedLine> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        terminal::enable_raw_mode()?;
        let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if enhanced {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }

        let result = read_line_events(&mut stdout);

        if enhanced {
            let _ = execute!(stdout, PopKeyboardEnhancementFlags);
        }
        terminal::disable_raw_mode()?;
        writeln!(stdout)?;

        result
    }
}

fn read_line_events(stdout: &mut io::Stdout) -> io::Result<CapturedLine> {
    let mut line = CapturedLine::default();

    loop {
        if let Event::Key(key) = event::read()? {
            match (key.code, key.kind) {
                (KeyCode::Enter, KeyEventKind::Press) => break,
                (KeyCode::Backspace, KeyEventKind::Press) => {
                    if line.text.pop().is_some() {
                        write!(stdout, "\u{8} \u{8}")?;
                        stdout.flush()?;
                    }
                }
                (KeyCode::Char(c), KeyEventKind::Press) => {
                    line.text.push(c);
                    line.events.push(KeyEvent {
                        key: c,
                        press_ms: epoch_ms(),
                        release_ms: None,
                    });
                    write!(stdout, "{}", c)?;
                    stdout.flush()?;
                }
                (KeyCode::Char(c), KeyEventKind::Release) => {
                    // Pair with the most recent unreleased press of this key
                    if let Some(ev) = line
                        .events
                        .iter_mut()
                        .rev()
                        .find(|ev| ev.key == c && ev.release_ms.is_none())
                    {
                        ev.release_ms = Some(epoch_ms());
                    }
                }
                _ => {}
            }
        }
    }

    Ok(line)
}

/// Deterministic capture for tests and demos.
///
/// Pops pre-scripted rounds in order; once the script is exhausted it falls
/// back to a shared mailbox, which lets a delivered one-time code become the
/// next typed line.
pub struct ScriptedCapture {
    lines: VecDeque<CapturedLine>,
    mailbox: Option<Arc<Mutex<Option<String>>>>,
}

impl ScriptedCapture {
    pub fn new(lines: Vec<CapturedLine>) -> Self {
        ScriptedCapture {
            lines: lines.into(),
            mailbox: None,
        }
    }

    pub fn with_mailbox(lines: Vec<CapturedLine>, mailbox: Arc<Mutex<Option<String>>>) -> Self {
        ScriptedCapture {
            lines: lines.into(),
            mailbox: Some(mailbox),
        }
    }

    /// Build one well-formed round for `phrase`: evenly spaced presses with a
    /// fixed dwell and inter-key gap, starting at `start_ms`
    pub fn round(phrase: &str, start_ms: f64, dwell_ms: f64, gap_ms: f64) -> CapturedLine {
        let mut events = Vec::new();
        let mut t = start_ms;
        for c in phrase.chars() {
            events.push(KeyEvent {
                key: c,
                press_ms: t,
                release_ms: Some(t + dwell_ms),
            });
            t += dwell_ms + gap_ms;
        }
        CapturedLine {
            text: phrase.to_string(),
            events,
        }
    }
}

impl KeystrokeCapture for ScriptedCapture {
    fn capture_line(&mut self, _prompt: &str) -> io::Result<CapturedLine> {
        if let Some(line) = self.lines.pop_front() {
            return Ok(line);
        }
        if let Some(mailbox) = &self.mailbox {
            if let Some(code) = mailbox.lock().unwrap().take() {
                return Ok(CapturedLine {
                    text: code,
                    events: Vec::new(),
                });
            }
        }
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "capture script exhausted",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_builder_timing() {
        let round = ScriptedCapture::round("ab", 1000.0, 80.0, 120.0);
        assert_eq!(round.text, "ab");
        assert_eq!(round.events.len(), 2);
        assert_eq!(round.events[0].press_ms, 1000.0);
        assert_eq!(round.events[0].release_ms, Some(1080.0));
        // Next press lands one gap after the previous release
        assert_eq!(round.events[1].press_ms, 1200.0);
    }

    #[test]
    fn test_scripted_capture_pops_in_order() {
        let mut capture = ScriptedCapture::new(vec![
            ScriptedCapture::round("a", 0.0, 50.0, 50.0),
            ScriptedCapture::round("b", 1000.0, 50.0, 50.0),
        ]);
        assert_eq!(capture.capture_line("1. ").unwrap().text, "a");
        assert_eq!(capture.capture_line("2. ").unwrap().text, "b");
        assert!(capture.capture_line("3. ").is_err());
    }

    #[test]
    fn test_mailbox_fallback() {
        let mailbox = Arc::new(Mutex::new(Some("123456".to_string())));
        let mut capture = ScriptedCapture::with_mailbox(Vec::new(), mailbox.clone());
        assert_eq!(capture.capture_line("Enter token: ").unwrap().text, "123456");
        // A second read finds the mailbox empty
        assert!(capture.capture_line("Enter token: ").is_err());
    }
}
