use std::time::{Duration, Instant};

use crate::util::kib_rounded_up;

pub const PASTE_START: &str = "\x1b[200~";
pub const PASTE_END: &str = "\x1b[201~";
pub const DEFAULT_PASTE_REDRAW_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_PASTE_REPORT_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Line(String),
    /// Swallowed into an open paste. `redraw` is set at most once per
    /// redraw interval.
    Pending { redraw: bool },
    Pasted(String),
}

/// Reassembles bracketed pastes that arrive split over several raw lines.
#[derive(Debug)]
pub struct PasteAccumulator {
    in_paste: bool,
    buffer: String,
    last_redraw: Option<Instant>,
    redraw_interval: Duration,
    report_threshold: usize,
}

impl PasteAccumulator {
    pub fn new(redraw_interval: Duration, report_threshold: usize) -> Self {
        Self {
            in_paste: false,
            buffer: String::new(),
            last_redraw: None,
            redraw_interval,
            report_threshold,
        }
    }

    pub fn observe(&mut self, raw: &str) -> Observed {
        self.observe_at(raw, Instant::now())
    }

    pub fn observe_at(&mut self, raw: &str, now: Instant) -> Observed {
        if self.in_paste {
            self.buffer.push('\n');
            return self.continue_paste(raw, now);
        }

        let Some(start) = raw.find(PASTE_START) else {
            return Observed::Line(raw.replace(PASTE_END, ""));
        };

        self.in_paste = true;
        self.last_redraw = Some(now);
        self.buffer.clear();
        self.buffer.push_str(&raw[..start]);
        self.continue_paste(&raw[start + PASTE_START.len()..], now)
    }

    fn continue_paste(&mut self, chunk: &str, now: Instant) -> Observed {
        let Some(end) = chunk.find(PASTE_END) else {
            self.buffer.push_str(chunk);
            return Observed::Pending {
                redraw: self.redraw_due(now),
            };
        };

        self.buffer.push_str(&chunk[..end]);
        let trailing = &chunk[end + PASTE_END.len()..];
        self.buffer
            .push_str(&trailing.replace(PASTE_START, "").replace(PASTE_END, ""));
        self.in_paste = false;
        self.last_redraw = None;
        Observed::Pasted(std::mem::take(&mut self.buffer))
    }

    fn redraw_due(&mut self, now: Instant) -> bool {
        match self.last_redraw {
            Some(last) if now.duration_since(last) < self.redraw_interval => false,
            _ => {
                self.last_redraw = Some(now);
                true
            }
        }
    }

    pub fn report_for(&self, pasted: &str) -> Option<String> {
        (pasted.len() >= self.report_threshold)
            .then(|| format!("[Pasted {} KB]", kib_rounded_up(pasted.len())))
    }

    pub fn is_pasting(&self) -> bool {
        self.in_paste
    }

    /// Ends an open paste early and returns what it collected so far,
    /// including any text typed before the start marker.
    pub fn take_partial(&mut self) -> Option<String> {
        if !self.in_paste {
            return None;
        }
        let partial = std::mem::take(&mut self.buffer);
        self.reset();
        (!partial.is_empty()).then_some(partial)
    }

    pub fn reset(&mut self) {
        self.in_paste = false;
        self.buffer.clear();
        self.last_redraw = None;
    }
}

impl Default for PasteAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_PASTE_REDRAW_INTERVAL, DEFAULT_PASTE_REPORT_THRESHOLD)
    }
}

/// Wraps already-delimited paste text so it travels the same path as a
/// bracketed paste read from a cooked terminal.
pub fn frame_paste(text: &str) -> String {
    format!("{PASTE_START}{text}{PASTE_END}")
}
