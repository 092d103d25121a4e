//! In-band approval marker detection.
//!
//! A marker line looks like `[ApprovalRequired] task-42 → run: terraform apply`:
//! the marker tag, a whitespace-free task id, an arrow (`→` or `->`), and a
//! free-form action running to the end of the line.
//!
//! Scanning works on the current unterminated line of the output rather than
//! on each fragment alone, so a marker split across two fragments is still
//! found. The line is capped at `window_bytes`; a window of zero falls back to
//! scanning each fragment in isolation.

use regex::Regex;

use super::ApprovalRequest;

#[derive(Debug, Clone)]
pub struct ApprovalDetector {
    pattern: Regex,
    window_bytes: usize,
    /// Tail of the output since the last newline.
    line: String,
    /// Match already reported for `line`, to avoid raising it twice.
    reported: Option<(String, String)>,
    /// Task id already decided on `line`; further growth of the line for
    /// this task is not a new checkpoint.
    settled: Option<String>,
}

impl ApprovalDetector {
    /// Build a detector for one literal marker tag.
    pub fn new(marker: &str, window_bytes: usize) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"{}[^\S\n]+(\S+?)[^\S\n]+(?:→|->)[^\S\n]+([^\n]+)",
            regex::escape(marker)
        ))?;
        Ok(Self {
            pattern,
            window_bytes,
            line: String::new(),
            reported: None,
            settled: None,
        })
    }

    /// Match the marker pattern against `text`.
    ///
    /// When several marker lines are present the last one wins, matching the
    /// gate's last-write-wins policy.
    pub fn match_text(&self, text: &str) -> Option<ApprovalRequest> {
        text.lines()
            .filter_map(|line| {
                let caps = self.pattern.captures(line)?;
                let task_id = caps.get(1)?.as_str();
                let action = caps.get(2)?.as_str().trim();
                (!action.is_empty()).then(|| ApprovalRequest::new(task_id, action))
            })
            .last()
    }

    /// Feed one fragment and report a newly visible approval request.
    pub fn scan(&mut self, fragment: &str) -> Option<ApprovalRequest> {
        if self.window_bytes == 0 {
            return self.match_text(fragment);
        }

        let mut found = None;
        for piece in fragment.split_inclusive('\n') {
            self.line.push_str(piece);
            self.clamp_line();
            if let Some(hit) = self.match_text(&self.line) {
                let key = (hit.task_id.clone(), hit.proposed_action.clone());
                let settled = self.settled.as_deref() == Some(hit.task_id.as_str());
                if !settled && self.reported.as_ref() != Some(&key) {
                    self.reported = Some(key);
                    found = Some(hit);
                }
            }
            if self.line.ends_with('\n') {
                self.line.clear();
                self.reported = None;
                self.settled = None;
            }
        }
        found
    }

    /// Mark `task_id` as decided for the rest of the current line.
    ///
    /// No-op once the line carrying that request has ended.
    pub fn settle(&mut self, task_id: &str) {
        if matches!(&self.reported, Some((task, _)) if task == task_id) {
            self.settled = Some(task_id.to_string());
        }
    }

    /// Forget any partial line, e.g. when a new session starts.
    pub fn reset(&mut self) {
        self.line.clear();
        self.reported = None;
        self.settled = None;
    }

    fn clamp_line(&mut self) {
        if self.line.len() <= self.window_bytes {
            return;
        }
        let mut cut = self.line.len() - self.window_bytes;
        while !self.line.is_char_boundary(cut) {
            cut += 1;
        }
        self.line.drain(..cut);
    }
}
