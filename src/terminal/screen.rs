//! Screen model of the shell's output, used as prompt context

use shellwise_core::{SessionId, TerminalContext};

pub struct Screen {
    parser: vt100::Parser,
}

impl Screen {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            parser: vt100::Parser::new(rows, cols, 0),
        }
    }

    pub fn process(&mut self, data: &[u8]) {
        self.parser.process(data);
    }

    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.parser.set_size(rows, cols);
    }

    /// The last `count` non-blank rows, oldest first.
    pub fn recent_lines(&self, count: usize) -> String {
        let contents = self.parser.screen().contents();
        let lines: Vec<&str> = contents
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();
        let start = lines.len().saturating_sub(count);
        lines[start..].join("\n")
    }
}

impl TerminalContext for Screen {
    fn capture_recent_output(&self, _session: SessionId, line_count: usize) -> String {
        self.recent_lines(line_count)
    }
}
