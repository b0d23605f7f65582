//! Splits raw stdin bytes into trigger presses, pastes and keystrokes
//!
//! Bracketed paste markers and multi-byte characters can be cut in half by a
//! read, so anything incomplete at the end of a read is carried to the next.

const PASTE_START: &[u8] = b"\x1b[200~";
const PASTE_END: &[u8] = b"\x1b[201~";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Trigger,
    Keys(String),
    Paste(String),
}

pub struct InputSplitter {
    trigger: u8,
    carry: Vec<u8>,
    /// Paste body collected so far, while inside a paste
    paste: Option<Vec<u8>>,
}

impl InputSplitter {
    pub fn new(trigger: u8) -> Self {
        Self {
            trigger,
            carry: Vec::new(),
            paste: None,
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> Vec<InputEvent> {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(data);

        let mut events = Vec::new();
        let mut keys: Vec<u8> = Vec::new();
        let mut i = 0;

        while i < buf.len() {
            let rest = &buf[i..];

            if let Some(paste) = self.paste.as_mut() {
                match find(rest, PASTE_END) {
                    Some(pos) => {
                        paste.extend_from_slice(&rest[..pos]);
                        let body = std::mem::take(paste);
                        self.paste = None;
                        events.push(InputEvent::Paste(String::from_utf8_lossy(&body).into_owned()));
                        i += pos + PASTE_END.len();
                    }
                    None => {
                        let keep = partial_marker_len(rest, PASTE_END);
                        paste.extend_from_slice(&rest[..rest.len() - keep]);
                        self.carry = rest[rest.len() - keep..].to_vec();
                        i = buf.len();
                    }
                }
                continue;
            }

            if rest.starts_with(PASTE_START) {
                flush_keys(&mut keys, &mut events);
                self.paste = Some(Vec::new());
                i += PASTE_START.len();
                continue;
            }
            if rest.len() >= 2 && rest.len() < PASTE_START.len() && PASTE_START.starts_with(rest) {
                // maybe the start of a paste; decide on the next read. A lone ESC is a key.
                self.carry = rest.to_vec();
                break;
            }
            if rest[0] == self.trigger {
                flush_keys(&mut keys, &mut events);
                events.push(InputEvent::Trigger);
                i += 1;
                continue;
            }
            keys.push(rest[0]);
            i += 1;
        }

        // An incomplete UTF-8 sequence at the very end goes in front of the carry.
        let incomplete = incomplete_utf8_tail(&keys);
        if incomplete > 0 && self.carry.is_empty() {
            self.carry = keys.split_off(keys.len() - incomplete);
        }
        flush_keys(&mut keys, &mut events);
        events
    }
}

fn flush_keys(keys: &mut Vec<u8>, events: &mut Vec<InputEvent>) {
    if keys.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(keys).into_owned();
    keys.clear();
    events.push(InputEvent::Keys(text));
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the longest suffix of `data` that is a proper prefix of `marker`.
fn partial_marker_len(data: &[u8], marker: &[u8]) -> usize {
    (1..marker.len())
        .rev()
        .find(|&len| data.len() >= len && data.ends_with(&marker[..len]))
        .unwrap_or(0)
}

fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => 0,
        Err(e) if e.error_len().is_none() => bytes.len() - e.valid_up_to(),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTRL_G: u8 = 0x07;

    #[test]
    fn test_plain_keys_and_trigger() {
        let mut splitter = InputSplitter::new(CTRL_G);
        assert_eq!(
            splitter.feed(b"ls\x07q\r"),
            vec![
                InputEvent::Keys("ls".into()),
                InputEvent::Trigger,
                InputEvent::Keys("q\r".into())
            ]
        );
    }

    #[test]
    fn test_paste_in_one_read() {
        let mut splitter = InputSplitter::new(CTRL_G);
        assert_eq!(
            splitter.feed(b"a\x1b[200~line1\nline2\x1b[201~b"),
            vec![
                InputEvent::Keys("a".into()),
                InputEvent::Paste("line1\nline2".into()),
                InputEvent::Keys("b".into())
            ]
        );
    }

    #[test]
    fn test_paste_split_across_reads() {
        let mut splitter = InputSplitter::new(CTRL_G);
        assert!(splitter.feed(b"\x1b[20").is_empty());
        assert!(splitter.feed(b"0~hello \x07 wor").is_empty());
        assert!(splitter.feed(b"ld\x1b[2").is_empty());
        assert_eq!(
            splitter.feed(b"01~"),
            vec![InputEvent::Paste("hello \x07 world".into())]
        );
    }

    #[test]
    fn test_arrow_key_is_not_held_back() {
        let mut splitter = InputSplitter::new(CTRL_G);
        assert_eq!(splitter.feed(b"\x1b[A"), vec![InputEvent::Keys("\x1b[A".into())]);
    }

    #[test]
    fn test_lone_escape_is_delivered() {
        let mut splitter = InputSplitter::new(CTRL_G);
        assert_eq!(splitter.feed(b"\x1b"), vec![InputEvent::Keys("\x1b".into())]);
    }

    #[test]
    fn test_multibyte_char_split_across_reads() {
        let mut splitter = InputSplitter::new(CTRL_G);
        let bytes = "é".as_bytes();
        assert!(splitter.feed(&bytes[..1]).is_empty());
        assert_eq!(splitter.feed(&bytes[1..]), vec![InputEvent::Keys("é".into())]);
    }
}
