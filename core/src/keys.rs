//! Raw terminal bytes to logical keys

/// A decoded keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    /// Completion request
    Tab,
    Up,
    Down,
    Escape,
    CtrlC,
    /// Any other control byte or escape sequence
    Unknown,
}

impl Key {
    /// Decode everything in `data`. One read may hold several keys.
    pub fn decode(data: &str) -> Vec<Key> {
        let mut keys = Vec::new();
        let mut chars = data.chars().peekable();

        while let Some(ch) = chars.next() {
            let key = match ch {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    Key::Enter
                }
                '\n' => Key::Enter,
                '\x7f' | '\x08' => Key::Backspace,
                '\t' => Key::Tab,
                '\x03' => Key::CtrlC,
                '\x1b' => match chars.peek() {
                    Some('[') => {
                        chars.next();
                        // CSI: parameter bytes then one final byte in @..~
                        let mut final_byte = None;
                        for c in chars.by_ref() {
                            if ('\x40'..='\x7e').contains(&c) {
                                final_byte = Some(c);
                                break;
                            }
                        }
                        match final_byte {
                            Some('A') => Key::Up,
                            Some('B') => Key::Down,
                            _ => Key::Unknown,
                        }
                    }
                    Some('O') => {
                        chars.next();
                        match chars.next() {
                            Some('A') => Key::Up,
                            Some('B') => Key::Down,
                            _ => Key::Unknown,
                        }
                    }
                    _ => Key::Escape,
                },
                c if c.is_control() => Key::Unknown,
                c => Key::Char(c),
            };
            keys.push(key);
        }

        keys
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self, Key::Escape | Key::CtrlC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_and_editing_keys() {
        assert_eq!(
            Key::decode("ls\x7f\r"),
            vec![Key::Char('l'), Key::Char('s'), Key::Backspace, Key::Enter]
        );
        assert_eq!(Key::decode("é"), vec![Key::Char('é')]);
        assert_eq!(Key::decode("\r\n"), vec![Key::Enter]);
        assert_eq!(Key::decode("\t\x03"), vec![Key::Tab, Key::CtrlC]);
    }

    #[test]
    fn test_arrow_keys_both_forms() {
        assert_eq!(Key::decode("\x1b[A\x1b[B"), vec![Key::Up, Key::Down]);
        assert_eq!(Key::decode("\x1bOA\x1bOB"), vec![Key::Up, Key::Down]);
    }

    #[test]
    fn test_other_sequences_are_consumed_whole() {
        // Delete key, then a letter
        assert_eq!(Key::decode("\x1b[3~x"), vec![Key::Unknown, Key::Char('x')]);
        // Modified right arrow
        assert_eq!(Key::decode("\x1b[1;5C"), vec![Key::Unknown]);
    }

    #[test]
    fn test_lone_escape() {
        assert_eq!(Key::decode("\x1b"), vec![Key::Escape]);
        assert!(Key::Escape.is_cancel());
        assert!(Key::CtrlC.is_cancel());
        assert!(!Key::Enter.is_cancel());
    }
}
