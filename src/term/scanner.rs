// Byte scanner for PTY output. Splits the stream into printable text, C0
// controls, CSI sequences and the two graphics escapes (Kitty APC, Sixel DCS).
// State survives across `feed` calls since reads can split a sequence anywhere.

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// Upper bound for a buffered APC/DCS body before it is dropped
const MAX_SEQUENCE_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsSequence {
    /// Complete `ESC _ G ... ESC \` sequence, including introducer and terminator
    Kitty(Vec<u8>),
    /// Complete `ESC P ... q ... ESC \` sequence
    Sixel(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    Control(u8),
    Csi { params: String, action: char },
    Graphics(GraphicsSequence),
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Ground,
    Escape,
    Csi(String),
    Osc { saw_esc: bool },
    Apc { body: Vec<u8>, saw_esc: bool },
    Dcs { body: Vec<u8>, saw_esc: bool },
    /// Other string sequences (SOS/PM) are skipped up to ST
    Ignore { saw_esc: bool },
}

#[derive(Debug, Default)]
pub struct Scanner {
    state: State,
    text: Vec<u8>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Token> {
        let mut out = Vec::new();
        for &b in bytes {
            self.step(b, &mut out);
        }
        self.flush_text(&mut out, false);
        out
    }

    fn step(&mut self, b: u8, out: &mut Vec<Token>) {
        match &mut self.state {
            State::Ground => match b {
                ESC => {
                    self.flush_text(out, true);
                    self.state = State::Escape;
                }
                0x00..=0x1f | 0x7f => {
                    self.flush_text(out, true);
                    out.push(Token::Control(b));
                }
                _ => self.text.push(b),
            },
            State::Escape => {
                self.state = match b {
                    b'[' => State::Csi(String::new()),
                    b']' => State::Osc { saw_esc: false },
                    b'_' => State::Apc {
                        body: Vec::new(),
                        saw_esc: false,
                    },
                    b'P' => State::Dcs {
                        body: Vec::new(),
                        saw_esc: false,
                    },
                    b'X' | b'^' => State::Ignore { saw_esc: false },
                    _ => State::Ground,
                };
            }
            State::Csi(params) => {
                if (0x40..=0x7e).contains(&b) {
                    let params = std::mem::take(params);
                    out.push(Token::Csi {
                        params,
                        action: b as char,
                    });
                    self.state = State::Ground;
                } else if params.len() < 64 {
                    params.push(b as char);
                } else {
                    self.state = State::Ground;
                }
            }
            State::Osc { saw_esc } => {
                if b == BEL || (*saw_esc && b == b'\\') {
                    self.state = State::Ground;
                } else {
                    *saw_esc = b == ESC;
                }
            }
            State::Ignore { saw_esc } => {
                if *saw_esc && b == b'\\' {
                    self.state = State::Ground;
                } else {
                    *saw_esc = b == ESC;
                }
            }
            State::Apc { body, saw_esc } => {
                if *saw_esc && b == b'\\' {
                    let body = std::mem::take(body);
                    self.state = State::Ground;
                    if body.first() == Some(&b'G') {
                        out.push(Token::Graphics(GraphicsSequence::Kitty(wrap(b'_', &body))));
                    }
                } else if *saw_esc {
                    body.push(ESC);
                    body.push(b);
                    *saw_esc = false;
                } else if b == ESC {
                    *saw_esc = true;
                } else if body.len() < MAX_SEQUENCE_LEN {
                    body.push(b);
                }
            }
            State::Dcs { body, saw_esc } => {
                if *saw_esc && b == b'\\' {
                    let body = std::mem::take(body);
                    self.state = State::Ground;
                    if is_sixel_body(&body) {
                        out.push(Token::Graphics(GraphicsSequence::Sixel(wrap(b'P', &body))));
                    }
                } else if *saw_esc {
                    body.push(ESC);
                    body.push(b);
                    *saw_esc = false;
                } else if b == ESC {
                    *saw_esc = true;
                } else if body.len() < MAX_SEQUENCE_LEN {
                    body.push(b);
                }
            }
        }
    }

    /// Emit buffered text. An incomplete UTF-8 tail is kept for the next feed
    /// unless `force` is set.
    fn flush_text(&mut self, out: &mut Vec<Token>, force: bool) {
        if self.text.is_empty() {
            return;
        }
        let keep = if force {
            0
        } else {
            match std::str::from_utf8(&self.text) {
                Ok(_) => 0,
                Err(e) if e.error_len().is_none() => self.text.len() - e.valid_up_to(),
                Err(_) => 0,
            }
        };
        let split = self.text.len() - keep;
        let tail = self.text.split_off(split);
        let text = String::from_utf8_lossy(&self.text).into_owned();
        self.text = tail;
        if !text.is_empty() {
            out.push(Token::Text(text));
        }
    }
}

fn wrap(introducer: u8, body: &[u8]) -> Vec<u8> {
    let mut seq = Vec::with_capacity(body.len() + 4);
    seq.push(ESC);
    seq.push(introducer);
    seq.extend_from_slice(body);
    seq.push(ESC);
    seq.push(b'\\');
    seq
}

/// DCS parameters are digits and semicolons, then `q` selects sixel
fn is_sixel_body(body: &[u8]) -> bool {
    body.iter()
        .find(|b| !(b.is_ascii_digit() || **b == b';'))
        .is_some_and(|b| *b == b'q')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_controls() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"hi\r\nthere");
        assert_eq!(
            tokens,
            vec![
                Token::Text("hi".into()),
                Token::Control(b'\r'),
                Token::Control(b'\n'),
                Token::Text("there".into()),
            ]
        );
    }

    #[test]
    fn test_kitty_sequence_split_across_reads() {
        let mut scanner = Scanner::new();
        assert!(scanner.feed(b"\x1b_Ga=T,f=100;AAA").is_empty());
        let tokens = scanner.feed(b"A\x1b\\ok");
        assert_eq!(
            tokens,
            vec![
                Token::Graphics(GraphicsSequence::Kitty(b"\x1b_Ga=T,f=100;AAAA\x1b\\".to_vec())),
                Token::Text("ok".into()),
            ]
        );
    }

    #[test]
    fn test_sixel_detected_and_other_dcs_dropped() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1bP0;1q\"1;1;20;12#0~~\x1b\\\x1bP$qm\x1b\\");
        assert_eq!(tokens.len(), 1);
        assert!(matches!(&tokens[0], Token::Graphics(GraphicsSequence::Sixel(seq)) if seq.starts_with(b"\x1bP0;1q")));
    }

    #[test]
    fn test_csi_and_osc() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1b]0;title\x07\x1b[?1049h");
        assert_eq!(
            tokens,
            vec![Token::Csi {
                params: "?1049".into(),
                action: 'h'
            }]
        );
    }

    #[test]
    fn test_utf8_split() {
        let mut scanner = Scanner::new();
        let bytes = "é".as_bytes();
        assert!(scanner.feed(&bytes[..1]).is_empty());
        assert_eq!(scanner.feed(&bytes[1..]), vec![Token::Text("é".into())]);
    }
}
