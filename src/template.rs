//! Text template with a single printf-style sequence number placeholder
//!
//! Accepted forms are `%d`, `%6d`, `%06d` and `%-6d`. `%%` renders a
//! literal percent sign.

use crate::error::GenError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Number { width: usize, zero_pad: bool, left: bool },
}

/// A parsed template holding exactly one number placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, GenError> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut placeholders = 0;
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            if chars.peek() == Some(&'%') {
                chars.next();
                literal.push('%');
                continue;
            }

            let mut zero_pad = false;
            let mut left = false;
            while let Some(&flag) = chars.peek() {
                match flag {
                    '0' => zero_pad = true,
                    '-' => left = true,
                    _ => break,
                }
                chars.next();
            }

            let mut digits = String::new();
            while let Some(&d) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                digits.push(d);
                chars.next();
            }

            match chars.next() {
                Some('d') => {}
                Some(other) => {
                    return Err(GenError::ConfigError(format!(
                        "unsupported template verb '%{other}' in {source:?}"
                    )))
                }
                None => {
                    return Err(GenError::ConfigError(format!(
                        "dangling '%' at end of template {source:?}"
                    )))
                }
            }

            let width = if digits.is_empty() {
                0
            } else {
                digits.parse().map_err(|_| {
                    GenError::ConfigError(format!("invalid placeholder width in {source:?}"))
                })?
            };

            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Number {
                width,
                // '-' wins over '0', as in printf
                zero_pad: zero_pad && !left,
                left,
            });
            placeholders += 1;
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        if placeholders != 1 {
            return Err(GenError::ConfigError(format!(
                "template must contain exactly one %d placeholder, found {placeholders}"
            )));
        }

        Ok(Self { pieces })
    }

    /// Render the template for a 1-based sequence number.
    pub fn render(&self, n: u64) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Number {
                    width,
                    zero_pad,
                    left,
                } => {
                    let width = *width;
                    let number = if *zero_pad {
                        format!("{n:0width$}")
                    } else if *left {
                        format!("{n:<width$}")
                    } else {
                        format!("{n:>width$}")
                    };
                    out.push_str(&number);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_padded() {
        let t = Template::parse("ID-%06d").unwrap();
        assert_eq!(t.render(1), "ID-000001");
        assert_eq!(t.render(1234567), "ID-1234567");
    }

    #[test]
    fn test_plain_and_width_forms() {
        assert_eq!(Template::parse("%d").unwrap().render(42), "42");
        assert_eq!(Template::parse("[%4d]").unwrap().render(7), "[   7]");
        assert_eq!(Template::parse("[%-4d]").unwrap().render(7), "[7   ]");
        assert_eq!(Template::parse("[%-04d]").unwrap().render(7), "[7   ]");
    }

    #[test]
    fn test_literal_percent_and_multiline() {
        let t = Template::parse("100%% genuine\nNo.%05d").unwrap();
        assert_eq!(t.render(12), "100% genuine\nNo.00012");
    }

    #[test]
    fn test_rejects_missing_placeholder() {
        let err = Template::parse("no number here").unwrap_err();
        assert!(matches!(err, GenError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_two_placeholders() {
        assert!(Template::parse("%d-%d").is_err());
    }

    #[test]
    fn test_rejects_other_verbs() {
        assert!(Template::parse("%s").is_err());
        assert!(Template::parse("%d %x").is_err());
        assert!(Template::parse("%d%").is_err());
    }
}
