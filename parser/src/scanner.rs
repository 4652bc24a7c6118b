use crate::errors::{ParseError, ParseResult};
use crate::token::{Token, TokenKind};
use pact_common::{SourceLocation, Span};

/// Tokenizes a single named source unit and keeps enough information around
/// to translate byte offsets back to line/column pairs.
///
/// The scanner owns the raw source text for the lifetime of the compilation;
/// the driver re-uses it across parses via [`Scanner::reset`].
pub struct Scanner {
    source_name: String,
    content: String,
    line_starts: Vec<usize>,
}

impl Scanner {
    pub fn new(content: impl Into<String>, source_name: impl Into<String>) -> Self {
        let content = content.into();
        let line_starts = line_starts(&content);
        Self {
            source_name: source_name.into(),
            content,
            line_starts,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Discards derived state. Tokens are produced on demand by
    /// [`Scanner::scan`], so there is nothing else to drop.
    pub fn reset(&mut self) {}

    /// Translate a byte offset to a zero-based `(line, column)` pair.
    pub fn translate_position_to_line_column(&self, offset: usize) -> (usize, usize) {
        let line = self
            .line_starts
            .binary_search(&offset)
            .unwrap_or_else(|next_line| next_line - 1);
        (line, offset - self.line_starts[line])
    }

    /// Produce the token stream for the whole source.
    pub fn scan(&self) -> ParseResult<Vec<Token>> {
        let mut tokens = vec![];
        let bytes = self.content.as_bytes();
        let mut pos = 0;

        while pos < bytes.len() {
            let start = pos;
            let ch = bytes[pos] as char;

            if ch.is_ascii_whitespace() {
                pos += 1;
                continue;
            }

            // comments; `///` doc comments become tokens
            if ch == '/' && bytes.get(pos + 1) == Some(&b'/') {
                let is_doc = bytes.get(pos + 2) == Some(&b'/') && bytes.get(pos + 3) != Some(&b'/');
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
                if is_doc {
                    let text = self.content[start + 3..pos].trim().to_string();
                    tokens.push(Token {
                        kind: TokenKind::DocComment,
                        text,
                        span: Span::new(start, pos),
                    });
                }
                continue;
            }
            if ch == '/' && bytes.get(pos + 1) == Some(&b'*') {
                pos += 2;
                while pos + 1 < bytes.len() && !(bytes[pos] == b'*' && bytes[pos + 1] == b'/') {
                    pos += 1;
                }
                if pos + 1 >= bytes.len() {
                    return Err(self.error("unterminated block comment", start, bytes.len()));
                }
                pos += 2;
                continue;
            }

            if ch.is_ascii_alphabetic() || ch == '_' || ch == '$' {
                while pos < bytes.len()
                    && ((bytes[pos] as char).is_ascii_alphanumeric()
                        || bytes[pos] == b'_'
                        || bytes[pos] == b'$')
                {
                    pos += 1;
                }
                let text = &self.content[start..pos];
                let kind = TokenKind::from_keyword(text).unwrap_or(TokenKind::Name);
                tokens.push(Token {
                    kind,
                    text: text.to_string(),
                    span: Span::new(start, pos),
                });
                continue;
            }

            if ch.is_ascii_digit() {
                let hex = ch == '0'
                    && matches!(bytes.get(pos + 1), Some(b'x') | Some(b'X'))
                    && bytes
                        .get(pos + 2)
                        .map_or(false, |byte| (*byte as char).is_ascii_hexdigit());
                if hex {
                    pos += 2;
                    while pos < bytes.len() && (bytes[pos] as char).is_ascii_hexdigit() {
                        pos += 1;
                    }
                } else {
                    while pos < bytes.len()
                        && ((bytes[pos] as char).is_ascii_digit() || bytes[pos] == b'_')
                    {
                        pos += 1;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Num,
                    text: self.content[start..pos].to_string(),
                    span: Span::new(start, pos),
                });
                continue;
            }

            if ch == '"' {
                pos += 1;
                while pos < bytes.len() && bytes[pos] != b'"' && bytes[pos] != b'\n' {
                    pos += 1;
                }
                if pos >= bytes.len() || bytes[pos] != b'"' {
                    return Err(self.error("unterminated string literal", start, pos));
                }
                pos += 1;
                tokens.push(Token {
                    kind: TokenKind::Str,
                    text: self.content[start + 1..pos - 1].to_string(),
                    span: Span::new(start, pos),
                });
                continue;
            }

            let (kind, len) = match (ch, bytes.get(pos + 1).map(|byte| *byte as char)) {
                ('=', Some('=')) => (TokenKind::EqEq, 2),
                ('!', Some('=')) => (TokenKind::NotEq, 2),
                ('<', Some('=')) => (TokenKind::LtEq, 2),
                ('>', Some('=')) => (TokenKind::GtEq, 2),
                ('&', Some('&')) => (TokenKind::AmpAmp, 2),
                ('|', Some('|')) => (TokenKind::PipePipe, 2),
                ('(', _) => (TokenKind::ParenOpen, 1),
                (')', _) => (TokenKind::ParenClose, 1),
                ('{', _) => (TokenKind::BraceOpen, 1),
                ('}', _) => (TokenKind::BraceClose, 1),
                (';', _) => (TokenKind::Semi, 1),
                (',', _) => (TokenKind::Comma, 1),
                ('.', _) => (TokenKind::Dot, 1),
                ('=', _) => (TokenKind::Eq, 1),
                ('+', _) => (TokenKind::Plus, 1),
                ('-', _) => (TokenKind::Minus, 1),
                ('*', _) => (TokenKind::Star, 1),
                ('/', _) => (TokenKind::Slash, 1),
                ('%', _) => (TokenKind::Percent, 1),
                ('<', _) => (TokenKind::Lt, 1),
                ('>', _) => (TokenKind::Gt, 1),
                ('!', _) => (TokenKind::Not, 1),
                _ => {
                    return Err(self.error(
                        format!("unexpected character `{}`", ch),
                        start,
                        start + 1,
                    ));
                }
            };
            pos += len;
            tokens.push(Token {
                kind,
                text: self.content[start..pos].to_string(),
                span: Span::new(start, pos),
            });
        }

        Ok(tokens)
    }

    fn error(&self, message: impl Into<String>, start: usize, end: usize) -> ParseError {
        ParseError::new(
            message,
            SourceLocation::new(Span::new(start, end), self.source_name.clone()),
        )
    }
}

fn line_starts(content: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(content.match_indices('\n').map(|(idx, _)| idx + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::Scanner;
    use crate::token::TokenKind;

    #[test]
    fn scans_contract_tokens() {
        let scanner = Scanner::new("contract A { function f() {} }", "");
        let kinds: Vec<_> = scanner.scan().unwrap().iter().map(|tok| tok.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Contract,
                TokenKind::Name,
                TokenKind::BraceOpen,
                TokenKind::Function,
                TokenKind::Name,
                TokenKind::ParenOpen,
                TokenKind::ParenClose,
                TokenKind::BraceOpen,
                TokenKind::BraceClose,
                TokenKind::BraceClose,
            ]
        );
    }

    #[test]
    fn doc_comments_survive() {
        let scanner = Scanner::new("/// @notice hi\ncontract A {}", "");
        let tokens = scanner.scan().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::DocComment);
        assert_eq!(tokens[0].text, "@notice hi");
    }

    #[test]
    fn position_translation_is_zero_based() {
        let scanner = Scanner::new("ab\ncd\nef", "");
        assert_eq!(scanner.translate_position_to_line_column(0), (0, 0));
        assert_eq!(scanner.translate_position_to_line_column(4), (1, 1));
        assert_eq!(scanner.translate_position_to_line_column(6), (2, 0));
    }

    #[test]
    fn rejects_unterminated_string() {
        let scanner = Scanner::new("import \"Lib", "A");
        let err = scanner.scan().unwrap_err();
        assert_eq!(err.location.source, "A");
    }
}
