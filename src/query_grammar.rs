//! Grammar check for formulated arXiv-style queries.
//!
//! A valid query is built only from field-qualified terms (`ti:`, `au:`,
//! `abs:`, `cat:`, `all:`), double-quoted phrases, uppercase connectors
//! (`AND`, `OR`, `ANDNOT`) and balanced parentheses. Bare words are accepted
//! only inside a field group such as `all:(rag OR chunking)`.

use crate::error::{PaperflowError, Result};

/// Field prefixes understood by arXiv
pub const FIELDS: &[&str] = &["ti", "au", "abs", "cat", "all"];

/// Boolean connectors, uppercase only
pub const CONNECTORS: &[&str] = &["AND", "OR", "ANDNOT"];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open,
    Close,
    Connector(String),
    /// `field:value` or `field:"quoted value"`
    Term { field: String, value: String },
    /// `field:(` opening a group qualified by the field
    FieldGroup(String),
    Phrase(String),
    Word(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
            Token::Connector(c) => write!(f, "{}", c),
            Token::Term { field, value } => write!(f, "{}:{}", field, value),
            Token::FieldGroup(field) => write!(f, "{}:(", field),
            Token::Phrase(p) => write!(f, "\"{}\"", p),
            Token::Word(w) => write!(f, "{}", w),
        }
    }
}

fn invalid(reason: String) -> PaperflowError {
    PaperflowError::Formulation(format!("invalid query: {}", reason))
}

/// Split a query into tokens.
pub fn tokenize(query: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = query.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::Open);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::Close);
            i += 1;
        } else if c == '"' {
            let (phrase, next) = read_phrase(&chars, i)?;
            tokens.push(Token::Phrase(phrase));
            i = next;
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() && !matches!(chars[i], '(' | ')' | '"') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();

            if let Some((field, value)) = word.split_once(':') {
                if !FIELDS.contains(&field) {
                    return Err(invalid(format!("unknown field prefix '{}:'", field)));
                }
                if !value.is_empty() {
                    tokens.push(Token::Term {
                        field: field.to_string(),
                        value: value.to_string(),
                    });
                } else if i < chars.len() && chars[i] == '"' {
                    let (phrase, next) = read_phrase(&chars, i)?;
                    tokens.push(Token::Term {
                        field: field.to_string(),
                        value: format!("\"{}\"", phrase),
                    });
                    i = next;
                } else if i < chars.len() && chars[i] == '(' {
                    tokens.push(Token::FieldGroup(field.to_string()));
                    i += 1;
                } else {
                    return Err(invalid(format!("field prefix '{}:' has no value", field)));
                }
            } else if CONNECTORS.contains(&word.as_str()) {
                tokens.push(Token::Connector(word));
            } else if CONNECTORS.contains(&word.to_uppercase().as_str()) {
                return Err(invalid(format!("connector '{}' must be uppercase", word)));
            } else {
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

/// Read a quoted phrase starting at the opening quote; returns the phrase and
/// the index after the closing quote.
fn read_phrase(chars: &[char], open: usize) -> Result<(String, usize)> {
    let mut i = open + 1;
    while i < chars.len() && chars[i] != '"' {
        i += 1;
    }
    if i >= chars.len() {
        return Err(invalid("unterminated quoted phrase".to_string()));
    }
    let phrase: String = chars[open + 1..i].iter().collect();
    if phrase.trim().is_empty() {
        return Err(invalid("empty quoted phrase".to_string()));
    }
    Ok((phrase, i + 1))
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn expr(&mut self, in_field_group: bool) -> Result<()> {
        self.operand(in_field_group)?;
        while let Some(Token::Connector(_)) = self.peek() {
            self.pos += 1;
            self.operand(in_field_group)?;
        }
        Ok(())
    }

    fn operand(&mut self, in_field_group: bool) -> Result<()> {
        match self.next() {
            Some(Token::Open) => {
                self.expr(in_field_group)?;
                self.close()
            }
            Some(Token::FieldGroup(_)) => {
                self.expr(true)?;
                self.close()
            }
            Some(Token::Term { .. }) | Some(Token::Phrase(_)) => Ok(()),
            Some(Token::Word(_)) if in_field_group => Ok(()),
            Some(Token::Word(w)) => Err(invalid(format!("unqualified term '{}'", w))),
            Some(token) => Err(invalid(format!("unexpected '{}'", token))),
            None => Err(invalid("unexpected end of query".to_string())),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.next() {
            Some(Token::Close) => Ok(()),
            Some(token) => Err(invalid(format!("expected ')' but found '{}'", token))),
            None => Err(invalid("unbalanced parentheses".to_string())),
        }
    }
}

/// Check that `query` is a well-formed field-qualified boolean query.
pub fn validate(query: &str) -> Result<()> {
    let tokens = tokenize(query)?;
    if tokens.is_empty() {
        return Err(invalid("query is empty".to_string()));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    parser.expr(false)?;

    match parser.peek() {
        None => Ok(()),
        Some(token) => Err(invalid(format!("unexpected '{}'", token))),
    }
}

/// Whether the query carries at least one field prefix.
pub fn has_field_prefix(query: &str) -> bool {
    FIELDS.iter().any(|f| query.contains(&format!("{}:", f)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_expanded_queries() {
        let queries = [
            r#"(all:"text-to-image synthesis" OR all:"image generation") AND (abs:"diffusion models" OR abs:dall-e)"#,
            r#"(ti:"BERT" OR abs:"Bidirectional Encoder Representations from Transformers") AND cat:cs.CL"#,
            r#"all:("stochastic differential equation" OR "SDE") ANDNOT au:smith"#,
            r#"all:(rag OR chunking)"#,
            r#"ti:transformer"#,
        ];
        for q in queries {
            assert!(validate(q).is_ok(), "rejected: {}", q);
        }
    }

    #[test]
    fn test_rejects_prose() {
        let err = validate(r#"This searches all:"rag""#).unwrap_err();
        assert!(err.to_string().contains("unqualified term"));
        assert!(validate(r#"Here is the query: all:"rag""#).is_err());
    }

    #[test]
    fn test_rejects_lowercase_connector() {
        assert!(validate(r#"all:"rag" and all:"chunking""#).is_err());
    }

    #[test]
    fn test_rejects_unbalanced_and_dangling() {
        assert!(validate(r#"(all:"rag" OR all:"retrieval""#).is_err());
        assert!(validate(r#"all:"rag")"#).is_err());
        assert!(validate(r#"all:"rag" AND"#).is_err());
        assert!(validate(r#"all:"rag"#).is_err());
        assert!(validate("").is_err());
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert!(validate(r#"title:"rag""#).is_err());
    }

    #[test]
    fn test_tokenize_field_forms() {
        let tokens = tokenize(r#"ti:"A B" cat:cs.IR all:("x")"#).expect("tokens");
        assert_eq!(
            tokens,
            vec![
                Token::Term { field: "ti".into(), value: "\"A B\"".into() },
                Token::Term { field: "cat".into(), value: "cs.IR".into() },
                Token::FieldGroup("all".into()),
                Token::Phrase("x".into()),
                Token::Close,
            ]
        );
    }
}
