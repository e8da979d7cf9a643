//! Tokenizer for the line-oriented solution format.
//!
//! ```text
//! # comment
//! #s cost 13
//! open 2
//! equip 2 0
//! assign 0 31 2
//! ```
//!
//! The reader does not interpret indices; it only splits lines into directives
//! and hands them to a [`SolutionVisitor`].

use std::io::BufRead;
use thiserror::Error;

pub const OPEN_DIRECTIVE: &str = "open";
pub const EQUIP_DIRECTIVE: &str = "equip";
pub const ASSIGN_DIRECTIVE: &str = "assign";
pub const STRIDE_PREFIX: &str = "#s";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Continue,
    Terminate,
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Line {} has {found} arguments, but `{directive}` expects {expected}", lineno + 1)]
    Arity {
        lineno: usize,
        directive: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Line {}: argument `{token}` of `{directive}` is not a non-negative integer", lineno + 1)]
    InvalidArgument {
        lineno: usize,
        directive: &'static str,
        token: String,
    },
}

pub trait SolutionVisitor {
    fn visit_open(&mut self, lineno: usize, location: u32) -> Action;

    fn visit_equip(&mut self, lineno: usize, location: u32, service: u32) -> Action;

    fn visit_assign(&mut self, lineno: usize, service: u32, demand: u32, location: u32) -> Action;

    fn visit_stride_line(&mut self, _lineno: usize, _line: &str, _key: &str, _value: &str) -> Action {
        Action::Continue
    }

    fn visit_comment(&mut self, _lineno: usize, _line: &str) -> Action {
        Action::Continue
    }

    fn visit_line_with_extra_whitespace(&mut self, _lineno: usize, _line: &str) -> Action {
        Action::Continue
    }

    fn visit_unrecognized_dash_line(&mut self, _lineno: usize, _line: &str) -> Action {
        Action::Continue
    }

    fn visit_unrecognized_line(&mut self, _lineno: usize, _line: &str) -> Action {
        Action::Continue
    }
}

pub struct LineReader<'a, V: SolutionVisitor> {
    visitor: &'a mut V,
}

impl<'a, V: SolutionVisitor> LineReader<'a, V> {
    pub fn new(visitor: &'a mut V) -> Self {
        Self { visitor }
    }

    pub fn read(&mut self, reader: impl BufRead) -> Result<(), ReaderError> {
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;

            if self.visit_line(lineno, &line)? == Action::Terminate {
                break;
            }
        }

        Ok(())
    }

    fn visit_line(&mut self, lineno: usize, line: &str) -> Result<Action, ReaderError> {
        let trimmed = line.trim();

        if trimmed.len() != line.len()
            && self.visitor.visit_line_with_extra_whitespace(lineno, line) == Action::Terminate
        {
            return Ok(Action::Terminate);
        }

        if trimmed.is_empty() {
            return Ok(Action::Continue);
        }

        if let Some(rest) = trimmed.strip_prefix(STRIDE_PREFIX)
            && rest.starts_with(char::is_whitespace)
        {
            return Ok(match rest.trim().split_once(char::is_whitespace) {
                Some((key, value)) => {
                    self.visitor
                        .visit_stride_line(lineno, line, key, value.trim())
                }
                None => self.visitor.visit_unrecognized_dash_line(lineno, line),
            });
        }

        if let Some(rest) = trimmed.strip_prefix('#') {
            return Ok(if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                self.visitor.visit_comment(lineno, line)
            } else {
                self.visitor.visit_unrecognized_dash_line(lineno, line)
            });
        }

        let mut tokens = trimmed.split_whitespace();
        let (directive, arity) = match tokens.next() {
            Some(OPEN_DIRECTIVE) => (OPEN_DIRECTIVE, 1),
            Some(EQUIP_DIRECTIVE) => (EQUIP_DIRECTIVE, 2),
            Some(ASSIGN_DIRECTIVE) => (ASSIGN_DIRECTIVE, 3),
            _ => return Ok(self.visitor.visit_unrecognized_line(lineno, line)),
        };

        let args: Vec<&str> = tokens.collect();
        if args.len() != arity {
            return Err(ReaderError::Arity {
                lineno,
                directive,
                expected: arity,
                found: args.len(),
            });
        }

        let args = args
            .into_iter()
            .map(|token| {
                token.parse::<u32>().map_err(|_| ReaderError::InvalidArgument {
                    lineno,
                    directive,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match args[..] {
            [l] => self.visitor.visit_open(lineno, l),
            [l, f] => self.visitor.visit_equip(lineno, l, f),
            [f, u, l] => self.visitor.visit_assign(lineno, f, u, l),
            _ => unreachable!("arity was checked above"),
        })
    }
}
