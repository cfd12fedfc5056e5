//! Parser for the path grammar inside a `{{ expr }}` expression.
//!
//! ```text
//! expr   ::= "$input" path*
//!          | "$node" "[" string "]" "." "json" path*
//!          | "$env" "." ident
//!          | "$execution" "." ("id" | "startedAt")
//!          | "$vars" "." ident path*
//!          | "$loop" "." ("index" | "item" path*)
//! path   ::= "." ident | "[" (number | string) "]"
//! ```
//!
//! This is intentionally a tiny hand-rolled scanner: the grammar has no
//! arithmetic, no function calls, and no operator precedence to speak of
//! (§4.1 -- "value references only").

use flowright_core::PathSegment;

use crate::error::ExpressionError;

/// The resolved root scope of a parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    /// `$input`
    Input,
    /// `$node["<id>"].json`
    Node(String),
    /// `$env.<name>`
    Env(String),
    /// `$execution.id` or `$execution.startedAt`
    Execution(ExecutionField),
    /// `$vars.<name>`
    Vars(String),
    /// `$loop.index` or `$loop.item`
    Loop(LoopField),
}

/// Which `$execution` field was referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionField {
    /// `$execution.id`
    Id,
    /// `$execution.startedAt`
    StartedAt,
}

/// Which `$loop` field was referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopField {
    /// `$loop.index`
    Index,
    /// `$loop.item`
    Item,
}

/// A fully parsed expression: a root scope plus a chain of path segments
/// applied to whatever the root resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExpr {
    /// The scope the expression starts from.
    pub root: Root,
    /// Further field/index accesses applied to the root's value.
    pub path: Vec<PathSegment>,
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        match self.bump() {
            Some(got) if got == c => Ok(()),
            Some(got) => Err(format!("expected '{c}', found '{got}'")),
            None => Err(format!("expected '{c}', found end of input")),
        }
    }

    fn read_ident(&mut self) -> Result<String, String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err("expected identifier".to_owned());
        }
        Ok(self.src[start..self.pos].to_owned())
    }

    /// Reads a single- or double-quoted string literal, returning its
    /// unescaped contents.
    fn read_quoted(&mut self) -> Result<String, String> {
        let quote = self.bump().ok_or("expected quote")?;
        if quote != '"' && quote != '\'' {
            return Err("expected a quoted string".to_owned());
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let s = self.src[start..self.pos].to_owned();
                self.bump();
                return Ok(s);
            }
            self.bump();
        }
        Err("unterminated string literal".to_owned())
    }

    fn read_index_or_field(&mut self) -> Result<PathSegment, String> {
        self.expect('[')?;
        match self.peek() {
            Some('"') | Some('\'') => {
                let s = self.read_quoted()?;
                self.expect(']')?;
                Ok(PathSegment::Field(s))
            }
            _ => {
                let start = self.pos;
                if self.peek() == Some('-') {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
                let num_str = &self.src[start..self.pos];
                let n: i64 = num_str
                    .parse()
                    .map_err(|_| format!("invalid index '{num_str}'"))?;
                self.expect(']')?;
                Ok(PathSegment::Index(n))
            }
        }
    }

    /// Parses a trailing chain of `.field` / `[index]` segments.
    fn read_path_chain(&mut self) -> Result<Vec<PathSegment>, String> {
        let mut segments = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.bump();
                    let ident = self.read_ident()?;
                    segments.push(PathSegment::Field(ident));
                }
                '[' => {
                    segments.push(self.read_index_or_field()?);
                }
                _ => return Err(format!("unexpected character '{c}' in path")),
            }
        }
        Ok(segments)
    }
}

/// Parse a `{{ }}`-stripped expression body into a root scope and path chain.
pub fn parse(expr: &str) -> Result<ParsedExpr, ExpressionError> {
    let trimmed = expr.trim();
    let syntax_err = |reason: String| ExpressionError::Syntax {
        expr: expr.to_owned(),
        reason,
    };

    let mut scanner = Scanner::new(trimmed);
    scanner
        .expect('$')
        .map_err(|e| syntax_err(e.clone()))?;
    let scope = scanner.read_ident().map_err(syntax_err)?;

    match scope.as_str() {
        "input" => {
            let path = scanner.read_path_chain().map_err(syntax_err)?;
            Ok(ParsedExpr {
                root: Root::Input,
                path,
            })
        }
        "node" => {
            if scanner.peek() != Some('[') {
                return Err(syntax_err("expected '[\"<node id>\"]' after $node".into()));
            }
            let PathSegment::Field(node_id) = scanner.read_index_or_field().map_err(syntax_err)?
            else {
                return Err(syntax_err("$node index must be a quoted node id".into()));
            };
            scanner.expect('.').map_err(syntax_err)?;
            let json_kw = scanner.read_ident().map_err(syntax_err)?;
            if json_kw != "json" {
                return Err(syntax_err(format!(
                    "expected '.json' after $node[\"{node_id}\"], found '.{json_kw}'"
                )));
            }
            let path = scanner.read_path_chain().map_err(syntax_err)?;
            Ok(ParsedExpr {
                root: Root::Node(node_id),
                path,
            })
        }
        "env" => {
            scanner.expect('.').map_err(syntax_err)?;
            let name = scanner.read_ident().map_err(syntax_err)?;
            if !scanner.eof() {
                return Err(syntax_err("$env does not support nested paths".into()));
            }
            Ok(ParsedExpr {
                root: Root::Env(name),
                path: Vec::new(),
            })
        }
        "execution" => {
            scanner.expect('.').map_err(syntax_err)?;
            let field = scanner.read_ident().map_err(syntax_err)?;
            let field = match field.as_str() {
                "id" => ExecutionField::Id,
                "startedAt" => ExecutionField::StartedAt,
                other => {
                    return Err(ExpressionError::UnknownExecutionField(other.to_owned()));
                }
            };
            if !scanner.eof() {
                return Err(syntax_err("$execution does not support nested paths".into()));
            }
            Ok(ParsedExpr {
                root: Root::Execution(field),
                path: Vec::new(),
            })
        }
        "vars" => {
            scanner.expect('.').map_err(syntax_err)?;
            let name = scanner.read_ident().map_err(syntax_err)?;
            let path = scanner.read_path_chain().map_err(syntax_err)?;
            Ok(ParsedExpr {
                root: Root::Vars(name),
                path,
            })
        }
        "loop" => {
            scanner.expect('.').map_err(syntax_err)?;
            let field = scanner.read_ident().map_err(syntax_err)?;
            match field.as_str() {
                "index" => {
                    if !scanner.eof() {
                        return Err(syntax_err("$loop.index does not support nested paths".into()));
                    }
                    Ok(ParsedExpr {
                        root: Root::Loop(LoopField::Index),
                        path: Vec::new(),
                    })
                }
                "item" => {
                    let path = scanner.read_path_chain().map_err(syntax_err)?;
                    Ok(ParsedExpr {
                        root: Root::Loop(LoopField::Item),
                        path,
                    })
                }
                other => Err(syntax_err(format!("unknown $loop field '{other}'"))),
            }
        }
        other => Err(ExpressionError::UnknownRoot(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_input() {
        let p = parse("$input").unwrap();
        assert_eq!(p.root, Root::Input);
        assert!(p.path.is_empty());
    }

    #[test]
    fn parses_input_with_field_path() {
        let p = parse("$input.x").unwrap();
        assert_eq!(p.root, Root::Input);
        assert_eq!(p.path, vec![PathSegment::Field("x".into())]);
    }

    #[test]
    fn parses_node_output_path() {
        let p = parse(r#"$node["http1"].json.body[0].id"#).unwrap();
        assert_eq!(p.root, Root::Node("http1".into()));
        assert_eq!(
            p.path,
            vec![
                PathSegment::Field("body".into()),
                PathSegment::Index(0),
                PathSegment::Field("id".into()),
            ]
        );
    }

    #[test]
    fn parses_negative_index() {
        let p = parse(r#"$node["n"].json.items[-1]"#).unwrap();
        assert_eq!(p.path.last(), Some(&PathSegment::Index(-1)));
    }

    #[test]
    fn node_requires_json_suffix() {
        let err = parse(r#"$node["n"].body"#).unwrap_err();
        assert!(matches!(err, ExpressionError::Syntax { .. }));
    }

    #[test]
    fn parses_env() {
        let p = parse("$env.API_KEY").unwrap();
        assert_eq!(p.root, Root::Env("API_KEY".into()));
    }

    #[test]
    fn parses_execution_id() {
        let p = parse("$execution.id").unwrap();
        assert_eq!(p.root, Root::Execution(ExecutionField::Id));
    }

    #[test]
    fn rejects_unknown_execution_field() {
        let err = parse("$execution.bogus").unwrap_err();
        assert!(matches!(err, ExpressionError::UnknownExecutionField(_)));
    }

    #[test]
    fn parses_vars_with_path() {
        let p = parse("$vars.config.region").unwrap();
        assert_eq!(p.root, Root::Vars("config".into()));
        assert_eq!(p.path, vec![PathSegment::Field("region".into())]);
    }

    #[test]
    fn parses_loop_item_path() {
        let p = parse("$loop.item.name").unwrap();
        assert_eq!(p.root, Root::Loop(LoopField::Item));
        assert_eq!(p.path, vec![PathSegment::Field("name".into())]);
    }

    #[test]
    fn parses_loop_index() {
        let p = parse("$loop.index").unwrap();
        assert_eq!(p.root, Root::Loop(LoopField::Index));
    }

    #[test]
    fn rejects_unknown_root() {
        let err = parse("$bogus.field").unwrap_err();
        assert!(matches!(err, ExpressionError::UnknownRoot(s) if s == "bogus"));
    }

    #[test]
    fn rejects_quoted_bracket_field_access() {
        let p = parse(r#"$input["weird key"]"#).unwrap();
        assert_eq!(p.path, vec![PathSegment::Field("weird key".into())]);
    }
}
