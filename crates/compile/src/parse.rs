//! The recursive-descent parser producing the syntax tree.

use crate::ast::{Arena, BinOp, Node, NodeId, NodeList, Param, ParamList, ValType};
use crate::error::{Error, Result};
use crate::token::{Lexer, Token};

/// A parsed translation unit: the node arena plus the top-level forms in
/// source order.
#[derive(Debug)]
pub(crate) struct Ast<'src> {
    pub(crate) arena: Arena<'src>,
    pub(crate) top: Vec<NodeId>,
}

/// Parses a source file into an [`Ast`].
pub(crate) fn parse(source: &str) -> Result<Ast<'_>> {
    let mut parser = Parser {
        lexer: Lexer::new(source),
        arena: Arena::default(),
    };

    let mut top = Vec::new();
    while let Some(token) = parser.lexer.next()? {
        if token != Token::Open {
            return Err(Error::Syntax);
        }
        top.push(parser.top_level()?);
    }

    Ok(Ast {
        arena: parser.arena,
        top,
    })
}

/// Words that can never name a function, parameter, or local.
fn is_reserved(name: &str) -> bool {
    ValType::from_symbol(name).is_some()
        || matches!(
            name,
            "void"
                | "fn"
                | "export"
                | "import"
                | "var"
                | "set"
                | "if"
                | "while"
                | "block"
                | "load"
                | "store"
        )
}

struct Parser<'src> {
    lexer: Lexer<'src>,
    arena: Arena<'src>,
}

impl<'src> Parser<'src> {
    fn expect(&mut self) -> Result<Token<'src>> {
        self.lexer.next()?.ok_or(Error::Syntax)
    }

    fn expect_open(&mut self) -> Result<()> {
        match self.expect()? {
            Token::Open => Ok(()),
            _ => Err(Error::Syntax),
        }
    }

    fn expect_close(&mut self) -> Result<()> {
        match self.expect()? {
            Token::Close => Ok(()),
            _ => Err(Error::Syntax),
        }
    }

    fn expect_symbol(&mut self) -> Result<&'src str> {
        match self.expect()? {
            Token::Symbol(symbol) => Ok(symbol),
            _ => Err(Error::Syntax),
        }
    }

    fn name(&mut self) -> Result<&'src str> {
        let symbol = self.expect_symbol()?;
        if is_reserved(symbol) {
            return Err(Error::Syntax);
        }
        Ok(symbol)
    }

    fn value_type(&mut self) -> Result<ValType> {
        ValType::from_symbol(self.expect_symbol()?).ok_or(Error::Syntax)
    }

    /// The return type of a function or import is present exactly when the
    /// token after the parameter list is a value type.
    fn result_type(&mut self) -> Result<Option<ValType>> {
        if let Some(Token::Symbol(symbol)) = self.lexer.peek()? {
            if let Some(ty) = ValType::from_symbol(symbol) {
                self.lexer.next()?;
                return Ok(Some(ty));
            }
        }
        Ok(None)
    }

    /// Parses one top-level form; the opening parenthesis is already
    /// consumed.
    fn top_level(&mut self) -> Result<NodeId> {
        match self.expect_symbol()? {
            "fn" => {
                let name = self.name()?;
                let params = self.params()?;
                let result = self.result_type()?;
                let body = self.body_list()?;
                self.arena.alloc(Node::Func {
                    name,
                    params,
                    result,
                    body,
                })
            }
            "export" => {
                let name = self.name()?;
                self.expect_close()?;
                self.arena.alloc(Node::Export(name))
            }
            "import" => {
                let module = self.expect_symbol()?;
                let field = self.name()?;
                let params = self.params()?;
                let result = self.result_type()?;
                self.expect_close()?;
                self.arena.alloc(Node::Import {
                    module,
                    field,
                    params,
                    result,
                })
            }
            _ => Err(Error::Syntax),
        }
    }

    /// Parses a `((name type) ...)` parameter list.
    fn params(&mut self) -> Result<ParamList> {
        self.expect_open()?;
        let mut params = Vec::new();
        loop {
            match self.expect()? {
                Token::Close => break,
                Token::Open => {
                    let name = self.name()?;
                    let ty = self.value_type()?;
                    self.expect_close()?;
                    params.push(Param { name, ty });
                }
                _ => return Err(Error::Syntax),
            }
        }
        self.arena.alloc_params(&params)
    }

    /// Parses expressions up to and including the matching `)`.
    fn body_list(&mut self) -> Result<NodeList> {
        let mut children = Vec::new();
        loop {
            match self.expect()? {
                Token::Close => break,
                token => children.push(self.expr(token)?),
            }
        }
        self.arena.alloc_list(&children)
    }

    fn expr_next(&mut self) -> Result<NodeId> {
        let token = self.expect()?;
        self.expr(token)
    }

    fn expr(&mut self, token: Token<'src>) -> Result<NodeId> {
        match token {
            Token::Int(value) => self.arena.alloc(Node::Int(value)),
            Token::Float(value) => self.arena.alloc(Node::Float(value)),
            Token::Symbol(name) => {
                if is_reserved(name) {
                    return Err(Error::Syntax);
                }
                self.arena.alloc(Node::Ident(name))
            }
            Token::Open => self.form(),
            Token::Close => Err(Error::Syntax),
        }
    }

    /// Parses a parenthesized expression; the opening parenthesis is already
    /// consumed.
    fn form(&mut self) -> Result<NodeId> {
        let head = self.expect_symbol()?;

        if let Some(op) = BinOp::from_symbol(head) {
            let lhs = self.expr_next()?;
            let rhs = self.expr_next()?;
            self.expect_close()?;
            return self.arena.alloc(Node::Binary { op, lhs, rhs });
        }

        match head {
            "var" => {
                let name = self.name()?;
                let ty = self.value_type()?;
                let init = self.expr_next()?;
                self.expect_close()?;
                self.arena.alloc(Node::Local { name, ty, init })
            }
            "set" => {
                let name = self.name()?;
                let value = self.expr_next()?;
                self.expect_close()?;
                self.arena.alloc(Node::Assign { name, value })
            }
            "if" => {
                let condition = self.expr_next()?;
                let then = self.expr_next()?;
                let otherwise = match self.expect()? {
                    Token::Close => None,
                    token => {
                        let otherwise = self.expr(token)?;
                        self.expect_close()?;
                        Some(otherwise)
                    }
                };
                self.arena.alloc(Node::If {
                    condition,
                    then,
                    otherwise,
                })
            }
            "while" => {
                let condition = self.expr_next()?;
                let body = self.body_list()?;
                self.arena.alloc(Node::While { condition, body })
            }
            "block" => {
                let children = self.body_list()?;
                self.arena.alloc(Node::Block(children))
            }
            "load" => {
                let ty = self.value_type()?;
                let addr = self.expr_next()?;
                self.expect_close()?;
                self.arena.alloc(Node::Load { ty, addr })
            }
            "store" => {
                let ty = self.value_type()?;
                let addr = self.expr_next()?;
                let value = self.expr_next()?;
                self.expect_close()?;
                self.arena.alloc(Node::Store { ty, addr, value })
            }
            callee => {
                // Declarations cannot appear in expression position, and the
                // reserved type names head no form.
                if is_reserved(callee) {
                    return Err(Error::Syntax);
                }
                let args = self.body_list()?;
                self.arena.alloc(Node::Call { callee, args })
            }
        }
    }
}
