use std::collections::BTreeSet;

use serde_json::Value as JsonValue;

use super::ast::{BinaryOp, Expr, HookKind, RequestField, Root, Scope, Stmt, StmtKind, Target, UnaryOp};
use super::builtins::{Builtin, Module};
use super::lexer::{tokenize, Tok, Token};
use crate::hooks::HookError;

type Result<T> = std::result::Result<T, HookError>;

/// Deepest expression tree a hook may contain. Evaluation and drop recurse per level.
const MAX_NESTING: usize = 128;

/// Compiles one hook body. Root availability and imports are checked here so a bad
/// program never reaches the runner.
pub(crate) fn parse_program(src: &str, kind: HookKind, imports: &BTreeSet<Module>) -> Result<Vec<Stmt>> {
    let tokens = tokenize(src)?;
    let mut p = Parser {
        src,
        tokens,
        pos: 0,
        nesting: 0,
        descent: 0,
        kind,
        imports,
    };
    p.program()
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Open `(`/`[` count; newlines inside them don't end a statement.
    nesting: usize,
    descent: usize,
    kind: HookKind,
    imports: &'a BTreeSet<Module>,
}

/// An expression with the height of its tree.
struct Node {
    expr: Expr,
    depth: usize,
}

impl Node {
    fn leaf(expr: Expr) -> Self {
        Self { expr, depth: 1 }
    }
}

impl Parser<'_> {
    fn program(&mut self) -> Result<Vec<Stmt>> {
        let mut out = Vec::new();
        loop {
            while self.eat(&Tok::Sep) {}
            if self.peek().is_none() {
                break;
            }
            out.push(self.statement()?);
            match self.peek() {
                None | Some(Tok::Sep) => {}
                Some(_) => return Err(self.error("expected end of statement")),
            }
        }
        Ok(out)
    }

    fn statement(&mut self) -> Result<Stmt> {
        let line = self.line();
        let kind = match self.peek_ident() {
            Some("assert") => {
                self.pos += 1;
                let start = self.offset();
                let cond = self.expr()?;
                let source = self.src[start..self.prev_end()].trim().to_string();
                let message = if self.eat(&Tok::Comma) { Some(self.expr()?) } else { None };
                StmtKind::Assert { cond, message, source }
            }
            Some("fail") => {
                self.pos += 1;
                StmtKind::Fail(self.expr()?)
            }
            Some("unset") => {
                self.pos += 1;
                let e = self.postfix()?;
                StmtKind::Unset(self.target(e.expr)?)
            }
            _ => {
                let lhs = self.expr()?;
                if !self.eat(&Tok::Assign) {
                    return Err(self.error("expected `=` (bare expressions have no effect)"));
                }
                let target = self.target(lhs)?;
                let value = self.expr()?;
                StmtKind::Assign { target, value }
            }
        };
        Ok(Stmt { kind, line })
    }

    fn target(&self, e: Expr) -> Result<Target> {
        let invalid = || self.error("invalid assignment target");
        match e {
            Expr::Member(base, name) => match *base {
                Expr::Root(Root::Globals) => Ok(Target::Var { scope: Scope::Globals, key: Expr::Literal(name.into()) }),
                Expr::Root(Root::Locals) => Ok(Target::Var { scope: Scope::Locals, key: Expr::Literal(name.into()) }),
                Expr::Root(Root::Request) => match name.as_str() {
                    "method" => Ok(Target::Request(RequestField::Method)),
                    "url" => Ok(Target::Request(RequestField::Url)),
                    "body" => Ok(Target::Request(RequestField::Body)),
                    _ => Err(invalid()),
                },
                inner if is_request_headers(&inner) => Ok(Target::RequestHeader(Expr::Literal(name.into()))),
                _ => Err(invalid()),
            },
            Expr::Index(base, key) => match *base {
                Expr::Root(Root::Globals) => Ok(Target::Var { scope: Scope::Globals, key: *key }),
                Expr::Root(Root::Locals) => Ok(Target::Var { scope: Scope::Locals, key: *key }),
                inner if is_request_headers(&inner) => Ok(Target::RequestHeader(*key)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        Ok(self.or()?.expr)
    }

    fn or(&mut self) -> Result<Node> {
        let mut lhs = self.and()?;
        while self.eat(&Tok::Or) {
            let rhs = self.and()?;
            lhs = self.binary(BinaryOp::Or, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Node> {
        let mut lhs = self.comparison()?;
        while self.eat(&Tok::And) {
            let rhs = self.comparison()?;
            lhs = self.binary(BinaryOp::And, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Node> {
        let lhs = self.additive()?;
        let Some(op) = self.peek().and_then(comparison_op) else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.additive()?;
        if self.peek().and_then(comparison_op).is_some() {
            return Err(self.error("comparisons cannot be chained; use `&&`"));
        }
        self.binary(op, lhs, rhs)
    }

    fn additive(&mut self) -> Result<Node> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinaryOp::Add,
                Some(Tok::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
    }

    fn unary(&mut self) -> Result<Node> {
        let op = match self.peek() {
            Some(Tok::Not) => UnaryOp::Not,
            Some(Tok::Minus) => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        self.pos += 1;
        self.descend()?;
        let inner = self.unary()?;
        self.ascend();
        self.wrap(inner.depth + 1, Expr::Unary(op, Box::new(inner.expr)))
    }

    fn postfix(&mut self) -> Result<Node> {
        let mut e = self.primary()?;
        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.pos += 1;
                    let Some(Tok::Ident(name)) = self.peek().cloned() else {
                        return Err(self.error("expected a name after `.`"));
                    };
                    self.pos += 1;
                    e = self.wrap(e.depth + 1, Expr::Member(Box::new(e.expr), name))?;
                }
                Some(Tok::LBracket) => {
                    self.pos += 1;
                    self.nesting += 1;
                    self.descend()?;
                    let key = self.or()?;
                    self.ascend();
                    self.expect(&Tok::RBracket, "`]`")?;
                    self.nesting -= 1;
                    let depth = e.depth.max(key.depth) + 1;
                    e = self.wrap(depth, Expr::Index(Box::new(e.expr), Box::new(key.expr)))?;
                }
                _ => return Ok(e),
            }
        }
    }

    fn primary(&mut self) -> Result<Node> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.error("unexpected end of hook"));
        };
        self.pos += 1;
        match tok {
            Tok::Num(n) => Ok(Node::leaf(Expr::Literal(JsonValue::Number(n)))),
            Tok::Str(s) => Ok(Node::leaf(Expr::Literal(JsonValue::String(s)))),
            Tok::LParen => {
                self.nesting += 1;
                self.descend()?;
                let e = self.or()?;
                self.ascend();
                self.expect(&Tok::RParen, "`)`")?;
                self.nesting -= 1;
                Ok(e)
            }
            Tok::Ident(name) => self.name(&name),
            _ => {
                self.pos -= 1;
                Err(self.error("expected an expression"))
            }
        }
    }

    fn name(&mut self, name: &str) -> Result<Node> {
        if self.peek() == Some(&Tok::LParen) {
            return self.call(name);
        }
        let expr = match name {
            "true" => Expr::Literal(JsonValue::Bool(true)),
            "false" => Expr::Literal(JsonValue::Bool(false)),
            "null" => Expr::Literal(JsonValue::Null),
            "globals" => Expr::Root(Root::Globals),
            "locals" => Expr::Root(Root::Locals),
            "request" if self.kind == HookKind::Pre => Expr::Root(Root::Request),
            "response" if self.kind == HookKind::Post => Expr::Root(Root::Response),
            "request" | "response" => {
                return Err(self.error(&format!(
                    "`{name}` is not available in {}{{}} hooks",
                    self.kind.as_str()
                )))
            }
            _ => {
                return Err(self.error(&format!(
                    "unknown name `{name}` (use globals.{name} or locals.{name})"
                )))
            }
        };
        Ok(Node::leaf(expr))
    }

    fn call(&mut self, name: &str) -> Result<Node> {
        let func = Builtin::lookup(name)
            .ok_or_else(|| self.error(&format!("unknown function `{name}`")))?;
        if !self.imports.contains(&func.module()) {
            return Err(self.error(&format!(
                "`{name}` requires `import{{{}}}`",
                func.module().name()
            )));
        }

        self.expect(&Tok::LParen, "`(`")?;
        self.nesting += 1;
        self.descend()?;
        let mut args = Vec::new();
        let mut depth = 0;
        if self.peek() != Some(&Tok::RParen) {
            loop {
                let arg = self.or()?;
                depth = depth.max(arg.depth);
                args.push(arg.expr);
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
        }
        self.ascend();
        self.expect(&Tok::RParen, "`)`")?;
        self.nesting -= 1;

        if args.len() != func.arity() {
            return Err(self.error(&format!(
                "`{name}` takes {} argument(s), got {}",
                func.arity(),
                args.len()
            )));
        }
        self.wrap(depth + 1, Expr::Call(func, args))
    }

    fn binary(&self, op: BinaryOp, lhs: Node, rhs: Node) -> Result<Node> {
        let depth = lhs.depth.max(rhs.depth) + 1;
        self.wrap(depth, Expr::Binary(op, Box::new(lhs.expr), Box::new(rhs.expr)))
    }

    fn wrap(&self, depth: usize, expr: Expr) -> Result<Node> {
        if depth > MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(Node { expr, depth })
    }

    /// Bounds parser recursion; operator chains are bounded separately by `wrap`.
    fn descend(&mut self) -> Result<()> {
        self.descent += 1;
        if self.descent > MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.descent -= 1;
    }

    fn peek(&mut self) -> Option<&Tok> {
        if self.nesting > 0 {
            while self.tokens.get(self.pos).is_some_and(|t| t.tok == Tok::Sep) {
                self.pos += 1;
            }
        }
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_ident(&mut self) -> Option<&str> {
        match self.peek() {
            Some(Tok::Ident(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Result<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.src.len(), |t| t.start)
    }

    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.end)
    }

    fn error(&self, msg: &str) -> HookError {
        HookError::Compile(format!("{}{{}} line {}: {msg}", self.kind.as_str(), self.line()))
    }
}

fn is_request_headers(e: &Expr) -> bool {
    matches!(e, Expr::Member(base, name) if name == "headers" && **base == Expr::Root(Root::Request))
}

fn comparison_op(tok: &Tok) -> Option<BinaryOp> {
    Some(match tok {
        Tok::Eq => BinaryOp::Eq,
        Tok::Ne => BinaryOp::Ne,
        Tok::Lt => BinaryOp::Lt,
        Tok::Le => BinaryOp::Le,
        Tok::Gt => BinaryOp::Gt,
        Tok::Ge => BinaryOp::Ge,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::script::builtins::resolve_imports;

    fn parse(src: &str, kind: HookKind) -> Result<Vec<Stmt>> {
        parse_program(src, kind, &resolve_imports(&[]).unwrap())
    }

    fn compile_error(src: &str, kind: HookKind) -> String {
        match parse(src, kind) {
            Err(HookError::Compile(m)) => m,
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn parses_assignment_targets() {
        let prog = parse(
            "globals[\"token\"] = \"abc\"\nlocals.n = 1; request.headers[\"X-Id\"] = \"7\"\nrequest.url = \"https://x.test/\"",
            HookKind::Pre,
        )
        .unwrap();
        assert_eq!(prog.len(), 4);
        assert!(matches!(
            &prog[0].kind,
            StmtKind::Assign { target: Target::Var { scope: Scope::Globals, .. }, .. }
        ));
        assert!(matches!(
            &prog[1].kind,
            StmtKind::Assign { target: Target::Var { scope: Scope::Locals, key: Expr::Literal(k) }, .. } if k == "n"
        ));
        assert!(matches!(&prog[2].kind, StmtKind::Assign { target: Target::RequestHeader(_), .. }));
        assert!(matches!(&prog[3].kind, StmtKind::Assign { target: Target::Request(RequestField::Url), .. }));
        assert_eq!(prog[3].line, 3);
    }

    #[test]
    fn precedence() {
        let prog = parse("locals.x = 1 + 2 == 3 && !false || null", HookKind::Pre).unwrap();
        let StmtKind::Assign { value, .. } = &prog[0].kind else { panic!() };
        let Expr::Binary(BinaryOp::Or, lhs, _) = value else { panic!("{value:?}") };
        let Expr::Binary(BinaryOp::And, cmp, not) = lhs.as_ref() else { panic!() };
        assert!(matches!(cmp.as_ref(), Expr::Binary(BinaryOp::Eq, _, _)));
        assert!(matches!(not.as_ref(), Expr::Unary(UnaryOp::Not, _)));
    }

    #[test]
    fn assert_keeps_source_text() {
        let prog = parse("assert response.status == 200", HookKind::Post).unwrap();
        let StmtKind::Assert { source, message, .. } = &prog[0].kind else { panic!() };
        assert_eq!(source, "response.status == 200");
        assert!(message.is_none());

        let prog = parse("assert len(response.body) > 0, \"empty body\"", HookKind::Post).unwrap();
        assert!(matches!(&prog[0].kind, StmtKind::Assert { message: Some(_), .. }));
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let prog = parse("locals.ok = contains(\n  \"abc\",\n  \"b\"\n)\nfail \"x\"", HookKind::Pre).unwrap();
        assert_eq!(prog.len(), 2);
    }

    #[test]
    fn roots_are_checked_per_hook() {
        assert!(compile_error("locals.s = response.status", HookKind::Pre).contains("`response` is not available"));
        assert!(compile_error("request.url = \"x\"", HookKind::Post).contains("`request` is not available"));
    }

    #[test]
    fn rejects_bad_targets_and_names() {
        assert!(compile_error("response.status = 1", HookKind::Post).contains("invalid assignment target"));
        assert!(compile_error("request.path = \"/\"", HookKind::Pre).contains("invalid assignment target"));
        assert!(compile_error("token = 1", HookKind::Pre).contains("unknown name `token`"));
        assert!(compile_error("len(\"a\")", HookKind::Pre).contains("expected `=`"));
        assert!(compile_error("locals.a = 1 < 2 < 3", HookKind::Pre).contains("chained"));
        assert!(compile_error("locals.a = 1 locals.b = 2", HookKind::Pre).contains("end of statement"));
    }

    #[test]
    fn checks_functions_against_imports() {
        assert!(compile_error("locals.a = nope(1)", HookKind::Pre).contains("unknown function"));
        assert!(compile_error("locals.a = len(1, 2)", HookKind::Pre).contains("takes 1 argument"));
        assert!(compile_error("locals.a = uuid()", HookKind::Pre).contains("import{uuid}"));

        let imports = resolve_imports(&["uuid".into()]).unwrap();
        assert!(parse_program("locals.a = uuid()", HookKind::Pre, &imports).is_ok());
    }

    #[test]
    fn unset_and_fail() {
        let prog = parse("unset globals.token\nunset request.headers.Authorization\nfail \"stop\"", HookKind::Pre).unwrap();
        assert!(matches!(&prog[0].kind, StmtKind::Unset(Target::Var { scope: Scope::Globals, .. })));
        assert!(matches!(&prog[1].kind, StmtKind::Unset(Target::RequestHeader(_))));
        assert!(matches!(&prog[2].kind, StmtKind::Fail(_)));
    }

    #[test]
    fn deep_nesting_is_a_compile_error() {
        let nots = format!("locals.x = {}true", "!".repeat(10_000));
        assert!(compile_error(&nots, HookKind::Pre).contains("nested too deeply"));

        let parens = format!("locals.x = {}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(compile_error(&parens, HookKind::Pre).contains("nested too deeply"));

        let sum = format!("locals.x = 1{}", " + 1".repeat(10_000));
        assert!(compile_error(&sum, HookKind::Pre).contains("nested too deeply"));

        let members = format!("locals.x = globals{}", ".a".repeat(10_000));
        assert!(compile_error(&members, HookKind::Pre).contains("nested too deeply"));
    }

    #[test]
    fn moderate_nesting_still_compiles() {
        let src = format!("locals.x = {}1{} + {}", "(".repeat(60), ")".repeat(60), "-".repeat(60) + "1");
        assert!(parse(&src, HookKind::Pre).is_ok());
    }

    #[test]
    fn empty_program() {
        assert!(parse("  \n # only a comment\n", HookKind::Post).unwrap().is_empty());
    }
}
