use crate::compiler::syntax::CompileError;
use crate::construct::token::{Syn, Token, Tokens};
use crate::construct::tree::{Op, OperatorTree, Separator};

/// Splits a token stream into nested blocks and builds the operator tree,
/// resolving precedence and grouping in the same pass. Atoms are integers,
/// names, parenthesized blocks, and the two keyword forms; everything in
/// between is either an explicit operator or an implicit `call` born of two
/// atoms sitting next to each other.
pub struct Grouper {
    tokens: Tokens,
    index: usize,
}

/// `call` binds tightest and is left-associative; every explicit operator
/// binds looser and is right-associative. Binding powers are spread out so
/// a left-assoc operator's right power is one higher than its left (ties
/// favor reducing what's already on the left), and a right-assoc
/// operator's left power is one higher than its right (ties favor shifting
/// onto the right).
fn binding_power(op: Op) -> (u8, u8) {
    match op {
        Op::Call => (10, 11),
        _ => (6, 5),
    }
}

impl Grouper {
    pub fn new(tokens: Tokens) -> Grouper {
        Grouper { tokens, index: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.index].clone();
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
        tok
    }

    fn expect_name(&mut self, context: &str) -> Result<String, CompileError> {
        match self.advance() {
            Token::Name(n) => Ok(n),
            other => Err(CompileError::group(format!(
                "expected a name {}, found {}",
                context, other
            ))),
        }
    }

    fn expect_syntax(&mut self, syn: Syn, context: &str) -> Result<(), CompileError> {
        match self.advance() {
            Token::Syntax(s) if s == syn => Ok(()),
            other => Err(CompileError::group(format!(
                "expected `{}` {}, found {}",
                syn, context, other
            ))),
        }
    }

    fn at_block_end(&self, is_root: bool) -> bool {
        if is_root {
            matches!(self.peek(), Token::Eof)
        } else {
            matches!(self.peek(), Token::Syntax(Syn::RParen))
        }
    }

    fn check_and_set_sep(
        sep: &mut Option<Separator>,
        found: Separator,
    ) -> Result<(), CompileError> {
        match sep {
            Some(s) if *s != found => Err(CompileError::group(format!(
                "mixed separators in one block: started with {:?}, found {:?}",
                s, found
            ))),
            _ => {
                *sep = Some(found);
                Ok(())
            }
        }
    }

    /// A `;`-or-`,`-separated run of expressions terminated by end-of-input
    /// (the root) or `)` (a parenthesized group). The root's separator is
    /// pre-seeded to `;`, so any `,` it contains is a mixed-separator error
    /// rather than silently becoming a tuple.
    fn block(&mut self, is_root: bool) -> Result<OperatorTree, CompileError> {
        let mut exprs = Vec::new();
        let mut sep = if is_root {
            Some(Separator::Semi)
        } else {
            None
        };

        loop {
            if !is_root && matches!(self.peek(), Token::Eof) {
                return Err(CompileError::group("unclosed `(`"));
            }
            if self.at_block_end(is_root) {
                break;
            }

            exprs.push(self.expr(0)?);

            match self.peek().clone() {
                Token::Syntax(Syn::Semi) => {
                    Self::check_and_set_sep(&mut sep, Separator::Semi)?;
                    self.advance();
                }
                Token::Syntax(Syn::Comma) => {
                    Self::check_and_set_sep(&mut sep, Separator::Comma)?;
                    self.advance();
                }
                _ if self.at_block_end(is_root) => break,
                other => {
                    return Err(CompileError::group(format!(
                        "expected a separator or end of block, found {}",
                        other
                    )))
                }
            }
        }

        Ok(OperatorTree::Block(sep, exprs))
    }

    fn atom(&mut self) -> Result<OperatorTree, CompileError> {
        match self.advance() {
            Token::Integer(text) => {
                let value = text
                    .parse::<i64>()
                    .map_err(|_| CompileError::internal("lexer produced a malformed integer"))?;
                Ok(OperatorTree::Integer(value))
            }
            Token::Name(name) => Ok(OperatorTree::Name(name)),
            Token::Syntax(Syn::LParen) => {
                let inner = self.block(false)?;
                self.expect_syntax(Syn::RParen, "to close `(`")?;
                Ok(inner)
            }
            Token::Syntax(Syn::Instruction) => {
                let opcode = self.expect_name("after `instruction`")?;
                self.expect_syntax(Syn::LParen, "to open the instruction's argument tuple")?;
                let args = self.tuple_args()?;
                self.expect_syntax(Syn::RParen, "to close the instruction's argument tuple")?;
                Ok(OperatorTree::Instruction(opcode, args))
            }
            Token::Syntax(Syn::External) => {
                let name = self.expect_name("after `external`")?;
                Ok(OperatorTree::External(name))
            }
            other => Err(CompileError::group(format!(
                "expected an expression, found {}",
                other
            ))),
        }
    }

    /// Parses the contents of an `instruction`'s argument list, which must
    /// read as a tuple (comma-separated, or a single/empty group).
    fn tuple_args(&mut self) -> Result<Vec<OperatorTree>, CompileError> {
        match self.block(false)? {
            OperatorTree::Block(Some(Separator::Semi), _) => Err(CompileError::group(
                "instruction arguments must be a tuple, found a `;`-block",
            )),
            OperatorTree::Block(_, exprs) => Ok(exprs),
            other => Err(CompileError::internal(format!(
                "block() returned a non-Block node: {:?}",
                other
            ))),
        }
    }

    fn peek_op(&self) -> Option<Op> {
        match self.peek() {
            Token::Syntax(Syn::FatArrow) => Some(Op::FatArrow),
            Token::Syntax(Syn::Arrow) => Some(Op::Arrow),
            Token::Syntax(Syn::Colon) => Some(Op::Colon),
            Token::Syntax(Syn::Equal) => Some(Op::Equal),
            Token::Syntax(Syn::Semi)
            | Token::Syntax(Syn::Comma)
            | Token::Syntax(Syn::RParen)
            | Token::Eof => None,
            _ => Some(Op::Call),
        }
    }

    fn expr(&mut self, min_bp: u8) -> Result<OperatorTree, CompileError> {
        let mut lhs = self.atom()?;

        loop {
            let op = match self.peek_op() {
                Some(op) => op,
                None => break,
            };
            let (l_bp, r_bp) = binding_power(op);
            if l_bp < min_bp {
                break;
            }
            if op != Op::Call {
                self.advance();
            }
            let rhs = self.expr(r_bp)?;
            lhs = OperatorTree::operator(op, lhs, rhs);
        }

        Ok(lhs)
    }

    pub fn group(tokens: Tokens) -> Result<OperatorTree, CompileError> {
        let mut grouper = Grouper::new(tokens);
        let root = grouper.block(true)?;
        if !matches!(grouper.peek(), Token::Eof) {
            return Err(CompileError::group(format!(
                "expected end of input, found {}",
                grouper.peek()
            )));
        }
        Ok(root)
    }
}

pub fn group(tokens: Tokens) -> Result<OperatorTree, CompileError> {
    Grouper::group(tokens)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::lex::Lexer;
    use proptest::prelude::*;

    fn group_str(s: &str) -> Result<OperatorTree, CompileError> {
        let tokens = Lexer::new(s).lex().unwrap();
        group(tokens)
    }

    #[test]
    fn root_is_always_a_semi_block() {
        let tree = group_str("x = 3; x").unwrap();
        match tree {
            OperatorTree::Block(Some(Separator::Semi), exprs) => assert_eq!(exprs.len(), 2),
            other => panic!("expected a `;`-block, got {:?}", other),
        }
    }

    #[test]
    fn empty_parens_are_a_null_separator_block() {
        let tree = group_str("()").unwrap();
        match tree {
            OperatorTree::Block(Some(Separator::Semi), exprs) => {
                assert_eq!(exprs.len(), 1);
                assert_eq!(exprs[0], OperatorTree::Block(None, vec![]));
            }
            other => panic!("unexpected root shape {:?}", other),
        }
    }

    #[test]
    fn call_binds_tighter_and_left_associates() {
        // `f x y` should group as `(f x) y`.
        let tree = group_str("f x y").unwrap();
        let inner = match tree {
            OperatorTree::Block(_, mut exprs) => exprs.remove(0),
            _ => panic!(),
        };
        match inner {
            OperatorTree::Operator(Op::Call, lhs, rhs) => {
                assert_eq!(*rhs, OperatorTree::Name("y".to_string()));
                match *lhs {
                    OperatorTree::Operator(Op::Call, ref l2, ref r2) => {
                        assert_eq!(**l2, OperatorTree::Name("f".to_string()));
                        assert_eq!(**r2, OperatorTree::Name("x".to_string()));
                    }
                    other => panic!("unexpected lhs shape {:?}", other),
                }
            }
            other => panic!("expected a call chain, got {:?}", other),
        }
    }

    #[test]
    fn explicit_operators_right_associate() {
        // `a = b = c` should group as `a = (b = c)`.
        let tree = group_str("a = b = c").unwrap();
        let inner = match tree {
            OperatorTree::Block(_, mut exprs) => exprs.remove(0),
            _ => panic!(),
        };
        match inner {
            OperatorTree::Operator(Op::Equal, _, rhs) => {
                assert!(matches!(*rhs, OperatorTree::Operator(Op::Equal, ..)));
            }
            other => panic!("expected `=` at the top, got {:?}", other),
        }
    }

    #[test]
    fn mixed_separators_are_fatal() {
        assert!(group_str("1; 2, 3").is_err());
    }

    #[test]
    fn comma_at_root_is_fatal() {
        assert!(group_str("1, 2").is_err());
    }

    #[test]
    fn unclosed_paren_is_fatal() {
        assert!(group_str("(1, 2").is_err());
    }

    #[test]
    fn instruction_form() {
        let tree = group_str("instruction add (x, y)").unwrap();
        let inner = match tree {
            OperatorTree::Block(_, mut exprs) => exprs.remove(0),
            _ => panic!(),
        };
        assert_eq!(
            inner,
            OperatorTree::Instruction(
                "add".to_string(),
                vec![
                    OperatorTree::Name("x".to_string()),
                    OperatorTree::Name("y".to_string())
                ]
            )
        );
    }

    #[test]
    fn external_form() {
        let tree = group_str("external puts").unwrap();
        let inner = match tree {
            OperatorTree::Block(_, mut exprs) => exprs.remove(0),
            _ => panic!(),
        };
        assert_eq!(inner, OperatorTree::External("puts".to_string()));
    }

    proptest! {
        #[test]
        fn doesnt_crash(s in "\\PC{0,40}") {
            let _ = group_str(&s);
        }
    }
}
