use std::io::Write;

use crate::Error;
use crate::ErrorKind;
use crate::Instr;
use crate::Program;
use crate::Result;

use super::CharSource;
use super::SourcePos;
use super::Symbol;
use super::SymbolManager;
use super::Token;
use super::TokenKind;
use super::Tokenizer;
use super::ValueType;

/// The compilation context: the token stream being read and the symbols
/// and code produced so far.
#[derive(Debug)]
pub struct Parser<S> {
    pub(super) tokens: Tokenizer<S>,
    pub(super) symbols: SymbolManager,
}

/// Attaches `pos` to an error coming from the symbol manager.
fn at<T>(result: Result<T>, pos: SourcePos) -> Result<T> {
    result.map_err(|e| e.or_at(pos))
}

fn unexpected(token: &Token) -> Error {
    let kind = ErrorKind::Syntax(format!("unexpected token {}", token));
    Error::new(kind, token.pos)
}

impl<S: CharSource> Parser<S> {
    pub fn new(source: S) -> Self {
        Parser {
            tokens: Tokenizer::new(source),
            symbols: SymbolManager::new(),
        }
    }

    pub fn symbols(&self) -> &SymbolManager {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolManager {
        &mut self.symbols
    }

    /// The main entry point for the parser. This parses the entire input and
    /// links the result.
    pub fn parse_program(mut self) -> Result<Program> {
        self.parse_items()?;
        self.symbols.finalize()
    }

    /// Like `parse_program`, but writes the binary image to `sink`. Nothing
    /// is written if compilation fails.
    pub fn parse_into(mut self, sink: &mut impl Write) -> Result<()> {
        self.parse_items()?;
        self.symbols.finalize_and_emit(sink)
    }

    fn parse_items(&mut self) -> Result<()> {
        while self.tokens.has_next()? {
            match self.tokens.peek_kind()? {
                TokenKind::Fn => self.parse_function()?,
                TokenKind::Let | TokenKind::Const => self.parse_declaration()?,
                _ => return Err(unexpected(&self.tokens.next()?)),
            }
        }
        Ok(())
    }

    fn expect_identifier(&mut self) -> Result<(String, SourcePos)> {
        let token = self.tokens.expect(&[TokenKind::Identifier])?;
        match token.ident() {
            Some(name) => Ok((name.to_string(), token.pos)),
            None => Err(unexpected(&token)),
        }
    }

    /// Parses a type name. Types are ordinary identifiers, not keywords.
    fn parse_type(&mut self) -> Result<ValueType> {
        let (name, pos) = self.expect_identifier()?;
        match name.as_str() {
            "int" => Ok(ValueType::Int),
            "double" => Ok(ValueType::Float),
            "void" => Ok(ValueType::Void),
            _ => {
                let kind = ErrorKind::Syntax(format!("unknown type `{}`", name));
                Err(Error::new(kind, pos))
            }
        }
    }

    /// Parses `fn name(params) -> type { ... }`.
    fn parse_function(&mut self) -> Result<()> {
        self.tokens.next()?; // `fn` keyword
        let (name, pos) = self.expect_identifier()?;
        at(self.symbols.declare_function(&name), pos)?;

        self.tokens.expect(&[TokenKind::LParen])?;
        if self.tokens.try_pop(TokenKind::RParen)?.is_none() {
            loop {
                self.parse_param()?;
                let token = self.tokens.expect(&[TokenKind::Comma, TokenKind::RParen])?;
                if token.kind == TokenKind::RParen {
                    break;
                }
            }
        }
        self.tokens.expect(&[TokenKind::Arrow])?;
        let return_type = self.parse_type()?;
        self.symbols.set_return_type(return_type);

        // The body's top-level locals share the parameters' scope.
        self.tokens.expect(&[TokenKind::LBrace])?;
        let close = self.parse_statements()?;
        at(self.symbols.finish_function(), close.pos)
    }

    fn parse_param(&mut self) -> Result<()> {
        let is_const = self.tokens.try_pop(TokenKind::Const)?.is_some();
        let (name, pos) = self.expect_identifier()?;
        self.tokens.expect(&[TokenKind::Colon])?;
        let value_type = self.parse_type()?;
        if value_type == ValueType::Void {
            let kind = ErrorKind::Type(format!("parameter `{}` cannot be void", name));
            return Err(Error::new(kind, pos));
        }
        at(self.symbols.declare_param(&name, value_type, is_const), pos)?;
        Ok(())
    }

    /// Parses `let` and `const` declarations, with an optional initializer.
    fn parse_declaration(&mut self) -> Result<()> {
        let keyword = self.tokens.next()?;
        let is_const = keyword.kind == TokenKind::Const;
        let (name, pos) = self.expect_identifier()?;
        self.tokens.expect(&[TokenKind::Colon])?;
        let value_type = self.parse_type()?;
        if value_type == ValueType::Void {
            let kind = ErrorKind::Type(format!("variable `{}` cannot be void", name));
            return Err(Error::new(kind, pos));
        }
        let var = at(self.symbols.declare_variable(&name, value_type, is_const), pos)?;

        if let Some(assign) = self.tokens.try_pop(TokenKind::Assign)? {
            let start = self.symbols.next_instruction();
            at(self.symbols.emit_address_load(&Symbol::Variable(var)), pos)?;
            let value = self.analyse_expression()?;
            if value.value_type != value_type {
                let msg = format!(
                    "cannot initialize {} `{}` with {}",
                    value_type, name, value.value_type
                );
                return Err(Error::new(ErrorKind::Type(msg), assign.pos));
            }
            if !self.symbols.fold_constant(&var, start) {
                self.symbols.emit(Instr::Store64);
            }
        } else if is_const {
            let kind = ErrorKind::Syntax(format!("constant `{}` needs an initializer", name));
            return Err(Error::new(kind, pos));
        }
        self.tokens.expect(&[TokenKind::Semicolon])?;
        Ok(())
    }

    /// Parses statements up to and including the closing `}`, which is returned.
    fn parse_statements(&mut self) -> Result<Token> {
        loop {
            if let Some(close) = self.tokens.try_pop(TokenKind::RBrace)? {
                return Ok(close);
            }
            self.parse_statement()?;
        }
    }

    fn parse_statement(&mut self) -> Result<()> {
        match self.tokens.peek_kind()? {
            TokenKind::Let | TokenKind::Const => self.parse_declaration(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            TokenKind::LBrace => self.parse_block(),
            TokenKind::Break => {
                let keyword = self.tokens.next()?;
                at(self.symbols.mark_break(), keyword.pos)?;
                self.tokens.expect(&[TokenKind::Semicolon])?;
                Ok(())
            }
            TokenKind::Continue => {
                let keyword = self.tokens.next()?;
                at(self.symbols.mark_continue(), keyword.pos)?;
                self.tokens.expect(&[TokenKind::Semicolon])?;
                Ok(())
            }
            TokenKind::Semicolon => {
                self.tokens.next()?;
                Ok(())
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// Parses a `{ ... }` block in a new scope.
    fn parse_block(&mut self) -> Result<()> {
        self.tokens.expect(&[TokenKind::LBrace])?;
        self.symbols.enter_scope();
        let close = self.parse_statements()?;
        at(self.symbols.leave_scope(), close.pos)
    }

    /// An expression evaluated for its side effects. Any value it leaves is
    /// discarded.
    fn parse_expression_statement(&mut self) -> Result<()> {
        let value = self.analyse_expression()?;
        if value.value_type != ValueType::Void {
            self.symbols.emit(Instr::Pop);
        }
        self.tokens.expect(&[TokenKind::Semicolon])?;
        Ok(())
    }

    /// Parses the condition of an `if` or `while`, which must be an int.
    fn parse_condition(&mut self) -> Result<()> {
        let pos = self.tokens.peek()?.pos;
        let value = self.analyse_expression()?;
        if value.value_type != ValueType::Int {
            let msg = format!("condition must be int, found {}", value.value_type);
            return Err(Error::new(ErrorKind::Type(msg), pos));
        }
        Ok(())
    }

    /// Parses an if statement, including any attached `else` or `else if`.
    fn parse_if(&mut self) -> Result<()> {
        let keyword = self.tokens.next()?; // `if` keyword
        self.parse_condition()?;
        let skip_then = self.symbols.emit(Instr::BrFalse(0));
        self.parse_block()?;

        if self.tokens.try_pop(TokenKind::Else)?.is_some() {
            let skip_else = self.symbols.emit(Instr::Br(0));
            let else_start = self.symbols.next_instruction();
            at(self.symbols.patch_branch(skip_then, else_start), keyword.pos)?;
            if self.tokens.check_kind(TokenKind::If)? {
                self.parse_if()?;
            } else {
                self.parse_block()?;
            }
            let end = self.symbols.next_instruction();
            at(self.symbols.patch_branch(skip_else, end), keyword.pos)
        } else {
            let end = self.symbols.next_instruction();
            at(self.symbols.patch_branch(skip_then, end), keyword.pos)
        }
    }

    /// Parses a `while` loop. `continue` re-evaluates the condition.
    fn parse_while(&mut self) -> Result<()> {
        let keyword = self.tokens.next()?; // `while` keyword
        let condition_start = self.symbols.next_instruction();
        self.parse_condition()?;
        let exit = self.symbols.emit(Instr::BrFalse(0));

        self.symbols.enter_loop(condition_start);
        self.parse_block()?;
        let back = self.symbols.emit(Instr::Br(0));
        at(self.symbols.patch_branch(back, condition_start), keyword.pos)?;

        let end = self.symbols.next_instruction();
        at(self.symbols.patch_branch(exit, end), keyword.pos)?;
        at(self.symbols.leave_loop(), keyword.pos)
    }

    /// Parses `return expr?;`. The value is stored in argument slot 0.
    fn parse_return(&mut self) -> Result<()> {
        let keyword = self.tokens.next()?; // `return` keyword
        let return_type = self.symbols.current_function().return_type();

        if return_type == ValueType::Void {
            if self.tokens.try_pop(TokenKind::Semicolon)?.is_none() {
                let msg = "void function cannot return a value".to_string();
                return Err(Error::new(ErrorKind::Type(msg), keyword.pos));
            }
            self.symbols.emit(Instr::Ret);
            return Ok(());
        }

        if self.tokens.check_kind(TokenKind::Semicolon)? {
            let msg = format!("missing return value of type {}", return_type);
            return Err(Error::new(ErrorKind::Type(msg), keyword.pos));
        }
        self.symbols.emit(Instr::Arga(0));
        let value = self.analyse_expression()?;
        if value.value_type != return_type {
            let msg = format!("expected to return {}, found {}", return_type, value.value_type);
            return Err(Error::new(ErrorKind::Type(msg), keyword.pos));
        }
        self.symbols.emit(Instr::Store64);
        self.symbols.emit(Instr::Ret);
        self.tokens.expect(&[TokenKind::Semicolon])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Parser;
    use crate::compiler::CharStream;
    use crate::ErrorKind;
    use crate::Instr::{self, *};
    use crate::{GlobalDef, GlobalValue, Program};

    fn compile(input: &str) -> crate::Result<Program> {
        Parser::new(CharStream::new(input)).parse_program()
    }

    /// Checks the body of the first user function.
    fn check_it(input: &str, code: Vec<Instr>) {
        let program = compile(input).unwrap();
        assert_eq!(program.functions[1].body, code);
    }

    fn check_err(input: &str) -> ErrorKind {
        let err = compile(input).unwrap_err();
        assert!(err.pos.is_some(), "{} has no position", err);
        err.kind
    }

    #[test]
    fn test01() {
        let text = "fn main() -> void { let x: int = 1; x = x + 2; }";
        let code = vec![
            Loca(0),
            Push(1),
            Store64,
            Loca(0),
            Loca(0),
            Load64,
            Push(2),
            AddI,
            Store64,
            Ret,
        ];
        check_it(text, code);
    }

    #[test]
    fn test02() {
        let text = "fn main() -> void { if 1 < 2 { putln(); } else { putint(3); } }";
        let code = vec![
            Push(1),
            Push(2),
            CmpI,
            SetLt,
            BrFalse(3),
            StackAlloc(0),
            CallName(7),
            Br(3),
            StackAlloc(0),
            Push(3),
            CallName(3),
            Ret,
        ];
        check_it(text, code);
    }

    #[test]
    fn test03() {
        let text = "
            fn main() -> void {
                let i: int = 0;
                while i < 10 {
                    i = i + 1;
                    if i == 5 { continue; }
                    if i == 8 { break; }
                }
            }";
        let code = vec![
            Loca(0),
            Push(0),
            Store64,
            // condition
            Loca(0),
            Load64,
            Push(10),
            CmpI,
            SetLt,
            BrFalse(21),
            // i = i + 1
            Loca(0),
            Loca(0),
            Load64,
            Push(1),
            AddI,
            Store64,
            // continue
            Loca(0),
            Load64,
            Push(5),
            CmpI,
            Not,
            BrFalse(1),
            Br(-19),
            // break
            Loca(0),
            Load64,
            Push(8),
            CmpI,
            Not,
            BrFalse(1),
            Br(1),
            Br(-27),
            Ret,
        ];
        check_it(text, code);
    }

    #[test]
    fn test04() {
        let text = "
            fn add(a: int, b: int) -> int { return a + b; }
            fn main() -> void { putint(add(1, 2)); }";
        let program = compile(text).unwrap();
        assert_eq!(program.functions.len(), 3);
        assert_eq!(
            program.functions[0].body,
            vec![StackAlloc(0), CallName(10)]
        );

        let add = &program.functions[1];
        assert_eq!((add.name, add.ret_slots, add.param_slots, add.loc_slots), (9, 1, 2, 0));
        assert_eq!(
            add.body,
            vec![Arga(0), Arga(1), Load64, Arga(2), Load64, AddI, Store64, Ret]
        );
        assert_eq!(
            program.functions[2].body,
            vec![
                StackAlloc(0),
                StackAlloc(1),
                Push(1),
                Push(2),
                CallName(9),
                CallName(3),
                Ret
            ]
        );
    }

    #[test]
    fn test05() {
        let text = "
            let g: int = 3;
            const pi: double = 3.5;
            fn main() -> int { return g; }";
        let program = compile(text).unwrap();
        assert_eq!(
            program.globals[9..],
            [
                GlobalDef {
                    is_const: false,
                    value: GlobalValue::Slot
                },
                GlobalDef {
                    is_const: true,
                    value: GlobalValue::Float(3.5)
                },
                GlobalDef {
                    is_const: true,
                    value: GlobalValue::Str("main".into())
                },
            ]
        );
        assert_eq!(
            program.functions[0].body,
            vec![Globa(9), Push(3), Store64, StackAlloc(1), CallName(11)]
        );
        assert_eq!(
            program.functions[1].body,
            vec![Arga(0), Globa(9), Load64, Store64, Ret]
        );
    }

    #[test]
    fn test_constant_folding() {
        let text = "
            const a: int = -4;
            const b: int = 2 + 3;
            const c: int = a;
            fn main() -> void {
                const d: int = 7;
            }";
        let program = compile(text).unwrap();
        let values: Vec<_> = program.globals[9..12].iter().map(|g| &g.value).collect();
        assert_eq!(values, [&GlobalValue::Int(-4), &GlobalValue::Slot, &GlobalValue::Slot]);
        assert_eq!(
            program.functions[0].body,
            vec![
                Globa(10),
                Push(2),
                Push(3),
                AddI,
                Store64,
                Globa(11),
                Globa(9),
                Load64,
                Store64,
                StackAlloc(0),
                CallName(12),
            ]
        );
        assert_eq!(program.functions[1].body, vec![Loca(0), Push(7), Store64, Ret]);
    }

    #[test]
    fn test06() {
        // Each block gets its own slot; the outer `x` is untouched.
        let text = "
            fn main() -> void {
                let x: int = 1;
                { let x: double = 2.0; x = 0.5; }
                x = 3;
            }";
        let code = vec![
            Loca(0),
            Push(1),
            Store64,
            Loca(1),
            Push(2.0f64.to_bits()),
            Store64,
            Loca(1),
            Push(0.5f64.to_bits()),
            Store64,
            Loca(0),
            Push(3),
            Store64,
            Ret,
        ];
        check_it(text, code);
    }

    #[test]
    fn test07() {
        // A non-void expression statement discards its value.
        let text = "fn main() -> void { getint(); ; 1 + 2; }";
        let code = vec![
            StackAlloc(1),
            CallName(0),
            Pop,
            Push(1),
            Push(2),
            AddI,
            Pop,
            Ret,
        ];
        check_it(text, code);
    }

    #[test]
    fn test08() {
        let text = "
            fn main() -> void {
                if 0 { putint(1); } else if 1 { putint(2); } else { putint(3); }
            }";
        let code = vec![
            Push(0),
            BrFalse(4),
            StackAlloc(0),
            Push(1),
            CallName(3),
            Br(9),
            Push(1),
            BrFalse(4),
            StackAlloc(0),
            Push(2),
            CallName(3),
            Br(3),
            StackAlloc(0),
            Push(3),
            CallName(3),
            Ret,
        ];
        check_it(text, code);
    }

    #[test]
    fn test09() {
        // The false branch lands after the early return, so another `ret` is needed.
        let text = "fn main() -> void { if 1 { return; } }";
        check_it(text, vec![Push(1), BrFalse(1), Ret, Ret]);
        let text = "fn main() -> int { return 4; }";
        check_it(text, vec![Arga(0), Push(4), Store64, Ret]);
    }

    #[test]
    fn test_duplicates() {
        let err = check_err("fn main() -> void { let x: int = 1; let x: int = 2; }");
        assert_eq!(err, ErrorKind::DuplicateDefinition("x".into()));
        let err = check_err("fn f(a: int, a: int) -> void {} fn main() -> void {}");
        assert_eq!(err, ErrorKind::DuplicateDefinition("a".into()));
        let err = check_err("fn main() -> void {} fn main() -> void {}");
        assert_eq!(err, ErrorKind::DuplicateDefinition("main".into()));
    }

    #[test]
    fn test_type_errors() {
        let cases = [
            "fn main() -> void { return 1; }",
            "fn f() -> int { return; } fn main() -> void {}",
            "fn f() -> int { return 1.0; } fn main() -> void {}",
            "let v: void;",
            "fn main() -> void { if 1.0 { } }",
            "fn main() -> void { while \"s\" { } }",
            "fn main() -> void { const k: int = 1; k = 2; }",
            "fn f(const p: int) -> void { p = 2; } fn main() -> void {}",
            "let x: double = 1;",
        ];
        for case in cases {
            assert!(matches!(check_err(case), ErrorKind::Type(_)), "{}", case);
        }
    }

    #[test]
    fn test_syntax_errors() {
        let cases = [
            "const c: int;",
            "let x: float;",
            "1 + 2;",
            "fn main() -> void { 1 @ 2; }",
            "fn main() -> void { fn g() -> void {} }",
            "fn main() -> void { let x: int = 1 }",
            "fn main() -> void {",
        ];
        for case in cases {
            assert!(matches!(check_err(case), ErrorKind::Syntax(_)), "{}", case);
        }
    }

    #[test]
    fn test_loop_control_outside_loop() {
        let err = check_err("fn main() -> void { break; }");
        assert!(matches!(err, ErrorKind::Structural(_)));
        let err = check_err("fn main() -> void { if 1 { continue; } }");
        assert!(matches!(err, ErrorKind::Structural(_)));
    }

    #[test]
    fn test_undefined() {
        let err = check_err("fn main() -> void { y = 1; }");
        assert_eq!(err, ErrorKind::UndefinedSymbol("y".into()));
        let err = check_err("fn main() -> void { { let t: int = 1; } t = 2; }");
        assert_eq!(err, ErrorKind::UndefinedSymbol("t".into()));
    }

    #[test]
    fn test_missing_main() {
        let err = compile("fn helper() -> void {}").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::FatalLink(_)));
        assert_eq!(err.pos, None);

        let err = compile("fn main(argc: int) -> void {}").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::FatalLink(_)));

        let mut sink = Vec::new();
        let parser = Parser::new(CharStream::new("let x: int = 1;"));
        assert!(parser.parse_into(&mut sink).is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_parse_into() {
        let source = "fn main() -> void {}";
        let mut sink = Vec::new();
        Parser::new(CharStream::new(source))
            .parse_into(&mut sink)
            .unwrap();
        assert_eq!(sink, compile(source).unwrap().to_bytes());
    }
}
