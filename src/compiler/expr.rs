//! Expression analysis by precedence climbing. Instructions are emitted as
//! soon as each operand is recognized.

use crate::Error;
use crate::ErrorKind;
use crate::Instr;
use crate::Result;

use super::combine::combine;
use super::CharSource;
use super::ExpValue;
use super::Parser;
use super::Symbol;
use super::Token;
use super::TokenKind;
use super::TokenValue;
use super::ValueType;

impl<S: CharSource> Parser<S> {
    /// Parses one complete expression.
    pub fn analyse_expression(&mut self) -> Result<ExpValue> {
        let left = self.parse_primary()?;
        self.parse_binary(left, 1)
    }

    /// Folds every following operator with priority at least `min_priority`
    /// into `left`.
    fn parse_binary(&mut self, mut left: ExpValue, min_priority: u8) -> Result<ExpValue> {
        loop {
            let priority = match self.tokens.peek_kind()?.priority() {
                Some(p) if p >= min_priority => p,
                _ => return Ok(left),
            };
            let op = self.tokens.next()?;
            let mut right = self.parse_primary()?;

            // Operators that bind tighter than `op` belong to its right operand.
            loop {
                let next = self.tokens.peek_kind()?;
                match next.priority() {
                    Some(p) if p > priority => right = self.parse_binary(right, priority + 1)?,
                    Some(p) if p == priority && next.is_right_assoc() => {
                        right = self.parse_binary(right, priority)?
                    }
                    _ => break,
                }
            }

            left = combine(&mut self.symbols, left, &op, right)?;
        }
    }

    fn parse_primary(&mut self) -> Result<ExpValue> {
        let token = self.tokens.next()?;
        match token.kind {
            TokenKind::Minus => self.parse_negation(&token),
            TokenKind::LParen => {
                let inner = self.analyse_expression()?;
                self.tokens.expect(&[TokenKind::RParen])?;
                Ok(inner)
            }
            TokenKind::Identifier => {
                if self.tokens.check_kind(TokenKind::LParen)? {
                    self.parse_call(&token)
                } else {
                    self.parse_name(&token)
                }
            }
            kind if kind.is_literal() => self.parse_literal(token),
            _ => {
                let msg = format!("expected an expression, found {}", token);
                Err(Error::new(ErrorKind::Syntax(msg), token.pos))
            }
        }
    }

    fn parse_negation(&mut self, minus: &Token) -> Result<ExpValue> {
        let operand = self.parse_primary()?;
        if operand.is_place {
            let msg = "negated operand cannot be assigned to".to_string();
            return Err(Error::new(ErrorKind::Syntax(msg), minus.pos));
        }
        let instr = match operand.value_type {
            ValueType::Int => Instr::NegI,
            ValueType::Float => Instr::NegF,
            other => {
                let msg = format!("cannot negate {}", other);
                return Err(Error::new(ErrorKind::Type(msg), minus.pos));
            }
        };
        self.symbols.emit(instr);
        Ok(operand)
    }

    /// A variable reference. It stays an address when it is about to be
    /// assigned to, and is loaded otherwise.
    fn parse_name(&mut self, token: &Token) -> Result<ExpValue> {
        let name = expect_ident(token)?;
        let symbol = self
            .symbols
            .find_symbol(name)
            .ok_or_else(|| Error::new(ErrorKind::UndefinedSymbol(name.to_string()), token.pos))?;
        let (value_type, is_const) = match symbol {
            Symbol::Variable(var) => (var.value_type, var.is_const),
            Symbol::Param(param) => (param.value_type, param.is_const),
            Symbol::Function(_) => {
                let msg = format!("function {} used as a value", token);
                return Err(Error::new(ErrorKind::Type(msg), token.pos));
            }
        };
        self.symbols
            .emit_address_load(&symbol)
            .map_err(|e| e.or_at(token.pos))?;

        if self.tokens.check_kind(TokenKind::Assign)? {
            if is_const {
                let msg = format!("cannot assign to constant {}", token);
                return Err(Error::new(ErrorKind::Type(msg), token.pos));
            }
            Ok(ExpValue::place(value_type))
        } else {
            self.symbols.emit(Instr::Load64);
            Ok(ExpValue::new(value_type))
        }
    }

    /// `ident ( args )`. The return slot is reserved before the arguments are
    /// pushed.
    fn parse_call(&mut self, callee: &Token) -> Result<ExpValue> {
        let name = expect_ident(callee)?;
        let id = match self.symbols.find_symbol(name) {
            Some(Symbol::Function(id)) => id,
            Some(_) => {
                let msg = format!("{} is not a function", callee);
                return Err(Error::new(ErrorKind::Type(msg), callee.pos));
            }
            None => {
                let kind = ErrorKind::UndefinedSymbol(name.to_string());
                return Err(Error::new(kind, callee.pos));
            }
        };
        let function = self.symbols.function(id);
        let params = function.params().to_vec();
        let return_type = function.return_type();
        let name_slot = function.name_slot();

        self.symbols.emit(Instr::StackAlloc(return_type.slots()));
        self.tokens.expect(&[TokenKind::LParen])?;
        let mut args = Vec::new();
        if self.tokens.try_pop(TokenKind::RParen)?.is_none() {
            loop {
                args.push(self.analyse_expression()?.value_type);
                let token = self.tokens.expect(&[TokenKind::Comma, TokenKind::RParen])?;
                if token.kind == TokenKind::RParen {
                    break;
                }
            }
        }
        if args != params {
            let expected: Vec<String> = params.iter().map(ValueType::to_string).collect();
            let found: Vec<String> = args.iter().map(ValueType::to_string).collect();
            let msg = format!(
                "{} expects ({}), found ({})",
                callee,
                expected.join(", "),
                found.join(", ")
            );
            return Err(Error::new(ErrorKind::Type(msg), callee.pos));
        }

        self.symbols.emit(Instr::CallName(name_slot));
        Ok(ExpValue::new(return_type))
    }

    fn parse_literal(&mut self, token: Token) -> Result<ExpValue> {
        let (instr, value_type) = match token.value {
            Some(TokenValue::Int(n)) => (Instr::Push(n), ValueType::Int),
            Some(TokenValue::Float(x)) => (Instr::Push(x.to_bits()), ValueType::Float),
            Some(TokenValue::Str(ref s)) => {
                let index = self.symbols.add_string_constant(s);
                (Instr::Push(u64::from(index)), ValueType::String)
            }
            _ => {
                let msg = format!("literal token {:?} has no value", token.kind);
                return Err(Error::new(ErrorKind::Internal(msg), token.pos));
            }
        };
        self.symbols.emit(instr);
        Ok(ExpValue::new(value_type))
    }
}

fn expect_ident(token: &Token) -> Result<&str> {
    token.ident().ok_or_else(|| {
        let msg = format!("identifier token {} has no name", token);
        Error::new(ErrorKind::Internal(msg), token.pos)
    })
}
