use crate::Error;
use crate::ErrorKind;
use crate::Instr;
use crate::Result;

use super::ExpValue;
use super::SymbolManager;
use super::Token;
use super::TokenKind;
use super::ValueType;

/// Emits the instructions applying `op` to the two operands already on the
/// stack, and returns the type of the result.
pub(super) fn combine(
    symbols: &mut SymbolManager,
    left: ExpValue,
    op: &Token,
    right: ExpValue,
) -> Result<ExpValue> {
    let error = |kind| Err(Error::new(kind, op.pos));
    if left.value_type != right.value_type {
        let msg = format!(
            "mismatched operands of {}: {} and {}",
            op, left.value_type, right.value_type
        );
        return error(ErrorKind::Type(msg));
    }

    if op.kind == TokenKind::Assign {
        if !left.is_place {
            let msg = "left side of `=` cannot be assigned to".to_string();
            return error(ErrorKind::Syntax(msg));
        }
        symbols.emit(Instr::Store64);
        return Ok(ValueType::Void.into());
    }

    if left.is_place || right.is_place {
        return error(ErrorKind::Syntax(format!("unexpected `=` after {}", op)));
    }

    let is_float = match left.value_type {
        ValueType::Int => false,
        ValueType::Float => true,
        other => {
            let msg = format!("{} cannot be applied to {}", op, other);
            return error(ErrorKind::Type(msg));
        }
    };
    let cmp = if is_float { Instr::CmpF } else { Instr::CmpI };

    use TokenKind::*;
    let (code, result) = match (op.kind, is_float) {
        (Plus, false) => (vec![Instr::AddI], ValueType::Int),
        (Minus, false) => (vec![Instr::SubI], ValueType::Int),
        (Mul, false) => (vec![Instr::MulI], ValueType::Int),
        (Div, false) => (vec![Instr::DivI], ValueType::Int),
        (Plus, true) => (vec![Instr::AddF], ValueType::Float),
        (Minus, true) => (vec![Instr::SubF], ValueType::Float),
        (Mul, true) => (vec![Instr::MulF], ValueType::Float),
        (Div, true) => (vec![Instr::DivF], ValueType::Float),
        (Neq, _) => (vec![cmp], ValueType::Int),
        (Eq, _) => (vec![cmp, Instr::Not], ValueType::Int),
        (Lt, _) => (vec![cmp, Instr::SetLt], ValueType::Int),
        (Gt, _) => (vec![cmp, Instr::SetGt], ValueType::Int),
        (Le, _) => (vec![cmp, Instr::SetGt, Instr::Not], ValueType::Int),
        (Ge, _) => (vec![cmp, Instr::SetLt, Instr::Not], ValueType::Int),
        _ => {
            let msg = format!("unexpected operator {}", op);
            return error(ErrorKind::Internal(msg));
        }
    };
    for instr in code {
        symbols.emit(instr);
    }
    Ok(result.into())
}
