//! Binding powers for Pratt expression parsing.

use crate::ast::{BinaryOp, UnaryOp};
use crate::lexer::{Keyword, TokenKind};

/// Returns the prefix binding power for a unary-operator token.
///
/// `NOT` sits between AND and the comparison operators; `-`, `!` and `~`
/// bind tighter than any binary operator.
#[must_use]
pub const fn prefix_binding_power(kind: &TokenKind) -> Option<u8> {
    match kind {
        TokenKind::Keyword(Keyword::Not) => Some(5),
        TokenKind::Minus | TokenKind::Bang | TokenKind::BitNot => Some(19),
        _ => None,
    }
}

/// Returns `(left_bp, right_bp)` for an infix token, or `None` if the token
/// is not an infix operator. Left associative operators have
/// `left_bp < right_bp`.
#[must_use]
pub const fn infix_binding_power(kind: &TokenKind) -> Option<(u8, u8)> {
    match kind {
        TokenKind::Keyword(Keyword::Or) | TokenKind::OrOr => Some((1, 2)),

        TokenKind::Keyword(Keyword::And) | TokenKind::AndAnd => Some((3, 4)),

        TokenKind::EqEq
        | TokenKind::NotEq
        | TokenKind::Lt
        | TokenKind::LtEq
        | TokenKind::Gt
        | TokenKind::GtEq
        | TokenKind::Keyword(
            Keyword::Like | Keyword::Is | Keyword::In | Keyword::Between | Keyword::Not,
        ) => Some((7, 8)),

        TokenKind::BitOr => Some((9, 10)),

        TokenKind::BitAnd => Some((11, 12)),

        TokenKind::LeftShift | TokenKind::RightShift => Some((13, 14)),

        TokenKind::Plus | TokenKind::Minus => Some((15, 16)),

        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some((17, 18)),

        _ => None,
    }
}

/// Converts a token to a simple binary operator.
#[must_use]
pub const fn token_to_binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Sub),
        TokenKind::Star => Some(BinaryOp::Mul),
        TokenKind::Slash => Some(BinaryOp::Div),
        TokenKind::Percent => Some(BinaryOp::Mod),
        TokenKind::EqEq => Some(BinaryOp::Eq),
        TokenKind::NotEq => Some(BinaryOp::NotEq),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::LtEq => Some(BinaryOp::LtEq),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::GtEq => Some(BinaryOp::GtEq),
        TokenKind::Keyword(Keyword::And) | TokenKind::AndAnd => Some(BinaryOp::And),
        TokenKind::Keyword(Keyword::Or) | TokenKind::OrOr => Some(BinaryOp::Or),
        TokenKind::Keyword(Keyword::Like) => Some(BinaryOp::Like),
        TokenKind::BitAnd => Some(BinaryOp::BitAnd),
        TokenKind::BitOr => Some(BinaryOp::BitOr),
        TokenKind::LeftShift => Some(BinaryOp::LeftShift),
        TokenKind::RightShift => Some(BinaryOp::RightShift),
        _ => None,
    }
}

/// Converts a token to a unary operator.
#[must_use]
pub const fn token_to_unary_op(kind: &TokenKind) -> Option<UnaryOp> {
    match kind {
        TokenKind::Minus => Some(UnaryOp::Neg),
        TokenKind::Bang | TokenKind::Keyword(Keyword::Not) => Some(UnaryOp::Not),
        TokenKind::BitNot => Some(UnaryOp::BitNot),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        let or_bp = infix_binding_power(&TokenKind::OrOr).unwrap();
        let and_bp = infix_binding_power(&TokenKind::AndAnd).unwrap();
        let cmp_bp = infix_binding_power(&TokenKind::EqEq).unwrap();
        let bitor_bp = infix_binding_power(&TokenKind::BitOr).unwrap();
        let bitand_bp = infix_binding_power(&TokenKind::BitAnd).unwrap();
        let shift_bp = infix_binding_power(&TokenKind::LeftShift).unwrap();
        let add_bp = infix_binding_power(&TokenKind::Plus).unwrap();
        let mul_bp = infix_binding_power(&TokenKind::Star).unwrap();

        assert!(or_bp.0 < and_bp.0);
        assert!(and_bp.0 < cmp_bp.0);
        assert!(cmp_bp.0 < bitor_bp.0);
        assert!(bitor_bp.0 < bitand_bp.0);
        assert!(bitand_bp.0 < shift_bp.0);
        assert!(shift_bp.0 < add_bp.0);
        assert!(add_bp.0 < mul_bp.0);
    }

    #[test]
    fn test_left_associativity() {
        let (l, r) = infix_binding_power(&TokenKind::Plus).unwrap();
        assert!(l < r);
    }

    #[test]
    fn test_unary_not_binds_looser_than_comparison() {
        let not_bp = prefix_binding_power(&TokenKind::Keyword(Keyword::Not)).unwrap();
        let cmp_bp = infix_binding_power(&TokenKind::EqEq).unwrap();
        assert!(not_bp < cmp_bp.0);
        let neg_bp = prefix_binding_power(&TokenKind::Minus).unwrap();
        assert!(neg_bp > infix_binding_power(&TokenKind::Star).unwrap().1);
    }
}
