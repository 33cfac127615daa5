//! Pratt parser binding-power tables for Vague expression precedence
//! (spec.md §4.2).
//!
//! From loosest to tightest: ternary, logical or, logical and, unary not,
//! superposition (`|`), comparison, range (`..`), additive, multiplicative,
//! unary minus, call/postfix, primary.

use crate::token::TokenKind;

/// Binding power for a binary (infix) operator: `(left, right)`. A higher
/// number binds tighter. Left-associative operators have `right = left + 1`;
/// right-associative operators (none at present) would have `right = left`.
pub fn infix_binding_power(kind: &TokenKind) -> Option<(u8, u8)> {
    Some(match kind {
        TokenKind::Or => (1, 2),
        TokenKind::And => (3, 4),
        TokenKind::Pipe => (5, 6),
        TokenKind::EqEq
        | TokenKind::Ne
        | TokenKind::Lt
        | TokenKind::Le
        | TokenKind::Gt
        | TokenKind::Ge => (7, 8),
        TokenKind::DotDot => (9, 10),
        TokenKind::Plus | TokenKind::Minus => (11, 12),
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => (13, 14),
        _ => return None,
    })
}

/// Binding power for a prefix (unary) operator: the power of its operand.
pub fn prefix_binding_power(kind: &TokenKind) -> Option<u8> {
    Some(match kind {
        TokenKind::Not => 4,
        TokenKind::Minus => 15,
        _ => return None,
    })
}

/// Binding power of the `?:` ternary's condition, so that `cond ? a : b`
/// binds more loosely than everything except nothing (it is the entry
/// point of `parse_expr`).
pub const TERNARY_BINDING_POWER: u8 = 0;

/// Binding power for postfix `.field` / `(args)` application; always
/// binds tighter than any infix operator.
pub const POSTFIX_BINDING_POWER: u8 = 17;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_binds_loosest_of_the_binary_operators() {
        let (or_l, or_r) = infix_binding_power(&TokenKind::Or).unwrap();
        let (and_l, _) = infix_binding_power(&TokenKind::And).unwrap();
        assert!(or_r <= and_l);
    }

    #[test]
    fn multiplicative_binds_tighter_than_additive() {
        let (_, add_r) = infix_binding_power(&TokenKind::Plus).unwrap();
        let (mul_l, _) = infix_binding_power(&TokenKind::Star).unwrap();
        assert!(mul_l > add_r);
    }

    #[test]
    fn range_binds_tighter_than_comparison() {
        let (_, cmp_r) = infix_binding_power(&TokenKind::EqEq).unwrap();
        let (range_l, _) = infix_binding_power(&TokenKind::DotDot).unwrap();
        assert!(range_l > cmp_r);
    }

    #[test]
    fn superposition_binds_tighter_than_and() {
        let (_, and_r) = infix_binding_power(&TokenKind::And).unwrap();
        let (pipe_l, _) = infix_binding_power(&TokenKind::Pipe).unwrap();
        assert!(pipe_l > and_r);
    }

    #[test]
    fn unary_minus_binds_tighter_than_any_infix_operator() {
        let power = prefix_binding_power(&TokenKind::Minus).unwrap();
        assert!(power > POSTFIX_BINDING_POWER - 1);
    }

    #[test]
    fn delimiters_have_no_binding_power() {
        assert_eq!(infix_binding_power(&TokenKind::LeftParen), None);
        assert_eq!(prefix_binding_power(&TokenKind::Comma), None);
    }
}
