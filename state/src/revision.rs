//! Fork revision model.

use std::fmt;

/// A protocol revision. Revisions are totally ordered, so every
/// fork-sensitive branch in the engine is a single `rev >= X` comparison.
///
/// Berlin and London are carried as comparison points for gating rules
/// introduced after Istanbul (the selfdestruct refund removal); the
/// engine implements no other behavior specific to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Revision {
    /// The launch revision.
    Frontier,
    /// EIP-2, EIP-7.
    Homestead,
    /// EIP-150 gas repricing.
    TangerineWhistle,
    /// EIP-158 empty-account rules, EIP-170 code size limit.
    SpuriousDragon,
    /// EIP-100, EIP-140 (REVERT), precompiles 5..8.
    Byzantium,
    /// EIP-1014 (CREATE2), EIP-1283.
    Constantinople,
    /// Constantinople with EIP-1283 reverted.
    Petersburg,
    /// EIP-1679 metapackage; precompile 9, intrinsic-gas repricing.
    Istanbul,
    /// EIP-2929 access-list gas schedule.
    Berlin,
    /// EIP-3529 refund removal.
    London,
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Revision::Frontier => "Frontier",
            Revision::Homestead => "Homestead",
            Revision::TangerineWhistle => "Tangerine Whistle",
            Revision::SpuriousDragon => "Spurious Dragon",
            Revision::Byzantium => "Byzantium",
            Revision::Constantinople => "Constantinople",
            Revision::Petersburg => "Petersburg",
            Revision::Istanbul => "Istanbul",
            Revision::Berlin => "Berlin",
            Revision::London => "London",
        };
        f.write_str(name)
    }
}
