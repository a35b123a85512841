//! Recorded investment actions and their effect on share holdings.
//!
//! An [`Action`] is what the source ledger says happened (`Buy`, `ShrsOut`,
//! `StkSplit`, ...). The allocator only cares about the [`ShareEffect`] an
//! action has, which additionally depends on whether the transaction is one
//! leg of a transfer between accounts.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An action recorded on an investment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Buy shares with cash from the investment account.
    Buy,
    /// Buy shares with cash transferred from another account.
    BuyX,
    /// Reinvest a dividend.
    ReinvDiv,
    /// Reinvest interest.
    ReinvInt,
    /// Reinvest a long-term capital gain distribution.
    ReinvLg,
    /// Reinvest a mid-term capital gain distribution.
    ReinvMd,
    /// Reinvest a short-term capital gain distribution.
    ReinvSh,
    /// Shares added without cash.
    ShrsIn,
    /// Sell shares into the investment account.
    Sell,
    /// Sell shares with proceeds transferred to another account.
    SellX,
    /// Shares removed without cash.
    ShrsOut,
    /// Stock split; the transaction quantity carries the ratio.
    StkSplit,
    /// Cash dividend.
    Div,
    /// Cash dividend transferred to another account.
    DivX,
    /// Interest income.
    IntInc,
    /// Miscellaneous expense.
    MiscExp,
    /// Miscellaneous income.
    MiscInc,
    /// Long-term capital gain distribution paid in cash.
    CgLong,
    /// Mid-term capital gain distribution paid in cash.
    CgMid,
    /// Short-term capital gain distribution paid in cash.
    CgShort,
    /// Return of capital.
    RtrnCap,
    /// Anything the classifier does not recognize.
    Other(String),
}

impl Action {
    /// Canonical name as written in source ledgers.
    pub fn name(&self) -> &str {
        match self {
            Self::Buy => "Buy",
            Self::BuyX => "BuyX",
            Self::ReinvDiv => "ReinvDiv",
            Self::ReinvInt => "ReinvInt",
            Self::ReinvLg => "ReinvLg",
            Self::ReinvMd => "ReinvMd",
            Self::ReinvSh => "ReinvSh",
            Self::ShrsIn => "ShrsIn",
            Self::Sell => "Sell",
            Self::SellX => "SellX",
            Self::ShrsOut => "ShrsOut",
            Self::StkSplit => "StkSplit",
            Self::Div => "Div",
            Self::DivX => "DivX",
            Self::IntInc => "IntInc",
            Self::MiscExp => "MiscExp",
            Self::MiscInc => "MiscInc",
            Self::CgLong => "CGLong",
            Self::CgMid => "CGMid",
            Self::CgShort => "CGShort",
            Self::RtrnCap => "RtrnCap",
            Self::Other(name) => name,
        }
    }

    /// Whether this action adds shares to the holding account.
    pub const fn adds_shares(&self) -> bool {
        matches!(
            self,
            Self::Buy
                | Self::BuyX
                | Self::ReinvDiv
                | Self::ReinvInt
                | Self::ReinvLg
                | Self::ReinvMd
                | Self::ReinvSh
                | Self::ShrsIn
        )
    }

    /// Whether this action removes shares from the holding account.
    pub const fn removes_shares(&self) -> bool {
        matches!(self, Self::Sell | Self::SellX | Self::ShrsOut)
    }

    /// Classify this action into its share effect.
    ///
    /// `linked` is true when the transaction carries counterpart links, which
    /// turns an adding or removing action into one leg of a transfer.
    pub const fn share_effect(&self, linked: bool) -> ShareEffect {
        if self.adds_shares() {
            if linked {
                ShareEffect::TransferIn
            } else {
                ShareEffect::NewShares
            }
        } else if self.removes_shares() {
            if linked {
                ShareEffect::TransferOut
            } else {
                ShareEffect::DisposeShares
            }
        } else if matches!(self, Self::StkSplit) {
            ShareEffect::Split
        } else {
            ShareEffect::NoOp
        }
    }

    /// True for actions the classifier does not know about.
    pub const fn is_unrecognized(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "buy" => Self::Buy,
            "buyx" => Self::BuyX,
            "reinvdiv" => Self::ReinvDiv,
            "reinvint" => Self::ReinvInt,
            "reinvlg" => Self::ReinvLg,
            "reinvmd" => Self::ReinvMd,
            "reinvsh" => Self::ReinvSh,
            "shrsin" => Self::ShrsIn,
            "sell" => Self::Sell,
            "sellx" => Self::SellX,
            "shrsout" => Self::ShrsOut,
            "stksplit" => Self::StkSplit,
            "div" => Self::Div,
            "divx" => Self::DivX,
            "intinc" => Self::IntInc,
            "miscexp" => Self::MiscExp,
            "miscinc" => Self::MiscInc,
            "cglong" => Self::CgLong,
            "cgmid" => Self::CgMid,
            "cgshort" => Self::CgShort,
            "rtrncap" => Self::RtrnCap,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.parse() {
            Ok(action) => Ok(action),
            Err(never) => match never {},
        }
    }
}

/// How a transaction changes share holdings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareEffect {
    /// Shares acquired; opens a new parentless lot.
    NewShares,
    /// Shares sold or written off; consumes open lots.
    DisposeShares,
    /// Destination leg of a transfer between accounts.
    TransferIn,
    /// Source leg of a transfer between accounts.
    TransferOut,
    /// Security-wide split event.
    Split,
    /// No effect on shares.
    NoOp,
}

impl ShareEffect {
    /// Whether the effect takes shares out of an account.
    pub const fn is_removal(self) -> bool {
        matches!(self, Self::DisposeShares | Self::TransferOut)
    }
}

impl fmt::Display for ShareEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NewShares => "new-shares",
            Self::DisposeShares => "dispose-shares",
            Self::TransferIn => "transfer-in",
            Self::TransferOut => "transfer-out",
            Self::Split => "split",
            Self::NoOp => "no-op",
        };
        f.write_str(name)
    }
}
