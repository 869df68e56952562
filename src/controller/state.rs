//! Per-instrument lifecycle state

use crate::exchange::{OrderIntent, Position};

/// Where an instrument sits in the entry / bracket lifecycle
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InstrumentState {
    /// No position, no orders of ours resting
    #[default]
    Flat,
    /// Market entry submitted, fill not yet confirmed
    EntryPending { entry: OrderIntent },
    /// Position open without a live bracket
    PositionOpen { position: Position },
    /// Position protected by a stop-loss / take-profit pair
    BracketActive {
        position: Position,
        stop_loss: OrderIntent,
        take_profit: OrderIntent,
    },
}

impl InstrumentState {
    pub fn name(&self) -> &'static str {
        match self {
            InstrumentState::Flat => "FLAT",
            InstrumentState::EntryPending { .. } => "ENTRY_PENDING",
            InstrumentState::PositionOpen { .. } => "POSITION_OPEN",
            InstrumentState::BracketActive { .. } => "BRACKET_ACTIVE",
        }
    }

    /// Numeric code for the state gauge
    pub fn code(&self) -> u8 {
        match self {
            InstrumentState::Flat => 0,
            InstrumentState::EntryPending { .. } => 1,
            InstrumentState::PositionOpen { .. } => 2,
            InstrumentState::BracketActive { .. } => 3,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, InstrumentState::Flat)
    }

    /// The open position, if the state carries one
    pub fn position(&self) -> Option<&Position> {
        match self {
            InstrumentState::PositionOpen { position }
            | InstrumentState::BracketActive { position, .. } => Some(position),
            _ => None,
        }
    }
}
