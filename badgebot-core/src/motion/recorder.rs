//! Motion instruction recorder
//!
//! Collects direction presses into a run-length encoded program. Repeated
//! presses of the same direction extend the open instruction; any other
//! direction finalizes it and opens a new one.

use alloc::vec::Vec;

use super::compiler::ProfileParams;
use super::instruction::{Direction, Instruction};
use super::playback::Playback;

/// One line of the program listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row<'a> {
    Start,
    Instruction(&'a Instruction),
    /// The instruction still counting presses, if any
    Open(Option<&'a Instruction>),
    End,
}

/// Recorded program
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    finalized: Vec<Instruction>,
    open: Option<Instruction>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a direction press
    pub fn press(&mut self, direction: Direction, params: &ProfileParams) {
        if let Some(open) = self.open.as_mut() {
            if open.direction() == direction && open.increment() {
                return;
            }
        }
        self.finalize_open(params);
        self.open = Some(Instruction::new(direction));
    }

    /// Compile the open instruction and append it to the program
    ///
    /// # Returns
    /// `false` if there was no open instruction.
    pub fn finalize_open(&mut self, params: &ProfileParams) -> bool {
        match self.open.take() {
            Some(mut instruction) => {
                instruction.finalize(params);
                debug!("recorded {} x{}", instruction.direction().label(), instruction.hold_count());
                self.finalized.push(instruction);
                true
            }
            None => false,
        }
    }

    /// Finalized instructions in recording order
    pub fn instructions(&self) -> &[Instruction] {
        &self.finalized
    }

    pub fn open(&self) -> Option<&Instruction> {
        self.open.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.finalized.is_empty() && self.open.is_none()
    }

    /// Discard the whole program
    pub fn clear(&mut self) {
        self.finalized.clear();
        self.open = None;
    }

    /// Listing rows: start marker, finalized, open slot, end marker
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        core::iter::once(Row::Start)
            .chain(self.finalized.iter().map(Row::Instruction))
            .chain(core::iter::once(Row::Open(self.open.as_ref())))
            .chain(core::iter::once(Row::End))
    }

    pub fn row_count(&self) -> usize {
        self.finalized.len() + 3
    }

    /// Playback of the finalized program
    pub fn playback(&self) -> Playback {
        Playback::new(&self.finalized)
    }
}
