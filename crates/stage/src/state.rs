//! Named slots for the models the animation driver spins.

use corelib::{CoreError, CoreResult, scene::NodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    SunModel,
    Earth,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::SunModel, Slot::Earth];

    pub fn name(self) -> &'static str {
        match self {
            Slot::SunModel => "sunModel",
            Slot::Earth => "earth",
        }
    }
}

/// Each slot starts empty and is filled at most once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneState {
    sun_model: Option<NodeId>,
    earth: Option<NodeId>,
}

impl SceneState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, slot: Slot) -> Option<NodeId> {
        match slot {
            Slot::SunModel => self.sun_model,
            Slot::Earth => self.earth,
        }
    }

    #[inline]
    pub fn sun_model(&self) -> Option<NodeId> {
        self.sun_model
    }

    #[inline]
    pub fn earth(&self) -> Option<NodeId> {
        self.earth
    }

    pub fn set(&mut self, slot: Slot, node: NodeId) -> CoreResult<()> {
        let entry = match slot {
            Slot::SunModel => &mut self.sun_model,
            Slot::Earth => &mut self.earth,
        };
        if entry.is_some() {
            return Err(CoreError::SlotOccupied(slot.name()));
        }
        *entry = Some(node);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        Slot::ALL.iter().all(|&s| self.get(s).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_start_empty_and_fill_once() {
        let mut state = SceneState::new();
        assert_eq!(state.sun_model(), None);
        assert_eq!(state.earth(), None);
        assert!(!state.is_complete());

        state.set(Slot::Earth, NodeId(7)).unwrap();
        assert_eq!(state.get(Slot::Earth), Some(NodeId(7)));
        assert_eq!(
            state.set(Slot::Earth, NodeId(8)),
            Err(CoreError::SlotOccupied("earth"))
        );
        assert_eq!(state.earth(), Some(NodeId(7)));

        state.set(Slot::SunModel, NodeId(3)).unwrap();
        assert!(state.is_complete());
    }
}
