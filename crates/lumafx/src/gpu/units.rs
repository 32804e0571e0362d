use crate::error::EffectError;
use crate::texture::{Texture, TextureId};
use crate::types::MAX_TEXTURE_UNITS;

#[derive(Clone)]
struct BoundTexture {
    id: TextureId,
    view: wgpu::TextureView,
}

/// Context-wide table of which texture sits on which sampling unit.
///
/// A texture occupies at most one unit. Unit 0 is never stored here: passes
/// always sample their source through it.
#[derive(Default)]
pub(crate) struct TextureUnits {
    slots: [Option<BoundTexture>; MAX_TEXTURE_UNITS as usize],
}

impl TextureUnits {
    pub(crate) fn bind(&mut self, unit: u32, texture: &Texture) -> Result<(), EffectError> {
        if unit == 0 || unit >= MAX_TEXTURE_UNITS {
            return Err(EffectError::UnitOutOfRange(unit));
        }
        if let Some(bound) = self.unit_of(texture.id()) {
            if bound != unit {
                return Err(EffectError::UnitConflict {
                    texture: texture.id(),
                    bound,
                    requested: unit,
                });
            }
        }
        let slot = &mut self.slots[unit as usize];
        if let Some(previous) = slot.as_ref().filter(|entry| entry.id != texture.id()) {
            tracing::trace!(unit, evicted = %previous.id, "replacing texture unit binding");
        }
        *slot = Some(BoundTexture {
            id: texture.id(),
            view: texture.view().clone(),
        });
        Ok(())
    }

    /// Clears every unit holding `id`. Returns the unit that was freed.
    pub(crate) fn release(&mut self, id: TextureId) -> Option<u32> {
        let unit = self.unit_of(id)?;
        self.slots[unit as usize] = None;
        Some(unit)
    }

    pub(crate) fn release_unit(&mut self, unit: u32) {
        if let Some(slot) = self.slots.get_mut(unit as usize) {
            *slot = None;
        }
    }

    pub(crate) fn unit_of(&self, id: TextureId) -> Option<u32> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|entry| entry.id == id))
            .map(|index| index as u32)
    }

    pub(crate) fn bound(&self, unit: u32) -> Option<(TextureId, &wgpu::TextureView)> {
        self.slots
            .get(unit as usize)?
            .as_ref()
            .map(|entry| (entry.id, &entry.view))
    }

    pub(crate) fn occupied(&self) -> impl Iterator<Item = (u32, TextureId)> + '_ {
        self.slots.iter().enumerate().filter_map(|(unit, slot)| {
            slot.as_ref().map(|entry| (unit as u32, entry.id))
        })
    }
}
