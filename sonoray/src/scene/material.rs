//! Acoustic material properties for ray propagation.
//!
//! Each material carries a single broadband absorption coefficient: the
//! fraction of a ray's energy that is lost when it reflects off the surface.

use crate::error::{Result, SonorayError};
use std::collections::HashMap;

/// Identifier of a surface material, as reported by an occlusion query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MaterialId(pub u16);

/// Acoustic properties of a surface material.
///
/// # Example
///
/// ```
/// use sonoray::scene::AcousticMaterial;
///
/// let wall = AcousticMaterial::CONCRETE;
/// let curtain = AcousticMaterial::new("curtain", 0.55);
/// assert!(curtain.validate().is_ok());
/// assert!(wall.absorption < curtain.absorption);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcousticMaterial {
    pub name: &'static str,
    /// Fraction of energy absorbed per reflection (0.0 - 1.0)
    ///
    /// 0.0 = perfect mirror, 1.0 = the ray dies on contact
    pub absorption: f32,
}

impl AcousticMaterial {
    /// Generic default material, also used for unlisted identifiers
    pub const GENERIC: Self = Self::new("generic", 0.2);
    pub const BRICK: Self = Self::new("brick", 0.04);
    pub const CONCRETE: Self = Self::new("concrete", 0.07);
    pub const CERAMIC: Self = Self::new("ceramic", 0.02);
    pub const GRAVEL: Self = Self::new("gravel", 0.7);
    pub const CARPET: Self = Self::new("carpet", 0.69);
    pub const GLASS: Self = Self::new("glass", 0.05);
    pub const PLASTER: Self = Self::new("plaster", 0.06);
    pub const WOOD: Self = Self::new("wood", 0.07);
    pub const METAL: Self = Self::new("metal", 0.07);
    pub const ROCK: Self = Self::new("rock", 0.2);
    /// Fully absorptive material (wool, foam)
    pub const WOOL: Self = Self::new("wool", 1.0);

    pub const fn new(name: &'static str, absorption: f32) -> Self {
        Self { name, absorption }
    }

    /// Fraction of energy that survives a reflection.
    pub fn reflectance(&self) -> f32 {
        1.0 - self.absorption
    }

    /// Validates that the absorption coefficient lies within [0.0, 1.0].
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.absorption) {
            return Err(SonorayError::Configuration(format!(
                "absorption of material '{}' must be between 0.0 and 1.0, got {}",
                self.name, self.absorption
            )));
        }
        Ok(())
    }
}

impl Default for AcousticMaterial {
    fn default() -> Self {
        Self::GENERIC
    }
}

/// Lookup from material identifier to absorption coefficient.
///
/// Populated once at startup and then shared read-only with the engine.
/// Identifiers that were never registered fall back to the table's default
/// material.
///
/// # Example
///
/// ```
/// use sonoray::scene::{AcousticMaterial, MaterialAbsorptionTable, MaterialId};
///
/// let mut table = MaterialAbsorptionTable::new();
/// let glass = table.add(AcousticMaterial::GLASS).unwrap();
/// assert_eq!(table.absorption(glass), 0.05);
/// assert_eq!(table.absorption(MaterialId(900)), 0.2);
/// ```
#[derive(Debug, Clone)]
pub struct MaterialAbsorptionTable {
    materials: HashMap<MaterialId, AcousticMaterial>,
    default_material: AcousticMaterial,
    next_id: u16,
}

impl MaterialAbsorptionTable {
    /// Creates an empty table whose fallback is [`AcousticMaterial::GENERIC`].
    pub fn new() -> Self {
        Self {
            materials: HashMap::new(),
            default_material: AcousticMaterial::GENERIC,
            next_id: 0,
        }
    }

    /// Creates a table pre-loaded with the material presets
    ///
    /// Materials are added in the following order:
    /// - 0: GENERIC
    /// - 1: BRICK
    /// - 2: CONCRETE
    /// - 3: CERAMIC
    /// - 4: GRAVEL
    /// - 5: CARPET
    /// - 6: GLASS
    /// - 7: PLASTER
    /// - 8: WOOD
    /// - 9: METAL
    /// - 10: ROCK
    /// - 11: WOOL
    pub fn with_presets() -> Self {
        let mut table = Self::new();
        for material in [
            AcousticMaterial::GENERIC,
            AcousticMaterial::BRICK,
            AcousticMaterial::CONCRETE,
            AcousticMaterial::CERAMIC,
            AcousticMaterial::GRAVEL,
            AcousticMaterial::CARPET,
            AcousticMaterial::GLASS,
            AcousticMaterial::PLASTER,
            AcousticMaterial::WOOD,
            AcousticMaterial::METAL,
            AcousticMaterial::ROCK,
            AcousticMaterial::WOOL,
        ] {
            table.materials.insert(MaterialId(table.next_id), material);
            table.next_id += 1;
        }
        table
    }

    /// Replaces the material used for identifiers that are not in the table.
    pub fn with_default(mut self, material: AcousticMaterial) -> Result<Self> {
        material.validate()?;
        self.default_material = material;
        Ok(self)
    }

    /// Adds a material under the next free identifier and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the material is invalid or the identifier space is
    /// exhausted.
    pub fn add(&mut self, material: AcousticMaterial) -> Result<MaterialId> {
        material.validate()?;
        while self.materials.contains_key(&MaterialId(self.next_id)) {
            self.next_id = self.next_id.checked_add(1).ok_or_else(|| {
                SonorayError::Configuration("material table is full".to_string())
            })?;
        }
        let id = MaterialId(self.next_id);
        self.materials.insert(id, material);
        Ok(id)
    }

    /// Registers a material under an identifier chosen by the host, replacing
    /// any previous entry.
    pub fn insert(&mut self, id: MaterialId, material: AcousticMaterial) -> Result<()> {
        material.validate()?;
        self.materials.insert(id, material);
        Ok(())
    }

    pub fn get(&self, id: MaterialId) -> Option<&AcousticMaterial> {
        self.materials.get(&id)
    }

    /// Absorption coefficient for `id`, or the default material's coefficient.
    pub fn absorption(&self, id: MaterialId) -> f32 {
        self.materials
            .get(&id)
            .unwrap_or(&self.default_material)
            .absorption
    }

    pub fn default_material(&self) -> &AcousticMaterial {
        &self.default_material
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Returns an iterator over all registered materials in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &AcousticMaterial)> {
        let mut entries: Vec<_> = self.materials.iter().map(|(id, m)| (*id, m)).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter()
    }
}

impl Default for MaterialAbsorptionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_validation() {
        assert!(AcousticMaterial::CONCRETE.validate().is_ok());
        assert!(AcousticMaterial::WOOL.validate().is_ok());
        assert!(AcousticMaterial::new("bad", 1.5).validate().is_err());
        assert!(AcousticMaterial::new("bad", -0.1).validate().is_err());
        assert!(AcousticMaterial::new("bad", f32::NAN).validate().is_err());
    }

    #[test]
    fn test_material_table() {
        let mut table = MaterialAbsorptionTable::new();
        assert!(table.is_empty());

        let a = table.add(AcousticMaterial::CONCRETE).unwrap();
        let b = table.add(AcousticMaterial::WOOD).unwrap();
        assert_eq!(a, MaterialId(0));
        assert_eq!(b, MaterialId(1));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(a), Some(&AcousticMaterial::CONCRETE));
        assert_eq!(table.get(MaterialId(99)), None);
        assert!(table.add(AcousticMaterial::new("bad", 2.0)).is_err());
    }

    #[test]
    fn add_skips_identifiers_taken_by_insert() {
        let mut table = MaterialAbsorptionTable::new();
        table.insert(MaterialId(0), AcousticMaterial::GLASS).unwrap();
        let id = table.add(AcousticMaterial::CARPET).unwrap();
        assert_eq!(id, MaterialId(1));
        assert_eq!(table.absorption(MaterialId(0)), 0.05);
    }

    #[test]
    fn unlisted_materials_use_the_default() {
        let table = MaterialAbsorptionTable::with_presets();
        assert_eq!(table.len(), 12);
        assert_eq!(table.absorption(MaterialId(6)), 0.05);
        assert_eq!(table.absorption(MaterialId(11)), 1.0);
        assert_eq!(table.absorption(MaterialId(500)), 0.2);

        let table = table.with_default(AcousticMaterial::WOOL).unwrap();
        assert_eq!(table.absorption(MaterialId(500)), 1.0);
    }

    #[test]
    fn iteration_is_ordered() {
        let table = MaterialAbsorptionTable::with_presets();
        let ids: Vec<u16> = table.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
    }
}
