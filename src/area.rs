/// The area label assigned to a walkable span.
///
/// `0` is reserved for spans that are not walkable; every other value is an
/// opaque label controlled by the caller (ground, water, road, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AreaType(pub u8);

impl AreaType {
    /// The area id used for spans that cannot be walked on.
    pub const NOT_WALKABLE: AreaType = AreaType(0);

    /// Returns whether this area type represents a walkable span.
    pub fn is_walkable(&self) -> bool {
        *self != Self::NOT_WALKABLE
    }
}

impl From<u8> for AreaType {
    fn from(value: u8) -> Self {
        AreaType(value)
    }
}
