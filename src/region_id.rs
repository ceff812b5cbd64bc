use bitflags::bitflags;

bitflags! {
    /// The region a walkable span belongs to.
    ///
    /// The low 15 bits hold a dense region index assigned by the region
    /// builder; the top bit marks spans that touch the heightfield's border
    /// padding, which are exempt from the minimum-area filter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    pub struct RegionId: u16 {
        /// No region has been assigned yet.
        const NONE = 0;
        /// Marks a region that touches the tile border.
        const BORDER = 0x8000;
    }
}

impl RegionId {
    /// The bits that carry the dense region index, excluding the border flag.
    pub const ID_MASK: u16 = 0x7fff;

    /// Builds a region id from a dense index, preserving the border flag.
    pub fn with_index(self, index: u16) -> Self {
        RegionId::from_bits_truncate((self.bits() & Self::BORDER.bits()) | (index & Self::ID_MASK))
    }

    /// The dense region index, ignoring the border flag.
    pub fn index(self) -> u16 {
        self.bits() & Self::ID_MASK
    }

    /// Whether this region touches the heightfield border.
    pub fn is_border(self) -> bool {
        self.contains(Self::BORDER)
    }

    /// Increments the dense index portion by one, keeping the border flag.
    pub fn inc(&mut self) {
        *self = self.with_index(self.index() + 1);
    }
}

impl From<u16> for RegionId {
    fn from(value: u16) -> Self {
        RegionId::from_bits_truncate(value)
    }
}
