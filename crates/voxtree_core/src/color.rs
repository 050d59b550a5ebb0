use serde::{Deserialize, Serialize};

/// RGB voxel content. Whether a node carries color at all is tracked separately, as an
/// `Option<Color3>` on the node.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Color3 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color3 {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    pub const fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    #[inline]
    pub const fn from_array(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }
}

impl From<[u8; 3]> for Color3 {
    #[inline]
    fn from(bytes: [u8; 3]) -> Self {
        Self::from_array(bytes)
    }
}

impl From<Color3> for [u8; 3] {
    #[inline]
    fn from(c: Color3) -> Self {
        c.to_array()
    }
}
