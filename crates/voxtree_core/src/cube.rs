use glam::Vec3;
use serde::{Deserialize, Serialize};

/// An axis-aligned cube, the bounding volume of one octree cell. Octant cubes live in
/// normalized [0,1] universe units; `scaled` converts to world units.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Cube {
    minimum: Vec3,
    edge_length: f32,
}

impl Cube {
    #[inline]
    pub fn new(minimum: Vec3, edge_length: f32) -> Self {
        Self {
            minimum,
            edge_length,
        }
    }

    #[inline]
    pub fn minimum(&self) -> Vec3 {
        self.minimum
    }

    #[inline]
    pub fn maximum(&self) -> Vec3 {
        self.minimum + Vec3::splat(self.edge_length)
    }

    #[inline]
    pub fn edge_length(&self) -> f32 {
        self.edge_length
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        self.minimum + Vec3::splat(0.5 * self.edge_length)
    }

    #[inline]
    pub fn scaled(&self, scale: f32) -> Self {
        Self {
            minimum: self.minimum * scale,
            edge_length: self.edge_length * scale,
        }
    }

    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        let max = self.maximum();
        p.x >= self.minimum.x
            && p.y >= self.minimum.y
            && p.z >= self.minimum.z
            && p.x < max.x
            && p.y < max.y
            && p.z < max.z
    }

    /// The vertex of this cube furthest from `p`. Distance tests against LOD boundaries use
    /// the furthest corner so a whole cell is either in or out of the boundary.
    pub fn furthest_point_from(&self, p: Vec3) -> Vec3 {
        let max = self.maximum();
        let center = self.center();

        Vec3::new(
            if p.x < center.x { max.x } else { self.minimum.x },
            if p.y < center.y { max.y } else { self.minimum.y },
            if p.z < center.z { max.z } else { self.minimum.z },
        )
    }

    #[inline]
    pub fn furthest_distance_from(&self, p: Vec3) -> f32 {
        (self.furthest_point_from(p) - p).length()
    }

    /// Slab-method ray test. Returns the distance along `direction` to the entry point, or
    /// `None` on a miss. An origin inside the cube hits at distance 0.
    pub fn ray_intersection(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let max = self.maximum();
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            let (o, d, lo, hi) = match axis {
                0 => (origin.x, direction.x, self.minimum.x, max.x),
                1 => (origin.y, direction.y, self.minimum.y, max.y),
                _ => (origin.z, direction.z, self.minimum.z, max.z),
            };

            if d.abs() < f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
            } else {
                let t0 = (lo - o) / d;
                let t1 = (hi - o) / d;
                t_min = t_min.max(t0.min(t1));
                t_max = t_max.min(t0.max(t1));
            }
        }

        if t_min <= t_max && t_max >= 0.0 {
            Some(t_min.max(0.0))
        } else {
            None
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
