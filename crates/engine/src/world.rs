use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Coarse classification assigned once when a world entity is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    Player,
    Enemy,
    Hazard,
    Terrain,
}

impl EntityClass {
    pub const ALL: [EntityClass; 4] = [Self::Player, Self::Enemy, Self::Hazard, Self::Terrain];

    pub fn damageable(self) -> bool {
        matches!(self, Self::Player | Self::Enemy)
    }

    pub fn blocks_projectiles(self) -> bool {
        matches!(self, Self::Terrain)
    }

    pub fn occupies_spawn_space(self) -> bool {
        matches!(self, Self::Player | Self::Enemy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Enemy => "enemy",
            Self::Hazard => "hazard",
            Self::Terrain => "terrain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const GROUND: LayerMask = LayerMask(1 << 0);
    pub const OBSTACLES: LayerMask = LayerMask(1 << 1);
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    pub fn contains(self, other: LayerMask) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn union(self, other: LayerMask) -> LayerMask {
        LayerMask(self.0 | other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundHit {
    pub point: Vec3,
    pub normal: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub distance: f32,
    pub class: EntityClass,
}

/// Spatial queries the host world answers for the simulation. All queries
/// are synchronous and read-only.
pub trait WorldQueries {
    /// Casts straight down from `origin_above` looking for walkable ground.
    fn probe_ground(&self, origin_above: Vec3, max_distance: f32, mask: LayerMask)
        -> Option<GroundHit>;

    /// Nearest static obstacle hit along `direction` (expected normalized).
    fn raycast_obstacles(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RayHit>;

    /// Classes of host-owned entities overlapping the sphere.
    fn entities_near(&self, point: Vec3, radius: f32) -> Vec<EntityClass>;
}

pub trait ViewportProjector {
    /// Normalized viewport coordinates; `[0, 1]` on both axes is on-screen.
    fn world_to_viewport(&self, point: Vec3) -> Vec2;

    /// Half width and half height of the visible ground area in world units.
    fn view_half_extents(&self) -> Vec2;

    fn is_on_screen(&self, point: Vec3) -> bool {
        let viewport = self.world_to_viewport(point);
        (0.0..=1.0).contains(&viewport.x) && (0.0..=1.0).contains(&viewport.y)
    }
}
