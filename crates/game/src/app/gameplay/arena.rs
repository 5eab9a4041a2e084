/// Flat square arena with cylindrical pillars and hazard zones. Stands in for
/// a host physics world when the simulation runs headless.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Arena {
    half_size: f32,
    ground_height: f32,
    pillars: Vec<PillarSpec>,
    hazards: Vec<PillarSpec>,
}

impl Arena {
    pub(crate) fn new(settings: &ArenaSettings) -> Self {
        Self {
            half_size: settings.half_size,
            ground_height: settings.ground_height,
            pillars: settings.pillars.clone(),
            hazards: settings.hazards.clone(),
        }
    }

    fn within_bounds(&self, point: Vec3) -> bool {
        point.x.abs() <= self.half_size && point.z.abs() <= self.half_size
    }

    fn inside_pillar(&self, point: Vec3) -> bool {
        let flat = Vec2::new(point.x, point.z);
        self.pillars
            .iter()
            .any(|pillar| flat.distance(pillar.center) < pillar.radius)
    }
}

/// Distance along a normalized XZ ray to the first crossing of a circle, or
/// `None` when the ray misses. A ray starting inside reports distance zero.
fn ray_circle_distance(origin: Vec2, direction: Vec2, circle: &PillarSpec) -> Option<f32> {
    let to_origin = origin - circle.center;
    let c = to_origin.length_squared() - circle.radius * circle.radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let b = to_origin.dot(direction);
    if b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    Some(-b - discriminant.sqrt())
}

impl WorldQueries for Arena {
    fn probe_ground(
        &self,
        origin_above: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<GroundHit> {
        if !mask.contains(LayerMask::GROUND) {
            return None;
        }
        let drop = origin_above.y - self.ground_height;
        if !(0.0..=max_distance).contains(&drop) {
            return None;
        }
        if !self.within_bounds(origin_above) || self.inside_pillar(origin_above) {
            return None;
        }
        Some(GroundHit {
            point: Vec3::new(origin_above.x, self.ground_height, origin_above.z),
            normal: Vec3::Y,
        })
    }

    fn raycast_obstacles(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RayHit> {
        if !mask.contains(LayerMask::OBSTACLES) {
            return None;
        }
        let flat = Vec2::new(direction.x, direction.z).normalize_or_zero();
        if flat == Vec2::ZERO {
            return None;
        }
        let start = Vec2::new(origin.x, origin.z);
        let distance = self
            .pillars
            .iter()
            .filter_map(|pillar| ray_circle_distance(start, flat, pillar))
            .filter(|distance| *distance <= max_distance)
            .min_by(f32::total_cmp)?;
        let along = start + flat * distance;
        Some(RayHit {
            point: Vec3::new(along.x, origin.y, along.y),
            distance,
            class: EntityClass::Terrain,
        })
    }

    fn entities_near(&self, point: Vec3, radius: f32) -> Vec<EntityClass> {
        let flat = Vec2::new(point.x, point.z);
        let overlaps = |zone: &PillarSpec| flat.distance(zone.center) < zone.radius + radius;
        let terrain = self
            .pillars
            .iter()
            .filter(|pillar| overlaps(*pillar))
            .map(|_| EntityClass::Terrain);
        let hazards = self
            .hazards
            .iter()
            .filter(|hazard| overlaps(*hazard))
            .map(|_| EntityClass::Hazard);
        terrain.chain(hazards).collect()
    }
}
