fn elapsed_minutes(elapsed_seconds: f32) -> f32 {
    elapsed_seconds.max(0.0) / 60.0
}

/// Seconds between spawn attempts after `elapsed_seconds` of session time.
pub(crate) fn spawn_interval(settings: &DirectorSettings, elapsed_seconds: f32) -> f32 {
    let rate = settings.base_spawn_rate
        + settings.spawn_rate_increase_per_minute * elapsed_minutes(elapsed_seconds);
    1.0 / rate
}

pub(crate) fn active_cap(settings: &DirectorSettings, elapsed_seconds: f32) -> u32 {
    let growth =
        (settings.max_enemies_increase_per_minute * elapsed_minutes(elapsed_seconds)).floor();
    settings.base_max_enemies.saturating_add(growth as u32)
}

pub(crate) fn wave_number(settings: &DirectorSettings, elapsed_seconds: f32) -> u32 {
    (elapsed_seconds.max(0.0) / settings.wave_duration).floor() as u32 + 1
}

/// Weighted pick among templates eligible for `wave`. The simultaneous cap
/// is checked against the active count of the template's pool tag. When
/// nothing is eligible every template competes with both gates lifted.
pub(crate) fn select_template<R: Rng + ?Sized>(
    templates: &TemplateDatabase,
    wave: u32,
    active_by_tag: &HashMap<PoolTag, u32>,
    rng: &mut R,
) -> Option<TemplateId> {
    let eligible: Vec<(TemplateId, f32)> = templates
        .iter()
        .filter(|(_, template)| {
            let active = active_by_tag.get(&template.pool_tag).copied().unwrap_or(0);
            template.spawn.allows(wave, active)
        })
        .map(|(id, template)| (id, template.spawn.spawn_weight))
        .collect();
    let candidates: Vec<(TemplateId, f32)> = if eligible.is_empty() {
        templates
            .iter()
            .map(|(id, template)| (id, template.spawn.spawn_weight))
            .collect()
    } else {
        eligible
    };

    let (first, _) = *candidates.first()?;
    let mut weighted: Vec<(TemplateId, f32)> = candidates
        .into_iter()
        .filter(|(_, weight)| *weight > 0.0)
        .collect();
    let Some(&(last, _)) = weighted.last() else {
        return Some(first);
    };

    let mut total: f32 = weighted.iter().map(|(_, weight)| weight).sum();
    if !total.is_finite() {
        // Rescale so huge finite weights cannot overflow the sum.
        let largest = weighted
            .iter()
            .map(|(_, weight)| *weight)
            .fold(0.0_f32, f32::max);
        for (_, weight) in &mut weighted {
            *weight /= largest;
        }
        total = weighted.iter().map(|(_, weight)| weight).sum();
    }

    let draw = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for (id, weight) in &weighted {
        cumulative += weight;
        if cumulative >= draw {
            return Some(*id);
        }
    }
    Some(last)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PlacementFailures {
    pub(crate) no_ground: u32,
    pub(crate) occupied: u32,
    pub(crate) on_screen: u32,
}

/// Searches the ring around the player for an off-screen, grounded, unoccupied
/// point. `occupied` holds positions of simulation-owned bodies (player and
/// live enemies) that the host world does not know about.
pub(crate) fn search_spawn_position(
    settings: &DirectorSettings,
    player_position: Vec3,
    occupied: &[Vec3],
    host: HostView<'_>,
    rng: &mut GameRng,
) -> Result<Vec3, PlacementFailures> {
    let mut failures = PlacementFailures::default();
    for _ in 0..settings.placement_attempts {
        let bearing = rng.range_f32(0.0, TAU);
        let mut distance = rng.range_f32(settings.min_spawn_distance, settings.max_spawn_distance);
        let offset = Vec3::new(bearing.cos(), 0.0, bearing.sin());
        let mut candidate = player_position + offset * distance;

        let mut pushes = 0;
        while host.viewport.is_on_screen(candidate) && pushes < settings.viewport_push_limit {
            distance += settings.viewport_push_step;
            candidate = player_position + offset * distance;
            pushes += 1;
        }

        let probe_origin = candidate + Vec3::Y * settings.ground_probe_height;
        let Some(GroundHit { point, .. }) = host.world.probe_ground(
            probe_origin,
            settings.ground_probe_distance,
            LayerMask::GROUND,
        ) else {
            failures.no_ground += 1;
            continue;
        };

        let radius = settings.clearance_radius;
        let blocked_by_host = host
            .world
            .entities_near(point, radius)
            .into_iter()
            .any(EntityClass::occupies_spawn_space);
        let blocked_by_bodies = occupied
            .iter()
            .any(|body| body.distance_squared(point) <= radius * radius);
        if blocked_by_host || blocked_by_bodies {
            failures.occupied += 1;
            continue;
        }

        if host.viewport.is_on_screen(point) {
            failures.on_screen += 1;
            continue;
        }
        return Ok(point);
    }
    Err(failures)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SpawnOrder {
    pub(crate) template: TemplateId,
    pub(crate) position: Vec3,
    pub(crate) wave: u32,
    pub(crate) stats: ScaledStats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DirectorSnapshot {
    pub(crate) elapsed_seconds: f32,
    pub(crate) wave: u32,
    pub(crate) spawn_interval: f32,
    pub(crate) active_cap: u32,
    pub(crate) census_active: u32,
    pub(crate) view_half_extents: Vec2,
}

/// Live enemy bookkeeping. The director samples counts on its census timer
/// and body positions only when it searches for a spawn point.
pub(crate) trait EnemyCensus {
    fn live_count(&self) -> u32;
    fn active_by_tag(&self) -> HashMap<PoolTag, u32>;
    fn blocking_positions(&self) -> Vec<Vec3>;
}

impl EnemyCensus for PoolManager<EnemyPrefab> {
    fn live_count(&self) -> u32 {
        self.total_active() as u32
    }

    fn active_by_tag(&self) -> HashMap<PoolTag, u32> {
        self.active_counts_by_tag()
            .into_iter()
            .map(|(tag, count)| (tag, count as u32))
            .collect()
    }

    fn blocking_positions(&self) -> Vec<Vec3> {
        self.iter_checked_out()
            .filter(|(_, body)| body.collision_enabled)
            .map(|(_, body)| body.position)
            .collect()
    }
}

pub(crate) struct DirectorInputs<'a> {
    pub(crate) player_position: Vec3,
    pub(crate) census: &'a dyn EnemyCensus,
    pub(crate) templates: &'a TemplateDatabase,
    pub(crate) host: HostView<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DirectorOutcome {
    Idle,
    AtCap,
    Spawn(SpawnOrder),
    PlacementExhausted(PlacementFailures),
    NoTemplates,
}

pub(crate) struct SpawnDirector {
    settings: DirectorSettings,
    elapsed: f32,
    since_last_attempt: f32,
    since_census: f32,
    since_camera_refresh: Option<f32>,
    census_active: u32,
    census_by_tag: HashMap<PoolTag, u32>,
    view_half_extents: Vec2,
    warned_ring_inside_view: bool,
}

impl SpawnDirector {
    pub(crate) fn new(settings: DirectorSettings) -> Self {
        Self {
            settings,
            elapsed: 0.0,
            since_last_attempt: 0.0,
            since_census: 0.0,
            since_camera_refresh: None,
            census_active: 0,
            census_by_tag: HashMap::new(),
            view_half_extents: Vec2::ZERO,
            warned_ring_inside_view: false,
        }
    }

    pub(crate) fn snapshot(&self) -> DirectorSnapshot {
        DirectorSnapshot {
            elapsed_seconds: self.elapsed,
            wave: wave_number(&self.settings, self.elapsed),
            spawn_interval: spawn_interval(&self.settings, self.elapsed),
            active_cap: active_cap(&self.settings, self.elapsed),
            census_active: self.census_active,
            view_half_extents: self.view_half_extents,
        }
    }

    pub(crate) fn tick(
        &mut self,
        dt: f32,
        inputs: DirectorInputs<'_>,
        rng: &mut GameRng,
    ) -> DirectorOutcome {
        self.elapsed += dt;
        self.since_last_attempt += dt;
        self.since_census += dt;

        if self.since_census >= self.settings.census_interval {
            self.since_census = 0.0;
            self.census_active = inputs.census.live_count();
            self.census_by_tag = inputs.census.active_by_tag();
        }
        self.refresh_camera_bounds(dt, inputs.host);

        let interval = spawn_interval(&self.settings, self.elapsed);
        if self.since_last_attempt < interval {
            return DirectorOutcome::Idle;
        }
        let cap = active_cap(&self.settings, self.elapsed);
        if self.census_active >= cap {
            return DirectorOutcome::AtCap;
        }
        self.since_last_attempt = 0.0;

        let wave = wave_number(&self.settings, self.elapsed);
        let mut occupied = inputs.census.blocking_positions();
        occupied.push(inputs.player_position);
        let position = match search_spawn_position(
            &self.settings,
            inputs.player_position,
            &occupied,
            inputs.host,
            rng,
        ) {
            Ok(position) => position,
            Err(failures) => {
                warn!(
                    attempts = self.settings.placement_attempts,
                    no_ground = failures.no_ground,
                    occupied = failures.occupied,
                    on_screen = failures.on_screen,
                    "spawn_placement_exhausted"
                );
                return DirectorOutcome::PlacementExhausted(failures);
            }
        };

        let Some(template_id) =
            select_template(inputs.templates, wave, &self.census_by_tag, rng.rng_mut())
        else {
            return DirectorOutcome::NoTemplates;
        };
        let Some(template) = inputs.templates.template(template_id) else {
            return DirectorOutcome::NoTemplates;
        };

        self.census_active = self.census_active.saturating_add(1);
        *self
            .census_by_tag
            .entry(template.pool_tag.clone())
            .or_insert(0) += 1;
        DirectorOutcome::Spawn(SpawnOrder {
            template: template_id,
            position,
            wave,
            stats: template.scaled(wave),
        })
    }

    fn refresh_camera_bounds(&mut self, dt: f32, host: HostView<'_>) {
        let due = match self.since_camera_refresh.as_mut() {
            None => true,
            Some(since) => {
                *since += dt;
                *since >= self.settings.camera_refresh_interval
            }
        };
        if !due {
            return;
        }
        self.since_camera_refresh = Some(0.0);
        self.view_half_extents = host.viewport.view_half_extents();

        if !self.warned_ring_inside_view
            && self.settings.max_spawn_distance < self.view_half_extents.min_element()
        {
            self.warned_ring_inside_view = true;
            warn!(
                max_spawn_distance = self.settings.max_spawn_distance,
                view_half_width = self.view_half_extents.x,
                view_half_height = self.view_half_extents.y,
                "spawn_ring_inside_view"
            );
        }
    }
}
