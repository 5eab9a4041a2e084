#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AgentState {
    Idle,
    Approaching,
    Attacking,
    Dead,
}

/// Per-instance combat numbers, derived from the template and wave on
/// activation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AgentStats {
    pub(crate) move_speed: f32,
    pub(crate) attack_damage: u32,
    pub(crate) attack_distance: f32,
    pub(crate) follow_distance: f32,
    pub(crate) attack_cooldown: f32,
}

impl Default for AgentStats {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            attack_damage: 10,
            attack_distance: 2.0,
            follow_distance: 15.0,
            attack_cooldown: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetRef {
    Player,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Agent {
    pub(crate) state: AgentState,
    pub(crate) stats: AgentStats,
    pub(crate) target: Option<TargetRef>,
    pub(crate) move_direction: Vec3,
    pub(crate) last_target_refresh: Option<f32>,
    pub(crate) last_attack: Option<f32>,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            state: AgentState::Idle,
            stats: AgentStats::default(),
            target: None,
            move_direction: Vec3::ZERO,
            last_target_refresh: None,
            last_attack: None,
        }
    }
}

impl Agent {
    fn activate(&mut self, stats: AgentStats) {
        *self = Self {
            stats,
            ..Self::default()
        };
    }

    fn mark_dead(&mut self) {
        self.state = AgentState::Dead;
        self.target = None;
        self.move_direction = Vec3::ZERO;
    }
}

/// What one agent perceives this tick.
pub(crate) struct AgentSenses<'a> {
    pub(crate) now: f32,
    pub(crate) dt: f32,
    pub(crate) target_position: Option<Vec3>,
    pub(crate) neighbors: &'a [(PoolHandle, Vec3)],
    pub(crate) world: &'a dyn WorldQueries,
    pub(crate) settings: &'a AgentSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AgentAttack {
    pub(crate) damage: u32,
}

impl EnemyBody {
    /// Resets every piece of gameplay state a previous use may have left.
    pub(crate) fn activate(&mut self, order: &SpawnOrder, template: &EntityTemplate) {
        self.template = Some(order.template);
        self.position = order.position;
        self.orientation = Quat::IDENTITY;
        self.velocity = Vec3::ZERO;
        self.kinematic = false;
        self.collision_enabled = true;
        self.health.reset_health();
        self.health.set_max_health(order.stats.max_health, true);
        self.agent.activate(AgentStats {
            move_speed: order.stats.move_speed,
            attack_damage: order.stats.attack_damage,
            attack_distance: template.attack_range,
            follow_distance: template.detection_range,
            attack_cooldown: template.attack_cooldown,
        });
    }

    fn freeze_for_death(&mut self) {
        self.velocity = Vec3::ZERO;
        self.kinematic = true;
        self.collision_enabled = false;
        self.agent.mark_dead();
    }
}

fn update_agent(
    handle: PoolHandle,
    body: &mut EnemyBody,
    senses: &AgentSenses<'_>,
) -> Option<AgentAttack> {
    if body.agent.state == AgentState::Dead {
        return None;
    }
    let Some(target_position) = senses.target_position else {
        body.agent.target = None;
        body.agent.move_direction = Vec3::ZERO;
        body.agent.state = AgentState::Idle;
        body.velocity = Vec3::new(0.0, body.velocity.y, 0.0);
        return None;
    };

    let refresh_due = body
        .agent
        .last_target_refresh
        .map_or(true, |last| senses.now - last >= senses.settings.update_target_interval);
    if refresh_due {
        refresh_target(body, target_position);
        body.agent.last_target_refresh = Some(senses.now);
    }

    if let Some(facing) = yaw_towards(target_position - body.position) {
        let blend = (senses.settings.look_speed * senses.dt).min(1.0);
        body.orientation = body.orientation.slerp(facing, blend).normalize();
    }

    steer(handle, body, senses);

    let in_range = body.position.distance(target_position) <= body.agent.stats.attack_distance;
    let cooled_down = body
        .agent
        .last_attack
        .map_or(true, |last| senses.now - last >= body.agent.stats.attack_cooldown);
    if in_range && cooled_down {
        body.agent.last_attack = Some(senses.now);
        return Some(AgentAttack {
            damage: body.agent.stats.attack_damage,
        });
    }
    None
}

fn refresh_target(body: &mut EnemyBody, target_position: Vec3) {
    let stats = body.agent.stats;
    body.agent.target = Some(TargetRef::Player);
    let distance = body.position.distance(target_position);
    if distance <= stats.follow_distance && distance > stats.attack_distance {
        body.agent.move_direction = flatten(target_position - body.position).normalize_or_zero();
        body.agent.state = AgentState::Approaching;
    } else {
        body.agent.move_direction = Vec3::ZERO;
        body.agent.state = if distance <= stats.attack_distance {
            AgentState::Attacking
        } else {
            AgentState::Idle
        };
    }
}

fn steer(handle: PoolHandle, body: &mut EnemyBody, senses: &AgentSenses<'_>) {
    if body.agent.move_direction == Vec3::ZERO {
        body.velocity = Vec3::new(0.0, body.velocity.y, 0.0);
        return;
    }

    let avoidance = avoidance_vector(handle, body, senses);
    let direction = (body.agent.move_direction + avoidance).normalize_or_zero();
    let mut desired = direction * body.agent.stats.move_speed;
    desired.y = body.velocity.y;
    let blend = (senses.dt * senses.settings.velocity_blend_rate).min(1.0);
    body.velocity = body.velocity.lerp(desired, blend);
}

/// Normalized push away from static obstacles hit by a ray fan around the
/// body's forward axis, plus half-weighted separation from nearby agents.
fn avoidance_vector(handle: PoolHandle, body: &EnemyBody, senses: &AgentSenses<'_>) -> Vec3 {
    let settings = senses.settings;
    let forward = body.forward();
    let step = TAU / settings.probe_ray_count as f32;
    let mut avoidance = Vec3::ZERO;

    for index in 0..settings.probe_ray_count {
        let direction = Quat::from_rotation_y(step * index as f32) * forward;
        let Some(RayHit { point, distance, .. }) = senses.world.raycast_obstacles(
            body.position,
            direction,
            settings.obstacle_check_distance,
            LayerMask::OBSTACLES,
        ) else {
            continue;
        };
        let away = flatten(body.position - point).normalize_or_zero();
        avoidance += away * (1.0 - distance / settings.obstacle_check_distance);
    }

    let radius = settings.avoidance_radius;
    for (other, position) in senses.neighbors {
        if *other == handle {
            continue;
        }
        let offset = flatten(body.position - *position);
        let distance = offset.length();
        if distance > 0.0 && distance < radius {
            avoidance += offset / distance * (1.0 - distance / radius) * settings.separation_weight;
        }
    }

    avoidance.normalize_or_zero()
}
