/// Session-wide random source. Seeded sessions replay identically.
pub(crate) struct GameRng {
    rng: StdRng,
    seed: Option<u64>,
}

impl GameRng {
    pub(crate) fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    pub(crate) fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            seed: None,
        }
    }

    pub(crate) fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniform in `[min, max]`; a degenerate range returns `min`.
    fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum DamageTarget {
    Player,
    Enemy(PoolHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GameplayEvent {
    Spawned {
        enemy: PoolHandle,
        template: TemplateId,
        position: Vec3,
        wave: u32,
        max_health: u32,
    },
    Attacked {
        enemy: PoolHandle,
        position: Vec3,
        damage: u32,
    },
    Damaged {
        target: DamageTarget,
        position: Vec3,
        amount: u32,
        is_critical: bool,
        current: u32,
        max: u32,
    },
    Healed {
        target: DamageTarget,
        amount: u32,
        current: u32,
        max: u32,
    },
    Died {
        target: DamageTarget,
        position: Vec3,
    },
    EnemyKilled {
        enemy: PoolHandle,
        template: Option<TemplateId>,
        position: Vec3,
    },
    EnemyReleased {
        enemy: PoolHandle,
    },
    PlacementFailed {
        no_ground: u32,
        occupied: u32,
        on_screen: u32,
    },
    ProjectileFired {
        projectile: PoolHandle,
        origin: Vec3,
        direction: Vec3,
    },
    ProjectileHit {
        projectile: PoolHandle,
        target: DamageTarget,
        position: Vec3,
    },
    ProjectileExpired {
        projectile: PoolHandle,
        position: Vec3,
        blocked: bool,
    },
    EffectSpawned {
        effect: PoolHandle,
        name: String,
        position: Vec3,
    },
    PlayerDied {
        position: Vec3,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GameplayEventKind {
    Spawned,
    Attacked,
    Damaged,
    Healed,
    Died,
    EnemyKilled,
    EnemyReleased,
    PlacementFailed,
    ProjectileFired,
    ProjectileHit,
    ProjectileExpired,
    EffectSpawned,
    PlayerDied,
}

impl GameplayEvent {
    pub(crate) fn kind(&self) -> GameplayEventKind {
        match self {
            Self::Spawned { .. } => GameplayEventKind::Spawned,
            Self::Attacked { .. } => GameplayEventKind::Attacked,
            Self::Damaged { .. } => GameplayEventKind::Damaged,
            Self::Healed { .. } => GameplayEventKind::Healed,
            Self::Died { .. } => GameplayEventKind::Died,
            Self::EnemyKilled { .. } => GameplayEventKind::EnemyKilled,
            Self::EnemyReleased { .. } => GameplayEventKind::EnemyReleased,
            Self::PlacementFailed { .. } => GameplayEventKind::PlacementFailed,
            Self::ProjectileFired { .. } => GameplayEventKind::ProjectileFired,
            Self::ProjectileHit { .. } => GameplayEventKind::ProjectileHit,
            Self::ProjectileExpired { .. } => GameplayEventKind::ProjectileExpired,
            Self::EffectSpawned { .. } => GameplayEventKind::EffectSpawned,
            Self::PlayerDied { .. } => GameplayEventKind::PlayerDied,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct GameplayEventCounts {
    pub(crate) total: u32,
    pub(crate) spawned: u32,
    pub(crate) attacked: u32,
    pub(crate) damaged: u32,
    pub(crate) healed: u32,
    pub(crate) died: u32,
    pub(crate) enemy_killed: u32,
    pub(crate) enemy_released: u32,
    pub(crate) placement_failed: u32,
    pub(crate) projectile_fired: u32,
    pub(crate) projectile_hit: u32,
    pub(crate) projectile_expired: u32,
    pub(crate) effect_spawned: u32,
    pub(crate) player_died: u32,
}

impl GameplayEventCounts {
    fn record(&mut self, kind: GameplayEventKind) {
        self.total = self.total.saturating_add(1);
        let slot = match kind {
            GameplayEventKind::Spawned => &mut self.spawned,
            GameplayEventKind::Attacked => &mut self.attacked,
            GameplayEventKind::Damaged => &mut self.damaged,
            GameplayEventKind::Healed => &mut self.healed,
            GameplayEventKind::Died => &mut self.died,
            GameplayEventKind::EnemyKilled => &mut self.enemy_killed,
            GameplayEventKind::EnemyReleased => &mut self.enemy_released,
            GameplayEventKind::PlacementFailed => &mut self.placement_failed,
            GameplayEventKind::ProjectileFired => &mut self.projectile_fired,
            GameplayEventKind::ProjectileHit => &mut self.projectile_hit,
            GameplayEventKind::ProjectileExpired => &mut self.projectile_expired,
            GameplayEventKind::EffectSpawned => &mut self.effect_spawned,
            GameplayEventKind::PlayerDied => &mut self.player_died,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Events collect during a tick and are published at rollover; the host
/// drains the published batch before the next rollover replaces it.
#[derive(Default)]
pub(crate) struct GameplayEventBus {
    current_tick_events: Vec<GameplayEvent>,
    published: Vec<GameplayEvent>,
    last_tick_counts: GameplayEventCounts,
}

impl GameplayEventBus {
    fn emit(&mut self, event: GameplayEvent) {
        self.current_tick_events.push(event);
    }

    fn finish_tick_rollover(&mut self) {
        let mut counts = GameplayEventCounts::default();
        for event in &self.current_tick_events {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
        self.published = std::mem::take(&mut self.current_tick_events);
    }

    fn take_published(&mut self) -> Vec<GameplayEvent> {
        std::mem::take(&mut self.published)
    }

    fn last_tick_counts(&self) -> GameplayEventCounts {
        self.last_tick_counts
    }
}

/// Cumulative counters since session start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SimTotals {
    pub(crate) spawned: u64,
    pub(crate) failed_placements: u64,
    pub(crate) kills: u64,
    pub(crate) released: u64,
    pub(crate) projectiles_fired: u64,
    pub(crate) effects_spawned: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EnemyPrefab {
    pub(crate) prefab: String,
    pub(crate) health: HealthSettings,
}

impl PoolTemplate for EnemyPrefab {
    type Instance = EnemyBody;

    fn instantiate(&self) -> EnemyBody {
        EnemyBody {
            prefab: self.prefab.clone(),
            template: None,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            kinematic: true,
            collision_enabled: false,
            health: Health::new(self.health),
            agent: Agent::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EnemyBody {
    pub(crate) prefab: String,
    pub(crate) template: Option<TemplateId>,
    pub(crate) position: Vec3,
    pub(crate) orientation: Quat,
    pub(crate) velocity: Vec3,
    /// Frozen bodies ignore velocity integration.
    pub(crate) kinematic: bool,
    pub(crate) collision_enabled: bool,
    pub(crate) health: Health,
    pub(crate) agent: Agent,
}

impl EnemyBody {
    fn is_targetable(&self) -> bool {
        self.collision_enabled && self.health.is_alive()
    }

    fn forward(&self) -> Vec3 {
        self.orientation * Vec3::Z
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProjectilePrefab;

impl PoolTemplate for ProjectilePrefab {
    type Instance = ProjectileBody;

    fn instantiate(&self) -> ProjectileBody {
        ProjectileBody::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct ProjectileBody {
    pub(crate) position: Vec3,
    pub(crate) direction: Vec3,
    pub(crate) speed: f32,
    pub(crate) damage: u32,
    pub(crate) fired_at: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EffectPrefab;

impl PoolTemplate for EffectPrefab {
    type Instance = EffectBody;

    fn instantiate(&self) -> EffectBody {
        EffectBody::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EffectBody {
    pub(crate) name: String,
    pub(crate) position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeferredAction {
    ReleaseEnemy(PoolHandle),
    ReleaseEffect(PoolHandle),
}

/// Host collaborators lent to the simulation for one tick.
#[derive(Clone, Copy)]
pub(crate) struct HostView<'a> {
    pub(crate) world: &'a dyn WorldQueries,
    pub(crate) viewport: &'a dyn ViewportProjector,
}

fn flatten(vector: Vec3) -> Vec3 {
    Vec3::new(vector.x, 0.0, vector.z)
}

fn yaw_towards(direction: Vec3) -> Option<Quat> {
    let flat = flatten(direction);
    if flat.length_squared() <= f32::EPSILON {
        return None;
    }
    Some(Quat::from_rotation_y(flat.x.atan2(flat.z)))
}
