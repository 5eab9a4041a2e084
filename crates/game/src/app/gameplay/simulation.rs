#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlayerState {
    pub(crate) position: Vec3,
    pub(crate) health: Health,
    death_reported: bool,
}

/// Authoritative gameplay state for one session: pools, director, agents,
/// combat and the deferred-release timeline. Hosts drive it with
/// [`HordeSimulation::tick`] and read events back after each rollover.
pub(crate) struct HordeSimulation {
    config: SessionConfig,
    templates: TemplateDatabase,
    enemies: PoolManager<EnemyPrefab>,
    projectiles: PoolManager<ProjectilePrefab>,
    effects: PoolManager<EffectPrefab>,
    director: SpawnDirector,
    player: PlayerState,
    weapon: AutoWeapon,
    deferred: DeferredQueue<DeferredAction>,
    events: GameplayEventBus,
    rng: GameRng,
    now: f32,
    totals: SimTotals,
}

impl HordeSimulation {
    pub(crate) fn new(config: &SessionConfig, rng: GameRng) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let templates = TemplateDatabase::from_templates(config.templates.clone())?;

        let mut enemies = PoolManager::new();
        for template in templates.templates() {
            enemies.register(
                template.pool_tag.clone(),
                EnemyPrefab {
                    prefab: template.prefab.clone(),
                    health: config.enemy_health,
                },
                config.pools.enemy_initial as usize,
            )?;
        }
        let mut projectiles = PoolManager::new();
        projectiles.register(
            config.pools.projectile_tag.clone(),
            ProjectilePrefab,
            config.pools.projectile_initial as usize,
        )?;
        let mut effects = PoolManager::new();
        effects.register(
            config.pools.effect_tag.clone(),
            EffectPrefab,
            config.pools.effect_initial as usize,
        )?;

        info!(
            seed = ?rng.seed(),
            templates = templates.len(),
            system_order = GAMEPLAY_SYSTEM_ORDER_TEXT,
            "horde_simulation_ready"
        );

        Ok(Self {
            config: config.clone(),
            templates,
            enemies,
            projectiles,
            effects,
            director: SpawnDirector::new(config.director.clone()),
            player: PlayerState {
                position: config.player.spawn_position,
                health: Health::new(config.player.health),
                death_reported: false,
            },
            weapon: AutoWeapon::default(),
            deferred: DeferredQueue::new(),
            events: GameplayEventBus::default(),
            rng,
            now: 0.0,
            totals: SimTotals::default(),
        })
    }

    /// Advances one fixed step. Systems run in a fixed order and the event
    /// batch for the step is published at the end.
    pub(crate) fn tick(&mut self, dt: f32, host: HostView<'_>) {
        self.now += dt;
        self.run_deferred();
        self.step_director(dt, host);
        self.step_agents(dt, host.world);
        self.step_weapon();
        self.step_projectiles(dt, host.world);
        self.events.finish_tick_rollover();
    }

    pub(crate) fn now(&self) -> f32 {
        self.now
    }

    pub(crate) fn totals(&self) -> SimTotals {
        self.totals
    }

    pub(crate) fn templates(&self) -> &TemplateDatabase {
        &self.templates
    }

    pub(crate) fn director(&self) -> &SpawnDirector {
        &self.director
    }

    pub(crate) fn player(&self) -> &PlayerState {
        &self.player
    }

    pub(crate) fn set_player_position(&mut self, position: Vec3) {
        self.player.position = position;
    }

    pub(crate) fn enemy(&self, handle: PoolHandle) -> Option<&EnemyBody> {
        if !self.enemies.is_checked_out(handle) {
            return None;
        }
        self.enemies.get(handle)
    }

    pub(crate) fn enemies(&self) -> &PoolManager<EnemyPrefab> {
        &self.enemies
    }

    pub(crate) fn projectiles(&self) -> &PoolManager<ProjectilePrefab> {
        &self.projectiles
    }

    pub(crate) fn effects(&self) -> &PoolManager<EffectPrefab> {
        &self.effects
    }

    pub(crate) fn last_tick_counts(&self) -> GameplayEventCounts {
        self.events.last_tick_counts()
    }

    pub(crate) fn take_events(&mut self) -> Vec<GameplayEvent> {
        self.events.take_published()
    }

    pub(crate) fn telemetry(&self) -> SimTelemetry {
        let snapshot = self.director.snapshot();
        SimTelemetry {
            elapsed_seconds: self.now,
            wave: snapshot.wave,
            spawn_interval: snapshot.spawn_interval,
            active_cap: snapshot.active_cap,
            active_enemies: self.enemies.total_active() as u32,
            active_projectiles: self.projectiles.total_active() as u32,
            active_effects: self.effects.total_active() as u32,
            spawned_total: self.totals.spawned,
            failed_placements_total: self.totals.failed_placements,
            kills_total: self.totals.kills,
            released_total: self.totals.released,
        }
    }

    /// Activates a pooled instance of `template` at `position`, scaled for
    /// the current wave.
    pub(crate) fn spawn_enemy(
        &mut self,
        template: TemplateId,
        position: Vec3,
    ) -> Result<PoolHandle, SpawnError> {
        let wave = self.director.snapshot().wave;
        let stats = self
            .templates
            .template(template)
            .ok_or(SpawnError::UnknownTemplate(template))?
            .scaled(wave);
        self.activate_enemy(SpawnOrder {
            template,
            position,
            wave,
            stats,
        })
    }

    fn activate_enemy(&mut self, order: SpawnOrder) -> Result<PoolHandle, SpawnError> {
        let Some(template) = self.templates.template(order.template) else {
            return Err(SpawnError::UnknownTemplate(order.template));
        };
        let handle = self.enemies.checkout(&template.pool_tag)?;
        let Some(body) = self.enemies.get_mut(handle) else {
            return Err(SpawnError::MissingInstance(handle));
        };
        body.activate(&order, template);

        self.totals.spawned += 1;
        debug!(
            template = %template.name,
            x = order.position.x,
            z = order.position.z,
            wave = order.wave,
            max_health = order.stats.max_health,
            "enemy_spawned"
        );
        self.events.emit(GameplayEvent::Spawned {
            enemy: handle,
            template: order.template,
            position: order.position,
            wave: order.wave,
            max_health: order.stats.max_health,
        });
        Ok(handle)
    }

    /// Routes damage through the target's health. Enemy deaths are handled
    /// exactly once, on the call that crossed zero.
    pub(crate) fn apply_damage(
        &mut self,
        target: DamageTarget,
        amount: u32,
        is_critical: bool,
    ) -> DamageOutcome {
        let now = self.now;
        let (outcome, position) = match target {
            DamageTarget::Player => (
                self.player.health.apply_damage(amount, is_critical, now),
                self.player.position,
            ),
            DamageTarget::Enemy(handle) => {
                if !self.enemies.is_checked_out(handle) {
                    return DamageOutcome::Ignored(IgnoredDamage::NotAlive);
                }
                let Some(body) = self.enemies.get_mut(handle) else {
                    return DamageOutcome::Ignored(IgnoredDamage::NotAlive);
                };
                (body.health.apply_damage(amount, is_critical, now), body.position)
            }
        };

        if let DamageOutcome::Applied {
            amount,
            is_critical,
            current,
            max,
            died,
        } = outcome
        {
            self.events.emit(GameplayEvent::Damaged {
                target,
                position,
                amount,
                is_critical,
                current,
                max,
            });
            if died {
                self.on_death(target, position);
            }
        }
        outcome
    }

    pub(crate) fn heal(&mut self, target: DamageTarget, amount: u32) -> Option<HealOutcome> {
        let outcome = match target {
            DamageTarget::Player => self.player.health.heal(amount),
            DamageTarget::Enemy(handle) => {
                if !self.enemies.is_checked_out(handle) {
                    return None;
                }
                self.enemies.get_mut(handle)?.health.heal(amount)
            }
        }?;
        self.events.emit(GameplayEvent::Healed {
            target,
            amount: outcome.amount,
            current: outcome.current,
            max: outcome.max,
        });
        Some(outcome)
    }

    /// Forces an enemy into the dead state. Returns `false` when it was
    /// already dead or not active.
    pub(crate) fn kill_enemy(&mut self, handle: PoolHandle) -> bool {
        if !self.enemies.is_checked_out(handle) {
            return false;
        }
        let Some(body) = self.enemies.get_mut(handle) else {
            return false;
        };
        if !body.health.kill() {
            return false;
        }
        let position = body.position;
        self.on_death(DamageTarget::Enemy(handle), position);
        true
    }

    fn on_death(&mut self, target: DamageTarget, position: Vec3) {
        self.events.emit(GameplayEvent::Died { target, position });
        match target {
            DamageTarget::Player => {
                if !self.player.death_reported {
                    self.player.death_reported = true;
                    info!(x = position.x, z = position.z, now = self.now, "player_died");
                    self.events.emit(GameplayEvent::PlayerDied { position });
                }
            }
            DamageTarget::Enemy(handle) => self.on_enemy_death(handle, position),
        }
    }

    fn on_enemy_death(&mut self, handle: PoolHandle, position: Vec3) {
        let Some(body) = self.enemies.get_mut(handle) else {
            return;
        };
        body.freeze_for_death();
        let template_id = body.template;

        self.totals.kills += 1;
        self.events.emit(GameplayEvent::EnemyKilled {
            enemy: handle,
            template: template_id,
            position,
        });

        let effect_name = template_id
            .and_then(|id| self.templates.template(id))
            .and_then(|template| template.hooks.death_effect.clone())
            .or_else(|| self.config.effects.default_death_effect.clone());
        if let Some(name) = effect_name {
            self.spawn_effect(name, position);
        }

        self.deferred.schedule_after(
            self.now,
            self.config.agent.death_delay,
            DeferredAction::ReleaseEnemy(handle),
        );
    }

    fn spawn_effect(&mut self, name: String, position: Vec3) {
        let handle = match self.effects.checkout(&self.config.pools.effect_tag) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(error = %err, effect = %name, "effect_checkout_failed");
                return;
            }
        };
        if let Some(body) = self.effects.get_mut(handle) {
            body.name.clone_from(&name);
            body.position = position;
        }
        self.totals.effects_spawned += 1;
        self.events.emit(GameplayEvent::EffectSpawned {
            effect: handle,
            name,
            position,
        });
        self.deferred.schedule_after(
            self.now,
            self.config.effects.lifetime,
            DeferredAction::ReleaseEffect(handle),
        );
    }

    fn run_deferred(&mut self) {
        for action in self.deferred.drain_due(self.now) {
            match action {
                DeferredAction::ReleaseEnemy(handle) => {
                    if self.enemies.release(handle) {
                        self.totals.released += 1;
                        self.events.emit(GameplayEvent::EnemyReleased { enemy: handle });
                    }
                }
                DeferredAction::ReleaseEffect(handle) => {
                    self.effects.release(handle);
                }
            }
        }
    }

    fn step_director(&mut self, dt: f32, host: HostView<'_>) {
        let inputs = DirectorInputs {
            player_position: self.player.position,
            census: &self.enemies,
            templates: &self.templates,
            host,
        };
        match self.director.tick(dt, inputs, &mut self.rng) {
            DirectorOutcome::Spawn(order) => {
                if let Err(err) = self.activate_enemy(order) {
                    warn!(error = %err, "director_spawn_failed");
                }
            }
            DirectorOutcome::PlacementExhausted(failures) => {
                self.totals.failed_placements += 1;
                self.events.emit(GameplayEvent::PlacementFailed {
                    no_ground: failures.no_ground,
                    occupied: failures.occupied,
                    on_screen: failures.on_screen,
                });
            }
            DirectorOutcome::NoTemplates => {
                debug!("director_no_templates");
            }
            DirectorOutcome::Idle | DirectorOutcome::AtCap => {}
        }
    }

    fn step_agents(&mut self, dt: f32, world: &dyn WorldQueries) {
        let neighbors: Vec<(PoolHandle, Vec3)> = self
            .enemies
            .iter_checked_out()
            .filter(|(_, body)| body.is_targetable())
            .map(|(handle, body)| (handle, body.position))
            .collect();
        let target_position = self
            .player
            .health
            .is_alive()
            .then_some(self.player.position);
        let senses = AgentSenses {
            now: self.now,
            dt,
            target_position,
            neighbors: &neighbors,
            world,
            settings: &self.config.agent,
        };

        let mut attacks = Vec::new();
        for handle in self.enemies.checked_out_handles() {
            let Some(body) = self.enemies.get_mut(handle) else {
                continue;
            };
            if let Some(attack) = update_agent(handle, body, &senses) {
                attacks.push((handle, body.position, attack));
            }
            if !body.kinematic {
                body.position += body.velocity * dt;
            }
        }

        for (enemy, position, attack) in attacks {
            self.events.emit(GameplayEvent::Attacked {
                enemy,
                position,
                damage: attack.damage,
            });
            self.apply_damage(DamageTarget::Player, attack.damage, false);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum SpawnError {
    #[error("unknown template id {0:?}")]
    UnknownTemplate(TemplateId),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("pool returned handle {0:?} without an instance")]
    MissingInstance(PoolHandle),
}
