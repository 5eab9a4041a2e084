/// Headless host: walks the player around a circle, keeps the camera on the
/// player and feeds the arena and camera to the simulation every step. It
/// also plays the host-side gameplay: an opening wave, slow player regen and
/// a kill plane at the arena edge.
pub(crate) struct HeadlessSession {
    simulation: HordeSimulation,
    arena: Arena,
    camera: OrthographicCamera,
    run: RunSettings,
    path_center: Vec3,
    since_regen: f32,
    player_died_logged: bool,
}

impl HeadlessSession {
    fn spawn_opening_wave(&mut self) {
        let center = self.simulation.player().position;
        let count = self.run.opening_wave.len().max(1) as f32;
        for (idx, name) in self.run.opening_wave.iter().enumerate() {
            let Some(template) = self.simulation.templates().template_id_by_name(name) else {
                warn!(template = %name, "opening_wave_unknown_template");
                continue;
            };
            let angle = TAU * idx as f32 / count;
            let position = center
                + Vec3::new(angle.cos(), 0.0, angle.sin()) * self.run.opening_wave_radius;
            if let Err(err) = self.simulation.spawn_enemy(template, position) {
                warn!(error = %err, template = %name, "opening_wave_spawn_failed");
            }
        }
    }

    fn regenerate_player(&mut self, dt: f32) {
        if self.run.player_regen_amount == 0 {
            return;
        }
        self.since_regen += dt;
        if self.since_regen < self.run.player_regen_interval_seconds {
            return;
        }
        self.since_regen = 0.0;
        self.simulation.heal(DamageTarget::Player, self.run.player_regen_amount);
    }

    /// Kills live enemies that were pushed past the arena edge.
    fn cull_out_of_bounds(&mut self) -> usize {
        let strays: Vec<PoolHandle> = self
            .simulation
            .enemies()
            .checked_out_handles()
            .into_iter()
            .filter(|handle| {
                self.simulation.enemy(*handle).is_some_and(|body| {
                    body.health.is_alive() && !self.arena.within_bounds(body.position)
                })
            })
            .collect();
        strays
            .into_iter()
            .filter(|handle| self.simulation.kill_enemy(*handle))
            .count()
    }

    fn player_path_position(&self, elapsed_seconds: f32) -> Vec3 {
        let angle = elapsed_seconds * self.run.player_path_angular_speed;
        self.path_center
            + Vec3::new(angle.cos(), 0.0, angle.sin()) * self.run.player_path_radius
    }
}

pub(crate) fn build_session(
    config: &SessionConfig,
    rng: GameRng,
) -> Result<HeadlessSession, ConfigurationError> {
    let simulation = HordeSimulation::new(config, rng)?;
    Ok(HeadlessSession {
        simulation,
        arena: Arena::new(&config.arena),
        camera: config.camera,
        run: config.run.clone(),
        path_center: config.player.spawn_position,
        since_regen: 0.0,
        player_died_logged: false,
    })
}

impl Simulation for HeadlessSession {
    fn load(&mut self) {
        let position = self.player_path_position(0.0);
        self.simulation.set_player_position(position);
        self.camera.follow(position);
        self.spawn_opening_wave();
        info!(
            templates = self.simulation.templates().len(),
            player_path_radius = self.run.player_path_radius,
            opening_wave = self.run.opening_wave.len(),
            "session_loaded"
        );
    }

    fn step(&mut self, fixed_dt_seconds: f32) -> SimCommand {
        let next = self.player_path_position(self.simulation.now() + fixed_dt_seconds);
        if self.simulation.player().health.is_alive() {
            self.simulation.set_player_position(next);
            self.camera.follow(next);
            self.regenerate_player(fixed_dt_seconds);
        }
        let culled = self.cull_out_of_bounds();
        if culled > 0 {
            debug!(culled, "session_out_of_bounds_culled");
        }

        let host = HostView {
            world: &self.arena,
            viewport: &self.camera,
        };
        self.simulation.tick(fixed_dt_seconds, host);

        for event in self.simulation.take_events() {
            log_event(&event);
        }
        let counts = self.simulation.last_tick_counts();
        if counts.player_died > 0 && !self.player_died_logged {
            self.player_died_logged = true;
            warn!(
                elapsed_seconds = self.simulation.now(),
                kills = self.simulation.totals().kills,
                "session_player_down"
            );
        }
        SimCommand::Continue
    }

    fn telemetry(&self) -> SimTelemetry {
        self.simulation.telemetry()
    }

    fn unload(&mut self) {
        let totals = self.simulation.totals();
        let director = self.simulation.director().snapshot();
        info!(
            wave = director.wave,
            census_active = director.census_active,
            view_half_width = director.view_half_extents.x,
            view_half_height = director.view_half_extents.y,
            spawned = totals.spawned,
            kills = totals.kills,
            released = totals.released,
            failed_placements = totals.failed_placements,
            projectiles_fired = totals.projectiles_fired,
            effects_spawned = totals.effects_spawned,
            player_health = self.simulation.player().health.current(),
            "session_unloaded"
        );
    }
}

fn log_event(event: &GameplayEvent) {
    match event {
        GameplayEvent::Spawned {
            enemy,
            template,
            position,
            wave,
            max_health,
        } => debug!(
            enemy = enemy.index(),
            template = template.0,
            x = position.x,
            z = position.z,
            wave,
            max_health,
            "event_spawned"
        ),
        GameplayEvent::Attacked {
            enemy,
            position,
            damage,
        } => debug!(
            enemy = enemy.index(),
            x = position.x,
            z = position.z,
            damage,
            "event_attacked"
        ),
        GameplayEvent::Damaged {
            target,
            position,
            amount,
            is_critical,
            current,
            max,
        } => debug!(
            target = ?target,
            x = position.x,
            z = position.z,
            amount,
            is_critical,
            current,
            max,
            "event_damaged"
        ),
        GameplayEvent::Healed {
            target,
            amount,
            current,
            max,
        } => debug!(target = ?target, amount, current, max, "event_healed"),
        GameplayEvent::Died { target, position } => {
            debug!(target = ?target, x = position.x, z = position.z, "event_died")
        }
        GameplayEvent::EnemyKilled {
            enemy,
            template,
            position,
        } => debug!(
            enemy = enemy.index(),
            template = ?template,
            x = position.x,
            z = position.z,
            "event_enemy_killed"
        ),
        GameplayEvent::EnemyReleased { enemy } => {
            debug!(enemy = enemy.index(), "event_enemy_released")
        }
        GameplayEvent::PlacementFailed {
            no_ground,
            occupied,
            on_screen,
        } => debug!(no_ground, occupied, on_screen, "event_placement_failed"),
        GameplayEvent::ProjectileFired {
            projectile,
            origin,
            direction,
        } => debug!(
            projectile = projectile.index(),
            x = origin.x,
            z = origin.z,
            dir_x = direction.x,
            dir_z = direction.z,
            "event_projectile_fired"
        ),
        GameplayEvent::ProjectileHit {
            projectile,
            target,
            position,
        } => debug!(
            projectile = projectile.index(),
            target = ?target,
            x = position.x,
            z = position.z,
            "event_projectile_hit"
        ),
        GameplayEvent::ProjectileExpired {
            projectile,
            position,
            blocked,
        } => debug!(
            projectile = projectile.index(),
            x = position.x,
            z = position.z,
            blocked,
            "event_projectile_expired"
        ),
        GameplayEvent::EffectSpawned {
            effect,
            name,
            position,
        } => debug!(
            effect = effect.index(),
            name = %name,
            x = position.x,
            z = position.z,
            "event_effect_spawned"
        ),
        GameplayEvent::PlayerDied { position } => {
            debug!(x = position.x, z = position.z, "event_player_died")
        }
    }
}
