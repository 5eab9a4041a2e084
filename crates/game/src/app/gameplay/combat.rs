/// Player auto-fire state. Retargets on an interval and fires at the current
/// target whenever the cooldown allows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct AutoWeapon {
    pub(crate) target: Option<PoolHandle>,
    last_target_check: Option<f32>,
    last_shot: Option<f32>,
}

impl AutoWeapon {
    fn check_due(&self, now: f32, interval: f32) -> bool {
        self.last_target_check
            .map_or(true, |last| now - last >= interval)
    }

    fn ready_to_fire(&self, now: f32, cooldown: f32) -> bool {
        self.last_shot.map_or(true, |last| now - last >= cooldown)
    }
}

fn closest_enemy_within(
    enemies: &PoolManager<EnemyPrefab>,
    origin: Vec3,
    range: f32,
) -> Option<PoolHandle> {
    enemies
        .iter_checked_out()
        .filter(|(_, body)| body.is_targetable())
        .map(|(handle, body)| (handle, flatten(body.position - origin).length()))
        .filter(|(_, distance)| *distance <= range)
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(handle, _)| handle)
}

/// Parameter along `start..end` of the point closest to `point` on the XZ
/// plane, and the distance at that point.
fn closest_on_segment(start: Vec3, end: Vec3, point: Vec3) -> (f32, f32) {
    let segment = flatten(end - start);
    let to_point = flatten(point - start);
    let length_squared = segment.length_squared();
    let t = if length_squared <= f32::EPSILON {
        0.0
    } else {
        (to_point.dot(segment) / length_squared).clamp(0.0, 1.0)
    };
    (t, (to_point - segment * t).length())
}

impl HordeSimulation {
    /// Launches a pooled projectile from `origin` along the flattened
    /// `direction`. Returns `None` for a zero direction.
    pub(crate) fn fire_projectile(&mut self, origin: Vec3, direction: Vec3) -> Option<PoolHandle> {
        let direction = flatten(direction).normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }
        let handle = match self.projectiles.checkout(&self.config.pools.projectile_tag) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(error = %err, "projectile_checkout_failed");
                return None;
            }
        };
        if let Some(body) = self.projectiles.get_mut(handle) {
            *body = ProjectileBody {
                position: origin,
                direction,
                speed: self.config.projectile.speed,
                damage: self.config.projectile.damage,
                fired_at: self.now,
            };
        }
        self.totals.projectiles_fired += 1;
        self.events.emit(GameplayEvent::ProjectileFired {
            projectile: handle,
            origin,
            direction,
        });
        Some(handle)
    }

    fn step_weapon(&mut self) {
        let settings = &self.config.weapon;
        if !settings.auto_fire || !self.player.health.is_alive() {
            return;
        }
        let origin = self.player.position + Vec3::Y * settings.muzzle_height;
        let range = settings.targeting_range;

        if self.weapon.check_due(self.now, settings.target_check_interval) {
            self.weapon.last_target_check = Some(self.now);
            self.weapon.target = closest_enemy_within(&self.enemies, origin, range);
        }

        let target_position = self.weapon.target.and_then(|handle| {
            if !self.enemies.is_checked_out(handle) {
                return None;
            }
            self.enemies
                .get(handle)
                .filter(|body| body.is_targetable())
                .map(|body| body.position)
                .filter(|position| flatten(*position - origin).length() <= range)
        });
        let Some(target_position) = target_position else {
            self.weapon.target = None;
            return;
        };

        if !self.weapon.ready_to_fire(self.now, settings.cooldown) {
            return;
        }
        if self.fire_projectile(origin, target_position - origin).is_some() {
            self.weapon.last_shot = Some(self.now);
        }
    }

    fn step_projectiles(&mut self, dt: f32, world: &dyn WorldQueries) {
        let lifetime = self.config.projectile.lifetime;
        let hit_radius = self.config.projectile.hit_radius;

        for handle in self.projectiles.checked_out_handles() {
            let Some(projectile) = self.projectiles.get(handle).copied() else {
                continue;
            };
            if self.now - projectile.fired_at >= lifetime {
                self.expire_projectile(handle, projectile.position, false);
                continue;
            }

            let step = projectile.speed * dt;
            let blocked = world
                .raycast_obstacles(
                    projectile.position,
                    projectile.direction,
                    step,
                    LayerMask::OBSTACLES,
                )
                .filter(|hit| hit.class.blocks_projectiles());
            let travel = blocked.map_or(step, |hit| hit.distance);
            let end = projectile.position + projectile.direction * travel;

            let struck = self
                .enemies
                .iter_checked_out()
                .filter(|(_, body)| body.is_targetable())
                .filter_map(|(enemy, body)| {
                    let (t, distance) = closest_on_segment(projectile.position, end, body.position);
                    (distance <= hit_radius).then_some((enemy, t, body.position))
                })
                .min_by(|(_, a, _), (_, b, _)| a.total_cmp(b));

            if let Some((enemy, _, position)) = struck {
                self.projectiles.release(handle);
                let target = DamageTarget::Enemy(enemy);
                self.events.emit(GameplayEvent::ProjectileHit {
                    projectile: handle,
                    target,
                    position,
                });
                let (amount, is_critical) = self
                    .config
                    .projectile
                    .critical
                    .roll(projectile.damage, self.rng.rng_mut());
                self.apply_damage(target, amount, is_critical);
                continue;
            }

            if let Some(hit) = blocked {
                self.expire_projectile(handle, hit.point, true);
                continue;
            }
            if let Some(body) = self.projectiles.get_mut(handle) {
                body.position = end;
            }
        }
    }

    fn expire_projectile(&mut self, handle: PoolHandle, position: Vec3, blocked: bool) {
        if self.projectiles.release(handle) {
            self.events.emit(GameplayEvent::ProjectileExpired {
                projectile: handle,
                position,
                blocked,
            });
        }
    }
}
