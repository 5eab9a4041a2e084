    use std::time::Duration;

    use horde_engine::{run_headless, CriticalHit, LoopConfig, MetricsHandle, SpawnRules};

    use super::*;

    const DT: f32 = 0.25;

    struct OffScreen;

    impl ViewportProjector for OffScreen {
        fn world_to_viewport(&self, _point: Vec3) -> Vec2 {
            Vec2::new(-1.0, -1.0)
        }

        fn view_half_extents(&self) -> Vec2 {
            Vec2::new(5.0, 5.0)
        }
    }

    /// Ground everywhere, but every probe reports an enemy standing on it.
    struct CrowdedWorld;

    impl WorldQueries for CrowdedWorld {
        fn probe_ground(
            &self,
            origin_above: Vec3,
            _max_distance: f32,
            _mask: LayerMask,
        ) -> Option<GroundHit> {
            Some(GroundHit {
                point: Vec3::new(origin_above.x, 0.0, origin_above.z),
                normal: Vec3::Y,
            })
        }

        fn raycast_obstacles(
            &self,
            _origin: Vec3,
            _direction: Vec3,
            _max_distance: f32,
            _mask: LayerMask,
        ) -> Option<RayHit> {
            None
        }

        fn entities_near(&self, _point: Vec3, _radius: f32) -> Vec<EntityClass> {
            vec![EntityClass::Enemy]
        }
    }

    /// Fixed live count with no bodies in the way.
    struct FixedCensus(u32);

    impl EnemyCensus for FixedCensus {
        fn live_count(&self) -> u32 {
            self.0
        }

        fn active_by_tag(&self) -> HashMap<PoolTag, u32> {
            HashMap::new()
        }

        fn blocking_positions(&self) -> Vec<Vec3> {
            Vec::new()
        }
    }

    fn open_arena() -> Arena {
        arena_with_pillars(Vec::new())
    }

    fn arena_with_pillars(pillars: Vec<PillarSpec>) -> Arena {
        Arena::new(&ArenaSettings {
            half_size: 1000.0,
            ground_height: 0.0,
            pillars,
            hazards: Vec::new(),
        })
    }

    fn pillar(x: f32, z: f32, radius: f32) -> PillarSpec {
        PillarSpec {
            center: Vec2::new(x, z),
            radius,
        }
    }

    /// Director effectively idle, no auto-fire, deterministic damage.
    fn quiet_config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.director.base_spawn_rate = 0.001;
        config.director.spawn_rate_increase_per_minute = 0.0;
        config.weapon.auto_fire = false;
        config.projectile.critical = CriticalHit {
            chance: 0.0,
            multiplier: 2.0,
        };
        config
    }

    fn new_sim(config: &SessionConfig) -> HordeSimulation {
        HordeSimulation::new(config, GameRng::from_seed(11)).expect("simulation")
    }

    fn tick_n(
        sim: &mut HordeSimulation,
        world: &dyn WorldQueries,
        ticks: usize,
    ) -> Vec<GameplayEvent> {
        let viewport = OffScreen;
        let mut events = Vec::new();
        for _ in 0..ticks {
            sim.tick(
                DT,
                HostView {
                    world,
                    viewport: &viewport,
                },
            );
            events.extend(sim.take_events());
        }
        events
    }

    fn template_id(sim: &HordeSimulation, name: &str) -> TemplateId {
        sim.templates().template_id_by_name(name).expect("template")
    }

    fn weighted(
        name: &str,
        spawn_weight: f32,
        min_wave: u32,
        max_simultaneous: i32,
    ) -> EntityTemplate {
        EntityTemplate {
            name: name.to_string(),
            pool_tag: PoolTag::new(name),
            spawn: SpawnRules {
                min_wave,
                spawn_weight,
                max_simultaneous,
            },
            ..EntityTemplate::default()
        }
    }

    fn probe_body() -> EnemyBody {
        EnemyPrefab {
            prefab: "probe".to_string(),
            health: HealthSettings::default(),
        }
        .instantiate()
    }

    fn probe_handle() -> PoolHandle {
        let tag = PoolTag::new("probe");
        let mut pool = PoolManager::new();
        pool.register(tag.clone(), EffectPrefab, 1).expect("register");
        pool.checkout(&tag).expect("checkout")
    }

    fn count_kind(events: &[GameplayEvent], kind: GameplayEventKind) -> usize {
        events.iter().filter(|event| event.kind() == kind).count()
    }

    #[test]
    fn gameplay_system_order_text_is_stable() {
        assert_eq!(
            GAMEPLAY_SYSTEM_ORDER_TEXT,
            "Deferred>Director>Agents>Weapon>Projectiles>Rollover"
        );
    }

    #[test]
    fn difficulty_curves_match_reference_points() {
        let settings = DirectorSettings::default();
        assert_eq!(spawn_interval(&settings, 0.0), 1.0);
        assert_eq!(spawn_interval(&settings, 600.0), 0.5);
        assert_eq!(active_cap(&settings, 0.0), 50);
        assert_eq!(active_cap(&settings, 60.0), 55);
        assert_eq!(active_cap(&settings, 90.0), 57);
        assert_eq!(wave_number(&settings, 0.0), 1);
        assert_eq!(wave_number(&settings, 29.5), 1);
        assert_eq!(wave_number(&settings, 30.0), 2);
        assert_eq!(wave_number(&settings, 95.0), 4);
    }

    #[test]
    fn difficulty_never_eases_over_time() {
        let settings = DirectorSettings::default();
        let mut previous = (spawn_interval(&settings, 0.0), active_cap(&settings, 0.0), 1);
        for step in 1..=160 {
            let elapsed = step as f32 * 7.5;
            let current = (
                spawn_interval(&settings, elapsed),
                active_cap(&settings, elapsed),
                wave_number(&settings, elapsed),
            );
            assert!(current.0 <= previous.0, "interval grew at {elapsed}");
            assert!(current.1 >= previous.1, "cap shrank at {elapsed}");
            assert!(current.2 >= previous.2, "wave went back at {elapsed}");
            previous = current;
        }
    }

    #[test]
    fn weighted_selection_follows_relative_weights() {
        let templates = TemplateDatabase::from_templates(vec![
            weighted("light", 1.0, 1, -1),
            weighted("heavy", 3.0, 1, -1),
        ])
        .expect("templates");
        let light = templates.template_id_by_name("light").expect("light");
        let heavy = templates.template_id_by_name("heavy").expect("heavy");
        let mut rng = StdRng::seed_from_u64(7);
        let active = HashMap::new();

        let (mut light_count, mut heavy_count) = (0u32, 0u32);
        for _ in 0..40_000 {
            match select_template(&templates, 1, &active, &mut rng) {
                Some(id) if id == light => light_count += 1,
                Some(id) if id == heavy => heavy_count += 1,
                other => panic!("unexpected pick {other:?}"),
            }
        }
        let ratio = heavy_count as f32 / light_count as f32;
        assert!((2.85..=3.15).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn capped_template_is_skipped_while_others_are_eligible() {
        let templates = TemplateDatabase::from_templates(vec![
            weighted("capped", 1.0, 1, 2),
            weighted("open", 1.0, 1, -1),
        ])
        .expect("templates");
        let open = templates.template_id_by_name("open").expect("open");
        let active = HashMap::from([(PoolTag::new("capped"), 2)]);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..200 {
            assert_eq!(select_template(&templates, 1, &active, &mut rng), Some(open));
        }
    }

    #[test]
    fn selection_falls_back_to_all_templates_when_none_are_eligible() {
        let templates = TemplateDatabase::from_templates(vec![
            weighted("capped", 1.0, 1, 2),
            weighted("late", 1.0, 5, -1),
        ])
        .expect("templates");
        let capped = templates.template_id_by_name("capped").expect("capped");
        let late = templates.template_id_by_name("late").expect("late");
        let active = HashMap::from([(PoolTag::new("capped"), 2)]);
        let mut rng = StdRng::seed_from_u64(5);

        let picks: Vec<_> = (0..200)
            .filter_map(|_| select_template(&templates, 1, &active, &mut rng))
            .collect();
        assert_eq!(picks.len(), 200);
        assert!(picks.contains(&capped));
        assert!(picks.contains(&late));
    }

    #[test]
    fn zero_weight_templates_are_never_drawn() {
        let templates = TemplateDatabase::from_templates(vec![
            weighted("ghost", 0.0, 1, -1),
            weighted("real", 1.0, 1, -1),
        ])
        .expect("templates");
        let real = templates.template_id_by_name("real").expect("real");
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..500 {
            assert_eq!(
                select_template(&templates, 1, &HashMap::new(), &mut rng),
                Some(real)
            );
        }

        let all_zero = TemplateDatabase::from_templates(vec![
            weighted("first", 0.0, 1, -1),
            weighted("second", 0.0, 1, -1),
        ])
        .expect("templates");
        let first = all_zero.template_id_by_name("first").expect("first");
        assert_eq!(
            select_template(&all_zero, 1, &HashMap::new(), &mut rng),
            Some(first)
        );
    }

    #[test]
    fn first_wave_only_draws_templates_unlocked_at_wave_one() {
        let templates = TemplateDatabase::from_templates(crate::app::config::builtin_templates())
            .expect("templates");
        let grunt = templates.template_id_by_name("grunt").expect("grunt");
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..300 {
            assert_eq!(
                select_template(&templates, 1, &HashMap::new(), &mut rng),
                Some(grunt)
            );
        }
    }

    #[test]
    fn spawn_search_only_returns_off_screen_points() {
        let settings = DirectorSettings::default();
        let arena = open_arena();
        let mut camera = OrthographicCamera::new(10.0, 16.0 / 9.0);
        camera.follow(Vec3::ZERO);
        let host = HostView {
            world: &arena,
            viewport: &camera,
        };

        let mut found = 0;
        for seed in 0..500 {
            let mut rng = GameRng::from_seed(seed);
            if let Ok(point) = search_spawn_position(&settings, Vec3::ZERO, &[], host, &mut rng) {
                found += 1;
                assert!(!camera.is_on_screen(point), "seed {seed} gave {point}");
                assert!(point.length() >= settings.min_spawn_distance - 1e-3);
                assert_eq!(point.y, 0.0);
            }
        }
        assert_eq!(found, 500);
    }

    #[test]
    fn spawn_search_gives_up_when_view_covers_the_ring() {
        let settings = DirectorSettings::default();
        let arena = open_arena();
        let camera = OrthographicCamera::new(1000.0, 1.0);
        let host = HostView {
            world: &arena,
            viewport: &camera,
        };
        let mut rng = GameRng::from_seed(1);

        assert_eq!(
            search_spawn_position(&settings, Vec3::ZERO, &[], host, &mut rng),
            Err(PlacementFailures {
                no_ground: 0,
                occupied: 0,
                on_screen: settings.placement_attempts,
            })
        );
    }

    #[test]
    fn spawn_search_reports_missing_ground_and_occupancy() {
        let settings = DirectorSettings::default();
        let mut rng = GameRng::from_seed(2);

        let tiny = Arena::new(&ArenaSettings {
            half_size: 5.0,
            ..ArenaSettings::default()
        });
        let host = HostView {
            world: &tiny,
            viewport: &OffScreen,
        };
        let failures = search_spawn_position(&settings, Vec3::ZERO, &[], host, &mut rng)
            .expect_err("nothing to stand on");
        assert_eq!(failures.no_ground, settings.placement_attempts);

        let host = HostView {
            world: &CrowdedWorld,
            viewport: &OffScreen,
        };
        let failures = search_spawn_position(&settings, Vec3::ZERO, &[], host, &mut rng)
            .expect_err("everything occupied");
        assert_eq!(failures.occupied, settings.placement_attempts);
    }

    #[test]
    fn director_stops_at_census_cap_until_count_drops() {
        let settings = DirectorSettings {
            base_max_enemies: 2,
            max_enemies_increase_per_minute: 0.0,
            spawn_rate_increase_per_minute: 0.0,
            ..DirectorSettings::default()
        };
        let templates = TemplateDatabase::from_templates(crate::app::config::builtin_templates())
            .expect("templates");
        let arena = open_arena();
        let host = HostView {
            world: &arena,
            viewport: &OffScreen,
        };
        let mut director = SpawnDirector::new(settings);
        let mut rng = GameRng::from_seed(4);

        let live_counts = [0, 0, 1, 1, 2, 2, 2, 1];
        let mut outcomes = Vec::new();
        for live in live_counts {
            let inputs = DirectorInputs {
                player_position: Vec3::ZERO,
                census: &FixedCensus(live),
                templates: &templates,
                host,
            };
            let outcome = director.tick(0.5, inputs, &mut rng);
            outcomes.push(match outcome {
                DirectorOutcome::Idle => "idle",
                DirectorOutcome::AtCap => "cap",
                DirectorOutcome::Spawn(_) => "spawn",
                other => panic!("unexpected outcome {other:?}"),
            });
        }
        assert_eq!(
            outcomes,
            vec!["idle", "spawn", "idle", "spawn", "idle", "cap", "cap", "spawn"]
        );
    }

    #[test]
    fn failed_placement_still_restarts_the_spawn_timer() {
        let templates = TemplateDatabase::from_templates(crate::app::config::builtin_templates())
            .expect("templates");
        let host = HostView {
            world: &CrowdedWorld,
            viewport: &OffScreen,
        };
        let mut director = SpawnDirector::new(DirectorSettings {
            spawn_rate_increase_per_minute: 0.0,
            ..DirectorSettings::default()
        });
        let mut rng = GameRng::from_seed(8);

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            let inputs = DirectorInputs {
                player_position: Vec3::ZERO,
                census: &FixedCensus(0),
                templates: &templates,
                host,
            };
            outcomes.push(match director.tick(0.5, inputs, &mut rng) {
                DirectorOutcome::Idle => "idle",
                DirectorOutcome::PlacementExhausted(_) => "exhausted",
                other => panic!("unexpected outcome {other:?}"),
            });
        }
        assert_eq!(
            outcomes,
            vec!["idle", "exhausted", "idle", "exhausted", "idle"]
        );
    }

    #[test]
    fn empty_template_list_never_spawns() {
        let templates = TemplateDatabase::from_templates(Vec::new()).expect("empty is valid");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(select_template(&templates, 1, &HashMap::new(), &mut rng), None);

        let arena = open_arena();
        let host = HostView {
            world: &arena,
            viewport: &OffScreen,
        };
        let mut director = SpawnDirector::new(DirectorSettings {
            spawn_rate_increase_per_minute: 0.0,
            ..DirectorSettings::default()
        });
        let mut rng = GameRng::from_seed(2);
        let mut outcomes = Vec::new();
        for _ in 0..4 {
            let inputs = DirectorInputs {
                player_position: Vec3::ZERO,
                census: &FixedCensus(0),
                templates: &templates,
                host,
            };
            outcomes.push(director.tick(0.5, inputs, &mut rng));
        }
        assert_eq!(
            outcomes,
            vec![
                DirectorOutcome::Idle,
                DirectorOutcome::NoTemplates,
                DirectorOutcome::Idle,
                DirectorOutcome::NoTemplates,
            ]
        );
        assert_eq!(director.snapshot().census_active, 0);
    }

    #[test]
    fn simultaneous_cap_counts_every_template_on_the_tag() {
        let shared = |name: &str, max_simultaneous: i32| EntityTemplate {
            pool_tag: PoolTag::new("Enemy"),
            ..weighted(name, 1.0, 1, max_simultaneous)
        };
        let mut config = quiet_config();
        config.templates = vec![shared("capped", 2), shared("open", -1)];
        let mut sim = new_sim(&config);
        let capped = template_id(&sim, "capped");
        let open = template_id(&sim, "open");
        sim.spawn_enemy(capped, Vec3::new(40.0, 0.0, 0.0))
            .expect("capped");
        sim.spawn_enemy(open, Vec3::new(-40.0, 0.0, 0.0))
            .expect("open");

        let counts = sim.enemies().active_by_tag();
        assert_eq!(counts.get(&PoolTag::new("Enemy")), Some(&2));
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..1000 {
            assert_eq!(select_template(sim.templates(), 1, &counts, &mut rng), Some(open));
        }
    }

    #[test]
    fn census_remembers_spawns_until_the_next_count() {
        let settings = DirectorSettings {
            spawn_rate_increase_per_minute: 0.0,
            census_interval: 10.0,
            ..DirectorSettings::default()
        };
        let capped = EntityTemplate {
            pool_tag: PoolTag::new("Enemy"),
            ..weighted("capped", 1.0, 1, 1)
        };
        let open = EntityTemplate {
            pool_tag: PoolTag::new("Enemy"),
            ..weighted("open", 0.001, 1, -1)
        };
        let templates = TemplateDatabase::from_templates(vec![capped, open]).expect("templates");
        let capped = templates.template_id_by_name("capped").expect("capped");
        let arena = open_arena();
        let host = HostView {
            world: &arena,
            viewport: &OffScreen,
        };
        let mut director = SpawnDirector::new(settings);
        let mut rng = GameRng::from_seed(6);

        let mut spawned = Vec::new();
        for _ in 0..8 {
            let inputs = DirectorInputs {
                player_position: Vec3::ZERO,
                census: &FixedCensus(0),
                templates: &templates,
                host,
            };
            if let DirectorOutcome::Spawn(order) = director.tick(0.5, inputs, &mut rng) {
                spawned.push(order.template);
            }
        }
        assert_eq!(spawned.len(), 4);
        let capped_spawns = spawned.iter().filter(|id| **id == capped).count();
        assert_eq!(capped_spawns, 1, "{spawned:?}");
    }

    #[test]
    fn oversized_weights_still_select_without_overflow() {
        let templates = TemplateDatabase::from_templates(vec![
            weighted("left", f32::MAX, 1, -1),
            weighted("right", f32::MAX, 1, -1),
            weighted("ghost", 0.0, 1, -1),
        ])
        .expect("templates");
        let ghost = templates.template_id_by_name("ghost").expect("ghost");
        let mut rng = StdRng::seed_from_u64(12);
        let picks: Vec<_> = (0..400)
            .map(|_| select_template(&templates, 1, &HashMap::new(), &mut rng).expect("pick"))
            .collect();
        assert!(!picks.contains(&ghost));
        let left = picks
            .iter()
            .filter(|id| Some(**id) == templates.template_id_by_name("left"))
            .count();
        assert!((100..=300).contains(&left), "left picked {left} times");
    }

    #[test]
    fn seeded_sessions_spawn_identically() {
        let mut config = SessionConfig::default();
        config.weapon.auto_fire = false;
        let arena = open_arena();

        let spawn_positions = |seed: u64| {
            let mut sim = HordeSimulation::new(&config, GameRng::from_seed(seed)).expect("sim");
            tick_n(&mut sim, &arena, 40)
                .into_iter()
                .filter_map(|event| match event {
                    GameplayEvent::Spawned { position, .. } => Some(position),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };

        let first = spawn_positions(99);
        assert!(!first.is_empty());
        assert_eq!(first, spawn_positions(99));
        assert_ne!(first, spawn_positions(100));
    }

    #[test]
    fn killed_enemy_is_released_after_death_delay() {
        let mut sim = new_sim(&quiet_config());
        let arena = open_arena();
        let grunt = template_id(&sim, "grunt");
        let handle = sim
            .spawn_enemy(grunt, Vec3::new(50.0, 0.0, 50.0))
            .expect("spawn");

        let mut events = tick_n(&mut sim, &arena, 20);
        assert_eq!(sim.now(), 5.0);
        assert!(sim.kill_enemy(handle));
        assert!(!sim.kill_enemy(handle));
        assert_eq!(
            sim.apply_damage(DamageTarget::Enemy(handle), 10, false),
            DamageOutcome::Ignored(IgnoredDamage::NotAlive)
        );

        events.extend(tick_n(&mut sim, &arena, 3));
        assert_eq!(sim.now(), 5.75);
        let body = sim.enemy(handle).expect("still active while dying");
        assert!(body.kinematic);
        assert!(!body.collision_enabled);
        assert_eq!(body.agent.state, AgentState::Dead);
        assert_eq!(sim.effects().total_active(), 1);

        events.extend(tick_n(&mut sim, &arena, 1));
        assert!(!sim.enemies().is_checked_out(handle));
        assert!(sim.enemy(handle).is_none());
        assert_eq!(count_kind(&events, GameplayEventKind::EnemyKilled), 1);
        assert_eq!(count_kind(&events, GameplayEventKind::EnemyReleased), 1);
        assert_eq!(sim.totals().kills, 1);
        assert_eq!(sim.totals().released, 1);

        tick_n(&mut sim, &arena, 4);
        assert_eq!(sim.now(), 7.0);
        assert_eq!(sim.effects().total_active(), 0);
    }

    #[test]
    fn lethal_damage_reports_death_once() {
        let mut sim = new_sim(&quiet_config());
        let arena = open_arena();
        let grunt = template_id(&sim, "grunt");
        let handle = sim
            .spawn_enemy(grunt, Vec3::new(50.0, 0.0, 50.0))
            .expect("spawn");
        let target = DamageTarget::Enemy(handle);

        assert_eq!(sim.apply_damage(target, 60, false).applied_amount(), Some(60));
        assert_eq!(
            sim.apply_damage(target, 60, false),
            DamageOutcome::Ignored(IgnoredDamage::InvulnerabilityWindow)
        );

        let mut events = tick_n(&mut sim, &arena, 2);
        assert!(sim.apply_damage(target, 60, true).died());
        assert_eq!(
            sim.apply_damage(target, 60, false),
            DamageOutcome::Ignored(IgnoredDamage::NotAlive)
        );
        events.extend(tick_n(&mut sim, &arena, 1));

        assert_eq!(count_kind(&events, GameplayEventKind::Damaged), 2);
        assert_eq!(count_kind(&events, GameplayEventKind::Died), 1);
        assert_eq!(count_kind(&events, GameplayEventKind::EnemyKilled), 1);
        assert_eq!(count_kind(&events, GameplayEventKind::EffectSpawned), 1);
    }

    #[test]
    fn template_death_effect_overrides_default() {
        let mut sim = new_sim(&quiet_config());
        let arena = open_arena();
        let brute = template_id(&sim, "brute");
        let handle = sim
            .spawn_enemy(brute, Vec3::new(40.0, 0.0, -40.0))
            .expect("spawn");
        assert!(sim.kill_enemy(handle));

        let events = tick_n(&mut sim, &arena, 1);
        let names: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                GameplayEvent::EffectSpawned { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["brute_burst"]);
    }

    #[test]
    fn released_instance_comes_back_with_fresh_state() {
        let mut config = quiet_config();
        config.pools.enemy_initial = 1;
        let mut sim = new_sim(&config);
        let arena = open_arena();
        let grunt = template_id(&sim, "grunt");

        let first = sim
            .spawn_enemy(grunt, Vec3::new(30.0, 0.0, 0.0))
            .expect("spawn");
        assert!(sim.kill_enemy(first));
        tick_n(&mut sim, &arena, 4);
        assert!(!sim.enemies().is_checked_out(first));

        let second = sim
            .spawn_enemy(grunt, Vec3::new(-30.0, 0.0, 0.0))
            .expect("respawn");
        assert_eq!(second, first);
        let tag = PoolTag::new("Grunt");
        assert_eq!(sim.enemies().created_count(&tag), 1);

        let body = sim.enemy(second).expect("active");
        assert_eq!(body.position, Vec3::new(-30.0, 0.0, 0.0));
        assert_eq!(body.health.current(), 100);
        assert!(body.health.is_alive());
        assert!(!body.kinematic);
        assert!(body.collision_enabled);
        assert_eq!(body.agent.state, AgentState::Idle);
        assert_eq!(body.template, Some(grunt));
    }

    #[test]
    fn spawning_unknown_template_is_an_error() {
        let mut sim = new_sim(&quiet_config());
        assert_eq!(
            sim.spawn_enemy(TemplateId(99), Vec3::ZERO),
            Err(SpawnError::UnknownTemplate(TemplateId(99)))
        );
    }

    #[test]
    fn shared_pool_tag_with_different_prefab_is_rejected() {
        let mut config = quiet_config();
        config.templates = vec![
            EntityTemplate {
                name: "a".to_string(),
                pool_tag: PoolTag::new("Shared"),
                prefab: "enemy_a".to_string(),
                ..EntityTemplate::default()
            },
            EntityTemplate {
                name: "b".to_string(),
                pool_tag: PoolTag::new("Shared"),
                prefab: "enemy_b".to_string(),
                ..EntityTemplate::default()
            },
        ];
        assert!(matches!(
            HordeSimulation::new(&config, GameRng::from_seed(1)),
            Err(ConfigurationError::DuplicatePoolTag { .. })
        ));
    }

    #[test]
    fn agent_closes_distance_then_attacks_on_cooldown() {
        let mut sim = new_sim(&quiet_config());
        let arena = open_arena();
        let grunt = template_id(&sim, "grunt");
        let handle = sim
            .spawn_enemy(grunt, Vec3::new(6.0, 0.0, 0.0))
            .expect("spawn");

        tick_n(&mut sim, &arena, 1);
        let body = sim.enemy(handle).expect("enemy");
        assert_eq!(body.agent.state, AgentState::Approaching);
        assert_eq!(body.position, Vec3::new(5.25, 0.0, 0.0));

        let events = tick_n(&mut sim, &arena, 7);
        let body = sim.enemy(handle).expect("enemy");
        assert_eq!(body.agent.state, AgentState::Attacking);
        assert_eq!(body.position, Vec3::new(1.5, 0.0, 0.0));
        assert_eq!(count_kind(&events, GameplayEventKind::Attacked), 1);
        assert_eq!(sim.player().health.current(), 90);
    }

    #[test]
    fn agents_outside_follow_distance_stay_idle() {
        let mut sim = new_sim(&quiet_config());
        let arena = open_arena();
        let grunt = template_id(&sim, "grunt");
        let handle = sim
            .spawn_enemy(grunt, Vec3::new(0.0, 0.0, 12.0))
            .expect("spawn");

        tick_n(&mut sim, &arena, 4);
        let body = sim.enemy(handle).expect("enemy");
        assert_eq!(body.agent.state, AgentState::Idle);
        assert_eq!(body.agent.target, Some(TargetRef::Player));
        assert_eq!(body.position, Vec3::new(0.0, 0.0, 12.0));
    }

    #[test]
    fn crowded_agents_separate_sideways() {
        let mut sim = new_sim(&quiet_config());
        let arena = open_arena();
        let grunt = template_id(&sim, "grunt");
        let upper = sim
            .spawn_enemy(grunt, Vec3::new(5.0, 0.0, 0.25))
            .expect("spawn");
        let lower = sim
            .spawn_enemy(grunt, Vec3::new(5.0, 0.0, -0.25))
            .expect("spawn");

        tick_n(&mut sim, &arena, 1);
        assert!(sim.enemy(upper).expect("upper").velocity.z > 0.0);
        assert!(sim.enemy(lower).expect("lower").velocity.z < 0.0);
    }

    #[test]
    fn obstacle_ahead_pushes_avoidance_backwards() {
        let body = probe_body();
        let arena = arena_with_pillars(vec![pillar(0.0, 1.5, 0.5)]);
        let settings = AgentSettings::default();
        let senses = AgentSenses {
            now: 0.0,
            dt: DT,
            target_position: None,
            neighbors: &[],
            world: &arena,
            settings: &settings,
        };

        let push = avoidance_vector(probe_handle(), &body, &senses);
        assert!(push.z < -0.99, "push {push}");
        assert!(push.x.abs() < 1e-4);
    }

    #[test]
    fn losing_the_target_stops_horizontal_motion() {
        let mut body = probe_body();
        body.velocity = Vec3::new(3.0, -1.0, 2.0);
        body.agent.state = AgentState::Approaching;
        body.agent.move_direction = Vec3::X;
        let arena = open_arena();
        let settings = AgentSettings::default();
        let senses = AgentSenses {
            now: 1.0,
            dt: DT,
            target_position: None,
            neighbors: &[],
            world: &arena,
            settings: &settings,
        };
        assert_eq!(update_agent(probe_handle(), &mut body, &senses), None);
        assert_eq!(body.velocity, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(body.agent.state, AgentState::Idle);
        assert_eq!(body.agent.move_direction, Vec3::ZERO);
    }

    #[test]
    fn projectile_hits_enemy_in_its_path() {
        let mut sim = new_sim(&quiet_config());
        let arena = open_arena();
        let grunt = template_id(&sim, "grunt");
        let handle = sim
            .spawn_enemy(grunt, Vec3::new(0.0, 0.0, 3.0))
            .expect("spawn");
        let projectile = sim.fire_projectile(Vec3::ZERO, Vec3::Z).expect("fired");

        let events = tick_n(&mut sim, &arena, 1);
        assert!(events.iter().any(|event| matches!(
            event,
            GameplayEvent::ProjectileHit { projectile: p, target: DamageTarget::Enemy(e), .. }
                if *p == projectile && *e == handle
        )));
        assert_eq!(sim.enemy(handle).expect("enemy").health.current(), 90);
        assert_eq!(sim.projectiles().total_active(), 0);
    }

    #[test]
    fn projectile_expires_after_lifetime() {
        let mut sim = new_sim(&quiet_config());
        let arena = open_arena();
        assert!(sim.fire_projectile(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0)).is_none());
        sim.fire_projectile(Vec3::ZERO, Vec3::X).expect("fired");

        tick_n(&mut sim, &arena, 19);
        assert_eq!(sim.projectiles().total_active(), 1);
        let events = tick_n(&mut sim, &arena, 1);
        assert_eq!(sim.projectiles().total_active(), 0);
        assert!(events.iter().any(|event| matches!(
            event,
            GameplayEvent::ProjectileExpired { blocked: false, .. }
        )));
    }

    #[test]
    fn pillar_stops_projectile_at_its_surface() {
        let mut sim = new_sim(&quiet_config());
        let arena = arena_with_pillars(vec![pillar(0.0, 3.0, 1.0)]);
        let projectile = sim.fire_projectile(Vec3::ZERO, Vec3::Z).expect("fired");

        let events = tick_n(&mut sim, &arena, 1);
        assert!(events.contains(&GameplayEvent::ProjectileExpired {
            projectile,
            position: Vec3::new(0.0, 0.0, 2.0),
            blocked: true,
        }));
        assert_eq!(sim.projectiles().total_active(), 0);
    }

    #[test]
    fn auto_weapon_fires_at_closest_enemy_on_cooldown() {
        let mut config = quiet_config();
        config.weapon.auto_fire = true;
        let mut sim = new_sim(&config);
        let arena = open_arena();
        let grunt = template_id(&sim, "grunt");
        let near = sim
            .spawn_enemy(grunt, Vec3::new(0.0, 0.0, 8.0))
            .expect("near");
        sim.spawn_enemy(grunt, Vec3::new(0.0, 0.0, -12.0))
            .expect("far");

        let events = tick_n(&mut sim, &arena, 1);
        let directions: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                GameplayEvent::ProjectileFired { direction, .. } => Some(*direction),
                _ => None,
            })
            .collect();
        assert_eq!(directions, vec![Vec3::Z]);
        assert_eq!(sim.weapon.target, Some(near));

        tick_n(&mut sim, &arena, 1);
        assert_eq!(sim.totals().projectiles_fired, 2);
    }

    #[test]
    fn player_death_is_reported_once_and_agents_lose_interest() {
        let mut config = quiet_config();
        config.player.health = HealthSettings {
            max_health: 10,
            invulnerability_time: 0.0,
            ..HealthSettings::default()
        };
        let mut sim = new_sim(&config);
        let arena = open_arena();
        let grunt = template_id(&sim, "grunt");
        let handle = sim
            .spawn_enemy(grunt, Vec3::new(5.0, 0.0, 0.0))
            .expect("spawn");

        assert!(sim.apply_damage(DamageTarget::Player, 50, false).died());
        assert_eq!(
            sim.apply_damage(DamageTarget::Player, 50, false),
            DamageOutcome::Ignored(IgnoredDamage::NotAlive)
        );
        let events = tick_n(&mut sim, &arena, 3);

        assert_eq!(count_kind(&events, GameplayEventKind::PlayerDied), 1);
        let body = sim.enemy(handle).expect("enemy");
        assert_eq!(body.agent.target, None);
        assert_eq!(body.agent.state, AgentState::Idle);
        assert_eq!(body.position, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn heal_is_reported_and_capped() {
        let mut sim = new_sim(&quiet_config());
        let arena = open_arena();
        sim.apply_damage(DamageTarget::Player, 30, false);
        let healed = sim.heal(DamageTarget::Player, 50).expect("healed");
        assert_eq!(healed.current, 100);

        let events = tick_n(&mut sim, &arena, 1);
        assert_eq!(count_kind(&events, GameplayEventKind::Healed), 1);
    }

    #[test]
    fn event_counts_roll_over_each_tick() {
        let mut sim = new_sim(&quiet_config());
        let arena = open_arena();
        let grunt = template_id(&sim, "grunt");
        sim.spawn_enemy(grunt, Vec3::new(50.0, 0.0, 50.0))
            .expect("spawn");
        sim.fire_projectile(Vec3::ZERO, Vec3::X).expect("fired");

        let viewport = OffScreen;
        let host = HostView {
            world: &arena,
            viewport: &viewport,
        };
        sim.tick(DT, host);
        let counts = sim.last_tick_counts();
        assert_eq!(counts.spawned, 1);
        assert_eq!(counts.projectile_fired, 1);
        assert_eq!(counts.total, 2);
        assert_eq!(sim.take_events().len(), 2);
        assert!(sim.take_events().is_empty());

        sim.tick(DT, host);
        assert_eq!(sim.last_tick_counts(), GameplayEventCounts::default());
        assert!(sim.take_events().is_empty());
    }

    #[test]
    fn arena_ground_probe_respects_bounds_pillars_and_mask() {
        let arena = Arena::new(&ArenaSettings {
            half_size: 20.0,
            ground_height: 0.0,
            pillars: vec![pillar(0.0, 3.0, 1.0)],
            hazards: Vec::new(),
        });
        let above = |x: f32, z: f32| Vec3::new(x, 5.0, z);

        assert_eq!(
            arena.probe_ground(above(4.0, -2.0), 10.0, LayerMask::GROUND),
            Some(GroundHit {
                point: Vec3::new(4.0, 0.0, -2.0),
                normal: Vec3::Y,
            })
        );
        assert_eq!(arena.probe_ground(above(30.0, 0.0), 10.0, LayerMask::GROUND), None);
        assert_eq!(arena.probe_ground(above(0.0, 3.0), 10.0, LayerMask::GROUND), None);
        assert_eq!(arena.probe_ground(above(4.0, -2.0), 2.0, LayerMask::GROUND), None);
        assert_eq!(arena.probe_ground(above(4.0, -2.0), 10.0, LayerMask::OBSTACLES), None);
    }

    #[test]
    fn arena_raycast_reports_nearest_pillar() {
        let arena = arena_with_pillars(vec![pillar(0.0, 6.0, 1.0), pillar(0.0, 3.0, 1.0)]);

        let hit = arena
            .raycast_obstacles(Vec3::ZERO, Vec3::Z, 10.0, LayerMask::OBSTACLES)
            .expect("hit");
        assert_eq!(hit.distance, 2.0);
        assert_eq!(hit.point, Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(hit.class, EntityClass::Terrain);

        assert!(arena
            .raycast_obstacles(Vec3::ZERO, Vec3::Z, 1.5, LayerMask::OBSTACLES)
            .is_none());
        assert!(arena
            .raycast_obstacles(Vec3::ZERO, -Vec3::Z, 10.0, LayerMask::OBSTACLES)
            .is_none());
        assert!(arena
            .raycast_obstacles(Vec3::ZERO, Vec3::Z, 10.0, LayerMask::GROUND)
            .is_none());
    }

    #[test]
    fn arena_reports_overlapping_hazards_and_terrain() {
        let arena = Arena::new(&ArenaSettings::default());
        assert_eq!(
            arena.entities_near(Vec3::new(-30.0, 0.0, 22.0), 1.0),
            vec![EntityClass::Hazard]
        );
        assert_eq!(
            arena.entities_near(Vec3::new(12.0, 0.0, 8.0), 1.0),
            vec![EntityClass::Terrain]
        );
        assert!(arena.entities_near(Vec3::new(50.0, 0.0, 50.0), 2.0).is_empty());
    }

    #[test]
    fn opening_wave_surrounds_the_player_on_load() {
        let mut config = quiet_config();
        config.run.opening_wave = vec!["grunt".to_string(), "brute".to_string()];
        config.run.opening_wave_radius = 20.0;
        let mut session = build_session(&config, GameRng::from_seed(3)).expect("session");
        session.load();

        let player = session.simulation.player().position;
        let handles = session.simulation.enemies().checked_out_handles();
        assert_eq!(handles.len(), 2);
        for handle in handles {
            let body = session.simulation.enemy(handle).expect("active");
            assert!((body.position.distance(player) - 20.0).abs() < 1e-3);
        }
        assert_eq!(session.simulation.totals().spawned, 2);
    }

    #[test]
    fn session_regenerates_player_health_on_interval() {
        let mut config = quiet_config();
        config.run.player_regen_amount = 10;
        config.run.player_regen_interval_seconds = 0.5;
        let mut session = build_session(&config, GameRng::from_seed(3)).expect("session");
        session.load();
        let max = session.simulation.player().health.max();
        session
            .simulation
            .apply_damage(DamageTarget::Player, 30, false);

        session.step(DT);
        assert_eq!(session.simulation.player().health.current(), max - 30);
        session.step(DT);
        assert_eq!(session.simulation.player().health.current(), max - 20);
        assert_eq!(session.simulation.last_tick_counts().healed, 1);
    }

    #[test]
    fn enemies_past_the_arena_edge_are_killed() {
        let mut config = quiet_config();
        config.arena = ArenaSettings {
            half_size: 30.0,
            pillars: Vec::new(),
            hazards: Vec::new(),
            ..ArenaSettings::default()
        };
        let mut session = build_session(&config, GameRng::from_seed(3)).expect("session");
        session.load();
        let grunt = template_id(&session.simulation, "grunt");
        let stray = session
            .simulation
            .spawn_enemy(grunt, Vec3::new(50.0, 0.0, 0.0))
            .expect("stray");
        let inside = session
            .simulation
            .spawn_enemy(grunt, Vec3::new(-20.0, 0.0, 0.0))
            .expect("inside");

        session.step(DT);

        assert!(!session.simulation.enemy(stray).expect("dying").health.is_alive());
        assert!(session.simulation.enemy(inside).expect("alive").health.is_alive());
        assert_eq!(session.simulation.totals().kills, 1);
    }

    #[test]
    fn headless_session_runs_to_duration_and_spawns() {
        let mut config = SessionConfig::default();
        config.run.seed = Some(17);
        let mut session = build_session(&config, GameRng::from_seed(17)).expect("session");
        let loop_config = LoopConfig {
            target_tps: 20,
            run_duration: Some(Duration::from_secs(4)),
            realtime: false,
            ..LoopConfig::default()
        };

        let summary = run_headless(&loop_config, &mut session, MetricsHandle::default());

        assert_eq!(summary.ticks, 80);
        assert!(!summary.stopped_by_simulation);
        assert!(summary.telemetry.spawned_total >= 1);
        assert_eq!(summary.telemetry.wave, 1);
        assert_eq!(
            session.simulation.telemetry().spawned_total,
            summary.telemetry.spawned_total
        );
    }
