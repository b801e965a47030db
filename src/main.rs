//! Headless demo: a grunt pack and a three-phase warlord hunt a wandering player

use std::error::Error;
use std::rc::Rc;

use npc_brain::ai::LandmarkKind;
use npc_brain::hecs::Entity;
use npc_brain::prelude::*;
use npc_brain::sim::Navigator;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Simulated seconds to run
const SIM_SECONDS: f32 = 60.0;
/// Frame delta
const FRAME: f32 = 1.0 / 60.0;
/// Player melee reach
const PLAYER_REACH: f32 = 2.5;
/// Player damage per swing
const PLAYER_DAMAGE: f32 = 15.0;
/// Seconds between player swings
const PLAYER_SWING: f32 = 0.5;

/// Demo state
struct Demo {
    arena: Rc<Arena>,
    roster: AgentRoster,
    pack: AgentGroup,
    player: Entity,
    rng: ChaCha8Rng,
    clock: SimClock,
    next_swing: f32,
}

impl Demo {
    fn new() -> Result<Self, Box<dyn Error>> {
        let grunt = Rc::new(Archetype::from_ron_str(include_str!("../data/grunt.ron"))?);
        let warlord = Rc::new(Archetype::from_ron_str(include_str!("../data/warlord.ron"))?);

        let mut arena = Arena::new(25.0, 1.0);
        arena.add_wall(Vec3::new(0.0, 1.0, -6.0), Vec3::new(6.0, 1.0, 0.5));
        arena.add_wall(Vec3::new(-10.0, 1.0, 6.0), Vec3::new(0.5, 1.0, 5.0));
        arena.add_wall(Vec3::new(12.0, 1.0, 4.0), Vec3::new(3.0, 1.0, 0.5));
        arena.add_landmark(LandmarkKind::Refuge, Vec3::new(-20.0, 0.0, -20.0));
        arena.add_landmark(LandmarkKind::Refuge, Vec3::new(20.0, 0.0, 20.0));
        let arena = Rc::new(arena);

        let player = arena.spawn_target(
            "player",
            Vec3::new(0.5, 0.0, 10.5),
            400.0,
            3.0,
            Perceivable::default(),
        );

        let mut roster = AgentRoster::new();
        let mut pack = AgentGroup::new("grunts", GroupSettings::default());

        let grunt_spawns = [
            Vec3::new(-6.5, 0.0, -12.5),
            Vec3::new(-3.5, 0.0, -13.5),
            Vec3::new(4.5, 0.0, -12.5),
            Vec3::new(7.5, 0.0, -14.5),
        ];
        for (i, position) in grunt_spawns.into_iter().enumerate() {
            let id = arena.spawn_agent(&format!("grunt-{i}"), position, grunt.max_health, grunt.base_speed);
            roster.spawn(id, Rc::clone(&grunt), arena_capabilities(&arena, id), 100 + i as u64)?;
            pack.join(id);
        }

        let boss = arena.spawn_agent("warlord", Vec3::new(18.5, 0.0, -18.5), warlord.max_health, warlord.base_speed);
        roster.spawn(boss, warlord, arena_capabilities(&arena, boss), 7)?;

        log::info!("Spawned {} agents", roster.len());
        arena.step(FRAME);

        Ok(Self {
            arena,
            roster,
            pack,
            player,
            rng: ChaCha8Rng::seed_from_u64(42),
            clock: SimClock::new(1.0 / 50.0),
            next_swing: 0.0,
        })
    }

    fn update(&mut self, dt: f32) {
        let fixed_steps = self.clock.advance(dt);
        let now = self.clock.elapsed();

        for _ in 0..fixed_steps {
            self.arena.step(self.clock.fixed_step());
            self.roster.fixed_tick();
        }

        self.wander_player();
        self.roster.tick(now, self.clock.delta());
        self.pack.coordinate(&mut self.roster);
        self.resolve_hits();
        self.player_swing(now);

        for id in self.roster.take_despawned() {
            self.pack.leave(id);
            self.arena.despawn(id);
        }
        for event in self.roster.drain_events() {
            log_event(&self.arena, &event);
        }
    }

    fn wander_player(&mut self) {
        let arrived = self
            .arena
            .with_component::<Navigator, _>(self.player, |navigator| navigator.path.is_empty())
            .unwrap_or(false);
        if !arrived {
            return;
        }
        for _ in 0..8 {
            let point = Vec3::new(
                self.rng.gen_range(-20.0..20.0),
                0.0,
                self.rng.gen_range(-20.0..20.0),
            );
            if self.arena.navigate(self.player, point) {
                return;
            }
        }
    }

    fn resolve_hits(&mut self) {
        for hit in self.arena.take_hits() {
            let dealt = if self.roster.contains(hit.target) {
                self.roster
                    .take_damage(hit.target, hit.damage, Some(hit.source))
                    .unwrap_or(0.0)
            } else {
                self.arena.damage(hit.target, hit.damage)
            };
            log::debug!("{:?} hit {:?} for {dealt:.1}", hit.source, hit.target);
        }
    }

    fn player_swing(&mut self, now: f32) {
        if now < self.next_swing || !self.player_alive() {
            return;
        }
        let Some(origin) = self.arena.position(self.player) else {
            return;
        };
        let victim = self
            .roster
            .iter()
            .filter(|(_, agent)| !agent.is_dead())
            .filter_map(|(id, _)| self.arena.position(id).map(|p| (id, p.distance(origin))))
            .filter(|(_, distance)| *distance <= PLAYER_REACH)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id);

        if let Some(victim) = victim {
            self.roster.take_damage(victim, PLAYER_DAMAGE, Some(self.player));
            self.next_swing = now + PLAYER_SWING;
        }
    }

    fn player_alive(&self) -> bool {
        self.arena
            .vitals(self.player)
            .is_some_and(|vitals| vitals.current > 0.0)
    }

    fn shutdown(&mut self) {
        for id in self.roster.shutdown() {
            self.arena.despawn(id);
        }
    }
}

fn log_event(arena: &Arena, event: &AgentEvent) {
    let name = arena
        .name(event.agent())
        .unwrap_or_else(|| format!("{:?}", event.agent()));
    match event {
        AgentEvent::StateChanged { previous, next, .. } => {
            log::info!("{name}: {previous} -> {next}");
        }
        AgentEvent::BossPhaseChanged { phase, name: phase_name, .. } => {
            log::info!("{name} entered phase {phase}: {phase_name}");
        }
        AgentEvent::Died { .. } => log::info!("{name} died"),
        other => log::debug!("{name}: {other:?}"),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut demo = Demo::new()?;
    let frames = (SIM_SECONDS / FRAME) as u32;
    for _ in 0..frames {
        demo.update(FRAME);
        if !demo.player_alive() {
            log::info!("Player fell after {:.1}s", demo.clock.elapsed());
            break;
        }
        if demo.roster.is_empty() {
            log::info!("Arena cleared after {:.1}s", demo.clock.elapsed());
            break;
        }
    }
    demo.shutdown();
    log::info!("Demo finished");
    Ok(())
}
