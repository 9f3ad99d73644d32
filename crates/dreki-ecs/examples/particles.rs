//! Particles — emit, integrate and expire particles for a fixed number of ticks.
//!
//! Particles live in two archetypes (with and without `Drag`), are culled
//! through deferred commands when their lifetime runs out, and an emitter
//! queues new ones every tick. A diagnostics snapshot is printed at the end.
//!
//! Run with: `RUST_LOG=debug cargo run -p dreki-ecs --example particles`

use dreki_ecs::prelude::*;
use glam::Vec2;

const TICKS: u32 = 120;
const DT: f32 = 1.0 / 60.0;

// ── Components ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Position(Vec2);

#[derive(Debug, Clone, Copy)]
struct Velocity(Vec2);

#[derive(Debug, Clone, Copy)]
struct Lifetime(f32);

/// Fraction of velocity lost per second.
#[derive(Debug, Clone, Copy)]
struct Drag(f32);

#[derive(Debug, Clone, Copy)]
struct Emitter {
    per_tick: u32,
    spawned: u32,
}

// ── Systems ──────────────────────────────────────────────────────────────

struct Integrate;

impl System for Integrate {
    type View = (Write<Position>, Read<Velocity>);

    fn process(&mut self, range: ComponentRange<'_, Self::View>, _: &mut Commands) {
        for (pos, vel) in range {
            pos.0 += vel.0 * DT;
        }
    }
}

struct Gravity;

impl System for Gravity {
    type View = (Write<Velocity>, Without<Emitter>);

    fn process(&mut self, range: ComponentRange<'_, Self::View>, _: &mut Commands) {
        for (vel, ()) in range {
            vel.0.y -= 9.81 * DT;
        }
    }
}

struct ApplyDrag;

impl System for ApplyDrag {
    type View = (Write<Velocity>, Read<Drag>);

    fn process(&mut self, range: ComponentRange<'_, Self::View>, _: &mut Commands) {
        for (vel, drag) in range {
            vel.0 *= 1.0 - drag.0 * DT;
        }
    }
}

struct Expire;

impl System for Expire {
    type View = Write<Lifetime>;

    fn process(&mut self, range: ComponentRange<'_, Self::View>, commands: &mut Commands) {
        for (entity, life) in range.with_entities() {
            life.0 -= DT;
            if life.0 <= 0.0 {
                commands.destroy(entity);
            }
        }
    }
}

struct Emit;

impl System for Emit {
    type View = (Write<Emitter>, Read<Position>);

    fn process(&mut self, range: ComponentRange<'_, Self::View>, commands: &mut Commands) {
        for (emitter, origin) in range {
            for _ in 0..emitter.per_tick {
                let n = emitter.spawned as f32;
                let dir = Vec2::from_angle(n * 0.618 * std::f32::consts::TAU);
                let particle = (
                    Position(origin.0),
                    Velocity(dir * 4.0),
                    Lifetime(0.5 + (emitter.spawned % 7) as f32 * 0.1),
                );
                if emitter.spawned % 3 == 0 {
                    commands.create((particle.0, particle.1, particle.2, Drag(0.8)));
                } else {
                    commands.create(particle);
                }
                emitter.spawned += 1;
            }
        }
    }
}

fn main() -> EcsResult<()> {
    env_logger::init();

    let mut registry = ComponentRegistry::new();
    registry.register_set::<(Position, Velocity, Lifetime, Drag, Emitter)>();

    let config = ControllerConfig::from_json_str(r#"{ "chunk_size": 64, "initial_capacity": 128 }"#)?;
    let mut controller = Controller::with_config(registry, config);

    controller.create_entity((
        Position(Vec2::ZERO),
        Emitter {
            per_tick: 4,
            spawned: 0,
        },
    ));
    controller.create_entity((
        Position(Vec2::new(10.0, 5.0)),
        Emitter {
            per_tick: 2,
            spawned: 0,
        },
    ));

    let emit = controller.register_system(Emit);
    let gravity = controller.register_system(Gravity);
    let drag = controller.register_system(ApplyDrag);
    let integrate = controller.register_system(Integrate);
    let expire = controller.register_system(Expire);
    controller.order_after(drag, gravity)?;
    controller.order_after(integrate, drag)?;
    controller.order_after(expire, emit)?;

    for (i, stage) in controller.schedule().stages().iter().enumerate() {
        let names: Vec<&str> = stage
            .iter()
            .filter_map(|&id| controller.system_name(id))
            .collect();
        log::info!("stage {i}: {}", names.join(", "));
    }

    for tick in 0..TICKS {
        controller.tick();
        if tick % 30 == 0 {
            log::info!(
                "tick {tick}: {} particles in {} archetypes",
                controller.count::<Read<Lifetime>>(),
                controller.archetype_count()
            );
        }
    }

    let mut spread = 0.0f32;
    controller.for_each_range::<(Read<Position>, Without<Emitter>)>(|range| {
        for (pos, ()) in range {
            spread = spread.max(pos.0.length());
        }
    });
    println!(
        "{} live particles after {TICKS} ticks, farthest at {spread:.2}",
        controller.count::<Read<Lifetime>>()
    );

    println!("{}", controller.diagnostics().to_json()?);
    Ok(())
}
