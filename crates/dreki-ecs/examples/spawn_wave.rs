//! Spawn Wave — build entities from a JSON description, then fight it out.
//!
//! Each wave entry names its components by string. A small decoder table
//! turns every `(name, json)` pair into a [`RawComponent`], and the unordered
//! list goes straight to `create_entity_raw`, the same path a scene loader
//! would take. Unknown names are logged and skipped.
//!
//! Run with: `RUST_LOG=info cargo run -p dreki-ecs --example spawn_wave`

use std::collections::HashMap;

use dreki_ecs::prelude::*;
use glam::Vec2;
use serde::Deserialize;

const WAVE: &str = r#"{
    "waves": [
        { "count": 4, "components": { "Position": [0.0, 10.0], "Health": 30, "Speed": 1.5 } },
        { "count": 2, "components": { "Speed": 0.5, "Health": 120, "Position": [5.0, 12.0], "Armored": null } },
        { "count": 1, "components": { "Position": [-3.0, 6.0], "Health": 10, "Glowing": true } }
    ]
}"#;

// ── Wave description ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct WaveFile {
    waves: Vec<Wave>,
}

#[derive(Deserialize)]
struct Wave {
    count: u32,
    components: HashMap<String, serde_json::Value>,
}

// ── Components ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Position(Vec2);

#[derive(Debug, Clone, Copy)]
struct Health(i32);

#[derive(Debug, Clone, Copy)]
struct Speed(f32);

#[derive(Debug, Clone, Copy)]
struct Armored;

// ── Decoding ─────────────────────────────────────────────────────────────

type DecodeFn = fn(serde_json::Value) -> Option<RawComponent>;

fn decoders() -> HashMap<&'static str, DecodeFn> {
    let mut table: HashMap<&'static str, DecodeFn> = HashMap::new();
    table.insert("Position", |json| {
        let [x, y]: [f32; 2] = serde_json::from_value(json).ok()?;
        Some(RawComponent::new(Position(Vec2::new(x, y))))
    });
    table.insert("Health", |json| {
        Some(RawComponent::new(Health(serde_json::from_value(json).ok()?)))
    });
    table.insert("Speed", |json| {
        Some(RawComponent::new(Speed(serde_json::from_value(json).ok()?)))
    });
    table.insert("Armored", |_| Some(RawComponent::new(Armored)));
    table
}

fn decode(wave: &Wave, table: &HashMap<&'static str, DecodeFn>) -> Vec<RawComponent> {
    let mut components = Vec::with_capacity(wave.components.len());
    for (name, json) in &wave.components {
        match table.get(name.as_str()).and_then(|decode| decode(json.clone())) {
            Some(raw) => components.push(raw),
            None => log::warn!("skipping component `{name}`: unknown or malformed"),
        }
    }
    components
}

// ── Systems ──────────────────────────────────────────────────────────────

/// Everyone walks toward the origin.
struct Advance;

impl System for Advance {
    type View = (Write<Position>, Read<Speed>);

    fn process(&mut self, range: ComponentRange<'_, Self::View>, _: &mut Commands) {
        for (pos, speed) in range {
            pos.0 -= pos.0.normalize_or_zero() * speed.0;
        }
    }
}

/// A turret at the origin hurts whatever comes within range.
struct Turret {
    damage: i32,
}

impl System for Turret {
    type View = (Write<Health>, Read<Position>);

    fn process(&mut self, range: ComponentRange<'_, Self::View>, commands: &mut Commands) {
        for (entity, (hp, pos)) in range.with_entities() {
            if pos.0.length() < 8.0 {
                hp.0 -= self.damage;
                if hp.0 <= 0 {
                    commands.destroy(entity);
                }
            }
        }
    }
}

/// Armor soaks part of each hit until health drops too low.
struct ArmorRebate;

impl System for ArmorRebate {
    type View = (Write<Health>, Read<Position>, With<Armored>);

    fn process(&mut self, range: ComponentRange<'_, Self::View>, commands: &mut Commands) {
        for (entity, (hp, pos, ())) in range.with_entities() {
            if pos.0.length() < 8.0 {
                hp.0 += 5;
                if hp.0 < 40 {
                    log::info!("{entity} lost its armor");
                    commands.remove::<Armored>(entity);
                }
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut registry = ComponentRegistry::new();
    registry.register_set::<(Position, Health, Speed, Armored)>();
    let mut controller = Controller::new(registry);

    let file: WaveFile = serde_json::from_str(WAVE)?;
    let table = decoders();
    for wave in &file.waves {
        for _ in 0..wave.count {
            let entity = controller.try_create_entity_raw(decode(wave, &table))?;
            log::debug!("spawned {entity}");
        }
    }
    log::info!(
        "{} enemies across {} archetypes",
        controller.entity_count(),
        controller.archetype_count()
    );

    controller.register_system(Advance);
    let turret = controller.register_system(Turret { damage: 10 });
    let rebate = controller.register_system(ArmorRebate);
    controller.order_after(rebate, turret)?;

    let mut ticks = 0;
    while controller.count::<Read<Health>>() > 0 && ticks < 100 {
        controller.tick();
        ticks += 1;
    }
    println!(
        "{} enemies left after {ticks} ticks",
        controller.count::<Read<Health>>()
    );
    Ok(())
}
