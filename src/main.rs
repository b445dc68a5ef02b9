//! encounter-sim - run an automated encounter from a roster file
//!
//! Every creature attacks the weakest standing enemy until one side falls or
//! the round limit is reached. Dying characters roll death saves on their
//! turn.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use encounter::combat::{
    AttackAction, AttackModifiers, CombatEvent, CombatPhase, CombatSession, Creature, DamageType,
    DiceRoll, EventEnvelope, Faction, HandleError, SessionHandle, SessionSnapshot,
};
use encounter::config::{EngineConfig, RosterFile};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Combat encounter simulator
#[derive(Parser, Debug)]
#[command(
    name = "encounter-sim",
    version,
    about = "Simulate a 5e-style combat encounter"
)]
struct Args {
    /// Roster TOML file
    #[arg(short, long)]
    roster: PathBuf,

    /// Engine config TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many rounds
    #[arg(long, default_value_t = 10)]
    rounds: u32,

    /// Seed the dice (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Print events as JSON lines and log as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing(default_filter: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn opponent(faction: Faction) -> Faction {
    match faction {
        Faction::Character => Faction::Monster,
        Faction::Monster => Faction::Character,
    }
}

fn standing(creatures: &[Creature], faction: Faction) -> bool {
    creatures
        .iter()
        .any(|c| c.faction == faction && !c.is_down())
}

/// The standing enemy with the fewest hit points
fn pick_target<'a>(creatures: &'a [Creature], attacker: &Creature) -> Option<&'a Creature> {
    let enemy = opponent(attacker.faction);
    creatures
        .iter()
        .filter(|c| c.faction == enemy && !c.is_down())
        .min_by_key(|c| c.hit_points)
}

fn describe(event: &CombatEvent) -> String {
    match event {
        CombatEvent::Attack {
            attacker_id,
            target_id,
            result,
        } => {
            let verdict = if result.is_critical {
                "CRITICAL HIT"
            } else if result.hits {
                "hit"
            } else {
                "miss"
            };
            format!(
                "{} attacks {}: {} + {} = {} vs AC {} ({})",
                attacker_id,
                target_id,
                result.roll,
                result.attack_bonus,
                result.total,
                result.target_ac,
                verdict
            )
        }
        CombatEvent::Damage {
            target_id,
            amount,
            damage_type,
            was_resisted,
            was_vulnerable,
            was_immune,
            ..
        } => {
            let note = if *was_immune {
                " (immune)"
            } else if *was_resisted {
                " (resisted)"
            } else if *was_vulnerable {
                " (vulnerable)"
            } else {
                ""
            };
            format!("{} takes {} {} damage{}", target_id, amount, damage_type, note)
        }
        CombatEvent::Healing {
            target_id,
            amount,
            new_hp,
        } => format!("{} heals {} (now {} HP)", target_id, amount, new_hp),
        CombatEvent::Death {
            creature_id,
            was_instant_death,
        } => {
            if *was_instant_death {
                format!("{} is killed outright", creature_id)
            } else {
                format!("{} dies", creature_id)
            }
        }
        CombatEvent::Initiative { order } => {
            let order: Vec<String> = order
                .iter()
                .map(|e| format!("{} ({})", e.creature_id, e.total))
                .collect();
            format!("initiative: {}", order.join(", "))
        }
        CombatEvent::Turn { creature_id, round } => {
            format!("-- round {}, {}'s turn", round, creature_id)
        }
        CombatEvent::Round { round } => format!("== round {} ==", round),
        CombatEvent::DeathSave {
            creature_id,
            roll,
            successes,
            failures,
            stabilized,
        } => {
            let note = if *stabilized { ", stable" } else { "" };
            format!(
                "{} death save: {} ({} successes, {} failures{})",
                creature_id, roll, successes, failures, note
            )
        }
        CombatEvent::Condition {
            creature_id,
            condition,
            applied,
        } => {
            if *applied {
                format!("{} is {}", creature_id, condition)
            } else {
                format!("{} is no longer {}", creature_id, condition)
            }
        }
        CombatEvent::CombatEnded { rounds } => format!("combat ends after {} rounds", rounds),
    }
}

fn drain(events: &mut mpsc::UnboundedReceiver<EventEnvelope>, json: bool) -> Result<()> {
    while let Ok(envelope) = events.try_recv() {
        if json {
            println!("{}", serde_json::to_string(&envelope)?);
        } else {
            println!("{}", describe(&envelope.event));
        }
    }
    Ok(())
}

async fn take_turn(
    handle: &SessionHandle,
    snapshot: &SessionSnapshot,
    weapons: &HashMap<String, (DiceRoll, DamageType)>,
    creature_id: &str,
) -> Result<()> {
    let Some(me) = snapshot.creatures.iter().find(|c| c.id == creature_id) else {
        return Ok(());
    };

    if me.is_dying() {
        handle.roll_death_save(creature_id).await?;
        return Ok(());
    }
    if me.is_down() {
        return Ok(());
    }
    let Some(target) = pick_target(&snapshot.creatures, me) else {
        return Ok(());
    };
    let Some(&(damage, damage_type)) = weapons.get(creature_id) else {
        return Ok(());
    };

    let action = AttackAction {
        attacker_id: creature_id.to_string(),
        target_id: target.id.clone(),
        modifiers: AttackModifiers::default(),
        damage,
        damage_type,
    };
    match handle.perform_attack_action(action).await {
        Ok(_) => {}
        Err(HandleError::Combat(reason)) => info!("{} cannot attack: {}", creature_id, reason),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref())?;
    if args.seed.is_some() {
        config.rng_seed = args.seed;
    }
    init_tracing(&config.log_filter, args.json);

    let roster = RosterFile::load(&args.roster)?;
    let mut weapons = HashMap::new();
    for entry in &roster.creatures {
        weapons.insert(
            entry.creature.id.clone(),
            (entry.weapon_dice()?, entry.damage_type),
        );
    }

    let handle = SessionHandle::spawn(CombatSession::from_config(&config));
    let mut events = handle.subscribe().await?;
    info!(session = %handle.session_id(), "loaded {} creatures", roster.creatures.len());

    for entry in roster.creatures {
        handle.register_creature(entry.creature).await?;
    }
    handle.roll_initiative_for_all().await?;
    drain(&mut events, args.json)?;

    loop {
        let snapshot = handle.snapshot().await?;
        let CombatPhase::InCombat { round, .. } = snapshot.phase else {
            break;
        };
        if round > args.rounds {
            warn!("round limit of {} reached", args.rounds);
            break;
        }
        if !standing(&snapshot.creatures, Faction::Character)
            || !standing(&snapshot.creatures, Faction::Monster)
        {
            break;
        }
        let Some(current) = snapshot.current_creature_id.clone() else {
            break;
        };

        take_turn(&handle, &snapshot, &weapons, &current).await?;
        drain(&mut events, args.json)?;
        handle.next_turn().await?;
    }

    handle.end_combat().await?;
    drain(&mut events, args.json)?;

    let snapshot = handle.snapshot().await?;
    if args.json {
        println!("{}", serde_json::to_string(&snapshot)?);
    } else {
        for c in &snapshot.creatures {
            println!(
                "{:<12} {:>3}/{:<3} HP  {:?}",
                c.name,
                c.hit_points,
                c.max_hit_points,
                c.lifecycle()
            );
        }
    }

    Ok(())
}
