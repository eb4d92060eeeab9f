use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::thread;

use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use rw_core::time::time_as_relative_string;
use rw_simulation::{
    Action, ActionResult, ActionSet, Actor, Behavior, BoundEvent, Entity, Event, EventKind,
    ScriptKeyPoint, ScriptedEntity, SimConfig, TickContext, World,
};

/// The demo scenarios `rw run` knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// A yeller shouting in a private hall, and an echo answering
    Echo,
    /// A scripted clock in a private location, with listeners inside and outside
    PrintTime,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Echo => write!(f, "echo"),
            Self::PrintTime => write!(f, "print-time"),
        }
    }
}

/// One event as received by a named listener.
#[derive(Debug)]
struct Heard {
    listener: String,
    line: String,
    bound: BoundEvent,
}

type Transcript = Rc<RefCell<Vec<Heard>>>;

pub fn run(
    scenario: Scenario,
    ticks: u64,
    interval_ms: u64,
    step_minutes: u32,
    start: Option<&str>,
    json: bool,
) -> Result<(), String> {
    let mut config = SimConfig::default().with_time_step(Duration::minutes(i64::from(step_minutes)));
    if let Some(raw) = start {
        config = config.with_start_time(super::parse_timestamp(raw)?);
    }

    let transcript = Transcript::default();
    let mut world = match scenario {
        Scenario::Echo => build_echo(config, &transcript),
        Scenario::PrintTime => build_print_time(config, ticks, &transcript),
    }
    .map_err(|e| format!("failed to build scenario: {e}"))?;
    debug!(%scenario, entities = world.root().descendants().count(), "scenario ready");

    if !json {
        println!(
            "  {} {} {}",
            "Relative World".bold(),
            scenario,
            format!("({ticks} ticks, {step_minutes} min/tick)").dimmed()
        );
        println!();
    }

    for tick in 0..ticks {
        let now = world
            .current_time()
            .map_err(|e| format!("simulation error: {e}"))?;
        let escaped = world.tick().map_err(|e| format!("simulation error: {e}"))?;
        let heard: Vec<Heard> = transcript.borrow_mut().drain(..).collect();

        if json {
            print_json(tick, &heard, &escaped)?;
        } else {
            print_text(tick, now, &heard, &escaped);
        }

        if interval_ms > 0 && tick + 1 < ticks {
            thread::sleep(std::time::Duration::from_millis(interval_ms));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_text(tick: u64, now: DateTime<Utc>, heard: &[Heard], escaped: &[BoundEvent]) {
    let label = format!("[tick {tick:>3}]").dimmed();
    println!("  {label} {}", now.format("%Y-%m-%d %H:%M UTC"));
    for entry in heard {
        println!("    {}", entry.line);
    }
    for bound in escaped {
        println!(
            "    {} {} from {}",
            "escaped".yellow(),
            bound.kind(),
            bound.source
        );
    }
}

fn print_json(tick: u64, heard: &[Heard], escaped: &[BoundEvent]) -> Result<(), String> {
    let lines = heard
        .iter()
        .map(|entry| json!({ "tick": tick, "heard_by": entry.listener, "event": entry.bound }))
        .chain(
            escaped
                .iter()
                .map(|bound| json!({ "tick": tick, "escaped": bound })),
        );
    for line in lines {
        let rendered =
            serde_json::to_string(&line).map_err(|e| format!("JSON serialization failed: {e}"))?;
        println!("{rendered}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

fn message(bound: &BoundEvent) -> String {
    bound
        .event
        .get("message")
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Record every `kind` event reaching `entity` in the transcript, rendered
/// by `render` from the listener's name and the event.
fn listen(
    entity: &mut Entity,
    kind: EventKind,
    transcript: &Transcript,
    render: fn(&str, &BoundEvent) -> String,
) {
    let listener = entity.name().unwrap_or("anonymous").to_string();
    let sink = Rc::clone(transcript);
    entity.set_event_handler(kind, move |bound| {
        sink.borrow_mut().push(Heard {
            line: render(&listener, bound),
            listener: listener.clone(),
            bound: bound.clone(),
        });
        Ok(())
    });
}

// ---------------------------------------------------------------------------
// Echo
// ---------------------------------------------------------------------------

/// Shouts the same statement every tick.
#[derive(Debug)]
struct Yeller;

impl Behavior for Yeller {
    fn act(&mut self, ctx: &TickContext) -> Vec<Event> {
        vec![
            ctx.event(EventKind::Statement)
                .with_context("message", "Hello, world!"),
        ]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn build_echo(config: SimConfig, transcript: &Transcript) -> Result<World, String> {
    let mut world = World::new(config).with_name("World");
    let hall = world
        .add_location(Entity::location(true).with_name("Hall"))
        .map_err(|e| e.to_string())?;

    let yeller = Entity::actor(Actor::new(&world).with_behavior(Yeller)).with_name("Ol' Yeller");
    world
        .add_actor(yeller, Some(hall))
        .map_err(|e| e.to_string())?;

    let mut echo = Entity::actor(Actor::new(&world)).with_name("Echo");
    listen(&mut echo, EventKind::Statement, transcript, |_, bound| {
        format!("{} says: {}", bound.source, message(bound))
    });
    world.add_actor(echo, Some(hall)).map_err(|e| e.to_string())?;

    Ok(world)
}

// ---------------------------------------------------------------------------
// Print time
// ---------------------------------------------------------------------------

/// Announces ticks, and the time on every fourth one.
#[derive(Debug)]
struct TimeLogger {
    started: DateTime<Utc>,
}

impl TimeLogger {
    fn log_tick(&mut self, _kp: &ScriptKeyPoint, ctx: &TickContext) -> ActionResult {
        Ok(vec![
            ctx.event(EventKind::SayAloud)
                .with_context("message", "- Tick -"),
        ])
    }

    fn log_time(&mut self, _kp: &ScriptKeyPoint, ctx: &TickContext) -> ActionResult {
        let now = ctx.now();
        let message = format!(
            "The time is {}, started {}",
            now.format("%H:%M"),
            time_as_relative_string(self.started, now)
        );
        Ok(vec![
            ctx.event(EventKind::SayAloud)
                .with_context("message", message),
        ])
    }
}

impl ActionSet for TimeLogger {
    fn get_action(&self, name: &str) -> Option<Action<Self>> {
        match name {
            "log_tick" => Some(Self::log_tick),
            "log_time" => Some(Self::log_time),
            _ => None,
        }
    }
}

/// One key point per tick at the tick's simulated time.
fn time_logger_script(
    start: DateTime<Utc>,
    step: Duration,
    ticks: u64,
) -> Result<Vec<ScriptKeyPoint>, String> {
    (0..ticks)
        .map(|tick| {
            let offset = i32::try_from(tick)
                .ok()
                .and_then(|n| step.checked_mul(n))
                .and_then(|d| start.checked_add_signed(d))
                .ok_or_else(|| format!("tick {tick} is outside the representable time range"))?;
            let action = if (tick + 1) % 4 == 0 {
                "log_time"
            } else {
                "log_tick"
            };
            Ok(ScriptKeyPoint::new(offset, action))
        })
        .collect()
}

fn build_print_time(
    config: SimConfig,
    ticks: u64,
    transcript: &Transcript,
) -> Result<World, String> {
    let mut world = World::new(config).with_name("World");
    let start = world.clock().start();
    let script = time_logger_script(start, world.clock().time_step(), ticks)?;

    let oregon = world
        .add_location(Entity::location(true).with_name("Oregon"))
        .map_err(|e| e.to_string())?;

    let mut inside = Entity::plain().with_name("Oregon");
    listen(&mut inside, EventKind::SayAloud, transcript, |name, bound| {
        format!("{name} - {}", message(bound))
    });
    world
        .add_entity_to(oregon, inside)
        .map_err(|e| e.to_string())?;

    let logger = Entity::scripted(
        ScriptedEntity::new(TimeLogger { started: start }).with_script(script),
    )
    .with_name("Time Logger");
    world
        .add_entity_to(oregon, logger)
        .map_err(|e| e.to_string())?;

    let mut outside = Entity::plain().with_name("Global");
    listen(&mut outside, EventKind::SayAloud, transcript, |name, bound| {
        format!("{name} - {}", message(bound))
    });
    world.add_entity(outside);

    Ok(world)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn script_logs_time_every_fourth_tick() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let script = time_logger_script(start, Duration::minutes(15), 8).unwrap();
        let actions: Vec<&str> = script.iter().map(|kp| kp.action.as_str()).collect();
        assert_eq!(
            actions,
            vec![
                "log_tick", "log_tick", "log_tick", "log_time", "log_tick", "log_tick", "log_tick",
                "log_time"
            ]
        );
        assert_eq!(script[3].timestamp, start + Duration::minutes(45));
    }

    #[test]
    fn listeners_outside_the_private_location_hear_nothing() {
        let transcript = Transcript::default();
        let config = SimConfig::default()
            .with_start_time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut world = build_print_time(config, 4, &transcript).unwrap();
        assert!(world.run(4).unwrap().is_empty());

        let heard = transcript.borrow();
        assert_eq!(heard.len(), 4);
        assert!(heard.iter().all(|h| h.listener == "Oregon"));
        assert_eq!(heard[3].line, "Oregon - The time is 00:45, started 45 minutes ago");
    }

    #[test]
    fn echo_hears_the_yeller_every_tick() {
        let transcript = Transcript::default();
        let mut world = build_echo(SimConfig::default(), &transcript).unwrap();
        world.run(3).unwrap();
        let heard = transcript.borrow();
        assert_eq!(heard.len(), 3);
        assert!(heard.iter().all(|h| h.line.ends_with("says: Hello, world!")));
    }
}
