use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use crate::kernel::{Event, Registers, SemaphoreOp, Time};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// One timed event of a script, with the line it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptEvent {
    pub line: usize,
    pub time: Time,
    pub event: Event,
}

/// Events the simulated machine delivers, in delivery order.
#[derive(Debug, Clone, Default)]
pub struct Script {
    events: Vec<ScriptEvent>,
}

impl Script {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptEvent> {
        self.events.iter()
    }
}

pub fn load_script(path: &Path) -> Result<Script, ScriptError> {
    let file = File::open(path)?;
    parse_script(BufReader::new(file))
}

/// Parses one event per line:
///
/// ```text
/// # comment
/// 0   TRAP FORK 1
/// 5   TRAP DISK_READ 12
/// 9   TRAP SEM DOWN 3
/// 40  CLOCK
/// 61  DISK 0
/// 70  TRAP 4          raw opcode, optional R2 and R3
/// ```
pub fn parse_script<R: BufRead>(reader: R) -> Result<Script, ScriptError> {
    let mut events = Vec::new();
    let mut last_time = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let text = match line.split('#').next() {
            Some(text) => text.trim(),
            None => continue,
        };
        if text.is_empty() {
            continue;
        }

        let (time, event) = parse_line(text).map_err(|message| ScriptError::Parse {
            line: line_no,
            message,
        })?;

        if time < last_time {
            return Err(ScriptError::Parse {
                line: line_no,
                message: format!("time {} is earlier than previous event at {}", time, last_time),
            });
        }
        last_time = time;

        events.push(ScriptEvent {
            line: line_no,
            time,
            event,
        });
    }

    Ok(Script { events })
}

fn parse_line(text: &str) -> Result<(Time, Event), String> {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|token| token.to_ascii_uppercase())
        .collect();
    let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();

    let (time, rest) = match tokens.split_first() {
        Some((time, rest)) => (parse_number::<Time>(time, "time")?, rest),
        None => return Err("empty event".to_string()),
    };

    let event = match rest {
        ["CLOCK"] => Event::ClockInterrupt,
        ["DISK", pid] => Event::DiskInterrupt {
            pid: parse_number(pid, "pid")?,
        },
        ["KEYBOARD", pid] => Event::KeyboardInterrupt {
            pid: parse_number(pid, "pid")?,
        },
        ["TRAP", trap @ ..] => Event::Trap(parse_trap(trap)?),
        [] => return Err("missing event kind".to_string()),
        [kind, ..] => return Err(format!("malformed {} event", kind)),
    };

    Ok((time, event))
}

fn parse_trap(tokens: &[&str]) -> Result<Registers, String> {
    let registers = match tokens {
        ["DISK_READ"] => Registers::disk_read(0),
        ["DISK_READ", block] => Registers::disk_read(parse_number(block, "block")?),
        ["DISK_WRITE"] => Registers::disk_write(),
        ["KEYBOARD_READ"] => Registers::keyboard_read(),
        ["FORK", pid] => Registers::fork(parse_number(pid, "pid")?),
        ["END"] => Registers::end(),
        ["SEM", "UP", id] => Registers::semaphore(parse_number(id, "semaphore")?, SemaphoreOp::Up),
        ["SEM", "DOWN", id] => {
            Registers::semaphore(parse_number(id, "semaphore")?, SemaphoreOp::Down)
        }
        [r1, operands @ ..] if operands.len() <= 2 => {
            let r1 = parse_number(r1, "opcode")?;
            let r2 = operands.first().map_or(Ok(0), |r2| parse_number(r2, "R2"))?;
            let r3 = operands.get(1).map_or(Ok(0), |r3| parse_number(r3, "R3"))?;
            Registers::new(r1, r2, r3)
        }
        _ => return Err(format!("malformed trap: {}", tokens.join(" "))),
    };

    Ok(registers)
}

fn parse_number<T: std::str::FromStr>(token: &str, what: &str) -> Result<T, String> {
    token
        .parse()
        .map_err(|_| format!("{} is not a number: {}", what, token))
}
