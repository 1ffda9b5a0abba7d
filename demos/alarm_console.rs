//! # Example: alarm_console
//!
//! Line-oriented console driving an [`AlarmManager`] from stdin, with the
//! built-in [`LogWriter`] printing every event.
//!
//! ## Grammar
//! ```text
//! Start_Alarm(<id>): <type> <seconds> <message>
//! Change_Alarm(<id>): <type> <seconds> <message>
//! Cancel_Alarm(<id>)
//! View_Alarms
//! ```
//! The type field of a change is accepted but ignored; an alarm keeps the type
//! it was submitted with.
//!
//! ## Run
//! ```bash
//! cargo run --example alarm_console --features logging
//! ```

use std::{sync::Arc, time::Duration};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

use alarmvisor::{AlarmId, AlarmManager, Config, LogWriter, Subscribe};

/// Longest accepted input line; longer lines are cut with a warning.
const LINE_LIMIT: usize = 256;

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Start {
        id: AlarmId,
        type_code: &'a str,
        secs: u64,
        message: &'a str,
    },
    Change {
        id: AlarmId,
        secs: u64,
        message: &'a str,
    },
    Cancel {
        id: AlarmId,
    },
    View,
}

fn parse(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    if line == "View_Alarms" {
        return Some(Command::View);
    }

    let (op, rest) = line.split_once('(')?;
    let (id, rest) = rest.split_once(')')?;
    let id: AlarmId = id.trim().parse().ok()?;

    if op == "Cancel_Alarm" {
        return Some(Command::Cancel { id });
    }

    let rest = rest.strip_prefix(':')?.trim_start();
    let mut fields = rest.splitn(3, ' ');
    let type_code = fields.next()?;
    let secs: u64 = fields.next()?.parse().ok()?;
    let message = fields.next().unwrap_or("");

    match op {
        "Start_Alarm" => Some(Command::Start {
            id,
            type_code,
            secs,
            message,
        }),
        "Change_Alarm" => Some(Command::Change { id, secs, message }),
        _ => None,
    }
}

fn cut_line(line: &mut String) {
    if line.len() <= LINE_LIMIT {
        return;
    }
    let mut end = LINE_LIMIT;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    line.truncate(end);
    println!("[warning] input line truncated to {end} bytes");
}

/// One line per registered alarm, with the worker rendering it if any.
async fn listing(manager: &AlarmManager) -> Vec<String> {
    let snap = manager.snapshot().await;
    let now = Instant::now();
    manager
        .alarms()
        .await
        .into_iter()
        .map(|alarm| {
            let worker = snap
                .workers
                .iter()
                .find(|w| w.alarm_ids().contains(&alarm.id))
                .map_or_else(|| "unassigned".to_string(), |w| w.id.to_string());
            format!(
                "alarm={} type={:?} worker={} interval={}s remaining={}s message={:?}",
                alarm.id,
                alarm.type_code.as_str(),
                worker,
                alarm.interval.as_secs(),
                alarm.remaining(now).as_secs(),
                alarm.message.as_str()
            )
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let manager = AlarmManager::builder(Config::default())
        .with_subscribers(subs)
        .build();
    manager.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(mut line) = lines.next_line().await? {
        cut_line(&mut line);
        if line.trim().is_empty() {
            continue;
        }

        // Rejections are also published as events where the manager knows
        // about them (not-found); the rest are printed here.
        let result = match parse(&line) {
            Some(Command::Start {
                id,
                type_code,
                secs,
                message,
            }) => {
                manager
                    .submit(id, type_code, Duration::from_secs(secs), message)
                    .await
            }
            Some(Command::Change { id, secs, message }) => {
                manager.modify(id, Duration::from_secs(secs), message).await
            }
            Some(Command::Cancel { id }) => manager.cancel(id).await,
            Some(Command::View) => {
                for line in listing(&manager).await {
                    println!("{line}");
                }
                Ok(())
            }
            None => {
                println!("[invalid] {line:?}");
                Ok(())
            }
        };

        if let Err(e) = result {
            if !e.is_user_error() {
                return Err(e.into());
            }
            println!("[error] {e}");
        }
    }

    manager.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_command_grammar() {
        assert_eq!(
            parse("Start_Alarm(1): wk 5 hello there"),
            Some(Command::Start {
                id: 1,
                type_code: "wk",
                secs: 5,
                message: "hello there"
            })
        );
        assert_eq!(
            parse("Change_Alarm(1): wk 30 later"),
            Some(Command::Change {
                id: 1,
                secs: 30,
                message: "later"
            })
        );
        assert_eq!(parse("Cancel_Alarm(7)"), Some(Command::Cancel { id: 7 }));
        assert_eq!(parse("View_Alarms"), Some(Command::View));
        assert_eq!(parse("Snooze(1): wk 5 x"), None);
        assert_eq!(parse("Start_Alarm(x): wk 5 x"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn view_lists_waiting_alarms_too() {
        let cfg = Config {
            max_workers: 1,
            ..Config::default()
        };
        let manager = AlarmManager::builder(cfg).build();
        manager.submit(1, "aa", Duration::from_secs(30), "shown").await.unwrap();
        manager.submit(2, "bb", Duration::from_secs(30), "waiting").await.unwrap();
        manager.dispatch_once().await;

        let lines = listing(&manager).await;
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("alarm=1 type=\"aa\" worker=1 "));
        assert!(lines[1].starts_with("alarm=2 type=\"bb\" worker=unassigned "));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_durations_are_reported_not_fatal() {
        let manager = AlarmManager::builder(Config::default()).build();
        let Some(Command::Start { id, type_code, secs, message }) =
            parse("Start_Alarm(1): wk 18446744073709551615 x")
        else {
            panic!("line should parse");
        };
        let err = manager
            .submit(id, type_code, Duration::from_secs(secs), message)
            .await
            .unwrap_err();
        assert!(err.is_user_error());
        assert!(listing(&manager).await.is_empty());
    }
}
