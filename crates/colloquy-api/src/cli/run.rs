//! `colloquy run`: one session in the terminal.
//!
//! Entries stream from the session's event bus while operator lines are
//! read from stdin and parsed into [`Command`]s.

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use colloquy_core::scheduler::NewPersona;
use colloquy_core::session::{Command, HELP, SessionHandle, SessionRequest};
use colloquy_types::error::SessionError;
use colloquy_types::event::SessionEvent;

use super::render::{event_line, personas_table, stats_block};
use crate::state::AppState;

enum Flow {
    Continue,
    Quit,
}

pub async fn run_session(state: &AppState, user: &str, request: SessionRequest) -> anyhow::Result<()> {
    let handle = state.sessions.create(user, request).await?;
    let mut events = handle.subscribe();

    {
        let engine = handle.engine().await;
        let stats = engine.stats();
        println!();
        println!(
            "  {} {}",
            style("Colloquy").bold(),
            style(&engine.scenario().scenario().name).cyan()
        );
        println!("{}", personas_table(&stats));
        println!("  {}", style("Type /help for commands, Ctrl+C to stop.").dim());
        println!();
    }

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = event_line(&event) {
                        println!("{line}");
                    }
                    if matches!(event, SessionEvent::Stopped { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    println!("      {}", style(format!("({n} events skipped)")).dim());
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut resume_delay = state.config().scheduler.tick_delay_secs;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let flow = match line.parse::<Command>() {
                    Ok(command) => dispatch(&handle, command, &mut resume_delay).await,
                    Err(e) => {
                        println!("  {} {e}", style("!").yellow().bold());
                        Flow::Continue
                    }
                };
                if matches!(flow, Flow::Quit) {
                    break;
                }
            }
            _ = handle.finished() => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    match state.sessions.stop(user).await {
        Ok(()) | Err(SessionError::NotFound(_)) => {}
        Err(e) => tracing::warn!(error = %e, "stop failed"),
    }
    let _ = printer.await;
    Ok(())
}

async fn dispatch(handle: &SessionHandle, command: Command, resume_delay: &mut f64) -> Flow {
    let mut engine = handle.engine().await;
    let result = match command {
        Command::Message { target, text } => match engine.inject_message(&text, &target).await {
            Ok(replies) if replies.is_empty() => {
                println!("  {}", style("(no answer)").dim());
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        },
        Command::Event(text) => engine.inject_event(&text).await,
        Command::Add {
            species,
            name,
            archetype,
        } => engine
            .add_persona(NewPersona {
                name,
                species,
                archetype,
                demographics: None,
            })
            .await
            .map(|_| ()),
        Command::Remove(name) => engine.remove_persona(&name).await.map(|_| ()),
        Command::Rename { from, to } => engine.rename_persona(&from, &to).await,
        Command::Speed(seconds) => {
            if seconds > 0.0 {
                *resume_delay = seconds;
            }
            engine.set_tick_delay(seconds)
        }
        Command::Pause => {
            let current = engine.tick_delay();
            if current > 0.0 {
                *resume_delay = current;
            }
            engine.set_tick_delay(0.0)
        }
        Command::Resume => engine.set_tick_delay(*resume_delay),
        Command::Agents => {
            println!("{}", personas_table(&engine.stats()));
            Ok(())
        }
        Command::Stats => {
            println!("{}", stats_block(&engine.stats()));
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => return Flow::Quit,
    };

    if let Err(e) = result {
        println!("  {} {e}", style("!").yellow().bold());
    }
    Flow::Continue
}
