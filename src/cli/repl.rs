//! REPL loop: reads commands and prints what changed in the [`App`].

use std::io::{self, Write};

use futures::stream::{self, FuturesUnordered, Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};

use super::command::{Command, HELP};
use crate::app::{App, LoadSummary, Mode};
use crate::catalog::Agent;
use crate::chat::{ChatEvent, Completion, MessageSender};
use crate::error::ApiError;
use crate::experience::Transition;
use crate::notify::Notification;
use crate::view;

/// Lines from stdin as a stream. Ends on EOF or a read error.
pub fn stdin_lines() -> impl Stream<Item = String> + Unpin + Send {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    }))
}

pub struct Repl<W: Write> {
    app: App,
    out: W,
    /// Agent named in chat output, tracked from `ChatEvent`s.
    chat_agent: Option<Agent>,
    // Subscribed at construction so nothing published before `run` is lost.
    notes: Option<broadcast::Receiver<Notification>>,
    events: Option<broadcast::Receiver<ChatEvent>>,
    selections: FuturesUnordered<JoinHandle<Result<Completion, ApiError>>>,
    sends: FuturesUnordered<JoinHandle<Completion>>,
}

impl<W: Write> Repl<W> {
    pub fn new(app: App, out: W) -> Self {
        let notes = Some(app.notifier().subscribe());
        let events = Some(app.chat().subscribe());
        Self {
            app,
            out,
            chat_agent: None,
            notes,
            events,
            selections: FuturesUnordered::new(),
            sends: FuturesUnordered::new(),
        }
    }

    /// Load the catalog. Failures are shown once the loop runs.
    pub async fn load(&mut self) -> LoadSummary {
        self.app.load().await
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (App, W) {
        (self.app, self.out)
    }

    /// Run until `/quit` or the end of `lines`.
    pub async fn run<S>(&mut self, mut lines: S) -> io::Result<()>
    where
        S: Stream<Item = String> + Unpin,
    {
        let mut notes = self
            .notes
            .take()
            .unwrap_or_else(|| self.app.notifier().subscribe());
        let mut events = self
            .events
            .take()
            .unwrap_or_else(|| self.app.chat().subscribe());

        self.print_mode_home().await?;
        self.prompt();

        loop {
            tokio::select! {
                line = lines.next() => {
                    let Some(line) = line else { break };
                    if !self.handle_line(&line).await? {
                        break;
                    }
                    self.prompt();
                }
                Ok(note) = notes.recv() => self.print_notification(&note)?,
                Ok(event) = events.recv() => self.print_chat_event(event)?,
                Some(joined) = self.selections.next(), if !self.selections.is_empty() => {
                    self.settle_selection(joined).await?;
                }
                Some(joined) = self.sends.next(), if !self.sends.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Message relay task failed");
                    }
                }
            }
        }

        // Flush whatever was published by the last command.
        while let Ok(note) = notes.try_recv() {
            self.print_notification(&note)?;
        }
        loop {
            match events.try_recv() {
                Ok(event) => self.print_chat_event(event)?,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        self.notes = Some(notes);
        self.events = Some(events);
        self.out.flush()
    }

    fn prompt(&self) {
        eprint!("> ");
    }

    /// Handle one input line. Returns `false` when the user asked to quit.
    pub async fn handle_line(&mut self, line: &str) -> io::Result<bool> {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(true),
            Err(msg) => {
                writeln!(self.out, "{msg}")?;
                return Ok(true);
            }
        };
        tracing::debug!(?command, "REPL command");

        match command {
            Command::Quit => return Ok(false),
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Agents => {
                let active = self.app.chat().active_agent().await;
                let cards = view::agent_cards(
                    self.app.catalog().agents(),
                    active.as_ref().map(|a| a.id.as_str()),
                );
                writeln!(self.out, "{cards}")?;
            }
            Command::Experiences => {
                let cards = view::experience_cards(self.app.catalog().experiences());
                writeln!(self.out, "{cards}")?;
            }
            Command::Mode(mode) => {
                self.app.show_mode(mode).await;
                self.print_mode_home().await?;
            }
            Command::Select(agent_id) => {
                // Unknown agents are reported through notifications.
                if let Ok(task) = self.app.select_agent(&agent_id).await {
                    self.selections.push(task);
                }
            }
            Command::Start(experience_id) => {
                if self.app.start_experience(&experience_id).await.is_ok() {
                    self.print_navigator()?;
                }
            }
            Command::Next => {
                let transition = self.app.next_stage();
                self.print_transition(transition)?;
            }
            Command::Prev => {
                let transition = self.app.prev_stage();
                self.print_transition(transition)?;
            }
            Command::Close => match self.app.mode() {
                Mode::Guided => self.app.close_experience(),
                Mode::Free => self.app.close_chat().await,
            },
            Command::Transcript => {
                let agent = self.app.chat().active_agent().await;
                let messages = self.app.chat().transcript().await;
                writeln!(self.out, "{}", view::transcript(&messages, agent.as_ref()))?;
            }
            Command::History => {
                if let Ok(entries) = self.app.history().await {
                    writeln!(self.out, "{}", view::history(&entries))?;
                }
            }
            Command::ClearHistory => {
                let _ = self.app.clear_history().await;
            }
            Command::Health => match self.app.health().await {
                Ok(status) => writeln!(self.out, "{}", view::health(&status))?,
                Err(e) => writeln!(self.out, "Servidor no disponible: {e}")?,
            },
            Command::Say(text) => {
                // Rejections are reported through notifications.
                if let Ok(task) = self.app.send_message(&text).await {
                    self.sends.push(task);
                }
            }
        }
        Ok(true)
    }

    /// Apply a finished selection, showing the agents if it switched modes.
    async fn settle_selection(
        &mut self,
        joined: Result<Result<Completion, ApiError>, JoinError>,
    ) -> io::Result<()> {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Agent selection task failed");
                return Ok(());
            }
        };
        let before = self.app.mode();
        self.app.settle_selection(&outcome).await;
        if self.app.mode() != before {
            self.print_mode_home().await?;
        }
        Ok(())
    }

    async fn print_mode_home(&mut self) -> io::Result<()> {
        match self.app.mode() {
            Mode::Free => {
                writeln!(self.out, "== Exploración libre ==")?;
                let active = self.app.chat().active_agent().await;
                let cards = view::agent_cards(
                    self.app.catalog().agents(),
                    active.as_ref().map(|a| a.id.as_str()),
                );
                writeln!(self.out, "{cards}")
            }
            Mode::Guided => {
                writeln!(self.out, "== Experiencias guiadas ==")?;
                let cards = view::experience_cards(self.app.catalog().experiences());
                writeln!(self.out, "{cards}")
            }
        }
    }

    fn print_navigator(&mut self) -> io::Result<()> {
        let view = self.app.navigator().current_view();
        if let Some(panel) = view::navigator(&view, self.app.catalog()) {
            writeln!(self.out, "{panel}")?;
        }
        Ok(())
    }

    fn print_transition(&mut self, transition: Transition) -> io::Result<()> {
        match transition {
            Transition::Moved { .. } => self.print_navigator(),
            // Completion is announced by a notification.
            Transition::Completed => Ok(()),
            Transition::Ignored if self.app.navigator().is_idle() => {
                writeln!(self.out, "No hay una experiencia activa. Usa /start <experiencia>.")
            }
            Transition::Ignored => Ok(()),
        }
    }

    fn print_notification(&mut self, note: &Notification) -> io::Result<()> {
        writeln!(self.out, "{}", view::notification(note))
    }

    fn print_chat_event(&mut self, event: ChatEvent) -> io::Result<()> {
        match event {
            ChatEvent::Opened { agent } => {
                writeln!(self.out, "Chat con {}", agent.name)?;
                self.chat_agent = Some(agent);
            }
            ChatEvent::Message { message } => {
                // The user's own line is already on screen.
                if message.sender == MessageSender::Agent {
                    writeln!(
                        self.out,
                        "{}",
                        view::message(&message, self.chat_agent.as_ref())
                    )?;
                }
            }
            ChatEvent::Restored { agent, transcript } => {
                writeln!(
                    self.out,
                    "{}",
                    view::transcript(&transcript, Some(&agent))
                )?;
                self.chat_agent = Some(agent);
            }
            ChatEvent::BusyChanged { busy: true } => writeln!(self.out, "Enviando...")?,
            ChatEvent::BusyChanged { busy: false } => {}
            ChatEvent::Closed => {
                self.chat_agent = None;
                writeln!(self.out, "Chat cerrado.")?;
            }
        }
        Ok(())
    }
}
