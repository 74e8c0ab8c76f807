//! Interactive terminal session.

use std::io::Write;
use std::sync::Arc;

use aia_conversation::{HistoryStats, SendOutcome, SessionController};
use aia_providers::HttpBackend;
use tracing::debug;

use crate::render::TranscriptRenderer;

const HELP: &str = r"
Comandos:
  /clear               limpa o histórico da conversa
  /key <chave>         usa esta API key Groq nas próximas perguntas
  /key                 volta a usar a chave padrão do servidor
  /server-key <chave>  salva a chave na sessão do servidor
  /server-key --clear  remove a chave da sessão do servidor
  /help                mostra esta ajuda
  exit, quit, q        encerra

Qualquer outro texto é enviado como pergunta.
";

/// One line of input, interpreted.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Exit,
    Help,
    Clear,
    SetKey(Option<&'a str>),
    ServerKey(&'a str),
    ClearServerKey,
    Unknown(&'a str),
    Message(&'a str),
}

impl<'a> ReplCommand<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();

        if matches!(line, "exit" | "quit" | "q") {
            return Self::Exit;
        }

        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line);
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, rest)| (name, rest.trim()));

        match (name, rest) {
            ("help", _) => Self::Help,
            ("clear", _) => Self::Clear,
            ("key", "") => Self::SetKey(None),
            ("key", key) => Self::SetKey(Some(key)),
            ("server-key", "--clear") => Self::ClearServerKey,
            ("server-key", key) if !key.is_empty() => Self::ServerKey(key),
            _ => Self::Unknown(line),
        }
    }
}

pub struct Repl {
    session: SessionController<Arc<HttpBackend>>,
    backend: Arc<HttpBackend>,
    renderer: TranscriptRenderer,
}

impl Repl {
    pub const fn new(
        session: SessionController<Arc<HttpBackend>>,
        backend: Arc<HttpBackend>,
        renderer: TranscriptRenderer,
    ) -> Self {
        Self {
            session,
            backend,
            renderer,
        }
    }

    /// Read lines from stdin until the user leaves or input ends.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut stdout = std::io::stdout();

        println!("=== Asteca AIA ===");
        println!("Digite /help para ver os comandos.");
        self.renderer.render(&mut stdout)?;

        loop {
            print!("> ");
            stdout.flush()?;

            let mut input = String::new();
            if std::io::stdin().read_line(&mut input)? == 0 {
                break;
            }

            match ReplCommand::parse(&input) {
                ReplCommand::Exit => break,
                ReplCommand::Help => println!("{HELP}"),
                ReplCommand::Clear => {
                    self.session.clear().await;
                    println!("Histórico limpo.");
                }
                ReplCommand::SetKey(key) => {
                    let set = key.is_some();
                    self.session.set_credential(key.map(str::to_owned)).await;
                    if set {
                        println!("API key definida para esta sessão.");
                    } else {
                        println!("Usando a chave padrão do servidor.");
                    }
                }
                ReplCommand::ServerKey(key) => match self.backend.set_server_key(key).await {
                    Ok(_) => println!("Chave salva no servidor."),
                    Err(e) => println!("⚠ {}", e.user_message_or("Erro ao salvar a chave.")),
                },
                ReplCommand::ClearServerKey => match self.backend.clear_server_key().await {
                    Ok(_) => println!("Chave removida do servidor."),
                    Err(e) => println!("⚠ {}", e.user_message_or("Erro ao remover a chave.")),
                },
                ReplCommand::Unknown(line) => {
                    println!("Comando desconhecido: {line}. Digite /help.");
                }
                ReplCommand::Message(text) => {
                    if !text.is_empty() {
                        println!("Consultando...");
                    }
                    let outcome = self.session.send(text).await;
                    debug!("Turn outcome: {outcome:?}");

                    if let SendOutcome::RolledBack(error) = &outcome {
                        println!("⚠ {error}");
                    }
                }
            }

            self.renderer.render(&mut stdout)?;
        }

        let stats = HistoryStats::of(&self.session.snapshot().transcript);
        println!(
            "\nSessão encerrada. Perguntas: {}, respostas: {}",
            stats.user_messages, stats.assistant_messages
        );

        Ok(())
    }
}
