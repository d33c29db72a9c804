//! `peerchat`: a line-oriented front end for chatting with one peer over a
//! manually negotiated connection.

use anyhow::{anyhow, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use peerchat_client::{AppState, ClientConfig, ClientError, Delivery, SyncEngine, SyncEvent};
use peerchat_net::{NetError, Negotiator, WebRtcTransport};
use peerchat_shared::constants::APP_NAME;
use peerchat_shared::session::SessionContext;
use peerchat_shared::types::{ChatId, UserId};

const HELP: &str = "\
Commands:
  register <phone> <username> <avatar>   create an account (+256 and 9 digits)
  login <phone> | logout | whoami
  contacts                               known users
  chats                                  your conversations and groups
  open <phone>                           start a conversation
  group <name> <phone>...                create a group
  messages <chat-id|phone>               show a conversation
  send <chat-id|phone> <text>            send a message
  offer                                  start a connection, prints an offer
  accept <offer>                         answer a peer's offer, prints an answer
  finalize <answer>                      complete a connection you offered
  cancel                                 drop the current connection
  help | quit";

enum Flow {
    Continue,
    Quit,
}

struct Repl {
    app: AppState,
    config: ClientConfig,
    notify: mpsc::Sender<SyncEvent>,
    engine: Option<SyncEngine<WebRtcTransport>>,
    /// Offer created, answer not yet pasted.
    pending: Option<Negotiator<WebRtcTransport>>,
    /// Cancels the background task owning the connecting or live link.
    live: Option<oneshot::Sender<()>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    peerchat_client::init_tracing();
    info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let mut app = AppState::open(&config)?;
    let restored = app.restore()?;

    let (notify, mut events) = mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let mut repl = Repl {
        app,
        config,
        notify,
        engine: None,
        pending: None,
        live: None,
    };
    if let Some(session) = restored {
        println!("Welcome back, {}.", session.user().username);
        repl.on_login(session);
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match repl.dispatch(line.trim()).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => report(&e),
        }
    }

    repl.cancel().await;
    Ok(())
}

impl Repl {
    async fn dispatch(&mut self, line: &str) -> anyhow::Result<Flow> {
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        match cmd {
            "" => {}
            "help" => println!("{HELP}"),
            "quit" | "exit" => return Ok(Flow::Quit),

            "register" => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                let [phone, username, avatar] = args.as_slice() else {
                    bail!("usage: register <phone> <username> <avatar>");
                };
                let user = self.app.register(phone, username, avatar)?;
                println!("Registered {} ({}). Now `login {}`.", user.username, user.phone, user.phone);
            }
            "login" => {
                self.cancel().await;
                let session = self.app.login(rest)?;
                println!("Logged in as {}.", session.user().username);
                self.on_login(session);
            }
            "logout" => {
                self.cancel().await;
                self.app.logout()?;
                self.engine = None;
                println!("Logged out.");
            }
            "whoami" => {
                let session = self.app.session()?;
                let user = session.user();
                println!(
                    "{} {} ({}), logged in since {}",
                    user.avatar,
                    user.username,
                    user.phone,
                    session.started_at().format("%d %b %H:%M")
                );
            }

            "contacts" => {
                for user in self.app.contacts()? {
                    println!("{} {} ({})", user.avatar, user.username, user.phone);
                }
            }
            "chats" => {
                let me = self.app.session()?.user_id().clone();
                for c in self.app.conversations()? {
                    let peer = c.peer_of(&me).unwrap_or(&me);
                    println!("{}  with {}  {}", c.id, peer, c.last_message);
                }
                for g in self.app.groups()? {
                    println!("{}  {} ({} members)", g.id, g.name, g.participants.len());
                }
            }
            "open" => {
                let conversation = self.app.open_conversation(&UserId::new(rest))?;
                println!("{}", conversation.id);
            }
            "group" => {
                let mut args = rest.split_whitespace();
                let name = args
                    .next()
                    .ok_or_else(|| anyhow!("usage: group <name> <phone>..."))?;
                let members: Vec<UserId> = args.map(UserId::new).collect();
                let group = self.app.create_group(name, &members)?;
                println!(
                    "Created {} ({}) with {} participants.",
                    group.name,
                    group.id,
                    group.participants.len()
                );
            }
            "messages" => {
                let chat = self.resolve_chat(rest)?;
                for m in self.app.messages(&chat)? {
                    println!("[{}] {}: {}", m.timestamp.format("%d %b %H:%M"), m.sender, m.content);
                }
            }
            "send" => {
                let (target, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("usage: send <chat-id|phone> <text>"))?;
                let chat = self.resolve_chat(target)?;
                let engine = self.engine.as_ref().ok_or(ClientError::NotAuthenticated)?;
                let out = engine.send_message(&chat, text).await?;
                match out.delivery {
                    Delivery::Sent => println!("sent"),
                    Delivery::NotConnected => println!("saved locally; no peer connected"),
                }
            }

            "offer" => {
                let mut negotiator = self.negotiator().await?;
                let offer = negotiator.create_offer().await?;
                println!("Give this offer to your peer:\n\n{offer}\n");
                println!("Then paste their reply with `finalize <answer>`.");
                self.pending = Some(negotiator);
            }
            "accept" => {
                let mut negotiator = self.negotiator().await?;
                match negotiator.accept_offer(rest).await {
                    Ok(answer) => {
                        println!("Give this answer back to your peer:\n\n{answer}\n");
                        self.connect_in_background(negotiator);
                    }
                    Err(e) => {
                        negotiator.abandon().await;
                        return Err(e.into());
                    }
                }
            }
            "finalize" => {
                let mut negotiator = self.pending.take().ok_or(NetError::ProtocolSequence {
                    state: "idle",
                    operation: "finalize an answer",
                })?;
                match negotiator.finalize(rest).await {
                    Ok(()) => self.connect_in_background(negotiator),
                    Err(e) => {
                        if e.is_recoverable() {
                            self.pending = Some(negotiator);
                        } else {
                            negotiator.abandon().await;
                        }
                        return Err(e.into());
                    }
                }
            }
            "cancel" => {
                self.cancel().await;
                println!("Connection dropped.");
            }

            other => bail!("unknown command `{other}`, try `help`"),
        }

        Ok(Flow::Continue)
    }

    fn on_login(&mut self, session: SessionContext) {
        self.engine = Some(SyncEngine::new(session, self.app.db()));
    }

    /// A phone number means the conversation with that user.
    fn resolve_chat(&self, arg: &str) -> anyhow::Result<ChatId> {
        let phone = UserId::new(arg);
        if phone.is_valid_phone() {
            Ok(self.app.open_conversation(&phone)?.id.into())
        } else if arg.is_empty() {
            bail!("missing chat id")
        } else {
            Ok(ChatId::new(arg))
        }
    }

    /// A fresh negotiator; any previous attempt is dropped first.
    async fn negotiator(&mut self) -> anyhow::Result<Negotiator<WebRtcTransport>> {
        let session = self.app.session()?.clone();
        self.cancel().await;
        let negotiator = Negotiator::webrtc(session, self.config.transport())
            .await?
            .with_open_timeout(self.config.open_timeout);
        Ok(negotiator)
    }

    fn connect_in_background(&mut self, mut negotiator: Negotiator<WebRtcTransport>) {
        let Some(engine) = self.engine.clone() else {
            return;
        };
        let notify = self.notify.clone();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        self.live = Some(cancel_tx);
        println!("Waiting for the connection to open...");

        tokio::spawn(async move {
            let outcome = tokio::select! {
                res = negotiator.wait_connected() => Some(res),
                _ = &mut cancel_rx => None,
            };

            match outcome {
                None => {}
                Some(Err(e)) => eprintln!("Connection failed: {e}\n{}", e.user_hint()),
                Some(Ok(link)) => {
                    println!("Connected.");
                    tokio::select! {
                        _ = engine.run(link, notify) => {}
                        _ = &mut cancel_rx => {}
                    }
                    engine.detach();
                }
            }

            negotiator.abandon().await;
        });
    }

    async fn cancel(&mut self) {
        if let Some(cancel) = self.live.take() {
            let _ = cancel.send(());
        }
        if let Some(mut negotiator) = self.pending.take() {
            negotiator.abandon().await;
        }
    }
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::ConversationReady { peer, conversation } => {
            println!(
                "{} {} ({}) is here. Conversation {}",
                peer.avatar, peer.username, peer.phone, conversation.id
            );
        }
        SyncEvent::MessageStored(m) => println!("[{}] {}: {}", m.chat_id, m.sender, m.content),
        SyncEvent::Duplicate(_) | SyncEvent::Ignored(_) => {}
        SyncEvent::Disconnected => println!("Peer disconnected."),
    }
}

fn report(e: &anyhow::Error) {
    let net = e.downcast_ref::<NetError>().or_else(|| match e.downcast_ref::<ClientError>() {
        Some(ClientError::Net(net)) => Some(net),
        _ => None,
    });
    match net {
        Some(net) => eprintln!("error: {net}\n{}", net.user_hint()),
        None => eprintln!("error: {e}"),
    }
}
