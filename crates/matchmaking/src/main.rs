use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use app::{AppBuilder, Application};
use clap::Parser;
use matchmaking::{
    Friend, FriendsBackend, LoopbackFriends, LoopbackMatchmaking, LoopbackService,
    MatchmakingBackend, MatchmakingConfig, MatchmakingEvent, RecordingObserver,
    SessionCoordinator, UserId,
};
use tracing::{info, warn};

/// Upper bound of pump rounds before a coordinator is considered stuck.
const MAX_PUMP_ROUNDS: usize = 16;

#[derive(Parser)]
#[command(
    name = "matchmaking",
    version,
    about = "Hosts a session and lets clients find and join it over the loopback service"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host and search LAN sessions
    #[arg(long)]
    lan: bool,
    /// Host and search presence sessions
    #[arg(long)]
    presence: bool,
    /// Map advertised by the host
    #[arg(long, default_value = "Highlands")]
    map: String,
    /// Maximum players; defaults to `session.default_max_players`
    #[arg(long)]
    max_players: Option<u32>,
    /// Number of clients trying to join
    #[arg(long, default_value_t = 2)]
    players: usize,
    /// Overrides the log directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

struct MatchmakingDemo;

impl Application for MatchmakingDemo {
    const APP_ID: &'static str = "matchmaking";
}

type Coordinator<F> = SessionCoordinator<LoopbackMatchmaking, RecordingObserver, F>;

/// Pumps until the backends go quiet.
fn settle<B, F>(coordinator: &mut SessionCoordinator<B, RecordingObserver, F>) -> Result<()>
where
    B: MatchmakingBackend,
    F: FriendsBackend,
{
    for _ in 0..MAX_PUMP_ROUNDS {
        if coordinator.pump() == 0 && coordinator.is_idle() {
            return Ok(());
        }
    }
    bail!(
        "coordinator did not settle, still pending: {:?}",
        coordinator.pending_operations()
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = AppBuilder::<MatchmakingDemo>::new(env!("CARGO_PKG_VERSION"));
    if let Some(dir) = &cli.log_dir {
        builder = builder.with_log_dir(dir);
    }
    let ctx = builder.build().map_err(|err| anyhow!(err))?;
    info!(
        log_dir = %ctx.log_dir().display(),
        "{} {} logging to {}",
        ctx.app_id(),
        ctx.version(),
        ctx.log_file().display()
    );

    let config = match &cli.config {
        Some(path) => MatchmakingConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MatchmakingConfig::default(),
    };
    let game = config.session.game_session_name();
    let max_players = cli
        .max_players
        .unwrap_or(config.session.default_max_players);

    let service = LoopbackService::new();
    let clients: Vec<(String, UserId)> = (1..=cli.players)
        .map(|index| (format!("client-{index}"), UserId::new()))
        .collect();

    let friends = LoopbackFriends::new().with_list(
        0,
        config.friends.default_list.clone(),
        clients
            .iter()
            .map(|(name, user)| Friend::new(*user, name.clone(), true))
            .collect(),
    );
    let host_user = UserId::new();
    let mut host: Coordinator<LoopbackFriends> = SessionCoordinator::with_backends(
        service.endpoint("host"),
        friends,
        RecordingObserver::new(),
    )
    .with_config(config.clone());

    host.create_session(
        host_user,
        game.clone(),
        &cli.map,
        cli.lan,
        cli.presence,
        max_players,
    )?;
    settle(&mut host)?;
    match host.observer_mut().take().pop() {
        Some(MatchmakingEvent::SessionReady { ok: true, .. }) => {
            info!("host is serving {game} on {}", cli.map)
        }
        other => bail!("hosting {game} failed: {other:?}"),
    }

    let mut joined = Vec::new();
    for (name, user) in &clients {
        let mut client =
            SessionCoordinator::new(service.endpoint(name.clone()), RecordingObserver::new())
                .with_config(config.clone());

        client.find_sessions(*user, cli.lan, cli.presence)?;
        settle(&mut client)?;
        let Some(target) = client.search_results().first().cloned() else {
            warn!("{name} found no sessions");
            continue;
        };

        client.join_session(*user, game.clone(), &target)?;
        settle(&mut client)?;
        match client.observer_mut().take().pop() {
            Some(MatchmakingEvent::JoinResult { result, .. }) if result.is_success() => {
                info!("{name} joined {}'s session", target.owning_user_name);
                joined.push(client);
            }
            Some(MatchmakingEvent::JoinResult { result, .. }) => {
                warn!("{name} could not join: {result}")
            }
            other => warn!("{name}: unexpected outcome {other:?}"),
        }
    }

    host.read_default_friends_list(0)?;
    settle(&mut host)?;
    for friend in host.friends() {
        let status = if friend.online { "online" } else { "offline" };
        info!("friend {} ({status})", friend.display_name);
    }

    for client in &mut joined {
        client.destroy_session(game.clone())?;
        settle(client)?;
    }
    host.destroy_session(game.clone())?;
    settle(&mut host)?;

    info!(
        joined = joined.len(),
        sessions_left = service.session_count(),
        registrations_added = host.backend().registrations_added(),
        registrations_cleared = host.backend().registrations_cleared(),
        "matchmaking run finished"
    );
    Ok(())
}
