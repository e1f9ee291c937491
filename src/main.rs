use mimalloc::MiMalloc;
use modules::{
    bridge::{
        session::BridgeSession,
        state::{BridgePhase, SessionState},
    },
    common::{rustls::BridgeTls, signal::SignalManager, signal::SIGNAL_MANAGER},
    context::Initialize,
    error::BridgeResult,
    identity::{IdentityMapper, VirtualIdentity},
    imap::{source::ImapMailboxSource, MailboxConfig},
    logger,
    matrix::{
        appservice::AppserviceState, client::MatrixClient, registration::Registration,
        transport::MatrixTransport, MatrixConfig,
    },
    poller::{MailPoller, PollerConfig},
    relay::{spawn_consumer, RelayConfig, RoomEventRelay},
    scheduler::periodic::PeriodicTask,
    settings::cli::SETTINGS,
    smtp::{sink::SmtpMailSink, SmtpConfig},
    transport::{ChatTransport, RoomSink},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const ROOM_EVENT_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> BridgeResult<()> {
    logger::initialize_logging();
    info!("Starting mailbridge");
    info!("Version:  {}", bridge_version!());

    let matrix_config = MatrixConfig::from(&*SETTINGS);
    let mapper = IdentityMapper::new(
        SETTINGS.bridge_user_prefix.clone(),
        SETTINGS.bridge_matrix_domain.clone(),
    );

    if SETTINGS.bridge_generate_registration {
        let registration = Registration::generate(
            &SETTINGS.bridge_public_url,
            &matrix_config.bot_localpart,
            &mapper.namespace_regex(),
        );
        registration.save(&matrix_config.registration_path)?;
        info!(
            "Wrote appservice registration to {}",
            matrix_config.registration_path.display()
        );
        return Ok(());
    }

    if let Err(error) = SETTINGS.validate() {
        error!("Invalid configuration: {}", error);
        std::process::exit(1);
    }

    if let Err(error) = run(matrix_config, mapper).await {
        error!("Bridge failed to start: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(matrix_config: MatrixConfig, mapper: IdentityMapper) -> BridgeResult<()> {
    BridgeTls::initialize().await?;
    SignalManager::initialize().await?;

    let registration = Registration::load(&matrix_config.registration_path)?;
    let bot = VirtualIdentity::new(
        matrix_config.bot_localpart.clone(),
        matrix_config.domain.clone(),
    );
    let state = Arc::new(SessionState::new(matrix_config.room_id.clone(), bot.clone()));

    let relay = Arc::new(RoomEventRelay::new(
        Arc::new(SmtpMailSink::new(SmtpConfig::from(&*SETTINGS))),
        mapper.clone(),
        state.clone(),
        RelayConfig::from_settings(&SETTINGS, bot.user_id()),
    ));
    let (events, receiver) = mpsc::channel(ROOM_EVENT_QUEUE);
    let _consumer = spawn_consumer(relay, receiver);

    let client = Arc::new(MatrixClient::new(
        &matrix_config.homeserver_url,
        registration.as_token.clone(),
    )?);
    let appservice = Arc::new(AppserviceState::new(
        registration.hs_token.clone(),
        events,
        mapper.clone(),
        client.clone(),
        state.clone(),
    ));
    let transport = Arc::new(MatrixTransport::new(
        &matrix_config,
        client,
        appservice,
        bot,
    ));

    let session = BridgeSession::new(transport.clone() as Arc<dyn ChatTransport>, state);
    let phase = session.start().await?;

    let poll_task = if phase == BridgePhase::Ready {
        let poller = Arc::new(MailPoller::new(
            ImapMailboxSource::new(MailboxConfig::from(&*SETTINGS)),
            transport as Arc<dyn RoomSink>,
            mapper,
            session.state().clone(),
            PollerConfig::from(&*SETTINGS),
        ));
        let interval = poller.interval();
        Some(PeriodicTask::new("mail-poller").start(
            move || {
                let poller = poller.clone();
                async move {
                    poller.tick().await;
                    Ok(())
                }
            },
            interval,
            true,
        ))
    } else {
        info!("Mail polling disabled, bridge is {}", phase);
        None
    };

    SIGNAL_MANAGER.wait().await;
    if let Some(task) = poll_task {
        task.cancel().await;
    }
    info!("mailbridge stopped");
    Ok(())
}
