use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ChatKind, ChatMemberStatus, ChatMemberUpdated};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use sophie::bot::{Roster, TelegramClient, format_timestamp, member_from_user};
use sophie::config::Config;
use sophie::database::Database;
use sophie::emote::resolver::strip_trigger;
use sophie::emote::{EmoteEngine, EmoteRegistry, Outcome, StatsStore};
use sophie::telegram_log;

struct BotState {
    config: Config,
    engine: EmoteEngine,
    roster: Arc<Roster>,
    telegram: TelegramClient,
    bot_user_id: UserId,
    /// Names a message must start with to address the bot.
    triggers: Vec<String>,
}

impl BotState {
    async fn new(config: Config, bot: &Bot, db: Arc<Database>, registry: EmoteRegistry) -> Self {
        let mut triggers = config.trigger_names.clone();
        let bot_user_id = match bot.get_me().await {
            Ok(me) => {
                info!("Bot user ID: {}, username: @{}", me.id, me.username());
                triggers.push(me.username().to_string());
                triggers.push(me.user.first_name.clone());
                me.id
            }
            Err(e) => {
                warn!("Failed to get bot info: {e}");
                UserId(0)
            }
        };
        if triggers.is_empty() {
            warn!("No trigger names known; the bot will not answer anything");
        }

        let roster = Arc::new(Roster::new(db.clone()));
        let engine = EmoteEngine::new(Arc::new(registry), StatsStore::new(db), roster.clone());

        Self {
            config,
            engine,
            roster,
            telegram: TelegramClient::new(bot.clone()),
            bot_user_id,
            triggers,
        }
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sophie.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::never(&log_dir, "sophie.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        let tg_layer = telegram_log::TelegramLogLayer::new(bot.clone(), log_chat_id);
        registry.with(tg_layer).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting sophie...");
    info!("Loaded config from {config_path}");

    let emotes = match EmoteRegistry::load(&config.emotes_path) {
        Ok(emotes) => emotes,
        Err(e) => {
            error!("Error loading emotes: {e}");
            std::process::exit(1);
        }
    };

    let db = match Database::open(&config.database_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Error opening database: {e}");
            std::process::exit(1);
        }
    };

    let state = Arc::new(BotState::new(config, &bot, db, emotes).await);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_new_message))
        .branch(Update::filter_chat_member().endpoint(handle_chat_member));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_new_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    // Emotes only work in groups; private chats and channels are ignored
    if !matches!(msg.chat.kind, ChatKind::Public(_)) || msg.chat.is_channel() {
        return Ok(());
    }
    if !state.config.is_allowed_group(msg.chat.id) {
        return Ok(());
    }

    let user = match msg.from {
        Some(ref u) => u,
        None => return Ok(()),
    };
    if user.id == state.bot_user_id || user.is_bot {
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    let sender = member_from_user(user);
    let timestamp = format_timestamp(msg.date);
    if let Err(e) = state.roster.record_message(chat_id, &sender, &timestamp) {
        warn!("Failed to record member {}: {e}", sender.user_id);
    }

    let text = match msg.text() {
        Some(t) => t,
        None => return Ok(()),
    };
    let Some(command_text) = strip_trigger(text, &state.triggers) else {
        return Ok(());
    };

    let outcome = match state.engine.handle(chat_id, &sender, command_text) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Emote from {} in chat {} failed: {e}", sender.user_id, chat_id);
            return Ok(());
        }
    };

    match outcome {
        Outcome::Ignored => {}
        Outcome::Interaction(result) => {
            // Counters are already recorded at this point
            if let Err(e) = state.telegram.send_interaction(chat_id, &result, Some(msg.id.0 as i64)).await {
                warn!("Emote recorded but not delivered in chat {}: {e}", chat_id);
            }
        }
        Outcome::EmoteList(verbs) => {
            let text = if verbs.is_empty() {
                "No emotes configured.".to_string()
            } else {
                format!("Available emotes: {}", verbs.join(", "))
            };
            if let Err(e) = state.telegram.send_message(chat_id, &text).await {
                warn!("Emote list not delivered in chat {}: {e}", chat_id);
            }
        }
    }

    Ok(())
}

async fn handle_chat_member(update: ChatMemberUpdated, state: Arc<BotState>) -> ResponseResult<()> {
    if !state.config.is_allowed_group(update.chat.id) {
        return Ok(());
    }

    let chat_id = update.chat.id.0;
    let member = member_from_user(&update.new_chat_member.user);
    let timestamp = format_timestamp(update.date);

    let result = match update.new_chat_member.status() {
        ChatMemberStatus::Member | ChatMemberStatus::Administrator | ChatMemberStatus::Owner => {
            state.roster.member_joined(chat_id, &member, &timestamp)
        }
        ChatMemberStatus::Left => state.roster.member_left(chat_id, member.user_id),
        ChatMemberStatus::Banned => state.roster.member_banned(chat_id, member.user_id),
        _ => Ok(()),
    };

    if let Err(e) = result {
        warn!("Failed to update roster for {} in chat {}: {e}", member.user_id, chat_id);
    }

    Ok(())
}
