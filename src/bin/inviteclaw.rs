use inviteclaw::authz::AuthorizationGate;
use inviteclaw::config::{ensure_org_level_allowlist, load_env_config};
use inviteclaw::handler::MentionHandler;
use inviteclaw::logging::BotLog;
use inviteclaw::resolve::ChannelResolver;
use inviteclaw::slack::socket::{run_socket_loop, DEFAULT_RECONNECT_BACKOFF_MS};
use inviteclaw::slack::SlackApiClient;

fn output_header() -> &'static str {
    "InviteClaw\nInviteClaw joins Slack channels and invites a target bot account on mention commands."
}

fn print_header() {
    println!("{}\n", output_header());
}

fn run() -> Result<(), String> {
    print_header();

    let config = load_env_config().map_err(|err| err.to_string())?;
    let api = SlackApiClient::new(config.bot_token.clone(), config.app_token.clone());
    let auth = api
        .auth_test()
        .map_err(|err| format!("Failed to verify bot credentials: {err}"))?;
    ensure_org_level_allowlist(&config, &auth).map_err(|err| err.to_string())?;

    let log = BotLog::new(&config.state_root);
    log.info(
        "startup",
        &format!("authenticated as {}; entering socket mode", auth.user_id),
    );

    let handler = MentionHandler {
        api,
        bot_user_id: auth.user_id,
        groups_path: config.groups_path,
        resolver: ChannelResolver::new(),
        gate: AuthorizationGate::new(config.allowed_users),
        log,
    };

    run_socket_loop(&handler, DEFAULT_RECONNECT_BACKOFF_MS).map_err(|err| err.to_string())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
