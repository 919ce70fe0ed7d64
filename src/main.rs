use std::{collections::HashMap, error::Error, io, process};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, LevelFilter};
use tokio_util::sync::CancellationToken;

use vaulture::{
    api::{Api, ApiRequest},
    auth::BrowserSession,
    config::{Config, Secrets},
    error::ErrorKind,
    exchange::api_key_header,
    protocol::{bungie, spotify},
    provider::{self, Provider},
    session::LoginSession,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when built in release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// Ensure that this file is kept secure and not shared publicly, as
    /// it contains OAuth client registrations and API keys.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("secrets.toml"))]
    secrets_file: String,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    screen: Screen,
}

/// One subcommand per screen; each owns its own login session and
/// credential for the lifetime of the command.
#[derive(Clone, Debug, Subcommand)]
enum Screen {
    /// Log in with the game account and browse characters and inventory
    Bungie {
        /// Character to fetch the inventory for, by listed position
        #[arg(short, long, default_value_t = 0)]
        character: usize,

        /// Create a loadout with this name from the selected items
        #[arg(long, requires = "items")]
        loadout: Option<String>,

        /// Loadout description
        #[arg(long, default_value_t = String::new())]
        description: String,

        /// Item instance IDs to put in the loadout
        #[arg(long, value_delimiter = ',')]
        items: Vec<String>,
    },

    /// Log in with the music account and show profile and playlists
    Spotify,

    /// Sign in with the identity provider and exchange for a session
    Identity,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence
/// from highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Loads the secrets from a file.
///
/// # Errors
///
/// Returns an error if the file could not be read. This could be due to
/// the file not existing or not having the correct permissions.
fn load_secrets(secrets_file: &str) -> io::Result<Secrets> {
    let secrets = Secrets::from_file(secrets_file);

    if let Err(ref e) = secrets {
        if e.kind() == io::ErrorKind::NotFound {
            info!("read the documentation on how to set up your {secrets_file}");
        }
    }

    secrets
}

/// Cancellation token that fires on Ctrl-C.
///
/// Dismissing the login this way ends the attempt as `Cancelled`, the
/// headless equivalent of closing the in-app browser.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

/// Runs a login attempt and renders cancellation neutrally.
///
/// Returns `Ok(false)` when the user cancelled: the screen stops
/// without an error banner.
async fn login(
    session: &mut LoginSession,
    api: &Api,
) -> Result<bool, Box<dyn Error>> {
    let cancel = cancel_on_ctrl_c();
    match session.login(api.http(), cancel).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind == ErrorKind::Cancelled => {
            info!("login cancelled by the user");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Game screen: characters, inventory and optionally a new loadout.
async fn run_bungie(
    config: &Config,
    character: usize,
    loadout: Option<String>,
    description: String,
    items: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let api = Api::new(config)?;
    let mut session = LoginSession::new(Provider::bungie(config)?, Box::new(BrowserSession));
    if !login(&mut session, &api).await? {
        return Ok(());
    }

    let credential = session
        .credential()
        .ok_or("no credential after login")?
        .clone();
    let api_key = config
        .secrets
        .bungie_api_key
        .as_deref()
        .ok_or("bungie_api_key missing from secrets")?
        .parse::<reqwest::header::HeaderValue>()
        .map_err(|e| format!("API key is not a valid header value: {e}"))?;
    let platform_get = |url| ApiRequest::get(url).with_header(api_key_header(), api_key.clone());

    let memberships: bungie::Envelope<bungie::Memberships> = api
        .fetch(&platform_get(provider::bungie::memberships_url()), &credential)
        .await?;
    let membership = memberships
        .into_response()?
        .destiny_memberships
        .into_iter()
        .next()
        .ok_or("no game memberships on this account")?;
    info!(
        "membership: {} (type {})",
        membership.membership_id, membership.membership_type
    );

    let profile: bungie::Envelope<bungie::ProfileCharacters> = api
        .fetch(
            &platform_get(provider::bungie::profile_url(
                membership.membership_type,
                &membership.membership_id,
            )),
            &credential,
        )
        .await?;
    let mut characters: Vec<bungie::Character> = profile
        .into_response()?
        .characters
        .data
        .into_values()
        .collect();
    characters.sort_by(|a, b| a.character_id.cmp(&b.character_id));

    if characters.is_empty() {
        return Err("no characters on this membership".into());
    }
    for (position, character) in characters.iter().enumerate() {
        println!(
            "[{position}] {} {} (light {})",
            character.race_name(),
            character.class_name(),
            character.light
        );
    }

    let selected = characters
        .get(character)
        .ok_or("character position out of range")?;
    info!(
        "fetching inventory for {} {}",
        selected.race_name(),
        selected.class_name()
    );

    let inventory: bungie::Envelope<bungie::CharacterInventory> = api
        .fetch(
            &platform_get(provider::bungie::character_url(
                membership.membership_type,
                &membership.membership_id,
                &selected.character_id,
            )),
            &credential,
        )
        .await?;
    let inventory = inventory.into_response()?.inventory.data.items;

    // The manifest only points at the definition tables; a secondary
    // fetch retrieves the actual item names.
    let manifest: bungie::Envelope<bungie::Manifest> = api
        .fetch(&platform_get(provider::bungie::manifest_url()), &credential)
        .await?;
    let definitions_path = manifest
        .into_response()?
        .item_definition_path(&config.app_lang)
        .ok_or("manifest lists no item definitions")?
        .to_string();
    let definitions: HashMap<String, bungie::ItemDefinition> = api
        .fetch(
            &ApiRequest::get(provider::bungie::content_url(&definitions_path)),
            &credential,
        )
        .await?;

    let mut gear = 0;
    for item in &inventory {
        let Some(definition) = definitions.get(&item.item_hash.to_string()) else {
            continue;
        };
        if !definition.is_gear() {
            continue;
        }
        gear += 1;
        let kind = if definition.item_type == bungie::ItemDefinition::ITEM_TYPE_WEAPON {
            "weapon"
        } else {
            "armor"
        };
        println!(
            "{} ({kind}) {}",
            definition.display_properties.name,
            item.item_instance_id.as_deref().unwrap_or("-")
        );
    }
    info!("{gear} of {} items are gear", inventory.len());

    if let Some(name) = loadout {
        let body = bungie::CreateLoadout {
            name,
            description,
            items,
        };
        let request = ApiRequest::post(
            provider::bungie::create_loadout_url(),
            serde_json::to_string(&body)?,
        )
        .with_header(api_key_header(), api_key);
        let response = api.call(&request, &credential).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    Ok(())
}

/// Music screen: profile and playlists.
async fn run_spotify(config: &Config) -> Result<(), Box<dyn Error>> {
    let api = Api::new(config)?;
    let mut session = LoginSession::new(Provider::spotify(config)?, Box::new(BrowserSession));
    if !login(&mut session, &api).await? {
        return Ok(());
    }

    let credential = session
        .credential()
        .ok_or("no credential after login")?
        .clone();

    let user: spotify::PrivateUser = api
        .fetch(&ApiRequest::get(provider::spotify::me_url()), &credential)
        .await?;
    println!(
        "{} <{}> ({})",
        user.display_name.as_deref().unwrap_or(&user.id),
        user.email.as_deref().unwrap_or("-"),
        user.product.as_deref().unwrap_or("-"),
    );

    let playlists: spotify::PlaylistPage = api
        .fetch(
            &ApiRequest::get(provider::spotify::playlists_url(10)),
            &credential,
        )
        .await?;
    for playlist in &playlists.items {
        println!("{} ({} tracks)", playlist.name, playlist.tracks.total);
    }
    info!("{} of {} playlists shown", playlists.items.len(), playlists.total);

    Ok(())
}

/// Identity screen: sign in and exchange for a session credential.
async fn run_identity(config: &Config) -> Result<(), Box<dyn Error>> {
    let api = Api::new(config)?;
    let mut session = LoginSession::new(Provider::identity(config)?, Box::new(BrowserSession));
    if !login(&mut session, &api).await? {
        return Ok(());
    }

    let credential = session.credential().ok_or("no credential after login")?;
    println!("signed in; session credential {credential}");
    if let Some(ttl) = credential.expires_at.map(|_| credential.time_to_live()) {
        info!("session valid for {}s", ttl.as_secs());
    }

    Ok(())
}

/// Dispatches the selected screen.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let secrets = load_secrets(&args.secrets_file)?;
    let config = Config::with_secrets(secrets);

    match args.screen {
        Screen::Bungie {
            character,
            loadout,
            description,
            items,
        } => run_bungie(&config, character, loadout, description, items).await,
        Screen::Spotify => run_spotify(&config).await,
        Screen::Identity => run_identity(&config).await,
    }
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and runs the selected screen.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
