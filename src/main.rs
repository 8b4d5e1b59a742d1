use anyhow::Context;
use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ldap_whoami::config::{AuthMethod, OutputFormat, RunConfig, DEFAULT_OPERATION_TIMEOUT};
use ldap_whoami::discovery;
use ldap_whoami::output::{render_json, render_text};
use ldap_whoami::secure_types::Credentials;
use ldap_whoami::session::LdapSession;
use ldap_whoami::WhoamiError;

/// Ask the directory who you are, and which groups you are in
#[derive(Parser, Debug)]
#[command(name = "ldap-whoami", version, about)]
struct Cli {
    /// Show user information (name, SID, distinguished name)
    #[arg(short, long)]
    user: bool,

    /// Show all groups the user is a member of, nested and primary included
    #[arg(short, long)]
    groups: bool,

    /// Same as --user --groups
    #[arg(short, long)]
    all: bool,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Domain controller: host, host:port or ldap[s]:// URL. Found from the
    /// logon context when omitted
    #[arg(short, long, env = "LDAP_WHOAMI_SERVER")]
    server: Option<String>,

    /// Authentication method. Binding as the current logon (kerberos, or
    /// negotiate without --bind-user) needs a build with `--features gssapi`;
    /// ntlm needs `--features ntlm`
    #[arg(short = 'm', long = "method", value_enum, default_value_t = AuthMethod::Negotiate)]
    method: AuthMethod,

    /// Bind name for simple or NTLM binds (DN, UPN or DOMAIN\user)
    #[arg(long, value_name = "NAME")]
    bind_user: Option<String>,

    /// Bind password
    #[arg(long, env = "LDAP_WHOAMI_PASSWORD", hide_env_values = true, hide = true)]
    password: Option<String>,

    /// Search base instead of the server's default naming context
    #[arg(long, value_name = "DN")]
    base_dn: Option<String>,

    /// Upgrade a plain LDAP connection with StartTLS
    #[arg(long)]
    starttls: bool,

    /// Accept any server certificate
    #[arg(long)]
    no_tls_verify: bool,

    /// Timeout for each directory operation
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_OPERATION_TIMEOUT.as_secs(),
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Also collect the groups the primary group is itself nested in
    #[arg(long)]
    expand_primary_group: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn init_logging(cli: &Cli) -> anyhow::Result<Option<WorkerGuard>> {
    let default_directives = if cli.verbose {
        "warn,ldap_whoami=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    // stdout carries the report, logs go to stderr
    let console_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    let (file_layer, guard) = match &cli.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("--log-file {} does not name a file", path.display()))?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(file_name.to_string_lossy().into_owned())
                .build(dir)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn build_config(cli: &mut Cli) -> Result<RunConfig, WhoamiError> {
    let discovered = discovery::resolve_server(cli.server.as_deref())?;

    let mut config = RunConfig::new(discovered.server);
    config.fallback_base_dn = discovered.suggested_base_dn;
    config.base_dn = cli.base_dn.take();
    config.auth = cli.method;

    let password = cli.password.take();
    config.credentials = match cli.bind_user.take() {
        Some(bind_name) => Some(Credentials::new(bind_name, password.unwrap_or_default())),
        None => {
            if password.is_some() {
                warn!("Password given without --bind-user, ignoring it");
            }
            None
        }
    };

    config.show_user = cli.user || cli.all;
    config.show_groups = cli.groups || cli.all;
    config.expand_primary_group = cli.expand_primary_group;
    config.use_starttls = cli.starttls;
    config.tls_verify = !cli.no_tls_verify;
    config.operation_timeout = Duration::from_secs(cli.timeout);
    config.output = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    Ok(config)
}

async fn execute(mut cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&mut cli)?;

    let mut session = LdapSession::connect(&config)
        .await
        .with_context(|| format!("Cannot query {}", config.server))?;
    let result = ldap_whoami::run(&mut session, &config).await;
    session.close().await;
    let report = result?;

    if let Some(stats) = &report.walk_stats {
        info!(
            searches = stats.searches,
            discovered = stats.groups_discovered,
            revisits = stats.revisits,
            "Group walk statistics"
        );
    }

    match config.output {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => println!("{}", render_json(&report)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let guard = match init_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    let code = match execute(cli).await {
        Ok(()) => 0,
        Err(e) => {
            debug!("Run failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<WhoamiError>()
                .map_or(1, WhoamiError::exit_code)
        }
    };

    // process::exit skips destructors; flush the file writer first
    drop(guard);
    std::process::exit(code);
}
